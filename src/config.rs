use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 음성 생성 중에 보내는 안내 문구
    pub generation_tip: String,
    /// 사용자가 번호를 고를 때까지 기다리는 시간 (ms)
    pub wait_timeout: u64,
    /// 선택 종료 명령. 쉼표(`,` 또는 `，`)로 구분한다.
    pub exit_command: String,
    /// 목록 뒤에 종료 명령 안내를 붙일지 여부
    pub menu_exit_command_tip: bool,
    /// 잘못된 번호 입력 시 종료 명령 안내를 붙일지 여부 (현재 사용하지 않음)
    pub retry_exit_command_tip: bool,
    /// 음성 전송 후 안내 문구를 회수할지 여부
    pub recall: bool,
    /// 목록을 이미지로 보낼지 여부
    pub image_mode: bool,
    /// 이미지 목록 어두운 테마
    pub dark_mode: bool,
    /// 카탈로그별 검색 결과 수. 없으면 API 기본값.
    pub result_count: Option<u32>,
    /// 카탈로그 요청 타임아웃 (초)
    pub http_timeout_secs: u64,
    /// 음성 코덱 변환이 필요한 플랫폼 이름
    pub voice_platform: String,
    /// SILK 인코더 실행 파일
    pub silk_encoder: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation_tip: "generating voice…".to_string(),
            wait_timeout: 45_000,
            exit_command: "0, not listening".to_string(),
            menu_exit_command_tip: false,
            retry_exit_command_tip: true,
            recall: true,
            image_mode: true,
            dark_mode: true,
            result_count: None,
            http_timeout_secs: 15,
            voice_platform: "qq".to_string(),
            silk_encoder: "silk_v3_encoder".to_string(),
        }
    }
}

impl Config {
    /// 종료 명령 목록. 앞뒤 공백을 제거하고 빈 항목은 버린다.
    pub fn exit_commands(&self) -> Vec<String> {
        parse_exit_commands(&self.exit_command)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

pub fn parse_exit_commands(raw: &str) -> Vec<String> {
    raw.split([',', '，'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 카탈로그별 결과 수 입력. 빈 값이면 API 기본값을 쓴다.
pub fn parse_result_count(raw: &str) -> Result<Option<u32>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let count: u32 = raw
        .parse()
        .with_context(|| format!("invalid result count: {raw}"))?;
    Ok(Some(count))
}

/// 플랫폼 설정 디렉터리 아래 `music-voice/config.toml`.
/// 설정 디렉터리를 알 수 없으면 `$HOME/.config`, 그것도 없으면 현재 디렉터리.
fn config_path() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("music-voice")
        .join("config.toml")
}

pub fn load_config() -> Config {
    load_config_from(&config_path())
}

/// 파일이 없거나 읽을 수 없으면 기본값.
pub fn load_config_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Config::default();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            Config::default()
        }),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
            Config::default()
        }
    }
}

pub fn save_config(config: &Config) -> Result<()> {
    save_config_to(&config_path(), config)
}

pub fn save_config_to(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.wait_timeout(), Duration::from_millis(45_000));
        assert!(cfg.recall);
        assert!(cfg.image_mode);
        assert!(cfg.dark_mode);
        assert!(!cfg.menu_exit_command_tip);
        assert!(cfg.retry_exit_command_tip);
        assert_eq!(cfg.exit_commands(), vec!["0", "not listening"]);
    }

    #[test]
    fn test_exit_commands_mixed_commas() {
        assert_eq!(
            parse_exit_commands(" 0 ，quit,  stop ,"),
            vec!["0", "quit", "stop"]
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg: Config = toml::from_str("image_mode = false\nwait_timeout = 1000\n").unwrap();
        assert!(!cfg.image_mode);
        assert_eq!(cfg.wait_timeout, 1000);
        assert_eq!(cfg.generation_tip, "generating voice…");
        assert_eq!(cfg.voice_platform, "qq");
    }

    #[test]
    fn test_toml_round_trip_keeps_unused_flag() {
        let cfg = Config {
            retry_exit_command_tip: false,
            result_count: Some(5),
            ..Default::default()
        };
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert!(!back.retry_exit_command_tip);
        assert_eq!(back.result_count, Some(5));
    }

    #[test]
    fn test_parse_result_count() {
        assert_eq!(parse_result_count("").unwrap(), None);
        assert_eq!(parse_result_count("  ").unwrap(), None);
        assert_eq!(parse_result_count(" 8 ").unwrap(), Some(8));
        assert!(parse_result_count("-1").is_err());
        assert!(parse_result_count("ten").is_err());
    }

    #[test]
    fn test_config_path_ends_with_app_dir() {
        assert!(config_path().ends_with("music-voice/config.toml"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml"));
        assert_eq!(cfg.wait_timeout, 45_000);
        assert_eq!(cfg.http_timeout_secs, 15);
    }

    #[test]
    fn test_load_invalid_toml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "wait_timeout = \"soon\"\n").unwrap();
        let cfg = load_config_from(&path);
        assert_eq!(cfg.wait_timeout, 45_000);
    }

    #[test]
    fn test_save_then_load_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("music-voice").join("config.toml");
        let cfg = Config {
            result_count: Some(3),
            http_timeout_secs: 30,
            ..Default::default()
        };
        save_config_to(&path, &cfg).unwrap();

        let back = load_config_from(&path);
        assert_eq!(back.result_count, Some(3));
        assert_eq!(back.http_timeout_secs, 30);
    }
}
