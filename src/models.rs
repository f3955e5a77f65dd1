use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 검색 대상 음악 카탈로그.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    QqMusic,
    NetEase,
}

impl Platform {
    /// 목록을 이어 붙이는 순서. QQ Music 결과가 항상 앞에 온다.
    pub const ALL: [Platform; 2] = [Platform::QqMusic, Platform::NetEase];

    pub fn label(self) -> &'static str {
        match self {
            Platform::QqMusic => "QQ Music",
            Platform::NetEase => "NetEase Music",
        }
    }

    pub fn api_base(self) -> &'static str {
        match self {
            Platform::QqMusic => "https://api.xingzhige.com/API/QQmusicVIP",
            Platform::NetEase => "https://api.xingzhige.com/API/NetEase_CloudMusic_new",
        }
    }

    /// 곡 페이지 URL에 포함되는 도메인 표식.
    pub fn domain_marker(self) -> &'static str {
        match self {
            Platform::QqMusic => "qq.com",
            Platform::NetEase => "163.com",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 카탈로그 API가 돌려주는 곡 한 건.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Track {
    #[serde(rename = "songname", default, deserialize_with = "lenient_string")]
    pub display_name: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub subtitle: Option<String>,
    #[serde(rename = "name", default, deserialize_with = "lenient_string")]
    pub artist: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub album: String,
    #[serde(rename = "pay", default, deserialize_with = "lenient_string")]
    pub pay_tier: String,
    #[serde(rename = "cover", default, deserialize_with = "lenient_string")]
    pub cover_url: String,
    #[serde(rename = "songurl", default, deserialize_with = "lenient_string")]
    pub page_url: String,
    #[serde(rename = "src", default, deserialize_with = "lenient_string")]
    pub playable_source: String,
    /// QQ Music 곡 ID
    #[serde(rename = "songid", default, deserialize_with = "flexible_id")]
    pub track_id: Option<u64>,
    /// NetEase Music 곡 ID
    #[serde(rename = "id", default, deserialize_with = "flexible_id")]
    pub song_id: Option<u64>,
    /// 검색 시점에 이 곡을 돌려준 카탈로그. 응답 본문에는 없다.
    #[serde(skip)]
    pub origin: Option<Platform>,
}

impl Track {
    /// 곡 페이지 URL의 도메인으로 플랫폼과 조회용 ID를 결정한다.
    ///
    /// 검색 단계의 `origin`이 아니라 URL 문자열만 본다. 두 표식이 모두 있으면
    /// QQ Music이 우선한다. 어느 쪽과도 맞지 않거나 ID가 없으면 `None`.
    pub fn resolve_lookup(&self) -> Option<(Platform, u64)> {
        let mut resolved = None;
        if self.page_url.contains(Platform::NetEase.domain_marker()) {
            resolved = Some((Platform::NetEase, self.song_id));
        }
        if self.page_url.contains(Platform::QqMusic.domain_marker()) {
            resolved = Some((Platform::QqMusic, self.track_id));
        }
        let (platform, id) = resolved?;
        Some((platform, id?))
    }

    /// 부제가 있으면 `제목 (부제)` 형태
    pub fn full_title(&self) -> String {
        match self.subtitle.as_deref().filter(|s| !s.is_empty()) {
            Some(sub) => format!("{} ({})", self.display_name, sub),
            None => self.display_name.clone(),
        }
    }

    pub fn summary(&self) -> String {
        format!("{} -- {}", self.display_name, self.artist)
    }
}

/// 이미지 목록의 색상 테마.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    /// 글자색 밝기 (0 또는 255).
    pub fn foreground(self) -> u8 {
        match self {
            Theme::Dark => 255,
            Theme::Light => 0,
        }
    }

    /// 배경색 밝기 (0 또는 255).
    pub fn background(self) -> u8 {
        255 - self.foreground()
    }
}

/// 표시용 문자열 필드. 숫자나 불리언으로 와도 문자열로 받고, null은 빈 문자열.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_to_string(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_to_string(Value::deserialize(deserializer)?))
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// ID가 숫자 또는 숫자 문자열로 올 수 있다. 해석할 수 없으면 `None`.
fn flexible_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
