use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::Track;
use crate::session::{AudioSource, ChatSession, Element};
use crate::sources::MusicSource;

/// 음성 코덱 변환 경로의 표본화율
pub const VOICE_SAMPLE_RATE: u32 = 24_000;

/// 인코딩된 음성을 보낼 때 붙이는 MIME
const VOICE_MIME: &str = "audio/amr";

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("{0} service is not loaded")]
    MissingService(&'static str),

    #[error("failed to download the audio source: {0}")]
    Download(String),

    #[error("transcoding failed: {0}")]
    Transcode(String),

    #[error("voice encoding failed: {0}")]
    Encode(String),

    #[error("failed to send the audio: {0}")]
    Send(String),
}

/// 변환 결과 PCM 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u32,
    /// ffmpeg 샘플 형식 이름 (`s16le` 등)
    pub sample_format: &'static str,
}

impl PcmFormat {
    /// 모노 24kHz 16비트 리틀엔디언
    pub const VOICE: PcmFormat = PcmFormat {
        sample_rate: VOICE_SAMPLE_RATE,
        channels: 1,
        sample_format: "s16le",
    };
}

/// 임의 형식의 오디오를 raw PCM으로 바꾼다.
pub trait Transcoder: Send + Sync {
    fn to_pcm(&self, input: &[u8], format: PcmFormat) -> Result<Vec<u8>, DeliveryError>;
}

/// raw PCM을 음성 코덱 컨테이너로 인코딩한다.
pub trait VoiceEncoder: Send + Sync {
    fn encode(&self, pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, DeliveryError>;
}

/// 코덱 변환 경로에 필요한 외부 도구들. 시작할 때 한 번 확인한다.
#[derive(Default)]
pub struct MediaServices {
    pub transcoder: Option<Box<dyn Transcoder>>,
    pub encoder: Option<Box<dyn VoiceEncoder>>,
}

impl MediaServices {
    /// PATH에서 ffmpeg과 SILK 인코더를 찾는다. 없는 도구는 `None`으로 둔다.
    pub fn detect(silk_encoder: &str) -> Self {
        let transcoder = match which::which("ffmpeg") {
            Ok(path) => {
                debug!(path = %path.display(), "ffmpeg found");
                Some(Box::new(FfmpegTranscoder::new(path)) as Box<dyn Transcoder>)
            }
            Err(_) => {
                info!("ffmpeg not found, voice codec delivery disabled");
                None
            }
        };

        let encoder = match which::which(silk_encoder) {
            Ok(path) => {
                debug!(path = %path.display(), "silk encoder found");
                Some(Box::new(SilkEncoder::new(path)) as Box<dyn VoiceEncoder>)
            }
            Err(_) => {
                info!(program = silk_encoder, "silk encoder not found, voice codec delivery disabled");
                None
            }
        };

        Self {
            transcoder,
            encoder,
        }
    }

    fn require(&self) -> Result<(&dyn Transcoder, &dyn VoiceEncoder), DeliveryError> {
        let encoder = self
            .encoder
            .as_deref()
            .ok_or(DeliveryError::MissingService("silk"))?;
        let transcoder = self
            .transcoder
            .as_deref()
            .ok_or(DeliveryError::MissingService("ffmpeg"))?;
        Ok((transcoder, encoder))
    }
}

/// 곡을 재생 가능한 음성 메시지로 보낸다.
///
/// 세션 플랫폼이 `voice_platform`이면 음원을 내려받아 PCM으로 바꾼 뒤
/// 음성 코덱으로 인코딩해 보내고, 아니면 원본 URL을 그대로 보낸다.
pub fn deliver_audio(
    session: &mut dyn ChatSession,
    source: &dyn MusicSource,
    services: &MediaServices,
    voice_platform: &str,
    track: &Track,
) -> Result<(), DeliveryError> {
    let audio = if session.platform() == voice_platform {
        let (transcoder, encoder) = services.require()?;

        let input = source
            .download(&track.playable_source)
            .map_err(|e| DeliveryError::Download(format!("{e:#}")))?;
        let pcm = transcoder.to_pcm(&input, PcmFormat::VOICE)?;
        let voice = encoder.encode(&pcm, VOICE_SAMPLE_RATE)?;
        debug!(
            input = input.len(),
            pcm = pcm.len(),
            voice = voice.len(),
            "voice encoded"
        );

        AudioSource::Bytes {
            data: voice,
            mime: VOICE_MIME.to_string(),
        }
    } else {
        AudioSource::Url(track.playable_source.clone())
    };

    session
        .send(vec![Element::Audio(audio)])
        .map_err(|e| DeliveryError::Send(format!("{e:#}")))?;
    Ok(())
}

/// ffmpeg 프로세스로 변환한다. 입력은 stdin, 출력은 stdout 파이프를 쓴다.
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn to_pcm(&self, input: &[u8], format: PcmFormat) -> Result<Vec<u8>, DeliveryError> {
        let mut child = Command::new(&self.program)
            .args(["-loglevel", "error", "-i", "pipe:0"])
            .args(["-ar", &format.sample_rate.to_string()])
            .args(["-ac", &format.channels.to_string()])
            .args(["-f", format.sample_format, "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DeliveryError::Transcode(format!("failed to spawn ffmpeg: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DeliveryError::Transcode("ffmpeg stdin unavailable".to_string()))?;

        // 출력 파이프가 차서 멈추지 않도록 입력은 별도 스레드에서 쓴다.
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(input));
            let output = child.wait_with_output();
            if let Ok(Err(e)) = writer.join() {
                warn!(error = %e, "ffmpeg closed its input early");
            }
            output
        })
        .map_err(|e| DeliveryError::Transcode(format!("ffmpeg execution failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeliveryError::Transcode(format!(
                "ffmpeg exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

/// silk-v3 인코더 실행 파일로 인코딩한다. 입출력은 임시 파일을 거친다.
pub struct SilkEncoder {
    program: PathBuf,
}

impl SilkEncoder {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    fn run(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<(), DeliveryError> {
        let result = Command::new(&self.program)
            .arg(input)
            .arg(output)
            .args(["-Fs_API", &sample_rate.to_string(), "-tencent", "-quiet"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| DeliveryError::Encode(format!("failed to run the silk encoder: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(DeliveryError::Encode(format!(
                "silk encoder exited with {:?}: {}",
                result.status.code(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl VoiceEncoder for SilkEncoder {
    fn encode(&self, pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, DeliveryError> {
        let dir = tempfile::tempdir()
            .map_err(|e| DeliveryError::Encode(format!("failed to create temp dir: {e}")))?;
        let input = dir.path().join("voice.pcm");
        let output = dir.path().join("voice.silk");

        std::fs::write(&input, pcm)
            .map_err(|e| DeliveryError::Encode(format!("failed to write pcm: {e}")))?;
        self.run(&input, &output, sample_rate)?;

        std::fs::read(&output)
            .map_err(|e| DeliveryError::Encode(format!("failed to read encoded voice: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use anyhow::{bail, Result};

    use crate::models::Platform;
    use crate::session::MessageId;
    use crate::sources::{SearchParams, SearchResponse};

    struct FakeSession {
        platform: &'static str,
        sent: Vec<Vec<Element>>,
    }

    impl ChatSession for FakeSession {
        fn platform(&self) -> &str {
            self.platform
        }
        fn send(&mut self, elements: Vec<Element>) -> Result<Vec<MessageId>> {
            self.sent.push(elements);
            Ok(vec![MessageId(self.sent.len().to_string())])
        }
        fn prompt(&mut self, _timeout: Duration) -> Result<Option<String>> {
            Ok(None)
        }
        fn delete_message(&mut self, _id: &MessageId) -> Result<()> {
            Ok(())
        }
    }

    struct FakeSource {
        downloads: Mutex<Vec<String>>,
    }

    impl MusicSource for FakeSource {
        fn search(&self, _platform: Platform, _params: &SearchParams) -> Result<SearchResponse> {
            bail!("not used")
        }
        fn download(&self, url: &str) -> Result<Vec<u8>> {
            self.downloads.lock().unwrap().push(url.to_string());
            Ok(b"mp3".to_vec())
        }
    }

    struct TagTranscoder;

    impl Transcoder for TagTranscoder {
        fn to_pcm(&self, input: &[u8], format: PcmFormat) -> Result<Vec<u8>, DeliveryError> {
            assert_eq!(format, PcmFormat::VOICE);
            Ok([input, &b"-pcm"[..]].concat())
        }
    }

    struct TagEncoder;

    impl VoiceEncoder for TagEncoder {
        fn encode(&self, pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, DeliveryError> {
            assert_eq!(sample_rate, 24_000);
            Ok([pcm, &b"-silk"[..]].concat())
        }
    }

    fn track() -> Track {
        Track {
            playable_source: "https://cdn.example/a.mp3".to_string(),
            ..Default::default()
        }
    }

    fn source() -> FakeSource {
        FakeSource {
            downloads: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_url_delivery_on_other_platforms() {
        let mut session = FakeSession {
            platform: "discord",
            sent: Vec::new(),
        };
        let source = source();
        deliver_audio(&mut session, &source, &MediaServices::default(), "qq", &track()).unwrap();

        assert_eq!(
            session.sent,
            vec![vec![Element::Audio(AudioSource::Url(
                "https://cdn.example/a.mp3".to_string()
            ))]]
        );
        assert!(source.downloads.lock().unwrap().is_empty());
    }

    #[test]
    fn test_codec_delivery() {
        let mut session = FakeSession {
            platform: "qq",
            sent: Vec::new(),
        };
        let services = MediaServices {
            transcoder: Some(Box::new(TagTranscoder)),
            encoder: Some(Box::new(TagEncoder)),
        };
        let source = source();
        deliver_audio(&mut session, &source, &services, "qq", &track()).unwrap();

        assert_eq!(
            session.sent,
            vec![vec![Element::Audio(AudioSource::Bytes {
                data: b"mp3-pcm-silk".to_vec(),
                mime: "audio/amr".to_string(),
            })]]
        );
        assert_eq!(
            *source.downloads.lock().unwrap(),
            vec!["https://cdn.example/a.mp3".to_string()]
        );
    }

    #[test]
    fn test_codec_delivery_requires_encoder() {
        let mut session = FakeSession {
            platform: "qq",
            sent: Vec::new(),
        };
        let services = MediaServices {
            transcoder: Some(Box::new(TagTranscoder)),
            encoder: None,
        };
        let source = source();
        let err = deliver_audio(&mut session, &source, &services, "qq", &track()).unwrap_err();

        assert!(matches!(err, DeliveryError::MissingService("silk")));
        assert!(session.sent.is_empty());
        assert!(source.downloads.lock().unwrap().is_empty());
    }

    #[test]
    fn test_codec_delivery_requires_transcoder() {
        let mut session = FakeSession {
            platform: "qq",
            sent: Vec::new(),
        };
        let services = MediaServices {
            transcoder: None,
            encoder: Some(Box::new(TagEncoder)),
        };
        let err =
            deliver_audio(&mut session, &source(), &services, "qq", &track()).unwrap_err();
        assert_eq!(err.to_string(), "ffmpeg service is not loaded");
    }
}
