use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{Context, Result};
use scraper::Html;
use tracing::debug;

use crate::session::{AudioSource, ChatSession, Element, MessageId};

/// 터미널을 호스트로 쓰는 세션.
/// 표준 입력 한 줄이 사용자 메시지 하나이고, 이미지와 음성은 파일로 저장한다.
pub struct TerminalSession {
    platform: String,
    out_dir: PathBuf,
    lines: Receiver<String>,
    next_id: u64,
}

impl TerminalSession {
    pub fn new(platform: &str, out_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("cannot create output directory {}", out_dir.display()))?;

        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .context("failed to start the stdin reader")?;

        Ok(Self {
            platform: platform.to_string(),
            out_dir: out_dir.to_path_buf(),
            lines: rx,
            next_id: 0,
        })
    }

    fn write_media(&self, id: u64, index: usize, data: &[u8], mime: &str) -> Result<PathBuf> {
        let path = self
            .out_dir
            .join(format!("message-{id}-{index}.{}", extension_for(mime)));
        std::fs::write(&path, data)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

impl ChatSession for TerminalSession {
    fn platform(&self) -> &str {
        &self.platform
    }

    fn send(&mut self, elements: Vec<Element>) -> Result<Vec<MessageId>> {
        self.next_id += 1;
        let id = self.next_id;

        for (index, element) in elements.iter().enumerate() {
            match element {
                Element::Text(markup) => println!("{}", markup_to_text(markup)),
                Element::Image { data, mime } => {
                    let path = self.write_media(id, index, data, mime)?;
                    println!("[image] {}", path.display());
                }
                Element::Audio(AudioSource::Url(url)) => println!("[audio] {url}"),
                Element::Audio(AudioSource::Bytes { data, mime }) => {
                    let path = self.write_media(id, index, data, mime)?;
                    println!("[audio] {}", path.display());
                }
            }
        }

        Ok(vec![MessageId(id.to_string())])
    }

    fn prompt(&mut self, timeout: Duration) -> Result<Option<String>> {
        // 목록을 보내기 전에 입력된 줄은 응답으로 치지 않는다.
        while let Ok(stale) = self.lines.try_recv() {
            debug!(line = %stale, "discarding input typed before the prompt");
        }

        match self.lines.recv_timeout(timeout) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn delete_message(&mut self, id: &MessageId) -> Result<()> {
        println!("[message {} recalled]", id.0);
        Ok(())
    }
}

/// 목록 마크업을 터미널용 평문으로 바꾼다. `<br />`은 줄바꿈이 된다.
pub fn markup_to_text(markup: &str) -> String {
    let normalized = markup
        .replace("<br />", "\n")
        .replace("<br/>", "\n")
        .replace("<br>", "\n");
    let fragment = Html::parse_fragment(&normalized);
    fragment.root_element().text().collect()
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "audio/amr" => "amr",
        "audio/mpeg" => "mp3",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_to_text() {
        let text = markup_to_text("<b>QQ Music</b>:<br />1. Respire -- Someone<br />2. A &amp; B -- C");
        assert_eq!(text, "QQ Music:\n1. Respire -- Someone\n2. A & B -- C");
    }

    #[test]
    fn test_markup_plain_passthrough() {
        assert_eq!(markup_to_text("Exited song selection."), "Exited song selection.");
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("audio/amr"), "amr");
        assert_eq!(extension_for("application/x-unknown"), "bin");
    }
}
