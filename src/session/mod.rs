pub mod terminal;

use std::time::Duration;

use anyhow::Result;

/// 보낸 메시지의 식별자. 나중에 회수할 때 쓴다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

/// 음성 메시지 내용
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// 호스트가 직접 재생하는 원본 URL
    Url(String),
    /// 인코딩된 음성 데이터
    Bytes { data: Vec<u8>, mime: String },
}

/// 메시지를 구성하는 요소
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// 간단한 마크업(`<br />`, `<b>`)이 섞인 텍스트
    Text(String),
    Image { data: Vec<u8>, mime: String },
    Audio(AudioSource),
}

impl Element {
    pub fn text(s: impl Into<String>) -> Self {
        Element::Text(s.into())
    }

    pub fn png(data: Vec<u8>) -> Self {
        Element::Image {
            data,
            mime: "image/png".to_string(),
        }
    }
}

/// 명령을 보낸 사용자와의 대화 창구.
/// 메시지 전송, 응답 대기, 메시지 회수를 호스트에 위임한다.
pub trait ChatSession {
    /// 세션이 속한 플랫폼 이름 (예: `qq`)
    fn platform(&self) -> &str;

    /// 메시지 하나를 보내고 생성된 메시지 ID들을 돌려준다.
    fn send(&mut self, elements: Vec<Element>) -> Result<Vec<MessageId>>;

    /// 사용자의 다음 메시지를 기다린다. 시간 안에 오지 않으면 `None`.
    fn prompt(&mut self, timeout: Duration) -> Result<Option<String>>;

    fn delete_message(&mut self, id: &MessageId) -> Result<()>;

    fn send_text(&mut self, text: &str) -> Result<Vec<MessageId>> {
        self.send(vec![Element::text(text)])
    }
}
