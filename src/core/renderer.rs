use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::Theme;

/// 목록 마크업을 이미지로 그리는 트레이트.
pub trait ListRenderer {
    /// 마크업을 그려 내용 영역만큼 잘라낸 PNG를 돌려준다.
    fn render(&self, fragment: &str, theme: Theme) -> Result<Vec<u8>>;
}

/// 헤드리스 Chrome 렌더러.
/// 브라우저는 처음 그릴 때 띄워 재사용하고, 탭은 매번 새로 열고 닫는다.
pub struct ChromeRenderer {
    browser: Mutex<Option<Browser>>,
}

#[derive(Debug, Deserialize)]
struct ClipRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// 어떤 경로로 빠져나가든 탭을 닫는다.
struct PageGuard(Arc<Tab>);

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.close(false) {
            warn!(error = %e, "failed to close the render page");
        }
    }
}

/// 렌더링 창 크기. 캡처는 뷰포트 안쪽만 찍힌다.
const WINDOW_SIZE: (u32, u32) = (1280, 8192);

const MEASURE_SCRIPT: &str = r#"
(() => {
  const rect = document.getElementById('song-list').getBoundingClientRect();
  return JSON.stringify({ x: rect.left, y: rect.top, width: rect.width, height: rect.height });
})()
"#;

impl ChromeRenderer {
    pub fn new() -> Self {
        Self {
            browser: Mutex::new(None),
        }
    }

    fn open_page(&self) -> Result<PageGuard> {
        let mut browser = self
            .browser
            .lock()
            .map_err(|_| anyhow!("browser lock poisoned"))?;

        if browser.is_none() {
            let options = LaunchOptions::default_builder()
                .headless(true)
                .sandbox(false)
                .window_size(Some(WINDOW_SIZE))
                .build()
                .map_err(|e| anyhow!("invalid browser launch options: {e}"))?;
            let launched = Browser::new(options).context("failed to launch headless Chrome")?;
            debug!("headless Chrome launched");
            *browser = Some(launched);
        }

        let tab = browser
            .as_ref()
            .context("browser not available")?
            .new_tab()
            .context("failed to open a render page")?;
        Ok(PageGuard(tab))
    }
}

impl Default for ChromeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ListRenderer for ChromeRenderer {
    fn render(&self, fragment: &str, theme: Theme) -> Result<Vec<u8>> {
        let page = self.open_page()?;
        let tab = &page.0;

        let html = build_document(fragment, theme);
        let url = format!(
            "data:text/html;charset=utf-8;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(html)
        );
        tab.navigate_to(&url)?.wait_until_navigated()?;

        let measured = tab
            .evaluate(MEASURE_SCRIPT, false)
            .context("failed to measure the song list")?;
        let raw = measured
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .context("song list measurement returned nothing")?;
        let rect: ClipRect = serde_json::from_str(raw)?;
        debug!(?rect, "song list bounds");
        if rect.x + rect.width > f64::from(WINDOW_SIZE.0)
            || rect.y + rect.height > f64::from(WINDOW_SIZE.1)
        {
            warn!(
                ?rect,
                window = ?WINDOW_SIZE,
                "song list is larger than the render window, image will be cut"
            );
        }

        let png = tab
            .capture_screenshot(
                CaptureScreenshotFormatOption::Png,
                None,
                Some(Viewport {
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                    scale: 1.0,
                }),
                true,
            )
            .context("failed to capture the song list")?;

        Ok(png)
    }
}

/// 목록 마크업을 스타일이 포함된 전체 HTML 문서로 감싼다.
pub fn build_document(fragment: &str, theme: Theme) -> String {
    let fg = theme.foreground();
    let bg = theme.background();
    format!(
        r#"<html>
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <style>
      body {{
        margin: 0;
        font-family: PingFang SC, Hiragino Sans GB, Microsoft YaHei, SimSun, sans-serif;
        font-size: 16px;
        background: rgb({bg},{bg},{bg});
        color: rgb({fg},{fg},{fg});
        min-height: 100vh;
      }}
      #song-list {{
        padding: 20px;
        display: inline-block;
        max-width: 100%;
        white-space: nowrap;
      }}
    </style>
  </head>
  <body>
    <div id="song-list">
      {fragment}
    </div>
  </body>
</html>"#
    )
}
