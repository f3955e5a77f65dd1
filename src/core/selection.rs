use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::delivery::{deliver_audio, MediaServices};
use crate::core::formatter::{format_menu, selection_prompt};
use crate::core::renderer::ListRenderer;
use crate::models::{Platform, Theme, Track};
use crate::session::{ChatSession, Element, MessageId};
use crate::sources::{MusicSource, SearchParams};

/// 명령 한 번의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    EmptyKeyword,
    /// 두 카탈로그 모두 결과가 없음
    Unavailable,
    TimedOut,
    Exited,
    InvalidIndex,
    FetchFailed,
    Delivered,
    /// 음성 전송 실패. 로그만 남기고 사용자에게는 알리지 않는다.
    DeliveryFailed,
}

impl Outcome {
    /// 사용자에게 보낼 마지막 답장
    pub fn reply(self) -> Option<&'static str> {
        match self {
            Outcome::EmptyKeyword => Some("Please enter song information."),
            Outcome::Unavailable => {
                Some("Could not retrieve the song list, please try again later.")
            }
            Outcome::TimedOut => Some("Input timed out, song selection cancelled."),
            Outcome::Exited => Some("Exited song selection."),
            Outcome::InvalidIndex => Some("Invalid index, song selection cancelled."),
            Outcome::FetchFailed => Some("Failed to fetch the song."),
            Outcome::Delivered | Outcome::DeliveryFailed => None,
        }
    }
}

/// 곡 검색 → 목록 전송 → 번호 입력 → 곡 조회 → 음성 전송 흐름.
/// 상태는 호출 하나 안에서만 존재한다.
pub struct MusicCommand<'a> {
    config: &'a Config,
    source: &'a dyn MusicSource,
    renderer: &'a dyn ListRenderer,
    services: &'a MediaServices,
}

impl<'a> MusicCommand<'a> {
    pub fn new(
        config: &'a Config,
        source: &'a dyn MusicSource,
        renderer: &'a dyn ListRenderer,
        services: &'a MediaServices,
    ) -> Self {
        Self {
            config,
            source,
            renderer,
            services,
        }
    }

    /// 흐름을 실행하고 결과에 맞는 답장을 보낸다.
    pub fn execute(&self, session: &mut dyn ChatSession, keyword: &str) -> Result<Outcome> {
        let outcome = self.run(session, keyword)?;
        info!(?outcome, "music command finished");
        if let Some(reply) = outcome.reply() {
            session.send_text(reply)?;
        }
        Ok(outcome)
    }

    fn run(&self, session: &mut dyn ChatSession, keyword: &str) -> Result<Outcome> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(Outcome::EmptyKeyword);
        }

        let (qq, netease) = self.search_all(keyword);
        let total = qq.len() + netease.len();
        if total == 0 {
            return Ok(Outcome::Unavailable);
        }

        self.present_menu(session, &qq, &netease)?;

        let reply = match session.prompt(self.config.wait_timeout())? {
            Some(reply) if !reply.is_empty() => reply,
            _ => return Ok(Outcome::TimedOut),
        };
        let reply = reply.trim();
        if self.config.exit_commands().iter().any(|cmd| cmd == reply) {
            return Ok(Outcome::Exited);
        }

        let index = match parse_index(reply, total) {
            Some(index) => index,
            None => {
                debug!(reply, total, "invalid selection");
                return Ok(Outcome::InvalidIndex);
            }
        };

        let selected = if index <= qq.len() {
            &qq[index - 1]
        } else {
            &netease[index - 1 - qq.len()]
        };

        debug!(index, track = %selected.summary(), "track selected");

        let Some((platform, id)) = selected.resolve_lookup() else {
            warn!(page_url = %selected.page_url, "selected track matches no known catalog");
            return Ok(Outcome::FetchFailed);
        };
        if selected.origin.is_some_and(|origin| origin != platform) {
            warn!(
                origin = ?selected.origin,
                resolved = %platform,
                page_url = %selected.page_url,
                "track page URL points to a different catalog than the one that returned it"
            );
        }

        let tip = session.send_text(&self.config.generation_tip)?;
        let outcome = self.fetch_and_deliver(session, platform, id);
        if self.config.recall {
            recall(session, &tip);
        }
        Ok(outcome)
    }

    /// 두 카탈로그를 동시에 검색한다. 실패한 쪽은 빈 목록이 된다.
    fn search_all(&self, keyword: &str) -> (Vec<Track>, Vec<Track>) {
        let source = self.source;
        let count = self.config.result_count;

        std::thread::scope(|scope| {
            let qq = scope.spawn(|| search_catalog(source, Platform::QqMusic, keyword, count));
            let netease = search_catalog(source, Platform::NetEase, keyword, count);
            let qq = qq.join().unwrap_or_else(|_| {
                warn!("{} search panicked", Platform::QqMusic);
                Vec::new()
            });
            (qq, netease)
        })
    }

    fn present_menu(
        &self,
        session: &mut dyn ChatSession,
        qq: &[Track],
        netease: &[Track],
    ) -> Result<()> {
        let menu = format_menu(&[(Platform::QqMusic, qq), (Platform::NetEase, netease)]);
        let exit_commands = self.config.exit_commands();
        let prompt = selection_prompt(
            &exit_commands,
            self.config.menu_exit_command_tip,
            self.config.wait_timeout(),
        );

        if self.config.image_mode {
            let theme = Theme::from_dark_mode(self.config.dark_mode);
            match self.renderer.render(&menu, theme) {
                Ok(png) => {
                    session.send(vec![Element::png(png), Element::text(prompt)])?;
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "song list rendering failed, sending text")
                }
            }
        }

        session.send_text(&format!("{menu}<br /><br />{prompt}"))?;
        Ok(())
    }

    fn fetch_and_deliver(
        &self,
        session: &mut dyn ChatSession,
        platform: Platform,
        id: u64,
    ) -> Outcome {
        let track = match self.source.search(platform, &SearchParams::by_id(id)) {
            Ok(resp) => {
                if !resp.is_success() {
                    warn!(%platform, id, code = resp.code, msg = %resp.msg, "track lookup failed");
                }
                resp.into_track()
            }
            Err(e) => {
                warn!(%platform, id, error = %format!("{e:#}"), "track lookup request failed");
                None
            }
        };

        let Some(track) = track else {
            return Outcome::FetchFailed;
        };
        debug!(
            track = %track.summary(),
            cover = %track.cover_url,
            src = %track.playable_source,
            "track resolved"
        );

        match deliver_audio(
            session,
            self.source,
            self.services,
            &self.config.voice_platform,
            &track,
        ) {
            Ok(()) => Outcome::Delivered,
            Err(e) => {
                error!(%platform, id, error = %e, "audio delivery failed");
                Outcome::DeliveryFailed
            }
        }
    }
}

fn search_catalog(
    source: &dyn MusicSource,
    platform: Platform,
    keyword: &str,
    count: Option<u32>,
) -> Vec<Track> {
    match source.search_tracks(platform, keyword, count) {
        Ok(tracks) => {
            debug!(%platform, count = tracks.len(), "catalog search done");
            tracks
        }
        Err(e) => {
            warn!(%platform, error = %format!("{e:#}"), "catalog search failed");
            Vec::new()
        }
    }
}

/// 1부터 `total`까지의 10진 정수만 받는다.
fn parse_index(reply: &str, total: usize) -> Option<usize> {
    let index: usize = reply.parse().ok()?;
    (1..=total).contains(&index).then_some(index)
}

fn recall(session: &mut dyn ChatSession, ids: &[MessageId]) {
    for id in ids {
        if let Err(e) = session.delete_message(id) {
            warn!(id = %id.0, error = %format!("{e:#}"), "failed to recall the generation tip");
        }
    }
}
