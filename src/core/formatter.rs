use std::time::Duration;

use crate::models::{Platform, Track};

/// 한 카탈로그의 검색 결과를 번호 목록 마크업으로 만든다.
/// 번호는 `start_index + 1`부터 시작해 여러 카탈로그에 걸쳐 이어진다.
/// 결과가 없으면 가져오지 못했다는 안내를 대신 넣는다.
pub fn format_song_list(tracks: &[Track], platform: Platform, start_index: usize) -> String {
    if tracks.is_empty() {
        return format!("<b>{platform}</b>: could not retrieve the song list");
    }

    let items = tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            format!(
                "{}. {} -- {}",
                start_index + i + 1,
                escape_html(&track.display_name),
                escape_html(&track.artist)
            )
        })
        .collect::<Vec<_>>()
        .join("<br />");

    format!("<b>{platform}</b>:<br />{items}")
}

/// 카탈로그별 목록을 순서대로 이어 붙인다.
pub fn format_menu(sections: &[(Platform, &[Track])]) -> String {
    let mut start_index = 0;
    let mut parts = Vec::with_capacity(sections.len());
    for (platform, tracks) in sections {
        parts.push(format_song_list(tracks, *platform, start_index));
        start_index += tracks.len();
    }
    parts.join("<br /><br />")
}

/// 목록 뒤에 붙는 입력 안내 문구.
pub fn selection_prompt(exit_commands: &[String], show_exit_tip: bool, wait: Duration) -> String {
    let exit_tip = if show_exit_tip {
        format!(
            "To exit, send any of [{}]<br /><br />",
            escape_html(&exit_commands.join(","))
        )
    } else {
        String::new()
    };
    let seconds = wait.as_millis() as f64 / 1000.0;
    format!("{exit_tip}Please enter the number of the song<br />within {seconds} seconds")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
