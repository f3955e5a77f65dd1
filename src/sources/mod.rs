pub mod xingzhige;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{Platform, Track};

/// 카탈로그 API가 성공 시 돌려주는 `code` 값.
pub const SUCCESS_CODE: i64 = 0;

/// 검색 요청 파라미터. 값이 없는 항목은 쿼리스트링에서 빠진다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub songid: Option<u64>,
}

impl SearchParams {
    /// 키워드 검색
    pub fn by_name(keyword: &str, count: Option<u32>) -> Self {
        Self {
            name: Some(keyword.to_string()),
            n: count,
            songid: None,
        }
    }

    /// ID로 곡 하나 조회
    pub fn by_id(id: u64) -> Self {
        Self {
            songid: Some(id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SearchData {
    List(Vec<Track>),
    Single(Box<Track>),
    /// null, 오류 문자열 등 곡 정보가 아닌 값
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "empty_data")]
    pub data: SearchData,
}

fn empty_data() -> SearchData {
    SearchData::Other(serde_json::Value::Null)
}

impl SearchData {
    /// 로그에 남길 짧은 설명
    pub fn preview(&self) -> String {
        match self {
            SearchData::List(tracks) => format!("list of {} tracks", tracks.len()),
            SearchData::Single(track) => format!("single track {}", track.summary()),
            SearchData::Other(value) => value.to_string().chars().take(200).collect(),
        }
    }
}

impl SearchResponse {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// 목록 검색 결과. 목록이 아니면 빈 목록으로 본다.
    pub fn into_tracks(self) -> Vec<Track> {
        match self.data {
            SearchData::List(tracks) => tracks,
            _ => Vec::new(),
        }
    }

    /// ID 조회 결과. `code`가 성공일 때만 곡을 돌려준다.
    pub fn into_track(self) -> Option<Track> {
        if !self.is_success() {
            return None;
        }
        match self.data {
            SearchData::Single(track) => Some(*track),
            _ => None,
        }
    }
}

/// 음악 카탈로그 API 트레이트.
/// 두 카탈로그는 같은 응답 형식을 쓰므로 플랫폼만 바꿔 호출한다.
pub trait MusicSource: Sync {
    /// 지정한 플랫폼에 검색 요청을 한 번 보낸다. 재시도나 캐시는 없다.
    fn search(&self, platform: Platform, params: &SearchParams) -> Result<SearchResponse>;

    /// 재생 가능한 음원 파일을 내려받는다.
    fn download(&self, url: &str) -> Result<Vec<u8>>;

    /// 키워드로 검색하고 결과마다 출처 플랫폼을 기록한다.
    fn search_tracks(
        &self,
        platform: Platform,
        keyword: &str,
        count: Option<u32>,
    ) -> Result<Vec<Track>> {
        let resp = self.search(platform, &SearchParams::by_name(keyword, count))?;
        if !resp.is_success() {
            debug!(%platform, code = resp.code, msg = %resp.msg, "catalog returned no results");
        } else if !matches!(resp.data, SearchData::List(_)) {
            warn!(
                %platform,
                data = %resp.data.preview(),
                "successful catalog response carried no track list"
            );
        }
        let mut tracks = resp.into_tracks();
        for track in &mut tracks {
            track.origin = Some(platform);
        }
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_skip_missing() {
        let json = serde_json::to_value(SearchParams::by_name("respire", None)).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "respire" }));

        let json = serde_json::to_value(SearchParams::by_id(42)).unwrap();
        assert_eq!(json, serde_json::json!({ "songid": 42 }));
    }

    #[test]
    fn test_list_response() {
        let resp: SearchResponse = serde_json::from_str(
            r#"{"code":0,"msg":"ok","data":[{"songname":"A","name":"x"},{"songname":"B","name":"y"}]}"#,
        )
        .unwrap();
        let tracks = resp.into_tracks();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].display_name, "B");
    }

    #[test]
    fn test_list_with_off_typed_field_keeps_every_track() {
        let resp: SearchResponse = serde_json::from_str(
            r#"{"code":0,"data":[{"songname":"A","name":"x","pay":1},{"songname":"B","name":"y"}]}"#,
        )
        .unwrap();
        let tracks = resp.into_tracks();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].pay_tier, "1");
        assert_eq!(tracks[1].display_name, "B");
    }

    struct CannedSource(&'static str);

    impl MusicSource for CannedSource {
        fn search(&self, _platform: Platform, _params: &SearchParams) -> Result<SearchResponse> {
            Ok(serde_json::from_str(self.0)?)
        }

        fn download(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_search_tracks_tags_origin() {
        let source = CannedSource(r#"{"code":0,"data":[{"songname":"A","pay":1}]}"#);
        let tracks = source.search_tracks(Platform::NetEase, "a", None).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].origin, Some(Platform::NetEase));
    }

    #[test]
    fn test_search_tracks_non_list_data_is_empty() {
        let source = CannedSource(r#"{"code":0,"msg":"ok","data":"maintenance"}"#);
        let tracks = source.search_tracks(Platform::QqMusic, "a", None).unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_data_preview() {
        let data = SearchData::Other(serde_json::json!("maintenance"));
        assert_eq!(data.preview(), "\"maintenance\"");
        let long = SearchData::Other(serde_json::json!("x".repeat(500)));
        assert_eq!(long.preview().chars().count(), 200);
        assert_eq!(SearchData::List(Vec::new()).preview(), "list of 0 tracks");
    }

    #[test]
    fn test_single_response() {
        let resp: SearchResponse = serde_json::from_str(
            r#"{"code":0,"msg":"ok","data":{"songname":"A","src":"https://cdn/a.mp3"}}"#,
        )
        .unwrap();
        let track = resp.into_track().unwrap();
        assert_eq!(track.playable_source, "https://cdn/a.mp3");
    }

    #[test]
    fn test_single_response_requires_success_code() {
        let resp: SearchResponse = serde_json::from_str(
            r#"{"code":-1,"msg":"not found","data":{"songname":"A"}}"#,
        )
        .unwrap();
        assert!(resp.into_track().is_none());
    }

    #[test]
    fn test_error_payloads() {
        let resp: SearchResponse =
            serde_json::from_str(r#"{"code":-2,"msg":"busy","data":null}"#).unwrap();
        assert!(resp.into_tracks().is_empty());

        let resp: SearchResponse =
            serde_json::from_str(r#"{"code":-2,"msg":"busy","data":"rate limited"}"#).unwrap();
        assert!(resp.into_tracks().is_empty());

        let resp: SearchResponse = serde_json::from_str(r#"{"code":-2}"#).unwrap();
        assert!(resp.into_track().is_none());
    }
}
