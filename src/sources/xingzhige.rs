use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::Platform;
use crate::sources::{MusicSource, SearchParams, SearchResponse};

/// xingzhige.com 음악 API 클라이언트.
/// QQ Music과 NetEase Music 검색을 같은 응답 형식으로 제공한다.
pub struct XingzhigeClient {
    client: reqwest::blocking::Client,
}

impl XingzhigeClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build the HTTP client")?;

        Ok(Self { client })
    }
}

impl MusicSource for XingzhigeClient {
    fn search(&self, platform: Platform, params: &SearchParams) -> Result<SearchResponse> {
        debug!(%platform, ?params, "catalog request");

        let resp: SearchResponse = self
            .client
            .get(platform.api_base())
            .query(params)
            .send()
            .with_context(|| format!("{platform} request failed"))?
            .error_for_status()
            .with_context(|| format!("{platform} returned an error status"))?
            .json()
            .with_context(|| format!("failed to parse the {platform} response"))?;

        debug!(%platform, code = resp.code, msg = %resp.msg, "catalog response");
        Ok(resp)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let data = self
            .client
            .get(url)
            .send()
            .context("failed to download the audio source")?
            .error_for_status()?
            .bytes()?
            .to_vec();

        debug!(bytes = data.len(), "audio source downloaded");
        Ok(data)
    }
}
