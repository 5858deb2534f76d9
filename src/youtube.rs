use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{NotifierError, Result};
use crate::message::parse_scheduled_start;
use crate::types::{Candidate, ChannelId};

/// Read-only view of the video platform used by the poller.
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Upcoming live videos for a channel. First page only.
    async fn search_upcoming(&self, channel: &ChannelId) -> Result<Vec<Candidate>>;

    /// Scheduled start times for a video; empty when the video is gone.
    async fn scheduled_starts(&self, video_id: &str) -> Result<Vec<DateTime<Utc>>>;
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub id: SearchResultId,
    pub snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultId {
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnippet {
    pub channel_title: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub live_streaming_details: LiveStreamingDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamingDetails {
    pub scheduled_start_time: String,
}

impl From<SearchResult> for Candidate {
    fn from(item: SearchResult) -> Self {
        Candidate {
            video_id: item.id.video_id,
            channel_title: item.snippet.channel_title,
            title: item.snippet.title,
        }
    }
}

/// Decode a body, mapping shape mismatches to `Malformed`.
pub fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| NotifierError::malformed(format!("{endpoint}: {e}")))
}

// ── HTTP client ────────────────────────────────────────────────────

/// reqwest-backed YouTube Data API client.
pub struct YouTubeClient {
    http: reqwest::Client,
    search_url: Url,
    videos_url: Url,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(base: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| NotifierError::config(format!("invalid YouTube API base {base:?}: {e}")))?;
        let join = |path: &str| {
            base.join(path)
                .map_err(|e| NotifierError::config(format!("invalid YouTube API path {path}: {e}")))
        };
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            search_url: join("youtube/v3/search")?,
            videos_url: join("youtube/v3/videos")?,
            api_key: api_key.into(),
        })
    }

    async fn get_text(&self, url: &Url, query: &[(&str, &str)]) -> Result<String> {
        let resp = self
            .http
            .get(url.clone())
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl VideoPlatform for YouTubeClient {
    async fn search_upcoming(&self, channel: &ChannelId) -> Result<Vec<Candidate>> {
        debug!("search.list channel={channel}");
        let body = self
            .get_text(
                &self.search_url,
                &[
                    ("part", "snippet"),
                    ("channelId", channel.as_str()),
                    ("eventType", "upcoming"),
                    ("type", "video"),
                ],
            )
            .await?;
        let page: SearchListResponse = decode("search.list", &body)?;
        debug!("search.list channel={channel} returned {} item(s)", page.items.len());
        Ok(page.items.into_iter().map(Candidate::from).collect())
    }

    async fn scheduled_starts(&self, video_id: &str) -> Result<Vec<DateTime<Utc>>> {
        debug!("videos.list id={video_id}");
        let body = self
            .get_text(
                &self.videos_url,
                &[("part", "liveStreamingDetails"), ("id", video_id)],
            )
            .await?;
        let page: VideoListResponse = decode("videos.list", &body)?;
        page.items
            .iter()
            .map(|item| parse_scheduled_start(&item.live_streaming_details.scheduled_start_time))
            .collect()
    }
}
