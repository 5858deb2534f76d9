use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{NotifierError, Result};

/// Outbound chat sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, channel: &str, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Bot-token Slack Web API client.
pub struct SlackClient {
    http: reqwest::Client,
    post_url: Url,
    token: String,
}

impl SlackClient {
    pub fn new(base: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let post_url = Url::parse(base)
            .and_then(|b| b.join("api/chat.postMessage"))
            .map_err(|e| NotifierError::config(format!("invalid Slack API base {base:?}: {e}")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            post_url,
            token: token.into(),
        })
    }
}

#[async_trait]
impl Notifier for SlackClient {
    async fn post(&self, channel: &str, text: &str) -> Result<()> {
        debug!("chat.postMessage channel={channel}");
        let resp = self
            .http
            .post(self.post_url.clone())
            .bearer_auth(&self.token)
            .json(&PostMessageRequest { channel, text })
            .send()
            .await?
            .error_for_status()?;
        let body: PostMessageResponse = resp
            .json()
            .await
            .map_err(|e| NotifierError::malformed(format!("chat.postMessage: {e}")))?;
        check_envelope(body)
    }
}

// Slack reports failures as HTTP 200 with `ok: false`.
fn check_envelope(body: PostMessageResponse) -> Result<()> {
    if body.ok {
        Ok(())
    } else {
        Err(NotifierError::api(
            "slack",
            body.error.unwrap_or_else(|| "unknown_error".to_string()),
        ))
    }
}
