pub mod clock;
pub mod config;
pub mod error;
pub mod message;
pub mod poller;
pub mod reporter;
pub mod seen;
pub mod slack;
pub mod types;
pub mod youtube;

pub use error::{NotifierError, Result};

/// YouTube Data API base URL (search.list / videos.list live under /youtube/v3)
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com";

/// Slack Web API base URL (chat.postMessage lives under /api)
pub const SLACK_API_BASE: &str = "https://slack.com";

/// Watch page prefix; the event identifier is appended.
pub const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// Chat channel announcements go to when nothing else is configured.
pub const DEFAULT_SLACK_CHANNEL: &str = "hato-bot-debug";
