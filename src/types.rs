use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque YouTube channel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One upcoming video returned by search, before its schedule is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub video_id: String,
    pub channel_title: String,
    pub title: String,
}

/// A newly discovered upcoming live stream with its scheduled start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub video_id: String,
    pub channel_title: String,
    pub title: String,
    pub scheduled_start: DateTime<Utc>,
}

impl EventRecord {
    pub fn from_candidate(candidate: &Candidate, scheduled_start: DateTime<Utc>) -> Self {
        Self {
            video_id: candidate.video_id.clone(),
            channel_title: candidate.channel_title.clone(),
            title: candidate.title.clone(),
            scheduled_start,
        }
    }
}

/// An event that was posted to chat.
#[derive(Debug, Clone, Serialize)]
pub struct Announcement {
    pub timestamp: String,
    pub channel_id: ChannelId,
    pub destination: String,
    pub event: EventRecord,
    pub text: String,
}

/// Counters for one pass over all channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub channels: usize,
    pub candidates: usize,
    pub skipped_seen: usize,
    pub new_events: usize,
    pub missing_details: usize,
    pub announced: usize,
    /// YouTube API requests issued (search + videos).
    pub api_calls: u64,
}
