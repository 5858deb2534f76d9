//! Probe: YouTube upcoming-stream search + live-streaming details
//!
//! Hits search.list (eventType=upcoming) for one channel and videos.list
//! (part=liveStreamingDetails) for each result, and documents:
//! - Response shape and fields
//! - Latency per request
//! - Whether a next page exists (the notifier only reads page one)
//! - How each scheduledStartTime renders in the announcement

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use upcoming_stream_notifier::YOUTUBE_API_BASE;
use upcoming_stream_notifier::config::YOUTUBE_KEY_VAR;
use upcoming_stream_notifier::message::{format_start_time, parse_scheduled_start};

#[derive(Parser)]
#[command(name = "probe_upcoming", about = "Dump raw upcoming-stream API responses")]
struct Cli {
    /// Channel to search
    #[arg(long)]
    channel_id: String,

    /// API base URL (point at a mock server for offline checks)
    #[arg(long, default_value = YOUTUBE_API_BASE)]
    api_base: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let key = std::env::var(YOUTUBE_KEY_VAR)
        .with_context(|| format!("{YOUTUBE_KEY_VAR} must be set"))?;

    let client = reqwest::Client::new();
    let base = cli.api_base.trim_end_matches('/');

    println!("=== Probe: upcoming streams ===");
    println!("Channel: {}", cli.channel_id);
    println!();

    // 1. search.list
    println!("--- 1. search.list (eventType=upcoming) ---");
    let start = Instant::now();
    let resp = client
        .get(format!("{base}/youtube/v3/search"))
        .query(&[
            ("part", "snippet"),
            ("channelId", cli.channel_id.as_str()),
            ("eventType", "upcoming"),
            ("type", "video"),
            ("key", key.as_str()),
        ])
        .send()
        .await?;
    let latency = start.elapsed();
    let status = resp.status();
    let body: Value = resp.json().await?;
    println!("Status: {}", status);
    println!("Latency: {:?}", latency);
    println!(
        "Next page: {}",
        body.get("nextPageToken").and_then(Value::as_str).unwrap_or("<none>")
    );

    let items = body
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    println!("Item count: {}", items.len());
    if let Some(first) = items.first() {
        println!("\nSample item (first):");
        println!("{}", serde_json::to_string_pretty(first)?);
    }
    println!();

    // 2. videos.list for each result
    println!("--- 2. videos.list (part=liveStreamingDetails) ---");
    for item in &items {
        let Some(video_id) = item.pointer("/id/videoId").and_then(Value::as_str) else {
            println!("Item without id.videoId, skipping");
            continue;
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        let start = Instant::now();
        let resp = client
            .get(format!("{base}/youtube/v3/videos"))
            .query(&[
                ("part", "liveStreamingDetails"),
                ("id", video_id),
                ("key", key.as_str()),
            ])
            .send()
            .await?;
        let latency = start.elapsed();
        let body: Value = resp.json().await?;
        let scheduled = body
            .pointer("/items/0/liveStreamingDetails/scheduledStartTime")
            .and_then(Value::as_str);

        match scheduled {
            Some(raw) => {
                let rendered = parse_scheduled_start(raw)
                    .map(format_start_time)
                    .unwrap_or_else(|e| format!("<unparsable: {e}>"));
                println!("{video_id}: {raw} → {rendered} (latency: {:?})", latency);
            }
            None => {
                println!("{video_id}: no liveStreamingDetails (latency: {:?})", latency);
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        }
    }

    println!("\n=== Done ===");
    Ok(())
}
