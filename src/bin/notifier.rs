use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use upcoming_stream_notifier::clock::TokioClock;
use upcoming_stream_notifier::config::{AppConfig, CONFIG_PATH, Credentials};
use upcoming_stream_notifier::poller::{Cadence, Poller};
use upcoming_stream_notifier::reporter;
use upcoming_stream_notifier::seen::AnySeenStore;
use upcoming_stream_notifier::slack::SlackClient;
use upcoming_stream_notifier::youtube::YouTubeClient;

#[derive(Parser)]
#[command(
    name = "notifier",
    about = "Announce upcoming YouTube live streams to Slack"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,

    /// Persist announced ids to this file (overrides settings.seen_store)
    #[arg(long)]
    seen_store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Failed to load .env: {e}");
        }
    }

    // Credentials first: nothing touches the network without them.
    let creds = Credentials::from_env()?;

    let config = AppConfig::load(&args.config)?;
    info!("Loaded config from {}", args.config.display());

    let settings = &config.settings;
    let timeout = Duration::from_secs(settings.http_timeout_secs);
    let youtube = YouTubeClient::new(&settings.youtube_api_base, &creds.youtube_api_key, timeout)?;
    let slack = SlackClient::new(&settings.slack_api_base, &creds.slack_token, timeout)?;

    let seen_path = args.seen_store.as_deref().or(settings.seen_store.as_deref());
    let seen = AnySeenStore::from_path(seen_path)
        .with_context(|| format!("failed to open seen store {seen_path:?}"))?;

    let cadence = Cadence::from_settings(settings);
    let destination = config.slack_channel();
    info!(
        "Starting notifier — channels={} destination=#{} cadence={:?}",
        config.watch.channel_ids.len(),
        destination,
        cadence,
    );

    let mut poller = Poller::new(
        youtube,
        slack,
        seen,
        TokioClock,
        config.watch.channel_ids.clone(),
        destination,
        cadence,
    );

    if args.once {
        let report = poller.sweep().await?;
        reporter::report_sweep(&report);
        return Ok(());
    }

    info!("Entering polling loop. Press Ctrl+C to stop.");
    let sweeps = poller
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    info!("Stopped after {sweeps} sweep(s)");

    Ok(())
}
