use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::SettingsConfig;
use crate::error::Result;
use crate::message::format_announcement;
use crate::reporter;
use crate::seen::SeenStore;
use crate::slack::Notifier;
use crate::types::{Announcement, Candidate, ChannelId, EventRecord, SweepReport};
use crate::youtube::VideoPlatform;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// How long to wait after a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepDelay {
    Fixed(Duration),
    /// Spread the daily API unit budget evenly over the day.
    QuotaAware {
        daily_unit_limit: u64,
        units_per_call: u64,
    },
}

impl SweepDelay {
    /// Pause owed after a sweep that issued `api_calls` requests over `channels`.
    ///
    /// Quota mode assumes at least two calls per channel (one search, one
    /// detail) so quiet sweeps don't poll faster than busy ones.
    pub fn after(&self, api_calls: u64, channels: usize) -> Duration {
        match *self {
            Self::Fixed(d) => d,
            Self::QuotaAware {
                daily_unit_limit,
                units_per_call,
            } => {
                let calls = api_calls.max(2 * channels as u64);
                let units_per_day = units_per_call
                    .saturating_mul(calls)
                    .saturating_mul(SECS_PER_DAY);
                let secs = units_per_day.div_ceil(daily_unit_limit.max(1)) + 1;
                Duration::from_secs(secs)
            }
        }
    }
}

/// Throttling schedule for the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cadence {
    /// After each channel's search and announcements.
    pub channel_delay: Duration,
    /// Before each detail lookup.
    pub detail_delay: Duration,
    pub sweep_delay: SweepDelay,
}

impl Default for Cadence {
    fn default() -> Self {
        Self::from_settings(&SettingsConfig::default())
    }
}

impl Cadence {
    pub fn from_settings(settings: &SettingsConfig) -> Self {
        let sweep_delay = match settings.quota_daily_units {
            Some(limit) => SweepDelay::QuotaAware {
                daily_unit_limit: limit,
                units_per_call: settings.units_per_call,
            },
            None => SweepDelay::Fixed(Duration::from_secs(settings.sweep_interval_secs)),
        };
        Self {
            channel_delay: Duration::from_secs(settings.channel_delay_secs),
            detail_delay: Duration::from_secs(settings.detail_delay_secs),
            sweep_delay,
        }
    }
}

/// The sweep → search → filter → detail → notify loop.
///
/// Owns its seen store outright; an id is inserted before its detail lookup,
/// so a failure later in the chain never leads to a second announcement.
pub struct Poller<V, N, S, C> {
    platform: V,
    notifier: N,
    seen: S,
    clock: C,
    channels: Vec<ChannelId>,
    destination: String,
    cadence: Cadence,
}

impl<V, N, S, C> Poller<V, N, S, C>
where
    V: VideoPlatform,
    N: Notifier,
    S: SeenStore,
    C: Clock,
{
    pub fn new(
        platform: V,
        notifier: N,
        seen: S,
        clock: C,
        channels: Vec<ChannelId>,
        destination: impl Into<String>,
        cadence: Cadence,
    ) -> Self {
        Self {
            platform,
            notifier,
            seen,
            clock,
            channels,
            destination: destination.into(),
            cadence,
        }
    }

    pub fn seen(&self) -> &S {
        &self.seen
    }

    pub fn cadence(&self) -> &Cadence {
        &self.cadence
    }

    /// Sweep forever, pausing between sweeps, until `shutdown` resolves or a
    /// sweep fails. Returns the number of completed sweeps.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<u64>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut sweeps = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received after {sweeps} sweep(s)");
                    return Ok(sweeps);
                }
                result = self.cycle() => {
                    result?;
                    sweeps += 1;
                }
            }
        }
    }

    async fn cycle(&mut self) -> Result<()> {
        let report = self.sweep().await?;
        reporter::report_sweep(&report);
        let pause = self
            .cadence
            .sweep_delay
            .after(report.api_calls, self.channels.len());
        info!("Sleeping {}s until next sweep", pause.as_secs());
        self.clock.sleep(pause).await;
        Ok(())
    }

    /// One pass over every channel in configured order.
    pub async fn sweep(&mut self) -> Result<SweepReport> {
        let mut report = SweepReport {
            channels: self.channels.len(),
            ..Default::default()
        };
        info!(
            "Sweeping {} channel(s)... (seen: {} ids)",
            self.channels.len(),
            self.seen.len()
        );

        for channel in self.channels.clone() {
            self.poll_channel(&channel, &mut report).await?;
            self.clock.sleep(self.cadence.channel_delay).await;
        }

        info!(
            "Sweep done: {} candidate(s), {} new, {} announced",
            report.candidates, report.new_events, report.announced
        );
        Ok(report)
    }

    async fn poll_channel(&mut self, channel: &ChannelId, report: &mut SweepReport) -> Result<()> {
        let candidates = self.platform.search_upcoming(channel).await?;
        report.api_calls += 1;
        debug!("channel={channel}: {} upcoming", candidates.len());

        for candidate in candidates {
            report.candidates += 1;
            if self.seen.contains(&candidate.video_id) {
                debug!("skip: channel={channel} video={}", candidate.video_id);
                report.skipped_seen += 1;
                continue;
            }
            self.seen.insert(&candidate.video_id)?;
            report.new_events += 1;
            self.announce(channel, &candidate, report).await?;
        }
        Ok(())
    }

    async fn announce(
        &mut self,
        channel: &ChannelId,
        candidate: &Candidate,
        report: &mut SweepReport,
    ) -> Result<()> {
        self.clock.sleep(self.cadence.detail_delay).await;
        let starts = self.platform.scheduled_starts(&candidate.video_id).await?;
        report.api_calls += 1;

        if starts.is_empty() {
            info!(
                "No streaming details for {} (\"{}\"), not announcing",
                candidate.video_id, candidate.title
            );
            report.missing_details += 1;
            return Ok(());
        }

        for start in starts {
            let event = EventRecord::from_candidate(candidate, start);
            let text = format_announcement(&event);
            self.notifier.post(&self.destination, &text).await?;
            report.announced += 1;
            info!(
                "Announced \"{}\" from {} to #{}",
                event.title, event.channel_title, self.destination
            );
            reporter::report_announcement(&Announcement {
                timestamp: Utc::now().to_rfc3339(),
                channel_id: channel.clone(),
                destination: self.destination.clone(),
                event,
                text,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use tokio::sync::Notify;

    use crate::error::NotifierError;
    use crate::seen::MemorySeenSet;

    #[derive(Clone, Default)]
    struct FakePlatform {
        search: Arc<Mutex<HashMap<String, Vec<Candidate>>>>,
        details: Arc<Mutex<HashMap<String, Vec<DateTime<Utc>>>>>,
        calls: Arc<Mutex<Vec<String>>>,
        fail_detail: bool,
    }

    impl FakePlatform {
        fn upcoming(&self, channel: &str, candidates: Vec<Candidate>) {
            self.search
                .lock()
                .unwrap()
                .insert(channel.to_string(), candidates);
        }

        fn detail(&self, video_id: &str, starts: Vec<DateTime<Utc>>) {
            self.details
                .lock()
                .unwrap()
                .insert(video_id.to_string(), starts);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VideoPlatform for FakePlatform {
        async fn search_upcoming(&self, channel: &ChannelId) -> Result<Vec<Candidate>> {
            self.calls.lock().unwrap().push(format!("search:{channel}"));
            Ok(self
                .search
                .lock()
                .unwrap()
                .get(channel.as_str())
                .cloned()
                .unwrap_or_default())
        }

        async fn scheduled_starts(&self, video_id: &str) -> Result<Vec<DateTime<Utc>>> {
            self.calls.lock().unwrap().push(format!("detail:{video_id}"));
            if self.fail_detail {
                return Err(NotifierError::malformed("videos.list: boom"));
            }
            Ok(self
                .details
                .lock()
                .unwrap()
                .get(video_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    #[derive(Clone, Default)]
    struct FakeNotifier {
        posts: Arc<Mutex<Vec<(String, String)>>>,
        fail: bool,
    }

    impl FakeNotifier {
        fn posts(&self) -> Vec<(String, String)> {
            self.posts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn post(&self, channel: &str, text: &str) -> Result<()> {
            if self.fail {
                return Err(NotifierError::api("slack", "channel_not_found"));
            }
            self.posts
                .lock()
                .unwrap()
                .push((channel.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingClock {
        sleeps: Arc<Mutex<Vec<Duration>>>,
        /// Fires `paused` whenever a sleep of exactly this length is recorded.
        wake_at: Option<Duration>,
        paused: Arc<Notify>,
    }

    impl RecordingClock {
        fn sleeps(&self) -> Vec<u64> {
            self.sleeps.lock().unwrap().iter().map(|d| d.as_secs()).collect()
        }
    }

    #[async_trait]
    impl Clock for RecordingClock {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
            if self.wake_at == Some(duration) {
                self.paused.notify_one();
            }
        }
    }

    fn candidate(id: &str) -> Candidate {
        Candidate {
            video_id: id.to_string(),
            channel_title: "Test Channel".to_string(),
            title: format!("Stream {id}"),
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    type TestPoller = Poller<FakePlatform, FakeNotifier, MemorySeenSet, RecordingClock>;

    fn poller(
        platform: &FakePlatform,
        notifier: &FakeNotifier,
        clock: &RecordingClock,
        channels: &[&str],
    ) -> TestPoller {
        Poller::new(
            platform.clone(),
            notifier.clone(),
            MemorySeenSet::new(),
            clock.clone(),
            channels.iter().map(|c| ChannelId::from(*c)).collect(),
            "hato-bot-debug",
            Cadence::default(),
        )
    }

    // ── Sweep / Notify ─────────────────────────────────────────────

    #[tokio::test]
    async fn fresh_event_announced_once() {
        let platform = FakePlatform::default();
        let notifier = FakeNotifier::default();
        let clock = RecordingClock::default();
        platform.upcoming("UC1", vec![candidate("abc123")]);
        platform.detail("abc123", vec![start()]);

        let mut p = poller(&platform, &notifier, &clock, &["UC1"]);
        let report = p.sweep().await.unwrap();

        let posts = notifier.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "hato-bot-debug");
        assert!(posts[0].1.contains("Test Channel"));
        assert!(posts[0].1.contains("Stream abc123"));
        assert!(posts[0].1.contains("2024年06月01日 (土) 19時00分00秒"));
        assert_eq!(report.announced, 1);
        assert_eq!(report.new_events, 1);
        assert_eq!(report.api_calls, 2);
        assert!(p.seen().contains("abc123"));
    }

    #[tokio::test]
    async fn repeated_event_across_sweeps_announced_once() {
        let platform = FakePlatform::default();
        let notifier = FakeNotifier::default();
        let clock = RecordingClock::default();
        platform.upcoming("UC1", vec![candidate("abc123")]);
        platform.detail("abc123", vec![start()]);

        let mut p = poller(&platform, &notifier, &clock, &["UC1"]);
        p.sweep().await.unwrap();
        let second = p.sweep().await.unwrap();
        p.sweep().await.unwrap();

        assert_eq!(notifier.posts().len(), 1);
        assert_eq!(second.skipped_seen, 1);
        assert_eq!(second.api_calls, 1);
        let detail_calls = platform
            .calls()
            .iter()
            .filter(|c| c.starts_with("detail:"))
            .count();
        assert_eq!(detail_calls, 1);
    }

    #[tokio::test]
    async fn same_event_under_two_channels_announced_once() {
        let platform = FakePlatform::default();
        let notifier = FakeNotifier::default();
        let clock = RecordingClock::default();
        platform.upcoming("UC1", vec![candidate("collab")]);
        platform.upcoming("UC2", vec![candidate("collab")]);
        platform.detail("collab", vec![start()]);

        let mut p = poller(&platform, &notifier, &clock, &["UC1", "UC2"]);
        let report = p.sweep().await.unwrap();

        assert_eq!(notifier.posts().len(), 1);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.skipped_seen, 1);
    }

    #[tokio::test]
    async fn empty_detail_is_silent() {
        let platform = FakePlatform::default();
        let notifier = FakeNotifier::default();
        let clock = RecordingClock::default();
        platform.upcoming("UC1", vec![candidate("gone")]);

        let mut p = poller(&platform, &notifier, &clock, &["UC1"]);
        let report = p.sweep().await.unwrap();

        assert!(notifier.posts().is_empty());
        assert_eq!(report.missing_details, 1);
        assert!(p.seen().contains("gone"));
    }

    #[tokio::test]
    async fn failed_detail_still_marks_seen() {
        let platform = FakePlatform {
            fail_detail: true,
            ..Default::default()
        };
        let notifier = FakeNotifier::default();
        let clock = RecordingClock::default();
        platform.upcoming("UC1", vec![candidate("abc123")]);

        let mut p = poller(&platform, &notifier, &clock, &["UC1"]);
        let err = p.sweep().await.unwrap_err();
        assert!(matches!(err, NotifierError::Malformed(_)));
        assert!(p.seen().contains("abc123"));

        // The next sweep skips it without another detail call.
        let report = p.sweep().await.unwrap();
        assert_eq!(report.skipped_seen, 1);
        assert_eq!(
            platform.calls(),
            vec!["search:UC1", "detail:abc123", "search:UC1"]
        );
        assert!(notifier.posts().is_empty());
    }

    #[tokio::test]
    async fn failed_notify_propagates_and_is_not_retried() {
        let platform = FakePlatform::default();
        let notifier = FakeNotifier {
            fail: true,
            ..Default::default()
        };
        let clock = RecordingClock::default();
        platform.upcoming("UC1", vec![candidate("abc123")]);
        platform.detail("abc123", vec![start()]);

        let mut p = poller(&platform, &notifier, &clock, &["UC1"]);
        let err = p.sweep().await.unwrap_err();
        assert!(matches!(err, NotifierError::Api { .. }));

        let report = p.sweep().await.unwrap();
        assert_eq!(report.skipped_seen, 1);
        assert_eq!(report.announced, 0);
    }

    // ── Cadence ────────────────────────────────────────────────────

    #[tokio::test]
    async fn sleeps_follow_cadence() {
        let platform = FakePlatform::default();
        let notifier = FakeNotifier::default();
        let clock = RecordingClock::default();
        platform.upcoming("UC1", vec![candidate("a"), candidate("b")]);
        platform.detail("a", vec![start()]);
        platform.detail("b", vec![start()]);

        let mut p = poller(&platform, &notifier, &clock, &["UC1", "UC2"]);
        p.sweep().await.unwrap();

        // detail(a), detail(b), after UC1, after UC2
        assert_eq!(clock.sleeps(), vec![1, 1, 1, 1]);
        assert_eq!(
            platform.calls(),
            vec!["search:UC1", "detail:a", "detail:b", "search:UC2"]
        );
    }

    #[tokio::test]
    async fn run_until_stops_on_shutdown() {
        let platform = FakePlatform::default();
        let notifier = FakeNotifier::default();
        let clock = RecordingClock::default();

        let mut p = poller(&platform, &notifier, &clock, &["UC1"]);
        let sweeps = p.run_until(std::future::ready(())).await.unwrap();
        assert_eq!(sweeps, 0);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn run_until_pauses_after_each_sweep() {
        let platform = FakePlatform::default();
        let notifier = FakeNotifier::default();
        let clock = RecordingClock {
            wake_at: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let paused = clock.paused.clone();

        let mut p = poller(&platform, &notifier, &clock, &["UC1"]);
        let sweeps = p.run_until(paused.notified()).await.unwrap();

        assert_eq!(sweeps, 1);
        // after UC1, then the sweep pause
        assert_eq!(clock.sleeps(), vec![1, 60]);
        assert_eq!(platform.calls(), vec!["search:UC1"]);
    }

    #[tokio::test]
    async fn run_until_propagates_sweep_error() {
        let platform = FakePlatform {
            fail_detail: true,
            ..Default::default()
        };
        let notifier = FakeNotifier::default();
        let clock = RecordingClock::default();
        platform.upcoming("UC1", vec![candidate("x")]);

        let mut p = poller(&platform, &notifier, &clock, &["UC1"]);
        let result = p.run_until(std::future::pending()).await;
        assert!(result.is_err());
    }

    #[test]
    fn fixed_sweep_delay() {
        let delay = SweepDelay::Fixed(Duration::from_secs(60));
        assert_eq!(delay.after(0, 10), Duration::from_secs(60));
        assert_eq!(delay.after(500, 10), Duration::from_secs(60));
    }

    #[test]
    fn quota_sweep_delay_uses_floor_of_two_calls_per_channel() {
        let delay = SweepDelay::QuotaAware {
            daily_unit_limit: 10_000,
            units_per_call: 3,
        };
        // 10 channels → at least 20 calls: 3 * 20 * 86400 / 10000 = 518.4 → 519 + 1
        assert_eq!(delay.after(10, 10), Duration::from_secs(520));
        assert_eq!(delay.after(20, 10), Duration::from_secs(520));
        // 40 calls: 1036.8 → 1037 + 1
        assert_eq!(delay.after(40, 10), Duration::from_secs(1038));
    }

    #[test]
    fn quota_sweep_delay_saturates_instead_of_overflowing() {
        let delay = SweepDelay::QuotaAware {
            daily_unit_limit: 10_000,
            units_per_call: 1_000_000_000_000_000,
        };
        assert_eq!(
            delay.after(20, 10),
            Duration::from_secs(u64::MAX.div_ceil(10_000) + 1)
        );
    }

    #[test]
    fn cadence_from_settings() {
        let settings = SettingsConfig {
            channel_delay_secs: 2,
            quota_daily_units: Some(10_000),
            ..Default::default()
        };
        let cadence = Cadence::from_settings(&settings);
        assert_eq!(cadence.channel_delay, Duration::from_secs(2));
        assert_eq!(cadence.detail_delay, Duration::from_secs(1));
        assert_eq!(
            cadence.sweep_delay,
            SweepDelay::QuotaAware {
                daily_unit_limit: 10_000,
                units_per_call: 3
            }
        );
        assert_eq!(
            Cadence::default().sweep_delay,
            SweepDelay::Fixed(Duration::from_secs(60))
        );
    }
}
