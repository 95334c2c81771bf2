//! End-to-end runs of the engine against an in-memory platform.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use unwrapped_core::history::RetryPolicy;
use unwrapped_core::source::{Authenticator, ChannelDirectory, HistoryRequest, MessageSource};
use unwrapped_core::{
    AnalyticsEngine, Channel, EngineSettings, Error, FetchError, Message, MonthKey, ReactionKind,
    Result, StreakPolicy, WalkMode, WalkSettings,
};

/// A channel with a fixed history that pages strictly older than the cursor.
struct FakeChannel {
    /// Newest first
    history: Vec<Message>,
    fetches: AtomicUsize,
    failures: Mutex<Vec<FetchError>>,
}

impl FakeChannel {
    fn new(mut history: Vec<Message>) -> Arc<Self> {
        history.sort_by(|a, b| (b.date, b.id).cmp(&(a.date, a.id)));
        Arc::new(Self {
            history,
            fetches: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
        })
    }

    fn fail_next(&self, failure: FetchError) {
        self.failures.lock().unwrap().push(failure);
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for FakeChannel {
    async fn ensure_authenticated(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ChannelDirectory for FakeChannel {
    async fn resolve_channel(&self, username: &str) -> Result<Channel> {
        if username != "rustlang" {
            return Err(Error::ChannelNotFound(username.to_string()));
        }
        Ok(Channel {
            id: 1001,
            access_hash: 99,
            title: "Rust Language".to_string(),
            username: "rustlang".to_string(),
            has_photo: false,
        })
    }

    async fn download_profile_photo(&self, _channel: &Channel) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

#[async_trait]
impl MessageSource for FakeChannel {
    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> std::result::Result<Vec<Message>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failures.lock().unwrap().pop() {
            return Err(failure);
        }
        assert_eq!(request.peer.id, 1001);
        assert_eq!(request.peer.access_hash, 99);

        let bound = (request.offset_date, request.offset_id);
        Ok(self
            .history
            .iter()
            .filter(|m| {
                if request.offset_id == 0 {
                    m.date < request.offset_date
                } else {
                    (m.date, m.id) < bound
                }
            })
            .take(request.limit)
            .cloned()
            .collect())
    }
}

fn ts(month: u32, day: u32, hour: u32) -> i64 {
    Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0)
        .unwrap()
        .timestamp()
}

fn window_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap()
}

fn walk_settings(page_size: usize) -> WalkSettings {
    WalkSettings {
        window_start: window_start().timestamp(),
        page_size,
        retry: RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(1),
            max_rate_limit_wait: Duration::from_millis(10),
        },
        workers: 4,
        slice: Duration::from_secs(7 * 86_400),
    }
}

fn engine(channel: Arc<FakeChannel>, page_size: usize, mode: WalkMode) -> AnalyticsEngine {
    AnalyticsEngine::new(
        channel.clone(),
        channel.clone(),
        channel,
        None,
        walk_settings(page_size),
        EngineSettings {
            mode,
            streak: StreakPolicy::Chronological,
            ..EngineSettings::default()
        },
    )
}

/// One post every `step` hours going back from `newest`.
fn cadence(count: i64, newest: i64, step: i64) -> Vec<Message> {
    (0..count)
        .map(|i| {
            let id = count - i;
            let mut msg = Message::new(id, newest - i * step * 3600)
                .with_views(100 + (id as u64 % 7))
                .with_comments(id as u64 % 3);
            if id % 5 == 0 {
                msg = msg.with_reaction(ReactionKind::emoji("👍"), 2);
            }
            if id % 11 == 0 {
                msg = msg.forwarded_from(4242);
            }
            msg
        })
        .collect()
}

#[tokio::test]
async fn test_three_posts_end_to_end() {
    let channel = FakeChannel::new(vec![
        Message::new(1, ts(1, 3, 10)).with_views(10),
        Message::new(2, ts(1, 4, 10)).with_views(10),
        Message::new(3, ts(1, 6, 10)).with_views(10),
    ]);
    let engine = engine(channel, 100, WalkMode::Sequential);

    let report = engine.process_analytics_at("rustlang", now()).await.unwrap();

    let january = MonthKey::new(2025, 1).unwrap();
    assert_eq!(report.totals.total_views, 30);
    assert_eq!(report.totals.total_posts, 3);
    assert_eq!(report.trends.posts_by_month[&january], 3);
    assert_eq!(report.trends.longest_posting_streak, 2);
    // Newest first: the Jan 6 post is folded first and keeps the tie
    assert_eq!(report.highlights.most_viewed.map(|p| p.id), Some(3));
    assert_eq!(report.channel_name, "Rust Language");
    assert_eq!(report.window_start, window_start());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["trends"]["posts_by_month"]["2025-January"], 3);
}

#[tokio::test]
async fn test_pagination_stops_at_window_start() {
    // 250 posts in 2025, then 2024 history that must never be requested
    let mut history = cadence(250, ts(12, 30, 12), 24);
    history.extend(
        (0..300).map(|i| Message::new(-i - 1, window_start().timestamp() - 3600 * (i + 1))),
    );
    let channel = FakeChannel::new(history);
    let engine = engine(channel.clone(), 100, WalkMode::Sequential);

    let report = engine.process_analytics_at("rustlang", now()).await.unwrap();

    assert_eq!(channel.fetches(), 3);
    assert_eq!(report.totals.total_posts, 250);
}

#[tokio::test]
async fn test_fanout_totals_match_sequential() {
    unwrapped_core::logging::init_test();
    let history = cadence(600, ts(12, 30, 12), 13);

    let sequential = engine(FakeChannel::new(history.clone()), 50, WalkMode::Sequential)
        .process_analytics_at("rustlang", now())
        .await
        .unwrap();
    let fanout = engine(FakeChannel::new(history), 50, WalkMode::FanOut)
        .process_analytics_at("rustlang", now())
        .await
        .unwrap();

    assert_eq!(fanout.totals, sequential.totals);
    assert_eq!(fanout.trends, sequential.trends);
    assert_eq!(
        fanout.highlights.reactions_by_type,
        sequential.highlights.reactions_by_type
    );
    assert_eq!(
        fanout.highlights.forwards_by_source,
        sequential.highlights.forwards_by_source
    );
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let channel = FakeChannel::new(cadence(120, ts(6, 1, 0), 24));
    channel.fail_next(FetchError::Transient("connection reset".to_string()));
    channel.fail_next(FetchError::RateLimited {
        retry_after: Some(Duration::from_millis(2)),
    });
    let engine = engine(channel.clone(), 100, WalkMode::Sequential);

    let report = engine.process_analytics_at("rustlang", now()).await.unwrap();

    assert_eq!(report.totals.total_posts, 120);
    assert_eq!(channel.fetches(), 4);
}

#[tokio::test]
async fn test_fatal_fetch_aborts_run() {
    let channel = FakeChannel::new(cadence(10, ts(6, 1, 0), 24));
    channel.fail_next(FetchError::Fatal("CHANNEL_PRIVATE".to_string()));
    let engine = engine(channel.clone(), 100, WalkMode::Sequential);

    let err = engine
        .process_analytics_at("rustlang", now())
        .await
        .unwrap_err();

    assert!(err.is_fetch_failure());
    assert_eq!(
        err.to_string(),
        "walk history [channel=rustlang]: fatal fetch failure: CHANNEL_PRIVATE"
    );
    assert_eq!(channel.fetches(), 1);
}

#[tokio::test]
async fn test_unknown_channel() {
    let engine = engine(FakeChannel::new(Vec::new()), 100, WalkMode::Sequential);
    let err = engine
        .process_analytics_at("ghost", now())
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::ChannelNotFound(name) if name == "ghost"));
}
