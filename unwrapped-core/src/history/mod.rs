//! Backward pagination over a channel's history
//!
//! The walker pulls pages from a [`MessageSource`] newest-first and hands
//! every in-window message to the [`Aggregator`]. Two modes:
//!
//! - **Sequential**: one cursor, one request at a time. Retry exhaustion
//!   aborts the walk.
//! - **Fan-out**: batches of workers, each covering a disjoint time slice
//!   counted back from "now". Pages go through a bounded channel to the one
//!   task that owns the aggregator. A worker that runs out of retries loses
//!   its slice; the walk continues.
//!
//! ```text
//! now ──────────────────────────────────────────► window_start
//!  │ slice 0 │ slice 1 │ slice 2 │ ... │ slice n │
//!   worker 0  worker 1  worker 2        (clipped)
//! ```

mod fanout;
mod retry;
mod sequential;

pub use retry::{fetch_with_retry, RetryPolicy};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analytics::Aggregator;
use crate::error::Result;
use crate::source::MessageSource;
use crate::types::{ChannelPeer, Message};

/// How the walker schedules requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkMode {
    #[default]
    Sequential,
    #[serde(rename = "fanout", alias = "fan_out")]
    FanOut,
}

impl fmt::Display for WalkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkMode::Sequential => f.write_str("sequential"),
            WalkMode::FanOut => f.write_str("fanout"),
        }
    }
}

impl FromStr for WalkMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(WalkMode::Sequential),
            "fanout" | "fan_out" | "fan-out" => Ok(WalkMode::FanOut),
            other => Err(format!("unknown walk mode {:?} (expected sequential or fanout)", other)),
        }
    }
}

/// Tunables for one walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkSettings {
    /// Messages dated at or before this instant (epoch seconds) are never folded
    pub window_start: i64,
    /// Messages requested per call
    pub page_size: usize,
    pub retry: RetryPolicy,
    /// Fan-out workers per batch
    pub workers: usize,
    /// Fan-out slice width
    pub slice: Duration,
}

impl Default for WalkSettings {
    fn default() -> Self {
        Self {
            // 2025-01-01T00:00:00Z
            window_start: 1_735_689_600,
            page_size: 100,
            retry: RetryPolicy::default(),
            workers: 16,
            slice: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

/// Position in history: requests ask for messages strictly older than this.
///
/// Orders by date, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor {
    pub date: i64,
    pub id: i64,
}

impl Cursor {
    /// Cursor whose first page includes messages dated exactly `upper`.
    pub fn open(upper: i64) -> Self {
        Self {
            date: upper.saturating_add(1),
            id: 0,
        }
    }

    pub fn of(msg: &Message) -> Self {
        Self {
            date: msg.date,
            id: msg.id,
        }
    }
}

/// Counters reported at the end of every walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Successful history calls
    pub pages: usize,
    /// Messages that changed the aggregate
    pub folded: usize,
    /// Messages dropped by the dedup ledger
    pub duplicates: usize,
    /// Messages at or before the window start
    pub out_of_window: usize,
    /// Fan-out slices abandoned after retry exhaustion
    pub skipped_slices: usize,
}

/// Drives pagination for one channel.
pub struct HistoryWalker {
    source: Arc<dyn MessageSource>,
    settings: WalkSettings,
}

impl HistoryWalker {
    pub fn new(source: Arc<dyn MessageSource>, settings: WalkSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &WalkSettings {
        &self.settings
    }

    /// Walk from `now` back to the window start in the given mode.
    pub async fn walk(
        &self,
        mode: WalkMode,
        peer: ChannelPeer,
        mut aggregator: Aggregator,
        now: i64,
    ) -> Result<(Aggregator, WalkStats)> {
        let stats = match mode {
            WalkMode::Sequential => self.walk_sequential(peer, &mut aggregator, now).await?,
            WalkMode::FanOut => {
                let (folded_into, stats) = self.walk_fanout(peer, aggregator, now).await?;
                aggregator = folded_into;
                stats
            }
        };

        tracing::info!(
            mode = %mode,
            channel_id = peer.id,
            pages = stats.pages,
            folded = stats.folded,
            duplicates = stats.duplicates,
            out_of_window = stats.out_of_window,
            skipped_slices = stats.skipped_slices,
            "History walk finished"
        );
        Ok((aggregator, stats))
    }
}

/// Drop the leading element when it repeats the previous page's anchor.
fn strip_anchor(page: &[Message], anchor: Option<i64>) -> &[Message] {
    match (page.first(), anchor) {
        (Some(first), Some(id)) if first.id == id => &page[1..],
        _ => page,
    }
}

/// Oldest position covered by a page.
fn oldest(page: &[Message]) -> Option<Cursor> {
    page.iter().map(Cursor::of).min()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::FetchError;
    use crate::source::{HistoryRequest, MessageSource};
    use crate::types::Message;

    /// In-memory history honouring the strictly-older-than cursor contract.
    pub struct ScriptedSource {
        /// Newest first
        messages: Vec<Message>,
        failures: Mutex<VecDeque<FetchError>>,
        calls: AtomicUsize,
        /// Repeat the anchor at the head of every continuation page
        inclusive: bool,
    }

    impl ScriptedSource {
        pub fn new(mut messages: Vec<Message>) -> Self {
            messages.sort_by(|a, b| (b.date, b.id).cmp(&(a.date, a.id)));
            Self {
                messages,
                failures: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                inclusive: false,
            }
        }

        pub fn inclusive(mut self) -> Self {
            self.inclusive = true;
            self
        }

        /// Queue failures returned by the next calls, in order.
        pub fn failing_with(self, failures: impl IntoIterator<Item = FetchError>) -> Self {
            self.failures.lock().unwrap().extend(failures);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MessageSource for ScriptedSource {
        async fn fetch_history(
            &self,
            request: &HistoryRequest,
        ) -> Result<Vec<Message>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(failure) = self.failures.lock().unwrap().pop_front() {
                return Err(failure);
            }

            let bound = (request.offset_date, request.offset_id);
            let older = |m: &&Message| {
                if request.offset_id == 0 {
                    m.date < request.offset_date
                } else if self.inclusive {
                    (m.date, m.id) <= bound
                } else {
                    (m.date, m.id) < bound
                }
            };
            Ok(self
                .messages
                .iter()
                .filter(older)
                .take(request.limit)
                .cloned()
                .collect())
        }
    }

    /// `count` messages one hour apart, newest at `newest`.
    pub fn hourly(count: i64, newest: i64) -> Vec<Message> {
        (0..count)
            .map(|i| Message::new(count - i, newest - i * 3600).with_views(10))
            .collect()
    }
}
