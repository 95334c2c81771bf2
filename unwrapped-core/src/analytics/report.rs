//! The report model: totals, time trends, highlights.
//!
//! One canonical shape, serialized as-is into the cache and the HTTP response.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Channel, MonthKey};

/// Channel-wide counters. Only ever incremented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub total_views: u64,
    pub total_comments: u64,
    /// Includes reactions whose kind cannot be named
    pub total_reactions: u64,
    pub total_posts: u64,
    pub total_forwards: u64,
}

impl OverallMetrics {
    /// Mean views per post, 0 for an empty channel.
    pub fn average_views(&self) -> f64 {
        if self.total_posts == 0 {
            0.0
        } else {
            self.total_views as f64 / self.total_posts as f64
        }
    }
}

/// Posting cadence and views over the calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTrends {
    pub views_by_month: BTreeMap<MonthKey, u64>,
    pub posts_by_month: BTreeMap<MonthKey, u64>,
    /// Hour of day (UTC, 0-23) to post count
    pub posts_by_hour: BTreeMap<u32, u64>,
    /// Per-day-of-month post counts, one slot per calendar day of that month
    pub posts_by_day: BTreeMap<MonthKey, Vec<u64>>,
    pub longest_posting_streak: u32,
}

impl TimeTrends {
    /// Count one post on `day` (1-based) of `month`.
    ///
    /// The month's array is allocated on first use with exactly
    /// `month.days()` slots and never resized. Days outside that range are
    /// ignored.
    pub fn record_day(&mut self, month: MonthKey, day: u32) {
        let slots = self
            .posts_by_day
            .entry(month)
            .or_insert_with(|| vec![0; month.days() as usize]);
        if let Some(slot) = day
            .checked_sub(1)
            .and_then(|idx| slots.get_mut(idx as usize))
        {
            *slot = slot.saturating_add(1);
        }
    }

    /// Hour with the most posts; the earliest hour wins ties.
    pub fn peak_hour(&self) -> Option<u32> {
        self.posts_by_hour
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(hour, _)| *hour)
    }

    /// Month with the most posts; the earliest month wins ties.
    pub fn busiest_month(&self) -> Option<(MonthKey, u64)> {
        self.posts_by_month
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(month, posts)| (*month, *posts))
    }

    /// Number of calendar days with at least one post.
    pub fn active_days(&self) -> usize {
        self.posts_by_day
            .values()
            .flat_map(|days| days.iter())
            .filter(|&&count| count > 0)
            .count()
    }

    /// Format an hour bucket for display (e.g., "9pm–10pm").
    pub fn hour_display(hour: u32) -> String {
        let fmt = |h: u32| match h % 24 {
            0 => "12am".to_string(),
            h @ 1..=11 => format!("{}am", h),
            12 => "12pm".to_string(),
            h => format!("{}pm", h - 12),
        };
        format!("{}–{}", fmt(hour), fmt(hour + 1))
    }
}

/// A post pinned by an extremum tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostHighlight {
    pub id: i64,
    pub count: u64,
}

impl PostHighlight {
    /// Offer a candidate to a running "best so far" slot.
    ///
    /// An empty slot takes the first candidate; afterwards only a strictly
    /// greater count replaces it, so the earlier post keeps ties.
    pub fn offer(slot: &mut Option<Self>, id: i64, count: u64) {
        match slot {
            Some(best) if count <= best.count => {}
            _ => *slot = Some(Self { id, count }),
        }
    }
}

/// Standout posts and breakdowns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPosts {
    pub most_viewed: Option<PostHighlight>,
    pub most_commented: Option<PostHighlight>,
    /// Origin channel id to number of forwarded posts
    pub forwards_by_source: BTreeMap<i64, u64>,
    /// Emoji to cumulative count across all posts
    pub reactions_by_type: BTreeMap<String, u64>,
}

impl TopPosts {
    /// Most used reactions, highest first.
    pub fn top_reactions(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .reactions_by_type
            .iter()
            .map(|(kind, count)| (kind.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Channels forwarded from most often, highest first.
    pub fn top_forward_sources(&self, n: usize) -> Vec<(i64, u64)> {
        let mut ranked: Vec<(i64, u64)> = self
            .forwards_by_source
            .iter()
            .map(|(source, count)| (*source, *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Output of one completed fold pass, before channel metadata is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub totals: OverallMetrics,
    pub trends: TimeTrends,
    pub highlights: TopPosts,
}

/// Complete engagement rollup for one channel.
///
/// Created once per finished run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub channel_name: String,
    pub channel_username: String,
    /// Where the profile image can be fetched, if it was published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_profile: Option<String>,
    /// Oldest instant the rollup covers (exclusive)
    pub window_start: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub totals: OverallMetrics,
    pub trends: TimeTrends,
    pub highlights: TopPosts,
}

impl Report {
    pub fn assemble(
        channel: &Channel,
        channel_profile: Option<String>,
        aggregate: Aggregate,
        window_start: DateTime<Utc>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            channel_name: channel.title.clone(),
            channel_username: channel.username.clone(),
            channel_profile,
            window_start,
            generated_at,
            totals: aggregate.totals,
            trends: aggregate.trends,
            highlights: aggregate.highlights,
        }
    }
}
