//! Single-writer fold of messages into running statistics.

use chrono::{DateTime, Datelike, Timelike};

use super::ledger::VisitedSet;
use super::report::{Aggregate, OverallMetrics, PostHighlight, TimeTrends, TopPosts};
use super::streak::{longest_streak, StreakPolicy};
use super::tally::tally;
use crate::types::{Message, MonthKey};

/// Owns every running counter for one analytics run.
///
/// All mutation goes through [`Aggregator::fold`]; callers that fetch
/// concurrently must funnel messages to the one task that owns this value.
#[derive(Debug, Default)]
pub struct Aggregator {
    totals: OverallMetrics,
    trends: TimeTrends,
    highlights: TopPosts,
    visited: VisitedSet,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the dedup ledger for roughly `expected_messages` posts.
    pub fn with_capacity(expected_messages: usize) -> Self {
        Self {
            visited: VisitedSet::with_capacity(expected_messages),
            ..Self::default()
        }
    }

    /// Incorporate one message.
    ///
    /// Returns `false` (and changes nothing) when the message id was already
    /// folded in this run.
    pub fn fold(&mut self, msg: &Message) -> bool {
        if self.visited.contains(msg.id) {
            return false;
        }

        PostHighlight::offer(&mut self.highlights.most_viewed, msg.id, msg.views);
        PostHighlight::offer(&mut self.highlights.most_commented, msg.id, msg.comments);

        self.totals.total_views = self.totals.total_views.saturating_add(msg.views);
        self.totals.total_comments = self.totals.total_comments.saturating_add(msg.comments);
        self.totals.total_posts = self.totals.total_posts.saturating_add(1);

        match DateTime::from_timestamp(msg.date, 0) {
            Some(published) => {
                let month = MonthKey::of(published.date_naive());
                bump(self.trends.views_by_month.entry(month).or_default(), msg.views);
                bump(self.trends.posts_by_month.entry(month).or_default(), 1);
                bump(self.trends.posts_by_hour.entry(published.hour()).or_default(), 1);
                self.trends.record_day(month, published.day());
            }
            None => {
                tracing::debug!(id = msg.id, date = msg.date, "Timestamp out of range, skipping trends");
            }
        }

        let reactions = tally(&msg.reactions);
        for (kind, count) in reactions.by_kind {
            bump(self.highlights.reactions_by_type.entry(kind).or_default(), count);
        }
        self.totals.total_reactions = self.totals.total_reactions.saturating_add(reactions.total);

        if let Some(origin) = msg.forward_from {
            bump(self.highlights.forwards_by_source.entry(origin).or_default(), 1);
            self.totals.total_forwards = self.totals.total_forwards.saturating_add(1);
        }

        self.visited.insert(msg.id);
        true
    }

    /// Number of distinct messages folded so far.
    pub fn folded(&self) -> usize {
        self.visited.len()
    }

    pub fn totals(&self) -> &OverallMetrics {
        &self.totals
    }

    pub fn trends(&self) -> &TimeTrends {
        &self.trends
    }

    pub fn highlights(&self) -> &TopPosts {
        &self.highlights
    }

    /// Close the run: compute the posting streak and hand back the counters.
    pub fn finish(self, policy: StreakPolicy) -> Aggregate {
        let mut trends = self.trends;
        trends.longest_posting_streak = longest_streak(&trends.posts_by_day, policy);
        Aggregate {
            totals: self.totals,
            trends,
            highlights: self.highlights,
        }
    }
}

/// Counters clamp at `u64::MAX`; gateway values are untrusted.
fn bump(counter: &mut u64, by: u64) {
    *counter = counter.saturating_add(by);
}
