//! Longest posting streak over the per-day buckets.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::MonthKey;

/// How month arrays are stitched together before scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakPolicy {
    /// Months in calendar order; a gap month breaks the run
    #[default]
    Chronological,
    /// Runs never cross a month boundary
    WithinMonth,
}

/// Longest run of consecutive days with at least one post.
pub fn longest_streak(posts_by_day: &BTreeMap<MonthKey, Vec<u64>>, policy: StreakPolicy) -> u32 {
    match policy {
        StreakPolicy::WithinMonth => posts_by_day
            .values()
            .map(|days| longest_run(days))
            .max()
            .unwrap_or(0),
        StreakPolicy::Chronological => {
            let mut best = 0;
            let mut segment: Vec<u64> = Vec::new();
            let mut previous: Option<MonthKey> = None;
            // BTreeMap iterates in MonthKey order, which is calendar order
            for (month, days) in posts_by_day {
                if previous.is_some_and(|p| p.succ() != *month) {
                    best = best.max(longest_run(&segment));
                    segment.clear();
                }
                segment.extend_from_slice(days);
                previous = Some(*month);
            }
            best.max(longest_run(&segment))
        }
    }
}

/// Two-pointer sweep for the longest contiguous run of non-zero entries.
pub fn longest_run(days: &[u64]) -> u32 {
    let mut best = 0;
    let mut left = 0;
    while left < days.len() {
        while left < days.len() && days[left] == 0 {
            left += 1;
        }
        let mut right = left;
        while right < days.len() && days[right] != 0 {
            right += 1;
        }
        best = best.max(right - left);
        left = right;
    }
    u32::try_from(best).unwrap_or(u32::MAX)
}
