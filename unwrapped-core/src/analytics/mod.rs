//! Analytics module for unwrapped
//!
//! Folds channel messages into an engagement rollup:
//! - Reaction tally (named breakdown + raw total)
//! - Dedup ledger guarding exactly-once accounting
//! - Aggregator owning totals, time trends and highlights
//! - Posting streak post-pass
//!
//! ```text
//! Message ──► Aggregator::fold ──► VisitedSet (skip repeats)
//!                    │
//!                    ├─► OverallMetrics
//!                    ├─► TimeTrends ──► longest_streak (on finish)
//!                    └─► TopPosts  ◄── tally(reactions)
//! ```

pub mod aggregator;
pub mod ledger;
pub mod report;
pub mod streak;
pub mod tally;

pub use aggregator::Aggregator;
pub use ledger::VisitedSet;
pub use report::{Aggregate, OverallMetrics, PostHighlight, Report, TimeTrends, TopPosts};
pub use streak::{longest_run, longest_streak, StreakPolicy};
pub use tally::{tally, ReactionTally};
