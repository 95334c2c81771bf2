//! # unwrapped-core
//!
//! Core library for unwrapped - a year-in-review engagement report for
//! public broadcast channels.
//!
//! This library provides:
//! - Domain types for channels, messages and reactions
//! - The incremental aggregator and posting streak post-pass
//! - A history walker with sequential and fan-out pagination
//! - An HTTP gateway client, profile image storage and a SQLite report cache
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! ```text
//! AnalyticsService (cache-aside)
//!   └─ AnalyticsEngine
//!        ├─ Authenticator / ChannelDirectory   (GatewayClient)
//!        ├─ HistoryWalker ──► MessageSource     (GatewayClient)
//!        │     └─ Aggregator::fold (single writer)
//!        └─ ProfileStore                        (FsProfileStore)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use unwrapped_core::{AnalyticsService, Config};
//!
//! # async fn run() -> unwrapped_core::Result<()> {
//! let config = Config::load()?;
//! config.validate()?;
//!
//! let service = AnalyticsService::from_config(&config)?;
//! let report = service.report("@rustlang", false).await?;
//! println!("{} posts", report.totals.total_posts);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{Aggregator, Report, StreakPolicy};
pub use cache::{ReportCache, SqliteReportCache};
pub use config::Config;
pub use engine::{AnalyticsEngine, EngineSettings};
pub use error::{Error, FetchError, Result};
pub use history::{HistoryWalker, WalkMode, WalkSettings, WalkStats};
pub use profile::{FsProfileStore, ProfileStore};
pub use service::{normalize_username, AnalyticsService};
pub use types::*;

// Public modules
pub mod analytics;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod logging;
pub mod profile;
pub mod service;
pub mod source;
pub mod types;
