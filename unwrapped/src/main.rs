//! unwrapped - Channel Year in Review CLI
//!
//! Generate a Wrapped-style engagement summary for a public broadcast channel.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use unwrapped::render::{print_json, print_terminal};
use unwrapped_core::{AnalyticsService, Config, WalkMode};

#[derive(Parser, Debug)]
#[command(name = "unwrapped")]
#[command(about = "Channel Unwrapped - engagement rollup for a public channel")]
#[command(version)]
struct Args {
    /// Channel username (with or without @)
    username: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Pagination mode: sequential or fanout
    #[arg(long)]
    mode: Option<WalkMode>,

    /// First day covered by the report (format: YYYY-MM-DD)
    #[arg(long)]
    since: Option<NaiveDate>,

    /// Skip the report cache entirely
    #[arg(long)]
    no_cache: bool,

    /// Recompute even if a cached report exists
    #[arg(long)]
    refresh: bool,

    /// Config file (default: ~/.config/unwrapped/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log debug output to stderr as well as the log file
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    if let Some(mode) = args.mode {
        config.analytics.mode = mode;
    }
    if let Some(since) = args.since {
        config.analytics.start_date = since;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    if args.verbose {
        config.logging.level = "debug".to_string();
        config.logging.console = true;
    }

    let _log_guard = unwrapped_core::logging::init(&config.logging).ok();

    config.validate().context("invalid configuration")?;

    let service =
        AnalyticsService::from_config(&config).context("failed to start analytics service")?;

    let report = service
        .report(&args.username, args.refresh)
        .await
        .with_context(|| format!("failed to build report for {}", args.username))?;

    if args.json {
        print_json(&report)?;
    } else {
        print_terminal(&report);
    }

    Ok(())
}
