//! Terminal and JSON rendering of a finished report.

use std::fmt::Write;

use unwrapped_core::analytics::TimeTrends;
use unwrapped_core::Report;

const WIDTH: usize = 60;

/// Human-readable summary for the terminal.
pub fn render_terminal(report: &Report) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_terminal(&mut out, report);
    out
}

fn write_terminal(out: &mut String, report: &Report) -> std::fmt::Result {
    let title = format!("📣 {} UNWRAPPED 📣", report.channel_name.to_uppercase());

    writeln!(out)?;
    writeln!(out, "╭{}╮", "─".repeat(WIDTH))?;
    writeln!(out, "│{:^width$}│", title, width = WIDTH)?;
    writeln!(out, "╰{}╯", "─".repeat(WIDTH))?;
    writeln!(
        out,
        "   @{}  ·  since {}",
        report.channel_username,
        report.window_start.format("%b %d, %Y")
    )?;
    if let Some(url) = &report.channel_profile {
        writeln!(out, "   Profile: {}", url)?;
    }
    writeln!(out)?;

    let totals = &report.totals;
    if totals.total_posts == 0 {
        writeln!(out, "  No posts found in this window.")?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "📊 THE NUMBERS")?;
    writeln!(
        out,
        "   Posts:     {:<12} Views:    {}",
        totals.total_posts, totals.total_views
    )?;
    writeln!(
        out,
        "   Reactions: {:<12} Comments: {}",
        totals.total_reactions, totals.total_comments
    )?;
    writeln!(
        out,
        "   Forwards:  {:<12} Avg views: {:.0}",
        totals.total_forwards,
        totals.average_views()
    )?;
    writeln!(out)?;

    let highlights = &report.highlights;
    writeln!(out, "🏆 HIGHLIGHTS")?;
    if let Some(post) = highlights.most_viewed {
        writeln!(out, "   Most viewed:    post #{} ({} views)", post.id, post.count)?;
    }
    if let Some(post) = highlights.most_commented {
        writeln!(
            out,
            "   Most discussed: post #{} ({} comments)",
            post.id, post.count
        )?;
    }
    writeln!(out)?;

    let reactions = highlights.top_reactions(5);
    if !reactions.is_empty() {
        writeln!(out, "❤️ TOP REACTIONS")?;
        for (i, (emoji, count)) in reactions.iter().enumerate() {
            writeln!(out, "   {}. {} {:>8}", i + 1, emoji, count)?;
        }
        writeln!(out)?;
    }

    let trends = &report.trends;
    writeln!(out, "⏰ TIME PATTERNS")?;
    if let Some(hour) = trends.peak_hour() {
        writeln!(out, "   Peak hour:     {} UTC", TimeTrends::hour_display(hour))?;
    }
    if let Some((month, posts)) = trends.busiest_month() {
        writeln!(out, "   Busiest month: {} ({} posts)", month, posts)?;
    }
    writeln!(out)?;

    writeln!(out, "🔥 STREAKS")?;
    writeln!(
        out,
        "   Longest:  {} day{}",
        trends.longest_posting_streak,
        plural(u64::from(trends.longest_posting_streak))
    )?;
    let active = trends.active_days() as u64;
    writeln!(out, "   Active:   {} day{}", active, plural(active))?;
    writeln!(out)?;

    let sources = highlights.top_forward_sources(3);
    if !sources.is_empty() {
        writeln!(out, "🔁 FORWARDED FROM")?;
        for (channel_id, count) in sources {
            writeln!(out, "   channel {:<16} {} post{}", channel_id, count, plural(count))?;
        }
        writeln!(out)?;
    }

    writeln!(out, "📅 MONTH BY MONTH")?;
    for (month, posts) in &trends.posts_by_month {
        let views = trends.views_by_month.get(month).copied().unwrap_or(0);
        writeln!(out, "   {:<16} {:>6} posts {:>12} views", month.to_string(), posts, views)?;
    }
    writeln!(out)?;

    Ok(())
}

fn plural(count: u64) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

pub fn print_terminal(report: &Report) {
    print!("{}", render_terminal(report));
}

pub fn print_json(report: &Report) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use unwrapped_core::analytics::{Aggregate, StreakPolicy};
    use unwrapped_core::{Aggregator, Channel, Message, ReactionKind};

    fn channel() -> Channel {
        Channel {
            id: 1,
            access_hash: 0,
            title: "Rust News".to_string(),
            username: "rust_news".to_string(),
            has_photo: false,
        }
    }

    fn at(day: u32, hour: u32) -> i64 {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0)
            .unwrap()
            .timestamp()
    }

    #[test]
    fn test_render_full_report() {
        let mut agg = Aggregator::new();
        agg.fold(
            &Message::new(1, at(3, 9))
                .with_views(100)
                .with_comments(2)
                .with_reaction(ReactionKind::emoji("🔥"), 5),
        );
        agg.fold(&Message::new(2, at(4, 9)).with_views(40).forwarded_from(777));

        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let report = Report::assemble(
            &channel(),
            Some("/profiles/1.jpg".to_string()),
            agg.finish(StreakPolicy::Chronological),
            start,
            start,
        );
        let text = render_terminal(&report);

        assert!(text.contains("RUST NEWS UNWRAPPED"));
        assert!(text.contains("@rust_news"));
        assert!(text.contains("Profile: /profiles/1.jpg"));
        assert!(text.contains("post #1 (100 views)"));
        assert!(text.contains("Longest:  2 days"));
        assert!(text.contains("2025-January"));
        assert!(text.contains("9am–10am UTC"));
        assert!(text.contains("channel 777"));
    }

    #[test]
    fn test_render_empty_report() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let report = Report::assemble(&channel(), None, Aggregate::default(), start, start);
        let text = render_terminal(&report);
        assert!(text.contains("No posts found"));
        assert!(!text.contains("HIGHLIGHTS"));
    }
}
