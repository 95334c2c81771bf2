//! Core domain types for unwrapped
//!
//! These mirror what the messaging platform hands back for a public broadcast
//! channel, reduced to the fields the analytics engine folds.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Channel** | A public broadcast channel, addressed by its username |
//! | **Message** | One post in the channel history |
//! | **Page** | One bounded batch of messages returned for a cursor |
//! | **Cursor** | The `(date, id)` pair used to request the next older page |
//! | **Fold** | Incorporating one message into the running statistics |

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Month, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================
// Messages
// ============================================

/// A single channel post, read-only input to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity, unique per channel and increasing with time
    pub id: i64,
    /// Publish time (epoch seconds, UTC)
    pub date: i64,
    /// View counter
    #[serde(default)]
    pub views: u64,
    /// Reply-thread size
    #[serde(default, alias = "replies")]
    pub comments: u64,
    /// Reaction results, in the order the platform lists them
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    /// Channel the post was forwarded from, if any
    #[serde(default, alias = "fwd_from_channel")]
    pub forward_from: Option<i64>,
}

impl Message {
    /// Bare message with no engagement, handy for building fixtures.
    pub fn new(id: i64, date: i64) -> Self {
        Self {
            id,
            date,
            views: 0,
            comments: 0,
            reactions: Vec::new(),
            forward_from: None,
        }
    }

    pub fn with_views(mut self, views: u64) -> Self {
        self.views = views;
        self
    }

    pub fn with_comments(mut self, comments: u64) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_reaction(mut self, kind: ReactionKind, count: u64) -> Self {
        self.reactions.push(Reaction { kind, count });
        self
    }

    pub fn forwarded_from(mut self, channel_id: i64) -> Self {
        self.forward_from = Some(channel_id);
        self
    }
}

/// One `(kind, count)` entry of a message's reaction set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(rename = "reaction")]
    pub kind: ReactionKind,
    pub count: u64,
}

/// What the audience reacted with.
///
/// Only [`ReactionKind::Emoji`] has a stable, displayable name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactionKind {
    /// Standard emoji reaction
    Emoji { emoticon: String },
    /// Premium custom emoji, identified by its sticker document
    CustomEmoji { document_id: i64 },
    /// Paid star reaction
    Paid,
    /// Anything newer than this client understands
    #[serde(other)]
    Other,
}

impl ReactionKind {
    pub fn emoji(emoticon: impl Into<String>) -> Self {
        ReactionKind::Emoji {
            emoticon: emoticon.into(),
        }
    }

    /// The breakdown key for this kind, `None` when it cannot be named.
    pub fn name(&self) -> Option<&str> {
        match self {
            ReactionKind::Emoji { emoticon } => Some(emoticon),
            _ => None,
        }
    }
}

// ============================================
// Channels
// ============================================

/// A resolved broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub access_hash: i64,
    /// Display name
    pub title: String,
    /// Public username (without `@`)
    pub username: String,
    /// Whether the channel has a profile photo to download
    #[serde(default)]
    pub has_photo: bool,
}

impl Channel {
    pub fn peer(&self) -> ChannelPeer {
        ChannelPeer {
            id: self.id,
            access_hash: self.access_hash,
        }
    }
}

/// Addressing information for history requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelPeer {
    pub id: i64,
    pub access_hash: i64,
}

// ============================================
// Calendar keys
// ============================================

/// Calendar month used to bucket trends.
///
/// Orders chronologically; displays as `2025-January`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The calendar month right after this one.
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Number of calendar days in this month (28-31).
    pub fn days(&self) -> u32 {
        let next = self.succ();
        NaiveDate::from_ymd_opt(next.year, next.month, 1)
            .and_then(|first| first.pred_opt())
            .map(|last| last.day())
            .unwrap_or(31)
    }

    fn month_name(&self) -> &'static str {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("Unknown")
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.month_name())
    }
}

/// Error for month keys that are not `<year>-<MonthName>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMonthKeyError(String);

impl fmt::Display for ParseMonthKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid month key {:?}", self.0)
    }
}

impl std::error::Error for ParseMonthKeyError {}

impl FromStr for MonthKey {
    type Err = ParseMonthKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMonthKeyError(s.to_string());
        // rsplit keeps negative years intact
        let (year, name) = s.rsplit_once('-').ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let month: Month = name.parse().map_err(|_| err())?;
        MonthKey::new(year, month.number_from_month()).ok_or_else(err)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
