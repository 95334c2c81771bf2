//! Reaction decomposition.

use std::collections::BTreeMap;

use crate::types::Reaction;

/// Per-kind breakdown plus raw total of one message's reactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionTally {
    /// Counts for nameable (emoji) kinds only
    pub by_kind: BTreeMap<String, u64>,
    /// Every reaction, including custom and paid kinds
    pub total: u64,
}

/// Split a reaction set into a named breakdown and a raw total.
///
/// Unnamed kinds still count toward `total` but never appear in `by_kind`,
/// so `by_kind.values().sum() <= total` always holds.
pub fn tally(reactions: &[Reaction]) -> ReactionTally {
    let mut out = ReactionTally::default();
    for reaction in reactions {
        out.total = out.total.saturating_add(reaction.count);
        if let Some(name) = reaction.kind.name() {
            let slot = out.by_kind.entry(name.to_string()).or_default();
            *slot = slot.saturating_add(reaction.count);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReactionKind;

    fn reaction(kind: ReactionKind, count: u64) -> Reaction {
        Reaction { kind, count }
    }

    #[test]
    fn test_empty_reactions() {
        let t = tally(&[]);
        assert!(t.by_kind.is_empty());
        assert_eq!(t.total, 0);
    }

    #[test]
    fn test_only_emoji_is_named() {
        let t = tally(&[
            reaction(ReactionKind::emoji("🔥"), 10),
            reaction(ReactionKind::CustomEmoji { document_id: 5 }, 3),
            reaction(ReactionKind::Paid, 2),
            reaction(ReactionKind::emoji("👍"), 4),
        ]);
        assert_eq!(t.total, 19);
        assert_eq!(t.by_kind.len(), 2);
        assert_eq!(t.by_kind["🔥"], 10);
        assert_eq!(t.by_kind["👍"], 4);
        assert!(t.by_kind.values().sum::<u64>() < t.total);
    }

    #[test]
    fn test_sum_equals_total_without_unnamed_kinds() {
        let t = tally(&[
            reaction(ReactionKind::emoji("❤"), 7),
            reaction(ReactionKind::emoji("❤"), 1),
            reaction(ReactionKind::emoji("😂"), 0),
        ]);
        assert_eq!(t.by_kind["❤"], 8);
        assert_eq!(t.by_kind["😂"], 0);
        assert_eq!(t.by_kind.values().sum::<u64>(), t.total);
    }

    #[test]
    fn test_counts_saturate() {
        let t = tally(&[
            reaction(ReactionKind::emoji("🔥"), u64::MAX - 1),
            reaction(ReactionKind::emoji("🔥"), 5),
            reaction(ReactionKind::Paid, 3),
        ]);
        assert_eq!(t.total, u64::MAX);
        assert_eq!(t.by_kind["🔥"], u64::MAX);
    }
}
