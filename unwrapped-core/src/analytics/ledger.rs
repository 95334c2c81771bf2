//! Dedup ledger: which message ids were already folded in this run.

use std::collections::HashSet;

/// Set of folded message identities. No eviction; lives for one run.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    ids: HashSet<i64>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for a channel whose message count is roughly known.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: HashSet::with_capacity(capacity),
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Record `id`. Returns `false` if it was already present.
    pub fn insert(&mut self, id: i64) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut visited = VisitedSet::with_capacity(4);
        assert!(visited.is_empty());
        assert!(!visited.contains(7));
        assert!(visited.insert(7));
        assert!(visited.contains(7));
        assert!(!visited.insert(7));
        assert_eq!(visited.len(), 1);
    }
}
