//! Consistent-hash circle: an ordered mapping from 64-bit hash positions to
//! nodes.
//!
//! Lookups walk to the first position at or after the query hash and wrap
//! around to the smallest position when the tail is empty. A circle is built
//! once per recomputation and never mutated during lookups.

use std::collections::BTreeMap;

/// Ordered hash → node mapping with wrap-around lookup.
#[derive(Debug, Clone)]
pub struct ConsistentHashCircle<T> {
    ring: BTreeMap<i64, T>,
}

impl<T> Default for ConsistentHashCircle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConsistentHashCircle<T> {
    /// Create an empty circle.
    pub fn new() -> Self {
        Self {
            ring: BTreeMap::new(),
        }
    }

    /// Number of positions on the circle.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether the circle has no positions.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Place a node at a position. On a position collision the earlier
    /// insertion wins.
    pub fn insert(&mut self, hash: i64, node: T) {
        self.ring.entry(hash).or_insert(node);
    }

    /// Node at the first position ≥ `hash`, wrapping to the smallest
    /// position. `None` for an empty circle.
    pub fn resolve(&self, hash: i64) -> Option<&T> {
        if self.ring.is_empty() {
            return None;
        }
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, node)| node)
    }

    /// Iterate positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&i64, &T)> {
        self.ring.iter()
    }
}
