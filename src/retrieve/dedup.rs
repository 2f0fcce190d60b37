//! Cross-batch deduplication by element identity.
//!
//! An edge whose endpoints land in different batches is discovered at
//! least once and possibly twice (once per endpoint's scan); identity
//! keys collapse those discoveries into one emitted result.

use std::collections::HashSet;

use crate::element::{Element, ElementKey};

/// Tracks identity keys already emitted for one query.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<ElementKey>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the element's identity. Returns true if it was novel and
    /// should be emitted, false if an equal identity was already seen.
    pub fn insert(&mut self, element: &Element) -> bool {
        self.seen.insert(element.key())
    }

    /// Number of distinct identities emitted so far.
    pub fn emitted(&self) -> usize {
        self.seen.len()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
