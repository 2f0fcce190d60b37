//! Exact qualification of scan candidates.
//!
//! The bloom filter narrows candidates; it never admits them. Every
//! candidate's far endpoint is re-checked against the exact seed set, so
//! filter false positives (and key-encoding mismatches, which only raise
//! the false-positive rate) can never reach the caller. The remaining
//! steps apply the element-level policies: directed-type filtering,
//! entity/edge inclusion, view group membership, and property
//! projection. A candidate failing any step is dropped silently.

use std::collections::HashSet;

use crate::element::{Element, Vertex};
use crate::retrieve::RetrievalOptions;
use crate::store::Candidate;

/// Qualifier for one query: exact seed membership plus the caller's
/// element-level policies.
pub struct ElementQualifier<'a> {
    seeds: HashSet<&'a Vertex>,
    options: &'a RetrievalOptions,
}

impl<'a> ElementQualifier<'a> {
    pub fn new(seeds: &'a [Vertex], options: &'a RetrievalOptions) -> Self {
        Self {
            seeds: seeds.iter().collect(),
            options,
        }
    }

    /// Admit or drop a candidate. Admission returns the element with its
    /// properties projected per the view.
    pub fn qualify(&self, candidate: Candidate) -> Option<Element> {
        // False-positive elimination: exact membership, never the filter.
        if !self.seeds.contains(&candidate.other_endpoint) {
            return None;
        }

        match &candidate.element {
            Element::Edge(edge) => {
                if !self.options.include_edges {
                    return None;
                }
                if !self.options.directed_type.matches(edge.directed) {
                    return None;
                }
            }
            Element::Entity(_) => {
                if !self.options.include_entities {
                    return None;
                }
            }
        }

        if !self.options.view.includes(&candidate.element) {
            return None;
        }

        Some(self.options.view.project(candidate.element))
    }
}

// ── Tests ──────────────────────────────────────────────────────────
