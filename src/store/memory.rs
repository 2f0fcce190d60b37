//! In-memory range-scan store.
//!
//! Adjacency-map backend used by tests and small embedded deployments.
//! Elements are indexed per vertex: an edge is reachable from both of
//! its endpoints, an entity from its own vertex. Scans honor the
//! pushed-down bloom filter (membership test on the other endpoint), the
//! group restriction, the incidence restriction, and the cancel flag —
//! the same contract a remote scan server provides.

use std::collections::HashMap;

use crate::element::{Edge, EdgeDirection, Element, Entity, Vertex};
use crate::error::{GraphError, Result};
use crate::retrieve::bloom::BloomFilter;
use crate::store::{Candidate, ElementScan, RangeScanStore, ScanRequest};

/// In-memory element store with per-vertex adjacency.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// vertex -> elements incident to it. Edges appear under both
    /// endpoints (once under a self-loop's vertex).
    adjacency: HashMap<Vertex, Vec<Element>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one element, indexing it under every incident vertex.
    pub fn add_element(&mut self, element: impl Into<Element>) {
        let element = element.into();
        match &element {
            Element::Entity(Entity { vertex, .. }) => {
                self.adjacency
                    .entry(vertex.clone())
                    .or_default()
                    .push(element.clone());
            }
            Element::Edge(Edge { source, dest, .. }) => {
                self.adjacency
                    .entry(source.clone())
                    .or_default()
                    .push(element.clone());
                if dest != source {
                    self.adjacency
                        .entry(dest.clone())
                        .or_default()
                        .push(element);
                }
            }
        }
    }

    pub fn add_elements<I>(&mut self, elements: I)
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        for element in elements {
            self.add_element(element);
        }
    }

    /// Total indexed postings (edges count once per endpoint).
    pub fn posting_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }
}

impl RangeScanStore for MemoryStore {
    fn open_scan(&self, request: ScanRequest) -> Result<Box<dyn ElementScan + '_>> {
        let filter = match &request.filter {
            Some(bytes) => Some(BloomFilter::from_bytes(bytes.as_slice())?),
            None => None,
        };
        let incident = self
            .adjacency
            .get(&request.vertex)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        Ok(Box::new(MemoryScan {
            incident,
            cursor: 0,
            filter,
            request,
            closed: false,
        }))
    }
}

/// Forward-only scan over one vertex's posting list.
struct MemoryScan<'a> {
    incident: &'a [Element],
    cursor: usize,
    filter: Option<BloomFilter>,
    request: ScanRequest,
    closed: bool,
}

impl MemoryScan<'_> {
    /// Whether the element passes the request-level restrictions and, if
    /// a filter was pushed down, the membership test on its far endpoint.
    fn admit(&self, element: &Element) -> Option<Candidate> {
        if !self.request.groups.contains(element.group()) {
            return None;
        }

        let other = match element {
            Element::Entity(e) => e.vertex.clone(),
            Element::Edge(e) => {
                if !incidence_matches(e, &self.request.vertex, self.request.edge_direction) {
                    return None;
                }
                e.other_endpoint(&self.request.vertex)?.clone()
            }
        };

        if let Some(filter) = &self.filter {
            if !filter.maybe_contains(other.as_bytes()) {
                return None;
            }
        }

        Some(Candidate {
            element: element.clone(),
            other_endpoint: other,
        })
    }
}

/// Incidence restriction for a scan of `vertex`. Undirected edges match
/// any restriction; directed edges match `Outgoing` only from their
/// source and `Incoming` only from their dest.
fn incidence_matches(edge: &Edge, vertex: &Vertex, direction: EdgeDirection) -> bool {
    match direction {
        EdgeDirection::Either => true,
        EdgeDirection::Outgoing => !edge.directed || edge.source == *vertex,
        EdgeDirection::Incoming => !edge.directed || edge.dest == *vertex,
    }
}

impl ElementScan for MemoryScan<'_> {
    fn next(&mut self) -> Result<Option<Candidate>> {
        if self.closed {
            return Ok(None);
        }
        while self.cursor < self.incident.len() {
            if self.request.cancel.is_cancelled() {
                return Err(GraphError::Cancelled);
            }
            let element = &self.incident[self.cursor];
            self.cursor += 1;
            if let Some(candidate) = self.admit(element) {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.closed = true;
        self.cursor = self.incident.len();
    }
}

impl Drop for MemoryScan<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Tests ──────────────────────────────────────────────────────────
