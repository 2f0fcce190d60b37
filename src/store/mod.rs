//! Range-scan store seam.
//!
//! The retrieval engine's only access path into element storage is a
//! per-vertex range scan: "give me every element incident to this
//! vertex". Backends implement [`RangeScanStore`]; the engine drives the
//! returned [`ElementScan`] handles and owns their release.
//!
//! A scan request may carry a serialized bloom filter. Backends that
//! understand it use it to discard clearly-non-matching candidates close
//! to the data; backends that ignore it are still correct, because the
//! engine re-checks every candidate exactly (the filter is an
//! optimization, never a source of truth).

pub mod memory;

pub use memory::MemoryStore;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::element::{EdgeDirection, Element, Vertex};
use crate::error::Result;

// ── Cancellation ───────────────────────────────────────────────────

/// Shared cooperative-cancellation flag. Cloned into every scan opened
/// for one query; raising it stops iteration at the next pull.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ── Scan request / candidate ───────────────────────────────────────

/// One per-vertex range-scan request.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// The vertex whose incident elements the scan covers.
    pub vertex: Vertex,
    /// Serialized bloom filter snapshot, if the planner attached one.
    /// Tested against the *other* endpoint of each candidate edge.
    pub filter: Option<Arc<Vec<u8>>>,
    /// Only elements of these groups can be returned. Empty means the
    /// view includes nothing, so the scan yields nothing.
    pub groups: BTreeSet<String>,
    /// Incidence restriction. Within-set planning always sets `Either`.
    pub edge_direction: EdgeDirection,
    /// Query-wide cancellation flag.
    pub cancel: CancelFlag,
}

/// Raw element yielded by a range scan, paired with the endpoint on the
/// far side of the scanned vertex (the entity's own vertex for entities).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub element: Element,
    pub other_endpoint: Vertex,
}

// ── Store traits ───────────────────────────────────────────────────

/// An open, forward-only scan over one vertex's incident elements.
///
/// `close` is idempotent; a closed scan yields no further candidates.
/// Implementations release their own resources on close and on drop.
pub trait ElementScan: Send {
    /// Pull the next candidate. `Ok(None)` means the scan is exhausted
    /// (or was closed / cancelled).
    fn next(&mut self) -> Result<Option<Candidate>>;

    /// Release the scan's resources. Safe to call more than once.
    fn close(&mut self);
}

/// A store whose native access path is per-vertex range scans.
///
/// Scans opened from one store may run concurrently on worker threads,
/// so handles must be `Send`.
pub trait RangeScanStore: Send + Sync {
    fn open_scan(&self, request: ScanRequest) -> Result<Box<dyn ElementScan + '_>>;
}
