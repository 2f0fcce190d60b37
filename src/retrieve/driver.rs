//! Bounded-concurrency scan execution for one batch.
//!
//! Scans inside a batch are independent, so they run on a dedicated
//! rayon pool whose thread count is the configured concurrency limit.
//! Batches themselves are never overlapped — the cumulative filter's
//! correctness argument requires strict batch order, which the caller
//! enforces by invoking this once per batch, sequentially.
//!
//! Result order within a batch is whatever the pool produces and callers
//! must not rely on it.

use tracing::debug;

use crate::error::{GraphError, Result};
use crate::store::{Candidate, ElementScan, RangeScanStore, ScanRequest};

/// Execute all of one batch's scan requests, draining each scan to
/// exhaustion, with at most `concurrency` scans in flight.
///
/// Every opened scan is closed on every exit path. A failing scan
/// raises the shared cancel flag carried in the requests, so in-flight
/// sibling scans stop at their next pull; the root-cause error
/// propagates in preference to the secondary cancellations it caused.
pub fn run_batch(
    store: &dyn RangeScanStore,
    requests: Vec<ScanRequest>,
    concurrency: usize,
) -> Result<Vec<Candidate>> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let threads = concurrency.max(1).min(requests.len());
    debug!(requests = requests.len(), threads, "executing batch scans");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| GraphError::Store(format!("scan pool: {e}")))?;

    let results: Vec<Result<Vec<Candidate>>> = pool.install(|| {
        use rayon::prelude::*;
        requests
            .into_par_iter()
            .map(|request| drain_scan(store, request))
            .collect()
    });

    // A failing scan cancels its siblings, so the batch may contain
    // both the root-cause error and secondary cancellations. The root
    // cause is the one worth reporting.
    let mut candidates = Vec::new();
    let mut cancelled = false;
    for result in results {
        match result {
            Ok(mut chunk) => candidates.append(&mut chunk),
            Err(GraphError::Cancelled) => cancelled = true,
            Err(e) => return Err(e),
        }
    }
    if cancelled {
        return Err(GraphError::Cancelled);
    }
    Ok(candidates)
}

/// Open one scan and pull it dry, closing it on success and on error.
/// A failure raises the shared cancel flag so sibling scans still in
/// flight stop at their next pull instead of running to exhaustion.
fn drain_scan(store: &dyn RangeScanStore, request: ScanRequest) -> Result<Vec<Candidate>> {
    let cancel = request.cancel.clone();
    if cancel.is_cancelled() {
        return Err(GraphError::Cancelled);
    }

    let result = match store.open_scan(request) {
        Ok(mut scan) => {
            let drained = drain_all(scan.as_mut());
            scan.close();
            drained
        }
        Err(e) => Err(e),
    };
    if result.is_err() {
        cancel.cancel();
    }
    result
}

fn drain_all(scan: &mut dyn ElementScan) -> Result<Vec<Candidate>> {
    let mut out = Vec::new();
    while let Some(candidate) = scan.next()? {
        out.push(candidate);
    }
    Ok(out)
}

// ── Tests ──────────────────────────────────────────────────────────
