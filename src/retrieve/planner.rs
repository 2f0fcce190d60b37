//! Scan-request planning for one batch.
//!
//! Every seed in the batch gets one range-scan request carrying a
//! snapshot of the cumulative filter (serialized once per batch and
//! shared) and the view's group restriction. The caller's incidence
//! restriction is deliberately not forwarded: within-set scans always
//! run with `EdgeDirection::Either`, because "outgoing from a set
//! member" is meaningless here and honoring it silently drops edges
//! whose endpoints landed in different batches.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::element::{EdgeDirection, Vertex};
use crate::retrieve::bloom::BloomFilter;
use crate::store::{CancelFlag, ScanRequest};

/// Build the scan requests for one batch of seeds.
pub fn plan_batch(
    batch: &[Vertex],
    filter: &BloomFilter,
    groups: &BTreeSet<String>,
    requested_direction: EdgeDirection,
    cancel: &CancelFlag,
) -> Vec<ScanRequest> {
    if requested_direction != EdgeDirection::Either {
        debug!(
            ?requested_direction,
            "ignoring incidence restriction for within-set scan; forcing Either"
        );
    }

    let filter_bytes = Arc::new(filter.to_bytes());
    batch
        .iter()
        .map(|seed| ScanRequest {
            vertex: seed.clone(),
            filter: Some(Arc::clone(&filter_bytes)),
            groups: groups.clone(),
            edge_direction: EdgeDirection::Either,
            cancel: cancel.clone(),
        })
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────
