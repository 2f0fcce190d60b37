//! Seed-set batching.
//!
//! The seed set is normalized once (deduplicated, sorted) so the batch
//! partition is identical for any iteration order of the caller's input,
//! then chunked into fixed-order batches. The batch order is load-bearing:
//! the cumulative filter's correctness argument assumes batches are
//! scanned exactly in this order.

use crate::element::Vertex;
use crate::error::{GraphError, Result};

/// Normalize a seed collection into the canonical batching order:
/// duplicates removed, ascending vertex order.
pub fn normalize_seeds<I>(seeds: I) -> Vec<Vertex>
where
    I: IntoIterator,
    I::Item: Into<Vertex>,
{
    let mut seeds: Vec<Vertex> = seeds.into_iter().map(Into::into).collect();
    seeds.sort_unstable();
    seeds.dedup();
    seeds
}

/// Partition normalized seeds into batches of at most `max_batch_size`,
/// covering the seed set exactly once. Deterministic for a fixed input.
pub fn partition(seeds: &[Vertex], max_batch_size: usize) -> Result<Vec<&[Vertex]>> {
    if max_batch_size == 0 {
        return Err(GraphError::InvalidConfig(
            "max_batch_size must be at least 1".into(),
        ));
    }
    Ok(seeds.chunks(max_batch_size).collect())
}

// ── Tests ──────────────────────────────────────────────────────────
