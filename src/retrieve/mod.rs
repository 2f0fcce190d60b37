//! Partitioned set-containment retrieval.
//!
//! Answers the within-set query: every element whose endpoints all lie
//! inside a given seed set, against a store whose only access path is
//! per-vertex range scans. The seed set is processed in fixed-order
//! batches; a bloom filter accumulates the members of every batch seen
//! so far and is pushed down with each scan to prune candidates early.
//!
//! The filter is cumulative on purpose. An edge whose endpoints fall in
//! batches `Bi` and `Bj` (`i <= j`) is discovered when `Bj` is scanned
//! for its own endpoint: by then the filter already contains the
//! endpoint contributed by `Bi`. Rebuilding the filter per batch, or
//! scanning batches out of order, loses exactly those cross-batch
//! matches. Filter hits are only candidates — every admission is
//! re-checked against the exact seed set.

pub mod batcher;
pub mod bloom;
pub mod dedup;
pub mod driver;
pub mod planner;
pub mod qualify;

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::element::{DirectedType, EdgeDirection, Element, Vertex};
use crate::error::{GraphError, Result};
use crate::store::{CancelFlag, RangeScanStore};
use crate::view::View;

use batcher::normalize_seeds;
use bloom::BloomFilter;
use dedup::Deduplicator;
use qualify::ElementQualifier;

// ── Options ────────────────────────────────────────────────────────

/// Default target false-positive rate: 1 in 10,000.
pub const DEFAULT_TARGET_FPR: f64 = 1e-4;

/// Default cap on filter size pushed down with a scan request (bits).
pub const DEFAULT_MAX_FILTER_BITS: usize = 1 << 23;

/// Default seeds per scanning round.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Default concurrent scans per round.
pub const DEFAULT_MAX_BATCH_CONCURRENCY: usize = 8;

/// Options for one within-set query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalOptions {
    /// Which groups are returned and how their properties are projected.
    pub view: View,
    /// Edge policy: directed only, undirected only, or both.
    pub directed_type: DirectedType,
    /// Requested incidence restriction. Recorded but never forwarded:
    /// within-set scans always run with `Either` (see `planner`).
    pub edge_direction: EdgeDirection,
    pub include_entities: bool,
    pub include_edges: bool,
    /// True: size and populate the filter from the whole seed set before
    /// the first scan. False: stream — grow the filter batch by batch.
    pub load_into_memory: bool,
    /// Seeds per batch. Bounds scan ranges submitted per round.
    pub max_batch_size: usize,
    /// Concurrent scans within one batch.
    pub max_batch_concurrency: usize,
    /// Cap on filter bits regardless of seed count. A capped filter
    /// realizes a worse false-positive rate, never wrong results.
    pub max_filter_bits: usize,
    pub target_false_positive_rate: f64,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            view: View::default(),
            directed_type: DirectedType::Either,
            edge_direction: EdgeDirection::Either,
            include_entities: true,
            include_edges: true,
            load_into_memory: false,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_batch_concurrency: DEFAULT_MAX_BATCH_CONCURRENCY,
            max_filter_bits: DEFAULT_MAX_FILTER_BITS,
            target_false_positive_rate: DEFAULT_TARGET_FPR,
        }
    }
}

impl RetrievalOptions {
    /// Fail fast on configurations no scan should ever run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(GraphError::InvalidConfig(
                "max_batch_size must be at least 1".into(),
            ));
        }
        if self.max_batch_concurrency == 0 {
            return Err(GraphError::InvalidConfig(
                "max_batch_concurrency must be at least 1".into(),
            ));
        }
        if self.max_filter_bits < 64 {
            return Err(GraphError::InvalidConfig(
                "max_filter_bits must be at least 64".into(),
            ));
        }
        let fpr = self.target_false_positive_rate;
        if !(fpr > 0.0 && fpr < 1.0) {
            return Err(GraphError::InvalidConfig(format!(
                "target_false_positive_rate must be in (0, 1), got {fpr}"
            )));
        }
        Ok(())
    }
}

// ── Retriever ──────────────────────────────────────────────────────

/// One within-set query against one store.
///
/// Owns the normalized seed set and options for the query's lifetime.
/// Results are consumed either eagerly ([`fetch`](Self::fetch)) or as a
/// closable lazy stream ([`stream`](Self::stream)); both run the same
/// batch producer underneath.
pub struct WithinSetRetriever<'a> {
    store: &'a dyn RangeScanStore,
    seeds: Vec<Vertex>,
    options: RetrievalOptions,
}

impl<'a> WithinSetRetriever<'a> {
    /// Validate the options and normalize the seed set. An empty seed
    /// set is valid and yields an empty result without issuing scans.
    pub fn new<I>(
        store: &'a dyn RangeScanStore,
        seeds: I,
        options: RetrievalOptions,
    ) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Vertex>,
    {
        options.validate()?;
        Ok(Self {
            store,
            seeds: normalize_seeds(seeds),
            options,
        })
    }

    pub fn seed_count(&self) -> usize {
        self.seeds.len()
    }

    /// Run the query to completion and return every qualified element,
    /// deduplicated, as one materialized value.
    pub fn fetch(&self) -> Result<Vec<Element>> {
        let mut producer = BatchProducer::new(
            self.store,
            &self.seeds,
            &self.options,
            CancelFlag::new(),
        )?;
        let mut results = Vec::new();
        while let Some(batch) = producer.next_batch()? {
            results.extend(batch);
        }
        Ok(results)
    }

    /// Open the query as a lazy, single-pass stream. Advancing the
    /// stream may trigger scanning of the next batch; the stream is
    /// finite and not restartable. Dropping it closes it.
    pub fn stream(&self) -> Result<WithinSetStream<'_>> {
        let cancel = CancelFlag::new();
        let producer =
            BatchProducer::new(self.store, &self.seeds, &self.options, cancel.clone())?;
        Ok(WithinSetStream {
            producer: Some(producer),
            buffer: VecDeque::new(),
            state: StreamState::Active,
            cancel,
        })
    }
}

// ── Batch producer ─────────────────────────────────────────────────

/// Shared engine behind eager and streaming delivery: yields one batch
/// of qualified, deduplicated elements per call, in batch order.
struct BatchProducer<'a> {
    store: &'a dyn RangeScanStore,
    options: &'a RetrievalOptions,
    batches: Vec<&'a [Vertex]>,
    cursor: usize,
    filter: BloomFilter,
    groups: BTreeSet<String>,
    qualifier: ElementQualifier<'a>,
    dedup: Deduplicator,
    cancel: CancelFlag,
}

impl<'a> BatchProducer<'a> {
    fn new(
        store: &'a dyn RangeScanStore,
        seeds: &'a [Vertex],
        options: &'a RetrievalOptions,
        cancel: CancelFlag,
    ) -> Result<Self> {
        let batches = batcher::partition(seeds, options.max_batch_size)?;

        let filter = if options.load_into_memory {
            // Whole seed set known up front: size once, populate once.
            let mut filter = BloomFilter::sized_for(
                seeds.len(),
                options.target_false_positive_rate,
                options.max_filter_bits,
            );
            for seed in seeds {
                filter.insert(seed.as_bytes());
            }
            filter
        } else {
            // Streaming: sized for the round capacity, grown batch by
            // batch. Membership is cumulative; only the sizing is fixed.
            BloomFilter::sized_for(
                options.max_batch_size,
                options.target_false_positive_rate,
                options.max_filter_bits,
            )
        };

        debug!(
            seeds = seeds.len(),
            batches = batches.len(),
            filter_bits = filter.num_bits(),
            load_into_memory = options.load_into_memory,
            "within-set retrieval planned"
        );

        Ok(Self {
            store,
            options,
            batches,
            cursor: 0,
            filter,
            groups: options.view.group_restriction(),
            qualifier: ElementQualifier::new(seeds, options),
            dedup: Deduplicator::new(),
            cancel,
        })
    }

    /// Scan and qualify the next batch. `Ok(None)` after the last batch.
    fn next_batch(&mut self) -> Result<Option<Vec<Element>>> {
        let Some(&batch) = self.batches.get(self.cursor) else {
            return Ok(None);
        };
        let index = self.cursor;
        self.cursor += 1;

        // Streaming mode: this batch's members enter the filter before
        // its scans run, so earlier batches' members are already there.
        if !self.options.load_into_memory {
            for seed in batch {
                self.filter.insert(seed.as_bytes());
            }
        }

        let requests = planner::plan_batch(
            batch,
            &self.filter,
            &self.groups,
            self.options.edge_direction,
            &self.cancel,
        );
        let candidates = driver::run_batch(
            self.store,
            requests,
            self.options.max_batch_concurrency,
        )
        .map_err(|e| e.in_batch(index))?;

        let mut qualified = Vec::new();
        for candidate in candidates {
            if let Some(element) = self.qualifier.qualify(candidate) {
                if self.dedup.insert(&element) {
                    qualified.push(element);
                }
            }
        }

        debug!(
            batch = index,
            qualified = qualified.len(),
            total_emitted = self.dedup.emitted(),
            "batch complete"
        );
        Ok(Some(qualified))
    }
}

// ── Streaming delivery ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// May still produce elements; pulling can trigger the next batch.
    Active,
    /// Last batch drained; yields `None` forever.
    Exhausted,
    /// A scan error was emitted; yields `None` forever.
    Failed,
    /// Explicitly closed; pulls fail with `GraphError::Closed`.
    Closed,
}

/// Lazy, single-consumer, forward-only result sequence.
///
/// Pulling the next element is the suspension point: it may block while
/// a batch is scanned. A scan failure is yielded once as `Err` (tagged
/// with the failing batch index) and ends the stream. [`close`] is
/// idempotent and also runs on drop.
///
/// [`close`]: WithinSetStream::close
pub struct WithinSetStream<'a> {
    producer: Option<BatchProducer<'a>>,
    buffer: VecDeque<Element>,
    state: StreamState,
    cancel: CancelFlag,
}

impl WithinSetStream<'_> {
    /// Stop issuing scans and release the query's resources. Calling
    /// close more than once, or after exhaustion, is a no-op; release
    /// failures would be logged, never surfaced over a primary outcome.
    pub fn close(&mut self) {
        match self.state {
            StreamState::Closed | StreamState::Exhausted => {}
            StreamState::Active | StreamState::Failed => {
                self.cancel.cancel();
                self.release();
                self.state = StreamState::Closed;
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    fn release(&mut self) {
        self.producer = None;
        self.buffer.clear();
    }
}

impl Iterator for WithinSetStream<'_> {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            StreamState::Closed => return Some(Err(GraphError::Closed)),
            StreamState::Exhausted | StreamState::Failed => return None,
            StreamState::Active => {}
        }

        if let Some(element) = self.buffer.pop_front() {
            return Some(Ok(element));
        }

        // Buffer empty: drive batches until one yields, or we run out.
        loop {
            let Some(producer) = self.producer.as_mut() else {
                self.state = StreamState::Exhausted;
                return None;
            };
            match producer.next_batch() {
                Ok(Some(mut batch)) => {
                    if batch.is_empty() {
                        continue;
                    }
                    let first = batch.remove(0);
                    self.buffer.extend(batch);
                    return Some(Ok(first));
                }
                Ok(None) => {
                    self.state = StreamState::Exhausted;
                    self.release();
                    return None;
                }
                Err(e) => {
                    self.state = StreamState::Failed;
                    self.release();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl Drop for WithinSetStream<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Edge, Entity};
    use crate::store::MemoryStore;

    fn default_view_options() -> RetrievalOptions {
        RetrievalOptions {
            view: View::new().with_edge_group("link").with_entity_group("node"),
            ..RetrievalOptions::default()
        }
    }

    fn small_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_element(Entity::new("node", "A"));
        store.add_element(Entity::new("node", "B"));
        store.add_element(Entity::new("node", "C"));
        store.add_element(Edge::new("link", "A", "B", true));
        store.add_element(Edge::new("link", "B", "C", false));
        store
    }

    #[test]
    fn test_options_validation() {
        assert!(RetrievalOptions::default().validate().is_ok());

        let bad = RetrievalOptions {
            max_batch_size: 0,
            ..RetrievalOptions::default()
        };
        assert!(matches!(
            bad.validate().unwrap_err(),
            GraphError::InvalidConfig(_)
        ));

        let bad = RetrievalOptions {
            max_batch_concurrency: 0,
            ..RetrievalOptions::default()
        };
        assert!(bad.validate().is_err());

        let bad = RetrievalOptions {
            max_filter_bits: 8,
            ..RetrievalOptions::default()
        };
        assert!(bad.validate().is_err());

        for fpr in [0.0, 1.0, -0.5, 2.0] {
            let bad = RetrievalOptions {
                target_false_positive_rate: fpr,
                ..RetrievalOptions::default()
            };
            assert!(bad.validate().is_err(), "fpr {fpr} must be rejected");
        }
    }

    #[test]
    fn test_options_json_roundtrip() {
        let options = RetrievalOptions {
            view: View::new().with_edge_properties("link", ["count"]),
            directed_type: DirectedType::Undirected,
            max_batch_size: 7,
            ..RetrievalOptions::default()
        };

        let json = serde_json::to_string(&options).unwrap();
        let back: RetrievalOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.view, options.view);
        assert_eq!(back.directed_type, DirectedType::Undirected);
        assert_eq!(back.max_batch_size, 7);

        // Omitted fields fall back to defaults.
        let sparse: RetrievalOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(sparse.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert!(sparse.include_edges);
    }

    #[test]
    fn test_invalid_config_fails_before_any_scan() {
        let store = MemoryStore::new();
        let options = RetrievalOptions {
            max_batch_size: 0,
            ..default_view_options()
        };
        assert!(WithinSetRetriever::new(&store, ["A"], options).is_err());
    }

    #[test]
    fn test_empty_seed_set_yields_empty_result() {
        let store = small_store();
        let retriever = WithinSetRetriever::new(
            &store,
            Vec::<Vertex>::new(),
            default_view_options(),
        )
        .unwrap();

        assert!(retriever.fetch().unwrap().is_empty());
        assert_eq!(retriever.stream().unwrap().count(), 0);
    }

    #[test]
    fn test_seeds_normalized_before_batching() {
        let store = small_store();
        let retriever = WithinSetRetriever::new(
            &store,
            ["B", "A", "B", "A"],
            default_view_options(),
        )
        .unwrap();

        assert_eq!(retriever.seed_count(), 2);

        // Duplicate seeds never duplicate results.
        let results = retriever.fetch().unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_fetch_and_stream_agree() {
        let store = small_store();
        let retriever =
            WithinSetRetriever::new(&store, ["A", "B", "C"], default_view_options()).unwrap();

        let eager = retriever.fetch().unwrap();
        let streamed: Vec<Element> = retriever
            .stream()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        // 3 entities + 2 edges.
        assert_eq!(eager.len(), 5);
        assert_eq!(streamed.len(), 5);
        for element in &eager {
            assert!(streamed.contains(element));
        }
    }

    #[test]
    fn test_stream_close_is_idempotent() {
        let store = small_store();
        let retriever =
            WithinSetRetriever::new(&store, ["A", "B"], default_view_options()).unwrap();

        let mut stream = retriever.stream().unwrap();
        assert!(stream.next().is_some());
        stream.close();
        stream.close();
        assert!(stream.is_closed());
        assert!(matches!(stream.next(), Some(Err(GraphError::Closed))));
    }

    #[test]
    fn test_close_after_exhaustion_is_noop() {
        let store = small_store();
        let retriever =
            WithinSetRetriever::new(&store, ["A", "B"], default_view_options()).unwrap();

        let mut stream = retriever.stream().unwrap();
        while let Some(item) = stream.next() {
            item.unwrap();
        }
        stream.close();
        assert!(!stream.is_closed(), "exhausted stream stays exhausted");
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_scan_failure_carries_batch_index() {
        /// Store that fails every scan.
        struct FailingStore;
        impl RangeScanStore for FailingStore {
            fn open_scan(
                &self,
                _request: crate::store::ScanRequest,
            ) -> Result<Box<dyn crate::store::ElementScan + '_>> {
                Err(GraphError::Store("backend unavailable".into()))
            }
        }

        let store = FailingStore;
        let retriever =
            WithinSetRetriever::new(&store, ["A", "B"], default_view_options()).unwrap();

        let err = retriever.fetch().unwrap_err();
        match err {
            GraphError::Scan { batch, .. } => assert_eq!(batch, 0),
            other => panic!("expected Scan error, got {other}"),
        }

        // Streaming: error yielded once, then the stream is spent.
        let mut stream = retriever.stream().unwrap();
        assert!(matches!(stream.next(), Some(Err(GraphError::Scan { .. }))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_eager_filter_mode_matches_streaming_results() {
        let store = small_store();
        let streaming =
            WithinSetRetriever::new(&store, ["A", "B", "C"], default_view_options()).unwrap();
        let eager_opts = RetrievalOptions {
            load_into_memory: true,
            ..default_view_options()
        };
        let eager = WithinSetRetriever::new(&store, ["A", "B", "C"], eager_opts).unwrap();

        let a = streaming.fetch().unwrap();
        let b = eager.fetch().unwrap();
        assert_eq!(a.len(), b.len());
        for element in &a {
            assert!(b.contains(element));
        }
    }
}
