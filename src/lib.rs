//! Bramble — graph element store core.
//!
//! A group-tagged element model (entities and edges), a view layer for
//! group inclusion and property projection, a range-scan store seam,
//! and the within-set retrieval engine: bloom-filter-assisted, batched
//! retrieval of every element whose endpoints lie inside a seed set of
//! vertices.
//!
//! Entry point for queries is [`WithinSetRetriever`]; stores plug in via
//! [`RangeScanStore`], with [`MemoryStore`] as the built-in backend.

pub mod element;
pub mod error;
pub mod retrieve;
pub mod store;
pub mod view;

pub use element::{
    DirectedType, Edge, EdgeDirection, Element, ElementKey, Entity, Properties, PropertyValue,
    Vertex,
};
pub use error::{GraphError, Result};
pub use retrieve::{RetrievalOptions, WithinSetRetriever, WithinSetStream};
pub use store::{Candidate, CancelFlag, ElementScan, MemoryStore, RangeScanStore, ScanRequest};
pub use view::{View, ViewGroup};
