//! Graph element model: vertices, entities, edges.
//!
//! Every element belongs to a named group (its schema bucket) and carries
//! a flat property map. Edges connect two vertices and are directed or
//! undirected; entities annotate a single vertex. Elements discovered via
//! different scan paths compare equal when their identity key matches, so
//! identity is factored out into [`ElementKey`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Vertex ─────────────────────────────────────────────────────────

/// A vertex identifier.
///
/// The byte view returned by [`Vertex::as_bytes`] is the canonical
/// encoding used for bloom filter membership on both the build side and
/// the test side. Any asymmetry there would inflate the false-positive
/// rate, so there is exactly one encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vertex(String);

impl Vertex {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Canonical byte encoding for filter membership.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Vertex {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Vertex {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Properties ─────────────────────────────────────────────────────

/// A single property value.
///
/// Restricted to hashable scalar kinds so whole elements can live in
/// hash sets (dedup, test assertions).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    Text(String),
    Bool(bool),
}

/// Ordered property map. BTreeMap keeps Hash/Eq deterministic.
pub type Properties = BTreeMap<String, PropertyValue>;

// ── Entity / Edge ──────────────────────────────────────────────────

/// An entity: per-vertex element carrying properties about that vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub group: String,
    pub vertex: Vertex,
    #[serde(default)]
    pub properties: Properties,
}

impl Entity {
    pub fn new(group: impl Into<String>, vertex: impl Into<Vertex>) -> Self {
        Self {
            group: group.into(),
            vertex: vertex.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

/// An edge between two vertices, directed or undirected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub group: String,
    pub source: Vertex,
    pub dest: Vertex,
    pub directed: bool,
    #[serde(default)]
    pub properties: Properties,
}

impl Edge {
    pub fn new(
        group: impl Into<String>,
        source: impl Into<Vertex>,
        dest: impl Into<Vertex>,
        directed: bool,
    ) -> Self {
        Self {
            group: group.into(),
            source: source.into(),
            dest: dest.into(),
            directed,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// The endpoint opposite `vertex`, or `vertex` itself for a self-loop.
    ///
    /// Returns None if `vertex` is not an endpoint of this edge.
    pub fn other_endpoint(&self, vertex: &Vertex) -> Option<&Vertex> {
        if *vertex == self.source {
            Some(&self.dest)
        } else if *vertex == self.dest {
            Some(&self.source)
        } else {
            None
        }
    }
}

// ── Element ────────────────────────────────────────────────────────

/// A graph element: entity or edge. Explicit tagged variant, matched on
/// the kind everywhere instead of downcasting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Entity(Entity),
    Edge(Edge),
}

impl Element {
    pub fn group(&self) -> &str {
        match self {
            Element::Entity(e) => &e.group,
            Element::Edge(e) => &e.group,
        }
    }

    pub fn is_edge(&self) -> bool {
        matches!(self, Element::Edge(_))
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Element::Entity(_))
    }

    pub fn properties(&self) -> &Properties {
        match self {
            Element::Entity(e) => &e.properties,
            Element::Edge(e) => &e.properties,
        }
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        match self {
            Element::Entity(e) => &mut e.properties,
            Element::Edge(e) => &mut e.properties,
        }
    }

    /// Identity key for deduplication. Two elements with equal keys are
    /// the same logical result even when discovered via different scans
    /// or carrying different property snapshots.
    pub fn key(&self) -> ElementKey {
        match self {
            Element::Entity(e) => ElementKey::Entity {
                group: e.group.clone(),
                vertex: e.vertex.clone(),
            },
            Element::Edge(e) => ElementKey::Edge {
                group: e.group.clone(),
                source: e.source.clone(),
                dest: e.dest.clone(),
                directed: e.directed,
            },
        }
    }
}

impl From<Entity> for Element {
    fn from(e: Entity) -> Self {
        Element::Entity(e)
    }
}

impl From<Edge> for Element {
    fn from(e: Edge) -> Self {
        Element::Edge(e)
    }
}

/// Dedup identity: `(group, vertex)` for entities,
/// `(group, source, dest, directed)` for edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKey {
    Entity {
        group: String,
        vertex: Vertex,
    },
    Edge {
        group: String,
        source: Vertex,
        dest: Vertex,
        directed: bool,
    },
}

// ── Direction policies ─────────────────────────────────────────────

/// Element-level edge policy: keep directed edges only, undirected only,
/// or both. Entities are never affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectedType {
    Directed,
    Undirected,
    #[default]
    Either,
}

impl DirectedType {
    /// Whether an edge with the given directed flag passes this policy.
    pub fn matches(&self, directed: bool) -> bool {
        match self {
            DirectedType::Directed => directed,
            DirectedType::Undirected => !directed,
            DirectedType::Either => true,
        }
    }
}

/// Request-level incidence restriction: which incident edges a per-vertex
/// scan should cover. Within-set retrieval always forces `Either` (an
/// "outgoing" edge of a set member is meaningless for a within-set query
/// and honoring it drops cross-batch matches).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
    #[default]
    Either,
}

// ── Tests ──────────────────────────────────────────────────────────
