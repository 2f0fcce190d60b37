//! Views: which element groups a query returns and which properties
//! survive projection.
//!
//! A view names the edge groups and entity groups it includes. Each
//! included group may optionally restrict the returned properties to an
//! explicit subset; an *empty* subset is meaningful and strips every
//! property. Groups without a subset pass elements through untouched.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::element::Element;

/// Per-group view definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewGroup {
    /// Properties to keep on returned elements. `None` keeps all.
    /// `Some(empty)` strips all.
    pub properties: Option<BTreeSet<String>>,
}

/// Query view: included groups plus per-group property projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    edges: BTreeMap<String, ViewGroup>,
    entities: BTreeMap<String, ViewGroup>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include an edge group, keeping all its properties.
    pub fn with_edge_group(mut self, group: impl Into<String>) -> Self {
        self.edges.insert(group.into(), ViewGroup::default());
        self
    }

    /// Include an entity group, keeping all its properties.
    pub fn with_entity_group(mut self, group: impl Into<String>) -> Self {
        self.entities.insert(group.into(), ViewGroup::default());
        self
    }

    /// Include an edge group restricted to an explicit property subset.
    /// An empty subset strips every property.
    pub fn with_edge_properties<I, S>(mut self, group: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edges.insert(
            group.into(),
            ViewGroup {
                properties: Some(properties.into_iter().map(Into::into).collect()),
            },
        );
        self
    }

    /// Include an entity group restricted to an explicit property subset.
    pub fn with_entity_properties<I, S>(mut self, group: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities.insert(
            group.into(),
            ViewGroup {
                properties: Some(properties.into_iter().map(Into::into).collect()),
            },
        );
        self
    }

    pub fn includes_edge_group(&self, group: &str) -> bool {
        self.edges.contains_key(group)
    }

    pub fn includes_entity_group(&self, group: &str) -> bool {
        self.entities.contains_key(group)
    }

    /// Whether the view includes the element's group for its kind.
    pub fn includes(&self, element: &Element) -> bool {
        match element {
            Element::Edge(e) => self.includes_edge_group(&e.group),
            Element::Entity(e) => self.includes_entity_group(&e.group),
        }
    }

    /// All groups this view can possibly return, edge and entity alike.
    /// Scans outside these groups are wasted work.
    pub fn group_restriction(&self) -> BTreeSet<String> {
        self.edges
            .keys()
            .chain(self.entities.keys())
            .cloned()
            .collect()
    }

    /// Project an element's properties down to the view's subset for its
    /// group. Elements of groups without an explicit subset pass through.
    pub fn project(&self, mut element: Element) -> Element {
        let group_def = match &element {
            Element::Edge(e) => self.edges.get(&e.group),
            Element::Entity(e) => self.entities.get(&e.group),
        };
        if let Some(ViewGroup {
            properties: Some(keep),
        }) = group_def
        {
            let keep = keep.clone();
            element
                .properties_mut()
                .retain(|name, _| keep.contains(name));
        }
        element
    }
}

// ── Tests ──────────────────────────────────────────────────────────
