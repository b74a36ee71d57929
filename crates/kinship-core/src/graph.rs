//! In-memory relationship graph
//!
//! A directed, labeled multigraph of contacts. Edges are unique by
//! (source, target, kind); reciprocal edges are stored independently and
//! only ever created here, through [`RelationshipGraph::derive_reciprocals`].

use crate::contact::{ContactId, ContactNode, Gender};
use crate::error::{Error, Result};
use crate::taxonomy::RelationKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A directed, typed relationship: `target` is `source`'s `kind`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub kind: RelationKind,
    pub source: ContactId,
    pub target: ContactId,
}

impl RelationshipEdge {
    pub fn new(source: ContactId, target: ContactId, kind: RelationKind) -> Self {
        Self {
            kind,
            source,
            target,
        }
    }

    /// The counterpart edge that must exist in the opposite direction
    pub fn reciprocal(&self) -> Self {
        Self::new(
            self.target.clone(),
            self.source.clone(),
            self.kind.reciprocal(),
        )
    }

    pub fn touches(&self, id: &ContactId) -> bool {
        &self.source == id || &self.target == id
    }
}

impl std::fmt::Display for RelationshipEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.kind, self.target)
    }
}

/// Relationship graph over contact nodes
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    nodes: BTreeMap<ContactId, ContactNode>,
    edges: Vec<RelationshipEdge>,
    index: HashSet<RelationshipEdge>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Nodes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a node; an existing node with the same id is left untouched
    pub fn add_node(&mut self, node: ContactNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    /// Insert or replace a node
    pub fn upsert_node(&mut self, node: ContactNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &ContactId) -> Option<ContactNode> {
        let node = self.nodes.remove(id)?;
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(id));
        self.index.retain(|e| !e.touches(id));
        tracing::debug!(
            "Removed node {} and {} edges",
            id,
            before - self.edges.len()
        );
        Some(node)
    }

    pub fn node(&self, id: &ContactId) -> Option<&ContactNode> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &ContactId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ContactNode> {
        self.nodes.values()
    }

    pub fn set_gender(&mut self, id: &ContactId, gender: Gender) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| Error::ContactNotFound(id.to_string()))?;
        node.gender = gender;
        Ok(())
    }

    /// Fold `from` into `into`: every edge is rewritten onto `into` and `from`
    /// is removed. Returns the number of rewritten edges.
    pub fn merge_node(&mut self, from: &ContactId, into: &ContactId) -> Result<usize> {
        if from == into {
            return Ok(0);
        }
        if !self.nodes.contains_key(into) {
            return Err(Error::ContactNotFound(into.to_string()));
        }
        let moved: Vec<RelationshipEdge> = self
            .edges
            .iter()
            .filter(|e| e.touches(from))
            .cloned()
            .collect();
        self.remove_node(from);

        let mut rewritten = 0;
        for edge in moved {
            let swap = |id: ContactId| if &id == from { into.clone() } else { id };
            let source = swap(edge.source);
            let target = swap(edge.target);
            if self.add_edge(source, target, edge.kind)? {
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Edges
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an edge; adding an existing triple is a no-op returning `false`
    pub fn add_edge(
        &mut self,
        source: ContactId,
        target: ContactId,
        kind: RelationKind,
    ) -> Result<bool> {
        for id in [&source, &target] {
            if !self.nodes.contains_key(id) {
                return Err(Error::ContactNotFound(id.to_string()));
            }
        }
        let edge = RelationshipEdge::new(source, target, kind);
        if self.index.contains(&edge) {
            return Ok(false);
        }
        self.index.insert(edge.clone());
        self.edges.push(edge);
        Ok(true)
    }

    pub fn remove_edge(&mut self, source: &ContactId, target: &ContactId, kind: RelationKind) -> bool {
        let edge = RelationshipEdge::new(source.clone(), target.clone(), kind);
        if !self.index.remove(&edge) {
            return false;
        }
        self.edges.retain(|e| e != &edge);
        true
    }

    pub fn contains_edge(&self, edge: &RelationshipEdge) -> bool {
        self.index.contains(edge)
    }

    /// All edges in insertion order
    pub fn edges(&self) -> &[RelationshipEdge] {
        &self.edges
    }

    pub fn edges_from<'a>(&'a self, id: &'a ContactId) -> impl Iterator<Item = &'a RelationshipEdge> {
        self.edges.iter().filter(move |e| &e.source == id)
    }

    pub fn edges_to<'a>(&'a self, id: &'a ContactId) -> impl Iterator<Item = &'a RelationshipEdge> {
        self.edges.iter().filter(move |e| &e.target == id)
    }

    /// Number of edges touching a node, either direction
    pub fn degree(&self, id: &ContactId) -> usize {
        self.edges.iter().filter(|e| e.touches(id)).count()
    }

    /// Edges whose reciprocal counterpart is absent
    pub fn missing_reciprocals(&self) -> Vec<RelationshipEdge> {
        self.edges
            .iter()
            .filter(|e| !self.index.contains(&e.reciprocal()))
            .cloned()
            .collect()
    }

    /// Add the reciprocal of every edge lacking one; returns the edges added
    ///
    /// Idempotent: a second call with no intervening mutation adds nothing.
    pub fn derive_reciprocals(&mut self) -> Vec<RelationshipEdge> {
        let mut added = Vec::new();
        for edge in self.missing_reciprocals() {
            let reciprocal = edge.reciprocal();
            if self.index.insert(reciprocal.clone()) {
                self.edges.push(reciprocal.clone());
                added.push(reciprocal);
            }
        }
        if !added.is_empty() {
            tracing::debug!("Derived {} reciprocal edges", added.len());
        }
        added
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
