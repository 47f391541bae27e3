//! Transient selection state. Never serialized with the document.

use std::collections::HashSet;

use crate::graph::Graph;
use crate::ids::NodeId;

/// Currently selected node ids (a set: no order, no duplicates)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: HashSet<NodeId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole selection
    pub fn replace(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.ids = ids.into_iter().collect();
    }

    pub fn insert(&mut self, id: NodeId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        self.ids.remove(&id)
    }

    /// Add if absent, remove if present
    pub fn toggle(&mut self, id: NodeId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids.iter().copied()
    }

    pub fn as_set(&self) -> &HashSet<NodeId> {
        &self.ids
    }

    /// Selected ids in the graph's z-order, skipping ids the graph no longer has
    pub fn ordered(&self, graph: &Graph) -> Vec<NodeId> {
        graph.node_ids().filter(|id| self.ids.contains(id)).collect()
    }

    /// Drop ids that are not in the graph (after undo, recovery, ...)
    pub fn retain_existing(&mut self, graph: &Graph) {
        self.ids.retain(|id| graph.contains_node(*id));
    }
}

impl FromIterator<NodeId> for Selection {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
