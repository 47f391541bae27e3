//! Node/edge graph and the mutation rules that keep it consistent.
//!
//! Invariants held by every `Graph` reachable through `DocumentModel`:
//! - node ids are unique, edge ids are unique
//! - every edge endpoint names a node in `nodes`

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::{EdgeId, NodeId};
use crate::model::{Edge, Node};
use crate::mutation::Mutation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Insertion order is z-order
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    /// Check the structural invariants of a graph built outside the mutation path
    /// (deserialized snapshots, undo states).
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut node_ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node_ids.insert(node.id) {
                return Err(ValidationError::DuplicateNode(node.id));
            }
        }
        let mut edge_ids = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !edge_ids.insert(edge.id) {
                return Err(ValidationError::DuplicateEdge(edge.id));
            }
            for endpoint in [edge.source, edge.target] {
                if !node_ids.contains(&endpoint) {
                    return Err(ValidationError::DanglingEdge {
                        edge: edge.id,
                        node: endpoint,
                    });
                }
            }
        }
        Ok(())
    }

    /// Apply a mutation in place. Returns whether anything changed.
    ///
    /// On error the graph may be partially modified; callers apply to a
    /// scratch copy and discard it on failure.
    pub fn apply(&mut self, mutation: Mutation) -> Result<bool, ValidationError> {
        match mutation {
            Mutation::AddNode(node) => {
                if self.contains_node(node.id) {
                    return Err(ValidationError::DuplicateNode(node.id));
                }
                self.nodes.push(node);
                Ok(true)
            }
            Mutation::RemoveNode(id) => {
                let index = self
                    .nodes
                    .iter()
                    .position(|n| n.id == id)
                    .ok_or(ValidationError::MissingNode(id))?;
                self.nodes.remove(index);
                self.edges.retain(|e| !e.touches(id));
                Ok(true)
            }
            Mutation::UpdateNode { id, patch } => {
                let node = self
                    .nodes
                    .iter_mut()
                    .find(|n| n.id == id)
                    .ok_or(ValidationError::MissingNode(id))?;
                let mut patched = node.clone();
                patch.apply_to(&mut patched);
                if patched == *node {
                    return Ok(false);
                }
                *node = patched;
                Ok(true)
            }
            Mutation::AddEdge(edge) => {
                if self.edge(edge.id).is_some() {
                    return Err(ValidationError::DuplicateEdge(edge.id));
                }
                self.check_endpoints(&edge)?;
                self.edges.push(edge);
                Ok(true)
            }
            Mutation::RemoveEdge(id) => {
                let index = self
                    .edges
                    .iter()
                    .position(|e| e.id == id)
                    .ok_or(ValidationError::MissingEdge(id))?;
                self.edges.remove(index);
                Ok(true)
            }
            Mutation::UpdateEdge { id, patch } => {
                let index = self
                    .edges
                    .iter()
                    .position(|e| e.id == id)
                    .ok_or(ValidationError::MissingEdge(id))?;
                let mut patched = self.edges[index].clone();
                patch.apply_to(&mut patched);
                if patched == self.edges[index] {
                    return Ok(false);
                }
                self.check_endpoints(&patched)?;
                self.edges[index] = patched;
                Ok(true)
            }
            Mutation::MoveSelection { ids, dx, dy } => {
                let ids: HashSet<NodeId> = ids.into_iter().collect();
                if let Some(missing) = ids.iter().find(|id| !self.contains_node(**id)) {
                    return Err(ValidationError::MissingNode(*missing));
                }
                if dx == 0.0 && dy == 0.0 {
                    return Ok(false);
                }
                let mut changed = false;
                for node in self.nodes.iter_mut().filter(|n| ids.contains(&n.id)) {
                    let moved = node.position.translated(dx, dy);
                    if moved != node.position {
                        node.position = moved;
                        changed = true;
                    }
                }
                Ok(changed)
            }
            Mutation::Batch(mutations) => {
                let mut changed = false;
                for mutation in mutations {
                    changed |= self.apply(mutation)?;
                }
                Ok(changed)
            }
            Mutation::ReplaceGraph(graph) => {
                graph.validate()?;
                if graph == *self {
                    return Ok(false);
                }
                *self = graph;
                Ok(true)
            }
        }
    }

    fn check_endpoints(&self, edge: &Edge) -> Result<(), ValidationError> {
        for endpoint in [edge.source, edge.target] {
            if !self.contains_node(endpoint) {
                return Err(ValidationError::DanglingEdge {
                    edge: edge.id,
                    node: endpoint,
                });
            }
        }
        Ok(())
    }

    /// Deep copy of the given nodes (in z-order) plus the edges whose
    /// endpoints are both inside the set. Unknown ids are ignored.
    pub fn subgraph(&self, ids: &HashSet<NodeId>) -> Graph {
        Graph {
            nodes: self
                .nodes
                .iter()
                .filter(|n| ids.contains(&n.id))
                .cloned()
                .collect(),
            edges: self
                .edges
                .iter()
                .filter(|e| ids.contains(&e.source) && ids.contains(&e.target))
                .cloned()
                .collect(),
        }
    }

    /// Copy of this graph with freshly minted node and edge ids, offset by
    /// (dx, dy). Internal edges are rewired to the new node ids.
    pub fn instantiate(&self, dx: f64, dy: f64) -> Graph {
        let remap: HashMap<NodeId, NodeId> =
            self.nodes.iter().map(|n| (n.id, NodeId::new())).collect();

        let nodes = self
            .nodes
            .iter()
            .map(|n| {
                let mut copy = n.clone();
                copy.id = remap[&n.id];
                copy.position = n.position.translated(dx, dy);
                copy
            })
            .collect();

        let edges = self
            .edges
            .iter()
            .filter_map(|e| {
                let source = *remap.get(&e.source)?;
                let target = *remap.get(&e.target)?;
                let mut copy = e.clone();
                copy.id = EdgeId::new();
                copy.source = source;
                copy.target = target;
                Some(copy)
            })
            .collect();

        Graph { nodes, edges }
    }

    /// Align every node position to the grid
    pub fn snap_to_grid(&mut self, grid: f64) {
        for node in &mut self.nodes {
            node.position = node.position.snapped(grid);
        }
    }
}
