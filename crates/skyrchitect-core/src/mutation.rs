//! The closed set of document edits. Every change to a diagram goes through
//! one of these, via `DocumentModel::apply`.

use crate::graph::Graph;
use crate::ids::{EdgeId, NodeId};
use crate::model::{CloudProvider, Config, ConnectionKind, Edge, Node, Position, ResourceKind, Size};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddNode(Node),
    /// Removes the node and every edge touching it
    RemoveNode(NodeId),
    UpdateNode { id: NodeId, patch: NodePatch },
    AddEdge(Edge),
    RemoveEdge(EdgeId),
    UpdateEdge { id: EdgeId, patch: EdgePatch },
    MoveSelection { ids: Vec<NodeId>, dx: f64, dy: f64 },
    /// Applied in order as a single all-or-nothing mutation
    Batch(Vec<Mutation>),
    /// Swap in a whole graph (undo/redo)
    ReplaceGraph(Graph),
}

impl Mutation {
    /// Remove several nodes (and their edges) as one mutation
    pub fn remove_nodes(ids: impl IntoIterator<Item = NodeId>) -> Self {
        Mutation::Batch(ids.into_iter().map(Mutation::RemoveNode).collect())
    }

    /// Insert a whole subgraph as one mutation, nodes first
    pub fn insert_graph(graph: Graph) -> Self {
        let Graph { nodes, edges } = graph;
        Mutation::Batch(
            nodes
                .into_iter()
                .map(Mutation::AddNode)
                .chain(edges.into_iter().map(Mutation::AddEdge))
                .collect(),
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mutation::AddNode(_) => "add_node",
            Mutation::RemoveNode(_) => "remove_node",
            Mutation::UpdateNode { .. } => "update_node",
            Mutation::AddEdge(_) => "add_edge",
            Mutation::RemoveEdge(_) => "remove_edge",
            Mutation::UpdateEdge { .. } => "update_edge",
            Mutation::MoveSelection { .. } => "move_selection",
            Mutation::Batch(_) => "batch",
            Mutation::ReplaceGraph(_) => "replace_graph",
        }
    }
}

/// Partial node update; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub kind: Option<ResourceKind>,
    pub provider: Option<CloudProvider>,
    pub label: Option<String>,
    pub position: Option<Position>,
    pub size: Option<Size>,
    /// Replaces the whole configuration map
    pub config: Option<Config>,
}

impl NodePatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub(crate) fn apply_to(&self, node: &mut Node) {
        if let Some(kind) = self.kind {
            node.kind = kind;
        }
        if let Some(provider) = self.provider {
            node.provider = provider;
        }
        if let Some(label) = &self.label {
            node.label.clone_from(label);
        }
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(size) = self.size {
            node.size = size;
        }
        if let Some(config) = &self.config {
            node.config.clone_from(config);
        }
    }
}

/// Partial edge update; endpoints are re-validated after patching
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgePatch {
    pub source: Option<NodeId>,
    pub target: Option<NodeId>,
    pub kind: Option<ConnectionKind>,
    /// `Some(None)` clears the label
    pub label: Option<Option<String>>,
    pub config: Option<Config>,
}

impl EdgePatch {
    pub(crate) fn apply_to(&self, edge: &mut Edge) {
        if let Some(source) = self.source {
            edge.source = source;
        }
        if let Some(target) = self.target {
            edge.target = target;
        }
        if let Some(kind) = self.kind {
            edge.kind = kind;
        }
        if let Some(label) = &self.label {
            edge.label.clone_from(label);
        }
        if let Some(config) = &self.config {
            edge.config.clone_from(config);
        }
    }
}
