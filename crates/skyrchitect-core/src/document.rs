//! The versioned diagram document - THE source of truth for diagram data.
//!
//! Every edit goes through `DocumentModel::apply`. It:
//! - validates the edit against a scratch copy (all-or-nothing)
//! - bumps `version` only when something actually changed
//! - publishes the result as an immutable, shareable snapshot

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;
use crate::graph::Graph;
use crate::ids::DocumentId;
use crate::mutation::Mutation;

pub const DEFAULT_DOCUMENT_NAME: &str = "Untitled architecture";

/// Milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One immutable state of a diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramDocument {
    pub id: DocumentId,
    pub name: String,
    #[serde(flatten)]
    pub graph: Graph,
    /// Count of effective mutations since creation
    pub version: u64,
    pub last_modified_at: u64,
}

impl DiagramDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(DocumentId::new(), name)
    }

    pub fn with_id(id: DocumentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            graph: Graph::new(),
            version: 0,
            last_modified_at: now_ms(),
        }
    }

    pub fn nodes(&self) -> &[crate::model::Node] {
        &self.graph.nodes
    }

    pub fn edges(&self) -> &[crate::model::Edge] {
        &self.graph.edges
    }
}

/// Result of an accepted mutation
#[derive(Debug, Clone)]
pub struct Applied {
    /// The document after the mutation (the previous one if nothing changed)
    pub document: Arc<DiagramDocument>,
    pub changed: bool,
}

/// Owner of the live document. The only mutation path is `apply`.
#[derive(Debug, Clone)]
pub struct DocumentModel {
    current: Arc<DiagramDocument>,
}

impl DocumentModel {
    /// Create a model around a new empty document
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            current: Arc::new(DiagramDocument::new(name)),
        }
    }

    /// Adopt a document built elsewhere (recovered snapshot, fixture).
    /// Its graph is validated first since it did not come through `apply`.
    pub fn from_document(document: DiagramDocument) -> Result<Self, ValidationError> {
        document.graph.validate()?;
        Ok(Self {
            current: Arc::new(document),
        })
    }

    pub fn document(&self) -> &DiagramDocument {
        &self.current
    }

    /// Cheap handle to the current state, safe to hand to another thread
    pub fn snapshot(&self) -> Arc<DiagramDocument> {
        Arc::clone(&self.current)
    }

    pub fn id(&self) -> DocumentId {
        self.current.id
    }

    pub fn version(&self) -> u64 {
        self.current.version
    }

    pub fn graph(&self) -> &Graph {
        &self.current.graph
    }

    pub fn apply(&mut self, mutation: Mutation) -> Result<Applied, ValidationError> {
        self.apply_at(mutation, now_ms())
    }

    /// `apply` with an explicit timestamp for `last_modified_at`
    pub fn apply_at(&mut self, mutation: Mutation, timestamp_ms: u64) -> Result<Applied, ValidationError> {
        let name = mutation.name();
        let mut graph = self.current.graph.clone();
        let changed = graph.apply(mutation)?;

        if !changed {
            debug!(op = name, version = self.current.version, "mutation was a no-op");
            return Ok(Applied {
                document: self.snapshot(),
                changed: false,
            });
        }

        let next = DiagramDocument {
            id: self.current.id,
            name: self.current.name.clone(),
            graph,
            version: self.current.version + 1,
            last_modified_at: timestamp_ms.max(self.current.last_modified_at),
        };
        debug!(op = name, version = next.version, "mutation applied");
        self.current = Arc::new(next);

        Ok(Applied {
            document: self.snapshot(),
            changed: true,
        })
    }
}

impl Default for DocumentModel {
    fn default() -> Self {
        Self::new(DEFAULT_DOCUMENT_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use crate::model::{Edge, Node, Position, ResourceKind};

    fn node(label: &str) -> Node {
        Node::new(ResourceKind::Database, label, Position::new(10.0, 10.0))
    }

    #[test]
    fn accepted_mutation_bumps_version_and_timestamp() {
        let mut model = DocumentModel::default();
        let before = model.document().last_modified_at;
        let applied = model.apply_at(Mutation::AddNode(node("db")), before + 5).unwrap();
        assert!(applied.changed);
        assert_eq!(applied.document.version, 1);
        assert_eq!(applied.document.last_modified_at, before + 5);
        assert_eq!(model.version(), 1);
    }

    #[test]
    fn failed_batch_leaves_document_untouched() {
        let mut model = DocumentModel::default();
        let a = node("a");
        let a_id = a.id;
        model.apply(Mutation::AddNode(a)).unwrap();
        let before = model.snapshot();

        let result = model.apply(Mutation::Batch(vec![
            Mutation::AddNode(node("b")),
            Mutation::AddEdge(Edge::new(a_id, NodeId::new())),
        ]));

        assert!(matches!(result, Err(ValidationError::DanglingEdge { .. })));
        assert_eq!(*model.document(), *before);
        assert_eq!(model.version(), 1);
    }

    #[test]
    fn no_op_keeps_the_same_snapshot() {
        let mut model = DocumentModel::default();
        let a = node("a");
        let id = a.id;
        model.apply(Mutation::AddNode(a)).unwrap();
        let before = model.snapshot();
        let applied = model
            .apply(Mutation::MoveSelection { ids: vec![id], dx: 0.0, dy: 0.0 })
            .unwrap();
        assert!(!applied.changed);
        assert!(Arc::ptr_eq(&before, &applied.document));
    }

    #[test]
    fn from_document_rejects_broken_graph() {
        let mut doc = DiagramDocument::new("broken");
        let a = node("a");
        doc.graph.edges.push(Edge::new(a.id, NodeId::new()));
        doc.graph.nodes.push(a);
        assert!(DocumentModel::from_document(doc).is_err());
    }

    #[test]
    fn document_json_is_flat() {
        let model = DocumentModel::new("demo");
        let json = serde_json::to_value(model.document()).unwrap();
        assert!(json.get("nodes").is_some());
        assert!(json.get("graph").is_none());
        let back: DiagramDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, *model.document());
    }
}
