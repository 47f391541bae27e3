use thiserror::Error;

use crate::ids::{EdgeId, NodeId};

/// A mutation was rejected. The document is unchanged when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("node {0} does not exist")]
    MissingNode(NodeId),
    #[error("edge {0} does not exist")]
    MissingEdge(EdgeId),
    #[error("node id {0} is already in use")]
    DuplicateNode(NodeId),
    #[error("edge id {0} is already in use")]
    DuplicateEdge(EdgeId),
    #[error("edge {edge} references missing node {node}")]
    DanglingEdge { edge: EdgeId, node: NodeId },
}
