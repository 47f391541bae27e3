//! Document core for the skyrchitect architecture-diagram editor.
//!
//! - [`document`]: the versioned document and its single mutation path
//! - [`graph`] / [`mutation`]: node/edge graph and the edits it accepts
//! - [`selection`] / [`clipboard`]: session-only state, never persisted
//! - [`shortcuts`]: the key chord -> action table

pub mod clipboard;
pub mod document;
pub mod error;
pub mod graph;
pub mod ids;
pub mod model;
pub mod mutation;
pub mod selection;
pub mod shortcuts;

pub use clipboard::Clipboard;
pub use document::{now_ms, Applied, DiagramDocument, DocumentModel, DEFAULT_DOCUMENT_NAME};
pub use error::ValidationError;
pub use graph::Graph;
pub use ids::{DocumentId, EdgeId, NodeId};
pub use model::{CloudProvider, Config, ConnectionKind, Edge, Node, Position, ResourceKind, Size};
pub use mutation::{EdgePatch, Mutation, NodePatch};
pub use selection::Selection;
pub use shortcuts::{Action, KeyChord, Modifiers, ShortcutBinding, ShortcutConflict, ShortcutRegistry};
