//! What gets persisted: a full document copy plus save bookkeeping.

use std::fmt;

use serde::{Deserialize, Serialize};
use skyrchitect_core::{DiagramDocument, DocumentId};

/// On-disk format revision
pub const SNAPSHOT_FORMAT: u32 = 1;

/// Opaque identity supplied by the auth layer. Only used to namespace snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistence key: one snapshot per (user, document)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub user: UserId,
    pub document: DocumentId,
}

impl SnapshotKey {
    pub fn new(user: UserId, document: DocumentId) -> Self {
        Self { user, document }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.document)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub format: u32,
    pub document: DiagramDocument,
    pub version: u64,
    /// Milliseconds since the Unix epoch
    pub saved_at: u64,
    /// The live document moved on after this snapshot was taken and the newer
    /// state has not been confirmed written.
    pub dirty: bool,
}

impl PersistedSnapshot {
    /// Clean snapshot of `document` as of `saved_at`
    pub fn capture(document: &DiagramDocument, saved_at: u64) -> Self {
        Self {
            format: SNAPSHOT_FORMAT,
            document: document.clone(),
            version: document.version,
            saved_at,
            dirty: false,
        }
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.saved_at)
    }
}
