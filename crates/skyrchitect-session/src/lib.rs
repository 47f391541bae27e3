//! Persistence side of a skyrchitect editing session: snapshot storage,
//! off-thread writes, autosave scheduling, crash recovery and undo history.

pub mod autosave;
pub mod history;
pub mod recovery;
pub mod snapshot;
pub mod store;
pub mod writer;

pub use autosave::{AutosaveCommand, AutosaveConfig, AutosaveEngine, AutosaveStatus, Autosaver, FlushReason};
pub use history::UndoHistory;
pub use recovery::{RecoveryManager, RecoveryPolicy, RecoveryState};
pub use snapshot::{PersistedSnapshot, SnapshotKey, UserId};
pub use store::{most_recent, FileStore, MemoryStore, SnapshotStore, StoreError};
pub use writer::{BackgroundWriter, InlineWriter, SnapshotWriter, WriteCompletion, WriteJob};
