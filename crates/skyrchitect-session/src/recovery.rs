//! Startup crash recovery.
//!
//! On open the stored snapshot is inspected once. If it holds work the
//! canonical copy does not, the user is offered a choice: recover it or
//! discard it. Nothing is applied silently.

use std::time::Duration;

use skyrchitect_core::DiagramDocument;
use tracing::{info, warn};

use crate::snapshot::{PersistedSnapshot, SnapshotKey};
use crate::store::SnapshotStore;

/// Snapshots older than this are not offered for recovery
pub const DEFAULT_RECOVERY_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Nothing to offer
    Idle,
    PromptShown,
    Recovered,
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// `None` offers snapshots of any age
    pub max_age: Option<Duration>,
    /// Version of the canonical (server-side) copy, when one is known
    pub canonical_version: Option<u64>,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_age: Some(DEFAULT_RECOVERY_WINDOW),
            canonical_version: None,
        }
    }
}

impl RecoveryPolicy {
    fn offers(&self, snapshot: &PersistedSnapshot, now_ms: u64) -> bool {
        let ahead = snapshot.dirty || self.canonical_version.is_some_and(|c| snapshot.version > c);
        let fresh = self
            .max_age
            .is_none_or(|max| u128::from(snapshot.age_ms(now_ms)) <= max.as_millis());
        ahead && fresh
    }
}

#[derive(Debug)]
pub struct RecoveryManager {
    key: SnapshotKey,
    state: RecoveryState,
    recovery_data: Option<PersistedSnapshot>,
    resumable: Option<PersistedSnapshot>,
    unreadable: bool,
}

impl RecoveryManager {
    /// Look at the stored snapshot for `key` and decide whether to prompt.
    ///
    /// Unreadable or inconsistent snapshots are logged and treated as absent,
    /// and `unreadable` reports that something was stored but could not be used.
    pub fn inspect(store: &dyn SnapshotStore, key: SnapshotKey, policy: RecoveryPolicy, now_ms: u64) -> Self {
        let mut unreadable = false;
        let snapshot = match store.get(&key) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(%key, error = %e, "could not read snapshot, starting without recovery");
                unreadable = true;
                None
            }
        };
        let snapshot = snapshot.filter(|s| {
            let ok = usable(&key, s);
            unreadable |= !ok;
            ok
        });

        let mut manager = Self {
            key,
            state: RecoveryState::Idle,
            recovery_data: None,
            resumable: None,
            unreadable,
        };
        let Some(snapshot) = snapshot else {
            return manager;
        };

        if policy.offers(&snapshot, now_ms) {
            info!(
                key = %manager.key,
                version = snapshot.version,
                age_ms = snapshot.age_ms(now_ms),
                "unsaved work found, offering recovery"
            );
            manager.state = RecoveryState::PromptShown;
            manager.recovery_data = Some(snapshot);
        } else {
            manager.resumable = Some(snapshot);
        }
        manager
    }

    pub fn key(&self) -> &SnapshotKey {
        &self.key
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// The stored snapshot exists or may exist, but could not be read or
    /// failed validation. Writing under this key would overwrite it.
    pub fn unreadable(&self) -> bool {
        self.unreadable
    }

    pub fn show_recovery_prompt(&self) -> bool {
        self.state == RecoveryState::PromptShown
    }

    /// The snapshot on offer while the prompt is showing
    pub fn recovery_data(&self) -> Option<&PersistedSnapshot> {
        self.recovery_data.as_ref()
    }

    /// A stored snapshot that was not offered (clean, or outside the window).
    /// It is the latest local copy and can be opened directly.
    pub fn resumable(&self) -> Option<&PersistedSnapshot> {
        self.resumable.as_ref()
    }

    pub fn take_resumable(&mut self) -> Option<PersistedSnapshot> {
        self.resumable.take()
    }

    /// Accept the offered snapshot. The stored copy is rewritten clean since
    /// it now matches the live document. Returns `None` if no prompt is open.
    pub fn recover_architecture(&mut self, store: &dyn SnapshotStore) -> Option<DiagramDocument> {
        if self.state != RecoveryState::PromptShown {
            return None;
        }
        let mut snapshot = self.recovery_data.take()?;
        self.state = RecoveryState::Recovered;

        snapshot.dirty = false;
        if let Err(e) = store.put(&self.key, &snapshot) {
            warn!(key = %self.key, error = %e, "recovered snapshot could not be marked clean");
        }
        info!(key = %self.key, version = snapshot.version, "recovered unsaved work");
        Some(snapshot.document)
    }

    /// Discard the offered snapshot
    pub fn dismiss_recovery(&mut self, store: &dyn SnapshotStore) {
        if self.state != RecoveryState::PromptShown {
            return;
        }
        self.recovery_data = None;
        self.state = RecoveryState::Dismissed;
        match store.delete(&self.key) {
            Ok(()) => info!(key = %self.key, "discarded unsaved work"),
            Err(e) => warn!(key = %self.key, error = %e, "could not delete dismissed snapshot"),
        }
    }
}

fn usable(key: &SnapshotKey, snapshot: &PersistedSnapshot) -> bool {
    if snapshot.document.id != key.document {
        warn!(%key, found = %snapshot.document.id, "snapshot belongs to another document");
        return false;
    }
    if let Err(e) = snapshot.document.graph.validate() {
        warn!(%key, error = %e, "snapshot graph is inconsistent");
        return false;
    }
    true
}
