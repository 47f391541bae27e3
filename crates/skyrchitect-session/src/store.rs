//! Durable snapshot storage keyed by (user, document).

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use skyrchitect_core::DocumentId;
use thiserror::Error;
use tracing::{debug, warn};

use crate::snapshot::{PersistedSnapshot, SnapshotKey, UserId, SNAPSHOT_FORMAT};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt snapshot at {location}: {source}")]
    Corrupt {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported snapshot format {found} (expected {SNAPSHOT_FORMAT})")]
    UnsupportedFormat { found: u32 },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence for snapshots.
///
/// Implementations must be safe to call from the background writer thread.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &SnapshotKey) -> Result<Option<PersistedSnapshot>, StoreError>;

    /// Replace the snapshot stored under `key`
    fn put(&self, key: &SnapshotKey, snapshot: &PersistedSnapshot) -> Result<(), StoreError>;

    /// Remove the snapshot. Missing keys are not an error.
    fn delete(&self, key: &SnapshotKey) -> Result<(), StoreError>;

    /// Documents that have a snapshot for `user`
    fn documents(&self, user: &UserId) -> Result<Vec<DocumentId>, StoreError>;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Arc<S> {
    fn get(&self, key: &SnapshotKey) -> Result<Option<PersistedSnapshot>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &SnapshotKey, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        (**self).put(key, snapshot)
    }

    fn delete(&self, key: &SnapshotKey) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn documents(&self, user: &UserId) -> Result<Vec<DocumentId>, StoreError> {
        (**self).documents(user)
    }
}

/// The most recently saved snapshot for `user`, if any.
/// Unreadable entries are skipped.
pub fn most_recent(store: &dyn SnapshotStore, user: &UserId) -> Result<Option<PersistedSnapshot>, StoreError> {
    let mut latest: Option<PersistedSnapshot> = None;
    for document in store.documents(user)? {
        let key = SnapshotKey::new(user.clone(), document);
        match store.get(&key) {
            Ok(Some(snapshot)) => {
                if latest.as_ref().is_none_or(|l| snapshot.saved_at > l.saved_at) {
                    latest = Some(snapshot);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(%key, error = %e, "skipping unreadable snapshot"),
        }
    }
    Ok(latest)
}

fn decode(location: impl Into<String>, bytes: &[u8]) -> Result<PersistedSnapshot, StoreError> {
    let snapshot: PersistedSnapshot = serde_json::from_slice(bytes).map_err(|source| StoreError::Corrupt {
        location: location.into(),
        source,
    })?;
    if snapshot.format != SNAPSHOT_FORMAT {
        return Err(StoreError::UnsupportedFormat { found: snapshot.format });
    }
    Ok(snapshot)
}

/// One JSON file per snapshot under `<root>/<user>/<document>.json`.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user: &UserId) -> PathBuf {
        self.root.join(encode_path_segment(user.as_str()))
    }

    fn path_for(&self, key: &SnapshotKey) -> PathBuf {
        self.user_dir(&key.user).join(format!("{}.json", key.document))
    }
}

/// Make a user id safe to use as a directory name. Injective, so two
/// distinct users never share a directory.
fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02x}")),
        }
    }
    if out.is_empty() {
        // a lone '%' is never produced by the escaping above
        out.push('%');
    }
    out
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl SnapshotStore for FileStore {
    fn get(&self, key: &SnapshotKey) -> Result<Option<PersistedSnapshot>, StoreError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => decode(path.display().to_string(), &bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    fn put(&self, key: &SnapshotKey, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        let dir = self.user_dir(&key.user);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(snapshot).map_err(StoreError::Encode)?;
        fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_err(&path))?;
        debug!(path = %path.display(), version = snapshot.version, dirty = snapshot.dirty, "snapshot written");
        Ok(())
    }

    fn delete(&self, key: &SnapshotKey) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    fn documents(&self, user: &UserId) -> Result<Vec<DocumentId>, StoreError> {
        let dir = self.user_dir(user);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&dir)(e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err(&dir))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse().ok()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: HashMap<SnapshotKey, Vec<u8>>,
    fail_writes: bool,
    fail_reads: bool,
    writes: usize,
}

/// In-process store. Clones share the same entries.
///
/// Entries are kept serialized so the JSON encoding is exercised exactly as
/// it is for `FileStore`. Failure switches let tests simulate a broken disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    /// Number of successful `put` calls so far
    pub fn write_count(&self) -> usize {
        self.inner.lock().writes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &SnapshotKey) -> Result<Option<PersistedSnapshot>, StoreError> {
        let inner = self.inner.lock();
        if inner.fail_reads {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        inner
            .entries
            .get(key)
            .map(|bytes| decode(key.to_string(), bytes))
            .transpose()
    }

    fn put(&self, key: &SnapshotKey, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        let bytes = serde_json::to_vec(snapshot).map_err(StoreError::Encode)?;
        inner.entries.insert(key.clone(), bytes);
        inner.writes += 1;
        Ok(())
    }

    fn delete(&self, key: &SnapshotKey) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        inner.entries.remove(key);
        Ok(())
    }

    fn documents(&self, user: &UserId) -> Result<Vec<DocumentId>, StoreError> {
        let inner = self.inner.lock();
        if inner.fail_reads {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        let mut ids: Vec<_> = inner
            .entries
            .keys()
            .filter(|k| &k.user == user)
            .map(|k| k.document)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyrchitect_core::DiagramDocument;
    use tempfile::TempDir;

    fn key(user: &str, document: &DiagramDocument) -> SnapshotKey {
        SnapshotKey::new(UserId::new(user), document.id)
    }

    #[test]
    fn file_store_round_trips_and_deletes() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        let doc = DiagramDocument::new("web tier");
        let key = key("alice", &doc);

        assert!(store.get(&key).unwrap().is_none());
        let snapshot = PersistedSnapshot::capture(&doc, 1_000);
        store.put(&key, &snapshot).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(snapshot));
        assert_eq!(store.documents(&key.user).unwrap(), vec![doc.id]);

        store.delete(&key).unwrap();
        assert!(store.get(&key).unwrap().is_none());
        // deleting twice is fine
        store.delete(&key).unwrap();
    }

    #[test]
    fn file_store_reports_corrupt_json() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        let doc = DiagramDocument::new("x");
        let key = key("bob", &doc);
        store.put(&key, &PersistedSnapshot::capture(&doc, 1)).unwrap();
        fs::write(store.path_for(&key), b"{not json").unwrap();
        assert!(matches!(store.get(&key), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn users_are_isolated() {
        let store = MemoryStore::new();
        let doc = DiagramDocument::new("shared name");
        store.put(&key("alice", &doc), &PersistedSnapshot::capture(&doc, 1)).unwrap();
        assert!(store.get(&key("bob", &doc)).unwrap().is_none());
        assert!(store.documents(&UserId::new("bob")).unwrap().is_empty());
    }

    #[test]
    fn path_segment_encoding_is_injective() {
        assert_eq!(encode_path_segment("alice"), "alice");
        assert_ne!(encode_path_segment("a/b"), encode_path_segment("a_b"));
        assert_eq!(encode_path_segment("../x"), "%2e%2e%2fx");
        assert_ne!(encode_path_segment(""), encode_path_segment("\0"));
    }

    #[test]
    fn most_recent_picks_latest_save() {
        let store = MemoryStore::new();
        let older = DiagramDocument::new("older");
        let newer = DiagramDocument::new("newer");
        store.put(&key("u", &older), &PersistedSnapshot::capture(&older, 10)).unwrap();
        store.put(&key("u", &newer), &PersistedSnapshot::capture(&newer, 20)).unwrap();

        let latest = most_recent(&store, &UserId::new("u")).unwrap().unwrap();
        assert_eq!(latest.document.name, "newer");
    }

    #[test]
    fn memory_store_failure_switches() {
        let store = MemoryStore::new();
        let doc = DiagramDocument::new("x");
        let key = key("u", &doc);
        store.set_fail_writes(true);
        assert!(store.put(&key, &PersistedSnapshot::capture(&doc, 1)).is_err());
        store.set_fail_writes(false);
        store.put(&key, &PersistedSnapshot::capture(&doc, 1)).unwrap();
        assert_eq!(store.write_count(), 1);
        store.set_fail_reads(true);
        assert!(store.get(&key).is_err());
    }
}
