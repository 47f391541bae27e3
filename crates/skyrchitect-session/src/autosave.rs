//! Autosave scheduling.
//!
//! `AutosaveEngine` is a pure state machine: it is told about document
//! versions and the current `Instant`, and answers with commands (write a
//! snapshot, flag the stored one dirty). It never touches storage or clocks
//! itself. `Autosaver` glues an engine to a `SnapshotWriter`.
//!
//! Two triggers request a flush:
//! - debounce: a quiet period after the last mutation
//! - interval: a periodic tick that forces a flush while dirty, so a steady
//!   stream of edits is still persisted
//!
//! At most one snapshot write is outstanding. A trigger that fires while a
//! write is in flight is not lost: the debounce stays armed and a missed
//! interval tick is held until the write completes.

use std::time::{Duration, Instant};

use skyrchitect_core::{now_ms, DiagramDocument};
use tracing::{debug, info, warn};

use crate::snapshot::{PersistedSnapshot, SnapshotKey};
use crate::writer::{JobKind, SnapshotWriter, WriteJob};

pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub debounce: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_AUTOSAVE_INTERVAL,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Why a flush was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Debounce,
    Interval,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveCommand {
    /// Write a snapshot of the document at `version`
    Flush { version: u64, reason: FlushReason },
    /// The document just went from clean to dirty; flag the stored snapshot
    MarkDirty,
}

/// What the UI shows about persistence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutosaveStatus {
    pub saving: bool,
    pub has_unsaved_changes: bool,
    /// Wall-clock milliseconds of the last confirmed write
    pub last_saved_at: Option<u64>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct AutosaveEngine {
    config: AutosaveConfig,
    observed_version: u64,
    saved_version: Option<u64>,
    dirty: bool,
    debounce_deadline: Option<Instant>,
    next_tick: Instant,
    /// An interval tick passed while a write was in flight
    interval_due: bool,
    in_flight: Option<u64>,
    marker_pending: bool,
    last_saved_at: Option<u64>,
    last_error: Option<String>,
}

impl AutosaveEngine {
    /// Start tracking a document currently at `version`.
    /// `persisted` says whether storage already holds that exact version.
    pub fn new(config: AutosaveConfig, version: u64, persisted: bool, now: Instant) -> Self {
        let config = AutosaveConfig {
            interval: config.interval.max(MIN_PERIOD),
            ..config
        };
        Self {
            config,
            observed_version: version,
            saved_version: persisted.then_some(version),
            dirty: !persisted,
            debounce_deadline: None,
            next_tick: now + config.interval,
            interval_due: false,
            in_flight: None,
            marker_pending: false,
            last_saved_at: None,
            last_error: None,
        }
    }

    pub fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn saved_version(&self) -> Option<u64> {
        self.saved_version
    }

    /// Record the document version after a mutation. Returns whether it was new.
    pub fn observe(&mut self, version: u64, now: Instant) -> bool {
        if version <= self.observed_version {
            return false;
        }
        self.observed_version = version;

        if !self.dirty && (self.saved_version.is_some() || self.in_flight.is_some()) {
            self.marker_pending = true;
        }
        self.dirty = true;
        self.debounce_deadline = Some(now + self.config.debounce);
        true
    }

    /// Next command due at `now`. Call until it returns `None`.
    pub fn poll(&mut self, now: Instant) -> Option<AutosaveCommand> {
        if !self.config.enabled {
            return None;
        }

        if self.marker_pending {
            self.marker_pending = false;
            return Some(AutosaveCommand::MarkDirty);
        }

        if now >= self.next_tick {
            self.next_tick += self.config.interval;
            if self.next_tick <= now {
                // fell more than a period behind (suspend, stall): re-phase
                self.next_tick = now + self.config.interval;
            }
            self.interval_due = true;
        }

        if self.interval_due && self.in_flight.is_none() {
            self.interval_due = false;
            if self.dirty {
                return Some(self.begin_flush(FlushReason::Interval));
            }
        }

        if let Some(deadline) = self.debounce_deadline {
            if now >= deadline && self.in_flight.is_none() {
                self.debounce_deadline = None;
                if self.dirty {
                    return Some(self.begin_flush(FlushReason::Debounce));
                }
            }
        }

        None
    }

    /// Explicit save request. Works even when autosave is disabled.
    /// Returns `None` when there is nothing to write or a write is already out.
    pub fn flush_now(&mut self) -> Option<AutosaveCommand> {
        if self.in_flight.is_some() {
            debug!("manual save skipped: write already in flight");
            return None;
        }
        if !self.dirty {
            return None;
        }
        Some(self.begin_flush(FlushReason::Manual))
    }

    fn begin_flush(&mut self, reason: FlushReason) -> AutosaveCommand {
        let version = self.observed_version;
        self.in_flight = Some(version);
        self.dirty = false;
        debug!(version, ?reason, "autosave flush started");
        AutosaveCommand::Flush { version, reason }
    }

    /// Report the outcome of the outstanding snapshot write
    pub fn complete_flush(&mut self, version: u64, saved_at: u64, result: Result<(), String>) {
        if self.in_flight.take() != Some(version) {
            warn!(version, "completion for a write that was not in flight");
        }
        match result {
            Ok(()) => {
                self.saved_version = Some(self.saved_version.map_or(version, |v| v.max(version)));
                self.last_saved_at = Some(saved_at);
                self.last_error = None;
                debug!(version, "autosave confirmed");
            }
            Err(error) => {
                // no immediate retry; the next trigger picks it up
                self.dirty = true;
                warn!(version, %error, "autosave failed");
                self.last_error = Some(error);
            }
        }
    }

    pub fn status(&self) -> AutosaveStatus {
        AutosaveStatus {
            saving: self.in_flight.is_some(),
            has_unsaved_changes: self.dirty && self.in_flight.is_none(),
            last_saved_at: self.last_saved_at,
            last_error: self.last_error.clone(),
        }
    }

    /// Earliest instant at which `poll` may produce a command
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.config.enabled {
            return None;
        }
        match self.debounce_deadline {
            Some(debounce) => Some(debounce.min(self.next_tick)),
            None => Some(self.next_tick),
        }
    }
}

/// An engine bound to a writer and the storage key of one document
pub struct Autosaver<W> {
    engine: AutosaveEngine,
    writer: W,
    key: SnapshotKey,
}

impl<W: SnapshotWriter> Autosaver<W> {
    pub fn new(key: SnapshotKey, config: AutosaveConfig, writer: W, document: &DiagramDocument, persisted: bool, now: Instant) -> Self {
        info!(%key, version = document.version, persisted, enabled = config.enabled, "autosave attached");
        Self {
            engine: AutosaveEngine::new(config, document.version, persisted, now),
            writer,
            key,
        }
    }

    pub fn key(&self) -> &SnapshotKey {
        &self.key
    }

    pub fn engine(&self) -> &AutosaveEngine {
        &self.engine
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn status(&self) -> AutosaveStatus {
        self.engine.status()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.engine.next_deadline()
    }

    /// Call after every accepted mutation
    pub fn observe(&mut self, document: &DiagramDocument, now: Instant) {
        self.engine.observe(document.version, now);
    }

    /// Collect finished writes, then start whatever is due
    pub fn tick(&mut self, document: &DiagramDocument, now: Instant) {
        self.drain_completions();
        while let Some(command) = self.engine.poll(now) {
            self.run(command, document);
        }
    }

    /// Save immediately if anything is unsaved. Returns whether a write was queued.
    pub fn save_now(&mut self, document: &DiagramDocument) -> bool {
        self.drain_completions();
        match self.engine.flush_now() {
            Some(command) => {
                self.run(command, document);
                true
            }
            None => false,
        }
    }

    fn run(&mut self, command: AutosaveCommand, document: &DiagramDocument) {
        match command {
            AutosaveCommand::Flush { version, reason } => {
                if version != document.version {
                    warn!(expected = version, actual = document.version, "autosave saw an unobserved mutation");
                }
                let snapshot = PersistedSnapshot::capture(document, now_ms());
                debug!(key = %self.key, version = snapshot.version, ?reason, "submitting snapshot");
                self.writer.submit(WriteJob::Snapshot {
                    key: self.key.clone(),
                    snapshot,
                });
            }
            AutosaveCommand::MarkDirty => {
                self.writer.submit(WriteJob::MarkDirty { key: self.key.clone() });
            }
        }
    }

    fn drain_completions(&mut self) {
        while let Some(completion) = self.writer.poll_completion() {
            match completion.job {
                JobKind::Snapshot { version, saved_at } => {
                    self.engine
                        .complete_flush(version, saved_at, completion.result.map_err(|e| e.to_string()));
                }
                JobKind::DirtyMarker => {
                    if let Err(e) = completion.result {
                        warn!(key = %self.key, error = %e, "could not mark snapshot dirty");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::UserId;
    use crate::store::{MemoryStore, SnapshotStore};
    use crate::writer::InlineWriter;
    use skyrchitect_core::{DocumentModel, Mutation, Node, Position, ResourceKind};

    fn config(interval_ms: u64, debounce_ms: u64) -> AutosaveConfig {
        AutosaveConfig {
            enabled: true,
            interval: Duration::from_millis(interval_ms),
            debounce: Duration::from_millis(debounce_ms),
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn debounce_fires_after_quiet_period() {
        let t0 = Instant::now();
        let mut engine = AutosaveEngine::new(config(30_000, 2_000), 0, true, t0);

        engine.observe(1, t0);
        assert_eq!(engine.poll(t0 + ms(1_999)), None);
        assert_eq!(
            engine.poll(t0 + ms(2_000)),
            Some(AutosaveCommand::Flush { version: 1, reason: FlushReason::Debounce })
        );
    }

    #[test]
    fn first_change_after_save_requests_dirty_marker() {
        let t0 = Instant::now();
        let mut engine = AutosaveEngine::new(config(30_000, 2_000), 5, true, t0);
        engine.observe(6, t0);
        assert_eq!(engine.poll(t0), Some(AutosaveCommand::MarkDirty));
        engine.observe(7, t0);
        assert_eq!(engine.poll(t0), None);
    }

    #[test]
    fn stale_versions_are_ignored() {
        let t0 = Instant::now();
        let mut engine = AutosaveEngine::new(config(30_000, 2_000), 3, true, t0);
        assert!(!engine.observe(3, t0));
        assert!(!engine.observe(2, t0));
        assert!(!engine.is_dirty());
    }

    #[test]
    fn burst_of_edits_is_persisted_by_interval_ticks() {
        let t0 = Instant::now();
        let mut engine = AutosaveEngine::new(config(3_000, 2_000), 0, true, t0);
        let mut version = 0;
        let mut interval_flushes = 0;
        let mut debounce_flushes = 0;

        let mut elapsed = 0;
        while elapsed <= 12_000 {
            let now = t0 + ms(elapsed);
            if elapsed < 10_000 && elapsed % 500 == 0 {
                version += 1;
                engine.observe(version, now);
            }
            while let Some(command) = engine.poll(now) {
                if let AutosaveCommand::Flush { version, reason } = command {
                    match reason {
                        FlushReason::Interval => interval_flushes += 1,
                        FlushReason::Debounce => debounce_flushes += 1,
                        FlushReason::Manual => unreachable!(),
                    }
                    engine.complete_flush(version, elapsed, Ok(()));
                }
            }
            elapsed += 100;
        }

        assert!(interval_flushes >= 1);
        assert!(interval_flushes <= 10_000_u64.div_ceil(3_000) as usize);
        assert_eq!(debounce_flushes, 1);
        assert_eq!(engine.saved_version(), Some(version));
        assert!(!engine.status().has_unsaved_changes);
    }

    #[test]
    fn debounce_waits_for_in_flight_write() {
        let t0 = Instant::now();
        let mut engine = AutosaveEngine::new(config(60_000, 1_000), 0, true, t0);
        engine.observe(1, t0);
        let _marker = engine.poll(t0);
        assert!(matches!(engine.poll(t0 + ms(1_000)), Some(AutosaveCommand::Flush { version: 1, .. })));

        // edit while the write is out
        engine.observe(2, t0 + ms(1_100));
        assert_eq!(engine.poll(t0 + ms(1_100)), Some(AutosaveCommand::MarkDirty));
        assert_eq!(engine.poll(t0 + ms(2_500)), None);
        assert!(engine.status().saving);
        assert!(!engine.status().has_unsaved_changes);

        engine.complete_flush(1, 1, Ok(()));
        assert!(engine.status().has_unsaved_changes);
        assert_eq!(
            engine.poll(t0 + ms(2_500)),
            Some(AutosaveCommand::Flush { version: 2, reason: FlushReason::Debounce })
        );
    }

    #[test]
    fn interval_tick_during_write_runs_after_completion() {
        let t0 = Instant::now();
        let mut engine = AutosaveEngine::new(config(3_000, 2_000), 0, true, t0);
        engine.observe(1, t0);
        assert_eq!(engine.poll(t0), Some(AutosaveCommand::MarkDirty));
        assert!(matches!(engine.poll(t0 + ms(2_000)), Some(AutosaveCommand::Flush { version: 1, .. })));

        engine.observe(2, t0 + ms(2_500));
        assert_eq!(engine.poll(t0 + ms(2_500)), Some(AutosaveCommand::MarkDirty));
        // the tick lands while version 1 is still being written
        assert_eq!(engine.poll(t0 + ms(3_000)), None);

        engine.complete_flush(1, 1, Ok(()));
        // before the debounce deadline and the next tick
        assert_eq!(
            engine.poll(t0 + ms(3_100)),
            Some(AutosaveCommand::Flush { version: 2, reason: FlushReason::Interval })
        );
        engine.complete_flush(2, 2, Ok(()));
        assert_eq!(engine.poll(t0 + ms(4_500)), None);
    }

    #[test]
    fn failed_write_keeps_document_dirty_without_retry_storm() {
        let t0 = Instant::now();
        let mut engine = AutosaveEngine::new(config(5_000, 1_000), 0, true, t0);
        engine.observe(1, t0);
        let _marker = engine.poll(t0);
        assert!(engine.poll(t0 + ms(1_000)).is_some());
        engine.complete_flush(1, 0, Err("disk full".into()));

        let status = engine.status();
        assert!(status.has_unsaved_changes);
        assert_eq!(status.last_error.as_deref(), Some("disk full"));
        assert_eq!(engine.poll(t0 + ms(1_001)), None);

        // next interval tick retries
        assert_eq!(
            engine.poll(t0 + ms(5_000)),
            Some(AutosaveCommand::Flush { version: 1, reason: FlushReason::Interval })
        );
        engine.complete_flush(1, 10, Ok(()));
        assert_eq!(engine.status().last_error, None);
        assert_eq!(engine.status().last_saved_at, Some(10));
    }

    #[test]
    fn manual_flush_ignores_disabled_autosave() {
        let t0 = Instant::now();
        let mut engine = AutosaveEngine::new(
            AutosaveConfig {
                enabled: false,
                ..AutosaveConfig::default()
            },
            0,
            true,
            t0,
        );
        engine.observe(1, t0);
        assert_eq!(engine.poll(t0 + Duration::from_secs(120)), None);
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(
            engine.flush_now(),
            Some(AutosaveCommand::Flush { version: 1, reason: FlushReason::Manual })
        );
        assert_eq!(engine.flush_now(), None);
    }

    #[test]
    fn unpersisted_document_starts_dirty() {
        let t0 = Instant::now();
        let mut engine = AutosaveEngine::new(config(1_000, 500), 0, false, t0);
        assert!(engine.is_dirty());
        assert_eq!(
            engine.poll(t0 + ms(1_000)),
            Some(AutosaveCommand::Flush { version: 0, reason: FlushReason::Interval })
        );
    }

    #[test]
    fn autosaver_writes_through_store() {
        let t0 = Instant::now();
        let store = MemoryStore::new();
        let mut model = DocumentModel::new("autosaved");
        let key = SnapshotKey::new(UserId::new("u"), model.id());
        let mut saver = Autosaver::new(
            key.clone(),
            config(30_000, 2_000),
            InlineWriter::new(store.clone()),
            model.document(),
            false,
            t0,
        );

        model
            .apply(Mutation::AddNode(Node::new(ResourceKind::Compute, "api", Position::new(0.0, 0.0))))
            .unwrap();
        saver.observe(model.document(), t0);
        saver.tick(model.document(), t0 + ms(2_000));
        // completion is collected on the next tick
        saver.tick(model.document(), t0 + ms(2_001));

        let stored = store.get(&key).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert!(!stored.dirty);
        assert_eq!(stored.document.nodes().len(), 1);
        assert!(saver.status().last_saved_at.is_some());
        assert!(!saver.status().has_unsaved_changes);

        model
            .apply(Mutation::AddNode(Node::new(ResourceKind::Storage, "bucket", Position::new(0.0, 0.0))))
            .unwrap();
        saver.observe(model.document(), t0 + ms(3_000));
        saver.tick(model.document(), t0 + ms(3_000));
        let stored = store.get(&key).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert!(stored.dirty);

        assert!(saver.save_now(model.document()));
        let stored = store.get(&key).unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert!(!stored.dirty);
    }
}
