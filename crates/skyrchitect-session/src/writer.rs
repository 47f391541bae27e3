//! Off-thread snapshot writing.
//!
//! The UI thread never blocks on storage: it hands a `WriteJob` to a
//! `SnapshotWriter` and later picks up the `WriteCompletion` with a
//! non-blocking poll, the same command/event channel shape used for any
//! other background worker.

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use crate::snapshot::{PersistedSnapshot, SnapshotKey};
use crate::store::{SnapshotStore, StoreError};

/// Work for the writer
#[derive(Debug, Clone)]
pub enum WriteJob {
    /// Replace the stored snapshot
    Snapshot { key: SnapshotKey, snapshot: PersistedSnapshot },
    /// Flag the stored snapshot as stale without rewriting the document
    MarkDirty { key: SnapshotKey },
}

impl WriteJob {
    fn kind(&self) -> JobKind {
        match self {
            WriteJob::Snapshot { snapshot, .. } => JobKind::Snapshot {
                version: snapshot.version,
                saved_at: snapshot.saved_at,
            },
            WriteJob::MarkDirty { .. } => JobKind::DirtyMarker,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Snapshot { version: u64, saved_at: u64 },
    DirtyMarker,
}

#[derive(Debug)]
pub struct WriteCompletion {
    pub job: JobKind,
    pub result: Result<(), StoreError>,
}

/// Something that can persist snapshots without the caller waiting on it
pub trait SnapshotWriter {
    /// Queue a job. Jobs complete in submission order.
    fn submit(&mut self, job: WriteJob);

    /// Non-blocking check for a finished job
    fn poll_completion(&mut self) -> Option<WriteCompletion>;
}

impl<W: SnapshotWriter + ?Sized> SnapshotWriter for Box<W> {
    fn submit(&mut self, job: WriteJob) {
        (**self).submit(job);
    }

    fn poll_completion(&mut self) -> Option<WriteCompletion> {
        (**self).poll_completion()
    }
}

/// Run one job against a store
pub fn execute(store: &dyn SnapshotStore, job: WriteJob) -> WriteCompletion {
    let kind = job.kind();
    let result = match job {
        WriteJob::Snapshot { key, snapshot } => store.put(&key, &snapshot),
        WriteJob::MarkDirty { key } => mark_dirty(store, &key),
    };
    WriteCompletion { job: kind, result }
}

fn mark_dirty(store: &dyn SnapshotStore, key: &SnapshotKey) -> Result<(), StoreError> {
    match store.get(key)? {
        Some(mut snapshot) if !snapshot.dirty => {
            snapshot.dirty = true;
            store.put(key, &snapshot)
        }
        // already marked, or nothing stored yet
        _ => Ok(()),
    }
}

/// Executes jobs synchronously on `submit`. Used by tests and headless tools.
pub struct InlineWriter<S> {
    store: S,
    completed: VecDeque<WriteCompletion>,
}

impl<S: SnapshotStore> InlineWriter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            completed: VecDeque::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: SnapshotStore> SnapshotWriter for InlineWriter<S> {
    fn submit(&mut self, job: WriteJob) {
        let completion = execute(&self.store, job);
        self.completed.push_back(completion);
    }

    fn poll_completion(&mut self) -> Option<WriteCompletion> {
        self.completed.pop_front()
    }
}

enum WriterCommand {
    Job(WriteJob),
    Shutdown,
}

/// Dedicated writer thread fed through a channel.
///
/// Dropping the handle drains queued jobs and joins the thread, so a final
/// save submitted just before exit still reaches the store.
pub struct BackgroundWriter {
    command_tx: mpsc::Sender<WriterCommand>,
    completion_rx: mpsc::Receiver<WriteCompletion>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundWriter {
    pub fn spawn(store: Arc<dyn SnapshotStore>) -> io::Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (completion_tx, completion_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("snapshot-writer".into())
            .spawn(move || run_writer(store, command_rx, completion_tx))?;

        Ok(Self {
            command_tx,
            completion_rx,
            thread: Some(thread),
        })
    }
}

fn run_writer(
    store: Arc<dyn SnapshotStore>,
    command_rx: mpsc::Receiver<WriterCommand>,
    completion_tx: mpsc::Sender<WriteCompletion>,
) {
    debug!("snapshot writer started");
    while let Ok(command) = command_rx.recv() {
        match command {
            WriterCommand::Job(job) => {
                let completion = execute(&*store, job);
                if completion_tx.send(completion).is_err() {
                    // receiver gone; keep draining so queued saves still land
                    debug!("completion receiver dropped");
                }
            }
            WriterCommand::Shutdown => break,
        }
    }
    debug!("snapshot writer stopped");
}

impl SnapshotWriter for BackgroundWriter {
    fn submit(&mut self, job: WriteJob) {
        if self.command_tx.send(WriterCommand::Job(job)).is_err() {
            error!("snapshot writer thread is gone; job dropped");
        }
    }

    fn poll_completion(&mut self) -> Option<WriteCompletion> {
        self.completion_rx.try_recv().ok()
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        let _ = self.command_tx.send(WriterCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("snapshot writer thread panicked");
            }
        }
    }
}
