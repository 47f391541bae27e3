//! Application state: one editor session plus the terminal-side modes
//! (recovery prompt, label editing, help) wrapped around it.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent};
use skyrchitect_core::{
    now_ms, Action, DiagramDocument, DocumentId, DocumentModel, Edge, Mutation, Node, NodeId, NodePatch, Position,
    ResourceKind, ShortcutRegistry, DEFAULT_DOCUMENT_NAME,
};
use skyrchitect_editor::{BoxedAutosaver, CommandDispatcher, Disposition, Editor, FocusContext, KeyInput};
use skyrchitect_session::{
    most_recent, AutosaveConfig, AutosaveStatus, Autosaver, BackgroundWriter, InlineWriter, RecoveryManager,
    RecoveryPolicy, SnapshotKey, SnapshotStore, SnapshotWriter, UserId,
};
use tracing::{info, warn};

use crate::input::to_key_input;

/// Component kinds offered by the "new node" key, in cycle order
pub const NODE_KINDS: [ResourceKind; 9] = [
    ResourceKind::Compute,
    ResourceKind::Storage,
    ResourceKind::Database,
    ResourceKind::Network,
    ResourceKind::Security,
    ResourceKind::Serverless,
    ResourceKind::Analytics,
    ResourceKind::Ml,
    ResourceKind::Container,
];

/// Horizontal distance between nodes placed with the "new node" key
const NEW_NODE_SPACING: f64 = 160.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Startup found unsaved work; waiting for recover/discard
    RecoveryPrompt,
    LabelInput { node: NodeId, text: String },
    Help,
}

/// How snapshot writes are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterMode {
    Background,
    /// Synchronous, for tests
    Inline,
}

pub struct AppOptions {
    pub store: Arc<dyn SnapshotStore>,
    pub user: UserId,
    pub document: Option<DocumentId>,
    pub autosave: AutosaveConfig,
    pub writer: WriterMode,
}

pub struct App {
    pub editor: Editor,
    pub dispatcher: CommandDispatcher,
    pub mode: Mode,
    pub running: bool,
    pub status_message: Option<String>,
    pub recovery: Option<RecoveryManager>,
    /// Kind used by the next "new node"
    pub next_kind: usize,
    store: Arc<dyn SnapshotStore>,
    user: UserId,
    autosave_config: AutosaveConfig,
    writer_mode: WriterMode,
}

impl App {
    /// Open the requested (or most recent) document, checking for unsaved
    /// work from a previous run first.
    pub fn open(options: AppOptions) -> Result<Self> {
        let AppOptions {
            store,
            user,
            document,
            autosave,
            writer,
        } = options;
        let dispatcher =
            CommandDispatcher::attach(ShortcutRegistry::defaults()).context("attaching keyboard listener")?;

        let document_id = match document {
            Some(id) => Some(id),
            None => match most_recent(store.as_ref(), &user) {
                Ok(latest) => latest.map(|snapshot| snapshot.document.id),
                Err(e) => {
                    warn!(%user, error = %e, "could not list saved documents, starting a new one");
                    None
                }
            },
        };

        let mut app = Self {
            editor: Editor::new(DocumentModel::default()),
            dispatcher,
            mode: Mode::Normal,
            running: true,
            status_message: None,
            recovery: None,
            next_kind: 0,
            store,
            user,
            autosave_config: autosave,
            writer_mode: writer,
        };

        let Some(id) = document_id else {
            let model = DocumentModel::default();
            info!(document = %model.id(), "starting new document");
            app.open_model(model, false)?;
            return Ok(app);
        };

        let key = SnapshotKey::new(app.user.clone(), id);
        let mut recovery = RecoveryManager::inspect(app.store.as_ref(), key, RecoveryPolicy::default(), now_ms());

        if recovery.show_recovery_prompt() {
            // placeholder until the user decides; nothing is saved meanwhile
            app.mode = Mode::RecoveryPrompt;
            app.recovery = Some(recovery);
            return Ok(app);
        }

        match recovery.take_resumable() {
            Some(snapshot) => {
                // a dirty snapshot outside the recovery window is rewritten clean
                let persisted = !snapshot.dirty;
                let model = DocumentModel::from_document(snapshot.document).context("stored document is invalid")?;
                info!(document = %id, version = model.version(), persisted, "resuming saved document");
                app.set_status(format!("Opened \"{}\"", model.document().name));
                app.open_model(model, persisted)?;
            }
            None if recovery.unreadable() => {
                // keep the stored copy intact; edits go to a new document
                let model = DocumentModel::default();
                warn!(document = %id, new_document = %model.id(), "saved document unreadable, starting a new one");
                app.set_status(format!("Could not read document {id}; started a new one"));
                app.open_model(model, false)?;
            }
            None => {
                let model = DocumentModel::from_document(DiagramDocument::with_id(id, DEFAULT_DOCUMENT_NAME))
                    .context("creating document")?;
                info!(document = %id, "starting new document");
                app.open_model(model, false)?;
            }
        }
        Ok(app)
    }

    fn spawn_writer(&self) -> Result<Box<dyn SnapshotWriter>> {
        let writer: Box<dyn SnapshotWriter> = match self.writer_mode {
            WriterMode::Background => {
                Box::new(BackgroundWriter::spawn(self.store.clone()).context("starting snapshot writer")?)
            }
            WriterMode::Inline => Box::new(InlineWriter::new(self.store.clone())),
        };
        Ok(writer)
    }

    fn open_model(&mut self, model: DocumentModel, persisted: bool) -> Result<()> {
        let key = SnapshotKey::new(self.user.clone(), model.id());
        let autosaver: BoxedAutosaver = Autosaver::new(
            key,
            self.autosave_config,
            self.spawn_writer()?,
            model.document(),
            persisted,
            Instant::now(),
        );
        self.editor.replace_document(model, Some(autosaver));
        Ok(())
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub fn autosave_status(&self) -> AutosaveStatus {
        self.editor.autosave_status()
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Drive autosave; call every loop iteration
    pub fn tick(&mut self, now: Instant) {
        self.editor.tick(now);
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Result<()> {
        match self.mode {
            Mode::RecoveryPrompt => self.handle_recovery_key(key),
            Mode::Help => {
                self.mode = Mode::Normal;
                Ok(())
            }
            Mode::Normal | Mode::LabelInput { .. } => {
                let Some(input) = to_key_input(&key) else {
                    return Ok(());
                };
                self.dispatch(input, now);
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, input: KeyInput, now: Instant) {
        self.dispatcher.enqueue(input);
        for dispatched in self.dispatcher.drain(&mut self.editor, now) {
            match dispatched.outcome {
                Ok(Disposition::Handled(action)) => {
                    if action == Action::Save {
                        self.set_status("Saving...");
                    }
                }
                Ok(Disposition::Suppressed(_) | Disposition::PassThrough) => {
                    if matches!(self.mode, Mode::LabelInput { .. }) {
                        self.handle_label_key(&dispatched.input, now);
                    } else {
                        self.handle_gesture(&dispatched.input, now);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "action failed");
                    self.set_status(format!("Error: {e}"));
                }
            }
        }
    }

    fn handle_recovery_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('r') | KeyCode::Enter => self.recover(),
            KeyCode::Char('d') | KeyCode::Esc => self.dismiss(),
            KeyCode::Char('q') => {
                // leave the snapshot for next time
                self.running = false;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn recover(&mut self) -> Result<()> {
        let Some(mut recovery) = self.recovery.take() else {
            return Ok(());
        };
        self.mode = Mode::Normal;
        match recovery.recover_architecture(self.store.as_ref()) {
            Some(document) => {
                let model = DocumentModel::from_document(document).context("recovered document is invalid")?;
                self.set_status(format!("Recovered \"{}\"", model.document().name));
                self.open_model(model, true)?;
            }
            None => self.open_model(DocumentModel::default(), false)?,
        }
        Ok(())
    }

    pub fn dismiss(&mut self) -> Result<()> {
        let Some(mut recovery) = self.recovery.take() else {
            return Ok(());
        };
        recovery.dismiss_recovery(self.store.as_ref());
        self.mode = Mode::Normal;
        self.set_status("Discarded unsaved work");
        self.open_model(DocumentModel::default(), false)
    }

    /// Keys with no shortcut binding: direct editing gestures
    fn handle_gesture(&mut self, input: &KeyInput, now: Instant) {
        if input.ctrl || input.alt || input.meta {
            return;
        }
        match (input.key.as_str(), input.shift) {
            ("q", false) => self.running = false,
            ("?", _) => self.mode = Mode::Help,
            ("n", false) => self.add_node(now),
            ("k", false) => {
                self.next_kind = (self.next_kind + 1) % NODE_KINDS.len();
                self.set_status(format!("New nodes: {}", NODE_KINDS[self.next_kind].name()));
            }
            ("e", false) => self.connect_selected(now),
            ("Tab", shift) => self.cycle_selection(if shift { -1 } else { 1 }),
            (" ", _) => self.toggle_cursor_selection(),
            ("Enter", _) => self.start_label_input(),
            _ => {}
        }
    }

    fn add_node(&mut self, now: Instant) {
        let kind = NODE_KINDS[self.next_kind];
        let count = self.editor.document().nodes().len() as f64;
        let mut position = Position::new(40.0 + NEW_NODE_SPACING * (count % 5.0), 40.0 + 120.0 * (count / 5.0).floor());
        if let Some(grid) = self.editor.view().snap_grid() {
            position = position.snapped(grid);
        }
        let node = Node::new(kind, format!("{} {}", kind.name(), count as usize + 1), position);
        let id = node.id;
        match self.editor.apply(Mutation::AddNode(node), now) {
            Ok(_) => self.editor.selection_mut().replace([id]),
            Err(e) => self.set_status(format!("Error: {e}")),
        }
    }

    /// Connect two selected nodes, in document order
    fn connect_selected(&mut self, now: Instant) {
        let ids = self.editor.selection().ordered(self.editor.model().graph());
        let [source, target] = ids[..] else {
            self.set_status("Select exactly two nodes to connect");
            return;
        };
        match self.editor.apply(Mutation::AddEdge(Edge::new(source, target)), now) {
            Ok(_) => self.set_status("Connected"),
            Err(e) => self.set_status(format!("Error: {e}")),
        }
    }

    /// Node the keyboard cursor is on: the last selected in document order
    pub fn cursor_node(&self) -> Option<NodeId> {
        self.editor.selection().ordered(self.editor.model().graph()).last().copied()
    }

    fn cycle_selection(&mut self, step: isize) {
        let ids: Vec<NodeId> = self.editor.model().graph().node_ids().collect();
        if ids.is_empty() {
            return;
        }
        let len = ids.len() as isize;
        let next = match self.cursor_node().and_then(|c| ids.iter().position(|id| *id == c)) {
            Some(i) => (i as isize + step).rem_euclid(len),
            None if step > 0 => 0,
            None => len - 1,
        };
        self.editor.selection_mut().replace([ids[next as usize]]);
    }

    /// Extend the selection with the node after the cursor
    fn toggle_cursor_selection(&mut self) {
        let ids: Vec<NodeId> = self.editor.model().graph().node_ids().collect();
        let Some(cursor) = self.cursor_node() else {
            return;
        };
        let Some(i) = ids.iter().position(|id| *id == cursor) else {
            return;
        };
        if let Some(next) = ids.get(i + 1) {
            self.editor.selection_mut().insert(*next);
        }
    }

    fn start_label_input(&mut self) {
        let selection = self.editor.selection();
        if selection.len() != 1 {
            self.set_status("Select one node to rename");
            return;
        }
        let Some(node) = self.cursor_node().and_then(|id| self.editor.model().graph().node(id)) else {
            return;
        };
        self.mode = Mode::LabelInput {
            node: node.id,
            text: node.label.clone(),
        };
        self.dispatcher.set_focus(FocusContext::TextInput);
    }

    fn handle_label_key(&mut self, input: &KeyInput, now: Instant) {
        let Mode::LabelInput { node, text } = &mut self.mode else {
            return;
        };
        match input.key.as_str() {
            "Enter" => {
                let mutation = Mutation::UpdateNode {
                    id: *node,
                    patch: NodePatch::label(text.trim()),
                };
                self.finish_label_input();
                if let Err(e) = self.editor.apply(mutation, now) {
                    self.set_status(format!("Error: {e}"));
                }
            }
            "Escape" => self.finish_label_input(),
            "Backspace" => {
                text.pop();
            }
            key if !input.ctrl && !input.alt && key.chars().count() == 1 => text.push_str(key),
            _ => {}
        }
    }

    fn finish_label_input(&mut self) {
        self.mode = Mode::Normal;
        self.dispatcher.set_focus(FocusContext::Canvas);
    }

    /// Flush what is unsaved. The writer is joined when the editor drops.
    pub fn shutdown(&mut self) {
        if self.mode == Mode::RecoveryPrompt {
            return;
        }
        if self.editor.autosave().is_some() {
            let now = Instant::now();
            self.editor.tick(now);
            if let Err(e) = self.editor.invoke(Action::Save, now) {
                warn!(error = %e, "final save failed");
            }
        }
        info!(document = %self.editor.model().id(), version = self.editor.model().version(), "shutting down");
    }
}
