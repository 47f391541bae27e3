//! The editing session: one live document plus the transient state around it
//! (selection, clipboard, history, view) and its autosaver.
//!
//! Every change to the document goes through [`Editor::apply`], whether it
//! comes from a keyboard action or a direct gesture, so history and autosave
//! see all of them.

use std::time::Instant;

use skyrchitect_core::{
    Action, Clipboard, DiagramDocument, DocumentModel, Graph, Mutation, NodeId, NodePatch, Selection, ValidationError,
};
use skyrchitect_session::{AutosaveStatus, Autosaver, SnapshotWriter, UndoHistory};
use tracing::debug;

use crate::view::ViewState;

/// Distance moved by one arrow-key press
pub const MOVE_STEP: f64 = 10.0;

/// Offset applied to duplicated nodes
pub const DUPLICATE_OFFSET: f64 = 20.0;

pub type BoxedAutosaver = Autosaver<Box<dyn SnapshotWriter>>;

pub struct Editor {
    model: DocumentModel,
    selection: Selection,
    clipboard: Clipboard,
    history: UndoHistory,
    view: ViewState,
    autosave: Option<BoxedAutosaver>,
}

impl Editor {
    pub fn new(model: DocumentModel) -> Self {
        Self {
            model,
            selection: Selection::new(),
            clipboard: Clipboard::new(),
            history: UndoHistory::default(),
            view: ViewState::default(),
            autosave: None,
        }
    }

    pub fn with_autosave(mut self, autosave: BoxedAutosaver) -> Self {
        self.autosave = Some(autosave);
        self
    }

    pub fn document(&self) -> &DiagramDocument {
        self.model.document()
    }

    pub fn model(&self) -> &DocumentModel {
        &self.model
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Selection is view-side state; changing it never touches the document
    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn autosave(&self) -> Option<&BoxedAutosaver> {
        self.autosave.as_ref()
    }

    pub fn autosave_status(&self) -> AutosaveStatus {
        self.autosave.as_ref().map(Autosaver::status).unwrap_or_default()
    }

    /// Switch to another document. Selection and history belong to the old
    /// document and are dropped; the clipboard is kept.
    pub fn replace_document(&mut self, model: DocumentModel, autosave: Option<BoxedAutosaver>) {
        debug!(document = %model.id(), version = model.version(), "document replaced");
        self.model = model;
        self.autosave = autosave;
        self.selection.clear();
        self.history.clear();
    }

    /// Apply an edit as an undoable step. Returns whether anything changed.
    pub fn apply(&mut self, mutation: Mutation, now: Instant) -> Result<bool, ValidationError> {
        let before = self.model.snapshot();
        let applied = self.model.apply(mutation)?;
        if applied.changed {
            self.history.record(&before.graph);
            self.observe(now);
        }
        Ok(applied.changed)
    }

    /// Apply without recording history (undo/redo themselves)
    fn restore(&mut self, graph: Graph, now: Instant) -> Result<bool, ValidationError> {
        let applied = self.model.apply(Mutation::ReplaceGraph(graph))?;
        if applied.changed {
            self.observe(now);
        }
        self.selection.retain_existing(self.model.graph());
        Ok(applied.changed)
    }

    fn observe(&mut self, now: Instant) {
        if let Some(autosave) = &mut self.autosave {
            autosave.observe(self.model.document(), now);
        }
    }

    /// Drive autosave timers and collect finished writes
    pub fn tick(&mut self, now: Instant) {
        if let Some(autosave) = &mut self.autosave {
            autosave.tick(self.model.document(), now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.autosave.as_ref().and_then(Autosaver::next_deadline)
    }

    /// Run one editor action. Actions on an empty selection are no-ops.
    pub fn invoke(&mut self, action: Action, now: Instant) -> Result<(), ValidationError> {
        debug!(%action, "invoke");
        match action {
            Action::Save => self.save(),
            Action::Undo => self.undo(now)?,
            Action::Redo => self.redo(now)?,
            Action::SelectAll => self.select_all(),
            Action::DeleteSelected => self.delete_selected(now)?,
            Action::ClearSelection => self.selection.clear(),
            Action::Copy => {
                self.copy();
            }
            Action::Paste => self.paste(now)?,
            Action::Cut => self.cut(now)?,
            Action::Duplicate => self.duplicate(now)?,
            Action::ToggleGrid => self.view.toggle_grid(),
            Action::ToggleSnap => self.view.toggle_snap(),
            Action::FitToScreen => self.view.fit_to_screen(self.model.graph()),
            Action::ToggleFullscreen => self.view.toggle_fullscreen(),
            Action::ZoomIn => self.view.zoom_in(),
            Action::ZoomOut => self.view.zoom_out(),
            Action::ResetZoom => self.view.reset_zoom(),
            Action::MoveUp => self.move_selection(0.0, -1.0, now)?,
            Action::MoveDown => self.move_selection(0.0, 1.0, now)?,
            Action::MoveLeft => self.move_selection(-1.0, 0.0, now)?,
            Action::MoveRight => self.move_selection(1.0, 0.0, now)?,
        }
        Ok(())
    }

    fn save(&mut self) {
        match &mut self.autosave {
            Some(autosave) => {
                if !autosave.save_now(self.model.document()) {
                    debug!("save requested with nothing to write");
                }
            }
            None => debug!("save requested without persistence"),
        }
    }

    fn undo(&mut self, now: Instant) -> Result<(), ValidationError> {
        if let Some(previous) = self.history.undo(self.model.graph()) {
            self.restore(previous, now)?;
        }
        Ok(())
    }

    fn redo(&mut self, now: Instant) -> Result<(), ValidationError> {
        if let Some(next) = self.history.redo(self.model.graph()) {
            self.restore(next, now)?;
        }
        Ok(())
    }

    fn select_all(&mut self) {
        self.selection.replace(self.model.graph().node_ids());
    }

    fn delete_selected(&mut self, now: Instant) -> Result<(), ValidationError> {
        let ids = self.selection.ordered(self.model.graph());
        if ids.is_empty() {
            return Ok(());
        }
        self.apply(Mutation::remove_nodes(ids), now)?;
        self.selection.clear();
        Ok(())
    }

    /// Returns whether the clipboard was filled
    fn copy(&mut self) -> bool {
        let subgraph = self.model.graph().subgraph(self.selection.as_set());
        self.clipboard.store(subgraph)
    }

    fn cut(&mut self, now: Instant) -> Result<(), ValidationError> {
        if self.copy() {
            self.delete_selected(now)?;
        }
        Ok(())
    }

    fn paste(&mut self, now: Instant) -> Result<(), ValidationError> {
        let Some(graph) = self.clipboard.next_paste() else {
            return Ok(());
        };
        self.insert_and_select(graph, now)
    }

    fn duplicate(&mut self, now: Instant) -> Result<(), ValidationError> {
        let subgraph = self.model.graph().subgraph(self.selection.as_set());
        if subgraph.is_empty() {
            return Ok(());
        }
        let copy = subgraph.instantiate(DUPLICATE_OFFSET, DUPLICATE_OFFSET);
        self.insert_and_select(copy, now)
    }

    fn insert_and_select(&mut self, mut graph: Graph, now: Instant) -> Result<(), ValidationError> {
        if let Some(grid) = self.view.snap_grid() {
            graph.snap_to_grid(grid);
        }
        let new_ids: Vec<NodeId> = graph.node_ids().collect();
        self.apply(Mutation::insert_graph(graph), now)?;
        self.selection.replace(new_ids);
        Ok(())
    }

    /// Move the selection one step in the given direction. With snapping on
    /// the step is one grid cell and nodes land on grid intersections.
    fn move_selection(&mut self, x: f64, y: f64, now: Instant) -> Result<(), ValidationError> {
        let ids = self.selection.ordered(self.model.graph());
        if ids.is_empty() {
            return Ok(());
        }

        let mutation = match self.view.snap_grid() {
            None => Mutation::MoveSelection {
                ids,
                dx: x * MOVE_STEP,
                dy: y * MOVE_STEP,
            },
            Some(grid) => {
                let step = grid.max(MOVE_STEP);
                let graph = self.model.graph();
                Mutation::Batch(
                    ids.into_iter()
                        .filter_map(|id| graph.node(id))
                        .map(|node| Mutation::UpdateNode {
                            id: node.id,
                            patch: NodePatch::position(
                                node.position.translated(x * step, y * step).snapped(grid),
                            ),
                        })
                        .collect(),
                )
            }
        };
        self.apply(mutation, now)?;
        Ok(())
    }
}
