//! Undo/redo using whole-graph snapshots.
//!
//! Diagrams are small, so keeping full copies is simpler than inverting
//! mutations. Restoring a snapshot is itself a mutation (`ReplaceGraph`), so
//! undo bumps the document version and autosave sees it like any other edit.

use std::collections::VecDeque;

use skyrchitect_core::Graph;

pub const DEFAULT_MAX_HISTORY: usize = 100;

#[derive(Debug, Clone)]
pub struct UndoHistory {
    undo_stack: VecDeque<Graph>,
    redo_stack: Vec<Graph>,
    max_history: usize,
}

impl UndoHistory {
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_history: max_history.max(1),
        }
    }

    /// Remember the state before an effective edit
    pub fn record(&mut self, before: &Graph) {
        self.undo_stack.push_back(before.clone());
        self.redo_stack.clear();
        while self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }
    }

    /// Graph to restore for an undo; `current` moves onto the redo stack
    pub fn undo(&mut self, current: &Graph) -> Option<Graph> {
        let previous = self.undo_stack.pop_back()?;
        self.redo_stack.push(current.clone());
        Some(previous)
    }

    pub fn redo(&mut self, current: &Graph) -> Option<Graph> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push_back(current.clone());
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyrchitect_core::{Node, Position, ResourceKind};

    fn graph_with(labels: &[&str]) -> Graph {
        let mut g = Graph::new();
        for label in labels {
            g.nodes.push(Node::new(ResourceKind::Compute, *label, Position::default()));
        }
        g
    }

    #[test]
    fn undo_then_redo_walks_states() {
        let mut history = UndoHistory::default();
        let empty = Graph::new();
        let one = graph_with(&["a"]);

        history.record(&empty);
        assert!(history.can_undo());
        assert_eq!(history.undo(&one), Some(empty.clone()));
        assert!(history.can_redo());
        assert_eq!(history.redo(&empty), Some(one));
        assert!(!history.can_redo());
    }

    #[test]
    fn new_edit_clears_redo() {
        let mut history = UndoHistory::default();
        history.record(&Graph::new());
        history.undo(&graph_with(&["a"]));
        history.record(&Graph::new());
        assert!(!history.can_redo());
    }

    #[test]
    fn history_is_bounded() {
        let mut history = UndoHistory::new(3);
        for i in 0..10 {
            history.record(&graph_with(&[i.to_string().as_str()]));
        }
        assert_eq!(history.undo_len(), 3);
        let oldest_kept = {
            let mut last = None;
            let current = Graph::new();
            while let Some(g) = history.undo(&current) {
                last = Some(g);
            }
            last.unwrap()
        };
        assert_eq!(oldest_kept.nodes[0].label, "7");
    }
}
