//! Session clipboard. Holds a deep copy of the last copied/cut subgraph and
//! outlives any single document.

use crate::graph::Graph;

/// Visual offset applied to each paste so copies do not stack exactly
pub const PASTE_OFFSET: f64 = 20.0;

#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    contents: Option<Graph>,
    /// Pastes since the last copy; each one lands one offset further away
    pastes: u32,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a copied subgraph. An empty subgraph leaves the clipboard as is.
    pub fn store(&mut self, subgraph: Graph) -> bool {
        if subgraph.is_empty() {
            return false;
        }
        self.contents = Some(subgraph);
        self.pastes = 0;
        true
    }

    pub fn contents(&self) -> Option<&Graph> {
        self.contents.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_none()
    }

    /// Fresh-id instance of the clipboard, offset further on every call
    pub fn next_paste(&mut self) -> Option<Graph> {
        let contents = self.contents.as_ref()?;
        self.pastes += 1;
        let offset = PASTE_OFFSET * f64::from(self.pastes);
        Some(contents.instantiate(offset, offset))
    }
}
