//! View-only canvas state: zoom, grid, snapping, fullscreen.
//!
//! None of this is part of the document or its snapshots.

use skyrchitect_core::{Graph, Position, Size};

pub const GRID_SIZE: f64 = 20.0;
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 5.0;
pub const ZOOM_IN_FACTOR: f64 = 1.2;
pub const ZOOM_OUT_FACTOR: f64 = 0.8;

/// Fraction of the viewport left empty around fitted content
const FIT_PADDING: f64 = 0.15;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub zoom: f64,
    /// Canvas coordinate shown at the viewport's top-left corner
    pub pan: Position,
    /// Visible area in canvas units at zoom 1
    pub viewport: Size,
    pub show_grid: bool,
    pub snap_to_grid: bool,
    pub fullscreen: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Position::default(),
            viewport: Size::new(800.0, 600.0),
            show_grid: true,
            snap_to_grid: false,
            fullscreen: false,
        }
    }
}

impl ViewState {
    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * ZOOM_IN_FACTOR);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom * ZOOM_OUT_FACTOR);
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn toggle_grid(&mut self) {
        self.show_grid = !self.show_grid;
    }

    pub fn toggle_snap(&mut self) {
        self.snap_to_grid = !self.snap_to_grid;
    }

    pub fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
    }

    /// Grid to align new or moved nodes to, if snapping is on
    pub fn snap_grid(&self) -> Option<f64> {
        self.snap_to_grid.then_some(GRID_SIZE)
    }

    /// Zoom and pan so every node is visible. An empty graph resets the view.
    pub fn fit_to_screen(&mut self, graph: &Graph) {
        let Some((min, max)) = bounds(graph) else {
            self.zoom = 1.0;
            self.pan = Position::default();
            return;
        };

        let width = (max.x - min.x).max(1.0);
        let height = (max.y - min.y).max(1.0);
        let usable = 1.0 - 2.0 * FIT_PADDING;
        let zoom = (self.viewport.width * usable / width).min(self.viewport.height * usable / height);
        self.set_zoom(zoom);

        let visible_w = self.viewport.width / self.zoom;
        let visible_h = self.viewport.height / self.zoom;
        self.pan = Position::new(
            min.x - (visible_w - width) / 2.0,
            min.y - (visible_h - height) / 2.0,
        );
    }
}

fn bounds(graph: &Graph) -> Option<(Position, Position)> {
    let mut nodes = graph.nodes.iter();
    let first = nodes.next()?;
    let mut min = first.position;
    let mut max = Position::new(first.position.x + first.size.width, first.position.y + first.size.height);
    for node in nodes {
        min.x = min.x.min(node.position.x);
        min.y = min.y.min(node.position.y);
        max.x = max.x.max(node.position.x + node.size.width);
        max.y = max.y.max(node.position.y + node.size.height);
    }
    Some((min, max))
}
