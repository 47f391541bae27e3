//! Keyboard shortcut table: (key, modifier set) -> editor action.
//!
//! Pure lookup with no state. Keys are matched case-insensitively and the
//! modifier set has set semantics, so `ctrl+shift+z` and `shift+ctrl+Z` are
//! the same chord while `ctrl+z` is a different one.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every command the editor understands, whether triggered by a key or a toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Save,
    Undo,
    Redo,
    SelectAll,
    DeleteSelected,
    ClearSelection,
    Copy,
    Paste,
    Cut,
    Duplicate,
    ToggleGrid,
    ToggleSnap,
    FitToScreen,
    ToggleFullscreen,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
}

impl Action {
    pub const ALL: [Action; 21] = [
        Action::Save,
        Action::Undo,
        Action::Redo,
        Action::SelectAll,
        Action::DeleteSelected,
        Action::ClearSelection,
        Action::Copy,
        Action::Paste,
        Action::Cut,
        Action::Duplicate,
        Action::ToggleGrid,
        Action::ToggleSnap,
        Action::FitToScreen,
        Action::ToggleFullscreen,
        Action::ZoomIn,
        Action::ZoomOut,
        Action::ResetZoom,
        Action::MoveUp,
        Action::MoveDown,
        Action::MoveLeft,
        Action::MoveRight,
    ];

    /// Stable identifier, as used in configuration and toolbars
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Save => "save",
            Action::Undo => "undo",
            Action::Redo => "redo",
            Action::SelectAll => "select_all",
            Action::DeleteSelected => "delete_selected",
            Action::ClearSelection => "clear_selection",
            Action::Copy => "copy",
            Action::Paste => "paste",
            Action::Cut => "cut",
            Action::Duplicate => "duplicate",
            Action::ToggleGrid => "toggle_grid",
            Action::ToggleSnap => "toggle_snap",
            Action::FitToScreen => "fit_to_screen",
            Action::ToggleFullscreen => "toggle_fullscreen",
            Action::ZoomIn => "zoom_in",
            Action::ZoomOut => "zoom_out",
            Action::ResetZoom => "reset_zoom",
            Action::MoveUp => "move_up",
            Action::MoveDown => "move_down",
            Action::MoveLeft => "move_left",
            Action::MoveRight => "move_right",
        }
    }

    /// Actions that only touch view state and never the document
    pub fn is_view_only(self) -> bool {
        matches!(
            self,
            Action::ToggleGrid
                | Action::ToggleSnap
                | Action::FitToScreen
                | Action::ToggleFullscreen
                | Action::ZoomIn
                | Action::ZoomOut
                | Action::ResetZoom
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// Modifier set. Order is irrelevant by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { ctrl: false, shift: false, alt: false };
    pub const CTRL: Modifiers = Modifiers { ctrl: true, shift: false, alt: false };
    pub const CTRL_SHIFT: Modifiers = Modifiers { ctrl: true, shift: true, alt: false };

    pub fn new(ctrl: bool, shift: bool, alt: bool) -> Self {
        Self { ctrl, shift, alt }
    }
}

/// Normalized (key, modifiers) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyChord {
    key: String,
    modifiers: Modifiers,
}

impl KeyChord {
    pub fn new(key: &str, modifiers: Modifiers) -> Self {
        Self {
            key: normalize_key(key),
            modifiers,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        f.write_str(&self.key)
    }
}

/// Lowercase the key label and fold common aliases onto one spelling
pub fn normalize_key(key: &str) -> String {
    let lower = key.to_lowercase();
    match lower.as_str() {
        "esc" => "escape".to_string(),
        "del" => "delete".to_string(),
        "up" => "arrowup".to_string(),
        "down" => "arrowdown".to_string(),
        "left" => "arrowleft".to_string(),
        "right" => "arrowright".to_string(),
        "spacebar" | "space" => " ".to_string(),
        _ => lower,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutBinding {
    pub chord: KeyChord,
    pub action: Action,
    pub description: String,
}

impl ShortcutBinding {
    pub fn new(key: &str, modifiers: Modifiers, action: Action, description: impl Into<String>) -> Self {
        Self {
            chord: KeyChord::new(key, modifiers),
            action,
            description: description.into(),
        }
    }
}

/// A chord was registered twice
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{chord} is already bound to {existing}, refusing to rebind it to {rejected}")]
pub struct ShortcutConflict {
    pub chord: KeyChord,
    pub existing: Action,
    pub rejected: Action,
}

/// Default table, in help-display order
const DEFAULT_SHORTCUTS: &[(&str, Modifiers, Action, &str)] = &[
    ("s", Modifiers::CTRL, Action::Save, "Save diagram"),
    ("z", Modifiers::CTRL, Action::Undo, "Undo last action"),
    ("y", Modifiers::CTRL, Action::Redo, "Redo last action"),
    ("z", Modifiers::CTRL_SHIFT, Action::Redo, "Redo last action (alternative)"),
    ("a", Modifiers::CTRL, Action::SelectAll, "Select all nodes"),
    ("Delete", Modifiers::NONE, Action::DeleteSelected, "Delete selected nodes"),
    ("Backspace", Modifiers::NONE, Action::DeleteSelected, "Delete selected nodes"),
    ("Escape", Modifiers::NONE, Action::ClearSelection, "Clear selection"),
    ("c", Modifiers::CTRL, Action::Copy, "Copy selected nodes"),
    ("v", Modifiers::CTRL, Action::Paste, "Paste nodes"),
    ("x", Modifiers::CTRL, Action::Cut, "Cut selected nodes"),
    ("d", Modifiers::CTRL, Action::Duplicate, "Duplicate selected nodes"),
    ("g", Modifiers::CTRL, Action::ToggleGrid, "Toggle grid visibility"),
    ("g", Modifiers::CTRL_SHIFT, Action::ToggleSnap, "Toggle snap to grid"),
    ("f", Modifiers::CTRL, Action::FitToScreen, "Fit diagram to screen"),
    ("F11", Modifiers::NONE, Action::ToggleFullscreen, "Toggle fullscreen mode"),
    ("+", Modifiers::CTRL, Action::ZoomIn, "Zoom in"),
    ("=", Modifiers::CTRL, Action::ZoomIn, "Zoom in"),
    ("-", Modifiers::CTRL, Action::ZoomOut, "Zoom out"),
    ("0", Modifiers::CTRL, Action::ResetZoom, "Reset zoom to 100%"),
    ("ArrowUp", Modifiers::NONE, Action::MoveUp, "Move selected nodes up"),
    ("ArrowDown", Modifiers::NONE, Action::MoveDown, "Move selected nodes down"),
    ("ArrowLeft", Modifiers::NONE, Action::MoveLeft, "Move selected nodes left"),
    ("ArrowRight", Modifiers::NONE, Action::MoveRight, "Move selected nodes right"),
];

#[derive(Debug, Clone, Default)]
pub struct ShortcutRegistry {
    bindings: Vec<ShortcutBinding>,
    index: HashMap<KeyChord, usize>,
}

impl ShortcutRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table.
    ///
    /// # Panics
    /// If the built-in table binds a chord twice.
    pub fn defaults() -> Self {
        let bindings = DEFAULT_SHORTCUTS
            .iter()
            .map(|(key, mods, action, desc)| ShortcutBinding::new(key, *mods, *action, *desc));
        Self::from_bindings(bindings).expect("default shortcut table binds a chord twice")
    }

    pub fn from_bindings(
        bindings: impl IntoIterator<Item = ShortcutBinding>,
    ) -> Result<Self, ShortcutConflict> {
        let mut registry = Self::new();
        for binding in bindings {
            registry.register(binding)?;
        }
        Ok(registry)
    }

    /// Add a binding. A chord that is already bound is rejected and the
    /// existing binding stays in place.
    pub fn register(&mut self, binding: ShortcutBinding) -> Result<(), ShortcutConflict> {
        if let Some(&existing) = self.index.get(&binding.chord) {
            return Err(ShortcutConflict {
                chord: binding.chord,
                existing: self.bindings[existing].action,
                rejected: binding.action,
            });
        }
        self.index.insert(binding.chord.clone(), self.bindings.len());
        self.bindings.push(binding);
        Ok(())
    }

    pub fn lookup(&self, chord: &KeyChord) -> Option<Action> {
        self.index.get(chord).map(|&i| self.bindings[i].action)
    }

    /// Normalize and look up in one step
    pub fn resolve(&self, key: &str, modifiers: Modifiers) -> Option<Action> {
        self.lookup(&KeyChord::new(key, modifiers))
    }

    pub fn bindings(&self) -> &[ShortcutBinding] {
        &self.bindings
    }

    /// All chords bound to an action
    pub fn chords_for(&self, action: Action) -> impl Iterator<Item = &KeyChord> {
        self.bindings
            .iter()
            .filter(move |b| b.action == action)
            .map(|b| &b.chord)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_chord_resolves_separately_from_plain_chord() {
        let registry = ShortcutRegistry::defaults();
        assert_eq!(registry.resolve("z", Modifiers::CTRL), Some(Action::Undo));
        assert_eq!(registry.resolve("z", Modifiers::CTRL_SHIFT), Some(Action::Redo));
        // Shift usually reports an uppercase key label
        assert_eq!(registry.resolve("Z", Modifiers::CTRL_SHIFT), Some(Action::Redo));
    }

    #[test]
    fn unknown_chord_is_unbound() {
        let registry = ShortcutRegistry::defaults();
        assert_eq!(registry.resolve("q", Modifiers::CTRL), None);
        assert_eq!(registry.resolve("z", Modifiers::NONE), None);
        assert_eq!(registry.resolve("z", Modifiers::new(true, false, true)), None);
    }

    #[test]
    fn named_keys_are_case_insensitive_and_aliased() {
        let registry = ShortcutRegistry::defaults();
        assert_eq!(registry.resolve("DELETE", Modifiers::NONE), Some(Action::DeleteSelected));
        assert_eq!(registry.resolve("Esc", Modifiers::NONE), Some(Action::ClearSelection));
        assert_eq!(registry.resolve("Up", Modifiers::NONE), Some(Action::MoveUp));
        assert_eq!(registry.resolve("f11", Modifiers::NONE), Some(Action::ToggleFullscreen));
    }

    #[test]
    fn colliding_registration_is_rejected_and_first_binding_kept() {
        let mut registry = ShortcutRegistry::new();
        registry
            .register(ShortcutBinding::new("k", Modifiers::CTRL, Action::Copy, "copy"))
            .unwrap();
        let err = registry
            .register(ShortcutBinding::new("K", Modifiers::CTRL, Action::Cut, "cut"))
            .unwrap_err();
        assert_eq!(err.existing, Action::Copy);
        assert_eq!(err.rejected, Action::Cut);
        assert_eq!(registry.resolve("k", Modifiers::CTRL), Some(Action::Copy));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn every_action_has_a_default_chord() {
        let registry = ShortcutRegistry::defaults();
        for action in Action::ALL {
            assert!(registry.chords_for(action).next().is_some(), "{action} unbound");
        }
    }

    #[test]
    fn actions_round_trip_through_identifiers() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
        assert!("launch_rockets".parse::<Action>().is_err());
    }

    #[test]
    fn chord_display() {
        let chord = KeyChord::new("Z", Modifiers::CTRL_SHIFT);
        assert_eq!(chord.to_string(), "Ctrl+Shift+z");
    }
}
