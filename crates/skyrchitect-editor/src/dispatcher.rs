//! Keyboard command dispatch.
//!
//! Front ends translate their native key events into [`KeyInput`], queue them
//! here and drain the queue once per frame. Each event is resolved through the
//! shortcut registry and, if bound, run against the editor before the next one
//! is looked at.

use std::cell::Cell;
use std::collections::{HashSet, VecDeque};
use std::marker::PhantomData;
use std::time::Instant;

use skyrchitect_core::{Action, Modifiers, ShortcutRegistry, ValidationError};
use thiserror::Error;
use tracing::{debug, trace};

use crate::editor::Editor;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("a keyboard listener is already attached on this thread")]
    AlreadyAttached,
    #[error("{action} failed: {source}")]
    Action {
        action: Action,
        #[source]
        source: ValidationError,
    },
}

/// A key press as reported by the front end.
///
/// `meta` (command/super) is treated as ctrl so the same table works on
/// every platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn modifiers(&self) -> Modifiers {
        Modifiers::new(self.ctrl || self.meta, self.shift, self.alt)
    }
}

/// Where keyboard focus currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusContext {
    #[default]
    Canvas,
    /// A text field (label editing); keys belong to the field
    TextInput,
}

/// What happened to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Bound and run; the front end must not apply its own handling
    Handled(Action),
    /// Bound, but blocked by text focus; the event belongs to the field
    Suppressed(Action),
    /// No binding
    PassThrough,
}

impl Disposition {
    pub fn is_consumed(self) -> bool {
        matches!(self, Disposition::Handled(_))
    }
}

/// One drained event and what became of it. Pass-through events are handed
/// back so the front end can apply its own handling.
#[derive(Debug)]
pub struct Dispatched {
    pub input: KeyInput,
    pub outcome: Result<Disposition, DispatchError>,
}

thread_local! {
    static LISTENER_ATTACHED: Cell<bool> = const { Cell::new(false) };
}

/// Proof that this thread's keyboard listener is attached. Dropping it detaches.
#[derive(Debug)]
pub struct ListenerGuard {
    // tied to the thread that set the flag
    _not_send: PhantomData<*const ()>,
}

impl ListenerGuard {
    pub fn attach() -> Result<Self, DispatchError> {
        LISTENER_ATTACHED.with(|attached| {
            if attached.replace(true) {
                return Err(DispatchError::AlreadyAttached);
            }
            debug!("keyboard listener attached");
            Ok(Self { _not_send: PhantomData })
        })
    }

    pub fn is_attached() -> bool {
        LISTENER_ATTACHED.with(Cell::get)
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        LISTENER_ATTACHED.with(|attached| attached.set(false));
        debug!("keyboard listener detached");
    }
}

pub struct CommandDispatcher {
    registry: ShortcutRegistry,
    text_allowlist: HashSet<Action>,
    focus: FocusContext,
    queue: VecDeque<KeyInput>,
    _guard: ListenerGuard,
}

impl CommandDispatcher {
    /// Attach the listener for this thread. Fails if one is already attached.
    pub fn attach(registry: ShortcutRegistry) -> Result<Self, DispatchError> {
        Ok(Self {
            registry,
            text_allowlist: HashSet::new(),
            focus: FocusContext::default(),
            queue: VecDeque::new(),
            _guard: ListenerGuard::attach()?,
        })
    }

    /// Actions that still fire while a text field has focus
    pub fn with_text_allowlist(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.text_allowlist = actions.into_iter().collect();
        self
    }

    pub fn registry(&self) -> &ShortcutRegistry {
        &self.registry
    }

    pub fn focus(&self) -> FocusContext {
        self.focus
    }

    pub fn set_focus(&mut self, focus: FocusContext) {
        self.focus = focus;
    }

    pub fn enqueue(&mut self, input: KeyInput) {
        self.queue.push_back(input);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Resolve an event without running anything
    pub fn classify(&self, input: &KeyInput) -> Disposition {
        let Some(action) = self.registry.resolve(&input.key, input.modifiers()) else {
            return Disposition::PassThrough;
        };
        if self.focus == FocusContext::TextInput && !self.text_allowlist.contains(&action) {
            return Disposition::Suppressed(action);
        }
        Disposition::Handled(action)
    }

    /// Resolve one event and run its action to completion
    pub fn handle(&mut self, editor: &mut Editor, input: &KeyInput, now: Instant) -> Result<Disposition, DispatchError> {
        let disposition = self.classify(input);
        match disposition {
            Disposition::Handled(action) => {
                debug!(key = %input.key, %action, "shortcut");
                editor
                    .invoke(action, now)
                    .map_err(|source| DispatchError::Action { action, source })?;
            }
            Disposition::Suppressed(action) => {
                trace!(key = %input.key, %action, "shortcut suppressed by text focus");
            }
            Disposition::PassThrough => {}
        }
        Ok(disposition)
    }

    /// Handle every queued event in arrival order
    pub fn drain(&mut self, editor: &mut Editor, now: Instant) -> Vec<Dispatched> {
        let mut results = Vec::with_capacity(self.queue.len());
        while let Some(input) = self.queue.pop_front() {
            let outcome = self.handle(editor, &input, now);
            results.push(Dispatched { input, outcome });
        }
        results
    }
}
