//! Editing layer for skyrchitect: action handlers over the document core,
//! view-only canvas state and keyboard dispatch.

pub mod dispatcher;
pub mod editor;
pub mod view;

pub use dispatcher::{CommandDispatcher, DispatchError, Dispatched, Disposition, FocusContext, KeyInput, ListenerGuard};
pub use editor::{BoxedAutosaver, Editor, DUPLICATE_OFFSET, MOVE_STEP};
pub use view::ViewState;
