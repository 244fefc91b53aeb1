//! Editor collaborator contract.
//!
//! The bridge consumes editors through the [`Editor`] trait: a way to read the
//! current state and a way to register an update listener. [`RopeEditor`] is a
//! small rope-backed implementation used by the CLI and the tests.

mod buffer;
mod listeners;
mod rope_editor;

use std::collections::BTreeSet;
use std::rc::Rc;

use smol_str::SmolStr;
use thiserror::Error;

pub use buffer::{Cursor, EditorBuffer, Motion, TextChange};
pub use listeners::{ListenerRegistration, ListenerSet};
pub use rope_editor::{DocState, ROOT_KEY, RopeEditor};

/// Identifier of a document node (element or leaf).
pub type NodeKey = SmolStr;

/// Set of node keys touched by one update.
pub type DirtySet = BTreeSet<NodeKey>;

/// Callback invoked synchronously for every editor update.
pub type UpdateListener<S> = Rc<dyn Fn(&UpdateEvent<S>)>;

/// State of an editor at one point in time.
pub trait EditorState {
    /// Whether the state holds no content at all.
    fn is_empty(&self) -> bool;
}

/// An editor whose updates can be observed.
pub trait Editor {
    /// Immutable state value handed out to listeners.
    type State: EditorState + Clone;

    /// The editor's current state.
    fn editor_state(&self) -> Self::State;

    /// Register `listener` for every subsequent update.
    ///
    /// The listener stays registered until the returned registration is
    /// dropped or explicitly unregistered.
    ///
    /// # Errors
    /// Returns [`EditorError::Disposed`] if the editor no longer accepts listeners.
    fn register_update_listener(
        &self,
        listener: UpdateListener<Self::State>,
    ) -> Result<ListenerRegistration, EditorError>;
}

/// One update notification.
#[derive(Debug, Clone)]
pub struct UpdateEvent<S> {
    pub editor_state: S,
    pub prev_editor_state: S,
    pub dirty_elements: DirtySet,
    pub dirty_leaves: DirtySet,
}

impl<S> UpdateEvent<S> {
    /// True when the update carries no document mutation (cursor or selection only).
    pub fn is_selection_only(&self) -> bool {
        self.dirty_elements.is_empty() && self.dirty_leaves.is_empty()
    }
}

/// Errors raised by editors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditorError {
    /// The editor has been disposed and accepts no new listeners.
    #[error("editor has been disposed")]
    Disposed,
}
