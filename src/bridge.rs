//! Editor-to-store bridge.
//!
//! [`EditorStateBridge`] listens to an [`Editor`]'s update stream, drops the
//! updates its [`BridgeOptions`] filter out, and republishes the rest as
//! [`EditorSnapshot`]s through a subscribe-with-replay store.
//!
//! Filters run in a fixed order, each one a short-circuit on its own:
//!
//! 1. `ignore_selection_change`: the update's dirty element and dirty leaf
//!    sets are both empty.
//! 2. `ignore_initial_change`: the update's *previous* state is empty.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::editor::{
    Editor, EditorError, EditorState, ListenerRegistration, UpdateEvent, UpdateListener,
};
use crate::lifecycle::Lifecycle;
use crate::store::{Readable, Subscription, Writable};

/// Which updates the bridge suppresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Drop updates whose previous state is empty (the editor's bootstrap).
    pub ignore_initial_change: bool,
    /// Drop updates that change no element or leaf (cursor moves).
    pub ignore_selection_change: bool,
}

impl BridgeOptions {
    pub const fn new() -> Self {
        Self {
            ignore_initial_change: true,
            ignore_selection_change: false,
        }
    }

    pub const fn with_ignore_initial_change(mut self, ignore: bool) -> Self {
        self.ignore_initial_change = ignore;
        self
    }

    pub const fn with_ignore_selection_change(mut self, ignore: bool) -> Self {
        self.ignore_selection_change = ignore;
        self
    }
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of filtering one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Publish,
    /// Dropped by `ignore_selection_change`.
    SelectionOnly,
    /// Dropped by `ignore_initial_change`.
    InitialChange,
}

/// Decide what happens to `event` under `options`.
pub fn classify<S: EditorState>(options: BridgeOptions, event: &UpdateEvent<S>) -> Verdict {
    if options.ignore_selection_change && event.is_selection_only() {
        return Verdict::SelectionOnly;
    }
    if options.ignore_initial_change && event.prev_editor_state.is_empty() {
        return Verdict::InitialChange;
    }
    Verdict::Publish
}

/// Editor state paired with the editor it came from.
pub struct EditorSnapshot<E: Editor> {
    pub editor_state: E::State,
    pub editor: Rc<E>,
}

impl<E: Editor> Clone for EditorSnapshot<E> {
    fn clone(&self) -> Self {
        Self {
            editor_state: self.editor_state.clone(),
            editor: Rc::clone(&self.editor),
        }
    }
}

impl<E: Editor> fmt::Debug for EditorSnapshot<E>
where
    E::State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorSnapshot")
            .field("editor_state", &self.editor_state)
            .finish_non_exhaustive()
    }
}

/// Counters of updates seen by a bridge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub received: u64,
    pub published: u64,
    pub skipped_selection: u64,
    pub skipped_initial: u64,
}

struct Shared<E: Editor> {
    options: BridgeOptions,
    store: Writable<EditorSnapshot<E>>,
    stats: Cell<BridgeStats>,
}

impl<E: Editor + 'static> Shared<E> {
    fn handle(&self, event: &UpdateEvent<E::State>, editor: Rc<E>) {
        let verdict = classify(self.options, event);
        let mut stats = self.stats.get();
        stats.received += 1;
        match verdict {
            Verdict::Publish => stats.published += 1,
            Verdict::SelectionOnly => stats.skipped_selection += 1,
            Verdict::InitialChange => stats.skipped_initial += 1,
        }
        self.stats.set(stats);

        if verdict != Verdict::Publish {
            debug!(?verdict, received = stats.received, "update filtered");
            return;
        }
        trace!(published = stats.published, "publishing editor snapshot");
        self.store.set(EditorSnapshot {
            editor_state: event.editor_state.clone(),
            editor,
        });
    }
}

/// Republishes an editor's updates as [`EditorSnapshot`]s.
///
/// The bridge holds one listener registration at most. It is acquired by
/// [`activate`](Self::activate) and released by [`deactivate`](Self::deactivate)
/// or when the bridge is dropped.
pub struct EditorStateBridge<E: Editor + 'static> {
    editor: Rc<E>,
    shared: Rc<Shared<E>>,
    registration: RefCell<Option<ListenerRegistration>>,
}

impl<E: Editor + 'static> EditorStateBridge<E> {
    /// Create an inactive bridge whose current snapshot is the editor's
    /// current state.
    pub fn new(editor: Rc<E>, options: BridgeOptions) -> Self {
        let initial = EditorSnapshot {
            editor_state: editor.editor_state(),
            editor: Rc::clone(&editor),
        };
        Self {
            editor,
            shared: Rc::new(Shared {
                options,
                store: Writable::new(initial),
                stats: Cell::new(BridgeStats::default()),
            }),
            registration: RefCell::new(None),
        }
    }

    /// Filters fixed at construction.
    pub fn options(&self) -> BridgeOptions {
        self.shared.options
    }

    /// Register the update listener. A no-op when already active.
    ///
    /// # Errors
    /// Propagates the editor's registration error unchanged; the bridge stays
    /// inactive.
    pub fn activate(&self) -> Result<(), EditorError> {
        if self.is_active() {
            return Ok(());
        }
        let registration = self
            .editor
            .register_update_listener(self.listener())
            .inspect_err(|err| warn!(%err, "editor refused update listener"))?;
        *self.registration.borrow_mut() = Some(registration);
        debug!("bridge activated");
        Ok(())
    }

    /// Deregister the update listener. A no-op when inactive.
    pub fn deactivate(&self) {
        let registration = self.registration.borrow_mut().take();
        if let Some(registration) = registration {
            registration.unregister();
            debug!("bridge deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        self.registration.borrow().is_some()
    }

    /// Deliver the current snapshot to `observer` now, then every published one.
    pub fn subscribe(&self, observer: impl Fn(&EditorSnapshot<E>) + 'static) -> Subscription {
        self.shared.store.subscribe(observer)
    }

    /// Subscribe-only view of the snapshot store.
    pub fn readable(&self) -> Readable<EditorSnapshot<E>> {
        self.shared.store.readable()
    }

    pub fn stats(&self) -> BridgeStats {
        self.shared.stats.get()
    }

    fn listener(&self) -> UpdateListener<E::State> {
        let shared: Weak<Shared<E>> = Rc::downgrade(&self.shared);
        let editor: Weak<E> = Rc::downgrade(&self.editor);
        Rc::new(move |event: &UpdateEvent<E::State>| {
            let (Some(shared), Some(editor)) = (shared.upgrade(), editor.upgrade()) else {
                return;
            };
            shared.handle(event, editor);
        })
    }
}

impl<E: Editor + 'static> Lifecycle for EditorStateBridge<E> {
    type Error = EditorError;

    fn activate(&self) -> Result<(), EditorError> {
        Self::activate(self)
    }

    fn deactivate(&self) {
        Self::deactivate(self);
    }
}

impl<E: Editor + 'static> Drop for EditorStateBridge<E> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl<E: Editor + 'static> fmt::Debug for EditorStateBridge<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorStateBridge")
            .field("options", &self.options())
            .field("active", &self.is_active())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::DirtySet;

    #[derive(Debug, Clone, PartialEq)]
    struct Doc(&'static str);

    impl EditorState for Doc {
        fn is_empty(&self) -> bool {
            self.0.is_empty()
        }
    }

    fn event(prev: &'static str, next: &'static str, elements: &[&str], leaves: &[&str]) -> UpdateEvent<Doc> {
        UpdateEvent {
            editor_state: Doc(next),
            prev_editor_state: Doc(prev),
            dirty_elements: elements.iter().map(|k| (*k).into()).collect::<DirtySet>(),
            dirty_leaves: leaves.iter().map(|k| (*k).into()).collect::<DirtySet>(),
        }
    }

    #[test]
    fn test_default_options() {
        let options = BridgeOptions::default();
        assert!(options.ignore_initial_change);
        assert!(!options.ignore_selection_change);
    }

    #[test]
    fn test_selection_filter_requires_both_sets_empty() {
        let options = BridgeOptions::new().with_ignore_selection_change(true);
        assert_eq!(classify(options, &event("a", "a", &[], &[])), Verdict::SelectionOnly);
        assert_eq!(classify(options, &event("a", "ab", &[], &["t"])), Verdict::Publish);
        assert_eq!(classify(options, &event("a", "ab", &["p"], &[])), Verdict::Publish);
    }

    #[test]
    fn test_selection_events_pass_by_default() {
        let options = BridgeOptions::default();
        assert_eq!(classify(options, &event("a", "a", &[], &[])), Verdict::Publish);
    }

    #[test]
    fn test_initial_filter_checks_previous_state_only() {
        let options = BridgeOptions::default();
        assert_eq!(classify(options, &event("", "a", &["p"], &["t"])), Verdict::InitialChange);
        // New state empty, previous not: still published.
        assert_eq!(classify(options, &event("a", "", &["p"], &[])), Verdict::Publish);
    }

    #[test]
    fn test_selection_filter_is_checked_first() {
        let options = BridgeOptions::new().with_ignore_selection_change(true);
        assert_eq!(classify(options, &event("", "", &[], &[])), Verdict::SelectionOnly);
    }

    #[test]
    fn test_initial_filter_can_be_disabled() {
        let options = BridgeOptions::new().with_ignore_initial_change(false);
        assert_eq!(classify(options, &event("", "a", &["p"], &[])), Verdict::Publish);
    }
}
