use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{EditorError, UpdateEvent, UpdateListener};

/// Handle to one registered update listener.
///
/// Deregisters exactly once: on [`ListenerRegistration::unregister`] or on drop.
pub struct ListenerRegistration {
    release: Option<Box<dyn FnOnce()>>,
}

impl ListenerRegistration {
    /// Wrap a release callback.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Deregister the listener now.
    pub fn unregister(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.release.is_some())
            .finish()
    }
}

struct Listeners<S> {
    next_id: u64,
    entries: Vec<(u64, UpdateListener<S>)>,
    closed: bool,
}

/// Ordered list of update listeners an [`Editor`](super::Editor) can embed.
///
/// Dispatch works on a copy of the list, so listeners may register or
/// deregister from inside a callback. A listener removed mid-dispatch is not
/// called for the remainder of that dispatch.
pub struct ListenerSet<S> {
    inner: Rc<RefCell<Listeners<S>>>,
}

impl<S: 'static> ListenerSet<S> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
                closed: false,
            })),
        }
    }

    /// Add `listener` at the end of the dispatch order.
    ///
    /// # Errors
    /// Returns [`EditorError::Disposed`] once the set has been closed.
    pub fn register(
        &self,
        listener: UpdateListener<S>,
    ) -> Result<ListenerRegistration, EditorError> {
        let id = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                return Err(EditorError::Disposed);
            }
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push((id, listener));
            id
        };

        let weak = Rc::downgrade(&self.inner);
        Ok(ListenerRegistration::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        }))
    }

    /// Deliver `event` to every listener in registration order.
    pub fn emit(&self, event: &UpdateEvent<S>) {
        let snapshot: Vec<(u64, UpdateListener<S>)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            if self.contains(id) {
                listener(event);
            }
        }
    }

    /// Drop all listeners and refuse new ones.
    pub fn close(&self) {
        let dropped = {
            let mut inner = self.inner.borrow_mut();
            inner.closed = true;
            std::mem::take(&mut inner.entries)
        };
        // Listener captures may run their own drop logic; run it unborrowed.
        drop(dropped);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: u64) -> bool {
        self.inner
            .borrow()
            .entries
            .iter()
            .any(|(entry, _)| *entry == id)
    }
}

impl<S: 'static> Default for ListenerSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for ListenerSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ListenerSet")
            .field("listeners", &inner.entries.len())
            .field("closed", &inner.closed)
            .finish()
    }
}
