//! Subscribe-with-replay store.
//!
//! [`Writable`] holds a current value and an ordered list of observers.
//! Subscribing delivers the current value before `subscribe` returns, then
//! every later value until the [`Subscription`] is released.
//!
//! # Invariants
//!
//! 1. Observers are notified in subscription order.
//! 2. Every `set` notifies, even when the value is unchanged.
//! 3. A `set` issued from inside an observer is queued and delivered after
//!    the current round, so every observer sees values in `set` order.
//! 4. Observers subscribed after a `set` never receive that value from the
//!    queue; they get the latest value on subscribe instead.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

type Observer<T> = Rc<dyn Fn(&T)>;
type Round<T> = (T, Vec<(u64, Observer<T>)>);

struct StoreInner<T> {
    value: T,
    observers: Vec<(u64, Observer<T>)>,
    next_id: u64,
    pending: VecDeque<Round<T>>,
    notifying: bool,
}

impl<T> StoreInner<T> {
    fn is_subscribed(&self, id: u64) -> bool {
        self.observers.iter().any(|(entry, _)| *entry == id)
    }
}

/// A shared, writable store. Clones share the same value and observers.
pub struct Writable<T> {
    inner: Rc<RefCell<StoreInner<T>>>,
}

impl<T: Clone + 'static> Writable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                value,
                observers: Vec::new(),
                next_id: 0,
                pending: VecDeque::new(),
                notifying: false,
            })),
        }
    }

    /// Replace the current value and notify every observer.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.value = value.clone();
            let recipients = inner.observers.clone();
            inner.pending.push_back((value, recipients));
            if inner.notifying {
                return;
            }
            inner.notifying = true;
        }

        let _flush = FlushGuard(&*self.inner);
        loop {
            let Some((value, recipients)) = self.inner.borrow_mut().pending.pop_front() else {
                break;
            };
            for (id, observer) in recipients {
                if self.inner.borrow().is_subscribed(id) {
                    observer(&value);
                }
            }
        }
    }

    /// Compute the next value from the current one and [`set`](Self::set) it.
    pub fn update(&self, f: impl FnOnce(T) -> T) {
        let current = self.inner.borrow().value.clone();
        self.set(f(current));
    }

    /// Deliver the current value to `observer`, then every later value.
    pub fn subscribe(&self, observer: impl Fn(&T) + 'static) -> Subscription {
        let observer: Observer<T> = Rc::new(observer);
        let (id, current) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.observers.push((id, Rc::clone(&observer)));
            (id, inner.value.clone())
        };
        observer(&current);
        Subscription::new(Rc::downgrade(&self.inner), id)
    }

    /// A subscribe-only view of this store.
    pub fn readable(&self) -> Readable<T> {
        Readable {
            store: self.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }
}

impl<T> Clone for Writable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Writable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Writable")
            .field("subscribers", &inner.observers.len())
            .field("pending", &inner.pending.len())
            .finish_non_exhaustive()
    }
}

/// Resets the notifying flag even if an observer panics.
struct FlushGuard<'a, T>(&'a RefCell<StoreInner<T>>);

impl<T> Drop for FlushGuard<'_, T> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.0.try_borrow_mut() {
            inner.notifying = false;
            inner.pending.clear();
        }
    }
}

/// Subscribe-only view of a [`Writable`].
pub struct Readable<T> {
    store: Writable<T>,
}

impl<T: Clone + 'static> Readable<T> {
    pub fn subscribe(&self, observer: impl Fn(&T) + 'static) -> Subscription {
        self.store.subscribe(observer)
    }
}

impl<T> Clone for Readable<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T> fmt::Debug for Readable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Readable").field(&self.store).finish()
    }
}

/// RAII registration of one observer. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new<T: 'static>(store: Weak<RefCell<StoreInner<T>>>, id: u64) -> Self {
        Self {
            release: Some(Box::new(move || {
                let Some(store) = store.upgrade() else {
                    return;
                };
                // Take the observer out first so its captures drop unborrowed.
                let removed = {
                    let mut inner = store.borrow_mut();
                    let idx = inner.observers.iter().position(|(entry, _)| *entry == id);
                    idx.map(|idx| inner.observers.remove(idx))
                };
                drop(removed);
            })),
        }
    }

    /// Stop receiving values.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn collector<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |value: &T| sink.borrow_mut().push(value.clone()))
    }

    #[test]
    fn test_subscribe_delivers_current_value_immediately() {
        let store = Writable::new(7);
        let (seen, observer) = collector();
        let _sub = store.subscribe(observer);
        assert_eq!(*seen.borrow(), vec![7]);
    }

    #[test]
    fn test_set_notifies_in_subscription_order() {
        let store = Writable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = Rc::clone(&log);
        let _a = store.subscribe(move |v: &i32| first.borrow_mut().push(("a", *v)));
        let second = Rc::clone(&log);
        let _b = store.subscribe(move |v: &i32| second.borrow_mut().push(("b", *v)));

        store.set(1);
        assert_eq!(
            *log.borrow(),
            vec![("a", 0), ("b", 0), ("a", 1), ("b", 1)]
        );
    }

    #[test]
    fn test_equal_values_still_notify() {
        let store = Writable::new("same");
        let (seen, observer) = collector();
        let _sub = store.subscribe(observer);
        store.set("same");
        store.set("same");
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let store = Writable::new(0);
        let (seen, observer) = collector();
        let sub = store.subscribe(observer);
        store.set(1);
        sub.unsubscribe();
        store.set(2);
        assert_eq!(*seen.borrow(), vec![0, 1]);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_late_subscriber_sees_only_latest_value() {
        let store = Writable::new(0);
        store.set(1);
        store.set(2);
        let (seen, observer) = collector();
        let _sub = store.subscribe(observer);
        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn test_nested_set_is_delivered_after_current_round() {
        let store = Writable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let writer = store.clone();
        let first = Rc::clone(&log);
        let _a = store.subscribe(move |v: &i32| {
            first.borrow_mut().push(("a", *v));
            if *v == 1 {
                writer.set(2);
            }
        });
        let second = Rc::clone(&log);
        let _b = store.subscribe(move |v: &i32| second.borrow_mut().push(("b", *v)));

        store.set(1);
        assert_eq!(
            *log.borrow(),
            vec![("a", 0), ("b", 0), ("a", 1), ("b", 1), ("a", 2), ("b", 2)]
        );
    }

    #[test]
    fn test_subscribe_from_inside_observer() {
        let store = Writable::new(0);
        let late_seen = Rc::new(RefCell::new(Vec::new()));
        let late_sub: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let source = store.clone();
        let slot = Rc::clone(&late_sub);
        let sink = Rc::clone(&late_seen);
        let _outer = store.subscribe(move |v: &i32| {
            if *v == 1 && slot.borrow().is_none() {
                let sink = Rc::clone(&sink);
                let sub = source.subscribe(move |v: &i32| sink.borrow_mut().push(*v));
                *slot.borrow_mut() = Some(sub);
            }
        });

        store.set(1);
        store.set(2);
        assert_eq!(*late_seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_update_derives_from_current_value() {
        let store = Writable::new(10);
        let (seen, observer) = collector();
        let _sub = store.subscribe(observer);
        store.update(|v| v + 5);
        assert_eq!(*seen.borrow(), vec![10, 15]);
    }

    #[test]
    fn test_readable_shares_store() {
        let store = Writable::new(String::from("a"));
        let readable = store.readable();
        let (seen, observer) = collector();
        let _sub = readable.subscribe(observer);
        store.set(String::from("b"));
        assert_eq!(*seen.borrow(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_subscription_outliving_store_is_harmless() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let sub = {
            let store = Writable::new(0);
            store.subscribe(move |_: &i32| counter.set(counter.get() + 1))
        };
        drop(sub);
        assert_eq!(calls.get(), 1);
    }
}
