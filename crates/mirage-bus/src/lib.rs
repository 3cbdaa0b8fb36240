//! Synchronous, in-process publish/subscribe bus.
//!
//! `emit` runs every registered handler on the caller's stack, in
//! registration order. Delivery is unbuffered: a handler registered after an
//! `emit` never observes that event, so subscribers must be able to rebuild
//! their view from the source of truth when they attach.
//!
//! Dispatch is explicitly non-reentrant. An `emit` issued from inside a
//! handler is queued and delivered once the current event has reached every
//! handler, so handlers always observe events in emission order and never
//! run nested inside one another.
//!
//! A handler that returns an error or panics is logged and skipped; the
//! remaining handlers still receive the event.
//!
//! The bus is single-threaded (`Rc` based) and therefore `!Send`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use mirage_types::ChangeEvent;
use mirage_types::error::Result;

type Handler<E> = Box<dyn FnMut(&E) -> Result<()>>;

struct Slot<E> {
    id: u64,
    handler: Rc<RefCell<Handler<E>>>,
}

struct Inner<E> {
    slots: RefCell<Vec<Slot<E>>>,
    pending: RefCell<VecDeque<E>>,
    /// The event handlers are currently receiving.
    current: RefCell<Option<Rc<E>>>,
    dispatching: Cell<bool>,
    next_id: Cell<u64>,
}

impl<E> Inner<E> {
    fn is_subscribed(&self, id: u64) -> bool {
        self.slots.borrow().iter().any(|s| s.id == id)
    }

    fn remove(&self, id: u64) -> bool {
        let mut slots = self.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|s| s.id != id);
        slots.len() != before
    }
}

/// Clears the dispatching flag when the outermost `emit` returns.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl<'a> DispatchGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A cheaply clonable handle to a shared bus. Clones deliver to the same
/// subscriber list.
pub struct EventBus<E = ChangeEvent> {
    inner: Rc<Inner<E>>,
}

/// The bus used for workspace-wide change notifications.
pub type ChangeBus = EventBus<ChangeEvent>;

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("dispatching", &self.is_dispatching())
            .finish()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                slots: RefCell::new(Vec::new()),
                pending: RefCell::new(VecDeque::new()),
                current: RefCell::new(None),
                dispatching: Cell::new(false),
                next_id: Cell::new(1),
            }),
        }
    }

    /// Register a handler. It stays registered until the returned
    /// [`Subscription`] is dropped or explicitly unsubscribed.
    pub fn subscribe<F>(&self, handler: F) -> Subscription<E>
    where
        F: FnMut(&E) -> Result<()> + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.slots.borrow_mut().push(Slot {
            id,
            handler: Rc::new(RefCell::new(Box::new(handler))),
        });
        log::trace!("bus: subscriber {id} registered");
        Subscription {
            bus: Rc::downgrade(&self.inner),
            id,
            active: true,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// True while handlers are running for some event.
    pub fn is_dispatching(&self) -> bool {
        self.inner.dispatching.get()
    }

    /// True while the event being delivered satisfies `pred`. Queued events
    /// that have not started delivery are not considered.
    pub fn is_dispatching_where(&self, pred: impl FnOnce(&E) -> bool) -> bool {
        self.inner.current.borrow().as_deref().is_some_and(pred)
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Called from inside a handler, the event is queued behind the one
    /// being dispatched and delivered before the outermost `emit` returns.
    pub fn emit(&self, event: E) {
        self.inner.pending.borrow_mut().push_back(event);
        if self.inner.dispatching.get() {
            log::trace!("bus: emit during dispatch, event deferred");
            return;
        }

        let _guard = DispatchGuard::enter(&self.inner.dispatching);
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            let event = Rc::new(event);
            *self.inner.current.borrow_mut() = Some(Rc::clone(&event));
            self.dispatch(&event);
            *self.inner.current.borrow_mut() = None;
        }
    }

    fn dispatch(&self, event: &E) {
        // Snapshot so handlers may subscribe/unsubscribe while we iterate.
        // Late subscribers are not in the snapshot and miss this event.
        let snapshot: Vec<(u64, Rc<RefCell<Handler<E>>>)> = self
            .inner
            .slots
            .borrow()
            .iter()
            .map(|s| (s.id, Rc::clone(&s.handler)))
            .collect();
        log::debug!("bus: dispatching to {} subscriber(s)", snapshot.len());

        for (id, slot) in snapshot {
            if !self.inner.is_subscribed(id) {
                continue;
            }
            let Ok(mut handler) = slot.try_borrow_mut() else {
                log::warn!("bus: subscriber {id} is already running, skipped");
                continue;
            };
            match panic::catch_unwind(AssertUnwindSafe(|| (*handler)(event))) {
                Ok(Ok(())) => {},
                Ok(Err(e)) => log::warn!("bus: subscriber {id} failed: {e}"),
                Err(_) => log::error!("bus: subscriber {id} panicked, delivery continues"),
            }
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]. Dropping it unsubscribes.
pub struct Subscription<E> {
    bus: Weak<Inner<E>>,
    id: u64,
    active: bool,
}

impl<E> Subscription<E> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the handler. Returns false if the bus is already gone.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    /// Keep the handler registered for the lifetime of the bus.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        match self.bus.upgrade() {
            Some(inner) => {
                let removed = inner.remove(self.id);
                log::trace!("bus: subscriber {} removed", self.id);
                removed
            },
            None => false,
        }
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<E> std::fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirage_types::MirageError;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn FnMut(&u32) -> Result<()>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log2 = Rc::clone(&log);
        let make = move |tag: &str| -> Box<dyn FnMut(&u32) -> Result<()>> {
            let log = Rc::clone(&log2);
            let tag = tag.to_string();
            Box::new(move |n: &u32| {
                log.borrow_mut().push(format!("{tag}:{n}"));
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus: EventBus<u32> = EventBus::new();
        let (log, make) = recorder();
        let _a = bus.subscribe(make("a"));
        let _b = bus.subscribe(make("b"));
        let _c = bus.subscribe(make("c"));
        bus.emit(1);
        assert_eq!(*log.borrow(), vec!["a:1", "b:1", "c:1"]);
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let bus: EventBus<u32> = EventBus::new();
        let (log, make) = recorder();
        bus.emit(1);
        let _a = bus.subscribe(make("a"));
        bus.emit(2);
        assert_eq!(*log.borrow(), vec!["a:2"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus: EventBus<u32> = EventBus::new();
        let (log, make) = recorder();
        let a = bus.subscribe(make("a"));
        let _b = bus.subscribe(make("b"));
        bus.emit(1);
        assert!(a.unsubscribe());
        bus.emit(2);
        assert_eq!(*log.borrow(), vec!["a:1", "b:1", "b:2"]);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus: EventBus<u32> = EventBus::new();
        let (log, make) = recorder();
        {
            let _a = bus.subscribe(make("a"));
            bus.emit(1);
        }
        bus.emit(2);
        assert_eq!(*log.borrow(), vec!["a:1"]);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn detached_subscription_stays() {
        let bus: EventBus<u32> = EventBus::new();
        let (log, make) = recorder();
        bus.subscribe(make("a")).detach();
        bus.emit(7);
        assert_eq!(*log.borrow(), vec!["a:7"]);
    }

    #[test]
    fn unsubscribe_after_bus_dropped() {
        let bus: EventBus<u32> = EventBus::new();
        let sub = bus.subscribe(|_| Ok(()));
        drop(bus);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn failing_handler_does_not_block_others() {
        let bus: EventBus<u32> = EventBus::new();
        let (log, make) = recorder();
        let _a = bus.subscribe(|_| Err(MirageError::InvalidOperation("boom".into())));
        let _b = bus.subscribe(make("b"));
        bus.emit(3);
        assert_eq!(*log.borrow(), vec!["b:3"]);
    }

    #[test]
    fn panicking_handler_does_not_block_others() {
        let bus: EventBus<u32> = EventBus::new();
        let (log, make) = recorder();
        let _a = bus.subscribe(|_| panic!("handler exploded"));
        let _b = bus.subscribe(make("b"));
        bus.emit(4);
        bus.emit(5);
        assert_eq!(*log.borrow(), vec!["b:4", "b:5"]);
        assert!(!bus.is_dispatching());
    }

    #[test]
    fn nested_emit_is_deferred_until_current_dispatch_finishes() {
        let bus: EventBus<u32> = EventBus::new();
        let (log, make) = recorder();
        let inner_bus = bus.clone();
        let log_a = Rc::clone(&log);
        let _a = bus.subscribe(move |n| {
            log_a.borrow_mut().push(format!("a:{n}"));
            if *n == 1 {
                inner_bus.emit(2);
            }
            Ok(())
        });
        let _b = bus.subscribe(make("b"));
        bus.emit(1);
        assert_eq!(*log.borrow(), vec!["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn is_dispatching_visible_inside_handler() {
        let bus: EventBus<u32> = EventBus::new();
        let seen = Rc::new(Cell::new(false));
        let seen2 = Rc::clone(&seen);
        let watcher = bus.clone();
        let _a = bus.subscribe(move |_| {
            seen2.set(watcher.is_dispatching());
            Ok(())
        });
        assert!(!bus.is_dispatching());
        bus.emit(0);
        assert!(seen.get());
        assert!(!bus.is_dispatching());
    }

    #[test]
    fn is_dispatching_where_sees_only_the_current_event() {
        let bus: EventBus<u32> = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = Rc::clone(&seen);
        let inner_bus = bus.clone();
        let _a = bus.subscribe(move |n| {
            seen2
                .borrow_mut()
                .push((*n, inner_bus.is_dispatching_where(|e| *e == 2)));
            if *n == 1 {
                inner_bus.emit(2);
            }
            Ok(())
        });
        bus.emit(1);
        assert_eq!(*seen.borrow(), vec![(1, false), (2, true)]);
        assert!(!bus.is_dispatching_where(|_| true));
    }

    #[test]
    fn subscribe_during_dispatch_sees_only_later_events() {
        let bus: EventBus<u32> = EventBus::new();
        let (log, make) = recorder();
        let registrar = bus.clone();
        let held: Rc<RefCell<Vec<Subscription<u32>>>> = Rc::new(RefCell::new(Vec::new()));
        let held2 = Rc::clone(&held);
        let _a = bus.subscribe(move |_| {
            if held2.borrow().is_empty() {
                let sub = registrar.subscribe(make("late"));
                held2.borrow_mut().push(sub);
            }
            Ok(())
        });
        bus.emit(1);
        bus.emit(2);
        assert_eq!(*log.borrow(), vec!["late:2"]);
    }

    #[test]
    fn unsubscribe_during_dispatch_skips_removed_handler() {
        let bus: EventBus<u32> = EventBus::new();
        let (log, make) = recorder();
        let victim: Rc<RefCell<Option<Subscription<u32>>>> = Rc::new(RefCell::new(None));
        let victim2 = Rc::clone(&victim);
        let _a = bus.subscribe(move |_| {
            if let Some(sub) = victim2.borrow_mut().take() {
                sub.unsubscribe();
            }
            Ok(())
        });
        *victim.borrow_mut() = Some(bus.subscribe(make("b")));
        bus.emit(1);
        assert!(log.borrow().is_empty());
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn clones_share_subscribers() {
        let bus: EventBus<u32> = EventBus::new();
        let other = bus.clone();
        let (log, make) = recorder();
        let _a = bus.subscribe(make("a"));
        other.emit(9);
        assert_eq!(*log.borrow(), vec!["a:9"]);
        assert_eq!(other.subscriber_count(), 1);
    }

    #[test]
    fn change_bus_carries_change_events() {
        let bus = ChangeBus::new();
        let count = Rc::new(Cell::new(0));
        let count2 = Rc::clone(&count);
        let _s = bus.subscribe(move |e: &ChangeEvent| {
            if e.is_file_change() {
                count2.set(count2.get() + 1);
            }
            Ok(())
        });
        bus.emit(ChangeEvent::FileChange {
            op: mirage_types::FileOp::Created,
            path: "/a".into(),
            dest: None,
        });
        bus.emit(ChangeEvent::Notification {
            title: "hi".into(),
            message: "there".into(),
        });
        assert_eq!(count.get(), 1);
    }
}
