// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Multicast notification channels without replay.
//!
//! A [`Subject`] is the emitting side; an [`EventStream`] is a subscribe-only
//! view of it that can be handed to callers. Observers registered through
//! [`EventStream::subscribe`] receive every value emitted *after* they
//! subscribed, in registration order.
//!
//! # Invariants
//!
//! 1. No buffering: a new observer never sees past values.
//! 2. Dropping a [`Subscription`] removes its observer before the next emission,
//!    including an emission that is currently in progress.
//! 3. After [`Subject::complete`], emissions are ignored, every completion
//!    callback runs exactly once, and late subscribers are completed immediately.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use understory_portal::notify::Subject;
//!
//! let clicks: Subject<u32> = Subject::new();
//! let total = Rc::new(Cell::new(0));
//! let seen = total.clone();
//! let sub = clicks.stream().subscribe(move |n| seen.set(seen.get() + n));
//!
//! clicks.emit(&2);
//! clicks.emit(&3);
//! assert_eq!(total.get(), 5);
//!
//! drop(sub);
//! clicks.emit(&10);
//! assert_eq!(total.get(), 5);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type NextFn<T> = Rc<dyn Fn(&T)>;
type CompleteFn = Box<dyn FnOnce()>;

struct Observer<T> {
    id: u64,
    next: NextFn<T>,
    complete: Option<CompleteFn>,
}

struct SubjectState<T> {
    next_id: u64,
    observers: Vec<Observer<T>>,
    completed: bool,
}

/// Emitting side of a multicast channel.
pub struct Subject<T> {
    state: Rc<RefCell<SubjectState<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Subject")
            .field("observers", &state.observers.len())
            .field("completed", &state.completed)
            .finish()
    }
}

impl<T: 'static> Subject<T> {
    /// Create an open subject with no observers.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SubjectState {
                next_id: 1,
                observers: Vec::new(),
                completed: false,
            })),
        }
    }

    /// Deliver `value` to every current observer. Ignored once completed.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<(u64, NextFn<T>)> = {
            let state = self.state.borrow();
            if state.completed {
                return;
            }
            state
                .observers
                .iter()
                .map(|o| (o.id, Rc::clone(&o.next)))
                .collect()
        };
        for (id, next) in snapshot {
            // An earlier observer may have unsubscribed this one.
            let live = self.state.borrow().observers.iter().any(|o| o.id == id);
            if live {
                next(value);
            }
        }
    }

    /// Close the channel: drop all observers and run their completion callbacks.
    ///
    /// Completing twice is a no-op.
    pub fn complete(&self) {
        let observers = {
            let mut state = self.state.borrow_mut();
            if state.completed {
                return;
            }
            state.completed = true;
            core::mem::take(&mut state.observers)
        };
        for observer in observers {
            if let Some(done) = observer.complete {
                done();
            }
        }
    }

    /// Returns true once [`Subject::complete`] has run.
    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// Returns true if anyone is listening.
    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }

    /// Subscribe-only view of this subject.
    pub fn stream(&self) -> EventStream<T> {
        EventStream {
            subject: self.clone(),
        }
    }

    fn register(&self, next: NextFn<T>, complete: Option<CompleteFn>) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            if state.completed {
                drop(state);
                if let Some(done) = complete {
                    done();
                }
                return Subscription::closed();
            }
            let id = state.next_id;
            state.next_id += 1;
            state.observers.push(Observer { id, next, complete });
            id
        };
        let weak: Weak<RefCell<SubjectState<T>>> = Rc::downgrade(&self.state);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    // Release the observer outside the borrow; its drop may re-enter.
                    let removed = {
                        let mut state = state.borrow_mut();
                        state
                            .observers
                            .iter()
                            .position(|o| o.id == id)
                            .map(|at| state.observers.remove(at))
                    };
                    drop(removed);
                }
            })),
        }
    }
}

/// Subscribe-only handle to a [`Subject`].
pub struct EventStream<T> {
    subject: Subject<T>,
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            subject: self.subject.clone(),
        }
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventStream").field(&self.subject).finish()
    }
}

impl<T: 'static> EventStream<T> {
    /// Observe future values.
    pub fn subscribe(&self, next: impl Fn(&T) + 'static) -> Subscription {
        self.subject.register(Rc::new(next), None)
    }

    /// Observe future values and the channel's completion.
    pub fn subscribe_with_complete(
        &self,
        next: impl Fn(&T) + 'static,
        complete: impl FnOnce() + 'static,
    ) -> Subscription {
        self.subject.register(Rc::new(next), Some(Box::new(complete)))
    }

    /// Returns true once the underlying subject completed.
    pub fn is_completed(&self) -> bool {
        self.subject.is_completed()
    }
}

/// RAII guard for an observer registration. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

impl Subscription {
    fn closed() -> Self {
        Self { unsubscribe: None }
    }

    /// Unsubscribe now.
    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }

    /// Keep the observer registered until the subject completes or is dropped.
    pub fn forget(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn late_subscriber_sees_only_future_values() {
        let s: Subject<i32> = Subject::new();
        s.emit(&1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = s.stream().subscribe(move |v| sink.borrow_mut().push(*v));
        s.emit(&2);
        assert_eq!(*seen.borrow(), [2]);
    }

    #[test]
    fn observer_unsubscribed_mid_emission_is_skipped() {
        let s: Subject<()> = Subject::new();
        let second_calls = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let slot_in_first = slot.clone();
        let _first = s.stream().subscribe(move |()| {
            slot_in_first.borrow_mut().take();
        });
        let calls = second_calls.clone();
        *slot.borrow_mut() = Some(s.stream().subscribe(move |()| calls.set(calls.get() + 1)));

        s.emit(&());
        assert_eq!(second_calls.get(), 0);
        assert_eq!(s.observer_count(), 1);
    }

    #[test]
    fn complete_runs_callbacks_once_and_blocks_emission() {
        let s: Subject<u8> = Subject::new();
        let completions = Rc::new(Cell::new(0));
        let values = Rc::new(Cell::new(0));
        let (c, v) = (completions.clone(), values.clone());
        let _sub = s
            .stream()
            .subscribe_with_complete(move |_| v.set(v.get() + 1), move || c.set(c.get() + 1));
        s.complete();
        s.complete();
        s.emit(&1);
        assert_eq!(completions.get(), 1);
        assert_eq!(values.get(), 0);
        assert!(s.is_completed());
        assert!(!s.has_observers());

        let late = Rc::new(Cell::new(false));
        let l = late.clone();
        let _late = s.stream().subscribe_with_complete(|_| {}, move || l.set(true));
        assert!(late.get());
    }

    #[test]
    fn forget_keeps_observer_alive() {
        let s: Subject<()> = Subject::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        s.stream().subscribe(move |()| h.set(h.get() + 1)).forget();
        s.emit(&());
        assert_eq!(hits.get(), 1);
    }
}
