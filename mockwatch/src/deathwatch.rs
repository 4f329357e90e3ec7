// vim: tw=80
//! Destruction tracking for mock objects
//!
//! A mock object placed under watch with [`Deathwatched::new`] must not be
//! destroyed unless the test said it should be, with
//! [`Deathwatched::require_destruction`].  Conversely, the test fails if a
//! required destruction never happens.
//!
//! ```
//! # use mockwatch::*;
//! struct MockConn {
//!     close: MockPoint<(), ()>,
//! }
//!
//! impl MockObject for MockConn {
//!     fn mock_points(&self) -> Vec<&dyn Point> {
//!         vec![&self.close]
//!     }
//! }
//!
//! let conn = Deathwatched::new(MockConn{close: MockPoint::new("close")});
//! let _e = conn.close.expect(|e| e);
//! let d = conn.require_destruction();
//! conn.close.call(());
//! drop(conn);
//! assert!(d.is_satisfied());
//! ```

use std::{
    any::type_name,
    fmt,
    mem,
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex}
};

use crate::{
    lock,
    point::MockObject,
    report::{self, Location, Severity, Violation, ViolationKind},
    sequence::{self, SeqHandle, Sequence},
    times::{Times, TimesRange},
    trace
};

/// A live destruction requirement
struct Required {
    times: Arc<Times>,
    sequences: Vec<SeqHandle>,
    location: Location
}

enum WatchState {
    Alive {
        required: Option<Required>
    },
    Destroyed,
    /// Released with [`Deathwatched::into_inner`]
    Unwatched,
}

struct Record {
    name: String,
    state: Mutex<WatchState>
}

/// A mock object whose destruction is part of the test's expectations.
///
/// Dereferences to the wrapped object.  Dropping it:
///
/// 1. reports every expectation on the object's own mock points that hasn't
///    been called its minimum number of times yet, then
/// 2. reports the destruction itself, unless a [`DestructionExpectation`] is
///    alive and, if it joined sequences, it is its turn.
///
/// Violations are fatal, or nonfatal if the thread is already panicking.
pub struct Deathwatched<T: MockObject> {
    value: Option<T>,
    record: Arc<Record>,
    location: Location
}

impl<T: MockObject> Deathwatched<T> {
    /// Place `value` under watch.  Violations name it by its type.
    #[track_caller]
    pub fn new(value: T) -> Self {
        let location = Location::caller();
        Self::with_name(value, type_name::<T>(), location)
    }

    /// Place `value` under watch, naming it `name` in violations.
    #[track_caller]
    pub fn named<S: Into<String>>(value: T, name: S) -> Self {
        let location = Location::caller();
        Self::with_name(value, name, location)
    }

    fn with_name<S: Into<String>>(value: T, name: S, location: Location)
        -> Self
    {
        let record = Record {
            name: name.into(),
            state: Mutex::new(WatchState::Alive{required: None})
        };
        Deathwatched{value: Some(value), record: Arc::new(record), location}
    }

    /// Allow, and require, the object's destruction while the returned
    /// expectation lives.
    ///
    /// Only one destruction expectation may be alive at a time.
    #[track_caller]
    pub fn require_destruction(&self) -> DestructionExpectation {
        let location = Location::caller();
        let created = {
            let mut state = lock(&self.record.state);
            match &mut *state {
                WatchState::Alive{required: r @ None} => {
                    *r = Some(Required {
                        times: Arc::new(Times::new(TimesRange::from(1))),
                        sequences: Vec::new(),
                        location
                    });
                    true
                },
                _ => false
            }
        };
        if !created {
            let message = format!("{} already has a destruction expectation",
                                  self.record.name);
            report::fatal(Violation::new(ViolationKind::Misuse, location,
                                         message));
        }
        DestructionExpectation{record: self.record.clone(), location}
    }

    /// Is a [`DestructionExpectation`] for this object alive?
    pub fn is_destruction_required(&self) -> bool {
        matches!(*lock(&self.record.state),
                 WatchState::Alive{required: Some(_)})
    }

    /// End the watch and return the object, without checking anything.
    pub fn into_inner(mut this: Self) -> T {
        *lock(&this.record.state) = WatchState::Unwatched;
        match this.value.take() {
            Some(value) => value,
            None => unreachable!("the value is only taken when the watch ends")
        }
    }
}

impl<T: MockObject> Deref for Deathwatched<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("the value is only taken when the watch ends")
        }
    }
}

impl<T: MockObject> DerefMut for Deathwatched<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("the value is only taken when the watch ends")
        }
    }
}

impl<T: MockObject> fmt::Debug for Deathwatched<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Deathwatched")
            .field("name", &self.record.name)
            .field("location", &self.location)
            .finish()
    }
}

impl<T: MockObject> Drop for Deathwatched<T> {
    fn drop(&mut self) {
        let value = match self.value.take() {
            Some(value) => value,
            None => return
        };
        let severity = Severity::for_drop();
        let name = &self.record.name;

        let pending: Vec<String> = value.mock_points()
            .iter()
            .flat_map(|p| p.unsatisfied())
            .collect();
        let old = mem::replace(&mut *lock(&self.record.state),
                               WatchState::Destroyed);
        let required = match old {
            WatchState::Alive{required} => required,
            _ => None
        };

        if !pending.is_empty() {
            let message = format!("{} destroyed while expectations still \
                                  wait for calls:\n  {}", name,
                                  pending.join("\n  "));
            report::report(severity,
                           Violation::new(ViolationKind::UnmetObligations,
                                          self.location, message));
        }
        match required {
            Some(req) => {
                if let Err(blocker) = sequence::consume(&req.sequences,
                                                        &req.times)
                {
                    let message = format!("{} destroyed out of order, {}",
                                          name, blocker);
                    report::report(severity, Violation::new(
                            ViolationKind::UnexpectedDestruction, req.location,
                            message));
                } else if trace::is_active() {
                    trace::emit(&req.location, &format!("drop({})", name));
                }
            },
            None => {
                let message = format!("{} destroyed without a destruction \
                                      expectation", name);
                report::report(severity, Violation::new(
                        ViolationKind::UnexpectedDestruction, self.location,
                        message));
            }
        }
        drop(value);
    }
}

/// Requires a [`Deathwatched`] object to be destroyed before this handle is
/// dropped.
#[must_use = "the destruction requirement ends as soon as it is dropped"]
pub struct DestructionExpectation {
    record: Arc<Record>,
    location: Location
}

impl DestructionExpectation {
    /// Require the destruction to happen in turn within `seq`.
    ///
    /// ```
    /// # use mockwatch::*;
    /// # struct MockConn { close: MockPoint<(), ()> }
    /// # impl MockObject for MockConn {
    /// #     fn mock_points(&self) -> Vec<&dyn Point> { vec![&self.close] }
    /// # }
    /// let conn = Deathwatched::new(MockConn{close: MockPoint::new("close")});
    /// let seq = Sequence::new();
    /// let _c = conn.close.expect(|e| e.in_sequence(&seq));
    /// let _d = conn.require_destruction().in_sequence(&seq);
    /// conn.close.call(());
    /// drop(conn);
    /// ```
    pub fn in_sequence(self, seq: &Sequence) -> Self {
        let desc = format!("destruction of {} required at {}",
                           self.record.name, self.location);
        let mut state = lock(&self.record.state);
        if let WatchState::Alive{required: Some(req)} = &mut *state {
            if !req.sequences.iter().any(|h| h.is_in(seq)) {
                req.sequences.push(seq.join(req.times.clone(), desc));
            }
        }
        drop(state);
        self
    }

    /// Has the object been destroyed?
    pub fn is_satisfied(&self) -> bool {
        matches!(*lock(&self.record.state), WatchState::Destroyed)
    }

    /// Where the destruction was required
    pub fn location(&self) -> Location {
        self.location
    }
}

impl fmt::Debug for DestructionExpectation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DestructionExpectation")
            .field("name", &self.record.name)
            .field("location", &self.location)
            .finish()
    }
}

impl Drop for DestructionExpectation {
    fn drop(&mut self) {
        let outstanding = match &mut *lock(&self.record.state) {
            WatchState::Alive{required} => required.take(),
            _ => None
        };
        if let Some(req) = outstanding {
            // Retires it from its sequences
            drop(req);
            let message = format!("{} is still alive", self.record.name);
            report::report(Severity::for_drop(),
                           Violation::new(ViolationKind::NotDestroyed,
                                          self.location, message));
        }
    }
}

#[cfg(test)]
mod t {
    use super::*;
    use crate::{MockPoint, Point};

    struct MockThing {
        poke: MockPoint<(), ()>
    }

    impl MockObject for MockThing {
        fn mock_points(&self) -> Vec<&dyn Point> {
            vec![&self.poke]
        }
    }

    fn thing() -> MockThing {
        MockThing{poke: MockPoint::new("poke")}
    }

    #[test]
    fn required_destruction() {
        let w = Deathwatched::new(thing());
        let d = w.require_destruction();
        assert!(w.is_destruction_required());
        assert!(!d.is_satisfied());
        drop(w);
        assert!(d.is_satisfied());
    }

    #[test]
    #[should_panic(expected = "destroyed without a destruction expectation")]
    fn unexpected_destruction() {
        let _w = Deathwatched::new(thing());
    }

    #[test]
    #[should_panic(expected = "Object not destroyed")]
    fn not_destroyed() {
        let w = Deathwatched::named(thing(), "thing");
        let d = w.require_destruction();
        drop(d);
        drop(w);
    }

    #[test]
    #[should_panic(expected = "already has a destruction expectation")]
    fn two_destruction_expectations() {
        let w = Deathwatched::new(thing());
        let _d1 = w.require_destruction();
        let _d2 = w.require_destruction();
    }

    #[test]
    fn into_inner_releases() {
        let w = Deathwatched::new(thing());
        let t = Deathwatched::into_inner(w);
        let _e = t.poke.allow(|e| e);
        t.poke.call(());
    }
}
