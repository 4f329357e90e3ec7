// vim: tw=80
//! Declaring expectations, and their handles

use std::{
    fmt,
    sync::{Arc, Mutex}
};

use predicates::prelude::*;

use crate::{
    action::{Actions, Rfunc},
    lock,
    log,
    matcher::{self, ArgMatchers, Matcher},
    point::{next_id, Entry, Shared},
    report::{self, Location, Severity, Violation, ViolationKind},
    sequence::Sequence,
    times::{NCalls, Times, TimesRange}
};

/// An expectation that hasn't been registered yet.
///
/// [`MockPoint::expect`](crate::MockPoint::expect),
/// [`MockPoint::allow`](crate::MockPoint::allow) and
/// [`MockPoint::forbid`](crate::MockPoint::forbid) pass one to a closure,
/// which configures it with the builder methods below.  Only once the closure
/// returns is the expectation registered, in a single step, so concurrent
/// calls never see it half configured.  Its matcher, call count, sequences
/// and actions can't change afterwards.
#[must_use = "a declaration takes effect when its closure returns it"]
pub struct Declaration<I, O> {
    point: Arc<Shared<I, O>>,
    location: Location,
    matcher: Matcher<I>,
    range: TimesRange,
    sequences: Vec<Sequence>,
    actions: Actions<I, O>
}

impl<I: 'static, O: 'static> Declaration<I, O> {
    pub(crate) fn new(point: Arc<Shared<I, O>>, range: TimesRange,
                      location: Location) -> Self
    {
        Declaration {
            point,
            location,
            matcher: Matcher::default(),
            range,
            sequences: Vec::new(),
            actions: Actions::default()
        }
    }

    /// Add the finished expectation to its point, and join its sequences.
    ///
    /// Both happen under the point's lock, so dispatch either sees the whole
    /// expectation or none of it.
    pub(crate) fn register(self) -> Expectation<I, O> {
        let Declaration{point, location, matcher, range, sequences, actions}
            = self;
        let id = next_id();
        let times = Arc::new(Times::new(range));
        let desc = format!("{}: expectation at {}", point.name, location);
        {
            let mut registry = lock(&point.registry);
            let sequences = sequences.iter()
                .map(|seq| seq.join(times.clone(), desc.clone()))
                .collect();
            registry.push(Entry {
                id,
                location,
                matcher,
                times: times.clone(),
                sequences,
                actions: Arc::new(Mutex::new(actions))
            });
        }
        log::registered(&point.name, &location);
        Expectation{point, id, location, times}
    }

    fn misuse(&self, what: &str) -> ! {
        let message = format!("{}: expectation at {} {}", self.point.name,
                              self.location, what);
        report::fatal(Violation::new(ViolationKind::Misuse, self.location,
                                     message))
    }

    fn set_rfunc(mut self, rfunc: Rfunc<I, O>) -> Self {
        if self.actions.has_rfunc() {
            self.misuse("already has a return action");
        }
        self.actions.set_rfunc(rfunc);
        self
    }

    /// Match the arguments with one [`Predicate`] each.
    ///
    /// ```
    /// # use mockwatch::*;
    /// let point = MockPoint::<(u32, String), ()>::new("put");
    /// let _e = point.expect(|e| e
    ///     .with((predicate::lt(10),
    ///            matcher::custom("starts_with_a",
    ///                            |s: &String| s.starts_with('a')))));
    /// point.call((4, "abc".to_owned()));
    /// ```
    pub fn with<M: ArgMatchers<I>>(mut self, matchers: M) -> Self {
        self.matcher.set_args(matchers.into_predicate());
        self
    }

    /// Match arguments equal to `args`.
    pub fn with_args(mut self, args: I) -> Self
        where I: PartialEq + fmt::Debug + Send
    {
        self.matcher.set_args(matcher::eq_args(args));
        self
    }

    /// Match the whole argument tuple with a single [`Predicate`].
    pub fn with_predicate<P>(mut self, p: P) -> Self
        where P: Predicate<I> + Send + 'static
    {
        self.matcher.set_args(Box::new(p));
        self
    }

    /// Add a condition over the whole argument tuple.
    ///
    /// Conditions are only evaluated if the argument matchers accept the
    /// call, in the order in which they were added.
    pub fn withf<F>(mut self, f: F) -> Self
        where F: Fn(&I) -> bool + Send + 'static
    {
        self.matcher.add_condition(Box::new(f));
        self
    }

    /// Set the permitted number of calls, either as an exact count or as any
    /// kind of range.
    ///
    /// ```
    /// # use mockwatch::*;
    /// let point = MockPoint::<(), ()>::new("poll");
    /// let _e = point.expect(|e| e.times(2..=3));
    /// point.call(());
    /// point.call(());
    /// ```
    pub fn times<T: Into<TimesRange>>(mut self, range: T) -> Self {
        self.range = range.into();
        self
    }

    /// Expect exactly one call.
    pub fn once(self) -> Self {
        self.times(1)
    }

    /// Forbid any matching call.
    pub fn never(self) -> Self {
        self.times(0)
    }

    /// Allow any number of calls.
    pub fn times_any(self) -> Self {
        self.times(..)
    }

    /// Expect `n` or more calls.
    pub fn at_least(self, n: usize) -> Self {
        self.times(n..)
    }

    /// Allow up to `n` calls.
    pub fn at_most(self, n: usize) -> Self {
        self.times(..=n)
    }

    /// Make this the next member of `seq`.
    ///
    /// Sequences are joined in registration order, which is the order in
    /// which the declaring closures return.  Joining the same sequence twice
    /// is a violation.
    pub fn in_sequence(mut self, seq: &Sequence) -> Self {
        if self.sequences.iter().any(|s| s.is_same(seq)) {
            self.misuse("joined the same sequence twice");
        }
        self.sequences.push(seq.clone());
        self
    }

    /// Run `f` before the return action.
    ///
    /// Side effects run in the order they were added, and may modify the
    /// arguments before the return action receives them.  They may call
    /// other mock points, but not the same expectation again: its actions
    /// are locked while they run, so that would deadlock.
    ///
    /// ```
    /// # use mockwatch::*;
    /// let point = MockPoint::<(Vec<u8>,), usize>::new("write");
    /// let _e = point.expect(|e| e
    ///     .side_effect(|(buf,)| buf.truncate(2))
    ///     .returning(|(buf,)| buf.len()));
    /// assert_eq!(2, point.call((vec![1, 2, 3],)));
    /// ```
    pub fn side_effect<F>(mut self, f: F) -> Self
        where F: FnMut(&mut I) + Send + 'static
    {
        self.actions.add_side_effect(Box::new(f));
        self
    }

    /// Compute the return value with a closure, which receives the
    /// arguments by value.
    ///
    /// Like a [side effect](Self::side_effect), the closure may call other
    /// mock points.  A call that would be dispatched back to this same
    /// expectation deadlocks.
    pub fn returning<F>(self, f: F) -> Self
        where F: FnMut(I) -> O + Send + 'static
    {
        self.set_rfunc(Rfunc::mutable(f))
    }

    /// Single-threaded version of [`returning`](Self::returning), for
    /// closures that aren't `Send`.
    ///
    /// It is a runtime error to call the point from a different thread than
    /// the one that set the action.
    pub fn returning_st<F>(self, f: F) -> Self
        where F: FnMut(I) -> O + 'static
    {
        self.set_rfunc(Rfunc::mutable_st(f))
    }

    /// Return the value produced by a closure that can only be called once.
    /// A second call is a violation.
    pub fn return_once<F>(self, f: F) -> Self
        where F: FnOnce(I) -> O + Send + 'static
    {
        self.set_rfunc(Rfunc::once(f))
    }

    /// Single-threaded version of [`return_once`](Self::return_once), for
    /// return values that are neither `Send` nor `Clone`.
    pub fn return_once_st<F>(self, f: F) -> Self
        where F: FnOnce(I) -> O + 'static
    {
        self.set_rfunc(Rfunc::once_st(f))
    }

    /// Return a clone of `c` on every call.
    pub fn return_const<C>(self, c: C) -> Self
        where C: Clone + Into<O> + Send + 'static
    {
        self.set_rfunc(Rfunc::mutable(move |_| c.clone().into()))
    }

    /// Unwind with `payload` instead of returning.
    ///
    /// The payload can be recovered with
    /// [`catch_unwind`](std::panic::catch_unwind).
    ///
    /// ```
    /// # use mockwatch::*;
    /// # use std::panic;
    /// let point = MockPoint::<(), u32>::new("read");
    /// let _e = point.expect(|e| e.throwing("disk on fire"));
    /// let r = panic::catch_unwind(|| point.call(()));
    /// assert_eq!(Some(&"disk on fire"),
    ///            r.unwrap_err().downcast_ref::<&str>());
    /// ```
    pub fn throwing<P>(self, payload: P) -> Self
        where P: Clone + Send + 'static
    {
        self.set_rfunc(Rfunc::throw(payload))
    }
}

impl<I, T> Declaration<I, &'static T>
    where I: 'static,
          T: ?Sized + Sync + 'static
{
    /// Return the same reference on every call.
    ///
    /// ```
    /// # use mockwatch::*;
    /// static GREETING: &str = "hello";
    /// let point = MockPoint::<(), &'static str>::new("greeting");
    /// let _e = point.expect(|e| e.return_ref(GREETING));
    /// assert_eq!("hello", point.call(()));
    /// ```
    pub fn return_ref(self, r: &'static T) -> Self {
        self.returning(move |_| r)
    }

    /// Move `value` to the heap, leak it, and return references to it.
    pub fn return_leaked(self, value: T) -> Self
        where T: Sized
    {
        let r: &'static T = Box::leak(Box::new(value));
        self.return_ref(r)
    }
}

/// A live expectation on a [`MockPoint`](crate::MockPoint).
///
/// The expectation takes part in dispatch for as long as this handle is
/// alive.  Dropping the handle removes it from its point and checks its call
/// count.  Too few calls are reported as a violation.  Too many never reach
/// this point, since calls beyond the maximum are rejected as unexpected.
#[must_use = "an expectation is removed as soon as its handle is dropped"]
pub struct Expectation<I, O> {
    point: Arc<Shared<I, O>>,
    id: u64,
    location: Location,
    times: Arc<Times>
}

impl<I, O> Expectation<I, O> {
    /// Has the expectation been called its minimum number of times?
    pub fn is_satisfied(&self) -> bool {
        self.times.is_satisfied()
    }

    /// Has the expectation been called its maximum number of times?  A
    /// saturated expectation doesn't accept any more calls.
    pub fn is_saturated(&self) -> bool {
        self.times.is_done()
    }

    pub fn call_count(&self) -> usize {
        self.times.count()
    }

    /// Where the expectation was declared
    pub fn location(&self) -> Location {
        self.location
    }
}

impl<I, O> fmt::Debug for Expectation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("point", &self.point.name)
            .field("location", &self.location)
            .field("times", &self.times.range())
            .field("calls", &self.times.count())
            .finish()
    }
}

impl<I, O> Drop for Expectation<I, O> {
    fn drop(&mut self) {
        let entry = {
            let mut registry = lock(&self.point.registry);
            registry.iter()
                .position(|e| e.id == self.id)
                .map(|i| registry.remove(i))
        };
        let matcher = entry.as_ref()
            .map(|e| e.matcher.to_string())
            .unwrap_or_default();
        // Retire from sequences only after releasing the point's lock.
        drop(entry);

        let count = self.times.count();
        let range = self.times.range();
        log::retired(&self.point.name, &self.location, count);
        // Calls beyond the maximum are rejected at dispatch, never counted.
        if count >= range.min() {
            return;
        }
        let message = format!("{}: Expectation({}) called {} which is fewer \
                              than expected {}", self.point.name, matcher,
                              NCalls(count), range.min());
        report::report(Severity::for_drop(),
                       Violation::new(ViolationKind::Occurrence,
                                      self.location, message));
    }
}
