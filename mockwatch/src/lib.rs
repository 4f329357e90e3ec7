// vim: tw=80
//! Scoped call expectations for hand-written test doubles.
//!
//! Mockwatch is the matching engine behind a mock object.  A mock object owns
//! one [`MockPoint`] per mocked method.  A test declares what calls are legal
//! by creating [`Expectation`]s on those points, and the mock object forwards
//! every real call to [`MockPoint::call`].  The engine picks the expectation
//! that handles the call, runs its action, and reports anything that deviates
//! from what was declared.
//!
//! # User Guide
//!
//! * [`Getting started`](#getting-started)
//! * [`Matching arguments`](#matching-arguments)
//! * [`Call counts`](#call-counts)
//! * [`Overriding expectations`](#overriding-expectations)
//! * [`Sequences`](#sequences)
//! * [`Actions`](#actions)
//! * [`Deathwatch`](#deathwatch)
//! * [`Reporting and tracing`](#reporting-and-tracing)
//! * [`Free functions`](#free-functions)
//!
//! ## Getting started
//!
//! ```
//! use mockwatch::*;
//!
//! trait Store {
//!     fn get(&self, key: u32) -> Option<String>;
//! }
//!
//! struct MockStore {
//!     get: MockPoint<(u32,), Option<String>>,
//! }
//!
//! impl Store for MockStore {
//!     fn get(&self, key: u32) -> Option<String> {
//!         self.get.call((key,))
//!     }
//! }
//!
//! let mock = MockStore { get: MockPoint::new("MockStore::get") };
//! let _e = mock.get.expect(|e| e
//!     .with((predicate::eq(5),))
//!     .return_const(Some("five".to_owned())));
//! assert_eq!(Some("five".to_owned()), mock.get(5));
//! ```
//!
//! Each declaring method takes a closure that configures a [`Declaration`].
//! The expectation is registered when the closure returns, so calls on other
//! threads never see it half configured, and it can't be changed afterwards.
//! An expectation is active exactly as long as its [`Expectation`] handle is
//! alive.  When the handle is dropped the expectation is removed from its
//! point and its call count is checked.  [`MockPoint::expect`] requires
//! exactly one call by default, [`MockPoint::allow`] permits any number of
//! calls, and [`MockPoint::forbid`] turns any matching call into a failure.
//!
//! ## Matching arguments
//!
//! [`Declaration::with`] takes a tuple with one [`Predicate`] per argument.
//! Anything from the [`predicate`] module works, as do the matchers in
//! [`matcher`].  [`Declaration::with_args`] is shorthand for exact equality
//! with every argument, and [`Declaration::withf`] adds a condition over the
//! whole argument tuple that is only evaluated once the per-argument matchers
//! accepted the call.
//!
//! ```
//! # use mockwatch::*;
//! let point = MockPoint::<(i32, &'static str), ()>::new("log");
//! let _e = point.allow(|e| e
//!     .with((predicate::ge(0), matcher::any()))
//!     .withf(|(level, msg)| msg.len() > *level as usize));
//! point.call((1, "hello"));
//! ```
//!
//! ## Call counts
//!
//! [`Declaration::times`] accepts an exact count or any kind of range.
//! Calls beyond the maximum are not matched by that expectation at all; if
//! nothing else matches they are reported as unexpected.  Too few calls are
//! reported when the handle is dropped.
//!
//! ```should_panic(expected = "fewer than expected 2")
//! # use mockwatch::*;
//! let point = MockPoint::<(), ()>::new("tick");
//! let _e = point.expect(|e| e.times(2));
//! point.call(());
//! ```
//!
//! ## Overriding expectations
//!
//! Each call is offered to the live expectations of its point newest first,
//! and the first one that accepts it wins.  A narrow expectation declared in
//! an inner scope therefore takes precedence over a wide default declared
//! earlier, and stops doing so once its scope ends.
//!
//! ```
//! # use mockwatch::*;
//! let point = MockPoint::<(i32,), i32>::new("func");
//! let _default = point.allow(|e| e.return_const(0));
//! {
//!     let _special = point.expect(|e| e
//!         .with((predicate::eq(4),))
//!         .return_const(99));
//!     assert_eq!(99, point.call((4,)));
//! }
//! assert_eq!(0, point.call((4,)));
//! ```
//!
//! ## Sequences
//!
//! Expectations that join a [`Sequence`] may only be matched in the order in
//! which they joined it.  An expectation that reached its maximum call count
//! makes room for the next one.
//!
//! ```
//! # use mockwatch::*;
//! let open = MockPoint::<(&'static str,), i32>::new("open");
//! let close = MockPoint::<(i32,), ()>::new("close");
//! let seq = Sequence::new();
//! let _o = open.expect(|e| e.in_sequence(&seq).return_const(7));
//! let _c = close.expect(|e| e.with_args((7,)).in_sequence(&seq));
//! let fd = open.call(("f",));
//! close.call((fd,));
//! ```
//!
//! ## Actions
//!
//! An expectation on a method that returns something needs exactly one
//! return or throw action: [`Declaration::return_const`],
//! [`Declaration::returning`], [`Declaration::return_once`],
//! [`Declaration::return_ref`] or [`Declaration::throwing`].  Any number of
//! [`Declaration::side_effect`]s may run before it.
//!
//! ## Deathwatch
//!
//! [`Deathwatched`] wraps a mock object and makes its destruction part of the
//! contract: dropping it is a violation unless a [`DestructionExpectation`]
//! created by [`Deathwatched::require_destruction`] is alive, and dropping
//! that expectation while the object still lives is a violation too.
//!
//! ## Reporting and tracing
//!
//! Every violation goes through a process-wide [`Reporter`].  The default one
//! panics for fatal violations and prints nonfatal ones to stderr.  Install a
//! different one with [`set_reporter`] to integrate with another test
//! harness.  Every successful match is also offered to the active
//! [`Tracer`]s, see [`trace_with`].
//!
//! ## Free functions
//!
//! A mocked free function keeps its point in a static.
//!
//! ```
//! # use mockwatch::*;
//! lazy_static! {
//!     static ref NOW: MockPoint<(), u64> = MockPoint::new("now");
//! }
//! fn now() -> u64 {
//!     NOW.call(())
//! }
//!
//! let _e = NOW.expect(|e| e.return_const(1_700_000_000u64));
//! assert_eq!(1_700_000_000, now());
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

mod action;
mod deathwatch;
mod expectation;
mod log;
pub mod matcher;
mod point;
mod printer;
mod report;
mod sequence;
mod times;
mod trace;

pub use crate::deathwatch::{Deathwatched, DestructionExpectation};
pub use crate::expectation::{Declaration, Expectation};
pub use crate::point::{MockObject, MockPoint, Point, PointId};
pub use crate::printer::{
    format_debug,
    format_opaque,
    reset_printer,
    set_printer,
    DebugArgs,
    OpaqueArgs
};
pub use crate::report::{
    reset_reporter,
    set_reporter,
    DefaultReporter,
    Location,
    Reporter,
    Severity,
    Violation,
    ViolationKind
};
pub use crate::sequence::Sequence;
pub use crate::times::TimesRange;
pub use crate::trace::{trace_with, StreamTracer, Tracer, TracerGuard};
#[cfg(feature = "tracing")]
pub use crate::trace::TracingTracer;

pub use predicates::prelude::{Predicate, predicate};

/// For mocking free functions and static methods
pub use lazy_static::lazy_static;

/// Lock a mutex, ignoring poison.
///
/// A fatal violation unwinds through whatever the test was doing.  That must
/// not turn every later use of the same mock into a `PoisonError`.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
