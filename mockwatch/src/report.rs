// vim: tw=80
//! Violation reporting
//!
//! All deviations from the declared expectations funnel through a single
//! process-wide [`Reporter`].  Its calling contract depends on the
//! [`Severity`]:
//!
//! * For [`Severity::Fatal`] the reporter must not return.  It should panic,
//!   or otherwise transfer control away from the offending call.  If it does
//!   return anyway, Mockwatch panics on its behalf, because a failed call has
//!   no value it could produce.
//! * For [`Severity::Nonfatal`] the reporter must return.  Nonfatal reports
//!   are made while the thread is already unwinding, where a second panic
//!   would abort the process.

use std::{
    error,
    fmt,
    mem,
    panic,
    sync::{Arc, PoisonError, RwLock},
    thread
};

use lazy_static::lazy_static;

use crate::log;

/// How a [`Reporter`] must treat a violation
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Severity {
    /// The reporter must not return.
    Fatal,
    /// The reporter must return.
    Nonfatal,
}

impl Severity {
    /// The severity for violations detected by a destructor: fatal normally,
    /// nonfatal while the current thread is already panicking.
    pub fn for_drop() -> Self {
        if thread::panicking() {
            Severity::Nonfatal
        } else {
            Severity::Fatal
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Fatal => f.write_str("fatal"),
            Severity::Nonfatal => f.write_str("nonfatal"),
        }
    }
}

/// A position in the test's source code.
///
/// Expectations remember where they were declared.  Violations that can't
/// be attributed to any one declaration, like a call that no expectation
/// accepts, use [`Location::unknown`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Location {
    file: &'static str,
    line: u32
}

impl Location {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Location{file, line}
    }

    /// The location of the caller of the function calling this one.
    #[track_caller]
    pub fn caller() -> Self {
        let l = panic::Location::caller();
        Location{file: l.file(), line: l.line()}
    }

    /// An empty path and line 0
    pub const fn unknown() -> Self {
        Location{file: "", line: 0}
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn is_unknown(&self) -> bool {
        self.file.is_empty() && self.line == 0
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::unknown()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_unknown() {
            f.write_str("<unknown location>")
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

/// The different ways a test can deviate from its expectations
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ViolationKind {
    /// No live expectation accepted a call.  Calls that only failed because
    /// of their position in a [`Sequence`](crate::Sequence) end up here too.
    UnexpectedCall,
    /// A call matched an expectation that forbids it.
    ForbiddenCall,
    /// An expectation ended with a call count outside its bounds.
    Occurrence,
    /// A watched object was destroyed without a destruction expectation.
    UnexpectedDestruction,
    /// A destruction expectation ended while its object was still alive.
    NotDestroyed,
    /// A watched object was destroyed while expectations on its own mock
    /// points still waited for calls.
    UnmetObligations,
    /// The selected expectation has no action that produces a return value.
    MissingAction,
    /// An expectation was declared in a way that can't work.
    Misuse,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ViolationKind::UnexpectedCall => "No match for call",
            ViolationKind::ForbiddenCall => "Match of forbidden call",
            ViolationKind::Occurrence => "Unfulfilled expectation",
            ViolationKind::UnexpectedDestruction => "Unexpected destruction",
            ViolationKind::NotDestroyed => "Object not destroyed",
            ViolationKind::UnmetObligations =>
                "Pending expectations at destruction",
            ViolationKind::MissingAction => "Missing return action",
            ViolationKind::Misuse => "Invalid expectation",
        };
        f.write_str(s)
    }
}

/// A detected deviation from the declared expectations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Violation {
    kind: ViolationKind,
    location: Location,
    message: String
}

impl Violation {
    pub fn new<S>(kind: ViolationKind, location: Location, message: S) -> Self
        where S: Into<String>
    {
        Violation{kind, location, message: message.into()}
    }

    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The details, without the kind prefix
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl error::Error for Violation {}

/// A sink for violations.
///
/// See the [module documentation](self) for the calling contract.  Closures
/// with the signature `Fn(Severity, &Location, &str)` are reporters too.
pub trait Reporter: Send + Sync {
    fn report(&self, severity: Severity, location: &Location, message: &str);
}

impl<F> Reporter for F
    where F: Fn(Severity, &Location, &str) + Send + Sync
{
    fn report(&self, severity: Severity, location: &Location, message: &str) {
        self(severity, location, message)
    }
}

/// The reporter used unless another is installed.
///
/// Fatal violations panic with the message, prefixed by the location if it
/// is known, so `#[should_panic(expected = ...)]` can match on them.
/// Nonfatal violations are printed to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultReporter;

impl Reporter for DefaultReporter {
    fn report(&self, severity: Severity, location: &Location, message: &str) {
        let text = if location.is_unknown() {
            message.to_owned()
        } else {
            format!("{location}: {message}")
        };
        match severity {
            Severity::Fatal => panic!("{}", text),
            Severity::Nonfatal => eprintln!("{}", text),
        }
    }
}

lazy_static! {
    static ref REPORTER: RwLock<Arc<dyn Reporter>> =
        RwLock::new(Arc::new(DefaultReporter));
}

/// Install `reporter` as the process-wide violation sink.
///
/// Returns the previous reporter.  This is not meant to race with mock
/// calls: install the reporter before the test starts using its mocks, and
/// restore the old one with [`reset_reporter`] or another `set_reporter`
/// afterwards.
pub fn set_reporter<R: Reporter + 'static>(reporter: R) -> Arc<dyn Reporter> {
    let mut guard = REPORTER.write().unwrap_or_else(PoisonError::into_inner);
    mem::replace(&mut *guard, Arc::new(reporter))
}

/// Reinstall [`DefaultReporter`], returning the previous reporter.
pub fn reset_reporter() -> Arc<dyn Reporter> {
    set_reporter(DefaultReporter)
}

fn current() -> Arc<dyn Reporter> {
    // Clone so the lock is not held while the reporter panics.
    REPORTER.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Report a violation that ends the current call or test.
pub(crate) fn fatal(violation: Violation) -> ! {
    log::violation(Severity::Fatal, &violation);
    let message = violation.to_string();
    current().report(Severity::Fatal, &violation.location, &message);
    // The reporter broke its contract by returning.
    if violation.location.is_unknown() {
        panic!("{}", message)
    } else {
        panic!("{}: {}", violation.location, message)
    }
}

/// Report a violation detected while the thread is already unwinding.
pub(crate) fn nonfatal(violation: Violation) {
    log::violation(Severity::Nonfatal, &violation);
    let message = violation.to_string();
    current().report(Severity::Nonfatal, &violation.location, &message);
}

pub(crate) fn report(severity: Severity, violation: Violation) {
    match severity {
        Severity::Fatal => fatal(violation),
        Severity::Nonfatal => nonfatal(violation),
    }
}
