// vim: tw=80
//! Routing violations through a custom reporter
#![deny(warnings)]

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex}
};

use mockwatch::*;
use pretty_assertions::assert_eq;

/// Every test in this file replaces the process-wide reporter.
static REPORTER_MTX: Mutex<()> = Mutex::new(());

#[derive(Clone, Debug, PartialEq)]
struct Report {
    severity: Severity,
    location: String,
    message: String
}

#[derive(Clone, Default)]
struct Collector {
    reports: Arc<Mutex<Vec<Report>>>
}

impl Reporter for Collector {
    fn report(&self, severity: Severity, location: &Location, message: &str) {
        self.reports.lock().unwrap().push(Report {
            severity,
            location: location.to_string(),
            message: message.to_owned()
        });
    }
}

impl Collector {
    fn take(&self) -> Vec<Report> {
        std::mem::take(&mut *self.reports.lock().unwrap())
    }
}

/// Installs a [`Collector`] for the duration of a test.
struct Installed {
    collector: Collector,
    _guard: std::sync::MutexGuard<'static, ()>
}

impl Installed {
    fn new() -> Self {
        let guard = REPORTER_MTX.lock().unwrap_or_else(|e| e.into_inner());
        let collector = Collector::default();
        set_reporter(collector.clone());
        Installed{collector, _guard: guard}
    }
}

impl Drop for Installed {
    fn drop(&mut self) {
        reset_reporter();
    }
}

#[test]
fn fatal_panics_even_if_the_reporter_returns() {
    let sink = Installed::new();
    let point = MockPoint::<(u8,), ()>::new("p");
    let r = panic::catch_unwind(|| point.call((1,)));
    let msg = r.unwrap_err().downcast::<String>().unwrap();
    assert!(msg.starts_with("No match for call: p(1)"), "{}", msg);
    let reports = sink.collector.take();
    assert_eq!(1, reports.len());
    assert_eq!(Severity::Fatal, reports[0].severity);
    assert_eq!("<unknown location>", reports[0].location);
    assert_eq!(*msg, reports[0].message);
}

#[test]
fn occurrence_violation_location() {
    let sink = Installed::new();
    let point = MockPoint::<(), ()>::new("p");
    let line = line!() + 1;
    let e = point.expect(|e| e.times(2));
    point.call(());
    panic::catch_unwind(AssertUnwindSafe(move || drop(e))).unwrap_err();
    let reports = sink.collector.take();
    assert_eq!(vec![Report {
        severity: Severity::Fatal,
        location: format!("{}:{}", file!(), line),
        message: "Unfulfilled expectation: p: Expectation(<anything>) called \
                  1 time which is fewer than expected 2".to_owned()
    }], reports);
}

#[test]
fn nonfatal_while_unwinding() {
    let sink = Installed::new();
    let point = MockPoint::<(u32,), ()>::new("p");
    let r = panic::catch_unwind(|| {
        let _e = point.expect(|e| e.with((predicate::eq(4),)));
        panic!("the test itself failed");
    });
    assert_eq!(Some(&"the test itself failed"),
               r.unwrap_err().downcast_ref::<&str>());
    let reports = sink.collector.take();
    assert_eq!(1, reports.len());
    assert_eq!(Severity::Nonfatal, reports[0].severity);
    assert!(reports[0].message.contains("Expectation((var == 4)) called 0 \
                                        times"), "{:?}", reports);
}

/// A call beyond the maximum is rejected when it happens, so it is never
/// counted, and dropping the expectation reports nothing more.
#[test]
fn too_many_calls_reported_at_the_call() {
    let sink = Installed::new();
    let point = MockPoint::<(), ()>::new("p");
    let e = point.expect(|e| e);
    point.call(());
    panic::catch_unwind(|| point.call(())).unwrap_err();
    assert_eq!(1, e.call_count());
    drop(e);
    let reports = sink.collector.take();
    assert_eq!(1, reports.len(), "{:?}", reports);
    assert_eq!(Severity::Fatal, reports[0].severity);
    assert!(reports[0].message.contains("already called 1 time, the maximum"),
            "{:?}", reports);
}

#[test]
fn closure_reporter() {
    let _guard = REPORTER_MTX.lock().unwrap_or_else(|e| e.into_inner());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    let old = set_reporter(move |s: Severity, _: &Location, m: &str| {
        seen2.lock().unwrap().push(format!("{s}: {m}"));
    });
    let point = MockPoint::<(), ()>::new("p");
    let _no = point.forbid(|e| e);
    panic::catch_unwind(|| point.call(())).unwrap_err();
    // Put the previous reporter back
    set_reporter(move |s: Severity, l: &Location, m: &str| {
        old.report(s, l, m)
    });
    let seen = seen.lock().unwrap();
    assert_eq!(1, seen.len());
    assert!(seen[0].starts_with("fatal: Match of forbidden call: p() at "),
            "{:?}", seen);
}

#[test]
fn default_reporter_prefixes_the_location() {
    let _guard = REPORTER_MTX.lock().unwrap_or_else(|e| e.into_inner());
    reset_reporter();
    let point = MockPoint::<(), ()>::new("p");
    let line = line!() + 1;
    let e = point.expect(|e| e);
    let r = panic::catch_unwind(AssertUnwindSafe(move || drop(e)));
    let msg = r.unwrap_err().downcast::<String>().unwrap();
    let prefix = format!("{}:{}: Unfulfilled expectation", file!(), line);
    assert!(msg.starts_with(&prefix), "{}", msg);
}

#[test]
fn violation_value() {
    let v = Violation::new(ViolationKind::ForbiddenCall,
                           Location::new("a.rs", 3), "f(1)");
    assert_eq!(ViolationKind::ForbiddenCall, v.kind());
    assert_eq!(3, v.location().line());
    assert_eq!("f(1)", v.message());
    assert_eq!("Match of forbidden call: f(1)", v.to_string());
    let e: Box<dyn std::error::Error> = Box::new(v);
    assert_eq!("Match of forbidden call: f(1)", e.to_string());
}
