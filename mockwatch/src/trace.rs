// vim: tw=80
//! Call tracing
//!
//! Every call that an expectation accepts is offered to all active
//! [`Tracer`]s, together with the location where the accepting expectation
//! was declared.  Tracers see calls in the order in which they were
//! dispatched on each thread.

use std::{
    io,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
        Mutex,
        PoisonError,
        RwLock
    }
};

use lazy_static::lazy_static;

use crate::{lock, report::Location};

/// Receives a description of every matched call.
///
/// Closures with the signature `Fn(&Location, &str)` are tracers too.
pub trait Tracer: Send + Sync {
    fn trace(&self, location: &Location, description: &str);
}

impl<F> Tracer for F
    where F: Fn(&Location, &str) + Send + Sync
{
    fn trace(&self, location: &Location, description: &str) {
        self(location, description)
    }
}

lazy_static! {
    static ref TRACERS: RwLock<Vec<(u64, Arc<dyn Tracer>)>> =
        RwLock::new(Vec::new());
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);
// Lets dispatch skip formatting the call when nobody listens.
static ACTIVE: AtomicUsize = AtomicUsize::new(0);

/// Activate `tracer` until the returned guard is dropped.
///
/// # Examples
/// ```
/// # use mockwatch::*;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let seen2 = seen.clone();
/// let point = MockPoint::<(u32,), ()>::new("ping");
/// let _e = point.allow(|e| e);
/// {
///     let _guard = trace_with(move |_: &Location, desc: &str| {
///         seen2.lock().unwrap().push(desc.to_owned())
///     });
///     point.call((1,));
/// }
/// point.call((2,));
/// assert_eq!(vec!["ping(1)".to_owned()], *seen.lock().unwrap());
/// ```
pub fn trace_with<T: Tracer + 'static>(tracer: T) -> TracerGuard {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    TRACERS.write()
        .unwrap_or_else(PoisonError::into_inner)
        .push((id, Arc::new(tracer)));
    ACTIVE.fetch_add(1, Ordering::Relaxed);
    TracerGuard{id}
}

/// Keeps a tracer installed by [`trace_with`] active.
#[derive(Debug)]
#[must_use = "the tracer is removed as soon as its guard is dropped"]
pub struct TracerGuard {
    id: u64
}

impl Drop for TracerGuard {
    fn drop(&mut self) {
        let mut tracers = TRACERS.write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(i) = tracers.iter().position(|(id, _)| *id == self.id) {
            tracers.remove(i);
            ACTIVE.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

pub(crate) fn is_active() -> bool {
    ACTIVE.load(Ordering::Relaxed) > 0
}

pub(crate) fn emit(location: &Location, description: &str) {
    let tracers: Vec<Arc<dyn Tracer>> = TRACERS.read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|(_, t)| t.clone())
        .collect();
    for t in tracers {
        t.trace(location, description);
    }
}

/// Writes each event to an [`io::Write`] as two lines: the location, then
/// the description.
///
/// Clones share the same writer, so a test can keep one clone to inspect the
/// output while another is installed.
///
/// # Examples
/// ```
/// # use mockwatch::*;
/// let tracer = StreamTracer::new(Vec::new());
/// let point = MockPoint::<(), ()>::new("flush");
/// let _e = point.expect(|e| e);
/// {
///     let _guard = trace_with(tracer.clone());
///     point.call(());
/// }
/// let text = tracer.with_output(|v| String::from_utf8(v.clone()).unwrap());
/// assert!(text.ends_with("\nflush()\n"));
/// ```
#[derive(Debug)]
pub struct StreamTracer<W> {
    out: Arc<Mutex<W>>
}

impl<W: io::Write + Send> StreamTracer<W> {
    pub fn new(out: W) -> Self {
        StreamTracer{out: Arc::new(Mutex::new(out))}
    }

    /// Access the underlying writer.
    pub fn with_output<R, F: FnOnce(&mut W) -> R>(&self, f: F) -> R {
        f(&mut lock(&self.out))
    }
}

impl<W> Clone for StreamTracer<W> {
    fn clone(&self) -> Self {
        StreamTracer{out: self.out.clone()}
    }
}

impl<W: io::Write + Send> Tracer for StreamTracer<W> {
    fn trace(&self, location: &Location, description: &str) {
        let mut out = lock(&self.out);
        // A tracer has no way to fail the call it observes.
        let _ = writeln!(out, "{location}\n{description}");
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "tracing")] {
        /// Forwards every event to the `tracing` crate, at `INFO` level.
        #[derive(Clone, Copy, Debug, Default)]
        pub struct TracingTracer;

        impl Tracer for TracingTracer {
            fn trace(&self, location: &Location, description: &str) {
                tracing::info!(target: "mockwatch", %location, "{}",
                               description);
            }
        }
    }
}
