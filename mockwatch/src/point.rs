// vim: tw=80
//! Mock points: the per-method registry of live expectations, and dispatch

use std::{
    any::{type_name, Any},
    fmt,
    panic,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex
    }
};

use crate::{
    action::{Actions, Outcome},
    expectation::{Declaration, Expectation},
    lock,
    log,
    matcher::Matcher,
    printer::{DebugArgs, OpaqueArgs},
    report::{self, Location, Violation, ViolationKind},
    sequence::{self, SeqHandle},
    times::{NCalls, Times, TimesRange},
    trace
};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Uniquely identifies a [`MockPoint`] within the process.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PointId(u64);

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered expectation, as the point sees it
pub(crate) struct Entry<I, O> {
    pub id: u64,
    pub location: Location,
    pub matcher: Matcher<I>,
    pub times: Arc<Times>,
    pub sequences: Vec<SeqHandle>,
    pub actions: Arc<Mutex<Actions<I, O>>>
}

impl<I, O> Entry<I, O> {
    pub fn describe(&self, point: &str) -> String {
        format!("{}: Expectation({}) at {}", point, self.matcher,
                self.location)
    }

    /// Why wasn't this entry selected for `args`?
    fn rejection(&self, args: &I) -> String {
        if let Err(m) = self.matcher.matches(args) {
            self.matcher.explain(args, m)
        } else if self.times.is_done() {
            format!("already called {}, the maximum",
                    NCalls(self.times.count()))
        } else if let Err(blocker) = sequence::eligible(&self.sequences) {
            blocker
        } else {
            "accepted after the call was rejected".to_owned()
        }
    }
}

pub(crate) struct Shared<I, O> {
    pub id: PointId,
    pub name: String,
    pub signature: &'static str,
    pub describe: fn(&I) -> String,
    /// Live expectations, oldest first
    pub registry: Mutex<Vec<Entry<I, O>>>
}

impl<I, O> Shared<I, O> {
    /// Render a call for messages and traces.
    pub fn call_text(&self, args: &I) -> String {
        format!("{}({})", self.name, (self.describe)(args))
    }
}

/// The expectations of one mocked method or function.
///
/// `I` is the tuple of the method's arguments and `O` its return type.  A
/// mock object holds one `MockPoint` per method, and implements each method
/// by passing its arguments to [`MockPoint::call`].
///
/// `MockPoint` is `Send` and `Sync`, so mock objects may be shared between
/// threads, and free functions may keep their point in a static.
///
/// # Limitations
///
/// * Arguments and return values must be `'static`.  A mock of a method that
///   borrows its arguments, like `fn write(&self, buf: &[u8])`, converts them
///   to owned values such as `Vec<u8>` before passing them to `call`.  A
///   method that returns a reference can use `O = &'static T` with
///   [`Declaration::return_ref`].
/// * Actions may call other mock points, and even this one.  But a call that
///   is dispatched to the expectation whose action is already running
///   deadlocks, since that expectation's actions stay locked until they
///   finish.
pub struct MockPoint<I, O> {
    shared: Arc<Shared<I, O>>
}

impl<I: DebugArgs + 'static, O: 'static> MockPoint<I, O> {
    /// Create a point whose arguments are printed with `Debug`.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_describe(name.into(), <I as DebugArgs>::describe_args)
    }
}

impl<I: OpaqueArgs + 'static, O: 'static> MockPoint<I, O> {
    /// Create a point for arguments that don't implement `Debug`.
    ///
    /// They are printed with their [printer](crate::set_printer) if they
    /// have one, and as their type and size otherwise.
    pub fn new_opaque<S: Into<String>>(name: S) -> Self {
        Self::with_describe(name.into(), <I as OpaqueArgs>::describe_args)
    }
}

impl<I: 'static, O: 'static> MockPoint<I, O> {
    fn with_describe(name: String, describe: fn(&I) -> String) -> Self {
        let shared = Shared {
            id: PointId(next_id()),
            name,
            signature: type_name::<fn(I) -> O>(),
            describe,
            registry: Mutex::new(Vec::new())
        };
        MockPoint{shared: Arc::new(shared)}
    }

    pub fn id(&self) -> PointId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The point's Rust signature, as a function from the argument tuple to
    /// the return type.
    pub fn signature(&self) -> &'static str {
        self.shared.signature
    }

    /// How many expectations are currently registered?
    pub fn live_expectations(&self) -> usize {
        lock(&self.shared.registry).len()
    }

    /// Expect exactly one matching call, unless changed with
    /// [`Declaration::times`].
    ///
    /// `f` configures the expectation, which is registered once `f` returns.
    ///
    /// ```
    /// # use mockwatch::*;
    /// let point = MockPoint::<(u32,), u32>::new("square");
    /// let _e = point.expect(|e| e
    ///     .with((predicate::eq(3),))
    ///     .return_const(9u32));
    /// assert_eq!(9, point.call((3,)));
    /// ```
    #[track_caller]
    pub fn expect<F>(&self, f: F) -> Expectation<I, O>
        where F: FnOnce(Declaration<I, O>) -> Declaration<I, O>
    {
        self.declare(TimesRange::from(1), Location::caller(), f)
    }

    /// Allow any number of matching calls.
    #[track_caller]
    pub fn allow<F>(&self, f: F) -> Expectation<I, O>
        where F: FnOnce(Declaration<I, O>) -> Declaration<I, O>
    {
        self.declare(TimesRange::from(..), Location::caller(), f)
    }

    /// Report every matching call as a violation.
    ///
    /// Since newer expectations are tried first, this can exclude specific
    /// arguments from an older, wider expectation.
    ///
    /// ```should_panic(expected = "Match of forbidden call")
    /// # use mockwatch::*;
    /// let point = MockPoint::<(u32,), ()>::new("write");
    /// let _all = point.allow(|e| e);
    /// let _no_zero = point.forbid(|e| e.with((predicate::eq(0),)));
    /// point.call((1,));
    /// point.call((0,));   // panics
    /// ```
    #[track_caller]
    pub fn forbid<F>(&self, f: F) -> Expectation<I, O>
        where F: FnOnce(Declaration<I, O>) -> Declaration<I, O>
    {
        self.declare(TimesRange::from(0), Location::caller(), f)
    }

    fn declare<F>(&self, range: TimesRange, location: Location, f: F)
        -> Expectation<I, O>
        where F: FnOnce(Declaration<I, O>) -> Declaration<I, O>
    {
        f(Declaration::new(self.shared.clone(), range, location)).register()
    }

    /// Choose the expectation for a call, and count the call on it.
    fn select(&self, args: &I) -> Selection<I, O> {
        let shared = &*self.shared;
        let registry = lock(&shared.registry);
        for entry in registry.iter().rev() {
            if entry.matcher.matches(args).is_err() {
                continue;
            }
            if entry.times.is_forbidden() {
                return Selection::Forbidden(entry.location);
            }
            if entry.times.is_done() {
                continue;
            }
            if sequence::consume(&entry.sequences, &entry.times).is_ok() {
                return Selection::Found(entry.location, entry.actions.clone());
            }
        }
        log::rejected(&shared.name, registry.len());
        Selection::Unmatched(no_match(shared, &registry, args))
    }

    /// Dispatch a call to the newest live expectation that accepts it.
    ///
    /// The selected expectation's side effects run first, then its return
    /// action produces the result.  If no expectation accepts the call, or
    /// the accepting one forbids it, the violation is reported as fatal.
    pub fn call(&self, args: I) -> O {
        let shared = &*self.shared;
        let (location, actions) = match self.select(&args) {
            Selection::Found(location, actions) => (location, actions),
            Selection::Forbidden(location) => {
                let message = format!("{} at {}", shared.call_text(&args),
                                      location);
                report::fatal(Violation::new(ViolationKind::ForbiddenCall,
                                             location, message));
            },
            Selection::Unmatched(message) => {
                report::fatal(Violation::new(ViolationKind::UnexpectedCall,
                                             Location::unknown(), message));
            }
        };
        log::dispatched(&shared.name, &location);
        if trace::is_active() {
            trace::emit(&location, &shared.call_text(&args));
        }

        // Every point and sequence lock is released, so actions may call
        // other mock points.
        let outcome = lock(&actions).run(args);
        match outcome {
            Outcome::Return(o) => o,
            Outcome::Throw(payload) => panic::resume_unwind(payload),
            Outcome::Missing => {
                let unit: Box<dyn Any> = Box::new(());
                match unit.downcast::<O>() {
                    Ok(o) => *o,
                    Err(_) => {
                        let message = format!(
                            "{}: expectation has no return action, but {} \
                            does not return ()", shared.name, shared.signature);
                        report::fatal(Violation::new(
                                ViolationKind::MissingAction, location,
                                message));
                    }
                }
            },
            Outcome::Expired => {
                let message = format!("{}: return_once action called twice",
                                      shared.name);
                report::fatal(Violation::new(ViolationKind::MissingAction,
                                             location, message));
            }
        }
    }
}

enum Selection<I, O> {
    Found(Location, Arc<Mutex<Actions<I, O>>>),
    Forbidden(Location),
    /// Explains why each live expectation rejected the call
    Unmatched(String),
}

fn no_match<I, O>(shared: &Shared<I, O>, registry: &[Entry<I, O>], args: &I)
    -> String
{
    let mut message = format!("{} of {}", shared.call_text(args),
                              shared.signature);
    if registry.is_empty() {
        message.push_str("\n  (no live expectations)");
    }
    for entry in registry.iter().rev() {
        let reason = entry.rejection(args).replace('\n', "\n    ");
        message.push_str(&format!("\n  Tried {}: {}",
                                  entry.describe(&shared.name), reason));
    }
    message
}

impl<I, O> fmt::Debug for MockPoint<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MockPoint")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("signature", &self.shared.signature)
            .finish()
    }
}

/// A [`MockPoint`] with its argument and return types erased
pub trait Point: Send + Sync {
    fn id(&self) -> PointId;

    fn name(&self) -> &str;

    fn signature(&self) -> &'static str;

    /// Describe every live expectation that hasn't yet been called its
    /// minimum number of times.
    fn unsatisfied(&self) -> Vec<String>;
}

impl<I: 'static, O: 'static> Point for MockPoint<I, O> {
    fn id(&self) -> PointId {
        self.shared.id
    }

    fn name(&self) -> &str {
        &self.shared.name
    }

    fn signature(&self) -> &'static str {
        self.shared.signature
    }

    fn unsatisfied(&self) -> Vec<String> {
        lock(&self.shared.registry).iter()
            .filter(|e| !e.times.is_satisfied())
            .map(|e| format!("{}, called {} of {}",
                             e.describe(&self.shared.name),
                             NCalls(e.times.count()),
                             e.times.range()))
            .collect()
    }
}

/// A hand-written mock object, which owns one [`MockPoint`] per method.
///
/// Needed to place the object under [deathwatch](crate::Deathwatched).
///
/// ```
/// # use mockwatch::*;
/// struct MockConn {
///     send: MockPoint<(Vec<u8>,), usize>,
///     close: MockPoint<(), ()>,
/// }
///
/// impl MockObject for MockConn {
///     fn mock_points(&self) -> Vec<&dyn Point> {
///         vec![&self.send, &self.close]
///     }
/// }
/// ```
pub trait MockObject {
    fn mock_points(&self) -> Vec<&dyn Point>;
}
