// vim: tw=80
//! Occurrence counting

use std::{
    fmt,
    ops::{
        Range,
        RangeFrom,
        RangeFull,
        RangeInclusive,
        RangeTo,
        RangeToInclusive
    },
    sync::atomic::{AtomicUsize, Ordering}
};

/// An inclusive range of permitted call counts.
///
/// Anything that converts into a `TimesRange` can be passed to
/// [`Declaration::times`](crate::Declaration::times): an exact count, or any
/// kind of `usize` range.
///
/// ```
/// # use mockwatch::TimesRange;
/// assert_eq!(TimesRange::from(3), TimesRange::from(3..=3));
/// assert_eq!(TimesRange::from(2..5), TimesRange::from(2..=4));
/// assert_eq!("at least 2 times", TimesRange::from(2..).to_string());
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TimesRange {
    min: usize,
    max: usize
}

impl TimesRange {
    /// Create a range from inclusive bounds.  `usize::MAX` as the upper bound
    /// means "unbounded".
    ///
    /// # Panics
    ///
    /// If `max < min`.
    pub fn new(min: usize, max: usize) -> Self {
        assert!(min <= max, "Backwards range of call counts: {min} to {max}");
        TimesRange{min, max}
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn contains(&self, count: usize) -> bool {
        self.min <= count && count <= self.max
    }
}

impl From<usize> for TimesRange {
    fn from(n: usize) -> Self {
        TimesRange{min: n, max: n}
    }
}

impl From<Range<usize>> for TimesRange {
    fn from(r: Range<usize>) -> Self {
        assert!(r.start < r.end, "Empty range of call counts: {:?}", r);
        TimesRange::new(r.start, r.end - 1)
    }
}

impl From<RangeInclusive<usize>> for TimesRange {
    fn from(r: RangeInclusive<usize>) -> Self {
        TimesRange::new(*r.start(), *r.end())
    }
}

impl From<RangeFrom<usize>> for TimesRange {
    fn from(r: RangeFrom<usize>) -> Self {
        TimesRange::new(r.start, usize::MAX)
    }
}

impl From<RangeTo<usize>> for TimesRange {
    fn from(r: RangeTo<usize>) -> Self {
        assert!(r.end > 0, "Empty range of call counts: {:?}", r);
        TimesRange::new(0, r.end - 1)
    }
}

impl From<RangeToInclusive<usize>> for TimesRange {
    fn from(r: RangeToInclusive<usize>) -> Self {
        TimesRange::new(0, r.end)
    }
}

impl From<RangeFull> for TimesRange {
    fn from(_: RangeFull) -> Self {
        TimesRange::new(0, usize::MAX)
    }
}

impl fmt::Display for TimesRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.min, self.max) {
            (0, 0) => f.write_str("never"),
            (1, 1) => f.write_str("once"),
            (0, usize::MAX) => f.write_str("any number of times"),
            (min, usize::MAX) => write!(f, "at least {}", NCalls(min)),
            (min, max) if min == max => write!(f, "{}", NCalls(min)),
            (min, max) => write!(f, "{} to {} times", min, max),
        }
    }
}

/// Renders a count as "N time" or "N times".
pub(crate) struct NCalls(pub usize);

impl fmt::Display for NCalls {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0 == 1 {
            f.write_str("1 time")
        } else {
            write!(f, "{} times", self.0)
        }
    }
}

/// The shared occurrence counter of one expectation.
///
/// The bounds are final by the time the expectation is registered.  Counting
/// is serialized by the lock of the owning point, so relaxed ordering
/// suffices.
#[derive(Debug)]
pub(crate) struct Times {
    count: AtomicUsize,
    range: TimesRange
}

impl Times {
    pub fn new(range: TimesRange) -> Self {
        Times{count: AtomicUsize::new(0), range}
    }

    pub fn range(&self) -> TimesRange {
        self.range
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Record one call
    pub fn call(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Must every matching call be rejected?
    pub fn is_forbidden(&self) -> bool {
        self.range.max == 0
    }

    /// Has the expectation been called the maximum number of times?
    pub fn is_done(&self) -> bool {
        self.count() >= self.range.max
    }

    /// Has the expectation been called the minimum number of times?
    pub fn is_satisfied(&self) -> bool {
        self.count() >= self.range.min
    }
}
