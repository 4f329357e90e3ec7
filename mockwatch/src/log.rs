// vim: tw=80
//! Diagnostic logging through `tracing`, when the feature is enabled

use cfg_if::cfg_if;

use crate::report::{Location, Severity, Violation};

cfg_if! {
    if #[cfg(feature = "tracing")] {
        pub(crate) fn registered(point: &str, location: &Location) {
            tracing::trace!(point, %location, "expectation registered");
        }

        pub(crate) fn retired(point: &str, location: &Location, calls: usize)
        {
            tracing::trace!(point, %location, calls, "expectation retired");
        }

        pub(crate) fn dispatched(point: &str, location: &Location) {
            tracing::debug!(point, %location, "call matched");
        }

        pub(crate) fn rejected(point: &str, candidates: usize) {
            tracing::debug!(point, candidates, "call matched nothing");
        }

        pub(crate) fn violation(severity: Severity, v: &Violation) {
            tracing::warn!(%severity, kind = ?v.kind(),
                           location = %v.location(), "{}", v);
        }
    } else {
        #[inline(always)]
        pub(crate) fn registered(_: &str, _: &Location) {}

        #[inline(always)]
        pub(crate) fn retired(_: &str, _: &Location, _: usize) {}

        #[inline(always)]
        pub(crate) fn dispatched(_: &str, _: &Location) {}

        #[inline(always)]
        pub(crate) fn rejected(_: &str, _: usize) {}

        #[inline(always)]
        pub(crate) fn violation(_: Severity, _: &Violation) {}
    }
}
