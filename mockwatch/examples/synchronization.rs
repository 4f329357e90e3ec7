// vim: tw=80
//! Add synchronization to multiple tests that are accessing the same mock
//!
//! A mocked free function keeps its mock point in a static, so every test in
//! the binary sees the same expectations.  Tests that declare expectations on
//! such a point must not run in parallel, or one test's expectations would
//! handle another test's calls.  A `Mutex` held for the whole test solves
//! that.
#![deny(warnings)]

pub mod clock {
    #[cfg(not(test))]
    pub fn now() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    #[cfg(test)]
    mockwatch::lazy_static! {
        pub static ref NOW: mockwatch::MockPoint<(), u64> =
            mockwatch::MockPoint::new("clock::now");
    }

    #[cfg(test)]
    pub fn now() -> u64 {
        NOW.call(())
    }
}

/// Seconds left until `deadline`
fn remaining(deadline: u64) -> u64 {
    deadline.saturating_sub(clock::now())
}

fn main() {
    println!("{} seconds left until 2030", remaining(1_893_456_000));
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    static MTX: Mutex<()> = Mutex::new(());

    // When a test panics, it will poison the Mutex. Since we don't actually
    // care about the state of the data we ignore that it is poisoned and grab
    // the lock regardless.  If you just do `let _m = &MTX.lock().unwrap()`, one
    // test panicking will cause all other tests that try and acquire a lock on
    // that Mutex to also panic.
    fn get_lock(m: &'static Mutex<()>) -> MutexGuard<'static, ()> {
        match m.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn before_deadline() {
        let _m = get_lock(&MTX);

        let _e = clock::NOW.expect(|e| e.return_const(100u64));
        assert_eq!(20, remaining(120));
    }

    #[test]
    fn after_deadline() {
        let _m = get_lock(&MTX);

        let _e = clock::NOW.expect(|e| e.return_const(200u64));
        assert_eq!(0, remaining(120));
    }
}
