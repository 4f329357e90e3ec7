// vim: tw=80
//! Ordering constraints across expectations

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
    Mutex,
    MutexGuard
};

use crate::{lock, times::Times};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
struct Member {
    id: u64,
    times: Arc<Times>,
    desc: String
}

#[derive(Debug, Default)]
struct SeqState {
    members: Vec<Member>,
    /// Index of the first member that is not exhausted.  Never decreases,
    /// except to account for retired members.
    cursor: usize
}

impl SeqState {
    /// May `member` be called now?  On failure, describes the earliest member
    /// that must be called first.
    fn check(&self, member: u64) -> Result<(), String> {
        for m in &self.members[self.cursor..] {
            if m.id == member {
                return Ok(());
            } else if !m.times.is_done() {
                return Err(m.desc.clone());
            }
        }
        Err("the sequence already moved past it".to_owned())
    }

    /// Move the cursor past every exhausted member.
    fn advance(&mut self) {
        while self.cursor < self.members.len() &&
            self.members[self.cursor].times.is_done()
        {
            self.cursor += 1;
        }
    }

    fn retire(&mut self, member: u64) {
        if let Some(i) = self.members.iter().position(|m| m.id == member) {
            self.members.remove(i);
            if i < self.cursor {
                self.cursor -= 1;
            }
            self.advance();
        }
    }
}

#[derive(Debug)]
struct SeqInner {
    id: u64,
    state: Mutex<SeqState>
}

/// Used to enforce that expectations must be matched in a given order.
///
/// Each expectation that joins a sequence with
/// [`Declaration::in_sequence`](crate::Declaration::in_sequence) becomes its
/// next member when it is registered.  A member may only be matched once
/// every earlier member has been called its maximum number of times; until
/// then calls that only it would accept are unexpected.  Expectations may
/// join several sequences, and then must be next in all of them.  Members
/// leave the sequence when their expectation is dropped.
///
/// `Sequence` is a cheap handle to shared state.  Clones refer to the same
/// sequence.
///
/// # Examples
/// ```
/// # use mockwatch::*;
/// let a = MockPoint::<(), ()>::new("a");
/// let b = MockPoint::<(), ()>::new("b");
/// let seq = Sequence::new();
/// let _ea = a.expect(|e| e.in_sequence(&seq));
/// let _eb = b.expect(|e| e.in_sequence(&seq));
/// a.call(());
/// assert!(!seq.is_completed());
/// b.call(());
/// assert!(seq.is_completed());
/// ```
#[derive(Clone, Debug)]
pub struct Sequence {
    inner: Arc<SeqInner>
}

impl Sequence {
    pub fn new() -> Self {
        let inner = SeqInner {
            id: next_id(),
            state: Mutex::new(SeqState::default())
        };
        Sequence{inner: Arc::new(inner)}
    }

    /// Has every remaining member been called at least its minimum number
    /// of times?
    pub fn is_completed(&self) -> bool {
        lock(&self.inner.state).members.iter()
            .all(|m| m.times.is_satisfied())
    }

    /// The number of members that haven't been dropped yet.
    pub fn len(&self) -> usize {
        lock(&self.inner.state).members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Do both handles refer to the same sequence?
    pub(crate) fn is_same(&self, other: &Sequence) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Append a new member, counted by `times`.
    pub(crate) fn join(&self, times: Arc<Times>, desc: String) -> SeqHandle {
        let member = next_id();
        lock(&self.inner.state).members.push(Member{id: member, times, desc});
        SeqHandle{inner: self.inner.clone(), member}
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Sequence::new()
    }
}

/// One expectation's membership in one sequence.  Dropping it retires the
/// member.
#[derive(Debug)]
pub(crate) struct SeqHandle {
    inner: Arc<SeqInner>,
    member: u64
}

impl SeqHandle {
    pub fn is_in(&self, seq: &Sequence) -> bool {
        Arc::ptr_eq(&self.inner, &seq.inner)
    }

    pub fn seq_id(&self) -> u64 {
        self.inner.id
    }
}

impl Drop for SeqHandle {
    fn drop(&mut self) {
        lock(&self.inner.state).retire(self.member);
    }
}

type Locked<'a> = Vec<(&'a SeqHandle, MutexGuard<'a, SeqState>)>;

/// Lock every sequence in `handles`, in ascending id order so concurrent
/// dispatches can't deadlock, and check that the member may be called in all
/// of them.
fn lock_eligible(handles: &[SeqHandle]) -> Result<Locked<'_>, String> {
    let mut sorted: Vec<&SeqHandle> = handles.iter().collect();
    sorted.sort_by_key(|h| h.seq_id());
    let locked: Locked<'_> = sorted.into_iter()
        .map(|h| (h, lock(&h.inner.state)))
        .collect();
    for (h, g) in locked.iter() {
        g.check(h.member)
            .map_err(|blocker| format!("waiting in sequence #{} for {}",
                                       h.seq_id(), blocker))?;
    }
    Ok(locked)
}

/// Could the member of every sequence in `handles` be called now?  On
/// failure returns the description of the blocking member.
pub(crate) fn eligible(handles: &[SeqHandle]) -> Result<(), String> {
    lock_eligible(handles).map(drop)
}

/// Atomically check eligibility like [`eligible`], and if so count one call
/// on `times` and advance every sequence.
pub(crate) fn consume(handles: &[SeqHandle], times: &Times)
    -> Result<(), String>
{
    let mut locked = lock_eligible(handles)?;
    times.call();
    for (_, g) in locked.iter_mut() {
        g.advance();
    }
    Ok(())
}
