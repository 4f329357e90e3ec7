// vim: tw=80
//! Argument matchers
//!
//! An expectation's arguments are checked by one [`Predicate`] per argument,
//! passed to [`Declaration::with`](crate::Declaration::with) as a tuple.
//! Every predicate from [`predicate`](crate::predicate) may be used there.
//! This module adds a few matchers that are generic over what the argument
//! can do rather than what type it is:
//!
//! * [`any`] accepts every value of every type.
//! * [`points_to`] compares the target of any smart pointer or reference.
//! * [`has_len`] checks the length of strings, slices and collections.
//! * [`custom`] turns a named closure into a predicate.
//!
//! ```
//! # use mockwatch::*;
//! let point = MockPoint::<(Box<u32>, Vec<u8>), ()>::new("write");
//! let _e = point.expect(|e| e
//!     .with((matcher::points_to(3u32), matcher::has_len(2))));
//! point.call((Box::new(3), vec![0, 1]));
//! ```

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    fmt,
    ops::Deref
};

use predicates::{
    function::FnPredicate,
    prelude::*,
    reflection::{Case, PredicateReflection, Product}
};
use predicates_tree::CaseTreeExt;

/// Accepts any value.  Displayed as `_`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Any;

impl fmt::Display for Any {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("_")
    }
}

impl PredicateReflection for Any {}

impl<T: ?Sized> Predicate<T> for Any {
    fn eval(&self, _: &T) -> bool {
        true
    }
}

/// Match any value of the argument.
pub fn any() -> Any {
    Any
}

/// Matches a pointer-like argument whose target equals a value.
#[derive(Clone, Debug)]
pub struct PointsTo<T> {
    value: T
}

impl<T: fmt::Debug> fmt::Display for PointsTo<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "*var == {:?}", self.value)
    }
}

impl<T: fmt::Debug> PredicateReflection for PointsTo<T> {}

impl<P, T> Predicate<P> for PointsTo<T>
    where P: Deref,
          P::Target: PartialEq<T> + fmt::Debug,
          T: fmt::Debug
{
    fn eval(&self, variable: &P) -> bool {
        **variable == self.value
    }

    fn find_case<'a>(&'a self, expected: bool, variable: &P)
        -> Option<Case<'a>>
    {
        let actual = self.eval(variable);
        (actual == expected).then(|| {
            Case::new(Some(self), actual)
                .add_product(Product::new("*var", format!("{:?}", &**variable)))
        })
    }
}

/// Match an argument that dereferences to `value`.
///
/// Works with references, `Box`, `Rc`, `Arc` and any other type that
/// implements `Deref`.
pub fn points_to<T: fmt::Debug>(value: T) -> PointsTo<T> {
    PointsTo{value}
}

/// Something with a number of elements.
///
/// Implemented for strings, slices, arrays and the standard collections.
/// Implement it for your own containers to use them with [`has_len`].
pub trait Length {
    fn length(&self) -> usize;
}

impl Length for str {
    fn length(&self) -> usize {
        self.len()
    }
}

impl Length for String {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<T> Length for [T] {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<T, const N: usize> Length for [T; N] {
    fn length(&self) -> usize {
        N
    }
}

impl<T> Length for Vec<T> {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<T> Length for VecDeque<T> {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<K, V, S> Length for HashMap<K, V, S> {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<T, S> Length for HashSet<T, S> {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<K, V> Length for BTreeMap<K, V> {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<T> Length for BTreeSet<T> {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<L: Length + ?Sized> Length for &L {
    fn length(&self) -> usize {
        (**self).length()
    }
}

impl<L: Length + ?Sized> Length for Box<L> {
    fn length(&self) -> usize {
        (**self).length()
    }
}

/// Matches an argument with a given [`Length`].
#[derive(Clone, Copy, Debug)]
pub struct HasLen {
    len: usize
}

impl fmt::Display for HasLen {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "var.len() == {}", self.len)
    }
}

impl PredicateReflection for HasLen {}

impl<L: Length + ?Sized> Predicate<L> for HasLen {
    fn eval(&self, variable: &L) -> bool {
        variable.length() == self.len
    }

    fn find_case<'a>(&'a self, expected: bool, variable: &L)
        -> Option<Case<'a>>
    {
        let actual = self.eval(variable);
        (actual == expected).then(|| {
            Case::new(Some(self), actual)
                .add_product(Product::new("var.len()", variable.length()))
        })
    }
}

/// Match an argument with exactly `len` elements.
pub fn has_len(len: usize) -> HasLen {
    HasLen{len}
}

/// A predicate from a closure, named in failure messages.
///
/// ```
/// # use mockwatch::*;
/// let is_even = matcher::custom("is_even", |x: &u32| x % 2 == 0);
/// assert!(is_even.eval(&4));
/// assert_eq!("is_even(var)", is_even.to_string());
/// ```
pub fn custom<F, T>(name: &'static str, f: F) -> FnPredicate<F, T>
    where F: Fn(&T) -> bool,
          T: ?Sized
{
    predicate::function(f).fn_name(name)
}

/// A tuple of per-argument predicates, checked as one predicate over the
/// argument tuple.
#[derive(Clone, Debug)]
pub struct Args<T>(T);

impl PredicateReflection for Args<()> {}

impl fmt::Display for Args<()> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("()")
    }
}

impl Predicate<()> for Args<()> {
    fn eval(&self, _: &()) -> bool {
        true
    }
}

macro_rules! args_predicate {
    ($($p:ident $a:ident $idx:tt),+) => {
        impl<$($p: fmt::Display),+> fmt::Display for Args<($($p,)+)> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                let parts = [$(self.0.$idx.to_string()),+];
                write!(f, "({})", parts.join(", "))
            }
        }

        impl<$($p: fmt::Display),+> PredicateReflection for Args<($($p,)+)> {}

        impl<$($p, $a),+> Predicate<($($a,)+)> for Args<($($p,)+)>
            where $($p: Predicate<$a>),+
        {
            fn eval(&self, variable: &($($a,)+)) -> bool {
                $(self.0.$idx.eval(&variable.$idx))&&+
            }

            fn find_case<'a>(&'a self, expected: bool, variable: &($($a,)+))
                -> Option<Case<'a>>
            {
                let actual = self.eval(variable);
                if actual != expected {
                    return None;
                }
                let mut case = Case::new(Some(self), actual);
                $(
                    if let Some(c) = self.0.$idx.find_case(expected,
                                                           &variable.$idx)
                    {
                        case = case.add_child(c);
                    }
                )+
                Some(case)
            }
        }

        impl<$($p, $a),+> ArgMatchers<($($a,)+)> for ($($p,)+)
            where $($p: Predicate<$a> + Send + 'static, $a: 'static),+
        {
            fn into_predicate(self) -> Box<dyn Predicate<($($a,)+)> + Send> {
                Box::new(Args(self))
            }
        }
    }
}

/// A tuple with one [`Predicate`] for each argument of a mock point.
///
/// This is what [`Declaration::with`](crate::Declaration::with) accepts.  It
/// is implemented for tuples of up to eight predicates.
pub trait ArgMatchers<I>: Send + 'static {
    fn into_predicate(self) -> Box<dyn Predicate<I> + Send>;
}

impl ArgMatchers<()> for () {
    fn into_predicate(self) -> Box<dyn Predicate<()> + Send> {
        Box::new(Args(()))
    }
}

args_predicate!(P0 A0 0);
args_predicate!(P0 A0 0, P1 A1 1);
args_predicate!(P0 A0 0, P1 A1 1, P2 A2 2);
args_predicate!(P0 A0 0, P1 A1 1, P2 A2 2, P3 A3 3);
args_predicate!(P0 A0 0, P1 A1 1, P2 A2 2, P3 A3 3, P4 A4 4);
args_predicate!(P0 A0 0, P1 A1 1, P2 A2 2, P3 A3 3, P4 A4 4, P5 A5 5);
args_predicate!(P0 A0 0, P1 A1 1, P2 A2 2, P3 A3 3, P4 A4 4, P5 A5 5,
                P6 A6 6);
args_predicate!(P0 A0 0, P1 A1 1, P2 A2 2, P3 A3 3, P4 A4 4, P5 A5 5,
                P6 A6 6, P7 A7 7);

/// Exact equality with a whole argument tuple.
pub(crate) fn eq_args<I>(args: I) -> Box<dyn Predicate<I> + Send>
    where I: PartialEq + fmt::Debug + Send + 'static
{
    Box::new(EqArgs(args))
}

struct EqArgs<I>(I);

impl<I: fmt::Debug> fmt::Display for EqArgs<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "args == {:?}", self.0)
    }
}

impl<I: fmt::Debug> PredicateReflection for EqArgs<I> {}

impl<I: PartialEq + fmt::Debug> Predicate<I> for EqArgs<I> {
    fn eval(&self, variable: &I) -> bool {
        *variable == self.0
    }

    fn find_case<'a>(&'a self, expected: bool, variable: &I)
        -> Option<Case<'a>>
    {
        let actual = self.eval(variable);
        (actual == expected).then(|| {
            Case::new(Some(self), actual)
                .add_product(Product::new("args", format!("{:?}", variable)))
        })
    }
}

/// Why a [`Matcher`] rejected a call
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Mismatch {
    /// The argument predicates rejected it.
    Args,
    /// The trailing condition with this index rejected it.
    Condition(usize),
}

type Condition<I> = Box<dyn Fn(&I) -> bool + Send>;

/// The complete matcher of one expectation: the argument predicates, then
/// every trailing condition.
pub(crate) struct Matcher<I> {
    args: Option<Box<dyn Predicate<I> + Send>>,
    conditions: Vec<Condition<I>>
}

impl<I> Matcher<I> {
    pub fn set_args(&mut self, p: Box<dyn Predicate<I> + Send>) {
        self.args = Some(p);
    }

    pub fn add_condition(&mut self, c: Condition<I>) {
        self.conditions.push(c);
    }

    pub fn matches(&self, i: &I) -> Result<(), Mismatch> {
        if let Some(p) = &self.args {
            if !p.eval(i) {
                return Err(Mismatch::Args);
            }
        }
        match self.conditions.iter().position(|c| !c(i)) {
            Some(n) => Err(Mismatch::Condition(n)),
            None => Ok(())
        }
    }

    /// Describe why `i` was rejected.
    pub fn explain(&self, i: &I, mismatch: Mismatch) -> String {
        match (mismatch, &self.args) {
            (Mismatch::Args, Some(p)) => match p.find_case(false, i) {
                Some(case) => format!("arguments did not match\n{}",
                                      case.tree()),
                None => format!("arguments did not match {p}")
            },
            (Mismatch::Args, None) => "arguments did not match".to_owned(),
            (Mismatch::Condition(n), _) =>
                format!("condition #{} returned false", n + 1)
        }
    }
}

impl<I> Default for Matcher<I> {
    fn default() -> Self {
        Matcher{args: None, conditions: Vec::new()}
    }
}

impl<I> fmt::Display for Matcher<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.args {
            Some(p) => write!(f, "{p}")?,
            None => f.write_str("<anything>")?
        }
        match self.conditions.len() {
            0 => Ok(()),
            1 => f.write_str(" and 1 condition"),
            n => write!(f, " and {n} conditions")
        }
    }
}
