// vim: tw=80
//! What an expectation does once it is selected

use std::{any::Any, mem};

use fragile::Fragile;

/// The outcome of running an expectation's actions
pub(crate) enum Outcome<O> {
    Return(O),
    /// Unwind with this payload.
    Throw(Box<dyn Any + Send>),
    /// No return action was ever set.
    Missing,
    /// A `return_once` action already ran.
    Expired,
}

/// Return functions for expectations
pub(crate) enum Rfunc<I, O> {
    Default,
    // A `return_once` closure that already ran
    Expired,
    Mut(Box<dyn FnMut(I) -> O + Send>),
    // Would be Box<dyn FnOnce>, but that can't be called through a &mut
    Once(Box<dyn FnMut(I) -> Option<O> + Send>),
    Throw(Box<dyn FnMut(I) -> Box<dyn Any + Send> + Send>),
}

impl<I, O> Rfunc<I, O> {
    fn call_mut(&mut self, args: I) -> Outcome<O> {
        match self {
            Rfunc::Default => Outcome::Missing,
            Rfunc::Expired => Outcome::Expired,
            Rfunc::Mut(f) => Outcome::Return(f(args)),
            Rfunc::Once(f) => {
                let r = f(args);
                *self = Rfunc::Expired;
                match r {
                    Some(o) => Outcome::Return(o),
                    None => Outcome::Expired
                }
            },
            Rfunc::Throw(f) => Outcome::Throw(f(args)),
        }
    }

    /// Wrap a closure that may be called once.
    pub fn once<F>(f: F) -> Self
        where F: FnOnce(I) -> O + Send + 'static
    {
        let mut fopt = Some(f);
        Rfunc::Once(Box::new(move |i| fopt.take().map(|f| f(i))))
    }

    /// Like [`Rfunc::once`], but for closures that aren't `Send`.  Calling it
    /// from any other thread than the creating one panics.
    pub fn once_st<F>(f: F) -> Self
        where F: FnOnce(I) -> O + 'static
    {
        let mut fragile = Some(Fragile::new(f));
        Rfunc::Once(Box::new(move |i| {
            fragile.take().map(|frag| (frag.into_inner())(i))
        }))
    }

    pub fn mutable<F>(f: F) -> Self
        where F: FnMut(I) -> O + Send + 'static
    {
        Rfunc::Mut(Box::new(f))
    }

    /// Like [`Rfunc::mutable`], but for closures that aren't `Send`.
    pub fn mutable_st<F>(f: F) -> Self
        where F: FnMut(I) -> O + 'static
    {
        let mut fragile = Fragile::new(f);
        Rfunc::Mut(Box::new(move |i| (fragile.get_mut())(i)))
    }

    pub fn throw<P>(payload: P) -> Self
        where P: Clone + Send + 'static
    {
        Rfunc::Throw(Box::new(move |_| Box::new(payload.clone())))
    }
}

impl<I, O> Default for Rfunc<I, O> {
    fn default() -> Self {
        Rfunc::Default
    }
}

type SideEffect<I> = Box<dyn FnMut(&mut I) + Send>;

/// Side effects plus at most one return or throw function
pub(crate) struct Actions<I, O> {
    side_effects: Vec<SideEffect<I>>,
    rfunc: Rfunc<I, O>
}

impl<I, O> Actions<I, O> {
    pub fn add_side_effect(&mut self, f: SideEffect<I>) {
        self.side_effects.push(f);
    }

    pub fn has_rfunc(&self) -> bool {
        !matches!(self.rfunc, Rfunc::Default)
    }

    /// Install the return function, returning the previous one.
    pub fn set_rfunc(&mut self, rfunc: Rfunc<I, O>) -> Rfunc<I, O> {
        mem::replace(&mut self.rfunc, rfunc)
    }

    /// Run every side effect in declaration order, then the return function.
    pub fn run(&mut self, mut args: I) -> Outcome<O> {
        for f in self.side_effects.iter_mut() {
            f(&mut args);
        }
        self.rfunc.call_mut(args)
    }
}

impl<I, O> Default for Actions<I, O> {
    fn default() -> Self {
        Actions{side_effects: Vec::new(), rfunc: Rfunc::default()}
    }
}
