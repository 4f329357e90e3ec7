// vim: tw=80
//! Argument formatting for violation messages and traces

use std::{
    any::{type_name, TypeId},
    collections::hash_map::HashMap,
    fmt,
    mem,
    sync::{Arc, PoisonError, RwLock}
};

use downcast::*;
use lazy_static::lazy_static;

trait AnyPrinter: Any + Send + Sync {}
downcast!(dyn AnyPrinter);

type PrintFn<T> =
    Box<dyn Fn(&mut dyn fmt::Write, &T) -> fmt::Result + Send + Sync>;

struct Printer<T: ?Sized + 'static>(PrintFn<T>);

impl<T: ?Sized + 'static> AnyPrinter for Printer<T> {}

lazy_static! {
    static ref PRINTERS: RwLock<HashMap<TypeId, Arc<dyn AnyPrinter>>> =
        RwLock::new(HashMap::new());
}

/// Override how values of type `T` are rendered in violation messages and
/// trace events.
///
/// The printer applies to every mock point, regardless of whether it was
/// created with [`MockPoint::new`](crate::MockPoint::new) or
/// [`MockPoint::new_opaque`](crate::MockPoint::new_opaque).  Installing a
/// second printer for the same type replaces the first.
///
/// # Examples
/// ```
/// # use mockwatch::*;
/// use std::fmt::Write;
///
/// struct Secret(u64);
/// set_printer::<Secret, _>(|w, _| w.write_str("<redacted>"));
/// assert_eq!("<redacted>", format_opaque(&Secret(42)));
/// reset_printer::<Secret>();
/// ```
pub fn set_printer<T, F>(f: F)
    where T: ?Sized + 'static,
          F: Fn(&mut dyn fmt::Write, &T) -> fmt::Result + Send + Sync + 'static
{
    let printer: Arc<dyn AnyPrinter> = Arc::new(Printer::<T>(Box::new(f)));
    PRINTERS.write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(TypeId::of::<T>(), printer);
}

/// Remove the printer for `T`, if any.  Returns whether there was one.
pub fn reset_printer<T: ?Sized + 'static>() -> bool {
    PRINTERS.write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&TypeId::of::<T>())
        .is_some()
}

fn custom<T: ?Sized + 'static>(v: &T) -> Option<String> {
    let printer = PRINTERS.read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&TypeId::of::<T>())
        .cloned()?;
    // The registry lock is released here, so printers may format nested
    // values themselves.
    let printer: &Printer<T> = printer.downcast_ref().ok()?;
    let mut s = String::new();
    let w: &mut dyn fmt::Write = &mut s;
    match (printer.0)(w, v) {
        Ok(()) => Some(s),
        Err(fmt::Error) =>
            Some(format!("<{} printer failed>", type_name::<T>()))
    }
}

/// Render `v` with its installed printer, or else with `Debug`.
pub fn format_debug<T: fmt::Debug + ?Sized + 'static>(v: &T) -> String {
    custom(v).unwrap_or_else(|| format!("{v:?}"))
}

/// Render `v` with its installed printer, or else as its type name and size.
///
/// Used for types without a `Debug` implementation.  The fallback never dumps
/// the value's bytes, since they may include uninitialized padding: it prints
/// `<type: N bytes>`.  Install a printer with [`set_printer`] to see the
/// contents.
///
/// ```
/// # use mockwatch::format_opaque;
/// struct Handle(#[allow(dead_code)] u32);
/// assert!(format_opaque(&Handle(7)).ends_with("Handle: 4 bytes>"));
/// ```
pub fn format_opaque<T: ?Sized + 'static>(v: &T) -> String {
    custom(v).unwrap_or_else(|| {
        format!("<{}: {} bytes>", type_name::<T>(), mem::size_of_val(v))
    })
}

/// Argument tuples whose elements all implement `Debug`
pub trait DebugArgs {
    /// The arguments, comma separated
    fn describe_args(&self) -> String;
}

/// Argument tuples whose elements needn't implement `Debug`
pub trait OpaqueArgs {
    /// The arguments, comma separated
    fn describe_args(&self) -> String;
}

impl DebugArgs for () {
    fn describe_args(&self) -> String {
        String::new()
    }
}

impl OpaqueArgs for () {
    fn describe_args(&self) -> String {
        String::new()
    }
}

macro_rules! describe_args {
    ($($t:ident $idx:tt),+) => {
        impl<$($t: fmt::Debug + 'static),+> DebugArgs for ($($t,)+) {
            fn describe_args(&self) -> String {
                [$(format_debug(&self.$idx)),+].join(", ")
            }
        }

        impl<$($t: 'static),+> OpaqueArgs for ($($t,)+) {
            fn describe_args(&self) -> String {
                [$(format_opaque(&self.$idx)),+].join(", ")
            }
        }
    }
}

describe_args!(A0 0);
describe_args!(A0 0, A1 1);
describe_args!(A0 0, A1 1, A2 2);
describe_args!(A0 0, A1 1, A2 2, A3 3);
describe_args!(A0 0, A1 1, A2 2, A3 3, A4 4);
describe_args!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5);
describe_args!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6);
describe_args!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6, A7 7);
