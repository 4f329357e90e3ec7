// vim: tw=80
//! Declaring expectations: argument matching, call counts and actions
#![deny(warnings)]

use std::{
    panic,
    rc::Rc,
    sync::{Arc, Mutex}
};

use mockwatch::*;

#[test]
fn match_eq_ok() {
    let point = MockPoint::<(i32,), ()>::new("foo");
    let _e = point.expect(|e| e.with((predicate::eq(5),)));
    point.call((5,));
}

#[test]
#[should_panic(expected = "No match for call: foo(5)")]
fn match_eq_fail() {
    let point = MockPoint::<(i32,), ()>::new("foo");
    let _e = point.expect(|e| e.with((predicate::eq(4),)));
    point.call((5,));
}

#[test]
fn match_fn_ok() {
    let point = MockPoint::<(i32,), ()>::new("foo");
    let _e = point.expect(|e| e
        .with((predicate::function(|x: &i32| *x == 5),)));
    point.call((5,));
}

#[test]
#[should_panic(expected = "No match for call: foo(5)")]
fn match_fn_fail() {
    let point = MockPoint::<(i32,), ()>::new("foo");
    let _e = point.expect(|e| e
        .with((predicate::function(|x: &i32| *x == 6),)));
    point.call((5,));
}

#[test]
fn with_args() {
    let point = MockPoint::<(u32, String), bool>::new("put");
    let _e = point.expect(|e| e
        .with_args((1, "one".to_owned()))
        .return_const(true));
    assert!(point.call((1, "one".to_owned())));
}

#[test]
#[should_panic(expected = "args == (1, \"one\")")]
fn with_args_fail() {
    let point = MockPoint::<(u32, String), bool>::new("put");
    let _e = point.expect(|e| e
        .with_args((1, "one".to_owned()))
        .return_const(true));
    point.call((1, "uno".to_owned()));
}

#[test]
fn with_predicate() {
    let point = MockPoint::<(u32, u32), ()>::new("range");
    let _e = point.allow(|e| e
        .with_predicate(predicate::function(|&(lo, hi): &(u32, u32)| lo < hi)));
    point.call((1, 2));
    let r = panic::catch_unwind(|| point.call((2, 1)));
    r.unwrap_err();
}

#[test]
fn withf_runs_after_matchers() {
    let evaluated = Arc::new(Mutex::new(0));
    let evaluated2 = evaluated.clone();
    let point = MockPoint::<(i32,), ()>::new("foo");
    let _any = point.allow(|e| e);
    let _e = point.allow(|e| e
        .with((predicate::gt(0),))
        .withf(move |_| {
            *evaluated2.lock().unwrap() += 1;
            true
        }));
    point.call((-1,));
    assert_eq!(0, *evaluated.lock().unwrap());
    point.call((1,));
    assert_eq!(1, *evaluated.lock().unwrap());
}

#[test]
#[should_panic(expected = "condition #2 returned false")]
fn withf_fail() {
    let point = MockPoint::<(i32,), ()>::new("foo");
    let _e = point.expect(|e| e
        .withf(|(x,)| *x > 0)
        .withf(|(x,)| *x % 2 == 0));
    point.call((3,));
}

#[test]
fn times_exact() {
    let point = MockPoint::<(), ()>::new("tick");
    let e = point.expect(|e| e.times(3));
    point.call(());
    point.call(());
    assert!(!e.is_satisfied());
    point.call(());
    assert!(e.is_satisfied());
    assert!(e.is_saturated());
}

#[test]
#[should_panic(expected = "called 2 times which is fewer than expected 3")]
fn times_too_few() {
    let point = MockPoint::<(), ()>::new("tick");
    let _e = point.expect(|e| e.times(3));
    point.call(());
    point.call(());
}

#[test]
#[should_panic(expected = "No match for call: tick()")]
fn times_too_many() {
    let point = MockPoint::<(), ()>::new("tick");
    let _e = point.expect(|e| e.times(2));
    point.call(());
    point.call(());
    point.call(());
}

#[test]
fn times_too_many_explains_saturation() {
    let point = MockPoint::<(), ()>::new("tick");
    let _e = point.expect(|e| e.times(1));
    point.call(());
    let r = panic::catch_unwind(|| point.call(()));
    let msg = r.unwrap_err().downcast::<String>().unwrap();
    assert!(msg.contains("already called 1 time, the maximum"), "{}", msg);
}

#[test]
fn times_range() {
    let point = MockPoint::<(), ()>::new("poll");
    for n in 2..=4 {
        let e = point.expect(|e| e.times(2..5));
        for _ in 0..n {
            point.call(());
        }
        assert!(e.is_satisfied());
    }
}

#[test]
fn times_range_from() {
    let point = MockPoint::<(), ()>::new("poll");
    let e = point.expect(|e| e.at_least(2));
    for _ in 0..10 {
        point.call(());
    }
    assert_eq!(10, e.call_count());
    assert!(!e.is_saturated());
}

#[test]
fn times_range_to() {
    let point = MockPoint::<(), ()>::new("poll");
    let e = point.expect(|e| e.at_most(2));
    assert!(e.is_satisfied());
    point.call(());
    point.call(());
    assert!(e.is_saturated());
}

#[test]
fn once_and_times_any() {
    let point = MockPoint::<(), ()>::new("poll");
    let _e = point.expect(|e| e.times_any().once());
    point.call(());
}

#[test]
#[should_panic(expected = "Match of forbidden call")]
fn never() {
    let point = MockPoint::<(), ()>::new("poll");
    let _e = point.expect(|e| e.never());
    point.call(());
}

/// Dispatching a call that matches an unbounded expectation repeatedly never
/// exhausts it, nor changes which expectation handles the next call.
#[test]
fn allow_is_idempotent() {
    let point = MockPoint::<(i32,), i32>::new("func");
    let _required = point.expect(|e| e
        .with((predicate::eq(1),))
        .return_const(1));
    let allowed = point.allow(|e| e.return_const(0));
    for _ in 0..1000 {
        assert_eq!(0, point.call((2,)));
    }
    assert_eq!(1000, allowed.call_count());
    assert!(!allowed.is_saturated());
    // The newer allow wins every tie, so the required one needs its own
    // arguments.
    assert_eq!(0, point.call((1,)));
    drop(allowed);
    assert_eq!(1, point.call((1,)));
}

#[test]
fn unit_return_needs_no_action() {
    let point = MockPoint::<(u8,), ()>::new("poke");
    let _e = point.expect(|e| e);
    point.call((0,));
}

#[test]
#[should_panic(expected = "Missing return action")]
fn missing_return_action() {
    let point = MockPoint::<(), u32>::new("read");
    let _e = point.allow(|e| e);
    point.call(());
}

#[test]
fn returning() {
    let point = MockPoint::<(i32,), i32>::new("acc");
    let mut total = 0;
    let _e = point.allow(|e| e.returning(move |(x,)| {
        total += x;
        total
    }));
    assert_eq!(5, point.call((5,)));
    assert_eq!(10, point.call((5,)));
}

#[test]
fn returning_st() {
    let rc = Rc::new(7u32);
    let point = MockPoint::<(), u32>::new("get");
    let _e = point.expect(|e| e.returning_st(move |_| *rc));
    assert_eq!(7, point.call(()));
}

#[test]
fn return_once() {
    struct NonClone(u32);
    let point = MockPoint::<(), NonClone>::new_opaque("take");
    let _e = point.expect(|e| e.return_once(|_| NonClone(42)));
    assert_eq!(42, point.call(()).0);
}

#[test]
fn return_once_twice() {
    let point = MockPoint::<(), u32>::new("take");
    let _e = point.allow(|e| e.return_once(|_| 1));
    assert_eq!(1, point.call(()));
    let r = panic::catch_unwind(|| point.call(()));
    let msg = r.unwrap_err().downcast::<String>().unwrap();
    assert!(msg.contains("return_once action called twice"), "{}", msg);
}

#[test]
fn return_once_st() {
    let rc = Rc::new(5u32);
    let point = MockPoint::<(), Rc<u32>>::new_opaque("take");
    let _e = point.expect(|e| e.return_once_st(move |_| rc));
    assert_eq!(5, *point.call(()));
}

#[test]
fn return_const() {
    let point = MockPoint::<(), String>::new("name");
    let _e = point.expect(|e| e.times(2).return_const("bob"));
    assert_eq!("bob", point.call(()));
    assert_eq!("bob", point.call(()));
}

#[test]
fn return_ref() {
    static ANSWER: u64 = 42;
    let point = MockPoint::<(), &'static u64>::new("answer");
    let _e = point.expect(|e| e.times(2).return_ref(&ANSWER));
    assert!(std::ptr::eq(&ANSWER, point.call(())));
    assert_eq!(42, *point.call(()));
}

#[test]
fn return_ref_unsized() {
    let point = MockPoint::<(), &'static [u8]>::new("bytes");
    let _e = point.expect(|e| e.return_ref(&b"abc"[..]));
    assert_eq!(b"abc", point.call(()));
}

#[test]
fn return_leaked() {
    let point = MockPoint::<(), &'static Vec<u32>>::new("list");
    let _e = point.expect(|e| e.times(2).return_leaked(vec![1, 2]));
    let a = point.call(());
    let b = point.call(());
    assert!(std::ptr::eq(a, b));
    assert_eq!(&vec![1, 2], a);
}

#[test]
fn throwing() {
    #[derive(Clone, Debug, PartialEq)]
    struct Eio;
    let point = MockPoint::<(), u32>::new("read");
    let _e = point.expect(|e| e.times(2).throwing(Eio));
    for _ in 0..2 {
        let r = panic::catch_unwind(|| point.call(()));
        assert_eq!(Some(&Eio), r.unwrap_err().downcast_ref::<Eio>());
    }
}

#[test]
fn side_effects_run_in_order_before_return() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    let point = MockPoint::<(u32,), u32>::new("f");
    let _e = point.expect(|e| e
        .side_effect(move |_| l1.lock().unwrap().push("first"))
        .side_effect(move |(x,)| {
            *x *= 10;
            l2.lock().unwrap().push("second");
        })
        .returning(move |(x,)| {
            l3.lock().unwrap().push("return");
            x + 1
        }));
    assert_eq!(21, point.call((2,)));
    assert_eq!(vec!["first", "second", "return"], *log.lock().unwrap());
}

#[test]
fn side_effect_calls_another_point() {
    let inner = Arc::new(MockPoint::<(u32,), ()>::new("inner"));
    let inner2 = inner.clone();
    let outer = MockPoint::<(u32,), ()>::new("outer");
    let _i = inner.expect(|e| e.with((predicate::eq(3),)));
    let _o = outer.expect(|e| e.side_effect(move |(x,)| inner2.call((*x,))));
    outer.call((3,));
}

/// An action may call its own point, as long as the call goes to a different
/// expectation.
#[test]
fn action_calls_its_own_point() {
    let point = Arc::new(MockPoint::<(u32,), u32>::new("fib"));
    let p2 = point.clone();
    let _base = point.allow(|e| e
        .with((predicate::lt(2),))
        .returning(|(n,)| n));
    let _step = point.allow(|e| e
        .with((predicate::eq(2),))
        .returning(move |(n,)| p2.call((n - 1,)) + p2.call((n - 2,))));
    assert_eq!(1, point.call((2,)));
}

/// Methods that borrow their arguments pass owned copies to the point.
#[test]
fn borrowed_arguments() {
    trait Sink {
        fn write(&self, buf: &[u8]) -> usize;
    }
    struct MockSink {
        write: MockPoint<(Vec<u8>,), usize>
    }
    impl Sink for MockSink {
        fn write(&self, buf: &[u8]) -> usize {
            self.write.call((buf.to_vec(),))
        }
    }

    let mock = MockSink{write: MockPoint::new("write")};
    let _e = mock.write.expect(|e| e
        .withf(|(buf,)| buf.starts_with(b"GET"))
        .returning(|(buf,)| buf.len()));
    let request = String::from("GET /");
    assert_eq!(5, mock.write(request.as_bytes()));
}

#[test]
#[should_panic(expected = "already has a return action")]
fn two_return_actions() {
    let point = MockPoint::<(), u32>::new("read");
    let _e = point.expect(|e| e.return_const(1u32).throwing("oops"));
}

#[test]
fn location_is_the_declaration() {
    let point = MockPoint::<(), ()>::new("p");
    let line = line!() + 1;
    let e = point.allow(|e| e);
    assert_eq!(file!(), e.location().file());
    assert_eq!(line, e.location().line());
}

#[test]
fn handles_deregister() {
    let point = MockPoint::<(), ()>::new("p");
    {
        let _e = point.allow(|e| e);
        assert_eq!(1, point.live_expectations());
    }
    assert_eq!(0, point.live_expectations());
    let r = panic::catch_unwind(|| point.call(()));
    let msg = r.unwrap_err().downcast::<String>().unwrap();
    assert!(msg.contains("(no live expectations)"), "{}", msg);
}
