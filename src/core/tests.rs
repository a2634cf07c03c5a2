use assert_call::{call, CallRecorder};

use crate::{core::Runtime, effect, root, batch, spawn_local, State};

#[test]
#[should_panic(expected = "Only one `Runtime` can exist in the same thread at the same time.")]
fn runtime_twice() {
    let _rt0 = Runtime::new();
    let _rt1 = Runtime::new();
}

#[test]
fn runtime_after_drop() {
    let rt = Runtime::new();
    drop(rt);
    let _rt = Runtime::new();
}

#[test]
#[should_panic(expected = "`Runtime` is not created.")]
fn batch_without_runtime() {
    batch(|| ());
}

#[test]
fn sc_is_not_tracking() {
    let mut rt = Runtime::new();
    let sc = rt.sc();
    assert!(!sc.is_tracking());
    assert!(sc.scope().is_none());
}

#[test]
fn untrack_keeps_scope() {
    let mut rt = Runtime::new();
    root(&mut rt.sc(), |sc, d| {
        sc.untrack(|sc| {
            assert!(!sc.is_tracking());
            assert!(sc.scope().is_some_and(|s| s.ptr_eq(d.scope())));
        });
    });
}

#[test]
fn batch_defers_effects() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(1);
    let s0 = s.clone();
    let _d = root(&mut rt.sc(), |sc, d| {
        effect(sc, move |sc, _: Option<()>| call!("{}", s0.get(sc)));
        d
    });
    cr.verify("1");

    batch(|| {
        s.set(2);
        s.set(3);
        cr.verify(());
    });
    cr.verify("3");
}

#[test]
fn nested_batch_flushes_once() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(1);
    let s0 = s.clone();
    let _d = root(&mut rt.sc(), |sc, d| {
        effect(sc, move |sc, _: Option<()>| call!("{}", s0.get(sc)));
        d
    });
    cr.verify("1");

    batch(|| {
        batch(|| s.set(2));
        cr.verify(());
        s.set(3);
    });
    cr.verify("3");
}

#[test]
fn batch_returns_value() {
    let _rt = Runtime::new();
    assert_eq!(batch(|| 10), 10);
}

#[test]
#[should_panic(expected = "detect cyclic dependency")]
fn effect_writing_its_own_source() {
    let mut rt = Runtime::new();
    let s = State::new(0);
    root(&mut rt.sc(), |sc, _| {
        effect(sc, move |sc, _: Option<()>| {
            let value = s.get(sc);
            s.set(value + 1);
        });
    });
}

#[test]
fn spawn_local_runs_on_run_until_stalled() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(0);
    let s0 = s.clone();
    let _d = root(&mut rt.sc(), |sc, d| {
        effect(sc, move |sc, _: Option<()>| call!("{}", s0.get(sc)));
        d
    });
    cr.verify("0");

    let s1 = s.clone();
    spawn_local(async move { s1.set(5) });
    cr.verify(());

    rt.run_until_stalled();
    cr.verify("5");
    assert_eq!(s.get(&mut rt.sc()), 5);
}
