use assert_call::{call, CallRecorder};

use crate::{core::Runtime, effect, root, Dispose, SignalContext, State};

fn watch(sc: &mut SignalContext, s: &State<i32>) -> Dispose {
    let s = s.clone();
    root(sc, |sc, d| {
        effect(sc, move |sc, _: Option<()>| call!("{}", s.get(sc)));
        d
    })
}

#[test]
fn new() {
    let mut rt = Runtime::new();
    let s = State::new(10);
    assert_eq!(s.get(&mut rt.sc()), 10);
}

#[test]
fn set() {
    let mut rt = Runtime::new();
    let s = State::new(10);
    assert_eq!(s.get(&mut rt.sc()), 10);

    s.set(20);
    assert_eq!(s.get(&mut rt.sc()), 20);

    s.set(30);
    assert_eq!(s.get(&mut rt.sc()), 30);
}

#[test]
fn set_effect() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(10);
    let _d = watch(&mut rt.sc(), &s);
    cr.verify("10");

    s.set(20);
    cr.verify("20");

    s.set(30);
    s.set(40);
    cr.verify(["30", "40"]);
}

#[test]
fn set_dedup_effect() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(10);
    let _d = watch(&mut rt.sc(), &s);
    cr.verify("10");

    s.set(10);
    cr.verify("10");

    s.set_dedup(10);
    cr.verify(());

    s.set_dedup(20);
    cr.verify("20");
}

#[test]
fn update_effect() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(10);
    let _d = watch(&mut rt.sc(), &s);
    cr.verify("10");

    let old = s.update(|value| {
        let old = *value;
        *value += 5;
        old
    });
    assert_eq!(old, 10);
    cr.verify("15");
}

#[test]
fn track_without_read() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(());
    let s0 = s.clone();
    let _d = root(&mut rt.sc(), |sc, d| {
        effect(sc, move |sc, _: Option<()>| {
            s0.track(sc);
            call!("run");
        });
        d
    });
    cr.verify("run");

    s.set(());
    cr.verify("run");
}

#[test]
fn to_signal() {
    let mut rt = Runtime::new();
    let s = State::new(1);
    let signal = s.to_signal();
    assert_eq!(signal.get(&mut rt.sc()), 1);

    s.set(2);
    assert_eq!(signal.get(&mut rt.sc()), 2);
}

#[test]
fn serialize() {
    let _rt = Runtime::new();
    let s = State::new(vec![1, 2, 3]);
    assert_eq!(serde_json::to_string(&s).unwrap(), "[1,2,3]");
}

#[test]
fn deserialize() {
    let mut rt = Runtime::new();
    let s: State<Vec<i32>> = serde_json::from_str("[4,5]").unwrap();
    assert_eq!(s.get(&mut rt.sc()), vec![4, 5]);
}

#[test]
fn debug() {
    let _rt = Runtime::new();
    let s = State::new(7);
    assert_eq!(format!("{s:?}"), "7");
}
