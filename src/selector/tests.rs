use assert_call::{call, CallRecorder};

use crate::{core::Runtime, create_selector, create_selector_with, effect, root, State};

#[test]
fn only_affected_keys_rerun() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(1);
    let s0 = s.clone();
    let _d = root(&mut rt.sc(), |sc, d| {
        let selector = create_selector(sc, move |sc| s0.get(sc));
        for key in 0..5 {
            let selector = selector.clone();
            effect(sc, move |sc, _: Option<()>| {
                call!("{key}={}", selector.is_selected(sc, &key))
            });
        }
        d
    });
    cr.verify(["0=false", "1=true", "2=false", "3=false", "4=false"]);

    s.set(2);
    cr.verify(["1=false", "2=true"]);

    s.set(2);
    cr.verify("2=true");
}

#[test]
fn custom_relation() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(15);
    let s0 = s.clone();
    let _d = root(&mut rt.sc(), |sc, d| {
        let selector = create_selector_with(sc, move |sc| s0.get(sc), |key: &i32, value: &i32| {
            value / 10 == *key
        });
        for key in 0..3 {
            let selector = selector.clone();
            effect(sc, move |sc, _: Option<()>| {
                call!("{key}={}", selector.is_selected(sc, &key))
            });
        }
        d
    });
    cr.verify(["0=false", "1=true", "2=false"]);

    s.set(17);
    cr.verify("1=true");

    s.set(25);
    cr.verify(["1=false", "2=true"]);
}

#[test]
fn subscriptions_released_on_dispose() {
    let mut rt = Runtime::new();
    let s = State::new(1);
    let s0 = s.clone();
    let (selector, _d) = root(&mut rt.sc(), |sc, d| {
        (create_selector(sc, move |sc| s0.get(sc)), d)
    });
    let a = root(&mut rt.sc(), |sc, d| {
        let selector = selector.clone();
        effect(sc, move |sc, _: Option<()>| {
            selector.is_selected(sc, &1);
        });
        d
    });
    let b = root(&mut rt.sc(), |sc, d| {
        let selector = selector.clone();
        effect(sc, move |sc, _: Option<()>| {
            selector.is_selected(sc, &1);
        });
        d
    });
    assert_eq!(selector.subscriber_count(&1), 2);
    assert_eq!(selector.key_count(), 1);

    a.dispose();
    assert_eq!(selector.subscriber_count(&1), 1);
    assert_eq!(selector.key_count(), 1);

    b.dispose();
    assert_eq!(selector.subscriber_count(&1), 0);
    assert_eq!(selector.key_count(), 0);
}

#[test]
fn rerun_keeps_one_subscription() {
    let mut rt = Runtime::new();
    let s = State::new(1);
    let s0 = s.clone();
    let (selector, _d) = root(&mut rt.sc(), |sc, d| {
        let selector = create_selector(sc, move |sc| s0.get(sc));
        let selector0 = selector.clone();
        effect(sc, move |sc, _: Option<()>| {
            selector0.is_selected(sc, &1);
        });
        (selector, d)
    });
    assert_eq!(selector.subscriber_count(&1), 1);

    s.set(2);
    s.set(1);
    assert_eq!(selector.subscriber_count(&1), 1);
}

#[test]
fn query_without_scope_is_answered() {
    let mut rt = Runtime::new();
    let s = State::new(3);
    let s0 = s.clone();
    let (selector, _d) = root(&mut rt.sc(), |sc, d| {
        (create_selector(sc, move |sc| s0.get(sc)), d)
    });
    assert!(selector.is_selected(&mut rt.sc(), &3));
    assert!(!selector.is_selected(&mut rt.sc(), &4));
}
