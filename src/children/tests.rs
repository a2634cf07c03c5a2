use assert_call::{call, CallRecorder};

use crate::{core::Runtime, resolve_children, root, Child, Children, Resolved, State};

#[test]
fn single_value() {
    let mut rt = Runtime::new();
    root(&mut rt.sc(), |sc, _| {
        let resolved = resolve_children(sc, &Children::Value(1));
        assert!(matches!(resolved, Resolved::Single(Child::Value(1))));
        assert_eq!(resolved.len(), 1);
    });
}

#[test]
fn nested_lists_are_flattened() {
    let mut rt = Runtime::new();
    root(&mut rt.sc(), |sc, _| {
        let children = Children::from(vec![
            Children::Value(1),
            Children::from(vec![Children::Value(2), Children::from(vec![Children::Value(3)])]),
            Children::from(Vec::new()),
            Children::Value(4),
        ]);
        let resolved = resolve_children(sc, &children);
        assert_eq!(resolved.len(), 4);
        assert_eq!(resolved.values(sc), vec![1, 2, 3, 4]);
    });
}

#[test]
fn empty_list() {
    let mut rt = Runtime::new();
    root(&mut rt.sc(), |sc, _| {
        let resolved = resolve_children(sc, &Children::<i32>::from_iter([]));
        assert!(resolved.is_empty());
        assert!(resolved.into_vec().is_empty());
    });
}

#[test]
fn dynamic_child_follows_state() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(1);
    let s0 = s.clone();
    let (resolved, _d) = root(&mut rt.sc(), |sc, d| {
        let children = Children::dynamic(move |sc| {
            call!("eval");
            s0.get(sc) * 2
        });
        (resolve_children(sc, &children), d)
    });
    cr.verify("eval");
    assert_eq!(resolved.values(&mut rt.sc()), vec![2]);
    cr.verify(());

    s.set(5);
    cr.verify("eval");
    assert_eq!(resolved.values(&mut rt.sc()), vec![10]);
}

#[test]
fn dynamic_child_stops_with_scope() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let s = State::new(1);
    let s0 = s.clone();
    let d = root(&mut rt.sc(), |sc, d| {
        resolve_children(
            sc,
            &Children::dynamic(move |sc| {
                call!("eval");
                s0.get(sc)
            }),
        );
        d
    });
    cr.verify("eval");

    d.dispose();
    s.set(2);
    cr.verify(());
}

#[test]
fn mixed_children_keep_order() {
    let mut rt = Runtime::new();
    let s = State::new("b");
    let s0 = s.clone();
    let (resolved, _d) = root(&mut rt.sc(), |sc, d| {
        let children: Children<&str> = [
            Children::Value("a"),
            Children::dynamic(move |sc| s0.get(sc)),
            Children::Value("c"),
        ]
        .into_iter()
        .collect();
        (resolve_children(sc, &children), d)
    });
    assert_eq!(resolved.values(&mut rt.sc()), vec!["a", "b", "c"]);

    s.set("B");
    assert_eq!(resolved.values(&mut rt.sc()), vec!["a", "B", "c"]);
}
