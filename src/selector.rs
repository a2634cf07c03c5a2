use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    hash::Hash,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;

use crate::{cleanup, effect, SignalContext, State};

#[cfg(test)]
mod tests;

/// Answers "does `key` relate to the current source value" for many keys while evaluating the source once.
///
/// Every distinct key that is queried gets one flag cell. When the source changes,
/// only the flags of keys that were related to the previous value or are related to the new value are touched,
/// so dependents of unrelated keys are not re-run.
#[derive_ex(Clone, bound())]
pub struct Selector<K: 'static, T: 'static>(Rc<SelectorData<K, T>>);

struct SelectorData<K, T> {
    subs: RefCell<HashMap<K, SelectorEntry>>,
    next_order: Cell<u64>,
    value: RefCell<Option<T>>,
    f: Box<dyn Fn(&K, &T) -> bool>,
}

struct SelectorEntry {
    flag: State<()>,
    count: usize,
    order: u64,
}

/// Creates a [`Selector`] that selects the key equal to the source value.
pub fn create_selector<T>(
    sc: &mut SignalContext,
    source: impl Fn(&mut SignalContext) -> T + 'static,
) -> Selector<T, T>
where
    T: Clone + Eq + Hash + 'static,
{
    create_selector_with(sc, source, |key, value| key == value)
}

/// Creates a [`Selector`] with a custom relation `f(key, value)`.
pub fn create_selector_with<K, T>(
    sc: &mut SignalContext,
    source: impl Fn(&mut SignalContext) -> T + 'static,
    f: impl Fn(&K, &T) -> bool + 'static,
) -> Selector<K, T>
where
    K: Clone + Eq + Hash + 'static,
    T: Clone + 'static,
{
    let data = Rc::new(SelectorData {
        subs: RefCell::new(HashMap::new()),
        next_order: Cell::new(0),
        value: RefCell::new(None),
        f: Box::new(f),
    });
    let this = data.clone();
    effect(sc, move |sc, prev: Option<T>| {
        let value = source(sc);
        let mut flags: Vec<(u64, State<()>)> = this
            .subs
            .borrow()
            .iter()
            .filter(|(key, _)| {
                (this.f)(key, &value) || prev.as_ref().is_some_and(|prev| (this.f)(key, prev))
            })
            .map(|(_, entry)| (entry.order, entry.flag.clone()))
            .collect();
        // Touch keys in the order they were first queried.
        flags.sort_by_key(|(order, _)| *order);
        *this.value.borrow_mut() = Some(value.clone());
        tracing::debug!(touched = flags.len(), "selector changed");
        for (_, flag) in flags {
            flag.set(());
        }
        value
    });
    Selector(data)
}

impl<K, T> Selector<K, T>
where
    K: Clone + Eq + Hash + 'static,
    T: 'static,
{
    /// Returns whether `key` relates to the current source value.
    ///
    /// The caller depends only on the flag of `key`.
    /// The subscription is released when the current scope is disposed.
    pub fn is_selected(&self, sc: &mut SignalContext, key: &K) -> bool {
        let flag = {
            let mut subs = self.0.subs.borrow_mut();
            let entry = subs.entry(key.clone()).or_insert_with(|| {
                let order = self.0.next_order.get();
                self.0.next_order.set(order + 1);
                SelectorEntry {
                    flag: State::new(()),
                    count: 0,
                    order,
                }
            });
            entry.count += 1;
            entry.flag.clone()
        };
        flag.track(sc);
        let data = Rc::downgrade(&self.0);
        let key_ = key.clone();
        cleanup(sc, move || release(&data, &key_));
        match &*self.0.value.borrow() {
            Some(value) => (self.0.f)(key, value),
            None => false,
        }
    }

    /// Number of distinct keys that currently have at least one subscriber.
    pub fn key_count(&self) -> usize {
        self.0.subs.borrow().len()
    }

    /// Number of active subscriptions to `key`.
    pub fn subscriber_count(&self, key: &K) -> usize {
        self.0.subs.borrow().get(key).map_or(0, |entry| entry.count)
    }
}

fn release<K: Eq + Hash, T>(data: &Weak<SelectorData<K, T>>, key: &K) {
    let Some(data) = data.upgrade() else {
        return;
    };
    let mut subs = data.subs.borrow_mut();
    if let Some(entry) = subs.get_mut(key) {
        if entry.count > 1 {
            entry.count -= 1;
        } else {
            subs.remove(key);
        }
    }
}
