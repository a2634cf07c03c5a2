use std::{
    cell::{Cell, RefCell},
    mem::replace,
    rc::Rc,
};

use derive_ex::derive_ex;
use serde::{Deserialize, Serialize};

use crate::{
    core::{batch, BindKey, BindSink, BindSource, DirtyOrMaybeDirty, SinkBindings},
    Signal, SignalContext,
};

#[cfg(test)]
mod tests;

/// Similar to `Rc<RefCell<T>>`, but with added functionality to observe changes.
#[derive_ex(Clone, bound())]
pub struct State<T: 'static>(Rc<StateNode<T>>);

impl<T: 'static> State<T> {
    /// Create a new `State` with the given initial value.
    pub fn new(value: T) -> Self {
        Self(Rc::new(StateNode {
            sinks: RefCell::new(SinkBindings::new()),
            value: RefCell::new(value),
            version: Cell::new(0),
        }))
    }

    /// Calls `f` with a reference to the current value and adds a dependency on this `State` to the specified `SignalContext`.
    pub fn with<U>(&self, sc: &mut SignalContext, f: impl FnOnce(&T) -> U) -> U {
        self.0.bind(sc);
        f(&self.0.value.borrow())
    }

    /// Gets the current value and adds a dependency on this `State` to the specified `SignalContext`.
    pub fn get(&self, sc: &mut SignalContext) -> T
    where
        T: Clone,
    {
        self.with(sc, |value| value.clone())
    }

    /// Adds a dependency on this `State` without reading the value.
    pub fn track(&self, sc: &mut SignalContext) {
        self.0.bind(sc);
    }

    /// Sets the value of the state and notifies the dependencies.
    ///
    /// Effects that depend on this state run before this method returns, unless called inside [`batch`](crate::batch).
    pub fn set(&self, value: T) {
        let old = replace(&mut *self.0.value.borrow_mut(), value);
        drop(old);
        self.0.notify();
    }

    /// Sets the value of the state and notifies the dependencies only if the current state is different from the specified value.
    pub fn set_dedup(&self, value: T)
    where
        T: PartialEq,
    {
        let old = {
            let mut this_value = self.0.value.borrow_mut();
            if *this_value == value {
                return;
            }
            replace(&mut *this_value, value)
        };
        drop(old);
        self.0.notify();
    }

    /// Modifies the value in place and notifies the dependencies.
    pub fn update<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
        let ret = f(&mut self.0.value.borrow_mut());
        self.0.notify();
        ret
    }

    /// Returns a `Signal` representing this state.
    pub fn to_signal(&self) -> Signal<T> {
        Signal::from(self.clone())
    }
}
impl<T: std::fmt::Debug> std::fmt::Debug for State<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => std::fmt::Debug::fmt(&*value, f),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
impl<T: Default> Default for State<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
impl<T> Serialize for State<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        match self.0.value.try_borrow() {
            Ok(value) => T::serialize(&*value, serializer),
            Err(_) => Err(serde::ser::Error::custom("borrowed")),
        }
    }
}
impl<'de, T> Deserialize<'de> for State<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<State<T>, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        T::deserialize(deserializer).map(|value| State::new(value))
    }
}

struct StateNode<T: 'static> {
    sinks: RefCell<SinkBindings>,
    value: RefCell<T>,
    version: Cell<u64>,
}
impl<T: 'static> StateNode<T> {
    fn bind(self: &Rc<Self>, sc: &mut SignalContext) {
        self.sinks
            .borrow_mut()
            .bind(self.clone(), self.version.get(), sc);
    }
    fn notify(&self) {
        self.version.set(self.version.get().wrapping_add(1));
        let sinks = self.sinks.borrow_mut().live();
        batch(|| {
            for sink in sinks {
                sink.notify(DirtyOrMaybeDirty::Dirty);
            }
        });
    }
}

impl<T: 'static> BindSource for StateNode<T> {
    fn check(self: Rc<Self>, version: u64) -> bool {
        self.version.get() != version
    }

    fn unbind(self: Rc<Self>, key: BindKey) {
        if let Ok(mut sinks) = self.sinks.try_borrow_mut() {
            sinks.unbind(key);
        }
    }
}
