use std::{
    cell::{Cell, RefCell},
    fmt,
    mem::take,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;

use crate::{
    core::{
        BindKey, BindSink, BindSource, CyclicError, Dirty, DirtyOrMaybeDirty, Sink,
        SinkBindings, SourceBindings,
    },
    SignalContext, State,
};


/// A read-only reactive value.
///
/// A `Signal` is either a constant, a view of a [`State`], or a derived value that is
/// recomputed lazily when one of the values it read last time has changed.
#[derive_ex(Clone, bound())]
pub struct Signal<T: 'static>(RawSignal<T>);

#[derive_ex(Clone, bound())]
enum RawSignal<T: 'static> {
    Value(Rc<T>),
    State(State<T>),
    Node(Rc<dyn DynComputed<Value = T>>),
}

impl<T: 'static> Signal<T> {
    /// Creates a derived signal.
    ///
    /// Dependents are notified every time `f` is recomputed.
    pub fn new(f: impl Fn(&mut SignalContext) -> T + 'static) -> Self {
        Self::from_node(ComputedNode::new(f, None))
    }

    /// Creates a derived signal that notifies dependents only when the recomputed value differs from the previous one.
    pub fn new_dedup(f: impl Fn(&mut SignalContext) -> T + 'static) -> Self
    where
        T: PartialEq,
    {
        Self::from_node(ComputedNode::new(f, Some(<T as PartialEq>::eq)))
    }

    pub fn from_value(value: T) -> Self {
        Self(RawSignal::Value(Rc::new(value)))
    }

    fn from_node(node: Rc<impl DynComputed<Value = T>>) -> Self {
        Self(RawSignal::Node(node))
    }

    /// Calls `f` with the current value, or returns [`CyclicError`] if the signal is read while it is being computed.
    pub fn try_with<U>(
        &self,
        sc: &mut SignalContext,
        f: impl FnOnce(&T) -> U,
    ) -> Result<U, CyclicError> {
        match &self.0 {
            RawSignal::Value(value) => Ok(f(value)),
            RawSignal::State(state) => Ok(state.with(sc, f)),
            RawSignal::Node(node) => {
                let mut f = Some(f);
                let mut ret = None;
                node.clone().visit(sc, &mut |value| {
                    if let Some(f) = f.take() {
                        ret = Some(f(value));
                    }
                })?;
                ret.ok_or(CyclicError {})
            }
        }
    }
    pub fn try_get(&self, sc: &mut SignalContext) -> Result<T, CyclicError>
    where
        T: Clone,
    {
        self.try_with(sc, |value| value.clone())
    }

    pub fn with<U>(&self, sc: &mut SignalContext, f: impl FnOnce(&T) -> U) -> U {
        match self.try_with(sc, f) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }
    pub fn get(&self, sc: &mut SignalContext) -> T
    where
        T: Clone,
    {
        self.with(sc, |value| value.clone())
    }
}
impl<T: 'static> From<State<T>> for Signal<T> {
    fn from(state: State<T>) -> Self {
        Self(RawSignal::State(state))
    }
}
impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            RawSignal::Value(value) => fmt::Debug::fmt(&**value, f),
            RawSignal::State(state) => fmt::Debug::fmt(state, f),
            RawSignal::Node(_) => write!(f, "<computed>"),
        }
    }
}

trait DynComputed: 'static {
    type Value: 'static;
    fn visit(
        self: Rc<Self>,
        sc: &mut SignalContext,
        f: &mut dyn FnMut(&Self::Value),
    ) -> Result<(), CyclicError>;
}

struct ComputedData<T, F> {
    f: F,
    value: Option<T>,
    sources: SourceBindings,
}

struct ComputedNode<T: 'static, F> {
    data: RefCell<ComputedData<T, F>>,
    sinks: RefCell<SinkBindings>,
    dirty: Cell<Dirty>,
    version: Cell<u64>,
    is_computing: Cell<bool>,
    eq: Option<fn(&T, &T) -> bool>,
}

impl<T, F> ComputedNode<T, F>
where
    T: 'static,
    F: Fn(&mut SignalContext) -> T + 'static,
{
    fn new(f: F, eq: Option<fn(&T, &T) -> bool>) -> Rc<Self> {
        Rc::new(Self {
            data: RefCell::new(ComputedData {
                f,
                value: None,
                sources: SourceBindings::default(),
            }),
            sinks: RefCell::new(SinkBindings::new()),
            dirty: Cell::new(Dirty::Dirty),
            version: Cell::new(0),
            is_computing: Cell::new(false),
            eq,
        })
    }

    fn update(self: &Rc<Self>) -> Result<(), CyclicError> {
        if self.is_computing.get() {
            return Err(CyclicError {});
        }
        let _guard = ComputingGuard::enter(&self.is_computing);
        match self.dirty.get() {
            Dirty::Clean => return Ok(()),
            Dirty::MaybeDirty => {
                if !self.data.borrow().sources.check() {
                    self.dirty.set(Dirty::Clean);
                    return Ok(());
                }
            }
            Dirty::Dirty => {}
        }
        let d = &mut *self.data.borrow_mut();
        let this: Weak<dyn BindSink> = Rc::downgrade(self) as Weak<dyn BindSink>;
        let mut sink = Sink::new(this, take(&mut d.sources));
        let value = (d.f)(&mut SignalContext::new(Some(&mut sink), None));
        d.sources = sink.finish();
        let is_changed = match (&d.value, self.eq) {
            (Some(old), Some(eq)) => !eq(old, &value),
            _ => true,
        };
        if is_changed {
            d.value = Some(value);
            self.version.set(self.version.get().wrapping_add(1));
        }
        self.dirty.set(Dirty::Clean);
        Ok(())
    }
}

impl<T, F> DynComputed for ComputedNode<T, F>
where
    T: 'static,
    F: Fn(&mut SignalContext) -> T + 'static,
{
    type Value = T;

    fn visit(
        self: Rc<Self>,
        sc: &mut SignalContext,
        f: &mut dyn FnMut(&T),
    ) -> Result<(), CyclicError> {
        self.update()?;
        self.sinks
            .borrow_mut()
            .bind(self.clone(), self.version.get(), sc);
        if let Some(value) = &self.data.borrow().value {
            f(value);
        }
        Ok(())
    }
}

impl<T, F> BindSource for ComputedNode<T, F>
where
    T: 'static,
    F: Fn(&mut SignalContext) -> T + 'static,
{
    fn check(self: Rc<Self>, version: u64) -> bool {
        self.update().is_err() || self.version.get() != version
    }

    fn unbind(self: Rc<Self>, key: BindKey) {
        if let Ok(mut sinks) = self.sinks.try_borrow_mut() {
            sinks.unbind(key);
        }
    }
}

impl<T, F> BindSink for ComputedNode<T, F>
where
    T: 'static,
    F: Fn(&mut SignalContext) -> T + 'static,
{
    fn notify(self: Rc<Self>, dirty: DirtyOrMaybeDirty) {
        let old = self.dirty.get();
        self.dirty.set(old | dirty);
        if old.needs_notify() {
            let sinks = self.sinks.borrow_mut().live();
            for sink in sinks {
                sink.notify(DirtyOrMaybeDirty::MaybeDirty);
            }
        }
    }
}

struct ComputingGuard<'a>(&'a Cell<bool>);

impl<'a> ComputingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}
impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
