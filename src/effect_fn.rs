use std::{
    cell::{Cell, OnceCell, RefCell},
    fmt,
    mem::take,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;

use crate::{
    core::{batch, detach, BindSink, Dirty, DirtyOrMaybeDirty, Sink, SourceBindings, Task},
    Scope, Signal, SignalContext, State,
};


/// Call a function each time a dependency changes.
///
/// `f` runs once immediately, then again whenever a value it read during its last run changes.
/// It receives the value it returned last time (`None` on the first run).
///
/// Each run owns a scope: disposers registered during a run are called right before the next run,
/// and the effect stops for good when the enclosing scope is disposed.
/// An effect created outside of any scope lives as long as the [`Runtime`](crate::Runtime).
pub fn effect<T: 'static>(
    sc: &mut SignalContext,
    f: impl FnMut(&mut SignalContext, Option<T>) -> T + 'static,
) {
    let node = EffectNode::new(f, Scope::new(sc.scope().cloned()));
    match sc.scope() {
        Some(owner) => {
            let node = node.clone();
            owner.on_cleanup(move || node.dispose());
        }
        None => {
            tracing::warn!("effect created outside of any scope is never disposed");
            detach(node.clone());
        }
    }
    batch(|| node.run());
}

struct EffectData<T, F> {
    f: F,
    current: Option<T>,
    sources: SourceBindings,
}

struct EffectNode<T, F> {
    data: RefCell<EffectData<T, F>>,
    scope: Scope,
    dirty: Cell<Dirty>,
    is_disposed: Cell<bool>,
}
impl<T, F> EffectNode<T, F>
where
    T: 'static,
    F: FnMut(&mut SignalContext, Option<T>) -> T + 'static,
{
    fn new(f: F, scope: Scope) -> Rc<Self> {
        Rc::new(Self {
            data: RefCell::new(EffectData {
                f,
                current: None,
                sources: SourceBindings::default(),
            }),
            scope,
            dirty: Cell::new(Dirty::Clean),
            is_disposed: Cell::new(false),
        })
    }

    fn schedule(self: &Rc<Self>) {
        Task::from_weak_fn(Rc::downgrade(self), Self::call).schedule()
    }
    fn call(self: Rc<Self>) {
        if self.is_disposed.get() {
            return;
        }
        let is_dirty = match self.dirty.get() {
            Dirty::Clean => false,
            Dirty::MaybeDirty => self.data.borrow().sources.check(),
            Dirty::Dirty => true,
        };
        if is_dirty {
            self.run();
        } else {
            self.dirty.set(Dirty::Clean);
        }
    }
    fn run(self: &Rc<Self>) {
        self.dirty.set(Dirty::Clean);
        self.scope.dispose();
        let d = &mut *self.data.borrow_mut();
        let this: Weak<dyn BindSink> = Rc::downgrade(self) as Weak<dyn BindSink>;
        let mut sink = Sink::new(this, take(&mut d.sources));
        let prev = d.current.take();
        let current = (d.f)(
            &mut SignalContext::new(Some(&mut sink), Some(self.scope.clone())),
            prev,
        );
        d.current = Some(current);
        d.sources = sink.finish();
        if self.is_disposed.get() {
            d.sources.clear();
        }
    }
    fn dispose(&self) {
        self.is_disposed.set(true);
        self.scope.dispose();
        if let Ok(mut d) = self.data.try_borrow_mut() {
            d.sources.clear();
            d.current = None;
        }
    }
}

impl<T, F> BindSink for EffectNode<T, F>
where
    T: 'static,
    F: FnMut(&mut SignalContext, Option<T>) -> T + 'static,
{
    fn notify(self: Rc<Self>, dirty: DirtyOrMaybeDirty) {
        let old = self.dirty.get();
        self.dirty.set(old | dirty);
        if old.needs_notify() && !self.is_disposed.get() {
            self.schedule();
        }
    }
}

/// A value computed by an effect and stored in a [`State`].
///
/// Created by [`memo`] or [`MemoBuilder`].
#[derive_ex(Clone, bound())]
pub struct Memo<T: 'static>(State<T>);

impl<T: 'static> Memo<T> {
    pub fn with<U>(&self, sc: &mut SignalContext, f: impl FnOnce(&T) -> U) -> U {
        self.0.with(sc, f)
    }
    pub fn get(&self, sc: &mut SignalContext) -> T
    where
        T: Clone,
    {
        self.0.get(sc)
    }
    pub fn to_signal(&self) -> Signal<T> {
        self.0.to_signal()
    }
}
impl<T: fmt::Debug> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Creates a [`Memo`] that notifies its dependents only when the result of `f` changes.
pub fn memo<T>(sc: &mut SignalContext, f: impl FnMut(&mut SignalContext) -> T + 'static) -> Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    MemoBuilder::new(f).dedup().build(sc)
}

/// A builder for creating a [`Memo`].
///
/// Without [`dedup`](Self::dedup) or [`dedup_by`](Self::dedup_by),
/// the memo notifies its dependents every time `f` runs.
pub struct MemoBuilder<T, F> {
    f: F,
    eq: Option<Box<dyn Fn(&T, &T) -> bool>>,
}

impl<T, F> MemoBuilder<T, F>
where
    T: Clone + 'static,
    F: FnMut(&mut SignalContext) -> T + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f, eq: None }
    }

    /// Skips the update when the new result equals the previous one.
    pub fn dedup(self) -> Self
    where
        T: PartialEq,
    {
        self.dedup_by(|a, b| a == b)
    }

    /// Skips the update when `eq(previous, new)` returns true.
    pub fn dedup_by(self, eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self {
            f: self.f,
            eq: Some(Box::new(eq)),
        }
    }

    pub fn build(self, sc: &mut SignalContext) -> Memo<T> {
        let Self { mut f, eq } = self;
        let cell = Rc::new(OnceCell::<State<T>>::new());
        let cell_ = cell.clone();
        effect(sc, move |sc, prev: Option<T>| {
            let value = f(sc);
            match cell_.get() {
                Some(state) => {
                    let is_same = match (&eq, &prev) {
                        (Some(eq), Some(prev)) => eq(prev, &value),
                        _ => false,
                    };
                    if !is_same {
                        state.set(value.clone());
                    }
                }
                None => {
                    let _ = cell_.set(State::new(value.clone()));
                }
            }
            value
        });
        let state = cell.get().cloned();
        Memo(state.expect("the effect of a memo runs on creation"))
    }
}
