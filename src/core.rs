use std::{
    any::Any,
    cell::RefCell,
    cmp::max,
    future::Future,
    mem::{replace, take},
    ops::{BitOr, BitOrAssign},
    rc::{Rc, Weak},
    thread::AccessError,
};

use derive_ex::derive_ex;
use futures::{
    executor::{LocalPool, LocalSpawner},
    task::LocalSpawnExt,
};
use parse_display::Display;
use slabmap::SlabMap;

use crate::scope::Scope;

#[cfg(test)]
mod tests;

const MAX_FLUSH_ROUNDS: usize = 100;

thread_local! {
    static GLOBALS: RefCell<Globals> = RefCell::new(Globals::new());
}

struct Globals {
    is_runtime_exists: bool,
    batch_depth: usize,
    tasks: Vec<Task>,
    detached: Vec<Rc<dyn Any>>,
    spawner: Option<LocalSpawner>,
}
impl Globals {
    fn new() -> Self {
        Self {
            is_runtime_exists: false,
            batch_depth: 0,
            tasks: Vec::new(),
            detached: Vec::new(),
            spawner: None,
        }
    }
    fn with<T>(f: impl FnOnce(&mut Self) -> T) -> T {
        GLOBALS.with(|g| f(&mut g.borrow_mut()))
    }
    fn try_with<T>(f: impl FnOnce(&mut Self) -> T) -> Result<T, AccessError> {
        GLOBALS.try_with(|g| f(&mut g.borrow_mut()))
    }
    fn assert_exists(&self) {
        if !self.is_runtime_exists {
            panic!("`Runtime` is not created.");
        }
    }
    fn finish_runtime(&mut self) -> (Vec<Task>, Vec<Rc<dyn Any>>, Option<LocalSpawner>) {
        self.is_runtime_exists = false;
        self.batch_depth = 0;
        (
            take(&mut self.tasks),
            take(&mut self.detached),
            self.spawner.take(),
        )
    }
}

/// Reactive runtime.
///
/// Only one `Runtime` can exist per thread. Every [`State::set`](crate::State::set),
/// effect and [`spawn_local`] requires a live `Runtime` on the current thread.
#[derive_ex(Default)]
#[default(Self::new())]
pub struct Runtime {
    pool: LocalPool,
}
impl Runtime {
    pub fn new() -> Self {
        if Globals::with(|g| replace(&mut g.is_runtime_exists, true)) {
            panic!("Only one `Runtime` can exist in the same thread at the same time.");
        };
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Globals::with(|g| g.spawner = Some(spawner));
        Self { pool }
    }

    /// Returns a context that neither tracks dependencies nor belongs to any scope.
    pub fn sc(&mut self) -> SignalContext<'_> {
        SignalContext::new(None, None)
    }

    /// Polls the futures spawned by [`spawn_local`] until none of them can make progress.
    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }
}
impl Drop for Runtime {
    fn drop(&mut self) {
        let Ok(finished) = Globals::try_with(|g| g.finish_runtime()) else {
            return;
        };
        drop(finished);
    }
}

/// Runs `f` and defers the execution of effects scheduled inside it until the outermost batch ends.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    Globals::with(|g| {
        g.assert_exists();
        g.batch_depth += 1;
    });
    let ret = {
        let _guard = BatchGuard;
        f()
    };
    if Globals::with(|g| g.batch_depth == 0) {
        flush();
    }
    ret
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let _ = Globals::try_with(|g| g.batch_depth = g.batch_depth.saturating_sub(1));
    }
}

fn flush() {
    Globals::with(|g| g.batch_depth += 1);
    let _guard = BatchGuard;
    let mut tasks = Vec::new();
    let mut rounds = 0;
    loop {
        Globals::with(|g| tasks.append(&mut g.tasks));
        if tasks.is_empty() {
            return;
        }
        rounds += 1;
        if rounds > MAX_FLUSH_ROUNDS {
            Globals::with(|g| g.tasks.clear());
            tracing::error!(rounds, "effects kept rescheduling each other");
            panic!("{}", CyclicError {});
        }
        for task in tasks.drain(..) {
            task.run();
        }
    }
}

/// Spawns a future on the executor owned by the current thread's [`Runtime`].
///
/// Spawned futures make progress when [`Runtime::run_until_stalled`] is called.
pub fn spawn_local(future: impl Future<Output = ()> + 'static) {
    let spawner = Globals::with(|g| {
        g.assert_exists();
        g.spawner.clone()
    });
    if let Some(spawner) = spawner {
        if let Err(e) = spawner.spawn_local(future) {
            tracing::warn!(%e, "failed to spawn local task");
        }
    }
}

/// Keeps `node` alive until the runtime is dropped.
pub(crate) fn detach(node: Rc<dyn Any>) {
    Globals::with(|g| {
        g.assert_exists();
        g.detached.push(node);
    });
}

pub(crate) struct Task(Box<dyn FnOnce()>);

impl Task {
    pub fn from_weak_fn<T: Any>(this: Weak<T>, f: impl Fn(Rc<T>) + Copy + 'static) -> Self {
        Task(Box::new(move || {
            if let Some(this) = this.upgrade() {
                f(this)
            }
        }))
    }
    pub fn schedule(self) {
        Globals::with(|g| {
            g.assert_exists();
            g.tasks.push(self);
        });
    }
    fn run(self) {
        (self.0)()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) enum Dirty {
    Clean,
    MaybeDirty,
    Dirty,
}
impl Dirty {
    pub fn is_clean(self) -> bool {
        self == Dirty::Clean
    }

    /// Return true if the dependants need to be notified when the dirty state is changed from the current value to `Dirty` or `MaybeDirty`.
    ///
    /// When changing from `MaybeDirty` to `Dirty`,
    /// notification is not necessary because the update is scheduled by the previous `MaybeDirty` notification.
    pub fn needs_notify(self) -> bool {
        self.is_clean()
    }
}

impl BitOr<DirtyOrMaybeDirty> for Dirty {
    type Output = Self;
    fn bitor(self, rhs: DirtyOrMaybeDirty) -> Self {
        max(self, rhs.into())
    }
}
impl BitOrAssign<DirtyOrMaybeDirty> for Dirty {
    fn bitor_assign(&mut self, rhs: DirtyOrMaybeDirty) {
        *self = *self | rhs;
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum DirtyOrMaybeDirty {
    Dirty,
    MaybeDirty,
}

impl From<DirtyOrMaybeDirty> for Dirty {
    fn from(value: DirtyOrMaybeDirty) -> Self {
        match value {
            DirtyOrMaybeDirty::Dirty => Dirty::Dirty,
            DirtyOrMaybeDirty::MaybeDirty => Dirty::MaybeDirty,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) struct BindKey(usize);

pub(crate) trait BindSink: 'static {
    fn notify(self: Rc<Self>, dirty: DirtyOrMaybeDirty);
}

pub(crate) trait BindSource: 'static {
    /// Returns true if the value has changed since `version` was observed.
    fn check(self: Rc<Self>, version: u64) -> bool;
    fn unbind(self: Rc<Self>, key: BindKey);
}

struct SourceBinding {
    source: Rc<dyn BindSource>,
    key: BindKey,
    version: u64,
}
impl SourceBinding {
    fn is_same(&self, node: &Rc<dyn BindSource>) -> bool {
        Rc::as_ptr(&self.source) as *const u8 == Rc::as_ptr(node) as *const u8
    }
    fn check(&self) -> bool {
        self.source.clone().check(self.version)
    }
    fn unbind(self) {
        self.source.unbind(self.key);
    }
}

#[derive(Default)]
pub(crate) struct SourceBindings(Vec<SourceBinding>);

impl SourceBindings {
    pub fn check(&self) -> bool {
        self.0.iter().any(|source| source.check())
    }
    pub fn clear(&mut self) {
        for b in self.0.drain(..) {
            b.unbind();
        }
    }
}
impl Drop for SourceBindings {
    fn drop(&mut self) {
        self.clear();
    }
}

#[derive(Default)]
pub(crate) struct SinkBindings(SlabMap<Weak<dyn BindSink>>);

impl SinkBindings {
    pub fn new() -> Self {
        Self(SlabMap::new())
    }
    pub fn bind(&mut self, this: Rc<dyn BindSource>, version: u64, sc: &mut SignalContext) {
        let Some(sink) = &mut sc.sink else {
            return;
        };
        let index = sink.sources_len;
        if let Some(source_old) = sink.sources.0.get_mut(index) {
            if source_old.is_same(&this) {
                source_old.version = version;
                sink.sources_len += 1;
                return;
            }
        }
        if sink.sources.0[..index].iter().any(|b| b.is_same(&this)) {
            return;
        }
        let key = BindKey(self.0.insert(sink.this.clone()));
        sink.push(SourceBinding {
            source: this,
            key,
            version,
        });
    }
    pub fn unbind(&mut self, key: BindKey) {
        self.0.remove(key.0);
    }

    /// Returns the sinks that are still alive, forgetting the dropped ones.
    pub fn live(&mut self) -> Vec<Rc<dyn BindSink>> {
        let mut live = Vec::new();
        let mut dead = Vec::new();
        for (key, sink) in self.0.iter() {
            match sink.upgrade() {
                Some(sink) => live.push(sink),
                None => dead.push(key),
            }
        }
        for key in dead {
            self.0.remove(key);
        }
        live
    }
}

pub(crate) struct Sink {
    this: Weak<dyn BindSink>,
    sources: SourceBindings,
    sources_len: usize,
    displaced: Vec<SourceBinding>,
}
impl Sink {
    pub fn new(this: Weak<dyn BindSink>, sources: SourceBindings) -> Self {
        Self {
            this,
            sources,
            sources_len: 0,
            displaced: Vec::new(),
        }
    }
    fn push(&mut self, binding: SourceBinding) {
        let index = self.sources_len;
        self.sources_len += 1;
        if index < self.sources.0.len() {
            let old = replace(&mut self.sources.0[index], binding);
            self.displaced.push(old);
        } else {
            self.sources.0.push(binding);
        }
    }

    /// Unbinds the sources that were not read during this run and returns the rest.
    pub fn finish(mut self) -> SourceBindings {
        for b in self.displaced.drain(..) {
            b.unbind();
        }
        let mut sources = take(&mut self.sources);
        for b in sources.0.drain(self.sources_len..) {
            b.unbind();
        }
        sources
    }
}

/// Context for reading reactive values.
///
/// Carries the computation that collects dependencies (if any) and the current [`Scope`] (if any).
pub struct SignalContext<'s> {
    sink: Option<&'s mut Sink>,
    scope: Option<Scope>,
}

impl<'s> SignalContext<'s> {
    pub(crate) fn new(sink: Option<&'s mut Sink>, scope: Option<Scope>) -> Self {
        Self { sink, scope }
    }

    /// The scope that owns the code currently running.
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    /// Returns true if values read through this context are recorded as dependencies.
    pub fn is_tracking(&self) -> bool {
        self.sink.is_some()
    }

    /// Call a function with a [`SignalContext`] that does not track dependencies.
    pub fn untrack<T>(&mut self, f: impl FnOnce(&mut SignalContext) -> T) -> T {
        f(&mut SignalContext::new(None, self.scope.clone()))
    }
}

#[non_exhaustive]
#[derive(Display, Debug)]
#[display("detect cyclic dependency")]
pub struct CyclicError {}

impl std::error::Error for CyclicError {}
