use std::{
    cell::{Ref, RefCell},
    fmt,
    iter::successors,
    mem::take,
    rc::Rc,
};

use derive_ex::derive_ex;

use crate::{context::ContextRecord, SignalContext};


/// A node in the ownership tree.
///
/// A scope holds the disposers registered while code owned by it was running,
/// a reference to the scope that created it, and the context values bound to it.
#[derive_ex(Clone)]
pub struct Scope(Rc<ScopeNode>);

struct ScopeNode {
    disposers: RefCell<Vec<Box<dyn FnOnce()>>>,
    owner: Option<Scope>,
    context: RefCell<ContextRecord>,
}

impl Scope {
    pub(crate) fn new(owner: Option<Scope>) -> Self {
        Self(Rc::new(ScopeNode {
            disposers: RefCell::new(Vec::new()),
            owner,
            context: RefCell::new(ContextRecord::default()),
        }))
    }

    /// The scope this scope was created in.
    pub fn owner(&self) -> Option<&Scope> {
        self.0.owner.as_ref()
    }

    /// Iterates over this scope and its owners, innermost first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Scope> {
        successors(Some(self), |scope| scope.owner())
    }

    /// Registers `f` to be called when this scope is disposed.
    pub fn on_cleanup(&self, f: impl FnOnce() + 'static) {
        self.0.disposers.borrow_mut().push(Box::new(f));
    }

    /// Calls every registered disposer in registration order and clears the registry.
    ///
    /// Disposers registered afterwards are kept for the next call.
    /// If a disposer panics, the remaining disposers of this call are dropped without being called.
    pub fn dispose(&self) {
        let disposers = take(&mut *self.0.disposers.borrow_mut());
        if disposers.is_empty() {
            return;
        }
        tracing::trace!(disposers = disposers.len(), "dispose scope");
        for dispose in disposers {
            dispose();
        }
    }

    /// Number of disposers waiting for the next [`dispose`](Self::dispose).
    pub fn disposer_count(&self) -> usize {
        self.0.disposers.borrow().len()
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn context(&self) -> Ref<'_, ContextRecord> {
        self.0.context.borrow()
    }
    pub(crate) fn set_context(&self, record: ContextRecord) {
        *self.0.context.borrow_mut() = record;
    }
}
impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("disposers", &self.0.disposers.try_borrow().map(|d| d.len()))
            .field("depth", &self.ancestors().count())
            .finish()
    }
}

/// Handle that disposes the scope created by [`root`].
#[derive_ex(Clone)]
pub struct Dispose(Scope);

impl Dispose {
    /// Runs the disposers of the scope. A second call runs nothing.
    pub fn dispose(&self) {
        self.0.dispose();
    }
    pub fn scope(&self) -> &Scope {
        &self.0
    }
}
impl fmt::Debug for Dispose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dispose").field(&self.0).finish()
    }
}

/// Creates a new scope owned by the current scope and calls `body` in it without tracking dependencies.
///
/// The scope is not disposed together with its owner; it lives until [`Dispose::dispose`] is called.
/// Effects created in the scope keep running until then, even if every [`Dispose`] handle is dropped.
pub fn root<T>(sc: &mut SignalContext, body: impl FnOnce(&mut SignalContext, Dispose) -> T) -> T {
    let scope = Scope::new(sc.scope().cloned());
    let mut sc = SignalContext::new(None, Some(scope.clone()));
    body(&mut sc, Dispose(scope))
}

/// Registers `f` on the current scope.
///
/// Does nothing if there is no current scope.
pub fn cleanup(sc: &SignalContext, f: impl FnOnce() + 'static) {
    if let Some(scope) = sc.scope() {
        scope.on_cleanup(f);
    }
}
