use std::{
    any::Any,
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use derive_ex::derive_ex;
use parse_display::Display;

use crate::{resolve_children, Children, Memo, MemoBuilder, Resolved, SignalContext};


/// Identifier issued by [`create_context`], unique within the process.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("context#{0}")]
pub struct ContextId(u64);

impl ContextId {
    fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Context values bound to one scope.
#[derive(Default)]
pub(crate) struct ContextRecord(Vec<(ContextId, Rc<dyn Any>)>);

impl ContextRecord {
    fn single(id: ContextId, value: Rc<dyn Any>) -> Self {
        Self(vec![(id, value)])
    }
    fn get(&self, id: ContextId) -> Option<&Rc<dyn Any>> {
        self.0.iter().find(|(k, _)| *k == id).map(|(_, v)| v)
    }
}

/// A value that can be provided to a subtree of the ownership tree.
#[derive_ex(Clone, bound())]
pub struct Context<T: 'static> {
    id: ContextId,
    default_value: Rc<T>,
}

/// Creates a new context whose lookups fall back to `default_value`.
pub fn create_context<T: 'static>(default_value: T) -> Context<T> {
    Context {
        id: ContextId::new(),
        default_value: Rc::new(default_value),
    }
}

/// Returns the value bound by the nearest enclosing provider of `context`, or its default value.
pub fn use_context<T: Clone + 'static>(sc: &SignalContext, context: &Context<T>) -> T {
    if let Some(scope) = sc.scope() {
        for scope in scope.ancestors() {
            let record = scope.context();
            if let Some(value) = record.get(context.id) {
                if let Some(value) = value.downcast_ref::<T>() {
                    return value.clone();
                }
            }
        }
    }
    T::clone(&context.default_value)
}

impl<T: 'static> Context<T> {
    pub fn id(&self) -> ContextId {
        self.id
    }
    pub fn default_value(&self) -> &T {
        &self.default_value
    }

    /// Binds the value returned by `value` for everything resolved from `children`.
    ///
    /// Every time `value` changes, the binding is replaced and `children` are resolved again in a fresh scope.
    /// The binding replaces any other context value bound by this provider's scope.
    pub fn provider<V: Clone + 'static>(
        &self,
        sc: &mut SignalContext,
        value: impl Fn(&mut SignalContext) -> T + 'static,
        children: Children<V>,
    ) -> Memo<Resolved<V>> {
        let id = self.id;
        MemoBuilder::new(move |sc| {
            let value: Rc<dyn Any> = Rc::new(value(sc));
            if let Some(scope) = sc.scope() {
                scope.set_context(ContextRecord::single(id, value));
            }
            sc.untrack(|sc| resolve_children(sc, &children))
        })
        .build(sc)
    }
}
impl<T: fmt::Debug + 'static> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("default_value", &self.default_value)
            .finish()
    }
}
