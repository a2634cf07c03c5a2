use std::{fmt, future::Future, rc::Rc};

use derive_ex::derive_ex;
use futures::future::{FutureExt, LocalBoxFuture};

use crate::{core::spawn_local, Memo, MemoBuilder, SignalContext, State};


/// A function that renders `P` into a view `V`.
pub type Component<P, V> = Rc<dyn Fn(&mut SignalContext, P) -> V>;

/// Calls `component` with `props` without tracking the values it reads.
///
/// The caller does not re-run when state read by the component body changes;
/// the component is expected to create its own effects for the parts that vary.
pub fn create_component<P, V>(
    sc: &mut SignalContext,
    component: impl FnOnce(&mut SignalContext, P) -> V,
    props: P,
) -> V {
    sc.untrack(|sc| component(sc, props))
}

/// A component whose implementation is loaded asynchronously.
///
/// Created by [`lazy`].
#[derive_ex(Clone, bound())]
pub struct Lazy<P: 'static, V: 'static>(Rc<dyn Fn() -> LocalBoxFuture<'static, Component<P, V>>>);

/// Creates a [`Lazy`] component that calls `load` each time it is rendered.
pub fn lazy<P, V, Fut>(load: impl Fn() -> Fut + 'static) -> Lazy<P, V>
where
    P: 'static,
    V: 'static,
    Fut: Future<Output = Component<P, V>> + 'static,
{
    Lazy(Rc::new(move || load().boxed_local()))
}

impl<P, V> Lazy<P, V>
where
    P: Clone + 'static,
    V: Clone + 'static,
{
    /// Starts loading the component and returns its output.
    ///
    /// The output is `None` until the load completes. The load runs on the executor of the
    /// [`Runtime`](crate::Runtime) and progresses when [`Runtime::run_until_stalled`](crate::Runtime::run_until_stalled) is called.
    pub fn render(&self, sc: &mut SignalContext, props: P) -> Memo<Option<V>> {
        let loaded = State::<Option<Component<P, V>>>::new(None);
        let load = (self.0)();
        let loaded_ = loaded.clone();
        spawn_local(async move { loaded_.set(Some(load.await)) });
        MemoBuilder::new(move |sc| {
            let component = loaded.get(sc)?;
            Some(sc.untrack(|sc| component(sc, props.clone())))
        })
        .build(sc)
    }
}
impl<P, V> fmt::Debug for Lazy<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lazy")
    }
}
