//! Fine-grained reactive ownership tree for declarative user interfaces.
//!
//! Values live in [`State`]s and are read through a [`SignalContext`], which records the reads as
//! dependencies of the running [`effect`] or [`Signal`]. Every effect owns a [`Scope`]; disposing
//! a scope runs the disposers registered in it and stops the effects created in it.
//!
//! On top of that substrate the crate provides [`memo`], [`create_selector`], [`Context`],
//! [`resolve_children`] and the keyed list reconciler [`map`].
//!
//! ```
//! use sigtree::{effect, Runtime, State};
//!
//! let mut rt = Runtime::new();
//! let s = State::new(1);
//! let s0 = s.clone();
//! let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
//! let log0 = log.clone();
//! let dispose = sigtree::root(&mut rt.sc(), |sc, dispose| {
//!     effect(sc, move |sc, _: Option<()>| log0.borrow_mut().push(s0.get(sc)));
//!     dispose
//! });
//! s.set(2);
//! dispose.dispose();
//! s.set(3);
//! assert_eq!(*log.borrow(), vec![1, 2]);
//! ```

mod children;
mod collections;
mod component;
mod context;
mod core;
mod effect_fn;
mod scope;
mod selector;
mod signal;
mod state;

#[cfg(doctest)]
mod tests_readme;

pub use crate::core::{batch, spawn_local, CyclicError, Runtime, SignalContext};
pub use children::*;
pub use collections::*;
pub use component::*;
pub use context::{create_context, use_context, Context, ContextId};
pub use effect_fn::*;
pub use scope::*;
pub use selector::*;
pub use signal::*;
pub use state::*;
