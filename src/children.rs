use std::{fmt, rc::Rc};

use crate::{Memo, MemoBuilder, SignalContext};

#[cfg(test)]
mod tests;

/// A tree of children as written by the user.
#[derive(Clone)]
pub enum Children<V: 'static> {
    /// A static child.
    Value(V),
    /// A child recomputed whenever the values it reads change.
    Dynamic(Rc<dyn Fn(&mut SignalContext) -> V>),
    /// A sequence of children, flattened into its parent when resolved.
    List(Vec<Children<V>>),
}

impl<V: 'static> Children<V> {
    pub fn dynamic(f: impl Fn(&mut SignalContext) -> V + 'static) -> Self {
        Self::Dynamic(Rc::new(f))
    }
}
impl<V> From<Vec<Children<V>>> for Children<V> {
    fn from(children: Vec<Children<V>>) -> Self {
        Self::List(children)
    }
}
impl<V> FromIterator<Children<V>> for Children<V> {
    fn from_iter<I: IntoIterator<Item = Children<V>>>(iter: I) -> Self {
        Self::List(iter.into_iter().collect())
    }
}
impl<V: fmt::Debug> fmt::Debug for Children<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Dynamic(_) => write!(f, "Dynamic(..)"),
            Self::List(children) => f.debug_tuple("List").field(children).finish(),
        }
    }
}

/// A resolved child: either a static value or a reactive accessor.
#[derive(Clone)]
pub enum Child<V: 'static> {
    Value(V),
    Dynamic(Memo<V>),
}

impl<V: Clone + 'static> Child<V> {
    /// Reads the current value, tracking it if the child is dynamic.
    pub fn get(&self, sc: &mut SignalContext) -> V {
        match self {
            Self::Value(value) => value.clone(),
            Self::Dynamic(memo) => memo.get(sc),
        }
    }
}
impl<V: fmt::Debug> fmt::Debug for Child<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Dynamic(memo) => f.debug_tuple("Dynamic").field(memo).finish(),
        }
    }
}

/// Result of [`resolve_children`].
///
/// A list never contains nested lists.
#[derive(Clone)]
pub enum Resolved<V: 'static> {
    Single(Child<V>),
    List(Vec<Child<V>>),
}

impl<V: 'static> Resolved<V> {
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::List(children) => children.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn into_vec(self) -> Vec<Child<V>> {
        match self {
            Self::Single(child) => vec![child],
            Self::List(children) => children,
        }
    }

    /// Reads the current values of all children in order.
    pub fn values(&self, sc: &mut SignalContext) -> Vec<V>
    where
        V: Clone,
    {
        match self {
            Self::Single(child) => vec![child.get(sc)],
            Self::List(children) => children.iter().map(|child| child.get(sc)).collect(),
        }
    }
}
impl<V: fmt::Debug> fmt::Debug for Resolved<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(child) => fmt::Debug::fmt(child, f),
            Self::List(children) => f.debug_list().entries(children).finish(),
        }
    }
}

/// Normalizes `children` into a flat list of static values and reactive accessors.
///
/// Each dynamic child gets its own effect owned by the current scope.
pub fn resolve_children<V: Clone + 'static>(
    sc: &mut SignalContext,
    children: &Children<V>,
) -> Resolved<V> {
    match children {
        Children::Value(value) => Resolved::Single(Child::Value(value.clone())),
        Children::Dynamic(f) => {
            let f = f.clone();
            Resolved::Single(Child::Dynamic(MemoBuilder::new(move |sc| f(sc)).build(sc)))
        }
        Children::List(children) => {
            let mut results = Vec::new();
            for child in children {
                match resolve_children(sc, child) {
                    Resolved::Single(child) => results.push(child),
                    Resolved::List(list) => results.extend(list),
                }
            }
            Resolved::List(results)
        }
    }
}
