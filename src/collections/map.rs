use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    hash::Hash,
    iter::Zip,
    mem::take,
    rc::Rc,
    vec,
};

use derive_ex::derive_ex;

use crate::{cleanup, root, Dispose, SignalContext};


/// Maps each item of a reactive list, reusing the mapped values of items that are still present.
///
/// Created by [`map`].
#[derive_ex(Clone, bound())]
pub struct Mapped<T: 'static, U: 'static>(Rc<MappedNode<T, U>>);

struct MappedNode<T, U> {
    list: Box<dyn Fn(&mut SignalContext) -> Vec<T>>,
    map_fn: Box<dyn Fn(&mut SignalContext, &T, usize) -> U>,
    state: RefCell<MapState<T, U>>,
}

/// `items`, `mapped` and `disposers` always have the same length.
struct MapState<T, U> {
    items: Vec<T>,
    mapped: Vec<U>,
    disposers: Vec<Dispose>,
}

/// Creates a [`Mapped`] list from the reactive `list` and the per-item `map_fn`.
///
/// `map_fn` runs in a scope of its own for each item; the scope is disposed when the item leaves
/// the list, and all remaining scopes are disposed when the current scope is disposed.
/// Items are matched by `Eq` and `Hash`; duplicates are matched in order of appearance.
pub fn map<T, U>(
    sc: &mut SignalContext,
    list: impl Fn(&mut SignalContext) -> Vec<T> + 'static,
    map_fn: impl Fn(&mut SignalContext, &T, usize) -> U + 'static,
) -> Mapped<T, U>
where
    T: Eq + Hash + 'static,
    U: Clone + 'static,
{
    let node = Rc::new(MappedNode {
        list: Box::new(list),
        map_fn: Box::new(map_fn),
        state: RefCell::new(MapState::new()),
    });
    let this = node.clone();
    cleanup(sc, move || this.dispose_all());
    Mapped(node)
}

impl<T, U> Mapped<T, U>
where
    T: Eq + Hash + 'static,
    U: Clone + 'static,
{
    /// Reads the source list and returns the mapped values, updated to match it.
    ///
    /// Only the source list is tracked; `map_fn` runs untracked.
    /// If `map_fn` panics, the entries mapped so far are kept and the rest are mapped by the next call.
    pub fn get(&self, sc: &mut SignalContext) -> Vec<U> {
        let items = (self.0.list)(sc);
        sc.untrack(|sc| {
            let mut state = self.0.state.borrow_mut();
            state.reconcile(sc, items, &*self.0.map_fn);
            state.mapped.clone()
        })
    }

    /// Number of items whose scopes are alive.
    pub fn len(&self) -> usize {
        self.0.state.borrow().disposers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
impl<T, U> MappedNode<T, U> {
    fn dispose_all(&self) {
        let disposers = {
            let mut state = self.state.borrow_mut();
            state.items.clear();
            state.mapped.clear();
            take(&mut state.disposers)
        };
        for dispose in disposers {
            dispose.dispose();
        }
    }
}
impl<T: fmt::Debug, U: fmt::Debug> fmt::Debug for Mapped<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Mapped")
                .field("items", &state.items)
                .field("mapped", &state.mapped)
                .finish(),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}

type MapFn<T, U> = dyn Fn(&mut SignalContext, &T, usize) -> U;
type Slot<U> = Option<(U, Dispose)>;

fn map_item<T, U>(
    sc: &mut SignalContext,
    map_fn: &MapFn<T, U>,
    item: &T,
    index: usize,
) -> (U, Dispose) {
    root(sc, |sc, dispose| (map_fn(sc, item, index), dispose))
}

impl<T, U> MapState<T, U> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            mapped: Vec::new(),
            disposers: Vec::new(),
        }
    }
    fn push(&mut self, item: T, value: U, dispose: Dispose) {
        self.items.push(item);
        self.mapped.push(value);
        self.disposers.push(dispose);
    }
    fn split_off(&mut self, at: usize) -> Self {
        Self {
            items: self.items.split_off(at),
            mapped: self.mapped.split_off(at),
            disposers: self.disposers.split_off(at),
        }
    }
    fn append(&mut self, other: &mut Self) {
        self.items.append(&mut other.items);
        self.mapped.append(&mut other.mapped);
        self.disposers.append(&mut other.disposers);
    }
}

impl<T: Eq + Hash, U> MapState<T, U> {
    fn reconcile(&mut self, sc: &mut SignalContext, new_items: Vec<T>, map_fn: &MapFn<T, U>) {
        let len = self.items.len();
        let new_len = new_items.len();

        if new_len == 0 {
            if len != 0 {
                tracing::trace!(old_len = len, disposed = len, "mapped list cleared");
                self.items.clear();
                self.mapped.clear();
                for dispose in take(&mut self.disposers) {
                    dispose.dispose();
                }
            }
            return;
        }
        if len == 0 {
            let slots = (0..new_len).map(|_| None).collect();
            let created = Fill::new(self, new_items, slots, MapState::new()).run(sc, map_fn);
            tracing::trace!(new_len, created, "mapped list filled");
            return;
        }

        let mut start = 0;
        while start < len.min(new_len) && self.items[start] == new_items[start] {
            start += 1;
        }
        // `end` and `new_end` are exclusive.
        let mut end = len;
        let mut new_end = new_len;
        while end > start && new_end > start && self.items[end - 1] == new_items[new_end - 1] {
            end -= 1;
            new_end -= 1;
        }

        if start == new_end {
            tracing::trace!(old_len = len, new_len, disposed = end - start, "mapped list truncated");
            self.mapped.drain(start..end);
            let removed: Vec<Dispose> = self.disposers.drain(start..end).collect();
            self.items = new_items;
            for dispose in removed.into_iter().rev() {
                dispose.dispose();
            }
            return;
        }

        let suffix = self.split_off(end);
        let old = self.split_off(start);
        let mut new_items = new_items;
        new_items.truncate(new_end);
        let middle = new_items.split_off(start);

        if start == end {
            let slots = (0..middle.len()).map(|_| None).collect();
            let created = Fill::new(self, middle, slots, suffix).run(sc, map_fn);
            tracing::trace!(old_len = len, new_len, created, "mapped list extended");
            return;
        }

        // For each item of the new middle, its first index, and for each index, the next index of the same item.
        let mut new_indices: HashMap<&T, usize> = HashMap::new();
        let mut new_indices_next: Vec<Option<usize>> = vec![None; middle.len()];
        for (j, item) in middle.iter().enumerate().rev() {
            new_indices_next[j] = new_indices.insert(item, j);
        }

        let mut slots: Vec<Slot<U>> = (0..middle.len()).map(|_| None).collect();
        let mut removed = Vec::new();
        let MapState {
            items: old_items,
            mapped: old_mapped,
            disposers: old_disposers,
        } = old;
        for ((item, value), dispose) in old_items.iter().zip(old_mapped).zip(old_disposers) {
            match new_indices.get(item).copied() {
                Some(j) => {
                    slots[j] = Some((value, dispose));
                    match new_indices_next[j] {
                        Some(next) => new_indices.insert(item, next),
                        None => new_indices.remove(item),
                    };
                }
                None => removed.push(dispose),
            }
        }
        drop(new_indices);

        let disposed = removed.len();
        let fill = Fill::new(self, middle, slots, suffix);
        for dispose in removed {
            dispose.dispose();
        }
        let created = fill.run(sc, map_fn);
        tracing::trace!(old_len = len, new_len, created, disposed, "mapped list reordered");
    }
}

/// Appends the entries of a new middle region, followed by the matched suffix.
///
/// Entries already placed are kept in the state even if `map_fn` panics,
/// so the state always holds every live entry with its item.
struct Fill<'a, T, U> {
    state: &'a mut MapState<T, U>,
    pending: Zip<vec::IntoIter<T>, vec::IntoIter<Slot<U>>>,
    suffix: MapState<T, U>,
}

impl<'a, T, U> Fill<'a, T, U> {
    fn new(
        state: &'a mut MapState<T, U>,
        items: Vec<T>,
        slots: Vec<Slot<U>>,
        suffix: MapState<T, U>,
    ) -> Self {
        Self {
            state,
            pending: items.into_iter().zip(slots),
            suffix,
        }
    }

    /// Maps the items whose slot is empty and returns how many were created.
    fn run(mut self, sc: &mut SignalContext, map_fn: &MapFn<T, U>) -> usize {
        let mut created = 0;
        while let Some((item, slot)) = self.pending.next() {
            let (value, dispose) = match slot {
                Some(entry) => entry,
                None => {
                    created += 1;
                    map_item(sc, map_fn, &item, self.state.items.len())
                }
            };
            self.state.push(item, value, dispose);
        }
        created
    }
}
impl<T, U> Drop for Fill<'_, T, U> {
    fn drop(&mut self) {
        for (item, slot) in &mut self.pending {
            if let Some((value, dispose)) = slot {
                self.state.push(item, value, dispose);
            }
        }
        self.state.append(&mut self.suffix);
    }
}
