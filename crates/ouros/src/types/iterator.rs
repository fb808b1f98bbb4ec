//! Cursor state for built-in iterator objects (spec.md §4.5/§3: "iterator
//! wrappers").
//!
//! Grounded on the teacher's `types::iter::Iterator` shape (a tagged cursor
//! over each container kind) but trimmed to the container/adapter set
//! spec.md's built-ins list actually produces (`iter`, `enumerate`, `zip`,
//! `map`, `filter`, `reversed`, plus the implicit iterators `for` obtains
//! from list/tuple/str/bytes/range/dict/set). User-defined iterables never
//! need this: an `Instance` whose class defines `__iter__`/`__next__` is its
//! own iterator, driven entirely through ordinary attribute/call dispatch in
//! [`crate::evaluator`].

use std::sync::Arc;

use crate::heap::HeapId;
use crate::value::Value;

#[derive(Debug)]
pub enum IteratorData {
    List { target: HeapId, index: usize },
    /// Snapshot taken at `iter()` time — tuples, strings, and already-built
    /// dict/set element lists don't need live re-reads, and spec.md §9
    /// explicitly defines dict iteration as a keys-at-iter-start snapshot.
    Snapshot { items: Vec<Value>, index: usize },
    Range { current: i64, stop: i64, step: i64 },
    Enumerate { inner: Value, index: i64 },
    Zip { inners: Vec<Value> },
    Map { inner: Value, func: Value },
    Filter { inner: Value, func: Value },
    /// `iter(callable, sentinel)` form.
    CallableSentinel { callable: Value, sentinel: Value },
}

impl IteratorData {
    #[must_use]
    pub fn from_tuple(items: &Arc<[Value]>) -> Self {
        IteratorData::Snapshot { items: items.to_vec(), index: 0 }
    }

    #[must_use]
    pub fn from_vec(items: Vec<Value>) -> Self {
        IteratorData::Snapshot { items, index: 0 }
    }

    #[must_use]
    pub fn from_range(start: i64, stop: i64, step: i64) -> Self {
        IteratorData::Range { current: start, stop, step }
    }
}
