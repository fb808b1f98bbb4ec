//! Class objects, instances, and C3 linearization.
//!
//! `compute_c3_mro` is grounded directly on the teacher's
//! `types::class::compute_c3_mro`: the same "good head" merge loop over base
//! MROs plus an implicit `(object,)` base when a class declares none. The
//! surrounding `ClassData`/`InstanceData` shapes are new — the teacher keys
//! attribute storage by `StringId` slot because its compiler pre-resolves
//! attribute names; this crate keys by `Arc<str>` directly, consistent with
//! [`crate::namespace`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::exception::{ExcType, RunResult, runtime_error};
use crate::heap::{Heap, HeapData, HeapId};
use crate::value::Value;

/// An upper bound on MRO computation depth, guarding against pathological
/// or cyclic base lists rather than any real program's class hierarchy.
const MAX_INHERITANCE_DEPTH: usize = 256;

#[derive(Debug)]
pub struct ClassData {
    pub name: Arc<str>,
    bases: Mutex<Vec<HeapId>>,
    /// `self` first, then ancestors in resolution order, `object` last.
    mro: Mutex<Vec<HeapId>>,
    pub namespace: Mutex<HashMap<Arc<str>, Value>>,
}

impl ClassData {
    pub fn new(name: Arc<str>, bases: Vec<HeapId>) -> Self {
        ClassData { name, bases: Mutex::new(bases), mro: Mutex::new(Vec::new()), namespace: Mutex::new(HashMap::new()) }
    }

    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.namespace.lock().unwrap().get(name).cloned()
    }

    pub fn set_own(&self, name: Arc<str>, value: Value) {
        self.namespace.lock().unwrap().insert(name, value);
    }

    #[must_use]
    pub fn namespace_snapshot(&self) -> Vec<(Arc<str>, Value)> {
        self.namespace.lock().unwrap().iter().map(|(k, v)| (Arc::clone(k), v.clone())).collect()
    }

    #[must_use]
    pub fn bases_snapshot(&self) -> Vec<HeapId> {
        self.bases.lock().unwrap().clone()
    }

    /// Set once, right after the class is allocated and its bases are known;
    /// never mutated again afterwards.
    pub fn set_bases(&self, bases: Vec<HeapId>) {
        *self.bases.lock().unwrap() = bases;
    }

    #[must_use]
    pub fn mro_snapshot(&self) -> Vec<HeapId> {
        self.mro.lock().unwrap().clone()
    }

    #[must_use]
    pub fn mro_len(&self) -> usize {
        self.mro.lock().unwrap().len()
    }

    #[must_use]
    pub fn mro_contains(&self, id: HeapId) -> bool {
        self.mro.lock().unwrap().contains(&id)
    }

    /// Set once, right after `compute_c3_mro` resolves it for a freshly
    /// allocated class; never mutated again afterwards.
    pub fn set_mro(&self, mro: Vec<HeapId>) {
        *self.mro.lock().unwrap() = mro;
    }
}

#[derive(Debug)]
pub struct InstanceData {
    pub class: HeapId,
    pub attrs: Mutex<HashMap<Arc<str>, Value>>,
}

impl InstanceData {
    pub fn new(class: HeapId) -> Self {
        InstanceData { class, attrs: Mutex::new(HashMap::new()) }
    }

    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.attrs.lock().unwrap().get(name).cloned()
    }

    pub fn set_own(&self, name: Arc<str>, value: Value) {
        self.attrs.lock().unwrap().insert(name, value);
    }

    pub fn del_own(&self, name: &str) -> bool {
        self.attrs.lock().unwrap().remove(name).is_some()
    }

    #[must_use]
    pub fn attrs_snapshot(&self) -> Vec<(Arc<str>, Value)> {
        self.attrs.lock().unwrap().iter().map(|(k, v)| (Arc::clone(k), v.clone())).collect()
    }
}

/// Looks up `name` along `mro`, returning the defining class and the value.
/// Used for both ordinary attribute lookup and `super()` (which starts the
/// scan partway through the MRO instead of at the front).
pub fn mro_lookup(heap: &Heap, mro: &[HeapId], name: &str) -> Option<(HeapId, Value)> {
    for &class_id in mro {
        if let HeapData::Class(class) = heap.get(class_id) {
            if let Some(v) = class.get_own(name) {
                return Some((class_id, v));
            }
        }
    }
    None
}

/// Computes the C3 linearization of a class from its direct bases.
///
/// `self_id` is the `HeapId` the new class will be allocated at (or already
/// occupies); it is prepended to the result and used only for the
/// self-inheritance cycle check. An empty `bases` list is treated as
/// `(object,)`, matching the implicit base every class gets when it
/// declares none.
pub fn compute_c3_mro(self_id: HeapId, bases: &[HeapId], object_class: HeapId, heap: &Heap) -> RunResult<Vec<HeapId>> {
    if bases.contains(&self_id) {
        return Err(runtime_error(ExcType::TypeError, "a class cannot inherit from itself"));
    }

    let effective_bases: Vec<HeapId> =
        if bases.is_empty() && self_id != object_class { vec![object_class] } else { bases.to_vec() };

    let mut sequences: Vec<Vec<HeapId>> = Vec::new();
    for &base in &effective_bases {
        let HeapData::Class(base_class) = heap.get(base) else {
            return Err(runtime_error(ExcType::TypeError, "base must be a class"));
        };
        if base_class.mro_len() > MAX_INHERITANCE_DEPTH {
            return Err(runtime_error(ExcType::RecursionError, "inheritance depth exceeded"));
        }
        sequences.push(base_class.mro_snapshot());
    }
    sequences.push(effective_bases.clone());

    let mut result = vec![self_id];
    loop {
        sequences.retain(|seq| !seq.is_empty());
        if sequences.is_empty() {
            break;
        }
        let mut chosen = None;
        for candidate_seq in &sequences {
            let head = candidate_seq[0];
            let appears_in_tail = sequences.iter().any(|seq| seq[1..].contains(&head));
            if !appears_in_tail {
                chosen = Some(head);
                break;
            }
        }
        let Some(head) = chosen else {
            return Err(runtime_error(ExcType::TypeError, "cannot create a consistent method resolution order (MRO)"));
        };
        result.push(head);
        for seq in &mut sequences {
            seq.retain(|&id| id != head);
        }
        if result.len() > MAX_INHERITANCE_DEPTH {
            return Err(runtime_error(ExcType::RecursionError, "inheritance depth exceeded"));
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_class(heap: &Heap, name: &str) -> HeapId {
        heap.alloc(HeapData::Class(ClassData::new(Arc::from(name), Vec::new())))
    }

    fn link(heap: &Heap, id: HeapId, bases: Vec<HeapId>, object_class: HeapId) {
        let mro = compute_c3_mro(id, &bases, object_class, heap).unwrap();
        if let HeapData::Class(class) = heap.get(id) {
            class.set_bases(bases);
            class.set_mro(mro);
        }
    }

    #[test]
    fn diamond_inheritance_resolves_dbca_order() {
        let heap = Heap::new();
        let object_class = make_class(&heap, "object");
        link(&heap, object_class, vec![], object_class);
        let a = make_class(&heap, "A");
        link(&heap, a, vec![object_class], object_class);
        let b = make_class(&heap, "B");
        link(&heap, b, vec![a], object_class);
        let c = make_class(&heap, "C");
        link(&heap, c, vec![a], object_class);
        let d = make_class(&heap, "D");
        link(&heap, d, vec![b, c], object_class);

        let HeapData::Class(d_class) = heap.get(d) else { unreachable!() };
        assert_eq!(d_class.mro_snapshot(), vec![d, b, c, a, object_class]);
    }

    #[test]
    fn class_with_no_bases_gets_implicit_object_base() {
        let heap = Heap::new();
        let object_class = make_class(&heap, "object");
        link(&heap, object_class, vec![], object_class);
        let a = make_class(&heap, "A");
        link(&heap, a, vec![], object_class);
        let HeapData::Class(a_class) = heap.get(a) else { unreachable!() };
        assert_eq!(a_class.mro_snapshot(), vec![a, object_class]);
    }
}
