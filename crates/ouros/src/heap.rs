//! The interpreter's object arena.
//!
//! Grounded on the teacher's `heap.rs` in spirit (every mutable or
//! potentially-cyclic value lives behind a stable `HeapId`, never an
//! ordinary pointer, so cycles between class/instance/closure/list are
//! trivial to build and need no cycle collector) but with a different
//! reclamation policy: the teacher ref-counts and frees individual slots;
//! this crate picks the other option spec.md §9 explicitly sanctions ("an
//! arena allocating every heap Value with indices replacing pointers...
//! mass-free on interpreter drop") and never frees a slot early. Every
//! `Interpreter` owns one `Heap` and drops it whole at session end.
//!
//! Slots are `Box<HeapData>` behind a `RwLock<Vec<_>>` so the backing `Vec`
//! can grow (and reallocate its own buffer) without moving the boxed
//! contents — the address handed out by `get` stays valid for the lifetime
//! of the `Heap` itself.

use std::sync::RwLock;

use crate::function::FunctionData;
use crate::types::class::{ClassData, InstanceData};
use crate::types::dict::DictData;
use crate::types::generator::{CoroutineData, GeneratorData};
use crate::types::iterator::IteratorData;
use crate::types::set::SetData;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A bound method: a function (or builtin) plus the receiver it was looked
/// up through. Calling it prepends `receiver` as the first positional
/// argument, per spec.md §4.4's attribute-lookup step 3.
#[derive(Debug, Clone)]
pub struct BoundMethodData {
    pub receiver: Value,
    /// The underlying `Function` or `BuiltinCallable` heap value.
    pub func: Value,
}

pub type BuiltinFn =
    dyn Fn(&crate::evaluator::Evaluator, Vec<Value>, Vec<(String, Value)>) -> crate::exception::RunResult<Value> + Send + Sync;

/// A native (Rust-implemented) callable exposed to SL code, e.g. `len`.
pub struct BuiltinCallableData {
    pub name: &'static str,
    pub func: std::sync::Arc<BuiltinFn>,
}

impl std::fmt::Debug for BuiltinCallableData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinCallableData").field("name", &self.name).finish()
    }
}

/// Non-data descriptor wrapping a function so it behaves like `staticmethod`
/// (no receiver prepended on lookup) rather than an ordinary instance
/// method.
#[derive(Debug, Clone)]
pub struct StaticMethodData(pub Value);

/// Non-data descriptor wrapping a function so attribute lookup binds the
/// *class*, not the instance, as the receiver.
#[derive(Debug, Clone)]
pub struct ClassMethodData(pub Value);

/// A data descriptor pairing a getter with an optional setter/deleter,
/// mirroring the builtin `property`.
#[derive(Debug, Clone)]
pub struct PropertyData {
    pub getter: Option<Value>,
    pub setter: Option<Value>,
    pub deleter: Option<Value>,
}

#[derive(Debug)]
pub enum HeapData {
    List(std::sync::Mutex<Vec<Value>>),
    Dict(std::sync::Mutex<DictData>),
    Set(std::sync::Mutex<SetData>),
    Function(FunctionData),
    BoundMethod(BoundMethodData),
    Class(ClassData),
    Instance(InstanceData),
    Generator(std::sync::Mutex<GeneratorData>),
    Coroutine(std::sync::Mutex<CoroutineData>),
    Builtin(BuiltinCallableData),
    StaticMethod(StaticMethodData),
    ClassMethod(ClassMethodData),
    Property(PropertyData),
    Iterator(std::sync::Mutex<IteratorData>),
}

impl HeapData {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            HeapData::List(_) => "list",
            HeapData::Dict(_) => "dict",
            HeapData::Set(_) => "set",
            HeapData::Function(_) => "function",
            HeapData::BoundMethod(_) => "method",
            HeapData::Class(_) => "type",
            HeapData::Instance(_) => "object",
            HeapData::Generator(_) => "generator",
            HeapData::Coroutine(_) => "coroutine",
            HeapData::Builtin(_) => "builtin_function_or_method",
            HeapData::StaticMethod(_) => "staticmethod",
            HeapData::ClassMethod(_) => "classmethod",
            HeapData::Property(_) => "property",
            HeapData::Iterator(_) => "iterator",
        }
    }
}

/// The interpreter's object arena.
///
/// `get` hands out a reference whose lifetime is tied to `&self` rather than
/// to a lock guard: see its doc comment for why that is sound given the
/// append-only allocation policy. There is no `get_mut`: every `HeapData`
/// variant that needs post-allocation mutation (`List`/`Dict`/`Set`/
/// `Generator`/`Coroutine`/`Iterator`, `Instance::attrs`, `Class::namespace`/
/// `bases`/`mro`) carries its own `Mutex`, so callers mutate through `get`
/// plus the type's own locking methods instead of a raw-pointer cast out of
/// a shared reference.
#[derive(Debug, Default)]
pub struct Heap {
    storage: RwLock<Vec<Box<HeapData>>>,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&self, data: HeapData) -> HeapId {
        let mut storage = self.storage.write().unwrap();
        storage.push(Box::new(data));
        HeapId(storage.len() - 1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.read().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a reference to the data at `id`, valid for the lifetime of
    /// `&self`.
    ///
    /// # Panics
    /// Panics if `id` was not produced by this `Heap` (never happens in
    /// practice: `HeapId`s are never passed between interpreters).
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        let storage = self.storage.read().unwrap();
        let boxed: &Box<HeapData> = storage.get(id.0).expect("valid heap id");
        let ptr: *const HeapData = boxed.as_ref();
        // SAFETY: slots are `Box<HeapData>` inside a `Vec` that only ever
        // grows (no entry is ever removed or replaced), so the box's heap
        // address is stable for the lifetime of `self` even after the read
        // guard above is dropped and the backing `Vec` reallocates.
        unsafe { &*ptr }
    }
}
