//! Runtime value representation.
//!
//! Grounded on the shape of the teacher's `value.rs` (a tagged enum mixing
//! inline immediates with heap references) but with a different split
//! between "inline" and "heap": the teacher puts every non-scalar behind
//! `HeapId` because its arena also backs its refcounting GC. This crate has
//! no refcounting (see `DESIGN.md`, cyclic-ownership open question), so
//! naturally-immutable types (`Str`, `Bytes`, `Tuple`, `FrozenSet`, `Range`,
//! arbitrary-precision `Int`) are stored as `Arc<_>` directly in `Value` —
//! cheap to clone, and `Arc::ptr_eq` gives `is`-identity for free. Only
//! genuinely mutable or cyclic data (`List`, `Dict`, `Set`, `Function`,
//! `Class`, `Instance`, `Generator`, `Coroutine`) goes through the
//! [`crate::heap`] arena.
//!
//! `Value` uses `Arc`/`Mutex` rather than `Rc`/`RefCell` because generators
//! (§4.6) are driven on a dedicated OS thread (see [`crate::fiber`]) that
//! shares the same heap and environments as the thread that resumes them;
//! everything reachable from a `Value` must therefore be `Send`.

use std::sync::Arc;

use num_bigint::BigInt;

use crate::heap::HeapId;

/// Primary runtime value type.
///
/// `Clone` is cheap for every variant: inline scalars copy, everything else
/// is a reference count bump or a plain index copy.
///
/// The derived `PartialEq` is structural Rust equality, used for internal
/// bookkeeping (tests, dict-key probing before falling back to `__eq__`). It
/// is deliberately not Python's `==` — e.g. `Int(1) != Float(1.0)` here —
/// see [`crate::evaluator::values_equal`] for the cross-type language rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// Integers outside `i64` range. Never constructed for values that fit
    /// in `Int`; `Value::eq`/`py_hash` normalize across the two so `1 ==
    /// BigInt::from(1)` style comparisons still hold.
    BigInt(Arc<BigInt>),
    Float(f64),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    Tuple(Arc<[Value]>),
    /// An immutable `(start, stop, step)` triple.
    Range(Arc<(i64, i64, i64)>),
    FrozenSet(Arc<crate::types::set::SetData>),
    /// Returned by binary dunder methods to request the reflected operation.
    NotImplemented,
    Ellipsis,
    /// Everything mutable or potentially cyclic lives in the arena.
    Ref(HeapId),
}

impl Value {
    pub fn bigint(v: BigInt) -> Self {
        match v.to_i64_checked() {
            Some(i) => Value::Int(i),
            None => Value::BigInt(Arc::new(v)),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::BigInt(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Tuple(_) => "tuple",
            Value::Range(_) => "range",
            Value::FrozenSet(_) => "frozenset",
            Value::NotImplemented => "NotImplementedType",
            Value::Ellipsis => "ellipsis",
            Value::Ref(_) => "object",
        }
    }
}

/// Conversion helper used throughout the lexer/literal-evaluation path:
/// `BigInt::to_i64` that additionally confirms the round trip is exact.
trait ToI64Checked {
    fn to_i64_checked(&self) -> Option<i64>;
}

impl ToI64Checked for BigInt {
    fn to_i64_checked(&self) -> Option<i64> {
        use num_traits::ToPrimitive;
        self.to_i64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigint_promotion_demotes_small_values() {
        assert!(matches!(Value::bigint(BigInt::from(5)), Value::Int(5)));
    }

    #[test]
    fn bigint_promotion_keeps_large_values_boxed() {
        let huge = BigInt::from(i64::MAX) + BigInt::from(1);
        assert!(matches!(Value::bigint(huge), Value::BigInt(_)));
    }
}
