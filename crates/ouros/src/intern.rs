//! String interning and small-integer identity caching.
//!
//! Grounded on the teacher's `intern.rs` in spirit (a table mapping literal
//! text to a stable handle so repeated literals don't re-allocate) but
//! scaled down to what this interpreter's `is`-identity contract (spec.md
//! §9) actually needs: interned strings share an `Arc<str>` so `is` can be a
//! pointer comparison, and small ints in `-5..=256` are cached the way
//! CPython caches them. `Arc` (not `Rc`) because a generator's suspended
//! frame runs on its own OS thread (see `crate::fiber`) and can hold
//! interned strings that outlive the call that created them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const SMALL_INT_LOW: i64 = -5;
const SMALL_INT_HIGH: i64 = 256;

/// Per-interpreter table of interned strings, so two occurrences of the same
/// source literal (or two `sys.intern`-style identical identifiers) produce
/// pointer-equal `Arc<str>` handles.
#[derive(Debug, Default)]
pub struct Interner {
    strings: Mutex<HashMap<Arc<str>, Arc<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, s: &str) -> Arc<str> {
        let mut table = self.strings.lock().unwrap();
        if let Some(existing) = table.get(s) {
            return Arc::clone(existing);
        }
        let rc: Arc<str> = Arc::from(s);
        table.insert(Arc::clone(&rc), Arc::clone(&rc));
        rc
    }
}

/// Returns true if `value` falls in the small-integer cache range, meaning
/// two `Value::Int` of the same magnitude are expected to be `is`-identical.
/// The evaluator does not need a handle table for these: plain `i64`
/// equality already gives the right `is` answer for inline integers, this
/// just documents which range mirrors CPython's cached singletons.
#[must_use]
pub fn is_small_int_cached(value: i64) -> bool {
    (SMALL_INT_LOW..=SMALL_INT_HIGH).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_strings_share_allocation() {
        let interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
