//! Backing storage for `dict`, insertion-ordered like CPython 3.7+.
//!
//! Grounded on the teacher's `types::dict::Dict` (hash-indexed dense entry
//! vector) with the same "eq is a callback, not `PartialEq`" shape as
//! [`crate::types::set::SetData`] — dict keys need the full `==` protocol,
//! which lives in `crate::evaluator`.

use std::collections::HashMap;

use crate::value::Value;

#[derive(Debug, Clone)]
struct DictEntry {
    hash: u64,
    key: Value,
    value: Value,
}

#[derive(Debug, Clone, Default)]
pub struct DictData {
    entries: Vec<DictEntry>,
    index: HashMap<u64, Vec<usize>>,
}

impl DictData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find_index(&self, hash: u64, key: &Value, eq: &dyn Fn(&Value, &Value) -> bool) -> Option<usize> {
        self.index.get(&hash)?.iter().copied().find(|&i| eq(&self.entries[i].key, key))
    }

    pub fn get(&self, hash: u64, key: &Value, eq: &dyn Fn(&Value, &Value) -> bool) -> Option<&Value> {
        self.find_index(hash, key, eq).map(|i| &self.entries[i].value)
    }

    pub fn contains_key(&self, hash: u64, key: &Value, eq: &dyn Fn(&Value, &Value) -> bool) -> bool {
        self.find_index(hash, key, eq).is_some()
    }

    /// Inserts or overwrites `key -> value`. Following CPython, overwriting
    /// an existing key updates the value in place without moving its
    /// position in iteration order.
    pub fn insert(&mut self, hash: u64, key: Value, value: Value, eq: &dyn Fn(&Value, &Value) -> bool) -> Option<Value> {
        if let Some(i) = self.find_index(hash, &key, eq) {
            return Some(std::mem::replace(&mut self.entries[i].value, value));
        }
        let idx = self.entries.len();
        self.entries.push(DictEntry { hash, key, value });
        self.index.entry(hash).or_default().push(idx);
        None
    }

    pub fn remove(&mut self, hash: u64, key: &Value, eq: &dyn Fn(&Value, &Value) -> bool) -> Option<Value> {
        let idx = self.find_index(hash, key, eq)?;
        let bucket = self.index.get_mut(&hash).unwrap();
        let pos = bucket.iter().position(|&i| i == idx).unwrap();
        bucket.remove(pos);
        let removed = self.entries.remove(idx);
        for bucket in self.index.values_mut() {
            for slot in bucket.iter_mut() {
                if *slot > idx {
                    *slot -= 1;
                }
            }
        }
        Some(removed.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|e| &e.key)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|e| &e.value)
    }

    pub fn items(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|e| (&e.key, &e.value))
    }

    /// Removes and returns the last-inserted `(key, value)` pair, per
    /// `dict.popitem()`.
    pub fn pop_last(&mut self) -> Option<(Value, Value)> {
        let entry = self.entries.pop()?;
        let hash = entry.hash;
        let bucket = self.index.get_mut(&hash).unwrap();
        let idx = self.entries.len();
        bucket.retain(|&i| i != idx);
        Some((entry.key, entry.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(a: &Value, b: &Value) -> bool {
        a == b
    }

    #[test]
    fn insert_overwrites_value_in_place_without_reordering() {
        let mut dict = DictData::new();
        dict.insert(1, Value::Str("a".into()), Value::Int(1), &eq);
        dict.insert(2, Value::Str("b".into()), Value::Int(2), &eq);
        dict.insert(1, Value::Str("a".into()), Value::Int(99), &eq);
        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec![Value::Str("a".into()), Value::Str("b".into())]);
        assert_eq!(dict.get(1, &Value::Str("a".into()), &eq), Some(&Value::Int(99)));
    }

    #[test]
    fn remove_shifts_later_indices() {
        let mut dict = DictData::new();
        dict.insert(1, Value::Int(1), Value::Str("one".into()), &eq);
        dict.insert(2, Value::Int(2), Value::Str("two".into()), &eq);
        dict.remove(1, &Value::Int(1), &eq);
        assert_eq!(dict.get(2, &Value::Int(2), &eq), Some(&Value::Str("two".into())));
    }
}
