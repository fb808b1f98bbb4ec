//! Chained name environments implementing LEGB resolution.
//!
//! The teacher's `namespace.rs` indexes a flat `Vec<Value>` by slot because
//! its bytecode compiler resolves every name to a slot ahead of time. A
//! tree-walking evaluator has no such compile pass, so this reinterprets the
//! same idea — one namespace per frame, a stack of them for nested scopes —
//! as name-keyed maps chained by `Arc` (see `DESIGN.md`, open question on
//! §4.4 Environments). `Arc`/`Mutex` rather than `Rc`/`RefCell` because a
//! generator body runs on a dedicated OS thread (`crate::fiber`) that reads
//! and writes the same enclosing scopes as the thread driving it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::exception::{ExcType, RunResult, runtime_error};
use crate::value::Value;

/// One level of the LEGB chain: a function call, a module, or a
/// comprehension's implicit function.
#[derive(Debug)]
pub struct Scope {
    vars: Mutex<HashMap<Arc<str>, Value>>,
    parent: Option<Env>,
    /// True only for the module-level scope; `global` statements bind here.
    is_global: bool,
}

/// Handle to a [`Scope`]; cheap to clone, shared by every closure that
/// captured this frame.
pub type Env = Arc<Scope>;

impl Scope {
    pub fn new_global() -> Env {
        Arc::new(Scope { vars: Mutex::new(HashMap::new()), parent: None, is_global: true })
    }

    pub fn new_child(parent: &Env) -> Env {
        Arc::new(Scope { vars: Mutex::new(HashMap::new()), parent: Some(Arc::clone(parent)), is_global: false })
    }

    /// Declares a binding in *this* frame directly (used for parameter
    /// binding and `global`/`nonlocal`-redirected assignment).
    pub fn bind(&self, name: Arc<str>, value: Value) {
        self.vars.lock().unwrap().insert(name, value);
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.vars.lock().unwrap().contains_key(name)
    }

    /// Walks Local -> Enclosing -> Global, returning the first binding found.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.vars.lock().unwrap().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Assigns to the nearest frame in the chain that already binds `name`,
    /// falling back to binding it fresh in `self` (ordinary local write).
    pub fn assign_local(&self, name: Arc<str>, value: Value) {
        self.vars.lock().unwrap().insert(name, value);
    }

    /// Finds the module-level (global) scope at the root of this chain.
    pub fn global_scope(self: &Env) -> Env {
        let mut cur = Arc::clone(self);
        while !cur.is_global {
            let Some(parent) = cur.parent.clone() else { break };
            cur = parent;
        }
        cur
    }

    /// Implements `nonlocal X`: finds the nearest *enclosing function* scope
    /// (skipping `self`, never reaching the global scope) that already binds
    /// `name`. Returns `None` if no such scope exists, which is a
    /// `SyntaxError` at the call site per spec.md §4.4.
    pub fn find_nonlocal_target(self: &Env, name: &str) -> Option<Env> {
        let mut cur = self.parent.clone();
        while let Some(scope) = cur {
            if scope.is_global {
                return None;
            }
            if scope.has_local(name) {
                return Some(scope);
            }
            cur = scope.parent.clone();
        }
        None
    }

    pub fn delete(&self, name: &str) -> RunResult<()> {
        if self.vars.lock().unwrap().remove(name).is_none() {
            return Err(runtime_error(ExcType::NameError, format!("name '{name}' is not defined")));
        }
        Ok(())
    }

    /// Copies every binding made directly in this frame, ignoring the parent
    /// chain. Used to turn a class body's scope into the new class's
    /// namespace once the body has finished executing.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Arc<str>, Value)> {
        self.vars.lock().unwrap().iter().map(|(k, v)| (Arc::clone(k), v.clone())).collect()
    }
}

/// Built-in names, consulted only after the whole LEGB chain misses.
#[derive(Debug, Default)]
pub struct Builtins {
    entries: HashMap<&'static str, Value>,
}

impl Builtins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &'static str, value: Value) {
        self.entries.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_scope_sees_parent_binding() {
        let global = Scope::new_global();
        global.bind(Arc::from("x"), Value::Int(1));
        let child = Scope::new_child(&global);
        assert_eq!(child.lookup("x"), Some(Value::Int(1)));
    }

    #[test]
    fn local_assignment_shadows_without_mutating_parent() {
        let global = Scope::new_global();
        global.bind(Arc::from("x"), Value::Int(1));
        let child = Scope::new_child(&global);
        child.assign_local(Arc::from("x"), Value::Int(2));
        assert_eq!(child.lookup("x"), Some(Value::Int(2)));
        assert_eq!(global.lookup("x"), Some(Value::Int(1)));
    }
}
