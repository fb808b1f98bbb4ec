//! The embedding API (spec.md §6): what a host crate sees.
//!
//! `Interpreter` bundles lex → parse → evaluate behind one entry point, the
//! way the teacher's `run.rs::Runner` wraps the same pipeline, but trimmed
//! to synchronous single-source-string execution — no snapshotting, no
//! forking, no incremental REPL compile (those stay behind in `run.rs`
//! until the trim pass). `Object` is a shrunk copy of the teacher's
//! `object.rs::Object`: the same host-safe, serde-able shape, pruned to the
//! value model spec.md §3 actually defines (no `Proxy`, `Dataclass`,
//! `NamedTuple`, `Path` — those belong to stdlib modules this crate doesn't
//! implement).

use std::collections::HashSet;
use std::sync::Arc;

use crate::evaluator::Evaluator;
use crate::exception::{ExcType, RunError, RunResult};
use crate::heap::{HeapData, HeapId};
use crate::parser::Parser;
use crate::tracer::VmTracer;
use crate::value::Value;

/// A host-safe snapshot of an SL value, the only type that crosses the
/// embedding boundary in either direction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Object {
    None,
    Ellipsis,
    NotImplemented,
    Bool(bool),
    Int(i64),
    BigInt(num_bigint::BigInt),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Object>),
    Tuple(Vec<Object>),
    Dict(Vec<(Object, Object)>),
    Set(Vec<Object>),
    FrozenSet(Vec<Object>),
    Range(i64, i64, i64),
    /// A class, function, generator, or other callable/opaque heap value
    /// with no flat host representation; carries its `repr()`.
    Opaque(String),
    /// An uncaught exception that escaped [`Interpreter::run`].
    Exception { exc_type: String, message: String },
    /// A cycle caught while converting a container (e.g. `a.append(a)`);
    /// carries the placeholder `repr()` of the cyclic value.
    Cycle(String),
}

impl Object {
    pub(crate) fn from_value(ev: &Evaluator, value: &Value) -> RunResult<Object> {
        let mut seen = HashSet::new();
        Self::convert(ev, value, &mut seen)
    }

    fn convert(ev: &Evaluator, value: &Value, seen: &mut HashSet<HeapId>) -> RunResult<Object> {
        Ok(match value {
            Value::None => Object::None,
            Value::Ellipsis => Object::Ellipsis,
            Value::NotImplemented => Object::NotImplemented,
            Value::Bool(b) => Object::Bool(*b),
            Value::Int(i) => Object::Int(*i),
            Value::BigInt(b) => Object::BigInt((**b).clone()),
            Value::Float(f) => Object::Float(*f),
            Value::Str(s) => Object::Str(s.to_string()),
            Value::Bytes(b) => Object::Bytes(b.to_vec()),
            Value::Tuple(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    out.push(Self::convert(ev, item, seen)?);
                }
                Object::Tuple(out)
            }
            Value::Range(r) => {
                let (start, stop, step) = **r;
                Object::Range(start, stop, step)
            }
            Value::FrozenSet(set) => {
                let mut out = Vec::with_capacity(set.len());
                for item in set.iter() {
                    out.push(Self::convert(ev, item, seen)?);
                }
                Object::FrozenSet(out)
            }
            Value::Ref(id) => {
                if !seen.insert(*id) {
                    return Ok(Object::Cycle(ev.repr(value).unwrap_or_else(|_| "...".to_string())));
                }
                let converted = Self::convert_ref(ev, *id, value, seen)?;
                seen.remove(id);
                converted
            }
        })
    }

    fn convert_ref(ev: &Evaluator, id: HeapId, value: &Value, seen: &mut HashSet<HeapId>) -> RunResult<Object> {
        match ev.heap().get(id) {
            HeapData::List(list) => {
                let items = list.lock().unwrap().clone();
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    out.push(Self::convert(ev, item, seen)?);
                }
                Ok(Object::List(out))
            }
            HeapData::Dict(dict) => {
                let pairs: Vec<(Value, Value)> = dict.lock().unwrap().items().map(|(k, v)| (k.clone(), v.clone())).collect();
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    out.push((Self::convert(ev, &k, seen)?, Self::convert(ev, &v, seen)?));
                }
                Ok(Object::Dict(out))
            }
            HeapData::Set(set) => {
                let items: Vec<Value> = set.lock().unwrap().iter().cloned().collect();
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    out.push(Self::convert(ev, item, seen)?);
                }
                Ok(Object::Set(out))
            }
            _ => Ok(Object::Opaque(ev.repr(value)?)),
        }
    }
}

/// Renders `obj` the way Python's `repr()` would: unlike top-level
/// `Display`, strings and bytes are always quoted. Containers always use
/// this for their elements (`str([1, "a"])` is `"[1, 'a']"`, not `[1, a]`).
fn object_repr(obj: &Object) -> String {
    match obj {
        Object::Str(s) => python_quote(s),
        _ => obj.to_string(),
    }
}

fn python_quote(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn join_repr<'a>(items: impl Iterator<Item = &'a Object>) -> String {
    items.map(object_repr).collect::<Vec<_>>().join(", ")
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Object::None => write!(f, "None"),
            Object::Ellipsis => write!(f, "Ellipsis"),
            Object::NotImplemented => write!(f, "NotImplemented"),
            Object::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Object::Int(i) => write!(f, "{i}"),
            Object::BigInt(b) => write!(f, "{b}"),
            Object::Float(x) => write!(f, "{x}"),
            Object::Str(s) => write!(f, "{s}"),
            Object::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Object::List(items) => write!(f, "[{}]", join_repr(items.iter())),
            Object::Tuple(items) => match items.as_slice() {
                [single] => write!(f, "({},)", object_repr(single)),
                items => write!(f, "({})", join_repr(items.iter())),
            },
            Object::Dict(pairs) => {
                let parts: Vec<String> = pairs.iter().map(|(k, v)| format!("{}: {}", object_repr(k), object_repr(v))).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Object::Set(items) => {
                if items.is_empty() {
                    return write!(f, "set()");
                }
                write!(f, "{{{}}}", join_repr(items.iter()))
            }
            Object::FrozenSet(items) => write!(f, "frozenset({{{}}})", join_repr(items.iter())),
            Object::Range(start, stop, step) => {
                if *step == 1 {
                    write!(f, "range({start}, {stop})")
                } else {
                    write!(f, "range({start}, {stop}, {step})")
                }
            }
            Object::Opaque(repr) => write!(f, "{repr}"),
            Object::Exception { exc_type, message } => write!(f, "{exc_type}: {message}"),
            Object::Cycle(repr) => write!(f, "{repr}"),
        }
    }
}

/// An embedded SL interpreter. Each instance owns its own heap, global
/// namespace, and built-ins registry; running a second program on the same
/// instance continues to see globals bound by earlier runs, mirroring a
/// persistent Python module-level namespace across `exec()` calls.
pub struct Interpreter {
    evaluator: Evaluator,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    #[must_use]
    pub fn new() -> Self {
        Interpreter { evaluator: Evaluator::new() }
    }

    #[must_use]
    pub fn with_tracer(tracer: Arc<dyn VmTracer>) -> Self {
        Interpreter { evaluator: Evaluator::with_tracer(tracer) }
    }

    /// Parses and runs `source` as a module, returning the value of the
    /// final top-level expression statement (or `None` if there wasn't
    /// one), converted to a host-safe [`Object`]. A `SyntaxError` or an
    /// uncaught runtime exception is reported as `Object::Exception`
    /// rather than a Rust `Err`, matching spec.md §6's "never panics,
    /// always returns" contract; callers who want the raw error should use
    /// [`Interpreter::run_raw`].
    #[must_use]
    pub fn run(&self, source: &str) -> Object {
        match self.run_raw(source) {
            Ok(value) => Object::from_value(&self.evaluator, &value)
                .unwrap_or_else(|e| Object::Exception { exc_type: e.exc_type.name().to_string(), message: e.message }),
            Err(e) => Object::Exception { exc_type: e.exc_type.name().to_string(), message: e.message },
        }
    }

    /// Same as [`Interpreter::run`] but surfaces the raw `Value`/`RunError`
    /// for callers embedding deeper than the host-safe `Object` boundary.
    pub fn run_raw(&self, source: &str) -> RunResult<Value> {
        let module = Parser::parse_module(source)
            .map_err(|e| RunError::new(ExcType::SyntaxError, e.message))?;
        self.evaluator.exec_module(&module)
    }

    /// Same as [`Interpreter::run`], for sources whose top-level statements
    /// contain `await`. The cooperative coroutine driver (§5) resolves every
    /// `await` inline and depth-first as it walks the AST, so by the time
    /// [`Interpreter::run`] returns there is nothing left suspended — this
    /// method exists only to give callers an `async`-shaped entry point that
    /// matches spec.md §6's `run_async`; it resolves on first poll.
    pub async fn run_async(&self, source: &str) -> Object {
        self.run(source)
    }

    /// Reads a global binding set by a previous [`Interpreter::run`] call.
    #[must_use]
    pub fn get_global(&self, name: &str) -> Option<Object> {
        let value = self.evaluator.global_env().lookup(name)?;
        Object::from_value(&self.evaluator, &value).ok()
    }

    /// Binds `name` in the global scope before running further source,
    /// the way a host injects configuration or callback values.
    pub fn set_global(&self, name: &str, value: Object) {
        self.evaluator.global_env().bind(name.into(), object_to_value(&self.evaluator, value));
    }
}

/// Converts a host [`Object`] into an interpreter [`Value`], allocating
/// fresh heap storage for containers. Opaque/Exception/Cycle/Range variants
/// have no faithful inverse and become their closest scalar approximation
/// (a string for Opaque/Exception/Cycle, a `range` value for Range).
fn object_to_value(ev: &Evaluator, obj: Object) -> Value {
    match obj {
        Object::None => Value::None,
        Object::Ellipsis => Value::Ellipsis,
        Object::NotImplemented => Value::NotImplemented,
        Object::Bool(b) => Value::Bool(b),
        Object::Int(i) => Value::Int(i),
        Object::BigInt(b) => Value::bigint(b),
        Object::Float(f) => Value::Float(f),
        Object::Str(s) => Value::Str(s.into()),
        Object::Bytes(b) => Value::Bytes(b.into()),
        Object::Tuple(items) => Value::Tuple(items.into_iter().map(|o| object_to_value(ev, o)).collect()),
        Object::Range(start, stop, step) => Value::Range(Arc::new((start, stop, step))),
        Object::List(items) => ev.alloc_list(items.into_iter().map(|o| object_to_value(ev, o)).collect()),
        Object::Dict(pairs) => {
            let mut data = crate::types::dict::DictData::new();
            for (k, v) in pairs {
                let key = object_to_value(ev, k);
                let val = object_to_value(ev, v);
                if let Ok(hash) = ev.hash_value(&key) {
                    data.insert(hash, key, val, &|a, b| ev.values_equal(a, b).unwrap_or(false));
                }
            }
            ev.alloc_dict(data)
        }
        Object::Set(items) => ev.alloc_set(items.into_iter().map(|o| object_to_value(ev, o)).collect()).unwrap_or(Value::None),
        Object::FrozenSet(items) => {
            let mut data = crate::types::set::SetData::new();
            for item in items {
                let v = object_to_value(ev, item);
                if let Ok(hash) = ev.hash_value(&v) {
                    data.insert(hash, v, &|a, b| ev.values_equal(a, b).unwrap_or(false));
                }
            }
            Value::FrozenSet(Arc::new(data))
        }
        Object::Opaque(s) | Object::Exception { message: s, .. } | Object::Cycle(s) => Value::Str(s.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_expression_statement_and_returns_its_value() {
        let interp = Interpreter::new();
        assert_eq!(interp.run("1 + 2"), Object::Int(3));
    }

    #[test]
    fn globals_persist_across_run_calls() {
        let interp = Interpreter::new();
        assert_eq!(interp.run("x = 41"), Object::Int(41));
        assert_eq!(interp.run("x + 1"), Object::Int(42));
    }

    #[test]
    fn uncaught_exception_becomes_exception_object() {
        let interp = Interpreter::new();
        match interp.run("1 / 0") {
            Object::Exception { exc_type, .. } => assert_eq!(exc_type, "ZeroDivisionError"),
            other => panic!("expected Exception, got {other:?}"),
        }
    }

    #[test]
    fn set_global_is_visible_to_subsequent_source() {
        let interp = Interpreter::new();
        interp.set_global("greeting", Object::Str("hi".to_string()));
        assert_eq!(interp.run("greeting"), Object::Str("hi".to_string()));
    }

    #[test]
    fn syntax_error_is_reported_as_exception_object() {
        let interp = Interpreter::new();
        match interp.run("def (") {
            Object::Exception { exc_type, .. } => assert_eq!(exc_type, "SyntaxError"),
            other => panic!("expected Exception, got {other:?}"),
        }
    }
}
