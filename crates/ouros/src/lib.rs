#![doc = include_str!("../../../README.md")]
#![expect(dead_code, reason = "tree-walk evaluator keeps a few helpers only test modules call today")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional")]
#![expect(clippy::cast_possible_wrap, reason = "wrap behavior mirrors CPython")]
#![expect(clippy::manual_let_else, reason = "some cleanup paths stay explicit")]
#![expect(clippy::unnecessary_wraps, reason = "dispatch signatures are uniform")]
#![expect(clippy::needless_pass_by_value, reason = "call APIs pass values consistently")]
#![expect(clippy::too_many_arguments, reason = "Python parity requires wide signatures")]
#![expect(clippy::type_complexity, reason = "protocol tuples are intentionally rich")]
#![expect(clippy::unreadable_literal, reason = "parity constants keep canonical forms")]
#![expect(clippy::float_cmp, reason = "parity tests require exact float comparison")]

mod ast;
mod builtins;
mod exception;
mod fiber;
mod format;
mod function;
mod heap;
mod intern;
pub mod interpreter;
mod lexer;
mod methods;
mod namespace;
mod parser;
mod py_hash;
mod resource;
mod signature;
mod token;
pub mod tracer;
mod types;
mod value;

pub use crate::{
    evaluator::Evaluator,
    exception::{ExcType, RunError, RunResult},
    heap::{HeapData, HeapId},
    interpreter::{Interpreter, Object},
    resource::{CallDepth, DEFAULT_RECURSION_LIMIT},
    tracer::{NoopTracer, RecordingTracer, VmTracer},
    value::Value,
};

mod evaluator;
