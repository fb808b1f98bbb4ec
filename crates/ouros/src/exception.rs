//! Exception types and the `Result` alias used for fallible interpreter
//! operations.
//!
//! Grounded on the teacher's `exception_private.rs` `ExcType` (a flat enum
//! with a hand-written `is_subclass_of` matching Python's exception
//! hierarchy) but trimmed to the hierarchy spec.md §4.7 actually names:
//! stdlib families the spec calls out as Non-goals (`OSError`, `ImportError`,
//! `json`/`tomllib` decode errors, `ExceptionGroup`, buffer/memory/reference
//! errors, Unicode codec errors) are dropped rather than carried as dead
//! weight. `BaseException`/`SystemExit`/`KeyboardInterrupt`/`GeneratorExit`
//! stay because `try`/`except`/`finally` semantics (§4.5) depend on
//! `Exception` *not* catching them by default.

use std::fmt;

use crate::token::Position;
use crate::value::Value;

pub type RunResult<T> = Result<T, RunError>;

/// Python exception types this interpreter raises and matches in `except`
/// clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExcType {
    BaseException,
    Exception,
    SystemExit,
    KeyboardInterrupt,
    GeneratorExit,

    ArithmeticError,
    ZeroDivisionError,
    OverflowError,

    LookupError,
    IndexError,
    KeyError,

    RuntimeError,
    NotImplementedError,
    RecursionError,

    AttributeError,
    NameError,
    UnboundLocalError,
    ValueError,
    TypeError,

    AssertionError,
    StopIteration,
    StopAsyncIteration,

    SyntaxError,
    IndentationError,
}

impl ExcType {
    /// Returns the name used both in `__class__.__name__` and in `except
    /// Name:` source text.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BaseException => "BaseException",
            Self::Exception => "Exception",
            Self::SystemExit => "SystemExit",
            Self::KeyboardInterrupt => "KeyboardInterrupt",
            Self::GeneratorExit => "GeneratorExit",
            Self::ArithmeticError => "ArithmeticError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::OverflowError => "OverflowError",
            Self::LookupError => "LookupError",
            Self::IndexError => "IndexError",
            Self::KeyError => "KeyError",
            Self::RuntimeError => "RuntimeError",
            Self::NotImplementedError => "NotImplementedError",
            Self::RecursionError => "RecursionError",
            Self::AttributeError => "AttributeError",
            Self::NameError => "NameError",
            Self::UnboundLocalError => "UnboundLocalError",
            Self::ValueError => "ValueError",
            Self::TypeError => "TypeError",
            Self::AssertionError => "AssertionError",
            Self::StopIteration => "StopIteration",
            Self::StopAsyncIteration => "StopAsyncIteration",
            Self::SyntaxError => "SyntaxError",
            Self::IndentationError => "IndentationError",
        }
    }

    /// Returns true if `self` would be caught by `except handler_type:`,
    /// i.e. `self` is `handler_type` or one of its subclasses.
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        if self == handler_type {
            return true;
        }
        match handler_type {
            Self::BaseException => true,
            Self::Exception => {
                !matches!(self, Self::BaseException | Self::KeyboardInterrupt | Self::SystemExit | Self::GeneratorExit)
            }
            Self::LookupError => matches!(self, Self::KeyError | Self::IndexError),
            Self::ArithmeticError => matches!(self, Self::ZeroDivisionError | Self::OverflowError),
            Self::RuntimeError => matches!(self, Self::RecursionError | Self::NotImplementedError),
            Self::NameError => matches!(self, Self::UnboundLocalError),
            Self::SyntaxError => matches!(self, Self::IndentationError),
            _ => false,
        }
    }
}

impl fmt::Display for ExcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a traceback: the function the error passed through and the
/// source position it was at.
#[derive(Debug, Clone)]
pub struct TracebackFrame {
    pub function_name: String,
    pub pos: Position,
}

/// A raised-but-not-yet-handled exception, threaded through the evaluator via
/// `Result::Err`. Distinct from the `ExceptionInstance` `Value` that user
/// code sees via `except E as e:` — this is the interpreter's internal
/// control-flow carrier; [`crate::evaluator`] materializes it into a heap
/// `ExceptionInstance` only when a handler binds it with `as`.
#[derive(Debug, Clone)]
pub struct RunError {
    /// The closest built-in ancestor of the raised exception, used to match
    /// `except BuiltinName:` clauses without heap access. For an instance of
    /// a user-defined subclass this is the nearest built-in type it derives
    /// from (e.g. `Exception` for a direct `class Foo(Exception)`).
    pub exc_type: ExcType,
    pub message: String,
    pub args: Vec<Value>,
    /// Explicit `raise X from Y`.
    pub cause: Option<Box<RunError>>,
    /// Implicit chaining: the exception being handled when this one was
    /// raised, absent an explicit `from`.
    pub context: Option<Box<RunError>>,
    pub traceback: Vec<TracebackFrame>,
    /// The exact runtime class this exception was raised as, when it
    /// originated from evaluating a `class`-based `raise` rather than a
    /// purely internal error. `except` clauses naming a user-defined class
    /// match via this field's MRO, not `exc_type`.
    pub class_id: Option<crate::heap::HeapId>,
    /// The heap `Instance` (or `None` for purely internal errors) seen by
    /// `except E as e:`. Built lazily by the evaluator when a handler binds
    /// a name, unless it was already materialized at raise time.
    pub instance: Option<Value>,
}

impl RunError {
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        let message = message.into();
        RunError {
            exc_type,
            args: vec![Value::Str(message.as_str().into())],
            message,
            cause: None,
            context: None,
            traceback: Vec::new(),
            class_id: None,
            instance: None,
        }
    }

    pub fn with_cause(mut self, cause: RunError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_context(mut self, context: RunError) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    pub fn with_class(mut self, class_id: crate::heap::HeapId, instance: Value) -> Self {
        self.class_id = Some(class_id);
        self.instance = Some(instance);
        self
    }

    pub fn push_frame(mut self, function_name: impl Into<String>, pos: Position) -> Self {
        self.traceback.push(TracebackFrame { function_name: function_name.into(), pos });
        self
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.exc_type, self.message)
    }
}

impl std::error::Error for RunError {}

/// Convenience constructor mirroring the teacher's `ExcType::call` but
/// building the internal `RunError` carrier rather than a heap value.
pub fn runtime_error(exc_type: ExcType, message: impl Into<String>) -> RunError {
    RunError::new(exc_type, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_catches_ordinary_errors_but_not_base_exception_siblings() {
        assert!(ExcType::ValueError.is_subclass_of(ExcType::Exception));
        assert!(!ExcType::SystemExit.is_subclass_of(ExcType::Exception));
    }

    #[test]
    fn lookup_error_catches_index_and_key_errors() {
        assert!(ExcType::IndexError.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::KeyError.is_subclass_of(ExcType::LookupError));
        assert!(!ExcType::TypeError.is_subclass_of(ExcType::LookupError));
    }
}
