//! Suspended-frame state for generators and coroutines (spec.md §4.6).
//!
//! The two are driven very differently (see `crate::fiber`'s module doc):
//! a generator owns a dedicated OS thread, spawned lazily on first use, that
//! blocks between `yield`s, while a coroutine has no suspension point of its
//! own and just runs its body synchronously the first time something awaits
//! it.

use std::sync::Arc;

use crate::ast::FunctionDef;
use crate::exception::RunError;
use crate::fiber::{Event, Fiber, Resume};
use crate::namespace::Env;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Not yet started: no fiber thread has been spawned yet.
    Created,
    Suspended,
    Running,
    Finished,
}

/// A generator object: the result of calling a `def` whose body contains
/// `yield`. Each one owns a [`Fiber`] running the function body; `next`/
/// `send`/`throw`/`close` all forward to it.
pub struct GeneratorData {
    pub name: Arc<str>,
    pub state: GeneratorState,
    fiber: Option<Fiber>,
}

impl std::fmt::Debug for GeneratorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorData").field("name", &self.name).field("state", &self.state).finish()
    }
}

/// What driving a generator one step produced.
pub enum Step {
    Yielded(Value),
    Returned(Value),
}

impl GeneratorData {
    pub fn new<F>(name: Arc<str>, body: F) -> Self
    where
        F: FnOnce() -> Result<Value, RunError> + Send + 'static,
    {
        GeneratorData { name, state: GeneratorState::Created, fiber: Some(Fiber::new(body)) }
    }

    fn drive(&mut self, msg: Resume) -> Result<Step, RunError> {
        if self.state == GeneratorState::Finished {
            return Err(crate::exception::runtime_error(crate::exception::ExcType::StopIteration, "generator already exhausted"));
        }
        let Some(fiber) = self.fiber.as_mut() else {
            self.state = GeneratorState::Finished;
            return Err(crate::exception::runtime_error(crate::exception::ExcType::StopIteration, "generator already exhausted"));
        };
        self.state = GeneratorState::Running;
        let event = fiber.resume(msg);
        match event {
            Event::Yielded(v) => {
                self.state = GeneratorState::Suspended;
                Ok(Step::Yielded(v))
            }
            Event::Returned(v) => {
                self.state = GeneratorState::Finished;
                self.fiber = None;
                Ok(Step::Returned(v))
            }
            Event::Raised(e) => {
                self.state = GeneratorState::Finished;
                self.fiber = None;
                Err(e)
            }
            Event::Closed => {
                self.state = GeneratorState::Finished;
                self.fiber = None;
                Ok(Step::Returned(Value::None))
            }
        }
    }

    /// `next(g)` / `g.__next__()`. Advances until the next `yield` or the
    /// body returns, in which case this raises `StopIteration` carrying the
    /// return value as its argument.
    pub fn advance(&mut self) -> Result<Value, RunError> {
        match self.drive(Resume::Next(Value::None))? {
            Step::Yielded(v) => Ok(v),
            Step::Returned(v) => Err(stop_iteration_with(v)),
        }
    }

    /// `g.send(value)`: resumes a suspended generator with `value` as the
    /// result of the `yield` expression that suspended it. Sending a
    /// non-`None` value into a not-yet-started generator is a `TypeError`
    /// in Python; the evaluator is expected to check `state == Created`
    /// before calling this with a non-`None` value.
    pub fn send(&mut self, value: Value) -> Result<Value, RunError> {
        match self.drive(Resume::Next(value))? {
            Step::Yielded(v) => Ok(v),
            Step::Returned(v) => Err(stop_iteration_with(v)),
        }
    }

    /// `g.throw(exc)`: raises `exc` at the suspension point.
    pub fn throw(&mut self, exc: RunError) -> Result<Value, RunError> {
        match self.drive(Resume::Throw(exc))? {
            Step::Yielded(v) => Ok(v),
            Step::Returned(v) => Err(stop_iteration_with(v)),
        }
    }

    /// `g.close()`: asks the fiber to unwind (its drop impl does this too,
    /// but `close()` is also directly callable from SL code).
    pub fn close(&mut self) {
        self.fiber = None;
        self.state = GeneratorState::Finished;
    }
}

fn stop_iteration_with(value: Value) -> RunError {
    let mut err = crate::exception::runtime_error(crate::exception::ExcType::StopIteration, "generator return value");
    err.args = vec![value];
    err
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    /// Created but never awaited.
    Pending,
    /// Already run to completion or raised; re-awaiting is a `RuntimeError`.
    Done,
}

/// An `async def` call result. Unlike a generator, a coroutine has no
/// suspension point of its own: the spec's concurrency model drives
/// `await`-chains strictly depth-first with nothing else running at the
/// same time, so the body can simply execute synchronously, in full, the
/// first time it is awaited (or driven by `run_async`).
#[derive(Debug)]
pub struct CoroutineData {
    pub qualname: String,
    pub def: Arc<FunctionDef>,
    pub closure: Env,
    pub bound_args: Vec<(String, Value)>,
    pub state: CoroutineState,
}

impl CoroutineData {
    #[must_use]
    pub fn new(qualname: String, def: Arc<FunctionDef>, closure: Env, bound_args: Vec<(String, Value)>) -> Self {
        CoroutineData { qualname, def, closure, bound_args, state: CoroutineState::Pending }
    }

    /// Marks this coroutine consumed, returning an error if it already was.
    /// Callers drive the actual body evaluation themselves (the evaluator
    /// owns the recursive `await` logic); this just enforces the
    /// single-await invariant spec.md §4.6 requires.
    pub fn begin(&mut self) -> Result<(), RunError> {
        if self.state == CoroutineState::Done {
            return Err(crate::exception::runtime_error(
                crate::exception::ExcType::RuntimeError,
                format!("cannot reuse already awaited coroutine {}", self.qualname),
            ));
        }
        self.state = CoroutineState::Done;
        Ok(())
    }
}
