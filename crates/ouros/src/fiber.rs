//! Suspension/resumption machinery for generators.
//!
//! Spec.md §4.6's "implementation strategy" note explicitly allows any design
//! that doesn't rely on the host language's own coroutine support, as long as
//! suspended frames behave like resumable state machines. There's no teacher
//! precedent for this module specifically (the retrieval pack's own generator
//! implementation resumes from an explicit bytecode-VM frame, which this
//! tree-walking evaluator has no equivalent of); this is this crate's own
//! design choice, built the same way the rest of the evaluator handles
//! suspension points it can't express as plain recursion.
//!
//! Each generator body runs on its own OS thread, spawned lazily on the
//! generator's first `__next__()`/`send()`/`throw()` rather than at
//! generator-creation time, and a pair of channels hands control back and
//! forth so that exactly one of {the driving thread, the generator's thread}
//! ever runs at a time — the channel recv is the suspension point, not any
//! shared lock. Laziness matters: building many generator objects without
//! ever advancing them (a common pattern, e.g. a list comprehension of
//! generator calls) must not cost an OS thread per object. If the platform
//! can't spawn a thread when one is finally needed, that surfaces as a
//! catchable `RuntimeError` rather than aborting the process.
//!
//! Coroutines (`async def`) do not need any of this: spec.md §5 notes that
//! `await`-chains are driven strictly depth-first with nothing else ever
//! running concurrently, so a coroutine can simply run its body synchronously
//! the first time it is awaited (see [`crate::types::generator::CoroutineData`]).

use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;

use crate::exception::RunError;
use crate::value::Value;

/// Sent from the driving thread into a suspended generator fiber.
pub enum Resume {
    /// Ordinary `next()`/first start: the value of the `yield` expression
    /// that unblocks (ignored on first start).
    Next(Value),
    /// `generator.throw(...)`: raises at the suspension point instead of
    /// resuming normally.
    Throw(RunError),
    /// The generator is being dropped without being exhausted; asks the
    /// fiber thread to unwind so it can be joined.
    Close,
}

/// Sent from a generator fiber back to whichever thread is driving it.
pub enum Event {
    Yielded(Value),
    Returned(Value),
    Raised(RunError),
    /// Acknowledges a `Close` request, or reports that the fiber's thread
    /// could never be started in the first place.
    Closed,
}

thread_local! {
    static CHANNEL: std::cell::RefCell<Option<(Sender<Event>, Receiver<Resume>)>> = const { std::cell::RefCell::new(None) };
}

type Body = Box<dyn FnOnce() -> Result<Value, RunError> + Send>;

enum FiberState {
    /// The generator body hasn't run yet and no thread has been spawned.
    Pending(Body),
    Running { to_fiber: Sender<Resume>, from_fiber: Receiver<Event>, join: Option<JoinHandle<()>> },
    /// Exhausted, closed, or failed to spawn; nothing left to drive or join.
    Closed,
}

/// A handle to a generator's dedicated thread, spawned on first use.
pub struct Fiber {
    state: FiberState,
}

impl std::fmt::Debug for Fiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fiber").finish_non_exhaustive()
    }
}

impl Fiber {
    /// Captures `body` without spawning anything. The thread is created on
    /// the first call to [`Fiber::resume`].
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce() -> Result<Value, RunError> + Send + 'static,
    {
        Fiber { state: FiberState::Pending(Box::new(body)) }
    }

    fn spawn_now(body: Body) -> Result<FiberState, Event> {
        let (to_fiber_tx, to_fiber_rx) = channel::<Resume>();
        let (from_fiber_tx, from_fiber_rx) = channel::<Event>();

        let spawned = std::thread::Builder::new().name("ouros-generator".into()).spawn(move || {
            CHANNEL.with(|c| *c.borrow_mut() = Some((from_fiber_tx.clone(), to_fiber_rx)));
            let first = CHANNEL.with(|c| c.borrow().as_ref().unwrap().1.recv());
            match first {
                Ok(Resume::Close) | Err(_) => {
                    let _ = from_fiber_tx.send(Event::Closed);
                }
                Ok(Resume::Next(_) | Resume::Throw(_)) => {
                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(body));
                    let event = match outcome {
                        Ok(Ok(v)) => Event::Returned(v),
                        Ok(Err(e)) => Event::Raised(e),
                        Err(_) => Event::Raised(crate::exception::runtime_error(
                            crate::exception::ExcType::RuntimeError,
                            "generator body panicked",
                        )),
                    };
                    let _ = from_fiber_tx.send(event);
                }
            }
        });

        match spawned {
            Ok(join) => Ok(FiberState::Running { to_fiber: to_fiber_tx, from_fiber: from_fiber_rx, join: Some(join) }),
            Err(err) => Err(Event::Raised(crate::exception::runtime_error(
                crate::exception::ExcType::RuntimeError,
                format!("could not start generator: {err}"),
            ))),
        }
    }

    /// Sends `msg` into the fiber and blocks for its next event, spawning the
    /// backing thread first if this is the first call.
    pub fn resume(&mut self, msg: Resume) -> Event {
        if matches!(self.state, FiberState::Pending(_)) {
            let FiberState::Pending(body) = std::mem::replace(&mut self.state, FiberState::Closed) else { unreachable!() };
            match Self::spawn_now(body) {
                Ok(running) => self.state = running,
                Err(event) => return event,
            }
        }

        let FiberState::Running { to_fiber, from_fiber, .. } = &self.state else {
            return Event::Closed;
        };
        if to_fiber.send(msg).is_err() {
            self.state = FiberState::Closed;
            return Event::Closed;
        }
        let event = from_fiber.recv().unwrap_or(Event::Closed);
        if matches!(event, Event::Returned(_) | Event::Raised(_) | Event::Closed) {
            if let FiberState::Running { join, .. } = &mut self.state {
                if let Some(join) = join.take() {
                    let _ = join.join();
                }
            }
            self.state = FiberState::Closed;
        }
        event
    }
}

impl Drop for Fiber {
    fn drop(&mut self) {
        if let FiberState::Running { to_fiber, join, .. } = &mut self.state {
            let _ = to_fiber.send(Resume::Close);
            if let Some(join) = join.take() {
                let _ = join.join();
            }
        }
    }
}

/// Called by the evaluator when executing a `yield` expression while running
/// on a generator's fiber thread. Blocks until the driving thread resumes it.
///
/// # Panics
/// Panics if called from a thread that isn't running inside a `Fiber`'s body
/// — `yield` outside a generator body is rejected earlier, at function
/// definition time, so this indicates an evaluator bug rather than user
/// error.
pub fn yield_value(value: Value) -> Result<Value, RunError> {
    CHANNEL.with(|c| {
        let borrow = c.borrow();
        let (tx, rx) = borrow.as_ref().expect("yield_value called outside a generator fiber");
        if tx.send(Event::Yielded(value)).is_err() {
            return Err(crate::exception::runtime_error(crate::exception::ExcType::GeneratorExit, "generator closed"));
        }
        match rx.recv() {
            Ok(Resume::Next(v)) => Ok(v),
            Ok(Resume::Throw(e)) => Err(e),
            Ok(Resume::Close) | Err(_) => Err(crate::exception::runtime_error(crate::exception::ExcType::GeneratorExit, "generator closed")),
        }
    })
}

/// True when the calling thread is currently inside a generator fiber body.
#[must_use]
pub fn in_fiber() -> bool {
    CHANNEL.with(|c| c.borrow().is_some())
}
