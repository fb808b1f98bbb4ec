//! Execution tracing hooks for embedders.
//!
//! Grounded on the teacher's `tracer.rs` `VmTracer` trait/`NoopTracer`
//! pairing (monomorphized zero-cost no-op by default) but trimmed to the
//! handful of events a tree-walking evaluator actually has: call/return,
//! raise, and generator yield/resume. The teacher's opcode-level hooks
//! (instruction dispatch, closure-cell access, coverage) have no counterpart
//! here since there is no bytecode.

use crate::exception::RunError;
use crate::value::Value;

/// Hook points the evaluator fires at. Implement this to observe a running
/// interpreter without modifying the evaluator itself.
pub trait VmTracer: Send + Sync {
    fn on_call(&self, _qualname: &str) {}
    fn on_return(&self, _qualname: &str, _value: &Value) {}
    fn on_raise(&self, _err: &RunError) {}
    fn on_yield(&self, _value: &Value) {}
}

/// Zero-cost default: every hook is an empty function the compiler elides.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Records every event in order, for tests and debugging.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: std::sync::Mutex<Vec<String>>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl VmTracer for RecordingTracer {
    fn on_call(&self, qualname: &str) {
        self.events.lock().unwrap().push(format!("call {qualname}"));
    }

    fn on_return(&self, qualname: &str, _value: &Value) {
        self.events.lock().unwrap().push(format!("return {qualname}"));
    }

    fn on_raise(&self, err: &RunError) {
        self.events.lock().unwrap().push(format!("raise {}", err.exc_type));
    }

    fn on_yield(&self, _value: &Value) {
        self.events.lock().unwrap().push("yield".to_string());
    }
}
