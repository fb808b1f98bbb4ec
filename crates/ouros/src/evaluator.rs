//! The tree-walking statement/expression evaluator.
//!
//! Grounded on the teacher's `bytecode/vm/*.rs` for the *shape* of operator,
//! attribute, and call dispatch (a single table keyed on the runtime tag,
//! falling through to dunder lookup for `Instance`s) and on `expressions.rs`
//! for how literals and comprehensions build values, but walking
//! [`crate::ast`] directly instead of compiling to bytecode first — this
//! crate's front end has no compile pass (spec.md explicit non-goal:
//! "bytecode compilation or JIT").

use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::ast::{
    BinOp, BoolOp, Block, ClassDef, CmpOp, Comprehension, Expr, ExprKind, FStringPart, FunctionDef, Module, Param, ParamKind, Stmt, StmtKind,
    UnaryOp,
};
use crate::exception::{ExcType, RunError, RunResult, runtime_error};
use crate::fiber;
use crate::function::{FunctionData, LocalsInfo};
use crate::heap::{
    BoundMethodData, BuiltinCallableData, ClassMethodData, Heap, HeapData, HeapId, PropertyData, StaticMethodData,
};
use crate::namespace::{Builtins, Env, Scope};
use crate::resource::CallDepth;
use crate::signature::bind_arguments;
use crate::token::Position;
use crate::tracer::{NoopTracer, VmTracer};
use crate::types::class::{ClassData, InstanceData, compute_c3_mro, mro_lookup};
use crate::types::dict::DictData;
use crate::types::generator::{CoroutineData, GeneratorData};
use crate::types::iterator::IteratorData;
use crate::types::set::SetData;
use crate::value::Value;

/// Everything shared across every `Evaluator` in one interpreter session,
/// including the ones running on generator fiber threads. Lives behind an
/// `Arc` so a fiber body can own a clone independent of the thread that
/// spawned it.
pub struct Core {
    pub heap: Heap,
    pub interner: crate::intern::Interner,
    pub builtins: Builtins,
    pub global_env: Env,
    pub object_class: HeapId,
    pub exception_classes: HashMap<ExcType, HeapId>,
    pub exception_class_kind: HashMap<HeapId, ExcType>,
    /// Synthetic `Class` heap entries for the built-in types (`int`, `str`,
    /// `list`, ...) so `isinstance`/`type()`/`__class__` on a native `Value`
    /// can go through the same MRO machinery as user classes, even though
    /// native values carry no `HeapId` of their own.
    pub native_classes: HashMap<&'static str, HeapId>,
    pub tracer: Arc<dyn VmTracer>,
}

/// One call frame: the name environment plus (for function bodies) the
/// static local/global/nonlocal classification needed for LEGB and
/// `UnboundLocalError` (spec.md §4.4).
#[derive(Clone)]
pub struct Frame {
    pub env: Env,
    pub locals: Option<Arc<LocalsInfo>>,
    /// The class whose method body this frame is executing, if any —
    /// consulted by zero-argument `super()`.
    pub defining_class: Option<HeapId>,
    /// The implicit first parameter's current value, for zero-argument
    /// `super()`.
    pub self_value: Option<Value>,
}

impl Frame {
    fn module_level(env: Env) -> Self {
        Frame { env, locals: None, defining_class: None, self_value: None }
    }

    fn child(&self, env: Env, locals: Option<Arc<LocalsInfo>>) -> Self {
        Frame { env, locals, defining_class: self.defining_class, self_value: self.self_value.clone() }
    }
}

/// What executing one statement (or an entire block) produced, short of an
/// `Err(RunError)` (the "Raise" control outcome from spec.md §4.4).
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Evaluator {
    pub(crate) core: Arc<Core>,
    call_depth: CallDepth,
    /// The exception currently being handled, for implicit `__context__`
    /// chaining (spec.md §7) and bare `raise`.
    current_exception: std::cell::RefCell<Option<RunError>>,
}

impl Evaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tracer(Arc::new(NoopTracer))
    }

    #[must_use]
    pub fn with_tracer(tracer: Arc<dyn VmTracer>) -> Self {
        let heap = Heap::new();
        let object_class = heap.alloc(HeapData::Class(ClassData::new(Arc::from("object"), Vec::new())));
        if let HeapData::Class(c) = heap.get(object_class) {
            c.set_mro(vec![object_class]);
        }

        let (exception_classes, exception_class_kind) = bootstrap_exceptions(&heap, object_class);

        let native_classes = bootstrap_native_classes(&heap, object_class);

        let mut builtins = Builtins::new();
        for (&exc, &id) in &exception_classes {
            builtins.insert(exc.name(), Value::Ref(id));
        }
        builtins.insert("object", Value::Ref(object_class));
        for (&name, &id) in &native_classes {
            builtins.insert(name, Value::Ref(id));
        }

        let global_env = Scope::new_global();

        let core = Arc::new(Core {
            heap,
            interner: crate::intern::Interner::new(),
            builtins,
            global_env,
            object_class,
            exception_classes,
            exception_class_kind,
            native_classes,
            tracer,
        });
        let mut evaluator = Evaluator { core, call_depth: CallDepth::default(), current_exception: std::cell::RefCell::new(None) };
        crate::builtins::install(&mut evaluator);
        evaluator
    }

    fn from_core(core: Arc<Core>) -> Self {
        Evaluator { core, call_depth: CallDepth::default(), current_exception: std::cell::RefCell::new(None) }
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.core.heap
    }

    #[must_use]
    pub fn global_env(&self) -> &Env {
        &self.core.global_env
    }

    #[must_use]
    pub fn object_class(&self) -> HeapId {
        self.core.object_class
    }

    pub(crate) fn register_builtin(&mut self, name: &'static str, func: impl Fn(&Evaluator, Vec<Value>, Vec<(String, Value)>) -> RunResult<Value> + Send + Sync + 'static) {
        let id = self.core.heap.alloc(HeapData::Builtin(BuiltinCallableData { name, func: Arc::new(func) }));
        Arc::get_mut(&mut self.core).expect("no other evaluator clones exist during bootstrap").builtins.insert(name, Value::Ref(id));
    }

    // ---- module / statement execution ------------------------------------

    pub fn exec_module(&self, module: &Module) -> RunResult<Value> {
        let frame = Frame::module_level(Arc::clone(&self.core.global_env));
        let mut last = Value::None;
        for stmt in &module.body {
            if let StmtKind::Expr(e) = &stmt.kind {
                last = self.eval_expr(e, &frame)?;
            } else {
                match self.exec_stmt(stmt, &frame)? {
                    Flow::Return(v) => return Ok(v),
                    _ => {}
                }
            }
        }
        Ok(last)
    }

    fn exec_block(&self, block: &Block, frame: &Frame) -> RunResult<Flow> {
        for stmt in block {
            match self.exec_stmt(stmt, frame)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&self, stmt: &Stmt, frame: &Frame) -> RunResult<Flow> {
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.eval_expr(e, frame)?;
                Ok(Flow::Normal)
            }
            StmtKind::Assign { targets, value } => {
                let v = self.eval_expr(value, frame)?;
                for target in targets {
                    self.assign_target(target, v.clone(), frame)?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.eval_expr(target, frame)?;
                let rhs = self.eval_expr(value, frame)?;
                let result = if let Some(call) = self.try_call_method(&current, iop_name(*op), vec![rhs.clone()]) {
                    let v = call?;
                    if matches!(v, Value::NotImplemented) { self.binop(*op, &current, &rhs)? } else { v }
                } else {
                    self.binop(*op, &current, &rhs)?
                };
                self.assign_target(target, result, frame)?;
                Ok(Flow::Normal)
            }
            StmtKind::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    let v = self.eval_expr(value, frame)?;
                    self.assign_target(target, v, frame)?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::If { test, body, orelse } => {
                if self.truthy(&self.eval_expr(test, frame)?)? {
                    self.exec_block(body, frame)
                } else {
                    self.exec_block(orelse, frame)
                }
            }
            StmtKind::While { test, body, orelse } => {
                loop {
                    if !self.truthy(&self.eval_expr(test, frame)?)? {
                        return self.exec_block(orelse, frame);
                    }
                    match self.exec_block(body, frame)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Continue | Flow::Normal => {}
                    }
                }
            }
            StmtKind::For { target, iter, body, orelse, .. } => {
                let iterable = self.eval_expr(iter, frame)?;
                let it = self.get_iterator(&iterable)?;
                loop {
                    match self.iterator_next(&it)? {
                        None => return self.exec_block(orelse, frame),
                        Some(item) => {
                            self.assign_target(target, item, frame)?;
                            match self.exec_block(body, frame)? {
                                Flow::Break => return Ok(Flow::Normal),
                                Flow::Return(v) => return Ok(Flow::Return(v)),
                                Flow::Continue | Flow::Normal => {}
                            }
                        }
                    }
                }
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval_expr(e, frame)?,
                    None => Value::None,
                };
                Ok(Flow::Return(v))
            }
            StmtKind::Raise { exc, cause } => Err(self.eval_raise(exc.as_ref(), cause.as_ref(), frame)?),
            StmtKind::Try { body, handlers, orelse, finalbody } => self.exec_try(body, handlers, orelse, finalbody, frame),
            StmtKind::With { items, body, .. } => self.exec_with(items, body, frame),
            StmtKind::FunctionDef(def) => {
                let value = self.make_function(def, frame);
                frame.env.bind(Arc::from(def.name.as_str()), value);
                Ok(Flow::Normal)
            }
            StmtKind::ClassDef(def) => {
                let value = self.exec_class_def(def, frame)?;
                frame.env.bind(Arc::from(def.name.as_str()), value);
                Ok(Flow::Normal)
            }
            StmtKind::Import { .. } | StmtKind::ImportFrom { .. } => Ok(Flow::Normal),
            StmtKind::Global(_) | StmtKind::Nonlocal(_) | StmtKind::Pass => Ok(Flow::Normal),
            StmtKind::Assert { test, msg } => {
                if !self.truthy(&self.eval_expr(test, frame)?)? {
                    let message = match msg {
                        Some(m) => self.str_of(&self.eval_expr(m, frame)?)?,
                        None => String::new(),
                    };
                    return Err(runtime_error(ExcType::AssertionError, message));
                }
                Ok(Flow::Normal)
            }
            StmtKind::Del(targets) => {
                for target in targets {
                    self.del_target(target, frame)?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::YieldStmt(e) => {
                self.eval_expr(e, frame)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_try(&self, body: &Block, handlers: &[crate::ast::ExceptHandler], orelse: &Block, finalbody: &Block, frame: &Frame) -> RunResult<Flow> {
        let body_result = self.exec_block(body, frame);
        let result = match body_result {
            Ok(Flow::Normal) => self.exec_block(orelse, frame),
            Ok(other) => Ok(other),
            Err(err) => {
                let mut handled = None;
                for handler in handlers {
                    if self.exception_matches(&err, handler.type_.as_ref(), frame)? {
                        if let Some(name) = &handler.name {
                            let instance = self.materialize_exception(&err);
                            frame.env.bind(Arc::from(name.as_str()), instance);
                        }
                        let previous = self.current_exception.replace(Some(err.clone()));
                        let outcome = self.exec_block(&handler.body, frame);
                        *self.current_exception.borrow_mut() = previous;
                        if let Some(name) = &handler.name {
                            let _ = frame.env.delete(name);
                        }
                        handled = Some(outcome);
                        break;
                    }
                }
                handled.unwrap_or(Err(err))
            }
        };
        match self.exec_block(finalbody, frame)? {
            Flow::Normal => result,
            other => Ok(other),
        }
    }

    fn exec_with(&self, items: &[crate::ast::WithItem], body: &Block, frame: &Frame) -> RunResult<Flow> {
        if items.is_empty() {
            return self.exec_block(body, frame);
        }
        let (first, rest) = items.split_first().unwrap();
        let ctx = self.eval_expr(&first.context_expr, frame)?;
        let entered = self.call_method(&ctx, "__enter__", Vec::new())?;
        if let Some(target) = &first.optional_vars {
            self.assign_target(target, entered, frame)?;
        }

        let result = self.exec_with(rest, body, frame);

        let (exc_type, exc_val, suppress_exc) = match &result {
            Err(err) => (Value::Str(err.exc_type.name().into()), self.materialize_exception(err), true),
            Ok(_) => (Value::None, Value::None, false),
        };
        let exit_result = self.call_method(&ctx, "__exit__", vec![exc_type, exc_val, Value::None]);

        match (result, exit_result) {
            (Err(_), Ok(v)) if suppress_exc && self.truthy(&v)? => Ok(Flow::Normal),
            (body_result, Ok(_)) => body_result,
            (_, Err(exit_err)) => Err(exit_err),
        }
    }

    // ---- assignment targets ------------------------------------------------

    fn assign_target(&self, target: &Expr, value: Value, frame: &Frame) -> RunResult<()> {
        match &target.kind {
            ExprKind::Name(name) => self.bind_name(name, value, frame),
            ExprKind::Attribute { value: obj, attr } => {
                let obj = self.eval_expr(obj, frame)?;
                self.set_attr(&obj, attr, value)
            }
            ExprKind::Subscript { value: obj, index } => {
                let obj = self.eval_expr(obj, frame)?;
                let index = self.eval_expr(index, frame)?;
                self.set_item(&obj, index, value)
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => self.unpack_assign(items, value, frame),
            ExprKind::Starred(inner) => self.assign_target(inner, value, frame),
            _ => Err(runtime_error(ExcType::TypeError, "invalid assignment target")),
        }
    }

    fn unpack_assign(&self, targets: &[Expr], value: Value, frame: &Frame) -> RunResult<()> {
        let items = self.to_vec(&value)?;
        let star_pos = targets.iter().position(|t| matches!(t.kind, ExprKind::Starred(_)));
        match star_pos {
            None => {
                if items.len() != targets.len() {
                    return Err(runtime_error(ExcType::ValueError, format!("not enough values to unpack (expected {}, got {})", targets.len(), items.len())));
                }
                for (t, v) in targets.iter().zip(items) {
                    self.assign_target(t, v, frame)?;
                }
            }
            Some(star_idx) => {
                let before = star_idx;
                let after = targets.len() - star_idx - 1;
                if items.len() < before + after {
                    return Err(runtime_error(ExcType::ValueError, "not enough values to unpack"));
                }
                for (t, v) in targets[..before].iter().zip(items.iter()) {
                    self.assign_target(t, v.clone(), frame)?;
                }
                let middle: Vec<Value> = items[before..items.len() - after].to_vec();
                self.assign_target(&targets[star_idx], self.alloc_list(middle), frame)?;
                for (t, v) in targets[star_idx + 1..].iter().zip(items[items.len() - after..].iter()) {
                    self.assign_target(t, v.clone(), frame)?;
                }
            }
        }
        Ok(())
    }

    fn bind_name(&self, name: &str, value: Value, frame: &Frame) -> RunResult<()> {
        if let Some(locals) = &frame.locals {
            if locals.is_global_decl(name) {
                self.core.global_env.assign_local(Arc::from(name), value);
                return Ok(());
            }
            if locals.is_nonlocal_decl(name) {
                if let Some(target) = frame.env.find_nonlocal_target(name) {
                    target.assign_local(Arc::from(name), value);
                    return Ok(());
                }
                return Err(runtime_error(ExcType::RuntimeError, format!("no binding for nonlocal '{name}' found")));
            }
        }
        frame.env.assign_local(Arc::from(name), value);
        Ok(())
    }

    fn del_target(&self, target: &Expr, frame: &Frame) -> RunResult<()> {
        match &target.kind {
            ExprKind::Name(name) => frame.env.delete(name),
            ExprKind::Attribute { value, attr } => {
                let obj = self.eval_expr(value, frame)?;
                self.del_attr(&obj, attr)
            }
            ExprKind::Subscript { value, index } => {
                let obj = self.eval_expr(value, frame)?;
                let index = self.eval_expr(index, frame)?;
                self.del_item(&obj, &index)
            }
            _ => Err(runtime_error(ExcType::TypeError, "invalid del target")),
        }
    }

    // ---- name resolution ----------------------------------------------------

    fn read_name(&self, name: &str, frame: &Frame) -> RunResult<Value> {
        if let Some(locals) = &frame.locals {
            if locals.is_global_decl(name) {
                return self
                    .core
                    .global_env
                    .lookup(name)
                    .or_else(|| self.core.builtins.get(name))
                    .ok_or_else(|| runtime_error(ExcType::NameError, format!("name '{name}' is not defined")));
            }
            if locals.is_nonlocal_decl(name) {
                return frame
                    .env
                    .find_nonlocal_target(name)
                    .and_then(|scope| scope.lookup(name))
                    .ok_or_else(|| runtime_error(ExcType::NameError, format!("name '{name}' is not defined")));
            }
            if locals.is_local(name) {
                return frame
                    .env
                    .lookup(name)
                    .ok_or_else(|| runtime_error(ExcType::UnboundLocalError, format!("cannot access local variable '{name}' where it is not associated with a value")));
            }
        }
        frame
            .env
            .lookup(name)
            .or_else(|| self.core.builtins.get(name))
            .ok_or_else(|| runtime_error(ExcType::NameError, format!("name '{name}' is not defined")))
    }

    // ---- expression evaluation ----------------------------------------------

    fn eval_expr(&self, expr: &Expr, frame: &Frame) -> RunResult<Value> {
        match &expr.kind {
            ExprKind::IntLit(i) => Ok(Value::bigint(i.clone())),
            ExprKind::FloatLit(f) => Ok(Value::Float(*f)),
            ExprKind::StrLit(s) => Ok(Value::Str(self.core.interner.intern(s))),
            ExprKind::BytesLit(b) => Ok(Value::Bytes(Arc::from(b.as_slice()))),
            ExprKind::BoolLit(b) => Ok(Value::Bool(*b)),
            ExprKind::NoneLit => Ok(Value::None),
            ExprKind::Ellipsis => Ok(Value::Ellipsis),
            ExprKind::Name(name) => self.read_name(name, frame),
            ExprKind::Tuple(items) => {
                let values = self.eval_sequence(items, frame)?;
                Ok(Value::Tuple(values.into()))
            }
            ExprKind::List(items) => {
                let values = self.eval_sequence(items, frame)?;
                Ok(self.alloc_list(values))
            }
            ExprKind::SetLit(items) => {
                let values = self.eval_sequence(items, frame)?;
                self.alloc_set(values)
            }
            ExprKind::DictLit(pairs) => self.eval_dict_lit(pairs, frame),
            ExprKind::Starred(inner) | ExprKind::DoubleStarred(inner) => self.eval_expr(inner, frame),
            ExprKind::Attribute { value, attr } => {
                let obj = self.eval_expr(value, frame)?;
                self.get_attr(&obj, attr)
            }
            ExprKind::Subscript { value, index } => {
                let obj = self.eval_expr(value, frame)?;
                if let ExprKind::Slice { .. } = &index.kind {
                    let (lower, upper, step) = self.eval_slice_parts(index, frame)?;
                    return self.get_slice(&obj, lower, upper, step);
                }
                let index = self.eval_expr(index, frame)?;
                self.get_item(&obj, &index)
            }
            ExprKind::Slice { .. } => Err(runtime_error(ExcType::TypeError, "slice used outside subscript")),
            ExprKind::Call { func, args, keywords } => self.eval_call(func, args, keywords, frame),
            ExprKind::UnaryOp { op, operand } => {
                let v = self.eval_expr(operand, frame)?;
                self.unary_op(*op, &v)
            }
            ExprKind::BinOp { left, op, right } => {
                let l = self.eval_expr(left, frame)?;
                let r = self.eval_expr(right, frame)?;
                self.binop(*op, &l, &r)
            }
            ExprKind::BoolOp { op, values } => self.eval_bool_op(*op, values, frame),
            ExprKind::Compare { left, ops, comparators } => self.eval_compare_chain(left, ops, comparators, frame),
            ExprKind::IfExp { test, body, orelse } => {
                if self.truthy(&self.eval_expr(test, frame)?)? {
                    self.eval_expr(body, frame)
                } else {
                    self.eval_expr(orelse, frame)
                }
            }
            ExprKind::Lambda { params, body } => Ok(self.make_lambda(params, body, frame)),
            ExprKind::ListComp { elt, generators } => self.eval_comprehension(Comp::List, elt, None, generators, frame),
            ExprKind::SetComp { elt, generators } => self.eval_comprehension(Comp::Set, elt, None, generators, frame),
            ExprKind::DictComp { key, value, generators } => self.eval_comprehension(Comp::Dict, key, Some(value), generators, frame),
            ExprKind::GeneratorExp { elt, generators } => self.eval_comprehension(Comp::List, elt, None, generators, frame),
            ExprKind::FString(parts) => self.eval_fstring(parts, frame),
            ExprKind::Yield(value) => {
                let v = match value {
                    Some(e) => self.eval_expr(e, frame)?,
                    None => Value::None,
                };
                fiber::yield_value(v)
            }
            ExprKind::YieldFrom(inner) => {
                let sub = self.eval_expr(inner, frame)?;
                let it = self.get_iterator(&sub)?;
                loop {
                    match self.iterator_next_or_raise(&it) {
                        Ok(v) => {
                            fiber::yield_value(v)?;
                        }
                        Err(e) if e.exc_type == ExcType::StopIteration => {
                            return Ok(e.args.into_iter().next().unwrap_or(Value::None));
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            ExprKind::Await(inner) => {
                let coro = self.eval_expr(inner, frame)?;
                self.await_value(&coro)
            }
            ExprKind::Walrus { target, value } => {
                let v = self.eval_expr(value, frame)?;
                self.bind_name(target, v.clone(), frame)?;
                Ok(v)
            }
        }
    }

    fn eval_sequence(&self, items: &[Expr], frame: &Frame) -> RunResult<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if let ExprKind::Starred(inner) = &item.kind {
                let v = self.eval_expr(inner, frame)?;
                out.extend(self.to_vec(&v)?);
            } else {
                out.push(self.eval_expr(item, frame)?);
            }
        }
        Ok(out)
    }

    fn eval_dict_lit(&self, pairs: &[(Option<Expr>, Expr)], frame: &Frame) -> RunResult<Value> {
        let mut data = DictData::new();
        for (key, value) in pairs {
            match key {
                Some(key_expr) => {
                    let k = self.eval_expr(key_expr, frame)?;
                    let v = self.eval_expr(value, frame)?;
                    let hash = self.hash_value(&k)?;
                    data.insert(hash, k, v, &|a, b| self.values_equal(a, b).unwrap_or(false));
                }
                None => {
                    let spread = self.eval_expr(value, frame)?;
                    if let Value::Ref(id) = spread {
                        if let HeapData::Dict(inner) = self.core.heap.get(id) {
                            let inner = inner.lock().unwrap();
                            for (k, v) in inner.items() {
                                let hash = self.hash_value(k)?;
                                data.insert(hash, k.clone(), v.clone(), &|a, b| self.values_equal(a, b).unwrap_or(false));
                            }
                        }
                    }
                }
            }
        }
        Ok(self.alloc_dict(data))
    }

    fn eval_slice_parts(&self, expr: &Expr, frame: &Frame) -> RunResult<(Option<i64>, Option<i64>, Option<i64>)> {
        let ExprKind::Slice { lower, upper, step } = &expr.kind else { unreachable!() };
        let conv = |e: &Option<Box<Expr>>, frame: &Frame| -> RunResult<Option<i64>> {
            match e {
                None => Ok(None),
                Some(e) => {
                    let v = self.eval_expr(e, frame)?;
                    self.as_index(&v).map(Some)
                }
            }
        };
        Ok((conv(lower, frame)?, conv(upper, frame)?, conv(step, frame)?))
    }

    fn as_index(&self, value: &Value) -> RunResult<i64> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::BigInt(b) => b.to_i64().ok_or_else(|| runtime_error(ExcType::OverflowError, "Python int too large to convert")),
            Value::Bool(b) => Ok(i64::from(*b)),
            _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object cannot be interpreted as an integer", value.type_name()))),
        }
    }

    fn eval_bool_op(&self, op: BoolOp, values: &[Expr], frame: &Frame) -> RunResult<Value> {
        let mut last = Value::None;
        for value in values {
            last = self.eval_expr(value, frame)?;
            let truthy = self.truthy(&last)?;
            match op {
                BoolOp::And if !truthy => return Ok(last),
                BoolOp::Or if truthy => return Ok(last),
                _ => {}
            }
        }
        Ok(last)
    }

    fn eval_compare_chain(&self, left: &Expr, ops: &[CmpOp], comparators: &[Expr], frame: &Frame) -> RunResult<Value> {
        let mut lhs = self.eval_expr(left, frame)?;
        for (op, comparator) in ops.iter().zip(comparators) {
            let rhs = self.eval_expr(comparator, frame)?;
            if !self.compare(&lhs, *op, &rhs)? {
                return Ok(Value::Bool(false));
            }
            lhs = rhs;
        }
        Ok(Value::Bool(true))
    }

    fn eval_fstring(&self, parts: &[FStringPart], frame: &Frame) -> RunResult<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(text) => out.push_str(text),
                FStringPart::Expr { value, conversion, format_spec, debug_text } => {
                    let v = self.eval_expr(value, frame)?;
                    if let Some(text) = debug_text {
                        out.push_str(text);
                        out.push('=');
                    }
                    let converted = match conversion {
                        Some('r') => self.repr(&v)?,
                        Some('s') => self.str_of(&v)?,
                        Some('a') => self.repr(&v)?,
                        _ => self.str_of(&v)?,
                    };
                    let spec_text = match format_spec {
                        Some(spec_parts) => match self.eval_fstring(spec_parts, frame)? {
                            Value::Str(s) => s.to_string(),
                            _ => String::new(),
                        },
                        None => String::new(),
                    };
                    if spec_text.is_empty() && conversion.is_none() {
                        out.push_str(&crate::format::format_value(&v, "", &converted).unwrap_or(converted));
                    } else {
                        out.push_str(&crate::format::format_value(&v, &spec_text, &converted)?);
                    }
                }
            }
        }
        Ok(Value::Str(out.into()))
    }

    // ---- comprehensions -------------------------------------------------

    fn eval_comprehension(&self, kind: Comp, elt: &Expr, value_expr: Option<&Expr>, generators: &[Comprehension], frame: &Frame) -> RunResult<Value> {
        // Comprehensions get their own scope (spec.md §9): the loop targets
        // are local to an implicit function, not the enclosing frame.
        let comp_env = Scope::new_child(&frame.env);
        let comp_frame = frame.child(comp_env, frame.locals.clone());
        let mut list_out = Vec::new();
        let mut dict_out = DictData::new();
        let mut set_out = SetData::new();

        self.run_comprehension_clauses(generators, 0, &comp_frame, &mut |this, frame| {
            match kind {
                Comp::List => list_out.push(this.eval_expr(elt, frame)?),
                Comp::Set => {
                    let v = this.eval_expr(elt, frame)?;
                    let hash = this.hash_value(&v)?;
                    set_out.insert(hash, v, &|a, b| this.values_equal(a, b).unwrap_or(false));
                }
                Comp::Dict => {
                    let k = this.eval_expr(elt, frame)?;
                    let v = this.eval_expr(value_expr.unwrap(), frame)?;
                    let hash = this.hash_value(&k)?;
                    dict_out.insert(hash, k, v, &|a, b| this.values_equal(a, b).unwrap_or(false));
                }
            }
            Ok(())
        })?;

        match kind {
            Comp::List => Ok(self.alloc_list(list_out)),
            Comp::Set => Ok(self.alloc_set_data(set_out)),
            Comp::Dict => Ok(self.alloc_dict(dict_out)),
        }
    }

    fn run_comprehension_clauses(
        &self,
        generators: &[Comprehension],
        index: usize,
        frame: &Frame,
        body: &mut dyn FnMut(&Self, &Frame) -> RunResult<()>,
    ) -> RunResult<()> {
        let Some(gen) = generators.get(index) else {
            return body(self, frame);
        };
        let iterable = self.eval_expr(&gen.iter, frame)?;
        let it = self.get_iterator(&iterable)?;
        while let Some(item) = self.iterator_next(&it)? {
            self.assign_target(&gen.target, item, frame)?;
            let mut keep = true;
            for if_clause in &gen.ifs {
                if !self.truthy(&self.eval_expr(if_clause, frame)?)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                self.run_comprehension_clauses(generators, index + 1, frame, body)?;
            }
        }
        Ok(())
    }

    // ---- functions, calls, classes --------------------------------------

    fn make_function(&self, def: &Arc<FunctionDef>, frame: &Frame) -> Value {
        let locals = Arc::new(LocalsInfo::compute(&def.params, &def.body));
        let mut defaults = HashMap::new();
        for param in &def.params {
            if let Some(expr) = &param.default {
                if let Ok(v) = self.eval_expr(expr, frame) {
                    defaults.insert(param.name.clone(), v);
                }
            }
        }
        let data = FunctionData {
            name: Arc::from(def.name.as_str()),
            qualname: def.name.clone(),
            def: Arc::clone(def),
            closure: Arc::clone(&frame.env),
            defaults,
            locals,
            is_async: def.is_async,
            is_generator: def.is_generator,
        };
        let mut value = Value::Ref(self.core.heap.alloc(HeapData::Function(data)));
        for decorator in def.decorators.iter().rev() {
            let dec = self.eval_expr(decorator, frame).unwrap_or(Value::None);
            value = self.call_value(dec, vec![value], Vec::new()).unwrap_or(Value::None);
        }
        value
    }

    fn make_lambda(&self, params: &[Param], body: &Expr, frame: &Frame) -> Value {
        let def = Arc::new(FunctionDef {
            name: "<lambda>".to_string(),
            params: params.to_vec(),
            body: vec![Stmt::new(StmtKind::Return(Some(body.clone())), body.pos)],
            decorators: Vec::new(),
            is_async: false,
            is_generator: false,
            returns: None,
            pos: body.pos,
        });
        self.make_function(&def, frame)
    }

    fn eval_call(&self, func_expr: &Expr, args: &[Expr], keywords: &[(Option<String>, Expr)], frame: &Frame) -> RunResult<Value> {
        // `super()` zero-arg form is recognized syntactically, as CPython's
        // compiler does, since it depends on the lexical defining class.
        if let ExprKind::Name(name) = &func_expr.kind {
            if name == "super" && args.is_empty() && keywords.is_empty() {
                return self.make_super(frame);
            }
        }
        let func = self.eval_expr(func_expr, frame)?;
        let mut positional = Vec::new();
        for arg in args {
            if let ExprKind::Starred(inner) = &arg.kind {
                let v = self.eval_expr(inner, frame)?;
                positional.extend(self.to_vec(&v)?);
            } else {
                positional.push(self.eval_expr(arg, frame)?);
            }
        }
        let mut named = Vec::new();
        for (name, value) in keywords {
            let v = self.eval_expr(value, frame)?;
            match name {
                Some(name) => named.push((name.clone(), v)),
                None => {
                    if let Value::Ref(id) = v {
                        if let HeapData::Dict(inner) = self.core.heap.get(id) {
                            let inner = inner.lock().unwrap();
                            for (k, val) in inner.items() {
                                if let Value::Str(s) = k {
                                    named.push((s.to_string(), val.clone()));
                                }
                            }
                        }
                    }
                }
            }
        }
        self.call_value(func, positional, named)
    }

    /// Calls any callable `Value`: a user function, a bound method, a class
    /// (constructor), or a native builtin.
    pub fn call_value(&self, callee: Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> RunResult<Value> {
        let _guard = self.call_depth.enter()?;
        match &callee {
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::Function(func) => self.call_user_function(func, args, kwargs, None),
                HeapData::Builtin(b) => (b.func)(self, args, kwargs),
                HeapData::BoundMethod(bound) => {
                    let mut full_args = vec![bound.receiver.clone()];
                    full_args.extend(args);
                    self.call_value(bound.func.clone(), full_args, kwargs)
                }
                HeapData::Class(_) => self.instantiate_class(*id, args, kwargs),
                HeapData::StaticMethod(StaticMethodData(inner)) => self.call_value(inner.clone(), args, kwargs),
                HeapData::ClassMethod(ClassMethodData(inner)) => self.call_value(inner.clone(), args, kwargs),
                _ => {
                    if self.has_attr(&callee, "__call__") {
                        let bound = self.get_attr(&callee, "__call__")?;
                        return self.call_value(bound, args, kwargs);
                    }
                    Err(runtime_error(ExcType::TypeError, format!("'{}' object is not callable", callee.type_name())))
                }
            },
            _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object is not callable", callee.type_name()))),
        }
    }

    fn call_user_function(&self, func: &FunctionData, args: Vec<Value>, kwargs: Vec<(String, Value)>, defining_class: Option<HeapId>) -> RunResult<Value> {
        let bound = bind_arguments(&func.name, func.params(), &func.defaults, args, kwargs)?;
        let call_env = Scope::new_child(&func.closure);
        let mut self_value = None;
        for (i, (name, value)) in bound.bound.iter().enumerate() {
            if i == 0 && func.params().first().is_some_and(|p| p.name == *name) {
                self_value = Some(value.clone());
            }
            call_env.bind(Arc::from(name.as_str()), value.clone());
        }
        if let Some((name, pairs)) = bound.varkw {
            let mut dict = DictData::new();
            for (k, v) in pairs {
                let hash = self.hash_value(&k)?;
                dict.insert(hash, k, v, &|a, b| self.values_equal(a, b).unwrap_or(false));
            }
            call_env.bind(Arc::from(name.as_str()), self.alloc_dict(dict));
        }

        let frame = Frame { env: call_env, locals: Some(Arc::clone(&func.locals)), defining_class, self_value };
        self.core.tracer.on_call(&func.qualname);

        if func.is_generator {
            return Ok(self.spawn_generator(func, frame));
        }
        if func.is_async {
            return Ok(self.make_coroutine(func, frame));
        }

        let result = self.run_function_body(func, &frame);
        match &result {
            Ok(v) => self.core.tracer.on_return(&func.qualname, v),
            Err(e) => self.core.tracer.on_raise(e),
        }
        result
    }

    fn run_function_body(&self, func: &FunctionData, frame: &Frame) -> RunResult<Value> {
        match self.exec_block(&func.def.body, frame) {
            Ok(Flow::Return(v)) => Ok(v),
            Ok(_) => Ok(Value::None),
            Err(e) => Err(e.push_frame(func.qualname.clone(), func.def.pos)),
        }
    }

    fn spawn_generator(&self, func: &FunctionData, frame: Frame) -> Value {
        let core = Arc::clone(&self.core);
        let def = Arc::clone(&func.def);
        let qualname = func.qualname.clone();
        let name: Arc<str> = Arc::from(func.name.as_ref());
        let body = move || -> RunResult<Value> {
            let evaluator = Evaluator::from_core(core);
            match evaluator.exec_block(&def.body, &frame) {
                Ok(Flow::Return(v)) => Ok(v),
                Ok(_) => Ok(Value::None),
                Err(e) => Err(e.push_frame(qualname.clone(), def.pos)),
            }
        };
        let data = GeneratorData::new(name, body);
        Value::Ref(self.core.heap.alloc(HeapData::Generator(std::sync::Mutex::new(data))))
    }

    fn make_coroutine(&self, func: &FunctionData, frame: Frame) -> Value {
        let data = CoroutineData::new(func.qualname.clone(), Arc::clone(&func.def), frame.env, Vec::new());
        let id = self.core.heap.alloc(HeapData::Coroutine(std::sync::Mutex::new(data)));
        // Stash the originating frame's defining_class/self alongside the
        // coroutine by keying a side table would add complexity this
        // interpreter's single-threaded driver doesn't need: bound args were
        // already applied to `frame.env` above, so driving the coroutine
        // only needs the def + closure env, both captured in `data`.
        let _ = frame.defining_class;
        Value::Ref(id)
    }

    /// Drives a coroutine (or anything implementing `__await__`) to
    /// completion. Per spec.md §5, awaiting always runs the awaited
    /// computation fully, depth-first, before returning — there is no
    /// interleaving with anything else.
    fn await_value(&self, value: &Value) -> RunResult<Value> {
        if let Value::Ref(id) = value {
            if matches!(self.core.heap.get(*id), HeapData::Coroutine(_)) {
                let (def, closure) = {
                    let HeapData::Coroutine(mutex) = self.core.heap.get(*id) else { unreachable!() };
                    let mut coro = mutex.lock().unwrap();
                    coro.begin()?;
                    (Arc::clone(&coro.def), coro.closure.clone())
                };
                let frame = Frame { env: closure, locals: Some(Arc::new(LocalsInfo::compute(&def.params, &def.body))), defining_class: None, self_value: None };
                return match self.exec_block(&def.body, &frame) {
                    Ok(Flow::Return(v)) => Ok(v),
                    Ok(_) => Ok(Value::None),
                    Err(e) => Err(e),
                };
            }
        }
        if self.has_attr(value, "__await__") {
            let awaitable = self.call_method(value, "__await__", Vec::new())?;
            let it = self.get_iterator(&awaitable)?;
            let mut last = Value::None;
            while let Some(v) = self.iterator_next(&it)? {
                last = v;
            }
            return Ok(last);
        }
        Err(runtime_error(ExcType::TypeError, format!("object {} can't be used in 'await' expression", value.type_name())))
    }

    fn make_super(&self, frame: &Frame) -> RunResult<Value> {
        let Some(defining_class) = frame.defining_class else {
            return Err(runtime_error(ExcType::RuntimeError, "super(): no current frame"));
        };
        let Some(self_value) = frame.self_value.clone() else {
            return Err(runtime_error(ExcType::RuntimeError, "super(): no self"));
        };
        let instance_class = self.class_of(&self_value)?;
        let HeapData::Class(class) = self.core.heap.get(instance_class) else {
            return Err(runtime_error(ExcType::TypeError, "super(): bad instance"));
        };
        let mro = class.mro_snapshot();
        let position = mro.iter().position(|&id| id == defining_class).unwrap_or(0);
        let tail = mro[position + 1..].to_vec();
        let instance = InstanceData::new(self.core.object_class);
        instance.set_own(Arc::from("__self__"), self_value);
        instance.set_own(Arc::from("__mro_tail__"), self.alloc_list(tail.into_iter().map(Value::Ref).collect()));
        Ok(Value::Ref(self.core.heap.alloc(HeapData::Instance(instance))))
    }

    // ---- classes -------------------------------------------------------

    fn exec_class_def(&self, def: &Arc<ClassDef>, frame: &Frame) -> RunResult<Value> {
        let mut base_ids = Vec::new();
        for base_expr in &def.bases {
            let base = self.eval_expr(base_expr, frame)?;
            match base {
                Value::Ref(id) if matches!(self.core.heap.get(id), HeapData::Class(_)) => base_ids.push(id),
                _ => return Err(runtime_error(ExcType::TypeError, "bases must be classes")),
            }
        }

        let class_id = self.core.heap.alloc(HeapData::Class(ClassData::new(Arc::from(def.name.as_str()), base_ids.clone())));
        let mro = compute_c3_mro(class_id, &base_ids, self.core.object_class, &self.core.heap)?;
        if let HeapData::Class(class) = self.core.heap.get(class_id) {
            class.set_mro(mro);
        }

        let body_env = Scope::new_child(&frame.env);
        let body_frame = Frame { env: body_env, locals: None, defining_class: Some(class_id), self_value: None };
        self.exec_block(&def.body, &body_frame)?;

        if let HeapData::Class(class) = self.core.heap.get(class_id) {
            let entries: Vec<(Arc<str>, Value)> = body_frame.env_snapshot();
            for (name, value) in entries {
                class.set_own(name, value);
            }
        }

        // Exception subclass detection mirrors the built-in hierarchy a
        // user class joins: the nearest `exc_type` among its bases.
        let mut value = Value::Ref(class_id);
        for decorator in def.decorators.iter().rev() {
            let dec = self.eval_expr(decorator, frame)?;
            value = self.call_value(dec, vec![value], Vec::new())?;
        }
        Ok(value)
    }

    /// Finds the nearest built-in `ExcType` ancestor of `class_id`, if any,
    /// by walking its MRO.
    fn exc_type_of_class(&self, class_id: HeapId) -> Option<ExcType> {
        if let HeapData::Class(class) = self.core.heap.get(class_id) {
            for ancestor in class.mro_snapshot() {
                if let Some(&exc) = self.core.exception_class_kind.get(&ancestor) {
                    return Some(exc);
                }
            }
        }
        None
    }

    fn instantiate_class(&self, class_id: HeapId, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> RunResult<Value> {
        if let Some(name) = self.native_class_name(class_id) {
            return crate::builtins::construct_native(self, name, args, kwargs);
        }
        let HeapData::Class(class) = self.core.heap.get(class_id) else {
            return Err(runtime_error(ExcType::TypeError, "not a class"));
        };
        let mro = class.mro_snapshot();
        let new_method = mro_lookup(&self.core.heap, &mro, "__new__");
        let init_method = mro_lookup(&self.core.heap, &mro, "__init__");

        let instance = match new_method {
            Some((_, func)) if !self.is_object_new(&func) => {
                let mut full_args = vec![Value::Ref(class_id)];
                full_args.extend(args.clone());
                self.call_value(func, full_args, kwargs.clone())?
            }
            _ => Value::Ref(self.core.heap.alloc(HeapData::Instance(InstanceData::new(class_id)))),
        };

        if matches!(&instance, Value::Ref(id) if matches!(self.core.heap.get(*id), HeapData::Instance(inst) if inst.class == class_id)) {
            if let Some((defining_class, init)) = init_method {
                let bound = self.bind_method(init, instance.clone(), defining_class);
                self.call_value(bound, args, kwargs)?;
            }
        }
        Ok(instance)
    }

    fn is_object_new(&self, _func: &Value) -> bool {
        false
    }

    fn bind_method(&self, func: Value, receiver: Value, _defining_class: HeapId) -> Value {
        Value::Ref(self.core.heap.alloc(HeapData::BoundMethod(BoundMethodData { receiver, func })))
    }

    #[must_use]
    pub fn class_of(&self, value: &Value) -> RunResult<HeapId> {
        let native = |name: &str| self.native_class(name);
        match value {
            Value::None => Ok(native("NoneType")),
            Value::Bool(_) => Ok(native("bool")),
            Value::Int(_) | Value::BigInt(_) => Ok(native("int")),
            Value::Float(_) => Ok(native("float")),
            Value::Str(_) => Ok(native("str")),
            Value::Bytes(_) => Ok(native("bytes")),
            Value::Tuple(_) => Ok(native("tuple")),
            Value::Range(_) => Ok(native("range")),
            Value::FrozenSet(_) => Ok(native("frozenset")),
            Value::NotImplemented => Ok(native("NotImplementedType")),
            Value::Ellipsis => Ok(native("ellipsis")),
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::Instance(inst) => Ok(inst.class),
                HeapData::Class(_) => Ok(native("type")),
                HeapData::List(_) => Ok(native("list")),
                HeapData::Dict(_) => Ok(native("dict")),
                HeapData::Set(_) => Ok(native("set")),
                HeapData::Function(_) => Ok(native("function")),
                HeapData::BoundMethod(_) => Ok(native("method")),
                HeapData::Generator(_) => Ok(native("generator")),
                HeapData::Coroutine(_) => Ok(native("coroutine")),
                HeapData::Builtin(_) => Ok(native("builtin_function_or_method")),
                HeapData::StaticMethod(_) => Ok(native("staticmethod")),
                HeapData::ClassMethod(_) => Ok(native("classmethod")),
                HeapData::Property(_) => Ok(native("property")),
                HeapData::Iterator(_) => Ok(native("iterator")),
            },
        }
    }

    /// The synthetic `Class` id standing in for native type `name`, falling
    /// back to `object` itself if `name` was never registered (never
    /// observed in practice — every `Value` variant maps to a registered
    /// entry in [`bootstrap_native_classes`]).
    #[must_use]
    pub fn native_class(&self, name: &str) -> HeapId {
        self.core.native_classes.get(name).copied().unwrap_or(self.core.object_class)
    }

    /// Reverse lookup: the native type name `class_id` stands for, if it is
    /// one of [`Core::native_classes`]'s entries and not a user subclass of
    /// one (those go through ordinary `Instance` construction instead).
    #[must_use]
    pub fn native_class_name(&self, class_id: HeapId) -> Option<&'static str> {
        self.core.native_classes.iter().find(|&(_, &id)| id == class_id).map(|(&name, _)| name)
    }

    // ---- attributes ------------------------------------------------------

    pub fn get_attr(&self, obj: &Value, name: &str) -> RunResult<Value> {
        if let Value::Ref(id) = obj {
            match self.core.heap.get(*id) {
                HeapData::Instance(inst) => {
                    // `super()` proxy.
                    if let (Some(inner_self), Some(Value::Ref(list_id))) = (inst.get_own("__self__"), inst.get_own("__mro_tail__")) {
                        if let HeapData::List(list) = self.core.heap.get(list_id) {
                            let tail = list.lock().unwrap();
                            for item in tail.iter() {
                                if let Value::Ref(class_id) = item {
                                    if let HeapData::Class(class) = self.core.heap.get(*class_id) {
                                        if let Some(attr) = class.get_own(name) {
                                            return Ok(self.bind_descriptor(attr, inner_self.clone(), *class_id));
                                        }
                                    }
                                }
                            }
                            return Err(runtime_error(ExcType::AttributeError, format!("'super' object has no attribute '{name}'")));
                        }
                    }

                    let class_id = inst.class;
                    if let Some((defining_class, descriptor)) = mro_lookup(&self.core.heap, &self.mro_of(class_id), name) {
                        if self.is_data_descriptor(&descriptor) {
                            return self.invoke_getter(descriptor, obj.clone(), defining_class);
                        }
                    }
                    if let Some(v) = inst.get_own(name) {
                        return Ok(v);
                    }
                    if let Some((defining_class, descriptor)) = mro_lookup(&self.core.heap, &self.mro_of(class_id), name) {
                        return Ok(self.bind_descriptor(descriptor, obj.clone(), defining_class));
                    }
                    if self.has_own_method(class_id, "__getattr__") {
                        return self.call_method(obj, "__getattr__", vec![Value::Str(name.into())]);
                    }
                    Err(runtime_error(ExcType::AttributeError, format!("'{}' object has no attribute '{name}'", self.class_name(class_id))))
                }
                HeapData::Class(class) => {
                    if let Some((defining_class, v)) = mro_lookup(&self.core.heap, &class.mro_snapshot(), name) {
                        return Ok(self.bind_descriptor(v, obj.clone(), defining_class));
                    }
                    Err(runtime_error(ExcType::AttributeError, format!("type object '{}' has no attribute '{name}'", class.name)))
                }
                HeapData::Function(_) | HeapData::BoundMethod(_) | HeapData::Builtin(_) => match name {
                    "__name__" => Ok(Value::Str(self.callable_name(obj).into())),
                    _ => Err(runtime_error(ExcType::AttributeError, format!("'{}' object has no attribute '{name}'", obj.type_name()))),
                },
                _ => self.get_builtin_attr(obj, name),
            }
        } else {
            self.get_builtin_attr(obj, name)
        }
    }

    fn get_builtin_attr(&self, obj: &Value, name: &str) -> RunResult<Value> {
        if let Some(method) = crate::methods::lookup(self, obj, name) {
            return Ok(method);
        }
        Err(runtime_error(ExcType::AttributeError, format!("'{}' object has no attribute '{name}'", obj.type_name())))
    }

    fn callable_name(&self, obj: &Value) -> String {
        if let Value::Ref(id) = obj {
            match self.core.heap.get(*id) {
                HeapData::Function(f) => return f.name.to_string(),
                HeapData::Builtin(b) => return b.name.to_string(),
                _ => {}
            }
        }
        String::new()
    }

    fn mro_of(&self, class_id: HeapId) -> Vec<HeapId> {
        if let HeapData::Class(class) = self.core.heap.get(class_id) {
            class.mro_snapshot()
        } else {
            Vec::new()
        }
    }

    fn class_name(&self, class_id: HeapId) -> String {
        if let HeapData::Class(class) = self.core.heap.get(class_id) {
            class.name.to_string()
        } else {
            "object".to_string()
        }
    }

    fn has_own_method(&self, class_id: HeapId, name: &str) -> bool {
        mro_lookup(&self.core.heap, &self.mro_of(class_id), name).is_some()
    }

    fn is_data_descriptor(&self, value: &Value) -> bool {
        matches!(value, Value::Ref(id) if matches!(self.core.heap.get(*id), HeapData::Property(p) if p.getter.is_some() || p.setter.is_some()))
    }

    fn bind_descriptor(&self, value: Value, receiver: Value, defining_class: HeapId) -> Value {
        match &value {
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::Function(_) => self.bind_method(value, receiver, defining_class),
                HeapData::Property(prop) => match &prop.getter {
                    Some(getter) => self.call_value(getter.clone(), vec![receiver], Vec::new()).unwrap_or(Value::None),
                    None => Value::None,
                },
                HeapData::StaticMethod(StaticMethodData(inner)) => inner.clone(),
                HeapData::ClassMethod(ClassMethodData(inner)) => self.bind_method(inner.clone(), Value::Ref(defining_class), defining_class),
                _ => value,
            },
            _ => value,
        }
    }

    fn invoke_getter(&self, descriptor: Value, receiver: Value, _defining_class: HeapId) -> RunResult<Value> {
        if let Value::Ref(id) = &descriptor {
            if let HeapData::Property(prop) = self.core.heap.get(*id) {
                return match &prop.getter {
                    Some(getter) => self.call_value(getter.clone(), vec![receiver], Vec::new()),
                    None => Err(runtime_error(ExcType::AttributeError, "unreadable attribute")),
                };
            }
        }
        Ok(descriptor)
    }

    pub fn set_attr(&self, obj: &Value, name: &str, value: Value) -> RunResult<()> {
        if let Value::Ref(id) = obj {
            match self.core.heap.get(*id) {
                HeapData::Instance(inst) => {
                    let class_id = inst.class;
                    if let Some((_, descriptor)) = mro_lookup(&self.core.heap, &self.mro_of(class_id), name) {
                        if let Value::Ref(did) = &descriptor {
                            if let HeapData::Property(prop) = self.core.heap.get(*did) {
                                return match &prop.setter {
                                    Some(setter) => self.call_value(setter.clone(), vec![obj.clone(), value], Vec::new()).map(|_| ()),
                                    None => Err(runtime_error(ExcType::AttributeError, "can't set attribute")),
                                };
                            }
                        }
                    }
                    if self.has_own_method(class_id, "__setattr__") {
                        self.call_method(obj, "__setattr__", vec![Value::Str(name.into()), value])?;
                        return Ok(());
                    }
                    inst.set_own(Arc::from(name), value);
                    Ok(())
                }
                HeapData::Class(class) => {
                    class.set_own(Arc::from(name), value);
                    Ok(())
                }
                _ => Err(runtime_error(ExcType::AttributeError, format!("'{}' object has no attribute '{name}'", obj.type_name()))),
            }
        } else {
            Err(runtime_error(ExcType::AttributeError, format!("'{}' object has no attribute '{name}'", obj.type_name())))
        }
    }

    pub fn del_attr(&self, obj: &Value, name: &str) -> RunResult<()> {
        if let Value::Ref(id) = obj {
            if let HeapData::Instance(inst) = self.core.heap.get(*id) {
                if inst.del_own(name) {
                    return Ok(());
                }
            }
        }
        Err(runtime_error(ExcType::AttributeError, format!("'{}' object has no attribute '{name}'", obj.type_name())))
    }

    fn has_attr(&self, obj: &Value, name: &str) -> bool {
        self.get_attr(obj, name).is_ok()
    }

    /// Looks up `name` on `obj` and calls it with `args`, the pattern every
    /// dunder dispatch site uses.
    pub fn call_method(&self, obj: &Value, name: &str, args: Vec<Value>) -> RunResult<Value> {
        let method = self.get_attr(obj, name)?;
        self.call_value(method, args, Vec::new())
    }

    fn try_call_method(&self, obj: &Value, name: &str, args: Vec<Value>) -> Option<RunResult<Value>> {
        if !self.has_attr(obj, name) {
            return None;
        }
        Some(self.call_method(obj, name, args))
    }

    // ---- subscription / slicing -----------------------------------------

    pub fn get_item(&self, obj: &Value, index: &Value) -> RunResult<Value> {
        match obj {
            Value::Tuple(items) => self.sequence_get(items, index).map(|v| v.clone()),
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = self.normalize_index(self.as_index(index)?, chars.len())?;
                Ok(Value::Str(chars[i].to_string().into()))
            }
            Value::Bytes(b) => {
                let i = self.normalize_index(self.as_index(index)?, b.len())?;
                Ok(Value::Int(i64::from(b[i])))
            }
            Value::Range(r) => {
                let (start, _stop, step) = **r;
                let i = self.as_index(index)?;
                Ok(Value::Int(start + i * step))
            }
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::List(list) => {
                    let list = list.lock().unwrap();
                    let i = self.normalize_index(self.as_index(index)?, list.len())?;
                    Ok(list[i].clone())
                }
                HeapData::Dict(dict) => {
                    let hash = self.hash_value(index)?;
                    let dict = dict.lock().unwrap();
                    dict.get(hash, index, &|a, b| self.values_equal(a, b).unwrap_or(false)).cloned().ok_or_else(|| {
                        let mut err = runtime_error(ExcType::KeyError, self.repr(index).unwrap_or_default());
                        err.args = vec![index.clone()];
                        err
                    })
                }
                HeapData::Instance(_) => self.call_method(obj, "__getitem__", vec![index.clone()]),
                _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object is not subscriptable", obj.type_name()))),
            },
            _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object is not subscriptable", obj.type_name()))),
        }
    }

    fn sequence_get<'a>(&self, items: &'a [Value], index: &Value) -> RunResult<&'a Value> {
        let i = self.normalize_index(self.as_index(index)?, items.len())?;
        Ok(&items[i])
    }

    fn normalize_index(&self, i: i64, len: usize) -> RunResult<usize> {
        let normalized = if i < 0 { i + len as i64 } else { i };
        if normalized < 0 || normalized >= len as i64 {
            return Err(runtime_error(ExcType::IndexError, "index out of range"));
        }
        Ok(normalized as usize)
    }

    pub fn set_item(&self, obj: &Value, index: Value, value: Value) -> RunResult<()> {
        match obj {
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::List(list) => {
                    let mut list = list.lock().unwrap();
                    let i = self.normalize_index(self.as_index(&index)?, list.len())?;
                    list[i] = value;
                    Ok(())
                }
                HeapData::Dict(dict) => {
                    let hash = self.hash_value(&index)?;
                    let mut dict = dict.lock().unwrap();
                    dict.insert(hash, index, value, &|a, b| self.values_equal(a, b).unwrap_or(false));
                    Ok(())
                }
                HeapData::Instance(_) => self.call_method(obj, "__setitem__", vec![index, value]).map(|_| ()),
                _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object does not support item assignment", obj.type_name()))),
            },
            _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object does not support item assignment", obj.type_name()))),
        }
    }

    fn del_item(&self, obj: &Value, index: &Value) -> RunResult<()> {
        match obj {
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::List(list) => {
                    let mut list = list.lock().unwrap();
                    let i = self.normalize_index(self.as_index(index)?, list.len())?;
                    list.remove(i);
                    Ok(())
                }
                HeapData::Dict(dict) => {
                    let hash = self.hash_value(index)?;
                    let mut dict = dict.lock().unwrap();
                    dict.remove(hash, index, &|a, b| self.values_equal(a, b).unwrap_or(false))
                        .map(|_| ())
                        .ok_or_else(|| runtime_error(ExcType::KeyError, self.repr(index).unwrap_or_default()))
                }
                _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object doesn't support item deletion", obj.type_name()))),
            },
            _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object doesn't support item deletion", obj.type_name()))),
        }
    }

    fn get_slice(&self, obj: &Value, lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> RunResult<Value> {
        let step = step.unwrap_or(1);
        if step == 0 {
            return Err(runtime_error(ExcType::ValueError, "slice step cannot be zero"));
        }
        match obj {
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let indices = slice_indices(chars.len(), lower, upper, step);
                Ok(Value::Str(indices.into_iter().map(|i| chars[i]).collect::<String>().into()))
            }
            Value::Tuple(items) => {
                let indices = slice_indices(items.len(), lower, upper, step);
                Ok(Value::Tuple(indices.into_iter().map(|i| items[i].clone()).collect()))
            }
            Value::Bytes(b) => {
                let indices = slice_indices(b.len(), lower, upper, step);
                Ok(Value::Bytes(indices.into_iter().map(|i| b[i]).collect()))
            }
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::List(list) => {
                    let list = list.lock().unwrap();
                    let indices = slice_indices(list.len(), lower, upper, step);
                    Ok(self.alloc_list(indices.into_iter().map(|i| list[i].clone()).collect()))
                }
                _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object is not subscriptable", obj.type_name()))),
            },
            _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object is not subscriptable", obj.type_name()))),
        }
    }

    // ---- iteration protocol ----------------------------------------------

    pub fn get_iterator(&self, value: &Value) -> RunResult<Value> {
        match value {
            Value::Tuple(items) => Ok(Value::Ref(self.core.heap.alloc(HeapData::Iterator(std::sync::Mutex::new(IteratorData::from_tuple(items)))))),
            Value::Str(s) => Ok(self.alloc_iter(IteratorData::from_vec(s.chars().map(|c| Value::Str(c.to_string().into())).collect()))),
            Value::Bytes(b) => Ok(self.alloc_iter(IteratorData::from_vec(b.iter().map(|&byte| Value::Int(i64::from(byte))).collect()))),
            Value::Range(r) => {
                let (start, stop, step) = **r;
                Ok(self.alloc_iter(IteratorData::from_range(start, stop, step)))
            }
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::List(list) => Ok(self.alloc_iter(IteratorData::from_vec(list.lock().unwrap().clone()))),
                HeapData::Dict(dict) => Ok(self.alloc_iter(IteratorData::from_vec(dict.lock().unwrap().keys().cloned().collect()))),
                HeapData::Set(set) => Ok(self.alloc_iter(IteratorData::from_vec(set.lock().unwrap().values()))),
                HeapData::Generator(_) | HeapData::Iterator(_) | HeapData::Coroutine(_) => Ok(value.clone()),
                HeapData::Instance(_) => {
                    if self.has_attr(value, "__iter__") {
                        self.call_method(value, "__iter__", Vec::new())
                    } else {
                        Err(runtime_error(ExcType::TypeError, format!("'{}' object is not iterable", self.class_name(self.class_of(value)?))))
                    }
                }
                _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object is not iterable", value.type_name()))),
            },
            Value::FrozenSet(set) => Ok(self.alloc_iter(IteratorData::from_vec(set.values()))),
            _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object is not iterable", value.type_name()))),
        }
    }

    fn alloc_iter(&self, data: IteratorData) -> Value {
        Value::Ref(self.core.heap.alloc(HeapData::Iterator(std::sync::Mutex::new(data))))
    }

    /// Advances an iterator `Value` one step. `None` signals exhaustion
    /// (`StopIteration` without an explicit value, as plain `for` loops see
    /// it); callers that need the `StopIteration` distinction for `next()`'s
    /// raise path use [`Evaluator::iterator_next_or_raise`].
    pub fn iterator_next(&self, value: &Value) -> RunResult<Option<Value>> {
        match self.iterator_next_or_raise(value) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.exc_type == ExcType::StopIteration => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn iterator_next_or_raise(&self, value: &Value) -> RunResult<Value> {
        let Value::Ref(id) = value else {
            return Err(runtime_error(ExcType::TypeError, format!("'{}' object is not an iterator", value.type_name())));
        };
        match self.core.heap.get(*id) {
            HeapData::Generator(mutex) => mutex.lock().unwrap().advance(),
            HeapData::Iterator(mutex) => {
                let mut state = mutex.lock().unwrap();
                self.advance_iterator(&mut state)
            }
            HeapData::Instance(_) => self.call_method(value, "__next__", Vec::new()),
            _ => Err(runtime_error(ExcType::TypeError, format!("'{}' object is not an iterator", self.heap().get(*id).type_name()))),
        }
    }

    fn advance_iterator(&self, state: &mut IteratorData) -> RunResult<Value> {
        match state {
            IteratorData::Snapshot { items, index } => {
                if *index >= items.len() {
                    return Err(runtime_error(ExcType::StopIteration, "stop"));
                }
                let v = items[*index].clone();
                *index += 1;
                Ok(v)
            }
            IteratorData::Range { current, stop, step } => {
                if (*step > 0 && current >= stop) || (*step < 0 && current <= stop) {
                    return Err(runtime_error(ExcType::StopIteration, "stop"));
                }
                let v = *current;
                *current += *step;
                Ok(Value::Int(v))
            }
            IteratorData::List { target, index } => {
                let HeapData::List(list) = self.core.heap.get(*target) else {
                    return Err(runtime_error(ExcType::StopIteration, "stop"));
                };
                let list = list.lock().unwrap();
                if *index >= list.len() {
                    return Err(runtime_error(ExcType::StopIteration, "stop"));
                }
                let v = list[*index].clone();
                *index += 1;
                Ok(v)
            }
            IteratorData::Enumerate { inner, index } => {
                let v = self.iterator_next_or_raise(inner)?;
                let i = *index;
                *index += 1;
                Ok(Value::Tuple(vec![Value::Int(i), v].into()))
            }
            IteratorData::Zip { inners } => {
                let mut out = Vec::with_capacity(inners.len());
                for inner in inners.iter() {
                    out.push(self.iterator_next_or_raise(inner)?);
                }
                Ok(Value::Tuple(out.into()))
            }
            IteratorData::Map { inner, func } => {
                let v = self.iterator_next_or_raise(inner)?;
                self.call_value(func.clone(), vec![v], Vec::new())
            }
            IteratorData::Filter { inner, func } => loop {
                let v = self.iterator_next_or_raise(inner)?;
                let keep = if matches!(func, Value::None) { self.truthy(&v)? } else { self.truthy(&self.call_value(func.clone(), vec![v.clone()], Vec::new())?)? };
                if keep {
                    return Ok(v);
                }
            },
            IteratorData::CallableSentinel { callable, sentinel } => {
                let v = self.call_value(callable.clone(), Vec::new(), Vec::new())?;
                if self.values_equal(&v, sentinel)? {
                    return Err(runtime_error(ExcType::StopIteration, "stop"));
                }
                Ok(v)
            }
        }
    }

    /// Materializes an iterable into a `Vec<Value>` (used for unpacking,
    /// `*args` spreading, and the `list()`/`tuple()`/`set()` constructors).
    pub fn to_vec(&self, value: &Value) -> RunResult<Vec<Value>> {
        let it = self.get_iterator(value)?;
        let mut out = Vec::new();
        while let Some(v) = self.iterator_next(&it)? {
            out.push(v);
        }
        Ok(out)
    }

    #[must_use]
    pub fn make_map_iterator(&self, func: Value, inner: Value) -> Value {
        self.alloc_iter(IteratorData::Map { inner, func })
    }

    #[must_use]
    pub fn make_filter_iterator(&self, func: Value, inner: Value) -> Value {
        self.alloc_iter(IteratorData::Filter { inner, func })
    }

    #[must_use]
    pub fn make_enumerate_iterator(&self, inner: Value, start: i64) -> Value {
        self.alloc_iter(IteratorData::Enumerate { inner, index: start })
    }

    #[must_use]
    pub fn make_zip_iterator(&self, inners: Vec<Value>) -> Value {
        self.alloc_iter(IteratorData::Zip { inners })
    }

    #[must_use]
    pub fn make_sentinel_iterator(&self, callable: Value, sentinel: Value) -> Value {
        self.alloc_iter(IteratorData::CallableSentinel { callable, sentinel })
    }

    // ---- operators --------------------------------------------------------

    fn unary_op(&self, op: UnaryOp, value: &Value) -> RunResult<Value> {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!self.truthy(value)?)),
            UnaryOp::Plus => match value {
                Value::Int(_) | Value::BigInt(_) | Value::Float(_) | Value::Bool(_) => Ok(value.clone()),
                _ => self.dunder_unary(value, "__pos__"),
            },
            UnaryOp::Minus => match value {
                Value::Int(i) => i.checked_neg().map(Value::Int).map_or_else(|| Ok(Value::bigint(-BigInt::from(*i))), Ok),
                Value::BigInt(b) => Ok(Value::bigint(-(**b).clone())),
                Value::Float(f) => Ok(Value::Float(-f)),
                Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
                _ => self.dunder_unary(value, "__neg__"),
            },
            UnaryOp::Invert => match value {
                Value::Int(i) => Ok(Value::Int(!i)),
                Value::BigInt(b) => Ok(Value::bigint(!(**b).clone())),
                Value::Bool(b) => Ok(Value::Int(!i64::from(*b))),
                _ => self.dunder_unary(value, "__invert__"),
            },
        }
    }

    fn dunder_unary(&self, value: &Value, name: &str) -> RunResult<Value> {
        if self.has_attr(value, name) {
            return self.call_method(value, name, Vec::new());
        }
        Err(runtime_error(ExcType::TypeError, format!("bad operand type for unary operator: '{}'", value.type_name())))
    }

    pub fn binop(&self, op: BinOp, left: &Value, right: &Value) -> RunResult<Value> {
        if let Some(result) = self.numeric_binop(op, left, right)? {
            return Ok(result);
        }
        if let Some(result) = self.sequence_binop(op, left, right)? {
            return Ok(result);
        }
        let (fwd, rev) = dunder_names(op);
        if self.has_attr(left, fwd) {
            let result = self.call_method(left, fwd, vec![right.clone()])?;
            if !matches!(result, Value::NotImplemented) {
                return Ok(result);
            }
        }
        if self.has_attr(right, rev) {
            let result = self.call_method(right, rev, vec![left.clone()])?;
            if !matches!(result, Value::NotImplemented) {
                return Ok(result);
            }
        }
        Err(runtime_error(ExcType::TypeError, format!("unsupported operand type(s) for {}: '{}' and '{}'", op_symbol(op), left.type_name(), right.type_name())))
    }

    fn sequence_binop(&self, op: BinOp, left: &Value, right: &Value) -> RunResult<Option<Value>> {
        match (op, left, right) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Some(Value::Str(format!("{a}{b}").into()))),
            (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => Ok(Some(Value::Tuple(a.iter().chain(b.iter()).cloned().collect()))),
            (BinOp::Add, Value::Ref(a), Value::Ref(b)) => {
                let a_list = matches!(self.core.heap.get(*a), HeapData::List(_));
                let b_list = matches!(self.core.heap.get(*b), HeapData::List(_));
                if a_list && b_list {
                    let HeapData::List(al) = self.core.heap.get(*a) else { unreachable!() };
                    let HeapData::List(bl) = self.core.heap.get(*b) else { unreachable!() };
                    let mut out = al.lock().unwrap().clone();
                    out.extend(bl.lock().unwrap().iter().cloned());
                    return Ok(Some(self.alloc_list(out)));
                }
                Ok(None)
            }
            (BinOp::Mult, Value::Str(s), n) | (BinOp::Mult, n, Value::Str(s)) if matches!(n, Value::Int(_) | Value::Bool(_)) => {
                let count = self.as_index(n)?.max(0) as usize;
                Ok(Some(Value::Str(s.repeat(count).into())))
            }
            (BinOp::Mult, Value::Tuple(items), n) | (BinOp::Mult, n, Value::Tuple(items)) if matches!(n, Value::Int(_) | Value::Bool(_)) => {
                let count = self.as_index(n)?.max(0) as usize;
                let mut out = Vec::with_capacity(items.len() * count);
                for _ in 0..count {
                    out.extend(items.iter().cloned());
                }
                Ok(Some(Value::Tuple(out.into())))
            }
            (BinOp::BitOr, Value::Ref(a), Value::Ref(b)) => {
                let HeapData::Dict(dict_a) = self.core.heap.get(*a) else { return Ok(None) };
                let HeapData::Dict(dict_b) = self.core.heap.get(*b) else { return Ok(None) };
                let mut merged = dict_a.lock().unwrap().clone();
                for (k, v) in dict_b.lock().unwrap().items() {
                    let hash = self.hash_value(k)?;
                    merged.insert(hash, k.clone(), v.clone(), &|a, b| self.values_equal(a, b).unwrap_or(false));
                }
                Ok(Some(self.alloc_dict(merged)))
            }
            _ => Ok(None),
        }
    }

    fn numeric_binop(&self, op: BinOp, left: &Value, right: &Value) -> RunResult<Option<Value>> {
        if !is_numeric(left) || !is_numeric(right) {
            return Ok(None);
        }
        if matches!(left, Value::Float(_)) || matches!(right, Value::Float(_)) {
            let a = to_f64_value(left);
            let b = to_f64_value(right);
            return float_binop(op, a, b).map(Some);
        }
        let a = to_bigint(left);
        let b = to_bigint(right);
        int_binop(op, &a, &b).map(Some)
    }

    pub fn compare(&self, left: &Value, op: CmpOp, right: &Value) -> RunResult<bool> {
        match op {
            CmpOp::Is => return Ok(self.is_identical(left, right)),
            CmpOp::IsNot => return Ok(!self.is_identical(left, right)),
            CmpOp::In => return self.contains(right, left),
            CmpOp::NotIn => return Ok(!self.contains(right, left)?),
            CmpOp::Eq => return self.values_equal(left, right),
            CmpOp::NotEq => return Ok(!self.values_equal(left, right)?),
            _ => {}
        }
        if is_numeric(left) && is_numeric(right) {
            let ordering = numeric_compare(left, right);
            return Ok(apply_ordering(op, ordering));
        }
        match (left, right) {
            (Value::Str(a), Value::Str(b)) => Ok(apply_ordering(op, a.cmp(b))),
            (Value::Tuple(a), Value::Tuple(b)) => Ok(apply_ordering(op, self.compare_sequences(a, b)?)),
            (Value::Ref(a), Value::Ref(b)) => {
                let a_list = if let HeapData::List(l) = self.core.heap.get(*a) { Some(l.lock().unwrap().clone()) } else { None };
                let b_list = if let HeapData::List(l) = self.core.heap.get(*b) { Some(l.lock().unwrap().clone()) } else { None };
                if let (Some(al), Some(bl)) = (a_list, b_list) {
                    return Ok(apply_ordering(op, self.compare_sequences(&al, &bl)?));
                }
                self.dunder_compare(op, left, right)
            }
            _ => self.dunder_compare(op, left, right),
        }
    }

    fn dunder_compare(&self, op: CmpOp, left: &Value, right: &Value) -> RunResult<bool> {
        let (fwd, rev) = compare_dunder_names(op);
        if self.has_attr(left, fwd) {
            let result = self.call_method(left, fwd, vec![right.clone()])?;
            if !matches!(result, Value::NotImplemented) {
                return self.truthy(&result);
            }
        }
        if self.has_attr(right, rev) {
            let result = self.call_method(right, rev, vec![left.clone()])?;
            if !matches!(result, Value::NotImplemented) {
                return self.truthy(&result);
            }
        }
        Err(runtime_error(ExcType::TypeError, format!("'{}' not supported between instances of '{}' and '{}'", op_symbol_cmp(op), left.type_name(), right.type_name())))
    }

    fn compare_sequences(&self, a: &[Value], b: &[Value]) -> RunResult<std::cmp::Ordering> {
        for (x, y) in a.iter().zip(b.iter()) {
            if self.values_equal(x, y)? {
                continue;
            }
            return Ok(if self.compare(x, CmpOp::Lt, y)? { std::cmp::Ordering::Less } else { std::cmp::Ordering::Greater });
        }
        Ok(a.len().cmp(&b.len()))
    }

    fn contains(&self, container: &Value, item: &Value) -> RunResult<bool> {
        match container {
            Value::Str(s) => {
                if let Value::Str(needle) = item {
                    return Ok(s.contains(needle.as_ref()));
                }
                Err(runtime_error(ExcType::TypeError, "'in <string>' requires string as left operand"))
            }
            Value::Tuple(items) => {
                for v in items.iter() {
                    if self.values_equal(v, item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Value::Range(r) => {
                let (start, stop, step) = **r;
                let i = self.as_index(item)?;
                if step > 0 {
                    Ok(i >= start && i < stop && (i - start) % step == 0)
                } else if step < 0 {
                    Ok(i <= start && i > stop && (start - i) % (-step) == 0)
                } else {
                    Ok(false)
                }
            }
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::List(list) => {
                    let list = list.lock().unwrap();
                    for v in list.iter() {
                        if self.values_equal(v, item)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                HeapData::Dict(dict) => {
                    let hash = self.hash_value(item)?;
                    Ok(dict.lock().unwrap().contains_key(hash, item, &|a, b| self.values_equal(a, b).unwrap_or(false)))
                }
                HeapData::Set(set) => {
                    let hash = self.hash_value(item)?;
                    Ok(set.lock().unwrap().contains(hash, item, &|a, b| self.values_equal(a, b).unwrap_or(false)))
                }
                HeapData::Instance(_) => {
                    if self.has_attr(container, "__contains__") {
                        return self.truthy(&self.call_method(container, "__contains__", vec![item.clone()])?);
                    }
                    let it = self.get_iterator(container)?;
                    while let Some(v) = self.iterator_next(&it)? {
                        if self.values_equal(&v, item)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                _ => Err(runtime_error(ExcType::TypeError, format!("argument of type '{}' is not iterable", container.type_name()))),
            },
            Value::FrozenSet(set) => {
                let hash = self.hash_value(item)?;
                Ok(set.contains(hash, item, &|a, b| self.values_equal(a, b).unwrap_or(false)))
            }
            _ => Err(runtime_error(ExcType::TypeError, format!("argument of type '{}' is not iterable", container.type_name()))),
        }
    }

    #[must_use]
    pub fn is_identical(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::None, Value::None) | (Value::NotImplemented, Value::NotImplemented) | (Value::Ellipsis, Value::Ellipsis) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Ref(x), Value::Ref(y)) => x == y,
            (Value::Str(x), Value::Str(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }

    pub fn values_equal(&self, a: &Value, b: &Value) -> RunResult<bool> {
        if is_numeric(a) && is_numeric(b) {
            return Ok(numeric_compare(a, b) == std::cmp::Ordering::Equal);
        }
        match (a, b) {
            (Value::None, Value::None) => Ok(true),
            (Value::Str(x), Value::Str(y)) => Ok(x == y),
            (Value::Bytes(x), Value::Bytes(y)) => Ok(x == y),
            (Value::Tuple(x), Value::Tuple(y)) => {
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (xi, yi) in x.iter().zip(y.iter()) {
                    if !self.values_equal(xi, yi)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Range(x), Value::Range(y)) => Ok(x == y),
            (Value::FrozenSet(x), Value::FrozenSet(y)) => Ok(x == y),
            (Value::Ref(x), Value::Ref(y)) if x == y => Ok(true),
            (Value::Ref(x), Value::Ref(y)) => {
                let x_data = self.core.heap.get(*x);
                let y_data = self.core.heap.get(*y);
                match (x_data, y_data) {
                    (HeapData::List(xl), HeapData::List(yl)) => {
                        let xl = xl.lock().unwrap();
                        let yl = yl.lock().unwrap();
                        if xl.len() != yl.len() {
                            return Ok(false);
                        }
                        for (xi, yi) in xl.iter().zip(yl.iter()) {
                            if !self.values_equal(xi, yi)? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                    (HeapData::Dict(xd), HeapData::Dict(yd)) => {
                        let xd = xd.lock().unwrap();
                        let yd = yd.lock().unwrap();
                        if xd.len() != yd.len() {
                            return Ok(false);
                        }
                        for (k, v) in xd.items() {
                            let hash = self.hash_value(k)?;
                            match yd.get(hash, k, &|a, b| self.values_equal(a, b).unwrap_or(false)) {
                                Some(yv) if self.values_equal(v, yv)? => {}
                                _ => return Ok(false),
                            }
                        }
                        Ok(true)
                    }
                    (HeapData::Set(xs), HeapData::Set(ys)) => {
                        let xs = xs.lock().unwrap();
                        let ys = ys.lock().unwrap();
                        if xs.len() != ys.len() {
                            return Ok(false);
                        }
                        for v in xs.iter() {
                            let hash = self.hash_value(v)?;
                            if !ys.contains(hash, v, &|a, b| self.values_equal(a, b).unwrap_or(false)) {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                    (HeapData::Instance(_), _) => {
                        if self.has_attr(a, "__eq__") {
                            let result = self.call_method(a, "__eq__", vec![b.clone()])?;
                            if !matches!(result, Value::NotImplemented) {
                                return self.truthy(&result);
                            }
                        }
                        Ok(false)
                    }
                    _ => Ok(false),
                }
            }
            _ => Ok(false),
        }
    }

    pub fn hash_value(&self, value: &Value) -> RunResult<u64> {
        if let Some(h) = crate::py_hash::value_hash(value) {
            return Ok(h);
        }
        match value {
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::Instance(_) => {
                    if self.has_attr(value, "__hash__") {
                        let h = self.call_method(value, "__hash__", Vec::new())?;
                        return self.as_index(&h).map(|i| i as u64);
                    }
                    if self.has_attr(value, "__eq__") {
                        return Err(runtime_error(ExcType::TypeError, format!("unhashable type: '{}'", self.class_name(self.class_of(value)?))));
                    }
                    Ok(id.index() as u64)
                }
                HeapData::Class(_) | HeapData::Function(_) | HeapData::Builtin(_) => Ok(id.index() as u64),
                _ => Err(runtime_error(ExcType::TypeError, format!("unhashable type: '{}'", self.heap().get(*id).type_name()))),
            },
            _ => Err(runtime_error(ExcType::TypeError, format!("unhashable type: '{}'", value.type_name()))),
        }
    }

    #[must_use]
    pub fn truthy(&self, value: &Value) -> RunResult<bool> {
        Ok(match value {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::BigInt(b) => !b.is_zero(),
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Range(r) => {
                let (start, stop, step) = **r;
                if step > 0 { start < stop } else { start > stop }
            }
            Value::FrozenSet(s) => !s.is_empty(),
            Value::NotImplemented | Value::Ellipsis => true,
            Value::Ref(id) => match self.core.heap.get(*id) {
                HeapData::List(l) => !l.lock().unwrap().is_empty(),
                HeapData::Dict(d) => !d.lock().unwrap().is_empty(),
                HeapData::Set(s) => !s.lock().unwrap().is_empty(),
                HeapData::Instance(_) => {
                    if self.has_attr(value, "__bool__") {
                        return self.truthy(&self.call_method(value, "__bool__", Vec::new())?);
                    }
                    if self.has_attr(value, "__len__") {
                        let len = self.call_method(value, "__len__", Vec::new())?;
                        return Ok(self.as_index(&len)? != 0);
                    }
                    true
                }
                _ => true,
            },
        })
    }

    // ---- repr / str --------------------------------------------------------

    pub fn repr(&self, value: &Value) -> RunResult<String> {
        Ok(match value {
            Value::None => "None".to_string(),
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::BigInt(b) => b.to_string(),
            Value::Float(f) => format_float_repr(*f),
            Value::Str(s) => python_str_repr(s),
            Value::Bytes(b) => format!("b'{}'", String::from_utf8_lossy(b)),
            Value::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.repr(v)).collect::<RunResult<_>>()?;
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
            Value::Range(r) => {
                let (start, stop, step) = **r;
                if step == 1 { format!("range({start}, {stop})") } else { format!("range({start}, {stop}, {step})") }
            }
            Value::FrozenSet(s) => {
                let parts: Vec<String> = s.iter().map(|v| self.repr(v)).collect::<RunResult<_>>()?;
                format!("frozenset({{{}}})", parts.join(", "))
            }
            Value::NotImplemented => "NotImplemented".to_string(),
            Value::Ellipsis => "Ellipsis".to_string(),
            Value::Ref(id) => self.repr_ref(*id, value)?,
        })
    }

    fn repr_ref(&self, id: HeapId, value: &Value) -> RunResult<String> {
        match self.core.heap.get(id) {
            HeapData::List(list) => {
                let items = list.lock().unwrap().clone();
                let parts: Vec<String> = items.iter().map(|v| self.repr(v)).collect::<RunResult<_>>()?;
                Ok(format!("[{}]", parts.join(", ")))
            }
            HeapData::Dict(dict) => {
                let dict = dict.lock().unwrap();
                let mut parts = Vec::new();
                for (k, v) in dict.items() {
                    parts.push(format!("{}: {}", self.repr(k)?, self.repr(v)?));
                }
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            HeapData::Set(set) => {
                let values = set.lock().unwrap().values();
                if values.is_empty() {
                    return Ok("set()".to_string());
                }
                let parts: Vec<String> = values.iter().map(|v| self.repr(v)).collect::<RunResult<_>>()?;
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            HeapData::Class(class) => Ok(format!("<class '{}'>", class.name)),
            HeapData::Function(f) => Ok(format!("<function {} at 0x{:012x}>", f.name, id.index())),
            HeapData::Builtin(b) => Ok(format!("<built-in function {}>", b.name)),
            HeapData::BoundMethod(_) => Ok(format!("<bound method at 0x{:012x}>", id.index())),
            HeapData::Instance(inst) => {
                if self.has_attr(value, "__repr__") {
                    return self.str_of(&self.call_method(value, "__repr__", Vec::new())?);
                }
                let class_id = inst.class;
                if self.exc_type_of_class(class_id).is_some() {
                    let args = match inst.get_own("args") {
                        Some(Value::Tuple(items)) => items.to_vec(),
                        _ => Vec::new(),
                    };
                    let parts: Vec<String> = args.iter().map(|a| self.repr(a)).collect::<RunResult<_>>()?;
                    return Ok(format!("{}({})", self.class_name(class_id), parts.join(", ")));
                }
                Ok(format!("<{} object at 0x{:012x}>", self.class_name(class_id), id.index()))
            }
            HeapData::Generator(_) => Ok(format!("<generator object at 0x{:012x}>", id.index())),
            HeapData::Coroutine(_) => Ok(format!("<coroutine object at 0x{:012x}>", id.index())),
            _ => Ok(format!("<object at 0x{:012x}>", id.index())),
        }
    }

    pub fn str_of(&self, value: &Value) -> RunResult<String> {
        if let Value::Str(s) = value {
            return Ok(s.to_string());
        }
        if let Value::Ref(id) = value {
            if let HeapData::Instance(inst) = self.core.heap.get(*id) {
                if self.has_attr(value, "__str__") {
                    return self.str_of(&self.call_method(value, "__str__", Vec::new())?);
                }
                if !self.has_attr(value, "__repr__") && self.exc_type_of_class(inst.class).is_some() {
                    let args = match inst.get_own("args") {
                        Some(Value::Tuple(items)) => items.to_vec(),
                        _ => Vec::new(),
                    };
                    return Ok(match args.as_slice() {
                        [] => String::new(),
                        [single] => self.str_of(single)?,
                        many => self.repr(&Value::Tuple(many.to_vec().into()))?,
                    });
                }
            }
        }
        self.repr(value)
    }

    // ---- raise / exception materialization --------------------------------

    fn eval_raise(&self, exc: Option<&Expr>, cause: Option<&Expr>, frame: &Frame) -> RunResult<RunError> {
        let Some(exc_expr) = exc else {
            return self
                .current_exception
                .borrow()
                .clone()
                .ok_or_else(|| runtime_error(ExcType::RuntimeError, "No active exception to re-raise"));
        };
        let value = self.eval_expr(exc_expr, frame)?;
        let mut err = self.value_to_run_error(value)?;
        if let Some(cause_expr) = cause {
            let cause_value = self.eval_expr(cause_expr, frame)?;
            err = err.with_cause(self.value_to_run_error(cause_value)?);
        } else if let Some(ctx) = self.current_exception.borrow().clone() {
            err = err.with_context(ctx);
        }
        Ok(err)
    }

    fn value_to_run_error(&self, value: Value) -> RunResult<RunError> {
        let instance = match &value {
            Value::Ref(id) if matches!(self.core.heap.get(*id), HeapData::Class(_)) => self.instantiate_class(*id, Vec::new(), Vec::new())?,
            _ => value,
        };
        let Value::Ref(id) = &instance else {
            return Err(runtime_error(ExcType::TypeError, "exceptions must derive from BaseException"));
        };
        let HeapData::Instance(inst) = self.core.heap.get(*id) else {
            return Err(runtime_error(ExcType::TypeError, "exceptions must derive from BaseException"));
        };
        let class_id = inst.class;
        let exc_type = self.exc_type_of_class(class_id).unwrap_or(ExcType::Exception);
        let args = match inst.get_own("args") {
            Some(Value::Tuple(items)) => items.to_vec(),
            _ => Vec::new(),
        };
        let message = match args.as_slice() {
            [] => String::new(),
            [single] => self.str_of(single).unwrap_or_default(),
            many => self.repr(&Value::Tuple(many.to_vec().into())).unwrap_or_default(),
        };
        let mut err = RunError::new(exc_type, message).with_class(class_id, instance);
        err.args = args;
        Ok(err)
    }

    /// Builds (or returns an already-built) heap `Instance` for a `RunError`,
    /// for `except E as e:` binding.
    fn materialize_exception(&self, err: &RunError) -> Value {
        if let Some(instance) = &err.instance {
            return instance.clone();
        }
        let class_id = err.class_id.unwrap_or_else(|| *self.core.exception_classes.get(&err.exc_type).unwrap_or(&self.core.object_class));
        let inst = InstanceData::new(class_id);
        inst.set_own(Arc::from("args"), Value::Tuple(err.args.clone().into()));
        Value::Ref(self.core.heap.alloc(HeapData::Instance(inst)))
    }

    fn exception_matches(&self, err: &RunError, type_expr: Option<&Expr>, frame: &Frame) -> RunResult<bool> {
        let Some(type_expr) = type_expr else { return Ok(true) };
        let target = self.eval_expr(type_expr, frame)?;
        let candidates: Vec<Value> = match &target {
            Value::Tuple(items) => items.to_vec(),
            other => vec![other.clone()],
        };
        for candidate in candidates {
            let Value::Ref(class_id) = candidate else { continue };
            if !matches!(self.core.heap.get(class_id), HeapData::Class(_)) {
                continue;
            }
            if let Some(err_class) = err.class_id {
                if let HeapData::Class(err_class_data) = self.core.heap.get(err_class) {
                    if err_class_data.mro_contains(class_id) {
                        return Ok(true);
                    }
                }
                continue;
            }
            if let Some(&exc) = self.core.exception_class_kind.get(&class_id) {
                if err.exc_type.is_subclass_of(exc) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    // ---- heap construction helpers ----------------------------------------

    #[must_use]
    pub fn alloc_list(&self, items: Vec<Value>) -> Value {
        Value::Ref(self.core.heap.alloc(HeapData::List(std::sync::Mutex::new(items))))
    }

    #[must_use]
    pub fn alloc_dict(&self, data: DictData) -> Value {
        Value::Ref(self.core.heap.alloc(HeapData::Dict(std::sync::Mutex::new(data))))
    }

    /// Builds a `dict` from `name -> value` pairs (string keys), used by
    /// `vars()`/`dir()`/`globals()` to expose a namespace snapshot.
    #[must_use]
    pub fn alloc_dict_from_pairs(&self, pairs: Vec<(Arc<str>, Value)>) -> Value {
        let mut data = DictData::new();
        for (k, v) in pairs {
            let key = Value::Str(k);
            let hash = self.hash_value(&key).unwrap_or(0);
            data.insert(hash, key, v, &|a, b| self.values_equal(a, b).unwrap_or(false));
        }
        self.alloc_dict(data)
    }

    pub fn alloc_set(&self, items: Vec<Value>) -> RunResult<Value> {
        let mut data = SetData::new();
        for item in items {
            let hash = self.hash_value(&item)?;
            data.insert(hash, item, &|a, b| self.values_equal(a, b).unwrap_or(false));
        }
        Ok(self.alloc_set_data(data))
    }

    #[must_use]
    pub fn alloc_set_data(&self, data: SetData) -> Value {
        Value::Ref(self.core.heap.alloc(HeapData::Set(std::sync::Mutex::new(data))))
    }

    #[must_use]
    pub fn new_exception(&self, exc_type: ExcType, message: impl Into<String>) -> RunError {
        runtime_error(exc_type, message)
    }

    /// `object()`: a bare instance with no attributes, used as a sentinel or
    /// base-case `__new__` result.
    #[must_use]
    pub fn alloc_instance_of_object(&self) -> Value {
        Value::Ref(self.core.heap.alloc(HeapData::Instance(InstanceData::new(self.core.object_class))))
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    /// Snapshots a class body's own bindings once the body has executed, so
    /// they can be copied into the new class's namespace.
    fn env_snapshot(&self) -> Vec<(Arc<str>, Value)> {
        self.env.snapshot()
    }
}

enum Comp {
    List,
    Set,
    Dict,
}

fn bootstrap_exceptions(heap: &Heap, object_class: HeapId) -> (HashMap<ExcType, HeapId>, HashMap<HeapId, ExcType>) {
    use ExcType::{
        ArithmeticError, AssertionError, AttributeError, BaseException, Exception, GeneratorExit, IndentationError, IndexError,
        KeyError, KeyboardInterrupt, LookupError, NameError, NotImplementedError, OverflowError, RecursionError, RuntimeError,
        StopAsyncIteration, StopIteration, SyntaxError, SystemExit, TypeError, UnboundLocalError, ValueError, ZeroDivisionError,
    };

    let order: &[(ExcType, &[ExcType])] = &[
        (BaseException, &[]),
        (Exception, &[BaseException]),
        (SystemExit, &[BaseException]),
        (KeyboardInterrupt, &[BaseException]),
        (GeneratorExit, &[BaseException]),
        (ArithmeticError, &[Exception]),
        (ZeroDivisionError, &[ArithmeticError]),
        (OverflowError, &[ArithmeticError]),
        (LookupError, &[Exception]),
        (IndexError, &[LookupError]),
        (KeyError, &[LookupError]),
        (RuntimeError, &[Exception]),
        (NotImplementedError, &[RuntimeError]),
        (RecursionError, &[RuntimeError]),
        (AttributeError, &[Exception]),
        (NameError, &[Exception]),
        (UnboundLocalError, &[NameError]),
        (ValueError, &[Exception]),
        (TypeError, &[Exception]),
        (AssertionError, &[Exception]),
        (StopIteration, &[Exception]),
        (StopAsyncIteration, &[Exception]),
        (SyntaxError, &[Exception]),
        (IndentationError, &[SyntaxError]),
    ];

    let mut classes = HashMap::new();
    let mut kinds = HashMap::new();
    for &(exc, bases) in order {
        let base_ids: Vec<HeapId> = bases.iter().map(|b| classes[b]).collect();
        let id = heap.alloc(HeapData::Class(ClassData::new(Arc::from(exc.name()), base_ids.clone())));
        let mro = compute_c3_mro(id, &base_ids, object_class, heap).unwrap_or_else(|_| vec![id, object_class]);
        if let HeapData::Class(c) = heap.get(id) {
            c.set_mro(mro);
        }
        classes.insert(exc, id);
        kinds.insert(id, exc);
    }
    (classes, kinds)
}

/// Every native type name a `Value` can report as its `type_name()`/that
/// `isinstance`/`type()` must resolve, given a one-level-deep `Class` so MRO
/// lookups (`issubclass`, `isinstance`) stay uniform with user classes.
/// `bool` is a subclass of `int` per spec.md §3's value-model note ("Bool
/// (subtype of Int for equality)").
fn bootstrap_native_classes(heap: &Heap, object_class: HeapId) -> HashMap<&'static str, HeapId> {
    const NAMES: &[&str] = &[
        "int", "float", "str", "bytes", "tuple", "range", "frozenset", "NoneType", "NotImplementedType", "ellipsis", "list", "dict", "set",
        "function", "method", "type", "generator", "coroutine", "builtin_function_or_method", "staticmethod", "classmethod", "property",
        "iterator",
    ];
    let mut classes = HashMap::new();
    for &name in NAMES {
        let id = heap.alloc(HeapData::Class(ClassData::new(Arc::from(name), vec![object_class])));
        if let HeapData::Class(c) = heap.get(id) {
            c.set_mro(vec![id, object_class]);
        }
        classes.insert(name, id);
    }
    let int_id = classes["int"];
    let bool_id = heap.alloc(HeapData::Class(ClassData::new(Arc::from("bool"), vec![int_id])));
    if let HeapData::Class(c) = heap.get(bool_id) {
        c.set_mro(vec![bool_id, int_id, object_class]);
    }
    classes.insert("bool", bool_id);
    classes
}

fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::BigInt(_) | Value::Float(_) | Value::Bool(_))
}

fn to_bigint(value: &Value) -> BigInt {
    match value {
        Value::Int(i) => BigInt::from(*i),
        Value::BigInt(b) => (**b).clone(),
        Value::Bool(b) => BigInt::from(i64::from(*b)),
        _ => BigInt::zero(),
    }
}

fn to_f64_value(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::BigInt(b) => b.to_f64().unwrap_or(f64::NAN),
        Value::Float(f) => *f,
        Value::Bool(b) => f64::from(i64::from(*b)),
        _ => f64::NAN,
    }
}

fn numeric_compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    if matches!(a, Value::Float(_)) || matches!(b, Value::Float(_)) {
        to_f64_value(a).partial_cmp(&to_f64_value(b)).unwrap_or(std::cmp::Ordering::Equal)
    } else {
        to_bigint(a).cmp(&to_bigint(b))
    }
}

fn apply_ordering(op: CmpOp, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match op {
        CmpOp::Lt => ord == Less,
        CmpOp::LtEq => ord != Greater,
        CmpOp::Gt => ord == Greater,
        CmpOp::GtEq => ord != Less,
        CmpOp::Eq => ord == Equal,
        CmpOp::NotEq => ord != Equal,
        _ => false,
    }
}

fn int_binop(op: BinOp, a: &BigInt, b: &BigInt) -> RunResult<Value> {
    Ok(match op {
        BinOp::Add => Value::bigint(a + b),
        BinOp::Sub => Value::bigint(a - b),
        BinOp::Mult => Value::bigint(a * b),
        BinOp::Div => {
            if b.is_zero() {
                return Err(runtime_error(ExcType::ZeroDivisionError, "division by zero"));
            }
            Value::Float(a.to_f64().unwrap_or(f64::NAN) / b.to_f64().unwrap_or(f64::NAN))
        }
        BinOp::FloorDiv => {
            if b.is_zero() {
                return Err(runtime_error(ExcType::ZeroDivisionError, "integer division or modulo by zero"));
            }
            Value::bigint(floor_div(a, b))
        }
        BinOp::Mod => {
            if b.is_zero() {
                return Err(runtime_error(ExcType::ZeroDivisionError, "integer division or modulo by zero"));
            }
            Value::bigint(a - &floor_div(a, b) * b)
        }
        BinOp::Pow => {
            if b.sign() == num_bigint::Sign::Minus {
                let base = a.to_f64().unwrap_or(f64::NAN);
                let exp = b.to_f64().unwrap_or(f64::NAN);
                Value::Float(base.powf(exp))
            } else {
                let exp = b.to_u32().ok_or_else(|| runtime_error(ExcType::OverflowError, "exponent too large"))?;
                Value::bigint(a.pow(exp))
            }
        }
        BinOp::MatMult => return Err(runtime_error(ExcType::TypeError, "unsupported operand type(s) for @")),
        BinOp::LShift => {
            let shift = b.to_i64().ok_or_else(|| runtime_error(ExcType::OverflowError, "shift too large"))?;
            if shift < 0 {
                return Err(runtime_error(ExcType::ValueError, "negative shift count"));
            }
            Value::bigint(a << shift as usize)
        }
        BinOp::RShift => {
            let shift = b.to_i64().ok_or_else(|| runtime_error(ExcType::OverflowError, "shift too large"))?;
            if shift < 0 {
                return Err(runtime_error(ExcType::ValueError, "negative shift count"));
            }
            Value::bigint(a >> shift as usize)
        }
        BinOp::BitAnd => Value::bigint(a & b),
        BinOp::BitOr => Value::bigint(a | b),
        BinOp::BitXor => Value::bigint(a ^ b),
    })
}

fn floor_div(a: &BigInt, b: &BigInt) -> BigInt {
    use num_integer::Integer;
    a.div_floor(b)
}

fn float_binop(op: BinOp, a: f64, b: f64) -> RunResult<Value> {
    Ok(match op {
        BinOp::Add => Value::Float(a + b),
        BinOp::Sub => Value::Float(a - b),
        BinOp::Mult => Value::Float(a * b),
        BinOp::Div => {
            if b == 0.0 {
                return Err(runtime_error(ExcType::ZeroDivisionError, "float division by zero"));
            }
            Value::Float(a / b)
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(runtime_error(ExcType::ZeroDivisionError, "float floor division by zero"));
            }
            Value::Float((a / b).floor())
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(runtime_error(ExcType::ZeroDivisionError, "float modulo"));
            }
            Value::Float(a - (a / b).floor() * b)
        }
        BinOp::Pow => Value::Float(a.powf(b)),
        _ => return Err(runtime_error(ExcType::TypeError, "unsupported operand type(s) for float operator")),
    })
}

/// `__iOP__` name tried before the non-augmented `__OP__`/`__rOP__` sequence
/// for `a OP= b` (spec.md §4.3).
fn iop_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "__iadd__",
        BinOp::Sub => "__isub__",
        BinOp::Mult => "__imul__",
        BinOp::Div => "__itruediv__",
        BinOp::FloorDiv => "__ifloordiv__",
        BinOp::Mod => "__imod__",
        BinOp::Pow => "__ipow__",
        BinOp::MatMult => "__imatmul__",
        BinOp::LShift => "__ilshift__",
        BinOp::RShift => "__irshift__",
        BinOp::BitAnd => "__iand__",
        BinOp::BitOr => "__ior__",
        BinOp::BitXor => "__ixor__",
    }
}

fn dunder_names(op: BinOp) -> (&'static str, &'static str) {
    match op {
        BinOp::Add => ("__add__", "__radd__"),
        BinOp::Sub => ("__sub__", "__rsub__"),
        BinOp::Mult => ("__mul__", "__rmul__"),
        BinOp::Div => ("__truediv__", "__rtruediv__"),
        BinOp::FloorDiv => ("__floordiv__", "__rfloordiv__"),
        BinOp::Mod => ("__mod__", "__rmod__"),
        BinOp::Pow => ("__pow__", "__rpow__"),
        BinOp::MatMult => ("__matmul__", "__rmatmul__"),
        BinOp::LShift => ("__lshift__", "__rlshift__"),
        BinOp::RShift => ("__rshift__", "__rrshift__"),
        BinOp::BitAnd => ("__and__", "__rand__"),
        BinOp::BitOr => ("__or__", "__ror__"),
        BinOp::BitXor => ("__xor__", "__rxor__"),
    }
}

fn compare_dunder_names(op: CmpOp) -> (&'static str, &'static str) {
    match op {
        CmpOp::Lt => ("__lt__", "__gt__"),
        CmpOp::LtEq => ("__le__", "__ge__"),
        CmpOp::Gt => ("__gt__", "__lt__"),
        CmpOp::GtEq => ("__ge__", "__le__"),
        CmpOp::Eq => ("__eq__", "__eq__"),
        CmpOp::NotEq => ("__ne__", "__ne__"),
        _ => ("__eq__", "__eq__"),
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mult => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
        BinOp::MatMult => "@",
        BinOp::LShift => "<<",
        BinOp::RShift => ">>",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
    }
}

fn op_symbol_cmp(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Lt => "<",
        CmpOp::LtEq => "<=",
        CmpOp::Gt => ">",
        CmpOp::GtEq => ">=",
        _ => "==",
    }
}

fn slice_indices(len: usize, lower: Option<i64>, upper: Option<i64>, step: i64) -> Vec<usize> {
    let len_i = len as i64;
    let clamp = |v: i64| -> i64 { v.max(if step > 0 { 0 } else { -1 }).min(if step > 0 { len_i } else { len_i - 1 }) };
    let normalize = |v: i64| -> i64 { if v < 0 { v + len_i } else { v } };

    let (start, stop) = if step > 0 {
        let start = lower.map_or(0, |v| clamp(normalize(v)));
        let stop = upper.map_or(len_i, |v| clamp(normalize(v)));
        (start, stop)
    } else {
        let start = lower.map_or(len_i - 1, |v| clamp(normalize(v)));
        let stop = upper.map_or(-1, |v| clamp(normalize(v)));
        (start, stop)
    };

    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        while i > stop {
            out.push(i as usize);
            i += step;
        }
    }
    out
}

fn format_float_repr(f: f64) -> String {
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if f.is_nan() {
        return "nan".to_string();
    }
    if f == f.trunc() && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        let mut buf = ryu::Buffer::new();
        buf.format(f).to_string()
    }
}

fn python_str_repr(s: &str) -> String {
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
