//! Runtime representation of a `def`-defined function.
//!
//! Grounded on the teacher's `function.rs` in spirit (a function value is its
//! defining metadata plus whatever closure state it needs) but holding an AST
//! body and a captured [`Env`] instead of compiled bytecode and namespace
//! slots, consistent with this crate's tree-walking evaluator.

use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::{Block, FunctionDef, Param, ParamKind};
use crate::namespace::Env;
use crate::value::Value;

/// Static classification of every name a function body binds or declares,
/// computed once per `FunctionDef` and cached here so the evaluator doesn't
/// re-walk the AST on every call.
///
/// This is what makes LEGB resolution (spec.md §4.4) and `UnboundLocalError`
/// work: a name assigned anywhere in the function body (and not declared
/// `global`/`nonlocal`) is local for the *entire* body, even above the
/// assignment that first binds it.
#[derive(Debug, Default)]
pub struct LocalsInfo {
    pub locals: HashSet<String>,
    pub globals: HashSet<String>,
    pub nonlocals: HashSet<String>,
}

impl LocalsInfo {
    pub fn compute(params: &[Param], body: &Block) -> Self {
        let mut info = LocalsInfo::default();
        for p in params {
            info.locals.insert(p.name.clone());
        }
        collect_block(body, &mut info);
        for g in &info.globals {
            info.locals.remove(g);
        }
        for n in &info.nonlocals {
            info.locals.remove(n);
        }
        info
    }

    #[must_use]
    pub fn is_local(&self, name: &str) -> bool {
        self.locals.contains(name)
    }

    #[must_use]
    pub fn is_global_decl(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    #[must_use]
    pub fn is_nonlocal_decl(&self, name: &str) -> bool {
        self.nonlocals.contains(name)
    }
}

fn collect_block(body: &Block, info: &mut LocalsInfo) {
    use crate::ast::StmtKind as S;
    for stmt in body {
        match &stmt.kind {
            S::Assign { targets, .. } => targets.iter().for_each(|t| collect_target(t, info)),
            S::AugAssign { target, .. } | S::AnnAssign { target, .. } => collect_target(target, info),
            S::If { body, orelse, .. } => {
                collect_block(body, info);
                collect_block(orelse, info);
            }
            S::While { body, orelse, .. } => {
                collect_block(body, info);
                collect_block(orelse, info);
            }
            S::For { target, body, orelse, .. } => {
                collect_target(target, info);
                collect_block(body, info);
                collect_block(orelse, info);
            }
            S::Try { body, handlers, orelse, finalbody } => {
                collect_block(body, info);
                for h in handlers {
                    if let Some(name) = &h.name {
                        info.locals.insert(name.clone());
                    }
                    collect_block(&h.body, info);
                }
                collect_block(orelse, info);
                collect_block(finalbody, info);
            }
            S::With { items, body, .. } => {
                for item in items {
                    if let Some(v) = &item.optional_vars {
                        collect_target(v, info);
                    }
                }
                collect_block(body, info);
            }
            S::FunctionDef(f) => {
                info.locals.insert(f.name.clone());
            }
            S::ClassDef(c) => {
                info.locals.insert(c.name.clone());
            }
            S::Global(names) => names.iter().for_each(|n| {
                info.globals.insert(n.clone());
            }),
            S::Nonlocal(names) => names.iter().for_each(|n| {
                info.nonlocals.insert(n.clone());
            }),
            S::Import { alias, module } => {
                info.locals.insert(alias.clone().unwrap_or_else(|| module.clone()));
            }
            S::ImportFrom { names, .. } => names.iter().for_each(|(name, alias)| {
                info.locals.insert(alias.clone().unwrap_or_else(|| name.clone()));
            }),
            _ => {}
        }
    }
}

fn collect_target(target: &crate::ast::Expr, info: &mut LocalsInfo) {
    use crate::ast::ExprKind as E;
    match &target.kind {
        E::Name(name) => {
            info.locals.insert(name.clone());
        }
        E::Walrus { target, .. } => {
            info.locals.insert(target.clone());
        }
        E::Tuple(items) | E::List(items) => items.iter().for_each(|i| collect_target(i, info)),
        E::Starred(inner) | E::DoubleStarred(inner) => collect_target(inner, info),
        _ => {}
    }
}

/// A `def`-defined (or `lambda`-defined) function value.
#[derive(Debug)]
pub struct FunctionData {
    pub name: Arc<str>,
    pub qualname: String,
    pub def: Arc<FunctionDef>,
    /// The scope the function was defined in; parent of the call frame.
    pub closure: Env,
    /// Evaluated default values, aligned to the trailing parameters that
    /// have one (both positional-or-keyword and keyword-only defaults live
    /// here, keyed by parameter name at bind time rather than position).
    pub defaults: std::collections::HashMap<String, Value>,
    pub locals: Arc<LocalsInfo>,
    pub is_async: bool,
    pub is_generator: bool,
}

impl FunctionData {
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.def.params
    }

    #[must_use]
    pub fn param_kind_counts(&self) -> (usize, usize) {
        let positional = self.def.params.iter().filter(|p| matches!(p.kind, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)).count();
        let keyword_only = self.def.params.iter().filter(|p| matches!(p.kind, ParamKind::KeywordOnly)).count();
        (positional, keyword_only)
    }
}
