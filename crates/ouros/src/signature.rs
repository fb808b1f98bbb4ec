//! Argument binding: matching a call site's positional/keyword arguments
//! (plus `*`/`**` unpacking already flattened by the evaluator) against a
//! function's parameter list.
//!
//! Grounded on the teacher's `signature.rs` for the binding *algorithm*
//! (positionals fill positional-or-keyword params left to right, spill into
//! `*args`; keywords fill by name or `**kwargs`; defaults fill what's left;
//! anything missing or duplicated is a `TypeError`) but operates directly on
//! `ast::Param` and named `Value`s instead of pre-resolved namespace slots,
//! since this crate has no compile pass.

use std::collections::HashMap;

use crate::ast::{Param, ParamKind};
use crate::exception::{ExcType, RunResult, runtime_error};
use crate::value::Value;

/// Result of binding a call's arguments: ordinary `(name, value)` pairs plus,
/// if the signature has a `**kwargs` parameter, the raw pairs it collected —
/// left for the evaluator to turn into a heap `dict` (this module has no
/// access to [`crate::heap`]).
#[derive(Debug, Default)]
pub struct BoundArgs {
    pub bound: Vec<(String, Value)>,
    pub varkw: Option<(String, Vec<(Value, Value)>)>,
}

/// Binds a call's arguments to `params`, returning `(name, value)` pairs
/// ready to be bound into the callee's frame. `func_name` is used only for
/// `TypeError` messages.
pub fn bind_arguments(
    func_name: &str,
    params: &[Param],
    defaults: &HashMap<String, Value>,
    mut positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> RunResult<BoundArgs> {
    let mut bound: Vec<(String, Value)> = Vec::with_capacity(params.len());
    let mut kwargs: HashMap<String, Value> = keywords.into_iter().collect();

    let positional_params: Vec<&Param> =
        params.iter().filter(|p| matches!(p.kind, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)).collect();
    let varargs = params.iter().find(|p| matches!(p.kind, ParamKind::VarArgs));
    let keyword_only: Vec<&Param> = params.iter().filter(|p| matches!(p.kind, ParamKind::KeywordOnly)).collect();
    let varkw = params.iter().find(|p| matches!(p.kind, ParamKind::VarKeyword));

    positional.reverse();
    for p in &positional_params {
        if let Some(v) = positional.pop() {
            if matches!(p.kind, ParamKind::PositionalOrKeyword) && kwargs.remove(&p.name).is_some() {
                return Err(runtime_error(ExcType::TypeError, format!("{func_name}() got multiple values for argument '{}'", p.name)));
            }
            bound.push((p.name.clone(), v));
        } else if let Some(kw) = matches!(p.kind, ParamKind::PositionalOrKeyword).then(|| kwargs.remove(&p.name)).flatten() {
            bound.push((p.name.clone(), kw));
        } else if let Some(def) = defaults.get(&p.name) {
            bound.push((p.name.clone(), def.clone()));
        } else {
            return Err(too_few_arguments(func_name));
        }
    }

    if !positional.is_empty() {
        if let Some(va) = varargs {
            positional.reverse();
            bound.push((va.name.clone(), Value::Tuple(positional.into())));
        } else {
            return Err(runtime_error(ExcType::TypeError, format!("{func_name}() takes {} positional argument(s) but more were given", positional_params.len())));
        }
    } else if let Some(va) = varargs {
        bound.push((va.name.clone(), Value::Tuple(Vec::new().into())));
    }

    for p in &keyword_only {
        if let Some(v) = kwargs.remove(&p.name) {
            bound.push((p.name.clone(), v));
        } else if let Some(def) = defaults.get(&p.name) {
            bound.push((p.name.clone(), def.clone()));
        } else {
            return Err(runtime_error(ExcType::TypeError, format!("{func_name}() missing required keyword-only argument: '{}'", p.name)));
        }
    }

    let mut result = BoundArgs { bound, varkw: None };
    if !kwargs.is_empty() {
        if let Some(vk) = varkw {
            let pairs: Vec<(Value, Value)> = kwargs.into_iter().map(|(k, v)| (Value::Str(k.into()), v)).collect();
            result.varkw = Some((vk.name.clone(), pairs));
        } else {
            let mut names: Vec<&str> = kwargs.keys().map(String::as_str).collect();
            names.sort_unstable();
            return Err(runtime_error(ExcType::TypeError, format!("{func_name}() got an unexpected keyword argument '{}'", names[0])));
        }
    } else if let Some(vk) = varkw {
        result.varkw = Some((vk.name.clone(), Vec::new()));
    }

    Ok(result)
}

fn too_few_arguments(func_name: &str) -> crate::exception::RunError {
    runtime_error(ExcType::TypeError, format!("{func_name}() missing required argument"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, kind: ParamKind) -> Param {
        Param { name: name.to_string(), kind, default: None, annotation: None }
    }

    #[test]
    fn positional_args_bind_left_to_right() {
        let params = vec![param("a", ParamKind::PositionalOrKeyword), param("b", ParamKind::PositionalOrKeyword)];
        let bound = bind_arguments("f", &params, &HashMap::new(), vec![Value::Int(1), Value::Int(2)], vec![]).unwrap();
        assert_eq!(bound.bound, vec![("a".to_string(), Value::Int(1)), ("b".to_string(), Value::Int(2))]);
    }

    #[test]
    fn missing_required_argument_is_type_error() {
        let params = vec![param("a", ParamKind::PositionalOrKeyword)];
        let err = bind_arguments("f", &params, &HashMap::new(), vec![], vec![]).unwrap_err();
        assert_eq!(err.exc_type, ExcType::TypeError);
    }

    #[test]
    fn extra_positional_spills_into_varargs() {
        let params = vec![param("a", ParamKind::PositionalOrKeyword), param("rest", ParamKind::VarArgs)];
        let bound = bind_arguments("f", &params, &HashMap::new(), vec![Value::Int(1), Value::Int(2), Value::Int(3)], vec![]).unwrap();
        assert_eq!(bound.bound[0], ("a".to_string(), Value::Int(1)));
        assert_eq!(bound.bound[1].0, "rest");
    }

    #[test]
    fn positional_and_keyword_for_same_param_is_type_error() {
        let params = vec![param("a", ParamKind::PositionalOrKeyword), param("kw", ParamKind::VarKeyword)];
        let err = bind_arguments("f", &params, &HashMap::new(), vec![Value::Int(1)], vec![("a".to_string(), Value::Int(2))]).unwrap_err();
        assert_eq!(err.exc_type, ExcType::TypeError);
    }
}
