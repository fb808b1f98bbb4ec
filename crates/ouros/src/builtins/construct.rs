//! Native-type constructors: what `int(...)`, `list(...)`, etc. do when
//! called. [`crate::evaluator::Evaluator::instantiate_class`] routes here
//! for any callee whose `HeapId` is one of [`crate::evaluator::bootstrap_native_classes`]'s
//! entries, the same way the teacher's `types::Type::construct` is the
//! landing spot for its own bytecode `CALL` opcode on a type object.

use std::str::FromStr;
use std::sync::Arc;

use num_bigint::BigInt;

use crate::evaluator::Evaluator;
use crate::exception::{ExcType, RunResult, runtime_error};
use crate::types::dict::DictData;
use crate::value::Value;

pub(crate) fn construct_native(ev: &Evaluator, name: &str, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> RunResult<Value> {
    match name {
        "int" => construct_int(ev, &args, &kwargs),
        "float" => construct_float(&args),
        "bool" => construct_bool(ev, &args),
        "str" => construct_str(ev, &args),
        "bytes" => construct_bytes(ev, &args),
        "list" => construct_list(ev, &args),
        "tuple" => construct_tuple(ev, &args),
        "dict" => construct_dict(ev, &args, &kwargs),
        "set" => construct_set(ev, &args),
        "frozenset" => construct_frozenset(ev, &args),
        "range" => construct_range(&args),
        "object" => Ok(ev.alloc_instance_of_object()),
        _ => Err(runtime_error(ExcType::TypeError, format!("'{name}' is not constructible"))),
    }
}

fn construct_int(ev: &Evaluator, args: &[Value], kwargs: &[(String, Value)]) -> RunResult<Value> {
    let Some(v) = args.first() else { return Ok(Value::Int(0)) };
    let base = kwargs.iter().find(|(k, _)| k == "base").map(|(_, v)| v).or(args.get(1));
    if let Some(base) = base {
        let Value::Str(s) = v else { return Err(runtime_error(ExcType::TypeError, "int() can't convert non-string with explicit base")) };
        let Value::Int(radix) = base else { return Err(runtime_error(ExcType::TypeError, "int() base must be an int")) };
        return i64::from_str_radix(s.trim(), *radix as u32)
            .map(Value::Int)
            .map_err(|_| runtime_error(ExcType::ValueError, format!("invalid literal for int() with base {radix}: {s:?}")));
    }
    match v {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::BigInt(b) => Ok(Value::BigInt(Arc::clone(b))),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(runtime_error(ExcType::ValueError, "cannot convert float infinity or NaN to integer"));
            }
            Ok(Value::Int(f.trunc() as i64))
        }
        Value::Str(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Ok(Value::Int(i))
            } else if let Ok(b) = BigInt::from_str(trimmed) {
                Ok(Value::bigint(b))
            } else {
                Err(runtime_error(ExcType::ValueError, format!("invalid literal for int() with base 10: {s:?}")))
            }
        }
        other => {
            let _ = ev;
            Err(runtime_error(ExcType::TypeError, format!("int() argument must be a string or a number, not '{}'", other.type_name())))
        }
    }
}

fn construct_float(args: &[Value]) -> RunResult<Value> {
    let Some(v) = args.first() else { return Ok(Value::Float(0.0)) };
    match v {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Bool(b) => Ok(Value::Float(f64::from(*b))),
        Value::BigInt(b) => {
            use num_traits::ToPrimitive;
            Ok(Value::Float(b.to_f64().unwrap_or(f64::INFINITY)))
        }
        Value::Str(s) => match s.trim() {
            "inf" | "Infinity" | "+inf" => Ok(Value::Float(f64::INFINITY)),
            "-inf" | "-Infinity" => Ok(Value::Float(f64::NEG_INFINITY)),
            "nan" => Ok(Value::Float(f64::NAN)),
            other => other.parse::<f64>().map(Value::Float).map_err(|_| runtime_error(ExcType::ValueError, format!("could not convert string to float: {s:?}"))),
        },
        other => Err(runtime_error(ExcType::TypeError, format!("float() argument must be a string or a number, not '{}'", other.type_name()))),
    }
}

fn construct_bool(ev: &Evaluator, args: &[Value]) -> RunResult<Value> {
    match args.first() {
        None => Ok(Value::Bool(false)),
        Some(v) => Ok(Value::Bool(ev.truthy(v)?)),
    }
}

fn construct_str(ev: &Evaluator, args: &[Value]) -> RunResult<Value> {
    match args.first() {
        None => Ok(Value::Str("".into())),
        Some(v) => Ok(Value::Str(ev.str_of(v)?.into())),
    }
}

fn construct_bytes(ev: &Evaluator, args: &[Value]) -> RunResult<Value> {
    match args.first() {
        None => Ok(Value::Bytes(Arc::from(Vec::new()))),
        Some(Value::Int(n)) => Ok(Value::Bytes(Arc::from(vec![0u8; (*n).max(0) as usize]))),
        Some(Value::Str(_)) => Err(runtime_error(ExcType::TypeError, "string argument without an encoding")),
        Some(v) => {
            let items = ev.to_vec(v)?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Int(i) if (0..=255).contains(&i) => out.push(i as u8),
                    _ => return Err(runtime_error(ExcType::ValueError, "bytes must be in range(0, 256)")),
                }
            }
            Ok(Value::Bytes(Arc::from(out)))
        }
    }
}

fn construct_list(ev: &Evaluator, args: &[Value]) -> RunResult<Value> {
    match args.first() {
        None => Ok(ev.alloc_list(Vec::new())),
        Some(v) => Ok(ev.alloc_list(ev.to_vec(v)?)),
    }
}

fn construct_tuple(ev: &Evaluator, args: &[Value]) -> RunResult<Value> {
    match args.first() {
        None => Ok(Value::Tuple(Arc::from(Vec::new()))),
        Some(v) => Ok(Value::Tuple(ev.to_vec(v)?.into())),
    }
}

fn construct_dict(ev: &Evaluator, args: &[Value], kwargs: &[(String, Value)]) -> RunResult<Value> {
    let mut data = DictData::new();
    if let Some(v) = args.first() {
        let pairs: Vec<(Value, Value)> = match v {
            Value::Ref(id) => match ev.heap().get(*id) {
                crate::heap::HeapData::Dict(d) => d.lock().unwrap().items().map(|(k, v)| (k.clone(), v.clone())).collect(),
                _ => ev.to_vec(v)?.into_iter().map(|pair| pair_to_kv(ev, pair)).collect::<RunResult<_>>()?,
            },
            _ => ev.to_vec(v)?.into_iter().map(|pair| pair_to_kv(ev, pair)).collect::<RunResult<_>>()?,
        };
        for (k, v) in pairs {
            let hash = ev.hash_value(&k)?;
            data.insert(hash, k, v, &|a, b| ev.values_equal(a, b).unwrap_or(false));
        }
    }
    for (k, v) in kwargs {
        let key = Value::Str(k.as_str().into());
        let hash = ev.hash_value(&key)?;
        data.insert(hash, key, v.clone(), &|a, b| ev.values_equal(a, b).unwrap_or(false));
    }
    Ok(ev.alloc_dict(data))
}

fn pair_to_kv(ev: &Evaluator, pair: Value) -> RunResult<(Value, Value)> {
    let items = ev.to_vec(&pair)?;
    if items.len() != 2 {
        return Err(runtime_error(ExcType::ValueError, "dictionary update sequence element has wrong length"));
    }
    let mut it = items.into_iter();
    Ok((it.next().unwrap(), it.next().unwrap()))
}

fn construct_set(ev: &Evaluator, args: &[Value]) -> RunResult<Value> {
    match args.first() {
        None => ev.alloc_set(Vec::new()),
        Some(v) => ev.alloc_set(ev.to_vec(v)?),
    }
}

fn construct_frozenset(ev: &Evaluator, args: &[Value]) -> RunResult<Value> {
    let items = match args.first() {
        None => Vec::new(),
        Some(v) => ev.to_vec(v)?,
    };
    let mut data = crate::types::set::SetData::new();
    for item in items {
        let hash = ev.hash_value(&item)?;
        data.insert(hash, item, &|a, b| ev.values_equal(a, b).unwrap_or(false));
    }
    Ok(Value::FrozenSet(Arc::new(data)))
}

fn construct_range(args: &[Value]) -> RunResult<Value> {
    let as_i64 = |v: &Value| match v {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(runtime_error(ExcType::TypeError, format!("'{}' object cannot be interpreted as an integer", other.type_name()))),
    };
    let (start, stop, step) = match args.len() {
        1 => (0, as_i64(&args[0])?, 1),
        2 => (as_i64(&args[0])?, as_i64(&args[1])?, 1),
        3 => {
            let step = as_i64(&args[2])?;
            if step == 0 {
                return Err(runtime_error(ExcType::ValueError, "range() arg 3 must not be zero"));
            }
            (as_i64(&args[0])?, as_i64(&args[1])?, step)
        }
        0 => return Err(runtime_error(ExcType::TypeError, "range expected at least 1 argument, got 0")),
        n => return Err(runtime_error(ExcType::TypeError, format!("range expected at most 3 arguments, got {n}"))),
    };
    Ok(Value::Range(Arc::new((start, stop, step))))
}
