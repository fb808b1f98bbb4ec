//! The `format()` mini-language (spec.md §4.4's string-semantics paragraph).
//!
//! Grounded on the teacher's `fstring.rs` for the *grammar* of a format spec
//! (`[[fill]align][sign][#][0][width][grouping][.precision][type]`) but
//! operating on this crate's `Value` rather than a `StringId`-backed AST, and
//! without the teacher's locale/`Decimal` integration, which has no
//! counterpart in spec.md's numeric tower.

use crate::exception::{ExcType, RunResult, runtime_error};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    AfterSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Always,
    OnlyNegative,
    SpaceForPositive,
}

#[derive(Debug, Clone, Default)]
struct FormatSpec {
    fill: char,
    align: Option<Align>,
    sign: Sign,
    alternate: bool,
    zero_pad: bool,
    width: Option<usize>,
    grouping: Option<char>,
    precision: Option<usize>,
    ty: Option<char>,
}

impl Default for Sign {
    fn default() -> Self {
        Sign::OnlyNegative
    }
}

/// Parses a format spec string (the text after `:` in `{expr:spec}`, already
/// fully resolved — any nested `{}` placeholders are the evaluator's job to
/// substitute before calling this).
fn parse_spec(spec: &str) -> RunResult<FormatSpec> {
    let chars: Vec<char> = spec.chars().collect();
    let mut i = 0;
    let mut result = FormatSpec { fill: ' ', ..FormatSpec::default() };

    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^' | '=') {
        result.fill = chars[0];
        result.align = Some(parse_align(chars[1]));
        i = 2;
    } else if !chars.is_empty() && matches!(chars[0], '<' | '>' | '^' | '=') {
        result.align = Some(parse_align(chars[0]));
        i = 1;
    }

    if i < chars.len() && matches!(chars[i], '+' | '-' | ' ') {
        result.sign = match chars[i] {
            '+' => Sign::Always,
            ' ' => Sign::SpaceForPositive,
            _ => Sign::OnlyNegative,
        };
        i += 1;
    }

    if i < chars.len() && chars[i] == '#' {
        result.alternate = true;
        i += 1;
    }

    if i < chars.len() && chars[i] == '0' {
        result.zero_pad = true;
        if result.align.is_none() {
            result.align = Some(Align::AfterSign);
            result.fill = '0';
        }
        i += 1;
    }

    let width_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i > width_start {
        result.width = Some(chars[width_start..i].iter().collect::<String>().parse().unwrap_or(0));
    }

    if i < chars.len() && matches!(chars[i], ',' | '_') {
        result.grouping = Some(chars[i]);
        i += 1;
    }

    if i < chars.len() && chars[i] == '.' {
        i += 1;
        let prec_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == prec_start {
            return Err(runtime_error(ExcType::ValueError, "Format specifier missing precision"));
        }
        result.precision = Some(chars[prec_start..i].iter().collect::<String>().parse().unwrap_or(0));
    }

    if i < chars.len() {
        result.ty = Some(chars[i]);
        i += 1;
    }

    if i != chars.len() {
        return Err(runtime_error(ExcType::ValueError, format!("Invalid format specifier '{spec}'")));
    }

    Ok(result)
}

fn parse_align(c: char) -> Align {
    match c {
        '<' => Align::Left,
        '>' => Align::Right,
        '^' => Align::Center,
        _ => Align::AfterSign,
    }
}

fn group_digits(digits: &str, sep: char) -> String {
    let bytes: Vec<char> = digits.chars().collect();
    let mut out = Vec::new();
    for (i, c) in bytes.iter().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(sep);
        }
        out.push(*c);
    }
    out.reverse();
    out.into_iter().collect()
}

fn pad(body: String, sign_prefix: &str, spec: &FormatSpec, numeric: bool) -> String {
    let width = spec.width.unwrap_or(0);
    let total_len = sign_prefix.chars().count() + body.chars().count();
    if total_len >= width {
        return format!("{sign_prefix}{body}");
    }
    let pad_len = width - total_len;
    let default_align = if numeric { Align::Right } else { Align::Left };
    match spec.align.unwrap_or(default_align) {
        Align::Left => format!("{sign_prefix}{body}{}", spec.fill.to_string().repeat(pad_len)),
        Align::Right => format!("{}{sign_prefix}{body}", spec.fill.to_string().repeat(pad_len)),
        Align::Center => {
            let left = pad_len / 2;
            let right = pad_len - left;
            format!("{}{sign_prefix}{body}{}", spec.fill.to_string().repeat(left), spec.fill.to_string().repeat(right))
        }
        Align::AfterSign => format!("{sign_prefix}{}{body}", spec.fill.to_string().repeat(pad_len)),
    }
}

fn sign_prefix(is_negative: bool, spec: &FormatSpec) -> &'static str {
    if is_negative {
        "-"
    } else {
        match spec.sign {
            Sign::Always => "+",
            Sign::SpaceForPositive => " ",
            Sign::OnlyNegative => "",
        }
    }
}

/// Formats `value` according to `spec_text`, the fully-resolved spec string.
/// `repr_str`/`str_str` are the already-computed `repr()`/`str()` of `value`,
/// supplied by the evaluator since dunder dispatch for user types lives
/// there, not here.
pub fn format_value(value: &Value, spec_text: &str, str_repr: &str) -> RunResult<String> {
    let spec = parse_spec(spec_text)?;

    match value {
        Value::Int(_) | Value::BigInt(_) if matches!(spec.ty, Some('b' | 'o' | 'x' | 'X' | 'c') | None) && spec.ty != Some('s') => {
            format_int(value, &spec)
        }
        Value::Float(f) if matches!(spec.ty, Some('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%') | None) => format_float(*f, &spec),
        Value::Int(_) | Value::BigInt(_) if matches!(spec.ty, Some('d')) => format_int(value, &spec),
        Value::Int(_) | Value::BigInt(_) if matches!(spec.ty, Some('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%')) => {
            format_float(to_f64(value), &spec)
        }
        _ => format_generic(str_repr, &spec),
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::BigInt(b) => {
            use num_traits::ToPrimitive;
            b.to_f64().unwrap_or(f64::NAN)
        }
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

fn format_generic(text: &str, spec: &FormatSpec) -> RunResult<String> {
    if spec.ty.is_some_and(|t| t != 's') {
        return Err(runtime_error(ExcType::ValueError, format!("Unknown format code '{}' for object of type 'str'", spec.ty.unwrap())));
    }
    let truncated = match spec.precision {
        Some(p) => text.chars().take(p).collect(),
        None => text.to_string(),
    };
    Ok(pad(truncated, "", spec, false))
}

fn format_int(value: &Value, spec: &FormatSpec) -> RunResult<String> {
    use num_bigint::BigInt;
    let big: BigInt = match value {
        Value::Int(i) => BigInt::from(*i),
        Value::BigInt(b) => (**b).clone(),
        _ => unreachable!("format_int called with non-integer"),
    };
    let negative = big.sign() == num_bigint::Sign::Minus;
    let abs = if negative { -big.clone() } else { big.clone() };

    let (digits, prefix) = match spec.ty {
        Some('b') => (format!("{abs:b}"), if spec.alternate { "0b" } else { "" }),
        Some('o') => (format!("{abs:o}"), if spec.alternate { "0o" } else { "" }),
        Some('x') => (format!("{abs:x}"), if spec.alternate { "0x" } else { "" }),
        Some('X') => (format!("{abs:X}"), if spec.alternate { "0X" } else { "" }),
        Some('c') => {
            use num_traits::ToPrimitive;
            let code = abs.to_u32().ok_or_else(|| runtime_error(ExcType::ValueError, "%c requires int in range"))?;
            let ch = char::from_u32(code).ok_or_else(|| runtime_error(ExcType::ValueError, "invalid character code"))?;
            return Ok(pad(ch.to_string(), "", spec, false));
        }
        _ => (abs.to_string(), ""),
    };

    let digits = match spec.grouping {
        Some(sep) if spec.ty.is_none() || spec.ty == Some('d') => group_digits(&digits, sep),
        _ => digits,
    };

    let sign = sign_prefix(negative, spec);
    let body = format!("{prefix}{digits}");
    Ok(pad(body, sign, spec, true))
}

fn format_float(value: f64, spec: &FormatSpec) -> RunResult<String> {
    let negative = value.is_sign_negative() && value != 0.0 || value < 0.0;
    let magnitude = value.abs();
    let precision = spec.precision.unwrap_or(6);

    let body = match spec.ty {
        Some('e') => format!("{magnitude:.precision$e}"),
        Some('E') => format!("{magnitude:.precision$E}"),
        Some('%') => format!("{:.precision$}%", magnitude * 100.0),
        Some('g' | 'G') | None if spec.ty.is_none() => {
            if value.fract() == 0.0 && spec.precision.is_none() {
                format!("{magnitude}")
            } else {
                format!("{magnitude:.precision$}")
            }
        }
        _ => format!("{magnitude:.precision$}"),
    };

    let body = match spec.grouping {
        Some(sep) => {
            if let Some((int_part, frac_part)) = body.split_once('.') {
                format!("{}.{}", group_digits(int_part, sep), frac_part)
            } else {
                group_digits(&body, sep)
            }
        }
        None => body,
    };

    let sign = sign_prefix(negative, spec);
    Ok(pad(body, sign, spec, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_integer_with_zero_fill_and_width() {
        let out = format_value(&Value::Int(42), "05d", "42").unwrap();
        assert_eq!(out, "00042");
    }

    #[test]
    fn formats_float_with_precision() {
        let out = format_value(&Value::Float(3.14159), ".2f", "3.14159").unwrap();
        assert_eq!(out, "3.14");
    }

    #[test]
    fn formats_hex_with_alternate_prefix() {
        let out = format_value(&Value::Int(255), "#x", "255").unwrap();
        assert_eq!(out, "0xff");
    }

    #[test]
    fn right_aligns_strings_by_default_width() {
        let out = format_value(&Value::Str("hi".into()), ">5", "hi").unwrap();
        assert_eq!(out, "   hi");
    }
}
