//! Operators, indexing, attribute access and format specs on runtime values.

use std::cmp::Ordering;
use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::format_number;

use super::builtins::native_method;
use super::error::ErrorKind;
use super::parser::{BinOp, CmpOp};
use super::value::{BoundMethod, MAX_SEQUENCE_LEN, Method, Value, sequence_limit};

static FORMAT_SPEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(.)?([<>^=]))?([+\- ])?(0)?(\d+)?([,_])?(?:\.(\d+))?([bdeEfFgGnosxX%])?$")
        .unwrap()
});

pub fn negate(value: &Value) -> Result<Value, ErrorKind> {
    value.as_number().map(|n| Value::Number(-n)).ok_or_else(|| {
        ErrorKind::Type(format!(
            "bad operand type for unary -: '{}'",
            value.type_name()
        ))
    })
}

pub fn binary(lhs: &Value, op: BinOp, rhs: &Value) -> Result<Value, ErrorKind> {
    if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
        return arithmetic(a, op, b).map(Value::Number);
    }
    match (lhs, op, rhs) {
        (Value::Str(a), BinOp::Add, Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::List(a), BinOp::Add, Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Value::Tuple(a), BinOp::Add, Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Value::Str(_) | Value::List(_) | Value::Tuple(_), BinOp::Mul, count)
            if count.as_number().is_some() =>
        {
            repeat(lhs, count)
        }
        (count, BinOp::Mul, Value::Str(_) | Value::List(_) | Value::Tuple(_))
            if count.as_number().is_some() =>
        {
            repeat(rhs, count)
        }
        _ => Err(ErrorKind::Type(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

fn arithmetic(a: f64, op: BinOp, b: f64) -> Result<f64, ErrorKind> {
    let divides_by_zero = matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod) && b == 0.0;
    if divides_by_zero || (op == BinOp::Pow && a == 0.0 && b < 0.0) {
        return Err(ErrorKind::ZeroDivision);
    }
    Ok(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        // The result takes the sign of the divisor.
        BinOp::Mod => {
            let rem = a % b;
            if rem != 0.0 && (rem < 0.0) != (b < 0.0) {
                rem + b
            } else {
                rem
            }
        }
        BinOp::Pow => a.powf(b),
    })
}

/// `seq * n`. Fails instead of allocating past [`MAX_SEQUENCE_LEN`].
fn repeat(seq: &Value, count: &Value) -> Result<Value, ErrorKind> {
    let times = usize::try_from(count.as_int()?).unwrap_or(0);
    let len = match seq {
        Value::Str(text) => text.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        _ => 0,
    };
    let total = len
        .checked_mul(times)
        .filter(|total| *total <= MAX_SEQUENCE_LEN)
        .ok_or_else(|| sequence_limit(len.saturating_mul(times)))?;
    if total == 0 {
        return Ok(match seq {
            Value::Str(_) => Value::Str(String::new()),
            Value::Tuple(_) => Value::tuple(Vec::new()),
            _ => Value::list(Vec::new()),
        });
    }
    let repeated = |items: &[Value]| {
        let mut out = Vec::with_capacity(total);
        for _ in 0..times {
            out.extend(items.iter().cloned());
        }
        out
    };
    Ok(match seq {
        Value::Str(text) => Value::Str(text.repeat(times)),
        Value::Tuple(items) => Value::tuple(repeated(items)),
        Value::List(items) => Value::list(repeated(&items.borrow())),
        other => other.clone(),
    })
}

pub fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> Result<bool, ErrorKind> {
    Ok(match op {
        CmpOp::Eq => lhs.equals(rhs),
        CmpOp::NotEq => !lhs.equals(rhs),
        CmpOp::Is => lhs.identical(rhs),
        CmpOp::IsNot => !lhs.identical(rhs),
        CmpOp::In => contains(rhs, lhs)?,
        CmpOp::NotIn => !contains(rhs, lhs)?,
        CmpOp::Lt => lhs.compare(rhs, op.symbol())? == Some(Ordering::Less),
        CmpOp::Gt => lhs.compare(rhs, op.symbol())? == Some(Ordering::Greater),
        CmpOp::Le => matches!(
            lhs.compare(rhs, op.symbol())?,
            Some(Ordering::Less | Ordering::Equal)
        ),
        CmpOp::Ge => matches!(
            lhs.compare(rhs, op.symbol())?,
            Some(Ordering::Greater | Ordering::Equal)
        ),
    })
}

pub fn contains(container: &Value, item: &Value) -> Result<bool, ErrorKind> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|value| value.equals(item))),
        Value::Tuple(items) => Ok(items.iter().any(|value| value.equals(item))),
        Value::Str(text) => match item {
            Value::Str(needle) => Ok(text.contains(needle.as_str())),
            other => Err(ErrorKind::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Dict(dict) => Ok(dict.entries.borrow().contains_key(&item.to_key()?)),
        Value::Set(keys) => Ok(keys.borrow().contains(&item.to_key()?)),
        Value::Range(range) => Ok(item.as_int().is_ok_and(|value| range.contains(value))),
        other => Err(ErrorKind::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

pub fn length(value: &Value) -> Result<usize, ErrorKind> {
    match value {
        Value::List(items) => Ok(items.borrow().len()),
        Value::Tuple(items) => Ok(items.len()),
        Value::Str(text) => Ok(text.chars().count()),
        Value::Dict(dict) => Ok(dict.entries.borrow().len()),
        Value::Set(keys) => Ok(keys.borrow().len()),
        Value::Range(range) => Ok(range.len()),
        other => Err(ErrorKind::Type(format!(
            "object of type '{}' has no len()",
            other.type_name()
        ))),
    }
}

/// Resolves a possibly negative index against `len`.
pub fn normalize_index(index: &Value, len: usize, what: &str) -> Result<usize, ErrorKind> {
    let raw = index.as_int().map_err(|_| {
        ErrorKind::Type(format!(
            "{what} indices must be integers, not '{}'",
            index.type_name()
        ))
    })?;
    let len = len as i128;
    let resolved = if raw < 0 { i128::from(raw) + len } else { i128::from(raw) };
    if resolved < 0 || resolved >= len {
        return Err(ErrorKind::Index(format!("{what} index out of range")));
    }
    Ok(resolved as usize)
}

pub fn get_index(base: &Value, index: &Value) -> Result<Value, ErrorKind> {
    match base {
        Value::List(items) => {
            let items = items.borrow();
            let position = normalize_index(index, items.len(), "list")?;
            Ok(items[position].clone())
        }
        Value::Tuple(items) => {
            let position = normalize_index(index, items.len(), "tuple")?;
            Ok(items[position].clone())
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let position = normalize_index(index, chars.len(), "string")?;
            Ok(Value::Str(chars[position].to_string()))
        }
        Value::Range(range) => {
            let position = normalize_index(index, range.len(), "range")?;
            range
                .get(position)
                .map(|value| Value::Number(value as f64))
                .ok_or_else(|| ErrorKind::Index("range object index out of range".to_string()))
        }
        Value::Dict(dict) => {
            let key = index.to_key()?;
            dict.entries
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| ErrorKind::Key(index.repr()))
        }
        other => Err(ErrorKind::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub fn slice(base: &Value, lower: &Value, upper: &Value, step: &Value) -> Result<Value, ErrorKind> {
    match base {
        Value::List(items) => {
            let items = items.borrow();
            let positions = slice_positions(items.len(), lower, upper, step)?;
            Ok(Value::list(positions.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let positions = slice_positions(items.len(), lower, upper, step)?;
            Ok(Value::tuple(positions.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let positions = slice_positions(chars.len(), lower, upper, step)?;
            Ok(Value::Str(positions.into_iter().map(|i| chars[i]).collect()))
        }
        other => Err(ErrorKind::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn slice_step(step: &Value) -> Result<i64, ErrorKind> {
    let step = if step.is_none() { 1 } else { step.as_int()? };
    if step == 0 {
        return Err(ErrorKind::Value("slice step cannot be zero".to_string()));
    }
    Ok(step)
}

/// Clamps a slice bound the way sequence slicing does for the given step
/// direction.
fn slice_bound(value: &Value, len: i64, step: i64, default: i64) -> Result<i64, ErrorKind> {
    if value.is_none() {
        return Ok(default);
    }
    let mut bound = value.as_int()?;
    if bound < 0 {
        bound += len;
    }
    Ok(if step > 0 {
        bound.clamp(0, len)
    } else {
        bound.clamp(-1, len - 1)
    })
}

fn slice_positions(
    len: usize,
    lower: &Value,
    upper: &Value,
    step: &Value,
) -> Result<Vec<usize>, ErrorKind> {
    let step = slice_step(step)?;
    let len = len as i64;
    let (start, stop) = if step > 0 {
        (slice_bound(lower, len, step, 0)?, slice_bound(upper, len, step, len)?)
    } else {
        (
            slice_bound(lower, len, step, len - 1)?,
            slice_bound(upper, len, step, -1)?,
        )
    };
    let mut positions = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        positions.push(i as usize);
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(positions)
}

pub fn store_index(base: &Value, index: &Value, value: Value) -> Result<(), ErrorKind> {
    match base {
        Value::List(items) => {
            let len = items.borrow().len();
            let position = normalize_index(index, len, "list assignment")?;
            items.borrow_mut()[position] = value;
            Ok(())
        }
        Value::Dict(dict) => {
            let key = index.to_key()?;
            dict.entries.borrow_mut().insert(key, value);
            Ok(())
        }
        other => Err(ErrorKind::Type(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `xs[a:b] = items` on a list; the slice may grow or shrink the list.
pub fn store_slice(
    base: &Value,
    (lower, upper, step): (&Value, &Value, &Value),
    value: &Value,
) -> Result<(), ErrorKind> {
    let Value::List(items) = base else {
        return Err(ErrorKind::Type(format!(
            "'{}' object does not support slice assignment",
            base.type_name()
        )));
    };
    if slice_step(step)? != 1 {
        return Err(ErrorKind::Value(
            "extended slice assignment is not supported in snippets".to_string(),
        ));
    }
    let replacement = value.collect_items()?;
    let len = items.borrow().len() as i64;
    let start = slice_bound(lower, len, 1, 0)?;
    let stop = slice_bound(upper, len, 1, len)?.max(start);
    items
        .borrow_mut()
        .splice(start as usize..stop as usize, replacement);
    Ok(())
}

pub fn delete_index(base: &Value, index: &Value) -> Result<(), ErrorKind> {
    match base {
        Value::List(items) => {
            let len = items.borrow().len();
            let position = normalize_index(index, len, "list assignment")?;
            items.borrow_mut().remove(position);
            Ok(())
        }
        Value::Dict(dict) => {
            let key = index.to_key()?;
            dict.entries
                .borrow_mut()
                .shift_remove(&key)
                .map(|_| ())
                .ok_or_else(|| ErrorKind::Key(index.repr()))
        }
        other => Err(ErrorKind::Type(format!(
            "'{}' object does not support item deletion",
            other.type_name()
        ))),
    }
}

pub fn no_attribute(obj: &Value, field: &str) -> ErrorKind {
    ErrorKind::Attribute(format!(
        "'{}' object has no attribute '{field}'",
        obj.type_name()
    ))
}

/// Attribute lookup: instance fields, then class attributes (functions come
/// back bound), then methods of the built-in containers.
pub fn get_attr(obj: &Value, field: &str) -> Result<Value, ErrorKind> {
    match obj {
        Value::Instance(instance) => {
            if let Some(value) = instance.field(field) {
                return Ok(value);
            }
            match instance.class.lookup(field) {
                Some(Value::Function(function)) => Ok(Value::BoundMethod(Rc::new(BoundMethod {
                    receiver: obj.clone(),
                    method: Method::User(function),
                }))),
                Some(value) => Ok(value),
                None => Err(no_attribute(obj, field)),
            }
        }
        Value::Class(class) => class.lookup(field).ok_or_else(|| {
            ErrorKind::Attribute(format!(
                "type object '{}' has no attribute '{field}'",
                class.name
            ))
        }),
        Value::Module(module) => module.attr(field).ok_or_else(|| {
            ErrorKind::Attribute(format!(
                "module '{}' has no attribute '{field}'",
                module.name()
            ))
        }),
        other => native_method(other, field)
            .map(|name| {
                Value::BoundMethod(Rc::new(BoundMethod {
                    receiver: other.clone(),
                    method: Method::Native(name),
                }))
            })
            .ok_or_else(|| no_attribute(other, field)),
    }
}

pub fn set_attr(obj: &Value, field: &str, value: Value) -> Result<(), ErrorKind> {
    match obj {
        Value::Instance(instance) => {
            instance
                .fields
                .borrow_mut()
                .insert(field.to_string(), value);
            Ok(())
        }
        other => Err(no_attribute(other, field)),
    }
}

pub fn delete_attr(obj: &Value, field: &str) -> Result<(), ErrorKind> {
    match obj {
        Value::Instance(instance) => instance
            .fields
            .borrow_mut()
            .shift_remove(field)
            .map(|_| ())
            .ok_or_else(|| no_attribute(obj, field)),
        other => Err(no_attribute(other, field)),
    }
}

/// Applies a format spec such as `>8`, `.2f`, `,d` or `05.1%`.
pub fn format_spec(value: &Value, spec: &str) -> Result<String, ErrorKind> {
    let caps = FORMAT_SPEC_RE
        .captures(spec)
        .ok_or_else(|| ErrorKind::Value(format!("Invalid format specifier '{spec}'")))?;
    let text = |idx: usize| caps.get(idx).map(|m| m.as_str());
    let fill = text(1).and_then(|fill| fill.chars().next());
    let align = text(2);
    let zero_pad = text(4).is_some();
    let width: usize = text(5).and_then(|w| w.parse().ok()).unwrap_or(0);
    if width > MAX_SEQUENCE_LEN {
        return Err(sequence_limit(width));
    }
    let grouping = text(6).and_then(|g| g.chars().next());
    let precision: Option<usize> = text(7).and_then(|p| p.parse().ok());
    let code = text(8);

    let number = value.as_number();
    let (sign, body) = match number {
        Some(n) => {
            let sign = if n < 0.0 {
                "-"
            } else {
                match text(3) {
                    Some("+") => "+",
                    Some(" ") => " ",
                    _ => "",
                }
            };
            (sign, format_number_body(n.abs(), code, precision, grouping, value)?)
        }
        None => match code {
            None | Some("s") => {
                let shown = value.to_string();
                let shown = match precision {
                    Some(p) => shown.chars().take(p).collect(),
                    None => shown,
                };
                ("", shown)
            }
            Some(code) => {
                return Err(ErrorKind::Value(format!(
                    "Unknown format code '{code}' for object of type '{}'",
                    value.type_name()
                )));
            }
        },
    };

    let (fill, align) = match (zero_pad, align) {
        (true, None) => ('0', "="),
        (_, Some(align)) => (fill.unwrap_or(' '), align),
        (false, None) => (' ', if number.is_some() { ">" } else { "<" }),
    };
    let used = sign.chars().count() + body.chars().count();
    let pad = width.saturating_sub(used);
    let padding = |n: usize| fill.to_string().repeat(n);
    Ok(match align {
        "<" => format!("{sign}{body}{}", padding(pad)),
        "^" => format!("{}{sign}{body}{}", padding(pad / 2), padding(pad - pad / 2)),
        "=" => format!("{sign}{}{body}", padding(pad)),
        _ => format!("{}{sign}{body}", padding(pad)),
    })
}

fn format_number_body(
    n: f64,
    code: Option<&str>,
    precision: Option<usize>,
    grouping: Option<char>,
    value: &Value,
) -> Result<String, ErrorKind> {
    let integral = |code: &str| {
        if n.fract() == 0.0 {
            Ok(n as u64)
        } else {
            Err(ErrorKind::Value(format!(
                "Unknown format code '{code}' for object of type '{}'",
                value.type_name()
            )))
        }
    };
    let body = match code {
        Some("d" | "n") => integral("d")?.to_string(),
        Some("x") => format!("{:x}", integral("x")?),
        Some("X") => format!("{:X}", integral("X")?),
        Some("o") => format!("{:o}", integral("o")?),
        Some("b") => format!("{:b}", integral("b")?),
        Some("f" | "F") => format!("{:.*}", precision.unwrap_or(6), n),
        Some("%") => format!("{:.*}%", precision.unwrap_or(6), n * 100.0),
        Some("e" | "E") => {
            let text = scientific(n, precision.unwrap_or(6));
            if code == Some("E") {
                text.to_uppercase()
            } else {
                text
            }
        }
        Some("g" | "G") => general(n, precision.unwrap_or(6)),
        None => match precision {
            Some(p) => general(n, p),
            None => format_number(n),
        },
        Some(code) => {
            return Err(ErrorKind::Value(format!(
                "Unknown format code '{code}' for object of type '{}'",
                value.type_name()
            )));
        }
    };
    Ok(match grouping {
        Some(separator) => group_digits(&body, separator),
        None => body,
    })
}

/// `1.5e3` becomes `1.500000e+03`.
fn scientific(n: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, n);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => text,
    }
}

/// Significant-digit formatting with trailing zeros removed.
fn general(n: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if n == 0.0 || !n.is_finite() {
        return format_number(n);
    }
    let exponent = n.log10().floor() as i32;
    if exponent < -4 || exponent >= precision as i32 {
        let text = scientific(n, precision - 1);
        return match text.split_once('e') {
            Some((mantissa, exponent)) => format!("{}e{exponent}", trim_fraction(mantissa)),
            None => text,
        };
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, n)).to_string()
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

fn group_digits(body: &str, separator: char) -> String {
    let split = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    let (digits, rest) = body.split_at(split);
    let mut grouped = String::with_capacity(body.len() + digits.len() / 3);
    for (idx, digit) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(digit);
    }
    grouped.push_str(rest);
    grouped
}
