//! Methods of the builtin `str`, `list` and `dict` types.

use std::cmp::Ordering;

use tether_types::ast::CmpOp;

use crate::error::{EvalError, EvalResult, ExcKind};
use crate::ops;
use crate::value::{values_equal, CallArgs, Value};

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "split", "join", "startswith", "endswith", "replace", "find",
    "count",
];
const LIST_METHODS: &[&str] = &[
    "append", "extend", "pop", "insert", "remove", "index", "count", "reverse", "sort",
];
const DICT_METHODS: &[&str] = &["keys", "values", "items", "get", "pop", "update"];

/// Whether `receiver.name` names a method.
pub fn has_method(receiver: &Value, name: &str) -> bool {
    let table = match receiver {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        _ => return false,
    };
    table.contains(&name)
}

/// Invoke `receiver.name(args)`.
pub fn call_method(receiver: &Value, name: &str, args: CallArgs) -> EvalResult<Value> {
    match receiver {
        Value::Str(s) => str_method(s, name, args),
        Value::List(_) => list_method(receiver, name, args),
        Value::Dict(_) => dict_method(receiver, name, args),
        other => Err(EvalError::new(
            ExcKind::AttributeError,
            format!("'{}' object has no attribute '{name}'", other.type_name()),
        )),
    }
}

fn str_arg<'v>(args: &'v CallArgs, index: usize, method: &str) -> EvalResult<&'v str> {
    match args.arg(index) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(EvalError::type_error(format!(
            "{method}() argument must be str, not {}",
            other.type_name()
        ))),
        None => Err(EvalError::type_error(format!("{method}() missing required argument"))),
    }
}

// ── str ──────────────────────────────────────────────────────────────────

fn str_method(s: &str, name: &str, args: CallArgs) -> EvalResult<Value> {
    match name {
        "upper" => {
            args.check(name, 0, 0, &[])?;
            Ok(Value::str(s.to_uppercase()))
        }
        "lower" => {
            args.check(name, 0, 0, &[])?;
            Ok(Value::str(s.to_lowercase()))
        }
        "strip" => {
            args.check(name, 0, 1, &[])?;
            match args.arg(0) {
                None | Some(Value::None) => Ok(Value::str(s.trim())),
                Some(_) => {
                    let chars = str_arg(&args, 0, name)?;
                    Ok(Value::str(s.trim_matches(|c: char| chars.contains(c))))
                }
            }
        }
        "split" => {
            args.check(name, 0, 2, &[])?;
            let limit = match args.arg(1) {
                Some(v) => v.as_int().filter(|n| *n >= 0).map(|n| n as usize),
                None => None,
            };
            let parts: Vec<Value> = match args.arg(0) {
                None | Some(Value::None) => split_whitespace(s, limit),
                Some(_) => {
                    let sep = str_arg(&args, 0, name)?;
                    if sep.is_empty() {
                        return Err(EvalError::value_error("empty separator"));
                    }
                    match limit {
                        Some(n) => s.splitn(n + 1, sep).map(Value::str).collect(),
                        None => s.split(sep).map(Value::str).collect(),
                    }
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            args.check(name, 1, 1, &[])?;
            let mut pieces = Vec::new();
            for (i, item) in ops::collect(&args.positional[0])?.iter().enumerate() {
                match item {
                    Value::Str(piece) => pieces.push(piece.clone()),
                    other => {
                        return Err(EvalError::type_error(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Value::str(pieces.join(s)))
        }
        "startswith" => {
            args.check(name, 1, 1, &[])?;
            Ok(Value::Bool(s.starts_with(str_arg(&args, 0, name)?)))
        }
        "endswith" => {
            args.check(name, 1, 1, &[])?;
            Ok(Value::Bool(s.ends_with(str_arg(&args, 0, name)?)))
        }
        "replace" => {
            args.check(name, 2, 2, &[])?;
            let old = str_arg(&args, 0, name)?;
            let new = str_arg(&args, 1, name)?;
            Ok(Value::str(s.replace(old, new)))
        }
        "find" => {
            args.check(name, 1, 1, &[])?;
            let needle = str_arg(&args, 0, name)?;
            let index = s
                .find(needle)
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Ok(Value::Int(index))
        }
        "count" => {
            args.check(name, 1, 1, &[])?;
            let needle = str_arg(&args, 0, name)?;
            let n = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Ok(Value::Int(n as i64))
        }
        _ => Err(no_attribute("str", name)),
    }
}

fn split_whitespace(s: &str, limit: Option<usize>) -> Vec<Value> {
    let Some(limit) = limit else {
        return s.split_whitespace().map(Value::str).collect();
    };
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if parts.len() == limit {
            parts.push(Value::str(rest));
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        parts.push(Value::str(&rest[..end]));
        rest = rest[end..].trim_start();
    }
    parts
}

// ── list ─────────────────────────────────────────────────────────────────

fn list_method(receiver: &Value, name: &str, args: CallArgs) -> EvalResult<Value> {
    let Value::List(items) = receiver else {
        return Err(no_attribute(receiver.type_name(), name));
    };
    match name {
        "append" => {
            args.check(name, 1, 1, &[])?;
            let value = args.positional.into_iter().next().unwrap_or(Value::None);
            items.borrow_mut().push(value);
            Ok(Value::None)
        }
        "extend" => {
            args.check(name, 1, 1, &[])?;
            let extra = ops::collect(&args.positional[0])?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "pop" => {
            args.check(name, 0, 1, &[])?;
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(EvalError::new(ExcKind::IndexError, "pop from empty list"));
            }
            let len = items.len() as i64;
            let index = match args.arg(0) {
                Some(v) => int_arg(v)?,
                None => -1,
            };
            let index = if index < 0 { index + len } else { index };
            if !(0..len).contains(&index) {
                return Err(EvalError::new(ExcKind::IndexError, "pop index out of range"));
            }
            Ok(items.remove(index as usize))
        }
        "insert" => {
            args.check(name, 2, 2, &[])?;
            let mut items = items.borrow_mut();
            let len = items.len() as i64;
            let index = int_arg(&args.positional[0])?;
            let index = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(index as usize, args.positional[1].clone());
            Ok(Value::None)
        }
        "remove" => {
            args.check(name, 1, 1, &[])?;
            let mut items = items.borrow_mut();
            let position = items.iter().position(|v| values_equal(v, &args.positional[0]));
            match position {
                Some(i) => {
                    items.remove(i);
                    Ok(Value::None)
                }
                None => Err(EvalError::value_error("list.remove(x): x not in list")),
            }
        }
        "index" => {
            args.check(name, 1, 1, &[])?;
            let target = &args.positional[0];
            items
                .borrow()
                .iter()
                .position(|v| values_equal(v, target))
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| EvalError::value_error(format!("{} is not in list", target.repr())))
        }
        "count" => {
            args.check(name, 1, 1, &[])?;
            let target = &args.positional[0];
            let n = items.borrow().iter().filter(|v| values_equal(v, target)).count();
            Ok(Value::Int(n as i64))
        }
        "reverse" => {
            args.check(name, 0, 0, &[])?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "sort" => {
            args.check(name, 0, 0, &["reverse"])?;
            let reverse = args.keyword("reverse").is_some_and(Value::is_truthy);
            let mut sorted = items.borrow().clone();
            sort_values(&mut sorted, reverse)?;
            *items.borrow_mut() = sorted;
            Ok(Value::None)
        }
        _ => Err(no_attribute("list", name)),
    }
}

fn int_arg(value: &Value) -> EvalResult<i64> {
    value.as_int().ok_or_else(|| {
        EvalError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

/// Stable sort by `<`; the first unorderable pair fails the whole sort
/// and leaves `items` in an unspecified order.
pub(crate) fn sort_values(items: &mut [Value], reverse: bool) -> EvalResult<()> {
    let mut failure = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        match ops::compare_op(CmpOp::Less, a, b) {
            Ok(true) => Ordering::Less,
            Ok(false) => match ops::compare_op(CmpOp::Less, b, a) {
                Ok(true) => Ordering::Greater,
                Ok(false) => Ordering::Equal,
                Err(err) => {
                    failure = Some(err);
                    Ordering::Equal
                }
            },
            Err(err) => {
                failure = Some(err);
                Ordering::Equal
            }
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    if reverse {
        items.reverse();
    }
    Ok(())
}

// ── dict ─────────────────────────────────────────────────────────────────

fn dict_method(receiver: &Value, name: &str, args: CallArgs) -> EvalResult<Value> {
    let Value::Dict(dict) = receiver else {
        return Err(no_attribute(receiver.type_name(), name));
    };
    match name {
        "keys" => {
            args.check(name, 0, 0, &[])?;
            Ok(Value::list(dict.borrow().keys()))
        }
        "values" => {
            args.check(name, 0, 0, &[])?;
            Ok(Value::list(dict.borrow().values()))
        }
        "items" => {
            args.check(name, 0, 0, &[])?;
            let pairs = dict
                .borrow()
                .entries()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                .collect();
            Ok(Value::list(pairs))
        }
        "get" => {
            args.check(name, 1, 2, &[])?;
            let found = dict.borrow().get(&args.positional[0]).cloned();
            Ok(found.or_else(|| args.arg(1).cloned()).unwrap_or(Value::None))
        }
        "pop" => {
            args.check(name, 1, 2, &[])?;
            let key = &args.positional[0];
            let removed = dict.borrow_mut().remove(key);
            match (removed, args.arg(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(EvalError::new(ExcKind::KeyError, key.repr())),
            }
        }
        "update" => {
            args.check(name, 0, 1, &[])?;
            let mut additions = Vec::new();
            match args.arg(0) {
                Some(Value::Dict(other)) => additions.extend(other.borrow().entries().iter().cloned()),
                Some(other) => {
                    for item in ops::collect(other)? {
                        let pair = ops::collect(&item)?;
                        if pair.len() != 2 {
                            return Err(EvalError::value_error(
                                "dictionary update sequence element has wrong length",
                            ));
                        }
                        let mut pair = pair.into_iter();
                        if let (Some(k), Some(v)) = (pair.next(), pair.next()) {
                            additions.push((k, v));
                        }
                    }
                }
                None => {}
            }
            additions.extend(args.keywords.into_iter().map(|(k, v)| (Value::Str(k), v)));
            let mut dict = dict.borrow_mut();
            for (key, value) in additions {
                if !key.is_hashable() {
                    return Err(EvalError::type_error(format!(
                        "unhashable type: '{}'",
                        key.type_name()
                    )));
                }
                dict.insert(key, value);
            }
            Ok(Value::None)
        }
        _ => Err(no_attribute("dict", name)),
    }
}

fn no_attribute(type_name: &str, name: &str) -> EvalError {
    EvalError::new(
        ExcKind::AttributeError,
        format!("'{type_name}' object has no attribute '{name}'"),
    )
}
