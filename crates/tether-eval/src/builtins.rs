//! The standard builtin functions.

use std::io::Write;

use tether_types::ast::{BinOp, CmpOp};

use crate::env::Environment;
use crate::error::{EvalError, EvalResult, ExcKind};
use crate::methods::sort_values;
use crate::ops;
use crate::value::{Builtin, CallArgs, Dict, RangeValue, Value};

/// Register every standard builtin in `env`.
pub fn install(env: &mut Environment) {
    let table: &[(&str, fn(&mut dyn Write, CallArgs) -> EvalResult<Value>)] = &[
        ("print", print),
        ("len", len),
        ("str", str_),
        ("repr", repr),
        ("int", int),
        ("float", float),
        ("bool", bool_),
        ("list", list),
        ("tuple", tuple),
        ("dict", dict),
        ("range", range),
        ("abs", abs),
        ("min", |out, args| extreme(out, args, "min", CmpOp::Less)),
        ("max", |out, args| extreme(out, args, "max", CmpOp::Greater)),
        ("sum", sum),
        ("sorted", sorted),
        ("type", type_),
        ("exit", |out, args| exit(out, args, "exit")),
        ("quit", |out, args| exit(out, args, "quit")),
    ];
    for &(name, func) in table {
        env.define_builtin(Builtin::new(name, func));
    }
}

fn io_fault(err: std::io::Error) -> EvalError {
    EvalError::new(ExcKind::OSError, err.to_string())
}

/// The single positional argument, or `default` when none was given.
fn only_arg(args: &CallArgs, name: &str, default: Option<Value>) -> EvalResult<Value> {
    let min = usize::from(default.is_none());
    args.check(name, min, 1, &[])?;
    Ok(args.arg(0).cloned().or(default).unwrap_or(Value::None))
}

fn expect_int(value: &Value) -> EvalResult<i64> {
    value.as_int().ok_or_else(|| {
        EvalError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

// ── Output ───────────────────────────────────────────────────────────────

fn optional_text(args: &CallArgs, key: &str, default: &str) -> EvalResult<String> {
    match args.keyword(key) {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(EvalError::type_error(format!(
            "{key} must be None or a string, not {}",
            other.type_name()
        ))),
    }
}

/// `print(*values, sep=' ', end='\n')`
fn print(out: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    args.check("print", 0, usize::MAX, &["sep", "end"])?;
    let sep = optional_text(&args, "sep", " ")?;
    let end = optional_text(&args, "end", "\n")?;
    let text = args
        .positional
        .iter()
        .map(Value::try_to_str)
        .collect::<EvalResult<Vec<_>>>()?;
    let line = format!("{}{end}", text.join(&sep));
    out.write_all(line.as_bytes()).map_err(io_fault)?;
    out.flush().map_err(io_fault)?;
    Ok(Value::None)
}

// ── Conversions ──────────────────────────────────────────────────────────

fn len(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    args.check("len", 1, 1, &[])?;
    let n = match &args.positional[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(dict) => dict.borrow().len(),
        Value::Range(range) => range.len(),
        other => {
            return Err(EvalError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
}

fn str_(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    let value = only_arg(&args, "str", Some(Value::str("")))?;
    Ok(Value::Str(value.try_to_str()?))
}

fn repr(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    let value = only_arg(&args, "repr", None)?;
    Ok(Value::Str(value.try_repr()?))
}

fn int(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    match &only_arg(&args, "int", Some(Value::Int(0)))? {
        Value::Float(x) => float_to_int(*x),
        Value::Str(s) => parse_int(s),
        value => value.as_int().map(Value::Int).ok_or_else(|| {
            EvalError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                value.type_name()
            ))
        }),
    }
}

fn float_to_int(x: f64) -> EvalResult<Value> {
    if x.is_nan() {
        return Err(EvalError::value_error("cannot convert float NaN to integer"));
    }
    if x.is_infinite() {
        return Err(EvalError::new(
            ExcKind::OverflowError,
            "cannot convert float infinity to integer",
        ));
    }
    let truncated = x.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(EvalError::new(ExcKind::OverflowError, "int too large to convert"));
    }
    Ok(Value::Int(truncated as i64))
}

fn parse_int(text: &str) -> EvalResult<Value> {
    let cleaned: String = text.trim().chars().filter(|&c| c != '_').collect();
    cleaned.parse::<i64>().map(Value::Int).map_err(|err| {
        use std::num::IntErrorKind;
        match err.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                EvalError::new(ExcKind::OverflowError, "int too large to convert")
            }
            _ => EvalError::value_error(format!(
                "invalid literal for int() with base 10: {}",
                Value::str(text).repr()
            )),
        }
    })
}

fn float(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    match &only_arg(&args, "float", Some(Value::Float(0.0)))? {
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            EvalError::value_error(format!(
                "could not convert string to float: {}",
                Value::str(s.as_str()).repr()
            ))
        }),
        value => value.as_float().map(Value::Float).ok_or_else(|| {
            EvalError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                value.type_name()
            ))
        }),
    }
}

fn bool_(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    let value = only_arg(&args, "bool", Some(Value::Bool(false)))?;
    Ok(Value::Bool(value.is_truthy()))
}

fn list(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    let value = only_arg(&args, "list", Some(Value::tuple(Vec::new())))?;
    Ok(Value::list(ops::collect(&value)?))
}

fn tuple(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    match only_arg(&args, "tuple", Some(Value::tuple(Vec::new())))? {
        tuple @ Value::Tuple(_) => Ok(tuple),
        value => Ok(Value::tuple(ops::collect(&value)?)),
    }
}

/// `dict()`, `dict(mapping)`, `dict(pairs)`, plus keyword entries.
fn dict(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    if args.positional.len() > 1 {
        return Err(EvalError::type_error(format!(
            "dict expected at most 1 argument, got {}",
            args.positional.len()
        )));
    }
    let mut dict = Dict::new();
    match args.arg(0) {
        None => {}
        Some(Value::Dict(source)) => {
            for (k, v) in source.borrow().entries() {
                dict.insert(k.clone(), v.clone());
            }
        }
        Some(source) => {
            for (i, item) in ops::collect(source)?.into_iter().enumerate() {
                let pair = ops::collect(&item)?;
                let [key, value]: [Value; 2] = pair.try_into().map_err(|pair: Vec<Value>| {
                    EvalError::value_error(format!(
                        "dictionary update sequence element #{i} has length {}; 2 is required",
                        pair.len()
                    ))
                })?;
                if !key.is_hashable() {
                    return Err(EvalError::type_error(format!(
                        "unhashable type: '{}'",
                        key.type_name()
                    )));
                }
                dict.insert(key, value);
            }
        }
    }
    for (key, value) in args.keywords {
        dict.insert(Value::Str(key), value);
    }
    Ok(Value::dict(dict))
}

/// `range(stop)`, `range(start, stop[, step])`
fn range(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    args.check("range", 1, 3, &[])?;
    let ints = args
        .positional
        .iter()
        .map(expect_int)
        .collect::<EvalResult<Vec<_>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => (0, 0, 1),
    };
    if step == 0 {
        return Err(EvalError::value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Range(RangeValue { start, stop, step }))
}

// ── Numeric & Aggregates ─────────────────────────────────────────────────

fn abs(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    match only_arg(&args, "abs", None)? {
        Value::Float(x) => Ok(Value::Float(x.abs())),
        value => match value.as_int() {
            Some(n) => n.checked_abs().map(Value::Int).ok_or_else(|| {
                EvalError::new(ExcKind::OverflowError, "integer overflow")
            }),
            None => Err(EvalError::type_error(format!(
                "bad operand type for abs(): '{}'",
                value.type_name()
            ))),
        },
    }
}

/// `min` / `max` over one iterable or several arguments.
fn extreme(_: &mut dyn Write, args: CallArgs, name: &str, better: CmpOp) -> EvalResult<Value> {
    args.check(name, 1, usize::MAX, &[])?;
    let candidates = if args.positional.len() == 1 {
        ops::collect(&args.positional[0])?
    } else {
        args.positional
    };
    let mut iter = candidates.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(EvalError::value_error(format!("{name}() arg is an empty sequence")));
    };
    for candidate in iter {
        if ops::compare_op(better, &candidate, &best)? {
            best = candidate;
        }
    }
    Ok(best)
}

fn sum(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    args.check("sum", 1, 2, &["start"])?;
    let start = args
        .arg(1)
        .or_else(|| args.keyword("start"))
        .cloned()
        .unwrap_or(Value::Int(0));
    if let Value::Str(_) = start {
        return Err(EvalError::type_error(
            "sum() can't sum strings [use ''.join(seq) instead]",
        ));
    }
    let mut total = start;
    for item in ops::iterate(&args.positional[0])? {
        total = ops::binary_op(BinOp::Add, &total, &item)?;
    }
    Ok(total)
}

fn sorted(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    args.check("sorted", 1, 1, &["reverse"])?;
    let mut items = ops::collect(&args.positional[0])?;
    let reverse = args.keyword("reverse").is_some_and(Value::is_truthy);
    sort_values(&mut items, reverse)?;
    Ok(Value::list(items))
}

fn type_(_: &mut dyn Write, args: CallArgs) -> EvalResult<Value> {
    let value = only_arg(&args, "type", None)?;
    Ok(Value::str(value.type_name()))
}

// ── Session ──────────────────────────────────────────────────────────────

/// `exit([code])`: an integer is the exit code; any other value is
/// written out and exits with 1.
fn exit(out: &mut dyn Write, args: CallArgs, name: &str) -> EvalResult<Value> {
    let code = match only_arg(&args, name, Some(Value::None))? {
        Value::None => 0,
        value if value.as_int().is_some() => {
            let n = value.as_int().unwrap_or(0);
            i32::try_from(n).unwrap_or(if n < 0 { i32::MIN } else { i32::MAX })
        }
        value => {
            writeln!(out, "{}", value.try_to_str()?).map_err(io_fault)?;
            1
        }
    };
    Err(EvalError::Exit(code))
}
