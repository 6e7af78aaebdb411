//! Operators, indexing and iteration over runtime values.

use std::cmp::Ordering;

use tether_types::ast::{BinOp, CmpOp, UnaryOp};

use crate::error::{EvalError, EvalResult, ExcKind};
use crate::value::{checked_compare, checked_equal, values_equal, Value};

/// Largest sequence an operation may build.
pub const MAX_SEQUENCE_LEN: usize = 10_000_000;

fn unsupported(symbol: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::type_error(format!(
        "unsupported operand type(s) for {symbol}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> EvalError {
    EvalError::new(ExcKind::OverflowError, "integer overflow")
}

fn too_large() -> EvalError {
    EvalError::new(ExcKind::MemoryError, "")
}

fn zero_division(message: &str) -> EvalError {
    EvalError::new(ExcKind::ZeroDivisionError, message)
}

// ══════════════════════════════════════════════════════════════════════════════
// Arithmetic
// ══════════════════════════════════════════════════════════════════════════════

/// Apply a binary operator to two evaluated operands.
///
/// `and` / `or` are included for completeness; the interpreter
/// short-circuits them before both operands exist.
pub fn binary_op(op: BinOp, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinOp::Add => add(left, right),
        BinOp::Sub => numeric(op, left, right, i64::checked_sub, |a, b| a - b),
        BinOp::Mul => multiply(left, right),
        BinOp::Div => true_divide(left, right),
        BinOp::FloorDiv => floor_divide(left, right),
        BinOp::Mod => modulo(left, right),
        BinOp::Pow => power(left, right),
        BinOp::And => Ok(if left.is_truthy() { right.clone() } else { left.clone() }),
        BinOp::Or => Ok(if left.is_truthy() { left.clone() } else { right.clone() }),
    }
}

fn numeric(
    op: BinOp,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult<Value> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        return int_op(a, b).map(Value::Int).ok_or_else(overflow);
    }
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

fn add(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::Str(_), other) => Err(EvalError::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        ))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Value::List(_), other) => Err(EvalError::type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            other.type_name()
        ))),
        (Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => numeric(BinOp::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

fn multiply(left: &Value, right: &Value) -> EvalResult<Value> {
    let (seq, count) = match (left, right) {
        (Value::Str(_) | Value::List(_) | Value::Tuple(_), n) if n.as_int().is_some() => (left, n),
        (n, Value::Str(_) | Value::List(_) | Value::Tuple(_)) if n.as_int().is_some() => (right, n),
        _ => return numeric(BinOp::Mul, left, right, i64::checked_mul, |a, b| a * b),
    };
    let times = usize::try_from(count.as_int().unwrap_or(0)).unwrap_or(0);
    match seq {
        Value::Str(s) => {
            check_len(s.chars().count(), times)?;
            Ok(Value::Str(s.repeat(times)))
        }
        Value::List(items) => {
            let items = items.borrow();
            check_len(items.len(), times)?;
            Ok(Value::list(repeat_items(&items, times)))
        }
        Value::Tuple(items) => {
            check_len(items.len(), times)?;
            Ok(Value::tuple(repeat_items(items, times)))
        }
        _ => Err(unsupported("*", left, right)),
    }
}

fn check_len(len: usize, times: usize) -> EvalResult<()> {
    match len.checked_mul(times) {
        Some(total) if total <= MAX_SEQUENCE_LEN => Ok(()),
        _ => Err(too_large()),
    }
}

fn repeat_items(items: &[Value], times: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend(items.iter().cloned());
    }
    out
}

fn true_divide(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left.as_float(), right.as_float()) {
        (Some(_), Some(b)) if b == 0.0 => Err(zero_division("division by zero")),
        (Some(a), Some(b)) => Ok(Value::Float(a / b)),
        _ => Err(unsupported("/", left, right)),
    }
}

fn floor_divide(left: &Value, right: &Value) -> EvalResult<Value> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        if b == 0 {
            return Err(zero_division("integer division or modulo by zero"));
        }
        let q = a.checked_div(b).ok_or_else(overflow)?;
        let adjust = a % b != 0 && ((a < 0) != (b < 0));
        return Ok(Value::Int(if adjust { q - 1 } else { q }));
    }
    match (left.as_float(), right.as_float()) {
        (Some(_), Some(b)) if b == 0.0 => Err(zero_division("float floor division by zero")),
        (Some(a), Some(b)) => Ok(Value::Float((a / b).floor())),
        _ => Err(unsupported("//", left, right)),
    }
}

fn modulo(left: &Value, right: &Value) -> EvalResult<Value> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        if b == 0 {
            return Err(zero_division("integer division or modulo by zero"));
        }
        let r = a.wrapping_rem(b);
        return Ok(Value::Int(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }));
    }
    match (left.as_float(), right.as_float()) {
        (Some(_), Some(b)) if b == 0.0 => Err(zero_division("float modulo")),
        (Some(a), Some(b)) => {
            let r = a % b;
            Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }))
        }
        _ => Err(unsupported("%", left, right)),
    }
}

fn power(left: &Value, right: &Value) -> EvalResult<Value> {
    if let (Some(base), Some(exp)) = (left.as_int(), right.as_int()) {
        if exp >= 0 {
            return int_power(base, exp).map(Value::Int);
        }
        if base == 0 {
            return Err(zero_division("0.0 cannot be raised to a negative power"));
        }
        return Ok(Value::Float((base as f64).powf(exp as f64)));
    }
    let (Some(base), Some(exp)) = (left.as_float(), right.as_float()) else {
        return Err(unsupported("**", left, right));
    };
    if base == 0.0 && exp < 0.0 {
        return Err(zero_division("0.0 cannot be raised to a negative power"));
    }
    if base < 0.0 && exp.fract() != 0.0 {
        return Err(EvalError::value_error(
            "negative number cannot be raised to a fractional power",
        ));
    }
    let result = base.powf(exp);
    if result.is_infinite() && base.is_finite() && exp.is_finite() {
        return Err(EvalError::new(
            ExcKind::OverflowError,
            "numerical result out of range",
        ));
    }
    Ok(Value::Float(result))
}

fn int_power(base: i64, exp: i64) -> EvalResult<i64> {
    match (base, u32::try_from(exp)) {
        (_, Ok(exp)) => base.checked_pow(exp).ok_or_else(overflow),
        (0 | 1, Err(_)) => Ok(base),
        (-1, Err(_)) => Ok(if exp % 2 == 0 { 1 } else { -1 }),
        _ => Err(overflow()),
    }
}

pub fn unary_op(op: UnaryOp, operand: &Value) -> EvalResult<Value> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Pos, Value::Float(x)) => Ok(Value::Float(*x)),
        (UnaryOp::Neg, v) if v.as_int().is_some() => v
            .as_int()
            .and_then(i64::checked_neg)
            .map(Value::Int)
            .ok_or_else(overflow),
        (UnaryOp::Pos, v) if v.as_int().is_some() => Ok(Value::Int(v.as_int().unwrap_or(0))),
        (UnaryOp::Neg, v) => Err(EvalError::type_error(format!(
            "bad operand type for unary -: '{}'",
            v.type_name()
        ))),
        (UnaryOp::Pos, v) => Err(EvalError::type_error(format!(
            "bad operand type for unary +: '{}'",
            v.type_name()
        ))),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Comparison
// ══════════════════════════════════════════════════════════════════════════════

pub fn compare_op(op: CmpOp, left: &Value, right: &Value) -> EvalResult<bool> {
    let wanted: fn(Ordering) -> bool = match op {
        CmpOp::Eq => return checked_equal(left, right),
        CmpOp::NotEq => return checked_equal(left, right).map(|equal| !equal),
        CmpOp::Is => return Ok(left.identical(right)),
        CmpOp::IsNot => return Ok(!left.identical(right)),
        CmpOp::In => return contains(right, left),
        CmpOp::NotIn => return contains(right, left).map(|found| !found),
        CmpOp::Less => Ordering::is_lt,
        CmpOp::LessEq => Ordering::is_le,
        CmpOp::Greater => Ordering::is_gt,
        CmpOp::GreaterEq => Ordering::is_ge,
    };
    match checked_compare(left, right)? {
        Some(ordering) => Ok(wanted(ordering)),
        // NaN is unordered but still comparable.
        None if left.as_float().is_some() && right.as_float().is_some() => Ok(false),
        None => Err(EvalError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

/// `item in container`
pub fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(EvalError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.borrow().iter().any(|v| values_equal(v, item))),
        Value::Tuple(items) => Ok(items.iter().any(|v| values_equal(v, item))),
        Value::Dict(dict) => Ok(dict.borrow().contains_key(item)),
        Value::Range(range) => Ok(match (item.as_int(), item) {
            (Some(n), _) => range.contains(n),
            (None, Value::Float(x)) if x.fract() == 0.0 && x.is_finite() => {
                range.contains(*x as i64)
            }
            _ => false,
        }),
        other => Err(EvalError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Indexing
// ══════════════════════════════════════════════════════════════════════════════

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let i = if index < 0 { index + len } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn int_index(container: &Value, index: &Value) -> EvalResult<i64> {
    index.as_int().ok_or_else(|| {
        EvalError::type_error(format!(
            "{} indices must be integers or slices, not {}",
            container.type_name(),
            index.type_name()
        ))
    })
}

fn check_key(key: &Value) -> EvalResult<()> {
    if key.is_hashable() {
        Ok(())
    } else {
        Err(EvalError::type_error(format!(
            "unhashable type: '{}'",
            key.type_name()
        )))
    }
}

fn index_error(what: &str) -> EvalError {
    EvalError::new(ExcKind::IndexError, format!("{what} index out of range"))
}

/// `container[index]`
pub fn get_item(container: &Value, index: &Value) -> EvalResult<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let i = int_index(container, index)?;
            normalize_index(i, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| index_error("list"))
        }
        Value::Tuple(items) => {
            let i = int_index(container, index)?;
            normalize_index(i, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| index_error("tuple"))
        }
        Value::Str(s) => {
            let i = int_index(container, index)?;
            let len = s.chars().count();
            normalize_index(i, len)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| index_error("string"))
        }
        Value::Range(range) => {
            let i = int_index(container, index)?;
            normalize_index(i, range.len())
                .map(|i| Value::Int(range.start + range.step * i as i64))
                .ok_or_else(|| index_error("range object"))
        }
        Value::Dict(dict) => {
            check_key(index)?;
            dict.borrow()
                .get(index)
                .cloned()
                .ok_or_else(|| EvalError::new(ExcKind::KeyError, index.repr()))
        }
        other => Err(EvalError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `container[index] = value`
pub fn set_item(container: &Value, index: &Value, value: Value) -> EvalResult<()> {
    match container {
        Value::List(items) => {
            let i = int_index(container, index)?;
            let mut items = items.borrow_mut();
            let len = items.len();
            let slot = normalize_index(i, len).ok_or_else(|| index_error("list assignment"))?;
            items[slot] = value;
            Ok(())
        }
        Value::Dict(dict) => {
            check_key(index)?;
            dict.borrow_mut().insert(index.clone(), value);
            Ok(())
        }
        other => Err(EvalError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `del container[index]`
pub fn del_item(container: &Value, index: &Value) -> EvalResult<()> {
    match container {
        Value::List(items) => {
            let i = int_index(container, index)?;
            let mut items = items.borrow_mut();
            let len = items.len();
            let slot = normalize_index(i, len).ok_or_else(|| index_error("list assignment"))?;
            items.remove(slot);
            Ok(())
        }
        Value::Dict(dict) => {
            check_key(index)?;
            dict.borrow_mut()
                .remove(index)
                .map(|_| ())
                .ok_or_else(|| EvalError::new(ExcKind::KeyError, index.repr()))
        }
        other => Err(EvalError::type_error(format!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}

/// Positions selected by `[lower:upper:step]` over a sequence of `len`.
pub fn slice_indices(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> EvalResult<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(EvalError::value_error("slice step cannot be zero"));
    }
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let clamp = |bound: i64| -> i64 {
        let bound = if bound < 0 { bound.saturating_add(len) } else { bound };
        if step > 0 {
            bound.clamp(0, len)
        } else {
            bound.clamp(-1, len - 1)
        }
    };
    let (mut i, stop) = if step > 0 {
        (lower.map_or(0, clamp), upper.map_or(len, clamp))
    } else {
        (lower.map_or(len - 1, clamp), upper.map_or(-1, clamp))
    };
    let mut out = Vec::new();
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(i as usize);
        i = match i.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(out)
}

/// `container[lower:upper:step]`
pub fn get_slice(
    container: &Value,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> EvalResult<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let picked = slice_indices(items.len(), lower, upper, step)?;
            Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let picked = slice_indices(items.len(), lower, upper, step)?;
            Ok(Value::tuple(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked = slice_indices(chars.len(), lower, upper, step)?;
            Ok(Value::Str(picked.into_iter().map(|i| chars[i]).collect()))
        }
        other => Err(EvalError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Iteration
// ══════════════════════════════════════════════════════════════════════════════

/// Iterate over a value the way `for` does.
///
/// Lists are iterated over a snapshot taken when the loop starts.
pub fn iterate(value: &Value) -> EvalResult<Box<dyn Iterator<Item = Value>>> {
    Ok(match value {
        Value::List(items) => Box::new(items.borrow().clone().into_iter()),
        Value::Tuple(items) => Box::new(items.as_ref().clone().into_iter()),
        Value::Str(s) => Box::new(
            s.chars()
                .map(|c| Value::Str(c.to_string()))
                .collect::<Vec<_>>()
                .into_iter(),
        ),
        Value::Dict(dict) => Box::new(dict.borrow().keys().into_iter()),
        Value::Range(range) => Box::new(range.iter().map(Value::Int)),
        other => {
            return Err(EvalError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            )))
        }
    })
}

/// Materialize an iterable, refusing to build more than
/// [`MAX_SEQUENCE_LEN`] items.
pub fn collect(value: &Value) -> EvalResult<Vec<Value>> {
    if let Value::Range(range) = value {
        if range.len() > MAX_SEQUENCE_LEN {
            return Err(too_large());
        }
    }
    let mut out = Vec::new();
    for item in iterate(value)? {
        if out.len() >= MAX_SEQUENCE_LEN {
            return Err(too_large());
        }
        out.push(item);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    fn fault_kind(result: EvalResult<Value>) -> ExcKind {
        match result {
            Err(EvalError::Fault(fault)) => fault.kind,
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_floor_division_and_modulo_follow_divisor_sign() {
        assert_eq!(binary_op(BinOp::FloorDiv, &int(-7), &int(2)).unwrap(), int(-4));
        assert_eq!(binary_op(BinOp::Mod, &int(-7), &int(2)).unwrap(), int(1));
        assert_eq!(binary_op(BinOp::Mod, &int(7), &int(-2)).unwrap(), int(-1));
        assert_eq!(
            binary_op(BinOp::Mod, &Value::Float(-1.0), &Value::Float(3.0)).unwrap(),
            Value::Float(2.0)
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            fault_kind(binary_op(BinOp::Div, &int(1), &int(0))),
            ExcKind::ZeroDivisionError
        );
        assert_eq!(
            fault_kind(binary_op(BinOp::Mod, &int(1), &int(0))),
            ExcKind::ZeroDivisionError
        );
    }

    #[test]
    fn test_true_division_is_float() {
        assert_eq!(binary_op(BinOp::Div, &int(7), &int(2)).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn test_integer_overflow() {
        assert_eq!(
            fault_kind(binary_op(BinOp::Mul, &int(i64::MAX), &int(2))),
            ExcKind::OverflowError
        );
        assert_eq!(
            fault_kind(binary_op(BinOp::Pow, &int(2), &int(64))),
            ExcKind::OverflowError
        );
        assert_eq!(fault_kind(unary_op(UnaryOp::Neg, &int(i64::MIN))), ExcKind::OverflowError);
    }

    #[test]
    fn test_power() {
        assert_eq!(binary_op(BinOp::Pow, &int(2), &int(10)).unwrap(), int(1024));
        assert_eq!(binary_op(BinOp::Pow, &int(2), &int(-1)).unwrap(), Value::Float(0.5));
        assert_eq!(binary_op(BinOp::Pow, &int(1), &int(i64::MAX)).unwrap(), int(1));
    }

    #[test]
    fn test_sequence_repetition() {
        assert_eq!(
            binary_op(BinOp::Mul, &Value::str("ab"), &int(3)).unwrap(),
            Value::str("ababab")
        );
        assert_eq!(
            binary_op(BinOp::Mul, &int(-1), &Value::list(vec![int(1)])).unwrap(),
            Value::list(vec![])
        );
        assert_eq!(
            fault_kind(binary_op(BinOp::Mul, &Value::str("x"), &int(i64::MAX))),
            ExcKind::MemoryError
        );
    }

    #[test]
    fn test_mixed_add_is_type_error() {
        match binary_op(BinOp::Add, &Value::str("a"), &int(1)) {
            Err(EvalError::Fault(fault)) => {
                assert_eq!(fault.message, "can only concatenate str (not \"int\") to str")
            }
            other => panic!("expected fault, got {other:?}"),
        }
        match binary_op(BinOp::Sub, &int(1), &Value::None) {
            Err(EvalError::Fault(fault)) => assert_eq!(
                fault.message,
                "unsupported operand type(s) for -: 'int' and 'NoneType'"
            ),
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_comparisons() {
        assert!(compare_op(CmpOp::Less, &int(1), &Value::Float(1.5)).unwrap());
        assert!(!compare_op(CmpOp::Less, &Value::Float(f64::NAN), &int(1)).unwrap());
        assert!(compare_op(CmpOp::Less, &int(1), &Value::str("a")).is_err());
        assert!(compare_op(CmpOp::In, &Value::str("ell"), &Value::str("hello")).unwrap());
        assert!(compare_op(CmpOp::NotIn, &int(3), &Value::list(vec![int(1)])).unwrap());
    }

    #[test]
    fn test_indexing() {
        let list = Value::list(vec![int(1), int(2), int(3)]);
        assert_eq!(get_item(&list, &int(-1)).unwrap(), int(3));
        assert_eq!(fault_kind(get_item(&list, &int(3))), ExcKind::IndexError);
        assert_eq!(get_item(&Value::str("héllo"), &int(1)).unwrap(), Value::str("é"));
        assert_eq!(
            fault_kind(get_item(&int(1), &int(0))),
            ExcKind::TypeError
        );
    }

    #[test]
    fn test_slices() {
        assert_eq!(slice_indices(5, Some(1), None, None).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(slice_indices(5, None, None, Some(-1)).unwrap(), vec![4, 3, 2, 1, 0]);
        assert_eq!(slice_indices(5, Some(-2), None, None).unwrap(), vec![3, 4]);
        assert_eq!(slice_indices(5, Some(10), Some(20), None).unwrap(), Vec::<usize>::new());
        assert!(slice_indices(5, None, None, Some(0)).is_err());
        assert_eq!(
            get_slice(&Value::str("hello"), None, None, Some(-1)).unwrap(),
            Value::str("olleh")
        );
    }

    #[test]
    fn test_unhashable_key() {
        let dict = Value::dict(crate::value::Dict::new());
        let err = set_item(&dict, &Value::list(vec![]), int(1)).unwrap_err();
        assert_eq!(err.fault().map(|f| f.kind), Some(ExcKind::TypeError));
    }

    #[test]
    fn test_collect_refuses_huge_ranges() {
        let huge = Value::Range(crate::value::RangeValue {
            start: 0,
            stop: i64::MAX,
            step: 1,
        });
        assert!(collect(&huge).is_err());
    }
}
