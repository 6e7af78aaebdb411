//! Runtime values and their textual renderings.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use tether_types::ast::{Expr, Stmt};

use crate::env::Scope;
use crate::error::{EvalError, EvalResult, ExcKind};

/// Deepest container nesting that comparison and rendering descend into.
const MAX_NESTING_DEPTH: u32 = 256;

/// A Tether runtime value.
///
/// Scalars are stored inline; lists and dicts are shared, mutable handles,
/// so aliasing behaves the way scripts expect (`b = a; b.append(1)`
/// is visible through `a`).
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<Dict>>),
    Range(RangeValue),
    Function(Rc<Function>),
    Builtin(Rc<Builtin>),
    BoundMethod(Rc<BoundMethod>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Self::Tuple(Rc::new(items))
    }

    pub fn dict(dict: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(dict)))
    }

    /// The name `type(value)` reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Range(_) => "range",
            Self::Function(_) => "function",
            Self::Builtin(_) | Self::BoundMethod(_) => "builtin_function_or_method",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(x) => *x != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::Dict(dict) => !dict.borrow().is_empty(),
            Self::Range(range) => range.len() > 0,
            Self::Function(_) | Self::Builtin(_) | Self::BoundMethod(_) => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Whether the value may be used as a dict key.
    pub fn is_hashable(&self) -> bool {
        match self {
            Self::List(_) | Self::Dict(_) => false,
            Self::Tuple(items) => items.iter().all(Value::is_hashable),
            _ => true,
        }
    }

    /// Numeric view used by arithmetic: `bool` counts as an integer.
    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub(crate) fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            other => other.as_int().map(|n| n as f64),
        }
    }

    /// `is` semantics: shared containers compare by handle, scalars by value.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b) || (a.is_empty() && b.is_empty()),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => Rc::ptr_eq(a, b),
            (Self::BoundMethod(a), Self::BoundMethod(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The `repr()` form: strings quoted, containers shown with their items.
    ///
    /// Containers nested too deeply to render are cut short with `...`;
    /// use [`Value::try_repr`] where that must surface as an error.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        Renderer::default().repr(self, &mut out);
        out
    }

    /// The `str()` form: strings as-is, everything else as `repr()`.
    pub fn to_str(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// `repr()` as scripts see it: `RecursionError` when nesting is too deep.
    pub fn try_repr(&self) -> EvalResult<String> {
        let mut renderer = Renderer::default();
        let mut out = String::new();
        renderer.repr(self, &mut out);
        if renderer.truncated {
            return Err(EvalError::new(
                ExcKind::RecursionError,
                "maximum recursion depth exceeded while getting the repr of an object",
            ));
        }
        Ok(out)
    }

    /// `str()` as scripts see it.
    pub fn try_to_str(&self) -> EvalResult<String> {
        match self {
            Self::Str(s) => Ok(s.clone()),
            other => other.try_repr(),
        }
    }
}

/// Containers are released from a work list, so dropping a deeply nested
/// value never recurses.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        release_items(self, &mut pending);
        while let Some(mut value) = pending.pop() {
            release_items(&mut value, &mut pending);
        }
    }
}

/// Move the items of a container out onto `pending` when `value` holds the
/// last reference to it.
fn release_items(value: &mut Value, pending: &mut Vec<Value>) {
    match value {
        Value::List(items) => {
            if let Some(items) = Rc::get_mut(items) {
                pending.append(items.get_mut());
            }
        }
        Value::Tuple(items) => {
            if let Some(items) = Rc::get_mut(items) {
                pending.append(items);
            }
        }
        Value::Dict(dict) => {
            if let Some(dict) = Rc::get_mut(dict) {
                for (key, item) in dict.get_mut().entries.drain(..) {
                    pending.push(key);
                    pending.push(item);
                }
            }
        }
        Value::BoundMethod(method) => {
            if let Some(method) = Rc::get_mut(method) {
                pending.push(std::mem::replace(&mut method.receiver, Value::None));
            }
        }
        _ => {}
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Containers
// ══════════════════════════════════════════════════════════════════════════════

/// An insertion-ordered mapping with equality-based key lookup.
#[derive(Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &Value) -> Option<usize> {
        self.entries.iter().position(|(k, _)| values_equal(k, key))
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.position(key).is_some()
    }

    /// Insert or replace. The caller checks hashability.
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.position(&key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }
}

/// `range(start, stop, step)`; `step` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    pub fn len(&self) -> usize {
        let (lo, hi, step) = if self.step > 0 {
            (self.start as i128, self.stop as i128, self.step as i128)
        } else {
            (self.stop as i128, self.start as i128, -(self.step as i128))
        };
        if hi <= lo {
            0
        } else {
            usize::try_from((hi - lo + step - 1) / step).unwrap_or(usize::MAX)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, n: i64) -> bool {
        let in_bounds = if self.step > 0 {
            self.start <= n && n < self.stop
        } else {
            self.stop < n && n <= self.start
        };
        in_bounds && (n as i128 - self.start as i128) % self.step as i128 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = i64> {
        let mut next = Some(self.start);
        std::iter::from_fn(move || {
            let current = next?;
            let live = if self.step > 0 {
                current < self.stop
            } else {
                current > self.stop
            };
            if !live {
                return None;
            }
            next = current.checked_add(self.step);
            Some(current)
        })
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Callables
// ══════════════════════════════════════════════════════════════════════════════

/// A parameter with its default already evaluated.
#[derive(Clone)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<Value>,
}

#[derive(Clone)]
pub enum FunctionBody {
    Block(Rc<[Stmt]>),
    /// A `lambda` body; its value is the return value.
    Expr(Rc<Expr>),
}

/// A user-defined function or lambda.
pub struct Function {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub body: FunctionBody,
    /// Names bound anywhere in the body, parameters included.
    pub locals: HashSet<String>,
    /// Names declared `global` in the body.
    pub globals: HashSet<String>,
    /// Scopes of the enclosing functions, innermost last.
    pub enclosing: Vec<Scope>,
}

/// Arguments of a call, after evaluation.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            keywords: Vec::new(),
        }
    }

    /// Check the positional count and reject keywords other than `allowed`.
    pub fn check(&self, name: &str, min: usize, max: usize, allowed: &[&str]) -> EvalResult<()> {
        if let Some((key, _)) = self.keywords.iter().find(|(k, _)| !allowed.contains(&k.as_str())) {
            return Err(EvalError::type_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            )));
        }
        let given = self.positional.len();
        if given < min || given > max {
            let (qualifier, bound) = if min == max {
                ("exactly", min)
            } else if given < min {
                ("at least", min)
            } else {
                ("at most", max)
            };
            let noun = if bound == 1 { "argument" } else { "arguments" };
            return Err(EvalError::type_error(format!(
                "{name}() takes {qualifier} {bound} {noun} ({given} given)"
            )));
        }
        Ok(())
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }
}

/// Signature shared by every native function.
pub type BuiltinFn = dyn Fn(&mut dyn Write, CallArgs) -> EvalResult<Value>;

/// A function implemented in Rust.
pub struct Builtin {
    pub name: String,
    pub func: Box<BuiltinFn>,
}

impl Builtin {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&mut dyn Write, CallArgs) -> EvalResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

/// `receiver.name`, ready to be called.
pub struct BoundMethod {
    pub receiver: Value,
    pub name: String,
}

// ══════════════════════════════════════════════════════════════════════════════
// Equality & Ordering
// ══════════════════════════════════════════════════════════════════════════════

/// Comparison gave up because the containers nest too deeply.
struct TooDeep;

fn too_deep_to_compare() -> EvalError {
    EvalError::new(
        ExcKind::RecursionError,
        "maximum recursion depth exceeded in comparison",
    )
}

/// `==` semantics. Numbers compare across `bool`/`int`/`float`.
///
/// Containers nested too deeply to compare are treated as unequal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    equal_at(a, b, 0).unwrap_or(false)
}

/// `==` as scripts see it: `RecursionError` when nesting is too deep.
pub fn checked_equal(a: &Value, b: &Value) -> EvalResult<bool> {
    equal_at(a, b, 0).map_err(|TooDeep| too_deep_to_compare())
}

fn equal_at(a: &Value, b: &Value, depth: u32) -> Result<bool, TooDeep> {
    if depth > MAX_NESTING_DEPTH {
        return Err(TooDeep);
    }
    Ok(match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            Rc::ptr_eq(x, y) || seq_equal(&x.borrow(), &y.borrow(), depth)?
        }
        (Value::Tuple(x), Value::Tuple(y)) => Rc::ptr_eq(x, y) || seq_equal(x, y, depth)?,
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return Ok(true);
            }
            let (x, y) = (x.borrow(), y.borrow());
            if x.len() != y.len() {
                return Ok(false);
            }
            for (k, v) in x.entries() {
                match y.get(k) {
                    Some(other) if equal_at(v, other, depth + 1)? => {}
                    _ => return Ok(false),
                }
            }
            true
        }
        (Value::Range(x), Value::Range(y)) => {
            let (lx, ly) = (x.len(), y.len());
            lx == ly && (lx == 0 || (x.start == y.start && (lx == 1 || x.step == y.step)))
        }
        (Value::Function(_), _)
        | (Value::Builtin(_), _)
        | (Value::BoundMethod(_), _) => a.identical(b),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => match (a.as_int(), b.as_int()) {
                (Some(i), Some(j)) => i == j,
                _ => x == y,
            },
            _ => false,
        },
    })
}

fn seq_equal(a: &[Value], b: &[Value], depth: u32) -> Result<bool, TooDeep> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !equal_at(x, y, depth + 1)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `<` family ordering, or `None` when the two values are unorderable.
/// Raises `RecursionError` when nesting is too deep.
pub fn checked_compare(a: &Value, b: &Value) -> EvalResult<Option<Ordering>> {
    compare_at(a, b, 0).map_err(|TooDeep| too_deep_to_compare())
}

fn compare_at(a: &Value, b: &Value, depth: u32) -> Result<Option<Ordering>, TooDeep> {
    if depth > MAX_NESTING_DEPTH {
        return Err(TooDeep);
    }
    Ok(match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::List(x), Value::List(y)) => return seq_compare(&x.borrow(), &y.borrow(), depth),
        (Value::Tuple(x), Value::Tuple(y)) => return seq_compare(x, y, depth),
        _ => match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        },
    })
}

fn seq_compare(a: &[Value], b: &[Value], depth: u32) -> Result<Option<Ordering>, TooDeep> {
    for (x, y) in a.iter().zip(b) {
        if !equal_at(x, y, depth + 1)? {
            return compare_at(x, y, depth + 1);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

// ══════════════════════════════════════════════════════════════════════════════
// Rendering
// ══════════════════════════════════════════════════════════════════════════════

/// Tracks the containers currently being rendered so that a list holding
/// itself prints as `[...]`.
#[derive(Default)]
struct Renderer {
    active: Vec<*const ()>,
    depth: u32,
    /// Set when nesting past `MAX_NESTING_DEPTH` was elided.
    truncated: bool,
}

impl Renderer {
    fn enter(&mut self, ptr: *const ()) -> bool {
        if self.active.contains(&ptr) {
            return false;
        }
        self.active.push(ptr);
        true
    }

    fn leave(&mut self) {
        self.active.pop();
    }

    fn repr(&mut self, value: &Value, out: &mut String) {
        if matches!(value, Value::List(_) | Value::Tuple(_) | Value::Dict(_)) {
            if self.depth >= MAX_NESTING_DEPTH {
                self.truncated = true;
                out.push_str("...");
                return;
            }
            self.depth += 1;
            self.render(value, out);
            self.depth -= 1;
        } else {
            self.render(value, out);
        }
    }

    fn render(&mut self, value: &Value, out: &mut String) {
        match value {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Float(x) => out.push_str(&format_float(*x)),
            Value::Str(s) => out.push_str(&repr_str(s)),
            Value::List(items) => {
                if !self.enter(Rc::as_ptr(items).cast()) {
                    out.push_str("[...]");
                    return;
                }
                out.push('[');
                self.items(&items.borrow(), out);
                out.push(']');
                self.leave();
            }
            Value::Tuple(items) => {
                out.push('(');
                self.items(items, out);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(dict) => {
                if !self.enter(Rc::as_ptr(dict).cast()) {
                    out.push_str("{...}");
                    return;
                }
                out.push('{');
                for (i, (k, v)) in dict.borrow().entries().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.repr(k, out);
                    out.push_str(": ");
                    self.repr(v, out);
                }
                out.push('}');
                self.leave();
            }
            Value::Range(r) if r.step == 1 => {
                out.push_str(&format!("range({}, {})", r.start, r.stop));
            }
            Value::Range(r) => {
                out.push_str(&format!("range({}, {}, {})", r.start, r.stop, r.step));
            }
            Value::Function(f) => out.push_str(&format!("<function {}>", f.name)),
            Value::Builtin(b) => out.push_str(&format!("<built-in function {}>", b.name)),
            Value::BoundMethod(m) => out.push_str(&format!(
                "<built-in method {} of {} object>",
                m.name,
                m.receiver.type_name()
            )),
        }
    }

    fn items(&mut self, items: &[Value], out: &mut String) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.repr(item, out);
        }
    }
}

/// Shortest round-trip float text, switching to exponent notation outside
/// `1e-4 <= |x| < 1e16`: `4.0`, `0.1`, `1e+20`, `1.5e-07`.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let sci = format!("{x:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if x == 0.0 || (-4..16).contains(&exponent) {
        let fixed = format!("{x}");
        if fixed.contains('.') {
            fixed
        } else {
            format!("{fixed}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}

/// Quote a string the way `repr()` does: single quotes unless the text
/// holds a single quote and no double quote.
pub fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c == '\x7f' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
