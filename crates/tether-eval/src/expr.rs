//! Expression evaluation.

use std::rc::Rc;

use tether_types::ast::*;

use crate::error::{EvalError, EvalResult, ExcKind};
use crate::interpreter::Exec;
use crate::methods;
use crate::ops;
use crate::value::{BoundMethod, CallArgs, Dict, Value};

impl Exec<'_> {
    /// Evaluate an expression to a value.
    pub(crate) fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        self.tick()?;
        match &expr.kind {
            ExprKind::NoneLit => Ok(Value::None),
            ExprKind::BoolLit(b) => Ok(Value::Bool(*b)),
            ExprKind::IntLit(n) => Ok(Value::Int(*n)),
            ExprKind::FloatLit(x) => Ok(Value::Float(*x)),
            ExprKind::StrLit(s) => Ok(Value::Str(s.clone())),
            ExprKind::Name(name) => self.load(name),

            ExprKind::List(items) => Ok(Value::list(self.eval_all(items)?)),
            ExprKind::Tuple(items) => Ok(Value::tuple(self.eval_all(items)?)),
            ExprKind::Dict(entries) => self.eval_dict(entries),

            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                ops::unary_op(*op, &value)
            }
            ExprKind::Binary { left, op, right } => self.eval_binary(left, *op, right),
            ExprKind::Compare { left, links } => self.eval_compare(left, links),
            ExprKind::IfElse { test, body, orelse } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }

            ExprKind::Call { func, args } => {
                let callee = self.eval(func)?;
                let args = self.eval_args(args)?;
                self.call_value(&callee, args)
            }
            ExprKind::Attribute { object, name } => {
                let receiver = self.eval(object)?;
                self.eval_attribute(receiver, &name.name)
            }
            ExprKind::Subscript { object, index } => {
                let container = self.eval(object)?;
                match &index.kind {
                    ExprKind::Slice { lower, upper, step } => {
                        let lower = self.eval_slice_bound(lower.as_deref())?;
                        let upper = self.eval_slice_bound(upper.as_deref())?;
                        let step = self.eval_slice_bound(step.as_deref())?;
                        ops::get_slice(&container, lower, upper, step)
                    }
                    _ => {
                        let index = self.eval(index)?;
                        ops::get_item(&container, &index)
                    }
                }
            }
            ExprKind::Slice { .. } => Err(EvalError::new(
                ExcKind::RuntimeError,
                "slice outside of a subscript",
            )),
            ExprKind::Lambda { params, body } => {
                let function = self.make_lambda(params, body)?;
                Ok(Value::Function(Rc::new(function)))
            }
        }
    }

    fn eval_all(&mut self, items: &[Expr]) -> EvalResult<Vec<Value>> {
        items.iter().map(|item| self.eval(item)).collect()
    }

    fn eval_dict(&mut self, entries: &[(Expr, Expr)]) -> EvalResult<Value> {
        let mut dict = Dict::new();
        for (key, value) in entries {
            let key = self.eval(key)?;
            if !key.is_hashable() {
                return Err(EvalError::type_error(format!(
                    "unhashable type: '{}'",
                    key.type_name()
                )));
            }
            let value = self.eval(value)?;
            dict.insert(key, value);
        }
        Ok(Value::dict(dict))
    }

    /// `and` / `or` return one of their operands and skip the right side
    /// when the left decides the result.
    fn eval_binary(&mut self, left: &Expr, op: BinOp, right: &Expr) -> EvalResult<Value> {
        let lv = self.eval(left)?;
        match op {
            BinOp::And if !lv.is_truthy() => Ok(lv),
            BinOp::Or if lv.is_truthy() => Ok(lv),
            BinOp::And | BinOp::Or => self.eval(right),
            _ => {
                let rv = self.eval(right)?;
                ops::binary_op(op, &lv, &rv)
            }
        }
    }

    /// `a < b < c` evaluates `b` once and stops at the first false link.
    fn eval_compare(&mut self, left: &Expr, links: &[(CmpOp, Expr)]) -> EvalResult<Value> {
        let mut current = self.eval(left)?;
        for (op, operand) in links {
            let next = self.eval(operand)?;
            if !ops::compare_op(*op, &current, &next)? {
                return Ok(Value::Bool(false));
            }
            current = next;
        }
        Ok(Value::Bool(true))
    }

    fn eval_slice_bound(&mut self, bound: Option<&Expr>) -> EvalResult<Option<i64>> {
        let Some(expr) = bound else {
            return Ok(None);
        };
        match self.eval(expr)? {
            Value::None => Ok(None),
            value => value.as_int().map(Some).ok_or_else(|| {
                EvalError::type_error("slice indices must be integers or None")
            }),
        }
    }

    fn eval_args(&mut self, args: &[Arg]) -> EvalResult<CallArgs> {
        let mut call_args = CallArgs::default();
        for arg in args {
            match arg {
                Arg::Positional(expr) => call_args.positional.push(self.eval(expr)?),
                Arg::Keyword(name, expr) => {
                    let value = self.eval(expr)?;
                    call_args.keywords.push((name.name.clone(), value));
                }
            }
        }
        Ok(call_args)
    }

    fn eval_attribute(&mut self, receiver: Value, name: &str) -> EvalResult<Value> {
        if methods::has_method(&receiver, name) {
            return Ok(Value::BoundMethod(Rc::new(BoundMethod {
                receiver,
                name: name.to_string(),
            })));
        }
        Err(EvalError::new(
            ExcKind::AttributeError,
            format!("'{}' object has no attribute '{name}'", receiver.type_name()),
        ))
    }

    /// Call any callable value.
    pub(crate) fn call_value(&mut self, callee: &Value, args: CallArgs) -> EvalResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, args),
            Value::Builtin(builtin) => (builtin.func)(&mut *self.out, args),
            Value::BoundMethod(method) => methods::call_method(&method.receiver, &method.name, args),
            other => Err(EvalError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }
}
