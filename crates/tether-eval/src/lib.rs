//! Tether tree-walking interpreter.
//!
//! Executes parsed units directly from the AST against one persistent
//! [`Environment`]. Effects of a unit that faults part-way are kept; the
//! fault comes back as an [`EvalError`] carrying a [`RuntimeFault`] with
//! its traceback.

mod builtins;
mod env;
mod error;
mod expr;
mod interpreter;
mod methods;
mod ops;
mod value;

pub use env::{Environment, Scope};
pub use error::{EvalError, EvalResult, ExcKind, RuntimeFault, TraceFrame};
pub use interpreter::{Interpreter, InterpreterConfig};
pub use value::{
    format_float, repr_str, values_equal, BoundMethod, Builtin, BuiltinFn, CallArgs, Dict,
    Function, RangeValue, Value,
};
