//! Tether parser: converts a token stream into an AST.
//!
//! Two entry points mirror the two ways the console evaluates a unit:
//! [`Parser::parse_eval`] accepts exactly one expression, and
//! [`Parser::parse_interactive`] accepts one statement line or one compound
//! statement. [`classify`] combines them into the console's decision.

mod classify;
mod parse_expr;
mod parse_stmt;
mod parser;

pub use classify::{classify, Classification};
pub use parser::Parser;
