//! Shared types for the Tether console.
//!
//! This crate defines the AST node types, source spans, and the syntax
//! diagnostics shared by the lexer, the parser, and the console.

mod error;
mod span;
pub mod ast;

pub use error::{ParseFailure, ParseOutcome, SyntaxDiagnostic, SyntaxKind};
pub use span::{SourceFile, Span};

/// Maximum bracket / block nesting accepted by the lexer and parser.
pub const MAX_NESTING: u32 = 100;
