//! Decide what the console should do with the text buffered so far.

use tether_lexer::Lexer;
use tether_types::ast::{Expr, Stmt};
use tether_types::{ParseFailure, SourceFile, SyntaxDiagnostic};
use tracing::debug;

use crate::Parser;

/// The outcome of compiling one buffered unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The unit is a single expression; its value should be echoed.
    Expression(Expr),
    /// The unit is a statement line or a finished compound statement.
    Statement(Vec<Stmt>),
    /// More lines are needed before anything can run.
    Incomplete,
    /// The unit can never become valid.
    Malformed(SyntaxDiagnostic),
}

impl Classification {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }
}

impl From<ParseFailure> for Classification {
    fn from(failure: ParseFailure) -> Self {
        match failure {
            ParseFailure::Incomplete => Self::Incomplete,
            ParseFailure::Malformed(diag) => Self::Malformed(diag),
        }
    }
}

/// Classify a unit.
///
/// Expression mode is tried first and any failure there is discarded; the
/// unit is then compiled as an interactive statement, whose outcome
/// decides between statement, incomplete and malformed.
pub fn classify(source: &SourceFile) -> Classification {
    let tokens = match Lexer::new(source).lex() {
        Ok(tokens) => tokens,
        Err(failure) => {
            debug!(unit = %source.name, ?failure, "lexing stopped");
            return failure.into();
        }
    };

    if let Ok(expr) = Parser::new(tokens.clone(), source).parse_eval() {
        debug!(unit = %source.name, "classified as expression");
        return Classification::Expression(expr);
    }

    match Parser::new(tokens, source).parse_interactive() {
        Ok(stmts) => {
            debug!(unit = %source.name, count = stmts.len(), "classified as statement");
            Classification::Statement(stmts)
        }
        Err(failure) => {
            debug!(unit = %source.name, incomplete = failure.is_incomplete(), "statement mode failed");
            failure.into()
        }
    }
}
