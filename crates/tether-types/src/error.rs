use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which family a syntax diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntaxKind {
    SyntaxError,
    IndentationError,
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SyntaxError => write!(f, "SyntaxError"),
            Self::IndentationError => write!(f, "IndentationError"),
        }
    }
}

/// A malformed-input report, positioned in the unit that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxDiagnostic {
    /// Name the unit is reported under (e.g. `<console>`).
    pub file: String,
    pub kind: SyntaxKind,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The offending source line, verbatim.
    pub source_line: String,
}

impl SyntaxDiagnostic {
    pub fn new(
        file: impl Into<String>,
        kind: SyntaxKind,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            kind,
            message: message.into(),
            span,
            source_line: source_line.into(),
        }
    }

    /// Render the diagnostic in the console's traceback style:
    ///
    /// ```text
    ///   File "<console>", line 1
    ///     x = = 1
    ///         ^
    /// SyntaxError: invalid syntax
    /// ```
    pub fn render(&self) -> String {
        let mut out = format!("  File \"{}\", line {}\n", self.file, self.span.start_line);
        let trimmed = self.source_line.trim_start();
        if !trimmed.trim_end().is_empty() {
            let indent = self.source_line.chars().count() - trimmed.chars().count();
            let caret = (self.span.start_col as usize)
                .saturating_sub(1)
                .saturating_sub(indent)
                .min(trimmed.chars().count());
            out.push_str(&format!("    {}\n", trimmed.trim_end()));
            out.push_str(&format!("    {}^\n", " ".repeat(caret)));
        }
        out.push_str(&format!("{}: {}\n", self.kind, self.message));
        out
    }
}

impl fmt::Display for SyntaxDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({}, line {})",
            self.kind, self.message, self.file, self.span.start_line
        )
    }
}

impl std::error::Error for SyntaxDiagnostic {}

/// Why a unit could not be turned into tokens or an AST.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseFailure {
    /// More lines could still complete the unit.
    #[error("incomplete input")]
    Incomplete,
    /// No continuation can make the unit valid.
    #[error(transparent)]
    Malformed(SyntaxDiagnostic),
}

impl ParseFailure {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }
}

/// Result alias used by the lexer and parser.
pub type ParseOutcome<T> = Result<T, ParseFailure>;
