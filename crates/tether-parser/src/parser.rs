//! Core parser infrastructure: token cursor, failure reporting, entry points.

use tether_lexer::token::{Token, TokenKind};
use tether_types::ast::{Expr, Ident, Stmt};
use tether_types::{
    ParseFailure, ParseOutcome, SourceFile, Span, SyntaxDiagnostic, SyntaxKind, MAX_NESTING,
};

/// The Tether parser.
///
/// Consumes a token stream produced by the lexer and builds an AST. Parsing
/// stops at the first failure; running out of tokens is reported as
/// [`ParseFailure::Incomplete`] while the unit may still grow.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source_file: &'src SourceFile,
    /// Running out of tokens means "read another line" rather than an error.
    open_ended: bool,
    /// Current expression nesting depth.
    pub(crate) depth: u32,
    /// Enclosing `while`/`for` bodies in the current function.
    pub(crate) loop_depth: u32,
    /// Enclosing `def` bodies.
    pub(crate) func_depth: u32,
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        Self {
            tokens,
            pos: 0,
            source_file,
            open_ended: !source_file.ends_with_blank_line(),
            depth: 0,
            loop_depth: 0,
            func_depth: 0,
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        static EOF: Token = Token {
            kind: TokenKind::Eof,
            span: Span {
                start_line: 1,
                start_col: 1,
                end_line: 1,
                end_col: 1,
            },
        };
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .unwrap_or(&EOF)
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or(Span::point(1, 1))
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, expected: &TokenKind) -> ParseOutcome<Token> {
        if self.check(expected) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(SyntaxKind::SyntaxError, format!("expected '{expected}'")))
        }
    }

    pub(crate) fn expect_name(&mut self) -> ParseOutcome<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Name(name) => {
                let span = self.advance().span;
                Ok(Ident::new(name, span))
            }
            _ => Err(self.invalid_syntax()),
        }
    }

    // ── Failure Reporting ────────────────────────────────────────────────────

    /// Report a failure at the current token.
    ///
    /// At the end of an open-ended unit the failure becomes
    /// [`ParseFailure::Incomplete`]: another line may still supply what is
    /// missing.
    pub(crate) fn error_at_current(
        &self,
        kind: SyntaxKind,
        message: impl Into<String>,
    ) -> ParseFailure {
        if self.at_end() && self.open_ended {
            return ParseFailure::Incomplete;
        }
        self.error_at(kind, message, self.current_span())
    }

    /// Report a malformed-input failure at a specific span.
    pub(crate) fn error_at(
        &self,
        kind: SyntaxKind,
        message: impl Into<String>,
        span: Span,
    ) -> ParseFailure {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        ParseFailure::Malformed(SyntaxDiagnostic::new(
            &self.source_file.name,
            kind,
            message,
            span,
            source_line,
        ))
    }

    pub(crate) fn invalid_syntax(&self) -> ParseFailure {
        self.error_at_current(SyntaxKind::SyntaxError, "invalid syntax")
    }

    /// Enter one level of expression nesting.
    pub(crate) fn descend(&mut self) -> ParseOutcome<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_at(
                SyntaxKind::SyntaxError,
                "too many nested parentheses",
                self.current_span(),
            ));
        }
        Ok(())
    }

    pub(crate) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ── Public API ────────────────────────────────────────────────────────────

    /// Parse the whole stream as a single expression (or bare tuple).
    pub fn parse_eval(mut self) -> ParseOutcome<Expr> {
        let expr = self.parse_testlist()?;
        while self.eat(&TokenKind::Newline) {}
        if !self.at_end() {
            return Err(self.error_at(
                SyntaxKind::SyntaxError,
                "invalid syntax",
                self.current_span(),
            ));
        }
        Ok(expr)
    }

    /// Parse the stream as one interactive statement unit.
    ///
    /// An empty unit yields no statements. A compound statement is only
    /// complete once the unit ends with a blank line.
    pub fn parse_interactive(mut self) -> ParseOutcome<Vec<Stmt>> {
        if self.at_end() {
            return Ok(Vec::new());
        }
        if self.check(&TokenKind::Indent) {
            return Err(self.error_at(
                SyntaxKind::IndentationError,
                "unexpected indent",
                self.current_span(),
            ));
        }

        let stmts = self.parse_statement()?;
        if !self.at_end() {
            return Err(self.error_at(
                SyntaxKind::SyntaxError,
                "multiple statements found while compiling a single statement",
                self.current_span(),
            ));
        }
        if self.open_ended && stmts.first().is_some_and(Stmt::is_compound) {
            return Err(ParseFailure::Incomplete);
        }
        Ok(stmts)
    }
}
