//! Core Tether lexer: converts one logical unit into a token stream.
//!
//! Features:
//! - Indentation turned into `Indent` / `Dedent` tokens at line starts
//! - Newlines inside brackets and after `\` continuations are ignored
//! - Blank and comment-only lines produce no tokens
//! - Stops at the first problem and reports whether more input could fix it

use tether_types::{
    ParseFailure, ParseOutcome, SourceFile, Span, SyntaxDiagnostic, SyntaxKind, MAX_NESTING,
};

use crate::token::{Token, TokenKind};

/// Tab stops used when measuring indentation.
const TAB_WIDTH: usize = 8;

/// Result of lexing: the full token stream (always ending with
/// [`TokenKind::Eof`]) or the reason no stream could be produced.
pub type LexResult = ParseOutcome<Vec<Token>>;

/// The Tether lexer.
pub struct Lexer<'src> {
    /// The unit as characters, so columns count characters.
    chars: Vec<char>,
    source_file: &'src SourceFile,
    pos: usize,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
    /// Open indentation levels; the bottom entry is always 0.
    indents: Vec<usize>,
    /// Currently open brackets, innermost last.
    brackets: Vec<char>,
    at_line_start: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            chars: source_file.source.chars().collect(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            tokens: Vec::new(),
            indents: vec![0],
            brackets: Vec::new(),
            at_line_start: true,
        }
    }

    /// Lex the entire unit.
    pub fn lex(mut self) -> LexResult {
        loop {
            if self.at_line_start && self.brackets.is_empty() && !self.scan_indentation()? {
                continue;
            }
            self.skip_whitespace();

            let start_line = self.line;
            let start_col = self.col;
            let Some(ch) = self.peek() else {
                return self.finish();
            };

            match ch {
                '#' => self.skip_comment(),
                '\\' => self.scan_continuation()?,
                '\n' => {
                    self.advance();
                    if self.brackets.is_empty() {
                        self.push(TokenKind::Newline, start_line, start_col);
                        self.at_line_start = true;
                    }
                }
                '0'..='9' => self.scan_number(start_line, start_col)?,
                '.' if matches!(self.peek_at(1), Some('0'..='9')) => {
                    self.scan_number(start_line, start_col)?
                }
                '"' | '\'' => self.scan_string(start_line, start_col)?,
                c if c == '_' || c.is_alphabetic() => self.scan_name(start_line, start_col),
                _ => self.scan_operator(start_line, start_col)?,
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn push(&mut self, kind: TokenKind, start_line: u32, start_col: u32) {
        let span = self.span_from(start_line, start_col);
        self.tokens.push(Token::new(kind, span));
    }

    fn malformed(&self, kind: SyntaxKind, message: impl Into<String>, span: Span) -> ParseFailure {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        ParseFailure::Malformed(SyntaxDiagnostic::new(
            &self.source_file.name,
            kind,
            message,
            span,
            source_line,
        ))
    }

    fn syntax_error(&self, message: impl Into<String>, span: Span) -> ParseFailure {
        self.malformed(SyntaxKind::SyntaxError, message, span)
    }

    // ─────────────────────────────────────────────────────────────
    // Layout
    // ─────────────────────────────────────────────────────────────

    /// Measure the indentation of a new line and emit `Indent`/`Dedent`.
    ///
    /// Returns `false` when the line was blank or comment-only and has been
    /// consumed entirely.
    fn scan_indentation(&mut self) -> ParseOutcome<bool> {
        let mut width = 0usize;
        while let Some(ch) = self.peek() {
            match ch {
                ' ' => width += 1,
                '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                '\x0c' => width = 0,
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            None => return Ok(true),
            Some('#') => {
                self.skip_comment();
                self.eat('\n');
                return Ok(false);
            }
            Some('\r') if self.peek_at(1) == Some('\n') => {
                self.advance();
                self.advance();
                return Ok(false);
            }
            Some('\n') => {
                self.advance();
                return Ok(false);
            }
            Some(_) => {}
        }

        self.at_line_start = false;
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            if self.indents.len() as u32 > MAX_NESTING {
                let span = Span::point(self.line, self.col);
                return Err(self.malformed(
                    SyntaxKind::IndentationError,
                    "too many levels of indentation",
                    span,
                ));
            }
            self.indents.push(width);
            self.tokens
                .push(Token::new(TokenKind::Indent, Span::point(self.line, 1)));
        } else if width < current {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                self.tokens
                    .push(Token::new(TokenKind::Dedent, Span::point(self.line, 1)));
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                let span = Span::point(self.line, self.col);
                return Err(self.malformed(
                    SyntaxKind::IndentationError,
                    "unindent does not match any outer indentation level",
                    span,
                ));
            }
        }
        Ok(true)
    }

    fn finish(mut self) -> LexResult {
        if !self.brackets.is_empty() {
            return Err(ParseFailure::Incomplete);
        }
        let eof = Span::point(self.line, self.col);
        let needs_newline = self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Dedent));
        if needs_newline {
            self.tokens.push(Token::new(TokenKind::Newline, eof));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.tokens.push(Token::new(TokenKind::Dedent, eof));
        }
        self.tokens.push(Token::new(TokenKind::Eof, eof));
        Ok(self.tokens)
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace, comments & continuations
    // ─────────────────────────────────────────────────────────────

    /// Skip spaces, tabs and carriage returns (NOT newlines).
    fn skip_whitespace(&mut self) {
        while let Some(' ' | '\t' | '\r' | '\x0c') = self.peek() {
            self.advance();
        }
    }

    /// Skip a `#` comment up to (not including) the newline.
    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// `\` joins the next physical line onto this one.
    fn scan_continuation(&mut self) -> ParseOutcome<()> {
        let start = Span::point(self.line, self.col);
        self.advance();
        if self.peek() == Some('\r') {
            self.advance();
        }
        match self.peek() {
            None => Err(ParseFailure::Incomplete),
            Some('\n') => {
                self.advance();
                if self.peek().is_none() {
                    return Err(ParseFailure::Incomplete);
                }
                Ok(())
            }
            Some(_) => Err(self.syntax_error(
                "unexpected character after line continuation character",
                start,
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Numbers
    // ─────────────────────────────────────────────────────────────

    fn scan_digits(&mut self, text: &mut String) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
            } else if ch != '_' || !matches!(self.peek_at(1), Some('0'..='9')) {
                break;
            }
            self.advance();
        }
    }

    fn scan_number(&mut self, start_line: u32, start_col: u32) -> ParseOutcome<()> {
        let mut text = String::new();
        let mut is_float = false;

        self.scan_digits(&mut text);
        if text.is_empty() {
            text.push('0');
        }
        if self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.advance();
            self.scan_digits(&mut text);
            if text.ends_with('.') {
                text.push('0');
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = self.peek_at(1);
            let digit_at = if matches!(sign, Some('+' | '-')) { 2 } else { 1 };
            if matches!(self.peek_at(digit_at), Some('0'..='9')) {
                is_float = true;
                text.push('e');
                self.advance();
                if digit_at == 2 {
                    text.extend(self.advance());
                }
                self.scan_digits(&mut text);
            }
        }

        let span = self.span_from(start_line, start_col);
        if self.peek().is_some_and(|c| c == '_' || c.is_alphanumeric()) {
            return Err(self.syntax_error("invalid decimal literal", span));
        }

        let kind = if is_float {
            match text.parse::<f64>() {
                Ok(value) => TokenKind::Float(value),
                Err(_) => return Err(self.syntax_error("invalid float literal", span)),
            }
        } else if text.len() > 1 && text.starts_with('0') && text.bytes().any(|b| b != b'0') {
            return Err(self.syntax_error(
                "leading zeros in decimal integer literals are not permitted",
                span,
            ));
        } else {
            match text.parse::<i64>() {
                Ok(value) => TokenKind::Int(value),
                Err(_) => return Err(self.syntax_error("integer literal too large", span)),
            }
        };
        self.tokens.push(Token::new(kind, span));
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Names & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_name(&mut self, start_line: u32, start_col: u32) {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == '_' || ch.is_alphanumeric() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let kind = TokenKind::from_keyword(&text).unwrap_or(TokenKind::Name(text));
        self.push(kind, start_line, start_col);
    }

    // ─────────────────────────────────────────────────────────────
    // String literals
    // ─────────────────────────────────────────────────────────────

    fn scan_string(&mut self, start_line: u32, start_col: u32) -> ParseOutcome<()> {
        let quote = self.advance().unwrap_or('"');
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let mut buf = String::new();
        loop {
            match self.peek() {
                None if triple => return Err(ParseFailure::Incomplete),
                None => return Err(self.unterminated_string(start_line, start_col)),
                Some('\n') if !triple => {
                    return Err(self.unterminated_string(start_line, start_col));
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        self.advance();
                        self.advance();
                        break;
                    }
                    buf.push(quote);
                }
                Some('\\') => {
                    self.advance();
                    self.scan_escape(&mut buf)?;
                }
                Some(ch) => {
                    self.advance();
                    buf.push(ch);
                }
            }
        }

        self.push(TokenKind::Str(buf), start_line, start_col);
        Ok(())
    }

    fn unterminated_string(&self, start_line: u32, start_col: u32) -> ParseFailure {
        let span = self.span_from(start_line, start_col);
        self.syntax_error(
            format!("unterminated string literal (detected at line {start_line})"),
            span,
        )
    }

    /// Decode the escape after a consumed `\`.
    fn scan_escape(&mut self, buf: &mut String) -> ParseOutcome<()> {
        let start = Span::point(self.line, self.col.saturating_sub(1).max(1));
        let Some(ch) = self.advance() else {
            return Err(ParseFailure::Incomplete);
        };
        match ch {
            '\n' => {}
            'n' => buf.push('\n'),
            't' => buf.push('\t'),
            'r' => buf.push('\r'),
            '0' => buf.push('\0'),
            '\\' => buf.push('\\'),
            '\'' => buf.push('\''),
            '"' => buf.push('"'),
            'x' | 'u' => {
                let len = if ch == 'x' { 2 } else { 4 };
                let mut hex = String::with_capacity(len);
                for _ in 0..len {
                    match self.peek() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            hex.push(h);
                            self.advance();
                        }
                        _ => break,
                    }
                }
                let decoded = (hex.len() == len)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => buf.push(c),
                    None => {
                        return Err(self.syntax_error(
                            format!("truncated \\{ch} escape"),
                            start,
                        ))
                    }
                }
            }
            other => {
                buf.push('\\');
                buf.push(other);
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Operators & punctuation
    // ─────────────────────────────────────────────────────────────

    fn scan_operator(&mut self, start_line: u32, start_col: u32) -> ParseOutcome<()> {
        let ch = self.advance().unwrap_or('\0');
        let kind = match ch {
            '+' if self.eat('=') => TokenKind::PlusEq,
            '+' => TokenKind::Plus,
            '-' if self.eat('=') => TokenKind::MinusEq,
            '-' => TokenKind::Minus,
            '*' if self.eat('*') => TokenKind::StarStar,
            '*' if self.eat('=') => TokenKind::StarEq,
            '*' => TokenKind::Star,
            '/' if self.eat('/') => {
                if self.eat('=') {
                    TokenKind::SlashSlashEq
                } else {
                    TokenKind::SlashSlash
                }
            }
            '/' if self.eat('=') => TokenKind::SlashEq,
            '/' => TokenKind::Slash,
            '%' if self.eat('=') => TokenKind::PercentEq,
            '%' => TokenKind::Percent,
            '=' if self.eat('=') => TokenKind::EqEq,
            '=' => TokenKind::Eq,
            '!' if self.eat('=') => TokenKind::NotEq,
            '<' if self.eat('=') => TokenKind::LessEq,
            '<' => TokenKind::Less,
            '>' if self.eat('=') => TokenKind::GreaterEq,
            '>' => TokenKind::Greater,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            '(' | '[' | '{' => {
                let span = self.span_from(start_line, start_col);
                if self.brackets.len() as u32 >= MAX_NESTING {
                    return Err(self.syntax_error("too many nested parentheses", span));
                }
                self.brackets.push(ch);
                match ch {
                    '(' => TokenKind::LParen,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                }
            }
            ')' | ']' | '}' => {
                let span = self.span_from(start_line, start_col);
                let open = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match self.brackets.pop() {
                    None => return Err(self.syntax_error(format!("unmatched '{ch}'"), span)),
                    Some(opened) if opened != open => {
                        return Err(self.syntax_error(
                            format!(
                                "closing parenthesis '{ch}' does not match opening parenthesis '{opened}'"
                            ),
                            span,
                        ))
                    }
                    Some(_) => {}
                }
                match ch {
                    ')' => TokenKind::RParen,
                    ']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                }
            }
            '!' => {
                let span = self.span_from(start_line, start_col);
                return Err(self.syntax_error("invalid syntax", span));
            }
            other => {
                let span = self.span_from(start_line, start_col);
                return Err(self.syntax_error(
                    format!("invalid character '{other}' (U+{:04X})", other as u32),
                    span,
                ));
            }
        };
        self.push(kind, start_line, start_col);
        Ok(())
    }
}
