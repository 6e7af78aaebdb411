//! Token types for the Tether lexer.
//!
//! Defines [`TokenKind`] covering every lexeme of Tether script, including
//! the layout tokens (`Newline`, `Indent`, `Dedent`) that stand in for
//! braces, and [`Token`], which pairs a kind with a source [`Span`].

use std::fmt;
use tether_types::Span;

/// All reserved words. They cannot be used as names.
pub const ALL_KEYWORDS: &[&str] = &[
    // Literals
    "None", "True", "False",
    // Operators
    "and", "or", "not", "in", "is", "lambda",
    // Statements
    "if", "elif", "else", "while", "for", "def", "return", "pass", "break",
    "continue", "del", "global", "assert",
];

// ─────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────

/// A single token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

// ─────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals ──────────────────────────────────────────────
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),

    // ── Keywords ──────────────────────────────────────────────
    None,
    True,
    False,
    And,
    Or,
    Not,
    In,
    Is,
    Lambda,
    If,
    Elif,
    Else,
    While,
    For,
    Def,
    Return,
    Pass,
    Break,
    Continue,
    Del,
    Global,
    Assert,

    // ── Operators ─────────────────────────────────────────────
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    SlashSlashEq,
    PercentEq,

    // ── Punctuation ───────────────────────────────────────────
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Semicolon,

    // ── Layout ────────────────────────────────────────────────
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl TokenKind {
    /// Look up a reserved word.
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        Some(match s {
            "None" => Self::None,
            "True" => Self::True,
            "False" => Self::False,
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "in" => Self::In,
            "is" => Self::Is,
            "lambda" => Self::Lambda,
            "if" => Self::If,
            "elif" => Self::Elif,
            "else" => Self::Else,
            "while" => Self::While,
            "for" => Self::For,
            "def" => Self::Def,
            "return" => Self::Return,
            "pass" => Self::Pass,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "del" => Self::Del,
            "global" => Self::Global,
            "assert" => Self::Assert,
            _ => return None,
        })
    }

    pub fn is_keyword(&self) -> bool {
        ALL_KEYWORDS.contains(&self.to_string().as_str())
    }

    /// The augmented-assignment operators (`+=`, `-=`, ...).
    pub fn is_aug_assign(&self) -> bool {
        matches!(
            self,
            Self::PlusEq
                | Self::MinusEq
                | Self::StarEq
                | Self::SlashEq
                | Self::SlashSlashEq
                | Self::PercentEq
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Int(n) => return write!(f, "{n}"),
            Self::Float(x) => return write!(f, "{x}"),
            Self::Str(s) => return write!(f, "{s:?}"),
            Self::Name(name) => return write!(f, "{name}"),
            Self::None => "None",
            Self::True => "True",
            Self::False => "False",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::In => "in",
            Self::Is => "is",
            Self::Lambda => "lambda",
            Self::If => "if",
            Self::Elif => "elif",
            Self::Else => "else",
            Self::While => "while",
            Self::For => "for",
            Self::Def => "def",
            Self::Return => "return",
            Self::Pass => "pass",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Del => "del",
            Self::Global => "global",
            Self::Assert => "assert",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::StarStar => "**",
            Self::Slash => "/",
            Self::SlashSlash => "//",
            Self::Percent => "%",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::Eq => "=",
            Self::PlusEq => "+=",
            Self::MinusEq => "-=",
            Self::StarEq => "*=",
            Self::SlashEq => "/=",
            Self::SlashSlashEq => "//=",
            Self::PercentEq => "%=",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::Semicolon => ";",
            Self::Newline => "newline",
            Self::Indent => "indent",
            Self::Dedent => "dedent",
            Self::Eof => "end of input",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_roundtrip_keywords() {
        for &kw in ALL_KEYWORDS {
            let kind = TokenKind::from_keyword(kw).unwrap();
            assert_eq!(kind.to_string(), kw);
            assert!(kind.is_keyword());
        }
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(TokenKind::from_keyword("None"), Some(TokenKind::None));
        assert!(TokenKind::from_keyword("none").is_none());
        assert!(TokenKind::from_keyword("IF").is_none());
    }

    #[test]
    fn test_names_are_not_keywords() {
        assert!(!TokenKind::Name("print".into()).is_keyword());
        assert!(!TokenKind::Plus.is_keyword());
    }

    #[test]
    fn test_aug_assign_operators() {
        assert!(TokenKind::SlashSlashEq.is_aug_assign());
        assert!(!TokenKind::EqEq.is_aug_assign());
    }
}
