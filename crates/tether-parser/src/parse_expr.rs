//! Expression parsing with full operator precedence.
//!
//! Precedence (lowest → highest):
//! 1. `lambda`, conditional `a if c else b`
//! 2. `or`
//! 3. `and`
//! 4. `not`
//! 5. comparisons `== != < <= > >= in not in is is not` (chained)
//! 6. `+`, `-`
//! 7. `*`, `/`, `//`, `%`
//! 8. unary `-`, `+`
//! 9. `**` (right-associative, binds tighter than a unary operand on its left)
//! 10. calls, subscripts, attributes

use tether_lexer::token::TokenKind;
use tether_types::ast::*;
use tether_types::{ParseOutcome, Span, SyntaxKind};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Points
    // ══════════════════════════════════════════════════════════════════════════

    /// `testlist = test { "," test } [","]`: a bare comma list is a tuple.
    pub(crate) fn parse_testlist(&mut self) -> ParseOutcome<Expr> {
        let first = self.parse_test()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if !self.starts_expression() {
                break;
            }
            items.push(self.parse_test()?);
        }
        let span = items[0].span.merge(self.previous_span());
        Ok(Expr::new(ExprKind::Tuple(items), span))
    }

    /// Parse one full expression, including `lambda` and conditionals.
    pub(crate) fn parse_test(&mut self) -> ParseOutcome<Expr> {
        self.descend()?;
        let result = self.parse_test_inner();
        self.ascend();
        result
    }

    fn parse_test_inner(&mut self) -> ParseOutcome<Expr> {
        if self.check(&TokenKind::Lambda) {
            return self.parse_lambda();
        }
        let body = self.parse_or()?;
        if !self.eat(&TokenKind::If) {
            return Ok(body);
        }
        let test = self.parse_or()?;
        self.expect(&TokenKind::Else)?;
        let orelse = self.parse_test()?;
        let span = body.span.merge(orelse.span);
        Ok(Expr::new(
            ExprKind::IfElse {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            span,
        ))
    }

    /// Whether the current token can begin an expression.
    pub(crate) fn starts_expression(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::Name(_)
                | TokenKind::None
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Not
                | TokenKind::Lambda
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
        )
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Precedence Chain
    // ══════════════════════════════════════════════════════════════════════════

    /// `lambda params: test`
    fn parse_lambda(&mut self) -> ParseOutcome<Expr> {
        let start = self.advance().span;
        let params = self.parse_params(&TokenKind::Colon)?;
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_test()?;
        let span = start.merge(body.span);
        Ok(Expr::new(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            span,
        ))
    }

    fn parse_or(&mut self) -> ParseOutcome<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = binary(left, BinOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseOutcome<Expr> {
        let mut left = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_not()?;
            left = binary(left, BinOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseOutcome<Expr> {
        if !self.check(&TokenKind::Not) {
            return self.parse_comparison();
        }
        let start = self.advance().span;
        self.descend()?;
        let operand = self.parse_not();
        self.ascend();
        let operand = operand?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `comparison = arith { CmpOp arith }`: chains like `a < b < c`.
    fn parse_comparison(&mut self) -> ParseOutcome<Expr> {
        let left = self.parse_arith()?;
        let mut links = Vec::new();
        while let Some(op) = self.eat_comparison_op() {
            links.push((op, self.parse_arith()?));
        }
        if links.is_empty() {
            return Ok(left);
        }
        let span = left.span.merge(self.previous_span());
        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                links,
            },
            span,
        ))
    }

    fn eat_comparison_op(&mut self) -> Option<CmpOp> {
        let op = match (self.peek_kind(), self.look_ahead(1)) {
            (TokenKind::EqEq, _) => CmpOp::Eq,
            (TokenKind::NotEq, _) => CmpOp::NotEq,
            (TokenKind::Less, _) => CmpOp::Less,
            (TokenKind::LessEq, _) => CmpOp::LessEq,
            (TokenKind::Greater, _) => CmpOp::Greater,
            (TokenKind::GreaterEq, _) => CmpOp::GreaterEq,
            (TokenKind::In, _) => CmpOp::In,
            (TokenKind::Not, TokenKind::In) => {
                self.advance();
                CmpOp::NotIn
            }
            (TokenKind::Is, TokenKind::Not) => {
                self.advance();
                CmpOp::IsNot
            }
            (TokenKind::Is, _) => CmpOp::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    pub(crate) fn parse_arith(&mut self) -> ParseOutcome<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> ParseOutcome<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::SlashSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    /// `factor = ("-" | "+") factor | power`
    fn parse_factor(&mut self) -> ParseOutcome<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        let start = self.advance().span;
        self.descend()?;
        let operand = self.parse_factor();
        self.ascend();
        let operand = operand?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `power = postfix [ "**" factor ]`
    fn parse_power(&mut self) -> ParseOutcome<Expr> {
        let base = self.parse_postfix()?;
        if !self.eat(&TokenKind::StarStar) {
            return Ok(base);
        }
        self.descend()?;
        let exponent = self.parse_factor();
        self.ascend();
        Ok(binary(base, BinOp::Pow, exponent?))
    }

    /// `postfix = atom { "(" args ")" | "[" subscript "]" | "." NAME }`
    fn parse_postfix(&mut self) -> ParseOutcome<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect(&TokenKind::RParen)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_subscript()?;
                    self.expect(&TokenKind::RBracket)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Subscript {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_name()?;
                    let span = expr.span.merge(name.span);
                    expr = Expr::new(
                        ExprKind::Attribute {
                            object: Box::new(expr),
                            name,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primary Expressions
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_atom(&mut self) -> ParseOutcome<Expr> {
        let start = self.current_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::Int(n) => ExprKind::IntLit(n),
            TokenKind::Float(x) => ExprKind::FloatLit(x),
            TokenKind::Str(_) => return Ok(self.parse_strings()),
            TokenKind::Name(name) => ExprKind::Name(name),
            TokenKind::None => ExprKind::NoneLit,
            TokenKind::True => ExprKind::BoolLit(true),
            TokenKind::False => ExprKind::BoolLit(false),
            TokenKind::LParen => return self.parse_paren(),
            TokenKind::LBracket => return self.parse_list(),
            TokenKind::LBrace => return self.parse_dict(),
            TokenKind::Indent => {
                return Err(self.error_at_current(SyntaxKind::IndentationError, "unexpected indent"))
            }
            _ => return Err(self.invalid_syntax()),
        };
        self.advance();
        Ok(Expr::new(kind, start))
    }

    /// Adjacent string literals concatenate: `'a' "b"` is `'ab'`.
    fn parse_strings(&mut self) -> Expr {
        let start = self.current_span();
        let mut text = String::new();
        while let TokenKind::Str(part) = self.peek_kind() {
            text.push_str(part);
            self.advance();
        }
        Expr::new(ExprKind::StrLit(text), start.merge(self.previous_span()))
    }

    /// `()` is the empty tuple, `(x)` is grouping, `(x,)` is a tuple.
    fn parse_paren(&mut self) -> ParseOutcome<Expr> {
        let start = self.advance().span;
        if self.eat(&TokenKind::RParen) {
            return Ok(Expr::new(
                ExprKind::Tuple(Vec::new()),
                start.merge(self.previous_span()),
            ));
        }
        let first = self.parse_test()?;
        if self.eat(&TokenKind::RParen) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RParen) {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::new(
            ExprKind::Tuple(items),
            start.merge(self.previous_span()),
        ))
    }

    fn parse_list(&mut self) -> ParseOutcome<Expr> {
        let start = self.advance().span;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            items.push(self.parse_test()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::new(
            ExprKind::List(items),
            start.merge(self.previous_span()),
        ))
    }

    fn parse_dict(&mut self) -> ParseOutcome<Expr> {
        let start = self.advance().span;
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key = self.parse_test()?;
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_test()?;
            entries.push((key, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::new(
            ExprKind::Dict(entries),
            start.merge(self.previous_span()),
        ))
    }

    /// `subscript = test | [test] ":" [test] [":" [test]]`
    fn parse_subscript(&mut self) -> ParseOutcome<Expr> {
        let start = self.current_span();
        let lower = if self.check(&TokenKind::Colon) {
            None
        } else {
            let index = self.parse_test()?;
            if !self.check(&TokenKind::Colon) {
                return Ok(index);
            }
            Some(Box::new(index))
        };
        self.expect(&TokenKind::Colon)?;
        let upper = self.parse_optional_slice_part()?;
        let step = if self.eat(&TokenKind::Colon) {
            self.parse_optional_slice_part()?
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::Slice { lower, upper, step },
            start.merge(self.previous_span()),
        ))
    }

    fn parse_optional_slice_part(&mut self) -> ParseOutcome<Option<Box<Expr>>> {
        if self.starts_expression() {
            Ok(Some(Box::new(self.parse_test()?)))
        } else {
            Ok(None)
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Arguments & Parameters
    // ══════════════════════════════════════════════════════════════════════════

    /// Call arguments up to (not including) the closing `)`.
    fn parse_args(&mut self) -> ParseOutcome<Vec<Arg>> {
        let mut args = Vec::new();
        let mut seen_keyword = false;
        while !self.check(&TokenKind::RParen) {
            let is_keyword = matches!(self.peek_kind(), TokenKind::Name(_))
                && matches!(self.look_ahead(1), TokenKind::Eq);
            if is_keyword {
                let name = self.expect_name()?;
                self.advance();
                let value = self.parse_test()?;
                if args.iter().any(|a| matches!(a, Arg::Keyword(k, _) if k.name == name.name)) {
                    return Err(self.error_at(
                        SyntaxKind::SyntaxError,
                        format!("keyword argument repeated: {}", name.name),
                        name.span,
                    ));
                }
                seen_keyword = true;
                args.push(Arg::Keyword(name, value));
            } else {
                let value = self.parse_test()?;
                if seen_keyword {
                    return Err(self.error_at(
                        SyntaxKind::SyntaxError,
                        "positional argument follows keyword argument",
                        value.span,
                    ));
                }
                args.push(Arg::Positional(value));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    /// Parameters up to (not including) `closer`: `a, b=1`.
    pub(crate) fn parse_params(&mut self, closer: &TokenKind) -> ParseOutcome<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        while !self.check(closer) {
            let name = self.expect_name()?;
            if params.iter().any(|p| p.name.name == name.name) {
                return Err(self.error_at(
                    SyntaxKind::SyntaxError,
                    format!("duplicate argument '{}' in function definition", name.name),
                    name.span,
                ));
            }
            let default = if self.eat(&TokenKind::Eq) {
                Some(self.parse_test()?)
            } else {
                None
            };
            if default.is_none() && params.iter().any(|p| p.default.is_some()) {
                return Err(self.error_at(
                    SyntaxKind::SyntaxError,
                    "non-default argument follows default argument",
                    name.span,
                ));
            }
            params.push(Param { name, default });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    let span: Span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}
