//! Statement parsing: simple statement lines and compound statements.

use tether_lexer::token::TokenKind;
use tether_types::ast::*;
use tether_types::{ParseOutcome, SyntaxKind};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// Parse one logical line: either a compound statement with its block,
    /// or a `;`-separated run of simple statements.
    pub(crate) fn parse_statement(&mut self) -> ParseOutcome<Vec<Stmt>> {
        let stmt = match self.peek_kind() {
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Def => self.parse_def()?,
            TokenKind::Elif | TokenKind::Else => return Err(self.invalid_syntax()),
            _ => return self.parse_simple_line(),
        };
        Ok(vec![stmt])
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Compound Statements
    // ══════════════════════════════════════════════════════════════════════════

    /// `if test: suite { elif test: suite } [else: suite]`
    fn parse_if(&mut self) -> ParseOutcome<Stmt> {
        let start = self.advance().span;
        let test = self.parse_test()?;
        let body = self.parse_suite()?;
        let orelse = if self.check(&TokenKind::Elif) {
            vec![self.parse_if()?]
        } else if self.eat(&TokenKind::Else) {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::If(IfStmt { test, body, orelse }), span))
    }

    fn parse_while(&mut self) -> ParseOutcome<Stmt> {
        let start = self.advance().span;
        let test = self.parse_test()?;
        let body = self.parse_loop_suite()?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::While(WhileStmt { test, body }), span))
    }

    /// `for target_list in testlist: suite`
    fn parse_for(&mut self) -> ParseOutcome<Stmt> {
        let start = self.advance().span;
        let target = self.parse_target_list()?;
        self.expect(&TokenKind::In)?;
        let iter = self.parse_testlist()?;
        let body = self.parse_loop_suite()?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::For(ForStmt { target, iter, body }), span))
    }

    /// `def NAME(params): suite`
    fn parse_def(&mut self) -> ParseOutcome<Stmt> {
        let start = self.advance().span;
        let name = self.expect_name()?;
        self.expect(&TokenKind::LParen)?;
        let params = self.parse_params(&TokenKind::RParen)?;
        self.expect(&TokenKind::RParen)?;

        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.func_depth += 1;
        let body = self.parse_suite();
        self.func_depth -= 1;
        self.loop_depth = saved_loops;

        let body = body?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Def(FuncDef { name, params, body }), span))
    }

    fn parse_loop_suite(&mut self) -> ParseOutcome<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_suite();
        self.loop_depth -= 1;
        body
    }

    /// `suite = ":" simple_line | ":" NEWLINE INDENT stmt+ DEDENT`
    fn parse_suite(&mut self) -> ParseOutcome<Vec<Stmt>> {
        self.expect(&TokenKind::Colon)?;
        if !self.eat(&TokenKind::Newline) {
            return self.parse_simple_line();
        }
        if !self.check(&TokenKind::Indent) {
            return Err(
                self.error_at_current(SyntaxKind::IndentationError, "expected an indented block")
            );
        }
        self.advance();
        self.descend()?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.at_end() {
            if self.check(&TokenKind::Indent) {
                let span = self.current_span();
                self.ascend();
                return Err(self.error_at(SyntaxKind::IndentationError, "unexpected indent", span));
            }
            match self.parse_statement() {
                Ok(stmts) => body.extend(stmts),
                Err(failure) => {
                    self.ascend();
                    return Err(failure);
                }
            }
        }
        self.eat(&TokenKind::Dedent);
        self.ascend();
        Ok(body)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Simple Statements
    // ══════════════════════════════════════════════════════════════════════════

    /// `simple_stmt { ";" simple_stmt } [";"] NEWLINE`
    fn parse_simple_line(&mut self) -> ParseOutcome<Vec<Stmt>> {
        let mut stmts = vec![self.parse_simple()?];
        while self.eat(&TokenKind::Semicolon) {
            if self.check(&TokenKind::Newline) || self.at_end() {
                break;
            }
            stmts.push(self.parse_simple()?);
        }
        if !self.eat(&TokenKind::Newline) && !self.at_end() {
            return Err(self.invalid_syntax());
        }
        Ok(stmts)
    }

    fn parse_simple(&mut self) -> ParseOutcome<Stmt> {
        let start = self.current_span();
        let kind = match self.peek_kind() {
            TokenKind::Pass => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Break => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(self.error_at(SyntaxKind::SyntaxError, "'break' outside loop", start));
                }
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(self.error_at(
                        SyntaxKind::SyntaxError,
                        "'continue' not properly in loop",
                        start,
                    ));
                }
                StmtKind::Continue
            }
            TokenKind::Return => {
                self.advance();
                if self.func_depth == 0 {
                    return Err(self.error_at(
                        SyntaxKind::SyntaxError,
                        "'return' outside function",
                        start,
                    ));
                }
                let value = if self.starts_expression() {
                    Some(self.parse_testlist()?)
                } else {
                    None
                };
                StmtKind::Return(value)
            }
            TokenKind::Del => {
                self.advance();
                let list = self.parse_testlist()?;
                let targets = match list.kind {
                    ExprKind::Tuple(items) => items
                        .into_iter()
                        .map(|e| self.to_target(e, "delete"))
                        .collect::<ParseOutcome<Vec<_>>>()?,
                    _ => vec![self.to_target(list, "delete")?],
                };
                StmtKind::Del(targets)
            }
            TokenKind::Global => {
                self.advance();
                let mut names = vec![self.expect_name()?];
                while self.eat(&TokenKind::Comma) {
                    names.push(self.expect_name()?);
                }
                StmtKind::Global(names)
            }
            TokenKind::Assert => {
                self.advance();
                let test = self.parse_test()?;
                let message = if self.eat(&TokenKind::Comma) {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                StmtKind::Assert { test, message }
            }
            _ => self.parse_expr_stmt()?,
        };
        Ok(Stmt::new(kind, start.merge(self.previous_span())))
    }

    /// Expression statement, assignment chain, or augmented assignment.
    fn parse_expr_stmt(&mut self) -> ParseOutcome<StmtKind> {
        let first = self.parse_testlist()?;

        if let Some(op) = aug_assign_op(self.peek_kind()) {
            self.advance();
            if matches!(first.kind, ExprKind::Tuple(_) | ExprKind::List(_)) {
                return Err(self.error_at(
                    SyntaxKind::SyntaxError,
                    format!(
                        "'{}' is an illegal expression for augmented assignment",
                        describe(&first)
                    ),
                    first.span,
                ));
            }
            let target = self.to_target(first, "assign to")?;
            let value = self.parse_testlist()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }

        if !self.check(&TokenKind::Eq) {
            return Ok(StmtKind::Expr(first));
        }

        let mut chain = vec![first];
        while self.eat(&TokenKind::Eq) {
            chain.push(self.parse_testlist()?);
        }
        let value = chain.pop().ok_or_else(|| self.invalid_syntax())?;
        let targets = chain
            .into_iter()
            .map(|e| self.to_target(e, "assign to"))
            .collect::<ParseOutcome<Vec<_>>>()?;
        Ok(StmtKind::Assign { targets, value })
    }

    /// `target_list = target { "," target } [","]`, parsed below comparison
    /// level so that `in` is left for the `for` header.
    fn parse_target_list(&mut self) -> ParseOutcome<Target> {
        let start = self.current_span();
        let first = self.parse_arith()?;
        if !self.check(&TokenKind::Comma) {
            return self.to_target(first, "assign to");
        }
        let mut items = vec![self.to_target(first, "assign to")?];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::In) {
                break;
            }
            let item = self.parse_arith()?;
            items.push(self.to_target(item, "assign to")?);
        }
        Ok(Target::Tuple(items, start.merge(self.previous_span())))
    }

    /// Convert a parsed expression into something assignable.
    fn to_target(&self, expr: Expr, verb: &str) -> ParseOutcome<Target> {
        match expr.kind {
            ExprKind::Name(name) => Ok(Target::Name(Ident::new(name, expr.span))),
            ExprKind::Subscript { object, index } => Ok(Target::Subscript {
                object: *object,
                index: *index,
            }),
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                let targets = items
                    .into_iter()
                    .map(|e| self.to_target(e, verb))
                    .collect::<ParseOutcome<Vec<_>>>()?;
                Ok(Target::Tuple(targets, expr.span))
            }
            _ => {
                let what = describe(&expr);
                Err(self.error_at(
                    SyntaxKind::SyntaxError,
                    format!("cannot {verb} {what}"),
                    expr.span,
                ))
            }
        }
    }
}

fn aug_assign_op(kind: &TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::PlusEq => BinOp::Add,
        TokenKind::MinusEq => BinOp::Sub,
        TokenKind::StarEq => BinOp::Mul,
        TokenKind::SlashEq => BinOp::Div,
        TokenKind::SlashSlashEq => BinOp::FloorDiv,
        TokenKind::PercentEq => BinOp::Mod,
        _ => return None,
    })
}

/// Short description of an expression for "cannot assign to ..." messages.
fn describe(expr: &Expr) -> &'static str {
    match &expr.kind {
        ExprKind::NoneLit | ExprKind::BoolLit(_) => "constant",
        ExprKind::IntLit(_) | ExprKind::FloatLit(_) | ExprKind::StrLit(_) => "literal",
        ExprKind::Name(_) => "name",
        ExprKind::List(_) => "list",
        ExprKind::Tuple(_) => "tuple",
        ExprKind::Dict(_) => "dict literal",
        ExprKind::Call { .. } => "function call",
        ExprKind::Attribute { .. } => "attribute",
        ExprKind::Subscript { .. } => "subscript",
        ExprKind::Slice { .. } => "slice",
        ExprKind::Lambda { .. } => "lambda",
        ExprKind::IfElse { .. } => "conditional expression",
        ExprKind::Compare { .. } => "comparison",
        ExprKind::Unary { .. } | ExprKind::Binary { .. } => "expression",
    }
}
