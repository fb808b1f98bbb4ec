//! Token stream to [`crate::ast::Module`].
//!
//! Operator-precedence (Pratt) expression parsing, grounded on the shape of
//! `parse.rs` in the teacher crate (position-tracked nodes, one parser
//! struct walking a flat token buffer) but producing this crate's own AST
//! rather than delegating to `ruff_python_parser`.

use std::sync::Arc;

use crate::ast::*;
use crate::lexer::SyntaxError;
use crate::token::{Keyword, Position, Token, TokenKind};

type ParseResult<T> = Result<T, SyntaxError>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_module(source: &str) -> ParseResult<Module> {
        let tokens = crate::lexer::Lexer::new(source).tokenize()?;
        let mut parser = Self::new(tokens);
        parser.skip_newlines();
        let body = parser.parse_block_items(|p| matches!(p.peek_kind(), TokenKind::Eof))?;
        parser.expect(&TokenKind::Eof)?;
        Ok(Module { body })
    }

    // --- token stream helpers -------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_pos(&self) -> Position {
        self.peek().pos
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.at_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {kind:?}, found {:?}", self.peek_kind())))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> ParseResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected keyword {kw:?}")))
        }
    }

    fn error(&self, message: String) -> SyntaxError {
        SyntaxError { message, pos: self.peek_pos() }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        if let TokenKind::Ident(name) = self.peek_kind().clone() {
            self.advance();
            Ok(name)
        } else {
            Err(self.error("expected identifier".to_owned()))
        }
    }

    // --- statements -------------------------------------------------------

    fn parse_block_items(&mut self, is_end: impl Fn(&Self) -> bool) -> ParseResult<Block> {
        let mut out = Vec::new();
        self.skip_newlines();
        while !is_end(self) {
            out.push(self.parse_statement()?);
            self.skip_newlines();
        }
        Ok(out)
    }

    /// Parses a suite: either a single simple statement line, or an
    /// INDENT-delimited block.
    fn parse_suite(&mut self) -> ParseResult<Block> {
        self.expect(&TokenKind::Colon)?;
        if self.eat(&TokenKind::Newline) {
            self.skip_newlines();
            self.expect(&TokenKind::Indent)?;
            let body = self.parse_block_items(|p| p.check(&TokenKind::Dedent))?;
            self.expect(&TokenKind::Dedent)?;
            Ok(body)
        } else {
            let mut body = vec![self.parse_simple_statement()?];
            while self.eat(&TokenKind::Semicolon) {
                if self.check(&TokenKind::Newline) || self.check(&TokenKind::Eof) {
                    break;
                }
                body.push(self.parse_simple_statement()?);
            }
            self.eat(&TokenKind::Newline);
            Ok(body)
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let pos = self.peek_pos();
        if self.check(&TokenKind::At) {
            return self.parse_decorated(pos);
        }
        match self.peek_kind() {
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(pos, false),
            TokenKind::Keyword(Keyword::Try) => self.parse_try(),
            TokenKind::Keyword(Keyword::With) => self.parse_with(pos, false),
            TokenKind::Keyword(Keyword::Def) => self.parse_function_def(pos, Vec::new(), false),
            TokenKind::Keyword(Keyword::Class) => self.parse_class_def(pos, Vec::new()),
            TokenKind::Keyword(Keyword::Async) => self.parse_async_stmt(pos),
            _ => {
                let stmt = self.parse_simple_statement()?;
                self.eat(&TokenKind::Newline);
                Ok(stmt)
            }
        }
    }

    fn parse_decorated(&mut self, pos: Position) -> ParseResult<Stmt> {
        let mut decorators = Vec::new();
        while self.eat(&TokenKind::At) {
            decorators.push(self.parse_expr()?);
            self.expect(&TokenKind::Newline)?;
            self.skip_newlines();
        }
        if self.eat_keyword(Keyword::Async) {
            self.expect_keyword(Keyword::Def)?;
            return self.parse_function_def(pos, decorators, true);
        }
        if self.eat_keyword(Keyword::Def) {
            return self.parse_function_def(pos, decorators, false);
        }
        self.expect_keyword(Keyword::Class)?;
        self.parse_class_def(pos, decorators)
    }

    fn parse_async_stmt(&mut self, pos: Position) -> ParseResult<Stmt> {
        self.advance(); // `async`
        if self.at_keyword(Keyword::Def) {
            self.advance();
            return self.parse_function_def(pos, Vec::new(), true);
        }
        if self.at_keyword(Keyword::For) {
            return self.parse_for(pos, true);
        }
        if self.at_keyword(Keyword::With) {
            return self.parse_with(pos, true);
        }
        Err(self.error("expected 'def', 'for', or 'with' after 'async'".to_owned()))
    }

    fn parse_simple_statement(&mut self) -> ParseResult<Stmt> {
        let pos = self.peek_pos();
        match self.peek_kind().clone() {
            TokenKind::Keyword(Keyword::Pass) => {
                self.advance();
                Ok(Stmt::new(StmtKind::Pass, pos))
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                Ok(Stmt::new(StmtKind::Break, pos))
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                Ok(Stmt::new(StmtKind::Continue, pos))
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = if self.at_stmt_end() { None } else { Some(self.parse_expr_list_as_tuple()?) };
                Ok(Stmt::new(StmtKind::Return(value), pos))
            }
            TokenKind::Keyword(Keyword::Raise) => {
                self.advance();
                if self.at_stmt_end() {
                    return Ok(Stmt::new(StmtKind::Raise { exc: None, cause: None }, pos));
                }
                let exc = self.parse_expr()?;
                let cause = if self.eat_keyword(Keyword::From) { Some(self.parse_expr()?) } else { None };
                Ok(Stmt::new(StmtKind::Raise { exc: Some(exc), cause }, pos))
            }
            TokenKind::Keyword(Keyword::Global) => {
                self.advance();
                Ok(Stmt::new(StmtKind::Global(self.parse_name_list()?), pos))
            }
            TokenKind::Keyword(Keyword::Nonlocal) => {
                self.advance();
                Ok(Stmt::new(StmtKind::Nonlocal(self.parse_name_list()?), pos))
            }
            TokenKind::Keyword(Keyword::Assert) => {
                self.advance();
                let test = self.parse_expr()?;
                let msg = if self.eat(&TokenKind::Comma) { Some(self.parse_expr()?) } else { None };
                Ok(Stmt::new(StmtKind::Assert { test, msg }, pos))
            }
            TokenKind::Keyword(Keyword::Del) => {
                self.advance();
                let mut targets = vec![self.parse_expr()?];
                while self.eat(&TokenKind::Comma) {
                    if self.at_stmt_end() {
                        break;
                    }
                    targets.push(self.parse_expr()?);
                }
                Ok(Stmt::new(StmtKind::Del(targets), pos))
            }
            TokenKind::Keyword(Keyword::Import) => self.parse_import(pos),
            TokenKind::Keyword(Keyword::From) => self.parse_import_from(pos),
            TokenKind::Keyword(Keyword::Yield) => {
                let expr = self.parse_yield_expr()?;
                Ok(Stmt::new(StmtKind::YieldStmt(expr), pos))
            }
            _ => self.parse_expr_or_assign_statement(pos),
        }
    }

    fn at_stmt_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof | TokenKind::Dedent)
    }

    fn parse_name_list(&mut self) -> ParseResult<Vec<String>> {
        let mut names = vec![self.expect_ident()?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.expect_ident()?);
        }
        Ok(names)
    }

    fn parse_import(&mut self, pos: Position) -> ParseResult<Stmt> {
        self.advance();
        let module = self.parse_dotted_name()?;
        let alias = if self.eat_keyword(Keyword::As) { Some(self.expect_ident()?) } else { None };
        Ok(Stmt::new(StmtKind::Import { module, alias }, pos))
    }

    fn parse_import_from(&mut self, pos: Position) -> ParseResult<Stmt> {
        self.advance();
        let module = self.parse_dotted_name()?;
        self.expect_keyword(Keyword::Import)?;
        let mut names = Vec::new();
        let parenthesized = self.eat(&TokenKind::LParen);
        loop {
            let name = self.expect_ident()?;
            let alias = if self.eat_keyword(Keyword::As) { Some(self.expect_ident()?) } else { None };
            names.push((name, alias));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            if parenthesized && self.check(&TokenKind::RParen) {
                break;
            }
        }
        if parenthesized {
            self.expect(&TokenKind::RParen)?;
        }
        Ok(Stmt::new(StmtKind::ImportFrom { module, names }, pos))
    }

    fn parse_dotted_name(&mut self) -> ParseResult<String> {
        let mut name = self.expect_ident()?;
        while self.eat(&TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    fn parse_expr_or_assign_statement(&mut self, pos: Position) -> ParseResult<Stmt> {
        let first = self.parse_expr_list_as_tuple()?;

        if self.eat(&TokenKind::Colon) {
            let annotation = self.parse_expr()?;
            let value = if self.eat(&TokenKind::Assign) { Some(self.parse_expr_list_as_tuple()?) } else { None };
            return Ok(Stmt::new(StmtKind::AnnAssign { target: first, annotation, value }, pos));
        }

        if let Some(op) = self.peek_augmented_op() {
            self.advance();
            let value = self.parse_expr_list_as_tuple()?;
            return Ok(Stmt::new(StmtKind::AugAssign { target: first, op, value }, pos));
        }

        if self.check(&TokenKind::Assign) {
            let mut targets = vec![first];
            let mut value = {
                self.advance();
                self.parse_expr_list_as_tuple()?
            };
            while self.check(&TokenKind::Assign) {
                self.advance();
                targets.push(value);
                value = self.parse_expr_list_as_tuple()?;
            }
            return Ok(Stmt::new(StmtKind::Assign { targets, value }, pos));
        }

        Ok(Stmt::new(StmtKind::Expr(first), pos))
    }

    fn peek_augmented_op(&self) -> Option<BinOp> {
        Some(match self.peek_kind() {
            TokenKind::PlusEq => BinOp::Add,
            TokenKind::MinusEq => BinOp::Sub,
            TokenKind::StarEq => BinOp::Mult,
            TokenKind::SlashEq => BinOp::Div,
            TokenKind::DoubleSlashEq => BinOp::FloorDiv,
            TokenKind::PercentEq => BinOp::Mod,
            TokenKind::DoubleStarEq => BinOp::Pow,
            TokenKind::AmpEq => BinOp::BitAnd,
            TokenKind::PipeEq => BinOp::BitOr,
            TokenKind::CaretEq => BinOp::BitXor,
            TokenKind::LShiftEq => BinOp::LShift,
            TokenKind::RShiftEq => BinOp::RShift,
            TokenKind::AtEq => BinOp::MatMult,
            _ => return None,
        })
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let pos = self.peek_pos();
        self.advance();
        let test = self.parse_named_expr()?;
        let body = self.parse_suite()?;
        let orelse = if self.at_keyword(Keyword::Elif) {
            vec![self.parse_if_as_elif()?]
        } else if self.eat_keyword(Keyword::Else) {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::new(StmtKind::If { test, body, orelse }, pos))
    }

    fn parse_if_as_elif(&mut self) -> ParseResult<Stmt> {
        let pos = self.peek_pos();
        self.expect_keyword(Keyword::Elif)?;
        let test = self.parse_named_expr()?;
        let body = self.parse_suite()?;
        let orelse = if self.at_keyword(Keyword::Elif) {
            vec![self.parse_if_as_elif()?]
        } else if self.eat_keyword(Keyword::Else) {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::new(StmtKind::If { test, body, orelse }, pos))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let pos = self.peek_pos();
        self.advance();
        let test = self.parse_named_expr()?;
        let body = self.parse_suite()?;
        let orelse = if self.eat_keyword(Keyword::Else) { self.parse_suite()? } else { Vec::new() };
        Ok(Stmt::new(StmtKind::While { test, body, orelse }, pos))
    }

    fn parse_for(&mut self, pos: Position, is_async: bool) -> ParseResult<Stmt> {
        self.expect_keyword(Keyword::For)?;
        let target = self.parse_target_list()?;
        self.expect_keyword(Keyword::In)?;
        let iter = self.parse_expr_list_as_tuple()?;
        let body = self.parse_suite()?;
        let orelse = if self.eat_keyword(Keyword::Else) { self.parse_suite()? } else { Vec::new() };
        Ok(Stmt::new(StmtKind::For { target, iter, body, orelse, is_async }, pos))
    }

    /// A for-target is a comma-separated assignment-target list, which may
    /// itself be bare (no parens) and may contain a starred element.
    fn parse_target_list(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let first = self.parse_target()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.at_keyword(Keyword::In) {
                break;
            }
            items.push(self.parse_target()?);
        }
        Ok(Expr::new(ExprKind::Tuple(items), pos))
    }

    fn parse_target(&mut self) -> ParseResult<Expr> {
        if self.check(&TokenKind::Star) {
            let pos = self.peek_pos();
            self.advance();
            let inner = self.parse_target()?;
            return Ok(Expr::new(ExprKind::Starred(Box::new(inner)), pos));
        }
        self.parse_postfix_expr()
    }

    fn parse_try(&mut self) -> ParseResult<Stmt> {
        let pos = self.peek_pos();
        self.advance();
        let body = self.parse_suite()?;
        let mut handlers = Vec::new();
        while self.at_keyword(Keyword::Except) {
            let hpos = self.peek_pos();
            self.advance();
            self.eat(&TokenKind::Star); // except* groups: treated like except for matching purposes
            let (type_, name) = if self.check(&TokenKind::Colon) {
                (None, None)
            } else {
                let type_ = self.parse_expr()?;
                let name = if self.eat_keyword(Keyword::As) { Some(self.expect_ident()?) } else { None };
                (Some(type_), name)
            };
            let hbody = self.parse_suite()?;
            handlers.push(ExceptHandler { type_, name, body: hbody, pos: hpos });
        }
        let orelse = if self.eat_keyword(Keyword::Else) { self.parse_suite()? } else { Vec::new() };
        let finalbody = if self.eat_keyword(Keyword::Finally) { self.parse_suite()? } else { Vec::new() };
        Ok(Stmt::new(StmtKind::Try { body, handlers, orelse, finalbody }, pos))
    }

    fn parse_with(&mut self, pos: Position, is_async: bool) -> ParseResult<Stmt> {
        self.expect_keyword(Keyword::With)?;
        let parenthesized = self.eat(&TokenKind::LParen);
        let mut items = vec![self.parse_with_item()?];
        while self.eat(&TokenKind::Comma) {
            if parenthesized && self.check(&TokenKind::RParen) {
                break;
            }
            items.push(self.parse_with_item()?);
        }
        if parenthesized {
            self.expect(&TokenKind::RParen)?;
        }
        let body = self.parse_suite()?;
        Ok(Stmt::new(StmtKind::With { items, body, is_async }, pos))
    }

    fn parse_with_item(&mut self) -> ParseResult<WithItem> {
        let context_expr = self.parse_expr()?;
        let optional_vars = if self.eat_keyword(Keyword::As) { Some(self.parse_target()?) } else { None };
        Ok(WithItem { context_expr, optional_vars })
    }

    fn parse_function_def(&mut self, pos: Position, decorators: Vec<Expr>, is_async: bool) -> ParseResult<Stmt> {
        let name = self.expect_ident()?;
        if self.check(&TokenKind::LBracket) {
            // PEP 695 type params `def f[T](...)`: accepted and discarded.
            self.advance();
            while !self.check(&TokenKind::RBracket) {
                self.advance();
            }
            self.advance();
        }
        self.expect(&TokenKind::LParen)?;
        let params = self.parse_params(TokenKind::RParen)?;
        self.expect(&TokenKind::RParen)?;
        let returns = if self.eat(&TokenKind::Arrow) { Some(self.parse_expr()?) } else { None };
        let body = self.parse_suite()?;
        let is_generator = block_contains_yield(&body);
        Ok(Stmt::new(
            StmtKind::FunctionDef(Arc::new(FunctionDef {
                name,
                params,
                body,
                decorators,
                is_async,
                is_generator,
                returns,
                pos,
            })),
            pos,
        ))
    }

    fn parse_params(&mut self, end: TokenKind) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        let mut seen_star = false;
        let mut seen_slash = false;
        while !self.check(&end) {
            if self.check(&TokenKind::Slash) {
                self.advance();
                seen_slash = true;
                for p in &mut params {
                    if matches!(p.kind, ParamKind::PositionalOrKeyword) {
                        p.kind = ParamKind::PositionalOnly;
                    }
                }
                self.eat(&TokenKind::Comma);
                continue;
            }
            if self.check(&TokenKind::Star) && !matches!(self.peek_after(1), TokenKind::Star) {
                self.advance();
                seen_star = true;
                if let TokenKind::Ident(_) = self.peek_kind() {
                    let name = self.expect_ident()?;
                    let annotation = if self.eat(&TokenKind::Colon) { Some(self.parse_expr()?) } else { None };
                    params.push(Param { name, kind: ParamKind::VarArgs, default: None, annotation });
                }
                self.eat(&TokenKind::Comma);
                continue;
            }
            if self.check(&TokenKind::DoubleStar) {
                self.advance();
                let name = self.expect_ident()?;
                let annotation = if self.eat(&TokenKind::Colon) { Some(self.parse_expr()?) } else { None };
                params.push(Param { name, kind: ParamKind::VarKeyword, default: None, annotation });
                self.eat(&TokenKind::Comma);
                continue;
            }
            let name = self.expect_ident()?;
            let annotation = if self.eat(&TokenKind::Colon) { Some(self.parse_expr()?) } else { None };
            let default = if self.eat(&TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
            let kind = if seen_star { ParamKind::KeywordOnly } else { ParamKind::PositionalOrKeyword };
            params.push(Param { name, kind, default, annotation });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let _ = seen_slash;
        Ok(params)
    }

    fn peek_after(&self, offset: usize) -> TokenKind {
        self.tokens.get(self.pos + offset).map(|t| t.kind.clone()).unwrap_or(TokenKind::Eof)
    }

    fn parse_class_def(&mut self, pos: Position, decorators: Vec<Expr>) -> ParseResult<Stmt> {
        let name = self.expect_ident()?;
        if self.check(&TokenKind::LBracket) {
            self.advance();
            while !self.check(&TokenKind::RBracket) {
                self.advance();
            }
            self.advance();
        }
        let mut bases = Vec::new();
        let mut keywords = Vec::new();
        if self.eat(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) {
                if let TokenKind::Ident(kw_name) = self.peek_kind().clone() {
                    if matches!(self.peek_after(1), TokenKind::Assign) {
                        self.advance();
                        self.advance();
                        keywords.push((kw_name, self.parse_expr()?));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                        continue;
                    }
                }
                bases.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen)?;
        }
        let body = self.parse_suite()?;
        Ok(Stmt::new(
            StmtKind::ClassDef(Arc::new(ClassDef { name, bases, keywords, body, decorators, pos })),
            pos,
        ))
    }

    // --- expressions --------------------------------------------------------

    /// Top-level expression entry point: a full expression, possibly an
    /// unparenthesized tuple (`return a, b`), but not a bare assignment.
    fn parse_expr_list_as_tuple(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let first = self.parse_star_or_expr()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.at_stmt_end() || self.check(&TokenKind::Assign) || self.peek_augmented_op().is_some() {
                break;
            }
            items.push(self.parse_star_or_expr()?);
        }
        Ok(Expr::new(ExprKind::Tuple(items), pos))
    }

    fn parse_star_or_expr(&mut self) -> ParseResult<Expr> {
        if self.check(&TokenKind::Star) {
            let pos = self.peek_pos();
            self.advance();
            let inner = self.parse_or_expr_level()?;
            return Ok(Expr::new(ExprKind::Starred(Box::new(inner)), pos));
        }
        self.parse_expr()
    }

    /// A single expression (lambda-level, the widest non-tuple production).
    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        if self.at_keyword(Keyword::Lambda) {
            return self.parse_lambda();
        }
        self.parse_ternary()
    }

    /// Like `parse_expr` but also accepts a walrus (`x := expr`) at the top,
    /// used where Python only allows walrus directly (if/while tests, etc.).
    fn parse_named_expr(&mut self) -> ParseResult<Expr> {
        self.parse_expr()
    }

    fn parse_lambda(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        self.advance();
        let params = if self.check(&TokenKind::Colon) { Vec::new() } else { self.parse_params(TokenKind::Colon)? };
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_expr()?;
        Ok(Expr::new(ExprKind::Lambda { params, body: Box::new(body) }, pos))
    }

    fn parse_ternary(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let body = self.parse_or_expr_level()?;
        if self.eat_keyword(Keyword::If) {
            let test = self.parse_or_expr_level()?;
            self.expect_keyword(Keyword::Else)?;
            let orelse = self.parse_expr()?;
            return Ok(Expr::new(
                ExprKind::IfExp { test: Box::new(test), body: Box::new(body), orelse: Box::new(orelse) },
                pos,
            ));
        }
        Ok(body)
    }

    fn parse_or_expr_level(&mut self) -> ParseResult<Expr> {
        self.parse_walrus_or_bool_or()
    }

    fn parse_walrus_or_bool_or(&mut self) -> ParseResult<Expr> {
        if let TokenKind::Ident(name) = self.peek_kind().clone() {
            if matches!(self.peek_after(1), TokenKind::Walrus) {
                let pos = self.peek_pos();
                self.advance();
                self.advance();
                let value = self.parse_or_expr_level()?;
                return Ok(Expr::new(ExprKind::Walrus { target: name, value: Box::new(value) }, pos));
            }
        }
        self.parse_bool_or()
    }

    fn parse_bool_or(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let mut left = self.parse_bool_and()?;
        if self.at_keyword(Keyword::Or) {
            let mut values = vec![left];
            while self.eat_keyword(Keyword::Or) {
                values.push(self.parse_bool_and()?);
            }
            left = Expr::new(ExprKind::BoolOp { op: BoolOp::Or, values }, pos);
        }
        Ok(left)
    }

    fn parse_bool_and(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let mut left = self.parse_bool_not()?;
        if self.at_keyword(Keyword::And) {
            let mut values = vec![left];
            while self.eat_keyword(Keyword::And) {
                values.push(self.parse_bool_not()?);
            }
            left = Expr::new(ExprKind::BoolOp { op: BoolOp::And, values }, pos);
        }
        Ok(left)
    }

    fn parse_bool_not(&mut self) -> ParseResult<Expr> {
        if self.at_keyword(Keyword::Not) {
            let pos = self.peek_pos();
            self.advance();
            let operand = self.parse_bool_not()?;
            return Ok(Expr::new(ExprKind::UnaryOp { op: UnaryOp::Not, operand: Box::new(operand) }, pos));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let left = self.parse_bitor()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.peek_cmp_op() {
            self.consume_cmp_op(op);
            ops.push(op);
            comparators.push(self.parse_bitor()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::new(ExprKind::Compare { left: Box::new(left), ops, comparators }, pos))
    }

    fn peek_cmp_op(&self) -> Option<CmpOp> {
        match self.peek_kind() {
            TokenKind::Lt => Some(CmpOp::Lt),
            TokenKind::Gt => Some(CmpOp::Gt),
            TokenKind::LtEq => Some(CmpOp::LtEq),
            TokenKind::GtEq => Some(CmpOp::GtEq),
            TokenKind::EqEq => Some(CmpOp::Eq),
            TokenKind::NotEq => Some(CmpOp::NotEq),
            TokenKind::Keyword(Keyword::In) => Some(CmpOp::In),
            TokenKind::Keyword(Keyword::Is) => Some(CmpOp::Is),
            TokenKind::Keyword(Keyword::Not) if matches!(self.peek_after(1), TokenKind::Keyword(Keyword::In)) => {
                Some(CmpOp::NotIn)
            }
            _ => None,
        }
    }

    fn consume_cmp_op(&mut self, op: CmpOp) {
        match op {
            CmpOp::NotIn => {
                self.advance();
                self.advance();
            }
            CmpOp::Is => {
                self.advance();
                if self.at_keyword(Keyword::Not) {
                    self.advance();
                }
            }
            _ => {
                self.advance();
            }
        }
    }

    fn parse_bitor(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_bitxor()?;
        while self.check(&TokenKind::Pipe) {
            let pos = self.peek_pos();
            self.advance();
            let right = self.parse_bitxor()?;
            left = Expr::new(ExprKind::BinOp { left: Box::new(left), op: BinOp::BitOr, right: Box::new(right) }, pos);
        }
        Ok(left)
    }

    fn parse_bitxor(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_bitand()?;
        while self.check(&TokenKind::Caret) {
            let pos = self.peek_pos();
            self.advance();
            let right = self.parse_bitand()?;
            left =
                Expr::new(ExprKind::BinOp { left: Box::new(left), op: BinOp::BitXor, right: Box::new(right) }, pos);
        }
        Ok(left)
    }

    fn parse_bitand(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_shift()?;
        while self.check(&TokenKind::Amp) {
            let pos = self.peek_pos();
            self.advance();
            let right = self.parse_shift()?;
            left =
                Expr::new(ExprKind::BinOp { left: Box::new(left), op: BinOp::BitAnd, right: Box::new(right) }, pos);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::LShift => BinOp::LShift,
                TokenKind::RShift => BinOp::RShift,
                _ => break,
            };
            let pos = self.peek_pos();
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::new(ExprKind::BinOp { left: Box::new(left), op, right: Box::new(right) }, pos);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let pos = self.peek_pos();
            self.advance();
            let right = self.parse_term()?;
            left = Expr::new(ExprKind::BinOp { left: Box::new(left), op, right: Box::new(right) }, pos);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mult,
                TokenKind::Slash => BinOp::Div,
                TokenKind::DoubleSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                TokenKind::At => BinOp::MatMult,
                _ => break,
            };
            let pos = self.peek_pos();
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::new(ExprKind::BinOp { left: Box::new(left), op, right: Box::new(right) }, pos);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let op = match self.peek_kind() {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::new(ExprKind::UnaryOp { op, operand: Box::new(operand) }, pos))
    }

    /// `**` is right-associative and binds tighter than unary minus on its
    /// left but looser on its right, giving `-2**2 == -4`.
    fn parse_power(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let base = self.parse_await_expr()?;
        if self.check(&TokenKind::DoubleStar) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::BinOp { left: Box::new(base), op: BinOp::Pow, right: Box::new(exponent) },
                pos,
            ));
        }
        Ok(base)
    }

    fn parse_await_expr(&mut self) -> ParseResult<Expr> {
        if self.at_keyword(Keyword::Await) {
            let pos = self.peek_pos();
            self.advance();
            let inner = self.parse_postfix_expr()?;
            return Ok(Expr::new(ExprKind::Await(Box::new(inner)), pos));
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            let pos = self.peek_pos();
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let attr = self.expect_ident()?;
                    expr = Expr::new(ExprKind::Attribute { value: Box::new(expr), attr }, pos);
                }
                TokenKind::LParen => {
                    self.advance();
                    let (args, keywords) = self.parse_call_args()?;
                    self.expect(&TokenKind::RParen)?;
                    expr = Expr::new(ExprKind::Call { func: Box::new(expr), args, keywords }, pos);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_subscript()?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::new(ExprKind::Subscript { value: Box::new(expr), index: Box::new(index) }, pos);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> ParseResult<(Vec<Expr>, Vec<(Option<String>, Expr)>)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if self.check(&TokenKind::DoubleStar) {
                self.advance();
                keywords.push((None, self.parse_expr()?));
            } else if self.check(&TokenKind::Star) {
                let pos = self.peek_pos();
                self.advance();
                let inner = self.parse_expr()?;
                args.push(Expr::new(ExprKind::Starred(Box::new(inner)), pos));
            } else if let TokenKind::Ident(name) = self.peek_kind().clone() {
                if matches!(self.peek_after(1), TokenKind::Assign) {
                    self.advance();
                    self.advance();
                    keywords.push((Some(name), self.parse_expr()?));
                } else {
                    args.push(self.parse_comprehension_or_expr(&mut Vec::new())?);
                }
            } else {
                args.push(self.parse_comprehension_or_expr(&mut Vec::new())?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok((args, keywords))
    }

    /// Parses a single call argument, detecting a trailing `for` that turns
    /// a lone positional argument into a generator expression.
    fn parse_comprehension_or_expr(&mut self, _unused: &mut Vec<Expr>) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let elt = self.parse_expr()?;
        if self.at_keyword(Keyword::For) || self.at_keyword(Keyword::Async) {
            let generators = self.parse_comprehension_clauses()?;
            return Ok(Expr::new(ExprKind::GeneratorExp { elt: Box::new(elt), generators }, pos));
        }
        Ok(elt)
    }

    fn parse_subscript(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let mut items = vec![self.parse_slice_item()?];
        let mut had_comma = false;
        while self.eat(&TokenKind::Comma) {
            had_comma = true;
            if self.check(&TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_slice_item()?);
        }
        if had_comma {
            Ok(Expr::new(ExprKind::Tuple(items), pos))
        } else {
            Ok(items.pop().unwrap())
        }
    }

    fn parse_slice_item(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        let lower = if self.check(&TokenKind::Colon) || self.check(&TokenKind::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        if !self.check(&TokenKind::Colon) {
            return Ok(*lower.unwrap());
        }
        self.advance();
        let upper = if self.check(&TokenKind::Colon) || self.check(&TokenKind::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let step = if self.eat(&TokenKind::Colon) {
            if self.check(&TokenKind::RBracket) { None } else { Some(Box::new(self.parse_expr()?)) }
        } else {
            None
        };
        Ok(Expr::new(ExprKind::Slice { lower, upper, step }, pos))
    }

    fn parse_yield_expr(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        self.expect_keyword(Keyword::Yield)?;
        if self.eat_keyword(Keyword::From) {
            let inner = self.parse_expr()?;
            return Ok(Expr::new(ExprKind::YieldFrom(Box::new(inner)), pos));
        }
        if self.at_stmt_end() || self.check(&TokenKind::RParen) {
            return Ok(Expr::new(ExprKind::Yield(None), pos));
        }
        let value = self.parse_expr_list_as_tuple()?;
        Ok(Expr::new(ExprKind::Yield(Some(Box::new(value))), pos))
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        let pos = self.peek_pos();
        if self.at_keyword(Keyword::Yield) {
            return self.parse_yield_expr();
        }
        match self.peek_kind().clone() {
            TokenKind::Int(v) => {
                self.advance();
                Ok(Expr::new(ExprKind::IntLit(v), pos))
            }
            TokenKind::Float(v) => {
                self.advance();
                Ok(Expr::new(ExprKind::FloatLit(v), pos))
            }
            TokenKind::Str(s) => {
                self.advance();
                let mut combined = s;
                while let TokenKind::Str(more) = self.peek_kind().clone() {
                    self.advance();
                    combined.push_str(&more);
                }
                Ok(Expr::new(ExprKind::StrLit(combined), pos))
            }
            TokenKind::Bytes(b) => {
                self.advance();
                Ok(Expr::new(ExprKind::BytesLit(b), pos))
            }
            TokenKind::FStringStart => self.parse_fstring(pos),
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Name(name), pos))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::new(ExprKind::BoolLit(true), pos))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::new(ExprKind::BoolLit(false), pos))
            }
            TokenKind::Keyword(Keyword::None) => {
                self.advance();
                Ok(Expr::new(ExprKind::NoneLit, pos))
            }
            TokenKind::Ellipsis => {
                self.advance();
                Ok(Expr::new(ExprKind::Ellipsis, pos))
            }
            TokenKind::LParen => self.parse_paren_atom(pos),
            TokenKind::LBracket => self.parse_bracket_atom(pos),
            TokenKind::LBrace => self.parse_brace_atom(pos),
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_paren_atom(&mut self, pos: Position) -> ParseResult<Expr> {
        self.advance();
        if self.eat(&TokenKind::RParen) {
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), pos));
        }
        let first = self.parse_star_or_expr()?;
        if self.at_keyword(Keyword::For) || self.at_keyword(Keyword::Async) {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(&TokenKind::RParen)?;
            return Ok(Expr::new(ExprKind::GeneratorExp { elt: Box::new(first), generators }, pos));
        }
        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(first);
        }
        let mut items = vec![first];
        let mut trailing_comma = false;
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RParen) {
                trailing_comma = true;
                break;
            }
            items.push(self.parse_star_or_expr()?);
        }
        let _ = trailing_comma;
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::new(ExprKind::Tuple(items), pos))
    }

    fn parse_bracket_atom(&mut self, pos: Position) -> ParseResult<Expr> {
        self.advance();
        if self.eat(&TokenKind::RBracket) {
            return Ok(Expr::new(ExprKind::List(Vec::new()), pos));
        }
        let first = self.parse_star_or_expr()?;
        if self.at_keyword(Keyword::For) || self.at_keyword(Keyword::Async) {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(&TokenKind::RBracket)?;
            return Ok(Expr::new(ExprKind::ListComp { elt: Box::new(first), generators }, pos));
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_star_or_expr()?);
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::new(ExprKind::List(items), pos))
    }

    fn parse_brace_atom(&mut self, pos: Position) -> ParseResult<Expr> {
        self.advance();
        if self.eat(&TokenKind::RBrace) {
            return Ok(Expr::new(ExprKind::DictLit(Vec::new()), pos));
        }
        if self.check(&TokenKind::DoubleStar) {
            self.advance();
            let value = self.parse_or_expr_level()?;
            let mut pairs = vec![(None, value)];
            while self.eat(&TokenKind::Comma) {
                if self.check(&TokenKind::RBrace) {
                    break;
                }
                pairs.push(self.parse_dict_pair()?);
            }
            self.expect(&TokenKind::RBrace)?;
            return Ok(Expr::new(ExprKind::DictLit(pairs), pos));
        }

        let first = self.parse_star_or_expr()?;
        if self.check(&TokenKind::Colon) {
            self.advance();
            let value = self.parse_or_expr_level()?;
            if self.at_keyword(Keyword::For) || self.at_keyword(Keyword::Async) {
                let generators = self.parse_comprehension_clauses()?;
                self.expect(&TokenKind::RBrace)?;
                return Ok(Expr::new(
                    ExprKind::DictComp { key: Box::new(first), value: Box::new(value), generators },
                    pos,
                ));
            }
            let mut pairs = vec![(Some(first), value)];
            while self.eat(&TokenKind::Comma) {
                if self.check(&TokenKind::RBrace) {
                    break;
                }
                pairs.push(self.parse_dict_pair()?);
            }
            self.expect(&TokenKind::RBrace)?;
            return Ok(Expr::new(ExprKind::DictLit(pairs), pos));
        }

        if self.at_keyword(Keyword::For) || self.at_keyword(Keyword::Async) {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(&TokenKind::RBrace)?;
            return Ok(Expr::new(ExprKind::SetComp { elt: Box::new(first), generators }, pos));
        }

        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RBrace) {
                break;
            }
            items.push(self.parse_star_or_expr()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::new(ExprKind::SetLit(items), pos))
    }

    fn parse_dict_pair(&mut self) -> ParseResult<(Option<Expr>, Expr)> {
        if self.check(&TokenKind::DoubleStar) {
            self.advance();
            return Ok((None, self.parse_or_expr_level()?));
        }
        let key = self.parse_or_expr_level()?;
        self.expect(&TokenKind::Colon)?;
        let value = self.parse_or_expr_level()?;
        Ok((Some(key), value))
    }

    fn parse_comprehension_clauses(&mut self) -> ParseResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        loop {
            let is_async = self.eat_keyword(Keyword::Async);
            if !self.at_keyword(Keyword::For) {
                if is_async {
                    return Err(self.error("expected 'for' after 'async' in comprehension".to_owned()));
                }
                break;
            }
            self.advance();
            let target = self.parse_target_list()?;
            self.expect_keyword(Keyword::In)?;
            let iter = self.parse_or_expr_level()?;
            let mut ifs = Vec::new();
            while self.at_keyword(Keyword::If) {
                self.advance();
                ifs.push(self.parse_or_expr_level()?);
            }
            generators.push(Comprehension { target, iter, ifs, is_async });
        }
        Ok(generators)
    }

    fn parse_fstring(&mut self, start_pos: Position) -> ParseResult<Expr> {
        self.expect(&TokenKind::FStringStart)?;
        let mut parts = Vec::new();
        loop {
            match self.peek_kind().clone() {
                TokenKind::FStringMiddle(text) => {
                    self.advance();
                    parts.push(FStringPart::Literal(text));
                }
                TokenKind::FStringExprStart => {
                    self.advance();
                    let value = self.parse_expr_list_as_tuple()?;
                    let conversion = if let TokenKind::FStringConversion(c) = self.peek_kind() {
                        let c = *c;
                        self.advance();
                        Some(c)
                    } else {
                        None
                    };
                    let format_spec = if self.check(&TokenKind::FStringFormatSpecStart) {
                        self.advance();
                        let mut spec_parts = Vec::new();
                        if let TokenKind::FStringMiddle(text) = self.peek_kind().clone() {
                            self.advance();
                            spec_parts.push(FStringPart::Literal(text));
                        }
                        Some(spec_parts)
                    } else {
                        None
                    };
                    self.expect(&TokenKind::FStringExprEnd)?;
                    parts.push(FStringPart::Expr {
                        value: Box::new(value),
                        conversion,
                        format_spec,
                        debug_text: None,
                    });
                }
                TokenKind::FStringEnd => {
                    self.advance();
                    break;
                }
                other => return Err(self.error(format!("unexpected token {other:?} inside f-string"))),
            }
        }
        Ok(Expr::new(ExprKind::FString(parts), start_pos))
    }
}

/// Shallow scan for `yield`/`yield from` anywhere in a function body that is
/// not itself inside a nested `def`/`lambda` (those get their own flag).
fn block_contains_yield(body: &Block) -> bool {
    body.iter().any(stmt_contains_yield)
}

fn stmt_contains_yield(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Expr(e) | StmtKind::YieldStmt(e) => expr_contains_yield(e),
        StmtKind::Assign { value, .. } | StmtKind::AugAssign { value, .. } => expr_contains_yield(value),
        StmtKind::AnnAssign { value, .. } => value.as_ref().is_some_and(expr_contains_yield),
        StmtKind::If { test, body, orelse } => {
            expr_contains_yield(test) || block_contains_yield(body) || block_contains_yield(orelse)
        }
        StmtKind::While { test, body, orelse } => {
            expr_contains_yield(test) || block_contains_yield(body) || block_contains_yield(orelse)
        }
        StmtKind::For { iter, body, orelse, .. } => {
            expr_contains_yield(iter) || block_contains_yield(body) || block_contains_yield(orelse)
        }
        StmtKind::Return(e) => e.as_ref().is_some_and(expr_contains_yield),
        StmtKind::Raise { exc, cause } => {
            exc.as_ref().is_some_and(expr_contains_yield) || cause.as_ref().is_some_and(expr_contains_yield)
        }
        StmtKind::Try { body, handlers, orelse, finalbody } => {
            block_contains_yield(body)
                || handlers.iter().any(|h| block_contains_yield(&h.body))
                || block_contains_yield(orelse)
                || block_contains_yield(finalbody)
        }
        StmtKind::With { items, body, .. } => {
            items.iter().any(|i| expr_contains_yield(&i.context_expr)) || block_contains_yield(body)
        }
        StmtKind::Assert { test, msg } => {
            expr_contains_yield(test) || msg.as_ref().is_some_and(expr_contains_yield)
        }
        // Nested function/class definitions have their own frame.
        StmtKind::FunctionDef(_) | StmtKind::ClassDef(_) => false,
        _ => false,
    }
}

fn expr_contains_yield(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Yield(_) | ExprKind::YieldFrom(_) => true,
        ExprKind::Lambda { .. } => false,
        ExprKind::BinOp { left, right, .. } => expr_contains_yield(left) || expr_contains_yield(right),
        ExprKind::BoolOp { values, .. } | ExprKind::Tuple(values) | ExprKind::List(values) | ExprKind::SetLit(values) => {
            values.iter().any(expr_contains_yield)
        }
        ExprKind::UnaryOp { operand, .. }
        | ExprKind::Starred(operand)
        | ExprKind::DoubleStarred(operand)
        | ExprKind::Await(operand) => expr_contains_yield(operand),
        ExprKind::Compare { left, comparators, .. } => {
            expr_contains_yield(left) || comparators.iter().any(expr_contains_yield)
        }
        ExprKind::IfExp { test, body, orelse } => {
            expr_contains_yield(test) || expr_contains_yield(body) || expr_contains_yield(orelse)
        }
        ExprKind::Call { func, args, keywords } => {
            expr_contains_yield(func)
                || args.iter().any(expr_contains_yield)
                || keywords.iter().any(|(_, v)| expr_contains_yield(v))
        }
        ExprKind::Attribute { value, .. } => expr_contains_yield(value),
        ExprKind::Subscript { value, index } => expr_contains_yield(value) || expr_contains_yield(index),
        ExprKind::Walrus { value, .. } => expr_contains_yield(value),
        ExprKind::DictLit(pairs) => {
            pairs.iter().any(|(k, v)| k.as_ref().is_some_and(expr_contains_yield) || expr_contains_yield(v))
        }
        ExprKind::FString(parts) => parts.iter().any(|p| match p {
            FStringPart::Expr { value, .. } => expr_contains_yield(value),
            FStringPart::Literal(_) => false,
        }),
        _ => false,
    }
}
