//! Recursive-descent parser with precedence climbing for expressions.
//!
//! Error recovery is panic-mode: on a missing/unexpected token the parser
//! emits one `E_SYNTAX` diagnostic and skips forward to the next likely
//! statement boundary (`;`, `}`, a statement-starting keyword, or EOF) so a
//! single malformed statement does not cascade into unrelated errors for the
//! rest of the module.

use monoc_common::diagnostics::{codes, Diagnostic, Severity};
use monoc_common::span::{LineIndex, Span};
use monoc_common::token::{Token, TokenKind};
use std::rc::Rc;

use crate::ast::*;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: &'a str,
    index: LineIndex,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, source: &str, file: &'a str) -> Self {
        Self { tokens, pos: 0, file, index: LineIndex::new(source), diagnostics: Vec::new() }
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn parse_module(&mut self) -> Module {
        let mut stmts = Vec::new();
        while !self.at(TokenKind::Eof) {
            stmts.push(self.parse_stmt());
        }
        Module { stmts }
    }

    // --- token plumbing ---------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if !self.at(TokenKind::Eof) {
            self.pos += 1;
        }
        tok
    }

    /// Consume the current token if it matches `kind`, returning whether it did.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Require `kind`, emitting a syntax diagnostic and synchronizing if absent.
    fn expect(&mut self, kind: TokenKind, what: &str) -> Token {
        if self.at(kind) {
            self.advance()
        } else {
            let found = self.current().clone();
            self.error(found.span, format!("Expected {what}, found {:?}", found.kind));
            self.synchronize();
            found
        }
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(self.diagnostic_at(Severity::Error, codes::E_SYNTAX, span, message));
    }

    fn diagnostic_at(&self, severity: Severity, code: &'static str, span: Span, message: impl Into<String>) -> Diagnostic {
        let (line, col) = self.index.line_col(span.start);
        Diagnostic { severity, code, file: self.file.to_string(), line, col, message: message.into() }
    }

    /// Skip tokens until a plausible statement boundary so one bad token
    /// does not desynchronize the rest of the parse.
    fn synchronize(&mut self) {
        loop {
            match self.kind() {
                TokenKind::Eof | TokenKind::RBrace => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::KwVar
                | TokenKind::KwLet
                | TokenKind::KwConst
                | TokenKind::KwIf
                | TokenKind::KwWhile
                | TokenKind::KwFor
                | TokenKind::KwReturn
                | TokenKind::KwFunction
                | TokenKind::KwStruct
                | TokenKind::KwImport => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // --- statements ---------------------------------------------------------

    fn parse_stmt(&mut self) -> Stmt {
        match self.kind() {
            TokenKind::KwVar | TokenKind::KwLet => Stmt::VarDecl(self.parse_var_decl()),
            TokenKind::KwConst => Stmt::ConstDecl(self.parse_const_decl()),
            TokenKind::KwIf => Stmt::If(self.parse_if()),
            TokenKind::KwWhile => Stmt::While(self.parse_while()),
            TokenKind::KwFor => Stmt::For(self.parse_for()),
            TokenKind::KwReturn => Stmt::Return(self.parse_return()),
            TokenKind::LBrace => Stmt::Block(self.parse_block()),
            TokenKind::KwFunction => Stmt::FuncDecl(Rc::new(self.parse_func_decl())),
            TokenKind::KwStruct => Stmt::StructDecl(Rc::new(self.parse_struct_decl())),
            TokenKind::KwImport => Stmt::Import(self.parse_import()),
            _ => self.parse_expr_stmt(),
        }
    }

    /// `var`/`let` differ only in the default mutability of the binding;
    /// both may still be reassigned if they hold a mutable slot elsewhere in
    /// the body (the inference engine, not the parser, enforces
    /// `T_REASSIGNMENT_CONFLICT`). `var` is mutable, `let` is not.
    fn parse_var_decl(&mut self) -> VarDecl {
        let start_tok = self.advance();
        let mutable = start_tok.kind == TokenKind::KwVar;
        let name_tok = self.expect(TokenKind::Ident, "a variable name");
        let init = if self.eat(TokenKind::Eq) { Some(self.parse_expr()) } else { None };
        let end = self.expect(TokenKind::Semicolon, "';' after variable declaration");
        VarDecl { name: name_tok.text, mutable, init, span: start_tok.span.merge(end.span) }
    }

    fn parse_const_decl(&mut self) -> ConstDecl {
        let start_tok = self.advance();
        let name_tok = self.expect(TokenKind::Ident, "a constant name");
        self.expect(TokenKind::Eq, "'=' in constant declaration");
        let init = self.parse_expr();
        let end = self.expect(TokenKind::Semicolon, "';' after constant declaration");
        ConstDecl { name: name_tok.text, init, span: start_tok.span.merge(end.span) }
    }

    fn parse_if(&mut self) -> IfStmt {
        let start_tok = self.advance();
        self.expect(TokenKind::LParen, "'(' after 'if'");
        let cond = self.parse_expr();
        self.expect(TokenKind::RParen, "')' after condition");
        let then_branch = self.parse_block();
        let mut span = start_tok.span.merge(then_branch.span);
        let else_branch = if self.eat(TokenKind::KwElse) {
            let branch = if self.at(TokenKind::KwIf) {
                let nested = self.parse_if();
                let nested_span = nested.span;
                Block { stmts: vec![Stmt::If(nested)], span: nested_span }
            } else {
                self.parse_block()
            };
            span = span.merge(branch.span);
            Some(branch)
        } else {
            None
        };
        IfStmt { cond, then_branch, else_branch, span }
    }

    fn parse_while(&mut self) -> WhileStmt {
        let start_tok = self.advance();
        self.expect(TokenKind::LParen, "'(' after 'while'");
        let cond = self.parse_expr();
        self.expect(TokenKind::RParen, "')' after condition");
        let body = self.parse_block();
        let span = start_tok.span.merge(body.span);
        WhileStmt { cond, body, span }
    }

    fn parse_for(&mut self) -> ForStmt {
        let start_tok = self.advance();
        self.expect(TokenKind::LParen, "'(' after 'for'");

        let init = if self.eat(TokenKind::Semicolon) {
            None
        } else if matches!(self.kind(), TokenKind::KwVar | TokenKind::KwLet) {
            Some(Box::new(Stmt::VarDecl(self.parse_var_decl())))
        } else {
            let expr = self.parse_expr();
            self.expect(TokenKind::Semicolon, "';' after for-loop initializer");
            Some(Box::new(Stmt::Expr(expr)))
        };

        let cond = if self.at(TokenKind::Semicolon) { None } else { Some(self.parse_expr()) };
        self.expect(TokenKind::Semicolon, "';' after for-loop condition");

        let post = if self.at(TokenKind::RParen) { None } else { Some(Box::new(Stmt::Expr(self.parse_expr()))) };
        self.expect(TokenKind::RParen, "')' after for-loop clauses");

        let body = self.parse_block();
        let span = start_tok.span.merge(body.span);
        ForStmt { init, cond, post, body, span }
    }

    fn parse_return(&mut self) -> ReturnStmt {
        let start_tok = self.advance();
        let value = if self.at(TokenKind::Semicolon) { None } else { Some(self.parse_expr()) };
        let end = self.expect(TokenKind::Semicolon, "';' after return statement");
        ReturnStmt { value, span: start_tok.span.merge(end.span) }
    }

    fn parse_block(&mut self) -> Block {
        let start_tok = self.expect(TokenKind::LBrace, "'{'");
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            stmts.push(self.parse_stmt());
        }
        let end_tok = self.expect(TokenKind::RBrace, "'}'");
        Block { stmts, span: start_tok.span.merge(end_tok.span) }
    }

    fn parse_func_decl(&mut self) -> FuncDecl {
        let start_tok = self.advance();
        let name_tok = self.expect(TokenKind::Ident, "a function name");
        self.expect(TokenKind::LParen, "'(' after function name");
        let mut params = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                let p = self.expect(TokenKind::Ident, "a parameter name");
                params.push(p.text);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' after parameter list");
        let body = self.parse_block();
        let span = start_tok.span.merge(body.span);
        FuncDecl { name: name_tok.text, params, body, span }
    }

    fn parse_struct_decl(&mut self) -> StructDecl {
        let start_tok = self.advance();
        let name_tok = self.expect(TokenKind::Ident, "a struct name");
        self.expect(TokenKind::LBrace, "'{' after struct name");
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let field_start = self.expect(TokenKind::Ident, "a field name");
            self.expect(TokenKind::Colon, "':' after field name");
            let type_ann = self.parse_type_annotation();
            let default = if self.eat(TokenKind::Eq) { Some(self.parse_expr()) } else { None };
            let field_end = self.current().span;
            fields.push(FieldDecl {
                name: field_start.text.clone(),
                type_ann,
                default,
                span: field_start.span.merge(field_end),
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let end_tok = self.expect(TokenKind::RBrace, "'}' after struct fields");
        StructDecl { name: name_tok.text, fields, span: start_tok.span.merge(end_tok.span) }
    }

    fn parse_type_annotation(&mut self) -> TypeAnnotation {
        let mut ty = match self.kind() {
            TokenKind::KwInt => {
                self.advance();
                TypeAnnotation::Int
            }
            TokenKind::KwDouble => {
                self.advance();
                TypeAnnotation::Double
            }
            TokenKind::KwString => {
                self.advance();
                TypeAnnotation::String
            }
            TokenKind::KwBool => {
                self.advance();
                TypeAnnotation::Bool
            }
            TokenKind::KwVoid => {
                self.advance();
                TypeAnnotation::Void
            }
            TokenKind::Ident => TypeAnnotation::Named(self.advance().text),
            _ => {
                let found = self.current().clone();
                self.error(found.span, format!("Expected a type, found {:?}", found.kind));
                TypeAnnotation::Named("<error>".to_string())
            }
        };
        while self.eat(TokenKind::LBracket) {
            let size = if self.at(TokenKind::RBracket) { None } else { Some(Box::new(self.parse_expr())) };
            self.expect(TokenKind::RBracket, "']' after array type");
            ty = TypeAnnotation::Array(Box::new(ty), size);
        }
        ty
    }

    /// `import local from "path";` or `import local = origin from "path";`
    /// to re-bind a module export under a local name. `from` is a
    /// contextual keyword, not reserved elsewhere.
    fn parse_import(&mut self) -> ImportDecl {
        let start_tok = self.advance();
        let first = self.expect(TokenKind::Ident, "an imported name");
        let (local_name, origin_symbol) = if self.eat(TokenKind::Eq) {
            let origin = self.expect(TokenKind::Ident, "an exported name");
            (first.text, Some(origin.text))
        } else {
            (first.text, None)
        };
        if !(self.at(TokenKind::Ident) && self.current().text == "from") {
            let found = self.current().clone();
            self.error(found.span, "Expected 'from' in import declaration");
        } else {
            self.advance();
        }
        let path_tok = self.expect(TokenKind::StringLit, "a module path string");
        let end = self.expect(TokenKind::Semicolon, "';' after import declaration");
        ImportDecl { local_name, source_path: path_tok.text, origin_symbol, span: start_tok.span.merge(end.span) }
    }

    fn parse_expr_stmt(&mut self) -> Stmt {
        let expr = self.parse_expr();
        let end = self.expect(TokenKind::Semicolon, "';' after expression statement");
        let span = expr.span.merge(end.span);
        Stmt::Expr(Expr { kind: expr.kind, span })
    }

    // --- expressions: precedence climbing, lowest to highest ---------------

    fn parse_expr(&mut self) -> Expr {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Expr {
        let lhs = self.parse_ternary();
        let compound = match self.kind() {
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::SlashEq => Some(BinOp::Div),
            _ => None,
        };
        if let Some(op) = compound {
            self.advance();
            let rhs = self.parse_assignment();
            let span = lhs.span.merge(rhs.span);
            return Expr { kind: ExprKind::CompoundAssign(op, Box::new(lhs), Box::new(rhs)), span };
        }
        if self.eat(TokenKind::Eq) {
            let rhs = self.parse_assignment();
            let span = lhs.span.merge(rhs.span);
            return Expr { kind: ExprKind::Assign(Box::new(lhs), Box::new(rhs)), span };
        }
        lhs
    }

    fn parse_ternary(&mut self) -> Expr {
        let cond = self.parse_or();
        if self.eat(TokenKind::Question) {
            let then_expr = self.parse_assignment();
            self.expect(TokenKind::Colon, "':' in ternary expression");
            let else_expr = self.parse_assignment();
            let span = cond.span.merge(else_expr.span);
            return Expr {
                kind: ExprKind::Ternary(Box::new(cond), Box::new(then_expr), Box::new(else_expr)),
                span,
            };
        }
        cond
    }

    fn parse_or(&mut self) -> Expr {
        let mut lhs = self.parse_and();
        while self.eat(TokenKind::OrOr) {
            let rhs = self.parse_and();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr { kind: ExprKind::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs)), span };
        }
        lhs
    }

    fn parse_and(&mut self) -> Expr {
        let mut lhs = self.parse_equality();
        while self.eat(TokenKind::AndAnd) {
            let rhs = self.parse_equality();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr { kind: ExprKind::Binary(BinOp::And, Box::new(lhs), Box::new(rhs)), span };
        }
        lhs
    }

    fn parse_equality(&mut self) -> Expr {
        let mut lhs = self.parse_relational();
        loop {
            let op = match self.kind() {
                TokenKind::EqEq => BinOp::EqEq,
                TokenKind::Ne => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr { kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span };
        }
        lhs
    }

    fn parse_relational(&mut self) -> Expr {
        let mut lhs = self.parse_bitwise();
        loop {
            let op = match self.kind() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_bitwise();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr { kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span };
        }
        lhs
    }

    fn parse_bitwise(&mut self) -> Expr {
        let mut lhs = self.parse_additive();
        loop {
            let op = match self.kind() {
                TokenKind::Amp => BinOp::BitAnd,
                TokenKind::Shr => BinOp::Shr,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr { kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span };
        }
        lhs
    }

    fn parse_additive(&mut self) -> Expr {
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr { kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span };
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr { kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span };
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        match self.kind() {
            TokenKind::Bang => {
                let start = self.advance();
                let operand = self.parse_unary();
                let span = start.span.merge(operand.span);
                Expr { kind: ExprKind::Unary(UnOp::Not, Box::new(operand)), span }
            }
            TokenKind::Minus => {
                let start = self.advance();
                let operand = self.parse_unary();
                let span = start.span.merge(operand.span);
                Expr { kind: ExprKind::Unary(UnOp::Neg, Box::new(operand)), span }
            }
            TokenKind::PlusPlus => {
                let start = self.advance();
                let operand = self.parse_unary();
                let span = start.span.merge(operand.span);
                Expr { kind: ExprKind::PreIncDec(IncDecOp::Inc, Box::new(operand)), span }
            }
            TokenKind::MinusMinus => {
                let start = self.advance();
                let operand = self.parse_unary();
                let span = start.span.merge(operand.span);
                Expr { kind: ExprKind::PreIncDec(IncDecOp::Dec, Box::new(operand)), span }
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name_tok = self.expect(TokenKind::Ident, "a member name after '.'");
                    let span = expr.span.merge(name_tok.span);
                    expr = Expr { kind: ExprKind::Member(Box::new(expr), name_tok.text), span };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr();
                    let end = self.expect(TokenKind::RBracket, "']' after index expression");
                    let span = expr.span.merge(end.span);
                    expr = Expr { kind: ExprKind::Index(Box::new(expr), Box::new(index)), span };
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.at(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr());
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let end = self.expect(TokenKind::RParen, "')' after call arguments");
                    let span = expr.span.merge(end.span);
                    expr = Expr { kind: ExprKind::Call(Box::new(expr), args), span };
                }
                TokenKind::PlusPlus => {
                    let tok = self.advance();
                    let span = expr.span.merge(tok.span);
                    expr = Expr { kind: ExprKind::PostIncDec(IncDecOp::Inc, Box::new(expr)), span };
                }
                TokenKind::MinusMinus => {
                    let tok = self.advance();
                    let span = expr.span.merge(tok.span);
                    expr = Expr { kind: ExprKind::PostIncDec(IncDecOp::Dec, Box::new(expr)), span };
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::IntLit => {
                self.advance();
                let value = tok.text.parse::<i32>().unwrap_or(0);
                Expr { kind: ExprKind::IntLit(value), span: tok.span }
            }
            TokenKind::DoubleLit => {
                self.advance();
                let value = tok.text.parse::<f64>().unwrap_or(0.0);
                Expr { kind: ExprKind::DoubleLit(value), span: tok.span }
            }
            TokenKind::StringLit => {
                self.advance();
                Expr { kind: ExprKind::StringLit(tok.text), span: tok.span }
            }
            TokenKind::KwTrue => {
                self.advance();
                Expr { kind: ExprKind::BoolLit(true), span: tok.span }
            }
            TokenKind::KwFalse => {
                self.advance();
                Expr { kind: ExprKind::BoolLit(false), span: tok.span }
            }
            TokenKind::Ident => {
                self.advance();
                Expr { kind: ExprKind::Ident(tok.text), span: tok.span }
            }
            TokenKind::KwArray => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after 'Array'");
                let size = self.parse_expr();
                let end = self.expect(TokenKind::RParen, "')' after array size");
                Expr { kind: ExprKind::ArrayBuiltin(Box::new(size)), span: tok.span.merge(end.span) }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr();
                let end = self.expect(TokenKind::RParen, "')' after parenthesized expression");
                Expr { kind: inner.kind, span: tok.span.merge(end.span) }
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.at(TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expr());
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(TokenKind::RBracket, "']' after array literal");
                Expr { kind: ExprKind::ArrayLit(elements), span: tok.span.merge(end.span) }
            }
            TokenKind::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                if !self.at(TokenKind::RBrace) {
                    loop {
                        let name_tok = self.expect(TokenKind::Ident, "a field name");
                        self.expect(TokenKind::Colon, "':' after field name");
                        let value = self.parse_assignment();
                        fields.push((name_tok.text, value));
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(TokenKind::RBrace, "'}' after object literal");
                Expr { kind: ExprKind::ObjectLit(fields), span: tok.span.merge(end.span) }
            }
            _ => {
                self.error(tok.span, format!("Expected an expression, found {:?}", tok.kind));
                self.synchronize();
                Expr { kind: ExprKind::Error, span: tok.span }
            }
        }
    }
}
