//! Recursive-descent parser producing [`CompilationUnit`]s.
//!
//! Source runs through [`preprocess`] and [`lex`] first. Expressions use
//! precedence climbing over [`BinaryOp::precedence`]. The reserved `__` probe
//! forms are parsed into [`ProbeStmt`]/[`ProbeExpr`] nodes so instrumented
//! output is itself valid input.

use crate::ast::*;
use crate::error::ParseError;
use crate::id::{OperationId, SubmissionId};
use crate::lexer::{lex, Token};
use crate::preprocess::preprocess;
use crate::span::{Span, Spanned};

/// Options that affect parsing.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Conditional-compilation symbols defined before the first line.
    pub defines: Vec<String>,
}

/// Parses a whole source text into items.
pub fn parse_unit(source: &str, options: &ParseOptions) -> Result<CompilationUnit, ParseError> {
    let mut parser = Parser::new(source, options)?;
    let mut items = Vec::new();
    while !parser.at(&Token::Eof) {
        items.push(parser.item()?);
    }
    Ok(CompilationUnit { items })
}

/// Parses a bare statement list, as used for evaluation harnesses.
pub fn parse_statements(source: &str, options: &ParseOptions) -> Result<Vec<Stmt>, ParseError> {
    let mut parser = Parser::new(source, options)?;
    let mut stmts = Vec::new();
    while !parser.at(&Token::Eof) {
        stmts.push(parser.statement()?);
    }
    Ok(stmts)
}

/// Parses a single expression that must span the whole input.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(source, &ParseOptions::default())?;
    let expr = parser.expression()?;
    parser.expect(&Token::Eof, "end of input")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
}

impl Parser {
    fn new(source: &str, options: &ParseOptions) -> Result<Self, ParseError> {
        let text = preprocess(source, &options.defines)?;
        Ok(Parser {
            tokens: lex(&text)?,
            pos: 0,
        })
    }

    // -- token cursor -------------------------------------------------------

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].node
    }

    fn span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn prev_span(&self) -> Span {
        match self.pos {
            0 => self.span(),
            pos => self.tokens[pos - 1].span,
        }
    }

    /// Span from `start` through the last consumed token.
    fn span_from(&self, start: Span) -> Span {
        start.to(self.prev_span())
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Token::Eof => ParseError::UnexpectedEof {
                expected: expected.to_string(),
                span: self.span(),
            },
            found => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: found.to_string(),
                span: self.span(),
            },
        }
    }

    fn expect(&mut self, token: &Token, expected: &str) -> Result<Span, ParseError> {
        if self.at(token) {
            let span = self.span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn ident(&mut self) -> Result<Ident, ParseError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                let span = self.span();
                self.advance();
                Ok(Ident::new(name, span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    // -- items --------------------------------------------------------------

    fn item(&mut self) -> Result<Item, ParseError> {
        let start = self.span();
        let is_static = self.eat(&Token::KwStatic);
        let ty = self.type_ref()?;
        let name = self.ident()?;

        if self.at(&Token::ParenOpen) {
            let params = self.params()?;
            let body = self.block()?;
            return Ok(Item::Method(MethodDecl {
                is_static,
                return_type: ty,
                name,
                params,
                span: self.span_from(start),
                body,
            }));
        }

        if !is_static {
            return Err(self.unexpected("'('"));
        }
        let declarators = self.declarators_after(name)?;
        self.expect(&Token::Semicolon, "';'")?;
        Ok(Item::Static(StaticDecl {
            decl: LocalDecl { ty, declarators },
            span: self.span_from(start),
        }))
    }

    fn params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect(&Token::ParenOpen, "'('")?;
        let mut params = Vec::new();
        if !self.at(&Token::ParenClose) {
            loop {
                let start = self.span();
                let ty = self.type_ref()?;
                let name = self.ident()?;
                params.push(Param {
                    ty,
                    name,
                    span: self.span_from(start),
                });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::ParenClose, "')'")?;
        Ok(params)
    }

    fn base_type(&mut self) -> Result<BaseType, ParseError> {
        let base = match self.peek() {
            Token::KwInt => BaseType::Int,
            Token::KwDouble => BaseType::Double,
            Token::KwBool => BaseType::Bool,
            Token::KwString => BaseType::String,
            Token::KwChar => BaseType::Char,
            Token::KwVoid => BaseType::Void,
            Token::KwVar => BaseType::Var,
            _ => return Err(self.unexpected("type")),
        };
        self.advance();
        Ok(base)
    }

    /// Counts trailing `[]` pairs.
    fn array_rank(&mut self) -> u8 {
        let mut rank = 0u8;
        while self.at(&Token::BracketOpen) && self.peek_at(1) == &Token::BracketClose {
            self.advance();
            self.advance();
            rank = rank.saturating_add(1);
        }
        rank
    }

    fn type_ref(&mut self) -> Result<TypeRef, ParseError> {
        let start = self.span();
        let base = self.base_type()?;
        let rank = self.array_rank();
        Ok(TypeRef {
            base,
            rank,
            span: self.span_from(start),
        })
    }

    fn declarators_after(&mut self, first: Ident) -> Result<Vec<Declarator>, ParseError> {
        let mut declarators = vec![self.declarator_rest(first)?];
        while self.eat(&Token::Comma) {
            let name = self.ident()?;
            declarators.push(self.declarator_rest(name)?);
        }
        Ok(declarators)
    }

    fn declarator_rest(&mut self, name: Ident) -> Result<Declarator, ParseError> {
        let start = name.span;
        let init = if self.eat(&Token::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Declarator {
            name,
            init,
            span: self.span_from(start),
        })
    }

    fn local_decl(&mut self) -> Result<LocalDecl, ParseError> {
        let ty = self.type_ref()?;
        let first = self.ident()?;
        let declarators = self.declarators_after(first)?;
        Ok(LocalDecl { ty, declarators })
    }

    // -- statements ---------------------------------------------------------

    fn block(&mut self) -> Result<Block, ParseError> {
        let start = self.expect(&Token::BraceOpen, "'{'")?;
        let mut stmts = Vec::new();
        while !self.at(&Token::BraceClose) {
            if self.at(&Token::Eof) {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.statement()?);
        }
        self.advance();
        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        let kind = match self.peek().clone() {
            Token::BraceOpen => StmtKind::Block(self.block()?),
            Token::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            Token::KwIf => self.if_statement()?,
            Token::KwWhile => {
                self.advance();
                let cond = self.paren_expression()?;
                let body = Box::new(self.statement()?);
                StmtKind::While { cond, body }
            }
            Token::KwDo => {
                self.advance();
                let body = Box::new(self.statement()?);
                self.expect(&Token::KwWhile, "'while'")?;
                let cond = self.paren_expression()?;
                self.expect(&Token::Semicolon, "';'")?;
                StmtKind::DoWhile { body, cond }
            }
            Token::KwFor => self.for_statement()?,
            Token::KwForeach => self.foreach_statement()?,
            Token::KwBreak => {
                self.advance();
                self.expect(&Token::Semicolon, "';'")?;
                StmtKind::Break
            }
            Token::KwContinue => {
                self.advance();
                self.expect(&Token::Semicolon, "';'")?;
                StmtKind::Continue
            }
            Token::KwReturn => {
                self.advance();
                let value = if self.at(&Token::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(&Token::Semicolon, "';'")?;
                StmtKind::Return(value)
            }
            Token::KwUnsafe => {
                self.advance();
                StmtKind::Unsafe(self.block()?)
            }
            Token::KwSpawn => {
                self.advance();
                let call = self.expression()?;
                if !matches!(call.kind, ExprKind::Call { .. }) {
                    return Err(ParseError::UnexpectedToken {
                        expected: "method call".into(),
                        found: "expression".into(),
                        span: call.span,
                    });
                }
                self.expect(&Token::Semicolon, "';'")?;
                StmtKind::Spawn(call)
            }
            token if token.is_type_keyword() => {
                let decl = self.local_decl()?;
                self.expect(&Token::Semicolon, "';'")?;
                StmtKind::Local(decl)
            }
            Token::Ident(name) if self.is_statement_probe(&name) => {
                let probe = self.statement_probe(&name)?;
                self.expect(&Token::Semicolon, "';'")?;
                StmtKind::Probe(probe)
            }
            _ => {
                let expr = self.expression()?;
                self.expect(&Token::Semicolon, "';'")?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt::new(kind, self.span_from(start)))
    }

    fn paren_expression(&mut self) -> Result<Expr, ParseError> {
        self.expect(&Token::ParenOpen, "'('")?;
        let expr = self.expression()?;
        self.expect(&Token::ParenClose, "')'")?;
        Ok(expr)
    }

    fn if_statement(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        let cond = self.paren_expression()?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.eat(&Token::KwElse) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn for_statement(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        self.expect(&Token::ParenOpen, "'('")?;

        let init = if self.at(&Token::Semicolon) {
            None
        } else if self.peek().is_type_keyword() {
            Some(ForInit::Local(self.local_decl()?))
        } else {
            Some(ForInit::Exprs(self.expression_list(&Token::Semicolon)?))
        };
        self.expect(&Token::Semicolon, "';'")?;

        let cond = if self.at(&Token::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&Token::Semicolon, "';'")?;

        let update = if self.at(&Token::ParenClose) {
            Vec::new()
        } else {
            self.expression_list(&Token::ParenClose)?
        };
        self.expect(&Token::ParenClose, "')'")?;

        let body = Box::new(self.statement()?);
        Ok(StmtKind::For {
            init,
            cond,
            update,
            body,
        })
    }

    fn foreach_statement(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        self.expect(&Token::ParenOpen, "'('")?;
        let ty = self.type_ref()?;
        let var = self.ident()?;
        self.expect(&Token::KwIn, "'in'")?;
        let iterable = self.expression()?;
        self.expect(&Token::ParenClose, "')'")?;
        let body = Box::new(self.statement()?);
        Ok(StmtKind::Foreach {
            ty,
            var,
            iterable,
            body,
        })
    }

    /// Comma-separated expressions, stopping before `terminator`.
    fn expression_list(&mut self, terminator: &Token) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![self.expression()?];
        while !self.at(terminator) && self.eat(&Token::Comma) {
            exprs.push(self.expression()?);
        }
        Ok(exprs)
    }

    // -- probes -------------------------------------------------------------

    fn is_statement_probe(&self, name: &str) -> bool {
        match name {
            probe_names::ENTER
            | probe_names::BEGIN_LOOP
            | probe_names::END_LOOP
            | probe_names::BEGIN_ITERATION
            | probe_names::END_ITERATION => true,
            // `__return(sub, id)` is a statement; with a value it is an expression.
            probe_names::RETURN => {
                matches!(self.peek_at(1), Token::ParenOpen)
                    && matches!(self.peek_at(2), Token::Int(_))
                    && matches!(self.peek_at(3), Token::Comma)
                    && matches!(self.peek_at(4), Token::Int(_))
                    && matches!(self.peek_at(5), Token::ParenClose)
            }
            _ => false,
        }
    }

    fn malformed(&self, name: &str, reason: &str, span: Span) -> ParseError {
        ParseError::MalformedProbe {
            name: name.to_string(),
            reason: reason.to_string(),
            span,
        }
    }

    fn int_literal(&mut self, name: &str, what: &str) -> Result<i64, ParseError> {
        match self.peek() {
            Token::Int(value) => {
                let value = *value;
                self.advance();
                Ok(value)
            }
            _ => Err(self.malformed(name, &format!("expected {what}"), self.span())),
        }
    }

    fn string_literal(&mut self, name: &str, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Token::Str(value) => {
                let value = value.clone();
                self.advance();
                Ok(value)
            }
            _ => Err(self.malformed(name, &format!("expected {what}"), self.span())),
        }
    }

    fn operation_id(&mut self, name: &str) -> Result<OperationId, ParseError> {
        let span = self.span();
        let raw = self.int_literal(name, "operation id")?;
        u32::try_from(raw)
            .map(OperationId)
            .map_err(|_| self.malformed(name, "operation id out of range", span))
    }

    /// Parses `(sub, id` of every probe form.
    fn probe_header(&mut self, name: &str) -> Result<(SubmissionId, OperationId), ParseError> {
        self.expect(&Token::ParenOpen, "'('")?;
        let span = self.span();
        let raw = self.int_literal(name, "submission id")?;
        let submission = u64::try_from(raw)
            .map(SubmissionId)
            .map_err(|_| self.malformed(name, "submission id out of range", span))?;
        self.expect(&Token::Comma, "','")?;
        let id = self.operation_id(name)?;
        Ok((submission, id))
    }

    fn statement_probe(&mut self, name: &str) -> Result<ProbeStmt, ParseError> {
        self.advance();
        let (submission, id) = self.probe_header(name)?;
        let kind = match name {
            probe_names::ENTER => {
                self.expect(&Token::Comma, "','")?;
                let method = self.string_literal(name, "method name")?;
                let mut args = Vec::new();
                while self.eat(&Token::Comma) {
                    self.expect(&Token::BracketOpen, "'['")?;
                    let arg_id = self.operation_id(name)?;
                    self.expect(&Token::Comma, "','")?;
                    let arg_name = self.string_literal(name, "parameter name")?;
                    self.expect(&Token::Comma, "','")?;
                    let value = self.expression()?;
                    self.expect(&Token::BracketClose, "']'")?;
                    args.push(ProbeArg {
                        id: arg_id,
                        name: arg_name,
                        value,
                    });
                }
                ProbeStmtKind::Enter { method, args }
            }
            probe_names::BEGIN_LOOP => ProbeStmtKind::BeginLoop,
            probe_names::END_LOOP => ProbeStmtKind::EndLoop,
            probe_names::BEGIN_ITERATION => ProbeStmtKind::BeginIteration,
            probe_names::END_ITERATION => ProbeStmtKind::EndIteration,
            _ => ProbeStmtKind::Return,
        };
        self.expect(&Token::ParenClose, "')'")?;
        Ok(ProbeStmt {
            submission,
            id,
            kind,
        })
    }

    fn expression_probe(&mut self, name: &str, start: Span) -> Result<ExprKind, ParseError> {
        let kind_of = |this: &mut Parser| -> Result<ProbeExprKind, ParseError> {
            match name {
                probe_names::RECORD => {
                    this.expect(&Token::Comma, "','")?;
                    let var = this.string_literal(name, "variable name")?;
                    this.expect(&Token::Comma, "','")?;
                    let value = Box::new(this.expression()?);
                    Ok(ProbeExprKind::Record { name: var, value })
                }
                probe_names::RETURN => {
                    this.expect(&Token::Comma, "','")?;
                    let value = Box::new(this.expression()?);
                    Ok(ProbeExprKind::Return { value })
                }
                _ => {
                    this.expect(&Token::Comma, "','")?;
                    let increment = Box::new(this.expression()?);
                    if !matches!(increment.kind, ExprKind::Increment { prefix: false, .. }) {
                        return Err(this.malformed(
                            name,
                            "expected a postfix increment",
                            increment.span,
                        ));
                    }
                    this.expect(&Token::Comma, "','")?;
                    let var = this.string_literal(name, "variable name")?;
                    this.expect(&Token::Comma, "','")?;
                    let current = Box::new(this.expression()?);
                    Ok(ProbeExprKind::Postfix {
                        name: var,
                        increment,
                        current,
                    })
                }
            }
        };

        match name {
            probe_names::RECORD | probe_names::RETURN | probe_names::POSTFIX => {}
            probe_names::ENTER
            | probe_names::BEGIN_LOOP
            | probe_names::END_LOOP
            | probe_names::BEGIN_ITERATION
            | probe_names::END_ITERATION => {
                return Err(self.malformed(name, "statement probe used as an expression", start))
            }
            _ => return Err(self.malformed(name, "unknown probe", start)),
        }

        let (submission, id) = self.probe_header(name)?;
        let kind = kind_of(self)?;
        self.expect(&Token::ParenClose, "')'")?;
        Ok(ExprKind::Probe(ProbeExpr {
            submission,
            id,
            kind,
        }))
    }

    // -- expressions --------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        let target = self.ternary()?;

        let op = match self.peek() {
            Token::Assign => AssignOp::Assign,
            Token::PlusAssign => AssignOp::Add,
            Token::MinusAssign => AssignOp::Sub,
            Token::StarAssign => AssignOp::Mul,
            Token::SlashAssign => AssignOp::Div,
            Token::PercentAssign => AssignOp::Rem,
            Token::AmpAssign => AssignOp::BitAnd,
            Token::PipeAssign => AssignOp::BitOr,
            Token::CaretAssign => AssignOp::BitXor,
            Token::ShlAssign => AssignOp::Shl,
            Token::ShrAssign => AssignOp::Shr,
            _ => return Ok(target),
        };
        if !target.is_assignable() {
            return Err(ParseError::InvalidAssignmentTarget { span: target.span });
        }
        self.advance();
        let value = self.expression()?;
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            self.span_from(start),
        ))
    }

    fn ternary(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        let cond = self.binary(BinaryOp::Or.precedence())?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then_expr = self.expression()?;
        self.expect(&Token::Colon, "':'")?;
        let else_expr = self.expression()?;
        Ok(Expr::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            self.span_from(start),
        ))
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self.peek() {
            Token::PipePipe => BinaryOp::Or,
            Token::AmpAmp => BinaryOp::And,
            Token::Pipe => BinaryOp::BitOr,
            Token::Caret => BinaryOp::BitXor,
            Token::Amp => BinaryOp::BitAnd,
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::Ne,
            Token::Less => BinaryOp::Lt,
            Token::LessEq => BinaryOp::Le,
            Token::Greater => BinaryOp::Gt,
            Token::GreaterEq => BinaryOp::Ge,
            Token::Shl => BinaryOp::Shl,
            Token::Shr => BinaryOp::Shr,
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            Token::Percent => BinaryOp::Rem,
            _ => return None,
        };
        Some(op)
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let start = self.span();
        let mut lhs = self.unary()?;
        while let Some(op) = self.binary_op() {
            if op.precedence() < min_precedence {
                break;
            }
            self.advance();
            let rhs = self.binary(op.precedence() + 1)?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                self.span_from(start),
            );
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        let op = match self.peek() {
            Token::Minus => Some(UnaryOp::Neg),
            Token::Bang => Some(UnaryOp::Not),
            Token::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                self.span_from(start),
            ));
        }

        let inc = match self.peek() {
            Token::PlusPlus => Some(IncDec::Increment),
            Token::MinusMinus => Some(IncDec::Decrement),
            _ => None,
        };
        if let Some(op) = inc {
            self.advance();
            let target = self.unary()?;
            if !target.is_assignable() {
                return Err(ParseError::InvalidAssignmentTarget { span: target.span });
            }
            return Ok(Expr::new(
                ExprKind::Increment {
                    op,
                    prefix: true,
                    target: Box::new(target),
                },
                self.span_from(start),
            ));
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Token::BracketOpen => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(&Token::BracketClose, "']'")?;
                    expr = Expr::new(
                        ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        self.span_from(start),
                    );
                }
                Token::Dot => {
                    self.advance();
                    let member = self.ident()?;
                    if member.name != "Length" {
                        return Err(ParseError::UnexpectedToken {
                            expected: "'Length'".into(),
                            found: format!("identifier '{}'", member.name),
                            span: member.span,
                        });
                    }
                    expr = Expr::new(ExprKind::Length(Box::new(expr)), self.span_from(start));
                }
                Token::PlusPlus | Token::MinusMinus => {
                    let op = if self.at(&Token::PlusPlus) {
                        IncDec::Increment
                    } else {
                        IncDec::Decrement
                    };
                    if !expr.is_assignable() {
                        return Err(ParseError::InvalidAssignmentTarget { span: expr.span });
                    }
                    self.advance();
                    expr = Expr::new(
                        ExprKind::Increment {
                            op,
                            prefix: false,
                            target: Box::new(expr),
                        },
                        self.span_from(start),
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        let kind = match self.peek().clone() {
            Token::Int(value) => {
                self.advance();
                ExprKind::Literal(Literal::Int(value))
            }
            Token::Double(value) => {
                self.advance();
                ExprKind::Literal(Literal::Double(value))
            }
            Token::Str(value) => {
                self.advance();
                ExprKind::Literal(Literal::Str(value))
            }
            Token::Char(value) => {
                self.advance();
                ExprKind::Literal(Literal::Char(value))
            }
            Token::KwTrue => {
                self.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            Token::KwFalse => {
                self.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            Token::Ident(name) => {
                let callee = self.ident()?;
                if !self.at(&Token::ParenOpen) {
                    ExprKind::Ident(name)
                } else if probe_names::is_reserved(&name) {
                    self.expression_probe(&name, start)?
                } else {
                    self.advance();
                    let args = if self.at(&Token::ParenClose) {
                        Vec::new()
                    } else {
                        self.expression_list(&Token::ParenClose)?
                    };
                    self.expect(&Token::ParenClose, "')'")?;
                    ExprKind::Call { callee, args }
                }
            }
            Token::ParenOpen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&Token::ParenClose, "')'")?;
                return Ok(Expr::new(inner.kind, self.span_from(start)));
            }
            Token::KwNew => self.new_array()?,
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr::new(kind, self.span_from(start)))
    }

    fn new_array(&mut self) -> Result<ExprKind, ParseError> {
        self.advance();
        let type_start = self.span();
        let base = self.base_type()?;

        if self.at(&Token::BracketOpen) && self.peek_at(1) == &Token::BracketClose {
            // new T[]...[] { items }
            let rank = self.array_rank();
            let elem = TypeRef {
                base,
                rank: rank - 1,
                span: self.span_from(type_start),
            };
            self.expect(&Token::BraceOpen, "'{'")?;
            let mut items = Vec::new();
            while !self.at(&Token::BraceClose) {
                items.push(self.expression()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::BraceClose, "'}'")?;
            return Ok(ExprKind::ArrayLiteral { elem, items });
        }

        self.expect(&Token::BracketOpen, "'['")?;
        let size = self.expression()?;
        self.expect(&Token::BracketClose, "']'")?;
        let rank = self.array_rank();
        let elem = TypeRef {
            base,
            rank,
            span: self.span_from(type_start),
        };
        Ok(ExprKind::NewArray {
            elem,
            size: Box::new(size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(src: &str) -> CompilationUnit {
        parse_unit(src, &ParseOptions::default()).unwrap()
    }

    fn expr(src: &str) -> Expr {
        parse_expression(src).unwrap()
    }

    fn method(unit: &CompilationUnit, index: usize) -> &MethodDecl {
        match &unit.items[index] {
            Item::Method(m) => m,
            other => panic!("expected method, got {other:?}"),
        }
    }

    #[test]
    fn parses_method_with_params() {
        let u = unit("int Sum(int n, int[] xs) { return n; }");
        let m = method(&u, 0);
        assert_eq!(m.name.name, "Sum");
        assert_eq!(m.params.len(), 2);
        assert_eq!(m.params[1].ty.rank, 1);
        assert!(matches!(m.body.stmts[0].kind, StmtKind::Return(Some(_))));
        assert!(!m.is_static);
    }

    #[test]
    fn parses_static_field() {
        let u = unit("static int counter = 0, other;");
        match &u.items[0] {
            Item::Static(s) => {
                assert_eq!(s.decl.declarators.len(), 2);
                assert!(s.decl.declarators[1].init.is_none());
            }
            other => panic!("expected static, got {other:?}"),
        }
    }

    #[test]
    fn field_without_static_is_rejected() {
        let err = parse_unit("int x = 1;", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn precedence_climbing() {
        let e = expr("1 + 2 * 3");
        match e.kind {
            ExprKind::Binary { op, rhs, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn binary_is_left_associative() {
        let e = expr("10 - 4 - 3");
        match e.kind {
            ExprKind::Binary { lhs, .. } => {
                assert!(matches!(lhs.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let e = expr("a = b += 2");
        match e.kind {
            ExprKind::Assign { op, value, .. } => {
                assert_eq!(op, AssignOp::Assign);
                assert!(matches!(value.kind, ExprKind::Assign { op: AssignOp::Add, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn postfix_and_prefix_increments() {
        assert!(matches!(
            expr("x++").kind,
            ExprKind::Increment { prefix: false, op: IncDec::Increment, .. }
        ));
        assert!(matches!(
            expr("--a[0]").kind,
            ExprKind::Increment { prefix: true, op: IncDec::Decrement, .. }
        ));
    }

    #[test]
    fn rejects_invalid_targets() {
        assert!(matches!(
            parse_expression("1 = x"),
            Err(ParseError::InvalidAssignmentTarget { .. })
        ));
        assert!(matches!(
            parse_expression("f()++"),
            Err(ParseError::InvalidAssignmentTarget { .. })
        ));
    }

    #[test]
    fn parses_arrays() {
        assert!(matches!(expr("new int[5]").kind, ExprKind::NewArray { .. }));
        match expr("new string[] { \"a\", \"b\", }").kind {
            ExprKind::ArrayLiteral { elem, items } => {
                assert_eq!(elem.base, BaseType::String);
                assert_eq!(elem.rank, 0);
                assert_eq!(items.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(expr("xs.Length").kind, ExprKind::Length(_)));
    }

    #[test]
    fn parses_loops() {
        let stmts = parse_statements(
            "for (int i = 0, j = 1; i < 3; i++, j--) { }\n\
             foreach (var c in \"ab\") print(c);\n\
             do x++; while (x < 3);\n\
             while (true) break;",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(stmts.len(), 4);
        match &stmts[0].kind {
            StmtKind::For { init, update, .. } => {
                assert!(matches!(init, Some(ForInit::Local(d)) if d.declarators.len() == 2));
                assert_eq!(update.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(stmts[1].kind, StmtKind::Foreach { .. }));
        assert!(matches!(stmts[2].kind, StmtKind::DoWhile { .. }));
        assert!(matches!(stmts[3].kind, StmtKind::While { .. }));
    }

    #[test]
    fn for_with_empty_clauses() {
        let stmts = parse_statements("for (;;) { break; }", &ParseOptions::default()).unwrap();
        assert!(matches!(
            &stmts[0].kind,
            StmtKind::For { init: None, cond: None, update, .. } if update.is_empty()
        ));
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        let stmts =
            parse_statements("if (a) if (b) x = 1; else x = 2;", &ParseOptions::default()).unwrap();
        match &stmts[0].kind {
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert!(else_branch.is_none());
                assert!(matches!(
                    then_branch.kind,
                    StmtKind::If { else_branch: Some(_), .. }
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn spawn_requires_call() {
        assert!(parse_statements("spawn Work(1);", &ParseOptions::default()).is_ok());
        assert!(parse_statements("spawn x;", &ParseOptions::default()).is_err());
    }

    #[test]
    fn parses_probe_statements() {
        let stmts = parse_statements(
            "__enter(3, 0, \"Sum\", [1, \"n\", n]);\n\
             __begin_loop(3, 2);\n__begin_iter(3, 3);\n__end_iter(3, 3);\n__end_loop(3, 2);\n\
             __return(3, 9);",
            &ParseOptions::default(),
        )
        .unwrap();
        match &stmts[0].kind {
            StmtKind::Probe(ProbeStmt {
                submission,
                id,
                kind: ProbeStmtKind::Enter { method, args },
            }) => {
                assert_eq!(*submission, SubmissionId(3));
                assert_eq!(*id, OperationId(0));
                assert_eq!(method, "Sum");
                assert_eq!(args[0].name, "n");
                assert_eq!(args[0].id, OperationId(1));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            &stmts[5].kind,
            StmtKind::Probe(ProbeStmt { kind: ProbeStmtKind::Return, .. })
        ));
    }

    #[test]
    fn parses_probe_expressions() {
        match expr("__record(1, 4, \"t\", t + i)").kind {
            ExprKind::Probe(ProbeExpr {
                kind: ProbeExprKind::Record { name, .. },
                ..
            }) => assert_eq!(name, "t"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            expr("__return(1, 5, t)").kind,
            ExprKind::Probe(ProbeExpr { kind: ProbeExprKind::Return { .. }, .. })
        ));
        assert!(matches!(
            expr("__postfix(1, 6, x++, \"x\", x)").kind,
            ExprKind::Probe(ProbeExpr { kind: ProbeExprKind::Postfix { .. }, .. })
        ));
    }

    #[test]
    fn return_probe_with_value_is_an_expression_statement() {
        let stmts = parse_statements("return __return(1, 2, x);", &ParseOptions::default()).unwrap();
        assert!(matches!(&stmts[0].kind, StmtKind::Return(Some(e)) if matches!(e.kind, ExprKind::Probe(_))));
    }

    #[test]
    fn malformed_probes_are_errors() {
        assert!(matches!(
            parse_expression("__mystery(1, 2)"),
            Err(ParseError::MalformedProbe { .. })
        ));
        assert!(matches!(
            parse_expression("__postfix(1, 2, ++x, \"x\", x)"),
            Err(ParseError::MalformedProbe { .. })
        ));
        assert!(matches!(
            parse_expression("__begin_loop(1, 2)"),
            Err(ParseError::MalformedProbe { .. })
        ));
        assert!(matches!(
            parse_expression("__record(1, -2, \"x\", x)"),
            Err(ParseError::MalformedProbe { .. })
        ));
    }

    #[test]
    fn defines_reach_the_preprocessor() {
        let src = "#if FAST\nint F() { return 1; }\n#else\nint G() { return 2; }\n#endif\n";
        let fast = parse_unit(
            src,
            &ParseOptions {
                defines: vec!["FAST".into()],
            },
        )
        .unwrap();
        assert_eq!(method(&fast, 0).name.name, "F");
        assert_eq!(method(&unit(src), 0).name.name, "G");
    }

    #[test]
    fn spans_cover_source_text() {
        let src = "int F() { int x = 1 + 2; }";
        let u = unit(src);
        let m = method(&u, 0);
        let stmt = &m.body.stmts[0];
        assert_eq!(stmt.span.slice(src), Some("int x = 1 + 2;"));
        match &stmt.kind {
            StmtKind::Local(decl) => {
                let init = decl.declarators[0].init.as_ref().unwrap();
                assert_eq!(init.span.slice(src), Some("1 + 2"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reports_eof_inside_block() {
        assert!(matches!(
            parse_unit("void F() { x = 1;", &ParseOptions::default()),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }
}
