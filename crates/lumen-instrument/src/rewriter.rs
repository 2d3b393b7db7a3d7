//! The instrumenting rewriter.
//!
//! Produces a new tree with probes injected; the input is never modified.
//! Ids are drawn from an [`IdSource`] in one depth-first pre-order pass:
//!
//! - method: method id, one id per parameter, then the exit id if the
//!   method returns nothing;
//! - loop: loop id, iteration id, item id (`foreach` only), then the
//!   header, then the body;
//! - assignment or declarator: its id, then the right-hand side;
//! - increment: its id;
//! - `return <expr>`: its id, then the expression.
//!
//! Every id is also noted in a [`LocationMap`] by the same traversal.
//!
//! Assignments to a variable are wrapped whole, `__record(s, id, "x", x += e)`,
//! so the recorded value is the one actually stored. Element assignments
//! and element increments are not recorded.

use lumen_check::flow::{block_can_complete, statements_can_complete};
use lumen_core::ast::{
    Block, CompilationUnit, Expr, ExprKind, ForInit, Ident, Item, LocalDecl, MethodDecl,
    ProbeArg, ProbeExpr, ProbeExprKind, ProbeStmt, ProbeStmtKind, Stmt, StmtKind,
};
use lumen_core::id::{OperationId, SourceIndex, SubmissionId};
use lumen_core::span::Span;
use lumen_trace::Submission;

use crate::fixup::coerce_blocks;
use crate::locate::{Location, LocationKind, LocationMap};

/// Supplies operation ids in allocation order.
pub trait IdSource {
    fn next_id(&mut self) -> OperationId;
}

impl IdSource for &Submission {
    fn next_id(&mut self) -> OperationId {
        self.next_operation_id()
    }
}

/// Ids counted from zero, the same sequence a fresh submission hands out.
#[derive(Debug, Default)]
pub struct Sequential {
    next: u32,
}

impl IdSource for Sequential {
    fn next_id(&mut self) -> OperationId {
        let id = OperationId(self.next);
        self.next += 1;
        id
    }
}

/// Rewrites compilation units, sharing one id sequence across them.
pub struct Rewriter<S> {
    submission: SubmissionId,
    ids: S,
    locations: LocationMap,
    source: SourceIndex,
    /// Exit id of the method being rewritten, if it returns nothing.
    exit: Option<OperationId>,
    /// Iteration ids of the enclosing loops, innermost last.
    iterations: Vec<OperationId>,
}

impl<S: IdSource> Rewriter<S> {
    pub fn new(submission: SubmissionId, ids: S) -> Self {
        Rewriter {
            submission,
            ids,
            locations: LocationMap::default(),
            source: SourceIndex(0),
            exit: None,
            iterations: Vec::new(),
        }
    }

    /// Returns an instrumented copy of `unit`. Static initializers are left
    /// alone; they run before any method is entered.
    pub fn rewrite_unit(&mut self, source: SourceIndex, unit: &CompilationUnit) -> CompilationUnit {
        self.source = source;
        let items = coerce_blocks(unit)
            .items
            .into_iter()
            .map(|item| match item {
                Item::Method(method) => Item::Method(self.method(method)),
                other => other,
            })
            .collect();
        CompilationUnit { items }
    }

    /// Consumes the rewriter, returning the locations of every id it assigned.
    pub fn finish(self) -> LocationMap {
        self.locations
    }

    fn allocate(&mut self, kind: LocationKind, span: Span) -> OperationId {
        let id = self.ids.next_id();
        self.locations.push(Location {
            id,
            source: self.source,
            span,
            kind,
        });
        id
    }

    // -----------------------------------------------------------------------
    // Probe construction
    // -----------------------------------------------------------------------

    fn probe_stmt(&self, id: OperationId, kind: ProbeStmtKind, span: Span) -> Stmt {
        Stmt::new(
            StmtKind::Probe(ProbeStmt {
                submission: self.submission,
                id,
                kind,
            }),
            span,
        )
    }

    fn probe_expr(&self, id: OperationId, kind: ProbeExprKind, span: Span) -> Expr {
        Expr::new(
            ExprKind::Probe(ProbeExpr {
                submission: self.submission,
                id,
                kind,
            }),
            span,
        )
    }

    fn record(&self, id: OperationId, name: &str, value: Expr) -> Expr {
        let span = value.span;
        self.probe_expr(
            id,
            ProbeExprKind::Record {
                name: name.to_string(),
                value: Box::new(value),
            },
            span,
        )
    }

    // -----------------------------------------------------------------------
    // Methods and statements
    // -----------------------------------------------------------------------

    fn method(&mut self, mut method: MethodDecl) -> MethodDecl {
        if method.body.stmts.is_empty() {
            return method;
        }
        self.iterations.clear();

        let method_id = self.allocate(LocationKind::Method, method.name.span);
        let mut args = Vec::with_capacity(method.params.len());
        for param in &method.params {
            args.push(ProbeArg {
                id: self.allocate(LocationKind::Argument, param.span),
                name: param.name.name.clone(),
                value: Expr::ident(param.name.name.clone(), param.name.span),
            });
        }
        let end = method.body.span.end_point();
        let exit = if method.return_type.is_void() {
            Some(self.allocate(LocationKind::Exit, end))
        } else {
            None
        };
        self.exit = exit;

        let falls_off_end = block_can_complete(&method.body);
        let enter = ProbeStmtKind::Enter {
            method: method.name.name.clone(),
            args,
        };
        let mut stmts = vec![self.probe_stmt(method_id, enter, method.body.span)];
        stmts.extend(self.statements(std::mem::take(&mut method.body.stmts)));
        if let (Some(exit), true) = (exit, falls_off_end) {
            stmts.push(self.probe_stmt(exit, ProbeStmtKind::Return, end));
        }
        method.body.stmts = stmts;
        self.exit = None;
        method
    }

    fn block(&mut self, block: Block) -> Block {
        Block {
            stmts: self.statements(block.stmts),
            span: block.span,
        }
    }

    fn statements(&mut self, stmts: Vec<Stmt>) -> Vec<Stmt> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.stmt(stmt, &mut out);
        }
        out
    }

    /// Rewrites `stmt`, pushing it and any probes around it onto `out`.
    fn stmt(&mut self, stmt: Stmt, out: &mut Vec<Stmt>) {
        let span = stmt.span;
        let kind = match stmt.kind {
            StmtKind::Block(block) => StmtKind::Block(self.block(block)),
            StmtKind::Unsafe(block) => StmtKind::Unsafe(self.block(block)),
            StmtKind::Local(decl) => StmtKind::Local(self.local(decl)),
            StmtKind::Expr(expr) => StmtKind::Expr(self.expr(expr)),
            StmtKind::Spawn(call) => StmtKind::Spawn(self.expr(call)),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                out.push(self.if_stmt(cond, *then_branch, else_branch.map(|b| *b), span));
                return;
            }
            StmtKind::While { cond, body } => {
                let (loop_id, iteration) = self.open_loop(span, &body);
                let cond = self.expr(cond);
                let body = self.loop_body(*body, iteration, None);
                let looped = StmtKind::While {
                    cond,
                    body: Box::new(body),
                };
                self.emit_loop(loop_id, Stmt::new(looped, span), out);
                return;
            }
            StmtKind::DoWhile { body, cond } => {
                let (loop_id, iteration) = self.open_loop(span, &body);
                let cond = self.expr(cond);
                let body = self.loop_body(*body, iteration, None);
                let looped = StmtKind::DoWhile {
                    body: Box::new(body),
                    cond,
                };
                self.emit_loop(loop_id, Stmt::new(looped, span), out);
                return;
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let (loop_id, iteration) = self.open_loop(span, &body);
                let init = init.map(|init| match init {
                    ForInit::Local(decl) => ForInit::Local(self.local(decl)),
                    ForInit::Exprs(exprs) => ForInit::Exprs(self.exprs(exprs)),
                });
                let cond = cond.map(|cond| self.expr(cond));
                let update = self.exprs(update);
                let body = self.loop_body(*body, iteration, None);
                let looped = StmtKind::For {
                    init,
                    cond,
                    update,
                    body: Box::new(body),
                };
                self.emit_loop(loop_id, Stmt::new(looped, span), out);
                return;
            }
            StmtKind::Foreach {
                ty,
                var,
                iterable,
                body,
            } => {
                let (loop_id, iteration) = self.open_loop(span, &body);
                let item = self.allocate(LocationKind::LoopItem, var.span);
                let iterable = self.expr(iterable);
                let body = self.loop_body(*body, iteration, Some((item, &var)));
                let looped = StmtKind::Foreach {
                    ty,
                    var,
                    iterable,
                    body: Box::new(body),
                };
                self.emit_loop(loop_id, Stmt::new(looped, span), out);
                return;
            }
            kind @ (StmtKind::Break | StmtKind::Continue) => {
                if let Some(&iteration) = self.iterations.last() {
                    out.push(self.probe_stmt(iteration, ProbeStmtKind::EndIteration, span));
                }
                kind
            }
            StmtKind::Return(Some(value)) => {
                let id = self.allocate(LocationKind::Return, span);
                let value = self.expr(value);
                let value_span = value.span;
                let wrapped = self.probe_expr(
                    id,
                    ProbeExprKind::Return {
                        value: Box::new(value),
                    },
                    value_span,
                );
                StmtKind::Return(Some(wrapped))
            }
            StmtKind::Return(None) => {
                if let Some(exit) = self.exit {
                    out.push(self.probe_stmt(exit, ProbeStmtKind::Return, span));
                }
                StmtKind::Return(None)
            }
            kind @ (StmtKind::Empty | StmtKind::Probe(_)) => kind,
        };
        out.push(Stmt::new(kind, span));
    }

    fn if_stmt(
        &mut self,
        cond: Expr,
        then_branch: Stmt,
        else_branch: Option<Stmt>,
        span: Span,
    ) -> Stmt {
        let cond = self.expr(cond);
        let then_branch = self.branch(then_branch);
        let else_branch = else_branch.map(|branch| Box::new(self.branch(branch)));
        Stmt::new(
            StmtKind::If {
                cond,
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span,
        )
    }

    /// Rewrites an `if` branch: a block, or the `if` of an `else if`.
    fn branch(&mut self, stmt: Stmt) -> Stmt {
        let span = stmt.span;
        match stmt.kind {
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.if_stmt(cond, *then_branch, else_branch.map(|b| *b), span),
            kind => {
                let block = Stmt::new(kind, span).into_block();
                Stmt::new(StmtKind::Block(self.block(block)), span)
            }
        }
    }

    fn open_loop(&mut self, span: Span, body: &Stmt) -> (OperationId, OperationId) {
        let loop_id = self.allocate(LocationKind::Loop, span);
        let iteration = self.allocate(LocationKind::Iteration, body.span);
        (loop_id, iteration)
    }

    fn emit_loop(&self, loop_id: OperationId, looped: Stmt, out: &mut Vec<Stmt>) {
        let span = looped.span;
        out.push(self.probe_stmt(loop_id, ProbeStmtKind::BeginLoop, span));
        out.push(looped);
        out.push(self.probe_stmt(loop_id, ProbeStmtKind::EndLoop, span.end_point()));
    }

    /// Brackets a loop body with iteration probes. The closing probe is
    /// omitted when the body cannot reach its end; every way out of such a
    /// body already closes the iteration.
    fn loop_body(
        &mut self,
        body: Stmt,
        iteration: OperationId,
        item: Option<(OperationId, &Ident)>,
    ) -> Stmt {
        let span = body.span;
        let block = body.into_block();
        let falls_off_end = statements_can_complete(&block.stmts);

        self.iterations.push(iteration);
        let mut stmts = vec![self.probe_stmt(iteration, ProbeStmtKind::BeginIteration, block.span)];
        if let Some((item, var)) = item {
            let current = Expr::ident(var.name.clone(), var.span);
            stmts.push(Stmt::new(
                StmtKind::Expr(self.record(item, &var.name, current)),
                var.span,
            ));
        }
        stmts.extend(self.statements(block.stmts));
        if falls_off_end {
            stmts.push(self.probe_stmt(
                iteration,
                ProbeStmtKind::EndIteration,
                block.span.end_point(),
            ));
        }
        self.iterations.pop();

        Stmt::new(
            StmtKind::Block(Block {
                stmts,
                span: block.span,
            }),
            span,
        )
    }

    fn local(&mut self, decl: LocalDecl) -> LocalDecl {
        let declarators = decl
            .declarators
            .into_iter()
            .map(|mut declarator| {
                if let Some(init) = declarator.init.take() {
                    let id = self.allocate(LocationKind::Assignment, declarator.span);
                    let init = self.expr(init);
                    declarator.init = Some(self.record(id, &declarator.name.name, init));
                }
                declarator
            })
            .collect();
        LocalDecl {
            ty: decl.ty,
            declarators,
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn exprs(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|expr| self.expr(expr)).collect()
    }

    fn boxed(&mut self, expr: Box<Expr>) -> Box<Expr> {
        Box::new(self.expr(*expr))
    }

    fn expr(&mut self, expr: Expr) -> Expr {
        let span = expr.span;
        let kind = match expr.kind {
            ExprKind::Assign { op, target, value } => match target.as_ident().map(str::to_string) {
                Some(name) => {
                    let id = self.allocate(LocationKind::Assignment, span);
                    let value = self.boxed(value);
                    let assign = Expr::new(ExprKind::Assign { op, target, value }, span);
                    return self.record(id, &name, assign);
                }
                None => {
                    let target = self.boxed(target);
                    let value = self.boxed(value);
                    ExprKind::Assign { op, target, value }
                }
            },
            ExprKind::Increment { op, prefix, target } => match target.as_ident().map(str::to_string) {
                Some(name) => {
                    let id = self.allocate(LocationKind::Increment, span);
                    let increment = Expr::new(ExprKind::Increment { op, prefix, target }, span);
                    if prefix {
                        return self.record(id, &name, increment);
                    }
                    let current = Expr::ident(name.clone(), span);
                    return self.probe_expr(
                        id,
                        ProbeExprKind::Postfix {
                            name,
                            increment: Box::new(increment),
                            current: Box::new(current),
                        },
                        span,
                    );
                }
                None => ExprKind::Increment {
                    op,
                    prefix,
                    target: self.boxed(target),
                },
            },
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => ExprKind::Ternary {
                cond: self.boxed(cond),
                then_expr: self.boxed(then_expr),
                else_expr: self.boxed(else_expr),
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op,
                lhs: self.boxed(lhs),
                rhs: self.boxed(rhs),
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: self.boxed(operand),
            },
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee,
                args: self.exprs(args),
            },
            ExprKind::Index { target, index } => ExprKind::Index {
                target: self.boxed(target),
                index: self.boxed(index),
            },
            ExprKind::Length(target) => ExprKind::Length(self.boxed(target)),
            ExprKind::NewArray { elem, size } => ExprKind::NewArray {
                elem,
                size: self.boxed(size),
            },
            ExprKind::ArrayLiteral { elem, items } => ExprKind::ArrayLiteral {
                elem,
                items: self.exprs(items),
            },
            kind @ (ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::Probe(_)) => kind,
        };
        Expr::new(kind, span)
    }
}
