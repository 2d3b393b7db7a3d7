//! Constant folding for `optimize` builds.
//!
//! Only operators whose operands are all literals are folded, using the same
//! evaluation functions the interpreter runs. An expression whose evaluation
//! would fail (overflow, division by zero, a type mismatch) is left in place
//! so the failure still happens at run time, at the same span.

use lumen_check::interpreter::eval::{self, Overflow};
use lumen_check::{Program, Value};
use lumen_core::ast::{
    Block, Declarator, Expr, ExprKind, ForInit, Literal, LocalDecl, ProbeArg, ProbeExpr,
    ProbeExprKind, ProbeStmtKind, Stmt, StmtKind,
};

/// Folds constant expressions in every method body and static initializer.
pub fn fold_program(program: &mut Program) {
    for method in program.methods.values_mut() {
        fold_block(&mut method.decl.body);
    }
    for field in &mut program.statics {
        fold_local(&mut field.decl.decl);
    }
}

fn fold_block(block: &mut Block) {
    for stmt in &mut block.stmts {
        fold_stmt(stmt);
    }
}

fn fold_local(decl: &mut LocalDecl) {
    for Declarator { init, .. } in &mut decl.declarators {
        if let Some(init) = init {
            fold_expr(init);
        }
    }
}

fn fold_stmt(stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::Block(block) | StmtKind::Unsafe(block) => fold_block(block),
        StmtKind::Local(decl) => fold_local(decl),
        StmtKind::Expr(expr) | StmtKind::Spawn(expr) => fold_expr(expr),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            fold_expr(cond);
            fold_stmt(then_branch);
            if let Some(else_branch) = else_branch {
                fold_stmt(else_branch);
            }
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            fold_expr(cond);
            fold_stmt(body);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Local(decl)) => fold_local(decl),
                Some(ForInit::Exprs(exprs)) => exprs.iter_mut().for_each(fold_expr),
                None => {}
            }
            if let Some(cond) = cond {
                fold_expr(cond);
            }
            update.iter_mut().for_each(fold_expr);
            fold_stmt(body);
        }
        StmtKind::Foreach { iterable, body, .. } => {
            fold_expr(iterable);
            fold_stmt(body);
        }
        StmtKind::Return(Some(expr)) => fold_expr(expr),
        StmtKind::Probe(probe) => {
            if let ProbeStmtKind::Enter { args, .. } = &mut probe.kind {
                for ProbeArg { value, .. } in args {
                    fold_expr(value);
                }
            }
        }
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::Empty => {}
    }
}

fn fold_expr(expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) => {}
        ExprKind::Assign { target, value, .. } => {
            fold_expr(target);
            fold_expr(value);
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            fold_expr(cond);
            fold_expr(then_expr);
            fold_expr(else_expr);
            if let ExprKind::Literal(Literal::Bool(taken)) = cond.kind {
                let chosen = if taken { then_expr } else { else_expr };
                let replacement = std::mem::replace(&mut **chosen, placeholder());
                *expr = replacement;
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            fold_expr(lhs);
            fold_expr(rhs);
            if let (Some(l), Some(r)) = (literal_value(lhs), literal_value(rhs)) {
                if let Some(folded) = eval::binary(*op, &l, &r, Overflow::Checked)
                    .ok()
                    .and_then(value_literal)
                {
                    expr.kind = ExprKind::Literal(folded);
                }
            }
        }
        ExprKind::Unary { op, operand } => {
            fold_expr(operand);
            if let Some(v) = literal_value(operand) {
                if let Some(folded) = eval::unary(*op, &v, Overflow::Checked)
                    .ok()
                    .and_then(value_literal)
                {
                    expr.kind = ExprKind::Literal(folded);
                }
            }
        }
        ExprKind::Increment { target, .. } => fold_expr(target),
        ExprKind::Call { args, .. } => args.iter_mut().for_each(fold_expr),
        ExprKind::Index { target, index } => {
            fold_expr(target);
            fold_expr(index);
        }
        ExprKind::Length(target) => fold_expr(target),
        ExprKind::NewArray { size, .. } => fold_expr(size),
        ExprKind::ArrayLiteral { items, .. } => items.iter_mut().for_each(fold_expr),
        ExprKind::Probe(ProbeExpr { kind, .. }) => match kind {
            ProbeExprKind::Record { value, .. } | ProbeExprKind::Return { value } => {
                fold_expr(value)
            }
            ProbeExprKind::Postfix {
                increment, current, ..
            } => {
                fold_expr(increment);
                fold_expr(current);
            }
        },
    }
}

fn placeholder() -> Expr {
    Expr::new(ExprKind::Literal(Literal::Bool(false)), Default::default())
}

fn literal_value(expr: &Expr) -> Option<Value> {
    match &expr.kind {
        ExprKind::Literal(literal) => Some(match literal {
            Literal::Int(i) => Value::Int(*i),
            Literal::Double(d) => Value::Double(*d),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Str(s) => Value::str(s),
            Literal::Char(c) => Value::Char(*c),
        }),
        _ => None,
    }
}

fn value_literal(value: Value) -> Option<Literal> {
    match value {
        Value::Int(i) => Some(Literal::Int(i)),
        Value::Double(d) if d.is_finite() => Some(Literal::Double(d)),
        Value::Bool(b) => Some(Literal::Bool(b)),
        Value::Char(c) => Some(Literal::Char(c)),
        Value::Str(s) => Some(Literal::Str(s.to_string())),
        _ => None,
    }
}
