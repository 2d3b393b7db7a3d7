//! Reachability of statement end points.
//!
//! A statement "can complete" when control may flow past its end. The rules
//! are the usual structural ones: `return`, `break` and `continue` never
//! complete, and a loop whose condition is the literal `true` completes only
//! through a `break` that targets it.

use lumen_core::ast::{Block, Expr, ExprKind, Literal, Stmt, StmtKind};

pub fn block_can_complete(block: &Block) -> bool {
    statements_can_complete(&block.stmts)
}

pub fn statements_can_complete(stmts: &[Stmt]) -> bool {
    stmts.iter().all(can_complete)
}

pub fn can_complete(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => false,
        StmtKind::Block(block) | StmtKind::Unsafe(block) => block_can_complete(block),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => match else_branch {
            Some(else_branch) => can_complete(then_branch) || can_complete(else_branch),
            None => true,
        },
        StmtKind::While { cond, body } => !is_true(cond) || breaks_out(body),
        StmtKind::DoWhile { body, cond } => {
            breaks_out(body) || (!is_true(cond) && (can_complete(body) || continues(body)))
        }
        StmtKind::For { cond, body, .. } => {
            cond.as_ref().is_some_and(|c| !is_true(c)) || breaks_out(body)
        }
        StmtKind::Foreach { .. }
        | StmtKind::Local(_)
        | StmtKind::Expr(_)
        | StmtKind::Spawn(_)
        | StmtKind::Empty
        | StmtKind::Probe(_) => true,
    }
}

fn is_true(cond: &Expr) -> bool {
    matches!(cond.kind, ExprKind::Literal(Literal::Bool(true)))
}

/// Whether a `break` in `stmt` exits the loop that directly encloses `stmt`.
fn breaks_out(stmt: &Stmt) -> bool {
    contains_jump(stmt, &|kind| matches!(kind, StmtKind::Break))
}

fn continues(stmt: &Stmt) -> bool {
    contains_jump(stmt, &|kind| matches!(kind, StmtKind::Continue))
}

/// Searches for a jump without descending into nested loops, whose jumps
/// target themselves.
fn contains_jump(stmt: &Stmt, is_jump: &dyn Fn(&StmtKind) -> bool) -> bool {
    if is_jump(&stmt.kind) {
        return true;
    }
    match &stmt.kind {
        StmtKind::Block(block) | StmtKind::Unsafe(block) => {
            block.stmts.iter().any(|s| contains_jump(s, is_jump))
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            contains_jump(then_branch, is_jump)
                || else_branch.as_ref().is_some_and(|e| contains_jump(e, is_jump))
        }
        _ => false,
    }
}
