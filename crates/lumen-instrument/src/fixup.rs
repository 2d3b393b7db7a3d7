//! Structural fix-up run before rewriting.
//!
//! Probes are inserted as sibling statements, so every place a statement
//! list can be extended must already be a block. This pass wraps
//! single-statement `if`/`else` branches and loop bodies in blocks. An
//! `else if` chain is left as is; its inner `if` is fixed in turn.
//!
//! The pass assigns no ids and never changes what the program does.

use lumen_core::ast::{Block, CompilationUnit, Item, Stmt, StmtKind};

/// Returns a copy of `unit` with every branch and loop body a block.
pub fn coerce_blocks(unit: &CompilationUnit) -> CompilationUnit {
    let mut unit = unit.clone();
    for item in &mut unit.items {
        if let Item::Method(method) = item {
            fix_block(&mut method.body);
        }
    }
    unit
}

fn fix_block(block: &mut Block) {
    for stmt in &mut block.stmts {
        fix_stmt(stmt);
    }
}

/// Replaces `stmt` with a block holding it, unless it already is one.
fn coerce(stmt: &mut Box<Stmt>) {
    if !matches!(stmt.kind, StmtKind::Block(_)) {
        let span = stmt.span;
        let inner = std::mem::replace(stmt.as_mut(), Stmt::new(StmtKind::Empty, span));
        **stmt = Stmt::new(StmtKind::Block(inner.into_block()), span);
    }
}

fn fix_stmt(stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::Block(block) | StmtKind::Unsafe(block) => fix_block(block),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            coerce(then_branch);
            fix_stmt(then_branch);
            if let Some(else_branch) = else_branch {
                if !matches!(else_branch.kind, StmtKind::If { .. }) {
                    coerce(else_branch);
                }
                fix_stmt(else_branch);
            }
        }
        StmtKind::While { body, .. }
        | StmtKind::DoWhile { body, .. }
        | StmtKind::For { body, .. }
        | StmtKind::Foreach { body, .. } => {
            coerce(body);
            fix_stmt(body);
        }
        StmtKind::Local(_)
        | StmtKind::Expr(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Return(_)
        | StmtKind::Spawn(_)
        | StmtKind::Empty
        | StmtKind::Probe(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use lumen_core::parser::{parse_unit, ParseOptions};
    use lumen_core::printer::print_unit;

    use super::*;

    fn fixed(source: &str) -> String {
        let unit = parse_unit(source, &ParseOptions::default()).unwrap();
        print_unit(&coerce_blocks(&unit))
    }

    #[test]
    fn wraps_branches_and_loop_bodies() {
        let text = fixed("void M(int n) { if (n > 0) n--; else n++; while (n < 3) n++; }");
        insta::assert_snapshot!(text, @r"
        void M(int n)
        {
            if (n > 0)
            {
                n--;
            }
            else
            {
                n++;
            }
            while (n < 3)
            {
                n++;
            }
        }
        ");
    }

    #[test]
    fn keeps_else_if_chains() {
        let text = fixed("void M(int n) { if (n == 0) n = 1; else if (n == 1) n = 2; }");
        assert!(text.contains("else if (n == 1)"));
        assert_eq!(text.matches('{').count(), 3);
    }

    #[test]
    fn nested_loops_are_fixed_throughout() {
        let source = "void M() { for (int i = 0; i < 2; i++) foreach (int x in new int[] { 1 }) do i++; while (false); }";
        let unit = parse_unit(source, &ParseOptions::default()).unwrap();
        let fixed = coerce_blocks(&unit);
        let Item::Method(method) = &fixed.items[0] else {
            panic!("expected a method");
        };
        let StmtKind::For { body, .. } = &method.body.stmts[0].kind else {
            panic!("expected a for loop");
        };
        let StmtKind::Block(outer) = &body.kind else {
            panic!("for body is not a block");
        };
        let StmtKind::Foreach { body, .. } = &outer.stmts[0].kind else {
            panic!("expected a foreach loop");
        };
        let StmtKind::Block(inner) = &body.kind else {
            panic!("foreach body is not a block");
        };
        let StmtKind::DoWhile { body, .. } = &inner.stmts[0].kind else {
            panic!("expected a do loop");
        };
        assert!(matches!(body.kind, StmtKind::Block(_)));
    }

    #[test]
    fn original_is_untouched() {
        let unit = parse_unit("void M(bool b) { if (b) return; }", &ParseOptions::default()).unwrap();
        let before = unit.clone();
        let _ = coerce_blocks(&unit);
        assert_eq!(unit, before);
    }
}
