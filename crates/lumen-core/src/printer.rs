//! Renders syntax trees back to Lumen source.
//!
//! Output uses Allman braces and four-space indentation. Parentheses are
//! inserted from operator precedence alone, so printing a parsed tree and
//! parsing the result yields the same tree shape.

use crate::ast::*;

/// Renders a whole compilation unit.
pub fn print_unit(unit: &CompilationUnit) -> String {
    let mut printer = Printer::default();
    for (index, item) in unit.items.iter().enumerate() {
        if index > 0 {
            printer.out.push('\n');
        }
        printer.item(item);
    }
    printer.out
}

/// Renders a statement list at top level, as used for harness text.
pub fn print_statements(stmts: &[Stmt]) -> String {
    let mut printer = Printer::default();
    for stmt in stmts {
        printer.stmt(stmt);
    }
    printer.out
}

/// Renders one expression.
pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr, precedence::ASSIGN);
    printer.out
}

/// Renders a type as written, e.g. `int[][]`.
pub fn print_type(ty: &TypeRef) -> String {
    let mut text = ty.base.keyword().to_string();
    for _ in 0..ty.rank {
        text.push_str("[]");
    }
    text
}

/// Escapes a string body for a double-quoted literal.
pub fn escape_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        push_escaped(&mut out, ch, '"');
    }
    out.push('"');
    out
}

fn escape_char(value: char) -> String {
    let mut out = String::from("'");
    push_escaped(&mut out, value, '\'');
    out.push('\'');
    out
}

fn push_escaped(out: &mut String, ch: char, quote: char) {
    match ch {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        '\0' => out.push_str("\\0"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c => out.push(c),
    }
}

/// Shortest text for `value` that still lexes as a double.
fn double_text(value: f64) -> String {
    let text = format!("{value}");
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn pad(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn item(&mut self, item: &Item) {
        match item {
            Item::Method(method) => {
                if method.is_static {
                    self.out.push_str("static ");
                }
                self.out.push_str(&print_type(&method.return_type));
                self.out.push(' ');
                self.out.push_str(&method.name.name);
                self.out.push('(');
                for (index, param) in method.params.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&print_type(&param.ty));
                    self.out.push(' ');
                    self.out.push_str(&param.name.name);
                }
                self.out.push_str(")\n");
                self.block(&method.body);
            }
            Item::Static(field) => {
                self.out.push_str("static ");
                self.local(&field.decl);
                self.out.push_str(";\n");
            }
        }
    }

    fn block(&mut self, block: &Block) {
        self.pad();
        self.out.push_str("{\n");
        self.indent += 1;
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.pad();
        self.out.push_str("}\n");
    }

    /// Prints the body of a compound statement on the following line(s).
    fn nested(&mut self, stmt: &Stmt) {
        self.out.push('\n');
        match &stmt.kind {
            StmtKind::Block(block) => self.block(block),
            _ => {
                self.indent += 1;
                self.stmt(stmt);
                self.indent -= 1;
            }
        }
    }

    fn local(&mut self, decl: &LocalDecl) {
        self.out.push_str(&print_type(&decl.ty));
        self.out.push(' ');
        for (index, declarator) in decl.declarators.iter().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&declarator.name.name);
            if let Some(init) = &declarator.init {
                self.out.push_str(" = ");
                self.expr(init, precedence::ASSIGN);
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        if let StmtKind::Block(block) = &stmt.kind {
            self.block(block);
            return;
        }
        self.pad();
        self.stmt_inline(stmt);
    }

    /// Prints a non-block statement starting at the current column.
    fn stmt_inline(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Block(block) => {
                self.out.push('\n');
                self.block(block);
            }
            StmtKind::Local(decl) => {
                self.local(decl);
                self.out.push_str(";\n");
            }
            StmtKind::Expr(expr) => {
                self.expr(expr, precedence::ASSIGN);
                self.out.push_str(";\n");
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.out.push_str("if (");
                self.expr(cond, precedence::ASSIGN);
                self.out.push(')');
                match else_branch {
                    Some(else_branch) => {
                        // An else-less `if` as the then-branch would capture our `else`.
                        if matches!(then_branch.kind, StmtKind::If { else_branch: None, .. }) {
                            self.out.push('\n');
                            self.block(&Block {
                                stmts: vec![(**then_branch).clone()],
                                span: then_branch.span,
                            });
                        } else {
                            self.nested(then_branch);
                        }
                        self.pad();
                        self.out.push_str("else");
                        if matches!(else_branch.kind, StmtKind::If { .. }) {
                            self.out.push(' ');
                            self.stmt_inline(else_branch);
                        } else {
                            self.nested(else_branch);
                        }
                    }
                    None => self.nested(then_branch),
                }
            }
            StmtKind::While { cond, body } => {
                self.out.push_str("while (");
                self.expr(cond, precedence::ASSIGN);
                self.out.push(')');
                self.nested(body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.out.push_str("do");
                self.nested(body);
                self.pad();
                self.out.push_str("while (");
                self.expr(cond, precedence::ASSIGN);
                self.out.push_str(");\n");
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                self.out.push_str("for (");
                match init {
                    Some(ForInit::Local(decl)) => self.local(decl),
                    Some(ForInit::Exprs(exprs)) => self.expr_list(exprs),
                    None => {}
                }
                self.out.push(';');
                if let Some(cond) = cond {
                    self.out.push(' ');
                    self.expr(cond, precedence::ASSIGN);
                }
                self.out.push(';');
                if !update.is_empty() {
                    self.out.push(' ');
                    self.expr_list(update);
                }
                self.out.push(')');
                self.nested(body);
            }
            StmtKind::Foreach {
                ty,
                var,
                iterable,
                body,
            } => {
                self.out.push_str("foreach (");
                self.out.push_str(&print_type(ty));
                self.out.push(' ');
                self.out.push_str(&var.name);
                self.out.push_str(" in ");
                self.expr(iterable, precedence::ASSIGN);
                self.out.push(')');
                self.nested(body);
            }
            StmtKind::Break => self.out.push_str("break;\n"),
            StmtKind::Continue => self.out.push_str("continue;\n"),
            StmtKind::Return(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value, precedence::ASSIGN);
                }
                self.out.push_str(";\n");
            }
            StmtKind::Unsafe(block) => {
                self.out.push_str("unsafe\n");
                self.block(block);
            }
            StmtKind::Spawn(call) => {
                self.out.push_str("spawn ");
                self.expr(call, precedence::ASSIGN);
                self.out.push_str(";\n");
            }
            StmtKind::Empty => self.out.push_str(";\n"),
            StmtKind::Probe(probe) => {
                self.probe_stmt(probe);
                self.out.push_str(";\n");
            }
        }
    }

    fn probe_stmt(&mut self, probe: &ProbeStmt) {
        let name = match &probe.kind {
            ProbeStmtKind::Enter { .. } => probe_names::ENTER,
            ProbeStmtKind::BeginLoop => probe_names::BEGIN_LOOP,
            ProbeStmtKind::EndLoop => probe_names::END_LOOP,
            ProbeStmtKind::BeginIteration => probe_names::BEGIN_ITERATION,
            ProbeStmtKind::EndIteration => probe_names::END_ITERATION,
            ProbeStmtKind::Return => probe_names::RETURN,
        };
        self.out
            .push_str(&format!("{name}({}, {}", probe.submission, probe.id));
        if let ProbeStmtKind::Enter { method, args } = &probe.kind {
            self.out.push_str(", ");
            self.out.push_str(&escape_str(method));
            for arg in args {
                self.out
                    .push_str(&format!(", [{}, {}, ", arg.id, escape_str(&arg.name)));
                self.expr(&arg.value, precedence::ASSIGN);
                self.out.push(']');
            }
        }
        self.out.push(')');
    }

    fn expr_list(&mut self, exprs: &[Expr]) {
        for (index, expr) in exprs.iter().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            self.expr(expr, precedence::ASSIGN);
        }
    }

    fn expr(&mut self, expr: &Expr, min_precedence: u8) {
        let own = match &expr.kind {
            ExprKind::Literal(Literal::Int(v)) if *v < 0 => precedence::UNARY,
            ExprKind::Literal(Literal::Double(v)) if v.is_sign_negative() => precedence::UNARY,
            kind => kind.precedence(),
        };
        let parenthesize = own < min_precedence;
        if parenthesize {
            self.out.push('(');
        }
        self.expr_kind(&expr.kind);
        if parenthesize {
            self.out.push(')');
        }
    }

    fn expr_kind(&mut self, kind: &ExprKind) {
        match kind {
            ExprKind::Literal(literal) => {
                let text = match literal {
                    Literal::Int(v) => v.to_string(),
                    Literal::Double(v) => double_text(*v),
                    Literal::Bool(v) => v.to_string(),
                    Literal::Str(v) => escape_str(v),
                    Literal::Char(v) => escape_char(*v),
                };
                self.out.push_str(&text);
            }
            ExprKind::Ident(name) => self.out.push_str(name),
            ExprKind::Assign { op, target, value } => {
                self.expr(target, precedence::ASSIGN + 1);
                self.out.push(' ');
                self.out.push_str(op.symbol());
                self.out.push(' ');
                self.expr(value, precedence::ASSIGN);
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.expr(cond, precedence::TERNARY + 1);
                self.out.push_str(" ? ");
                self.expr(then_expr, precedence::ASSIGN);
                self.out.push_str(" : ");
                self.expr(else_expr, precedence::ASSIGN);
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.expr(lhs, op.precedence());
                self.out.push(' ');
                self.out.push_str(op.symbol());
                self.out.push(' ');
                self.expr(rhs, op.precedence() + 1);
            }
            ExprKind::Unary { op, operand } => {
                self.out.push_str(op.symbol());
                // `- -x` must not print as `--x`.
                let start = self.out.len();
                self.expr(operand, precedence::UNARY);
                if *op == UnaryOp::Neg && self.out[start..].starts_with('-') {
                    self.out.insert(start, ' ');
                }
            }
            ExprKind::Increment {
                op,
                prefix: true,
                target,
            } => {
                self.out.push_str(op.symbol());
                self.expr(target, precedence::UNARY);
            }
            ExprKind::Increment {
                op,
                prefix: false,
                target,
            } => {
                self.expr(target, precedence::POSTFIX);
                self.out.push_str(op.symbol());
            }
            ExprKind::Call { callee, args } => {
                self.out.push_str(&callee.name);
                self.out.push('(');
                self.expr_list(args);
                self.out.push(')');
            }
            ExprKind::Index { target, index } => {
                self.expr(target, precedence::POSTFIX);
                self.out.push('[');
                self.expr(index, precedence::ASSIGN);
                self.out.push(']');
            }
            ExprKind::Length(target) => {
                self.expr(target, precedence::POSTFIX);
                self.out.push_str(".Length");
            }
            ExprKind::NewArray { elem, size } => {
                self.out.push_str("new ");
                self.out.push_str(elem.base.keyword());
                self.out.push('[');
                self.expr(size, precedence::ASSIGN);
                self.out.push(']');
                for _ in 0..elem.rank {
                    self.out.push_str("[]");
                }
            }
            ExprKind::ArrayLiteral { elem, items } => {
                self.out.push_str("new ");
                self.out.push_str(&print_type(elem));
                self.out.push_str("[] { ");
                self.expr_list(items);
                self.out.push_str(if items.is_empty() { "}" } else { " }" });
            }
            ExprKind::Probe(probe) => self.probe_expr(probe),
        }
    }

    fn probe_expr(&mut self, probe: &ProbeExpr) {
        let name = match &probe.kind {
            ProbeExprKind::Record { .. } => probe_names::RECORD,
            ProbeExprKind::Return { .. } => probe_names::RETURN,
            ProbeExprKind::Postfix { .. } => probe_names::POSTFIX,
        };
        self.out
            .push_str(&format!("{name}({}, {}, ", probe.submission, probe.id));
        match &probe.kind {
            ProbeExprKind::Record { name, value } => {
                self.out.push_str(&escape_str(name));
                self.out.push_str(", ");
                self.expr(value, precedence::ASSIGN);
            }
            ProbeExprKind::Return { value } => self.expr(value, precedence::ASSIGN),
            ProbeExprKind::Postfix {
                name,
                increment,
                current,
            } => {
                self.expr(increment, precedence::ASSIGN);
                self.out.push_str(", ");
                self.out.push_str(&escape_str(name));
                self.out.push_str(", ");
                self.expr(current, precedence::ASSIGN);
            }
        }
        self.out.push(')');
    }
}
