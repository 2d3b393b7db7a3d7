//! Compile-time checks over a whole project.
//!
//! This is name resolution and structural validation only; the language has
//! no static type system. Everything reported here as an error would stop
//! the program from compiling, so nothing is instrumented or run until the
//! diagnostics are clean.

use std::collections::{HashMap, HashSet};

use lumen_core::ast::{
    probe_names, BaseType, Block, CompilationUnit, Declarator, Expr, ExprKind, ForInit, Ident,
    Item, LocalDecl, MethodDecl, ProbeExprKind, ProbeStmt, ProbeStmtKind, Stmt, StmtKind, TypeRef,
};
use lumen_core::id::SourceIndex;
use lumen_core::span::Span;

use crate::builtins::Builtin;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::flow;
use crate::program::ENTRY_POINT;

/// Switches that change what the checker accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Accept `unsafe { ... }` blocks.
    pub allow_unsafe: bool,
    /// Accept probe forms. Set when checking instrumented output.
    pub allow_probes: bool,
}

/// Statements run as the body of a parameterless `void` entry method.
#[derive(Debug, Clone, Copy)]
pub struct EntryBody<'a> {
    pub source: SourceIndex,
    pub stmts: &'a [Stmt],
}

/// Checks every unit together, plus an optional entry body that may call
/// into them. Returns diagnostics in source order per unit.
pub fn check_program(
    units: &[(SourceIndex, &CompilationUnit)],
    entry: Option<EntryBody<'_>>,
    options: CheckOptions,
) -> Vec<Diagnostic> {
    let mut checker = Checker {
        options,
        methods: HashMap::new(),
        statics: HashSet::new(),
        diagnostics: Vec::new(),
    };
    checker.collect_items(units);

    for (source, unit) in units {
        for item in &unit.items {
            match item {
                Item::Method(method) => checker.check_method(*source, method),
                Item::Static(field) => {
                    let mut scope = MethodScope::new(*source, "", VOID);
                    for declarator in &field.decl.declarators {
                        if let Some(init) = &declarator.init {
                            checker.check_expr(&mut scope, init);
                        }
                    }
                }
            }
        }
    }

    if let Some(entry) = entry {
        let mut scope = MethodScope::new(entry.source, ENTRY_POINT, VOID);
        scope.push();
        checker.check_statements(&mut scope, entry.stmts);
    }
    checker.diagnostics
}

/// Checks a single unit on its own.
pub fn check_unit(unit: &CompilationUnit, options: CheckOptions) -> Vec<Diagnostic> {
    check_program(&[(SourceIndex(0), unit)], None, options)
}

/// Return type of static initializers and the entry body.
const VOID: TypeRef = TypeRef {
    base: BaseType::Void,
    rank: 0,
    span: Span { start: 0, end: 0 },
};

struct Checker {
    options: CheckOptions,
    /// Declared methods by name, with their parameter counts.
    methods: HashMap<String, usize>,
    statics: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

/// Name resolution state for one method body.
struct MethodScope<'m> {
    source: SourceIndex,
    method: &'m str,
    return_type: TypeRef,
    scopes: Vec<HashSet<String>>,
    loop_depth: usize,
}

impl<'m> MethodScope<'m> {
    fn new(source: SourceIndex, method: &'m str, return_type: TypeRef) -> Self {
        MethodScope {
            source,
            method,
            return_type,
            scopes: Vec::new(),
            loop_depth: 0,
        }
    }

    fn push(&mut self) {
        self.scopes.push(HashSet::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    /// Declares `name` in the innermost scope. Locals may not shadow other
    /// locals or parameters; returns `false` on a clash.
    fn declare(&mut self, name: &str) -> bool {
        if self.is_local(name) {
            return false;
        }
        match self.scopes.last_mut() {
            Some(scope) => scope.insert(name.to_string()),
            None => false,
        }
    }
}

impl Checker {
    fn report(&mut self, source: SourceIndex, span: Span, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic::new(source, span, kind));
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    fn collect_items(&mut self, units: &[(SourceIndex, &CompilationUnit)]) {
        for (source, unit) in units {
            for item in &unit.items {
                match item {
                    Item::Method(method) => {
                        let name = &method.name;
                        self.check_name(*source, name);
                        if Builtin::from_name(&name.name).is_some() {
                            self.report(
                                *source,
                                name.span,
                                DiagnosticKind::BuiltinRedefined {
                                    name: name.name.clone(),
                                },
                            );
                        } else if self.methods.contains_key(&name.name) {
                            self.report(
                                *source,
                                name.span,
                                DiagnosticKind::DuplicateMethod {
                                    name: name.name.clone(),
                                },
                            );
                        } else {
                            self.methods.insert(name.name.clone(), method.params.len());
                        }
                    }
                    Item::Static(field) => {
                        self.check_local_decl_shape(*source, &field.decl);
                        for declarator in &field.decl.declarators {
                            if !self.statics.insert(declarator.name.name.clone()) {
                                self.report(
                                    *source,
                                    declarator.name.span,
                                    DiagnosticKind::DuplicateVariable {
                                        name: declarator.name.name.clone(),
                                    },
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    fn check_name(&mut self, source: SourceIndex, name: &Ident) {
        if probe_names::is_reserved(&name.name) {
            self.report(
                source,
                name.span,
                DiagnosticKind::ReservedName {
                    name: name.name.clone(),
                },
            );
        }
    }

    /// Declaration rules shared by statics and locals.
    fn check_local_decl_shape(&mut self, source: SourceIndex, decl: &LocalDecl) {
        for declarator in &decl.declarators {
            self.check_name(source, &declarator.name);
            if decl.ty.is_void() {
                self.report(
                    source,
                    declarator.name.span,
                    DiagnosticKind::VoidVariable {
                        name: declarator.name.name.clone(),
                    },
                );
            }
            if decl.ty.base == BaseType::Var && declarator.init.is_none() {
                self.report(
                    source,
                    declarator.name.span,
                    DiagnosticKind::ImplicitlyTypedWithoutInit {
                        name: declarator.name.name.clone(),
                    },
                );
            }
        }
    }

    fn check_method(&mut self, source: SourceIndex, method: &MethodDecl) {
        let mut scope = MethodScope::new(source, &method.name.name, method.return_type);
        scope.push();
        for param in &method.params {
            self.check_name(source, &param.name);
            if param.ty.is_void() || param.ty.base == BaseType::Var {
                self.report(
                    source,
                    param.name.span,
                    DiagnosticKind::VoidVariable {
                        name: param.name.name.clone(),
                    },
                );
            }
            if !scope.declare(&param.name.name) {
                self.report(
                    source,
                    param.name.span,
                    DiagnosticKind::DuplicateVariable {
                        name: param.name.name.clone(),
                    },
                );
            }
        }

        self.check_block(&mut scope, &method.body);

        if !method.return_type.is_void() && flow::block_can_complete(&method.body) {
            self.report(
                source,
                method.name.span,
                DiagnosticKind::NotAllPathsReturn {
                    name: method.name.name.clone(),
                },
            );
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn check_block(&mut self, scope: &mut MethodScope<'_>, block: &Block) {
        scope.push();
        self.check_statements(scope, &block.stmts);
        scope.pop();
    }

    fn check_statements(&mut self, scope: &mut MethodScope<'_>, stmts: &[Stmt]) {
        let mut reachable = true;
        let mut warned = false;
        for stmt in stmts {
            if !reachable && !warned && !matches!(stmt.kind, StmtKind::Empty) {
                self.report(scope.source, stmt.span, DiagnosticKind::UnreachableCode);
                warned = true;
            }
            self.check_stmt(scope, stmt);
            reachable = reachable && flow::can_complete(stmt);
        }
    }

    /// Checks a loop or branch body, which gets its own scope.
    fn check_body(&mut self, scope: &mut MethodScope<'_>, stmt: &Stmt) {
        scope.push();
        self.check_stmt(scope, stmt);
        scope.pop();
    }

    fn check_loop_body(&mut self, scope: &mut MethodScope<'_>, stmt: &Stmt) {
        scope.loop_depth += 1;
        self.check_body(scope, stmt);
        scope.loop_depth -= 1;
    }

    fn check_stmt(&mut self, scope: &mut MethodScope<'_>, stmt: &Stmt) {
        let source = scope.source;
        match &stmt.kind {
            StmtKind::Block(block) => self.check_block(scope, block),
            StmtKind::Local(decl) => self.check_local(scope, decl),
            StmtKind::Expr(expr) => {
                let allowed = matches!(
                    expr.kind,
                    ExprKind::Assign { .. }
                        | ExprKind::Call { .. }
                        | ExprKind::Increment { .. }
                        | ExprKind::Probe(_)
                );
                if !allowed {
                    self.report(source, expr.span, DiagnosticKind::InvalidStatement);
                }
                self.check_expr(scope, expr);
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_expr(scope, cond);
                self.check_body(scope, then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_body(scope, else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_expr(scope, cond);
                self.check_loop_body(scope, body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.check_loop_body(scope, body);
                self.check_expr(scope, cond);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                scope.push();
                match init {
                    Some(ForInit::Local(decl)) => self.check_local(scope, decl),
                    Some(ForInit::Exprs(exprs)) => {
                        for expr in exprs {
                            self.check_expr(scope, expr);
                        }
                    }
                    None => {}
                }
                if let Some(cond) = cond {
                    self.check_expr(scope, cond);
                }
                for expr in update {
                    self.check_expr(scope, expr);
                }
                self.check_loop_body(scope, body);
                scope.pop();
            }
            StmtKind::Foreach {
                ty,
                var,
                iterable,
                body,
            } => {
                self.check_expr(scope, iterable);
                scope.push();
                self.check_name(source, var);
                if ty.is_void() {
                    self.report(
                        source,
                        var.span,
                        DiagnosticKind::VoidVariable {
                            name: var.name.clone(),
                        },
                    );
                }
                self.declare(scope, var);
                self.check_loop_body(scope, body);
                scope.pop();
            }
            StmtKind::Break => {
                if scope.loop_depth == 0 {
                    self.report(source, stmt.span, DiagnosticKind::BreakOutsideLoop);
                }
            }
            StmtKind::Continue => {
                if scope.loop_depth == 0 {
                    self.report(source, stmt.span, DiagnosticKind::ContinueOutsideLoop);
                }
            }
            StmtKind::Return(value) => {
                let name = scope.method.to_string();
                match (value, scope.return_type.is_void()) {
                    (Some(value), true) => {
                        self.report(
                            source,
                            value.span,
                            DiagnosticKind::ReturnValueFromVoid { name },
                        );
                        self.check_expr(scope, value);
                    }
                    (Some(value), false) => self.check_expr(scope, value),
                    (None, false) => {
                        self.report(source, stmt.span, DiagnosticKind::MissingReturnValue { name });
                    }
                    (None, true) => {}
                }
            }
            StmtKind::Unsafe(block) => {
                if !self.options.allow_unsafe {
                    self.report(source, stmt.span, DiagnosticKind::UnsafeNotAllowed);
                }
                self.check_block(scope, block);
            }
            StmtKind::Spawn(call) => {
                let user_method = match &call.kind {
                    ExprKind::Call { callee, .. } => self.methods.contains_key(&callee.name),
                    _ => false,
                };
                if !user_method {
                    self.report(source, call.span, DiagnosticKind::SpawnTarget);
                }
                self.check_expr(scope, call);
            }
            StmtKind::Empty => {}
            StmtKind::Probe(probe) => self.check_probe_stmt(scope, stmt.span, probe),
        }
    }

    fn check_local(&mut self, scope: &mut MethodScope<'_>, decl: &LocalDecl) {
        self.check_local_decl_shape(scope.source, decl);
        for declarator in &decl.declarators {
            self.check_declarator(scope, declarator);
        }
    }

    fn check_declarator(&mut self, scope: &mut MethodScope<'_>, declarator: &Declarator) {
        if let Some(init) = &declarator.init {
            self.check_expr(scope, init);
        }
        self.declare(scope, &declarator.name);
    }

    fn declare(&mut self, scope: &mut MethodScope<'_>, name: &Ident) {
        if !scope.declare(&name.name) {
            self.report(
                scope.source,
                name.span,
                DiagnosticKind::DuplicateVariable {
                    name: name.name.clone(),
                },
            );
        }
    }

    fn check_probe_stmt(&mut self, scope: &mut MethodScope<'_>, span: Span, probe: &ProbeStmt) {
        if !self.options.allow_probes {
            self.report(scope.source, span, DiagnosticKind::ProbeNotAllowed);
        }
        if let ProbeStmtKind::Enter { args, .. } = &probe.kind {
            for arg in args {
                self.check_expr(scope, &arg.value);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn check_expr(&mut self, scope: &mut MethodScope<'_>, expr: &Expr) {
        let source = scope.source;
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Ident(name) => {
                if !scope.is_local(name) && !self.statics.contains(name) {
                    self.report(
                        source,
                        expr.span,
                        DiagnosticKind::UndefinedVariable { name: name.clone() },
                    );
                }
            }
            ExprKind::Assign { target, value, .. } => {
                self.check_expr(scope, target);
                self.check_expr(scope, value);
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.check_expr(scope, cond);
                self.check_expr(scope, then_expr);
                self.check_expr(scope, else_expr);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.check_expr(scope, lhs);
                self.check_expr(scope, rhs);
            }
            ExprKind::Unary { operand, .. } => self.check_expr(scope, operand),
            ExprKind::Increment { target, .. } => self.check_expr(scope, target),
            ExprKind::Call { callee, args } => {
                self.check_call(source, callee, args.len());
                for arg in args {
                    self.check_expr(scope, arg);
                }
            }
            ExprKind::Index { target, index } => {
                self.check_expr(scope, target);
                self.check_expr(scope, index);
            }
            ExprKind::Length(target) => self.check_expr(scope, target),
            ExprKind::NewArray { size, .. } => self.check_expr(scope, size),
            ExprKind::ArrayLiteral { items, .. } => {
                for item in items {
                    self.check_expr(scope, item);
                }
            }
            ExprKind::Probe(probe) => {
                if !self.options.allow_probes {
                    self.report(source, expr.span, DiagnosticKind::ProbeNotAllowed);
                }
                match &probe.kind {
                    ProbeExprKind::Record { value, .. } | ProbeExprKind::Return { value } => {
                        self.check_expr(scope, value)
                    }
                    ProbeExprKind::Postfix {
                        increment, current, ..
                    } => {
                        self.check_expr(scope, increment);
                        self.check_expr(scope, current);
                    }
                }
            }
        }
    }

    fn check_call(&mut self, source: SourceIndex, callee: &Ident, found: usize) {
        let expected = match Builtin::from_name(&callee.name) {
            Some(builtin) => builtin.arity(),
            None => match self.methods.get(&callee.name) {
                Some(count) => Some(*count),
                None => {
                    self.report(
                        source,
                        callee.span,
                        DiagnosticKind::UndefinedMethod {
                            name: callee.name.clone(),
                        },
                    );
                    return;
                }
            },
        };
        if let Some(expected) = expected {
            if expected != found {
                self.report(
                    source,
                    callee.span,
                    DiagnosticKind::ArgumentCount {
                        name: callee.name.clone(),
                        expected,
                        found,
                    },
                );
            }
        }
    }
}
