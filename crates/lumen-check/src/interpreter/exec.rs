//! Statement and expression walking for one execution context.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use lumen_core::ast::{
    AssignOp, BinaryOp, Block, Expr, ExprKind, ForInit, IncDec, Literal, LocalDecl, ProbeExpr,
    ProbeExprKind, ProbeStmt, ProbeStmtKind, Stmt, StmtKind, TypeRef,
};
use lumen_core::id::{ExecutionContextId, OperationId, SourceIndex, SubmissionId};
use lumen_core::operation::{Arguments, StateChange};
use lumen_core::span::Span;
use lumen_trace::{CancelReason, ProbeSite};

use super::error::{ExecError, RuntimeError, RuntimeErrorKind};
use super::eval::{self, Overflow};
use super::state::Shared;
use super::value::{ArrayRef, Value};
use crate::builtins::Builtin;
use crate::program::LinkedMethod;

/// A variable: its declared type and current value.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    ty: TypeRef,
    value: Value,
}

impl Slot {
    /// Declares a slot, coercing `value` to `ty`. A `var` slot accepts any
    /// value.
    fn new(ty: TypeRef, value: Value) -> Result<Slot, RuntimeErrorKind> {
        let value = value.coerce_to(&ty)?;
        Ok(Slot { ty, value })
    }

    fn assign(&mut self, value: Value) -> Result<Value, RuntimeErrorKind> {
        let value = value.coerce_to(&self.ty)?;
        self.value = value.clone();
        Ok(value)
    }
}

/// How control leaves a statement.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Locals of one method activation.
struct Frame<'p> {
    method: &'p str,
    source: SourceIndex,
    depth: usize,
    scopes: Vec<HashMap<String, Slot>>,
    unsafe_depth: u32,
}

impl<'p> Frame<'p> {
    fn new(method: &'p str, source: SourceIndex, depth: usize) -> Self {
        Frame {
            method,
            source,
            depth,
            scopes: vec![HashMap::new()],
            unsafe_depth: 0,
        }
    }

    fn overflow(&self) -> Overflow {
        if self.unsafe_depth > 0 {
            Overflow::Wrapping
        } else {
            Overflow::Checked
        }
    }

    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, slot: Slot) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), slot);
        }
    }

    fn local(&mut self, name: &str) -> Option<&mut Slot> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
    }

    /// Builds the error for a failure at `span` in this frame.
    fn error(&self, span: Span) -> impl Fn(RuntimeErrorKind) -> ExecError + '_ {
        move |kind| {
            ExecError::Runtime(RuntimeError {
                kind,
                method: self.method.to_string(),
                source_index: self.source,
                span,
            })
        }
    }
}

/// One thread of control in a run.
pub(crate) struct Context {
    shared: Arc<Shared>,
    id: ExecutionContextId,
}

impl Context {
    pub(crate) fn new(shared: Arc<Shared>, id: ExecutionContextId) -> Self {
        Context { shared, id }
    }

    fn site(&self, submission: SubmissionId, id: OperationId) -> ProbeSite {
        ProbeSite::new(self.id, submission, id)
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Runs every static initializer in link order.
    pub(crate) fn init_statics(&self) -> Result<(), ExecError> {
        let program = Arc::clone(&self.shared.program);
        for field in &program.statics {
            for declarator in &field.decl.decl.declarators {
                let mut frame = Frame::new(&declarator.name.name, field.source, 0);
                let ty = field.decl.decl.ty;
                let value = match &declarator.init {
                    Some(init) => self.eval(&mut frame, init)?,
                    None => Value::default_for(&ty),
                };
                let slot = Slot::new(ty, value).map_err(frame.error(declarator.span))?;
                self.shared
                    .statics
                    .lock()
                    .insert(declarator.name.name.clone(), slot);
            }
        }
        Ok(())
    }

    /// Runs `name` as the outermost call of this context.
    pub(crate) fn run_method(&self, name: &str, args: Vec<Value>) -> Result<Value, ExecError> {
        let program = Arc::clone(&self.shared.program);
        let method = program.method(name).ok_or_else(|| {
            ExecError::Runtime(RuntimeError {
                kind: RuntimeErrorKind::MethodNotFound {
                    name: name.to_string(),
                },
                method: name.to_string(),
                source_index: SourceIndex(0),
                span: Span::default(),
            })
        })?;
        self.invoke(method, args, 0)
    }

    fn invoke(
        &self,
        method: &LinkedMethod,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, ExecError> {
        let decl = &method.decl;
        let mut frame = Frame::new(&decl.name.name, method.source, depth);
        if args.len() != decl.params.len() {
            return Err(frame.error(decl.name.span)(RuntimeErrorKind::Internal {
                message: format!(
                    "'{}' called with {} arguments, expected {}",
                    decl.name.name,
                    args.len(),
                    decl.params.len()
                ),
            }));
        }
        for (param, arg) in decl.params.iter().zip(args) {
            let slot = Slot::new(param.ty, arg).map_err(frame.error(param.span))?;
            frame.declare(&param.name.name, slot);
        }

        let value = match self.exec_block(&mut frame, &decl.body)? {
            Flow::Return(value) => value,
            Flow::Normal | Flow::Break | Flow::Continue => Value::Unit,
        };
        if decl.return_type.is_void() {
            return Ok(Value::Unit);
        }
        let value = value
            .coerce_to(&decl.return_type)
            .map_err(frame.error(decl.name.span))?;
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn exec_block(&self, frame: &mut Frame<'_>, block: &Block) -> Result<Flow, ExecError> {
        frame.push();
        let flow = self.exec_stmts(frame, &block.stmts);
        frame.pop();
        flow
    }

    fn exec_stmts(&self, frame: &mut Frame<'_>, stmts: &[Stmt]) -> Result<Flow, ExecError> {
        for stmt in stmts {
            match self.exec_stmt(frame, stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    /// Runs a branch or loop body in its own scope.
    fn exec_body(&self, frame: &mut Frame<'_>, stmt: &Stmt) -> Result<Flow, ExecError> {
        frame.push();
        let flow = self.exec_stmt(frame, stmt);
        frame.pop();
        flow
    }

    fn condition(&self, frame: &mut Frame<'_>, cond: &Expr) -> Result<bool, ExecError> {
        let value = self.eval(frame, cond)?;
        eval::truthy(&value).map_err(frame.error(cond.span))
    }

    /// Stops a loop when another context has already failed.
    fn checkpoint(&self) -> Result<(), ExecError> {
        if self.shared.is_halted() {
            return Err(ExecError::Canceled(CancelReason::Requested));
        }
        Ok(())
    }

    fn exec_stmt(&self, frame: &mut Frame<'_>, stmt: &Stmt) -> Result<Flow, ExecError> {
        match &stmt.kind {
            StmtKind::Block(block) => self.exec_block(frame, block),
            StmtKind::Local(decl) => {
                self.exec_local(frame, decl)?;
                Ok(Flow::Normal)
            }
            StmtKind::Expr(expr) => {
                self.eval(frame, expr)?;
                Ok(Flow::Normal)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.condition(frame, cond)? {
                    self.exec_body(frame, then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_body(frame, else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { cond, body } => {
                loop {
                    self.checkpoint()?;
                    if !self.condition(frame, cond)? {
                        break;
                    }
                    match self.exec_body(frame, body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::DoWhile { body, cond } => {
                loop {
                    self.checkpoint()?;
                    match self.exec_body(frame, body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.condition(frame, cond)? {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                frame.push();
                let flow = self.exec_for(frame, init.as_ref(), cond.as_ref(), update, body);
                frame.pop();
                flow
            }
            StmtKind::Foreach {
                ty,
                var,
                iterable,
                body,
            } => {
                let items = match self.eval(frame, iterable)? {
                    Value::Array(array) => array.snapshot(),
                    Value::Str(text) => text.chars().map(Value::Char).collect(),
                    Value::Null => {
                        return Err(frame.error(iterable.span)(RuntimeErrorKind::NullReference))
                    }
                    other => {
                        return Err(frame.error(iterable.span)(RuntimeErrorKind::TypeMismatch {
                            expected: "array or string".to_string(),
                            found: other.type_name().to_string(),
                        }))
                    }
                };
                for item in items {
                    self.checkpoint()?;
                    let slot = Slot::new(*ty, item).map_err(frame.error(var.span))?;
                    frame.push();
                    frame.declare(&var.name, slot);
                    let flow = self.exec_stmt(frame, body);
                    frame.pop();
                    match flow? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::Unit,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Unsafe(block) => {
                frame.unsafe_depth += 1;
                let flow = self.exec_block(frame, block);
                frame.unsafe_depth -= 1;
                flow
            }
            StmtKind::Spawn(call) => {
                self.spawn(frame, call)?;
                Ok(Flow::Normal)
            }
            StmtKind::Empty => Ok(Flow::Normal),
            StmtKind::Probe(probe) => {
                self.exec_probe(frame, probe)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_local(&self, frame: &mut Frame<'_>, decl: &LocalDecl) -> Result<(), ExecError> {
        for declarator in &decl.declarators {
            let value = match &declarator.init {
                Some(init) => self.eval(frame, init)?,
                None => Value::default_for(&decl.ty),
            };
            let slot = Slot::new(decl.ty, value).map_err(frame.error(declarator.span))?;
            frame.declare(&declarator.name.name, slot);
        }
        Ok(())
    }

    fn exec_for(
        &self,
        frame: &mut Frame<'_>,
        init: Option<&ForInit>,
        cond: Option<&Expr>,
        update: &[Expr],
        body: &Stmt,
    ) -> Result<Flow, ExecError> {
        match init {
            Some(ForInit::Local(decl)) => self.exec_local(frame, decl)?,
            Some(ForInit::Exprs(exprs)) => {
                for expr in exprs {
                    self.eval(frame, expr)?;
                }
            }
            None => {}
        }
        loop {
            self.checkpoint()?;
            if let Some(cond) = cond {
                if !self.condition(frame, cond)? {
                    break;
                }
            }
            match self.exec_body(frame, body)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            for expr in update {
                self.eval(frame, expr)?;
            }
        }
        Ok(Flow::Normal)
    }

    /// Starts `call` on a new execution context. Arguments are evaluated
    /// here, in the spawning context.
    fn spawn(&self, frame: &mut Frame<'_>, call: &Expr) -> Result<(), ExecError> {
        let ExprKind::Call { callee, args } = &call.kind else {
            return Err(frame.error(call.span)(RuntimeErrorKind::Internal {
                message: "spawn target is not a call".to_string(),
            }));
        };
        let args = self.eval_args(frame, args)?;
        if self.shared.program.method(&callee.name).is_none() {
            return Err(frame.error(callee.span)(RuntimeErrorKind::MethodNotFound {
                name: callee.name.clone(),
            }));
        }

        let shared = Arc::clone(&self.shared);
        let context = shared.next_context();
        let name = callee.name.clone();
        let handle = thread::Builder::new()
            .name(format!("lumen-context-{context}"))
            .stack_size(shared.config.thread_stack_size)
            .spawn(move || {
                let worker = Context::new(shared, context);
                if let Err(error) = worker.run_method(&name, args) {
                    worker.shared.fail(error);
                }
            })
            .map_err(|error| {
                frame.error(call.span)(RuntimeErrorKind::Internal {
                    message: format!("failed to start execution context: {error}"),
                })
            })?;
        tracing::debug!(%context, method = %callee.name, "spawned execution context");
        self.shared
            .spawned
            .lock()
            .push((callee.name.clone(), handle));
        Ok(())
    }

    fn exec_probe(&self, frame: &mut Frame<'_>, probe: &ProbeStmt) -> Result<(), ExecError> {
        let site = self.site(probe.submission, probe.id);
        let sink = &self.shared.sink;
        match &probe.kind {
            ProbeStmtKind::Enter { method, args } => {
                let mut snapshot = Arguments::new();
                for arg in args {
                    let value = self.eval(frame, &arg.value)?;
                    snapshot.push(StateChange {
                        id: arg.id,
                        variable: arg.name.clone(),
                        value: value.display(),
                    });
                }
                sink.begin_method(site, method, snapshot)?;
            }
            ProbeStmtKind::BeginLoop => sink.begin_loop(site)?,
            ProbeStmtKind::EndLoop => sink.end_loop(site)?,
            ProbeStmtKind::BeginIteration => sink.begin_iteration(site)?,
            ProbeStmtKind::EndIteration => sink.end_iteration(site)?,
            ProbeStmtKind::Return => sink.record_return(site, None)?,
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn eval_args(&self, frame: &mut Frame<'_>, args: &[Expr]) -> Result<Vec<Value>, ExecError> {
        args.iter().map(|arg| self.eval(frame, arg)).collect()
    }

    fn eval(&self, frame: &mut Frame<'_>, expr: &Expr) -> Result<Value, ExecError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Int(i) => Value::Int(*i),
                Literal::Double(d) => Value::Double(*d),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Str(s) => Value::str(s),
                Literal::Char(c) => Value::Char(*c),
            }),
            ExprKind::Ident(name) => self.load(frame, name, span),
            ExprKind::Assign { op, target, value } => self.assign(frame, *op, target, value),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                if self.condition(frame, cond)? {
                    self.eval(frame, then_expr)
                } else {
                    self.eval(frame, else_expr)
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                if matches!(op, BinaryOp::And | BinaryOp::Or) {
                    let left = self.condition(frame, lhs)?;
                    if left == (*op == BinaryOp::Or) {
                        return Ok(Value::Bool(left));
                    }
                    return self.condition(frame, rhs).map(Value::Bool);
                }
                let left = self.eval(frame, lhs)?;
                let right = self.eval(frame, rhs)?;
                eval::binary(*op, &left, &right, frame.overflow()).map_err(frame.error(span))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(frame, operand)?;
                eval::unary(*op, &value, frame.overflow()).map_err(frame.error(span))
            }
            ExprKind::Increment { op, prefix, target } => {
                self.increment(frame, *op, *prefix, target)
            }
            ExprKind::Call { callee, args } => {
                let args = self.eval_args(frame, args)?;
                if let Some(builtin) = Builtin::from_name(&callee.name) {
                    if builtin == Builtin::Print {
                        let line: Vec<String> = args.iter().map(Value::to_text).collect();
                        self.shared.print(self.id, line.join(" "));
                        return Ok(Value::Unit);
                    }
                    return eval::builtin(builtin, &args, frame.overflow())
                        .map_err(frame.error(span));
                }
                let program = Arc::clone(&self.shared.program);
                let method = program.method(&callee.name).ok_or_else(|| {
                    frame.error(callee.span)(RuntimeErrorKind::MethodNotFound {
                        name: callee.name.clone(),
                    })
                })?;
                let limit = self.shared.config.max_call_depth;
                if frame.depth + 1 > limit {
                    return Err(frame.error(span)(RuntimeErrorKind::CallDepthExceeded { limit }));
                }
                self.invoke(method, args, frame.depth + 1)
            }
            ExprKind::Index { target, index } => {
                let container = self.eval(frame, target)?;
                let index_value = self.eval(frame, index)?;
                let i = eval::integer(&index_value).map_err(frame.error(index.span))?;
                match container {
                    Value::Array(array) => array.get(i).map_err(frame.error(span)),
                    Value::Str(text) => {
                        let length = text.chars().count();
                        usize::try_from(i)
                            .ok()
                            .and_then(|at| text.chars().nth(at))
                            .map(Value::Char)
                            .ok_or_else(|| {
                                frame.error(span)(RuntimeErrorKind::IndexOutOfRange {
                                    index: i,
                                    length,
                                })
                            })
                    }
                    other => Err(frame.error(target.span)(not_indexable(&other))),
                }
            }
            ExprKind::Length(target) => match self.eval(frame, target)? {
                Value::Array(array) => Ok(Value::Int(array.len() as i64)),
                Value::Str(text) => Ok(Value::Int(text.chars().count() as i64)),
                other => Err(frame.error(target.span)(not_indexable(&other))),
            },
            ExprKind::NewArray { elem, size } => {
                let size_value = self.eval(frame, size)?;
                let n = eval::integer(&size_value).map_err(frame.error(size.span))?;
                let limit = self.shared.config.max_array_length;
                let length = usize::try_from(n).map_err(|_| {
                    frame.error(size.span)(RuntimeErrorKind::NegativeArraySize { size: n })
                })?;
                if length > limit {
                    return Err(frame.error(size.span)(RuntimeErrorKind::ArrayTooLarge {
                        size: n,
                        limit,
                    }));
                }
                let items = vec![Value::default_for(elem); length];
                Ok(Value::Array(ArrayRef::new(*elem, items)))
            }
            ExprKind::ArrayLiteral { elem, items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval(frame, item)?;
                    values.push(value.coerce_to(elem).map_err(frame.error(item.span))?);
                }
                Ok(Value::Array(ArrayRef::new(*elem, values)))
            }
            ExprKind::Probe(probe) => self.eval_probe(frame, probe),
        }
    }

    fn eval_probe(&self, frame: &mut Frame<'_>, probe: &ProbeExpr) -> Result<Value, ExecError> {
        let site = self.site(probe.submission, probe.id);
        let sink = &self.shared.sink;
        match &probe.kind {
            ProbeExprKind::Record { name, value } => {
                let value = self.eval(frame, value)?;
                sink.record_value(site, name, value.display())?;
                Ok(value)
            }
            ProbeExprKind::Return { value } => {
                let value = self.eval(frame, value)?;
                sink.record_return(site, Some(value.display()))?;
                Ok(value)
            }
            ProbeExprKind::Postfix {
                name,
                increment,
                current,
            } => {
                let original = self.eval(frame, increment)?;
                let updated = self.eval(frame, current)?;
                sink.record_postfix(site, name, updated.display())?;
                Ok(original)
            }
        }
    }

    fn load(&self, frame: &mut Frame<'_>, name: &str, span: Span) -> Result<Value, ExecError> {
        if let Some(slot) = frame.local(name) {
            return Ok(slot.value.clone());
        }
        if let Some(slot) = self.shared.statics.lock().get(name) {
            return Ok(slot.value.clone());
        }
        Err(frame.error(span)(RuntimeErrorKind::UndefinedVariable {
            name: name.to_string(),
        }))
    }

    fn store(
        &self,
        frame: &mut Frame<'_>,
        name: &str,
        value: Value,
        span: Span,
    ) -> Result<Value, ExecError> {
        let stored = if let Some(slot) = frame.local(name) {
            slot.assign(value)
        } else if let Some(slot) = self.shared.statics.lock().get_mut(name) {
            slot.assign(value)
        } else {
            Err(RuntimeErrorKind::UndefinedVariable {
                name: name.to_string(),
            })
        };
        stored.map_err(frame.error(span))
    }

    /// Evaluates the array and index of an element target, once.
    fn element(
        &self,
        frame: &mut Frame<'_>,
        target: &Expr,
        index: &Expr,
    ) -> Result<(ArrayRef, i64), ExecError> {
        let container = self.eval(frame, target)?;
        let index_value = self.eval(frame, index)?;
        let i = eval::integer(&index_value).map_err(frame.error(index.span))?;
        match container {
            Value::Array(array) => Ok((array, i)),
            other => Err(frame.error(target.span)(not_indexable(&other))),
        }
    }

    fn assign(
        &self,
        frame: &mut Frame<'_>,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
    ) -> Result<Value, ExecError> {
        match &target.kind {
            ExprKind::Ident(name) => {
                let new = match op.binary() {
                    None => self.eval(frame, value)?,
                    Some(binary) => {
                        let current = self.load(frame, name, target.span)?;
                        let rhs = self.eval(frame, value)?;
                        eval::binary(binary, &current, &rhs, frame.overflow())
                            .map_err(frame.error(value.span))?
                    }
                };
                self.store(frame, name, new, target.span)
            }
            ExprKind::Index {
                target: array,
                index,
            } => {
                let (array, i) = self.element(frame, array, index)?;
                let new = match op.binary() {
                    None => self.eval(frame, value)?,
                    Some(binary) => {
                        let current = array.get(i).map_err(frame.error(target.span))?;
                        let rhs = self.eval(frame, value)?;
                        eval::binary(binary, &current, &rhs, frame.overflow())
                            .map_err(frame.error(value.span))?
                    }
                };
                let new = new.coerce_to(array.elem()).map_err(frame.error(target.span))?;
                array.set(i, new.clone()).map_err(frame.error(target.span))?;
                Ok(new)
            }
            _ => Err(frame.error(target.span)(RuntimeErrorKind::Internal {
                message: "invalid assignment target".to_string(),
            })),
        }
    }

    fn increment(
        &self,
        frame: &mut Frame<'_>,
        op: IncDec,
        prefix: bool,
        target: &Expr,
    ) -> Result<Value, ExecError> {
        let span = target.span;
        let (old, new) = match &target.kind {
            ExprKind::Ident(name) => {
                let old = self.load(frame, name, span)?;
                let new = eval::step(&old, op, frame.overflow()).map_err(frame.error(span))?;
                let new = self.store(frame, name, new, span)?;
                (old, new)
            }
            ExprKind::Index {
                target: array,
                index,
            } => {
                let (array, i) = self.element(frame, array, index)?;
                let old = array.get(i).map_err(frame.error(span))?;
                let new = eval::step(&old, op, frame.overflow()).map_err(frame.error(span))?;
                array.set(i, new.clone()).map_err(frame.error(span))?;
                (old, new)
            }
            _ => {
                return Err(frame.error(span)(RuntimeErrorKind::Internal {
                    message: "invalid increment target".to_string(),
                }))
            }
        };
        Ok(if prefix { new } else { old })
    }
}

fn not_indexable(value: &Value) -> RuntimeErrorKind {
    match value {
        Value::Null => RuntimeErrorKind::NullReference,
        other => RuntimeErrorKind::TypeMismatch {
            expected: "array or string".to_string(),
            found: other.type_name().to_string(),
        },
    }
}
