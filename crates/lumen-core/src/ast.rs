//! Syntax tree for Lumen source.
//!
//! The tree is a closed set of tagged variants. Passes (fix-up, rewriting,
//! checking, folding) match on these variants and build new nodes rather than
//! overriding visitor hooks. Probe nodes are ordinary variants so that
//! instrumented programs print, parse and run like any other source.

use serde::{Deserialize, Serialize};

use crate::id::{OperationId, SubmissionId};
use crate::span::Span;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One parsed source text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Method(MethodDecl),
    Static(StaticDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Ident {
            name: name.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub is_static: bool,
    pub return_type: TypeRef,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub ty: TypeRef,
    pub name: Ident,
    pub span: Span,
}

/// A top-level `static` field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticDecl {
    pub decl: LocalDecl,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    Int,
    Double,
    Bool,
    String,
    Char,
    Void,
    Var,
}

impl BaseType {
    pub fn keyword(self) -> &'static str {
        match self {
            BaseType::Int => "int",
            BaseType::Double => "double",
            BaseType::Bool => "bool",
            BaseType::String => "string",
            BaseType::Char => "char",
            BaseType::Void => "void",
            BaseType::Var => "var",
        }
    }
}

/// A written type: a base keyword plus an array rank (`int[][]` has rank 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub base: BaseType,
    pub rank: u8,
    pub span: Span,
}

impl TypeRef {
    pub fn is_array(&self) -> bool {
        self.rank > 0
    }

    pub fn is_void(&self) -> bool {
        self.base == BaseType::Void && self.rank == 0
    }

    /// The type of one element of this array type.
    pub fn element(&self) -> TypeRef {
        TypeRef {
            rank: self.rank.saturating_sub(1),
            ..*self
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }

    /// Wraps this statement in a block unless it already is one.
    pub fn into_block(self) -> Block {
        match self.kind {
            StmtKind::Block(block) => block,
            _ => Block {
                span: self.span,
                stmts: vec![self],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Block(Block),
    Local(LocalDecl),
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<ForInit>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
    },
    Foreach {
        ty: TypeRef,
        var: Ident,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Unsafe(Block),
    /// `spawn Call(args);` -- the expression is always a call.
    Spawn(Expr),
    Empty,
    Probe(ProbeStmt),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForInit {
    Local(LocalDecl),
    Exprs(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub ty: TypeRef,
    pub declarators: Vec<Declarator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declarator {
    pub name: Ident,
    pub init: Option<Expr>,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    pub fn ident(name: impl Into<String>, span: Span) -> Self {
        Expr::new(ExprKind::Ident(name.into()), span)
    }

    /// The variable name when this expression is a bare identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Whether the expression may appear on the left of `=` or under `++`.
    pub fn is_assignable(&self) -> bool {
        matches!(self.kind, ExprKind::Ident(_) | ExprKind::Index { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Char(char),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Increment {
        op: IncDec,
        prefix: bool,
        target: Box<Expr>,
    },
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// `expr.Length`
    Length(Box<Expr>),
    /// `new T[size]`; `elem` is the element type.
    NewArray {
        elem: TypeRef,
        size: Box<Expr>,
    },
    /// `new T[] { a, b }`; `elem` is the element type.
    ArrayLiteral {
        elem: TypeRef,
        items: Vec<Expr>,
    },
    Probe(ProbeExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, `None` for `=`.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
            AssignOp::BitAnd => Some(BinaryOp::BitAnd),
            AssignOp::BitOr => Some(BinaryOp::BitOr),
            AssignOp::BitXor => Some(BinaryOp::BitXor),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Binding strength of the expression forms, loosest first.
pub mod precedence {
    pub const ASSIGN: u8 = 1;
    pub const TERNARY: u8 = 2;
    pub const UNARY: u8 = 13;
    pub const POSTFIX: u8 = 14;
    pub const PRIMARY: u8 = 15;
}

impl BinaryOp {
    /// Binding strength; all binary operators are left-associative.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 3,
            BinaryOp::And => 4,
            BinaryOp::BitOr => 5,
            BinaryOp::BitXor => 6,
            BinaryOp::BitAnd => 7,
            BinaryOp::Eq | BinaryOp::Ne => 8,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 9,
            BinaryOp::Shl | BinaryOp::Shr => 10,
            BinaryOp::Add | BinaryOp::Sub => 11,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 12,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncDec {
    Increment,
    Decrement,
}

impl IncDec {
    pub fn symbol(self) -> &'static str {
        match self {
            IncDec::Increment => "++",
            IncDec::Decrement => "--",
        }
    }
}

impl ExprKind {
    /// Binding strength of this expression form, used by the printer.
    pub fn precedence(&self) -> u8 {
        match self {
            ExprKind::Assign { .. } => precedence::ASSIGN,
            ExprKind::Ternary { .. } => precedence::TERNARY,
            ExprKind::Binary { op, .. } => op.precedence(),
            ExprKind::Unary { .. } => precedence::UNARY,
            ExprKind::Increment { prefix: true, .. } => precedence::UNARY,
            ExprKind::Increment { prefix: false, .. }
            | ExprKind::Index { .. }
            | ExprKind::Length(_)
            | ExprKind::Call { .. } => precedence::POSTFIX,
            ExprKind::Literal(_)
            | ExprKind::Ident(_)
            | ExprKind::NewArray { .. }
            | ExprKind::ArrayLiteral { .. }
            | ExprKind::Probe(_) => precedence::PRIMARY,
        }
    }
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Reserved callee names for the probe forms.
pub mod probe_names {
    pub const ENTER: &str = "__enter";
    pub const BEGIN_LOOP: &str = "__begin_loop";
    pub const END_LOOP: &str = "__end_loop";
    pub const BEGIN_ITERATION: &str = "__begin_iter";
    pub const END_ITERATION: &str = "__end_iter";
    pub const RETURN: &str = "__return";
    pub const RECORD: &str = "__record";
    pub const POSTFIX: &str = "__postfix";

    /// Whether `name` is reserved for probes.
    pub fn is_reserved(name: &str) -> bool {
        name.starts_with("__")
    }
}

/// A probe in statement position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeStmt {
    pub submission: SubmissionId,
    pub id: OperationId,
    pub kind: ProbeStmtKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProbeStmtKind {
    /// Method prologue: name plus one argument descriptor per parameter.
    Enter { method: String, args: Vec<ProbeArg> },
    BeginLoop,
    EndLoop,
    BeginIteration,
    EndIteration,
    /// Exit from a method that returns no value.
    Return,
}

/// `[id, "name", value]` inside an `__enter` probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeArg {
    pub id: OperationId,
    pub name: String,
    pub value: Expr,
}

/// A probe in expression position. Every form evaluates to a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeExpr {
    pub submission: SubmissionId,
    pub id: OperationId,
    pub kind: ProbeExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProbeExprKind {
    /// Records `value` under `name` and yields it unchanged.
    Record { name: String, value: Box<Expr> },
    /// Records `value` as the method's return value and yields it.
    Return { value: Box<Expr> },
    /// Evaluates the postfix `increment`, then records `current` (the
    /// variable's new value) under `name`, and yields the increment's
    /// original result.
    Postfix {
        name: String,
        increment: Box<Expr>,
        current: Box<Expr>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_assign_maps_to_binary() {
        assert_eq!(AssignOp::Add.binary(), Some(BinaryOp::Add));
        assert_eq!(AssignOp::Shr.binary(), Some(BinaryOp::Shr));
        assert_eq!(AssignOp::Assign.binary(), None);
    }

    #[test]
    fn multiplicative_binds_tighter_than_additive() {
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
        assert!(precedence::UNARY > BinaryOp::Mul.precedence());
    }

    #[test]
    fn into_block_keeps_existing_block() {
        let inner = Block {
            stmts: vec![Stmt::new(StmtKind::Break, Span::new(2, 8))],
            span: Span::new(0, 10),
        };
        let stmt = Stmt::new(StmtKind::Block(inner.clone()), Span::new(0, 10));
        assert_eq!(stmt.into_block(), inner);
    }

    #[test]
    fn into_block_wraps_single_statement() {
        let stmt = Stmt::new(StmtKind::Continue, Span::new(3, 12));
        let block = stmt.clone().into_block();
        assert_eq!(block.stmts, vec![stmt]);
        assert_eq!(block.span, Span::new(3, 12));
    }

    #[test]
    fn array_element_type() {
        let ty = TypeRef {
            base: BaseType::Int,
            rank: 2,
            span: Span::default(),
        };
        assert_eq!(ty.element().rank, 1);
        assert!(ty.is_array());
        assert!(!ty.element().element().is_array());
    }

    #[test]
    fn reserved_probe_names() {
        assert!(probe_names::is_reserved(probe_names::RECORD));
        assert!(!probe_names::is_reserved("record"));
    }
}
