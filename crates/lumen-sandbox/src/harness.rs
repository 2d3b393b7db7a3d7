//! Example harnesses: a call to a method with a default value per parameter.

use lumen_core::ast::{
    BaseType, CompilationUnit, Expr, ExprKind, Ident, Item, Literal, MethodDecl, TypeRef,
};
use lumen_core::parser::{parse_unit, ParseOptions};
use lumen_core::printer::print_expr;
use lumen_core::span::Span;
use lumen_core::ParseError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Syntax(#[from] ParseError),

    #[error("method '{0}' not found")]
    MethodNotFound(String),
}

/// The value an example harness passes for a parameter of type `ty`.
pub fn example_argument(ty: &TypeRef) -> Expr {
    let kind = if ty.is_array() {
        ExprKind::ArrayLiteral {
            elem: ty.element(),
            items: Vec::new(),
        }
    } else {
        ExprKind::Literal(match ty.base {
            BaseType::Double => Literal::Double(1.1),
            BaseType::String => Literal::Str("test".to_string()),
            BaseType::Char => Literal::Char('a'),
            BaseType::Bool => Literal::Bool(true),
            BaseType::Int | BaseType::Void | BaseType::Var => Literal::Int(1),
        })
    };
    Expr::new(kind, Span::default())
}

/// A statement invoking `method` with example arguments, e.g. `Sum(1);`.
pub fn example_invocation(method: &MethodDecl) -> String {
    let call = Expr::new(
        ExprKind::Call {
            callee: Ident::new(method.name.name.clone(), Span::default()),
            args: method.params.iter().map(|p| example_argument(&p.ty)).collect(),
        },
        Span::default(),
    );
    format!("{};", print_expr(&call))
}

pub fn find_method<'a>(unit: &'a CompilationUnit, name: &str) -> Option<&'a MethodDecl> {
    unit.items.iter().find_map(|item| match item {
        Item::Method(method) if method.name.name == name => Some(method),
        _ => None,
    })
}

/// Parses `source` and builds the example invocation of `method`.
pub fn example_harness(
    source: &str,
    method: &str,
    options: &ParseOptions,
) -> Result<String, HarnessError> {
    let unit = parse_unit(source, options)?;
    find_method(&unit, method)
        .map(example_invocation)
        .ok_or_else(|| HarnessError::MethodNotFound(method.to_string()))
}
