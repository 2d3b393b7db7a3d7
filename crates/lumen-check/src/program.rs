//! A linked program: every method and static of a project, by name.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use lumen_core::ast::{
    BaseType, Block, CompilationUnit, Ident, Item, MethodDecl, StaticDecl, Stmt, TypeRef,
};
use lumen_core::id::SourceIndex;
use lumen_core::span::Span;

/// Name of the parameterless method wrapping harness statements.
pub const ENTRY_POINT: &str = "__evaluate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedMethod {
    pub source: SourceIndex,
    pub decl: MethodDecl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedStatic {
    pub source: SourceIndex,
    pub decl: StaticDecl,
}

/// Methods in declaration order across units, and statics in the order
/// their initializers run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub methods: IndexMap<String, LinkedMethod>,
    pub statics: Vec<LinkedStatic>,
}

impl Program {
    /// Links checked units. A later method with a name already taken is
    /// ignored; the checker reports that case before linking.
    pub fn link(units: &[(SourceIndex, CompilationUnit)]) -> Program {
        let mut program = Program::default();
        for (source, unit) in units {
            for item in &unit.items {
                match item {
                    Item::Method(decl) => {
                        program
                            .methods
                            .entry(decl.name.name.clone())
                            .or_insert_with(|| LinkedMethod {
                                source: *source,
                                decl: decl.clone(),
                            });
                    }
                    Item::Static(decl) => program.statics.push(LinkedStatic {
                        source: *source,
                        decl: decl.clone(),
                    }),
                }
            }
        }
        program
    }

    /// Adds `stmts` as the body of the `void` entry method [`ENTRY_POINT`],
    /// replacing any previous entry.
    pub fn add_entry(&mut self, source: SourceIndex, stmts: Vec<Stmt>) {
        let span = stmts
            .iter()
            .map(|stmt| stmt.span)
            .reduce(Span::to)
            .unwrap_or_default();
        let decl = MethodDecl {
            is_static: true,
            return_type: TypeRef {
                base: BaseType::Void,
                rank: 0,
                span: Span::default(),
            },
            name: Ident::new(ENTRY_POINT, Span::default()),
            params: Vec::new(),
            body: Block { stmts, span },
            span,
        };
        self.methods
            .insert(ENTRY_POINT.to_string(), LinkedMethod { source, decl });
    }

    pub fn method(&self, name: &str) -> Option<&LinkedMethod> {
        self.methods.get(name)
    }
}
