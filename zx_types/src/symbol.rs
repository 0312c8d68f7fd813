//! The symbol index (spec component C6): one flat table of file-scope
//! names, keyed by identifier text, tracking how each one was declared so
//! later declarations of the same name can be merged or rejected.

use crate::cgtype::CgType;
use crate::error::TypeError;
use indexmap::IndexMap;
use std::rc::Rc;
use zx_common::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Fun,
    Var,
    TentativeVar,
    ExternFun,
    ExternVar,
}

impl SymbolKind {
    fn is_fun_like(self) -> bool {
        matches!(self, SymbolKind::Fun | SymbolKind::ExternFun)
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: Rc<str>,
    pub position: Position,
    pub kind: SymbolKind,
    pub ty: CgType,
    /// The name this symbol is referred to by in emitted IR/assembly; for
    /// external-linkage symbols this is just the identifier text.
    pub linkage_name: Rc<str>,
    pub is_defined: bool,
}

/// File-scope symbol table, holding one entry per distinct identifier.
///
/// Declaring the same name twice is only ever an error when the two
/// declarations disagree on type, or when a second *definition* of an
/// already-defined symbol is attempted; otherwise the declarations are
/// merged, with the more specific [`SymbolKind`] winning (a `tentative-var`
/// upgrades to `var`, an undefined `fun` prototype's body marks it
/// defined).
#[derive(Debug, Default)]
pub struct SymbolIndex {
    symbols: IndexMap<Rc<str>, Symbol>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Declares or merges `name` into the table with the given kind, type
    /// and defined-ness. `position` is used only for diagnostics; the
    /// table keeps the position of the first declaration.
    pub fn declare(
        &mut self,
        name: Rc<str>,
        position: Position,
        kind: SymbolKind,
        ty: CgType,
        is_defined: bool,
    ) -> Result<(), TypeError> {
        match self.symbols.get_mut(&name) {
            None => {
                let linkage_name = name.clone();
                self.symbols.insert(name.clone(), Symbol { name, position, kind, ty, linkage_name, is_defined });
                Ok(())
            }
            Some(existing) => {
                if !existing.ty.is_compatible_with(&ty) {
                    return Err(TypeError::RedeclarationMismatch { position, name: name.to_string() });
                }
                if existing.kind.is_fun_like() != kind.is_fun_like() {
                    return Err(TypeError::RedeclarationMismatch { position, name: name.to_string() });
                }
                if is_defined && existing.is_defined {
                    return Err(TypeError::AlreadyDefined { position, name: name.to_string() });
                }
                existing.kind = merge_kind(existing.kind, kind);
                existing.is_defined = existing.is_defined || is_defined;
                // A more complete type (e.g. an array whose size becomes
                // known, or a struct gaining a member list) supersedes an
                // incomplete one already on file.
                if !existing.ty.is_complete() && ty.is_complete() {
                    existing.ty = ty;
                }
                Ok(())
            }
        }
    }
}

fn merge_kind(existing: SymbolKind, incoming: SymbolKind) -> SymbolKind {
    use SymbolKind::*;
    match (existing, incoming) {
        (TentativeVar, Var) | (Var, TentativeVar) => Var,
        (ExternVar, Var) | (Var, ExternVar) => Var,
        (ExternVar, TentativeVar) | (TentativeVar, ExternVar) => TentativeVar,
        (ExternFun, Fun) | (Fun, ExternFun) => Fun,
        (a, b) if a == b => a,
        (a, _) => a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgtype::{BasicKind, CgType};
    use std::rc::Rc;

    fn pos() -> Position {
        Position::new(Rc::from("a.c"), 1, 1, 0)
    }

    #[test]
    fn extern_declaration_then_definition_upgrades_to_var() {
        let mut idx = SymbolIndex::new();
        idx.declare(Rc::from("x"), pos(), SymbolKind::ExternVar, CgType::basic(BasicKind::Int), false).unwrap();
        idx.declare(Rc::from("x"), pos(), SymbolKind::Var, CgType::basic(BasicKind::Int), true).unwrap();
        let sym = idx.get("x").unwrap();
        assert_eq!(sym.kind, SymbolKind::Var);
        assert!(sym.is_defined);
    }

    #[test]
    fn tentative_definition_at_file_scope_is_tentative_var() {
        let mut idx = SymbolIndex::new();
        idx.declare(Rc::from("x"), pos(), SymbolKind::TentativeVar, CgType::basic(BasicKind::Int), false).unwrap();
        assert_eq!(idx.get("x").unwrap().kind, SymbolKind::TentativeVar);
    }

    #[test]
    fn function_prototype_then_body_marks_defined() {
        let mut idx = SymbolIndex::new();
        let fn_ty = CgType {
            qualifiers: Default::default(),
            kind: crate::cgtype::CgTypeKind::Function {
                ret: Box::new(CgType::basic(BasicKind::Int)),
                params: vec![],
                variadic: false,
            },
        };
        idx.declare(Rc::from("f"), pos(), SymbolKind::Fun, fn_ty.clone(), false).unwrap();
        assert!(!idx.get("f").unwrap().is_defined);
        idx.declare(Rc::from("f"), pos(), SymbolKind::Fun, fn_ty, true).unwrap();
        assert!(idx.get("f").unwrap().is_defined);
    }

    #[test]
    fn redefinition_of_a_defined_symbol_is_an_error() {
        let mut idx = SymbolIndex::new();
        idx.declare(Rc::from("x"), pos(), SymbolKind::Var, CgType::basic(BasicKind::Int), true).unwrap();
        let err = idx.declare(Rc::from("x"), pos(), SymbolKind::Var, CgType::basic(BasicKind::Int), true).unwrap_err();
        assert!(matches!(err, TypeError::AlreadyDefined { .. }));
    }

    #[test]
    fn incompatible_redeclaration_is_an_error() {
        let mut idx = SymbolIndex::new();
        idx.declare(Rc::from("x"), pos(), SymbolKind::ExternVar, CgType::basic(BasicKind::Int), false).unwrap();
        let err = idx
            .declare(Rc::from("x"), pos(), SymbolKind::ExternVar, CgType::basic(BasicKind::Char), false)
            .unwrap_err();
        assert!(matches!(err, TypeError::RedeclarationMismatch { .. }));
    }
}
