//! Builds a [`CgType`] from a declaration-specifier list plus a declarator
//! (spec component C5/C10's boundary: the type system itself lives in
//! `zx_types`, but only the lowering pass here knows how to walk the AST
//! that produces one).
//!
//! Composing a declarator into a type is the one place C's grammar and its
//! type semantics diverge: `int *a[5]` parses with the pointer "outside"
//! the array in the tree, yet means "array of pointer", not "pointer to
//! array" (that's what the parentheses in `int (*a)[5]` are for). The
//! correct composition walks the declarator from its root down to the
//! identifier, wrapping the *threaded* base type at each node and passing
//! the newly-wrapped type further down -- not wrapping after recursing, as
//! a naive inside-out fold would.

use std::rc::Rc;
use zx_common::Diagnostics;
use zx_parser::ast::{
    BasicTypeKind, Declarator, DeclaratorKind, Param, RecordField, RecordKeyword as AstRecordKeyword, Specifier,
    SpecifierKind, TypeQualifierKind,
};
use zx_types::{
    ArraySize, BasicKind, CgType, CgTypeKind, EnumRegistry, Qualifiers, RecordKeyword, RecordMember,
};

/// Folds the declaration-specifier/specifier-qualifier-list wrapper down to
/// the base [`CgType`] it names, registering any inline `struct`/`enum`
/// definition it carries along the way.
pub fn build_base_type(spec: &Specifier, enums: &mut EnumRegistry, diagnostics: &mut Diagnostics) -> CgType {
    match &spec.node {
        SpecifierKind::DeclarationSpecifiers { qualifiers, ty, .. } => {
            let inner = build_base_type(ty, enums, diagnostics);
            inner.qualified(qualifiers_from_ast(qualifiers))
        }
        SpecifierKind::SpecifierQualifierList { qualifiers, ty } => {
            let inner = build_base_type(ty, enums, diagnostics);
            inner.qualified(qualifiers_from_ast(qualifiers))
        }
        SpecifierKind::BasicType { kind } => CgType::basic(basic_kind_from_ast(kind)),
        SpecifierKind::IdentifierType { name } => {
            // Typedef resolution needs a typedef table this crate doesn't
            // carry yet; fall back to `int` and flag it so the diagnostic
            // stream at least records where the loss happened.
            diagnostics.warning(
                spec.first_tok().map(|t| t.begin().clone()).unwrap_or_else(|| zx_common::Position::start(Rc::from("<unknown>"))),
                format!("typedef name '{name}' is not resolved to its underlying type yet; treating as int"),
            );
            CgType::basic(BasicKind::Int)
        }
        SpecifierKind::Record { keyword, tag, fields } => build_record_type(keyword, tag, fields, enums, diagnostics),
        SpecifierKind::Enum { tag, elements } => {
            if let Some(elements) = elements {
                let position = spec
                    .first_tok()
                    .map(|t| t.begin().clone())
                    .unwrap_or_else(|| zx_common::Position::start(Rc::from("<unknown>")));
                let built = elements
                    .iter()
                    .map(|el| (el.name.clone(), el.value.as_ref().and_then(eval_const_int), position.clone()))
                    .collect();
                if let Err(err) = enums.declare(tag.clone(), built) {
                    diagnostics.error(position, err.to_string());
                }
            }
            CgType { qualifiers: Qualifiers::NONE, kind: CgTypeKind::Enum { tag: tag.clone() } }
        }
        // Every other SpecifierKind variant only ever appears nested inside
        // one of the above (qualifier lists, storage class, etc.) and is
        // unreachable as the `ty` slot of a declaration-specifier list.
        _ => CgType::basic(BasicKind::Int),
    }
}

fn build_record_type(
    keyword: &AstRecordKeyword,
    tag: &Option<String>,
    fields: &Option<Vec<RecordField>>,
    enums: &mut EnumRegistry,
    diagnostics: &mut Diagnostics,
) -> CgType {
    let kw = match keyword {
        AstRecordKeyword::Struct => RecordKeyword::Struct,
        AstRecordKeyword::Union => RecordKeyword::Union,
    };
    let members = fields.as_ref().map(|fields| {
        fields
            .iter()
            .map(|f| {
                let base = build_base_type(&f.specifiers, enums, diagnostics);
                let ty = apply_declarator(&f.declarator, base);
                let name = declarator_name(&f.declarator).unwrap_or_default();
                RecordMember { name, ty, offset: None }
            })
            .collect()
    });
    CgType { qualifiers: Qualifiers::NONE, kind: CgTypeKind::Record { keyword: kw, tag: tag.clone(), members } }
}

fn qualifiers_from_ast(quals: &[TypeQualifierKind]) -> Qualifiers {
    let mut out = Qualifiers::NONE;
    for q in quals {
        out = out.union(match q {
            TypeQualifierKind::Const => Qualifiers { const_: true, ..Qualifiers::NONE },
            TypeQualifierKind::Restrict => Qualifiers { restrict: true, ..Qualifiers::NONE },
            TypeQualifierKind::Volatile | TypeQualifierKind::Atomic => Qualifiers { volatile: true, ..Qualifiers::NONE },
        });
    }
    out
}

fn qualifiers_from_specifier_kinds(specs: &[SpecifierKind]) -> Qualifiers {
    let mut out = Qualifiers::NONE;
    for s in specs {
        if let SpecifierKind::TypeQualifier { qualifier } = s {
            out = out.union(qualifiers_from_ast(std::slice::from_ref(qualifier)));
        }
    }
    out
}

fn basic_kind_from_ast(kind: &BasicTypeKind) -> BasicKind {
    match kind {
        BasicTypeKind::Void => BasicKind::Void,
        BasicTypeKind::Char => BasicKind::Char,
        BasicTypeKind::SignedChar => BasicKind::SignedChar,
        BasicTypeKind::UnsignedChar => BasicKind::UnsignedChar,
        BasicTypeKind::Short => BasicKind::Short,
        BasicTypeKind::UnsignedShort => BasicKind::UnsignedShort,
        BasicTypeKind::Int => BasicKind::Int,
        BasicTypeKind::UnsignedInt => BasicKind::UnsignedInt,
        BasicTypeKind::Long => BasicKind::Long,
        BasicTypeKind::UnsignedLong => BasicKind::UnsignedLong,
        BasicTypeKind::LongLong => BasicKind::LongLong,
        BasicTypeKind::UnsignedLongLong => BasicKind::UnsignedLongLong,
        BasicTypeKind::Bool => BasicKind::Bool,
        BasicTypeKind::VaList => BasicKind::VaList,
        // Floating point isn't part of this C subset's code generation
        // target; treated as the widest integer so expressions involving
        // it still type-check rather than aborting lowering outright.
        BasicTypeKind::Float | BasicTypeKind::Double => BasicKind::LongLong,
    }
}

/// Top-down declarator composition; see the module doc for why this has
/// to thread the base type downward instead of wrapping bottom-up.
pub fn apply_declarator(decl: &Declarator, base: CgType) -> CgType {
    match &decl.node {
        DeclaratorKind::Identifier { .. } | DeclaratorKind::NoIdentifier => base,
        DeclaratorKind::Paren { inner } => apply_declarator(inner, base),
        DeclaratorKind::Pointer { qualifiers, inner } => {
            let wrapped = CgType::pointer_to(base).qualified(qualifiers_from_specifier_kinds(qualifiers));
            apply_declarator(inner, wrapped)
        }
        DeclaratorKind::Array { inner, size } => {
            let array_size = match size {
                Some(expr) => match eval_const_int(expr) {
                    Some(n) if n >= 0 => ArraySize::Constant(n as u64),
                    _ => ArraySize::Unsized,
                },
                None => ArraySize::Unsized,
            };
            let wrapped = CgType { qualifiers: Qualifiers::NONE, kind: CgTypeKind::Array { element: Box::new(base), size: array_size } };
            apply_declarator(inner, wrapped)
        }
        DeclaratorKind::Function { inner, params, variadic } => {
            let param_types = params.iter().map(param_type).collect();
            let wrapped = CgType {
                qualifiers: Qualifiers::NONE,
                kind: CgTypeKind::Function { ret: Box::new(base), params: param_types, variadic: *variadic },
            };
            apply_declarator(inner, wrapped)
        }
    }
}

fn param_type(param: &Param) -> CgType {
    // Parameter types never carry an inline struct/enum *definition* worth
    // registering twice, so a throwaway registry and sink are fine here.
    let mut scratch_enums = EnumRegistry::new();
    let mut scratch_diags = Diagnostics::new();
    let base = build_base_type(&param.specifiers, &mut scratch_enums, &mut scratch_diags);
    match &param.declarator {
        Some(d) => apply_declarator(d, base),
        None => base,
    }
}

/// Recovers the identifier a declarator ultimately names, if any (absent
/// for abstract declarators).
pub fn declarator_name(decl: &Declarator) -> Option<String> {
    match &decl.node {
        DeclaratorKind::Identifier { name } => Some(name.clone()),
        DeclaratorKind::NoIdentifier => None,
        DeclaratorKind::Paren { inner }
        | DeclaratorKind::Pointer { inner, .. }
        | DeclaratorKind::Array { inner, .. }
        | DeclaratorKind::Function { inner, .. } => declarator_name(inner),
    }
}

/// Evaluates the handful of constant-expression shapes this subset's array
/// sizes and enum initializers actually use: integer literals and simple
/// arithmetic over them. Anything else is reported as not yet supported by
/// returning `None`, which callers treat as "unsized"/"auto-numbered".
pub fn eval_const_int(expr: &zx_parser::ast::Expr) -> Option<i64> {
    use zx_parser::ast::{BinOpKind, ExprKind};
    match &expr.node {
        ExprKind::IntLiteral { text } => parse_int_literal(text),
        ExprKind::CharLiteral { text } => text.chars().next().map(|c| c as i64),
        ExprKind::Paren { inner } => eval_const_int(inner),
        ExprKind::Unary { op, operand } => {
            let v = eval_const_int(operand)?;
            Some(match op {
                zx_parser::ast::UnaryKind::Minus => -v,
                zx_parser::ast::UnaryKind::Plus => v,
                zx_parser::ast::UnaryKind::BitwiseNot => !v,
                zx_parser::ast::UnaryKind::LogicalNot => (v == 0) as i64,
            })
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = eval_const_int(lhs)?;
            let r = eval_const_int(rhs)?;
            Some(match op {
                BinOpKind::Add => l + r,
                BinOpKind::Sub => l - r,
                BinOpKind::Mul => l * r,
                BinOpKind::Div if r != 0 => l / r,
                BinOpKind::Mod if r != 0 => l % r,
                BinOpKind::Shl => l << r,
                BinOpKind::Shr => l >> r,
                BinOpKind::BitAnd => l & r,
                BinOpKind::BitOr => l | r,
                BinOpKind::BitXor => l ^ r,
                _ => return None,
            })
        }
        _ => None,
    }
}

fn parse_int_literal(text: &str) -> Option<i64> {
    let trimmed = text.trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'));
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = trimmed.strip_prefix('0').filter(|_| trimmed.len() > 1) {
        i64::from_str_radix(oct, 8).ok()
    } else {
        trimmed.parse().ok()
    }
}
