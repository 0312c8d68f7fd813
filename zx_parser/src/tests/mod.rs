use super::*;
use crate::ast::*;
use zx_lexer::{ChunkedSource, Lexer};

fn parse_unit(src: &str) -> (TranslationUnit, zx_common::Diagnostics) {
    let mut lexer = Lexer::create(ChunkedSource::whole(src), "t.c");
    let tokens = lexer.tokenize_all().expect("lexing should not fail in these fixtures");
    let mut parser = Parser::new(tokens);
    let unit = parser.parse_translation_unit();
    (unit, parser.diagnostics)
}

fn only_decl(src: &str) -> Decl {
    let (unit, diags) = parse_unit(src);
    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags.iter().map(|d| d.plain()).collect::<Vec<_>>());
    assert_eq!(unit.items.len(), 1);
    unit.items.into_iter().next().unwrap()
}

#[test]
fn parses_function_definition_with_body() {
    let decl = only_decl("int add(int a, int b) { return a + b; }");
    match decl.node {
        DeclKind::Global { declarators, .. } => {
            assert_eq!(declarators.len(), 1);
            let d = &declarators[0];
            assert!(d.body.is_some());
            match &d.declarator.node {
                DeclaratorKind::Function { inner, params, variadic } => {
                    assert!(!variadic);
                    assert_eq!(params.len(), 2);
                    assert!(matches!(inner.node, DeclaratorKind::Identifier { .. }));
                }
                other => panic!("expected function declarator, got {other:?}"),
            }
        }
        other => panic!("expected global decl, got {other:?}"),
    }
}

#[test]
fn binary_precedence_nests_multiplication_under_addition() {
    let (unit, diags) = parse_unit("int x = 1 + 2 * 3;");
    assert!(diags.is_empty());
    let DeclKind::Global { declarators, .. } = &unit.items[0].node else { panic!() };
    let init = declarators[0].initializer.as_ref().unwrap();
    match &init.node {
        ExprKind::Binary { op: BinOpKind::Add, rhs, .. } => {
            assert!(matches!(rhs.node, ExprKind::Binary { op: BinOpKind::Mul, .. }));
        }
        other => panic!("expected top-level Add, got {other:?}"),
    }
}

#[test]
fn assignment_is_right_associative() {
    let (unit, diags) = parse_unit("void f(void) { a = b = c; }");
    assert!(diags.is_empty());
    let DeclKind::Global { declarators, .. } = &unit.items[0].node else { panic!() };
    let body = declarators[0].body.as_ref().unwrap();
    let StmtKind::Block { items } = &body.node else { panic!() };
    let StmtKind::Expr { expr } = &items[0].node else { panic!() };
    match &expr.node {
        ExprKind::Binary { op: BinOpKind::Assign, rhs, .. } => {
            assert!(matches!(rhs.node, ExprKind::Binary { op: BinOpKind::Assign, .. }));
        }
        other => panic!("expected Assign, got {other:?}"),
    }
}

#[test]
fn combined_basic_type_keywords_resolve() {
    let decl = only_decl("unsigned long x;");
    let DeclKind::Global { specifiers, .. } = &decl.node else { panic!() };
    let SpecifierKind::DeclarationSpecifiers { ty, .. } = &specifiers.node else { panic!() };
    assert!(matches!(ty.node, SpecifierKind::BasicType { kind: BasicTypeKind::UnsignedLong }));
}

#[test]
fn typedef_name_is_recognized_as_a_type_in_later_declarations() {
    let (unit, diags) = parse_unit("typedef struct { int x; } point_t; point_t origin;");
    assert!(diags.is_empty(), "{:?}", diags.iter().map(|d| d.plain()).collect::<Vec<_>>());
    assert_eq!(unit.items.len(), 2);
    let DeclKind::Global { specifiers, .. } = &unit.items[1].node else { panic!() };
    let SpecifierKind::DeclarationSpecifiers { ty, .. } = &specifiers.node else { panic!() };
    assert!(matches!(&ty.node, SpecifierKind::IdentifierType { name } if name == "point_t"));
}

#[test]
fn pointer_declarators_nest_with_innermost_star_closest_to_identifier() {
    let decl = only_decl("char * const * p;");
    let DeclKind::Global { declarators, .. } = &decl.node else { panic!() };
    match &declarators[0].declarator.node {
        DeclaratorKind::Pointer { qualifiers, inner } => {
            assert!(qualifiers.is_empty());
            match &inner.node {
                DeclaratorKind::Pointer { qualifiers, inner } => {
                    assert_eq!(qualifiers.len(), 1);
                    assert!(matches!(inner.node, DeclaratorKind::Identifier { .. }));
                }
                other => panic!("expected nested pointer, got {other:?}"),
            }
        }
        other => panic!("expected pointer declarator, got {other:?}"),
    }
}

#[test]
fn cast_and_parenthesized_expression_are_distinguished() {
    let (unit, diags) = parse_unit("void f(void) { x = (int) y; z = (y); }");
    assert!(diags.is_empty());
    let DeclKind::Global { declarators, .. } = &unit.items[0].node else { panic!() };
    let body = declarators[0].body.as_ref().unwrap();
    let StmtKind::Block { items } = &body.node else { panic!() };

    let StmtKind::Expr { expr } = &items[0].node else { panic!() };
    let ExprKind::Binary { rhs, .. } = &expr.node else { panic!() };
    assert!(matches!(rhs.node, ExprKind::Cast { .. }));

    let StmtKind::Expr { expr } = &items[1].node else { panic!() };
    let ExprKind::Binary { rhs, .. } = &expr.node else { panic!() };
    assert!(matches!(rhs.node, ExprKind::Paren { .. }));
}

#[test]
fn sizeof_type_and_sizeof_expr_are_distinguished() {
    let (unit, diags) = parse_unit("void f(void) { a = sizeof(int); b = sizeof(x); }");
    assert!(diags.is_empty());
    let DeclKind::Global { declarators, .. } = &unit.items[0].node else { panic!() };
    let body = declarators[0].body.as_ref().unwrap();
    let StmtKind::Block { items } = &body.node else { panic!() };

    let StmtKind::Expr { expr } = &items[0].node else { panic!() };
    let ExprKind::Binary { rhs, .. } = &expr.node else { panic!() };
    assert!(matches!(rhs.node, ExprKind::SizeofType { .. }));

    let StmtKind::Expr { expr } = &items[1].node else { panic!() };
    let ExprKind::Binary { rhs, .. } = &expr.node else { panic!() };
    assert!(matches!(rhs.node, ExprKind::SizeofExpr { .. }));
}

#[test]
fn if_else_if_else_chain_parses() {
    let (unit, diags) = parse_unit(
        "void f(int n) { if (n == 0) { a(); } else if (n == 1) { b(); } else { c(); } }",
    );
    assert!(diags.is_empty());
    let DeclKind::Global { declarators, .. } = &unit.items[0].node else { panic!() };
    let body = declarators[0].body.as_ref().unwrap();
    let StmtKind::Block { items } = &body.node else { panic!() };
    match &items[0].node {
        StmtKind::If { else_ifs, else_branch, .. } => {
            assert_eq!(else_ifs.len(), 1);
            assert!(else_branch.is_some());
        }
        other => panic!("expected if, got {other:?}"),
    }
}

#[test]
fn for_loop_with_declaration_init_parses() {
    let (unit, diags) = parse_unit("void f(void) { for (int i = 0; i < 10; i++) { use(i); } }");
    assert!(diags.is_empty());
    let DeclKind::Global { declarators, .. } = &unit.items[0].node else { panic!() };
    let body = declarators[0].body.as_ref().unwrap();
    let StmtKind::Block { items } = &body.node else { panic!() };
    match &items[0].node {
        StmtKind::For { init, cond, step, .. } => {
            assert!(matches!(init.as_ref().unwrap().node, StmtKind::Decl { .. }));
            assert!(cond.is_some());
            assert!(step.is_some());
        }
        other => panic!("expected for, got {other:?}"),
    }
}

#[test]
fn struct_definition_collects_fields() {
    let decl = only_decl("struct point { int x; int y; };");
    let DeclKind::Global { specifiers, .. } = &decl.node else { panic!() };
    let SpecifierKind::DeclarationSpecifiers { ty, .. } = &specifiers.node else { panic!() };
    match &ty.node {
        SpecifierKind::Record { keyword: RecordKeyword::Struct, tag, fields } => {
            assert_eq!(tag.as_deref(), Some("point"));
            assert_eq!(fields.as_ref().unwrap().len(), 2);
        }
        other => panic!("expected struct, got {other:?}"),
    }
}

#[test]
fn enum_with_explicit_values_parses() {
    let decl = only_decl("enum color { red = 1, green, blue = 5 };");
    let DeclKind::Global { specifiers, .. } = &decl.node else { panic!() };
    let SpecifierKind::DeclarationSpecifiers { ty, .. } = &specifiers.node else { panic!() };
    match &ty.node {
        SpecifierKind::Enum { elements, .. } => {
            let elements = elements.as_ref().unwrap();
            assert_eq!(elements.len(), 3);
            assert!(elements[0].value.is_some());
            assert!(elements[1].value.is_none());
        }
        other => panic!("expected enum, got {other:?}"),
    }
}

#[test]
fn asm_statement_with_operands_parses() {
    let (unit, diags) = parse_unit(
        r#"void f(void) { asm volatile ("ld a, %0" : "=r" (out) : "r" (in) : "memory"); }"#,
    );
    assert!(diags.is_empty(), "{:?}", diags.iter().map(|d| d.plain()).collect::<Vec<_>>());
    let DeclKind::Global { declarators, .. } = &unit.items[0].node else { panic!() };
    let body = declarators[0].body.as_ref().unwrap();
    let StmtKind::Block { items } = &body.node else { panic!() };
    match &items[0].node {
        StmtKind::Asm { qualifiers, outputs, inputs, clobbers, .. } => {
            assert_eq!(qualifiers.len(), 1);
            assert_eq!(outputs.len(), 1);
            assert_eq!(inputs.len(), 1);
            assert_eq!(clobbers, &vec!["\"memory\"".to_string()]);
        }
        other => panic!("expected asm, got {other:?}"),
    }
}

#[test]
fn extern_c_block_wraps_its_declarations() {
    let (unit, diags) = parse_unit(r#"extern "C" { int legacy(int x); }"#);
    assert!(diags.is_empty());
    assert_eq!(unit.items.len(), 1);
    match &unit.items[0].node {
        DeclKind::ExternC { items } => assert_eq!(items.len(), 1),
        other => panic!("expected extern C block, got {other:?}"),
    }
}

#[test]
fn loop_macro_shape_is_recognized_at_statement_position() {
    let (unit, diags) = parse_unit("void f(void) { repeat(3) { step(); } }");
    assert!(diags.is_empty(), "{:?}", diags.iter().map(|d| d.plain()).collect::<Vec<_>>());
    let DeclKind::Global { declarators, .. } = &unit.items[0].node else { panic!() };
    let body = declarators[0].body.as_ref().unwrap();
    let StmtKind::Block { items } = &body.node else { panic!() };
    match &items[0].node {
        StmtKind::LoopMacro { name, args, .. } => {
            assert_eq!(name, "repeat");
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected loop macro, got {other:?}"),
    }
}

#[test]
fn adjacent_string_literals_fold_into_one_concat_node() {
    let (unit, diags) = parse_unit(r#"void f(void) { x = "a" "b"; }"#);
    assert!(diags.is_empty());
    let DeclKind::Global { declarators, .. } = &unit.items[0].node else { panic!() };
    let body = declarators[0].body.as_ref().unwrap();
    let StmtKind::Block { items } = &body.node else { panic!() };
    let StmtKind::Expr { expr } = &items[0].node else { panic!() };
    let ExprKind::Binary { rhs, .. } = &expr.node else { panic!() };
    match &rhs.node {
        ExprKind::StringConcat { parts } => assert_eq!(parts.len(), 2),
        other => panic!("expected string concat, got {other:?}"),
    }
}

#[test]
fn syntax_error_does_not_stop_parsing_of_later_declarations() {
    let (unit, diags) = parse_unit("int a = ; int b = 2;");
    assert!(!diags.is_empty());
    assert!(unit.items.iter().any(|d| matches!(
        &d.node,
        DeclKind::Global { declarators, .. }
            if declarators.iter().any(|id| matches!(
                &id.initializer,
                Some(e) if matches!(e.node, ExprKind::IntLiteral { .. })
            ))
    )));
}

#[test]
fn variadic_function_declarator_is_flagged() {
    let decl = only_decl("int printf(const char *fmt, ...);");
    let DeclKind::Global { declarators, .. } = &decl.node else { panic!() };
    match &declarators[0].declarator.node {
        DeclaratorKind::Function { variadic, params, .. } => {
            assert!(*variadic);
            assert_eq!(params.len(), 1);
        }
        other => panic!("expected function declarator, got {other:?}"),
    }
}
