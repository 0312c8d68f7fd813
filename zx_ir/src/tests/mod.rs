use super::*;
use crate::instruction::Opcode;
use crate::lower::lower_translation_unit;
use crate::proc::Decl as IrDecl;

fn lower_src(src: &str) -> LoweringResult {
    let (unit, parse_diags) = zx_parser::parse_str(src, "t.c").expect("lexing should not fail in these fixtures");
    assert!(parse_diags.is_empty(), "unexpected parse diagnostics: {:?}", parse_diags.iter().map(|d| d.plain()).collect::<Vec<_>>());
    lower_translation_unit(&unit)
}

fn only_proc<'a>(module: &'a Module, name: &str) -> &'a Procedure {
    module
        .decls
        .iter()
        .find_map(|d| match d {
            IrDecl::Procedure(p) if &*p.name == name => Some(p),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no procedure named '{name}' in module"))
}

fn only_var<'a>(module: &'a Module, name: &str) -> &'a Variable {
    module
        .decls
        .iter()
        .find_map(|d| match d {
            IrDecl::Variable(v) if &*v.name == name => Some(v),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no variable named '{name}' in module"))
}

fn opcodes_of(proc: &Procedure) -> Vec<Opcode> {
    proc.body.iter().map(|li| li.instr.opcode).collect()
}

#[test]
fn simple_function_lowers_add_and_return() {
    let result = lower_src("int add(int a, int b) { return a + b; }");
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
    let proc = only_proc(&result.module, "add");
    assert_eq!(proc.args.len(), 2);
    assert_eq!(proc.args[0].name.as_ref(), "a");
    assert_eq!(proc.args[1].name.as_ref(), "b");
    let ops = opcodes_of(proc);
    assert!(ops.contains(&Opcode::Add));
    assert!(ops.contains(&Opcode::Return));
}

#[test]
fn global_with_constant_initializer_becomes_data_variable() {
    let result = lower_src("int x = 5;");
    assert!(!result.diagnostics.has_errors());
    let var = only_var(&result.module, "x");
    assert_eq!(var.data.len(), 1);
    assert_eq!(var.data[0].value, 5);
}

#[test]
fn tentative_definition_is_zero_filled_at_end_of_unit() {
    let result = lower_src("int x;");
    assert!(!result.diagnostics.has_errors());
    let var = only_var(&result.module, "x");
    assert_eq!(var.data.len(), 1);
    assert_eq!(var.data[0].value, 0);
}

#[test]
fn extern_declaration_then_definition_does_not_duplicate_tentative_global() {
    let result = lower_src("extern int x; int x = 3;");
    assert!(!result.diagnostics.has_errors());
    let count = result.module.decls.iter().filter(|d| matches!(d, IrDecl::Variable(v) if &*v.name == "x")).count();
    assert_eq!(count, 1);
}

#[test]
fn redefinition_of_a_function_is_diagnosed() {
    let result = lower_src("int f(void) { return 0; } int f(void) { return 1; }");
    assert!(result.diagnostics.has_errors());
}

#[test]
fn missing_return_in_non_void_function_is_diagnosed() {
    let result = lower_src("int f(void) { int x; x = 1; }");
    assert!(result.diagnostics.has_errors());
}

#[test]
fn every_path_returning_through_if_else_silences_missing_return() {
    let result = lower_src("int f(int a) { if (a) { return 1; } else { return 0; } }");
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
}

#[test]
fn if_else_lowers_to_a_branch_chain() {
    let result = lower_src("void f(int a) { if (a) { a = 1; } else { a = 2; } }");
    assert!(!result.diagnostics.has_errors());
    let proc = only_proc(&result.module, "f");
    let ops = opcodes_of(proc);
    assert!(ops.contains(&Opcode::BranchIfZero));
    assert!(ops.contains(&Opcode::Jump));
}

#[test]
fn while_loop_break_and_continue_resolve_to_loop_labels() {
    let result = lower_src("void f(void) { while (1) { break; continue; } }");
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
    let proc = only_proc(&result.module, "f");
    let jumps = proc.body.iter().filter(|li| li.instr.opcode == Opcode::Jump).count();
    // header->cond fallthrough uses BranchIfZero, so the only plain Jumps
    // are break, continue, and the loop-back edge.
    assert_eq!(jumps, 3);
}

#[test]
fn break_outside_a_loop_or_switch_is_diagnosed() {
    let result = lower_src("void f(void) { break; }");
    assert!(result.diagnostics.has_errors());
}

#[test]
fn continue_outside_a_loop_is_diagnosed() {
    let result = lower_src("void f(void) { continue; }");
    assert!(result.diagnostics.has_errors());
}

#[test]
fn goto_to_an_undefined_label_is_diagnosed() {
    let result = lower_src("void f(void) { goto nowhere; }");
    assert!(result.diagnostics.has_errors());
}

#[test]
fn goto_to_a_defined_label_is_silent() {
    let result = lower_src("void f(void) { goto done; done: return; }");
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
}

#[test]
fn switch_with_cases_and_default_emits_a_dispatch_chain() {
    let result = lower_src(
        "int f(int x) { switch (x) { case 1: return 10; case 2: return 20; default: return 0; } return -1; }",
    );
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
    let proc = only_proc(&result.module, "f");
    let ops = opcodes_of(proc);
    assert_eq!(ops.iter().filter(|o| **o == Opcode::CmpEq).count(), 2);
    assert_eq!(ops.iter().filter(|o| **o == Opcode::BranchIfNonZero).count(), 2);
}

#[test]
fn duffs_device_style_switch_inside_while_lowers_without_error() {
    let result = lower_src(
        "void f(int n, int *out) { int i = 0; switch (n) { case 0: while (i < n) { case 1: out[i] = i; i = i + 1; } } }",
    );
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
}

#[test]
fn string_literal_creates_an_anonymous_byte_array_global() {
    let result = lower_src("void f(void) { char *p; p = \"hi\"; }");
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
    let var = only_var(&result.module, "__str0");
    assert_eq!(var.data.len(), 3);
    assert_eq!(var.data[0].value, b'h' as i64);
    assert_eq!(var.data[1].value, b'i' as i64);
    assert_eq!(var.data[2].value, 0);
}

#[test]
fn call_to_an_undeclared_function_is_diagnosed() {
    let result = lower_src("void f(void) { g(1); }");
    assert!(result.diagnostics.has_errors());
}

#[test]
fn call_to_a_declared_function_passes_arguments_as_a_list() {
    let result = lower_src("int g(int x); void f(void) { g(1); }");
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
    let proc = only_proc(&result.module, "f");
    let call = proc.body.iter().find(|li| li.instr.opcode == Opcode::Call).expect("expected a Call instruction");
    match &call.instr.operands[1] {
        Operand::List(args) => assert_eq!(args.len(), 1),
        other => panic!("expected a List operand, got {other:?}"),
    }
}

#[test]
fn array_indexing_scales_by_element_size() {
    let result = lower_src("int f(int *a) { return a[2]; }");
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
    let proc = only_proc(&result.module, "f");
    let ops = opcodes_of(proc);
    assert!(ops.contains(&Opcode::Mul));
    assert!(ops.contains(&Opcode::Load));
}

#[test]
fn post_increment_returns_the_pre_increment_value() {
    let result = lower_src("void f(int i) { int j; j = i++; }");
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
    let proc = only_proc(&result.module, "f");
    let ops = opcodes_of(proc);
    assert!(ops.contains(&Opcode::Add));
}
