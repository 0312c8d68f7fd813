use crate::compile;
use zx_ir::lower_translation_unit;

fn compile_src(src: &str) -> String {
    let (unit, parse_diags) = zx_parser::parse_str(src, "t.c").expect("lexing should not fail in these fixtures");
    assert!(parse_diags.is_empty(), "unexpected parse diagnostics: {:?}", parse_diags.iter().map(|d| d.plain()).collect::<Vec<_>>());
    let result = lower_translation_unit(&unit);
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().map(|d| d.plain()).collect::<Vec<_>>());
    compile(&result.module)
}

/// Scenario 1: `int main(void) { return 0; }` turns into a prologue, a
/// load of the constant return value, a jump to the epilogue, and an
/// epilogue that restores SP/IX and returns.
#[test]
fn trivial_main_has_prologue_and_epilogue() {
    let asm = compile_src("int main(void) { return 0; }");
    assert!(asm.contains("main:"));
    assert!(asm.contains("push ix"));
    assert!(asm.contains("ld ix,$0000"));
    assert!(asm.contains("add ix,sp"));
    assert!(asm.contains("ld sp,ix"));
    assert!(asm.contains("pop ix"));
    assert!(asm.contains("ret"));
    assert!(!asm.contains("vr"), "no virtual register should survive allocation:\n{asm}");
}

/// Scenario 2: `int add(int a, int b) { return a + b; }` loads both
/// arguments from their frame slots into HL/DE and adds them there --
/// the deterministic allocator policy is chosen so this always happens,
/// matching the expected physical-register assignment exactly.
#[test]
fn add_loads_args_into_hl_and_de_then_adds() {
    let asm = compile_src("int add(int a, int b) { return a + b; }");
    assert!(asm.contains("ld l,(ix+a)"));
    assert!(asm.contains("ld h,(ix+a+1)"));
    assert!(asm.contains("ld e,(ix+b)"));
    assert!(asm.contains("ld d,(ix+b+1)"));
    assert!(asm.contains("add hl,de"));
    assert!(asm.contains(".a equ 0x0004"));
    assert!(asm.contains(".b equ 0x0006"));
}

#[test]
fn no_virtual_operands_survive_allocation_for_arithmetic() {
    let asm = compile_src("int f(int x) { int y = x * 2; return y - 1; }");
    assert!(!asm.contains("vr"));
    assert!(asm.contains("EXTERN __mul16"));
}

#[test]
fn comparison_materializes_zero_or_one() {
    let asm = compile_src("int lt(int a, int b) { return a < b; }");
    assert!(asm.contains("sbc hl,de"));
    assert!(asm.contains("jp c,_cg_0") || asm.contains("jp c,_cg_1"));
}

#[test]
fn global_variable_round_trips_through_accumulator() {
    let asm = compile_src("int counter = 0; void bump(void) { counter = counter + 1; }");
    assert!(asm.contains("counter:"));
    assert!(asm.contains("defw $0000"));
    assert!(asm.contains("ld hl,(counter)"));
    assert!(asm.contains("ld (counter),hl"));
}

#[test]
fn pointer_store_goes_through_hl() {
    let asm = compile_src("void set(int *p, int v) { *p = v; }");
    assert!(asm.contains("ld (hl),e"));
    assert!(asm.contains("inc hl"));
    assert!(asm.contains("ld (hl),d"));
}

#[test]
fn call_pushes_args_in_reverse_and_cleans_stack() {
    let asm = compile_src("int add(int a, int b); int caller(void) { return add(1, 2); }");
    assert!(asm.contains("call add"));
    // two arguments pushed, so two discard-pops after the call.
    let call_pos = asm.find("call add").unwrap();
    let after = &asm[call_pos..];
    assert_eq!(after.matches("pop hl").count() >= 2, true);
}
