//! Renders an allocated [`crate::module::Module`] as Z80 assembler text
//! (spec section 6): one instruction per line, labels on their own line
//! ending `:`, `;`-prefixed comments, `$`-prefixed hex immediates, extern
//! declarations as `EXTERN name`, and frame offsets as `.name equ 0xHHHH`.

use crate::instruction::{Instruction, LabeledInstr, Opcode};
use crate::module::Module;
use crate::operand::{Cond, Indirect, Operand, Reg16, Reg8};
use crate::proc::{DataEntry, DataWidth, Decl, Procedure, SlotKind, Variable};
use std::fmt::Write as _;

pub fn emit_module(module: &Module) -> String {
    let mut out = String::new();
    for decl in &module.decls {
        match decl {
            Decl::Extern(name) => {
                let _ = writeln!(out, "EXTERN {name}");
            }
            Decl::Variable(v) => emit_variable(&mut out, v),
            Decl::Procedure(p) => emit_procedure(&mut out, p),
        }
    }
    out
}

fn emit_variable(out: &mut String, v: &Variable) {
    let _ = writeln!(out, "{}:", v.name);
    for entry in &v.data {
        emit_data_entry(out, entry);
    }
}

fn emit_data_entry(out: &mut String, entry: &DataEntry) {
    match entry.width {
        DataWidth::Byte => {
            let _ = writeln!(out, "    defb {}", hex(entry.value, 2));
        }
        DataWidth::Word => {
            let _ = writeln!(out, "    defw {}", hex(entry.value, 4));
        }
        DataWidth::DWord => {
            let _ = writeln!(out, "    ; {}", hex(entry.value, 8));
            let lo = entry.value & 0xffff;
            let hi = (entry.value >> 16) & 0xffff;
            let _ = writeln!(out, "    defw {}", hex(lo, 4));
            let _ = writeln!(out, "    defw {}", hex(hi, 4));
        }
        DataWidth::QWord => {
            let _ = writeln!(out, "    ; {}", hex(entry.value, 16));
            for shift in [0, 16, 32, 48] {
                let limb = (entry.value >> shift) & 0xffff;
                let _ = writeln!(out, "    defw {}", hex(limb, 4));
            }
        }
    }
}

fn emit_procedure(out: &mut String, proc: &Procedure) {
    for local in &proc.locals {
        if local.kind == SlotKind::Local {
            let offset = local.offset.unwrap_or(0);
            let _ = writeln!(out, ".{} equ 0x{:04X}", local.name, offset as u16);
        }
    }
    for local in &proc.locals {
        if local.kind == SlotKind::Arg {
            let offset = local.offset.unwrap_or(0);
            let _ = writeln!(out, ".{} equ 0x{:04X}", local.name, offset as u16);
        }
    }
    let _ = writeln!(out, "{}:", proc.name);
    for li in &proc.body {
        emit_labeled(out, li);
    }
}

fn emit_labeled(out: &mut String, li: &LabeledInstr) {
    if let Some(label) = &li.label {
        let _ = writeln!(out, "{label}:");
    }
    if let Some(comment) = &li.instr.comment {
        let _ = writeln!(out, "    ; {comment}");
    }
    let _ = writeln!(out, "    {}", render_instr(&li.instr));
}

fn render_instr(instr: &Instruction) -> String {
    let cc = instr.cond.map(render_cond);
    match instr.opcode {
        Opcode::Ld => format!("ld {},{}", render(&instr.operands[0]), render(&instr.operands[1])),
        Opcode::Push => format!("push {}", render(&instr.operands[0])),
        Opcode::Pop => format!("pop {}", render(&instr.operands[0])),
        Opcode::Add => render_alu2("add", instr),
        Opcode::Adc => render_alu2("adc", instr),
        Opcode::Sbc => render_alu2("sbc", instr),
        Opcode::Sub => render_alu1("sub", instr),
        Opcode::And => render_alu1("and", instr),
        Opcode::Or => render_alu1("or", instr),
        Opcode::Xor => render_alu1("xor", instr),
        Opcode::Cp => render_alu1("cp", instr),
        Opcode::Inc => format!("inc {}", render(&instr.operands[0])),
        Opcode::Dec => format!("dec {}", render(&instr.operands[0])),
        Opcode::Neg => "neg".to_string(),
        Opcode::Cpl => "cpl".to_string(),
        Opcode::Sla => format!("sla {}", render(&instr.operands[0])),
        Opcode::Sra => format!("sra {}", render(&instr.operands[0])),
        Opcode::Srl => format!("srl {}", render(&instr.operands[0])),
        Opcode::Rl => format!("rl {}", render(&instr.operands[0])),
        Opcode::Rr => format!("rr {}", render(&instr.operands[0])),
        Opcode::Jp => match cc {
            Some(c) => format!("jp {c},{}", render(&instr.operands[0])),
            None => format!("jp {}", render(&instr.operands[0])),
        },
        Opcode::JpCc => format!("jp {},{}", cc.unwrap_or_default(), render(&instr.operands[0])),
        Opcode::Call => match cc {
            Some(c) => format!("call {c},{}", render(&instr.operands[0])),
            None => format!("call {}", render(&instr.operands[0])),
        },
        Opcode::CallCc => format!("call {},{}", cc.unwrap_or_default(), render(&instr.operands[0])),
        Opcode::Ret => match cc {
            Some(c) => format!("ret {c}"),
            None => "ret".to_string(),
        },
        Opcode::RetCc => format!("ret {}", cc.unwrap_or_default()),
        Opcode::Di => "di".to_string(),
        Opcode::Ei => "ei".to_string(),
        Opcode::Nop => "nop".to_string(),
        Opcode::Halt => "halt".to_string(),
    }
}

/// `ADD`/`ADC`/`SBC` always show their implicit accumulator explicitly:
/// `add a,r` for the 8-bit form, `add hl,ss` for the 16-bit form.
fn render_alu2(mnemonic: &str, instr: &Instruction) -> String {
    format!("{mnemonic} {},{}", render(&instr.operands[0]), render(&instr.operands[1]))
}

/// `SUB`/`AND`/`OR`/`XOR`/`CP` never show the accumulator: `sub r`, not
/// `sub a,r`. Codegen always routes these through A, so only the second
/// operand (the right-hand side) is printed.
fn render_alu1(mnemonic: &str, instr: &Instruction) -> String {
    format!("{mnemonic} {}", render(&instr.operands[1]))
}

fn render_cond(c: Cond) -> String {
    match c {
        Cond::Z => "z".to_string(),
        Cond::Nz => "nz".to_string(),
        Cond::C => "c".to_string(),
        Cond::Nc => "nc".to_string(),
    }
}

fn render(op: &Operand) -> String {
    match op {
        Operand::Imm(n) => hex(*n, if *n > 0xff || *n < 0 { 4 } else { 2 }),
        Operand::Symbol(name) => name.to_string(),
        Operand::Reg8(r) => render_reg8(*r),
        Operand::Reg16(r) | Operand::RegGroup(_, r) => render_reg16(*r),
        Operand::Vr(_) | Operand::Vrr(_) => {
            unreachable!("virtual operands must be rewritten by the allocator before emission")
        }
        Operand::Indirect(ind) => render_indirect(ind),
        Operand::Cond(c) => render_cond(*c),
    }
}

fn render_reg8(r: Reg8) -> String {
    match r {
        Reg8::A => "a",
        Reg8::B => "b",
        Reg8::C => "c",
        Reg8::D => "d",
        Reg8::E => "e",
        Reg8::H => "h",
        Reg8::L => "l",
    }
    .to_string()
}

fn render_reg16(r: Reg16) -> String {
    match r {
        Reg16::Af => "af",
        Reg16::Bc => "bc",
        Reg16::De => "de",
        Reg16::Hl => "hl",
        Reg16::Ix => "ix",
        Reg16::Iy => "iy",
        Reg16::Sp => "sp",
    }
    .to_string()
}

fn render_indirect(ind: &Indirect) -> String {
    match ind {
        Indirect::Hl => "(hl)".to_string(),
        Indirect::Indexed { base, slot, byte_offset: 0 } => format!("({}+{})", render_reg16(*base), slot),
        Indirect::Indexed { base, slot, byte_offset } => format!("({}+{}+{byte_offset})", render_reg16(*base), slot),
        Indirect::Absolute { name, byte_offset: 0 } => format!("({name})"),
        Indirect::Absolute { name, byte_offset } => format!("({name}+{byte_offset})"),
    }
}

fn hex(value: i64, digits: usize) -> String {
    if value < 0 {
        format!("-${:0width$X}", -value, width = digits)
    } else {
        format!("${:0width$X}", value, width = digits)
    }
}
