//! Per-procedure register allocator (spec component C13): conservative,
//! local and spill-everything. Every virtual register or pair is given its
//! own named frame slot; each instruction referencing one is rewritten to
//! load it into a scratch physical register beforehand (if it's read) and
//! store it back afterward (if it's written), per [`crate::instruction::Opcode::operand_io`].
//! No value is assumed to survive in a physical register across more than
//! the single rewritten instruction it was loaded for.
//!
//! The scratch-register choice is a fixed, deterministic policy rather than
//! anything graph-colored or liveness-driven: the first distinct virtual id
//! an instruction references (in left-to-right operand order) takes the
//! primary scratch (`a` for 8-bit, `hl` for 16-bit), the second takes the
//! secondary (`c` / `de`), and a third (rare -- this backend's codegen
//! essentially never produces one) takes the tertiary (`b` / `bc`).

use crate::instruction::{Instruction as ZInstr, Io, LabeledInstr as ZLabeled, Opcode as ZOp};
use crate::module::Module;
use crate::operand::{Operand, Reg16, Reg8, Vr, VrPart, Vrr};
use crate::proc::{Decl, LocalVar, Procedure, SlotKind};
use std::collections::HashSet;
use std::rc::Rc;

pub fn allocate_module(module: &mut Module) {
    for decl in &mut module.decls {
        if let Decl::Procedure(proc) = decl {
            allocate_procedure(proc);
        }
    }
}

pub fn allocate_procedure(proc: &mut Procedure) {
    let mut known: HashSet<Rc<str>> =
        proc.locals.iter().map(|l| l.name.clone()).collect();
    let mut new_body = Vec::with_capacity(proc.body.len());

    for li in std::mem::take(&mut proc.body) {
        let ZLabeled { label, instr } = li;
        let rewritten = rewrite_instr(instr, proc, &mut known);
        attach_label(label, rewritten, &mut new_body);
    }
    proc.body = new_body;

    size_frame(proc);
    patch_framesize(proc);
}

fn attach_label(label: Option<Rc<str>>, mut group: Vec<ZInstr>, out: &mut Vec<ZLabeled>) {
    if group.is_empty() {
        group.push(ZInstr::new(ZOp::Nop, vec![]));
    }
    let mut iter = group.into_iter();
    out.push(ZLabeled { label, instr: iter.next().unwrap() });
    for instr in iter {
        out.push(ZLabeled { label: None, instr });
    }
}

/// Identifies a distinct virtual register group: a lone 8-bit `vr` stands
/// on its own, while a `vr` that addresses one byte of a `vrr` is keyed
/// together with that pair (so a single preload/poststore covers both
/// halves whenever either is referenced).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Byte(u32),
    Pair(u32),
}

fn key_of(op: &Operand) -> Option<Key> {
    match op {
        Operand::Vr(Vr { id, part: VrPart::Whole }) => Some(Key::Byte(*id)),
        Operand::Vr(Vr { id, part: VrPart::Low | VrPart::High }) => Some(Key::Pair(*id)),
        Operand::Vrr(Vrr { id }) => Some(Key::Pair(*id)),
        _ => None,
    }
}

fn slot_name(key: Key) -> Rc<str> {
    match key {
        Key::Byte(id) => Rc::from(format!("__vr{id}")),
        Key::Pair(id) => Rc::from(format!("__vrr{id}")),
    }
}

fn io_at(opcode: ZOp, index: usize) -> Io {
    opcode.operand_io().get(index).copied().unwrap_or(Io::Read)
}

fn rewrite_instr(instr: ZInstr, proc: &mut Procedure, known: &mut HashSet<Rc<str>>) -> Vec<ZInstr> {
    let ZInstr { opcode, operands, cond, comment } = instr;

    let mut order: Vec<Key> = Vec::new();
    let mut needs_read = std::collections::HashMap::new();
    let mut needs_write = std::collections::HashMap::new();
    for (i, op) in operands.iter().enumerate() {
        if let Some(k) = key_of(op) {
            if !order.contains(&k) {
                order.push(k);
            }
            match io_at(opcode, i) {
                Io::Read => *needs_read.entry(k).or_insert(false) |= true,
                Io::Write => *needs_write.entry(k).or_insert(false) |= true,
                Io::ReadWrite => {
                    *needs_read.entry(k).or_insert(false) |= true;
                    *needs_write.entry(k).or_insert(false) |= true;
                }
            }
        }
    }

    if order.is_empty() {
        return vec![ZInstr { opcode, operands, cond, comment }];
    }

    let mut out = Vec::new();
    let mut phys8 = std::collections::HashMap::new();
    let mut phys16 = std::collections::HashMap::new();
    let pool8 = [Reg8::A, Reg8::C, Reg8::B];
    let pool16 = [Reg16::Hl, Reg16::De, Reg16::Bc];

    for (i, key) in order.iter().enumerate() {
        let name = slot_name(*key);
        register_slot(proc, known, &name, *key);
        match key {
            Key::Byte(_) => {
                let reg = *pool8.get(i).expect("more than 3 distinct 8-bit virtual ids in one instruction");
                phys8.insert(*key, reg);
                if *needs_read.get(key).unwrap_or(&false) {
                    out.push(ZInstr::new(ZOp::Ld, vec![Operand::Reg8(reg), Operand::slot(Reg16::Ix, name.clone())]));
                }
            }
            Key::Pair(_) => {
                let reg = *pool16.get(i).expect("more than 3 distinct 16-bit virtual ids in one instruction");
                phys16.insert(*key, reg);
                if *needs_read.get(key).unwrap_or(&false) {
                    out.push(ZInstr::new(
                        ZOp::Ld,
                        vec![Operand::Reg8(reg.lo()), Operand::slot(Reg16::Ix, name.clone())],
                    ));
                    out.push(ZInstr::new(
                        ZOp::Ld,
                        vec![Operand::Reg8(reg.hi()), Operand::slot_at(Reg16::Ix, name.clone(), 1)],
                    ));
                }
            }
        }
    }

    let new_operands: Vec<Operand> = operands
        .into_iter()
        .map(|op| match key_of(&op) {
            Some(Key::Byte(id)) => Operand::Reg8(phys8[&Key::Byte(id)]),
            Some(Key::Pair(id)) => match op {
                Operand::Vr(Vr { part: VrPart::Low, .. }) => Operand::Reg8(phys16[&Key::Pair(id)].lo()),
                Operand::Vr(Vr { part: VrPart::High, .. }) => Operand::Reg8(phys16[&Key::Pair(id)].hi()),
                Operand::Vrr(_) => Operand::Reg16(phys16[&Key::Pair(id)]),
                _ => unreachable!(),
            },
            None => op,
        })
        .collect();
    out.push(ZInstr { opcode, operands: new_operands, cond, comment });

    for key in order {
        let name = slot_name(key);
        if !*needs_write.get(&key).unwrap_or(&false) {
            continue;
        }
        match key {
            Key::Byte(_) => {
                let reg = phys8[&key];
                out.push(ZInstr::new(ZOp::Ld, vec![Operand::slot(Reg16::Ix, name), Operand::Reg8(reg)]));
            }
            Key::Pair(_) => {
                let reg = phys16[&key];
                out.push(ZInstr::new(ZOp::Ld, vec![Operand::slot(Reg16::Ix, name.clone()), Operand::Reg8(reg.lo())]));
                out.push(ZInstr::new(ZOp::Ld, vec![Operand::slot_at(Reg16::Ix, name, 1), Operand::Reg8(reg.hi())]));
            }
        }
    }

    out
}

fn register_slot(proc: &mut Procedure, known: &mut HashSet<Rc<str>>, name: &Rc<str>, key: Key) {
    if known.contains(name) {
        return;
    }
    known.insert(name.clone());
    let size = match key {
        Key::Byte(_) => 1,
        Key::Pair(_) => 2,
    };
    proc.locals.push(LocalVar::new(name.clone(), size, SlotKind::Local));
}

fn size_frame(proc: &mut Procedure) {
    let mut arg_offset: i32 = 4;
    let mut local_bytes: i32 = 0;
    for local in &proc.locals {
        if local.kind == SlotKind::Local {
            local_bytes += local.size as i32;
        }
    }
    let mut running_local: i32 = 0;
    for local in &mut proc.locals {
        match local.kind {
            SlotKind::Arg => {
                local.offset = Some(arg_offset);
                arg_offset += local.size as i32;
            }
            SlotKind::Local => {
                running_local += local.size as i32;
                local.offset = Some(-running_local);
            }
        }
    }
    proc.frame_size = Some(local_bytes.max(0) as u16);
}

/// Codegen leaves a literal `Symbol("__framesize_neg")` in the prologue's
/// `ld hl,-framesize` step, since the frame size isn't known until every
/// spill slot above has been placed; patch it in now.
fn patch_framesize(proc: &mut Procedure) {
    let frame_size = proc.frame_size.unwrap_or(0) as i64;
    for li in &mut proc.body {
        for op in &mut li.instr.operands {
            if let Operand::Symbol(name) = op {
                if &**name == "__framesize_neg" {
                    *op = Operand::Imm(-frame_size);
                }
            }
        }
    }
}
