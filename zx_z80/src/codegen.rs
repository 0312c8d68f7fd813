//! IR -> Z80 virtual-register codegen (spec component C12): expands each
//! IR instruction into a deterministic sequence of Z80 IC instructions that
//! manipulate virtual registers, per section 4.5's conventions --
//!
//! - an 8-bit IR value occupies one vr half, a 16-bit IR value a vrr pair;
//! - 16-bit add has direct hardware support (`add hl,ss`); 16-bit subtract
//!   and comparison are synthesized as `or a` (clear carry) + `sbc hl,ss`;
//!   16-bit bitwise ops have no hardware form and are applied byte-wise;
//! - loads/stores of a computed address go through HL, or through
//!   `(ix+slot)` for a named local/argument;
//! - the prologue pushes IX, sets IX=SP, then reserves the frame; the
//!   epilogue restores SP from IX, pops IX, and returns;
//! - call arguments are pushed in reverse order, uniformly widened to 16
//!   bits (this compiler's one default-promotion simplification, recorded
//!   in the design ledger), and the caller discards them after the call;
//! - the designated return register pair is BC.
//!
//! Every local and argument the source program declares becomes a named
//! frame slot up front; pure IR temporaries (`%N`) live in virtual
//! registers that [`crate::regalloc`] spills to synthesized slots later.

use crate::instruction::{Instruction as ZInstr, LabeledInstr as ZLabeled, Opcode as ZOp};
use crate::module::Module as ZModule;
use crate::operand::{Cond, Operand as ZOperand, Reg16, Reg8, Vr, VrPart, Vrr};
use crate::proc::{DataEntry, DataWidth, Decl as ZDecl, LocalVar, Procedure as ZProcedure, SlotKind, Variable as ZVariable};
use std::collections::HashMap;
use std::rc::Rc;
use zx_ir::{
    Decl as IrDecl, Instruction as IrInstr, IrType, LabeledInstr as IrLabeled, Module as IrModule, Opcode as IrOp,
    Operand as IrOperand, Procedure as IrProcedure, Variable as IrVariable,
};

pub fn generate_module(ir: &IrModule) -> ZModule {
    let mut out = ZModule::new();
    for decl in &ir.decls {
        match decl {
            IrDecl::Variable(v) => out.add(ZDecl::Variable(lower_variable(v))),
            IrDecl::Procedure(p) => {
                let proc = lower_procedure(p, &mut out);
                out.add(ZDecl::Procedure(proc));
            }
        }
    }
    out
}

fn lower_variable(v: &IrVariable) -> ZVariable {
    let data = v.data.iter().map(|e| DataEntry { width: DataWidth::from_bit_width(e.ty.width()), value: e.value }).collect();
    ZVariable { name: v.name.clone(), data }
}

/// Where a name or a freshly computed value currently lives: a virtual
/// register/pair (not yet spilled), or a named frame/global slot (a
/// source-level local, argument, or global variable).
#[derive(Clone)]
enum Loc {
    Vr(Vr),
    Vrr(Vrr),
    Frame { name: Rc<str>, width: u16 },
    Global { name: Rc<str>, width: u16 },
}

struct LabelGen {
    next: u32,
}

impl LabelGen {
    fn fresh(&mut self) -> Rc<str> {
        let n = self.next;
        self.next += 1;
        Rc::from(format!("_cg_{n}"))
    }
}

struct Ctx<'m> {
    module: &'m mut ZModule,
    labels: LabelGen,
    next_vr: u32,
    next_vrr: u32,
    bindings: HashMap<Rc<str>, Loc>,
    body: Vec<ZLabeled>,
    pending_labels: Vec<Rc<str>>,
    exit_label: Rc<str>,
}

fn lower_procedure(ir_proc: &IrProcedure, module: &mut ZModule) -> ZProcedure {
    let mut proc = ZProcedure::new(ir_proc.name.clone());
    let mut bindings = HashMap::new();

    for arg in &ir_proc.args {
        // every argument occupies exactly 2 bytes of frame space, matching
        // the uniform 16-bit-per-argument calling convention `lower_call`
        // below pushes with -- so a `char` argument still reserves a word.
        proc.locals.push(LocalVar::new(arg.name.clone(), 2, SlotKind::Arg));
        bindings.insert(arg.name.clone(), Loc::Frame { name: arg.name.clone(), width: arg.ty.width() });
    }
    for local in &ir_proc.locals {
        let size = local.ty.bytes().max(1);
        proc.locals.push(LocalVar::new(local.name.clone(), size, SlotKind::Local));
        bindings.insert(local.name.clone(), Loc::Frame { name: local.name.clone(), width: local.ty.width() });
    }
    // globals are bound by name exactly like locals; a scalar global's
    // width comes from its single data entry, an aggregate's from its
    // decay to a 16-bit address.
    for decl in &module.decls {
        if let ZDecl::Variable(v) = decl {
            let width = match v.data.as_slice() {
                [entry] => entry.width.bytes() * 8,
                _ => 16,
            };
            bindings.entry(v.name.clone()).or_insert(Loc::Global { name: v.name.clone(), width });
        }
    }

    let exit_label: Rc<str> = Rc::from(format!("__exit_{}", ir_proc.name));
    let mut ctx = Ctx {
        module,
        labels: LabelGen { next: 0 },
        next_vr: 0,
        next_vrr: 0,
        bindings,
        body: Vec::new(),
        pending_labels: Vec::new(),
        exit_label: exit_label.clone(),
    };

    // prologue: push the caller's frame pointer, make IX our frame
    // pointer, then reserve the frame (size filled in once the allocator
    // has placed every spill slot).
    ctx.emit(ZInstr::new(ZOp::Push, vec![ZOperand::Reg16(Reg16::Ix)]));
    ctx.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg16(Reg16::Ix), ZOperand::Imm(0)]));
    ctx.emit(ZInstr::new(ZOp::Add, vec![ZOperand::Reg16(Reg16::Ix), ZOperand::Reg16(Reg16::Sp)]));
    ctx.emit(ZInstr::new(
        ZOp::Ld,
        vec![ZOperand::Reg16(Reg16::Hl), ZOperand::Symbol(Rc::from("__framesize_neg"))],
    ));
    ctx.emit(ZInstr::new(ZOp::Add, vec![ZOperand::Reg16(Reg16::Hl), ZOperand::Reg16(Reg16::Sp)]));
    ctx.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg16(Reg16::Sp), ZOperand::Reg16(Reg16::Hl)]));

    for li in &ir_proc.body {
        ctx.lower_instr(li);
    }
    ctx.flush_trailing_labels();

    // epilogue, reached by every `return` through a jump to `exit_label`
    // (and by plain fallthrough, for a function with no explicit return).
    ctx.pending_labels.push(exit_label);
    ctx.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg16(Reg16::Sp), ZOperand::Reg16(Reg16::Ix)]));
    ctx.emit(ZInstr::new(ZOp::Pop, vec![ZOperand::Reg16(Reg16::Ix)]));
    ctx.emit(ZInstr::new(ZOp::Ret, vec![]));

    proc.body = ctx.body;
    proc
}

impl<'m> Ctx<'m> {
    fn emit(&mut self, instr: ZInstr) {
        if self.pending_labels.is_empty() {
            self.body.push(ZLabeled { label: None, instr });
            return;
        }
        let last = self.pending_labels.pop().unwrap();
        for extra in self.pending_labels.drain(..) {
            self.body.push(ZLabeled { label: Some(extra), instr: ZInstr::new(ZOp::Nop, vec![]) });
        }
        self.body.push(ZLabeled { label: Some(last), instr });
    }

    fn flush_trailing_labels(&mut self) {
        for label in self.pending_labels.drain(..) {
            self.body.push(ZLabeled { label: Some(label), instr: ZInstr::new(ZOp::Nop, vec![]) });
        }
    }

    fn fresh_vr(&mut self) -> Vr {
        let id = self.next_vr;
        self.next_vr += 1;
        Vr { id, part: VrPart::Whole }
    }

    fn fresh_vrr(&mut self) -> Vrr {
        let id = self.next_vrr;
        self.next_vrr += 1;
        Vrr { id }
    }

    fn loc_width(&self, loc: &Loc) -> u16 {
        match loc {
            Loc::Vr(_) => 8,
            Loc::Vrr(_) => 16,
            Loc::Frame { width, .. } | Loc::Global { width, .. } => *width,
        }
    }

    // -- moving values between locations -----------------------------------

    fn load_reg8(&mut self, reg: Reg8, loc: &Loc) {
        match loc {
            Loc::Vr(v) => self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(reg), ZOperand::Vr(*v)])),
            Loc::Vrr(v) => self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(reg), ZOperand::Vr(v.lo())])),
            Loc::Frame { name, .. } => {
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(reg), ZOperand::slot(Reg16::Ix, name.clone())]))
            }
            Loc::Global { name, .. } => {
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(Reg8::A), ZOperand::absolute(name.clone(), 0)]));
                if reg != Reg8::A {
                    self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(reg), ZOperand::Reg8(Reg8::A)]));
                }
            }
        }
    }

    fn store_reg8(&mut self, reg: Reg8, dest: &Loc) {
        match dest {
            Loc::Vr(v) => self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(*v), ZOperand::Reg8(reg)])),
            Loc::Vrr(v) => self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(v.lo()), ZOperand::Reg8(reg)])),
            Loc::Frame { name, .. } => {
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::slot(Reg16::Ix, name.clone()), ZOperand::Reg8(reg)]))
            }
            Loc::Global { name, .. } => {
                if reg != Reg8::A {
                    self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(reg)]));
                }
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::absolute(name.clone(), 0), ZOperand::Reg8(Reg8::A)]));
            }
        }
    }

    fn load_reg16(&mut self, reg: Reg16, loc: &Loc) {
        match loc {
            Loc::Vrr(v) => {
                self.load_reg8(reg.lo(), &Loc::Vr(v.lo()));
                self.load_reg8(reg.hi(), &Loc::Vr(v.hi()));
            }
            Loc::Vr(v) => {
                self.load_reg8(reg.lo(), &Loc::Vr(*v));
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(reg.hi()), ZOperand::Imm(0)]));
            }
            Loc::Frame { name, .. } => {
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(reg.lo()), ZOperand::slot(Reg16::Ix, name.clone())]));
                self.emit(ZInstr::new(
                    ZOp::Ld,
                    vec![ZOperand::Reg8(reg.hi()), ZOperand::slot_at(Reg16::Ix, name.clone(), 1)],
                ));
            }
            Loc::Global { name, .. } => {
                if reg == Reg16::Hl {
                    self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg16(Reg16::Hl), ZOperand::absolute(name.clone(), 0)]));
                } else {
                    self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg16(Reg16::Hl), ZOperand::absolute(name.clone(), 0)]));
                    self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(reg.lo()), ZOperand::Reg8(Reg8::L)]));
                    self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(reg.hi()), ZOperand::Reg8(Reg8::H)]));
                }
            }
        }
    }

    fn store_reg16(&mut self, reg: Reg16, dest: &Loc) {
        match dest {
            Loc::Vrr(v) => {
                self.store_reg8(reg.lo(), &Loc::Vr(v.lo()));
                self.store_reg8(reg.hi(), &Loc::Vr(v.hi()));
            }
            Loc::Vr(v) => self.store_reg8(reg.lo(), &Loc::Vr(*v)),
            Loc::Frame { name, .. } => {
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::slot(Reg16::Ix, name.clone()), ZOperand::Reg8(reg.lo())]));
                self.emit(ZInstr::new(
                    ZOp::Ld,
                    vec![ZOperand::slot_at(Reg16::Ix, name.clone(), 1), ZOperand::Reg8(reg.hi())],
                ));
            }
            Loc::Global { name, .. } => {
                if reg != Reg16::Hl {
                    self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(Reg8::L), ZOperand::Reg8(reg.lo())]));
                    self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(Reg8::H), ZOperand::Reg8(reg.hi())]));
                }
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::absolute(name.clone(), 0), ZOperand::Reg16(Reg16::Hl)]));
            }
        }
    }

    fn copy_into_vr(&mut self, dst: Vr, src: &Loc) {
        match src {
            Loc::Vr(v) => self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(dst), ZOperand::Vr(*v)])),
            Loc::Vrr(v) => self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(dst), ZOperand::Vr(v.lo())])),
            Loc::Frame { name, .. } => {
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(dst), ZOperand::slot(Reg16::Ix, name.clone())]))
            }
            Loc::Global { .. } => {
                self.load_reg8(Reg8::A, src);
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(dst), ZOperand::Reg8(Reg8::A)]));
            }
        }
    }

    fn copy_into_vrr(&mut self, dst: Vrr, src: &Loc) {
        match src {
            Loc::Vrr(v) => {
                self.copy_into_vr(dst.lo(), &Loc::Vr(v.lo()));
                self.copy_into_vr(dst.hi(), &Loc::Vr(v.hi()));
            }
            Loc::Vr(v) => {
                self.copy_into_vr(dst.lo(), &Loc::Vr(*v));
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(dst.hi()), ZOperand::Imm(0)]));
            }
            Loc::Frame { name, .. } => {
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(dst.lo()), ZOperand::slot(Reg16::Ix, name.clone())]));
                self.emit(ZInstr::new(
                    ZOp::Ld,
                    vec![ZOperand::Vr(dst.hi()), ZOperand::slot_at(Reg16::Ix, name.clone(), 1)],
                ));
            }
            Loc::Global { .. } => {
                self.load_reg16(Reg16::Hl, src);
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(dst.lo()), ZOperand::Reg8(Reg8::L)]));
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(dst.hi()), ZOperand::Reg8(Reg8::H)]));
            }
        }
    }

    fn copy_fresh(&mut self, loc: &Loc, width: u16) -> Loc {
        if width <= 8 {
            let d = self.fresh_vr();
            self.copy_into_vr(d, loc);
            Loc::Vr(d)
        } else {
            let d = self.fresh_vrr();
            self.copy_into_vrr(d, loc);
            Loc::Vrr(d)
        }
    }

    // -- resolving IR operands ------------------------------------------

    fn natural(&mut self, op: &IrOperand) -> Loc {
        match op {
            IrOperand::Immediate(n) => {
                let d = self.fresh_vrr();
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.lo()), ZOperand::Imm(n & 0xff)]));
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.hi()), ZOperand::Imm((n >> 8) & 0xff)]));
                Loc::Vrr(d)
            }
            IrOperand::Var(name) => {
                self.bindings.get(name).cloned().unwrap_or_else(|| panic!("codegen: unbound IR name '{name}'"))
            }
            IrOperand::List(_) => panic!("codegen: list operand outside a call's argument position"),
        }
    }

    fn coerce(&mut self, loc: Loc, from: u16, to: u16) -> Loc {
        if from == to {
            return loc;
        }
        if to <= 8 {
            let d = self.fresh_vr();
            self.copy_into_vr(d, &loc);
            Loc::Vr(d)
        } else if from <= 8 {
            // widening: this backend does not track signedness past the IR
            // boundary, so every widen zero-extends.
            let d = self.fresh_vrr();
            self.copy_into_vr(d.lo(), &loc);
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.hi()), ZOperand::Imm(0)]));
            Loc::Vrr(d)
        } else {
            self.copy_fresh(&loc, to)
        }
    }

    fn load_value(&mut self, op: &IrOperand, width: u16) -> Loc {
        if let IrOperand::Immediate(n) = op {
            return if width <= 8 {
                let d = self.fresh_vr();
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d), ZOperand::Imm(n & 0xff)]));
                Loc::Vr(d)
            } else {
                let d = self.fresh_vrr();
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.lo()), ZOperand::Imm(n & 0xff)]));
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.hi()), ZOperand::Imm((n >> 8) & 0xff)]));
                Loc::Vrr(d)
            };
        }
        let natural = self.natural(op);
        let nat_width = self.loc_width(&natural);
        self.coerce(natural, nat_width, width)
    }

    fn bind_result(&mut self, name: &Rc<str>, loc: Loc) {
        if let Some(existing) = self.bindings.get(name).cloned() {
            let width = self.loc_width(&existing);
            self.store_value(&existing, &loc, width);
        } else {
            self.bindings.insert(name.clone(), loc);
        }
    }

    fn store_value(&mut self, dest: &Loc, value: &Loc, width: u16) {
        if width <= 8 {
            self.load_reg8(Reg8::A, value);
            self.store_reg8(Reg8::A, dest);
        } else {
            self.load_reg16(Reg16::Hl, value);
            self.store_reg16(Reg16::Hl, dest);
        }
    }

    // -- per-opcode lowering ----------------------------------------------

    fn lower_instr(&mut self, li: &IrLabeled) {
        for label in &li.label {
            self.pending_labels.push(label.clone());
        }
        let instr = &li.instr;
        match instr.opcode {
            IrOp::Mov => self.lower_mov(instr),
            IrOp::Add | IrOp::Sub | IrOp::And | IrOp::Or | IrOp::Xor => self.lower_arith(instr),
            IrOp::Mul | IrOp::Div | IrOp::UDiv | IrOp::Mod | IrOp::UMod => self.lower_runtime_binop(instr),
            IrOp::Shl | IrOp::Shr | IrOp::AShr => self.lower_shift(instr),
            IrOp::Neg => self.lower_neg(instr),
            IrOp::Not => self.lower_not(instr),
            IrOp::LogNot => self.lower_lognot(instr),
            IrOp::CmpEq | IrOp::CmpNe | IrOp::CmpLt | IrOp::CmpLe | IrOp::CmpGt | IrOp::CmpGe | IrOp::CmpLtU
            | IrOp::CmpLeU | IrOp::CmpGtU | IrOp::CmpGeU => self.lower_cmp(instr),
            IrOp::Trunc | IrOp::SExt | IrOp::ZExt => self.lower_convert(instr),
            IrOp::Load => self.lower_load(instr),
            IrOp::Store => self.lower_store(instr),
            IrOp::AddrOf => self.lower_addrof(instr),
            IrOp::Call | IrOp::CallVariadic => self.lower_call(instr),
            IrOp::Jump => self.lower_jump(instr),
            IrOp::BranchIfZero => self.lower_branch(instr, Cond::Z),
            IrOp::BranchIfNonZero => self.lower_branch(instr, Cond::Nz),
            IrOp::Return => self.lower_return(instr),
        }
    }

    fn lower_mov(&mut self, instr: &IrInstr) {
        let (Some(name), Some(ty)) = (&instr.result, &instr.ty) else {
            // a label-anchor placeholder with no effect of its own.
            return;
        };
        let width = ty.width();
        let v = self.load_value(&instr.operands[0], width);
        self.bind_result(name, v);
    }

    fn result_name_ty(instr: &IrInstr) -> (Rc<str>, IrType) {
        (
            instr.result.clone().expect("instruction missing a result name"),
            instr.ty.expect("instruction missing a result type"),
        )
    }

    fn lower_arith(&mut self, instr: &IrInstr) {
        let (name, ty) = Self::result_name_ty(instr);
        let width = ty.width();
        let lv = self.load_value(&instr.operands[0], width);
        let rv = self.load_value(&instr.operands[1], width);
        let dst = self.copy_fresh(&lv, width);

        match (instr.opcode, width) {
            (IrOp::Add, w) if w <= 8 => self.emit_acc8(ZOp::Add, &dst, &rv),
            (IrOp::Add, _) => self.emit_hl_pair(ZOp::Add, &dst, &rv),
            (IrOp::Sub, w) if w <= 8 => self.emit_acc8(ZOp::Sub, &dst, &rv),
            (IrOp::Sub, _) => {
                self.emit(ZInstr::new(ZOp::Or, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(Reg8::A)]));
                self.emit_hl_pair(ZOp::Sbc, &dst, &rv);
            }
            (IrOp::And, w) if w <= 8 => self.emit_acc8(ZOp::And, &dst, &rv),
            (IrOp::Or, w) if w <= 8 => self.emit_acc8(ZOp::Or, &dst, &rv),
            (IrOp::Xor, w) if w <= 8 => self.emit_acc8(ZOp::Xor, &dst, &rv),
            (IrOp::And, _) | (IrOp::Or, _) | (IrOp::Xor, _) => self.emit_bytewise(instr.opcode, &dst, &rv),
            _ => unreachable!("lower_arith only handles Add/Sub/And/Or/Xor"),
        }
        self.bind_result(&name, dst);
    }

    /// `op a,src` / `op src` (8-bit accumulator-form ALU op): loads `dst`
    /// into A, operates against `src`, stores the result back into `dst`.
    fn emit_acc8(&mut self, op: ZOp, dst: &Loc, src: &Loc) {
        self.load_reg8(Reg8::A, dst);
        let src_operand = self.operand8(src);
        self.emit(ZInstr::new(op, vec![ZOperand::Reg8(Reg8::A), src_operand]));
        self.store_reg8(Reg8::A, dst);
    }

    /// `op hl,ss`: loads `dst` into HL, `src` into DE, operates, stores HL
    /// back into `dst`.
    fn emit_hl_pair(&mut self, op: ZOp, dst: &Loc, src: &Loc) {
        self.load_reg16(Reg16::Hl, dst);
        self.load_reg16(Reg16::De, src);
        self.emit(ZInstr::new(op, vec![ZOperand::Reg16(Reg16::Hl), ZOperand::Reg16(Reg16::De)]));
        self.store_reg16(Reg16::Hl, dst);
    }

    /// 16-bit bitwise ops have no hardware form; apply the 8-bit op to each
    /// byte of the pair independently.
    fn emit_bytewise(&mut self, opcode: IrOp, dst: &Loc, src: &Loc) {
        let op = match opcode {
            IrOp::And => ZOp::And,
            IrOp::Or => ZOp::Or,
            IrOp::Xor => ZOp::Xor,
            _ => unreachable!(),
        };
        let (dst_lo, dst_hi, src_lo, src_hi) = match (dst, src) {
            (Loc::Vrr(d), Loc::Vrr(s)) => (Loc::Vr(d.lo()), Loc::Vr(d.hi()), Loc::Vr(s.lo()), Loc::Vr(s.hi())),
            _ => unreachable!("emit_bytewise is only used for width-16 locations"),
        };
        self.emit_acc8(op, &dst_lo, &src_lo);
        self.emit_acc8(op, &dst_hi, &src_hi);
    }

    /// The operand form an 8-bit ALU op can take `src` as directly -- a
    /// virtual register, a frame slot (`(ix+slot)` is a legal ALU operand
    /// on real Z80), or A itself after a global load (globals have no
    /// direct-addressed ALU form, only `ld a,(nn)`/`ld (nn),a`).
    fn operand8(&mut self, src: &Loc) -> ZOperand {
        match src {
            Loc::Vr(v) => ZOperand::Vr(*v),
            Loc::Vrr(v) => ZOperand::Vr(v.lo()),
            Loc::Frame { name, .. } => ZOperand::slot(Reg16::Ix, name.clone()),
            Loc::Global { .. } => {
                self.load_reg8(Reg8::B, src);
                ZOperand::Reg8(Reg8::B)
            }
        }
    }

    /// Multiplication, division, modulo and variable-amount shifts have no
    /// Z80 hardware support; this compiler routes them through extern
    /// runtime helpers taking their two 16-bit operands in DE/BC and
    /// returning a 16-bit result in BC, matching the return convention
    /// every procedure call already uses.
    fn lower_runtime_binop(&mut self, instr: &IrInstr) {
        let (name, ty) = Self::result_name_ty(instr);
        let width = ty.width().max(16);
        let lv = self.load_value(&instr.operands[0], width);
        let rv = self.load_value(&instr.operands[1], width);
        let helper = runtime_helper_name(instr.opcode, width);
        self.module.ensure_extern(helper.clone());
        self.load_reg16(Reg16::De, &lv);
        self.load_reg16(Reg16::Bc, &rv);
        self.emit(ZInstr::new(ZOp::Call, vec![ZOperand::Symbol(helper)]));
        let d = self.fresh_vrr();
        self.store_reg16(Reg16::Bc, &Loc::Vrr(d));
        self.bind_result(&name, Loc::Vrr(d));
    }

    fn lower_shift(&mut self, instr: &IrInstr) {
        let (name, ty) = Self::result_name_ty(instr);
        let width = ty.width();
        // a constant shift amount of 1 on a 16-bit value has a direct
        // hardware idiom (`add hl,hl` doubles HL, i.e. shifts left by one);
        // every other case -- non-constant amounts, right shifts, amounts
        // other than one -- is routed through the generic runtime helper.
        if width >= 16 {
            if let (IrOp::Shl, IrOperand::Immediate(1)) = (instr.opcode, &instr.operands[1]) {
                let lv = self.load_value(&instr.operands[0], width);
                let dst = self.copy_fresh(&lv, width);
                self.load_reg16(Reg16::Hl, &dst);
                self.emit(ZInstr::new(ZOp::Add, vec![ZOperand::Reg16(Reg16::Hl), ZOperand::Reg16(Reg16::Hl)]));
                self.store_reg16(Reg16::Hl, &dst);
                self.bind_result(&name, dst);
                return;
            }
        }
        self.lower_runtime_binop(instr);
    }

    fn lower_neg(&mut self, instr: &IrInstr) {
        let (name, ty) = Self::result_name_ty(instr);
        let width = ty.width();
        let v = self.load_value(&instr.operands[0], width);
        if width <= 8 {
            self.load_reg8(Reg8::A, &v);
            self.emit(ZInstr::new(ZOp::Neg, vec![ZOperand::Reg8(Reg8::A)]));
            let d = self.fresh_vr();
            self.store_reg8(Reg8::A, &Loc::Vr(d));
            self.bind_result(&name, Loc::Vr(d));
        } else {
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg16(Reg16::Hl), ZOperand::Imm(0)]));
            self.load_reg16(Reg16::De, &v);
            self.emit(ZInstr::new(ZOp::Or, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(Reg8::A)]));
            self.emit(ZInstr::new(ZOp::Sbc, vec![ZOperand::Reg16(Reg16::Hl), ZOperand::Reg16(Reg16::De)]));
            let d = self.fresh_vrr();
            self.store_reg16(Reg16::Hl, &Loc::Vrr(d));
            self.bind_result(&name, Loc::Vrr(d));
        }
    }

    fn lower_not(&mut self, instr: &IrInstr) {
        let (name, ty) = Self::result_name_ty(instr);
        let width = ty.width();
        let v = self.load_value(&instr.operands[0], width);
        if width <= 8 {
            self.load_reg8(Reg8::A, &v);
            self.emit(ZInstr::new(ZOp::Cpl, vec![ZOperand::Reg8(Reg8::A)]));
            let d = self.fresh_vr();
            self.store_reg8(Reg8::A, &Loc::Vr(d));
            self.bind_result(&name, Loc::Vr(d));
        } else {
            let d = self.fresh_vrr();
            self.load_reg16(Reg16::Hl, &v);
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(Reg8::L)]));
            self.emit(ZInstr::new(ZOp::Cpl, vec![ZOperand::Reg8(Reg8::A)]));
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.lo()), ZOperand::Reg8(Reg8::A)]));
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(Reg8::H)]));
            self.emit(ZInstr::new(ZOp::Cpl, vec![ZOperand::Reg8(Reg8::A)]));
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.hi()), ZOperand::Reg8(Reg8::A)]));
            self.bind_result(&name, Loc::Vrr(d));
        }
    }

    /// Sets the zero flag from `loc`'s value without needing to know which
    /// physical register it will end up in: 8-bit values are tested with
    /// `or a,a` after a load into A; 16-bit values by ORing H into A then
    /// ORing L in, the usual Z80 16-bit-is-zero idiom.
    fn test_zero(&mut self, loc: &Loc) {
        let width = self.loc_width(loc);
        if width <= 8 {
            self.load_reg8(Reg8::A, loc);
            self.emit(ZInstr::new(ZOp::Or, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(Reg8::A)]));
        } else {
            self.load_reg16(Reg16::Hl, loc);
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(Reg8::H)]));
            self.emit(ZInstr::new(ZOp::Or, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(Reg8::L)]));
        }
    }

    fn lower_lognot(&mut self, instr: &IrInstr) {
        let name = instr.result.clone().expect("LogNot missing result name");
        let v = self.natural(&instr.operands[0]);
        self.test_zero(&v);
        let true_label = self.labels.fresh();
        let done_label = self.labels.fresh();
        self.emit(ZInstr::new(ZOp::Jp, vec![ZOperand::Symbol(true_label.clone())]).with_cond(Cond::Z));
        let d = self.fresh_vr();
        self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d), ZOperand::Imm(0)]));
        self.emit(ZInstr::new(ZOp::Jp, vec![ZOperand::Symbol(done_label.clone())]));
        self.pending_labels.push(true_label);
        self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d), ZOperand::Imm(1)]));
        self.pending_labels.push(done_label);
        self.bind_result(&name, Loc::Vr(d));
    }

    fn lower_cmp(&mut self, instr: &IrInstr) {
        let name = instr.result.clone().expect("comparison missing result name");
        let lv_natural = self.natural(&instr.operands[0]);
        let lv_width = self.loc_width(&lv_natural);
        let width = lv_width.max(16);
        let mut lv = self.coerce(lv_natural, lv_width, width);
        let mut rv = self.load_value(&instr.operands[1], width);
        use IrOp::*;
        let (swap, signed, cond) = match instr.opcode {
            CmpEq => (false, false, Cond::Z),
            CmpNe => (false, false, Cond::Nz),
            CmpLtU => (false, false, Cond::C),
            CmpGeU => (false, false, Cond::Nc),
            CmpGtU => (true, false, Cond::C),
            CmpLeU => (true, false, Cond::Nc),
            CmpLt => (false, true, Cond::C),
            CmpGe => (false, true, Cond::Nc),
            CmpGt => (true, true, Cond::C),
            CmpLe => (true, true, Cond::Nc),
            _ => unreachable!("lower_cmp only handles comparison opcodes"),
        };
        if swap {
            std::mem::swap(&mut lv, &mut rv);
        }
        self.load_reg16(Reg16::Hl, &lv);
        self.load_reg16(Reg16::De, &rv);
        if signed {
            // flip the sign bit of both operands' high bytes: this maps
            // two's-complement ordering onto unsigned ordering, so the same
            // carry-flag test below works for both signed and unsigned.
            for reg in [Reg8::H, Reg8::D] {
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(reg)]));
                self.emit(ZInstr::new(ZOp::Xor, vec![ZOperand::Reg8(Reg8::A), ZOperand::Imm(0x80)]));
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(reg), ZOperand::Reg8(Reg8::A)]));
            }
        }
        self.emit(ZInstr::new(ZOp::Or, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(Reg8::A)]));
        self.emit(ZInstr::new(ZOp::Sbc, vec![ZOperand::Reg16(Reg16::Hl), ZOperand::Reg16(Reg16::De)]));
        let true_label = self.labels.fresh();
        let done_label = self.labels.fresh();
        self.emit(ZInstr::new(ZOp::Jp, vec![ZOperand::Symbol(true_label.clone())]).with_cond(cond));
        let d = self.fresh_vrr();
        self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.lo()), ZOperand::Imm(0)]));
        self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.hi()), ZOperand::Imm(0)]));
        self.emit(ZInstr::new(ZOp::Jp, vec![ZOperand::Symbol(done_label.clone())]));
        self.pending_labels.push(true_label);
        self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.lo()), ZOperand::Imm(1)]));
        self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.hi()), ZOperand::Imm(0)]));
        self.pending_labels.push(done_label);
        self.bind_result(&name, Loc::Vrr(d));
    }

    fn lower_convert(&mut self, instr: &IrInstr) {
        let (name, to_ty) = Self::result_name_ty(instr);
        let to = to_ty.width();
        let from_loc = self.natural(&instr.operands[0]);
        let from = self.loc_width(&from_loc);
        let result = match instr.opcode {
            IrOp::Trunc => self.coerce(from_loc, from, to),
            IrOp::ZExt => self.coerce(from_loc, from, to),
            IrOp::SExt if from <= 8 && to >= 16 => {
                let d = self.fresh_vrr();
                self.load_reg8(Reg8::A, &from_loc);
                self.store_reg8(Reg8::A, &Loc::Vr(d.lo()));
                self.emit(ZInstr::new(ZOp::Add, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(Reg8::A)]));
                self.emit(ZInstr::new(ZOp::Sbc, vec![ZOperand::Reg8(Reg8::A), ZOperand::Reg8(Reg8::A)]));
                self.store_reg8(Reg8::A, &Loc::Vr(d.hi()));
                Loc::Vrr(d)
            }
            IrOp::SExt => self.coerce(from_loc, from, to),
            _ => unreachable!(),
        };
        self.bind_result(&name, result);
    }

    fn lower_load(&mut self, instr: &IrInstr) {
        let (name, ty) = Self::result_name_ty(instr);
        let addr = self.load_value(&instr.operands[0], 16);
        self.load_reg16(Reg16::Hl, &addr);
        let width = ty.width();
        if width <= 8 {
            let d = self.fresh_vr();
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d), ZOperand::Indirect(crate::operand::Indirect::Hl)]));
            self.bind_result(&name, Loc::Vr(d));
        } else {
            let d = self.fresh_vrr();
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.lo()), ZOperand::Indirect(crate::operand::Indirect::Hl)]));
            self.emit(ZInstr::new(ZOp::Inc, vec![ZOperand::Reg16(Reg16::Hl)]));
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Vr(d.hi()), ZOperand::Indirect(crate::operand::Indirect::Hl)]));
            self.bind_result(&name, Loc::Vrr(d));
        }
    }

    fn lower_store(&mut self, instr: &IrInstr) {
        let addr = self.load_value(&instr.operands[0], 16);
        self.load_reg16(Reg16::Hl, &addr);
        let width = instr.ty.map(|t| t.width()).unwrap_or(16);
        let value = self.load_value(&instr.operands[1], width);
        if width <= 8 {
            self.load_reg8(Reg8::A, &value);
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Indirect(crate::operand::Indirect::Hl), ZOperand::Reg8(Reg8::A)]));
        } else {
            self.load_reg16(Reg16::De, &value);
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Indirect(crate::operand::Indirect::Hl), ZOperand::Reg8(Reg8::E)]));
            self.emit(ZInstr::new(ZOp::Inc, vec![ZOperand::Reg16(Reg16::Hl)]));
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Indirect(crate::operand::Indirect::Hl), ZOperand::Reg8(Reg8::D)]));
        }
    }

    fn lower_addrof(&mut self, instr: &IrInstr) {
        let name = instr.result.clone().expect("AddrOf missing result name");
        let IrOperand::Var(target) = &instr.operands[0] else { panic!("AddrOf operand must be a named variable") };
        let target_loc = self.bindings.get(target).cloned().unwrap_or_else(|| panic!("codegen: unbound name '{target}'"));
        match target_loc {
            Loc::Frame { name: slot, .. } => {
                self.emit(ZInstr::new(ZOp::Push, vec![ZOperand::Reg16(Reg16::Ix)]));
                self.emit(ZInstr::new(ZOp::Pop, vec![ZOperand::Reg16(Reg16::Hl)]));
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg16(Reg16::De), ZOperand::Symbol(slot)]));
                self.emit(ZInstr::new(ZOp::Add, vec![ZOperand::Reg16(Reg16::Hl), ZOperand::Reg16(Reg16::De)]));
            }
            Loc::Global { name: gname, .. } => {
                self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg16(Reg16::Hl), ZOperand::Symbol(gname)]));
            }
            Loc::Vr(_) | Loc::Vrr(_) => panic!("codegen: address-of a non-addressable temporary"),
        }
        let d = self.fresh_vrr();
        self.store_reg16(Reg16::Hl, &Loc::Vrr(d));
        self.bind_result(&name, Loc::Vrr(d));
    }

    fn lower_call(&mut self, instr: &IrInstr) {
        let IrOperand::Var(callee) = &instr.operands[0] else { panic!("call target must be a named function") };
        let IrOperand::List(args) = &instr.operands[1] else { panic!("call's second operand must be an argument list") };
        let mut pushed = Vec::new();
        for arg in args.iter().rev() {
            let v = self.load_value(arg, 16);
            self.load_reg16(Reg16::Hl, &v);
            self.emit(ZInstr::new(ZOp::Push, vec![ZOperand::Reg16(Reg16::Hl)]));
            pushed.push(());
        }
        if instr.opcode == IrOp::CallVariadic {
            self.emit(ZInstr::new(ZOp::Ld, vec![ZOperand::Reg8(Reg8::B), ZOperand::Imm(args.len() as i64)]));
        }
        self.emit(ZInstr::new(ZOp::Call, vec![ZOperand::Symbol(callee.clone())]));
        for _ in &pushed {
            self.emit(ZInstr::new(ZOp::Pop, vec![ZOperand::Reg16(Reg16::Hl)]));
        }
        if let (Some(name), Some(ty)) = (&instr.result, &instr.ty) {
            let width = ty.width();
            if width <= 8 {
                let d = self.fresh_vr();
                self.store_reg8(Reg8::C, &Loc::Vr(d));
                self.bind_result(name, Loc::Vr(d));
            } else {
                let d = self.fresh_vrr();
                self.store_reg16(Reg16::Bc, &Loc::Vrr(d));
                self.bind_result(name, Loc::Vrr(d));
            }
        }
    }

    fn lower_jump(&mut self, instr: &IrInstr) {
        let IrOperand::Var(label) = &instr.operands[0] else { panic!("jump target must be a label") };
        self.emit(ZInstr::new(ZOp::Jp, vec![ZOperand::Symbol(label.clone())]));
    }

    fn lower_branch(&mut self, instr: &IrInstr, cond: Cond) {
        let v = self.natural(&instr.operands[0]);
        self.test_zero(&v);
        let IrOperand::Var(label) = &instr.operands[1] else { panic!("branch target must be a label") };
        self.emit(ZInstr::new(ZOp::Jp, vec![ZOperand::Symbol(label.clone())]).with_cond(cond));
    }

    fn lower_return(&mut self, instr: &IrInstr) {
        if let Some(op) = instr.operands.first() {
            let v = self.load_value(op, 16);
            self.load_reg16(Reg16::Bc, &v);
        }
        let exit = self.exit_label.clone();
        self.emit(ZInstr::new(ZOp::Jp, vec![ZOperand::Symbol(exit)]));
    }
}

fn runtime_helper_name(opcode: IrOp, width: u16) -> Rc<str> {
    let op = match opcode {
        IrOp::Mul => "mul",
        IrOp::Div => "div",
        IrOp::UDiv => "udiv",
        IrOp::Mod => "mod",
        IrOp::UMod => "umod",
        IrOp::Shl => "shl",
        IrOp::Shr => "shr",
        IrOp::AShr => "ashr",
        _ => unreachable!("runtime_helper_name only handles ops with no hardware support"),
    };
    Rc::from(format!("__{op}{width}"))
}
