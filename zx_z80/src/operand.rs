//! Z80 instruction operands (spec component C11): the same opcode set
//! carries virtual-register operands as codegen emits them and physical
//! register/stack operands as the allocator rewrites them to -- only the
//! operand *kind* changes between the two passes.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    Af,
    Bc,
    De,
    Hl,
    Ix,
    Iy,
    Sp,
}

impl Reg16 {
    pub fn hi(self) -> Reg8 {
        match self {
            Reg16::Bc => Reg8::B,
            Reg16::De => Reg8::D,
            Reg16::Hl => Reg8::H,
            _ => panic!("{self:?} has no addressable 8-bit half"),
        }
    }

    pub fn lo(self) -> Reg8 {
        match self {
            Reg16::Bc => Reg8::C,
            Reg16::De => Reg8::E,
            Reg16::Hl => Reg8::L,
            _ => panic!("{self:?} has no addressable 8-bit half"),
        }
    }
}

/// The Z80 assembler's three 16-bit register-group encodings: `dd` for
/// `ld dd,nn`/`push dd`/`pop dd`, `pp` for `add ix,pp`, `ss` for
/// `add hl,ss`/`sbc hl,ss`. Which concrete register a group names is fixed
/// by the instruction it appears in; we keep the tag alongside the
/// register so the emitter can tell `add hl,de` (ss) from `add ix,de`
/// (pp) apart when printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegGroup {
    Dd,
    Pp,
    Ss,
}

/// Which byte of a virtual 16-bit register pair a virtual 8-bit operand
/// addresses, or whether it stands alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VrPart {
    Whole,
    Low,
    High,
}

/// A virtual 8-bit register. `id` is either a standalone counter (when
/// `part` is `Whole`) or shared with a [`Vrr`] of the same id when it
/// addresses one of that pair's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vr {
    pub id: u32,
    pub part: VrPart,
}

/// A virtual 16-bit register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vrr {
    pub id: u32,
}

impl Vrr {
    pub fn lo(self) -> Vr {
        Vr { id: self.id, part: VrPart::Low }
    }

    pub fn hi(self) -> Vr {
        Vr { id: self.id, part: VrPart::High }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Z,
    Nz,
    C,
    Nc,
}

impl Cond {
    pub fn negate(self) -> Cond {
        match self {
            Cond::Z => Cond::Nz,
            Cond::Nz => Cond::Z,
            Cond::C => Cond::Nc,
            Cond::Nc => Cond::C,
        }
    }
}

/// `(HL)` or `(IX+slot)`/`(IY+slot)`, where `slot` names a frame slot's
/// symbolic equate rather than carrying a raw numeric displacement -- the
/// numeric offset is only known once the allocator has sized the frame,
/// and the emitter prints the name directly, leaning on the assembler to
/// resolve `ix+slot` against the `.slot equ N` line it also prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indirect {
    Hl,
    /// `(base+slot)` when `byte_offset` is 0, `(base+slot+N)` otherwise --
    /// the extra byte offset addresses one byte of a multi-byte slot (a
    /// wide local, or a spilled vrr's high half).
    Indexed { base: Reg16, slot: Rc<str>, byte_offset: u16 },
    /// `(name)` / `(name+N)`: absolute addressing of a global, legal only
    /// as the memory side of `ld a,(nn)` / `ld hl,(nn)` (and their store
    /// counterparts) -- the only two Z80 direct-addressing forms.
    Absolute { name: Rc<str>, byte_offset: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Imm(i64),
    /// A bare label or frame-slot name used where the grammar calls for a
    /// numeric immediate, e.g. `ld hl,framesize` or `jp label`.
    Symbol(Rc<str>),
    Reg8(Reg8),
    Reg16(Reg16),
    RegGroup(RegGroup, Reg16),
    Vr(Vr),
    Vrr(Vrr),
    Indirect(Indirect),
    Cond(Cond),
}

impl Operand {
    pub fn vr(id: u32, part: VrPart) -> Operand {
        Operand::Vr(Vr { id, part })
    }

    pub fn vrr(id: u32) -> Operand {
        Operand::Vrr(Vrr { id })
    }

    pub fn slot(base: Reg16, name: impl Into<Rc<str>>) -> Operand {
        Operand::Indirect(Indirect::Indexed { base, slot: name.into(), byte_offset: 0 })
    }

    pub fn slot_at(base: Reg16, name: impl Into<Rc<str>>, byte_offset: u16) -> Operand {
        Operand::Indirect(Indirect::Indexed { base, slot: name.into(), byte_offset })
    }

    pub fn absolute(name: impl Into<Rc<str>>, byte_offset: u16) -> Operand {
        Operand::Indirect(Indirect::Absolute { name: name.into(), byte_offset })
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Operand::Vr(_) | Operand::Vrr(_))
    }
}
