//! Z80 IC module-level declarations (spec component C11): externs, data
//! variables and procedures, mirroring the shape of `zx_ir::proc` but with
//! Z80-specific data widths and a frame-slot list in place of a flat
//! name+type local list.

use crate::instruction::LabeledInstr;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Incoming argument, addressed at a positive displacement from IX.
    Arg,
    /// Source-level local or a codegen-synthesized spill slot, addressed
    /// at a negative displacement from IX.
    Local,
}

/// One frame slot: a source-level local/argument, or a spilled virtual
/// register. `offset` is `None` until the allocator sizes the frame;
/// until then every reference to the slot goes by `name`.
#[derive(Debug, Clone)]
pub struct LocalVar {
    pub name: Rc<str>,
    pub size: u16,
    pub kind: SlotKind,
    pub offset: Option<i32>,
}

impl LocalVar {
    pub fn new(name: impl Into<Rc<str>>, size: u16, kind: SlotKind) -> LocalVar {
        LocalVar { name: name.into(), size, kind, offset: None }
    }
}

#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: Rc<str>,
    pub locals: Vec<LocalVar>,
    pub body: Vec<LabeledInstr>,
    /// Total frame size in bytes; filled in by the allocator once every
    /// slot has an offset.
    pub frame_size: Option<u16>,
}

impl Procedure {
    pub fn new(name: impl Into<Rc<str>>) -> Procedure {
        Procedure { name: name.into(), locals: Vec::new(), body: Vec::new(), frame_size: None }
    }

    pub fn find_local(&self, name: &str) -> Option<&LocalVar> {
        self.locals.iter().find(|l| &*l.name == name)
    }

    pub fn find_local_mut(&mut self, name: &str) -> Option<&mut LocalVar> {
        self.locals.iter_mut().find(|l| &*l.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    Byte,
    Word,
    DWord,
    QWord,
}

impl DataWidth {
    pub fn bytes(self) -> u16 {
        match self {
            DataWidth::Byte => 1,
            DataWidth::Word => 2,
            DataWidth::DWord => 4,
            DataWidth::QWord => 8,
        }
    }

    pub fn from_bit_width(width: u16) -> DataWidth {
        match width {
            8 => DataWidth::Byte,
            16 => DataWidth::Word,
            32 => DataWidth::DWord,
            _ => DataWidth::QWord,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DataEntry {
    pub width: DataWidth,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: Rc<str>,
    pub data: Vec<DataEntry>,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Extern(Rc<str>),
    Variable(Variable),
    Procedure(Procedure),
}
