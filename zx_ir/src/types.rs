//! IR type-expressions: the small `int(width)` language instructions and
//! data declarations are annotated with, independent of the richer C type
//! system in `zx_types` that lowering consults to pick these widths.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    Int(u16),
}

impl IrType {
    pub const I8: IrType = IrType::Int(8);
    pub const I16: IrType = IrType::Int(16);
    pub const I32: IrType = IrType::Int(32);
    pub const I64: IrType = IrType::Int(64);

    pub fn width(self) -> u16 {
        match self {
            IrType::Int(w) => w,
        }
    }

    pub fn bytes(self) -> u16 {
        self.width() / 8
    }

    /// Picks the IR integer type that exactly represents a `zx_types` basic
    /// kind, and pointers/enums, which are always 16-bit on this target.
    pub fn from_cg(ty: &zx_types::CgType) -> IrType {
        use zx_types::{BasicKind, CgTypeKind};
        match &ty.kind {
            CgTypeKind::Basic(b) => IrType::Int((b.size().max(1) * 8) as u16),
            CgTypeKind::Pointer(_) => IrType::I16,
            CgTypeKind::Enum { .. } => IrType::I16,
            CgTypeKind::Array { .. } | CgTypeKind::Function { .. } | CgTypeKind::Record { .. } => {
                // Arrays decay to their element's address, records/functions
                // never appear directly as an instruction's value type.
                IrType::I16
            }
        }
        .adjust_for_bool(matches!(&ty.kind, CgTypeKind::Basic(BasicKind::Bool)))
    }

    fn adjust_for_bool(self, is_bool: bool) -> IrType {
        if is_bool {
            IrType::I8
        } else {
            self
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "int{}", self.width())
    }
}
