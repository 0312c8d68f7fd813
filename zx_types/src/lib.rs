//! C type representation, file-scope symbol index, per-procedure label
//! scope, and enum registry shared between the lowering pass and the
//! codegen stages downstream of it.

pub mod cgtype;
pub mod enums;
pub mod error;
pub mod labels;
pub mod symbol;

pub use cgtype::{ArraySize, BasicKind, CgType, CgTypeKind, Qualifiers, RecordKeyword, RecordMember};
pub use enums::{EnumRegistry, EnumType};
pub use error::{TypeError, TypeResult};
pub use labels::LabelScope;
pub use symbol::{Symbol, SymbolIndex, SymbolKind};
