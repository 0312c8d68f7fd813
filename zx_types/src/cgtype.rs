//! `cgtype`: the C type representation the lowering pass targets.
//!
//! Mirrors the `Type` enum the teacher's type-checker ships (basic/array/
//! function/struct variants with `is_primitive`/`is_assignable_to`/`name`
//! helpers) but widened to actual C: qualifiers, pointers with their own
//! qualifier set, sized and unsized arrays, variadic functions, and
//! structs/unions/enums that can be declared without being defined yet.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Qualifiers {
    pub const_: bool,
    pub restrict: bool,
    pub volatile: bool,
}

impl Qualifiers {
    pub const NONE: Qualifiers = Qualifiers { const_: false, restrict: false, volatile: false };

    pub fn union(self, other: Qualifiers) -> Qualifiers {
        Qualifiers {
            const_: self.const_ || other.const_,
            restrict: self.restrict || other.restrict,
            volatile: self.volatile || other.volatile,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicKind {
    Void,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Bool,
    VaList,
}

impl BasicKind {
    pub fn size(self) -> u64 {
        match self {
            BasicKind::Void => 0,
            BasicKind::Char | BasicKind::SignedChar | BasicKind::UnsignedChar | BasicKind::Bool => 1,
            BasicKind::Short | BasicKind::UnsignedShort => 2,
            BasicKind::Int | BasicKind::UnsignedInt => 2,
            BasicKind::Long | BasicKind::UnsignedLong => 4,
            BasicKind::LongLong | BasicKind::UnsignedLongLong => 8,
            BasicKind::VaList => 2,
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            BasicKind::UnsignedChar
                | BasicKind::UnsignedShort
                | BasicKind::UnsignedInt
                | BasicKind::UnsignedLong
                | BasicKind::UnsignedLongLong
                | BasicKind::Bool
        )
    }

    /// Rank used by the usual arithmetic conversions: the wider of two
    /// operands' basic kinds wins, ties broken towards unsigned.
    pub fn rank(self) -> u8 {
        match self {
            BasicKind::Bool => 0,
            BasicKind::Char | BasicKind::SignedChar | BasicKind::UnsignedChar => 1,
            BasicKind::Short | BasicKind::UnsignedShort => 2,
            BasicKind::Int | BasicKind::UnsignedInt => 3,
            BasicKind::Long | BasicKind::UnsignedLong => 4,
            BasicKind::LongLong | BasicKind::UnsignedLongLong => 5,
            BasicKind::Void | BasicKind::VaList => 255,
        }
    }
}

impl fmt::Display for BasicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BasicKind::Void => "void",
            BasicKind::Char => "char",
            BasicKind::SignedChar => "signed char",
            BasicKind::UnsignedChar => "unsigned char",
            BasicKind::Short => "short",
            BasicKind::UnsignedShort => "unsigned short",
            BasicKind::Int => "int",
            BasicKind::UnsignedInt => "unsigned int",
            BasicKind::Long => "long",
            BasicKind::UnsignedLong => "unsigned long",
            BasicKind::LongLong => "long long",
            BasicKind::UnsignedLongLong => "unsigned long long",
            BasicKind::Bool => "_Bool",
            BasicKind::VaList => "__builtin_va_list",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArraySize {
    Constant(u64),
    Unsized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKeyword {
    Struct,
    Union,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMember {
    pub name: String,
    pub ty: CgType,
    /// Byte offset from the start of the record; `None` until the layout
    /// pass (part of `size_of`/`align_of`) has run.
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CgType {
    pub qualifiers: Qualifiers,
    pub kind: CgTypeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CgTypeKind {
    Basic(BasicKind),
    Pointer(Box<CgType>),
    Array { element: Box<CgType>, size: ArraySize },
    Function { ret: Box<CgType>, params: Vec<CgType>, variadic: bool },
    Record { keyword: RecordKeyword, tag: Option<String>, members: Option<Vec<RecordMember>> },
    Enum { tag: Option<String> },
}

impl CgType {
    pub fn basic(kind: BasicKind) -> CgType {
        CgType { qualifiers: Qualifiers::NONE, kind: CgTypeKind::Basic(kind) }
    }

    pub fn pointer_to(inner: CgType) -> CgType {
        CgType { qualifiers: Qualifiers::NONE, kind: CgTypeKind::Pointer(Box::new(inner)) }
    }

    pub fn qualified(mut self, qualifiers: Qualifiers) -> CgType {
        self.qualifiers = self.qualifiers.union(qualifiers);
        self
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, CgTypeKind::Basic(BasicKind::Void))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, CgTypeKind::Basic(b) if !matches!(b, BasicKind::Void | BasicKind::VaList))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, CgTypeKind::Pointer(_))
    }

    pub fn is_scalar(&self) -> bool {
        self.is_integer() || self.is_pointer()
    }

    /// Whether this type is a fully-defined, sizeable object type (records
    /// with no known member list and unsized arrays are incomplete).
    pub fn is_complete(&self) -> bool {
        match &self.kind {
            CgTypeKind::Basic(BasicKind::Void) => false,
            CgTypeKind::Basic(_) => true,
            CgTypeKind::Pointer(_) => true,
            CgTypeKind::Array { element, size } => matches!(size, ArraySize::Constant(_)) && element.is_complete(),
            CgTypeKind::Function { .. } => false,
            CgTypeKind::Record { members, .. } => members.is_some(),
            CgTypeKind::Enum { .. } => true,
        }
    }

    pub fn size_of(&self) -> Option<u64> {
        match &self.kind {
            CgTypeKind::Basic(b) => Some(b.size()),
            CgTypeKind::Pointer(_) => Some(2),
            CgTypeKind::Array { element, size: ArraySize::Constant(n) } => Some(element.size_of()? * n),
            CgTypeKind::Array { size: ArraySize::Unsized, .. } => None,
            CgTypeKind::Function { .. } => None,
            CgTypeKind::Record { keyword, members: Some(members), .. } => {
                let align = self.align_of()?;
                match keyword {
                    RecordKeyword::Struct => {
                        let mut offset = 0u64;
                        for m in members {
                            let msize = m.ty.size_of()?;
                            let malign = m.ty.align_of()?;
                            offset = align_up(offset, malign);
                            offset += msize;
                        }
                        Some(align_up(offset, align))
                    }
                    RecordKeyword::Union => members.iter().filter_map(|m| m.ty.size_of()).max().map(|m| align_up(m, align)),
                }
            }
            CgTypeKind::Record { members: None, .. } => None,
            CgTypeKind::Enum { .. } => Some(2),
        }
    }

    pub fn align_of(&self) -> Option<u64> {
        match &self.kind {
            CgTypeKind::Basic(b) => Some(b.size().max(1)),
            CgTypeKind::Pointer(_) => Some(2),
            CgTypeKind::Array { element, .. } => element.align_of(),
            CgTypeKind::Function { .. } => None,
            CgTypeKind::Record { members: Some(members), .. } => members.iter().filter_map(|m| m.ty.align_of()).max().or(Some(1)),
            CgTypeKind::Record { members: None, .. } => None,
            CgTypeKind::Enum { .. } => Some(2),
        }
    }

    /// C compatibility: identical up to top-level qualifiers for scalars,
    /// structural for pointers/arrays/functions, same tag for records and
    /// enums (two incomplete records with the same tag are compatible,
    /// letting a forward declaration match its later definition).
    pub fn is_compatible_with(&self, other: &CgType) -> bool {
        match (&self.kind, &other.kind) {
            (CgTypeKind::Basic(a), CgTypeKind::Basic(b)) => a == b,
            (CgTypeKind::Pointer(a), CgTypeKind::Pointer(b)) => a.is_compatible_with(b),
            (CgTypeKind::Array { element: ea, size: sa }, CgTypeKind::Array { element: eb, size: sb }) => {
                ea.is_compatible_with(eb)
                    && match (sa, sb) {
                        (ArraySize::Constant(x), ArraySize::Constant(y)) => x == y,
                        _ => true,
                    }
            }
            (
                CgTypeKind::Function { ret: ra, params: pa, variadic: va },
                CgTypeKind::Function { ret: rb, params: pb, variadic: vb },
            ) => {
                va == vb
                    && ra.is_compatible_with(rb)
                    && pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(x, y)| x.is_compatible_with(y))
            }
            (CgTypeKind::Record { keyword: ka, tag: ta, .. }, CgTypeKind::Record { keyword: kb, tag: tb, .. }) => {
                ka == kb && ta == tb
            }
            (CgTypeKind::Enum { tag: ta }, CgTypeKind::Enum { tag: tb }) => ta == tb,
            _ => false,
        }
    }

    pub fn name(&self) -> String {
        match &self.kind {
            CgTypeKind::Basic(b) => b.to_string(),
            CgTypeKind::Pointer(inner) => format!("{}*", inner.name()),
            CgTypeKind::Array { element, size: ArraySize::Constant(n) } => format!("{}[{}]", element.name(), n),
            CgTypeKind::Array { element, size: ArraySize::Unsized } => format!("{}[]", element.name()),
            CgTypeKind::Function { ret, params, variadic } => {
                let mut parts: Vec<String> = params.iter().map(|p| p.name()).collect();
                if *variadic {
                    parts.push("...".to_string());
                }
                format!("{}({})", ret.name(), parts.join(", "))
            }
            CgTypeKind::Record { keyword, tag, .. } => {
                let kw = match keyword {
                    RecordKeyword::Struct => "struct",
                    RecordKeyword::Union => "union",
                };
                format!("{kw} {}", tag.as_deref().unwrap_or("<anonymous>"))
            }
            CgTypeKind::Enum { tag } => format!("enum {}", tag.as_deref().unwrap_or("<anonymous>")),
        }
    }
}

fn align_up(offset: u64, align: u64) -> u64 {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) / align * align
}

impl fmt::Display for CgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_size_is_always_two_bytes_on_z80() {
        let p = CgType::pointer_to(CgType::basic(BasicKind::Char));
        assert_eq!(p.size_of(), Some(2));
    }

    #[test]
    fn struct_layout_packs_and_aligns_members() {
        let ty = CgType {
            qualifiers: Qualifiers::NONE,
            kind: CgTypeKind::Record {
                keyword: RecordKeyword::Struct,
                tag: Some("point".into()),
                members: Some(vec![
                    RecordMember { name: "x".into(), ty: CgType::basic(BasicKind::Char), offset: None },
                    RecordMember { name: "y".into(), ty: CgType::basic(BasicKind::Int), offset: None },
                ]),
            },
        };
        // char at 0 (1 byte), int needs 2-byte alignment so pads to offset 2,
        // then 2 bytes of int -> size 4.
        assert_eq!(ty.size_of(), Some(4));
        assert_eq!(ty.align_of(), Some(2));
    }

    #[test]
    fn incomplete_record_has_no_size() {
        let ty = CgType {
            qualifiers: Qualifiers::NONE,
            kind: CgTypeKind::Record { keyword: RecordKeyword::Struct, tag: Some("opaque".into()), members: None },
        };
        assert!(!ty.is_complete());
        assert_eq!(ty.size_of(), None);
    }

    #[test]
    fn compatibility_ignores_array_size_mismatch_against_unsized() {
        let sized = CgType {
            qualifiers: Qualifiers::NONE,
            kind: CgTypeKind::Array { element: Box::new(CgType::basic(BasicKind::Int)), size: ArraySize::Constant(4) },
        };
        let unsized_ = CgType {
            qualifiers: Qualifiers::NONE,
            kind: CgTypeKind::Array { element: Box::new(CgType::basic(BasicKind::Int)), size: ArraySize::Unsized },
        };
        assert!(sized.is_compatible_with(&unsized_));
    }

    #[test]
    fn function_types_require_matching_variadic_flag() {
        let f1 = CgType {
            qualifiers: Qualifiers::NONE,
            kind: CgTypeKind::Function { ret: Box::new(CgType::basic(BasicKind::Int)), params: vec![], variadic: false },
        };
        let f2 = CgType {
            qualifiers: Qualifiers::NONE,
            kind: CgTypeKind::Function { ret: Box::new(CgType::basic(BasicKind::Int)), params: vec![], variadic: true },
        };
        assert!(!f1.is_compatible_with(&f2));
    }
}
