//! Diagnosable errors raised while building the symbol index, label scope
//! and enum registry.

use thiserror::Error;
use zx_common::Position;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("{position}: redefinition of '{name}'")]
    AlreadyDefined { position: Position, name: String },

    #[error("{position}: redeclaration of '{name}' with incompatible type")]
    RedeclarationMismatch { position: Position, name: String },

    #[error("{position}: label '{name}' is not defined")]
    LabelUndefined { position: Position, name: String },

    #[error("{position}: enum element '{name}' already exists in this enum")]
    DuplicateEnumElement { position: Position, name: String },
}

pub type TypeResult<T> = Result<T, TypeError>;
