//! Shared position tracking and diagnostic collection for the zx C-to-Z80
//! compiler. Used by every stage of the pipeline, from the lexer through to
//! the register allocator.

pub mod diagnostics;
pub mod position;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use position::{Position, Span};
