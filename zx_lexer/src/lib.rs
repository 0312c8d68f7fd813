//! Lexical analysis for the zx C-to-Z80 compiler.
//!
//! The lexer is pull-based: it reads from a [`source::SourceReader`] one
//! buffer at a time and never assumes it can seek backwards. Whitespace and
//! comments are returned as ordinary tokens (not skipped) so that printing
//! every token's text in order reproduces the input byte-for-byte.

pub mod error;
pub mod lexer;
pub mod source;
pub mod token;

pub use error::{LexError, LexResult};
pub use lexer::Lexer;
pub use source::{ChunkedSource, ReaderSource, SourceReader};
pub use token::{Token, TokenKind};
