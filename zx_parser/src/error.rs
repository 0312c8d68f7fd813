//! Error types for the parser.

use thiserror::Error;
use zx_common::Position;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{position}: expected {expected}, found {found}")]
    Expected { position: Position, expected: String, found: String },

    #[error("{position}: unexpected end of input")]
    UnexpectedEof { position: Position },
}
