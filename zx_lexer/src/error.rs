//! Error types for the lexer.

use thiserror::Error;
use zx_common::Position;

pub type LexResult<T> = Result<T, LexError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unterminated block comment at {position}")]
    UnterminatedComment { position: Position },

    #[error("unterminated string or character literal at {position}")]
    UnterminatedLiteral { position: Position },

    #[error("I/O error reading source: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for LexError {
    fn from(error: std::io::Error) -> Self {
        LexError::Io { message: error.to_string() }
    }
}
