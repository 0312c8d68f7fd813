//! Recursive-descent parser turning a token stream into the AST in
//! [`ast`].

pub mod ast;
pub mod error;
pub mod parser;

pub use ast::{Decl, Declarator, Expr, Specifier, Stmt, TranslationUnit};
pub use error::{ParseError, ParseResult};
pub use parser::Parser;

use zx_common::Diagnostics;
use zx_lexer::{ChunkedSource, LexError, Lexer};

/// Lexes and parses a whole translation unit from source text, returning
/// the AST together with whatever diagnostics the parser collected along
/// the way (lexer I/O errors abort outright; syntax errors don't, so the
/// rest of the file still gets parsed and reported).
pub fn parse_str(source: &str, file: impl Into<std::rc::Rc<str>>) -> Result<(TranslationUnit, Diagnostics), LexError> {
    let file = file.into();
    let mut lexer = Lexer::create(ChunkedSource::whole(source), file);
    let tokens = lexer.tokenize_all()?;
    if let Some(err) = lexer.io_error() {
        return Err(err.clone());
    }
    let mut parser = Parser::new(tokens);
    let unit = parser.parse_translation_unit();
    Ok((unit, parser.diagnostics))
}
