//! Token definitions for the zx lexer.

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use zx_common::{Position, Span};

/// Every lexical category the lexer can produce. Whitespace and comments
/// are first-class kinds, not discarded trivia, so that the parser's
/// surrounding machinery can attach them to AST nodes and reproduce the
/// original source byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // --- literals & names ---
    Identifier,
    IntLiteral,
    FloatLiteral,
    CharLiteral,
    StringLiteral,

    // --- keywords: storage class / type qualifiers ---
    KwAuto,
    KwConst,
    KwExtern,
    KwRegister,
    KwRestrict,
    KwStatic,
    KwTypedef,
    KwVolatile,
    KwInline,

    // --- keywords: basic types ---
    KwVoid,
    KwChar,
    KwShort,
    KwInt,
    KwLong,
    KwFloat,
    KwDouble,
    KwSigned,
    KwUnsigned,
    KwBool,
    KwComplex,
    KwImaginary,

    // --- keywords: aggregates ---
    KwStruct,
    KwUnion,
    KwEnum,

    // --- keywords: statements ---
    KwIf,
    KwElse,
    KwSwitch,
    KwCase,
    KwDefault,
    KwWhile,
    KwDo,
    KwFor,
    KwGoto,
    KwContinue,
    KwBreak,
    KwReturn,
    KwSizeof,

    // --- compiler-specific keywords ---
    KwAttribute, // __attribute__
    KwRestrictGnu, // __restrict__
    KwInt128, // __int128
    KwAtomic, // _Atomic
    KwAsm, // asm / __asm__

    // --- punctuators: brackets ---
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    // --- punctuators: separators ---
    Comma,
    Semicolon,
    Colon,
    Ellipsis,
    Dot,

    // --- punctuators: operators ---
    Arrow,       // ->
    Question,
    Tilde,
    Bang,
    Amp,
    Pipe,
    Caret,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    ShiftLeft,
    ShiftRight,
    AmpAmp,
    PipePipe,
    EqEq,
    BangEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShiftLeftAssign,
    ShiftRightAssign,
    PlusPlus,
    MinusMinus,
    Hash,     // #
    HashHash, // ##

    // --- trivia: whitespace ---
    Whitespace,
    Tab,
    Newline,
    LineContinuation, // backslash-newline

    // --- trivia: comments ---
    LineComment,
    BlockCommentOpen,
    BlockCommentText,
    BlockCommentClose,
    DocCommentOpen, // /**

    // --- preprocessor passthrough ---
    Preprocessor,

    // --- error / sentinel kinds ---
    Invalid,
    InvalidChar,
    Eof,
}

impl TokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace
                | TokenKind::Tab
                | TokenKind::Newline
                | TokenKind::LineContinuation
                | TokenKind::LineComment
                | TokenKind::BlockCommentOpen
                | TokenKind::BlockCommentText
                | TokenKind::BlockCommentClose
                | TokenKind::DocCommentOpen
        )
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::KwAuto
                | TokenKind::KwConst
                | TokenKind::KwExtern
                | TokenKind::KwRegister
                | TokenKind::KwRestrict
                | TokenKind::KwStatic
                | TokenKind::KwTypedef
                | TokenKind::KwVolatile
                | TokenKind::KwInline
                | TokenKind::KwVoid
                | TokenKind::KwChar
                | TokenKind::KwShort
                | TokenKind::KwInt
                | TokenKind::KwLong
                | TokenKind::KwFloat
                | TokenKind::KwDouble
                | TokenKind::KwSigned
                | TokenKind::KwUnsigned
                | TokenKind::KwBool
                | TokenKind::KwComplex
                | TokenKind::KwImaginary
                | TokenKind::KwStruct
                | TokenKind::KwUnion
                | TokenKind::KwEnum
                | TokenKind::KwIf
                | TokenKind::KwElse
                | TokenKind::KwSwitch
                | TokenKind::KwCase
                | TokenKind::KwDefault
                | TokenKind::KwWhile
                | TokenKind::KwDo
                | TokenKind::KwFor
                | TokenKind::KwGoto
                | TokenKind::KwContinue
                | TokenKind::KwBreak
                | TokenKind::KwReturn
                | TokenKind::KwSizeof
                | TokenKind::KwAttribute
                | TokenKind::KwRestrictGnu
                | TokenKind::KwInt128
                | TokenKind::KwAtomic
                | TokenKind::KwAsm
        )
    }
}

/// A single lexical token: its kind, the original text slice it was lexed
/// from (heap-owned so the AST can outlive the lexer), and its begin/end
/// source positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Rc<str>,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<Rc<str>>, span: Span) -> Self {
        Self { kind, text: text.into(), span }
    }

    pub fn begin(&self) -> &Position {
        &self.span.begin
    }

    pub fn end(&self) -> &Position {
        &self.span.end
    }

    /// Checks that every character at and after `offset` in this token's
    /// text is a well-formed character, returning the offset of the first
    /// bad byte otherwise. Lets the parser flag embedded invalid bytes
    /// inside an otherwise-valid token without re-lexing.
    pub fn valid_chars(&self, offset: usize) -> Result<(), usize> {
        match self.text.get(offset..) {
            Some(rest) => {
                if rest.is_char_boundary(0) {
                    Ok(())
                } else {
                    Err(offset)
                }
            }
            None => Err(offset),
        }
    }
}

impl PartialEq<TokenKind> for Token {
    fn eq(&self, other: &TokenKind) -> bool {
        self.kind == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc as StdRc;

    fn span() -> Span {
        let file: StdRc<str> = StdRc::from("t.c");
        Span::new(
            Position::new(file.clone(), 1, 1, 0),
            Position::new(file, 1, 2, 1),
        )
    }

    #[test]
    fn trivia_kinds_are_flagged() {
        assert!(TokenKind::Whitespace.is_trivia());
        assert!(TokenKind::LineComment.is_trivia());
        assert!(!TokenKind::Identifier.is_trivia());
    }

    #[test]
    fn token_equality_against_kind() {
        let tok = Token::new(TokenKind::Plus, "+", span());
        assert_eq!(tok, TokenKind::Plus);
    }
}
