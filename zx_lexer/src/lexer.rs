//! Main lexer implementation: a ring-buffered, pull-based tokenizer.

use crate::error::{LexError, LexResult};
use crate::source::SourceReader;
use crate::token::{Token, TokenKind};
use std::rc::Rc;
use zx_common::{Position, Span};

const BUF_SIZE: usize = 64;
const LOW_WATERMARK: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    BlockComment,
}

/// Pull-based lexer. Call [`Lexer::get_tok`] repeatedly until it returns a
/// token of kind [`TokenKind::Eof`].
pub struct Lexer<S: SourceReader> {
    source: S,
    file: Rc<str>,
    buf: Vec<u8>,
    buf_pos: usize,
    eof: bool,
    io_error: Option<LexError>,
    pos: Position,
    mode: Mode,
}

impl<S: SourceReader> Lexer<S> {
    pub fn create(source: S, file: impl Into<Rc<str>>) -> Self {
        let file = file.into();
        Self {
            source,
            pos: Position::start(file.clone()),
            file,
            buf: Vec::with_capacity(BUF_SIZE),
            buf_pos: 0,
            eof: false,
            io_error: None,
            mode: Mode::Normal,
        }
    }

    /// Any I/O failure observed while refilling the buffer. The lexer keeps
    /// advancing with whatever it already buffered; callers that care
    /// about I/O failures should check this after exhausting the token
    /// stream.
    pub fn io_error(&self) -> Option<&LexError> {
        self.io_error.as_ref()
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.buf_pos
    }

    fn fill(&mut self, want: usize) {
        if self.eof || self.remaining() >= want {
            return;
        }
        if self.buf_pos > 0 {
            self.buf.drain(0..self.buf_pos);
            self.buf_pos = 0;
        }
        let mut chunk = [0u8; BUF_SIZE];
        while !self.eof && self.buf.len() < want.max(LOW_WATERMARK) {
            match self.source.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    self.io_error = Some(LexError::from(e));
                    self.eof = true;
                }
            }
        }
    }

    fn peek_byte(&mut self, ahead: usize) -> Option<u8> {
        self.fill(ahead + 1);
        self.buf.get(self.buf_pos + ahead).copied()
    }

    fn char_len_at(&mut self, idx: usize) -> usize {
        match self.buf.get(idx) {
            None => 0,
            Some(b) if *b < 0x80 => 1,
            Some(b) if b & 0xE0 == 0xC0 => 2,
            Some(b) if b & 0xF0 == 0xE0 => 3,
            Some(b) if b & 0xF8 == 0xF0 => 4,
            Some(_) => 1,
        }
    }

    fn peek_char(&mut self, ahead: usize) -> Option<char> {
        // Only 0/1-character lookahead is needed anywhere in the grammar;
        // walk forward ahead full characters.
        let mut idx = self.buf_pos;
        for _ in 0..ahead {
            self.fill(idx - self.buf_pos + 5);
            let len = self.char_len_at(idx);
            if len == 0 {
                return None;
            }
            idx += len;
        }
        self.fill(idx - self.buf_pos + 5);
        let mut len = self.char_len_at(idx);
        if len == 0 {
            return None;
        }
        if idx + len > self.buf.len() {
            len = 1;
        }
        std::str::from_utf8(&self.buf[idx..idx + len]).ok()?.chars().next()
    }

    fn cur(&mut self) -> Option<char> {
        self.peek_char(0)
    }

    fn bump(&mut self) -> Option<char> {
        self.fill(5);
        let mut len = self.char_len_at(self.buf_pos);
        if len == 0 {
            return None;
        }
        if self.buf_pos + len > self.buf.len() {
            len = 1; // truncated multi-byte sequence at EOF: fall back to one raw byte
        }
        let ch = std::str::from_utf8(&self.buf[self.buf_pos..self.buf_pos + len])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        self.buf_pos += len;
        self.pos.advance_char(ch);
        Some(ch)
    }

    fn make(&self, kind: TokenKind, text: String, begin: Position) -> Token {
        Token::new(kind, text, Span::new(begin, self.pos.clone()))
    }

    /// Consume and return the next token. Never errors outright: unexpected
    /// bytes become `Invalid`/`InvalidChar` tokens so callers keep making
    /// progress; the only hard failure is a caller wanting to surface
    /// [`Lexer::io_error`].
    pub fn get_tok(&mut self) -> LexResult<Token> {
        if self.mode == Mode::BlockComment {
            return Ok(self.lex_in_comment());
        }
        let begin = self.pos.clone();
        let at_line_start = begin.column == 1;
        match self.cur() {
            None => Ok(self.make(TokenKind::Eof, String::new(), begin)),
            Some(' ') => Ok(self.lex_run(TokenKind::Whitespace, ' ', begin)),
            Some('\t') => Ok(self.lex_run(TokenKind::Tab, '\t', begin)),
            Some('\n') => {
                self.bump();
                Ok(self.make(TokenKind::Newline, "\n".into(), begin))
            }
            Some('\\') if self.peek_char(1) == Some('\n') => {
                self.bump();
                self.bump();
                Ok(self.make(TokenKind::LineContinuation, "\\\n".into(), begin))
            }
            Some('#') if at_line_start => Ok(self.lex_preprocessor(begin)),
            Some('/') if self.peek_char(1) == Some('/') => Ok(self.lex_line_comment(begin)),
            Some('/') if self.peek_char(1) == Some('*') => Ok(self.lex_block_comment_open(begin)),
            Some(c) if c.is_ascii_digit() => Ok(self.lex_number(begin)),
            Some('.') if self.peek_char(1).map_or(false, |c| c.is_ascii_digit()) => {
                Ok(self.lex_number(begin))
            }
            Some('"') => self.lex_string(begin, String::new()),
            Some('\'') => self.lex_char(begin, String::new()),
            Some(c) if is_ident_start(c) => Ok(self.lex_identifier_or_prefixed_literal(begin)),
            Some(c) if (c as u32) < 32 && c != '\t' && c != '\n' => {
                let text = self.bump().unwrap().to_string();
                Ok(self.make(TokenKind::InvalidChar, text, begin))
            }
            Some(c) if c as u32 == 127 => {
                let text = self.bump().unwrap().to_string();
                Ok(self.make(TokenKind::InvalidChar, text, begin))
            }
            Some(_) => Ok(self.lex_operator(begin)),
        }
    }

    /// Runs the lexer to completion, returning every token including
    /// trivia and the trailing `Eof`. Convenience for callers (e.g. the
    /// parser) that don't need to interleave lexing with anything else.
    pub fn tokenize_all(&mut self) -> LexResult<Vec<Token>> {
        let mut out = Vec::new();
        loop {
            let tok = self.get_tok()?;
            let is_eof = tok.kind == TokenKind::Eof;
            out.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(out)
    }

    fn lex_run(&mut self, kind: TokenKind, ch: char, begin: Position) -> Token {
        let mut text = String::new();
        while self.cur() == Some(ch) {
            text.push(self.bump().unwrap());
        }
        self.make(kind, text, begin)
    }

    fn lex_in_comment(&mut self) -> Token {
        let begin = self.pos.clone();
        match self.cur() {
            None => {
                self.mode = Mode::Normal;
                self.make(TokenKind::Eof, String::new(), begin)
            }
            Some('*') if self.peek_char(1) == Some('/') => {
                self.bump();
                self.bump();
                self.mode = Mode::Normal;
                self.make(TokenKind::BlockCommentClose, "*/".into(), begin)
            }
            Some(' ') => self.lex_run(TokenKind::Whitespace, ' ', begin),
            Some('\t') => self.lex_run(TokenKind::Tab, '\t', begin),
            Some('\n') => {
                self.bump();
                self.make(TokenKind::Newline, "\n".into(), begin)
            }
            Some(_) => {
                let mut text = String::new();
                loop {
                    match self.cur() {
                        None => break,
                        Some('*') if self.peek_char(1) == Some('/') => break,
                        Some(c) if c == ' ' || c == '\t' || c == '\n' => break,
                        Some(_) => text.push(self.bump().unwrap()),
                    }
                }
                self.make(TokenKind::BlockCommentText, text, begin)
            }
        }
    }

    fn lex_line_comment(&mut self, begin: Position) -> Token {
        let mut text = String::new();
        text.push(self.bump().unwrap());
        text.push(self.bump().unwrap());
        loop {
            match self.cur() {
                None | Some('\n') => break,
                Some('\\') if self.peek_char(1) == Some('\n') => {
                    text.push(self.bump().unwrap());
                    text.push(self.bump().unwrap());
                }
                Some(_) => text.push(self.bump().unwrap()),
            }
        }
        self.make(TokenKind::LineComment, text, begin)
    }

    fn lex_block_comment_open(&mut self, begin: Position) -> Token {
        let mut text = String::new();
        text.push(self.bump().unwrap()); // '/'
        text.push(self.bump().unwrap()); // '*'
        let is_doc = self.cur() == Some('*') && self.peek_char(1) != Some('/');
        if is_doc {
            text.push(self.bump().unwrap());
        }
        self.mode = Mode::BlockComment;
        self.make(
            if is_doc { TokenKind::DocCommentOpen } else { TokenKind::BlockCommentOpen },
            text,
            begin,
        )
    }

    fn lex_preprocessor(&mut self, begin: Position) -> Token {
        let mut text = String::new();
        loop {
            match self.cur() {
                None => break,
                Some('\\') if self.peek_char(1) == Some('\n') => {
                    text.push(self.bump().unwrap());
                    text.push(self.bump().unwrap());
                }
                Some('/') if self.peek_char(1) == Some('*') => {
                    // Nested block comment: consume verbatim up to `*/`.
                    text.push(self.bump().unwrap());
                    text.push(self.bump().unwrap());
                    loop {
                        match self.cur() {
                            None => break,
                            Some('*') if self.peek_char(1) == Some('/') => {
                                text.push(self.bump().unwrap());
                                text.push(self.bump().unwrap());
                                break;
                            }
                            Some(_) => text.push(self.bump().unwrap()),
                        }
                    }
                }
                Some('\n') => break,
                Some(_) => text.push(self.bump().unwrap()),
            }
        }
        self.make(TokenKind::Preprocessor, text, begin)
    }

    fn lex_identifier_or_prefixed_literal(&mut self, begin: Position) -> Token {
        // Encoding-prefixed char/string literals: L'x', u8"s", u"s", U"s".
        let save_pos = self.buf_pos;
        let save_srcpos = self.pos.clone();
        let mut prefix = String::new();
        while self.cur().map_or(false, is_ident_continue) {
            prefix.push(self.bump().unwrap());
        }
        if matches!(prefix.as_str(), "L" | "u" | "U" | "u8")
            && (self.cur() == Some('"') || self.cur() == Some('\''))
        {
            return if self.cur() == Some('"') {
                self.lex_string(begin, prefix).unwrap_or_else(|_| {
                    self.make(TokenKind::Invalid, prefix.clone(), begin)
                })
            } else {
                self.lex_char(begin, prefix).unwrap_or_else(|_| {
                    self.make(TokenKind::Invalid, prefix.clone(), begin)
                })
            };
        }
        // Not a prefixed literal: rewind and lex a plain identifier/keyword.
        self.buf_pos = save_pos;
        self.pos = save_srcpos;
        self.lex_identifier(begin)
    }

    fn lex_identifier(&mut self, begin: Position) -> Token {
        let mut text = String::new();
        while self.cur().map_or(false, is_ident_continue) {
            text.push(self.bump().unwrap());
        }
        let kind = keyword_kind(&text).unwrap_or(TokenKind::Identifier);
        self.make(kind, text, begin)
    }

    fn lex_number(&mut self, begin: Position) -> Token {
        let mut text = String::new();
        let mut is_float = false;
        let hex = self.cur() == Some('0')
            && matches!(self.peek_char(1), Some('x') | Some('X'));
        if hex {
            text.push(self.bump().unwrap());
            text.push(self.bump().unwrap());
            while self.cur().map_or(false, |c| c.is_ascii_hexdigit()) {
                text.push(self.bump().unwrap());
            }
            if self.cur() == Some('.') {
                is_float = true;
                text.push(self.bump().unwrap());
                while self.cur().map_or(false, |c| c.is_ascii_hexdigit()) {
                    text.push(self.bump().unwrap());
                }
            }
            if matches!(self.cur(), Some('p') | Some('P')) {
                is_float = true;
                text.push(self.bump().unwrap());
                if matches!(self.cur(), Some('+') | Some('-')) {
                    text.push(self.bump().unwrap());
                }
                while self.cur().map_or(false, |c| c.is_ascii_digit()) {
                    text.push(self.bump().unwrap());
                }
            }
        } else {
            while self.cur().map_or(false, |c| c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
            if self.cur() == Some('.') {
                is_float = true;
                text.push(self.bump().unwrap());
                while self.cur().map_or(false, |c| c.is_ascii_digit()) {
                    text.push(self.bump().unwrap());
                }
            }
            if matches!(self.cur(), Some('e') | Some('E')) {
                is_float = true;
                text.push(self.bump().unwrap());
                if matches!(self.cur(), Some('+') | Some('-')) {
                    text.push(self.bump().unwrap());
                }
                while self.cur().map_or(false, |c| c.is_ascii_digit()) {
                    text.push(self.bump().unwrap());
                }
            }
        }
        loop {
            match self.cur() {
                Some(c @ ('u' | 'U' | 'l' | 'L')) => text.push({
                    self.bump();
                    c
                }),
                Some(c @ ('f' | 'F')) if is_float => text.push({
                    self.bump();
                    c
                }),
                _ => break,
            }
        }
        let kind = if is_float { TokenKind::FloatLiteral } else { TokenKind::IntLiteral };
        self.make(kind, text, begin)
    }

    fn lex_string(&mut self, begin: Position, mut text: String) -> LexResult<Token> {
        text.push(self.bump().unwrap()); // opening quote
        loop {
            match self.cur() {
                None | Some('\n') => {
                    return Err(LexError::UnterminatedLiteral { position: begin });
                }
                Some('\\') => {
                    text.push(self.bump().unwrap());
                    if let Some(c) = self.cur() {
                        text.push(self.bump().unwrap());
                        let _ = c;
                    }
                }
                Some('"') => {
                    text.push(self.bump().unwrap());
                    break;
                }
                Some(_) => text.push(self.bump().unwrap()),
            }
        }
        Ok(self.make(TokenKind::StringLiteral, text, begin))
    }

    fn lex_char(&mut self, begin: Position, mut text: String) -> LexResult<Token> {
        text.push(self.bump().unwrap()); // opening quote
        loop {
            match self.cur() {
                None | Some('\n') => {
                    return Err(LexError::UnterminatedLiteral { position: begin });
                }
                Some('\\') => {
                    text.push(self.bump().unwrap());
                    if let Some(_c) = self.cur() {
                        text.push(self.bump().unwrap());
                    }
                }
                Some('\'') => {
                    text.push(self.bump().unwrap());
                    break;
                }
                Some(_) => text.push(self.bump().unwrap()),
            }
        }
        Ok(self.make(TokenKind::CharLiteral, text, begin))
    }

    fn lex_operator(&mut self, begin: Position) -> Token {
        macro_rules! two {
            ($second:expr, $two_kind:expr, $one_kind:expr, $one_text:expr) => {{
                self.bump();
                if self.cur() == Some($second) {
                    self.bump();
                    let mut t = String::from($one_text);
                    t.push($second);
                    self.make($two_kind, t, begin)
                } else {
                    self.make($one_kind, $one_text.to_string(), begin)
                }
            }};
        }
        let c = self.cur().unwrap();
        match c {
            '(' => { self.bump(); self.make(TokenKind::LParen, "(".into(), begin) }
            ')' => { self.bump(); self.make(TokenKind::RParen, ")".into(), begin) }
            '{' => { self.bump(); self.make(TokenKind::LBrace, "{".into(), begin) }
            '}' => { self.bump(); self.make(TokenKind::RBrace, "}".into(), begin) }
            '[' => { self.bump(); self.make(TokenKind::LBracket, "[".into(), begin) }
            ']' => { self.bump(); self.make(TokenKind::RBracket, "]".into(), begin) }
            ',' => { self.bump(); self.make(TokenKind::Comma, ",".into(), begin) }
            ';' => { self.bump(); self.make(TokenKind::Semicolon, ";".into(), begin) }
            '~' => { self.bump(); self.make(TokenKind::Tilde, "~".into(), begin) }
            '?' => { self.bump(); self.make(TokenKind::Question, "?".into(), begin) }
            '#' => two!('#', TokenKind::HashHash, TokenKind::Hash, "#"),
            ':' => { self.bump(); self.make(TokenKind::Colon, ":".into(), begin) }
            '.' => {
                if self.peek_char(1) == Some('.') && self.peek_char(2) == Some('.') {
                    self.bump();
                    self.bump();
                    self.bump();
                    self.make(TokenKind::Ellipsis, "...".into(), begin)
                } else {
                    self.bump();
                    self.make(TokenKind::Dot, ".".into(), begin)
                }
            }
            '-' => {
                self.bump();
                match self.cur() {
                    Some('>') => { self.bump(); self.make(TokenKind::Arrow, "->".into(), begin) }
                    Some('-') => { self.bump(); self.make(TokenKind::MinusMinus, "--".into(), begin) }
                    Some('=') => { self.bump(); self.make(TokenKind::MinusAssign, "-=".into(), begin) }
                    _ => self.make(TokenKind::Minus, "-".into(), begin),
                }
            }
            '+' => {
                self.bump();
                match self.cur() {
                    Some('+') => { self.bump(); self.make(TokenKind::PlusPlus, "++".into(), begin) }
                    Some('=') => { self.bump(); self.make(TokenKind::PlusAssign, "+=".into(), begin) }
                    _ => self.make(TokenKind::Plus, "+".into(), begin),
                }
            }
            '*' => two!('=', TokenKind::StarAssign, TokenKind::Star, "*"),
            '/' => two!('=', TokenKind::SlashAssign, TokenKind::Slash, "/"),
            '%' => two!('=', TokenKind::PercentAssign, TokenKind::Percent, "%"),
            '^' => two!('=', TokenKind::CaretAssign, TokenKind::Caret, "^"),
            '=' => two!('=', TokenKind::EqEq, TokenKind::Assign, "="),
            '!' => two!('=', TokenKind::BangEq, TokenKind::Bang, "!"),
            '&' => {
                self.bump();
                match self.cur() {
                    Some('&') => { self.bump(); self.make(TokenKind::AmpAmp, "&&".into(), begin) }
                    Some('=') => { self.bump(); self.make(TokenKind::AmpAssign, "&=".into(), begin) }
                    _ => self.make(TokenKind::Amp, "&".into(), begin),
                }
            }
            '|' => {
                self.bump();
                match self.cur() {
                    Some('|') => { self.bump(); self.make(TokenKind::PipePipe, "||".into(), begin) }
                    Some('=') => { self.bump(); self.make(TokenKind::PipeAssign, "|=".into(), begin) }
                    _ => self.make(TokenKind::Pipe, "|".into(), begin),
                }
            }
            '<' => {
                self.bump();
                match self.cur() {
                    Some('<') => {
                        self.bump();
                        if self.cur() == Some('=') {
                            self.bump();
                            self.make(TokenKind::ShiftLeftAssign, "<<=".into(), begin)
                        } else {
                            self.make(TokenKind::ShiftLeft, "<<".into(), begin)
                        }
                    }
                    Some('=') => { self.bump(); self.make(TokenKind::LtEq, "<=".into(), begin) }
                    _ => self.make(TokenKind::Lt, "<".into(), begin),
                }
            }
            '>' => {
                self.bump();
                match self.cur() {
                    Some('>') => {
                        self.bump();
                        if self.cur() == Some('=') {
                            self.bump();
                            self.make(TokenKind::ShiftRightAssign, ">>=".into(), begin)
                        } else {
                            self.make(TokenKind::ShiftRight, ">>".into(), begin)
                        }
                    }
                    Some('=') => { self.bump(); self.make(TokenKind::GtEq, ">=".into(), begin) }
                    _ => self.make(TokenKind::Gt, ">".into(), begin),
                }
            }
            other => {
                let text = self.bump().unwrap_or(other).to_string();
                self.make(TokenKind::Invalid, text, begin)
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

fn keyword_kind(text: &str) -> Option<TokenKind> {
    Some(match text {
        "auto" => TokenKind::KwAuto,
        "const" => TokenKind::KwConst,
        "extern" => TokenKind::KwExtern,
        "register" => TokenKind::KwRegister,
        "restrict" => TokenKind::KwRestrict,
        "static" => TokenKind::KwStatic,
        "typedef" => TokenKind::KwTypedef,
        "volatile" => TokenKind::KwVolatile,
        "inline" => TokenKind::KwInline,
        "void" => TokenKind::KwVoid,
        "char" => TokenKind::KwChar,
        "short" => TokenKind::KwShort,
        "int" => TokenKind::KwInt,
        "long" => TokenKind::KwLong,
        "float" => TokenKind::KwFloat,
        "double" => TokenKind::KwDouble,
        "signed" => TokenKind::KwSigned,
        "unsigned" => TokenKind::KwUnsigned,
        "_Bool" => TokenKind::KwBool,
        "_Complex" => TokenKind::KwComplex,
        "_Imaginary" => TokenKind::KwImaginary,
        "struct" => TokenKind::KwStruct,
        "union" => TokenKind::KwUnion,
        "enum" => TokenKind::KwEnum,
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        "switch" => TokenKind::KwSwitch,
        "case" => TokenKind::KwCase,
        "default" => TokenKind::KwDefault,
        "while" => TokenKind::KwWhile,
        "do" => TokenKind::KwDo,
        "for" => TokenKind::KwFor,
        "goto" => TokenKind::KwGoto,
        "continue" => TokenKind::KwContinue,
        "break" => TokenKind::KwBreak,
        "return" => TokenKind::KwReturn,
        "sizeof" => TokenKind::KwSizeof,
        "__attribute__" => TokenKind::KwAttribute,
        "__restrict__" => TokenKind::KwRestrictGnu,
        "__int128" => TokenKind::KwInt128,
        "_Atomic" => TokenKind::KwAtomic,
        "asm" | "__asm__" => TokenKind::KwAsm,
        _ => return None,
    })
}

#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;
