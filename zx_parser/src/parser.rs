//! Recursive-descent parser producing the AST in [`crate::ast`].
//!
//! The parser works over the lexer's *significant* token stream (trivia
//! and the preprocessor passthrough line are filtered out before parsing
//! starts — see [`Parser::from_source`]); the lexer itself still hands
//! back every whitespace/comment token, which is what the round-trip
//! invariant in the spec is actually about. One token of lookahead drives
//! most productions; a handful of spots (casts vs. parenthesized
//! expressions, compound literals, loop-macros) save/restore the cursor
//! to try an alternative.

use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use std::collections::HashSet;
use zx_common::{Diagnostics, Span};
use zx_lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    typedef_names: HashSet<String>,
    pub diagnostics: Diagnostics,
}

const SIGNIFICANT_EXCLUDED: &[TokenKind] = &[
    TokenKind::Whitespace,
    TokenKind::Tab,
    TokenKind::Newline,
    TokenKind::LineContinuation,
    TokenKind::LineComment,
    TokenKind::BlockCommentOpen,
    TokenKind::BlockCommentText,
    TokenKind::BlockCommentClose,
    TokenKind::DocCommentOpen,
    TokenKind::Preprocessor,
];

impl Parser {
    /// Builds a parser from every token the lexer produced, filtering out
    /// trivia and the preprocessor passthrough line.
    pub fn new(all_tokens: Vec<Token>) -> Self {
        let tokens: Vec<Token> = all_tokens
            .into_iter()
            .filter(|t| !SIGNIFICANT_EXCLUDED.contains(&t.kind))
            .collect();
        Self { tokens, pos: 0, typedef_names: HashSet::new(), diagnostics: Diagnostics::new() }
    }

    pub fn parse_translation_unit(&mut self) -> TranslationUnit {
        let mut items = Vec::new();
        while !self.at(TokenKind::Eof) {
            match self.parse_external_declaration() {
                Ok(decl) => items.push(decl),
                Err(e) => {
                    self.report(e);
                    self.sync_to_decl_boundary();
                }
            }
        }
        TranslationUnit { items }
    }

    // --------------------------------------------------------- cursor --

    fn peek(&self, k: usize) -> &Token {
        let idx = (self.pos + k).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn cur(&self) -> &Token {
        self.peek(0)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    fn save(&self) -> usize {
        self.pos
    }

    fn restore(&mut self, mark: usize) {
        self.pos = mark;
    }

    fn bump(&mut self) -> Token {
        let tok = self.cur().clone();
        if !self.at(TokenKind::Eof) {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(ParseError::Expected {
                position: self.cur().begin().clone(),
                expected: what.to_string(),
                found: format!("{:?} {:?}", self.cur().kind, self.cur().text),
            })
        }
    }

    fn report(&mut self, err: ParseError) {
        let (pos, msg) = match &err {
            ParseError::Expected { position, expected, found } => {
                (position.clone(), format!("expected {expected}, found {found}"))
            }
            ParseError::UnexpectedEof { position } => (position.clone(), "unexpected end of input".to_string()),
        };
        self.diagnostics.error(pos, msg);
    }

    /// Recovery after a syntax error at declaration scope: skip to the
    /// next `;` or the opening of a balanced `{ ... }` block, whichever
    /// comes first, so sibling declarations still get parsed.
    fn sync_to_decl_boundary(&mut self) {
        loop {
            match self.cur().kind {
                TokenKind::Eof => return,
                TokenKind::Semicolon => {
                    self.bump();
                    return;
                }
                TokenKind::LBrace => {
                    self.skip_balanced_braces();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn skip_balanced_braces(&mut self) {
        let mut depth = 0;
        loop {
            match self.cur().kind {
                TokenKind::Eof => return,
                TokenKind::LBrace => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::RBrace => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn span_from(&self, begin_tok: &Token) -> Span {
        let end = self.tokens[self.pos.saturating_sub(1)].end().clone();
        Span::new(begin_tok.begin().clone(), end)
    }

    fn is_typedef_name(&self, text: &str) -> bool {
        self.typedef_names.contains(text)
    }

    fn starts_type(&self) -> bool {
        match self.cur().kind {
            TokenKind::KwVoid
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
            | TokenKind::KwInt128
            | TokenKind::KwStruct
            | TokenKind::KwUnion
            | TokenKind::KwEnum
            | TokenKind::KwConst
            | TokenKind::KwVolatile
            | TokenKind::KwRestrict
            | TokenKind::KwRestrictGnu
            | TokenKind::KwAtomic
            | TokenKind::KwTypedef
            | TokenKind::KwExtern
            | TokenKind::KwStatic
            | TokenKind::KwAuto
            | TokenKind::KwRegister
            | TokenKind::KwInline
            | TokenKind::KwAttribute => true,
            TokenKind::Identifier => self.is_typedef_name(&self.cur().text),
            _ => false,
        }
    }

    // --------------------------------------------------- declarations --

    fn parse_external_declaration(&mut self) -> ParseResult<Decl> {
        let begin = self.cur().clone();
        if self.at(TokenKind::KwExtern)
            && self.peek(1).kind == TokenKind::StringLiteral
            && self.peek(1).text.trim_matches('"') == "C"
        {
            self.bump(); // extern
            self.bump(); // "C"
            self.expect(TokenKind::LBrace, "'{'")?;
            let mut items = Vec::new();
            while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                items.push(self.parse_external_declaration()?);
            }
            self.expect(TokenKind::RBrace, "'}'")?;
            let span = self.span_from(&begin);
            return Ok(Decl::new(DeclKind::ExternC { items }, span, vec![begin]));
        }
        if self.at(TokenKind::Identifier)
            && self.peek(1).kind == TokenKind::LParen
            && !self.is_typedef_name(&self.cur().text)
        {
            return self.parse_macro_decl();
        }
        self.parse_global_decl()
    }

    fn parse_macro_decl(&mut self) -> ParseResult<Decl> {
        let begin = self.cur().clone();
        let name = self.bump().text.to_string();
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_assignment_expr()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let result_specifiers = if self.starts_type() {
            Some(self.parse_declaration_specifiers()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "';'")?;
        let span = self.span_from(&begin);
        Ok(Decl::new(DeclKind::Macro { name, args, result_specifiers }, span, vec![begin]))
    }

    fn parse_global_decl(&mut self) -> ParseResult<Decl> {
        let begin = self.cur().clone();
        let specifiers = self.parse_declaration_specifiers()?;
        let is_typedef = matches!(
            &specifiers.node,
            SpecifierKind::DeclarationSpecifiers { storage, .. } if storage.contains(&StorageClass::Typedef)
        );
        let attributes = self.parse_attribute_specifier_list()?;
        let mut declarators = Vec::new();
        if self.at(TokenKind::Semicolon) {
            self.bump();
            let span = self.span_from(&begin);
            return Ok(Decl::new(DeclKind::Global { specifiers, declarators, attributes }, span, vec![]));
        }
        loop {
            let declarator = self.parse_declarator()?;
            let _ = self.parse_attribute_specifier_list()?;
            if is_typedef {
                self.register_typedef_name(&declarator);
            }
            if self.at(TokenKind::LBrace) && declarators.is_empty() {
                let body = self.parse_block()?;
                declarators.push(InitDeclarator { declarator, initializer: None, body: Some(body) });
                let span = self.span_from(&begin);
                return Ok(Decl::new(DeclKind::Global { specifiers, declarators, attributes }, span, vec![]));
            }
            let initializer = if self.at(TokenKind::Assign) {
                self.bump();
                Some(self.parse_assignment_expr()?)
            } else {
                None
            };
            declarators.push(InitDeclarator { declarator, initializer, body: None });
            if self.at(TokenKind::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        let span = self.span_from(&begin);
        Ok(Decl::new(DeclKind::Global { specifiers, declarators, attributes }, span, vec![]))
    }

    fn register_typedef_name(&mut self, d: &Declarator) {
        fn innermost_name(d: &Declarator) -> Option<String> {
            match &d.node {
                DeclaratorKind::Identifier { name } => Some(name.clone()),
                DeclaratorKind::Paren { inner }
                | DeclaratorKind::Pointer { inner, .. }
                | DeclaratorKind::Function { inner, .. }
                | DeclaratorKind::Array { inner, .. } => innermost_name(inner),
                DeclaratorKind::NoIdentifier => None,
            }
        }
        if let Some(name) = innermost_name(d) {
            self.typedef_names.insert(name);
        }
    }

    fn parse_declaration_specifiers(&mut self) -> ParseResult<Specifier> {
        let begin = self.cur().clone();
        let mut storage = Vec::new();
        let mut qualifiers = Vec::new();
        let mut function_specifiers = Vec::new();
        let mut basic_flags = BasicFlags::default();
        let mut record_or_named: Option<Specifier> = None;

        loop {
            match self.cur().kind {
                TokenKind::KwTypedef => { self.bump(); storage.push(StorageClass::Typedef); }
                TokenKind::KwExtern => { self.bump(); storage.push(StorageClass::Extern); }
                TokenKind::KwStatic => { self.bump(); storage.push(StorageClass::Static); }
                TokenKind::KwAuto => { self.bump(); storage.push(StorageClass::Auto); }
                TokenKind::KwRegister => { self.bump(); storage.push(StorageClass::Register); }
                TokenKind::KwConst => { self.bump(); qualifiers.push(TypeQualifierKind::Const); }
                TokenKind::KwVolatile => { self.bump(); qualifiers.push(TypeQualifierKind::Volatile); }
                TokenKind::KwRestrict | TokenKind::KwRestrictGnu => { self.bump(); qualifiers.push(TypeQualifierKind::Restrict); }
                TokenKind::KwAtomic => { self.bump(); qualifiers.push(TypeQualifierKind::Atomic); }
                TokenKind::KwInline => { self.bump(); function_specifiers.push(FunctionSpecifier::Inline); }
                TokenKind::KwAttribute => {
                    let specs = self.parse_attribute_specifier_list()?;
                    let _ = specs;
                }
                TokenKind::KwVoid if record_or_named.is_none() => { self.bump(); basic_flags.void = true; }
                TokenKind::KwChar if record_or_named.is_none() => { self.bump(); basic_flags.char_ = true; }
                TokenKind::KwShort if record_or_named.is_none() => { self.bump(); basic_flags.short = true; }
                TokenKind::KwInt if record_or_named.is_none() => { self.bump(); basic_flags.int = true; }
                TokenKind::KwLong if record_or_named.is_none() => { self.bump(); basic_flags.long += 1; }
                TokenKind::KwFloat if record_or_named.is_none() => { self.bump(); basic_flags.float = true; }
                TokenKind::KwDouble if record_or_named.is_none() => { self.bump(); basic_flags.double = true; }
                TokenKind::KwSigned if record_or_named.is_none() => { self.bump(); basic_flags.signed = true; }
                TokenKind::KwUnsigned if record_or_named.is_none() => { self.bump(); basic_flags.unsigned = true; }
                TokenKind::KwBool if record_or_named.is_none() => { self.bump(); basic_flags.bool_ = true; }
                TokenKind::KwInt128 if record_or_named.is_none() => { self.bump(); basic_flags.int128 = true; }
                TokenKind::KwStruct if record_or_named.is_none() && !basic_flags.any() => {
                    record_or_named = Some(self.parse_record_specifier(RecordKeyword::Struct)?);
                }
                TokenKind::KwUnion if record_or_named.is_none() && !basic_flags.any() => {
                    record_or_named = Some(self.parse_record_specifier(RecordKeyword::Union)?);
                }
                TokenKind::KwEnum if record_or_named.is_none() && !basic_flags.any() => {
                    record_or_named = Some(self.parse_enum_specifier()?);
                }
                TokenKind::Identifier
                    if record_or_named.is_none() && !basic_flags.any() && self.is_typedef_name(&self.cur().text) =>
                {
                    let tok = self.bump();
                    let span = Span::new(tok.begin().clone(), tok.end().clone());
                    record_or_named =
                        Some(Specifier::new(SpecifierKind::IdentifierType { name: tok.text.to_string() }, span, vec![tok]));
                }
                _ => break,
            }
        }

        let ty = record_or_named.unwrap_or_else(|| {
            let span = self.span_from(&begin);
            Specifier::new(SpecifierKind::BasicType { kind: basic_flags.resolve() }, span, vec![])
        });

        let span = self.span_from(&begin);
        Ok(Specifier::new(
            SpecifierKind::DeclarationSpecifiers { storage, qualifiers, function_specifiers, ty: Box::new(ty) },
            span,
            vec![],
        ))
    }

    /// Like [`Self::parse_declaration_specifiers`] but rejects storage
    /// classes other than `register`, matching the grammar for parameter
    /// and cast/sizeof type-name positions.
    fn parse_specifier_qualifier_list(&mut self) -> ParseResult<Specifier> {
        let full = self.parse_declaration_specifiers()?;
        if let SpecifierKind::DeclarationSpecifiers { qualifiers, ty, .. } = full.node {
            Ok(Specifier::new(SpecifierKind::SpecifierQualifierList { qualifiers, ty }, full.span, vec![]))
        } else {
            Ok(full)
        }
    }

    fn parse_type_qualifier_list(&mut self) -> Vec<SpecifierKind> {
        let mut out = Vec::new();
        loop {
            match self.cur().kind {
                TokenKind::KwConst => { self.bump(); out.push(SpecifierKind::TypeQualifier { qualifier: TypeQualifierKind::Const }); }
                TokenKind::KwVolatile => { self.bump(); out.push(SpecifierKind::TypeQualifier { qualifier: TypeQualifierKind::Volatile }); }
                TokenKind::KwRestrict | TokenKind::KwRestrictGnu => { self.bump(); out.push(SpecifierKind::TypeQualifier { qualifier: TypeQualifierKind::Restrict }); }
                TokenKind::KwAtomic => { self.bump(); out.push(SpecifierKind::TypeQualifier { qualifier: TypeQualifierKind::Atomic }); }
                _ => break,
            }
        }
        out
    }

    fn parse_record_specifier(&mut self, keyword: RecordKeyword) -> ParseResult<Specifier> {
        let begin = self.cur().clone();
        self.bump(); // struct/union
        let tag = if self.at(TokenKind::Identifier) { Some(self.bump().text.to_string()) } else { None };
        let _ = self.parse_attribute_specifier_list()?;
        let fields = if self.at(TokenKind::LBrace) {
            self.bump();
            let mut fields = Vec::new();
            while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                let specifiers = self.parse_specifier_qualifier_list()?;
                loop {
                    let declarator = self.parse_declarator()?;
                    fields.push(RecordField { specifiers: specifiers.clone(), declarator });
                    if self.at(TokenKind::Comma) {
                        self.bump();
                        continue;
                    }
                    break;
                }
                self.expect(TokenKind::Semicolon, "';'")?;
            }
            self.expect(TokenKind::RBrace, "'}'")?;
            let _ = self.parse_attribute_specifier_list()?;
            Some(fields)
        } else {
            None
        };
        let span = self.span_from(&begin);
        Ok(Specifier::new(SpecifierKind::Record { keyword, tag, fields }, span, vec![begin]))
    }

    fn parse_enum_specifier(&mut self) -> ParseResult<Specifier> {
        let begin = self.cur().clone();
        self.bump(); // enum
        let tag = if self.at(TokenKind::Identifier) { Some(self.bump().text.to_string()) } else { None };
        let elements = if self.at(TokenKind::LBrace) {
            self.bump();
            let mut elements = Vec::new();
            while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                let name = self.expect(TokenKind::Identifier, "enumerator name")?.text.to_string();
                let value = if self.at(TokenKind::Assign) {
                    self.bump();
                    Some(self.parse_conditional_expr()?)
                } else {
                    None
                };
                elements.push(EnumElement { name, value });
                if self.at(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
            self.expect(TokenKind::RBrace, "'}'")?;
            Some(elements)
        } else {
            None
        };
        let span = self.span_from(&begin);
        Ok(Specifier::new(SpecifierKind::Enum { tag, elements }, span, vec![begin]))
    }

    // ----------------------------------------------------- attributes --

    fn parse_attribute_specifier_list(&mut self) -> ParseResult<Vec<AttributeSpec>> {
        let mut out = Vec::new();
        while self.at(TokenKind::KwAttribute) {
            out.push(self.parse_attribute_specifier()?);
        }
        Ok(out)
    }

    fn parse_attribute_specifier(&mut self) -> ParseResult<AttributeSpec> {
        let begin = self.bump(); // __attribute__
        self.expect(TokenKind::LParen, "'('")?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut attributes = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                let name = self.expect(TokenKind::Identifier, "attribute name")?.text.to_string();
                let args = if self.at(TokenKind::LParen) {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.at(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_assignment_expr()?);
                            if self.at(TokenKind::Comma) {
                                self.bump();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                    args
                } else {
                    Vec::new()
                };
                attributes.push(Attribute { name, args });
                if self.at(TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::RParen, "')'")?;
        let span = self.span_from(&begin);
        Ok(AttributeSpec::new(AttributeSpecKind::AttributeSpecifier { attributes }, span, vec![begin]))
    }

    // --------------------------------------------------- declarators --

    fn parse_declarator(&mut self) -> ParseResult<Declarator> {
        let mut pointer_quals = Vec::new();
        while self.at(TokenKind::Star) {
            self.bump();
            pointer_quals.push(self.parse_type_qualifier_list());
        }
        let mut d = self.parse_direct_declarator()?;
        for quals in pointer_quals.into_iter().rev() {
            let span = d.span.clone();
            d = Declarator::new(DeclaratorKind::Pointer { qualifiers: quals, inner: Box::new(d) }, span, vec![]);
        }
        Ok(d)
    }

    fn parse_direct_declarator(&mut self) -> ParseResult<Declarator> {
        let begin = self.cur().clone();
        let mut base = if self.at(TokenKind::Identifier) {
            let tok = self.bump();
            let span = Span::new(tok.begin().clone(), tok.end().clone());
            Declarator::new(DeclaratorKind::Identifier { name: tok.text.to_string() }, span, vec![tok])
        } else if self.at(TokenKind::LParen) {
            self.bump();
            let inner = self.parse_declarator()?;
            self.expect(TokenKind::RParen, "')'")?;
            let span = self.span_from(&begin);
            Declarator::new(DeclaratorKind::Paren { inner: Box::new(inner) }, span, vec![])
        } else {
            let span = self.span_from(&begin);
            Declarator::new(DeclaratorKind::NoIdentifier, span, vec![])
        };
        loop {
            if self.at(TokenKind::LBracket) {
                self.bump();
                let size = if self.at(TokenKind::RBracket) { None } else { Some(Box::new(self.parse_assignment_expr()?)) };
                self.expect(TokenKind::RBracket, "']'")?;
                let span = self.span_from(&begin);
                base = Declarator::new(DeclaratorKind::Array { inner: Box::new(base), size }, span, vec![]);
            } else if self.at(TokenKind::LParen) {
                self.bump();
                let (params, variadic) = self.parse_parameter_list()?;
                self.expect(TokenKind::RParen, "')'")?;
                let span = self.span_from(&begin);
                base = Declarator::new(DeclaratorKind::Function { inner: Box::new(base), params, variadic }, span, vec![]);
            } else {
                break;
            }
        }
        Ok(base)
    }

    fn parse_parameter_list(&mut self) -> ParseResult<(Vec<Param>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;
        if self.at(TokenKind::RParen) {
            return Ok((params, variadic));
        }
        loop {
            if self.at(TokenKind::Ellipsis) {
                self.bump();
                variadic = true;
                break;
            }
            let specifiers = self.parse_declaration_specifiers()?;
            let declarator = if self.at(TokenKind::Comma) || self.at(TokenKind::RParen) {
                None
            } else {
                Some(self.parse_declarator()?)
            };
            params.push(Param { specifiers, declarator });
            if self.at(TokenKind::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        Ok((params, variadic))
    }

    // ------------------------------------------------------ statements --

    fn parse_block(&mut self) -> ParseResult<Stmt> {
        let begin = self.expect(TokenKind::LBrace, "'{'")?;
        let mut items = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            match self.parse_block_item() {
                Ok(s) => items.push(s),
                Err(e) => {
                    self.report(e);
                    self.sync_to_decl_boundary();
                }
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::Block { items }, span, vec![begin]))
    }

    fn parse_block_item(&mut self) -> ParseResult<Stmt> {
        if self.starts_type() {
            let begin = self.cur().clone();
            let decl = self.parse_global_decl()?;
            let span = self.span_from(&begin);
            return Ok(Stmt::new(StmtKind::Decl { decl: Box::new(decl) }, span, vec![]));
        }
        self.parse_statement()
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.cur().clone();
        match self.cur().kind {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwDo => self.parse_do_while(),
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwSwitch => self.parse_switch(),
            TokenKind::KwCase => self.parse_case(),
            TokenKind::KwDefault => self.parse_default(),
            TokenKind::KwGoto => self.parse_goto(),
            TokenKind::KwBreak => {
                self.bump();
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::new(StmtKind::Break, self.span_from(&begin), vec![begin]))
            }
            TokenKind::KwContinue => {
                self.bump();
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::new(StmtKind::Continue, self.span_from(&begin), vec![begin]))
            }
            TokenKind::KwReturn => self.parse_return(),
            TokenKind::Semicolon => {
                self.bump();
                Ok(Stmt::new(StmtKind::Null, self.span_from(&begin), vec![begin]))
            }
            TokenKind::KwAsm => self.parse_asm_stmt(),
            TokenKind::Identifier if self.peek(1).kind == TokenKind::Colon => self.parse_label(),
            TokenKind::Identifier if self.peek(1).kind == TokenKind::LParen && self.is_loop_macro_ahead() => {
                self.parse_loop_macro()
            }
            _ => self.parse_expr_stmt(),
        }
    }

    /// A loop-macro is `identifier(args) { body }` at statement position,
    /// with no semicolon between the call and the brace. Scanning ahead to
    /// the matching `)` and checking for a following `{` is enough to tell
    /// it apart from an ordinary call expression statement.
    fn is_loop_macro_ahead(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.pos + 1;
        loop {
            match self.tokens.get(i).map(|t| t.kind) {
                Some(TokenKind::LParen) => { depth += 1; i += 1; }
                Some(TokenKind::RParen) => {
                    depth -= 1;
                    i += 1;
                    if depth == 0 {
                        return self.tokens.get(i).map(|t| t.kind) == Some(TokenKind::LBrace);
                    }
                }
                Some(TokenKind::Eof) | None => return false,
                _ => i += 1,
            }
        }
    }

    fn parse_loop_macro(&mut self) -> ParseResult<Stmt> {
        let begin = self.cur().clone();
        let name = self.bump().text.to_string();
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_assignment_expr()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_block()?);
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::LoopMacro { name, args, body }, span, vec![begin]))
    }

    fn parse_label(&mut self) -> ParseResult<Stmt> {
        let begin = self.cur().clone();
        let name = self.bump().text.to_string();
        self.expect(TokenKind::Colon, "':'")?;
        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::Label { name, body }, span, vec![begin]))
    }

    fn parse_goto(&mut self) -> ParseResult<Stmt> {
        let begin = self.bump();
        let name = self.expect(TokenKind::Identifier, "label name")?.text.to_string();
        self.expect(TokenKind::Semicolon, "';'")?;
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::Goto { label: name }, span, vec![begin]))
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let begin = self.bump();
        let value = if self.at(TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon, "';'")?;
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::Return { value }, span, vec![begin]))
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let begin = self.bump();
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let then_branch = Box::new(self.parse_statement()?);
        let mut else_ifs = Vec::new();
        let mut else_branch = None;
        while self.at(TokenKind::KwElse) {
            self.bump();
            if self.at(TokenKind::KwIf) {
                self.bump();
                self.expect(TokenKind::LParen, "'('")?;
                let c = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                let s = self.parse_statement()?;
                else_ifs.push(ElseIf { cond: c, then_branch: s });
            } else {
                else_branch = Some(Box::new(self.parse_statement()?));
                break;
            }
        }
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::If { cond, then_branch, else_ifs, else_branch }, span, vec![begin]))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let begin = self.bump();
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::While { cond, body }, span, vec![begin]))
    }

    fn parse_do_while(&mut self) -> ParseResult<Stmt> {
        let begin = self.bump();
        let body = Box::new(self.parse_statement()?);
        self.expect(TokenKind::KwWhile, "'while'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::Semicolon, "';'")?;
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::DoWhile { body, cond }, span, vec![begin]))
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let begin = self.bump();
        self.expect(TokenKind::LParen, "'('")?;
        let init = if self.at(TokenKind::Semicolon) {
            self.bump();
            None
        } else if self.starts_type() {
            let decl = self.parse_global_decl()?;
            Some(Box::new(Stmt::new(StmtKind::Decl { decl: Box::new(decl) }, self.span_from(&begin), vec![])))
        } else {
            let e = self.parse_expr()?;
            self.expect(TokenKind::Semicolon, "';'")?;
            Some(Box::new(Stmt::new(StmtKind::Expr { expr: e }, self.span_from(&begin), vec![])))
        };
        let cond = if self.at(TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon, "';'")?;
        let step = if self.at(TokenKind::RParen) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::For { init, cond, step, body }, span, vec![begin]))
    }

    fn parse_switch(&mut self) -> ParseResult<Stmt> {
        let begin = self.bump();
        self.expect(TokenKind::LParen, "'('")?;
        let scrutinee = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::Switch { scrutinee, body }, span, vec![begin]))
    }

    fn parse_case(&mut self) -> ParseResult<Stmt> {
        let begin = self.bump();
        let value = self.parse_conditional_expr()?;
        self.expect(TokenKind::Colon, "':'")?;
        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::Case { value, body }, span, vec![begin]))
    }

    fn parse_default(&mut self) -> ParseResult<Stmt> {
        let begin = self.bump();
        self.expect(TokenKind::Colon, "':'")?;
        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::Default { body }, span, vec![begin]))
    }

    fn parse_expr_stmt(&mut self) -> ParseResult<Stmt> {
        let begin = self.cur().clone();
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        let span = self.span_from(&begin);
        Ok(Stmt::new(StmtKind::Expr { expr }, span, vec![]))
    }

    fn parse_asm_stmt(&mut self) -> ParseResult<Stmt> {
        let begin = self.bump(); // asm / __asm__
        let mut qualifiers = Vec::new();
        while matches!(self.cur().kind, TokenKind::KwVolatile | TokenKind::KwConst) {
            qualifiers.push(self.bump().text.to_string());
        }
        self.expect(TokenKind::LParen, "'('")?;
        let template = self.parse_string_concat_text()?;
        let mut outputs = Vec::new();
        let mut inputs = Vec::new();
        let mut clobbers = Vec::new();
        let mut goto_labels = Vec::new();
        if self.at(TokenKind::Colon) {
            self.bump();
            outputs = self.parse_asm_operand_list()?;
        }
        if self.at(TokenKind::Colon) {
            self.bump();
            inputs = self.parse_asm_operand_list()?;
        }
        if self.at(TokenKind::Colon) {
            self.bump();
            clobbers = self.parse_string_list()?;
        }
        if self.at(TokenKind::Colon) {
            self.bump();
            goto_labels = self.parse_ident_list()?;
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::Semicolon, "';'")?;
        let span = self.span_from(&begin);
        Ok(Stmt::new(
            StmtKind::Asm { qualifiers, template, outputs, inputs, clobbers, goto_labels },
            span,
            vec![begin],
        ))
    }

    fn parse_string_concat_text(&mut self) -> ParseResult<String> {
        let mut text = String::new();
        text.push_str(&self.expect(TokenKind::StringLiteral, "string literal")?.text);
        while self.at(TokenKind::StringLiteral) {
            text.push_str(&self.bump().text);
        }
        Ok(text)
    }

    fn parse_asm_operand_list(&mut self) -> ParseResult<Vec<AsmOperand>> {
        let mut out = Vec::new();
        if matches!(self.cur().kind, TokenKind::Colon | TokenKind::RParen) {
            return Ok(out);
        }
        loop {
            let constraint = self.expect(TokenKind::StringLiteral, "constraint string")?.text.to_string();
            self.expect(TokenKind::LParen, "'('")?;
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            out.push(AsmOperand { constraint, expr });
            if self.at(TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn parse_string_list(&mut self) -> ParseResult<Vec<String>> {
        let mut out = Vec::new();
        if matches!(self.cur().kind, TokenKind::Colon | TokenKind::RParen) {
            return Ok(out);
        }
        loop {
            out.push(self.expect(TokenKind::StringLiteral, "string literal")?.text.to_string());
            if self.at(TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn parse_ident_list(&mut self) -> ParseResult<Vec<String>> {
        let mut out = Vec::new();
        if matches!(self.cur().kind, TokenKind::Colon | TokenKind::RParen) {
            return Ok(out);
        }
        loop {
            out.push(self.expect(TokenKind::Identifier, "identifier")?.text.to_string());
            if self.at(TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------ expressions --

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        let mut e = self.parse_assignment_expr()?;
        while self.at(TokenKind::Comma) {
            self.bump();
            let rhs = self.parse_assignment_expr()?;
            let span = Span::new(e.span.begin.clone(), rhs.span.end.clone());
            e = Expr::new(ExprKind::Comma { lhs: Box::new(e), rhs: Box::new(rhs) }, span, vec![]);
        }
        Ok(e)
    }

    fn assign_op(kind: TokenKind) -> Option<BinOpKind> {
        Some(match kind {
            TokenKind::Assign => BinOpKind::Assign,
            TokenKind::PlusAssign => BinOpKind::AddAssign,
            TokenKind::MinusAssign => BinOpKind::SubAssign,
            TokenKind::StarAssign => BinOpKind::MulAssign,
            TokenKind::SlashAssign => BinOpKind::DivAssign,
            TokenKind::PercentAssign => BinOpKind::ModAssign,
            TokenKind::AmpAssign => BinOpKind::AndAssign,
            TokenKind::PipeAssign => BinOpKind::OrAssign,
            TokenKind::CaretAssign => BinOpKind::XorAssign,
            TokenKind::ShiftLeftAssign => BinOpKind::ShlAssign,
            TokenKind::ShiftRightAssign => BinOpKind::ShrAssign,
            _ => return None,
        })
    }

    pub fn parse_assignment_expr(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_conditional_expr()?;
        if let Some(op) = Self::assign_op(self.cur().kind) {
            self.bump();
            let rhs = self.parse_assignment_expr()?;
            let span = Span::new(lhs.span.begin.clone(), rhs.span.end.clone());
            return Ok(Expr::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span, vec![]));
        }
        Ok(lhs)
    }

    fn parse_conditional_expr(&mut self) -> ParseResult<Expr> {
        let cond = self.parse_binary_expr(0)?;
        if self.at(TokenKind::Question) {
            self.bump();
            let then_branch = self.parse_expr()?;
            self.expect(TokenKind::Colon, "':'")?;
            let else_branch = self.parse_conditional_expr()?;
            let span = Span::new(cond.span.begin.clone(), else_branch.span.end.clone());
            return Ok(Expr::new(
                ExprKind::Conditional {
                    cond: Box::new(cond),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                },
                span,
                vec![],
            ));
        }
        Ok(cond)
    }

    const PREC_LEVELS: &'static [&'static [(TokenKind, BinOpKind)]] = &[
        &[(TokenKind::PipePipe, BinOpKind::LogOr)],
        &[(TokenKind::AmpAmp, BinOpKind::LogAnd)],
        &[(TokenKind::Pipe, BinOpKind::BitOr)],
        &[(TokenKind::Caret, BinOpKind::BitXor)],
        &[(TokenKind::Amp, BinOpKind::BitAnd)],
        &[(TokenKind::EqEq, BinOpKind::Eq), (TokenKind::BangEq, BinOpKind::Ne)],
        &[
            (TokenKind::Lt, BinOpKind::Lt),
            (TokenKind::Gt, BinOpKind::Gt),
            (TokenKind::LtEq, BinOpKind::Le),
            (TokenKind::GtEq, BinOpKind::Ge),
        ],
        &[(TokenKind::ShiftLeft, BinOpKind::Shl), (TokenKind::ShiftRight, BinOpKind::Shr)],
        &[(TokenKind::Plus, BinOpKind::Add), (TokenKind::Minus, BinOpKind::Sub)],
        &[(TokenKind::Star, BinOpKind::Mul), (TokenKind::Slash, BinOpKind::Div), (TokenKind::Percent, BinOpKind::Mod)],
    ];

    fn parse_binary_expr(&mut self, level: usize) -> ParseResult<Expr> {
        if level >= Self::PREC_LEVELS.len() {
            return self.parse_cast_expr();
        }
        let mut lhs = self.parse_binary_expr(level + 1)?;
        'outer: loop {
            for (kind, op) in Self::PREC_LEVELS[level] {
                if self.at(*kind) {
                    self.bump();
                    let rhs = self.parse_binary_expr(level + 1)?;
                    let span = Span::new(lhs.span.begin.clone(), rhs.span.end.clone());
                    lhs = Expr::new(ExprKind::Binary { op: op.clone(), lhs: Box::new(lhs), rhs: Box::new(rhs) }, span, vec![]);
                    continue 'outer;
                }
            }
            break;
        }
        Ok(lhs)
    }

    fn parse_cast_expr(&mut self) -> ParseResult<Expr> {
        if self.at(TokenKind::LParen) {
            let mark = self.save();
            let begin = self.cur().clone();
            self.bump();
            if self.starts_type() {
                let type_name = self.parse_specifier_qualifier_list()?;
                let abstract_declarator = if self.at(TokenKind::RParen) { None } else { Some(Box::new(self.parse_declarator()?)) };
                if self.expect(TokenKind::RParen, "')'").is_ok() {
                    if self.at(TokenKind::LBrace) {
                        let initializers = self.parse_initializer_list()?;
                        let span = self.span_from(&begin);
                        return Ok(Expr::new(
                            ExprKind::CompoundLiteral { type_name: Box::new(type_name), abstract_declarator, initializers },
                            span,
                            vec![],
                        ));
                    }
                    let operand = self.parse_cast_expr()?;
                    let span = Span::new(begin.begin().clone(), operand.span.end.clone());
                    return Ok(Expr::new(
                        ExprKind::Cast { type_name: Box::new(type_name), abstract_declarator, operand: Box::new(operand) },
                        span,
                        vec![],
                    ));
                }
            }
            self.restore(mark);
        }
        self.parse_unary_expr()
    }

    fn parse_initializer_list(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut items = Vec::new();
        if !self.at(TokenKind::RBrace) {
            loop {
                items.push(self.parse_assignment_expr()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                    if self.at(TokenKind::RBrace) {
                        break;
                    }
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(items)
    }

    fn parse_unary_expr(&mut self) -> ParseResult<Expr> {
        let begin = self.cur().clone();
        match self.cur().kind {
            TokenKind::PlusPlus => {
                self.bump();
                let operand = self.parse_unary_expr()?;
                let span = Span::new(begin.begin().clone(), operand.span.end.clone());
                Ok(Expr::new(ExprKind::Adjust { op: AdjustKind::PreIncrement, operand: Box::new(operand) }, span, vec![]))
            }
            TokenKind::MinusMinus => {
                self.bump();
                let operand = self.parse_unary_expr()?;
                let span = Span::new(begin.begin().clone(), operand.span.end.clone());
                Ok(Expr::new(ExprKind::Adjust { op: AdjustKind::PreDecrement, operand: Box::new(operand) }, span, vec![]))
            }
            TokenKind::Amp => {
                self.bump();
                let operand = self.parse_cast_expr()?;
                let span = Span::new(begin.begin().clone(), operand.span.end.clone());
                Ok(Expr::new(ExprKind::AddrOf { operand: Box::new(operand) }, span, vec![]))
            }
            TokenKind::Star => {
                self.bump();
                let operand = self.parse_cast_expr()?;
                let span = Span::new(begin.begin().clone(), operand.span.end.clone());
                Ok(Expr::new(ExprKind::Deref { operand: Box::new(operand) }, span, vec![]))
            }
            TokenKind::Plus => {
                self.bump();
                let operand = self.parse_cast_expr()?;
                let span = Span::new(begin.begin().clone(), operand.span.end.clone());
                Ok(Expr::new(ExprKind::Unary { op: UnaryKind::Plus, operand: Box::new(operand) }, span, vec![]))
            }
            TokenKind::Minus => {
                self.bump();
                let operand = self.parse_cast_expr()?;
                let span = Span::new(begin.begin().clone(), operand.span.end.clone());
                Ok(Expr::new(ExprKind::Unary { op: UnaryKind::Minus, operand: Box::new(operand) }, span, vec![]))
            }
            TokenKind::Tilde => {
                self.bump();
                let operand = self.parse_cast_expr()?;
                let span = Span::new(begin.begin().clone(), operand.span.end.clone());
                Ok(Expr::new(ExprKind::Unary { op: UnaryKind::BitwiseNot, operand: Box::new(operand) }, span, vec![]))
            }
            TokenKind::Bang => {
                self.bump();
                let operand = self.parse_cast_expr()?;
                let span = Span::new(begin.begin().clone(), operand.span.end.clone());
                Ok(Expr::new(ExprKind::Unary { op: UnaryKind::LogicalNot, operand: Box::new(operand) }, span, vec![]))
            }
            TokenKind::KwSizeof => self.parse_sizeof(),
            _ => self.parse_postfix_expr(),
        }
    }

    fn parse_sizeof(&mut self) -> ParseResult<Expr> {
        let begin = self.bump(); // sizeof
        if self.at(TokenKind::LParen) {
            let mark = self.save();
            self.bump();
            if self.starts_type() {
                let type_name = self.parse_specifier_qualifier_list()?;
                let abstract_declarator = if self.at(TokenKind::RParen) { None } else { Some(Box::new(self.parse_declarator()?)) };
                if self.expect(TokenKind::RParen, "')'").is_ok() {
                    let span = self.span_from(&begin);
                    return Ok(Expr::new(
                        ExprKind::SizeofType { type_name: Box::new(type_name), abstract_declarator },
                        span,
                        vec![begin],
                    ));
                }
            }
            self.restore(mark);
        }
        let operand = self.parse_unary_expr()?;
        let span = Span::new(begin.begin().clone(), operand.span.end.clone());
        Ok(Expr::new(ExprKind::SizeofExpr { operand: Box::new(operand) }, span, vec![begin]))
    }

    fn parse_postfix_expr(&mut self) -> ParseResult<Expr> {
        let begin_pos = self.cur().begin().clone();
        let mut e = self.parse_primary_expr()?;
        loop {
            match self.cur().kind {
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    let span = Span::new(begin_pos.clone(), self.tokens[self.pos - 1].end().clone());
                    e = Expr::new(ExprKind::Index { base: Box::new(e), index: Box::new(index) }, span, vec![]);
                }
                TokenKind::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.at(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_assignment_expr()?);
                            if self.at(TokenKind::Comma) {
                                self.bump();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                    let span = Span::new(begin_pos.clone(), self.tokens[self.pos - 1].end().clone());
                    e = Expr::new(ExprKind::Call { callee: Box::new(e), args }, span, vec![]);
                }
                TokenKind::Dot => {
                    self.bump();
                    let field = self.expect(TokenKind::Identifier, "field name")?.text.to_string();
                    let span = Span::new(begin_pos.clone(), self.tokens[self.pos - 1].end().clone());
                    e = Expr::new(ExprKind::Member { base: Box::new(e), field }, span, vec![]);
                }
                TokenKind::Arrow => {
                    self.bump();
                    let field = self.expect(TokenKind::Identifier, "field name")?.text.to_string();
                    let span = Span::new(begin_pos.clone(), self.tokens[self.pos - 1].end().clone());
                    e = Expr::new(ExprKind::IndirectMember { base: Box::new(e), field }, span, vec![]);
                }
                TokenKind::PlusPlus => {
                    self.bump();
                    let span = Span::new(begin_pos.clone(), self.tokens[self.pos - 1].end().clone());
                    e = Expr::new(ExprKind::Adjust { op: AdjustKind::PostIncrement, operand: Box::new(e) }, span, vec![]);
                }
                TokenKind::MinusMinus => {
                    self.bump();
                    let span = Span::new(begin_pos.clone(), self.tokens[self.pos - 1].end().clone());
                    e = Expr::new(ExprKind::Adjust { op: AdjustKind::PostDecrement, operand: Box::new(e) }, span, vec![]);
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn parse_primary_expr(&mut self) -> ParseResult<Expr> {
        let begin = self.cur().clone();
        match self.cur().kind {
            TokenKind::IntLiteral => {
                let tok = self.bump();
                let span = Span::new(tok.begin().clone(), tok.end().clone());
                Ok(Expr::new(ExprKind::IntLiteral { text: tok.text.to_string() }, span, vec![tok]))
            }
            TokenKind::CharLiteral => {
                let tok = self.bump();
                let span = Span::new(tok.begin().clone(), tok.end().clone());
                Ok(Expr::new(ExprKind::CharLiteral { text: tok.text.to_string() }, span, vec![tok]))
            }
            TokenKind::StringLiteral => {
                let first = self.bump();
                let mut parts = vec![{
                    let span = Span::new(first.begin().clone(), first.end().clone());
                    Expr::new(ExprKind::StringLiteral { text: first.text.to_string() }, span, vec![first.clone()])
                }];
                while self.at(TokenKind::StringLiteral) {
                    let tok = self.bump();
                    let span = Span::new(tok.begin().clone(), tok.end().clone());
                    parts.push(Expr::new(ExprKind::StringLiteral { text: tok.text.to_string() }, span, vec![tok]));
                }
                if parts.len() == 1 {
                    Ok(parts.pop().unwrap())
                } else {
                    let span = Span::new(parts[0].span.begin.clone(), parts.last().unwrap().span.end.clone());
                    Ok(Expr::new(ExprKind::StringConcat { parts }, span, vec![]))
                }
            }
            TokenKind::Identifier => {
                let tok = self.bump();
                let span = Span::new(tok.begin().clone(), tok.end().clone());
                Ok(Expr::new(ExprKind::Identifier { name: tok.text.to_string() }, span, vec![tok]))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                let close = self.expect(TokenKind::RParen, "')'")?;
                let span = Span::new(begin.begin().clone(), close.end().clone());
                Ok(Expr::new(ExprKind::Paren { inner: Box::new(inner) }, span, vec![begin, close]))
            }
            _ => Err(ParseError::Expected {
                position: begin.begin().clone(),
                expected: "expression".to_string(),
                found: format!("{:?} {:?}", begin.kind, begin.text),
            }),
        }
    }
}

#[derive(Default)]
struct BasicFlags {
    void: bool,
    char_: bool,
    short: bool,
    int: bool,
    long: u8,
    float: bool,
    double: bool,
    signed: bool,
    unsigned: bool,
    bool_: bool,
    int128: bool,
}

impl BasicFlags {
    fn any(&self) -> bool {
        self.void
            || self.char_
            || self.short
            || self.int
            || self.long > 0
            || self.float
            || self.double
            || self.signed
            || self.unsigned
            || self.bool_
            || self.int128
    }

    /// Folds the accumulated basic-type keywords into one [`BasicTypeKind`],
    /// keeping signedness alongside size (`unsigned long` resolves to
    /// `UnsignedLong`, not plain `Long`); a bare `signed`/`unsigned` with no
    /// accompanying size keyword is the only case that needs its own
    /// sizeless variant.
    fn resolve(&self) -> BasicTypeKind {
        if self.void {
            return BasicTypeKind::Void;
        }
        if self.bool_ {
            return BasicTypeKind::Bool;
        }
        if self.double {
            return BasicTypeKind::Double;
        }
        if self.float {
            return BasicTypeKind::Float;
        }
        if self.char_ {
            return if self.unsigned {
                BasicTypeKind::UnsignedChar
            } else if self.signed {
                BasicTypeKind::SignedChar
            } else {
                BasicTypeKind::Char
            };
        }
        if self.short {
            return if self.unsigned { BasicTypeKind::UnsignedShort } else { BasicTypeKind::Short };
        }
        if self.long >= 2 || self.int128 {
            return if self.unsigned { BasicTypeKind::UnsignedLongLong } else { BasicTypeKind::LongLong };
        }
        if self.long == 1 {
            return if self.unsigned { BasicTypeKind::UnsignedLong } else { BasicTypeKind::Long };
        }
        if self.int || self.signed || self.unsigned {
            return if self.unsigned { BasicTypeKind::UnsignedInt } else { BasicTypeKind::Int };
        }
        BasicTypeKind::Int
    }
}

#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;
