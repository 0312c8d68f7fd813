use crate::lexer::Lexer;
use crate::source::ChunkedSource;
use crate::token::TokenKind;

fn all_tokens(src: &str, chunk: usize) -> Vec<crate::Token> {
    let mut lexer = Lexer::create(ChunkedSource::new(src, chunk), "t.c");
    let mut out = Vec::new();
    loop {
        let tok = lexer.get_tok().expect("lex should not hard-fail");
        let is_eof = tok.kind == TokenKind::Eof;
        out.push(tok);
        if is_eof {
            break;
        }
    }
    out
}

fn round_trip(src: &str) -> String {
    all_tokens(src, usize::MAX).iter().map(|t| t.text.as_ref()).collect()
}

#[test]
fn round_trip_reproduces_source_byte_for_byte() {
    let src = "int main(void) {\n    return 0; // done\n}\n";
    assert_eq!(round_trip(src), src);
}

#[test]
fn round_trip_survives_small_buffer_refills() {
    let src = "int add(int a, int b) { return a + b; }\n";
    for chunk in [1usize, 3, 7, 17] {
        let toks: String = all_tokens(src, chunk).iter().map(|t| t.text.as_ref()).collect();
        assert_eq!(toks, src, "chunk size {chunk}");
    }
}

#[test]
fn keywords_recognized() {
    let toks = all_tokens("int x; return while", usize::MAX);
    assert_eq!(toks[0].kind, TokenKind::KwInt);
    let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
    assert!(kinds.contains(&TokenKind::KwReturn));
    assert!(kinds.contains(&TokenKind::KwWhile));
}

#[test]
fn adjacent_string_literals_lex_as_two_tokens() {
    let toks = all_tokens(r#""hi" "there""#, usize::MAX);
    let strings: Vec<_> = toks.iter().filter(|t| t.kind == TokenKind::StringLiteral).collect();
    assert_eq!(strings.len(), 2);
    assert_eq!(strings[0].text.as_ref(), "\"hi\"");
    assert_eq!(strings[1].text.as_ref(), "\"there\"");
}

#[test]
fn block_comment_round_trips_with_nested_tokens() {
    let src = "/* hello world */";
    assert_eq!(round_trip(src), src);
    let toks = all_tokens(src, usize::MAX);
    assert_eq!(toks[0].kind, TokenKind::BlockCommentOpen);
    assert_eq!(toks.last().unwrap().kind, TokenKind::Eof);
    assert!(toks.iter().any(|t| t.kind == TokenKind::BlockCommentClose));
}

#[test]
fn doc_comment_open_is_distinct_kind() {
    let toks = all_tokens("/** doc */", usize::MAX);
    assert_eq!(toks[0].kind, TokenKind::DocCommentOpen);
}

#[test]
fn preprocessor_line_is_single_token() {
    let src = "#define FOO 1\nint x;";
    let toks = all_tokens(src, usize::MAX);
    assert_eq!(toks[0].kind, TokenKind::Preprocessor);
    assert_eq!(toks[0].text.as_ref(), "#define FOO 1");
}

#[test]
fn control_characters_become_invalid_char() {
    let src = "int x\u{1}= 1;";
    let toks = all_tokens(src, usize::MAX);
    assert!(toks.iter().any(|t| t.kind == TokenKind::InvalidChar));
}

#[test]
fn numbers_cover_hex_octal_float_and_suffixes() {
    let toks = all_tokens("0x1F 010 3.14 1e10 42UL", usize::MAX);
    let ints_and_floats: Vec<_> = toks
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::IntLiteral | TokenKind::FloatLiteral))
        .collect();
    assert_eq!(ints_and_floats[0].text.as_ref(), "0x1F");
    assert_eq!(ints_and_floats[0].kind, TokenKind::IntLiteral);
    assert_eq!(ints_and_floats[1].text.as_ref(), "010");
    assert_eq!(ints_and_floats[2].kind, TokenKind::FloatLiteral);
    assert_eq!(ints_and_floats[3].text.as_ref(), "1e10");
    assert_eq!(ints_and_floats[4].text.as_ref(), "42UL");
}

#[test]
fn unterminated_string_is_reported() {
    let mut lexer = Lexer::create(ChunkedSource::whole("\"abc"), "t.c");
    assert!(lexer.get_tok().is_err());
}

#[test]
fn encoding_prefixed_literals_lex_as_one_token() {
    let toks = all_tokens(r#"L"wide" u8"utf" U'x'"#, usize::MAX);
    let lits: Vec<_> = toks
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::StringLiteral | TokenKind::CharLiteral))
        .collect();
    assert_eq!(lits[0].text.as_ref(), "L\"wide\"");
    assert_eq!(lits[1].text.as_ref(), "u8\"utf\"");
    assert_eq!(lits[2].text.as_ref(), "U'x'");
}
