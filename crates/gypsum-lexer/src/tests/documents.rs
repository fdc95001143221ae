use crate::assert_tokenizes_as;
use crate::token::{LexerError, LexerErrorKind, TokenKind, T};
use crate::{tokenize, tokenize_with_text};
use pretty_assertions::assert_eq;

#[test]
fn small_document() {
    assert_tokenizes_as!(
        "{'targets': [{'target_name': 'foo', 'type': 'none',},],}",
        OpenBrace "{",
        String "'targets'",
        Colon ":",
        OpenBracket "[",
        OpenBrace "{",
        String "'target_name'",
        Colon ":",
        String "'foo'",
        Comma ",",
        String "'type'",
        Colon ":",
        String "'none'",
        Comma ",",
        CloseBrace "}",
        Comma ",",
        CloseBracket "]",
        Comma ",",
        CloseBrace "}",
    );
}

#[test]
fn comments_run_to_end_of_line() {
    assert_tokenizes_as!(
        "# leading\n{ # trailing 'not a string'\n}",
        Comment "# leading",
        OpenBrace "{",
        Comment "# trailing 'not a string'",
        CloseBrace "}",
    );
}

#[test]
fn quoted_strings() {
    assert_tokenizes_as!(
        r#"'it\'s' "say \"hi\"" '' """a 'b' "c"
d""" r'\d+' u"x""#,
        String r"'it\'s'",
        String r#""say \"hi\"""#,
        String "''",
        String "\"\"\"a 'b' \"c\"\nd\"\"\"",
        String r"r'\d+'",
        String "u\"x\"",
    );
}

#[test]
fn numbers_and_keywords() {
    assert_tokenizes_as!(
        "[1, -20, True, False, None]",
        OpenBracket "[",
        Integer "1",
        Comma ",",
        Integer "-20",
        Comma ",",
        True "True",
        Comma ",",
        False "False",
        Comma ",",
        None "None",
        CloseBracket "]",
    );
}

#[test]
fn token_lengths_are_bytes() {
    let tokens = tokenize("'héllo' # ünïcode");
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].len, "'héllo'".len());
    assert_eq!(tokens[2].len, "# ünïcode".len());

    let total: usize = tokens.iter().map(|t| t.len).sum();
    assert_eq!(total, "'héllo' # ünïcode".len());
}

#[test]
fn fixed_tokens() {
    assert_eq!(T!['{'].len, 1);
    assert_eq!(T![>=].kind, TokenKind::GreaterEquals);
    assert_eq!(T![True].len, 4);
}

#[test]
fn unterminated_string() {
    let tokens = tokenize_with_text("{'abc\n}");
    assert_eq!(
        tokens[1],
        (
            TokenKind::Error(LexerError {
                kind: LexerErrorKind::UnterminatedString
            }),
            "'abc\n"
        )
    );

    let tokens = tokenize("'''never closed''");
    assert!(matches!(tokens[0].kind, TokenKind::Error(_)));
}

#[test]
fn unexpected_character() {
    let tokens = tokenize_with_text("{@}");
    assert_eq!(
        tokens[1],
        (
            TokenKind::Error(LexerError {
                kind: LexerErrorKind::UnexpectedCharacter('@')
            }),
            "@"
        )
    );
}
