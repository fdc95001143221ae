use crate::{parse_document, value, ParseError, ParseErrorKind, Value};
use gypsum_lexer::token::LexerErrorKind;
use pretty_assertions::assert_eq;

#[test]
fn build_file() {
    let v = parse_document(
        r#"
# A comment
{
  'variables': {
    'use_thing%': 1,
  },
  'targets': [
    {
      'target_name': 'foo',
      'type': 'executable',
      'sources': [
        'main.cc',  # inline comment
        "util" ".cc",
      ],
      'conditions': [
        ['OS=="linux"', {'defines': ['LINUX']}],
      ],
    },
  ],
}
"#,
    )
    .unwrap();

    assert_eq!(
        v,
        value!({
            "variables": {"use_thing%": 1},
            "targets": [{
                "target_name": "foo",
                "type": "executable",
                "sources": ["main.cc", "util.cc"],
                "conditions": [["OS==\"linux\"", {"defines": ["LINUX"]}]]
            }]
        })
    );
}

#[test]
fn keywords_and_escapes() {
    let v = parse_document(r#"{'t': True, 'f': False, 's': 'a\tb', 'r': r'\d+\.h', 'n': -3}"#)
        .unwrap();
    assert_eq!(
        v,
        value!({"t": 1, "f": 0, "s": "a\tb", "r": "\\d+\\.h", "n": (-3)})
    );
}

#[test]
fn duplicate_keys_are_rejected() {
    let err = parse_document("{\n  'targets': [{'a': 1,\n  'a': 2}],\n}").unwrap_err();
    assert_eq!(
        err,
        ParseError {
            line: 3,
            column: 3,
            kind: ParseErrorKind::DuplicateKey {
                key: "a".into(),
                path: "targets/0".into()
            }
        }
    );
    assert_eq!(
        err.to_string(),
        "3:3: key \"a\" repeated at targets/0"
    );
}

#[test]
fn error_positions() {
    let err = parse_document("{\n  'a': [1, 2\n}").unwrap_err();
    assert_eq!((err.line, err.column), (3, 1));
    assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }));

    let err = parse_document("{'a': 'unterminated\n}").unwrap_err();
    assert_eq!(
        err.kind,
        ParseErrorKind::Lexer(LexerErrorKind::UnterminatedString)
    );
    assert_eq!((err.line, err.column), (1, 7));

    let err = parse_document("   ").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedEnd("a value"));
}

#[test]
fn rejected_values() {
    assert_eq!(
        parse_document("{'a': None}").unwrap_err().kind,
        ParseErrorKind::NoneValue
    );
    assert_eq!(
        parse_document("{1: 'a'}").unwrap_err().kind,
        ParseErrorKind::NonStringKey("1".into())
    );
    assert!(matches!(
        parse_document("[99999999999999999999]").unwrap_err().kind,
        ParseErrorKind::IntegerOutOfRange(_)
    ));
}

#[test]
fn display_uses_literal_syntax() {
    let v: Value = value!({"a": ["it's", 2]});
    assert_eq!(v.to_string(), r"{'a': ['it\'s', 2]}");
    assert_eq!(v.type_name(), "dict");
    assert!(v.is_mapping());
}

#[test]
fn non_ascii_text() {
    let v = parse_document("{\n# ünïcode comment\n'a': 'héllo', 'b': 'x', 'ç': ['日本'],\n}")
        .unwrap();
    assert_eq!(v, value!({"a": "héllo", "b": "x", "ç": ["日本"]}));
}
