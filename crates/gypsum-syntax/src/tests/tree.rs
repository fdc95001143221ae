use crate::parser::{debug_tree, parse};
use crate::syntax::ast::nodes::ValueExpr;
use crate::syntax::ast::AstToken;
use crate::ParseErrorKind;
use pretty_assertions::assert_eq;

#[test]
fn tree_is_lossless() {
    let input = "# top\n{\n  'a': [1, 'x' 'y'],  # trailing\n  'b': {},\n}\n";
    let parse = parse(input);
    assert!(parse.errors().is_empty(), "{:?}", parse.errors());
    assert_eq!(parse.syntax_node().to_string(), input);
}

#[test]
fn typed_accessors() {
    let parse = parse("{'sources': ['a.c', 'b' 'c.c'], 'n': 3}");
    let root = parse.root().unwrap();
    let Some(ValueExpr::Dict(dict)) = root.value() else {
        panic!("expected a dict");
    };

    let entries: Vec<_> = dict.entries().collect();
    assert_eq!(entries.len(), 2);

    let Some(ValueExpr::List(list)) = entries[0].value() else {
        panic!("expected a list");
    };
    let items: Vec<_> = list.items().collect();
    assert_eq!(items.len(), 2);

    let ValueExpr::Literal(concatenated) = &items[1] else {
        panic!("expected a literal");
    };
    let parts: Vec<String> = concatenated
        .strings()
        .map(|s| s.text().to_string())
        .collect();
    assert_eq!(parts, vec!["'b'", "'c.c'"]);

    let Some(ValueExpr::Literal(n)) = entries[1].value() else {
        panic!("expected a literal");
    };
    assert_eq!(n.integer().and_then(|i| i.value()), Some(3));
}

#[test]
fn debug_tree_shape() {
    let parse = parse("['a']");
    assert_eq!(
        debug_tree(&parse.syntax_node()),
        "RootNode\n  ListNode\n    OpenBracket \"[\"\n    LiteralNode\n      String \"'a'\"\n    CloseBracket \"]\"\n"
    );
}

#[test]
fn errors_are_collected_not_panicked() {
    let parsed = parse("{'a' 'b'}");
    assert_eq!(parsed.errors().len(), 1);
    assert_eq!(
        parsed.errors()[0].kind,
        ParseErrorKind::UnexpectedToken {
            expected: "':'",
            found: "}".into()
        }
    );
    // Everything is still in the tree
    assert_eq!(parsed.syntax_node().to_string(), "{'a' 'b'}");

    let parsed = parse("{'a': 1} {}");
    assert_eq!(parsed.errors()[0].kind, ParseErrorKind::TrailingContent);
    assert_eq!(parsed.syntax_node().to_string(), "{'a': 1} {}");
}
