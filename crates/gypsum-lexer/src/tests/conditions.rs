use crate::assert_tokenizes_as;

#[test]
fn comparison_operators() {
    assert_tokenizes_as!(
        r#"OS=="linux" and target_arch!='ia32'"#,
        Identifier "OS",
        EqualsEquals "==",
        String r#""linux""#,
        And "and",
        Identifier "target_arch",
        NotEquals "!=",
        String "'ia32'",
    );

    assert_tokenizes_as!(
        "a<1 or b<=2 or c>3 or d>=4",
        Identifier "a",
        Less "<",
        Integer "1",
        Or "or",
        Identifier "b",
        LessEquals "<=",
        Integer "2",
        Or "or",
        Identifier "c",
        Greater ">",
        Integer "3",
        Or "or",
        Identifier "d",
        GreaterEquals ">=",
        Integer "4",
    );
}

#[test]
fn membership_and_grouping() {
    assert_tokenizes_as!(
        "not (OS in ['mac', 'win']) and x not in y",
        Not "not",
        OpenParenthesis "(",
        Identifier "OS",
        In "in",
        OpenBracket "[",
        String "'mac'",
        Comma ",",
        String "'win'",
        CloseBracket "]",
        CloseParenthesis ")",
        And "and",
        Identifier "x",
        Not "not",
        In "in",
        Identifier "y",
    );
}

#[test]
fn identifiers_that_start_like_prefixes() {
    // `rule_name` starts with `r` but is not followed by a quote
    assert_tokenizes_as!(
        "rule_name==bar",
        Identifier "rule_name",
        EqualsEquals "==",
        Identifier "bar",
    );
}
