mod conditions;
mod documents;

use crate::token::TokenKind;
use crate::tokenize_with_text;

/// Tokenize `input`, dropping whitespace and newlines so tests can focus on the meaningful
/// tokens.
pub(crate) fn significant(input: &str) -> Vec<(TokenKind, &str)> {
    tokenize_with_text(input)
        .into_iter()
        .filter(|(kind, _)| !matches!(kind, TokenKind::Whitespace | TokenKind::Newline))
        .collect()
}

#[macro_export]
macro_rules! assert_tokenizes_as {
    ($input:expr, $($kind:ident $text:expr),* $(,)?) => {
        pretty_assertions::assert_eq!(
            $crate::tests::significant($input),
            vec![$(($crate::token::TokenKind::$kind, $text)),*]
        );
    };
}
