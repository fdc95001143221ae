use gypsum_lexer::token::TokenKind;

pub fn syntax_kind_for_token_kind(token_kind: TokenKind) -> SyntaxKind {
    match token_kind {
        TokenKind::Error(_) => SyntaxKind::Error,
        TokenKind::And => SyntaxKind::And,
        TokenKind::CloseBrace => SyntaxKind::CloseBrace,
        TokenKind::CloseBracket => SyntaxKind::CloseBracket,
        TokenKind::CloseParenthesis => SyntaxKind::CloseParenthesis,
        TokenKind::Colon => SyntaxKind::Colon,
        TokenKind::Comma => SyntaxKind::Comma,
        TokenKind::Comment => SyntaxKind::Comment,
        TokenKind::EndOfInput => SyntaxKind::EndOfInput,
        TokenKind::EqualsEquals => SyntaxKind::EqualsEquals,
        TokenKind::False => SyntaxKind::False,
        TokenKind::Greater => SyntaxKind::Greater,
        TokenKind::GreaterEquals => SyntaxKind::GreaterEquals,
        TokenKind::Identifier => SyntaxKind::Identifier,
        TokenKind::In => SyntaxKind::In,
        TokenKind::Integer => SyntaxKind::Integer,
        TokenKind::Less => SyntaxKind::Less,
        TokenKind::LessEquals => SyntaxKind::LessEquals,
        TokenKind::Newline => SyntaxKind::Newline,
        TokenKind::None => SyntaxKind::None,
        TokenKind::Not => SyntaxKind::Not,
        TokenKind::NotEquals => SyntaxKind::NotEquals,
        TokenKind::OpenBrace => SyntaxKind::OpenBrace,
        TokenKind::OpenBracket => SyntaxKind::OpenBracket,
        TokenKind::OpenParenthesis => SyntaxKind::OpenParenthesis,
        TokenKind::Or => SyntaxKind::Or,
        TokenKind::String => SyntaxKind::String,
        TokenKind::True => SyntaxKind::True,
        TokenKind::Whitespace => SyntaxKind::Whitespace,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum SyntaxKind {
    Error = 0,

    // Tokens
    And,
    CloseBrace,
    CloseBracket,
    CloseParenthesis,
    Colon,
    Comma,
    Comment,
    EndOfInput,
    EqualsEquals,
    False,
    Greater,
    GreaterEquals,
    Identifier,
    In,
    Integer,
    Less,
    LessEquals,
    Newline,
    None,
    Not,
    NotEquals,
    OpenBrace,
    OpenBracket,
    OpenParenthesis,
    Or,
    String,
    True,
    Whitespace, // << last token

    // Compound nodes
    DictNode,
    EntryNode,
    ListNode,
    LiteralNode,
    ErrorNode,

    // Must be the last entry in the enum
    RootNode,
}

impl SyntaxKind {
    const ALL: &'static [SyntaxKind] = &[
        SyntaxKind::Error,
        SyntaxKind::And,
        SyntaxKind::CloseBrace,
        SyntaxKind::CloseBracket,
        SyntaxKind::CloseParenthesis,
        SyntaxKind::Colon,
        SyntaxKind::Comma,
        SyntaxKind::Comment,
        SyntaxKind::EndOfInput,
        SyntaxKind::EqualsEquals,
        SyntaxKind::False,
        SyntaxKind::Greater,
        SyntaxKind::GreaterEquals,
        SyntaxKind::Identifier,
        SyntaxKind::In,
        SyntaxKind::Integer,
        SyntaxKind::Less,
        SyntaxKind::LessEquals,
        SyntaxKind::Newline,
        SyntaxKind::None,
        SyntaxKind::Not,
        SyntaxKind::NotEquals,
        SyntaxKind::OpenBrace,
        SyntaxKind::OpenBracket,
        SyntaxKind::OpenParenthesis,
        SyntaxKind::Or,
        SyntaxKind::String,
        SyntaxKind::True,
        SyntaxKind::Whitespace,
        SyntaxKind::DictNode,
        SyntaxKind::EntryNode,
        SyntaxKind::ListNode,
        SyntaxKind::LiteralNode,
        SyntaxKind::ErrorNode,
        SyntaxKind::RootNode,
    ];

    pub fn from_raw(raw: u16) -> SyntaxKind {
        Self::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(SyntaxKind::Error)
    }

    pub fn is_token(&self) -> bool {
        (*self as u16) <= (SyntaxKind::Whitespace as u16)
    }

    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            SyntaxKind::Whitespace | SyntaxKind::Newline | SyntaxKind::Comment
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            SyntaxKind::String
                | SyntaxKind::Integer
                | SyntaxKind::True
                | SyntaxKind::False
                | SyntaxKind::None
        )
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::SyntaxKind;

    #[test]
    fn raw_round_trip_covers_every_kind() {
        for (i, kind) in SyntaxKind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, i);
            assert_eq!(SyntaxKind::from_raw(i as u16), *kind);
        }
        assert_eq!(
            SyntaxKind::ALL.last().copied(),
            Some(SyntaxKind::RootNode)
        );
    }
}
