use thiserror::Error;

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte length of token
    pub len: usize,
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        self.kind.is_trivia()
    }

    pub fn is_end_of_input(&self) -> bool {
        self.kind.is_end_of_input()
    }

    pub fn get_fixed_str(&self) -> Option<&'static str> {
        self.kind.get_fixed_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Error(LexerError),

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
    Whitespace,
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[error("{kind}")]
pub struct LexerError {
    pub kind: LexerErrorKind,
}

#[derive(Error, Debug, Eq, PartialEq, Copy, Clone, Hash)]
pub enum LexerErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),
}

impl TokenKind {
    /// Whitespace, newlines and comments carry no meaning to the parser.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment
        )
    }

    pub fn is_end_of_input(&self) -> bool {
        matches!(self, TokenKind::EndOfInput)
    }

    pub fn get_fixed_str(&self) -> Option<&'static str> {
        let ret = match self {
            TokenKind::And => "and",
            TokenKind::CloseBrace => "}",
            TokenKind::CloseBracket => "]",
            TokenKind::CloseParenthesis => ")",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::EqualsEquals => "==",
            TokenKind::False => "False",
            TokenKind::Greater => ">",
            TokenKind::GreaterEquals => ">=",
            TokenKind::In => "in",
            TokenKind::Less => "<",
            TokenKind::LessEquals => "<=",
            TokenKind::Newline => "\n",
            TokenKind::None => "None",
            TokenKind::Not => "not",
            TokenKind::NotEquals => "!=",
            TokenKind::OpenBrace => "{",
            TokenKind::OpenBracket => "[",
            TokenKind::OpenParenthesis => "(",
            TokenKind::Or => "or",
            TokenKind::True => "True",
            _ => return None,
        };

        Some(ret)
    }
}

pub fn make_fixed_str_token(kind: TokenKind) -> Token {
    Token {
        kind,
        len: kind.get_fixed_str().map_or(0, str::len),
    }
}

#[macro_export]
macro_rules! T {
    ['{'] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::OpenBrace) };
    ['}'] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::CloseBrace) };
    ['['] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::OpenBracket) };
    [']'] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::CloseBracket) };
    ['('] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::OpenParenthesis) };
    [')'] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::CloseParenthesis) };
    [:] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::Colon) };
    [,] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::Comma) };
    [==] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::EqualsEquals) };
    [!=] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::NotEquals) };
    [<] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::Less) };
    [<=] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::LessEquals) };
    [>] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::Greater) };
    [>=] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::GreaterEquals) };
    [and] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::And) };
    [or] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::Or) };
    [not] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::Not) };
    [in] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::In) };
    [True] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::True) };
    [False] => { $crate::token::make_fixed_str_token($crate::token::TokenKind::False) };
}

pub use crate::T;
