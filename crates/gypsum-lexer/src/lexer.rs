use muncher::Muncher;
use phf::{self, phf_map};

use crate::token::{LexerError, LexerErrorKind, Token, TokenKind};

static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "True" => TokenKind::True,
    "False" => TokenKind::False,
    "None" => TokenKind::None,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
    "not" => TokenKind::Not,
    "in" => TokenKind::In,
};

/// Prefixes that may precede a string literal. Only `r` changes how the body is read.
static STRING_PREFIXES: phf::Map<&'static str, bool> = phf_map! {
    "r" => true,
    "R" => true,
    "u" => false,
    "U" => false,
    "b" => false,
    "B" => false,
    "ur" => true,
    "br" => true,
    "rb" => true,
};

/// Look at the next character without consuming it.
#[inline]
fn peek_char(m: &Muncher) -> Option<char> {
    m.reset_peek();
    let ret = m.peek().copied();
    m.reset_peek();
    ret
}

/// Look at the next two characters without consuming them.
#[inline]
fn peek_two(m: &Muncher) -> (Option<char>, Option<char>) {
    m.reset_peek();
    let first = m.peek().copied();
    let second = m.peek().copied();
    m.reset_peek();
    (first, second)
}

fn is_identifier_first_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn is_space_or_tab(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\x0c')
}

#[inline]
fn scan_comment(m: &mut Muncher) {
    m.eat_until_count(|c| *c == '\n');
}

/// Scan a string body. The opening quote has already been eaten. Escapes are left in place for
/// the syntax layer to decode; here they only keep an escaped quote from closing the literal.
#[inline]
fn scan_string(m: &mut Muncher, quote_char: char) -> TokenKind {
    let unterminated = TokenKind::Error(LexerError {
        kind: LexerErrorKind::UnterminatedString,
    });

    let triple = peek_two(m) == (Some(quote_char), Some(quote_char));
    if triple {
        m.eat();
        m.eat();
    }

    while let Some(c) = m.eat() {
        match c {
            '\\' => {
                if m.eat().is_none() {
                    return unterminated;
                }
            }
            '\n' if !triple => return unterminated,
            c if c == quote_char => {
                if !triple {
                    return TokenKind::String;
                }
                if peek_two(m) == (Some(quote_char), Some(quote_char)) {
                    m.eat();
                    m.eat();
                    return TokenKind::String;
                }
            }
            _ => {}
        }
    }

    unterminated
}

#[inline]
fn scan_number(m: &mut Muncher) -> TokenKind {
    m.eat_until_count(|c| !c.is_ascii_digit());
    TokenKind::Integer
}

/// Scans identifiers, keywords, and prefixed string literals like `r'\d+'`.
#[inline]
fn scan_word(first_char: char, m: &mut Muncher) -> TokenKind {
    let mut word = String::from(first_char);
    while let Some(c) = peek_char(m) {
        if !is_identifier_char(c) {
            break;
        }
        word.push(c);
        m.eat();
    }

    if let Some(quote @ ('\'' | '"')) = peek_char(m) {
        if STRING_PREFIXES.contains_key(word.as_str()) {
            m.eat();
            return scan_string(m, quote);
        }
    }

    KEYWORDS
        .get(word.as_str())
        .copied()
        .unwrap_or(TokenKind::Identifier)
}

pub struct GypLexer<'input> {
    input: &'input str,
    muncher: Muncher<'input>,
    /// Byte offset of the start of the current token
    offset: usize,
    pub(crate) token: Token,
    skip_trivia: bool,
}

impl<'input> GypLexer<'input> {
    pub fn new(input: &'input str, skip_trivia: bool) -> GypLexer<'input> {
        let mut ret = GypLexer {
            input,
            muncher: Muncher::new(input),
            offset: 0,
            skip_trivia,
            token: Token {
                kind: TokenKind::EndOfInput,
                len: 0,
            },
        };
        ret.advance();
        ret
    }

    /// (line, column) of the lexer cursor.
    pub fn pos(&self) -> (usize, usize) {
        self.muncher.cursor_position()
    }

    pub fn token(&self) -> Token {
        self.token.clone()
    }

    /// Text of the current token.
    pub fn text(&self) -> &'input str {
        let start = self.offset - self.token.len;
        &self.input[start..self.offset]
    }

    pub fn advance(&mut self) {
        loop {
            self.advance_internal();
            if !(self.skip_trivia && self.token.is_trivia()) {
                break;
            }
        }
    }

    fn advance_internal(&mut self) {
        let start = self.muncher.position();
        let kind = match self.muncher.eat() {
            None => TokenKind::EndOfInput,
            Some(c) => self.scan(c),
        };
        let len = self.muncher.position() - start;
        self.offset += len;
        self.token = Token { kind, len };
    }

    fn scan(&mut self, c: char) -> TokenKind {
        let m = &mut self.muncher;
        match c {
            c if is_space_or_tab(c) => {
                m.eat_until_count(|c| !is_space_or_tab(*c));
                TokenKind::Whitespace
            }
            '\\' if peek_char(m) == Some('\n') => {
                // Explicit line joining is just whitespace inside brackets
                m.eat();
                TokenKind::Whitespace
            }
            '\n' => TokenKind::Newline,
            '#' => {
                scan_comment(m);
                TokenKind::Comment
            }
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            '[' => TokenKind::OpenBracket,
            ']' => TokenKind::CloseBracket,
            '(' => TokenKind::OpenParenthesis,
            ')' => TokenKind::CloseParenthesis,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '\'' | '"' => scan_string(m, c),
            '-' if matches!(peek_char(m), Some(d) if d.is_ascii_digit()) => scan_number(m),
            c if c.is_ascii_digit() => scan_number(m),
            c if is_identifier_first_char(c) => scan_word(c, m),
            '=' | '!' | '<' | '>' => {
                let followed_by_equals = peek_char(m) == Some('=');
                if followed_by_equals {
                    m.eat();
                }
                match (c, followed_by_equals) {
                    ('=', true) => TokenKind::EqualsEquals,
                    ('!', true) => TokenKind::NotEquals,
                    ('<', true) => TokenKind::LessEquals,
                    ('<', false) => TokenKind::Less,
                    ('>', true) => TokenKind::GreaterEquals,
                    ('>', false) => TokenKind::Greater,
                    _ => TokenKind::Error(LexerError {
                        kind: LexerErrorKind::UnexpectedCharacter(c),
                    }),
                }
            }
            c => TokenKind::Error(LexerError {
                kind: LexerErrorKind::UnexpectedCharacter(c),
            }),
        }
    }
}

pub fn tokenize(data: &str) -> Vec<Token> {
    let mut lexer = GypLexer::new(data, false);

    let mut ret = vec![];

    while lexer.token().kind != TokenKind::EndOfInput {
        ret.push(lexer.token());
        lexer.advance();
    }

    ret
}

/// Like [tokenize], but pairs each token with the slice of `data` it covers.
pub fn tokenize_with_text(data: &str) -> Vec<(TokenKind, &str)> {
    let mut lexer = GypLexer::new(data, false);

    let mut ret = vec![];

    while lexer.token().kind != TokenKind::EndOfInput {
        ret.push((lexer.token().kind, lexer.text()));
        lexer.advance();
    }

    ret
}
