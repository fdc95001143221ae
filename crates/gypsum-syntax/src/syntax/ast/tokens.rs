use crate::ast_token;
use crate::syntax::ast::{AstToken, SyntaxKind, SyntaxToken};

ast_token!(StringLit, String);
ast_token!(IntegerLit, Integer);
ast_token!(Comment, Comment);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeError(pub String);

impl StringLit {
    /// The text between the quotes, escapes untouched.
    pub fn body(&self) -> &str {
        split_literal(self.text()).1
    }

    /// The decoded string value.
    pub fn value(&self) -> Result<String, EscapeError> {
        decode_string_literal(self.text())
    }
}

/// Split a string literal into its prefix and its body.
fn split_literal(text: &str) -> (&str, &str) {
    let prefix_len = text.find(['\'', '"']).unwrap_or(0);
    let (prefix, quoted) = text.split_at(prefix_len);
    let quote_len =
        if quoted.len() >= 6 && (quoted.starts_with("'''") || quoted.starts_with("\"\"\"")) {
            3
        } else {
            1
        };
    if quoted.len() < quote_len * 2 {
        return (prefix, "");
    }
    (prefix, &quoted[quote_len..quoted.len() - quote_len])
}

/// Decode the full text of a string literal (prefix and quotes included).
pub fn decode_string_literal(text: &str) -> Result<String, EscapeError> {
    let (prefix, body) = split_literal(text);
    if prefix.contains(['r', 'R']) {
        return Ok(body.to_string());
    }
    unescape(body)
}

impl IntegerLit {
    pub fn value(&self) -> Option<i64> {
        self.text().parse().ok()
    }
}

/// Keyword literals: `True`, `False` and `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Keyword {
    True(SyntaxToken),
    False(SyntaxToken),
    None(SyntaxToken),
}

impl AstToken for Keyword {
    fn can_cast(token: SyntaxKind) -> bool
    where
        Self: Sized,
    {
        matches!(token, SyntaxKind::True | SyntaxKind::False | SyntaxKind::None)
    }

    fn cast(syntax: SyntaxToken) -> Option<Self>
    where
        Self: Sized,
    {
        let ret = match syntax.kind() {
            SyntaxKind::True => Keyword::True(syntax),
            SyntaxKind::False => Keyword::False(syntax),
            SyntaxKind::None => Keyword::None(syntax),
            _ => return None,
        };
        Some(ret)
    }

    fn syntax(&self) -> &SyntaxToken {
        match self {
            Keyword::True(t) | Keyword::False(t) | Keyword::None(t) => t,
        }
    }
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars>, digits: usize) -> Option<char> {
    let mut code = 0u32;
    for _ in 0..digits {
        code = code * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(code)
}

/// Decode the escape sequences Python recognises in a non-raw string literal. Unknown escapes
/// are kept verbatim, backslash included.
pub fn unescape(body: &str) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(escaped) = chars.next() else {
            return Err(EscapeError("\\".into()));
        };
        match escaped {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = escaped.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or_else(|| EscapeError(format!("\\{code:o}")))?);
            }
            'x' | 'u' | 'U' => {
                let digits = match escaped {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let decoded = take_hex(&mut chars, digits)
                    .ok_or_else(|| EscapeError(format!("\\{escaped}")))?;
                out.push(decoded);
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{decode_string_literal, unescape};
    use pretty_assertions::assert_eq;

    #[test]
    fn python_escapes() {
        assert_eq!(unescape(r"a\tb\nc").unwrap(), "a\tb\nc");
        assert_eq!(unescape(r#"it\'s \"q\""#).unwrap(), "it's \"q\"");
        assert_eq!(unescape(r"\x41é\101").unwrap(), "AéA");
        assert_eq!(unescape(r"keep \d and \.").unwrap(), r"keep \d and \.");
        assert_eq!(unescape("joined \\\nline").unwrap(), "joined line");
        assert!(unescape(r"\xZZ").is_err());
    }

    #[test]
    fn whole_literals() {
        assert_eq!(decode_string_literal(r"'a\n'").unwrap(), "a\n");
        assert_eq!(decode_string_literal(r"r'a\n'").unwrap(), r"a\n");
        assert_eq!(decode_string_literal("\"\"\"x\ny\"\"\"").unwrap(), "x\ny");
        assert_eq!(decode_string_literal("''").unwrap(), "");
    }
}
