//! POSIX shell quoting and word splitting.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static NEEDS_QUOTING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\t\n #$%&'()*;<=>?\[{|}~]|^$"#).unwrap());
static NEEDS_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(["\\`])"#).unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellSplitError {
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),
    #[error("trailing backslash")]
    TrailingBackslash,
}

/// Quote `arg` for a POSIX shell. `$` is deliberately left live inside the quotes so that
/// build-tool variables (`$(builddir)`, `$out`) still expand.
pub fn encode_posix_arg(arg: &str) -> String {
    let escaped = NEEDS_ESCAPE.replace_all(arg, r"\$1");
    if NEEDS_QUOTING.is_match(arg) {
        format!("\"{escaped}\"")
    } else {
        escaped.into_owned()
    }
}

pub fn encode_posix_list<S: AsRef<str>>(args: impl IntoIterator<Item = S>) -> String {
    args.into_iter()
        .map(|a| encode_posix_arg(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split `input` into words the way `sh` would, without performing any expansion.
pub fn split_words(input: &str) -> Result<Vec<String>, ShellSplitError> {
    let mut words = Vec::new();
    let mut current: Option<String> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if let Some(word) = current.take() {
                    words.push(word);
                }
            }
            '\'' => {
                let word = current.get_or_insert_with(String::new);
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err(ShellSplitError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                let word = current.get_or_insert_with(String::new);
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => word.push(c),
                            Some('\n') => {}
                            Some(c) => {
                                word.push('\\');
                                word.push(c);
                            }
                            None => return Err(ShellSplitError::UnterminatedQuote('"')),
                        },
                        Some(c) => word.push(c),
                        None => return Err(ShellSplitError::UnterminatedQuote('"')),
                    }
                }
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(c) => current.get_or_insert_with(String::new).push(c),
                None => return Err(ShellSplitError::TrailingBackslash),
            },
            c => current.get_or_insert_with(String::new).push(c),
        }
    }

    if let Some(word) = current {
        words.push(word);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn quoting() {
        assert_eq!(encode_posix_arg("plain-arg"), "plain-arg");
        assert_eq!(encode_posix_arg("two words"), "\"two words\"");
        assert_eq!(encode_posix_arg(""), "\"\"");
        assert_eq!(encode_posix_arg("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(encode_posix_arg("$out"), "\"$out\"");
        assert_eq!(
            encode_posix_list(["python", "gen.py", "a b"]),
            "python gen.py \"a b\""
        );
    }

    #[test]
    fn splitting() {
        assert_eq!(
            split_words(r#"a=1 b='x y' c="q\"r" d\ e"#).unwrap(),
            vec!["a=1", "b=x y", "c=q\"r", "d e"]
        );
        assert_eq!(split_words("   ").unwrap(), Vec::<String>::new());
        assert_eq!(split_words("''").unwrap(), vec![String::new()]);
        assert_eq!(
            split_words("a 'b").unwrap_err(),
            ShellSplitError::UnterminatedQuote('\'')
        );
    }
}
