//! Syntax for gyp build files: a lossless [rowan] tree of the Python-literal grammar, typed AST
//! wrappers over it, and lowering into the [Value] tree the rest of the pipeline consumes.

use gypsum_lexer::token::LexerErrorKind;
use thiserror::Error;

pub mod lower;
pub mod parser;
pub mod syntax;
pub mod value;

#[cfg(test)]
mod tests;

pub use lower::parse_document;
pub use parser::parse;
pub use value::{Mapping, Value};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{line}:{column}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("{0}")]
    Lexer(LexerErrorKind),
    #[error("expected {expected}, found {found:?}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },
    #[error("unexpected end of input, expected {0}")]
    UnexpectedEnd(&'static str),
    #[error("unexpected content after the document")]
    TrailingContent,
    #[error("key {key:?} repeated at {path}")]
    DuplicateKey { key: String, path: String },
    #[error("dict keys must be strings, found {0}")]
    NonStringKey(String),
    #[error("invalid escape sequence {0:?}")]
    InvalidEscape(String),
    #[error("integer literal {0} is out of range")]
    IntegerOutOfRange(String),
    #[error("None is not a valid value")]
    NoneValue,
}

pub type ParserResult<T> = Result<T, ParseError>;
