//! Lowering of the syntax tree into [Value]s.

use crate::parser::parse;
use crate::syntax::ast::nodes::{Literal, ValueExpr};
use crate::syntax::ast::tokens::Keyword;
use crate::syntax::ast::{AstNode, AstToken};
use crate::value::{Mapping, Value};
use crate::{ParseError, ParseErrorKind};

/// Maps byte offsets to 1-based (line, column) pairs.
pub struct LineIndex<'a> {
    text: &'a str,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let before = &self.text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        (line, column)
    }

    fn error(&self, offset: usize, kind: ParseErrorKind) -> ParseError {
        let (line, column) = self.line_col(offset);
        ParseError { line, column, kind }
    }
}

fn render_path(path: &[String]) -> String {
    if path.is_empty() {
        "top level".to_string()
    } else {
        path.join("/")
    }
}

struct Lowering<'a> {
    index: LineIndex<'a>,
    path: Vec<String>,
}

impl Lowering<'_> {
    fn offset_of(expr: &impl AstNode) -> usize {
        usize::from(expr.syntax().text_range().start())
    }

    fn lower(&mut self, expr: &ValueExpr) -> Result<Value, ParseError> {
        match expr {
            ValueExpr::Literal(literal) => self.lower_literal(literal),
            ValueExpr::List(list) => {
                let mut items = Vec::new();
                for (i, item) in list.items().enumerate() {
                    self.path.push(i.to_string());
                    let lowered = self.lower(&item);
                    self.path.pop();
                    items.push(lowered?);
                }
                Ok(Value::List(items))
            }
            ValueExpr::Dict(dict) => {
                let mut map = Mapping::new();
                for entry in dict.entries() {
                    let offset = Self::offset_of(&entry);
                    let (Some(key), Some(value)) = (entry.key(), entry.value()) else {
                        return Err(self
                            .index
                            .error(offset, ParseErrorKind::UnexpectedEnd("a dict entry")));
                    };

                    let key = match self.lower(&key)? {
                        Value::String(s) => s,
                        other => {
                            return Err(self.index.error(
                                offset,
                                ParseErrorKind::NonStringKey(other.to_string()),
                            ))
                        }
                    };

                    if map.contains_key(&key) {
                        return Err(self.index.error(
                            offset,
                            ParseErrorKind::DuplicateKey {
                                key,
                                path: render_path(&self.path),
                            },
                        ));
                    }

                    self.path.push(key.clone());
                    let lowered = self.lower(&value);
                    self.path.pop();
                    map.insert(key, lowered?);
                }
                Ok(Value::Mapping(map))
            }
        }
    }

    fn lower_literal(&self, literal: &Literal) -> Result<Value, ParseError> {
        let offset = Self::offset_of(literal);

        if let Some(integer) = literal.integer() {
            return integer.value().map(Value::Integer).ok_or_else(|| {
                self.index.error(
                    offset,
                    ParseErrorKind::IntegerOutOfRange(integer.text().to_string()),
                )
            });
        }

        if let Some(keyword) = literal.keyword() {
            return match keyword {
                Keyword::True(_) => Ok(Value::from(true)),
                Keyword::False(_) => Ok(Value::from(false)),
                Keyword::None(_) => Err(self.index.error(offset, ParseErrorKind::NoneValue)),
            };
        }

        let mut out = String::new();
        for s in literal.strings() {
            let decoded = s
                .value()
                .map_err(|e| self.index.error(offset, ParseErrorKind::InvalidEscape(e.0)))?;
            out.push_str(&decoded);
        }
        Ok(Value::String(out))
    }
}

/// Parse a build file's text into its [Value] tree.
pub fn parse_document(text: &str) -> Result<Value, ParseError> {
    let parse = parse(text);
    let index = LineIndex::new(text);

    if let Some(error) = parse.errors().first() {
        return Err(index.error(error.offset, error.kind.clone()));
    }

    let Some(value) = parse.root().and_then(|root| root.value()) else {
        return Err(index.error(0, ParseErrorKind::UnexpectedEnd("a value")));
    };

    Lowering {
        index,
        path: Vec::new(),
    }
    .lower(&value)
}
