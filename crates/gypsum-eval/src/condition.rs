//! The expression language of `conditions`: a small subset of Python.

use std::cmp::Ordering;

use gypsum_lexer::lexer::GypLexer;
use gypsum_lexer::token::TokenKind;
use gypsum_syntax::syntax::ast::tokens::decode_string_literal;
use gypsum_syntax::Value;

use crate::scope::VariableScope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `a < b < c` chains, evaluated pairwise like Python does.
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
}

/// Why a condition could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    Syntax(String),
    UndefinedName(String),
    Type(String),
}

struct Parser<'a> {
    lexer: GypLexer<'a>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> TokenKind {
        self.lexer.token().kind
    }

    fn bump(&mut self) -> &'a str {
        let text = self.lexer.text();
        self.lexer.advance();
        text
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ConditionError> {
        if self.peek() == kind {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> ConditionError {
        match self.peek() {
            TokenKind::EndOfInput => {
                ConditionError::Syntax(format!("unexpected end of expression, expected {what}"))
            }
            TokenKind::Error(e) => ConditionError::Syntax(e.to_string()),
            _ => ConditionError::Syntax(format!(
                "unexpected {:?}, expected {what}",
                self.lexer.text()
            )),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == TokenKind::Or {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.parse_not()?;
        while self.peek() == TokenKind::And {
            self.bump();
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == TokenKind::Not {
            self.bump();
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn compare_op(&mut self) -> Result<Option<CompareOp>, ConditionError> {
        let op = match self.peek() {
            TokenKind::EqualsEquals => CompareOp::Eq,
            TokenKind::NotEquals => CompareOp::NotEq,
            TokenKind::Less => CompareOp::Less,
            TokenKind::LessEquals => CompareOp::LessEq,
            TokenKind::Greater => CompareOp::Greater,
            TokenKind::GreaterEquals => CompareOp::GreaterEq,
            TokenKind::In => CompareOp::In,
            TokenKind::Not => {
                // Only `not in` can follow an operand
                self.bump();
                if self.peek() != TokenKind::In {
                    return Err(self.unexpected("'in'"));
                }
                CompareOp::NotIn
            }
            _ => return Ok(None),
        };
        self.bump();
        Ok(Some(op))
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let first = self.parse_primary()?;
        let mut rest = Vec::new();
        while let Some(op) = self.compare_op()? {
            rest.push((op, self.parse_primary()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        match self.peek() {
            TokenKind::String => {
                let mut out = String::new();
                while self.peek() == TokenKind::String {
                    let text = self.bump();
                    let decoded = decode_string_literal(text)
                        .map_err(|e| ConditionError::Syntax(format!("bad escape {}", e.0)))?;
                    out.push_str(&decoded);
                }
                Ok(Expr::Literal(Value::String(out)))
            }
            TokenKind::Integer => {
                let text = self.bump();
                text.parse()
                    .map(|i| Expr::Literal(Value::Integer(i)))
                    .map_err(|_| ConditionError::Syntax(format!("bad integer {text}")))
            }
            TokenKind::True => {
                self.bump();
                Ok(Expr::Literal(Value::from(true)))
            }
            TokenKind::False => {
                self.bump();
                Ok(Expr::Literal(Value::from(false)))
            }
            TokenKind::Identifier => Ok(Expr::Name(self.bump().to_string())),
            TokenKind::OpenParenthesis => {
                self.bump();
                let inner = self.parse_or()?;
                self.expect(TokenKind::CloseParenthesis, "')'")?;
                Ok(inner)
            }
            TokenKind::OpenBracket => {
                self.bump();
                let mut items = Vec::new();
                while self.peek() != TokenKind::CloseBracket {
                    items.push(self.parse_or()?);
                    match self.peek() {
                        TokenKind::Comma => {
                            self.bump();
                        }
                        TokenKind::CloseBracket => {}
                        _ => return Err(self.unexpected("',' or ']'")),
                    }
                }
                self.bump();
                Ok(Expr::List(items))
            }
            _ => Err(self.unexpected("an operand")),
        }
    }
}

pub fn parse_condition(input: &str) -> Result<Expr, ConditionError> {
    let mut parser = Parser {
        lexer: GypLexer::new(input, true),
    };
    let expr = parser.parse_or()?;
    if parser.peek() != TokenKind::EndOfInput {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

fn type_error(op: &CompareOp, lhs: &Value, rhs: &Value) -> ConditionError {
    ConditionError::Type(format!(
        "{op:?} not supported between {} and {}",
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn compare(op: &CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, ConditionError> {
    let ordering = |lhs: &Value, rhs: &Value| -> Result<Ordering, ConditionError> {
        match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            _ => Err(type_error(op, lhs, rhs)),
        }
    };
    let contains = |needle: &Value, haystack: &Value| -> Result<bool, ConditionError> {
        match (needle, haystack) {
            (_, Value::List(items)) => Ok(items.contains(needle)),
            (Value::String(n), Value::String(h)) => Ok(h.contains(n.as_str())),
            (_, Value::Mapping(m)) => match needle {
                Value::String(n) => Ok(m.contains_key(n)),
                _ => Ok(false),
            },
            _ => Err(type_error(op, needle, haystack)),
        }
    };

    Ok(match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::NotEq => lhs != rhs,
        CompareOp::Less => ordering(lhs, rhs)? == Ordering::Less,
        CompareOp::LessEq => ordering(lhs, rhs)? != Ordering::Greater,
        CompareOp::Greater => ordering(lhs, rhs)? == Ordering::Greater,
        CompareOp::GreaterEq => ordering(lhs, rhs)? != Ordering::Less,
        CompareOp::In => contains(lhs, rhs)?,
        CompareOp::NotIn => !contains(lhs, rhs)?,
    })
}

impl Expr {
    pub fn evaluate(&self, scope: &VariableScope) -> Result<Value, ConditionError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => scope
                .get(name)
                .cloned()
                .ok_or_else(|| ConditionError::UndefinedName(name.clone())),
            Expr::List(items) => items
                .iter()
                .map(|i| i.evaluate(scope))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Not(inner) => Ok(Value::from(!inner.evaluate(scope)?.is_truthy())),
            Expr::And(lhs, rhs) => {
                let lhs = lhs.evaluate(scope)?;
                if !lhs.is_truthy() {
                    return Ok(lhs);
                }
                rhs.evaluate(scope)
            }
            Expr::Or(lhs, rhs) => {
                let lhs = lhs.evaluate(scope)?;
                if lhs.is_truthy() {
                    return Ok(lhs);
                }
                rhs.evaluate(scope)
            }
            Expr::Compare(first, rest) => {
                let mut lhs = first.evaluate(scope)?;
                for (op, rhs) in rest {
                    let rhs = rhs.evaluate(scope)?;
                    if !compare(op, &lhs, &rhs)? {
                        return Ok(Value::from(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::from(true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scope() -> VariableScope {
        let mut scope = VariableScope::new();
        scope.set("OS", "linux");
        scope.set("target_arch", "x64");
        scope.set("use_foo", 1);
        scope.set("langs", Value::List(vec!["c".into(), "cc".into()]));
        scope
    }

    fn eval(input: &str) -> Result<bool, ConditionError> {
        Ok(parse_condition(input)?.evaluate(&scope())?.is_truthy())
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval(r#"OS=="linux""#), Ok(true));
        assert_eq!(eval(r#"OS!="linux""#), Ok(false));
        assert_eq!(eval("use_foo==1"), Ok(true));
        assert_eq!(eval("use_foo=='1'"), Ok(false));
        assert_eq!(eval("use_foo==True"), Ok(true));
        assert_eq!(eval("0 < use_foo <= 1"), Ok(true));
        assert_eq!(eval("0 < use_foo < 1"), Ok(false));
        assert_eq!(eval("'a' < 'b'"), Ok(true));
    }

    #[test]
    fn boolean_operators() {
        assert_eq!(
            eval(r#"OS=="linux" and target_arch=="x64""#),
            Ok(true)
        );
        assert_eq!(eval(r#"OS=="mac" or target_arch=="x64""#), Ok(true));
        assert_eq!(eval(r#"not (OS=="mac" or OS=="win")"#), Ok(true));
        assert_eq!(eval("use_foo and not use_foo"), Ok(false));
        // Short circuit skips the undefined name
        assert_eq!(eval("OS=='mac' and undefined_thing"), Ok(false));
    }

    #[test]
    fn membership() {
        assert_eq!(eval("OS in ['linux', 'mac']"), Ok(true));
        assert_eq!(eval("OS not in ('linux')"), Ok(false));
        assert_eq!(eval("'cc' in langs"), Ok(true));
        assert_eq!(eval("'in' in 'linux'"), Ok(true));
    }

    #[test]
    fn errors() {
        assert_eq!(
            eval("nope == 1"),
            Err(ConditionError::UndefinedName("nope".into()))
        );
        assert!(matches!(eval("OS < 1"), Err(ConditionError::Type(_))));
        assert!(matches!(eval("OS =="), Err(ConditionError::Syntax(_))));
        assert!(matches!(eval("(OS"), Err(ConditionError::Syntax(_))));
        assert!(matches!(eval("OS linux"), Err(ConditionError::Syntax(_))));
        assert!(matches!(eval("a = 1"), Err(ConditionError::Syntax(_))));
    }
}
