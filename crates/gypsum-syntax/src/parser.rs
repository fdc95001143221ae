use std::iter::Peekable;

use gypsum_lexer::token::TokenKind;
use gypsum_lexer::tokenize_with_text;
use rowan::{GreenNode, GreenNodeBuilder, NodeOrToken};

use crate::syntax::ast::nodes::Root;
use crate::syntax::ast::AstNode;
use crate::syntax::syntax_kind::{syntax_kind_for_token_kind, SyntaxKind};
use crate::syntax::syntax_node::{SyntaxElement, SyntaxNode};
use crate::ParseErrorKind;

/// An error found while building the tree, positioned by byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
    pub kind: ParseErrorKind,
}

/// The result of parsing: a lossless tree, plus any errors encountered along the way.
#[derive(Debug, Clone)]
pub struct Parse {
    green: GreenNode,
    errors: Vec<SyntaxError>,
}

impl Parse {
    pub fn syntax_node(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    pub fn root(&self) -> Option<Root> {
        Root::cast(self.syntax_node())
    }

    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }
}

struct Parser<'text, I: Iterator<Item = (TokenKind, &'text str)>> {
    builder: GreenNodeBuilder<'static>,
    iter: Peekable<I>,
    /// Byte offset of the next token
    offset: usize,
    errors: Vec<SyntaxError>,
}

impl<'text, I: Iterator<Item = (TokenKind, &'text str)>> Parser<'text, I> {
    fn eat_trivia(&mut self) {
        while self
            .iter
            .peek()
            .map(|&(t, _)| t.is_trivia())
            .unwrap_or(false)
        {
            self.bump();
        }
    }

    fn peek(&mut self) -> Option<SyntaxKind> {
        self.eat_trivia();
        self.iter.peek().map(|&(t, _)| syntax_kind_for_token_kind(t))
    }

    fn peek_text(&mut self) -> String {
        self.eat_trivia();
        self.iter
            .peek()
            .map(|&(_, text)| text.to_string())
            .unwrap_or_default()
    }

    fn bump(&mut self) {
        if let Some((token, text)) = self.iter.next() {
            if let TokenKind::Error(e) = token {
                self.error(ParseErrorKind::Lexer(e.kind));
            }
            self.builder
                .token(syntax_kind_for_token_kind(token).into(), text);
            self.offset += text.len();
        }
    }

    fn error(&mut self, kind: ParseErrorKind) {
        self.errors.push(SyntaxError {
            offset: self.offset,
            kind,
        });
    }

    fn unexpected(&mut self, expected: &'static str) {
        match self.peek() {
            None => self.error(ParseErrorKind::UnexpectedEnd(expected)),
            // The lexer already reported this one
            Some(SyntaxKind::Error) => {}
            Some(_) => {
                let found = self.peek_text();
                self.error(ParseErrorKind::UnexpectedToken { expected, found })
            }
        }
    }

    fn expect(&mut self, token: SyntaxKind, expected: &'static str) -> bool {
        if Some(token) == self.peek() {
            self.bump();
            return true;
        }

        self.unexpected(expected);
        false
    }

    fn parse_value(&mut self) -> bool {
        match self.peek() {
            Some(SyntaxKind::OpenBrace) => self.parse_dict(),
            Some(SyntaxKind::OpenBracket) => self.parse_list(),
            Some(SyntaxKind::String) => {
                self.builder.start_node(SyntaxKind::LiteralNode.into());
                // Adjacent string literals are one value
                while self.peek() == Some(SyntaxKind::String) {
                    self.bump();
                }
                self.builder.finish_node();
                true
            }
            Some(kind) if kind.is_literal() => {
                self.builder.start_node(SyntaxKind::LiteralNode.into());
                self.bump();
                self.builder.finish_node();
                true
            }
            _ => {
                self.unexpected("a value");
                false
            }
        }
    }

    fn parse_dict(&mut self) -> bool {
        self.builder.start_node(SyntaxKind::DictNode.into());
        let ok = self.parse_dict_body();
        self.builder.finish_node();
        ok
    }

    fn parse_dict_body(&mut self) -> bool {
        self.bump();
        loop {
            if self.peek() == Some(SyntaxKind::CloseBrace) {
                self.bump();
                return true;
            }

            self.builder.start_node(SyntaxKind::EntryNode.into());
            let ok = self.parse_value()
                && self.expect(SyntaxKind::Colon, "':'")
                && self.parse_value();
            self.builder.finish_node();
            if !ok {
                return false;
            }

            match self.peek() {
                Some(SyntaxKind::Comma) => self.bump(),
                Some(SyntaxKind::CloseBrace) => {}
                _ => {
                    self.unexpected("',' or '}'");
                    return false;
                }
            }
        }
    }

    fn parse_list(&mut self) -> bool {
        self.builder.start_node(SyntaxKind::ListNode.into());
        let ok = self.parse_list_body();
        self.builder.finish_node();
        ok
    }

    fn parse_list_body(&mut self) -> bool {
        self.bump();
        loop {
            if self.peek() == Some(SyntaxKind::CloseBracket) {
                self.bump();
                return true;
            }

            if !self.parse_value() {
                return false;
            }

            match self.peek() {
                Some(SyntaxKind::Comma) => self.bump(),
                Some(SyntaxKind::CloseBracket) => {}
                _ => {
                    self.unexpected("',' or ']'");
                    return false;
                }
            }
        }
    }

    fn parse(mut self) -> Parse {
        self.builder.start_node(SyntaxKind::RootNode.into());

        if self.parse_value() && self.peek().is_some() {
            self.error(ParseErrorKind::TrailingContent);
        }

        // Whatever is left over (after an error, or trailing junk) still belongs in the tree
        self.eat_trivia();
        if self.iter.peek().is_some() {
            self.builder.start_node(SyntaxKind::ErrorNode.into());
            while self.iter.peek().is_some() {
                self.bump();
            }
            self.builder.finish_node();
        }

        self.builder.finish_node();

        Parse {
            green: self.builder.finish(),
            errors: self.errors,
        }
    }
}

pub fn parse(input: &str) -> Parse {
    let parser = Parser {
        builder: GreenNodeBuilder::new(),
        iter: tokenize_with_text(input).into_iter().peekable(),
        offset: 0,
        errors: vec![],
    };
    parser.parse()
}

/// Render the tree, one element per line, for debugging.
pub fn debug_tree(node: &SyntaxNode) -> String {
    fn walk(out: &mut String, indent: usize, element: SyntaxElement) {
        let kind: SyntaxKind = element.kind();
        out.push_str(&" ".repeat(indent));
        match element {
            NodeOrToken::Node(node) => {
                out.push_str(&format!("{kind:?}\n"));
                for child in node.children_with_tokens() {
                    walk(out, indent + 2, child);
                }
            }
            NodeOrToken::Token(token) => out.push_str(&format!("{kind:?} {:?}\n", token.text())),
        }
    }

    let mut out = String::new();
    walk(&mut out, 0, NodeOrToken::Node(node.clone()));
    out
}
