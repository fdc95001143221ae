use crate::ast_node;
use crate::syntax::ast::tokens::{IntegerLit, Keyword, StringLit};
use crate::syntax::ast::{support, AstChildren, AstNode, SyntaxKind, SyntaxNode};

ast_node!(Root, RootNode);
impl Root {
    pub fn value(&self) -> Option<ValueExpr> {
        support::child(&self.syntax)
    }
}

ast_node!(Dict, DictNode);
impl Dict {
    pub fn entries(&self) -> AstChildren<Entry> {
        support::children(&self.syntax)
    }
}

ast_node!(Entry, EntryNode);
impl Entry {
    pub fn key(&self) -> Option<ValueExpr> {
        support::children(&self.syntax).next()
    }

    pub fn value(&self) -> Option<ValueExpr> {
        support::children(&self.syntax).nth(1)
    }
}

ast_node!(List, ListNode);
impl List {
    pub fn items(&self) -> AstChildren<ValueExpr> {
        support::children(&self.syntax)
    }
}

ast_node!(Literal, LiteralNode);
impl Literal {
    /// Adjacent string literals, which concatenate.
    pub fn strings(&self) -> impl Iterator<Item = StringLit> {
        support::tokens(&self.syntax)
    }

    pub fn integer(&self) -> Option<IntegerLit> {
        support::token(&self.syntax)
    }

    pub fn keyword(&self) -> Option<Keyword> {
        support::token(&self.syntax)
    }
}

/// Any node that can appear where a value is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueExpr {
    Dict(Dict),
    List(List),
    Literal(Literal),
}

impl AstNode for ValueExpr {
    fn can_cast(kind: SyntaxKind) -> bool
    where
        Self: Sized,
    {
        matches!(
            kind,
            SyntaxKind::DictNode | SyntaxKind::ListNode | SyntaxKind::LiteralNode
        )
    }

    fn cast(syntax: SyntaxNode) -> Option<Self>
    where
        Self: Sized,
    {
        let ret = match syntax.kind() {
            SyntaxKind::DictNode => ValueExpr::Dict(Dict { syntax }),
            SyntaxKind::ListNode => ValueExpr::List(List { syntax }),
            SyntaxKind::LiteralNode => ValueExpr::Literal(Literal { syntax }),
            _ => return None,
        };
        Some(ret)
    }

    fn syntax(&self) -> &SyntaxNode {
        match self {
            ValueExpr::Dict(it) => &it.syntax,
            ValueExpr::List(it) => &it.syntax,
            ValueExpr::Literal(it) => &it.syntax,
        }
    }
}
