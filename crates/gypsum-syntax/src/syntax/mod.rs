pub mod ast;
pub mod syntax_kind;
pub mod syntax_node;
