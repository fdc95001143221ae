pub mod lexer;
pub mod token;

#[cfg(test)]
mod tests;

pub use lexer::{tokenize, tokenize_with_text};
