//! Whitespace / line tokenizer shared by the text formats.
//!
//! The formats handled here (question sets, tree files, label files) are all
//! line oriented with whitespace-separated fields, so the lexer does no
//! grammar work: it validates the encoding and hands out positioned tokens.

mod lexer;
mod token;

pub use lexer::{Lexer, Lines, SourceLine, TokenStream};
pub use token::Token;
