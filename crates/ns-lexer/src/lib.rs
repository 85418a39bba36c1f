//! Scanner for New Solar source text.
//!
//! Turns raw source into a flat token stream (`lex_all`) or pulls tokens one
//! at a time (`next_token`), threading an explicit [`ns_common::Diagnostics`]
//! sink and [`ns_common::Config`] rather than reading either off a global.

pub mod error;
pub mod lexer;
pub mod token;

pub use error::LexError;
pub use lexer::Lexer;
pub use token::{Keyword, Punctuator, Token, TokenKind};
