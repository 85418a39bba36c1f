//! Syntax analysis: turns a token stream into an AST arena.

pub mod error;
pub mod node;
pub mod ops;
pub mod parser;

pub use error::ParseError;
pub use node::{ComplexExprKind, MemberData, NodeArena, NodeIndex, NodeKind};
pub use ops::{BinCOp, BinOp, UnaryCOp, UnaryOp};
pub use parser::Parser;

use ns_common::config::Config;
use ns_common::diagnostics::Diagnostics;
use ns_lexer::Lexer;

/// Lexes and parses one source file into its AST arena plus a root
/// `Module` node. Diagnostics from both stages accumulate in `diags`; a
/// lex or parse error that would otherwise abort the stage is surfaced as
/// `Err` after being recorded.
pub fn parse_module(source: &str, config: Config, diags: &mut Diagnostics) -> Result<(NodeArena, NodeIndex), ParseError> {
    let tokens = {
        let mut lexer = Lexer::new(source, config, diags);
        lexer.lex_all().map_err(|e| ParseError::new(e.at, e.message))?
    };
    let mut parser = Parser::new(tokens, diags);
    let root = parser.parse_module()?;
    Ok((parser.into_arena(), root))
}
