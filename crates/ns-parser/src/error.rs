//! The parser's fatal-error type, mirroring `Parser._fatal` in the source.

use ns_common::span::Position;

#[derive(Debug, thiserror::Error)]
#[error("{message} at {at}")]
pub struct ParseError {
    pub at: Position,
    pub message: String,
}

impl ParseError {
    pub fn new(at: Position, message: impl Into<String>) -> Self {
        Self { at, message: message.into() }
    }
}
