//! The scanner's fatal-error type.
//!
//! Mirrors `Lexer._fatal` in the source: a fatal condition is first recorded
//! as a diagnostic (so it shows up in the batch alongside any non-fatal
//! errors and warnings already collected) and then raised to unwind the
//! scan. Non-fatal conditions (truncation warnings, alpha-after-number) never
//! produce a `LexError`; they only call `Diagnostics::warn_at`/`error_at` and
//! scanning continues.

use ns_common::span::Position;

#[derive(Debug, thiserror::Error)]
#[error("{message} at {at}")]
pub struct LexError {
    pub at: Position,
    pub message: String,
}

impl LexError {
    pub fn new(at: Position, message: impl Into<String>) -> Self {
        Self { at, message: message.into() }
    }
}
