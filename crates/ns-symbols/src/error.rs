//! The builder's fatal-error type, mirroring the source's `_fatal` raising
//! on `L_USE_BEFORE_DECL` (the one condition the builder cannot recover
//! from and keep walking — an unresolved name makes every later reference
//! to it meaningless).

use ns_common::span::Position;

#[derive(Debug, thiserror::Error)]
#[error("{message} at {at}")]
pub struct BuildError {
    pub at: Position,
    pub message: String,
}

impl BuildError {
    pub fn new(at: Position, message: impl Into<String>) -> Self {
        Self { at, message: message.into() }
    }
}
