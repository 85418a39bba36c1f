use ns_common::span::Position;

#[derive(Debug, thiserror::Error)]
#[error("{message} at {at}")]
pub struct CheckError {
    pub at: Position,
    pub message: String,
}

impl CheckError {
    pub fn new(at: Position, message: impl Into<String>) -> Self {
        Self { at, message: message.into() }
    }
}
