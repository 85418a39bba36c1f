//! Shared types for the New Solar compiler front end.
//!
//! This crate provides the foundations used by every stage of the pipeline:
//! - Source positions and spans (`Position`, `Span`)
//! - The diagnostics sink (`Diagnostics`, `Diagnostic`, `Severity`, `PhaseCode`)
//! - Type-size configuration (`Config`)
//! - Comment-to-declaration attachment (`comments`)
//! - Opaque cross-crate handles (`SymbolId`, `ScopeId`)

pub mod comments;
pub mod config;
pub mod diagnostics;
pub mod ids;
pub mod span;

pub use config::Config;
pub use diagnostics::{Diagnostic, Diagnostics, PhaseCode, Severity};
pub use ids::{ScopeId, SymbolId};
pub use span::{Position, Span};
