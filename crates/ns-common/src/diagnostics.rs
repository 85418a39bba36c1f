//! The diagnostics sink shared by every compiler stage.
//!
//! Mirrors the source's `nslog.py` `LoggerFactory` (debug/info/warn/error/
//! fatal with indentation-by-nesting-level) but drops the process-wide
//! singleton and the hand-rolled padding counter: each stage is handed an
//! explicit `&mut Diagnostics`, and indentation is instead expressed as
//! `tracing` span nesting, which any subscriber renders for free.

use std::fmt;

use crate::span::Position;

/// Severity levels, ordered the same way the source orders `LogLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        f.write_str(s)
    }
}

/// A phase-coded diagnostic identifier, e.g. `L07`, `P12`, `ST14`, `C60`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseCode {
    Lex(u32),
    Parse(u32),
    Symbols(u32),
    Check(u32),
}

impl fmt::Display for PhaseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseCode::Lex(n) => write!(f, "L{n:02}"),
            PhaseCode::Parse(n) => write!(f, "P{n:02}"),
            PhaseCode::Symbols(n) => write!(f, "ST{n:02}"),
            PhaseCode::Check(n) => write!(f, "C{n:02}"),
        }
    }
}

/// One recorded diagnostic: `[LEVEL] {PHASECODE} text`, optionally anchored
/// to a source position.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: PhaseCode,
    pub message: String,
    pub at: Option<Position>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {{{}}} ", self.severity, self.code)?;
        if let Some(pos) = self.at {
            write!(f, "{pos} ")?;
        }
        f.write_str(&self.message)
    }
}

/// Accumulates diagnostics for a single stage invocation and tracks the
/// `success` flag the source threads through every visitor. `fatal` does not
/// itself unwind — callers raise `LexError`/`ParseError`/etc. and the stage
/// entry point records the diagnostic first so it still shows up in the
/// batch even though the stage aborts (see `ns-cli` for where these are
/// drained).
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
    success: bool,
    min_severity: Option<Severity>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self { records: Vec::new(), success: true, min_severity: None }
    }

    /// Only diagnostics at or above this severity are recorded; matches the
    /// source's `setLevel`/verbosity toggles (`--debug`, `-v`, `-woff`).
    pub fn with_min_severity(min_severity: Severity) -> Self {
        Self { records: Vec::new(), success: true, min_severity: Some(min_severity) }
    }

    fn push(&mut self, severity: Severity, code: PhaseCode, message: impl Into<String>, at: Option<Position>) {
        if let Some(min) = self.min_severity {
            if severity < min {
                return;
            }
        }
        self.records.push(Diagnostic { severity, code, message: message.into(), at });
    }

    pub fn debug(&mut self, code: PhaseCode, message: impl Into<String>) {
        self.push(Severity::Debug, code, message, None);
    }

    pub fn info(&mut self, code: PhaseCode, message: impl Into<String>) {
        self.push(Severity::Info, code, message, None);
    }

    pub fn warn_at(&mut self, code: PhaseCode, at: Position, message: impl Into<String>) {
        self.push(Severity::Warn, code, message, Some(at));
    }

    /// A non-fatal error: marks the stage unsuccessful but does not abort
    /// it, mirroring `self._error` in the source.
    pub fn error_at(&mut self, code: PhaseCode, at: Position, message: impl Into<String>) {
        self.success = false;
        self.push(Severity::Error, code, message, Some(at));
    }

    /// A fatal error: marks the stage unsuccessful. The caller is
    /// responsible for then returning an `Err` to actually unwind, mirroring
    /// `self._fatal` raising immediately after logging.
    pub fn fatal_at(&mut self, code: PhaseCode, at: Position, message: impl Into<String>) {
        self.success = false;
        self.push(Severity::Fatal, code, message, Some(at));
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.success &= other.success;
        self.records.extend(other.records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_marks_unsuccessful_but_keeps_accumulating() {
        let mut diags = Diagnostics::new();
        diags.error_at(PhaseCode::Check(50), Position::new(1, 0), "type mismatch");
        diags.info(PhaseCode::Check(1), "still running");
        assert!(!diags.success());
        assert_eq!(diags.records().len(), 2);
    }

    #[test]
    fn min_severity_filters_debug_noise() {
        let mut diags = Diagnostics::with_min_severity(Severity::Warn);
        diags.debug(PhaseCode::Lex(1), "ignored");
        diags.warn_at(PhaseCode::Lex(2), Position::new(1, 0), "kept");
        assert_eq!(diags.records().len(), 1);
    }

    #[test]
    fn display_matches_documented_shape() {
        let d = Diagnostic {
            severity: Severity::Error,
            code: PhaseCode::Check(60),
            message: "missing member 'c'".to_string(),
            at: Some(Position::new(3, 10)),
        };
        assert_eq!(d.to_string(), "[ERROR] {C60} 3:10 missing member 'c'");
    }
}
