//! Declaration-comment attachment.
//!
//! The lexer emits `/* ... */` comments as ordinary tokens; the parser skips
//! them during normal lookahead but peeks at the raw (unfiltered) token
//! stream immediately around a declaration to decide whether a comment is
//! its `description`. Because the token stream already carries adjacency
//! (there is no byte-offset gap reconstruction to do, unlike a scanner that
//! only sees a flat source buffer), this module is intentionally a thin
//! helper around the raw comment text rather than a source re-scanner.

/// Strips the `/*`/`*/` delimiters and leading/trailing whitespace from a
/// raw comment token's text, producing the string a declaration's
/// `description` field should hold.
pub fn comment_body(raw: &str) -> String {
    let inner = raw.strip_prefix("/*").unwrap_or(raw);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);
    inner.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_delimiters_and_trims() {
        assert_eq!(comment_body("/*  hello world  */"), "hello world");
    }

    #[test]
    fn tolerates_missing_delimiters() {
        assert_eq!(comment_body("hello"), "hello");
    }
}
