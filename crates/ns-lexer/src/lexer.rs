//! The scanner itself.
//!
//! Ported from `Lexer` in the source, one `next_token` call at a time.
//! Positions are tracked as `(line, column)` while scanning (not
//! reconstructed afterwards from byte offsets), and the source is held as a
//! `Vec<char>` rather than a byte slice so indexed lookahead lines up with
//! the source's own per-codepoint slicing.

use ns_common::config::{Config, IntWidth};
use ns_common::diagnostics::{Diagnostics, PhaseCode};
use ns_common::span::{Position, Span};

use crate::error::LexError;
use crate::token::{Keyword, Punctuator, Token, TokenKind};

type LexResult<T> = Result<T, LexError>;

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    config: Config,
    diags: &'a mut Diagnostics,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, config: Config, diags: &'a mut Diagnostics) -> Self {
        Self { chars: source.chars().collect(), pos: 0, line: 1, col: 0, config, diags }
    }

    fn snapshot(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn peek_n(&self, num: usize, ahead: usize) -> &[char] {
        let start = (self.pos + ahead).min(self.chars.len());
        let end = (start + num).min(self.chars.len());
        &self.chars[start..end]
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_ahead(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn peek_str(&self, num: usize) -> String {
        self.peek_n(num, 0).iter().collect()
    }

    /// Advances by `num` characters, updating line/column. Returns `false`
    /// if EOF was hit before advancing the full count, same as the source.
    fn advance(&mut self, num: usize) -> bool {
        let mut remaining = num;
        while remaining > 0 && self.pos < self.chars.len() {
            remaining -= 1;
            self.col += 1;
            if self.peek() == Some('\n') {
                self.line += 1;
                self.col = 0;
            }
            self.pos += 1;
        }
        remaining == 0
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.advance(1);
        }
    }

    fn fatal<T>(&mut self, code: u32, at: Position, message: impl Into<String>) -> LexResult<T> {
        let message = message.into();
        self.diags.fatal_at(PhaseCode::Lex(code), at, message.clone());
        Err(LexError::new(at, message))
    }

    /// Scans every token until (and including) `Eof`.
    pub fn lex_all(&mut self) -> LexResult<Vec<Token>> {
        let _span = tracing::debug_span!("lex").entered();
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.is_eof();
            self.diags.debug(PhaseCode::Lex(0), format!("lexed {:?} at {}", token.kind, token.span));
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token> {
        loop {
            let Some(c) = self.peek() else {
                let at = self.snapshot();
                return Ok(Token::new(TokenKind::Eof, Span::at(at)));
            };

            if c.is_whitespace() {
                self.skip_ws();
                continue;
            }

            if self.peek_str(2) == "/*" {
                return self.read_comment();
            }

            if c.is_ascii_digit() {
                return self.read_int();
            }

            if c == '\'' {
                return self.read_char_literal();
            }

            if c == '"' {
                return self.read_string();
            }

            if let Some(tok) = self.try_read_punc() {
                return Ok(tok);
            }

            if let Some(tok) = self.try_read_keyword_or_name() {
                return Ok(tok);
            }

            let at = self.snapshot();
            return self.fatal(1, at, format!("unexpected character '{c}'"));
        }
    }

    fn read_comment(&mut self) -> LexResult<Token> {
        self.advance(2);
        let mut value = String::new();
        let start_pos = self.snapshot();
        let mut end_pos = start_pos;
        while self.peek_str(2) != "*/" {
            end_pos = self.snapshot();
            let Some(c) = self.peek() else {
                return self.fatal(99, end_pos, format!("unexpected EOF in comment at {start_pos}"));
            };
            value.push(c);
            self.advance(1);
        }
        self.advance(2);
        Ok(Token::new(TokenKind::Comment(value), Span::new(start_pos, end_pos)))
    }

    fn read_int(&mut self) -> LexResult<Token> {
        let start_pos = self.snapshot();
        let mut base = 10u32;

        if self.peek() == Some('0') {
            if let Some(p) = self.peek_ahead(1) {
                let lower = p.to_ascii_lowercase();
                if p.is_alphabetic() {
                    self.advance(1);
                    base = match lower {
                        'b' => 2,
                        'o' => 8,
                        'x' => 16,
                        _ => return self.fatal(10, start_pos, format!("invalid integer literal base prefix '0{lower}'")),
                    };
                    self.advance(1);
                }
            }
        }

        let digit_chars = "0123456789ABCDEF";
        let allowed = &digit_chars[0..base as usize];
        let mut num_string = String::new();
        let mut end_pos = start_pos;
        while let Some(c) = self.peek() {
            if !allowed.contains(c.to_ascii_uppercase()) {
                break;
            }
            num_string.push(c);
            end_pos = self.snapshot();
            self.advance(1);
            while self.peek() == Some('_') {
                end_pos = self.snapshot();
                self.advance(1);
            }
        }

        if num_string.is_empty() {
            let at = self.snapshot();
            return self.fatal(99, at, "expected number, got EOF");
        }

        let (int_type, maximum, new_end_pos) = self.read_int_suffix()?;
        if let Some(p) = new_end_pos {
            end_pos = p;
        }

        if let Some(p) = self.peek() {
            if p.is_alphabetic() || p == '_' {
                let at = self.snapshot();
                self.diags.error_at(
                    PhaseCode::Lex(13),
                    at,
                    "alphabetic characters cannot immediately follow an integer literal. did you forget a space?",
                );
            }
        }

        let mut int_value = u128::from_str_radix(&num_string, base).unwrap_or(0);
        if int_value != (int_value & (maximum - 1)) {
            self.diags.warn_at(
                PhaseCode::Lex(12),
                start_pos,
                format!("integer literal value '{int_value}' was truncated to fit into integer type '{}'", int_type.keyword()),
            );
        }
        int_value &= maximum - 1;

        Ok(Token::new(TokenKind::Integer(int_value, int_type), Span::new(start_pos, end_pos)))
    }

    /// Returns `(value, is_narrow_escape)`. `is_narrow_escape` is the flag
    /// the source reuses for two different purposes depending on caller: in
    /// a character literal it means "may be truncated with a warning rather
    /// than rejected"; in a string literal it means "must fit in 0..=127".
    fn read_char_as_int(&mut self) -> LexResult<(u32, bool)> {
        let Some(c) = self.peek() else {
            let at = self.snapshot();
            return self.fatal(99, at, "expected character, got EOF");
        };

        if c == '\\' {
            let pos = self.snapshot();
            self.advance(1);
            let Some(escaped) = self.peek() else {
                let at = self.snapshot();
                return self.fatal(99, at, "expected character, got EOF");
            };
            let large_peek: String = self.peek_n(10, 0).iter().collect();
            self.advance(1);

            match escaped {
                'a' => return Ok((0x07, true)),
                'b' => return Ok((0x08, true)),
                'f' => return Ok((0x0c, true)),
                'n' => return Ok((b'\n' as u32, true)),
                'r' => return Ok((b'\r' as u32, true)),
                't' => return Ok((b'\t' as u32, true)),
                'v' => return Ok((0x0b, true)),
                '\\' => return Ok((b'\\' as u32, true)),
                '\'' => return Ok((b'\'' as u32, true)),
                '"' => return Ok((b'"' as u32, true)),
                '0' => return Ok((0, true)),
                _ => {}
            }

            if let Some(digits) = match_prefix(&large_peek, |c| c.is_digit(8), 1, 3) {
                self.advance(digits.len() - 1);
                let value = u32::from_str_radix(&digits, 8).unwrap_or(0) % 0x100;
                return Ok((value, true));
            }

            if let Some(rest) = large_peek.strip_prefix('x') {
                if let Some(hex) = match_prefix(rest, |c| c.is_ascii_hexdigit(), 1, 8) {
                    self.advance(hex.len());
                    if self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                        self.diags.warn_at(
                            PhaseCode::Lex(11),
                            pos,
                            format!(
                                "hexadecimal escape sequence '\\x{hex}' read successfully, but is followed by more hexadecimal characters over the 8 character limit at {}",
                                self.snapshot()
                            ),
                        );
                    }
                    let value = u32::from_str_radix(&hex, 16).unwrap_or(0);
                    return Ok((value, true));
                }
            }

            // Exact 8-digit `\uHHHHHHHH` is tried first: the source's own
            // 4-then-8 ordering makes the 8-digit form unreachable since the
            // 4-digit pattern always matches once 4 hex digits are present.
            if let Some(rest) = large_peek.strip_prefix('u') {
                if let Some(hex8) = exact_prefix(rest, |c| c.is_ascii_hexdigit(), 8) {
                    self.advance(hex8.len());
                    let value = u32::from_str_radix(&hex8, 16).unwrap_or(0);
                    return self.unicode_escape_value(pos, value);
                }
                if let Some(hex4) = exact_prefix(rest, |c| c.is_ascii_hexdigit(), 4) {
                    self.advance(hex4.len());
                    let value = u32::from_str_radix(&hex4, 16).unwrap_or(0);
                    return self.unicode_escape_value(pos, value);
                }
            }

            self.diags.warn_at(
                PhaseCode::Lex(11),
                pos,
                format!("escape character '\\' used in literal has no effect and only '{escaped}' will remain. did you mean to escape the backslash?"),
            );
            return Ok((escaped as u32, true));
        }

        self.advance(1);
        Ok((c as u32, false))
    }

    /// Encodes a `\uHHHH`/`\uHHHHHHHH` codepoint the same way the source
    /// does: real UTF-8 bytes, packed into one big-endian integer so that
    /// splitting it back into its minimal byte representation later
    /// reproduces the original UTF-8 sequence.
    fn unicode_escape_value(&mut self, pos: Position, codepoint: u32) -> LexResult<(u32, bool)> {
        let Some(ch) = char::from_u32(codepoint) else {
            return self.fatal(21, pos, format!("invalid unicode literal '\\u{codepoint:x}'"));
        };
        let mut buf = [0u8; 4];
        let encoded = ch.encode_utf8(&mut buf).as_bytes();
        let mut value: u32 = 0;
        for &b in encoded {
            value = (value << 8) | b as u32;
        }
        Ok((value, false))
    }

    fn read_int_suffix(&mut self) -> LexResult<(IntWidth, u128, Option<Position>)> {
        if let Some(c) = self.peek() {
            if c.is_alphabetic() {
                let pos = self.snapshot();
                let Some(width) = IntWidth::from_suffix(c.to_ascii_lowercase()) else {
                    return self.fatal(11, pos, format!("invalid numeric literal base suffix '{}'", c.to_ascii_lowercase()));
                };
                self.advance(1);
                let maximum = self.config.int_truncation_bound(width);
                return Ok((width, maximum, Some(pos)));
            }
        }
        let width = IntWidth::Int;
        let maximum = self.config.int_truncation_bound(width);
        Ok((width, maximum, None))
    }

    fn read_char_literal(&mut self) -> LexResult<Token> {
        let start_pos = self.snapshot();
        self.advance(1);

        let (char_int, can_truncate) = self.read_char_as_int()?;

        if self.peek() != Some('\'') {
            let at = self.snapshot();
            return self.fatal(20, at, format!("expected a single-quote to close character literal at {start_pos}"));
        }
        let mut end_pos = self.snapshot();
        self.advance(1);

        let (int_type, maximum, new_end_pos) = self.read_int_suffix()?;
        if let Some(p) = new_end_pos {
            end_pos = p;
        }

        if let Some(p) = self.peek() {
            if p.is_alphabetic() || p == '_' {
                let at = self.snapshot();
                self.diags.error_at(
                    PhaseCode::Lex(13),
                    at,
                    "alphabetic characters cannot immediately follow a character literal. did you forget a space?",
                );
            }
        }

        let mut value = char_int as u128;
        if value != (value & (maximum - 1)) {
            if !can_truncate {
                return self.fatal(
                    12,
                    start_pos,
                    format!(
                        "character literal value '{value}' (0x{value:X}) cannot be truncated to fit into integer type '{}'",
                        int_type.keyword()
                    ),
                );
            }
            let truncated = value & (maximum - 1);
            self.diags.warn_at(
                PhaseCode::Lex(12),
                start_pos,
                format!(
                    "character literal value '{value}' (0x{value:X}) was truncated to fit into integer type '{}'; new value is '{truncated}' (0x{truncated:X})",
                    int_type.keyword()
                ),
            );
        }
        value &= maximum - 1;

        Ok(Token::new(TokenKind::Integer(value, int_type), Span::new(start_pos, end_pos)))
    }

    fn read_string(&mut self) -> LexResult<Token> {
        let start_pos = self.snapshot();
        let mut end_pos = start_pos;

        if self.peek() != Some('"') {
            return self.fatal(1, start_pos, "expected start of string, but did not get opening double quote");
        }

        let mut bytes: Vec<u8> = Vec::new();
        while self.peek() == Some('"') {
            self.advance(1);
            while self.peek() != Some('"') {
                let char_pos = self.snapshot();
                if self.peek().is_none() {
                    return self.fatal(99, char_pos, "expected character, got EOF");
                }
                let (char_int, not_unicode) = self.read_char_as_int()?;
                if not_unicode && char_int > 127 {
                    return self.fatal(
                        22,
                        char_pos,
                        format!("non UTF-8 character in string has value '{char_int}' which is outside the allowed non-unicode range (0-127)"),
                    );
                }
                bytes.extend(minimal_bytes(char_int));
            }
            end_pos = self.snapshot();
            self.advance(1);
            self.skip_ws();
        }

        bytes.push(0);
        Ok(Token::new(TokenKind::Str(bytes), Span::new(start_pos, end_pos)))
    }

    fn try_read_punc(&mut self) -> Option<Token> {
        let start_pos = self.snapshot();
        let mut best: Option<Punctuator> = None;
        let mut best_len = 0usize;
        for (text, punc) in Punctuator::TABLE {
            let len = text.chars().count();
            if len > best_len && self.peek_str(len) == text {
                best = Some(punc);
                best_len = len;
            }
        }
        let punc = best?;
        self.advance(best_len - 1);
        let end_pos = self.snapshot();
        self.advance(1);
        Some(Token::new(TokenKind::Punctuator(punc), Span::new(start_pos, end_pos)))
    }

    fn try_read_keyword_or_name(&mut self) -> Option<Token> {
        let start_pos = self.snapshot();
        match self.peek() {
            Some(c) if c == '_' || (c.is_alphabetic() && c.is_ascii()) => {}
            _ => return None,
        }

        let mut name = String::new();
        let mut end_pos = start_pos;
        while let Some(c) = self.peek() {
            if c == '_' || (c.is_alphanumeric() && c.is_ascii()) {
                name.push(c);
                end_pos = self.snapshot();
                self.advance(1);
            } else {
                break;
            }
        }

        let span = Span::new(start_pos, end_pos);
        if let Some(keyword) = Keyword::from_str(&name) {
            Some(Token::new(TokenKind::Keyword(keyword), span))
        } else {
            Some(Token::new(TokenKind::Name(name), span))
        }
    }
}

/// Matches `min..=max` characters satisfying `pred` from the start of `s`,
/// greedily (as many as allowed, same as the source's bounded regex quantifiers).
fn match_prefix(s: &str, pred: impl Fn(char) -> bool, min: usize, max: usize) -> Option<String> {
    let matched: String = s.chars().take(max).take_while(|c| pred(*c)).collect();
    if matched.chars().count() >= min {
        Some(matched)
    } else {
        None
    }
}

/// Matches exactly `count` characters satisfying `pred` from the start of `s`.
fn exact_prefix(s: &str, pred: impl Fn(char) -> bool, count: usize) -> Option<String> {
    let matched: String = s.chars().take(count).take_while(|c| pred(*c)).collect();
    if matched.chars().count() == count {
        Some(matched)
    } else {
        None
    }
}

/// Splits an integer into the fewest big-endian bytes that represent it,
/// mirroring `int_to_smallest_bytes` in the source.
fn minimal_bytes(value: u32) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }
    let all = value.to_be_bytes();
    let first_nonzero = all.iter().position(|b| *b != 0).unwrap_or(3);
    all[first_nonzero..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tokens = {
            let mut lexer = Lexer::new(source, Config::default(), &mut diags);
            lexer.lex_all().expect("lex should succeed")
        };
        (tokens, diags)
    }

    #[test]
    fn lexes_punctuators_by_longest_match() {
        let (tokens, _) = lex(">>= >> > >$ >=$");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Punctuator(Punctuator::ShrEq),
                TokenKind::Punctuator(Punctuator::Shr),
                TokenKind::Punctuator(Punctuator::Gt),
                TokenKind::Punctuator(Punctuator::GtDollar),
                TokenKind::Punctuator(Punctuator::GtEqDollar),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_keywords_and_names() {
        let (tokens, _) = lex("func foo");
        assert!(tokens[0].is_keyword(Keyword::Func));
        assert_eq!(tokens[1].name(), Some("foo"));
    }

    #[test]
    fn lexes_hex_octal_and_suffixed_integers() {
        let (tokens, _) = lex("0x1F 0o17 42q");
        assert_eq!(tokens[0].kind, TokenKind::Integer(0x1F, IntWidth::Int));
        assert_eq!(tokens[1].kind, TokenKind::Integer(0o17, IntWidth::Int));
        assert_eq!(tokens[2].kind, TokenKind::Integer(42, IntWidth::Quad));
    }

    #[test]
    fn truncates_oversized_literal_with_warning() {
        let (tokens, diags) = lex("300");
        assert_eq!(tokens[0].kind, TokenKind::Integer(44, IntWidth::Int));
        assert!(diags.records().iter().any(|d| d.code == PhaseCode::Lex(12)));
    }

    #[test]
    fn concatenates_adjacent_strings_and_null_terminates() {
        let (tokens, _) = lex("\"ab\" \"c\"");
        assert_eq!(tokens[0].kind, TokenKind::Str(vec![b'a', b'b', b'c', 0]));
    }

    #[test]
    fn escape_sequences_decode_expected_bytes() {
        let (tokens, _) = lex(r#""\n\t\x41""#);
        assert_eq!(tokens[0].kind, TokenKind::Str(vec![b'\n', b'\t', b'A', 0]));
    }

    #[test]
    fn rejects_non_ascii_octal_escape_in_string() {
        let (_, diags) = lex(r#""\377""#);
        assert!(diags.records().iter().any(|d| d.code == PhaseCode::Lex(22)));
    }

    #[test]
    fn comment_is_a_distinct_token() {
        let (tokens, _) = lex("/* hello */ x");
        match &tokens[0].kind {
            TokenKind::Comment(s) => assert_eq!(s, " hello "),
            other => panic!("expected comment, got {other:?}"),
        }
    }

    #[test]
    fn unknown_character_is_fatal() {
        let mut diags = Diagnostics::new();
        let mut lexer = Lexer::new("`", Config::default(), &mut diags);
        assert!(lexer.lex_all().is_err());
    }
}
