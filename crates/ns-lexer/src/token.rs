//! Token kinds produced by the scanner.

use ns_common::config::IntWidth;
use ns_common::span::{Span, Spanned};

/// The fixed keyword set. Unlike the source's flat string tuple, keywords are
/// their own enum so the parser can match on them exhaustively instead of
/// comparing strings at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Set,
    Let,
    Func,
    Struct,
    Union,
    Using,
    Static,
    Inline,
    Void,
    Int,
    Long,
    Quad,
    Volatile,
    If,
    Else,
    For,
    While,
    Break,
    Breakif,
    Continue,
    Return,
}

impl Keyword {
    /// All keywords, in the same order the source lists them in `Keywords`,
    /// plus `return` (see below).
    ///
    /// The source's own `Keywords` tuple omits `"return"` even though
    /// `nsparse.py`'s statement dispatch checks `token.iskeyword("return")`
    /// — since `iskeyword` only matches tokens the lexer already tagged
    /// `KEYWORD`, and `"return"` is absent from that tuple, the source's own
    /// lexer would scan it as a plain `Name` and the check could never
    /// fire. A front end that can parse a function body but never its
    /// `return` statements has no function ever actually returning, which
    /// contradicts the `Return` AST variant `nschk.py` type-checks against
    /// and the end-to-end scenarios in this specification. `return` is
    /// registered as a real keyword here rather than reproducing that
    /// dead-on-arrival bug.
    pub const ALL: [(&'static str, Keyword); 21] = [
        ("set", Keyword::Set),
        ("let", Keyword::Let),
        ("func", Keyword::Func),
        ("struct", Keyword::Struct),
        ("union", Keyword::Union),
        ("using", Keyword::Using),
        ("static", Keyword::Static),
        ("inline", Keyword::Inline),
        ("void", Keyword::Void),
        ("int", Keyword::Int),
        ("long", Keyword::Long),
        ("quad", Keyword::Quad),
        ("volatile", Keyword::Volatile),
        ("if", Keyword::If),
        ("else", Keyword::Else),
        ("for", Keyword::For),
        ("while", Keyword::While),
        ("break", Keyword::Break),
        ("breakif", Keyword::Breakif),
        ("continue", Keyword::Continue),
        ("return", Keyword::Return),
    ];

    pub fn from_str(name: &str) -> Option<Keyword> {
        Self::ALL.iter().find(|(s, _)| *s == name).map(|(_, k)| *k)
    }

    pub fn text(self) -> &'static str {
        Self::ALL.iter().find(|(_, k)| *k == self).map(|(s, _)| *s).unwrap()
    }
}

/// Punctuators, delimiters, and operators. Ordered by descending text length
/// within each group to document the greedy longest-match rule the scanner
/// applies (`$`-suffixed comparisons before their plain counterparts, `...`
/// before `.`, and so on) — see `Punctuator::TABLE` for the table actually
/// used to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punctuator {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Arrow,
    Colon,
    Semi,
    Question,
    As,
    Dollar,
    Ellipsis,
    SzExpr,
    SzType,
    Plus,
    Minus,
    Star,
    Slash,
    SlashDollar,
    Percent,
    PercentDollar,
    Shl,
    Shr,
    ShrDollar,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    LtDollar,
    GtDollar,
    LtEqDollar,
    GtEqDollar,
    Bang,
    AndAnd,
    OrOr,
    Tilde,
    Amp,
    Pipe,
    Caret,
    ColonEq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    SlashPercentEq,
    PercentDollarEq,
    ShlEq,
    ShrEq,
    ShrDollarEq,
    AmpEq,
    PipeEq,
    CaretEq,
}

impl Punctuator {
    /// Every punctuator text the scanner recognizes, in the order the source
    /// declares `Punctuators`. Matching tries every entry and keeps the
    /// longest, so table order does not need to be length-sorted here.
    pub const TABLE: [(&'static str, Punctuator); 57] = [
        ("(", Punctuator::LParen),
        (")", Punctuator::RParen),
        ("{", Punctuator::LBrace),
        ("}", Punctuator::RBrace),
        ("[", Punctuator::LBracket),
        ("]", Punctuator::RBracket),
        (".", Punctuator::Dot),
        (",", Punctuator::Comma),
        ("->", Punctuator::Arrow),
        (":", Punctuator::Colon),
        (";", Punctuator::Semi),
        ("?", Punctuator::Question),
        ("as", Punctuator::As),
        ("$", Punctuator::Dollar),
        ("...", Punctuator::Ellipsis),
        ("szexpr", Punctuator::SzExpr),
        ("sztype", Punctuator::SzType),
        ("+", Punctuator::Plus),
        ("-", Punctuator::Minus),
        ("*", Punctuator::Star),
        ("/", Punctuator::Slash),
        ("/$", Punctuator::SlashDollar),
        ("%", Punctuator::Percent),
        ("%$", Punctuator::PercentDollar),
        ("<<", Punctuator::Shl),
        (">>", Punctuator::Shr),
        (">>$", Punctuator::ShrDollar),
        ("==", Punctuator::EqEq),
        ("!=", Punctuator::NotEq),
        ("<", Punctuator::Lt),
        (">", Punctuator::Gt),
        ("<=", Punctuator::LtEq),
        (">=", Punctuator::GtEq),
        ("<$", Punctuator::LtDollar),
        (">$", Punctuator::GtDollar),
        ("<=$", Punctuator::LtEqDollar),
        (">=$", Punctuator::GtEqDollar),
        ("!", Punctuator::Bang),
        ("&&", Punctuator::AndAnd),
        ("||", Punctuator::OrOr),
        ("~", Punctuator::Tilde),
        ("&", Punctuator::Amp),
        ("|", Punctuator::Pipe),
        ("^", Punctuator::Caret),
        (":=", Punctuator::ColonEq),
        ("+=", Punctuator::PlusEq),
        ("-=", Punctuator::MinusEq),
        ("*=", Punctuator::StarEq),
        ("/=", Punctuator::SlashEq),
        ("/%=", Punctuator::SlashPercentEq),
        ("%$=", Punctuator::PercentDollarEq),
        ("<<=", Punctuator::ShlEq),
        (">>=", Punctuator::ShrEq),
        (">>$=", Punctuator::ShrDollarEq),
        ("&=", Punctuator::AmpEq),
        ("|=", Punctuator::PipeEq),
        ("^=", Punctuator::CaretEq),
    ];

    pub fn text(self) -> &'static str {
        Self::TABLE.iter().find(|(_, p)| *p == self).map(|(s, _)| *s).unwrap()
    }
}

/// The value carried by a token, mirroring `TokenType`'s per-variant payload
/// in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Name(String),
    /// `(value, width)`. The value is pre-truncated to fit `width`, same as
    /// the source masks it before constructing the token.
    Integer(u128, IntWidth),
    /// Already-concatenated, null-terminated string contents.
    Str(Vec<u8>),
    Punctuator(Punctuator),
    Comment(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.kind, TokenKind::Keyword(k) if k == keyword)
    }

    pub fn is_punc(&self, punctuator: Punctuator) -> bool {
        matches!(self.kind, TokenKind::Punctuator(p) if p == punctuator)
    }

    pub fn is_name(&self) -> bool {
        matches!(self.kind, TokenKind::Name(_))
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Name(n) => Some(n),
            _ => None,
        }
    }
}

impl Spanned for Token {
    fn span(&self) -> Span {
        self.span
    }
}
