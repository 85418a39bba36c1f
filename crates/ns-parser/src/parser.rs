//! Recursive-descent, precedence-climbing parser.
//!
//! A direct port of `nsparse.py`'s `Parser` class: every `can_parse_*`/
//! `parse_*` method here has a named counterpart there performing the same
//! lookahead and the same dispatch order. Three deliberate departures from a
//! literal port, each one a documented fix rather than an invented feature
//! (see DESIGN.md):
//!
//! - both `static` and `inline` function modifiers are consumed
//!   independently (the source's single-token lookahead sets `is_static`
//!   true for a bare `inline` and can never see both together);
//! - `szexpr`/`sztype` are dispatched by checking `is_punc`, since the
//!   scanner (correctly) tags them as punctuators, not keywords, and the
//!   source's own `iskeyword` check against them can never fire;
//! - local `set` declarations are parseable as statements, so the constant
//!   name resolution the symbol table builder already performs for them has
//!   something to resolve.

use ns_common::comments::comment_body;
use ns_common::config::IntWidth;
use ns_common::diagnostics::{Diagnostics, PhaseCode};
use ns_common::span::{Position, Span};
use ns_lexer::{Keyword, Punctuator, Token, TokenKind};

use crate::error::ParseError;
use crate::node::{ComplexExprKind, MemberData, NodeArena, NodeIndex, NodeKind};
use crate::ops;

type PResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    arena: NodeArena,
    diags: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    const L_UNKNOWN: u32 = 1;
    const L_EATWRONGTYPE: u32 = 2;
    const L_EATWRONGVALUE: u32 = 3;
    const L_FAILEDCHECK: u32 = 4;
    const L_WRONGTOKEN: u32 = 5;
    const L_MISSINGVALUE: u32 = 10;
    const L_EMPTYRECORDDEF: u32 = 11;
    const L_INVALID_OPERATOR: u32 = 30;
    const L_EMPTY_COMPLEX: u32 = 40;
    const L_COMPLEX_REPEAT_KEY: u32 = 41;

    pub fn new(tokens: Vec<Token>, diags: &'a mut Diagnostics) -> Self {
        Self { tokens, pos: 0, arena: NodeArena::new(), diags }
    }

    pub fn into_arena(self) -> NodeArena {
        self.arena
    }

    fn eof_token(&self) -> Token {
        self.tokens
            .last()
            .cloned()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, Span::dummy()))
    }

    /// The raw index of the `ahead`-th non-comment token counting from
    /// `self.pos`; negative `ahead` looks backward. Mirrors `_peek`'s
    /// comment-filtering lookahead.
    fn sig_index(&self, ahead: i64) -> Option<usize> {
        if ahead >= 0 {
            let mut remaining = ahead;
            let mut idx = self.pos;
            loop {
                if idx >= self.tokens.len() {
                    return None;
                }
                if !matches!(self.tokens[idx].kind, TokenKind::Comment(_)) {
                    if remaining == 0 {
                        return Some(idx);
                    }
                    remaining -= 1;
                }
                idx += 1;
            }
        } else {
            let mut remaining = -ahead - 1;
            let mut idx = self.pos as i64 - 1;
            loop {
                if idx < 0 {
                    return None;
                }
                let i = idx as usize;
                if !matches!(self.tokens[i].kind, TokenKind::Comment(_)) {
                    if remaining == 0 {
                        return Some(i);
                    }
                    remaining -= 1;
                }
                idx -= 1;
            }
        }
    }

    fn peek(&self, ahead: i64) -> Token {
        match self.sig_index(ahead) {
            Some(idx) => self.tokens[idx].clone(),
            None => self.eof_token(),
        }
    }

    fn cur(&self) -> Token {
        self.peek(0)
    }

    fn cur_punc(&self) -> Option<Punctuator> {
        match self.cur().kind {
            TokenKind::Punctuator(p) => Some(p),
            _ => None,
        }
    }

    /// Consumes the current significant token (skipping over any comments
    /// ahead of it, same as `_eat` walking `pos` forward past them first)
    /// and returns it.
    fn bump(&mut self) -> Token {
        let idx = self.sig_index(0).unwrap_or_else(|| self.tokens.len() - 1);
        let tok = self.tokens[idx].clone();
        self.pos = idx + 1;
        tok
    }

    /// The end position of the last consumed significant token, mirroring
    /// `_peek(-1).end_pos`.
    fn prev_span_end(&self) -> Position {
        match self.sig_index(-1) {
            Some(idx) => self.tokens[idx].span.end,
            None => self.tokens.first().map(|t| t.span.start).unwrap_or_default(),
        }
    }

    /// The raw (unfiltered) token immediately before `pos`: a declaration's
    /// leading doc comment, if one is there. Only `parse_func_decl` reads
    /// this; the other declaration kinds attach a *trailing* comment.
    fn leading_comment(&self) -> Option<String> {
        if self.pos == 0 {
            return None;
        }
        match &self.tokens[self.pos - 1].kind {
            TokenKind::Comment(text) => Some(comment_body(text)),
            _ => None,
        }
    }

    /// The raw token at `pos`, consumed if it's a comment. Used right after
    /// a declaration's terminal `;` to pick up a trailing doc comment.
    fn trailing_comment(&mut self) -> Option<String> {
        match self.tokens.get(self.pos).map(|t| &t.kind) {
            Some(TokenKind::Comment(text)) => {
                let body = comment_body(text);
                self.pos += 1;
                Some(body)
            }
            _ => None,
        }
    }

    fn fatal<T>(&mut self, code: u32, at: Position, message: impl Into<String>) -> PResult<T> {
        let message = message.into();
        self.diags.fatal_at(PhaseCode::Parse(code), at, message.clone());
        Err(ParseError::new(at, message))
    }

    fn expect_punc(&mut self, p: Punctuator) -> PResult<Token> {
        let tok = self.cur();
        if !tok.is_punc(p) {
            return self.fatal(
                Self::L_EATWRONGVALUE,
                tok.span.start,
                format!("expected '{}', got {:?}", p.text(), tok.kind),
            );
        }
        Ok(self.bump())
    }

    fn expect_keyword(&mut self, k: Keyword) -> PResult<Token> {
        let tok = self.cur();
        if !tok.is_keyword(k) {
            return self.fatal(
                Self::L_EATWRONGVALUE,
                tok.span.start,
                format!("expected '{}', got {:?}", k.text(), tok.kind),
            );
        }
        Ok(self.bump())
    }

    fn accept_punc(&mut self, p: Punctuator) -> bool {
        if self.cur().is_punc(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn accept_keyword(&mut self, k: Keyword) -> bool {
        if self.cur().is_keyword(k) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_name(&mut self) -> PResult<(String, Span)> {
        let tok = self.cur();
        if let TokenKind::Name(name) = tok.kind.clone() {
            self.bump();
            Ok((name, tok.span))
        } else {
            self.fatal(Self::L_EATWRONGTYPE, tok.span.start, format!("expected a name, got {:?}", tok.kind))
        }
    }

    fn expect_integer(&mut self) -> PResult<u128> {
        let tok = self.cur();
        if let TokenKind::Integer(value, _width) = tok.kind {
            self.bump();
            Ok(value)
        } else {
            self.fatal(Self::L_EATWRONGTYPE, tok.span.start, format!("expected an integer literal, got {:?}", tok.kind))
        }
    }

    fn int_width_keyword(&mut self) -> Option<IntWidth> {
        let width = match self.cur().kind {
            TokenKind::Keyword(Keyword::Int) => IntWidth::Int,
            TokenKind::Keyword(Keyword::Long) => IntWidth::Long,
            TokenKind::Keyword(Keyword::Quad) => IntWidth::Quad,
            _ => return None,
        };
        self.bump();
        Some(width)
    }

    // MODULE PARSING //

    pub fn parse_module(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.skip_leading_comments();
        let mut decls = Vec::new();
        let mut end = start;
        while !self.cur().is_eof() {
            let decl = self.parse_global_decl()?;
            end = self.arena.span(decl).end;
            decls.push(decl);
        }
        Ok(self.arena.push(NodeKind::Module { decls }, Span::new(start, end)))
    }

    fn skip_leading_comments(&mut self) {
        while matches!(self.tokens.get(self.pos).map(|t| &t.kind), Some(TokenKind::Comment(_))) {
            self.pos += 1;
        }
    }

    // DECLARATION PARSING //

    fn can_parse_func_decl(&self) -> bool {
        let mut ahead = 0i64;
        loop {
            let tok = self.peek(ahead);
            if tok.is_keyword(Keyword::Static) || tok.is_keyword(Keyword::Inline) {
                ahead += 1;
                continue;
            }
            return tok.is_keyword(Keyword::Func);
        }
    }

    fn can_parse_const_decl(&self) -> bool {
        let tok = if self.cur().is_keyword(Keyword::Static) { self.peek(1) } else { self.peek(0) };
        tok.is_keyword(Keyword::Set)
    }

    fn can_parse_var_decl(&self) -> bool {
        let tok = if self.cur().is_keyword(Keyword::Static) { self.peek(1) } else { self.peek(0) };
        tok.is_keyword(Keyword::Let)
    }

    fn can_parse_type_decl(&self) -> bool {
        let tok = self.cur();
        tok.is_keyword(Keyword::Using) || tok.is_keyword(Keyword::Struct) || tok.is_keyword(Keyword::Union)
    }

    fn can_parse_decl(&self) -> bool {
        self.can_parse_var_decl() || self.can_parse_type_decl()
    }

    /// Local-only: also allows `set`, which the source's grammar never lets
    /// a statement start with (see the module doc comment).
    fn can_parse_local_decl(&self) -> bool {
        self.can_parse_const_decl() || self.can_parse_decl()
    }

    fn parse_global_decl(&mut self) -> PResult<NodeIndex> {
        if self.can_parse_func_decl() {
            return self.parse_func_decl();
        }
        if self.can_parse_const_decl() {
            return self.parse_const_decl();
        }
        if self.can_parse_decl() {
            return self.parse_decl();
        }
        let at = self.cur().span.start;
        self.fatal(Self::L_FAILEDCHECK, at, "expected global declaration but could not match pattern")
    }

    fn parse_decl(&mut self) -> PResult<NodeIndex> {
        if self.can_parse_var_decl() {
            return self.parse_var_decl();
        }
        if self.can_parse_type_decl() {
            return self.parse_type_decl();
        }
        let at = self.cur().span.start;
        self.fatal(Self::L_FAILEDCHECK, at, "expected declaration but could not match pattern")
    }

    fn parse_local_decl(&mut self) -> PResult<NodeIndex> {
        if self.can_parse_const_decl() {
            return self.parse_const_decl();
        }
        self.parse_decl()
    }

    /// Loop-consumes up to both `static` and `inline`, each at most once, in
    /// either order — unlike the source's one-token lookahead.
    fn parse_modifiers(&mut self) -> (bool, bool) {
        let mut is_static = false;
        let mut is_inline = false;
        loop {
            if !is_static && self.cur().is_keyword(Keyword::Static) {
                is_static = true;
                self.bump();
                continue;
            }
            if !is_inline && self.cur().is_keyword(Keyword::Inline) {
                is_inline = true;
                self.bump();
                continue;
            }
            break;
        }
        (is_static, is_inline)
    }

    fn parse_func_decl(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let description = self.leading_comment();
        let (is_static, is_inline) = self.parse_modifiers();
        self.expect_keyword(Keyword::Func)?;
        let (name, _) = self.expect_name()?;

        self.expect_punc(Punctuator::LParen)?;
        let (param_names, param_types, is_variadic) = if self.cur_punc() == Some(Punctuator::RParen) {
            (Vec::new(), Vec::new(), false)
        } else {
            self.parse_param_list()?
        };
        self.expect_punc(Punctuator::RParen)?;

        self.expect_punc(Punctuator::Arrow)?;
        self.expect_punc(Punctuator::LParen)?;
        let return_type = self.parse_type()?;
        self.expect_punc(Punctuator::RParen)?;
        let sig_span = Span::new(start, self.prev_span_end());
        let ty = self.arena.push(
            NodeKind::FuncType { is_volatile: false, return_type, param_types, is_variadic },
            sig_span,
        );

        let body = if self.accept_punc(Punctuator::Semi) {
            None
        } else if self.cur_punc() == Some(Punctuator::LBrace) {
            Some(self.parse_compound_stmt()?)
        } else {
            let at = self.cur().span.start;
            let tok = self.cur();
            return self.fatal(
                Self::L_WRONGTOKEN,
                at,
                format!("expected ';' or a function body, got {:?}", tok.kind),
            );
        };

        let end = self.prev_span_end();
        Ok(self.arena.push(
            NodeKind::FuncDecl { name, ty, description, param_names, body, is_static, is_inline },
            Span::new(start, end),
        ))
    }

    fn parse_const_decl(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let is_static = self.accept_keyword(Keyword::Static);
        self.expect_keyword(Keyword::Set)?;
        let (name, _) = self.expect_name()?;
        self.expect_punc(Punctuator::Colon)?;
        let ty = self.parse_type()?;

        if self.cur_punc() != Some(Punctuator::ColonEq) {
            let tok = self.cur();
            let at = tok.span.start;
            return self.fatal(
                Self::L_MISSINGVALUE,
                at,
                format!("expected a defined value for constant declaration, got {:?}", tok.kind),
            );
        }
        self.bump();
        let value = self.parse_comma_expr()?;
        self.expect_punc(Punctuator::Semi)?;
        let description = self.trailing_comment();
        let end = self.prev_span_end();
        Ok(self.arena.push(NodeKind::ConstDecl { name, ty, description, value, is_static }, Span::new(start, end)))
    }

    fn parse_var_decl(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let is_static = self.accept_keyword(Keyword::Static);
        self.expect_keyword(Keyword::Let)?;
        let (name, _) = self.expect_name()?;
        self.expect_punc(Punctuator::Colon)?;
        let ty = self.parse_type()?;

        let value = if self.accept_punc(Punctuator::ColonEq) { Some(self.parse_init_expr()?) } else { None };
        self.expect_punc(Punctuator::Semi)?;
        let description = self.trailing_comment();
        let end = self.prev_span_end();
        Ok(self.arena.push(NodeKind::VarDecl { name, ty, description, value, is_static }, Span::new(start, end)))
    }

    fn parse_type_decl(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let tok = self.cur();
        let (name, ty) = if tok.is_keyword(Keyword::Using) {
            self.bump();
            let (name, _) = self.expect_name()?;
            self.expect_punc(Punctuator::ColonEq)?;
            let ty = self.parse_type()?;
            (name, ty)
        } else if tok.is_keyword(Keyword::Struct) || tok.is_keyword(Keyword::Union) {
            let is_struct = tok.is_keyword(Keyword::Struct);
            self.bump();
            let (name, _) = self.expect_name()?;
            let (members, members_span) = self.parse_record_members()?;
            let ty = if is_struct {
                self.arena.push(NodeKind::StructType { is_volatile: false, members }, members_span)
            } else {
                self.arena.push(NodeKind::UnionType { is_volatile: false, members }, members_span)
            };
            (name, ty)
        } else {
            let at = tok.span.start;
            return self.fatal(
                Self::L_WRONGTOKEN,
                at,
                format!("expected 'using', 'struct', or 'union' in type declaration, got {:?}", tok.kind),
            );
        };

        self.expect_punc(Punctuator::Semi)?;
        let description = self.trailing_comment();
        let end = self.prev_span_end();
        Ok(self.arena.push(NodeKind::TypeDecl { name, ty, description }, Span::new(start, end)))
    }

    // TYPE PARSING //

    fn parse_type(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let is_volatile = self.accept_keyword(Keyword::Volatile);

        let node = if self.accept_keyword(Keyword::Void) {
            if is_volatile {
                self.diags.error_at(
                    PhaseCode::Parse(Self::L_FAILEDCHECK),
                    start,
                    "type 'void' cannot take the 'volatile' modifier",
                );
            }
            NodeKind::VoidType { is_volatile }
        } else if let Some(width) = self.int_width_keyword() {
            NodeKind::IntType { is_volatile, width }
        } else if self.accept_keyword(Keyword::Func) {
            self.expect_punc(Punctuator::LParen)?;
            let (param_types, is_variadic) = if self.cur_punc() == Some(Punctuator::RParen) {
                (Vec::new(), false)
            } else {
                self.parse_type_list()?
            };
            self.expect_punc(Punctuator::RParen)?;
            self.expect_punc(Punctuator::Arrow)?;
            self.expect_punc(Punctuator::LParen)?;
            let return_type = self.parse_type()?;
            self.expect_punc(Punctuator::RParen)?;
            NodeKind::FuncType { is_volatile, return_type, param_types, is_variadic }
        } else if self.cur().is_keyword(Keyword::Struct) || self.cur().is_keyword(Keyword::Union) {
            let is_struct = self.cur().is_keyword(Keyword::Struct);
            self.bump();
            let (members, _span) = self.parse_record_members()?;
            if is_struct {
                NodeKind::StructType { is_volatile, members }
            } else {
                NodeKind::UnionType { is_volatile, members }
            }
        } else if self.accept_punc(Punctuator::Star) {
            let inner = self.parse_type()?;
            NodeKind::ArrayType { is_volatile, inner, size: None }
        } else if self.accept_punc(Punctuator::LBracket) {
            let size = if self.cur_punc() == Some(Punctuator::RBracket) {
                None
            } else {
                Some(self.parse_expr_bp(3)?)
            };
            self.expect_punc(Punctuator::RBracket)?;
            let inner = self.parse_type()?;
            NodeKind::ArrayType { is_volatile, inner, size }
        } else if matches!(self.cur().kind, TokenKind::Name(_)) {
            let TokenKind::Name(name) = self.cur().kind else { unreachable!() };
            self.bump();
            NodeKind::RefType { is_volatile, name }
        } else {
            let tok = self.cur();
            return self.fatal(Self::L_WRONGTOKEN, start, format!("expected a type, got {:?}", tok.kind));
        };

        let end = self.prev_span_end();
        Ok(self.arena.push(node, Span::new(start, end)))
    }

    fn parse_record_members(&mut self) -> PResult<(Vec<MemberData>, Span)> {
        let start = self.expect_punc(Punctuator::LBrace)?.span.start;
        let mut members = Vec::new();
        loop {
            if self.cur_punc() == Some(Punctuator::RBrace) {
                break;
            }
            members.push(self.parse_member_decl()?);
            if !self.accept_punc(Punctuator::Comma) {
                break;
            }
        }
        self.expect_punc(Punctuator::RBrace)?;
        let end = self.prev_span_end();
        if members.is_empty() {
            self.diags.error_at(PhaseCode::Parse(Self::L_EMPTYRECORDDEF), start, "record type cannot have no members");
        }
        Ok((members, Span::new(start, end)))
    }

    fn parse_member_decl(&mut self) -> PResult<MemberData> {
        let (name, _) = self.expect_name()?;
        self.expect_punc(Punctuator::Colon)?;
        let ty = self.parse_type()?;
        let bits = if self.accept_punc(Punctuator::Colon) { Some(self.expect_integer()?) } else { None };
        Ok(MemberData { name, ty, bits })
    }

    // STATEMENT PARSING //

    fn parse_stmt(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let tok = self.cur();

        if tok.is_punc(Punctuator::Semi) {
            self.bump();
            return Ok(self.arena.push(NodeKind::EmptyStmt, Span::new(start, self.prev_span_end())));
        }
        if tok.is_punc(Punctuator::LBrace) {
            return self.parse_compound_stmt();
        }
        if tok.is_keyword(Keyword::Continue) {
            self.bump();
            let label = if self.cur().is_name() { Some(self.expect_name()?.0) } else { None };
            self.expect_punc(Punctuator::Semi)?;
            return Ok(self.arena.push(NodeKind::ContinueStmt { label }, Span::new(start, self.prev_span_end())));
        }
        if tok.is_keyword(Keyword::Break) || tok.is_keyword(Keyword::Breakif) {
            let breakif = tok.is_keyword(Keyword::Breakif);
            self.bump();
            let label = if self.cur().is_name() { Some(self.expect_name()?.0) } else { None };
            self.expect_punc(Punctuator::Semi)?;
            return Ok(self.arena.push(NodeKind::BreakStmt { breakif, label }, Span::new(start, self.prev_span_end())));
        }
        if tok.is_keyword(Keyword::Return) {
            self.bump();
            let value = if !self.cur().is_punc(Punctuator::Semi) { Some(self.parse_comma_expr()?) } else { None };
            self.expect_punc(Punctuator::Semi)?;
            return Ok(self.arena.push(NodeKind::ReturnStmt { value }, Span::new(start, self.prev_span_end())));
        }
        if tok.is_keyword(Keyword::If)
            || tok.is_keyword(Keyword::While)
            || tok.is_keyword(Keyword::For)
            || (tok.is_name() && self.peek(1).is_punc(Punctuator::Colon))
        {
            return self.parse_labeled_or_control(start);
        }
        if self.can_parse_local_decl() {
            let decl = self.parse_local_decl()?;
            let end = self.arena.span(decl).end;
            return Ok(self.arena.push(NodeKind::DefStmt { decl }, Span::new(start, end)));
        }
        if self.can_parse_expr() {
            let expr = self.parse_comma_expr()?;
            self.expect_punc(Punctuator::Semi)?;
            return Ok(self.arena.push(NodeKind::ExprStmt { expr }, Span::new(start, self.prev_span_end())));
        }

        self.fatal(Self::L_WRONGTOKEN, start, format!("expected a statement, got {:?}", tok.kind))
    }

    fn parse_compound_stmt(&mut self) -> PResult<NodeIndex> {
        let start = self.expect_punc(Punctuator::LBrace)?.span.start;
        let mut stmts = Vec::new();
        while self.cur_punc() != Some(Punctuator::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect_punc(Punctuator::RBrace)?;
        let end = self.prev_span_end();
        Ok(self.arena.push(NodeKind::CompoundStmt { stmts }, Span::new(start, end)))
    }

    /// Handles both `{"if"|"while"|"for"} ...` and `NAME ':' {"if"|"while"|
    /// "for"} ...`: the source only captures a label when the *first* token
    /// read was a name, then dispatches on whatever keyword follows it.
    fn parse_labeled_or_control(&mut self, start: Position) -> PResult<NodeIndex> {
        let first = self.cur();
        self.bump();

        let (label, control) = if first.is_keyword(Keyword::If) || first.is_keyword(Keyword::While) || first.is_keyword(Keyword::For) {
            (None, first)
        } else {
            let label = first.name().map(|s| s.to_string());
            self.expect_punc(Punctuator::Colon)?;
            let control = self.cur();
            self.bump();
            (label, control)
        };

        let mut node = if control.is_keyword(Keyword::If) {
            self.expect_punc(Punctuator::LParen)?;
            let cond = self.parse_comma_expr()?;
            self.expect_punc(Punctuator::RParen)?;
            let body = self.parse_stmt()?;
            NodeKind::IfStmt { cond, body, else_body: None, label: label.clone() }
        } else if control.is_keyword(Keyword::While) {
            self.expect_punc(Punctuator::LParen)?;
            let cond = self.parse_comma_expr()?;
            self.expect_punc(Punctuator::RParen)?;
            let body = self.parse_stmt()?;
            NodeKind::IterStmt { init: None, cond: Some(cond), inc: None, body, else_body: None, label: label.clone() }
        } else if control.is_keyword(Keyword::For) {
            self.expect_punc(Punctuator::LParen)?;
            let init = if !self.cur().is_punc(Punctuator::Semi) { Some(self.parse_comma_expr()?) } else { None };
            self.expect_punc(Punctuator::Semi)?;
            let cond = if !self.cur().is_punc(Punctuator::Semi) {
                Some(self.parse_comma_expr()?)
            } else {
                let pos = self.cur().span.start;
                Some(self.arena.push(NodeKind::IntExpr { width: IntWidth::Int, value: 1 }, Span::at(pos)))
            };
            self.expect_punc(Punctuator::Semi)?;
            let inc = if !self.cur().is_punc(Punctuator::RParen) { Some(self.parse_comma_expr()?) } else { None };
            self.expect_punc(Punctuator::RParen)?;
            let body = self.parse_stmt()?;
            NodeKind::IterStmt { init, cond, inc, body, else_body: None, label: label.clone() }
        } else {
            let at = control.span.start;
            return self.fatal(Self::L_WRONGTOKEN, at, format!("expected 'if', 'while', or 'for', got {:?}", control.kind));
        };

        if self.accept_keyword(Keyword::Else) {
            let else_stmt = self.parse_stmt()?;
            match &mut node {
                NodeKind::IfStmt { else_body, .. } => *else_body = Some(else_stmt),
                NodeKind::IterStmt { else_body, .. } => *else_body = Some(else_stmt),
                _ => unreachable!(),
            }
        }

        let end = self.prev_span_end();
        Ok(self.arena.push(node, Span::new(start, end)))
    }

    // EXPRESSION PARSING //

    fn can_parse_atom(&self) -> bool {
        let tok = self.cur();
        tok.is_punc(Punctuator::SzExpr)
            || tok.is_punc(Punctuator::SzType)
            || tok.is_punc(Punctuator::LParen)
            || matches!(tok.kind, TokenKind::Str(_) | TokenKind::Integer(_, _) | TokenKind::Name(_))
    }

    fn can_parse_expr(&self) -> bool {
        if self.can_parse_atom() {
            return true;
        }
        if let Some(p) = self.cur_punc() {
            if ops::unary_op(p).is_some() || ops::unary_cond_op(p).is_some() {
                return true;
            }
            if p == Punctuator::Star || p == Punctuator::Amp {
                return true;
            }
        }
        false
    }

    fn parse_init_expr(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let tok = self.cur();

        if let TokenKind::Str(bytes) = tok.kind.clone() {
            self.bump();
            let end = self.prev_span_end();
            return Ok(self.arena.push(NodeKind::ComplexExpr(ComplexExprKind::Str(bytes)), Span::new(start, end)));
        }
        if tok.is_punc(Punctuator::LBrace) {
            self.bump();
            if self.cur_punc() == Some(Punctuator::RBrace) {
                return self.fatal(Self::L_EMPTY_COMPLEX, start, "array initializer cannot have no elements");
            }
            let elems = self.parse_init_expr_list()?;
            self.expect_punc(Punctuator::RBrace)?;
            let end = self.prev_span_end();
            return Ok(self.arena.push(NodeKind::ComplexExpr(ComplexExprKind::Array(elems)), Span::new(start, end)));
        }
        if tok.is_keyword(Keyword::Struct) {
            self.bump();
            self.expect_punc(Punctuator::LBrace)?;
            if self.cur_punc() == Some(Punctuator::RBrace) {
                return self.fatal(Self::L_EMPTY_COMPLEX, start, "struct initializer cannot have no elements");
            }
            let fields = self.parse_n_init_expr_list()?;
            self.expect_punc(Punctuator::RBrace)?;
            let end = self.prev_span_end();
            return Ok(self.arena.push(NodeKind::ComplexExpr(ComplexExprKind::Struct(fields)), Span::new(start, end)));
        }
        if self.can_parse_expr() {
            return self.parse_assignment_expr();
        }

        self.fatal(Self::L_WRONGTOKEN, start, format!("expected an initializer expression, got {:?}", tok.kind))
    }

    /// Top-level entry: a comma expression collapsed to its single element
    /// when there's only one.
    fn parse_comma_expr(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let mut exprs = self.parse_a_expr_list()?;
        if exprs.len() == 1 {
            return Ok(exprs.pop().unwrap());
        }
        let end = self.arena.span(*exprs.last().unwrap()).end;
        Ok(self.arena.push(NodeKind::CommaExpr { exprs }, Span::new(start, end)))
    }

    fn parse_assignment_expr(&mut self) -> PResult<NodeIndex> {
        self.parse_expr_bp(1)
    }

    /// The Pratt loop: a prefix operator or an atom, then postfix operators
    /// before infix operators at each step, each gated on `>= min_bp`.
    fn parse_expr_bp(&mut self, min_bp: u8) -> PResult<NodeIndex> {
        let mut lhs = match self.cur_punc().and_then(ops::prefix_prec) {
            Some(_) => self.parse_prefix()?,
            None => self.parse_atom()?,
        };

        loop {
            if let Some(p) = self.cur_punc() {
                if let Some(prec) = ops::postfix_prec(p) {
                    if prec < min_bp {
                        break;
                    }
                    lhs = self.parse_postfix(lhs)?;
                    continue;
                }
                if let Some((l_bp, _r_bp)) = ops::infix_prec(p) {
                    if l_bp < min_bp {
                        break;
                    }
                    lhs = self.parse_infix(lhs)?;
                    continue;
                }
            }
            break;
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> PResult<NodeIndex> {
        let op_tok = self.bump();
        let p = match op_tok.kind {
            TokenKind::Punctuator(p) => p,
            _ => unreachable!("checked by caller"),
        };
        let prec = ops::prefix_prec(p).expect("checked by caller");
        let rhs = self.parse_expr_bp(prec)?;
        let rhs_end = self.arena.span(rhs).end;

        let node = if p == Punctuator::Amp {
            NodeKind::AddrOfExpr { expr: rhs }
        } else if p == Punctuator::Star {
            NodeKind::DerefExpr { pointer: rhs }
        } else if let Some(op) = ops::unary_op(p) {
            NodeKind::UnaryExpr { op, expr: rhs }
        } else if let Some(op) = ops::unary_cond_op(p) {
            NodeKind::UnaryCondExpr { op, expr: rhs }
        } else {
            return self.fatal(Self::L_UNKNOWN, op_tok.span.start, "expected a prefix operator");
        };

        Ok(self.arena.push(node, Span::new(op_tok.span.start, rhs_end)))
    }

    fn parse_postfix(&mut self, lhs: NodeIndex) -> PResult<NodeIndex> {
        let op_tok = self.bump();
        let p = match op_tok.kind {
            TokenKind::Punctuator(p) => p,
            _ => unreachable!("checked by caller"),
        };
        let lhs_start = self.arena.span(lhs).start;

        let node = match p {
            Punctuator::As => {
                let signed = self.accept_punc(Punctuator::Dollar);
                let cast_type = self.parse_type()?;
                NodeKind::CastExpr { expr: lhs, cast_type, signed }
            }
            Punctuator::Arrow | Punctuator::Dot => {
                let record = if p == Punctuator::Dot {
                    lhs
                } else {
                    let deref_span = Span::new(lhs_start, op_tok.span.end);
                    self.arena.push(NodeKind::DerefExpr { pointer: lhs }, deref_span)
                };
                let (member, _) = self.expect_name()?;
                NodeKind::AccessExpr { record, member }
            }
            Punctuator::LBracket => {
                let index = self.parse_comma_expr()?;
                self.expect_punc(Punctuator::RBracket)?;
                NodeKind::IndexExpr { array: lhs, index }
            }
            Punctuator::LParen => {
                let args = if self.cur_punc() == Some(Punctuator::RParen) { Vec::new() } else { self.parse_a_expr_list()? };
                self.expect_punc(Punctuator::RParen)?;
                NodeKind::CallExpr { func: lhs, args }
            }
            _ => return self.fatal(Self::L_UNKNOWN, op_tok.span.start, "expected a postfix operator"),
        };

        let end = self.prev_span_end();
        Ok(self.arena.push(node, Span::new(lhs_start, end)))
    }

    fn parse_infix(&mut self, lhs: NodeIndex) -> PResult<NodeIndex> {
        let op_tok = self.bump();
        let p = match op_tok.kind {
            TokenKind::Punctuator(p) => p,
            _ => unreachable!("checked by caller"),
        };
        let (_l_bp, r_bp) = ops::infix_prec(p).expect("checked by caller");
        let lhs_start = self.arena.span(lhs).start;

        let node = if ops::is_op_assign(p) {
            let aug = ops::assign_aug(p);
            let rhs = self.parse_expr_bp(r_bp)?;
            NodeKind::AssignExpr { lhs, rhs, aug }
        } else if p == Punctuator::Question {
            let then_branch = self.parse_comma_expr()?;
            self.expect_punc(Punctuator::Colon)?;
            let else_branch = self.parse_expr_bp(r_bp)?;
            NodeKind::TernaryExpr { cond: lhs, then_branch, else_branch }
        } else if let Some(op) = ops::binary_op(p) {
            let right = self.parse_expr_bp(r_bp)?;
            NodeKind::BinaryExpr { left: lhs, op, right }
        } else if let Some(op) = ops::binary_cond_op(p) {
            let right = self.parse_expr_bp(r_bp)?;
            NodeKind::BinaryCondExpr { left: lhs, op, right }
        } else {
            return self.fatal(Self::L_UNKNOWN, op_tok.span.start, "expected an infix operator");
        };

        let end = self.prev_span_end();
        Ok(self.arena.push(node, Span::new(lhs_start, end)))
    }

    /// `szexpr`/`sztype` are dispatched here by punctuator, parenthesized
    /// sub-expressions re-enter the Pratt loop at its most permissive
    /// binding power, and string/integer/name tokens are leaves. Note: the
    /// source additionally widens a parenthesized sub-expression's stored
    /// span to cover the parens themselves by mutating the reused node in
    /// place; the arena here is append-only, so a parenthesized atom keeps
    /// the inner expression's own span instead of being re-stamped.
    fn parse_atom(&mut self) -> PResult<NodeIndex> {
        let tok = self.cur();
        let start = tok.span.start;

        if tok.is_punc(Punctuator::SzExpr) {
            self.bump();
            self.expect_punc(Punctuator::LParen)?;
            let expr = self.parse_expr_bp(0)?;
            self.expect_punc(Punctuator::RParen)?;
            let end = self.prev_span_end();
            return Ok(self.arena.push(NodeKind::SzexprExpr { expr }, Span::new(start, end)));
        }
        if tok.is_punc(Punctuator::SzType) {
            self.bump();
            self.expect_punc(Punctuator::LParen)?;
            let ty = self.parse_type()?;
            self.expect_punc(Punctuator::RParen)?;
            let end = self.prev_span_end();
            return Ok(self.arena.push(NodeKind::SztypeExpr { ty }, Span::new(start, end)));
        }
        if tok.is_punc(Punctuator::LParen) {
            self.bump();
            let inner = self.parse_expr_bp(0)?;
            self.expect_punc(Punctuator::RParen)?;
            return Ok(inner);
        }

        let span = tok.span;
        match tok.kind {
            TokenKind::Str(bytes) => {
                self.bump();
                Ok(self.arena.push(NodeKind::StrExpr { bytes }, span))
            }
            TokenKind::Integer(value, width) => {
                self.bump();
                Ok(self.arena.push(NodeKind::IntExpr { width, value }, span))
            }
            TokenKind::Name(name) => {
                self.bump();
                Ok(self.arena.push(NodeKind::NameExpr { name }, span))
            }
            _ => self.fatal(Self::L_WRONGTOKEN, start, format!("expected an expression, got {:?}", tok.kind)),
        }
    }

    // LIST PARSING //

    fn parse_param_list(&mut self) -> PResult<(Vec<String>, Vec<NodeIndex>, bool)> {
        let mut names = Vec::new();
        let mut types = Vec::new();
        let mut is_variadic = false;
        loop {
            let (name, _) = self.expect_name()?;
            names.push(name);
            self.expect_punc(Punctuator::Colon)?;
            types.push(self.parse_type()?);
            if !self.accept_punc(Punctuator::Comma) {
                break;
            }
            if self.accept_punc(Punctuator::Ellipsis) {
                is_variadic = true;
                if self.cur_punc() == Some(Punctuator::Comma) {
                    let at = self.cur().span.start;
                    return self.fatal(Self::L_INVALID_OPERATOR, at, "'...' cannot be followed by another parameter definition");
                }
                break;
            }
        }
        Ok((names, types, is_variadic))
    }

    fn parse_type_list(&mut self) -> PResult<(Vec<NodeIndex>, bool)> {
        let mut types = Vec::new();
        let mut is_variadic = false;
        loop {
            types.push(self.parse_type()?);
            if !self.accept_punc(Punctuator::Comma) {
                break;
            }
            if self.accept_punc(Punctuator::Ellipsis) {
                is_variadic = true;
                if self.cur_punc() == Some(Punctuator::Comma) {
                    let at = self.cur().span.start;
                    return self.fatal(Self::L_INVALID_OPERATOR, at, "'...' cannot be followed by another parameter definition");
                }
                break;
            }
        }
        Ok((types, is_variadic))
    }

    fn parse_a_expr_list(&mut self) -> PResult<Vec<NodeIndex>> {
        let mut list = vec![self.parse_assignment_expr()?];
        while self.accept_punc(Punctuator::Comma) {
            list.push(self.parse_assignment_expr()?);
        }
        Ok(list)
    }

    fn parse_init_expr_list(&mut self) -> PResult<Vec<NodeIndex>> {
        let mut list = vec![self.parse_init_expr()?];
        while self.accept_punc(Punctuator::Comma) {
            list.push(self.parse_init_expr()?);
        }
        Ok(list)
    }

    fn parse_n_init_expr_list(&mut self) -> PResult<Vec<(String, NodeIndex)>> {
        let mut fields: Vec<(String, NodeIndex)> = Vec::new();
        loop {
            let (name, name_span) = self.expect_name()?;
            if fields.iter().any(|(n, _)| n == &name) {
                return self.fatal(
                    Self::L_COMPLEX_REPEAT_KEY,
                    name_span.start,
                    format!("cannot have repeated key '{name}' in init expression"),
                );
            }
            self.expect_punc(Punctuator::Colon)?;
            let value = self.parse_init_expr()?;
            fields.push((name, value));
            if !self.accept_punc(Punctuator::Comma) {
                break;
            }
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use ns_common::config::Config;
    use ns_common::diagnostics::Diagnostics;
    use ns_lexer::Lexer;

    use super::*;
    use crate::node::NodeKind;

    fn parse(source: &str) -> (NodeArena, NodeIndex, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tokens = {
            let mut lexer = Lexer::new(source, Config::default(), &mut diags);
            lexer.lex_all().expect("lex should succeed")
        };
        let mut parser = Parser::new(tokens, &mut diags);
        let root = parser.parse_module().expect("parse should succeed");
        (parser.into_arena(), root, diags)
    }

    #[test]
    fn parses_empty_module() {
        let (arena, root, diags) = parse("");
        assert!(diags.success());
        match arena.kind(root) {
            NodeKind::Module { decls } => assert!(decls.is_empty()),
            other => panic!("expected Module, got {other:?}"),
        }
    }

    #[test]
    fn parses_global_const_and_var_decls() {
        let (arena, root, diags) = parse("set LIMIT: int := 10; let total: long := 0;");
        assert!(diags.success());
        let NodeKind::Module { decls } = arena.kind(root) else { panic!("expected Module") };
        assert_eq!(decls.len(), 2);
        assert!(matches!(arena.kind(decls[0]), NodeKind::ConstDecl { name, .. } if name == "LIMIT"));
        assert!(matches!(arena.kind(decls[1]), NodeKind::VarDecl { name, .. } if name == "total"));
    }

    #[test]
    fn parses_return_statement_reachably() {
        let (arena, root, diags) = parse("func main() -> (int) { return 0; }");
        assert!(diags.success());
        let NodeKind::Module { decls } = arena.kind(root) else { panic!("expected Module") };
        let NodeKind::FuncDecl { body: Some(body), .. } = arena.kind(decls[0]) else { panic!("expected a body") };
        let NodeKind::CompoundStmt { stmts } = arena.kind(*body) else { panic!("expected CompoundStmt") };
        assert!(matches!(arena.kind(stmts[0]), NodeKind::ReturnStmt { value: Some(_) }));
    }

    #[test]
    fn function_modifiers_are_independent_flags() {
        let (arena, root, diags) = parse("inline func f() -> (void) ;");
        assert!(diags.success());
        let NodeKind::Module { decls } = arena.kind(root) else { panic!("expected Module") };
        match arena.kind(decls[0]) {
            NodeKind::FuncDecl { is_static, is_inline, .. } => {
                assert!(!is_static);
                assert!(*is_inline);
            }
            other => panic!("expected FuncDecl, got {other:?}"),
        }
    }

    #[test]
    fn both_function_modifiers_can_appear_together() {
        let (arena, root, diags) = parse("static inline func f() -> (void) ;");
        assert!(diags.success());
        let NodeKind::Module { decls } = arena.kind(root) else { panic!("expected Module") };
        match arena.kind(decls[0]) {
            NodeKind::FuncDecl { is_static, is_inline, .. } => {
                assert!(*is_static);
                assert!(*is_inline);
            }
            other => panic!("expected FuncDecl, got {other:?}"),
        }
    }

    #[test]
    fn local_set_declaration_parses_as_a_statement() {
        let (arena, root, diags) = parse("func f() -> (int) { set N: int := 4; return N; }");
        assert!(diags.success());
        let NodeKind::Module { decls } = arena.kind(root) else { panic!("expected Module") };
        let NodeKind::FuncDecl { body: Some(body), .. } = arena.kind(decls[0]) else { panic!("expected a body") };
        let NodeKind::CompoundStmt { stmts } = arena.kind(*body) else { panic!("expected CompoundStmt") };
        let NodeKind::DefStmt { decl } = arena.kind(stmts[0]) else { panic!("expected DefStmt") };
        assert!(matches!(arena.kind(*decl), NodeKind::ConstDecl { .. }));
    }

    #[test]
    fn szexpr_and_sztype_parse_via_punctuator_dispatch() {
        let (arena, root, diags) = parse("set A: int := szexpr(1 + 1); set B: int := sztype(int);");
        assert!(diags.success());
        let NodeKind::Module { decls } = arena.kind(root) else { panic!("expected Module") };
        let NodeKind::ConstDecl { value: a, .. } = arena.kind(decls[0]) else { panic!("expected ConstDecl") };
        assert!(matches!(arena.kind(*a), NodeKind::SzexprExpr { .. }));
        let NodeKind::ConstDecl { value: b, .. } = arena.kind(decls[1]) else { panic!("expected ConstDecl") };
        assert!(matches!(arena.kind(*b), NodeKind::SztypeExpr { .. }));
    }

    #[test]
    fn for_loop_defaults_missing_condition_to_true() {
        let (arena, root, diags) = parse("func f() -> (void) { for (;;) { break; } }");
        assert!(diags.success());
        let NodeKind::Module { decls } = arena.kind(root) else { panic!("expected Module") };
        let NodeKind::FuncDecl { body: Some(body), .. } = arena.kind(decls[0]) else { panic!("expected a body") };
        let NodeKind::CompoundStmt { stmts } = arena.kind(*body) else { panic!("expected CompoundStmt") };
        let NodeKind::IterStmt { cond: Some(cond), .. } = arena.kind(stmts[0]) else { panic!("expected IterStmt") };
        assert!(matches!(arena.kind(*cond), NodeKind::IntExpr { value: 1, .. }));
    }

    #[test]
    fn greater_than_wires_to_dedicated_operator_not_less_than() {
        let (arena, root, diags) = parse("set A: int := 1 > 2;");
        assert!(diags.success());
        let NodeKind::Module { decls } = arena.kind(root) else { panic!("expected Module") };
        let NodeKind::ConstDecl { value, .. } = arena.kind(decls[0]) else { panic!("expected ConstDecl") };
        assert!(matches!(arena.kind(*value), NodeKind::BinaryCondExpr { op: ops::BinCOp::UGt, .. }));
    }

    #[test]
    fn ternary_and_assignment_precedence_climb_correctly() {
        let (arena, root, diags) = parse("func f() -> (int) { return 1 ? 2 : 3 + 4 * 5; }");
        assert!(diags.success());
        let NodeKind::Module { decls } = arena.kind(root) else { panic!("expected Module") };
        let NodeKind::FuncDecl { body: Some(body), .. } = arena.kind(decls[0]) else { panic!("expected a body") };
        let NodeKind::CompoundStmt { stmts } = arena.kind(*body) else { panic!("expected CompoundStmt") };
        let NodeKind::ReturnStmt { value: Some(value) } = arena.kind(stmts[0]) else { panic!("expected ReturnStmt") };
        let NodeKind::TernaryExpr { else_branch, .. } = arena.kind(*value) else { panic!("expected TernaryExpr") };
        assert!(matches!(arena.kind(*else_branch), NodeKind::BinaryExpr { op: ops::BinOp::Add, .. }));
    }

    #[test]
    fn arrow_member_access_synthesizes_a_deref_with_truncated_span() {
        let (arena, root, diags) = parse("func f(p: *struct { x: int }) -> (int) { return p->x; }");
        assert!(diags.success());
        let NodeKind::Module { decls } = arena.kind(root) else { panic!("expected Module") };
        let NodeKind::FuncDecl { body: Some(body), .. } = arena.kind(decls[0]) else { panic!("expected a body") };
        let NodeKind::CompoundStmt { stmts } = arena.kind(*body) else { panic!("expected CompoundStmt") };
        let NodeKind::ReturnStmt { value: Some(value) } = arena.kind(stmts[0]) else { panic!("expected ReturnStmt") };
        let NodeKind::AccessExpr { record, member } = arena.kind(*value) else { panic!("expected AccessExpr") };
        assert_eq!(member, "x");
        assert!(matches!(arena.kind(*record), NodeKind::DerefExpr { .. }));
    }

    #[test]
    fn rejects_empty_array_initializer() {
        let mut diags = Diagnostics::new();
        let tokens = {
            let mut lexer = Lexer::new("let a: [3]int := {};", Config::default(), &mut diags);
            lexer.lex_all().expect("lex should succeed")
        };
        let mut parser = Parser::new(tokens, &mut diags);
        assert!(parser.parse_module().is_err());
    }

    #[test]
    fn rejects_duplicate_struct_initializer_key() {
        let mut diags = Diagnostics::new();
        let tokens = {
            let mut lexer = Lexer::new("let a: struct { x: int } := struct { x: 1, x: 2 };", Config::default(), &mut diags);
            lexer.lex_all().expect("lex should succeed")
        };
        let mut parser = Parser::new(tokens, &mut diags);
        assert!(parser.parse_module().is_err());
    }

    #[test]
    fn variadic_ellipsis_cannot_be_followed_by_another_parameter() {
        let mut diags = Diagnostics::new();
        let tokens = {
            let mut lexer = Lexer::new("func f(a: int, ..., b: int) -> (void) ;", Config::default(), &mut diags);
            lexer.lex_all().expect("lex should succeed")
        };
        let mut parser = Parser::new(tokens, &mut diags);
        assert!(parser.parse_module().is_err());
    }
}
