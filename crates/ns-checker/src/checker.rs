//! The two-pass visitor itself: Pass A validates every type declaration and
//! reference, Pass B walks every declaration/statement/expression.

use ns_common::config::Config;
use ns_common::diagnostics::{Diagnostics, PhaseCode};
use ns_common::span::Position;
use ns_parser::ops::BinOp;
use ns_parser::{NodeArena, NodeIndex, NodeKind};
use ns_symbols::{Namespace, ScopeId, SymbolKind, SymbolTable};

use crate::error::CheckError;
use crate::types::{can_cast_types, category, compare_types_eq, compare_types_equiv, get_expression_type, is_constant_expr, is_lvalue_expr, TypeCategory};

struct Codes;
impl Codes {
    const CIRCTYPEDEF: u32 = 20;
    const TYPENOTEXIST: u32 = 21;
    const VOIDTYPE_DISALLOWED: u32 = 22;
    const INVALIDBITS: u32 = 23;
    const NON_CONSTANT_ARRAY_SIZE: u32 = 24;

    const IF_COND_NOT_SCALAR: u32 = 30;
    const ITER_COND_NOT_SCALAR: u32 = 31;
    const CONTINUE_LABEL_MISMATCH: u32 = 32;
    const CONTINUE_NOT_IN_ITER: u32 = 33;
    const BREAK_LABEL_MISMATCH: u32 = 34;
    const NOT_IN_IF_ITER: u32 = 35;
    const RETURN_TYPE_MISMATCH: u32 = 36;

    const DECL_TYPE_MISMATCH: u32 = 40;
    const CONST_NOT_INTEGRAL: u32 = 41;
    const CONST_NOT_CONSTANT: u32 = 42;

    const CALL_NOT_FUNC: u32 = 50;
    const CALL_ARG_COUNT: u32 = 51;
    const CALL_ARG_TYPE: u32 = 52;
    const INDEX_NOT_ARRAY: u32 = 53;
    const INDEX_BAD_TYPE: u32 = 55;
    const MISSING_MEMBER: u32 = 60;
    const ACCESS_NOT_RECORD: u32 = 61;
    const CAST_ILLEGAL: u32 = 62;
    const CAST_SIGNED_NOT_INTEGRAL: u32 = 63;
    const DEREF_NOT_POINTER: u32 = 64;
    const ADDROF_NOT_LVALUE: u32 = 65;
    const UNARY_NOT_INTEGER: u32 = 66;
    const BINARY_BAD_OPERAND: u32 = 67;
    const BINARY_ARRAY_FUNC_OP: u32 = 68;
    const ASSIGN_NOT_LVALUE: u32 = 69;
    const ASSIGN_TYPE_MISMATCH: u32 = 70;
    const COMPOUND_ELEM_MISMATCH: u32 = 71;
    const WIDTH_MISMATCH_WARN: u32 = 72;
}

/// Drives Pass A then Pass B over the whole module. Mirrors `nschk.py`'s own
/// `Checker.check()` entry point sequencing the two passes.
pub fn check_module(arena: &mut NodeArena, symbols: &mut SymbolTable, config: &Config, root: NodeIndex, diags: &mut Diagnostics) -> Result<(), CheckError> {
    let _span = tracing::debug_span!("check_module").entered();
    let module_scope = symbols.root.expect("build_symbols always creates a module scope");
    let mut checker = Checker { arena, symbols, config, diags, ret_type: None };
    checker.pass_a(root, module_scope);
    checker.pass_b(root, module_scope);
    Ok(())
}

struct Checker<'a> {
    arena: &'a mut NodeArena,
    symbols: &'a mut SymbolTable,
    config: &'a Config,
    diags: &'a mut Diagnostics,
    ret_type: Option<NodeIndex>,
}

impl<'a> Checker<'a> {
    fn error(&mut self, code: u32, at: Position, message: impl Into<String>) {
        self.diags.error_at(PhaseCode::Check(code), at, message);
    }

    // ---------------------------------------------------------------
    // Pass A: type declarations and their transitive references.
    // ---------------------------------------------------------------

    fn pass_a(&mut self, root: NodeIndex, module_scope: ScopeId) {
        let decls = match self.arena.kind(root) {
            NodeKind::Module { decls } => decls.clone(),
            _ => return,
        };
        for decl in decls {
            self.pass_a_decl(decl, module_scope);
        }
    }

    fn pass_a_decl(&mut self, decl: NodeIndex, scope: ScopeId) {
        let mut typenames = Vec::new();
        match self.arena.kind(decl).clone() {
            NodeKind::VarDecl { ty, .. } | NodeKind::ConstDecl { ty, .. } => {
                self.validate_type(ty, scope, &mut typenames, false);
            }
            NodeKind::TypeDecl { name, ty, .. } => {
                typenames.push(name);
                self.validate_type(ty, scope, &mut typenames, false);
            }
            NodeKind::FuncDecl { ty, body, .. } => {
                self.validate_type(ty, scope, &mut typenames, false);
                if let Some(body) = body {
                    let func_scope = self.arena.scoperef(decl).expect("a defining FuncDecl has a scope");
                    self.pass_a_stmt(body, func_scope);
                }
            }
            _ => {}
        }
    }

    fn pass_a_stmt(&mut self, stmt: NodeIndex, scope: ScopeId) {
        match self.arena.kind(stmt).clone() {
            NodeKind::CompoundStmt { stmts } => {
                let block_scope = self.arena.scoperef(stmt).unwrap_or(scope);
                for s in stmts {
                    self.pass_a_stmt(s, block_scope);
                }
            }
            NodeKind::DefStmt { decl } => self.pass_a_decl(decl, scope),
            NodeKind::IfStmt { cond, body, else_body, .. } => {
                self.pass_a_expr_types(cond, scope);
                self.pass_a_stmt(body, scope);
                if let Some(e) = else_body {
                    self.pass_a_stmt(e, scope);
                }
            }
            NodeKind::IterStmt { init, cond, inc, body, else_body, .. } => {
                if let Some(i) = init {
                    self.pass_a_stmt(i, scope);
                }
                if let Some(c) = cond {
                    self.pass_a_expr_types(c, scope);
                }
                if let Some(i) = inc {
                    self.pass_a_expr_types(i, scope);
                }
                self.pass_a_stmt(body, scope);
                if let Some(e) = else_body {
                    self.pass_a_stmt(e, scope);
                }
            }
            NodeKind::ExprStmt { expr } => self.pass_a_expr_types(expr, scope),
            NodeKind::ReturnStmt { value: Some(v) } => self.pass_a_expr_types(v, scope),
            _ => {}
        }
    }

    /// Validates only the type nodes embedded directly in an expression
    /// tree (`Cast`'s target, `sztype`'s operand); everything else in Pass A
    /// cares about declarations, not expressions.
    fn pass_a_expr_types(&mut self, expr: NodeIndex, scope: ScopeId) {
        match self.arena.kind(expr).clone() {
            NodeKind::CastExpr { expr: inner, cast_type, .. } => {
                let mut typenames = Vec::new();
                self.validate_type(cast_type, scope, &mut typenames, false);
                self.pass_a_expr_types(inner, scope);
            }
            NodeKind::SztypeExpr { ty } => {
                let mut typenames = Vec::new();
                self.validate_type(ty, scope, &mut typenames, false);
            }
            NodeKind::CallExpr { func, args } => {
                self.pass_a_expr_types(func, scope);
                for a in args {
                    self.pass_a_expr_types(a, scope);
                }
            }
            NodeKind::IndexExpr { array, index } => {
                self.pass_a_expr_types(array, scope);
                self.pass_a_expr_types(index, scope);
            }
            NodeKind::AccessExpr { record, .. } => self.pass_a_expr_types(record, scope),
            NodeKind::DerefExpr { pointer } => self.pass_a_expr_types(pointer, scope),
            NodeKind::AddrOfExpr { expr: inner } => self.pass_a_expr_types(inner, scope),
            NodeKind::UnaryExpr { expr: inner, .. } => self.pass_a_expr_types(inner, scope),
            NodeKind::UnaryCondExpr { expr: inner, .. } => self.pass_a_expr_types(inner, scope),
            NodeKind::BinaryExpr { left, right, .. } | NodeKind::BinaryCondExpr { left, right, .. } => {
                self.pass_a_expr_types(left, scope);
                self.pass_a_expr_types(right, scope);
            }
            NodeKind::TernaryExpr { cond, then_branch, else_branch } => {
                self.pass_a_expr_types(cond, scope);
                self.pass_a_expr_types(then_branch, scope);
                self.pass_a_expr_types(else_branch, scope);
            }
            NodeKind::AssignExpr { lhs, rhs, .. } => {
                self.pass_a_expr_types(lhs, scope);
                self.pass_a_expr_types(rhs, scope);
            }
            NodeKind::CommaExpr { exprs } => {
                for e in exprs {
                    self.pass_a_expr_types(e, scope);
                }
            }
            _ => {}
        }
    }

    fn validate_type(&mut self, ty: NodeIndex, scope: ScopeId, typenames: &mut Vec<String>, void_allowed: bool) {
        let at = self.arena.span(ty).start;
        match self.arena.kind(ty).clone() {
            NodeKind::VoidType { .. } => {
                if !void_allowed {
                    self.error(Codes::VOIDTYPE_DISALLOWED, at, "'void' is not permitted here");
                }
            }
            NodeKind::RefType { name, .. } => {
                if typenames.contains(&name) {
                    self.error(Codes::CIRCTYPEDEF, at, format!("circular type definition involving '{name}'"));
                    return;
                }
                let Some(sym) = self.symbols.lookup(scope, Namespace::Types, &name) else {
                    self.error(Codes::TYPENOTEXIST, at, format!("unknown type '{name}'"));
                    return;
                };
                self.symbols.mark_referenced(sym);
                let underlying = match &self.symbols.symbol(sym).kind {
                    SymbolKind::Type { ty, .. } => *ty,
                    _ => return,
                };
                typenames.push(name);
                self.validate_type(underlying, scope, typenames, void_allowed);
                typenames.pop();
            }
            NodeKind::IntType { .. } => {}
            NodeKind::ArrayType { inner, size, .. } => {
                self.validate_type(inner, scope, typenames, size.is_none());
                if let Some(size_expr) = size {
                    if !is_constant_expr(self.arena, self.symbols, scope, size_expr) {
                        let at = self.arena.span(size_expr).start;
                        self.error(Codes::NON_CONSTANT_ARRAY_SIZE, at, "array size must be a compile-time constant");
                    }
                }
            }
            NodeKind::FuncType { return_type, param_types, .. } => {
                self.validate_type(return_type, scope, typenames, true);
                for p in param_types {
                    self.validate_type(p, scope, typenames, false);
                }
            }
            NodeKind::StructType { members, .. } | NodeKind::UnionType { members, .. } => {
                for member in &members {
                    self.validate_type(member.ty, scope, typenames, false);
                    if member.bits.is_some() && !matches!(self.arena.kind(member.ty), NodeKind::IntType { .. }) {
                        self.error(Codes::INVALIDBITS, at, format!("bit-field member '{}' must have an integral type", member.name));
                    }
                }
            }
            _ => {}
        }
    }

    // ---------------------------------------------------------------
    // Pass B: declarations, statements, expressions.
    // ---------------------------------------------------------------

    fn pass_b(&mut self, root: NodeIndex, module_scope: ScopeId) {
        let decls = match self.arena.kind(root) {
            NodeKind::Module { decls } => decls.clone(),
            _ => return,
        };
        for decl in decls {
            self.check_decl(decl, module_scope);
        }
    }

    fn check_decl(&mut self, decl: NodeIndex, scope: ScopeId) {
        match self.arena.kind(decl).clone() {
            NodeKind::VarDecl { ty, value, .. } => {
                if let Some(value) = value {
                    self.check_initializer(ty, value, scope);
                }
            }
            NodeKind::ConstDecl { ty, value, .. } => {
                let at = self.arena.span(decl).start;
                if !matches!(category(self.arena, self.symbols, scope, ty), Some(TypeCategory::Integer)) {
                    self.error(Codes::CONST_NOT_INTEGRAL, at, "a constant's declared type must be integral");
                }
                if !is_constant_expr(self.arena, self.symbols, scope, value) {
                    self.error(Codes::CONST_NOT_CONSTANT, at, "a constant's initializer must itself be constant");
                }
                self.check_initializer(ty, value, scope);
            }
            NodeKind::TypeDecl { .. } => {}
            NodeKind::FuncDecl { ty, body, .. } => {
                let return_type = match self.arena.kind(ty) {
                    NodeKind::FuncType { return_type, .. } => *return_type,
                    _ => return,
                };
                if let Some(body) = body {
                    let func_scope = self.arena.scoperef(decl).expect("a defining FuncDecl has a scope");
                    let saved = self.ret_type.replace(return_type);
                    self.check_stmt(body, func_scope);
                    self.ret_type = saved;
                }
            }
            _ => {}
        }
    }

    /// `VarDecl`/`ConstDecl` per §4.4: if the initializer is a compound
    /// array/string and the declared array has no size, the size is
    /// patched to the initializer's length before the final equivalence
    /// check, via `NodeArena::set_kind`.
    fn check_initializer(&mut self, ty: NodeIndex, value: NodeIndex, scope: ScopeId) {
        if let NodeKind::ArrayType { inner, size: None, is_volatile } = self.arena.kind(ty).clone() {
            if let Ok(value_ty) = get_expression_type(self.arena, self.symbols, scope, value) {
                if let NodeKind::ArrayType { size: Some(len), .. } = self.arena.kind(value_ty).clone() {
                    self.arena.set_kind(ty, NodeKind::ArrayType { is_volatile, inner, size: Some(len) });
                }
            }
        }
        let at = self.arena.span(value).start;
        let Ok(value_ty) = get_expression_type(self.arena, self.symbols, scope, value) else {
            return;
        };
        if !compare_types_equiv(self.arena, self.symbols, scope, ty, value_ty) {
            self.error(Codes::DECL_TYPE_MISMATCH, at, "declared type does not match the initializer's type");
        }
        self.check_expr(value, scope);
    }

    fn check_stmt(&mut self, stmt: NodeIndex, scope: ScopeId) {
        let at = self.arena.span(stmt).start;
        match self.arena.kind(stmt).clone() {
            NodeKind::EmptyStmt => {}
            NodeKind::DefStmt { decl } => self.check_decl(decl, scope),
            NodeKind::CompoundStmt { stmts } => {
                let block_scope = self.arena.scoperef(stmt).unwrap_or(scope);
                for s in stmts {
                    self.check_stmt(s, block_scope);
                }
            }
            NodeKind::ExprStmt { expr } => self.check_expr(expr, scope),
            NodeKind::ContinueStmt { label } => {
                if let Some(label) = label {
                    if let Some(sym) = self.symbols.lookup(scope, Namespace::Labels, &label) {
                        self.symbols.mark_referenced(sym);
                        if !self.label_owner_is_iter(sym) {
                            self.error(Codes::CONTINUE_LABEL_MISMATCH, at, format!("label '{label}' does not name a loop"));
                        }
                    } else {
                        self.error(Codes::CONTINUE_LABEL_MISMATCH, at, format!("unknown label '{label}'"));
                    }
                }
            }
            NodeKind::BreakStmt { breakif, label } => {
                if let Some(label) = label {
                    if let Some(sym) = self.symbols.lookup(scope, Namespace::Labels, &label) {
                        self.symbols.mark_referenced(sym);
                        let ok = if breakif { self.label_owner_is_if(sym) } else { self.label_owner_is_iter(sym) };
                        if !ok {
                            self.error(Codes::BREAK_LABEL_MISMATCH, at, format!("label '{label}' does not match this break's context"));
                        }
                    } else {
                        self.error(Codes::BREAK_LABEL_MISMATCH, at, format!("unknown label '{label}'"));
                    }
                }
            }
            NodeKind::ReturnStmt { value } => {
                let Some(ret_type) = self.ret_type else { return };
                match value {
                    Some(v) => {
                        self.check_expr(v, scope);
                        if matches!(category(self.arena, self.symbols, scope, ret_type), Some(TypeCategory::Void)) {
                            self.error(Codes::RETURN_TYPE_MISMATCH, at, "a 'void' function cannot return a value");
                        } else if let Ok(value_ty) = get_expression_type(self.arena, self.symbols, scope, v) {
                            if !compare_types_equiv(self.arena, self.symbols, scope, ret_type, value_ty) {
                                self.error(Codes::RETURN_TYPE_MISMATCH, at, "returned type does not match the function's return type");
                            }
                        }
                    }
                    None => {
                        if !matches!(category(self.arena, self.symbols, scope, ret_type), Some(TypeCategory::Void)) {
                            self.error(Codes::RETURN_TYPE_MISMATCH, at, "missing return value");
                        }
                    }
                }
            }
            NodeKind::IfStmt { cond, body, else_body, .. } => {
                self.check_expr(cond, scope);
                self.require_scalar_condition(cond, scope, Codes::IF_COND_NOT_SCALAR);
                self.check_stmt(body, scope);
                if let Some(e) = else_body {
                    self.check_stmt(e, scope);
                }
            }
            NodeKind::IterStmt { init, cond, inc, body, else_body, .. } => {
                if let Some(i) = init {
                    self.check_stmt(i, scope);
                }
                if let Some(c) = cond {
                    self.check_expr(c, scope);
                    self.require_scalar_condition(c, scope, Codes::ITER_COND_NOT_SCALAR);
                }
                if let Some(i) = inc {
                    self.check_expr(i, scope);
                }
                self.check_stmt(body, scope);
                if let Some(e) = else_body {
                    self.check_stmt(e, scope);
                }
            }
        }
    }

    fn label_owner_is_iter(&self, sym: ns_common::SymbolId) -> bool {
        matches!(self.arena.kind(self.symbols.symbol(sym).decl), NodeKind::IterStmt { .. })
    }

    fn label_owner_is_if(&self, sym: ns_common::SymbolId) -> bool {
        matches!(self.arena.kind(self.symbols.symbol(sym).decl), NodeKind::IfStmt { .. })
    }

    fn require_scalar_condition(&mut self, cond: NodeIndex, scope: ScopeId, code: u32) {
        let at = self.arena.span(cond).start;
        let Ok(ty) = get_expression_type(self.arena, self.symbols, scope, cond) else { return };
        match category(self.arena, self.symbols, scope, ty) {
            Some(TypeCategory::Integer | TypeCategory::ArrayPointer | TypeCategory::Func) => {}
            _ => self.error(code, at, "condition must be an integer, array, or function expression"),
        }
    }

    fn check_expr(&mut self, expr: NodeIndex, scope: ScopeId) {
        let at = self.arena.span(expr).start;
        match self.arena.kind(expr).clone() {
            NodeKind::NameExpr { .. } | NodeKind::IntExpr { .. } | NodeKind::StrExpr { .. } => {}
            NodeKind::SzexprExpr { expr: inner } => self.check_expr(inner, scope),
            NodeKind::SztypeExpr { .. } => {}
            NodeKind::CallExpr { func, args } => {
                self.check_expr(func, scope);
                for a in &args {
                    self.check_expr(*a, scope);
                }
                let Ok(func_ty) = get_expression_type(self.arena, self.symbols, scope, func) else { return };
                let NodeKind::FuncType { param_types, is_variadic, .. } = self.arena.kind(func_ty).clone() else {
                    self.error(Codes::CALL_NOT_FUNC, at, "called expression is not a function");
                    return;
                };
                if args.len() < param_types.len() || (!is_variadic && args.len() != param_types.len()) {
                    self.error(Codes::CALL_ARG_COUNT, at, "argument count does not match the function's parameter count");
                }
                for (arg, param_ty) in args.iter().zip(param_types.iter()) {
                    if let Ok(arg_ty) = get_expression_type(self.arena, self.symbols, scope, *arg) {
                        if !compare_types_equiv(self.arena, self.symbols, scope, arg_ty, *param_ty) {
                            self.error(Codes::CALL_ARG_TYPE, at, "argument type does not match the parameter's type");
                        }
                    }
                }
            }
            NodeKind::IndexExpr { array, index } => {
                self.check_expr(array, scope);
                self.check_expr(index, scope);
                if let Ok(array_ty) = get_expression_type(self.arena, self.symbols, scope, array) {
                    match self.arena.kind(array_ty).clone() {
                        NodeKind::ArrayType { inner, .. } if !matches!(self.arena.kind(inner), NodeKind::VoidType { .. }) => {}
                        _ => self.error(Codes::INDEX_NOT_ARRAY, at, "indexed expression is not a non-void array"),
                    }
                }
                if let Ok(index_ty) = get_expression_type(self.arena, self.symbols, scope, index) {
                    if !matches!(self.arena.kind(index_ty), NodeKind::IntType { width, .. } if matches!(width, ns_common::config::IntWidth::Int | ns_common::config::IntWidth::Long)) {
                        self.error(Codes::INDEX_BAD_TYPE, at, "array index must be an 'int' or 'long'");
                    }
                }
            }
            NodeKind::AccessExpr { record, member } => {
                self.check_expr(record, scope);
                if let Ok(record_ty) = get_expression_type(self.arena, self.symbols, scope, record) {
                    match self.arena.kind(record_ty).clone() {
                        NodeKind::StructType { members, .. } | NodeKind::UnionType { members, .. } => {
                            if !members.iter().any(|m| m.name == member) {
                                self.error(Codes::MISSING_MEMBER, at, format!("no member named '{member}'"));
                            }
                        }
                        _ => self.error(Codes::ACCESS_NOT_RECORD, at, "accessed expression is not a struct or union"),
                    }
                }
            }
            NodeKind::CastExpr { expr: inner, cast_type, signed } => {
                self.check_expr(inner, scope);
                if signed && !matches!(category(self.arena, self.symbols, scope, cast_type), Some(TypeCategory::Integer)) {
                    self.error(Codes::CAST_SIGNED_NOT_INTEGRAL, at, "a signed cast's target type must be integral");
                }
                if let Ok(inner_ty) = get_expression_type(self.arena, self.symbols, scope, inner) {
                    if !can_cast_types(self.arena, self.symbols, scope, inner_ty, cast_type) {
                        self.error(Codes::CAST_ILLEGAL, at, "this cast is not permitted between these types");
                    }
                }
            }
            NodeKind::DerefExpr { pointer } => {
                self.check_expr(pointer, scope);
                if let Ok(pointer_ty) = get_expression_type(self.arena, self.symbols, scope, pointer) {
                    match self.arena.kind(pointer_ty).clone() {
                        NodeKind::ArrayType { inner, .. } if !matches!(self.arena.kind(inner), NodeKind::VoidType { .. }) => {}
                        _ => self.error(Codes::DEREF_NOT_POINTER, at, "dereferenced expression is not a non-void pointer"),
                    }
                }
            }
            NodeKind::AddrOfExpr { expr: inner } => {
                self.check_expr(inner, scope);
                if !is_lvalue_expr(self.arena, self.symbols, scope, inner) {
                    self.error(Codes::ADDROF_NOT_LVALUE, at, "operand of '&' must be an lvalue");
                }
            }
            NodeKind::UnaryExpr { expr: inner, .. } => {
                self.check_expr(inner, scope);
                self.require_integer(inner, scope, Codes::UNARY_NOT_INTEGER, "unary operand must be an integer");
            }
            NodeKind::UnaryCondExpr { expr: inner, .. } => {
                self.check_expr(inner, scope);
                self.require_scalar(inner, scope, Codes::UNARY_NOT_INTEGER, "operand must be an integer, array, or function");
            }
            NodeKind::BinaryExpr { left, op, right } => {
                self.check_expr(left, scope);
                self.check_expr(right, scope);
                self.check_binary_operands(left, right, scope, matches!(op, BinOp::Add | BinOp::Sub), at);
                self.insert_widening_cast_if_needed(expr, left, right, scope);
            }
            NodeKind::BinaryCondExpr { left, op, right } => {
                use ns_parser::ops::BinCOp;
                self.check_expr(left, scope);
                self.check_expr(right, scope);
                let array_func_ok = matches!(op, BinCOp::LogicalAnd | BinCOp::LogicalOr | BinCOp::Eq | BinCOp::NotEq);
                self.check_binary_operands(left, right, scope, array_func_ok, at);
            }
            NodeKind::TernaryExpr { cond, then_branch, else_branch } => {
                self.check_expr(cond, scope);
                self.check_expr(then_branch, scope);
                self.check_expr(else_branch, scope);
                self.require_scalar(cond, scope, Codes::IF_COND_NOT_SCALAR, "ternary condition must be an integer, array, or function");
            }
            NodeKind::AssignExpr { lhs, rhs, aug } => {
                self.check_expr(lhs, scope);
                self.check_expr(rhs, scope);
                if !is_lvalue_expr(self.arena, self.symbols, scope, lhs) {
                    self.error(Codes::ASSIGN_NOT_LVALUE, at, "assignment target must be an lvalue");
                }
                if aug.is_some() {
                    self.check_binary_operands(lhs, rhs, scope, matches!(aug, Some(BinOp::Add | BinOp::Sub)), at);
                }
                if let (Ok(lhs_ty), Ok(rhs_ty)) = (
                    get_expression_type(self.arena, self.symbols, scope, lhs),
                    get_expression_type(self.arena, self.symbols, scope, rhs),
                ) {
                    if !compare_types_equiv(self.arena, self.symbols, scope, lhs_ty, rhs_ty) {
                        self.error(Codes::ASSIGN_TYPE_MISMATCH, at, "assigned value's type does not match the target's type");
                    }
                }
            }
            NodeKind::CommaExpr { exprs } => {
                for e in exprs {
                    self.check_expr(e, scope);
                }
            }
            NodeKind::ComplexExpr(ns_parser::ComplexExprKind::Array(elements)) => {
                for e in &elements {
                    self.check_expr(*e, scope);
                }
                if let Some((first, rest)) = elements.split_first() {
                    if let Ok(first_ty) = get_expression_type(self.arena, self.symbols, scope, *first) {
                        for e in rest {
                            if let Ok(e_ty) = get_expression_type(self.arena, self.symbols, scope, *e) {
                                if !compare_types_equiv(self.arena, self.symbols, scope, first_ty, e_ty) {
                                    self.error(Codes::COMPOUND_ELEM_MISMATCH, at, "array initializer elements must share the first element's type");
                                }
                            }
                        }
                    }
                }
            }
            NodeKind::ComplexExpr(ns_parser::ComplexExprKind::Struct(fields)) => {
                for (_, value) in fields {
                    self.check_expr(value, scope);
                }
            }
            NodeKind::ComplexExpr(ns_parser::ComplexExprKind::Str(_)) => {}
        }
    }

    fn require_integer(&mut self, expr: NodeIndex, scope: ScopeId, code: u32, message: &str) {
        let at = self.arena.span(expr).start;
        let Ok(ty) = get_expression_type(self.arena, self.symbols, scope, expr) else { return };
        if !matches!(category(self.arena, self.symbols, scope, ty), Some(TypeCategory::Integer)) {
            self.error(code, at, message.to_string());
        }
    }

    fn require_scalar(&mut self, expr: NodeIndex, scope: ScopeId, code: u32, message: &str) {
        let at = self.arena.span(expr).start;
        let Ok(ty) = get_expression_type(self.arena, self.symbols, scope, expr) else { return };
        match category(self.arena, self.symbols, scope, ty) {
            Some(TypeCategory::Integer | TypeCategory::ArrayPointer | TypeCategory::Func) => {}
            _ => self.error(code, at, message.to_string()),
        }
    }

    /// `Binary`/`BinaryCond` per §4.4: both operands must be integer/array/
    /// function; if either is array/function, only the operators named by
    /// `array_func_allowed` (caller-determined: `Add`/`Sub` for arithmetic,
    /// `&& || == !=` for conditional) are legal.
    fn check_binary_operands(&mut self, left: NodeIndex, right: NodeIndex, scope: ScopeId, array_func_allowed: bool, at: Position) {
        let (Ok(left_ty), Ok(right_ty)) = (
            get_expression_type(self.arena, self.symbols, scope, left),
            get_expression_type(self.arena, self.symbols, scope, right),
        ) else {
            return;
        };
        let (Some(lc), Some(rc)) = (category(self.arena, self.symbols, scope, left_ty), category(self.arena, self.symbols, scope, right_ty)) else {
            return;
        };
        for c in [lc, rc] {
            if !matches!(c, TypeCategory::Integer | TypeCategory::ArrayPointer | TypeCategory::Func) {
                self.error(Codes::BINARY_BAD_OPERAND, at, "operand must be an integer, array, or function expression");
                return;
            }
        }
        let either_non_integer = lc != TypeCategory::Integer || rc != TypeCategory::Integer;
        if either_non_integer && !array_func_allowed {
            self.error(Codes::BINARY_ARRAY_FUNC_OP, at, "this operator is not permitted on array or function operands");
        }
    }

    /// If both operands are integers of differing widths, warns and wraps
    /// the right operand in an implicit `Cast{signed:false}` to the left's
    /// width, preserving the right operand's original span. Splicing is
    /// done by pushing the new `CastExpr` and rewriting the parent
    /// `BinaryExpr`'s own `right` field via `set_kind`.
    fn insert_widening_cast_if_needed(&mut self, binary: NodeIndex, left: NodeIndex, right: NodeIndex, scope: ScopeId) {
        let (Ok(left_ty), Ok(right_ty)) = (
            get_expression_type(self.arena, self.symbols, scope, left),
            get_expression_type(self.arena, self.symbols, scope, right),
        ) else {
            return;
        };
        let (NodeKind::IntType { width: lw, .. }, NodeKind::IntType { width: rw, .. }) = (self.arena.kind(left_ty).clone(), self.arena.kind(right_ty).clone()) else {
            return;
        };
        if lw == rw {
            return;
        }
        let right_span = self.arena.span(right);
        self.diags.warn_at(PhaseCode::Check(Codes::WIDTH_MISMATCH_WARN), right_span.start, "operand widths differ; widening the right operand");
        let cast_type = self.arena.push(NodeKind::IntType { is_volatile: false, width: lw }, right_span);
        let cast = self.arena.push(NodeKind::CastExpr { expr: right, cast_type, signed: false }, right_span);
        if let NodeKind::BinaryExpr { left: l, op, .. } = self.arena.kind(binary).clone() {
            self.arena.set_kind(binary, NodeKind::BinaryExpr { left: l, op, right: cast });
        }
    }
}
