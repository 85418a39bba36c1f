//! The two-pass symbol-table builder.
//!
//! A direct port of `nsstbuilder.py`'s `SymbolTableBuilder`: a global pass
//! that makes every module-level name visible (so mutual recursion and
//! forward reference work) followed by a local pass that walks bodies,
//! registers locals in declaration order, and resolves every `NameExpr`.
//! Two confirmed source bugs are not reproduced here (see DESIGN.md):
//! local `set` declarations are registered rather than silently dropped,
//! and function parameter/array-size expressions are always resolved
//! against the scope the symbol actually lives in.

use ns_common::diagnostics::{Diagnostics, PhaseCode};
use ns_common::span::Position;
use ns_common::{ScopeId, SymbolId};
use ns_parser::{NodeArena, NodeIndex, NodeKind};

use crate::error::BuildError;
use crate::symbol::{Namespace, ScopeKind, SymbolKind, SymbolTable};
use crate::types_eq::types_match;

type BResult<T> = Result<T, BuildError>;

/// `ST10`-`ST20`, the symbol-builder phase codes named in §6.
struct Codes;
impl Codes {
    const INVALID_REDECL: u32 = 10;
    const FUNC_REDECL_MISMATCH: u32 = 12;
    const FUNC_PARAM_TWICE: u32 = 13;
    const VAR_REDECL_MISMATCH: u32 = 14;
    const CANNOT_REDEFINE: u32 = 15;
    const USE_BEFORE_DECL: u32 = 16;
}

pub struct Builder<'a> {
    arena: &'a mut NodeArena,
    table: SymbolTable,
    diags: &'a mut Diagnostics,
}

/// Runs both passes over `root` (a `Module` node) and returns the completed
/// symbol table, or the first `L_USE_BEFORE_DECL` fatal encountered while
/// resolving a use.
pub fn build_symbols(arena: &mut NodeArena, root: NodeIndex, diags: &mut Diagnostics) -> BResult<SymbolTable> {
    let _span = tracing::debug_span!("build_symbols").entered();
    let mut builder = Builder { arena, table: SymbolTable::new(), diags };
    builder.build(root)?;
    Ok(builder.table)
}

impl<'a> Builder<'a> {
    fn build(&mut self, module: NodeIndex) -> BResult<()> {
        let module_scope = self.table.new_scope(ScopeKind::Module, None);
        self.arena.set_scoperef(module, module_scope);

        let decls = match self.arena.kind(module).clone() {
            NodeKind::Module { decls } => decls,
            _ => panic!("build_symbols called on a non-Module root"),
        };

        for &decl in &decls {
            self.global_pass_decl(decl, module_scope);
        }
        for &decl in &decls {
            self.local_pass_top_decl(decl, module_scope)?;
        }
        Ok(())
    }

    // ---- global pass -----------------------------------------------

    fn global_pass_decl(&mut self, decl: NodeIndex, module_scope: ScopeId) {
        match self.arena.kind(decl).clone() {
            NodeKind::FuncDecl { name, ty, param_names, body, is_static, is_inline, .. } => {
                self.declare_global_func(decl, module_scope, name, ty, param_names, body.is_some(), is_static, is_inline);
            }
            NodeKind::VarDecl { name, ty, value, is_static, .. } => {
                self.declare_global_var(decl, module_scope, name, ty, value.is_some(), is_static);
            }
            NodeKind::ConstDecl { name, ty, is_static, .. } => {
                self.declare_unique(decl, module_scope, Namespace::Names, SymbolKind::Const { name, ty, is_static });
            }
            NodeKind::TypeDecl { name, ty, .. } => {
                self.declare_unique(decl, module_scope, Namespace::Types, SymbolKind::Type { name, ty });
            }
            other => panic!("unexpected module-level decl node: {other:?}"),
        }
    }

    fn declare_global_func(
        &mut self,
        decl: NodeIndex,
        module_scope: ScopeId,
        name: String,
        ty: NodeIndex,
        param_names: Vec<String>,
        has_body: bool,
        is_static: bool,
        is_inline: bool,
    ) {
        let func_scope = self.table.new_scope(ScopeKind::Func, Some(module_scope));
        self.register_params(func_scope, ty, &param_names);

        let existing = self.table.lookup_local(module_scope, Namespace::Names, &name);
        let sym_id = match existing {
            None => self.table.declare(
                module_scope,
                Namespace::Names,
                SymbolKind::Func { name, ty, is_static, is_inline, functable: has_body.then_some(func_scope) },
                decl,
            ),
            Some(existing_id) => {
                let at = self.decl_start(decl);
                match self.table.symbol(existing_id).kind.clone() {
                    SymbolKind::Func { ty: existing_ty, is_static: existing_static, is_inline: existing_inline, functable, .. } => {
                        if existing_static != is_static || existing_inline != is_inline || !types_match(self.arena, existing_ty, ty) {
                            self.error(Codes::FUNC_REDECL_MISMATCH, at, format!("redeclaration of '{name}' does not match its prototype"));
                        }
                        if has_body && functable.is_some() {
                            self.error(Codes::FUNC_REDECL_MISMATCH, at, format!("'{name}' already has a definition"));
                        } else if has_body {
                            if let SymbolKind::Func { functable, .. } = &mut self.table.symbol_mut(existing_id).kind {
                                *functable = Some(func_scope);
                            }
                        }
                    }
                    _ => {
                        self.error(Codes::INVALID_REDECL, at, format!("'{name}' redeclared as a function but was not one"));
                    }
                }
                existing_id
            }
        };
        self.arena.set_symref(decl, sym_id);
        self.arena.set_scoperef(decl, func_scope);
    }

    fn register_params(&mut self, func_scope: ScopeId, func_ty: NodeIndex, param_names: &[String]) {
        let param_types = match self.arena.kind(func_ty) {
            NodeKind::FuncType { param_types, .. } => param_types.clone(),
            other => panic!("FuncDecl type was not a FuncType: {other:?}"),
        };
        for (name, ty) in param_names.iter().zip(param_types.iter()) {
            if self.table.lookup_local(func_scope, Namespace::Names, name).is_some() {
                let at = self.arena.span(*ty).start;
                self.error(Codes::FUNC_PARAM_TWICE, at, format!("parameter '{name}' declared twice"));
                continue;
            }
            self.table.declare(func_scope, Namespace::Names, SymbolKind::Param { name: name.clone(), ty: *ty }, func_ty);
        }
    }

    fn declare_global_var(&mut self, decl: NodeIndex, module_scope: ScopeId, name: String, ty: NodeIndex, has_value: bool, is_static: bool) {
        let existing = self.table.lookup_local(module_scope, Namespace::Names, &name);
        let sym_id = match existing {
            None => self.table.declare(module_scope, Namespace::Names, SymbolKind::Var { name, ty, is_static }, decl),
            Some(existing_id) => {
                let at = self.decl_start(decl);
                match self.table.symbol(existing_id).kind.clone() {
                    SymbolKind::Var { ty: existing_ty, is_static: existing_static, .. } => {
                        if !existing_static || !is_static || !types_match(self.arena, existing_ty, ty) {
                            self.error(Codes::VAR_REDECL_MISMATCH, at, format!("redeclaration of '{name}' is not a matching static variable"));
                        }
                        if has_value && self.global_var_has_initializer(existing_id) {
                            self.error(Codes::VAR_REDECL_MISMATCH, at, format!("'{name}' already has an initializer"));
                        }
                    }
                    _ => {
                        self.error(Codes::INVALID_REDECL, at, format!("'{name}' redeclared as a variable but was not one"));
                    }
                }
                existing_id
            }
        };
        self.arena.set_symref(decl, sym_id);
    }

    fn global_var_has_initializer(&self, sym: SymbolId) -> bool {
        let decl = self.table.symbol(sym).decl;
        matches!(self.arena.kind(decl), NodeKind::VarDecl { value: Some(_), .. })
    }

    /// Types and global constants: no permitted redeclaration, unlike
    /// functions and variables.
    fn declare_unique(&mut self, decl: NodeIndex, scope: ScopeId, ns: Namespace, kind: SymbolKind) {
        let name = kind.name().to_string();
        if self.table.lookup_local(scope, ns, &name).is_some() {
            let at = self.decl_start(decl);
            self.error(Codes::CANNOT_REDEFINE, at, format!("cannot redefine '{name}'"));
            return;
        }
        let id = self.table.declare(scope, ns, kind, decl);
        self.arena.set_symref(decl, id);
    }

    // ---- local pass --------------------------------------------------

    fn local_pass_top_decl(&mut self, decl: NodeIndex, module_scope: ScopeId) -> BResult<()> {
        match self.arena.kind(decl).clone() {
            NodeKind::FuncDecl { ty, body, .. } => {
                let func_scope = self.arena.scoperef(decl).expect("global pass sets a FuncDecl's scoperef");
                self.walk_type(ty, func_scope)?;
                if let Some(body) = body {
                    self.walk_stmt(body, func_scope)?;
                }
            }
            NodeKind::VarDecl { ty, value, .. } => {
                self.walk_type(ty, module_scope)?;
                if let Some(value) = value {
                    self.walk_expr(value, module_scope)?;
                }
            }
            NodeKind::ConstDecl { ty, value, .. } => {
                self.walk_type(ty, module_scope)?;
                self.walk_expr(value, module_scope)?;
            }
            NodeKind::TypeDecl { ty, .. } => {
                self.walk_type(ty, module_scope)?;
            }
            other => panic!("unexpected module-level decl node: {other:?}"),
        }
        Ok(())
    }

    fn walk_local_decl(&mut self, decl: NodeIndex, scope: ScopeId) -> BResult<()> {
        match self.arena.kind(decl).clone() {
            NodeKind::VarDecl { name, ty, value, is_static, .. } => {
                self.walk_type(ty, scope)?;
                if self.table.lookup_local(scope, Namespace::Names, &name).is_some() {
                    let at = self.decl_start(decl);
                    self.error(Codes::CANNOT_REDEFINE, at, format!("cannot redefine '{name}'"));
                } else {
                    let id = self.table.declare(scope, Namespace::Names, SymbolKind::Var { name, ty, is_static }, decl);
                    self.arena.set_symref(decl, id);
                }
                if let Some(value) = value {
                    self.walk_expr(value, scope)?;
                }
            }
            // Redesign (§9, DESIGN.md): the source's local pass unconditionally
            // skips registering a local `set`; this builder treats it exactly
            // like a local `let` so its uses actually resolve.
            NodeKind::ConstDecl { name, ty, value, is_static, .. } => {
                self.walk_type(ty, scope)?;
                if self.table.lookup_local(scope, Namespace::Names, &name).is_some() {
                    let at = self.decl_start(decl);
                    self.error(Codes::CANNOT_REDEFINE, at, format!("cannot redefine '{name}'"));
                } else {
                    let id = self.table.declare(scope, Namespace::Names, SymbolKind::Const { name, ty, is_static }, decl);
                    self.arena.set_symref(decl, id);
                }
                self.walk_expr(value, scope)?;
            }
            NodeKind::TypeDecl { name, ty, .. } => {
                self.walk_type(ty, scope)?;
                if self.table.lookup_local(scope, Namespace::Types, &name).is_some() {
                    let at = self.decl_start(decl);
                    self.error(Codes::CANNOT_REDEFINE, at, format!("cannot redefine '{name}'"));
                } else {
                    let id = self.table.declare(scope, Namespace::Types, SymbolKind::Type { name, ty }, decl);
                    self.arena.set_symref(decl, id);
                }
            }
            other => panic!("unexpected local decl node: {other:?}"),
        }
        Ok(())
    }

    fn register_label(&mut self, stmt: NodeIndex, label: &str, scope: ScopeId) {
        if self.table.lookup_local(scope, Namespace::Labels, label).is_some() {
            let at = self.arena.span(stmt).start;
            self.error(Codes::CANNOT_REDEFINE, at, format!("cannot redefine label '{label}'"));
            return;
        }
        let id = self.table.declare(scope, Namespace::Labels, SymbolKind::Label { name: label.to_string() }, stmt);
        self.arena.set_symref(stmt, id);
    }

    fn walk_stmt(&mut self, stmt: NodeIndex, scope: ScopeId) -> BResult<()> {
        match self.arena.kind(stmt).clone() {
            NodeKind::EmptyStmt => Ok(()),
            NodeKind::DefStmt { decl } => self.walk_local_decl(decl, scope),
            NodeKind::CompoundStmt { stmts } => {
                let block_scope = self.table.new_scope(ScopeKind::Block, Some(scope));
                self.arena.set_scoperef(stmt, block_scope);
                for s in stmts {
                    self.walk_stmt(s, block_scope)?;
                }
                Ok(())
            }
            NodeKind::ExprStmt { expr } => self.walk_expr(expr, scope),
            NodeKind::ContinueStmt { .. } => Ok(()),
            NodeKind::BreakStmt { .. } => Ok(()),
            NodeKind::ReturnStmt { value } => {
                if let Some(value) = value {
                    self.walk_expr(value, scope)?;
                }
                Ok(())
            }
            NodeKind::IfStmt { cond, body, else_body, label } => {
                self.walk_expr(cond, scope)?;
                if let Some(label) = &label {
                    self.register_label(stmt, label, scope);
                }
                self.walk_stmt(body, scope)?;
                if let Some(else_body) = else_body {
                    self.walk_stmt(else_body, scope)?;
                }
                Ok(())
            }
            NodeKind::IterStmt { init, cond, inc, body, else_body, label } => {
                if let Some(label) = &label {
                    self.register_label(stmt, label, scope);
                }
                if let Some(init) = init {
                    self.walk_stmt(init, scope)?;
                }
                if let Some(cond) = cond {
                    self.walk_expr(cond, scope)?;
                }
                if let Some(inc) = inc {
                    self.walk_expr(inc, scope)?;
                }
                self.walk_stmt(body, scope)?;
                if let Some(else_body) = else_body {
                    self.walk_stmt(else_body, scope)?;
                }
                Ok(())
            }
            other => panic!("unexpected statement node: {other:?}"),
        }
    }

    fn walk_type(&mut self, ty: NodeIndex, scope: ScopeId) -> BResult<()> {
        match self.arena.kind(ty).clone() {
            NodeKind::VoidType { .. } | NodeKind::RefType { .. } | NodeKind::IntType { .. } => Ok(()),
            NodeKind::ArrayType { inner, size, .. } => {
                self.walk_type(inner, scope)?;
                if let Some(size) = size {
                    self.walk_expr(size, scope)?;
                }
                Ok(())
            }
            NodeKind::FuncType { return_type, param_types, .. } => {
                self.walk_type(return_type, scope)?;
                for p in param_types {
                    self.walk_type(p, scope)?;
                }
                Ok(())
            }
            NodeKind::StructType { members, .. } | NodeKind::UnionType { members, .. } => {
                for member in members {
                    self.walk_type(member.ty, scope)?;
                }
                Ok(())
            }
            other => panic!("unexpected type node: {other:?}"),
        }
    }

    fn walk_expr(&mut self, expr: NodeIndex, scope: ScopeId) -> BResult<()> {
        match self.arena.kind(expr).clone() {
            NodeKind::NameExpr { name } => {
                match self.table.lookup(scope, Namespace::Names, &name) {
                    Some(sym) => {
                        self.arena.set_symref(expr, sym);
                        self.table.mark_referenced(sym);
                        Ok(())
                    }
                    None => {
                        let at = self.arena.span(expr).start;
                        self.diags.fatal_at(PhaseCode::Symbols(Codes::USE_BEFORE_DECL), at, format!("use of '{name}' before declaration"));
                        Err(BuildError::new(at, format!("use of '{name}' before declaration")))
                    }
                }
            }
            NodeKind::IntExpr { .. } | NodeKind::StrExpr { .. } => Ok(()),
            NodeKind::SzexprExpr { expr } => self.walk_expr(expr, scope),
            NodeKind::SztypeExpr { ty } => self.walk_type(ty, scope),
            NodeKind::CallExpr { func, args } => {
                self.walk_expr(func, scope)?;
                for a in args {
                    self.walk_expr(a, scope)?;
                }
                Ok(())
            }
            NodeKind::IndexExpr { array, index } => {
                self.walk_expr(array, scope)?;
                self.walk_expr(index, scope)
            }
            NodeKind::AccessExpr { record, .. } => self.walk_expr(record, scope),
            NodeKind::CastExpr { expr, cast_type, .. } => {
                self.walk_expr(expr, scope)?;
                self.walk_type(cast_type, scope)
            }
            NodeKind::DerefExpr { pointer } => self.walk_expr(pointer, scope),
            NodeKind::AddrOfExpr { expr } => self.walk_expr(expr, scope),
            NodeKind::UnaryExpr { expr, .. } => self.walk_expr(expr, scope),
            NodeKind::UnaryCondExpr { expr, .. } => self.walk_expr(expr, scope),
            NodeKind::BinaryExpr { left, right, .. } => {
                self.walk_expr(left, scope)?;
                self.walk_expr(right, scope)
            }
            NodeKind::BinaryCondExpr { left, right, .. } => {
                self.walk_expr(left, scope)?;
                self.walk_expr(right, scope)
            }
            NodeKind::TernaryExpr { cond, then_branch, else_branch } => {
                self.walk_expr(cond, scope)?;
                self.walk_expr(then_branch, scope)?;
                self.walk_expr(else_branch, scope)
            }
            NodeKind::AssignExpr { lhs, rhs, .. } => {
                self.walk_expr(lhs, scope)?;
                self.walk_expr(rhs, scope)
            }
            NodeKind::CommaExpr { exprs } => {
                for e in exprs {
                    self.walk_expr(e, scope)?;
                }
                Ok(())
            }
            NodeKind::ComplexExpr(kind) => match kind {
                ns_parser::ComplexExprKind::Str(_) => Ok(()),
                ns_parser::ComplexExprKind::Array(items) => {
                    for item in items {
                        self.walk_expr(item, scope)?;
                    }
                    Ok(())
                }
                ns_parser::ComplexExprKind::Struct(fields) => {
                    for (_, value) in fields {
                        self.walk_expr(value, scope)?;
                    }
                    Ok(())
                }
            },
            other => panic!("unexpected expression node: {other:?}"),
        }
    }

    fn decl_start(&self, decl: NodeIndex) -> Position {
        self.arena.span(decl).start
    }

    fn error(&mut self, code: u32, at: Position, message: impl Into<String>) {
        self.diags.error_at(PhaseCode::Symbols(code), at, message);
    }
}
