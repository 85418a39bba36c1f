//! Type expansion, equivalence, casting, and expression-type inference —
//! the four pieces of `nschk.py`'s type machinery the rest of the checker
//! is built on.

use ns_common::config::IntWidth;
use ns_common::span::Span;
use ns_parser::{ComplexExprKind, NodeArena, NodeIndex, NodeKind};
use ns_symbols::{Namespace, ScopeId, SymbolKind, SymbolTable};

use crate::error::CheckError;

/// Repeatedly resolves a `RefType` through the `Types` namespace until a
/// non-reference type is reached. `None` if the chain hits an unknown name
/// (Pass A is responsible for reporting that; later stages that call this
/// after Pass A has run can treat `None` as "already reported").
pub fn expand_type(arena: &NodeArena, symbols: &SymbolTable, scope: ScopeId, ty: NodeIndex) -> Option<NodeIndex> {
    let mut current = ty;
    loop {
        match arena.kind(current) {
            NodeKind::RefType { name, .. } => {
                let sym = symbols.lookup(scope, Namespace::Types, name)?;
                match &symbols.symbol(sym).kind {
                    SymbolKind::Type { ty, .. } => current = *ty,
                    _ => return None,
                }
            }
            _ => return Some(current),
        }
    }
}

/// `CompareTypesEq`: structural shape, no `RefType` expansion. This is
/// exactly the redeclaration-time comparison `ns-symbols` already performs
/// before a symbol table exists to expand anything with, so it is reused
/// rather than re-implemented here.
pub fn compare_types_eq(arena: &NodeArena, a: NodeIndex, b: NodeIndex) -> bool {
    ns_symbols::types_eq::types_match(arena, a, b)
}

/// `CompareTypesEquiv`: expands both operands first, then recurses
/// structurally, threading `scope` through every recursive arm — including
/// function parameter/return types and struct/union member types — so a
/// nested `RefType` is always resolved against the scope the comparison
/// actually started in, not a module-level default (see DESIGN.md).
pub fn compare_types_equiv(arena: &NodeArena, symbols: &SymbolTable, scope: ScopeId, a: NodeIndex, b: NodeIndex) -> bool {
    let (Some(a), Some(b)) = (expand_type(arena, symbols, scope, a), expand_type(arena, symbols, scope, b)) else {
        return false;
    };
    match (arena.kind(a), arena.kind(b)) {
        (NodeKind::VoidType { is_volatile: va }, NodeKind::VoidType { is_volatile: vb }) => va == vb,
        (NodeKind::IntType { is_volatile: va, width: wa }, NodeKind::IntType { is_volatile: vb, width: wb }) => va == vb && wa == wb,
        (NodeKind::ArrayType { is_volatile: va, inner: ia, size: sa }, NodeKind::ArrayType { is_volatile: vb, inner: ib, size: sb }) => {
            va == vb
                && compare_types_equiv(arena, symbols, scope, *ia, *ib)
                && match (sa, sb) {
                    (None, None) => true,
                    (Some(x), Some(y)) => int_literal_value(arena, *x) == int_literal_value(arena, *y),
                    _ => false,
                }
        }
        (
            NodeKind::FuncType { is_volatile: va, return_type: ra, param_types: pa, is_variadic: vara },
            NodeKind::FuncType { is_volatile: vb, return_type: rb, param_types: pb, is_variadic: varb },
        ) => {
            va == vb
                && vara == varb
                && compare_types_equiv(arena, symbols, scope, *ra, *rb)
                && pa.len() == pb.len()
                && pa.iter().zip(pb.iter()).all(|(x, y)| compare_types_equiv(arena, symbols, scope, *x, *y))
        }
        (NodeKind::StructType { is_volatile: va, members: ma }, NodeKind::StructType { is_volatile: vb, members: mb })
        | (NodeKind::UnionType { is_volatile: va, members: ma }, NodeKind::UnionType { is_volatile: vb, members: mb }) => {
            va == vb
                && ma.len() == mb.len()
                && ma.iter().zip(mb.iter()).all(|(x, y)| {
                    x.name == y.name && x.bits == y.bits && compare_types_equiv(arena, symbols, scope, x.ty, y.ty)
                })
        }
        _ => false,
    }
}

fn int_literal_value(arena: &NodeArena, node: NodeIndex) -> Option<u128> {
    match arena.kind(node) {
        NodeKind::IntExpr { value, .. } => Some(*value),
        _ => None,
    }
}

/// The handful of shape buckets cast legality and operand-category checks
/// care about, computed from an already-expanded type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Void,
    Integer,
    ArrayPointer,
    Func,
    Struct,
    Union,
}

pub fn category(arena: &NodeArena, symbols: &SymbolTable, scope: ScopeId, ty: NodeIndex) -> Option<TypeCategory> {
    let expanded = expand_type(arena, symbols, scope, ty)?;
    Some(match arena.kind(expanded) {
        NodeKind::VoidType { .. } => TypeCategory::Void,
        NodeKind::IntType { .. } => TypeCategory::Integer,
        NodeKind::ArrayType { .. } => TypeCategory::ArrayPointer,
        NodeKind::FuncType { .. } => TypeCategory::Func,
        NodeKind::StructType { .. } => TypeCategory::Struct,
        NodeKind::UnionType { .. } => TypeCategory::Union,
        _ => return None,
    })
}

/// `CanCastTypes`: integer/array(pointer)/function types are freely
/// intercastable with one another; every other category must match the
/// same variant and be equivalent.
pub fn can_cast_types(arena: &NodeArena, symbols: &SymbolTable, scope: ScopeId, from: NodeIndex, to: NodeIndex) -> bool {
    let (Some(from_cat), Some(to_cat)) = (category(arena, symbols, scope, from), category(arena, symbols, scope, to)) else {
        return false;
    };
    let freely_castable = |c: TypeCategory| matches!(c, TypeCategory::Integer | TypeCategory::ArrayPointer | TypeCategory::Func);
    if freely_castable(from_cat) && freely_castable(to_cat) {
        return true;
    }
    from_cat == to_cat && compare_types_equiv(arena, symbols, scope, from, to)
}

/// `GetExpressionType`: total on checked expressions. Several cases
/// synthesize a fresh type node (a literal's own width, a string's array
/// type, `&e`'s pointer type, a compound initializer's inferred shape)
/// rather than pointing back at an existing declaration's type, mirroring
/// the source building one-off `ast`-equivalent type nodes for exactly
/// this purpose.
pub fn get_expression_type(arena: &mut NodeArena, symbols: &SymbolTable, scope: ScopeId, expr: NodeIndex) -> Result<NodeIndex, CheckError> {
    let span = arena.span(expr);
    match arena.kind(expr).clone() {
        NodeKind::NameExpr { name } => {
            let sym = symbols.lookup(scope, Namespace::Names, &name).ok_or_else(|| CheckError::new(span.start, format!("undeclared name '{name}'")))?;
            let ty = symbols.symbol(sym).kind.ty().ok_or_else(|| CheckError::new(span.start, format!("'{name}' does not name a typed value")))?;
            expand_type(arena, symbols, scope, ty).ok_or_else(|| CheckError::new(span.start, format!("'{name}' has an unresolvable type")))
        }
        NodeKind::IntExpr { width, .. } => Ok(arena.push(NodeKind::IntType { is_volatile: false, width }, span)),
        NodeKind::StrExpr { bytes } => {
            let inner = arena.push(NodeKind::IntType { is_volatile: false, width: IntWidth::Int }, span);
            let len = arena.push(NodeKind::IntExpr { width: IntWidth::Int, value: bytes.len() as u128 }, span);
            Ok(arena.push(NodeKind::ArrayType { is_volatile: false, inner, size: Some(len) }, span))
        }
        NodeKind::SzexprExpr { .. } | NodeKind::SztypeExpr { .. } => Ok(arena.push(NodeKind::IntType { is_volatile: false, width: IntWidth::Long }, span)),
        NodeKind::CallExpr { func, .. } => {
            let func_ty = get_expression_type(arena, symbols, scope, func)?;
            let return_type = match arena.kind(func_ty) {
                NodeKind::FuncType { return_type, .. } => *return_type,
                _ => return Err(CheckError::new(span.start, "call target is not a function")),
            };
            expand_type(arena, symbols, scope, return_type).ok_or_else(|| CheckError::new(span.start, "call target's return type is unresolvable"))
        }
        NodeKind::IndexExpr { array, .. } => {
            let array_ty = get_expression_type(arena, symbols, scope, array)?;
            match arena.kind(array_ty) {
                NodeKind::ArrayType { inner, .. } => Ok(*inner),
                _ => Err(CheckError::new(span.start, "indexed expression is not an array")),
            }
        }
        NodeKind::AccessExpr { record, member } => {
            let record_ty = get_expression_type(arena, symbols, scope, record)?;
            match arena.kind(record_ty) {
                NodeKind::StructType { members, .. } | NodeKind::UnionType { members, .. } => members
                    .iter()
                    .find(|m| m.name == member)
                    .map(|m| m.ty)
                    .ok_or_else(|| CheckError::new(span.start, format!("no member named '{member}'"))),
                _ => Err(CheckError::new(span.start, "accessed expression is not a struct or union")),
            }
        }
        NodeKind::CastExpr { cast_type, .. } => {
            expand_type(arena, symbols, scope, cast_type).ok_or_else(|| CheckError::new(span.start, "cast target type is unresolvable"))
        }
        NodeKind::DerefExpr { pointer } => {
            let pointer_ty = get_expression_type(arena, symbols, scope, pointer)?;
            match arena.kind(pointer_ty) {
                NodeKind::ArrayType { inner, .. } => Ok(*inner),
                _ => Err(CheckError::new(span.start, "dereferenced expression is not a pointer")),
            }
        }
        NodeKind::AddrOfExpr { expr: inner } => {
            let inner_ty = get_expression_type(arena, symbols, scope, inner)?;
            Ok(arena.push(NodeKind::ArrayType { is_volatile: false, inner: inner_ty, size: None }, span))
        }
        NodeKind::UnaryExpr { expr: inner, .. } => get_expression_type(arena, symbols, scope, inner),
        NodeKind::BinaryExpr { left, .. } => get_expression_type(arena, symbols, scope, left),
        NodeKind::UnaryCondExpr { .. } | NodeKind::BinaryCondExpr { .. } => Ok(arena.push(NodeKind::IntType { is_volatile: false, width: IntWidth::Int }, span)),
        NodeKind::TernaryExpr { then_branch, .. } => get_expression_type(arena, symbols, scope, then_branch),
        NodeKind::AssignExpr { lhs, .. } => get_expression_type(arena, symbols, scope, lhs),
        NodeKind::CommaExpr { exprs } => {
            let last = *exprs.last().ok_or_else(|| CheckError::new(span.start, "empty comma expression"))?;
            get_expression_type(arena, symbols, scope, last)
        }
        NodeKind::ComplexExpr(ComplexExprKind::Array(elements)) => {
            let first = *elements.first().ok_or_else(|| CheckError::new(span.start, "empty array initializer"))?;
            let inner = get_expression_type(arena, symbols, scope, first)?;
            let len = arena.push(NodeKind::IntExpr { width: IntWidth::Int, value: elements.len() as u128 }, span);
            Ok(arena.push(NodeKind::ArrayType { is_volatile: false, inner, size: Some(len) }, span))
        }
        NodeKind::ComplexExpr(ComplexExprKind::Str(bytes)) => {
            let inner = arena.push(NodeKind::IntType { is_volatile: false, width: IntWidth::Int }, span);
            let len = arena.push(NodeKind::IntExpr { width: IntWidth::Int, value: bytes.len() as u128 }, span);
            Ok(arena.push(NodeKind::ArrayType { is_volatile: false, inner, size: Some(len) }, span))
        }
        NodeKind::ComplexExpr(ComplexExprKind::Struct(fields)) => {
            let mut members = Vec::with_capacity(fields.len());
            for (name, value) in &fields {
                let ty = get_expression_type(arena, symbols, scope, *value)?;
                members.push(ns_parser::MemberData { name: name.clone(), ty, bits: None });
            }
            Ok(arena.push(NodeKind::StructType { is_volatile: false, members }, span))
        }
        other => Err(CheckError::new(span.start, format!("expression has no checkable type: {other:?}"))),
    }
}

/// Constant per §4.4: integer/string literals, `szexpr`/`sztype`; a cast,
/// unary, conditional-unary, binary, conditional-binary, ternary, or comma
/// expression is constant iff its operands are; a name is constant iff it
/// resolves to a `ConstSymbol`.
pub fn is_constant_expr(arena: &NodeArena, symbols: &SymbolTable, scope: ScopeId, expr: NodeIndex) -> bool {
    match arena.kind(expr) {
        NodeKind::IntExpr { .. } | NodeKind::StrExpr { .. } | NodeKind::SzexprExpr { .. } | NodeKind::SztypeExpr { .. } => true,
        NodeKind::NameExpr { name } => symbols
            .lookup(scope, Namespace::Names, name)
            .is_some_and(|sym| matches!(symbols.symbol(sym).kind, SymbolKind::Const { .. })),
        NodeKind::CastExpr { expr: inner, .. } | NodeKind::UnaryExpr { expr: inner, .. } | NodeKind::UnaryCondExpr { expr: inner, .. } => {
            is_constant_expr(arena, symbols, scope, *inner)
        }
        NodeKind::BinaryExpr { left, right, .. } => is_constant_expr(arena, symbols, scope, *left) && is_constant_expr(arena, symbols, scope, *right),
        NodeKind::BinaryCondExpr { left, right, .. } => is_constant_expr(arena, symbols, scope, *left) && is_constant_expr(arena, symbols, scope, *right),
        NodeKind::TernaryExpr { cond, then_branch, else_branch } => {
            is_constant_expr(arena, symbols, scope, *cond) && is_constant_expr(arena, symbols, scope, *then_branch) && is_constant_expr(arena, symbols, scope, *else_branch)
        }
        NodeKind::CommaExpr { exprs } => exprs.iter().all(|e| is_constant_expr(arena, symbols, scope, *e)),
        _ => false,
    }
}

/// Lvalue per §4.4: `Index`, `Access`, `Deref`, `Assign`, and a `Name`
/// bound to a `VarSymbol`; a `Ternary` is an lvalue iff both branches are.
pub fn is_lvalue_expr(arena: &NodeArena, symbols: &SymbolTable, scope: ScopeId, expr: NodeIndex) -> bool {
    match arena.kind(expr) {
        NodeKind::IndexExpr { .. } | NodeKind::AccessExpr { .. } | NodeKind::DerefExpr { .. } | NodeKind::AssignExpr { .. } => true,
        NodeKind::NameExpr { name } => symbols
            .lookup(scope, Namespace::Names, name)
            .is_some_and(|sym| matches!(symbols.symbol(sym).kind, SymbolKind::Var { .. })),
        NodeKind::TernaryExpr { then_branch, else_branch, .. } => {
            is_lvalue_expr(arena, symbols, scope, *then_branch) && is_lvalue_expr(arena, symbols, scope, *else_branch)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_common::config::Config;
    use ns_common::diagnostics::Diagnostics;
    use ns_parser::parse_module;
    use ns_symbols::build_symbols;

    fn build(source: &str) -> (NodeArena, NodeIndex, SymbolTable) {
        let mut diags = Diagnostics::new();
        let (mut arena, root) = parse_module(source, Config::default(), &mut diags).expect("parse ok");
        let table = build_symbols(&mut arena, root, &mut diags).expect("build ok");
        (arena, root, table)
    }

    #[test]
    fn ref_type_expands_through_a_typedef_chain() {
        let (arena, root, table) = build("using a := int;\nusing b := a;\nset x: b := 1;\n");
        let module = table.root.unwrap();
        let decls = match arena.kind(root) {
            NodeKind::Module { decls } => decls.clone(),
            _ => unreachable!(),
        };
        let const_decl = decls[2];
        let ty = match arena.kind(const_decl) {
            NodeKind::ConstDecl { ty, .. } => *ty,
            _ => unreachable!(),
        };
        let expanded = expand_type(&arena, &table, module, ty).unwrap();
        assert!(matches!(arena.kind(expanded), NodeKind::IntType { .. }));
    }

    #[test]
    fn equivalent_types_compare_equal_through_different_typedef_names() {
        let (arena, root, table) = build("using a := int;\nusing b := int;\nset x: a := 1;\nset y: b := 2;\n");
        let module = table.root.unwrap();
        let decls = match arena.kind(root) {
            NodeKind::Module { decls } => decls.clone(),
            _ => unreachable!(),
        };
        let ty_a = match arena.kind(decls[2]) {
            NodeKind::ConstDecl { ty, .. } => *ty,
            _ => unreachable!(),
        };
        let ty_b = match arena.kind(decls[3]) {
            NodeKind::ConstDecl { ty, .. } => *ty,
            _ => unreachable!(),
        };
        assert!(compare_types_equiv(&arena, &table, module, ty_a, ty_b));
        assert!(!compare_types_eq(&arena, ty_a, ty_b));
    }

    #[test]
    fn integer_and_pointer_types_freely_intercast() {
        let mut arena = NodeArena::new();
        let mut table = SymbolTable::new();
        let scope = table.new_scope(ns_symbols::ScopeKind::Module, None);
        let int_ty = arena.push(NodeKind::IntType { is_volatile: false, width: IntWidth::Int }, Span::dummy());
        let ptr_inner = arena.push(NodeKind::IntType { is_volatile: false, width: IntWidth::Int }, Span::dummy());
        let ptr_ty = arena.push(NodeKind::ArrayType { is_volatile: false, inner: ptr_inner, size: None }, Span::dummy());
        assert!(can_cast_types(&arena, &table, scope, int_ty, ptr_ty));
    }

    #[test]
    fn name_expr_is_constant_only_when_bound_to_a_const_symbol() {
        let (arena, root, table) = build("set k: int := 1;\nlet v: int := 2;\n");
        let module = table.root.unwrap();
        let decls = match arena.kind(root) {
            NodeKind::Module { decls } => decls.clone(),
            _ => unreachable!(),
        };
        let k_name = match arena.kind(decls[0]) {
            NodeKind::ConstDecl { name, .. } => arena.push(NodeKind::NameExpr { name: name.clone() }, Span::dummy()),
            _ => unreachable!(),
        };
        let v_name = match arena.kind(decls[1]) {
            NodeKind::VarDecl { name, .. } => arena.push(NodeKind::NameExpr { name: name.clone() }, Span::dummy()),
            _ => unreachable!(),
        };
        assert!(is_constant_expr(&arena, &table, module, k_name));
        assert!(!is_constant_expr(&arena, &table, module, v_name));
    }
}
