//! Raw structural type comparison, used only for the redeclaration checks
//! in §4.3 ("type match exactly").
//!
//! This is deliberately *not* the checker's `CompareTypesEq`/
//! `CompareTypesEquiv` (those live in `ns-checker` and expand `RefType`
//! through the type namespace, which requires a fully built symbol table
//! to even attempt). The builder runs before that table exists, so a
//! second prototype's type is compared against the first's by shape alone
//! — two `RefType`s compare equal only if they name the same identifier,
//! with no attempt to resolve what that identifier means.

use ns_parser::{NodeArena, NodeIndex, NodeKind};

pub fn types_match(arena: &NodeArena, a: NodeIndex, b: NodeIndex) -> bool {
    match (arena.kind(a), arena.kind(b)) {
        (NodeKind::VoidType { is_volatile: va }, NodeKind::VoidType { is_volatile: vb }) => va == vb,
        (NodeKind::RefType { is_volatile: va, name: na }, NodeKind::RefType { is_volatile: vb, name: nb }) => {
            va == vb && na == nb
        }
        (NodeKind::IntType { is_volatile: va, width: wa }, NodeKind::IntType { is_volatile: vb, width: wb }) => {
            va == vb && wa == wb
        }
        (
            NodeKind::ArrayType { is_volatile: va, inner: ia, size: sa },
            NodeKind::ArrayType { is_volatile: vb, inner: ib, size: sb },
        ) => {
            va == vb
                && types_match(arena, *ia, *ib)
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
                && types_match(arena, *ra, *rb)
                && pa.len() == pb.len()
                && pa.iter().zip(pb.iter()).all(|(x, y)| types_match(arena, *x, *y))
        }
        (NodeKind::StructType { is_volatile: va, members: ma }, NodeKind::StructType { is_volatile: vb, members: mb })
        | (NodeKind::UnionType { is_volatile: va, members: ma }, NodeKind::UnionType { is_volatile: vb, members: mb }) => {
            va == vb
                && ma.len() == mb.len()
                && ma.iter().zip(mb.iter()).all(|(x, y)| {
                    x.name == y.name && x.bits == y.bits && types_match(arena, x.ty, y.ty)
                })
        }
        _ => false,
    }
}

/// Only literal integer size expressions are supported for array-size
/// comparison at this stage; anything else (a `NameExpr` referring to a
/// not-yet-checked `const`) is treated as non-matching rather than
/// evaluated, since constant folding is `ns-eval`'s job and hasn't run yet.
fn int_literal_value(arena: &NodeArena, node: NodeIndex) -> Option<u128> {
    match arena.kind(node) {
        NodeKind::IntExpr { value, .. } => Some(*value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_common::config::IntWidth;
    use ns_common::span::Span;

    #[test]
    fn identical_int_types_match() {
        let mut arena = NodeArena::new();
        let a = arena.push(NodeKind::IntType { is_volatile: false, width: IntWidth::Int }, Span::dummy());
        let b = arena.push(NodeKind::IntType { is_volatile: false, width: IntWidth::Int }, Span::dummy());
        assert!(types_match(&arena, a, b));
    }

    #[test]
    fn differing_ref_names_do_not_match() {
        let mut arena = NodeArena::new();
        let a = arena.push(NodeKind::RefType { is_volatile: false, name: "Foo".into() }, Span::dummy());
        let b = arena.push(NodeKind::RefType { is_volatile: false, name: "Bar".into() }, Span::dummy());
        assert!(!types_match(&arena, a, b));
    }
}
