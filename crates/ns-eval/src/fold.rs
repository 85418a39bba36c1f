//! The expression-simplification half of the evaluator contract.
//!
//! The source's `ExprSimplifier` is a stub with a single `TODO`; nothing in
//! the corpus ever folds anything beyond an already-literal integer. Rather
//! than invent a constant-folding pass the source never had, this crate
//! exposes that capability as a trait, so a later implementation can widen
//! it (binary arithmetic on two literals, unary negation, `szexpr`) without
//! the checker needing to change how it asks for a folded value.

use ns_parser::{NodeArena, NodeIndex, NodeKind};

/// Attempts to reduce `expr` to a single integer value. Implementations are
/// free to recognize more shapes than a bare literal; callers must not
/// assume any folding beyond that happens.
pub trait ConstFolder {
    fn fold(&self, arena: &NodeArena, expr: NodeIndex) -> Option<u128>;
}

/// The one conforming implementation: recognizes `IntExpr` and nothing
/// else, matching `ExprSimplifier`'s actual (stub) behavior.
pub struct LiteralFolder;

impl ConstFolder for LiteralFolder {
    fn fold(&self, arena: &NodeArena, expr: NodeIndex) -> Option<u128> {
        match arena.kind(expr) {
            NodeKind::IntExpr { value, .. } => Some(*value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_common::span::Span;
    use ns_common::config::IntWidth;

    #[test]
    fn folds_an_integer_literal() {
        let mut arena = NodeArena::new();
        let expr = arena.push(NodeKind::IntExpr { width: IntWidth::Int, value: 7 }, Span::dummy());
        assert_eq!(LiteralFolder.fold(&arena, expr), Some(7));
    }

    #[test]
    fn does_not_fold_a_name_reference() {
        let mut arena = NodeArena::new();
        let expr = arena.push(NodeKind::NameExpr { name: "x".into() }, Span::dummy());
        assert_eq!(LiteralFolder.fold(&arena, expr), None);
    }

    #[test]
    fn does_not_fold_a_binary_expression_of_two_literals() {
        use ns_parser::BinOp;
        let mut arena = NodeArena::new();
        let lhs = arena.push(NodeKind::IntExpr { width: IntWidth::Int, value: 2 }, Span::dummy());
        let rhs = arena.push(NodeKind::IntExpr { width: IntWidth::Int, value: 3 }, Span::dummy());
        let expr = arena.push(NodeKind::BinaryExpr { left: lhs, op: BinOp::Add, right: rhs }, Span::dummy());
        assert_eq!(LiteralFolder.fold(&arena, expr), None);
    }
}
