//! The constant-expression evaluator contract.
//!
//! Two independent pieces, kept separate because the source keeps them
//! separate: `get_type_size` (real, load-bearing logic the checker and code
//! generator both depend on) and the `ConstFolder` trait (standing in for
//! the source's unfinished `ExprSimplifier`).

pub mod error;
pub mod fold;
pub mod size;

pub use error::EvalError;
pub use fold::{ConstFolder, LiteralFolder};
pub use size::get_type_size;

#[cfg(test)]
mod tests {
    use super::*;
    use ns_common::config::Config;
    use ns_common::diagnostics::Diagnostics;
    use ns_parser::parse_module;
    use ns_symbols::{build_symbols, Namespace, ScopeKind, SymbolKind, SymbolTable};

    #[test]
    fn ref_type_recurses_through_a_type_declaration() {
        let mut diags = Diagnostics::new();
        let config = Config::default();
        let source = "using celsius := int;\nset c: celsius := 5;\n";
        let (mut arena, root) = parse_module(source, config, &mut diags).expect("parse ok");
        let table = build_symbols(&mut arena, root, &mut diags).expect("build ok");
        let module = table.root.expect("module scope exists");

        let sym = table.lookup(module, Namespace::Types, "celsius").expect("celsius is declared");
        let ty = match &table.symbol(sym).kind {
            SymbolKind::Type { ty, .. } => *ty,
            other => panic!("expected a type symbol, got {other:?}"),
        };
        assert_eq!(get_type_size(&arena, &table, module, &config, ty, true).unwrap(), config.int_size(ns_common::config::IntWidth::Int));
    }

    #[test]
    fn unknown_ref_type_reports_the_missing_name() {
        use ns_common::span::Span;
        use ns_parser::NodeKind;
        let mut arena = ns_parser::NodeArena::new();
        let mut table = SymbolTable::new();
        let scope = table.new_scope(ScopeKind::Module, None);
        let config = Config::default();
        let ty = arena.push(NodeKind::RefType { is_volatile: false, name: "missing".into() }, Span::dummy());

        let err = get_type_size(&arena, &table, scope, &config, ty, true).unwrap_err();
        assert!(matches!(err, EvalError::UnknownType { name, .. } if name == "missing"));
    }
}
