//! Two-pass symbol-table construction: resolves names, types, and labels
//! across nested scopes, and attaches `symref`/`scoperef` back-pointers to
//! the AST the parser already built.

pub mod builder;
pub mod error;
pub mod symbol;
pub mod types_eq;

pub use builder::build_symbols;
pub use error::BuildError;
pub use symbol::{Namespace, Scope, ScopeKind, SymbolKind, SymbolRecord, SymbolTable};
pub use ns_common::{ScopeId, SymbolId};

#[cfg(test)]
mod tests {
    use super::*;
    use ns_common::config::Config;
    use ns_common::diagnostics::Diagnostics;
    use ns_parser::{parse_module, NodeKind};

    fn build(source: &str) -> (ns_parser::NodeArena, ns_parser::NodeIndex, SymbolTable, Diagnostics) {
        let mut diags = Diagnostics::new();
        let (mut arena, root) = parse_module(source, Config::default(), &mut diags).expect("parse ok");
        let table = build_symbols(&mut arena, root, &mut diags).expect("build ok");
        (arena, root, table, diags)
    }

    #[test]
    fn const_decl_resolves_to_a_const_symbol() {
        let (arena, root, table, _diags) = build("set x: int := 2 + 3;\n");
        let decls = match arena.kind(root) {
            NodeKind::Module { decls } => decls.clone(),
            _ => unreachable!(),
        };
        assert_eq!(decls.len(), 1);
        let sym_id = arena.symref(decls[0]).expect("ConstDecl gets a symref");
        match &table.symbol(sym_id).kind {
            SymbolKind::Const { name, is_static, .. } => {
                assert_eq!(name, "x");
                assert!(!is_static);
            }
            other => panic!("expected ConstSymbol, got {other:?}"),
        }
    }

    #[test]
    fn mutual_recursion_resolves_via_the_global_pass() {
        let source = "func a() -> (int) { return b(); }\nfunc b() -> (int) { return a(); }\n";
        let (_arena, _root, _table, diags) = build(source);
        assert!(diags.success());
    }

    #[test]
    fn use_before_decl_in_a_forward_reference_free_program_is_fatal() {
        let mut diags = Diagnostics::new();
        let (mut arena, root) = parse_module("func f() -> (int) { return g; }\n", Config::default(), &mut diags).unwrap();
        let err = build_symbols(&mut arena, root, &mut diags);
        assert!(err.is_err());
        assert!(!diags.success());
    }

    #[test]
    fn local_set_declaration_is_registered_and_resolvable() {
        let source = "func f() -> (int) { set k: int := 5; return k; }\n";
        let (_arena, _root, _table, diags) = build(source);
        assert!(diags.success());
    }

    #[test]
    fn nested_labeled_loop_registers_the_outer_label() {
        let source = "func f() -> (int) { outer: while (1) { while (1) { break outer; } } return 0; }\n";
        let (arena, root, table, diags) = build(source);
        assert!(diags.success());
        let func_decl = match arena.kind(root) {
            NodeKind::Module { decls } => decls[0],
            _ => unreachable!(),
        };
        let body = match arena.kind(func_decl) {
            NodeKind::FuncDecl { body, .. } => body.unwrap(),
            _ => unreachable!(),
        };
        let outer_if = match arena.kind(body) {
            NodeKind::CompoundStmt { stmts } => stmts[0],
            _ => unreachable!(),
        };
        let label_sym = arena.symref(outer_if).expect("labeled loop gets a symref");
        assert!(matches!(&table.symbol(label_sym).kind, SymbolKind::Label { name } if name == "outer"));
    }

    #[test]
    fn redeclaring_a_static_function_with_a_matching_prototype_is_fine() {
        let source = "static func f() -> (int);\nstatic func f() -> (int) { return 0; }\n";
        let (_arena, _root, _table, diags) = build(source);
        assert!(diags.success());
    }

    #[test]
    fn redeclaring_a_function_with_a_different_signature_errors() {
        let source = "static func f() -> (int);\nstatic func f() -> (long) { return 0l; }\n";
        let (_arena, _root, _table, diags) = build(source);
        assert!(!diags.success());
    }
}
