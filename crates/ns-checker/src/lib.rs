//! The semantic checker: Pass A validates type declarations and their
//! transitive references, Pass B walks every declaration, statement, and
//! expression, inferring types via `GetExpressionType` and enforcing the
//! constness/lvalue/cast-legality rules against them.

pub mod checker;
pub mod error;
pub mod types;

pub use checker::check_module;
pub use error::CheckError;
pub use types::{can_cast_types, category, compare_types_eq, compare_types_equiv, expand_type, get_expression_type, is_constant_expr, is_lvalue_expr, TypeCategory};

#[cfg(test)]
mod tests {
    use super::*;
    use ns_common::config::Config;
    use ns_common::diagnostics::Diagnostics;
    use ns_parser::parse_module;
    use ns_symbols::build_symbols;

    fn check(source: &str) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let config = Config::default();
        let (mut arena, root) = parse_module(source, config, &mut diags).expect("parse ok");
        let mut table = build_symbols(&mut arena, root, &mut diags).expect("build ok");
        check_module(&mut arena, &mut table, &config, root, &mut diags).expect("check ok");
        diags
    }

    #[test]
    fn a_well_typed_function_checks_clean() {
        let diags = check("func add(a: int, b: int) -> (int) { return a + b; }\n");
        assert!(diags.success(), "{:?}", diags.records());
    }

    #[test]
    fn returning_the_wrong_type_is_an_error() {
        let diags = check("func f() -> (int) { return 1q; }\n");
        assert!(!diags.success());
    }

    #[test]
    fn a_void_function_cannot_return_a_value() {
        let diags = check("func f() -> (void) { return 1; }\n");
        assert!(!diags.success());
    }

    #[test]
    fn calling_with_the_wrong_argument_count_is_an_error() {
        let diags = check("func f(a: int) -> (int) { return a; }\nfunc g() -> (int) { return f(); }\n");
        assert!(!diags.success());
    }

    #[test]
    fn accessing_a_missing_struct_member_is_an_error() {
        let source = "struct point { x: int, y: int };\nfunc f() -> (int) { let p: point; return p.z; }\n";
        let diags = check(source);
        assert!(!diags.success());
    }

    #[test]
    fn accessing_an_existing_struct_member_checks_clean() {
        let source = "struct point { x: int, y: int };\nfunc f() -> (int) { let p: point; return p.x; }\n";
        let diags = check(source);
        assert!(diags.success(), "{:?}", diags.records());
    }

    #[test]
    fn assigning_through_a_non_lvalue_is_an_error() {
        let diags = check("func f() -> (int) { 1 := 2; return 0; }\n");
        assert!(!diags.success());
    }

    #[test]
    fn a_circular_typedef_is_rejected() {
        let diags = check("using a := b;\nusing b := a;\n");
        assert!(!diags.success());
    }

    #[test]
    fn a_using_typedef_resolves_to_its_target_type() {
        let source = "using size_t := long;\nfunc f() -> (int) { let n: size_t := 1l; return 0; }\n";
        let diags = check(source);
        assert!(diags.success(), "{:?}", diags.records());
    }

    #[test]
    fn a_struct_typedef_via_using_checks_clean() {
        let source = "using point := struct { x: int, y: int };\nfunc f() -> (int) { let p: point; return p.x; }\n";
        let diags = check(source);
        assert!(diags.success(), "{:?}", diags.records());
    }

    #[test]
    fn void_is_rejected_outside_a_pointer_or_return_type() {
        let diags = check("set x: void := 1;\n");
        assert!(!diags.success());
    }

    #[test]
    fn a_void_pointer_is_permitted_as_a_parameter_type() {
        let diags = check("func f(p: *void) -> (int) { return 0; }\n");
        assert!(diags.success(), "{:?}", diags.records());
    }

    #[test]
    fn mismatched_binary_widths_widen_without_an_error() {
        let diags = check("func f() -> (int) { let a: int := 1; let b: long := 2l; return a + b; }\n");
        assert!(diags.success(), "{:?}", diags.records());
    }

    #[test]
    fn array_initializer_patches_an_unsized_declared_array() {
        let diags = check("let xs: []int := {1, 2, 3};\n");
        assert!(diags.success(), "{:?}", diags.records());
    }
}
