//! The AST-to-assembly boundary. Register allocation, stack layout, and
//! instruction selection for Mercury are out of scope (§4.6); this crate
//! specifies the interface a real back end would implement and supplies one
//! conforming implementation that proves the interface is sufficient to
//! walk the checked AST, without emitting anything a real Mercury assembler
//! would accept.

use ns_parser::{NodeArena, NodeIndex, NodeKind};
use ns_symbols::SymbolTable;

/// Mirrors the source driver's own use of the generator: `visit` walks the
/// checked AST and accumulates internal state, `success` reports whether
/// that walk completed without the generator itself giving up, and
/// `to_assembly` serializes whatever was accumulated into output lines.
pub trait CodeGenerator {
    fn visit(&mut self, arena: &NodeArena, symbols: &SymbolTable, root: NodeIndex);
    fn success(&self) -> bool;
    fn to_assembly(&self) -> Vec<String>;
}

/// Walks every top-level declaration and records a one-line placeholder
/// comment per declaration. Performs no register allocation, stack layout,
/// or instruction selection — those are this crate's explicit Non-goal —
/// but the walk itself is real, so a future back end can replace the body
/// of `visit_decl` without touching the trait boundary.
#[derive(Debug, Default)]
pub struct NullGenerator {
    lines: Vec<String>,
}

impl NullGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn visit_decl(&mut self, arena: &NodeArena, decl: NodeIndex) {
        let line = match arena.kind(decl) {
            NodeKind::VarDecl { name, .. } => format!("; var {name}"),
            NodeKind::ConstDecl { name, .. } => format!("; const {name}"),
            NodeKind::FuncDecl { name, body, .. } => {
                if body.is_some() {
                    format!("; func {name}")
                } else {
                    format!("; extern func {name}")
                }
            }
            NodeKind::TypeDecl { name, .. } => format!("; type {name}"),
            other => format!("; unhandled top-level node: {other:?}"),
        };
        self.lines.push(line);
    }
}

impl CodeGenerator for NullGenerator {
    fn visit(&mut self, arena: &NodeArena, _symbols: &SymbolTable, root: NodeIndex) {
        let _span = tracing::debug_span!("codegen").entered();
        let decls = match arena.kind(root) {
            NodeKind::Module { decls } => decls.clone(),
            _ => return,
        };
        for decl in decls {
            self.visit_decl(arena, decl);
        }
    }

    fn success(&self) -> bool {
        true
    }

    fn to_assembly(&self) -> Vec<String> {
        self.lines.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_common::config::Config;
    use ns_common::diagnostics::Diagnostics;
    use ns_parser::parse_module;
    use ns_symbols::build_symbols;

    #[test]
    fn emits_one_placeholder_line_per_top_level_declaration() {
        let mut diags = Diagnostics::new();
        let (mut arena, root) = parse_module("set x: int := 1;\nfunc f() -> (int) { return x; }\n", Config::default(), &mut diags).unwrap();
        let table = build_symbols(&mut arena, root, &mut diags).unwrap();

        let mut gen = NullGenerator::new();
        gen.visit(&arena, &table, root);
        assert!(gen.success());
        assert_eq!(gen.to_assembly(), vec!["; const x".to_string(), "; func f".to_string()]);
    }
}
