//! The scope tree and symbol arena.
//!
//! Scopes and symbols are each stored in one flat `Vec`, addressed by the
//! `ScopeId`/`SymbolId` handles `ns-common` already defines for exactly this
//! purpose (kept there rather than here so `ns-parser`'s AST can carry a
//! `symref`/`scoperef` back-pointer without `ns-parser` depending on
//! `ns-symbols`). A scope owns three disjoint, insertion-ordered namespaces
//! (names, types, labels), matching the source's per-scope dict triple.

use indexmap::IndexMap;
use ns_common::{ScopeId, SymbolId};
use ns_parser::NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Func,
    Block,
}

/// Which of a scope's three disjoint namespaces a lookup walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Names,
    Types,
    Labels,
}

pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    names: IndexMap<String, SymbolId>,
    types: IndexMap<String, SymbolId>,
    labels: IndexMap<String, SymbolId>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self { kind, parent, names: IndexMap::new(), types: IndexMap::new(), labels: IndexMap::new() }
    }

    fn namespace(&self, ns: Namespace) -> &IndexMap<String, SymbolId> {
        match ns {
            Namespace::Names => &self.names,
            Namespace::Types => &self.types,
            Namespace::Labels => &self.labels,
        }
    }

    fn namespace_mut(&mut self, ns: Namespace) -> &mut IndexMap<String, SymbolId> {
        match ns {
            Namespace::Names => &mut self.names,
            Namespace::Types => &mut self.types,
            Namespace::Labels => &mut self.labels,
        }
    }

    /// The symbol already bound to `name` in this scope alone, ignoring
    /// parents. Used by the redeclaration checks, which are always
    /// same-scope (`localonly` in the source).
    pub fn local(&self, ns: Namespace, name: &str) -> Option<SymbolId> {
        self.namespace(ns).get(name).copied()
    }
}

/// One binding. `VarSymbol`/`ConstSymbol`/`ParamSymbol`/`FuncSymbol`/
/// `TypeSymbol`/`LabelSymbol` from the data model, flattened into a single
/// tagged enum since every kind shares an owning scope, a `referenced`
/// flag, and a declaration node — tracked once on `SymbolRecord` rather
/// than duplicated per variant.
#[derive(Debug, Clone)]
pub enum SymbolKind {
    Var { name: String, ty: NodeIndex, is_static: bool },
    Const { name: String, ty: NodeIndex, is_static: bool },
    Param { name: String, ty: NodeIndex },
    Func { name: String, ty: NodeIndex, is_static: bool, is_inline: bool, functable: Option<ScopeId> },
    Type { name: String, ty: NodeIndex },
    /// `decl` (on `SymbolRecord`) points at the labeled `IfStmt`/`IterStmt`
    /// node itself; there is no separate type payload.
    Label { name: String },
}

impl SymbolKind {
    pub fn name(&self) -> &str {
        match self {
            SymbolKind::Var { name, .. }
            | SymbolKind::Const { name, .. }
            | SymbolKind::Param { name, .. }
            | SymbolKind::Func { name, .. }
            | SymbolKind::Type { name, .. }
            | SymbolKind::Label { name } => name,
        }
    }

    pub fn ty(&self) -> Option<NodeIndex> {
        match self {
            SymbolKind::Var { ty, .. }
            | SymbolKind::Const { ty, .. }
            | SymbolKind::Param { ty, .. }
            | SymbolKind::Func { ty, .. }
            | SymbolKind::Type { ty, .. } => Some(*ty),
            SymbolKind::Label { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SymbolRecord {
    pub kind: SymbolKind,
    pub owner: ScopeId,
    /// The declaration (or, for a `LabelSymbol`, the labeled statement)
    /// that introduced this binding.
    pub decl: NodeIndex,
    /// Raised by any successful lookup of this symbol, mirroring the
    /// source's `referenced` bookkeeping (used by unused-symbol
    /// diagnostics downstream; this crate only maintains the flag).
    pub referenced: bool,
}

/// Owns the whole scope tree plus every symbol bound anywhere in it.
/// Built once by `Builder::build`, read-only afterwards (per the Lifecycle
/// note in the data model).
#[derive(Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<SymbolRecord>,
    pub root: Option<ScopeId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { scopes: Vec::new(), symbols: Vec::new(), root: None }
    }

    pub fn new_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId::new(self.scopes.len() as u32);
        self.scopes.push(Scope::new(kind, parent));
        if parent.is_none() {
            debug_assert!(self.root.is_none(), "only the module scope has no parent");
            self.root = Some(id);
        }
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn symbol(&self, id: SymbolId) -> &SymbolRecord {
        &self.symbols[id.index()]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut SymbolRecord {
        &mut self.symbols[id.index()]
    }

    /// Binds `kind` in `scope`'s namespace and returns the new id. Callers
    /// are responsible for the redeclaration policy (§4.3) before calling
    /// this — it never overwrites, only appends, since a permitted
    /// redeclaration (e.g. a second `static` prototype) still wants its own
    /// `SymbolId` sharing the same namespace slot name.
    pub fn declare(&mut self, scope: ScopeId, ns: Namespace, kind: SymbolKind, decl: NodeIndex) -> SymbolId {
        let name = kind.name().to_string();
        let id = SymbolId::new(self.symbols.len() as u32);
        self.symbols.push(SymbolRecord { kind, owner: scope, decl, referenced: false });
        self.scope_mut(scope).namespace_mut(ns).insert(name, id);
        id
    }

    /// Outward lookup starting at `scope`, walking through parents until
    /// found or the module scope's parent-less root is exhausted.
    pub fn lookup(&self, scope: ScopeId, ns: Namespace, name: &str) -> Option<SymbolId> {
        let mut cursor = Some(scope);
        while let Some(current) = cursor {
            if let Some(id) = self.scope(current).local(ns, name) {
                return Some(id);
            }
            cursor = self.scope(current).parent;
        }
        None
    }

    /// The `localonly` lookup mode: current scope only, used to detect
    /// redeclaration.
    pub fn lookup_local(&self, scope: ScopeId, ns: Namespace, name: &str) -> Option<SymbolId> {
        self.scope(scope).local(ns, name)
    }

    /// Marks `id` as referenced; called by every successful `lookup` at the
    /// use site (the builder does this for `NameExpr`, the checker for
    /// `RefType` and label uses).
    pub fn mark_referenced(&mut self, id: SymbolId) {
        self.symbol_mut(id).referenced = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_parser::{NodeArena, NodeKind};
    use ns_common::span::Span;

    fn dummy_node(arena: &mut NodeArena) -> NodeIndex {
        arena.push(NodeKind::EmptyStmt, Span::dummy())
    }

    #[test]
    fn lookup_walks_outward_through_parents() {
        let mut arena = NodeArena::new();
        let decl = dummy_node(&mut arena);
        let mut table = SymbolTable::new();
        let module = table.new_scope(ScopeKind::Module, None);
        let block = table.new_scope(ScopeKind::Block, Some(module));

        let sym = table.declare(module, Namespace::Names, SymbolKind::Var { name: "x".into(), ty: decl, is_static: false }, decl);
        assert_eq!(table.lookup(block, Namespace::Names, "x"), Some(sym));
        assert_eq!(table.lookup_local(block, Namespace::Names, "x"), None);
    }

    #[test]
    fn namespaces_are_disjoint() {
        let mut arena = NodeArena::new();
        let decl = dummy_node(&mut arena);
        let mut table = SymbolTable::new();
        let module = table.new_scope(ScopeKind::Module, None);
        table.declare(module, Namespace::Types, SymbolKind::Type { name: "t".into(), ty: decl }, decl);
        assert_eq!(table.lookup(module, Namespace::Names, "t"), None);
        assert!(table.lookup(module, Namespace::Types, "t").is_some());
    }
}
