//! Symbol table: the "symbol table" collaborator named in spec.md §1.
//!
//! Two namespaces (`ns_ident`, `ns_tag`), each a stack of scopes keyed by
//! name. `push_scope`/`pop_scope` are paired by an RAII `ScopeGuard` so the
//! scope-discipline invariant (spec.md §8 invariant 1) holds structurally:
//! forgetting to pop is a compile error (`#[must_use]`), not a runtime bug.

use std::collections::HashMap;
use std::fmt;

use crate::types::TypeId;

/// Arena index for a `Symbol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Declaration,
    Tentative,
    Definition,
    Typedef,
    EnumValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    None,
    Intern,
    Extern,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: TypeId,
    pub storage: StorageClass,
    pub linkage: Linkage,
    pub depth: u32,
    pub enum_value: Option<i64>,
    pub is_definition: bool,
}

/// Which namespace a lookup/insert targets. C keeps tags (struct/union/enum
/// names) in a separate namespace from ordinary identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceKind {
    Ident,
    Tag,
}

struct Scope {
    depth: u32,
    entries: HashMap<String, SymbolId>,
}

/// One namespace: an arena of symbols plus a stack of scopes mapping names
/// to the innermost active symbol.
pub struct Namespace {
    kind: NamespaceKind,
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
}

impl Namespace {
    fn new(kind: NamespaceKind) -> Self {
        Namespace {
            kind,
            symbols: Vec::new(),
            scopes: vec![Scope { depth: 0, entries: HashMap::new() }],
        }
    }

    pub fn kind(&self) -> NamespaceKind {
        self.kind
    }

    pub fn depth(&self) -> u32 {
        self.scopes.last().expect("namespace always has a scope").depth
    }

    fn push_scope(&mut self) {
        let depth = self.depth() + 1;
        self.scopes.push(Scope { depth, entries: HashMap::new() });
    }

    fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "pop_scope called with no pushed scope");
        self.scopes.pop();
    }

    /// `sym_add`: insert a new symbol into the innermost scope. Returns an
    /// error message if a symbol with the same name already exists in that
    /// same scope (duplicate definition) — the caller decides how to turn
    /// that into a `Diagnostic`.
    pub fn sym_add(&mut self, symbol: Symbol) -> Result<SymbolId, String> {
        let depth = self.depth();
        let name = symbol.name.clone();
        if self.scopes.last().unwrap().entries.contains_key(&name) {
            return Err(format!("'{}' is already defined in this scope", name));
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        self.scopes.last_mut().unwrap().entries.insert(name, id);
        debug_assert_eq!(self.get(id).depth, depth);
        Ok(id)
    }

    /// `sym_lookup`: innermost-scope-wins lookup by name.
    pub fn sym_lookup(&self, name: &str) -> Option<SymbolId> {
        for scope in self.scopes.iter().rev() {
            if let Some(&id) = scope.entries.get(name) {
                return Some(id);
            }
        }
        None
    }

    /// Lookup restricted to the innermost scope only, used to detect
    /// duplicate member/parameter names within a single declaration.
    pub fn lookup_current_scope(&self, name: &str) -> Option<SymbolId> {
        self.scopes.last().unwrap().entries.get(name).copied()
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    /// Every symbol ever added to this namespace, in allocation order,
    /// regardless of which scopes are currently open — used by the CLI's
    /// symbol dump.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

/// RAII guard returned by [`Scopes::push_scope`]. Dropping it pops both
/// namespaces, so every scope is released on every exit path — including
/// early returns via `?` — without the caller having to remember to call
/// `pop_scope` explicitly. Access the scopes through the guard itself (it
/// derefs to `Scopes`) rather than the original binding, the same way a
/// mutex guard stands in for the data it locked.
#[must_use = "dropping this guard pops the scope; bind it to a name, not `_`"]
pub struct ScopeGuard<'a> {
    scopes: &'a mut Scopes,
}

impl<'a> std::ops::Deref for ScopeGuard<'a> {
    type Target = Scopes;
    fn deref(&self) -> &Scopes {
        self.scopes
    }
}

impl<'a> std::ops::DerefMut for ScopeGuard<'a> {
    fn deref_mut(&mut self) -> &mut Scopes {
        self.scopes
    }
}

impl<'a> Drop for ScopeGuard<'a> {
    fn drop(&mut self) {
        self.scopes.ident.pop_scope();
        self.scopes.tag.pop_scope();
    }
}

/// Both namespaces together, since every C scope (block, parameter list,
/// member list) pushes/pops them in lockstep.
pub struct Scopes {
    pub ident: Namespace,
    pub tag: Namespace,
}

impl Scopes {
    pub fn new() -> Self {
        Scopes {
            ident: Namespace::new(NamespaceKind::Ident),
            tag: Namespace::new(NamespaceKind::Tag),
        }
    }

    /// Push a new depth onto both namespaces; the returned guard pops them
    /// again when it is dropped.
    pub fn push_scope(&mut self) -> ScopeGuard<'_> {
        self.push_scope_raw();
        ScopeGuard { scopes: self }
    }

    /// Push without a guard. Callers that need other `&mut self` access
    /// (e.g. recursive descent through further parser methods) while a
    /// scope is open can't hold a borrowing `ScopeGuard` across those
    /// calls; they push/pop explicitly instead, via [`Parser::with_scope`]
    /// (`src/parser/mod.rs`), which pops on every exit path including `?`.
    pub fn push_scope_raw(&mut self) {
        self.ident.push_scope();
        self.tag.push_scope();
    }

    pub fn pop_scope_raw(&mut self) {
        self.ident.pop_scope();
        self.tag.pop_scope();
    }

    pub fn depth(&self) -> u32 {
        self.ident.depth()
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeId;

    fn dummy_symbol(name: &str, depth: u32) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty: TypeId(0),
            storage: StorageClass::Definition,
            linkage: Linkage::None,
            depth,
            enum_value: None,
            is_definition: true,
        }
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut scopes = Scopes::new();
        let outer = scopes.ident.sym_add(dummy_symbol("x", 0)).unwrap();
        {
            let mut guard = scopes.push_scope();
            let inner = guard.ident.sym_add(dummy_symbol("x", 1)).unwrap();
            assert_eq!(guard.ident.sym_lookup("x"), Some(inner));
        }
        assert_eq!(scopes.ident.sym_lookup("x"), Some(outer));
    }

    #[test]
    fn scope_guard_pops_on_drop_including_early_return() {
        fn inner(scopes: &mut Scopes) -> Result<(), ()> {
            let mut guard = scopes.push_scope();
            guard.ident.sym_add(dummy_symbol("y", 1)).unwrap();
            Err(())
        }

        let mut scopes = Scopes::new();
        let depth_before = scopes.depth();
        let _ = inner(&mut scopes);
        assert_eq!(scopes.depth(), depth_before);
        assert_eq!(scopes.ident.sym_lookup("y"), None);
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut ns = Namespace::new(NamespaceKind::Ident);
        ns.sym_add(dummy_symbol("x", 0)).unwrap();
        assert!(ns.sym_add(dummy_symbol("x", 0)).is_err());
    }

    #[test]
    fn ident_and_tag_are_independent() {
        let mut scopes = Scopes::new();
        scopes.ident.sym_add(dummy_symbol("S", 0)).unwrap();
        assert!(scopes.tag.sym_lookup("S").is_none());
        scopes.tag.sym_add(dummy_symbol("S", 0)).unwrap();
        assert!(scopes.tag.sym_lookup("S").is_some());
    }
}
