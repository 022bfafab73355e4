// symtable.rs — Lexically scoped symbol tables
//
// A `SymbolTable` maps names to the nodes that declare them. Tables are
// immutable values: entering a scope produces a new table with the scope's own
// declarations layered over the enclosing ones, so the innermost declaration
// of a name always wins and the caller's table is left untouched.
//
// Preconditions: declarations borrow from a tree that outlives the table.
// Postconditions: `resolve` either yields the visible declaration or an
//   `UnresolvedSymbol` error naming the symbol and the referencing context.
// Side effects: none.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Name introduced by a declaring node.
pub type SymbolName = String;

/// Name-based, non-owning link to a declaring node.
pub type SymbolRef = String;

#[derive(Debug, Clone)]
pub struct SymbolTable<'a, T> {
    entries: HashMap<&'a str, T>,
}

impl<'a, T> Default for SymbolTable<'a, T> {
    fn default() -> Self {
        SymbolTable {
            entries: HashMap::new(),
        }
    }
}

impl<'a, T: Clone> SymbolTable<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of this table with `scope` layered on top. Names declared in
    /// `scope` shadow names of the enclosing table.
    pub fn extend<I>(&self, scope: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, T)>,
    {
        let mut entries = self.entries.clone();
        entries.extend(scope);
        SymbolTable { entries }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up `name`; `context` describes the referencing node for the error.
    pub fn resolve(&self, name: &str, context: &str) -> Result<&T> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::unresolved(name, context))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Names that occur more than once, in first-repeat order.
pub fn duplicates<'n>(names: impl IntoIterator<Item = &'n str>) -> Vec<&'n str> {
    let mut seen = std::collections::HashSet::new();
    let mut dups = Vec::new();
    for name in names {
        if !seen.insert(name) && !dups.contains(&name) {
            dups.push(name);
        }
    }
    dups
}
