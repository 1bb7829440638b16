//! Lexically-scoped symbol table with free-variable promotion.
//!
//! A chain of scopes, innermost first via `outer`. Resolving a name that
//! lives in an enclosing *local* scope promotes it to a `Free` symbol in
//! every scope between its definition and the point of use, so each
//! function ends up with a flat, definition-ordered capture list.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn enclosed(outer: SymbolTable) -> Self {
        SymbolTable {
            outer: Some(Box::new(outer)),
            ..SymbolTable::default()
        }
    }

    /// Discard this scope and recover the enclosing one, e.g. when leaving
    /// a function literal's body.
    pub fn pop(self) -> Option<SymbolTable> {
        self.outer.map(|o| *o)
    }

    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        self.free_symbols.push(original.clone());
        let symbol = Symbol {
            name: original.name,
            scope: SymbolScope::Free,
            index: self.free_symbols.len() - 1,
        };
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(sym) = self.store.get(name) {
            return Some(sym.clone());
        }

        let outer = self.outer.as_mut()?;
        let resolved = outer.resolve(name)?;

        match resolved.scope {
            SymbolScope::Global | SymbolScope::Builtin | SymbolScope::Function => {
                Some(resolved)
            }
            SymbolScope::Local | SymbolScope::Free => Some(self.define_free(resolved)),
        }
    }

    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_resolves_global_and_local() {
        let mut global = SymbolTable::new();
        global.define("a");
        global.define("b");

        let mut first_local = SymbolTable::enclosed(global);
        first_local.define("c");

        assert_eq!(first_local.resolve("a").unwrap().scope, SymbolScope::Global);
        assert_eq!(first_local.resolve("c").unwrap().scope, SymbolScope::Local);
    }

    #[test]
    fn resolve_promotes_nested_locals_to_free() {
        let mut global = SymbolTable::new();
        global.define("a");

        let mut first_local = SymbolTable::enclosed(global);
        first_local.define("c");

        let mut second_local = SymbolTable::enclosed(first_local);
        second_local.define("e");

        let resolved = second_local.resolve("c").unwrap();
        assert_eq!(resolved.scope, SymbolScope::Free);
        assert_eq!(resolved.index, 0);
        assert_eq!(second_local.free_symbols[0].scope, SymbolScope::Local);

        let global_through_two_scopes = second_local.resolve("a").unwrap();
        assert_eq!(global_through_two_scopes.scope, SymbolScope::Global);
    }

    #[test]
    fn builtins_keep_their_fixed_index() {
        let mut table = SymbolTable::new();
        let sym = table.define_builtin(3, "len");
        assert_eq!(sym.index, 3);
        assert_eq!(table.num_definitions(), 0);
    }

    #[test]
    fn function_name_allows_self_reference() {
        let mut table = SymbolTable::new();
        table.define_function_name("fib");
        let resolved = table.resolve("fib").unwrap();
        assert_eq!(resolved.scope, SymbolScope::Function);
    }

    #[test]
    fn unresolved_name_is_none() {
        let mut table = SymbolTable::new();
        assert!(table.resolve("missing").is_none());
    }
}
