//! Case-normalized symbol table, shared between the harness and the
//! hooks that resolve ports lazily (the I/O spy).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Identifier-to-address mapping accumulated across all loaded programs.
///
/// Lookups are case-insensitive; names are stored uppercase. The table is
/// a cheap clone (shared interior), so hooks created before a program is
/// compiled still see symbols added later.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    inner: Rc<RefCell<HashMap<String, u16>>>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, addr: u16) {
        self.inner
            .borrow_mut()
            .insert(name.to_ascii_uppercase(), addr);
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<u16> {
        self.inner
            .borrow()
            .get(&name.to_ascii_uppercase())
            .copied()
    }

    /// Merge a program's symbols in (last write wins).
    pub fn merge(&self, symbols: &HashMap<String, u16>) {
        let mut inner = self.inner.borrow_mut();
        for (name, &addr) in symbols {
            inner.insert(name.to_ascii_uppercase(), addr);
        }
    }

    /// Copy of the current contents, for snapshots.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, u16> {
        self.inner.borrow().clone()
    }

    /// Replace the contents wholesale, for snapshot restore.
    pub fn replace(&self, symbols: HashMap<String, u16>) {
        *self.inner.borrow_mut() = symbols;
    }
}
