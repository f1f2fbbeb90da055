//! Interned mapping keys
//!
//! Parsed responses key every mapping by a [`Symbol`]. Live symbols with the
//! same text share one allocation, so equal keys across responses are cheap
//! to clone and compare. Entries no symbol refers to any more are swept out
//! as the table grows, which keeps arbitrary metadata keys from piling up in
//! long-running processes.

use serde::{Serialize, Serializer};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

const MIN_SWEEP_THRESHOLD: usize = 1024;

static INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();

struct Interner {
    table: HashSet<Arc<str>>,
    sweep_at: usize,
}

impl Interner {
    fn new() -> Self {
        Self {
            table: HashSet::new(),
            sweep_at: MIN_SWEEP_THRESHOLD,
        }
    }

    /// Drop entries held only by the table. Runs when the table doubles
    /// since the last sweep.
    fn sweep_if_needed(&mut self) {
        if self.table.len() < self.sweep_at {
            return;
        }
        self.table.retain(|name| Arc::strong_count(name) > 1);
        self.sweep_at = (self.table.len() * 2).max(MIN_SWEEP_THRESHOLD);
    }
}

/// Canonical, interned representation of a mapping key
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Intern `name`, reusing the existing allocation when one exists
    pub fn intern(name: &str) -> Self {
        let interner = INTERNER.get_or_init(|| Mutex::new(Interner::new()));
        // A poisoned table still holds valid entries.
        let mut interner = interner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(existing) = interner.table.get(name) {
            return Symbol(Arc::clone(existing));
        }

        interner.sweep_if_needed();
        let interned: Arc<str> = Arc::from(name);
        interner.table.insert(Arc::clone(&interned));
        Symbol(interned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when both symbols point at the same interned allocation
    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::intern(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Symbol::intern(&name)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
