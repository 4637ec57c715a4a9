//! Formal-domain symbol boundary.
//!
//! The grammar itself lives in an external parser executable; this module
//! owns the symbol table it returns and the trait that invokes it.

pub mod parser;

pub use parser::{CommandParser, DomainParser, ParseError};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Predicate and action symbols of a parsed domain, with declared arities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    /// Predicate name to parameter count
    pub predicates: BTreeMap<String, usize>,
    /// Action name to parameter count
    pub actions: BTreeMap<String, usize>,
}

impl SymbolTable {
    /// Merged predicate+action view; actions shadow predicates on a name clash.
    pub fn merged(&self) -> BTreeMap<String, usize> {
        let mut all = self.predicates.clone();
        all.extend(self.actions.iter().map(|(k, v)| (k.clone(), *v)));
        all
    }

    /// Number of distinct symbols across predicates and actions.
    pub fn len(&self) -> usize {
        self.merged().len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.actions.is_empty()
    }
}
