use std::collections::HashMap;

use crate::dependencies::types::RegisteredEntry;
use crate::types::TypeKey;

/// Registration metadata for class identifiers. Pure bookkeeping: nothing
/// here constructs or resolves.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<TypeKey, RegisteredEntry>,
    order: Vec<TypeKey>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the entry for `key`. Returns the replaced entry.
    pub fn register(&mut self, key: TypeKey, entry: RegisteredEntry) -> Option<RegisteredEntry> {
        let previous = self.entries.insert(key, entry);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    pub fn is_registered(&self, key: &TypeKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &TypeKey) -> Option<&RegisteredEntry> {
        self.entries.get(key)
    }

    /// Registered identifiers in first-registration order.
    pub fn identifiers(&self) -> &[TypeKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
