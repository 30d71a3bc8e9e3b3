use std::collections::HashMap;

use crate::types::{Erased, TypeKey};

/// **INSTANCE CACHE**
///
/// One materialized instance per class identifier. Nothing is ever evicted.
#[derive(Debug, Default)]
pub struct InstanceCache {
    instances: HashMap<TypeKey, Erased>,
    order: Vec<TypeKey>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts unconditionally. A second `put` for the same key replaces the
    /// first; the resolver never does this.
    pub fn put(&mut self, key: TypeKey, instance: Erased) {
        if self.instances.insert(key, instance).is_none() {
            self.order.push(key);
        }
    }

    pub fn has(&self, key: &TypeKey) -> bool {
        self.instances.contains_key(key)
    }

    pub fn get(&self, key: &TypeKey) -> Option<&Erased> {
        self.instances.get(key)
    }

    /// Returns the cached instance, building it with `init` only if absent.
    pub fn get_or_insert_with<F>(&mut self, key: TypeKey, init: F) -> Erased
    where
        F: FnOnce() -> Erased,
    {
        if let Some(existing) = self.instances.get(&key) {
            return existing.clone();
        }
        let created = init();
        self.put(key, created.clone());
        created
    }

    /// Snapshot of every cached instance.
    pub fn all(&self) -> HashMap<TypeKey, Erased> {
        self.instances.clone()
    }

    /// Cached identifiers in the order they were first built.
    pub fn keys(&self) -> &[TypeKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
