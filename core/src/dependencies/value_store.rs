use std::any::Any;
use std::collections::HashMap;

use serde::Serialize;

use crate::errors::RegistryResult;
use crate::types::{Erased, ValueKey};

/// **VALUE STORE**
///
/// Raw, non-class dependencies keyed by content hash or custom key.
/// Insertion is first-write-wins: a key that is already present keeps its
/// value.
#[derive(Debug, Default)]
pub struct ValueStore {
    values: HashMap<ValueKey, Erased>,
    order: Vec<ValueKey>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `custom_key`, or under the hash of its content
    /// when no key is given. Returns the key and whatever the store holds for
    /// it afterwards, which is the earlier value if the key was taken.
    pub fn add<V>(&mut self, value: V, custom_key: Option<&str>) -> RegistryResult<(ValueKey, Erased)>
    where
        V: Serialize + Any + Send + Sync,
    {
        let key = ValueKey::from_material(&value, custom_key)?;
        let stored = self.insert(key.clone(), Erased::new(value));
        Ok((key, stored))
    }

    /// First-write-wins insert of an already erased value.
    pub fn insert(&mut self, key: ValueKey, value: Erased) -> Erased {
        if let Some(existing) = self.values.get(&key) {
            log::warn!("Value key {} already taken, keeping the first value", key);
            return existing.clone();
        }
        log::debug!("Storing {} ({})", key, value.type_name());
        self.values.insert(key.clone(), value.clone());
        self.order.push(key);
        value
    }

    /// Recomputes the key for `material` and reports it if present.
    pub fn has<V>(&self, material: &V, custom_key: Option<&str>) -> RegistryResult<Option<ValueKey>>
    where
        V: Serialize + ?Sized,
    {
        let key = ValueKey::from_material(material, custom_key)?;
        Ok(self.contains(&key).then_some(key))
    }

    pub fn contains(&self, key: &ValueKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &ValueKey) -> Option<&Erased> {
        self.values.get(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> &[ValueKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
