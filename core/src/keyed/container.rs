use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ResolverConfig;
use crate::dependencies::types::{erase_factory, Arguments, Factory};
use crate::errors::{BoxError, RegistryError, RegistryResult};
use crate::types::{Erased, Resolved, TypeKey};

struct KeyedClass {
    owner: TypeKey,
    dependencies: Vec<String>,
    factory: Arc<Factory>,
}

/// **KEYED CONTAINER**
///
/// Maps lower-cased string keys to either a class recipe or a runtime value.
/// Runtime values win over classes registered under the same key.
#[derive(Default)]
pub struct KeyedContainer {
    config: ResolverConfig,
    classes: HashMap<String, KeyedClass>,
    runtime_values: HashMap<String, Erased>,
}

fn normalize(key: &str) -> String {
    key.to_lowercase()
}

impl KeyedContainer {
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default())
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            config,
            classes: HashMap::new(),
            runtime_values: HashMap::new(),
        }
    }

    /// Registers a class under `name`, replacing any earlier class with the
    /// same key.
    pub fn register_class<T, F, E>(&mut self, name: &str, dependencies: &[&str], factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut Arguments) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let key = normalize(name);
        log::debug!("Registering class '{}' with {} dependencies", key, dependencies.len());
        let class = KeyedClass {
            owner: TypeKey::of::<T>(),
            dependencies: dependencies.iter().map(|d| normalize(d)).collect(),
            factory: erase_factory(factory),
        };
        self.classes.insert(key, class);
        self
    }

    pub fn register_runtime_value<V: Any + Send + Sync>(&mut self, key: &str, value: V) -> &mut Self {
        let key = normalize(key);
        log::debug!("Registering runtime value '{}'", key);
        self.runtime_values.insert(key, Erased::new(value));
        self
    }

    /// Replaces a runtime value that was registered earlier.
    pub fn inject_runtime_value<V: Any + Send + Sync>(&mut self, key: &str, value: V) -> RegistryResult<()> {
        let key = normalize(key);
        match self.runtime_values.get_mut(&key) {
            Some(slot) => {
                log::debug!("Injecting runtime value '{}'", key);
                *slot = Erased::new(value);
                Ok(())
            }
            None => Err(RegistryError::NotInstantiated { identifier: key }),
        }
    }

    /// Resolves `key` to a runtime value, or to a freshly built class
    /// instance.
    pub fn resolve<T: Any + Send + Sync>(&self, key: &str) -> RegistryResult<Arc<T>> {
        let key = normalize(key);
        let mut resolving = Vec::new();
        self.resolve_key(&key, &mut resolving)?
            .erased()
            .downcast_for::<T>(&key)
    }

    fn resolve_key(&self, key: &str, resolving: &mut Vec<String>) -> RegistryResult<Resolved> {
        if let Some(value) = self.runtime_values.get(key) {
            return Ok(Resolved::Value(value.clone()));
        }
        let class = self
            .classes
            .get(key)
            .ok_or_else(|| RegistryError::NotRegistered {
                identifier: key.to_string(),
            })?;

        if self.config.detect_cycles {
            if resolving.iter().any(|k| k == key) {
                let mut path = resolving.clone();
                path.push(key.to_string());
                return Err(RegistryError::CyclicDependency { path });
            }
        } else if resolving.len() >= self.config.max_depth {
            return Err(RegistryError::DepthExceeded {
                identifier: key.to_string(),
                limit: self.config.max_depth,
            });
        }

        resolving.push(key.to_string());
        let built = self.construct(key, class, resolving);
        resolving.pop();
        built.map(Resolved::Instance)
    }

    fn construct(&self, key: &str, class: &KeyedClass, resolving: &mut Vec<String>) -> RegistryResult<Erased> {
        let mut items = Vec::with_capacity(class.dependencies.len());
        for dependency in &class.dependencies {
            items.push(self.resolve_key(dependency, resolving)?);
        }

        let mut args = Arguments::new(class.owner, items);
        let instance = (class.factory)(&mut args).map_err(|source| match source.downcast::<RegistryError>() {
            Ok(inner) => *inner,
            Err(source) => RegistryError::Construction {
                identifier: key.to_string(),
                source,
            },
        })?;
        log::trace!("Built transient '{}'", key);
        Ok(instance)
    }

    pub fn registered_classes(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.classes.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn runtime_values(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.runtime_values.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for KeyedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedContainer")
            .field("config", &self.config)
            .field("classes", &self.registered_classes())
            .field("runtime_values", &self.runtime_values())
            .finish()
    }
}
