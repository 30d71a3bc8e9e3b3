//! Thread-safe handle around a [`ResolutionContext`].
//!
//! One coarse lock covers registration and resolution, so concurrent
//! resolvers of the same type observe exactly one construction. Factories run
//! while the lock is held and must not call back into the same handle.

use std::any::Any;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::ResolverConfig;
use crate::dependencies::resolver::ResolutionContext;
use crate::dependencies::types::{Arguments, Injectable};
use crate::errors::{BoxError, RegistryResult};
use crate::types::{Dependency, Identifier, Resolved, TypeKey};

static GLOBAL: Lazy<SharedContext> =
    Lazy::new(|| SharedContext::with_config(ResolverConfig::from_env()));

/// Process-wide context, configured from the environment on first use.
pub fn global() -> &'static SharedContext {
    &GLOBAL
}

#[derive(Clone, Default)]
pub struct SharedContext {
    inner: Arc<Mutex<ResolutionContext>>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default())
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ResolutionContext::with_config(config))),
        }
    }

    /// Runs `f` with exclusive access to the underlying context.
    pub fn with<R>(&self, f: impl FnOnce(&mut ResolutionContext) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    pub fn register<T, F, E>(&self, dependencies: Vec<Dependency>, factory: F) -> &Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut Arguments) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.inner.lock().register(dependencies, factory);
        self
    }

    pub fn register_type<T: Injectable>(&self) -> &Self {
        self.inner.lock().register_type::<T>();
        self
    }

    pub fn register_instance<T: Any + Send + Sync>(&self, value: T) -> &Self {
        self.inner.lock().register_instance(value);
        self
    }

    pub fn register_value<V>(&self, value: V, custom_key: Option<&str>) -> RegistryResult<Arc<V>>
    where
        V: Serialize + Any + Send + Sync,
    {
        self.inner.lock().register_value(value, custom_key)
    }

    pub fn resolve<T: Any + Send + Sync>(&self) -> RegistryResult<Arc<T>> {
        self.inner.lock().resolve::<T>()
    }

    pub fn resolve_value<V: Any + Send + Sync>(&self, key: &str) -> RegistryResult<Arc<V>> {
        self.inner.lock().resolve_value::<V>(key)
    }

    pub fn resolve_content<V>(&self, material: &V) -> RegistryResult<Arc<V>>
    where
        V: Serialize + Any + Send + Sync,
    {
        self.inner.lock().resolve_content(material)
    }

    pub fn resolve_identifier(&self, identifier: &Identifier) -> RegistryResult<Resolved> {
        self.inner.lock().resolve_identifier(identifier)
    }

    pub fn instance<T: Any + Send + Sync>(&self) -> RegistryResult<Arc<T>> {
        self.inner.lock().instance::<T>()
    }

    pub fn is_registered(&self, identifier: &Identifier) -> bool {
        self.inner.lock().is_registered(identifier)
    }

    pub fn list_registered(&self) -> Vec<Identifier> {
        self.inner.lock().list_registered()
    }

    pub fn list_instantiated(&self) -> Vec<TypeKey> {
        self.inner.lock().list_instantiated()
    }
}
