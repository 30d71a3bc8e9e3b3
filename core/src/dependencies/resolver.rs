use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::config::ResolverConfig;
use crate::dependencies::instance_cache::InstanceCache;
use crate::dependencies::registry::Registry;
use crate::dependencies::types::{Arguments, Factory, Injectable, RegisteredEntry};
use crate::dependencies::value_store::ValueStore;
use crate::errors::{BoxError, RegistryError, RegistryResult};
use crate::types::{Dependency, Erased, Identifier, Resolved, TypeKey, ValueKey};

/// **RESOLUTION CONTEXT**
///
/// Owns the registry, the instance cache and the value store, and resolves
/// identifiers into fully constructed object graphs. Each class identifier is
/// constructed at most once per context.
///
/// Resolution is depth-first and synchronous. Dependencies are resolved in
/// declared order and the first failure propagates unchanged; the failing
/// type is never cached, although dependencies built before the failure stay
/// cached.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    config: ResolverConfig,
    registry: Registry,
    instances: InstanceCache,
    values: ValueStore,
    /// Types currently under construction, outermost first.
    resolving: Vec<TypeKey>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default())
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            instances: InstanceCache::new(),
            values: ValueStore::new(),
            resolving: Vec::new(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn instances(&self) -> &InstanceCache {
        &self.instances
    }

    pub fn values(&self) -> &ValueStore {
        &self.values
    }

    // ============================================================================================
    // REGISTRATION
    // ============================================================================================

    /// Registers `T` with an ordered dependency list and a factory that
    /// receives the resolved dependencies in that order.
    ///
    /// Registering again replaces the metadata but never touches an instance
    /// that was already built.
    pub fn register<T, F, E>(&mut self, dependencies: Vec<Dependency>, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut Arguments) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let key = TypeKey::of::<T>();
        self.register_entry(key, RegisteredEntry::constructible(dependencies, factory))
    }

    /// Registers a type that knows its own dependencies.
    pub fn register_type<T: Injectable>(&mut self) -> &mut Self {
        self.register(T::dependencies(), T::construct)
    }

    /// Registers a ready-made value under the class identity of `T`.
    pub fn register_instance<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.register_entry(TypeKey::of::<T>(), RegisteredEntry::RawValue(Erased::new(value)))
    }

    pub fn register_entry(&mut self, key: TypeKey, entry: RegisteredEntry) -> &mut Self {
        if self.instances.has(&key) && self.config.warn_on_reregister {
            log::warn!(
                "{} re-registered after it was instantiated; the cached instance is kept",
                key
            );
        }
        log::debug!(
            "Registering {} with {} dependencies",
            key,
            entry.dependencies().len()
        );
        self.registry.register(key, entry);
        self
    }

    /// Adds a raw value and hands it back, so registration can happen at the
    /// assignment site. With a custom key the value is stored under that key,
    /// otherwise under the hash of its content.
    ///
    /// A taken key keeps its first value, and that first value is what comes
    /// back. If the first value has a different Rust type the call fails with
    /// `ValueConflict`.
    pub fn register_value<V>(&mut self, value: V, custom_key: Option<&str>) -> RegistryResult<Arc<V>>
    where
        V: Serialize + Any + Send + Sync,
    {
        let (key, stored) = self.values.add(value, custom_key)?;
        stored
            .downcast::<V>()
            .ok_or_else(|| RegistryError::ValueConflict {
                key: key.to_string(),
                stored: stored.type_name().to_string(),
                offered: std::any::type_name::<V>(),
            })
    }

    // ============================================================================================
    // RESOLUTION
    // ============================================================================================

    /// Resolves `T`, constructing it and its dependencies on first use.
    pub fn resolve<T: Any + Send + Sync>(&mut self) -> RegistryResult<Arc<T>> {
        let key = TypeKey::of::<T>();
        self.resolve_class(key)?.erased().downcast_for::<T>(&key)
    }

    /// Resolves a value registered under a custom key.
    pub fn resolve_value<V: Any + Send + Sync>(&mut self, key: &str) -> RegistryResult<Arc<V>> {
        let key = ValueKey::custom(key);
        self.lookup_value(&key)?.downcast_for::<V>(&key)
    }

    /// Resolves a value registered by content, using a structurally equal
    /// value as the key material.
    pub fn resolve_content<V>(&mut self, material: &V) -> RegistryResult<Arc<V>>
    where
        V: Serialize + Any + Send + Sync,
    {
        let key = ValueKey::of_value(material)?;
        self.lookup_value(&key)?.downcast_for::<V>(&key)
    }

    /// Resolves any identifier into its tagged result.
    pub fn resolve_identifier(&mut self, identifier: &Identifier) -> RegistryResult<Resolved> {
        match identifier {
            Identifier::Class(key) => self.resolve_class(*key),
            Identifier::Value(key) => self.lookup_value(key).map(Resolved::Value),
        }
    }

    /// Returns an already built instance without constructing anything.
    /// Distinguishes "known but not built" (`NotInstantiated`) from unknown
    /// (`NotRegistered`).
    pub fn instance<T: Any + Send + Sync>(&self) -> RegistryResult<Arc<T>> {
        let key = TypeKey::of::<T>();
        let entry = self
            .registry
            .get(&key)
            .ok_or_else(|| RegistryError::NotRegistered {
                identifier: Identifier::Class(key).to_string(),
            })?;

        if let Some(instance) = self.instances.get(&key) {
            return instance.downcast_for::<T>(&key);
        }
        match entry {
            RegisteredEntry::RawValue(value) => value.downcast_for::<T>(&key),
            RegisteredEntry::Constructible { .. } => Err(RegistryError::NotInstantiated {
                identifier: Identifier::Class(key).to_string(),
            }),
        }
    }

    fn lookup_value(&self, key: &ValueKey) -> RegistryResult<Erased> {
        match self.values.get(key) {
            Some(value) => {
                log::trace!("Value short-circuit for {}", key);
                Ok(value.clone())
            }
            None => Err(RegistryError::NotRegistered {
                identifier: key.to_string(),
            }),
        }
    }

    fn resolve_class(&mut self, key: TypeKey) -> RegistryResult<Resolved> {
        let entry = match self.registry.get(&key) {
            Some(entry) => entry,
            None => {
                return Err(RegistryError::NotRegistered {
                    identifier: Identifier::Class(key).to_string(),
                })
            }
        };

        if let Some(instance) = self.instances.get(&key) {
            log::trace!("Cache hit for {}", key);
            return Ok(Resolved::Instance(instance.clone()));
        }

        let (factory, dependencies) = match entry {
            RegisteredEntry::RawValue(value) => return Ok(Resolved::Value(value.clone())),
            RegisteredEntry::Constructible {
                factory,
                dependencies,
            } => (Arc::clone(factory), dependencies.clone()),
        };

        self.enter(key)?;
        let built = panic::catch_unwind(AssertUnwindSafe(|| {
            self.construct(key, &dependencies, factory.as_ref())
        }));
        // Pop before surfacing either outcome, a panic included.
        self.resolving.pop();

        let built = match built {
            Ok(built) => built?,
            Err(payload) => panic::resume_unwind(payload),
        };
        log::debug!("Instantiated {}", key);
        let instance = self.instances.get_or_insert_with(key, || built);
        Ok(Resolved::Instance(instance))
    }

    /// Marks `key` as under construction. With cycle detection on, re-entry
    /// is a `CyclicDependency`; with it off, nesting is capped at
    /// `max_depth`.
    fn enter(&mut self, key: TypeKey) -> RegistryResult<()> {
        if self.config.detect_cycles {
            if self.resolving.contains(&key) {
                let mut path: Vec<String> = self.resolving.iter().map(|k| k.to_string()).collect();
                path.push(key.to_string());
                return Err(RegistryError::CyclicDependency { path });
            }
        } else if self.resolving.len() >= self.config.max_depth {
            return Err(RegistryError::DepthExceeded {
                identifier: key.to_string(),
                limit: self.config.max_depth,
            });
        }
        self.resolving.push(key);
        Ok(())
    }

    fn construct(
        &mut self,
        key: TypeKey,
        dependencies: &[Dependency],
        factory: &Factory,
    ) -> RegistryResult<Erased> {
        let mut resolved = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            resolved.push(self.resolve_identifier(dependency)?);
        }

        let mut args = Arguments::new(key, resolved);
        factory(&mut args).map_err(|source| match source.downcast::<RegistryError>() {
            // Errors raised through `Arguments` keep their own kind.
            Ok(inner) => *inner,
            Err(source) => RegistryError::Construction {
                identifier: key.to_string(),
                source,
            },
        })
    }

    // ============================================================================================
    // INTROSPECTION
    // ============================================================================================

    /// True if `identifier` can be resolved: a registered class, or a value
    /// present in the value store.
    pub fn is_registered(&self, identifier: &Identifier) -> bool {
        match identifier {
            Identifier::Class(key) => self.registry.is_registered(key),
            Identifier::Value(key) => self.values.contains(key),
        }
    }

    /// Registered classes in registration order, then stored values.
    pub fn list_registered(&self) -> Vec<Identifier> {
        self.registry
            .identifiers()
            .iter()
            .copied()
            .map(Identifier::Class)
            .chain(self.values.keys().iter().cloned().map(Identifier::Value))
            .collect()
    }

    /// Classes with a cached instance, in construction order.
    pub fn list_instantiated(&self) -> Vec<TypeKey> {
        self.instances.keys().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[derive(Debug)]
    struct Leaf;
    #[derive(Debug)]
    struct Branch(Arc<Leaf>);
    #[derive(Debug)]
    struct Root(Arc<Branch>);

    #[derive(Debug)]
    struct Repo {
        connection: Arc<String>,
    }

    #[test]
    fn test_empty_dependencies_construct_with_zero_arguments() {
        init_logger();
        let mut ctx = ResolutionContext::new();
        ctx.register(Vec::new(), |args: &mut Arguments| {
            assert!(args.is_empty());
            Ok::<_, BoxError>(Leaf)
        });
        assert!(ctx.resolve::<Leaf>().is_ok());
    }

    #[test]
    fn test_singleton_identity() {
        init_logger();
        let mut ctx = ResolutionContext::new();
        ctx.register(Vec::new(), |_: &mut Arguments| Ok::<_, BoxError>(Leaf));
        let first = ctx.resolve::<Leaf>().unwrap();
        ctx.register_instance(7u64);
        let second = ctx.resolve::<Leaf>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_construction_order_is_depth_first() {
        init_logger();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = ResolutionContext::new();

        let l = Arc::clone(&log);
        ctx.register(Vec::new(), move |_: &mut Arguments| {
            l.lock().unwrap().push("Leaf");
            Ok::<_, BoxError>(Leaf)
        });
        let l = Arc::clone(&log);
        ctx.register(vec![Dependency::class::<Leaf>()], move |args: &mut Arguments| {
            l.lock().unwrap().push("Branch");
            Ok::<_, BoxError>(Branch(args.next()?))
        });
        let l = Arc::clone(&log);
        ctx.register(vec![Dependency::class::<Branch>()], move |args: &mut Arguments| {
            l.lock().unwrap().push("Root");
            assert_eq!(args.len(), 1);
            Ok::<_, BoxError>(Root(args.next()?))
        });

        let root = ctx.resolve::<Root>().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["Leaf", "Branch", "Root"]);
        assert!(Arc::ptr_eq(&root.0, &ctx.resolve::<Branch>().unwrap()));
        assert_eq!(
            ctx.list_instantiated(),
            vec![TypeKey::of::<Leaf>(), TypeKey::of::<Branch>(), TypeKey::of::<Root>()]
        );
    }

    #[test]
    fn test_factory_runs_once() {
        init_logger();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut ctx = ResolutionContext::new();
        ctx.register(Vec::new(), move |_: &mut Arguments| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BoxError>(Leaf)
        });
        for _ in 0..5 {
            ctx.resolve::<Leaf>().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_value_dependency_by_custom_key() {
        init_logger();
        let mut ctx = ResolutionContext::new();
        ctx.register_value(String::from("db://localhost:27017"), Some("conn"))
            .unwrap();
        ctx.register(vec![Dependency::key("conn")], |args: &mut Arguments| {
            Ok::<_, BoxError>(Repo {
                connection: args.next()?,
            })
        });

        let repo = ctx.resolve::<Repo>().unwrap();
        assert_eq!(*repo.connection, "db://localhost:27017");
        // Values are never cached as instances.
        assert_eq!(ctx.list_instantiated(), vec![TypeKey::of::<Repo>()]);
    }

    #[test]
    fn test_unregistered_dependency_fails_whole_construction() {
        init_logger();
        let mut ctx = ResolutionContext::new();
        ctx.register(vec![Dependency::class::<Leaf>()], |args: &mut Arguments| {
            Ok::<_, BoxError>(Branch(args.next()?))
        });

        let err = ctx.resolve::<Branch>().unwrap_err();
        match err {
            RegistryError::NotRegistered { identifier } => assert!(identifier.contains("Leaf")),
            other => panic!("expected NotRegistered, got {:?}", other),
        }
        assert!(ctx.list_instantiated().is_empty());

        // Fixing the registration and retrying runs the whole algorithm again.
        ctx.register(Vec::new(), |_: &mut Arguments| Ok::<_, BoxError>(Leaf));
        assert!(ctx.resolve::<Branch>().is_ok());
    }

    #[test]
    fn test_first_missing_dependency_is_reported() {
        init_logger();
        struct MissingA;
        struct MissingB;
        let mut ctx = ResolutionContext::new();
        ctx.register(Vec::new(), |_: &mut Arguments| Ok::<_, BoxError>(Leaf));
        ctx.register(
            vec![
                Dependency::class::<Leaf>(),
                Dependency::class::<MissingA>(),
                Dependency::class::<MissingB>(),
            ],
            |_: &mut Arguments| Ok::<_, BoxError>(Root(Arc::new(Branch(Arc::new(Leaf))))),
        );

        let err = ctx.resolve::<Root>().unwrap_err();
        assert!(err.to_string().contains("MissingA"));
        assert!(!err.to_string().contains("MissingB"));
        // The sibling resolved before the failure stays cached.
        assert_eq!(ctx.list_instantiated(), vec![TypeKey::of::<Leaf>()]);
    }

    #[test]
    fn test_factory_error_propagates_unchanged() {
        init_logger();
        #[derive(Debug)]
        struct Refused;
        impl std::fmt::Display for Refused {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("connection refused")
            }
        }
        impl std::error::Error for Refused {}

        let mut ctx = ResolutionContext::new();
        ctx.register(Vec::new(), |_: &mut Arguments| Err::<Leaf, _>(Refused));

        match ctx.resolve::<Leaf>().unwrap_err() {
            RegistryError::Construction { source, .. } => assert!(source.is::<Refused>()),
            other => panic!("expected Construction, got {:?}", other),
        }
        assert!(ctx.list_instantiated().is_empty());
    }

    #[test]
    fn test_argument_errors_keep_their_kind() {
        init_logger();
        let mut ctx = ResolutionContext::new();
        ctx.register_value(21u32, Some("edi-age")).unwrap();
        ctx.register(vec![Dependency::key("edi-age")], |args: &mut Arguments| {
            let _: Arc<String> = args.next()?;
            Ok::<_, BoxError>(Leaf)
        });
        assert!(matches!(
            ctx.resolve::<Leaf>(),
            Err(RegistryError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_cycle_detected() {
        init_logger();
        #[derive(Debug)]
        struct A;
        struct B;
        let mut ctx = ResolutionContext::new();
        ctx.register(vec![Dependency::class::<B>()], |_: &mut Arguments| Ok::<_, BoxError>(A));
        ctx.register(vec![Dependency::class::<A>()], |_: &mut Arguments| Ok::<_, BoxError>(B));

        match ctx.resolve::<A>().unwrap_err() {
            RegistryError::CyclicDependency { path } => {
                assert_eq!(path.len(), 3);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected CyclicDependency, got {:?}", other),
        }
        // Guards are unwound after a failure.
        assert!(ctx.resolving.is_empty());
    }

    #[test]
    fn test_cycle_without_detection_hits_depth_limit() {
        init_logger();
        #[derive(Debug)]
        struct A;
        let cfg = ResolverConfig::default()
            .with_cycle_detection(false)
            .with_max_depth(10);
        let mut ctx = ResolutionContext::with_config(cfg);
        ctx.register(vec![Dependency::class::<A>()], |_: &mut Arguments| Ok::<_, BoxError>(A));

        assert!(matches!(
            ctx.resolve::<A>(),
            Err(RegistryError::DepthExceeded { limit: 10, .. })
        ));
    }

    #[test]
    fn test_acyclic_chain_deeper_than_limit_resolves() {
        init_logger();
        struct L0;
        struct L1;
        struct L2;
        struct L3;
        let mut ctx = ResolutionContext::with_config(ResolverConfig::default().with_max_depth(2));
        ctx.register(Vec::new(), |_: &mut Arguments| Ok::<_, BoxError>(L0));
        ctx.register(vec![Dependency::class::<L0>()], |_: &mut Arguments| Ok::<_, BoxError>(L1));
        ctx.register(vec![Dependency::class::<L1>()], |_: &mut Arguments| Ok::<_, BoxError>(L2));
        ctx.register(vec![Dependency::class::<L2>()], |_: &mut Arguments| Ok::<_, BoxError>(L3));

        assert!(ctx.resolve::<L3>().is_ok());
        assert_eq!(ctx.list_instantiated().len(), 4);
    }

    #[test]
    fn test_panicking_factory_can_be_retried() {
        init_logger();
        struct Flaky;
        struct Parent(Arc<Flaky>);
        let panicked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&panicked);
        let mut ctx = ResolutionContext::new();
        ctx.register(Vec::new(), move |_: &mut Arguments| {
            if !flag.swap(true, Ordering::SeqCst) {
                panic!("first construction fails");
            }
            Ok::<_, BoxError>(Flaky)
        });
        ctx.register(vec![Dependency::class::<Flaky>()], |args: &mut Arguments| {
            Ok::<_, BoxError>(Parent(args.next()?))
        });

        let first = panic::catch_unwind(AssertUnwindSafe(|| ctx.resolve::<Parent>()));
        assert!(first.is_err());
        assert!(ctx.resolving.is_empty());
        assert!(ctx.list_instantiated().is_empty());

        let parent = ctx.resolve::<Parent>().unwrap();
        assert!(Arc::ptr_eq(&parent.0, &ctx.resolve::<Flaky>().unwrap()));
    }

    #[test]
    fn test_reregistration_keeps_cached_instance() {
        init_logger();
        let mut ctx = ResolutionContext::new();
        ctx.register(Vec::new(), |_: &mut Arguments| Ok::<_, BoxError>(String::from("first")));
        let first = ctx.resolve::<String>().unwrap();
        ctx.register(Vec::new(), |_: &mut Arguments| Ok::<_, BoxError>(String::from("second")));
        let again = ctx.resolve::<String>().unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(*again, "first");
    }

    #[test]
    fn test_instance_distinguishes_unknown_from_unbuilt() {
        init_logger();
        let mut ctx = ResolutionContext::new();
        assert!(matches!(
            ctx.instance::<Leaf>(),
            Err(RegistryError::NotRegistered { .. })
        ));

        ctx.register(Vec::new(), |_: &mut Arguments| Ok::<_, BoxError>(Leaf));
        let err = ctx.instance::<Leaf>().unwrap_err();
        assert!(err.is_known_identifier());

        let built = ctx.resolve::<Leaf>().unwrap();
        assert!(Arc::ptr_eq(&built, &ctx.instance::<Leaf>().unwrap()));
    }

    #[test]
    fn test_register_instance_is_returned_directly() {
        init_logger();
        let mut ctx = ResolutionContext::new();
        ctx.register_instance(String::from("preset"));
        assert_eq!(*ctx.resolve::<String>().unwrap(), "preset");
        assert_eq!(*ctx.instance::<String>().unwrap(), "preset");
        assert!(ctx.list_instantiated().is_empty());
    }

    #[test]
    fn test_register_value_conflicting_type() {
        init_logger();
        let mut ctx = ResolutionContext::new();
        ctx.register_value(21u32, Some("age")).unwrap();
        assert!(matches!(
            ctx.register_value(String::from("twenty-one"), Some("age")),
            Err(RegistryError::ValueConflict { .. })
        ));
        assert_eq!(*ctx.resolve_value::<u32>("age").unwrap(), 21);
    }

    #[test]
    fn test_listing_and_membership() {
        init_logger();
        let mut ctx = ResolutionContext::new();
        ctx.register(Vec::new(), |_: &mut Arguments| Ok::<_, BoxError>(Leaf));
        ctx.register_value(String::from("db://localhost:27017"), Some("conn"))
            .unwrap();

        assert!(ctx.is_registered(&Identifier::class::<Leaf>()));
        assert!(ctx.is_registered(&Identifier::key("conn")));
        assert!(!ctx.is_registered(&Identifier::class::<Branch>()));
        assert_eq!(
            ctx.list_registered(),
            vec![Identifier::class::<Leaf>(), Identifier::key("conn")]
        );
        assert!(ctx.list_instantiated().is_empty());
    }
}
