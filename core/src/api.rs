pub use crate::config::ResolverConfig;
pub use crate::dependencies::{
    global, Arguments, Injectable, InstanceCache, RegisteredEntry, Registry, ResolutionContext,
    SharedContext, ValueStore,
};
pub use crate::errors::{BoxError, RegistryError, RegistryResult};
pub use crate::keyed::KeyedContainer;
pub use crate::types::{Dependency, Identifier, Resolved, TypeKey, ValueKey};
