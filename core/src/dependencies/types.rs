use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::errors::{BoxError, RegistryError, RegistryResult};
use crate::types::{Dependency, Erased, Resolved, TypeKey};

/// Type-erased constructor. Receives the resolved dependencies in declared
/// order and returns the new instance.
pub type Factory = dyn Fn(&mut Arguments) -> Result<Erased, BoxError> + Send + Sync;

/// What the registry knows about a class identifier.
#[derive(Clone)]
pub enum RegisteredEntry {
    Constructible {
        factory: Arc<Factory>,
        dependencies: Vec<Dependency>,
    },
    /// A ready-made value registered under a class identity. Returned as-is,
    /// never constructed and never cached.
    RawValue(Erased),
}

impl RegisteredEntry {
    /// Wraps a typed constructor.
    pub fn constructible<T, F, E>(dependencies: Vec<Dependency>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut Arguments) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        RegisteredEntry::Constructible {
            factory: erase_factory(factory),
            dependencies,
        }
    }

    pub fn dependencies(&self) -> &[Dependency] {
        match self {
            RegisteredEntry::Constructible { dependencies, .. } => dependencies,
            RegisteredEntry::RawValue(_) => &[],
        }
    }

    pub fn is_raw_value(&self) -> bool {
        matches!(self, RegisteredEntry::RawValue(_))
    }
}

pub(crate) fn erase_factory<T, F, E>(factory: F) -> Arc<Factory>
where
    T: Any + Send + Sync,
    F: Fn(&mut Arguments) -> Result<T, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    Arc::new(move |args: &mut Arguments| -> Result<Erased, BoxError> {
        factory(args).map(Erased::new).map_err(Into::into)
    })
}

impl fmt::Debug for RegisteredEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisteredEntry::Constructible { dependencies, .. } => f
                .debug_struct("Constructible")
                .field("dependencies", dependencies)
                .finish_non_exhaustive(),
            RegisteredEntry::RawValue(value) => f.debug_tuple("RawValue").field(value).finish(),
        }
    }
}

/// Types that describe their own dependencies and construction.
///
/// ```rust
/// use di_registry::{Arguments, BoxError, Dependency, Injectable, ResolutionContext};
///
/// struct Leaf;
/// impl Injectable for Leaf {
///     fn construct(_: &mut Arguments) -> Result<Self, BoxError> {
///         Ok(Leaf)
///     }
/// }
///
/// struct Branch(std::sync::Arc<Leaf>);
/// impl Injectable for Branch {
///     fn dependencies() -> Vec<Dependency> {
///         vec![Dependency::class::<Leaf>()]
///     }
///     fn construct(args: &mut Arguments) -> Result<Self, BoxError> {
///         Ok(Branch(args.next::<Leaf>()?))
///     }
/// }
///
/// let mut ctx = ResolutionContext::new();
/// ctx.register_type::<Leaf>().register_type::<Branch>();
/// let branch = ctx.resolve::<Branch>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&branch.0, &ctx.resolve::<Leaf>().unwrap()));
/// ```
pub trait Injectable: Any + Send + Sync + Sized {
    /// Ordered dependency list. Order is constructor-argument order.
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    fn construct(args: &mut Arguments) -> Result<Self, BoxError>;
}

/// Resolved dependencies handed to a factory, in declared order.
pub struct Arguments {
    owner: TypeKey,
    items: Vec<Resolved>,
    cursor: usize,
}

impl Arguments {
    pub(crate) fn new(owner: TypeKey, items: Vec<Resolved>) -> Self {
        Self {
            owner,
            items,
            cursor: 0,
        }
    }

    /// The type being constructed.
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Next argument in declared order.
    pub fn next<T: Any + Send + Sync>(&mut self) -> RegistryResult<Arc<T>> {
        let value = self.get::<T>(self.cursor)?;
        self.cursor += 1;
        Ok(value)
    }

    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> RegistryResult<Arc<T>> {
        let item = self.resolved(index)?;
        let label = format!("argument {} of {}", index, self.owner);
        item.erased().downcast_for::<T>(&label)
    }

    pub fn resolved(&self, index: usize) -> RegistryResult<&Resolved> {
        self.items
            .get(index)
            .ok_or_else(|| RegistryError::ArgumentOutOfRange {
                identifier: self.owner.to_string(),
                index,
                len: self.items.len(),
            })
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("owner", &self.owner)
            .field("items", &self.items)
            .field("cursor", &self.cursor)
            .finish()
    }
}
