//! # IDENTIFIERS AND RESOLVED VALUES
//!
//! Keys used by the registry, the instance cache and the value store, and the
//! type-erased shape resolved dependencies travel in.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;

use crate::errors::{RegistryError, RegistryResult};
use crate::hashing;

/// Shared, type-erased object.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// **CLASS IDENTIFIER**
///
/// Identity of a constructible Rust type. Equality and hashing use the
/// `TypeId` only; the name is carried for diagnostics, since two distinct
/// types can print the same.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// **VALUE KEY**
///
/// Hash naming a raw value. Built either from a custom key string (nominal
/// identity) or from the value's canonical serialization (structural
/// identity). Both go through the same hash, so a custom key `"conn"` and a
/// raw string value `"conn"` land on the same key.
#[derive(Clone)]
pub struct ValueKey {
    hash: u64,
    label: Arc<str>,
}

impl ValueKey {
    /// Key for an explicitly supplied custom name.
    pub fn custom(key: &str) -> Self {
        // A &str always serializes.
        let hash = hashing::hash_value(key).unwrap_or_else(|_| hashing::hash_str(key));
        Self {
            hash,
            label: Arc::from(key),
        }
    }

    /// Key derived from the value's content.
    pub fn of_value<V: Serialize + ?Sized>(value: &V) -> RegistryResult<Self> {
        let canonical = hashing::canonical_json(value)?;
        Ok(Self {
            hash: hashing::hash_str(&canonical),
            label: Arc::from(canonical),
        })
    }

    /// Key material goes through the same path as registration.
    pub fn from_material<V>(value: &V, custom_key: Option<&str>) -> RegistryResult<Self>
    where
        V: Serialize + ?Sized,
    {
        match custom_key {
            Some(key) => Ok(Self::custom(key)),
            None => Self::of_value(value),
        }
    }

    /// The 64-bit hash this key compares by.
    pub fn digest(&self) -> u64 {
        self.hash
    }

    /// The custom key, or the canonical text the key was hashed from.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Debug for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueKey({:016x}, {:?})", self.hash, self.label)
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value {:?} [{:016x}]", self.label, self.hash)
    }
}

/// Anything `resolve` accepts, and each element of a dependency list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Class(TypeKey),
    Value(ValueKey),
}

impl Identifier {
    pub fn class<T: 'static>() -> Self {
        Identifier::Class(TypeKey::of::<T>())
    }

    /// A value registered under a custom key.
    pub fn key(key: &str) -> Self {
        Identifier::Value(ValueKey::custom(key))
    }

    /// A value registered by content.
    pub fn value<V: Serialize + ?Sized>(value: &V) -> RegistryResult<Self> {
        Ok(Identifier::Value(ValueKey::of_value(value)?))
    }
}

impl From<TypeKey> for Identifier {
    fn from(key: TypeKey) -> Self {
        Identifier::Class(key)
    }
}

impl From<ValueKey> for Identifier {
    fn from(key: ValueKey) -> Self {
        Identifier::Value(key)
    }
}

impl From<&str> for Identifier {
    fn from(key: &str) -> Self {
        Identifier::key(key)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Class(key) => write!(f, "class {}", key),
            Identifier::Value(key) => fmt::Display::fmt(key, f),
        }
    }
}

/// Dependency lists are ordered sequences of identifiers.
pub type Dependency = Identifier;

/// A type-erased object plus the name of its concrete type.
#[derive(Clone)]
pub struct Erased {
    inner: AnyArc,
    type_name: &'static str,
}

impl Erased {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Same allocation, regardless of type.
    pub fn ptr_eq(&self, other: &Erased) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downcast_for<T: Any + Send + Sync>(
        &self,
        identifier: &dyn fmt::Display,
    ) -> RegistryResult<Arc<T>> {
        self.downcast::<T>()
            .ok_or_else(|| RegistryError::TypeMismatch {
                identifier: identifier.to_string(),
                expected: type_name::<T>(),
                found: self.type_name.to_string(),
            })
    }
}

impl fmt::Debug for Erased {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Erased({})", self.type_name)
    }
}

/// **RESOLVED DEPENDENCY**
///
/// Resolving a class yields a constructed instance; resolving a value yields
/// the raw stored value. Both are shared handles.
#[derive(Debug, Clone)]
pub enum Resolved {
    Instance(Erased),
    Value(Erased),
}

impl Resolved {
    pub fn erased(&self) -> &Erased {
        match self {
            Resolved::Instance(e) | Resolved::Value(e) => e,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Resolved::Value(_))
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.erased().downcast::<T>()
    }
}
