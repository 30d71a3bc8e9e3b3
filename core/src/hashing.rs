//! Canonical serialization and value hashing.
//!
//! A value is turned into a [`serde_json::Value`] first, whose object maps are
//! key-sorted, so two structurally identical values serialize identically no
//! matter how their maps were built. The canonical text is hashed with
//! `seahash`.
//!
//! Collisions are possible and are not detected: two different values that
//! hash alike share one value-store slot. That is an accepted limitation.

use serde::Serialize;

use crate::errors::RegistryResult;

/// Canonical JSON text for `value`.
pub fn canonical_json<V: Serialize + ?Sized>(value: &V) -> RegistryResult<String> {
    let tree = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&tree)?)
}

/// Hash of the UTF-8 bytes of `text`.
pub fn hash_str(text: &str) -> u64 {
    seahash::hash(text.as_bytes())
}

/// Hash of the canonical serialization of `value`.
pub fn hash_value<V: Serialize + ?Sized>(value: &V) -> RegistryResult<u64> {
    Ok(hash_str(&canonical_json(value)?))
}
