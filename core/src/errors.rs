use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error returned by user factories.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Stable error codes, one per [`RegistryError`] variant.
pub mod error_codes {
    pub const NOT_REGISTERED: &str = "RUST_CORE_DI_NOT_REGISTERED";
    pub const NOT_INSTANTIATED: &str = "RUST_CORE_DI_NOT_INSTANTIATED";
    pub const CYCLIC_DEPENDENCY: &str = "RUST_CORE_DI_CYCLIC_DEPENDENCY";
    pub const DEPTH_EXCEEDED: &str = "RUST_CORE_DI_DEPTH_EXCEEDED";
    pub const TYPE_MISMATCH: &str = "RUST_CORE_DI_TYPE_MISMATCH";
    pub const ARGUMENT_OUT_OF_RANGE: &str = "RUST_CORE_DI_ARGUMENT_OUT_OF_RANGE";
    pub const VALUE_CONFLICT: &str = "RUST_CORE_DI_VALUE_CONFLICT";
    pub const SERIALIZATION: &str = "RUST_CORE_DI_SERIALIZATION";
    pub const CONSTRUCTION: &str = "RUST_CORE_DI_CONSTRUCTION";
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The identifier is in neither the registry nor the value store.
    #[error("NOT REGISTERED: {identifier} is not registered, register it before resolving")]
    NotRegistered { identifier: String },

    /// The identifier is known but no instance has been built for it.
    #[error("NOT INSTANTIATED: {identifier} is registered but has not been instantiated")]
    NotInstantiated { identifier: String },

    #[error("CYCLIC DEPENDENCY: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("DEPTH EXCEEDED: resolving {identifier} went deeper than {limit} levels")]
    DepthExceeded { identifier: String, limit: usize },

    #[error("TYPE MISMATCH: {identifier} holds {found}, requested as {expected}")]
    TypeMismatch {
        identifier: String,
        expected: &'static str,
        found: String,
    },

    #[error("ARGUMENT OUT OF RANGE: {identifier} read argument {index} but only {len} were declared")]
    ArgumentOutOfRange {
        identifier: String,
        index: usize,
        len: usize,
    },

    #[error("VALUE CONFLICT: key {key} already holds {stored}, cannot store {offered}")]
    ValueConflict {
        key: String,
        stored: String,
        offered: &'static str,
    },

    #[error("SERIALIZATION ERROR: {message}")]
    Serialization { message: String },

    /// The factory failed. `source` is the factory's own error, untouched.
    #[error("CONSTRUCTION ERROR: {identifier}: {source}")]
    Construction {
        identifier: String,
        #[source]
        source: BoxError,
    },
}

impl RegistryError {
    /// Stable code for this error, see [`error_codes`].
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotRegistered { .. } => error_codes::NOT_REGISTERED,
            Self::NotInstantiated { .. } => error_codes::NOT_INSTANTIATED,
            Self::CyclicDependency { .. } => error_codes::CYCLIC_DEPENDENCY,
            Self::DepthExceeded { .. } => error_codes::DEPTH_EXCEEDED,
            Self::TypeMismatch { .. } => error_codes::TYPE_MISMATCH,
            Self::ArgumentOutOfRange { .. } => error_codes::ARGUMENT_OUT_OF_RANGE,
            Self::ValueConflict { .. } => error_codes::VALUE_CONFLICT,
            Self::Serialization { .. } => error_codes::SERIALIZATION,
            Self::Construction { .. } => error_codes::CONSTRUCTION,
        }
    }

    /// True for the "known but unbuilt" condition, false for "unknown".
    pub fn is_known_identifier(&self) -> bool {
        matches!(self, Self::NotInstantiated { .. })
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization {
            message: err.to_string(),
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
