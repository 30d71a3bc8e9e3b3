pub mod instance_cache;
pub mod registry;
pub mod resolver;
pub mod shared;
pub mod types;
pub mod value_store;

pub use instance_cache::InstanceCache;
pub use registry::Registry;
pub use resolver::ResolutionContext;
pub use shared::{global, SharedContext};
pub use types::{Arguments, Factory, Injectable, RegisteredEntry};
pub use value_store::ValueStore;
