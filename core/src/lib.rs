//! # DI REGISTRY CORE LIBRARY
//!
//! **SINGLETON DEPENDENCY-INJECTION REGISTRY**
//!
//! **ARCHITECTURE**: Registry of construction recipes, instance cache and
//! content-addressed value store behind one resolution context
//! **GUARANTEE**: Each class is constructed at most once per context, after all
//! of its dependencies
//! **THREADING**: `SharedContext` serializes access behind a single lock
//!
//! ```
//! use std::sync::Arc;
//! use di_registry::{Arguments, BoxError, Dependency, ResolutionContext};
//!
//! struct Repo {
//!     connection: Arc<String>,
//! }
//!
//! let mut ctx = ResolutionContext::new();
//! ctx.register_value(String::from("db://localhost:27017"), Some("conn"))?;
//! ctx.register(vec![Dependency::key("conn")], |args: &mut Arguments| {
//!     Ok::<_, BoxError>(Repo { connection: args.next()? })
//! });
//!
//! let repo = ctx.resolve::<Repo>()?;
//! assert_eq!(*repo.connection, "db://localhost:27017");
//! # Ok::<(), di_registry::RegistryError>(())
//! ```

pub mod api;
pub mod config;
pub mod dependencies;
pub mod errors;
pub mod hashing;
pub mod keyed;
pub mod types;

pub use api::*;
