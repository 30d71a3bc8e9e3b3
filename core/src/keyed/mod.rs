//! String-keyed container.
//!
//! A lighter sibling of [`ResolutionContext`](crate::ResolutionContext):
//! classes and runtime values share one case-insensitive namespace of string
//! keys, and classes are built fresh on every resolution.

pub mod container;

pub use container::KeyedContainer;
