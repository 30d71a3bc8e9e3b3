//! Resolver configuration.
//!
//! Defaults can be overridden from the environment:
//!
//! | Variable                          | Field                |
//! |-----------------------------------|----------------------|
//! | `DI_REGISTRY_DETECT_CYCLES`       | `detect_cycles`      |
//! | `DI_REGISTRY_MAX_DEPTH`           | `max_depth`          |
//! | `DI_REGISTRY_WARN_ON_REREGISTER`  | `warn_on_reregister` |

use std::env;
use std::str::FromStr;

pub const ENV_DETECT_CYCLES: &str = "DI_REGISTRY_DETECT_CYCLES";
pub const ENV_MAX_DEPTH: &str = "DI_REGISTRY_MAX_DEPTH";
pub const ENV_WARN_ON_REREGISTER: &str = "DI_REGISTRY_WARN_ON_REREGISTER";

/// Knobs for a [`ResolutionContext`](crate::dependencies::ResolutionContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Fail fast with `CyclicDependency` when a type is re-entered while it is
    /// still being constructed.
    pub detect_cycles: bool,

    /// Limit on resolution nesting when cycle detection is off, so a cycle
    /// ends in `DepthExceeded` rather than a stack overflow. Ignored while
    /// `detect_cycles` is on.
    pub max_depth: usize,

    /// Log a warning when a type is registered again after it was built.
    pub warn_on_reregister: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            detect_cycles: true,
            max_depth: 128,
            warn_on_reregister: true,
        }
    }
}

impl ResolverConfig {
    /// Defaults overlaid with whatever the environment sets.
    pub fn from_env() -> Self {
        Self::default().overlay(|name| env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup. Values that fail to parse
    /// are ignored.
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var::<bool, _>(&lookup, ENV_DETECT_CYCLES) {
            self.detect_cycles = v;
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, ENV_MAX_DEPTH) {
            self.max_depth = v;
        }
        if let Some(v) = parse_var::<bool, _>(&lookup, ENV_WARN_ON_REREGISTER) {
            self.warn_on_reregister = v;
        }
        self
    }

    pub fn with_cycle_detection(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().to_ascii_lowercase().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a valid value", name, raw);
            None
        }
    }
}
