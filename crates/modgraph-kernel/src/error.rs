//! Error types for kernel operations.

use crate::record::ModuleStatus;

/// Contract violations reported synchronously by the entry points.
///
/// When one of these is returned, the registry has not been touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoaderError {
    /// An explicit module id was empty.
    #[error("module id must not be empty")]
    EmptyModuleId,

    /// An explicit module id collides with the synthetic request namespace.
    #[error("module id `{0}` uses the reserved prefix `__anon__`")]
    ReservedModuleId(String),

    #[error("dependency #{index} of `{module}` is empty")]
    EmptyDependencyName { module: String, index: usize },

    #[error("dependency `{dependency}` of `{module}` uses the reserved prefix `__anon__`")]
    ReservedDependencyName { module: String, dependency: String },

    /// `define` was called without an id while no unit is being evaluated.
    #[error("define called without an id and no unit is currently being evaluated")]
    UnknownCurrentUnit,
}

/// Violated preconditions of the readiness engine.
///
/// Resolution passes never trigger these; they only surface when `promote`
/// is driven directly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("module not found: {0}")]
    UnknownModule(String),

    #[error("module `{name}` cannot be promoted while {status}")]
    NotDefined { name: String, status: ModuleStatus },

    #[error("module `{name}` is waiting on: {}", .waiting_on.join(", "))]
    Unsatisfied {
        name: String,
        waiting_on: Vec<String>,
    },
}
