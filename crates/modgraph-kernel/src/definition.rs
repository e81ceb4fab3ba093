//! Definition intents accepted by the entry points, and their validation.

use crate::error::LoaderError;
use crate::record::Factory;

/// Prefix of the private names synthesized for `require` requests.
///
/// Explicit ids and dependency names may not start with it, which keeps
/// synthetic names unreachable from any module declaration.
pub const ANON_PREFIX: &str = "__anon__";

/// One call to `define`: an optional id, ordered dependency names, and a
/// factory.
#[derive(Debug, Default)]
pub struct Definition {
    pub id: Option<String>,
    pub dependencies: Vec<String>,
    pub factory: Factory,
}

impl Definition {
    pub fn new(factory: Factory) -> Self {
        Self {
            id: None,
            dependencies: Vec::new(),
            factory,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn deps<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }
}

/// Reject an explicit id that is empty or lives in the synthetic namespace.
pub fn validate_id(id: &str) -> Result<(), LoaderError> {
    if id.is_empty() {
        return Err(LoaderError::EmptyModuleId);
    }
    if id.starts_with(ANON_PREFIX) {
        return Err(LoaderError::ReservedModuleId(id.to_string()));
    }
    Ok(())
}

/// Reject dependency names that are empty or synthetic.
pub fn validate_dependencies(module: &str, dependencies: &[String]) -> Result<(), LoaderError> {
    for (index, dependency) in dependencies.iter().enumerate() {
        if dependency.is_empty() {
            return Err(LoaderError::EmptyDependencyName {
                module: module.to_string(),
                index,
            });
        }
        if dependency.starts_with(ANON_PREFIX) {
            return Err(LoaderError::ReservedDependencyName {
                module: module.to_string(),
                dependency: dependency.clone(),
            });
        }
    }
    Ok(())
}

/// Monotonic source of synthetic request names.
#[derive(Debug, Default)]
pub struct AnonymousNames {
    next: u64,
}

impl AnonymousNames {
    pub fn next_name(&mut self) -> String {
        let name = format!("{ANON_PREFIX}{}", self.next);
        self.next += 1;
        name
    }
}
