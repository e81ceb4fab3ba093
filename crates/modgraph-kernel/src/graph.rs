//! `ModuleGraph`: the public entry points over registry, engine and batch.
//!
//! The graph never defers anything itself. `define` and `require` register
//! and enroll; the host decides when the window ends and calls [`flush`]
//! once per window (an event-loop host does it from a deferred task, a
//! synchronous host calls it explicitly).
//!
//! [`flush`]: ModuleGraph::flush

use crate::batch::{BatchSet, ResolutionReport, resolve};
use crate::capability::{CurrentUnit, Fetcher, NoCurrentUnit};
use crate::definition::{AnonymousNames, Definition, validate_dependencies, validate_id};
use crate::engine;
use crate::error::{EngineError, LoaderError};
use crate::record::{Factory, ModuleStatus, ModuleValue};
use crate::registry::{RecordSnapshot, Registry};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Serializable view of the whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub modules: Vec<RecordSnapshot>,
    /// Names enrolled in the open window, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub batch: Vec<String>,
}

impl GraphSnapshot {
    pub fn count(&self, status: ModuleStatus) -> usize {
        self.modules.iter().filter(|m| m.status == status).count()
    }
}

/// One loader instance: registry, open batch, and injected collaborators.
pub struct ModuleGraph {
    registry: Registry,
    batch: BatchSet,
    anonymous: AnonymousNames,
    fetcher: Box<dyn Fetcher>,
    current_unit: Box<dyn CurrentUnit>,
}

impl ModuleGraph {
    pub fn new(fetcher: impl Fetcher + 'static) -> Self {
        Self {
            registry: Registry::new(),
            batch: BatchSet::default(),
            anonymous: AnonymousNames::default(),
            fetcher: Box::new(fetcher),
            current_unit: Box::new(NoCurrentUnit),
        }
    }

    /// Use `current_unit` to name `define` calls that carry no id.
    pub fn with_current_unit(mut self, current_unit: impl CurrentUnit + 'static) -> Self {
        self.current_unit = Box::new(current_unit);
        self
    }

    /// Register a module definition and enroll it in the open window.
    ///
    /// Returns the module's name. Nothing is resolved until [`flush`].
    ///
    /// [`flush`]: ModuleGraph::flush
    pub fn define(&mut self, definition: Definition) -> Result<String, LoaderError> {
        let Definition {
            id,
            dependencies,
            factory,
        } = definition;

        let name = match id {
            Some(id) => {
                validate_id(&id)?;
                id
            }
            None => self
                .current_unit
                .current_unit_name()
                .ok_or(LoaderError::UnknownCurrentUnit)?,
        };
        validate_dependencies(&name, &dependencies)?;

        self.enroll(&name, dependencies, factory);
        Ok(name)
    }

    /// Request `dependencies` and run `callback` with their values once all
    /// are ready.
    ///
    /// The request is registered under a fresh synthetic name, which is
    /// returned. Synthetic names are never fetched.
    pub fn require<I, S, F>(&mut self, dependencies: I, callback: F) -> Result<String, LoaderError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(Vec<ModuleValue>) + 'static,
    {
        let dependencies: Vec<String> = dependencies.into_iter().map(Into::into).collect();
        validate_dependencies("require", &dependencies)?;

        let name = self.anonymous.next_name();
        let factory = Factory::new(move |values| {
            callback(values);
            ModuleValue::Null
        });
        self.enroll(&name, dependencies, factory);
        Ok(name)
    }

    fn enroll(&mut self, name: &str, dependencies: Vec<String>, factory: Factory) {
        self.registry.define(name, dependencies, factory);
        if self.batch.enroll(name) {
            debug!(module = name, batch = self.batch.len(), "enrolled in batch");
        }
    }

    /// Whether definitions are waiting for a resolution pass.
    pub fn has_pending_batch(&self) -> bool {
        !self.batch.is_empty()
    }

    /// Run the resolution pass for the open window and close it.
    pub fn flush(&mut self) -> ResolutionReport {
        if self.batch.is_empty() {
            return ResolutionReport::default();
        }
        // Taken out so a panicking factory cannot leave stale batch entries.
        let mut batch = std::mem::take(&mut self.batch);
        let report = resolve(&mut self.registry, &mut batch, self.fetcher.as_mut());
        debug!(
            promoted = report.promoted.len(),
            requested = report.requested.len(),
            waiting = report.waiting.len(),
            "resolution pass complete"
        );
        report
    }

    pub fn is_satisfied(&self, name: &str) -> bool {
        engine::is_satisfied(&self.registry, name)
    }

    /// Promote one module directly, outside a resolution pass.
    pub fn promote(&mut self, name: &str) -> Result<Vec<String>, EngineError> {
        let promoted = engine::promote(&mut self.registry, name)?;
        for module in &promoted {
            self.batch.remove(module);
        }
        Ok(promoted)
    }

    pub fn status(&self, name: &str) -> Option<ModuleStatus> {
        self.registry.status(name)
    }

    /// Declared dependencies of `name` that are not ready yet.
    pub fn waiting_on(&self, name: &str) -> Vec<String> {
        engine::waiting_on(&self.registry, name)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            modules: self.registry.snapshot(),
            batch: self.batch.names().to_vec(),
        }
    }
}

impl fmt::Debug for ModuleGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleGraph")
            .field("registry", &self.registry)
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}
