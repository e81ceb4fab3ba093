//! Batch set and the resolution pass run once per definition window.
//!
//! One fetched unit may define several modules, in any order. Those
//! definitions are collected in a [`BatchSet`] and resolved together:
//!
//! ```text
//! scan batch ──► promote every Defined + satisfied module ──┐
//!     ▲                                                      │
//!     └────────────── repeat while something promoted ◄──────┘
//!                              │
//!                              ▼
//!  link remaining modules to their dependencies, fetch unknown ones
//!                              │
//!                              ▼
//!                        clear the batch
//! ```

use crate::capability::Fetcher;
use crate::engine::{is_satisfied, promote};
use crate::record::ModuleStatus;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Names defined during the currently open window, in enrollment order.
#[derive(Debug, Clone, Default)]
pub struct BatchSet {
    names: Vec<String>,
}

impl BatchSet {
    /// Returns false when `name` was already enrolled.
    pub fn enroll(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn remove(&mut self, name: &str) {
        self.names.retain(|n| n != name);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Modules that became `Ready`, in promotion order. Includes parents
    /// from earlier windows reached by the cascade.
    pub promoted: Vec<String>,
    /// Dependencies handed to the fetcher, in request order.
    pub requested: Vec<String>,
    /// Batch members still waiting on dependencies after the pass.
    pub waiting: Vec<String>,
}

impl ResolutionReport {
    pub fn is_empty(&self) -> bool {
        self.promoted.is_empty() && self.requested.is_empty() && self.waiting.is_empty()
    }
}

/// Run one resolution pass over `batch` and clear it.
pub fn resolve(
    registry: &mut Registry,
    batch: &mut BatchSet,
    fetcher: &mut dyn Fetcher,
) -> ResolutionReport {
    let mut report = ResolutionReport::default();

    // Fixed point: a module defined earlier in the window may depend on one
    // defined later, so keep scanning until a scan promotes nothing.
    let mut scan = 0usize;
    loop {
        scan += 1;
        let mut progressed = false;
        let candidates = batch.names().to_vec();
        trace!(scan, candidates = candidates.len(), "scanning batch");

        for name in candidates {
            if !batch.contains(&name)
                || registry.status(&name) != Some(ModuleStatus::Defined)
                || !is_satisfied(registry, &name)
            {
                continue;
            }
            match promote(registry, &name) {
                Ok(promoted) => {
                    for module in &promoted {
                        batch.remove(module);
                    }
                    progressed |= !promoted.is_empty();
                    report.promoted.extend(promoted);
                }
                Err(error) => debug!(module = %name, %error, "promotion skipped"),
            }
        }

        if !progressed {
            break;
        }
    }

    for name in batch.names() {
        let dependencies = registry
            .get(name)
            .map(|record| record.dependency_names().to_vec())
            .unwrap_or_default();
        for dependency in dependencies {
            let known = registry.contains(&dependency);
            registry.ensure(&dependency, Some(name.as_str()));
            if !known {
                debug!(module = %dependency, parent = %name, "requesting fetch");
                fetcher.load(&dependency);
                report.requested.push(dependency);
            }
        }
        report.waiting.push(name.clone());
    }

    batch.clear();
    report
}
