//! The module registry: exactly one record per module name.
//!
//! The registry owns every record for the lifetime of a loader instance and
//! is never cleared. It knows nothing about readiness; it only creates,
//! defines and links records.

use crate::record::{Factory, ModuleRecord, ModuleStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Mapping from module name to its record.
#[derive(Debug, Default)]
pub struct Registry {
    records: BTreeMap<String, ModuleRecord>,
}

/// Serializable view of one record, without its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub name: String,
    pub status: ModuleStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ModuleRecord> {
        self.records.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut ModuleRecord> {
        self.records.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn status(&self, name: &str) -> Option<ModuleStatus> {
        self.get(name).map(ModuleRecord::status)
    }

    /// Return the record for `name`, creating it `Pending` if absent.
    ///
    /// `parent`, when given, is added to the record's parents either way.
    pub fn ensure(&mut self, name: &str, parent: Option<&str>) -> &mut ModuleRecord {
        let record = self.records.entry(name.to_string()).or_insert_with(|| {
            debug!(module = name, "registered pending module");
            ModuleRecord::pending(name)
        });
        if let Some(parent) = parent {
            record.add_parent(parent);
        }
        record
    }

    /// Create or update the record for `name` and move it to `Defined`.
    ///
    /// Accumulated parents survive a redefinition.
    pub fn define(&mut self, name: &str, dependencies: Vec<String>, factory: Factory) {
        let record = self.ensure(name, None);
        let previous = record.define(dependencies, factory);
        if previous == ModuleStatus::Ready {
            warn!(
                module = name,
                "redefining a ready module; dependents that already consumed it are not re-run"
            );
        }
        debug!(
            module = name,
            dependencies = ?record.dependency_names(),
            "defined module"
        );
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in deterministic name order.
    pub fn records(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.values()
    }

    pub fn snapshot(&self) -> Vec<RecordSnapshot> {
        self.records()
            .map(|record| RecordSnapshot {
                name: record.name().to_string(),
                status: record.status(),
                dependencies: record.dependency_names().to_vec(),
                parents: record.parents().iter().cloned().collect(),
            })
            .collect()
    }
}
