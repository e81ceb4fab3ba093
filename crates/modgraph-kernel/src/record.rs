//! Module records: the per-name state machine owned by the registry.
//!
//! A record moves `Pending -> Defined -> Ready`. The only way back is an
//! explicit redefinition, which returns it to `Defined` with a fresh factory
//! while keeping every accumulated parent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The value a module produces. "Nothing" is `Value::Null`.
pub type ModuleValue = serde_json::Value;

/// Lifecycle status of a module record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Known only as somebody's dependency; a fetch has been requested.
    Pending,
    /// Dependencies and factory are known; waiting for dependencies.
    Defined,
    /// Factory has run and the value is available.
    Ready,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Pending => "pending",
            ModuleStatus::Defined => "defined",
            ModuleStatus::Ready => "ready",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

type FactoryFn = Box<dyn FnOnce(Vec<ModuleValue>) -> ModuleValue>;

enum FactoryKind {
    Call(FactoryFn),
    Value(ModuleValue),
    Noop,
}

/// Computes a module's value from its resolved dependency values.
///
/// A factory is consumed when it runs, so each definition can produce at
/// most one value.
pub struct Factory(FactoryKind);

impl Factory {
    /// Wrap a callable. It receives dependency values in declared order.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Vec<ModuleValue>) -> ModuleValue + 'static,
    {
        Self(FactoryKind::Call(Box::new(f)))
    }

    /// A constant factory: the module's value is `value`, whatever the
    /// dependencies resolve to.
    pub fn value(value: ModuleValue) -> Self {
        Self(FactoryKind::Value(value))
    }

    /// The factory that returns nothing.
    pub fn noop() -> Self {
        Self(FactoryKind::Noop)
    }

    /// Run the factory.
    pub fn invoke(self, args: Vec<ModuleValue>) -> ModuleValue {
        match self.0 {
            FactoryKind::Call(f) => f(args),
            FactoryKind::Value(value) => value,
            FactoryKind::Noop => ModuleValue::Null,
        }
    }
}

impl Default for Factory {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            FactoryKind::Call(_) => f.write_str("Factory::Call(..)"),
            FactoryKind::Value(value) => write!(f, "Factory::Value({value})"),
            FactoryKind::Noop => f.write_str("Factory::Noop"),
        }
    }
}

#[derive(Debug)]
enum ModuleState {
    Pending,
    Defined {
        dependencies: Vec<String>,
        /// Taken out while the factory runs; `None` afterwards only if it
        /// panicked.
        factory: Option<Factory>,
    },
    Ready {
        dependencies: Vec<String>,
        value: ModuleValue,
    },
}

/// One record per distinct module name.
#[derive(Debug)]
pub struct ModuleRecord {
    name: String,
    parents: BTreeSet<String>,
    state: ModuleState,
}

impl ModuleRecord {
    pub(crate) fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: BTreeSet::new(),
            state: ModuleState::Pending,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ModuleStatus {
        match self.state {
            ModuleState::Pending => ModuleStatus::Pending,
            ModuleState::Defined { .. } => ModuleStatus::Defined,
            ModuleState::Ready { .. } => ModuleStatus::Ready,
        }
    }

    /// Declared dependencies, in order. Empty while `Pending`.
    pub fn dependency_names(&self) -> &[String] {
        match &self.state {
            ModuleState::Pending => &[],
            ModuleState::Defined { dependencies, .. } | ModuleState::Ready { dependencies, .. } => {
                dependencies
            }
        }
    }

    /// Names of the modules and requests that depend on this one.
    pub fn parents(&self) -> &BTreeSet<String> {
        &self.parents
    }

    /// The produced value; present iff the record is `Ready`. Outside the
    /// kernel, values only reach factories and `require` callbacks.
    pub(crate) fn value(&self) -> Option<&ModuleValue> {
        match &self.state {
            ModuleState::Ready { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModuleState::Ready { .. })
    }

    /// Returns false when `parent` was already recorded.
    pub(crate) fn add_parent(&mut self, parent: impl Into<String>) -> bool {
        self.parents.insert(parent.into())
    }

    /// Enter `Defined` with a new dependency list and factory. Returns the
    /// status the record had before.
    pub(crate) fn define(&mut self, dependencies: Vec<String>, factory: Factory) -> ModuleStatus {
        let previous = self.status();
        self.state = ModuleState::Defined {
            dependencies,
            factory: Some(factory),
        };
        previous
    }

    /// Run the factory with `args` and enter `Ready`.
    ///
    /// Only meaningful on a `Defined` record; any other state is left
    /// untouched and `false` is returned. The record stays `Defined` while
    /// the factory runs, so a panicking factory leaves it `Defined` with no
    /// factory, and it never resolves until it is redefined.
    pub(crate) fn resolve(&mut self, args: Vec<ModuleValue>) -> bool {
        let ModuleState::Defined { factory, .. } = &mut self.state else {
            return false;
        };
        let Some(factory) = factory.take() else {
            return false;
        };
        let value = factory.invoke(args);
        let ModuleState::Defined { dependencies, .. } = &mut self.state else {
            return false;
        };
        let dependencies = std::mem::take(dependencies);
        self.state = ModuleState::Ready {
            dependencies,
            value,
        };
        true
    }
}
