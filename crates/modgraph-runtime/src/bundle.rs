//! Unit text format.
//!
//! A unit is JSON: either one module entry or an array of entries.
//!
//! ```json
//! [
//!   { "id": "a", "value": { "a": "aa" } },
//!   { "id": "b", "deps": ["a"], "exports": { "b": "bb" } }
//! ]
//! ```
//!
//! - `id` is optional and defaults to the unit's own name.
//! - `deps` is an optional list of dependency names.
//! - `value` makes the module's value a constant.
//! - `exports` merges the fields of every object-valued dependency, in
//!   declared order, then overlays the listed fields.
//!
//! Exactly one of `value` and `exports` must be present.

use modgraph_kernel::{Definition, Factory, ModuleValue};
use serde_json::{Map, Value};

/// What is wrong with a single entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryViolation {
    #[error("expected an object")]
    NotAnObject,
    #[error("`id` must be a string")]
    IdNotString,
    #[error("`deps` must be an array of strings")]
    DepsNotStrings,
    #[error("`exports` must be an object")]
    ExportsNotObject,
    #[error("exactly one of `value` or `exports` is required")]
    FactoryShape,
    #[error("unknown field `{0}`")]
    UnknownField(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleError {
    #[error("unit `{unit}` is not valid JSON: {message}")]
    Json { unit: String, message: String },

    #[error("unit `{unit}` defines no modules")]
    Empty { unit: String },

    #[error("unit `{unit}` entry #{index}: {violation}")]
    InvalidEntry {
        unit: String,
        index: usize,
        violation: EntryViolation,
    },
}

/// How a parsed entry produces its value.
#[derive(Debug, Clone, PartialEq)]
pub enum FactoryBody {
    Value(Value),
    Exports(Map<String, Value>),
}

/// One parsed entry, not yet registered.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDefinition {
    pub id: Option<String>,
    pub deps: Vec<String>,
    pub body: FactoryBody,
}

impl UnitDefinition {
    pub fn into_definition(self) -> Definition {
        let factory = match self.body {
            FactoryBody::Value(value) => Factory::value(value),
            FactoryBody::Exports(exports) => Factory::new(move |args| merge_exports(args, exports)),
        };
        let definition = Definition::new(factory).deps(self.deps);
        match self.id {
            Some(id) => definition.id(id),
            None => definition,
        }
    }
}

fn merge_exports(args: Vec<ModuleValue>, exports: Map<String, Value>) -> ModuleValue {
    let mut merged = Map::new();
    for arg in args {
        if let Value::Object(fields) = arg {
            merged.extend(fields);
        }
    }
    merged.extend(exports);
    Value::Object(merged)
}

/// Parse the text of `unit` into its module entries.
pub fn parse_unit(unit: &str, text: &str) -> Result<Vec<UnitDefinition>, BundleError> {
    let document: Value = serde_json::from_str(text).map_err(|e| BundleError::Json {
        unit: unit.to_string(),
        message: e.to_string(),
    })?;

    let entries = match document {
        Value::Array(entries) => entries,
        single => vec![single],
    };
    if entries.is_empty() {
        return Err(BundleError::Empty {
            unit: unit.to_string(),
        });
    }

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            parse_entry(entry).map_err(|violation| BundleError::InvalidEntry {
                unit: unit.to_string(),
                index,
                violation,
            })
        })
        .collect()
}

fn parse_entry(entry: Value) -> Result<UnitDefinition, EntryViolation> {
    let Value::Object(mut fields) = entry else {
        return Err(EntryViolation::NotAnObject);
    };

    let id = match fields.remove("id") {
        None => None,
        Some(Value::String(id)) => Some(id),
        Some(_) => return Err(EntryViolation::IdNotString),
    };

    let deps = match fields.remove("deps") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Ok(name),
                _ => Err(EntryViolation::DepsNotStrings),
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(EntryViolation::DepsNotStrings),
    };

    let body = match (fields.remove("value"), fields.remove("exports")) {
        (Some(value), None) => FactoryBody::Value(value),
        (None, Some(Value::Object(exports))) => FactoryBody::Exports(exports),
        (None, Some(_)) => return Err(EntryViolation::ExportsNotObject),
        _ => return Err(EntryViolation::FactoryShape),
    };

    if let Some(field) = fields.keys().next() {
        return Err(EntryViolation::UnknownField(field.clone()));
    }

    Ok(UnitDefinition { id, deps, body })
}
