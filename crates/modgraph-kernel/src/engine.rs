//! Readiness engine: satisfaction checks and promotion with parent
//! propagation.
//!
//! Promotion is a depth-first cascade up the dependency tree: once a module
//! becomes `Ready`, each of its parents that is `Defined` and now satisfied
//! is promoted in turn, before the next sibling is considered. The cascade
//! runs on an explicit work stack.

use crate::error::EngineError;
use crate::record::{ModuleRecord, ModuleStatus, ModuleValue};
use crate::registry::Registry;
use tracing::debug;

/// True iff every declared dependency of `name` is `Ready`.
///
/// Dependencies missing from the registry count as not ready. An unknown
/// `name` is never satisfied. A `Pending` record has no declared
/// dependencies yet, so it is trivially satisfied; callers check the status
/// separately.
pub fn is_satisfied(registry: &Registry, name: &str) -> bool {
    registry.get(name).is_some_and(|record| {
        record
            .dependency_names()
            .iter()
            .all(|dependency| registry.get(dependency).is_some_and(ModuleRecord::is_ready))
    })
}

/// Declared dependencies of `name` that are not `Ready`, in declared order.
pub fn waiting_on(registry: &Registry, name: &str) -> Vec<String> {
    registry
        .get(name)
        .map(|record| {
            record
                .dependency_names()
                .iter()
                .filter(|dependency| !registry.get(dependency).is_some_and(ModuleRecord::is_ready))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Promote `name` to `Ready` and cascade to its parents.
///
/// Returns every module promoted, in promotion order (`name` first).
/// Promoting a module that is already `Ready` succeeds and promotes nothing.
pub fn promote(registry: &mut Registry, name: &str) -> Result<Vec<String>, EngineError> {
    let status = registry
        .status(name)
        .ok_or_else(|| EngineError::UnknownModule(name.to_string()))?;
    match status {
        ModuleStatus::Ready => return Ok(Vec::new()),
        ModuleStatus::Pending => {
            return Err(EngineError::NotDefined {
                name: name.to_string(),
                status,
            });
        }
        ModuleStatus::Defined => {}
    }

    let waiting = waiting_on(registry, name);
    if !waiting.is_empty() {
        return Err(EngineError::Unsatisfied {
            name: name.to_string(),
            waiting_on: waiting,
        });
    }

    let mut promoted = Vec::new();
    let mut stack = vec![name.to_string()];
    while let Some(current) = stack.pop() {
        // A parent can be pushed once per child; only the first visit that
        // finds it satisfied promotes it.
        if registry.status(&current) != Some(ModuleStatus::Defined)
            || !is_satisfied(registry, &current)
        {
            continue;
        }
        let Some(args) = dependency_values(registry, &current) else {
            continue;
        };
        let Some(record) = registry.get_mut(&current) else {
            continue;
        };
        if !record.resolve(args) {
            continue;
        }
        debug!(module = %current, "module ready");

        // Reversed so the stack visits parents in name order.
        stack.extend(record.parents().iter().rev().cloned());
        promoted.push(current);
    }

    Ok(promoted)
}

fn dependency_values(registry: &Registry, name: &str) -> Option<Vec<ModuleValue>> {
    registry
        .get(name)?
        .dependency_names()
        .iter()
        .map(|dependency| registry.get(dependency).and_then(ModuleRecord::value).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Factory;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn deps(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn unknown_dependency_is_not_satisfied() {
        let mut registry = Registry::new();
        registry.define("b", deps(&["a"]), Factory::noop());
        assert!(!is_satisfied(&registry, "b"));
        assert_eq!(waiting_on(&registry, "b"), deps(&["a"]));
        assert!(!is_satisfied(&registry, "missing"));
    }

    #[test]
    fn module_without_dependencies_is_satisfied() {
        let mut registry = Registry::new();
        registry.define("a", vec![], Factory::noop());
        assert!(is_satisfied(&registry, "a"));
    }

    #[test]
    fn promote_passes_dependency_values_in_declared_order() {
        let mut registry = Registry::new();
        registry.define("x", vec![], Factory::value(json!("xx")));
        registry.define("y", vec![], Factory::value(json!("yy")));
        registry.define(
            "z",
            deps(&["y", "x"]),
            Factory::new(|args| json!([args[0], args[1]])),
        );

        promote(&mut registry, "x").expect("x promotes");
        promote(&mut registry, "y").expect("y promotes");
        promote(&mut registry, "z").expect("z promotes");

        assert_eq!(
            registry.get("z").and_then(ModuleRecord::value),
            Some(&json!(["yy", "xx"]))
        );
    }

    #[test]
    fn promote_cascades_through_parents() {
        let mut registry = Registry::new();
        registry.define(
            "b",
            deps(&["a"]),
            Factory::new(|args| json!({ "a": args[0]["a"], "b": "bb" })),
        );
        registry.define(
            "c",
            deps(&["a", "b"]),
            Factory::new(|args| json!({ "a": args[0]["a"], "b": args[1]["b"], "c": "cc" })),
        );
        registry.ensure("a", Some("b"));
        registry.ensure("a", Some("c"));
        registry.ensure("b", Some("c"));
        registry.define("a", vec![], Factory::value(json!({ "a": "aa" })));

        let promoted = promote(&mut registry, "a").expect("a promotes");
        assert_eq!(promoted, deps(&["a", "b", "c"]));
        assert_eq!(
            registry.get("c").and_then(ModuleRecord::value),
            Some(&json!({ "a": "aa", "b": "bb", "c": "cc" }))
        );
    }

    #[test]
    fn promote_is_idempotent_on_ready_module() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut registry = Registry::new();
        registry.define(
            "a",
            vec![],
            Factory::new(move |_| {
                counter.set(counter.get() + 1);
                json!(1)
            }),
        );

        assert_eq!(promote(&mut registry, "a").expect("first promote"), deps(&["a"]));
        assert!(promote(&mut registry, "a").expect("second promote").is_empty());
        assert_eq!(calls.get(), 1);
        assert_eq!(registry.get("a").and_then(ModuleRecord::value), Some(&json!(1)));
    }

    #[test]
    fn promote_rejects_violated_preconditions() {
        let mut registry = Registry::new();
        registry.ensure("a", Some("b"));
        registry.define("b", deps(&["a"]), Factory::noop());

        assert_eq!(
            promote(&mut registry, "missing"),
            Err(EngineError::UnknownModule("missing".to_string()))
        );
        assert_eq!(
            promote(&mut registry, "a"),
            Err(EngineError::NotDefined {
                name: "a".to_string(),
                status: ModuleStatus::Pending,
            })
        );
        assert_eq!(
            promote(&mut registry, "b"),
            Err(EngineError::Unsatisfied {
                name: "b".to_string(),
                waiting_on: deps(&["a"]),
            })
        );
        assert_eq!(registry.status("b"), Some(ModuleStatus::Defined));
    }

    #[test]
    fn cascade_skips_parents_still_waiting_elsewhere() {
        let mut registry = Registry::new();
        registry.define("c", deps(&["a", "b"]), Factory::noop());
        registry.ensure("a", Some("c"));
        registry.ensure("b", Some("c"));
        registry.define("a", vec![], Factory::noop());

        assert_eq!(promote(&mut registry, "a").expect("a promotes"), deps(&["a"]));
        assert_eq!(registry.status("c"), Some(ModuleStatus::Defined));
    }

    #[test]
    fn deep_chains_do_not_recurse() {
        let mut registry = Registry::new();
        let depth = 10_000;
        for i in 1..depth {
            let name = format!("m{i}");
            let dep = format!("m{}", i - 1);
            registry.define(&name, vec![dep.clone()], Factory::noop());
            registry.ensure(&dep, Some(name.as_str()));
        }
        registry.define("m0", vec![], Factory::noop());

        let promoted = promote(&mut registry, "m0").expect("chain promotes");
        assert_eq!(promoted.len(), depth);
        assert_eq!(registry.status(&format!("m{}", depth - 1)), Some(ModuleStatus::Ready));
    }
}
