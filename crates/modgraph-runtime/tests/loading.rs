//! End-to-end loading on a local task set.

use async_trait::async_trait;
use modgraph_kernel::{Definition, Factory, ModuleStatus};
use modgraph_runtime::{
    DirectorySource, FetchError, Loader, LoaderConfig, MemorySource, ModuleSource, RuntimeError,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;

const BUNDLE: &str = r#"[
  { "id": "a", "value": { "a": "aa" } },
  { "id": "b", "deps": ["a"], "exports": { "b": "bb" } },
  { "id": "c", "deps": ["a", "b"], "exports": { "c": "cc" } },
  { "id": "d", "deps": ["a", "b", "c"], "exports": { "d": "dd" } },
  { "id": "e", "deps": ["a", "b", "c", "d"], "exports": { "e": "ee" } }
]"#;

/// Records every unit fetched before delegating.
#[derive(Clone, Default)]
struct CountingSource {
    units: MemorySource,
    fetched: Rc<RefCell<Vec<String>>>,
}

impl CountingSource {
    fn with_unit(mut self, unit: &str, text: &str) -> Self {
        self.units.insert(unit, text);
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

#[async_trait(?Send)]
impl ModuleSource for CountingSource {
    async fn fetch(&self, unit: &str) -> Result<String, FetchError> {
        self.fetched.borrow_mut().push(unit.to_string());
        self.units.fetch(unit).await
    }
}

fn unique_temp_dir(prefix: &str) -> std::path::PathBuf {
    let unique = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{}-{unique}", std::process::id()))
}

#[tokio::test]
async fn bundled_unit_resolves_every_module_it_carries() {
    LocalSet::new()
        .run_until(async {
            let source = CountingSource::default().with_unit("a", BUNDLE);
            let loader = Loader::with_source(LoaderConfig::default(), source.clone());

            let values = loader.require(["a"]).await.expect("a resolves");
            assert_eq!(values, vec![json!({ "a": "aa" })]);

            let values = loader.require(["e", "c"]).await.expect("e and c resolve");
            assert_eq!(
                values,
                vec![
                    json!({ "a": "aa", "b": "bb", "c": "cc", "d": "dd", "e": "ee" }),
                    json!({ "a": "aa", "b": "bb", "c": "cc" }),
                ]
            );
            assert_eq!(source.fetched(), vec!["a".to_string()]);
        })
        .await;
}

#[tokio::test]
async fn split_units_are_fetched_in_one_window_and_named_after_themselves() {
    LocalSet::new()
        .run_until(async {
            let source = CountingSource::default()
                .with_unit(
                    "app",
                    r#"{ "deps": ["util", "config"], "exports": { "app": true } }"#,
                )
                .with_unit("util", r#"{ "value": { "util": "v1" } }"#)
                .with_unit("config", r#"{ "value": { "debug": false } }"#);
            let loader = Loader::with_source(LoaderConfig::default(), source.clone());

            let values = loader.require(["app"]).await.expect("app resolves");
            assert_eq!(
                values,
                vec![json!({ "app": true, "debug": false, "util": "v1" })]
            );

            loader.settle().await;
            assert_eq!(source.fetched(), vec!["app", "util", "config"]);
            insta::assert_json_snapshot!(loader.snapshot().expect("graph is free"), @r#"
            {
              "modules": [
                {
                  "name": "__anon__0",
                  "status": "ready",
                  "dependencies": [
                    "app"
                  ]
                },
                {
                  "name": "app",
                  "status": "ready",
                  "dependencies": [
                    "util",
                    "config"
                  ],
                  "parents": [
                    "__anon__0"
                  ]
                },
                {
                  "name": "config",
                  "status": "ready",
                  "parents": [
                    "app"
                  ]
                },
                {
                  "name": "util",
                  "status": "ready",
                  "parents": [
                    "app"
                  ]
                }
              ]
            }
            "#);
        })
        .await;
}

#[tokio::test]
async fn concurrent_requests_share_one_fetch() {
    LocalSet::new()
        .run_until(async {
            let source = CountingSource::default().with_unit("a", BUNDLE);
            let loader = Loader::with_source(LoaderConfig::default(), source.clone());

            let (first, second) = tokio::join!(loader.require(["b"]), loader.require(["a", "b"]));
            // `b` is not a unit of its own; it arrives inside `a`.
            assert_eq!(first.expect("first").len(), 1);
            assert_eq!(second.expect("second").len(), 2);

            loader.settle().await;
            let mut fetched = source.fetched();
            fetched.sort();
            assert_eq!(fetched, vec!["a", "b"]);
        })
        .await;
}

#[tokio::test]
async fn missing_unit_times_out_naming_what_never_arrived() {
    LocalSet::new()
        .run_until(async {
            let source = MemorySource::new()
                .with_unit("app", r#"{ "deps": ["lib"], "exports": {} }"#)
                .with_unit("lib", r#"{ "deps": ["ghost"], "value": 1 }"#);
            let config = LoaderConfig::default().with_require_timeout(Duration::from_millis(50));
            let loader = Loader::with_source(config, source);

            let err = loader.require(["app"]).await.expect_err("ghost never arrives");
            match err {
                RuntimeError::DependencyTimeout {
                    dependencies,
                    missing,
                    waited_ms,
                } => {
                    assert_eq!(dependencies, vec!["app".to_string()]);
                    assert_eq!(missing, vec!["ghost".to_string()]);
                    assert_eq!(waited_ms, 50);
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(loader.status("ghost"), Some(ModuleStatus::Pending));
            assert_eq!(loader.status("app"), Some(ModuleStatus::Defined));
        })
        .await;
}

#[tokio::test]
async fn late_definition_unblocks_a_stalled_request() {
    LocalSet::new()
        .run_until(async {
            let loader = Loader::with_source(LoaderConfig::default(), MemorySource::new());
            let received = Rc::new(RefCell::new(None));
            let sink = Rc::clone(&received);

            loader
                .require_with(["ghost"], move |values| *sink.borrow_mut() = Some(values))
                .expect("require ghost");
            loader.settle().await;
            assert!(received.borrow().is_none());
            assert_eq!(loader.undelivered(&["ghost".to_string()]), vec!["ghost".to_string()]);

            loader
                .define(Definition::new(Factory::value(json!("boo"))).id("ghost"))
                .expect("define ghost");
            loader.settle().await;
            assert_eq!(*received.borrow(), Some(vec![json!("boo")]));
        })
        .await;
}

#[tokio::test]
async fn unit_that_skips_its_own_name_leaves_it_pending() {
    LocalSet::new()
        .run_until(async {
            let source =
                MemorySource::new().with_unit("alias", r#"{ "id": "other", "value": 1 }"#);
            let loader = Loader::with_source(LoaderConfig::default(), source);

            loader.require_with(["alias"], |_| {}).expect("require alias");
            loader.settle().await;

            assert_eq!(loader.status("alias"), Some(ModuleStatus::Pending));
            assert_eq!(loader.status("other"), Some(ModuleStatus::Ready));
        })
        .await;
}

#[tokio::test]
async fn calls_from_inside_a_factory_join_the_next_window() {
    LocalSet::new()
        .run_until(async {
            let loader = Loader::with_source(LoaderConfig::default(), MemorySource::new());
            let nested = loader.clone();
            let inner_seen = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&inner_seen);

            loader
                .define(
                    Definition::new(Factory::new(move |_| {
                        nested
                            .define(Definition::new(Factory::value(json!("late"))).id("late"))
                            .expect("deferred define");
                        nested
                            .require_with(["late"], move |values| sink.borrow_mut().extend(values))
                            .expect("deferred require");
                        json!("outer")
                    }))
                    .id("outer"),
                )
                .expect("define outer");

            let values = loader.require(["outer", "late"]).await.expect("both resolve");
            assert_eq!(values, vec![json!("outer"), json!("late")]);

            loader.settle().await;
            assert_eq!(*inner_seen.borrow(), vec![json!("late")]);
        })
        .await;
}

#[tokio::test]
async fn directory_source_loads_units_from_disk() {
    let root = unique_temp_dir("modgraph-loading");
    std::fs::create_dir_all(root.join("lib")).expect("create temp dir");
    std::fs::write(
        root.join("main.json"),
        r#"{ "deps": ["lib/strings"], "exports": { "main": 1 } }"#,
    )
    .expect("write main");
    std::fs::write(root.join("lib/strings.json"), r#"{ "value": { "greeting": "hi" } }"#)
        .expect("write lib");

    LocalSet::new()
        .run_until(async {
            let config = LoaderConfig::default().with_source_root(&root);
            assert_eq!(
                DirectorySource::new(&config.source_root, &config.extension)
                    .unit_path("main")
                    .expect("valid name"),
                root.join("main.json")
            );

            let loader = Loader::new(config);
            let values = loader.require(["main"]).await.expect("main resolves");
            assert_eq!(values, vec![json!({ "greeting": "hi", "main": 1 })]);
        })
        .await;

    std::fs::remove_dir_all(&root).expect("clean up temp dir");
}

#[tokio::test]
async fn invalid_request_fails_before_registering() {
    LocalSet::new()
        .run_until(async {
            let loader = Loader::with_source(LoaderConfig::default(), MemorySource::new());
            let err = loader.require(["ok", ""]).await.expect_err("empty name");
            assert!(matches!(err, RuntimeError::Loader(_)));
            assert!(loader.snapshot().expect("graph is free").modules.is_empty());
        })
        .await;
}
