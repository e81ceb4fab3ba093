//! Event-loop host for the kernel.
//!
//! The loader owns a [`ModuleGraph`] and drives it from a tokio
//! [`LocalSet`](tokio::task::LocalSet):
//!
//! - every `define` or `require` restarts the window: the flush task
//!   scheduled by the previous call is aborted and a new one is spawned,
//!   so calls made in the same turn of the event loop resolve in one pass;
//! - every fetch the kernel asks for becomes a local task that reads the
//!   unit from the [`ModuleSource`], parses it, and defines its modules
//!   with the unit's name as the current unit;
//! - calls made from inside a factory (while a pass holds the graph) are
//!   validated at once and applied right after the pass, as the next
//!   window.
//!
//! Fetch failures are logged and otherwise ignored: the record stays
//! `Pending` and its dependents keep waiting.

use crate::bundle::{UnitDefinition, parse_unit};
use crate::config::LoaderConfig;
use crate::error::RuntimeError;
use crate::source::{DirectorySource, ModuleSource};
use modgraph_kernel::definition::{validate_dependencies, validate_id};
use modgraph_kernel::{
    Definition, Fetcher, GraphSnapshot, LoaderError, ModuleGraph, ModuleStatus, ModuleValue,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Callback = Box<dyn FnOnce(Vec<ModuleValue>)>;

/// A call that arrived while a pass was running.
enum Deferred {
    Define(Definition),
    Require {
        dependencies: Vec<String>,
        callback: Callback,
    },
}

struct LoaderInner {
    graph: RefCell<ModuleGraph>,
    source: Rc<dyn ModuleSource>,
    config: LoaderConfig,
    /// Name of the unit being evaluated, if any.
    current_unit: Rc<RefCell<Option<String>>>,
    /// Flush task for the open window.
    scheduled: RefCell<Option<JoinHandle<()>>>,
    deferred: RefCell<VecDeque<Deferred>>,
    in_flight: Cell<usize>,
    idle: Notify,
}

/// Handle to one loader. Clones share the same graph.
///
/// Anything that starts work spawns onto the current
/// [`LocalSet`](tokio::task::LocalSet), so the loader must be driven from
/// inside one.
#[derive(Clone)]
pub struct Loader {
    inner: Rc<LoaderInner>,
}

/// The kernel's fetch capability: spawn a local task per unit.
struct SpawnFetcher {
    loader: Weak<LoaderInner>,
}

impl Fetcher for SpawnFetcher {
    fn load(&mut self, name: &str) {
        let Some(inner) = self.loader.upgrade() else {
            return;
        };
        inner.in_flight.set(inner.in_flight.get() + 1);
        let loader = Loader { inner };
        let unit = name.to_string();
        tokio::task::spawn_local(async move { loader.fetch_unit(unit).await });
    }
}

impl Loader {
    /// A loader reading units from `config.source_root`.
    pub fn new(config: LoaderConfig) -> Self {
        let source = DirectorySource::new(config.source_root.clone(), config.extension.clone());
        Self::with_source(config, source)
    }

    pub fn with_source(config: LoaderConfig, source: impl ModuleSource + 'static) -> Self {
        let current_unit: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let inner = Rc::new_cyclic(|weak: &Weak<LoaderInner>| {
            let unit = Rc::clone(&current_unit);
            let graph = ModuleGraph::new(SpawnFetcher {
                loader: weak.clone(),
            })
            .with_current_unit(move || unit.borrow().clone());

            LoaderInner {
                graph: RefCell::new(graph),
                source: Rc::new(source),
                config,
                current_unit,
                scheduled: RefCell::new(None),
                deferred: RefCell::new(VecDeque::new()),
                in_flight: Cell::new(0),
                idle: Notify::new(),
            }
        });
        Self { inner }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Register a module definition; returns its name.
    ///
    /// Without an id the definition is named after the unit being
    /// evaluated, and fails with [`LoaderError::UnknownCurrentUnit`] outside
    /// of one.
    pub fn define(&self, definition: Definition) -> Result<String, LoaderError> {
        let Ok(mut graph) = self.inner.graph.try_borrow_mut() else {
            return self.defer_define(definition);
        };
        let name = graph.define(definition)?;
        drop(graph);
        self.schedule_pass();
        Ok(name)
    }

    fn defer_define(&self, mut definition: Definition) -> Result<String, LoaderError> {
        let name = match definition.id.take() {
            Some(id) => {
                validate_id(&id)?;
                id
            }
            None => self
                .inner
                .current_unit
                .borrow()
                .clone()
                .ok_or(LoaderError::UnknownCurrentUnit)?,
        };
        validate_dependencies(&name, &definition.dependencies)?;

        debug!(module = %name, "define deferred until the running pass ends");
        definition.id = Some(name.clone());
        self.inner
            .deferred
            .borrow_mut()
            .push_back(Deferred::Define(definition));
        Ok(name)
    }

    /// Run `callback` with the values of `dependencies`, in order, once all
    /// of them are ready. Missing dependencies are fetched.
    pub fn require_with<I, S, F>(&self, dependencies: I, callback: F) -> Result<(), LoaderError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(Vec<ModuleValue>) + 'static,
    {
        let dependencies: Vec<String> = dependencies.into_iter().map(Into::into).collect();
        let Ok(mut graph) = self.inner.graph.try_borrow_mut() else {
            validate_dependencies("require", &dependencies)?;
            self.inner.deferred.borrow_mut().push_back(Deferred::Require {
                dependencies,
                callback: Box::new(callback),
            });
            return Ok(());
        };
        let request = graph.require(dependencies, callback)?;
        drop(graph);
        debug!(%request, "require registered");
        self.schedule_pass();
        Ok(())
    }

    /// Wait for the values of `dependencies`.
    ///
    /// Honors `require_timeout_ms`; on expiry the error lists the modules
    /// that were never delivered.
    pub async fn require<I, S>(&self, dependencies: I) -> Result<Vec<ModuleValue>, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dependencies: Vec<String> = dependencies.into_iter().map(Into::into).collect();
        let (sender, receiver) = oneshot::channel();
        self.require_with(dependencies.clone(), move |values| {
            // The receiver is gone only if the caller stopped waiting.
            let _ = sender.send(values);
        })?;

        let received = match self.inner.config.require_timeout_ms {
            None => receiver.await,
            Some(waited_ms) => {
                let limit = std::time::Duration::from_millis(waited_ms);
                match tokio::time::timeout(limit, receiver).await {
                    Ok(received) => received,
                    Err(_) => {
                        let missing = self.undelivered(&dependencies);
                        warn!(?dependencies, ?missing, waited_ms, "require timed out");
                        return Err(RuntimeError::DependencyTimeout {
                            dependencies,
                            missing,
                            waited_ms,
                        });
                    }
                }
            }
        };
        received.map_err(|_| RuntimeError::RequestDropped(dependencies))
    }

    /// Evaluate unit text as if it had just been delivered for `unit`.
    ///
    /// Every entry is checked before anything is registered, so a rejected
    /// unit leaves the graph untouched. Returns the names defined.
    pub fn evaluate(&self, unit: &str, text: &str) -> Result<Vec<String>, RuntimeError> {
        let definitions: Vec<Definition> = parse_unit(unit, text)?
            .into_iter()
            .map(UnitDefinition::into_definition)
            .collect();
        for definition in &definitions {
            let name = definition.id.as_deref().unwrap_or(unit);
            validate_id(name)?;
            validate_dependencies(name, &definition.dependencies)?;
        }

        let previous = self.inner.current_unit.replace(Some(unit.to_string()));
        let defined: Result<Vec<String>, LoaderError> = definitions
            .into_iter()
            .map(|definition| self.define(definition))
            .collect();
        self.inner.current_unit.replace(previous);
        defined.map_err(RuntimeError::from)
    }

    async fn fetch_unit(&self, unit: String) {
        debug!(%unit, "fetching unit");
        let outcome = match self.inner.source.fetch(&unit).await {
            Ok(text) => self.evaluate(&unit, &text),
            Err(error) => Err(RuntimeError::from(error)),
        };
        match outcome {
            Ok(defined) if defined.contains(&unit) => {
                info!(%unit, modules = defined.len(), "unit loaded");
            }
            Ok(defined) => {
                warn!(%unit, ?defined, "unit did not define its own name; dependents stay pending");
            }
            Err(error) => {
                warn!(%unit, %error, "unit failed to load; dependents stay pending");
            }
        }

        self.inner
            .in_flight
            .set(self.inner.in_flight.get().saturating_sub(1));
        self.notify_if_idle();
    }

    fn schedule_pass(&self) {
        let loader = self.clone();
        let task = tokio::task::spawn_local(async move { loader.run_pass() });
        if let Some(previous) = self.inner.scheduled.replace(Some(task)) {
            previous.abort();
        }
    }

    fn run_pass(&self) {
        // Calls made from here on schedule a fresh task instead of aborting
        // this one.
        self.inner.scheduled.borrow_mut().take();
        let _guard = PassGuard { loader: self };

        loop {
            let report = self.inner.graph.borrow_mut().flush();
            if !report.is_empty() {
                debug!(
                    promoted = report.promoted.len(),
                    requested = report.requested.len(),
                    waiting = report.waiting.len(),
                    "window closed"
                );
            }

            let deferred: Vec<Deferred> = self.inner.deferred.borrow_mut().drain(..).collect();
            if deferred.is_empty() {
                break;
            }
            debug!(calls = deferred.len(), "applying calls made during the pass");
            let mut graph = self.inner.graph.borrow_mut();
            for call in deferred {
                let outcome = match call {
                    Deferred::Define(definition) => graph.define(definition).map(drop),
                    Deferred::Require {
                        dependencies,
                        callback,
                    } => graph.require(dependencies, callback).map(drop),
                };
                if let Err(error) = outcome {
                    warn!(%error, "deferred call rejected");
                }
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.inner.in_flight.get() == 0
            && self.inner.scheduled.borrow().is_none()
            && self.inner.deferred.borrow().is_empty()
    }

    fn notify_if_idle(&self) {
        if self.is_idle() {
            self.inner.idle.notify_waiters();
        }
    }

    /// Wait until no fetch is in flight and no pass is scheduled.
    ///
    /// Modules still waiting at that point will only progress if someone
    /// defines what they wait on.
    pub async fn settle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn pending_fetches(&self) -> usize {
        self.inner.in_flight.get()
    }

    /// Status of `name`, or `None` if it is unknown or a pass is running.
    pub fn status(&self, name: &str) -> Option<ModuleStatus> {
        self.inner.graph.try_borrow().ok()?.status(name)
    }

    /// Modules reachable from `roots` that were never delivered.
    ///
    /// Walks declared dependencies through `Defined` modules and collects
    /// the names still `Pending` or absent.
    pub fn undelivered(&self, roots: &[String]) -> Vec<String> {
        let Ok(graph) = self.inner.graph.try_borrow() else {
            return Vec::new();
        };
        let registry = graph.registry();

        let mut seen = BTreeSet::new();
        let mut missing = BTreeSet::new();
        let mut stack: Vec<&str> = roots.iter().map(String::as_str).collect();
        while let Some(name) = stack.pop() {
            if !seen.insert(name) {
                continue;
            }
            match registry.get(name) {
                None => {
                    missing.insert(name.to_string());
                }
                Some(record) => match record.status() {
                    ModuleStatus::Pending => {
                        missing.insert(name.to_string());
                    }
                    ModuleStatus::Defined => {
                        stack.extend(record.dependency_names().iter().map(String::as_str));
                    }
                    ModuleStatus::Ready => {}
                },
            }
        }
        missing.into_iter().collect()
    }

    /// Current graph, or `None` while a pass is running.
    pub fn snapshot(&self) -> Option<GraphSnapshot> {
        Some(self.inner.graph.try_borrow().ok()?.snapshot())
    }
}

/// Ends a pass, including one cut short by a panicking factory: calls the
/// factory queued get their own pass, and `settle` waiters are woken.
struct PassGuard<'a> {
    loader: &'a Loader,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("factory panicked; the pass was cut short");
            if !self.loader.inner.deferred.borrow().is_empty() {
                self.loader.schedule_pass();
            }
        }
        self.loader.notify_if_idle();
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.inner.config)
            .field("in_flight", &self.inner.in_flight.get())
            .field("scheduled", &self.inner.scheduled.borrow().is_some())
            .finish_non_exhaustive()
    }
}
