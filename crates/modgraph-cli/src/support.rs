use crate::commands::LoaderArgs;
use crate::logging::init_logging;
use modgraph_kernel::ModuleValue;
use modgraph_runtime::{Loader, LoaderConfig, RuntimeError};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::task::LocalSet;
use tracing::debug;

/// Build the loader config from the optional file plus flag overrides, and
/// start logging with its filter.
pub fn setup_or_exit(args: &LoaderArgs) -> LoaderConfig {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::load(path).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        }),
        None => LoaderConfig::default(),
    };
    if let Some(root) = &args.root {
        config = config.with_source_root(root);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config = config.with_require_timeout(Duration::from_millis(timeout_ms));
    }

    init_logging(config.log_filter.as_deref());
    debug!(?config, "loader config");
    config
}

/// Drive `future` to completion on a single-threaded runtime with a local
/// task set, which the loader needs.
pub fn block_on_local<F: Future>(future: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("error: failed to start runtime: {e}");
            std::process::exit(1);
        });
    LocalSet::new().block_on(&runtime, future)
}

/// How a request ended.
pub enum Outcome {
    Resolved(Vec<ModuleValue>),
    /// Loading went idle with the request unresolved.
    Stalled { missing: Vec<String> },
    Failed(RuntimeError),
}

/// Require `modules`, stopping early once loading settles without
/// resolving them: nothing else can deliver a module afterwards.
pub async fn require_or_stall(loader: &Loader, modules: &[String]) -> Outcome {
    let request = loader.require(modules.iter().cloned());
    tokio::pin!(request);

    tokio::select! {
        biased;
        outcome = &mut request => match outcome {
            Ok(values) => Outcome::Resolved(values),
            Err(error) => Outcome::Failed(error),
        },
        () = loader.settle() => Outcome::Stalled {
            missing: loader.undelivered(modules),
        },
    }
}

pub fn print_json<T: Serialize>(payload: &T) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: failed to render json: {e}");
            std::process::exit(1);
        }
    }
}

pub fn exit_failed(error: RuntimeError) -> ! {
    eprintln!("error: {error}");
    std::process::exit(1);
}
