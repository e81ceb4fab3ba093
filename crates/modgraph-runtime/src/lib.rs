//! # modgraph runtime
//!
//! Runs the kernel on a single-threaded tokio event loop: units are read
//! from a [`ModuleSource`], parsed from the JSON unit format, and their
//! modules defined as they arrive.
//!
//! ```no_run
//! use modgraph_runtime::{Loader, LoaderConfig, RuntimeError};
//!
//! # async fn demo() -> Result<(), RuntimeError> {
//! let local = tokio::task::LocalSet::new();
//! let values = local
//!     .run_until(async {
//!         let loader = Loader::new(LoaderConfig::default().with_source_root("demos/bundle"));
//!         loader.require(["a"]).await
//!     })
//!     .await?;
//! println!("{}", values[0]);
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod config;
pub mod error;
pub mod loader;
pub mod source;

pub use bundle::{BundleError, EntryViolation, FactoryBody, UnitDefinition, parse_unit};
pub use config::{ConfigError, LoaderConfig};
pub use error::RuntimeError;
pub use loader::Loader;
pub use source::{DirectorySource, FetchError, MemorySource, ModuleSource};
