//! # modgraph kernel
//!
//! The dependency graph engine of a module loader: named modules declare
//! dependencies on other named modules, and each module's factory runs
//! exactly once, after every dependency has produced a value.
//!
//! The kernel is host-agnostic. It never fetches and never waits; fetching
//! is the injected [`Fetcher`], and the end of a definition window is
//! signalled by the host calling [`ModuleGraph::flush`].
//!
//! ## Architecture
//!
//! ```text
//! ModuleGraph          ← define / require / flush
//!     │
//! BatchSet + resolve   ← one fixed-point pass per definition window
//!     │
//! engine               ← is_satisfied / promote with parent cascade
//!     │
//! Registry             ← one ModuleRecord per name
//!     │
//! ModuleRecord         ← Pending → Defined → Ready
//! ```
//!
//! The graph is assumed acyclic; modules caught in a cycle stay `Defined`.

pub mod batch;
pub mod capability;
pub mod definition;
pub mod engine;
pub mod error;
pub mod graph;
pub mod record;
pub mod registry;

pub use batch::{BatchSet, ResolutionReport};
pub use capability::{CurrentUnit, Fetcher, NoCurrentUnit, RecordingFetcher};
pub use definition::{ANON_PREFIX, Definition};
pub use error::{EngineError, LoaderError};
pub use graph::{GraphSnapshot, ModuleGraph};
pub use record::{Factory, ModuleRecord, ModuleStatus, ModuleValue};
pub use registry::{RecordSnapshot, Registry};
