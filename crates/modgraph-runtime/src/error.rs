use crate::bundle::BundleError;
use crate::source::FetchError;
use modgraph_kernel::LoaderError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(
        "gave up on [{}] after {waited_ms}ms; never delivered: [{}]",
        .dependencies.join(", "),
        .missing.join(", ")
    )]
    DependencyTimeout {
        dependencies: Vec<String>,
        missing: Vec<String>,
        waited_ms: u64,
    },

    #[error("request for [{}] was dropped before it resolved", .0.join(", "))]
    RequestDropped(Vec<String>),
}
