pub mod graph;
pub mod run;

/// Arguments shared by every command that drives a loader.
#[derive(Debug, Clone)]
pub struct LoaderArgs {
    pub modules: Vec<String>,
    pub root: Option<String>,
    pub config: Option<String>,
    pub timeout_ms: Option<u64>,
    pub json: bool,
}
