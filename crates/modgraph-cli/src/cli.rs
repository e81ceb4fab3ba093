use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "modgraph",
    about = "modgraph: load named modules in dependency order from JSON units",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Require modules and print their resolved values
    Run {
        /// Module names to require, in order
        #[arg(required = true)]
        modules: Vec<String>,

        /// Directory searched for units (overrides the config file)
        #[arg(long)]
        root: Option<String>,

        /// Path to a TOML config file with a `[loader]` table
        #[arg(long)]
        config: Option<String>,

        /// Give up after this many milliseconds (overrides the config file)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load modules, wait for loading to settle, and print the module graph
    Graph {
        /// Module names to load
        #[arg(required = true)]
        modules: Vec<String>,

        /// Directory searched for units (overrides the config file)
        #[arg(long)]
        root: Option<String>,

        /// Path to a TOML config file with a `[loader]` table
        #[arg(long)]
        config: Option<String>,

        /// Give up after this many milliseconds (overrides the config file)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
