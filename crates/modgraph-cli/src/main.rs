//! modgraph CLI: the `modgraph` command.

mod cli;
mod commands;
mod logging;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            modules,
            root,
            config,
            timeout_ms,
            json,
        } => commands::run::run(commands::LoaderArgs {
            modules,
            root,
            config,
            timeout_ms,
            json,
        }),

        Commands::Graph {
            modules,
            root,
            config,
            timeout_ms,
            json,
        } => commands::graph::run(commands::LoaderArgs {
            modules,
            root,
            config,
            timeout_ms,
            json,
        }),
    }
}
