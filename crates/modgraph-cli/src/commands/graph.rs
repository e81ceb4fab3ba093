use crate::commands::LoaderArgs;
use crate::support::{
    Outcome, block_on_local, exit_failed, print_json, require_or_stall, setup_or_exit,
};
use modgraph_kernel::{GraphSnapshot, ModuleStatus};
use modgraph_runtime::Loader;
use serde_json::json;

pub fn run(args: LoaderArgs) {
    let config = setup_or_exit(&args);

    let (outcome, snapshot) = block_on_local(async {
        let loader = Loader::new(config);
        let outcome = require_or_stall(&loader, &args.modules).await;
        loader.settle().await;
        (outcome, loader.snapshot().unwrap_or_default())
    });

    let missing = match outcome {
        Outcome::Resolved(_) => Vec::new(),
        Outcome::Stalled { missing } => missing,
        Outcome::Failed(error) => exit_failed(error),
    };

    if args.json {
        print_json(&json!({
            "resolved": missing.is_empty(),
            "missing": missing,
            "graph": snapshot,
        }));
    } else {
        print_text(&args.modules, &snapshot, &missing);
    }

    if !missing.is_empty() {
        std::process::exit(1);
    }
}

fn print_text(requested: &[String], snapshot: &GraphSnapshot, missing: &[String]) {
    println!("modgraph graph {}", requested.join(" "));
    println!(
        "  Modules: {} ({} ready, {} defined, {} pending)",
        snapshot.modules.len(),
        snapshot.count(ModuleStatus::Ready),
        snapshot.count(ModuleStatus::Defined),
        snapshot.count(ModuleStatus::Pending),
    );
    for module in &snapshot.modules {
        if module.dependencies.is_empty() {
            println!("  {:<8} {}", module.status, module.name);
        } else {
            println!(
                "  {:<8} {} <- {}",
                module.status,
                module.name,
                module.dependencies.join(", ")
            );
        }
    }
    if !missing.is_empty() {
        println!("  Never delivered: {}", missing.join(", "));
    }
}
