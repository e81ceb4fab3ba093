use crate::commands::LoaderArgs;
use crate::support::{
    Outcome, block_on_local, exit_failed, print_json, require_or_stall, setup_or_exit,
};
use modgraph_runtime::Loader;
use serde_json::json;

pub fn run(args: LoaderArgs) {
    let config = setup_or_exit(&args);
    let root = config.source_root.display().to_string();

    let outcome = block_on_local(async {
        let loader = Loader::new(config);
        require_or_stall(&loader, &args.modules).await
    });

    match outcome {
        Outcome::Resolved(values) => {
            if args.json {
                let modules: Vec<_> = args
                    .modules
                    .iter()
                    .zip(&values)
                    .map(|(name, value)| json!({ "module": name, "value": value }))
                    .collect();
                print_json(&json!({
                    "root": root,
                    "resolved": true,
                    "modules": modules,
                }));
            } else {
                println!("modgraph run {}", args.modules.join(" "));
                println!("  Root: {root}");
                for (name, value) in args.modules.iter().zip(&values) {
                    println!("  {name}: {value}");
                }
            }
        }
        Outcome::Stalled { missing } => {
            if args.json {
                print_json(&json!({
                    "root": root,
                    "resolved": false,
                    "missing": missing,
                }));
            }
            eprintln!(
                "error: loading settled without resolving {}; never delivered: {}",
                args.modules.join(", "),
                missing.join(", ")
            );
            std::process::exit(1);
        }
        Outcome::Failed(error) => exit_failed(error),
    }
}
