use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use planledger_engine::{EngineConfig, ExecutionResult, PlanRunner};
use planledger_store::Store;

#[derive(Parser, Debug)]
#[command(
    name = "planledger",
    version,
    about = "Run one generated plan against a JSON inventory and ledger store"
)]
struct Args {
    /// Store file; rewritten when the run commits
    store: PathBuf,

    /// File holding the generator output, or `-` for stdin
    plan: String,

    /// Customer request the plan answers
    #[arg(trailing_var_arg = true, required = true)]
    request: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    planledger_observability::init();

    let args = Args::parse();
    let result = run(&args, EngineConfig::from_env())?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Load the store, run one plan for one request, write the store back if the
/// run committed.
fn run(args: &Args, config: EngineConfig) -> anyhow::Result<ExecutionResult> {
    let request = args.request.join(" ");
    let store_path = args.store.display();

    let mut store = Store::load(&args.store).with_context(|| format!("loading {store_path}"))?;
    let plan_text = read_plan(&args.plan)?;

    let result = PlanRunner::new(config).run(&plan_text, &mut store, &request)?;
    if result.committed {
        store
            .save(&args.store)
            .with_context(|| format!("saving {store_path}"))?;
        tracing::info!(store = %store_path, "store saved");
    }
    Ok(result)
}

fn read_plan(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading plan from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(Path::new(path)).with_context(|| format!("reading plan {path}"))
}
