// src/main.rs

use assetdag::graph::RunResult;
use assetdag::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(RunResult::Completed) => {}
        Ok(RunResult::Failed(failures)) => {
            eprintln!("assetdag: {} step(s) failed", failures.len());
            for failure in &failures {
                eprintln!("  {failure}");
            }
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("assetdag error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<RunResult> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
