/// Scatter CLI
///
/// Runs the full fetch, drain, reassemble and submit pipeline, or any single
/// stage of it, against the configured assignment endpoint and queues.

use scatter_core::{cli, logging};

#[tokio::main]
async fn main() {
    logging::init_tracing();

    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
