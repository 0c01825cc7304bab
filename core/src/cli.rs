use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::application::Application;
use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::reassemble::reassemble;
use crate::snapshot::read_snapshot;
use crate::types::QueueUrl;

#[derive(Parser)]
#[command(name = "scatter")]
#[command(about = "Scatter - drain a queue of phrase fragments and submit the reassembled phrase", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Queue service region (overrides config file and env vars)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Queue service endpoint, e.g. a local emulator
    #[arg(long, global = true)]
    pub queue_endpoint_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch an assignment, drain it, reassemble and submit the phrase
    Run {
        /// Requester id sent as the `uvaid` attribute
        #[arg(long)]
        requester_id: Option<String>,

        /// Origin tag sent as the `platform` attribute
        #[arg(long)]
        platform: Option<String>,

        /// Stop after reassembly without submitting
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the queue URL handed out by the assignment endpoint
    Fetch,

    /// Drain a queue into the snapshot file without submitting
    Drain {
        /// Queue to drain
        queue_url: String,

        /// Where to write the snapshot (default: intake.snapshot_path)
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Reassemble the phrase from a snapshot file
    Reassemble {
        /// Snapshot written by a previous drain
        snapshot: PathBuf,
    },

    /// Send a phrase to the submission queue
    Submit {
        /// Phrase to submit
        phrase: String,

        /// Requester id sent as the `uvaid` attribute
        #[arg(long)]
        requester_id: Option<String>,

        /// Origin tag sent as the `platform` attribute
        #[arg(long)]
        platform: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

/// Internal function that handles CLI commands
async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load and validate configuration before executing any command so
    // config errors are shown immediately
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run { dry_run, .. } => {
            let app = connect(config).await?;
            let summary = Pipeline::new(&app).run(dry_run).await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Fetch => {
            let app = connect(config).await?;
            let queue_url = app.fetch_assignment().await?;

            println!("{}", queue_url);
        }

        Commands::Drain { queue_url, .. } => {
            let app = connect(config).await?;
            let report = app.drain(&QueueUrl::new(queue_url)).await?;

            println!("Outcome: {}", report.outcome);
            println!("Fragments: {}", report.fragments.len());
            println!("Polls: {}", report.stats.polls);
            println!("Skipped: {}", report.stats.skipped);
            println!("Failed deletes: {}", report.stats.failed_deletes);
            println!(
                "Snapshot: {}",
                app.config().intake.snapshot_path.display()
            );
        }

        Commands::Reassemble { snapshot } => {
            let fragments = read_snapshot(&snapshot)?;
            let phrase = reassemble(&fragments)
                .with_context(|| format!("failed to reassemble {}", snapshot.display()))?;

            println!("{}", phrase);
        }

        Commands::Submit { phrase, .. } => {
            let app = connect(config).await?;
            app.check_submission_settings()?;
            let receipt = app.submit(&phrase).await?;

            match receipt.message_id {
                Some(message_id) => println!("✓ Submitted: {}", message_id),
                None => println!("✓ Submitted"),
            }
        }

        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("failed to render configuration")?;
            print!("{}", rendered);
        }
    }

    Ok(())
}

/// Layer CLI flags over file and environment configuration
fn load_config(cli: &Cli) -> Result<Config> {
    let mut builder = Config::builder()
        .config_path(cli.config.clone())
        .region(cli.region.clone())
        .queue_endpoint_url(cli.queue_endpoint_url.clone());

    builder = match &cli.command {
        Commands::Run {
            requester_id,
            platform,
            ..
        }
        | Commands::Submit {
            requester_id,
            platform,
            ..
        } => builder
            .requester_id(requester_id.clone())
            .platform(platform.clone()),
        Commands::Drain { snapshot, .. } => builder.snapshot_path(snapshot.clone()),
        _ => builder,
    };

    let config = builder.build().context("failed to load configuration")?;
    Ok(config)
}

async fn connect(config: Config) -> Result<Application> {
    let app = Application::from_config(config).await?;
    cancel_on_interrupt(app.shutdown_token());
    Ok(app)
}

/// Cancel `token` on Ctrl-C so in-flight stages stop and the snapshot is saved
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, shutting down");
            token.cancel();
        }
    });
}
