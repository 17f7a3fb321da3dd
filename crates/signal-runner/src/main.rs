//! Host a signal block from the command line: configure it from a JSON file, then either feed it
//! one batch of signals or invoke one of its commands (e.g. `quota`, `stats`).

mod input;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use signal_blocks::default_registry;
use signal_core::{BlockRegistry, init_observability};

#[derive(Debug, Parser)]
#[command(name = "signal-runner", version, about = "Run a signal block outside the host runtime")]
struct Cli {
    /// Block config (JSON). `[[NAME]]` placeholders are read from the environment.
    #[arg(long, short, env = "SIGNAL_RUNNER_CONFIG")]
    config: PathBuf,
    /// Registry key of the block to configure.
    #[arg(long, default_value = "amazon_ses")]
    block_type: String,
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Process one batch of signals (JSON array or JSON Lines).
    Process {
        /// Signal file, or `-` for stdin.
        #[arg(long, default_value = "-")]
        signals: String,
    },
    /// Invoke a block command and print its JSON result.
    Command { name: String },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_observability();
    let cli = Cli::parse();
    let registry = default_registry();
    run(cli, &registry, &mut std::io::stdout().lock())
}

fn run(cli: Cli, registry: &BlockRegistry, out: &mut dyn Write) -> anyhow::Result<()> {
    let payload = input::load_config(&cli.config)?;
    let mut block = registry
        .build(&cli.block_type, payload)
        .with_context(|| {
            format!(
                "configuring block {} (registered: {})",
                cli.block_type,
                registry.type_ids().join(", ")
            )
        })?;
    block.start()?;

    let result = match cli.action {
        Action::Process { signals } => input::read_signals(&signals).and_then(|batch| {
            info!(
                event = "runner.batch_loaded",
                domain = "runner",
                block_type = cli.block_type.as_str(),
                signals = batch.len() as u64
            );
            block
                .process_signals(&batch)
                .context("processing signals")
        }),
        Action::Command { name } => block
            .invoke(&name)
            .with_context(|| format!("invoking command {name}"))
            .and_then(|value| {
                let text = serde_json::to_string_pretty(&value)?;
                writeln!(out, "{text}")?;
                Ok(())
            }),
    };

    block.stop()?;
    result
}
