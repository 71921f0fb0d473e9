//! Plastid IR worker main executable

pub mod common;
pub mod ir;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Plastid IR congruence statistics",
    long_about = "This tool classifies plastid genome records by the congruence \
of their annotated inverted repeats and aggregates the flags into statistics"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// IR classification related commands.
    Ir(Ir),
}

/// Parsing of "ir *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Ir {
    /// The sub command to run
    #[command(subcommand)]
    command: IrCommands,
}

/// Enum supporting the parsing of "ir *" sub commands.
#[derive(Debug, Subcommand)]
enum IrCommands {
    Classify(ir::classify::Args),
    Summarize(ir::summarize::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        tracing::info!("plastid-ir-worker {} starting up", common::worker_version());

        match &cli.command {
            Commands::Ir(ir) => match &ir.command {
                IrCommands::Classify(args) => {
                    ir::classify::run(&cli.common, args)?;
                }
                IrCommands::Summarize(args) => {
                    ir::summarize::run(&cli.common, args)?;
                }
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
