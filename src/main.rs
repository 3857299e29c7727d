//! Covar Worker main executable

pub mod common;
pub mod metrics;
pub mod primers;
pub mod vars;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "SARS-CoV-2 variant call post-processing",
    long_about = "This tool reconciles and post-processes the variant calls \
    of SARS-CoV-2 amplicon sequencing pipelines"
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
    /// Variant call related commands.
    Vars(Vars),
    /// Primer masking related commands.
    Primers(Primers),
    /// Metrics related commands.
    Metrics(Metrics),
}

/// Parsing of "vars *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Vars {
    /// The sub command to run
    #[command(subcommand)]
    command: VarsCommands,
}

/// Enum supporting the parsing of "vars *" sub commands.
#[derive(Debug, Subcommand)]
enum VarsCommands {
    Merge(vars::merge::Args),
}

/// Parsing of "primers *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Primers {
    /// The sub command to run
    #[command(subcommand)]
    command: PrimersCommands,
}

/// Enum supporting the parsing of "primers *" sub commands.
#[derive(Debug, Subcommand)]
enum PrimersCommands {
    CompleteMask(primers::complete_mask::Args),
}

/// Parsing of "metrics *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Metrics {
    /// The sub command to run
    #[command(subcommand)]
    command: MetricsCommands,
}

/// Enum supporting the parsing of "metrics *" sub commands.
#[derive(Debug, Subcommand)]
enum MetricsCommands {
    Summarize(metrics::summarize::Args),
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
        match &cli.command {
            Commands::Vars(vars) => match &vars.command {
                VarsCommands::Merge(args) => {
                    vars::merge::run(&cli.common, args)?;
                }
            },
            Commands::Primers(primers) => match &primers.command {
                PrimersCommands::CompleteMask(args) => {
                    primers::complete_mask::run(&cli.common, args)?;
                }
            },
            Commands::Metrics(metrics) => match &metrics.command {
                MetricsCommands::Summarize(args) => {
                    metrics::summarize::run(&cli.common, args)?;
                }
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
