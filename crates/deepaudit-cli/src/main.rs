//! # deepaudit CLI entry point
//!
//! Parses command-line arguments, installs the tracing subscriber, and
//! dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use deepaudit_cli::audit::{run_audit, AuditArgs};
use deepaudit_cli::evaluate::{run_evaluate, EvaluateArgs};
use deepaudit_cli::identify::{run_identify, IdentifyArgs};
use deepaudit_cli::load_config;
use deepaudit_cli::robustness::{run_robustness, RobustnessArgs};

/// DeepAudit: biometric embedding integrity evaluation.
///
/// Watermarks stored face embeddings, measures recognition error rates,
/// simulates data-poisoning attacks against the template store, and audits
/// the result for tampering.
#[derive(Parser, Debug)]
#[command(name = "deepaudit", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enroll identities and run the four-phase evaluation.
    Evaluate(EvaluateArgs),

    /// Scan an embedding database for tampering and duplicate enrollments.
    Audit(AuditArgs),

    /// Sweep watermark survival over perturbation magnitudes.
    Robustness(RobustnessArgs),

    /// Identify a probe embedding against an embedding database.
    Identify(IdentifyArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr so stdout carries only the JSON result.
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!("deepaudit CLI starting");

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Evaluate(args) => run_evaluate(&args, config),
        Commands::Audit(args) => run_audit(&args, config),
        Commands::Robustness(args) => run_robustness(&args, config),
        Commands::Identify(args) => run_identify(&args, config),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
