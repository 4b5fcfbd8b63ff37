//! # vouch CLI entry point
//!
//! Parses arguments, sets up logging on stderr and dispatches to the
//! subcommand handlers in the library crate.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vouch_cli::attestation::{run_decode, run_encode, run_pda, DecodeArgs, EncodeArgs, PdaArgs};
use vouch_cli::envelope::{run_validate, ValidateEnvelopeArgs};
use vouch_cli::identity::{run_derive, DeriveArgs};
use vouch_cli::oracle::{run_health, HealthArgs};
use vouch_cli::simulate::{run_simulate, SimulateArgs};
use vouch_cli::CliConfig;

/// Vouch client toolkit
///
/// Derives credential identifiers, encodes and decodes attestation
/// messages, checks proof envelopes, probes the verification oracle and
/// simulates the full prove flow.
#[derive(Parser, Debug)]
#[command(name = "vouch", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Wallet id, nullifier, nullifier record and commitment for a wallet.
    Derive(DeriveArgs),

    /// Build a 125-byte attestation message.
    EncodeAttestation(EncodeArgs),

    /// Parse a hex attestation message.
    DecodeAttestation(DecodeArgs),

    /// Derive a program account address.
    Pda(PdaArgs),

    /// Run local format checks on an envelope file.
    ValidateEnvelope(ValidateEnvelopeArgs),

    /// Probe the verification oracle.
    Health(HealthArgs),

    /// Run one prove flow against in-memory collaborators.
    Simulate(SimulateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Commands::Derive(args) => run_derive(&args, &config),
        Commands::EncodeAttestation(args) => run_encode(&args),
        Commands::DecodeAttestation(args) => run_decode(&args),
        Commands::Pda(args) => run_pda(&args, &config),
        Commands::ValidateEnvelope(args) => run_validate(&args),
        Commands::Health(args) => run_health(&args, &config),
        Commands::Simulate(args) => run_simulate(&args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
