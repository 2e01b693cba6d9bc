//! Glucoguard: Diabetes risk prediction
//!
//! Command-line entry point. Responses go to stdout as JSON; logs go to
//! stderr or a file so they never mix with responses.

use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use glucoguard::adapters::sanitize::SanitizingMakeWriter;
use glucoguard::adapters::ArtifactBundle;
use glucoguard::application::ServiceState;
use glucoguard::config::{LogMode, ServiceConfig};
use glucoguard::domain::FeatureRecord;
use glucoguard::{ErrorKind, GlucoguardError};

#[derive(Parser)]
#[command(name = "glucoguard", about = "Diabetes risk prediction from clinical measurements")]
struct Cli {
    /// Artifact bundle directory
    #[arg(long, value_name = "DIR", global = true)]
    bundle: Option<PathBuf>,

    /// Refuse bundles without a valid signature
    #[arg(long, global = true)]
    require_signature: bool,

    /// Base64 Ed25519 public key used to verify bundle.sig
    #[arg(long, value_name = "FILE", global = true)]
    pubkey_file: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    log_mode: Option<LogMode>,

    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict one JSON record from a file or stdin
    Predict {
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
    /// Predict newline-delimited JSON records from stdin
    Batch,
    /// Report which artifacts are loaded
    Health,
}

const EXIT_FAILURE: u8 = 1;
const EXIT_VALIDATION: u8 = 2;
const EXIT_UNAVAILABLE: u8 = 3;

/// Environment first, then flags. Warnings are returned because logging is
/// not initialised yet.
fn resolve_config(cli: &Cli) -> (ServiceConfig, Vec<String>) {
    let (mut config, warnings) = ServiceConfig::from_env();
    if let Some(dir) = &cli.bundle {
        config.bundle_dir = dir.clone();
    }
    if cli.require_signature {
        config.require_signature = true;
    }
    if let Some(path) = &cli.pubkey_file {
        config.pubkey_file = Some(path.clone());
    }
    if let Some(mode) = cli.log_mode {
        config.log_mode = mode;
    }
    if let Some(path) = &cli.log_file {
        config.log_file = path.clone();
    }
    (config, warnings)
}

fn init_logging(config: &ServiceConfig) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let (writer, guard) = match config.log_mode {
        LogMode::File => {
            if let Some(parent) = config.log_file.parent() {
                // Best-effort: open() reports the real failure.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.log_file)
                .with_context(|| format!("Failed to open log file {:?}", config.log_file))?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogMode::Auto | LogMode::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    Ok(guard)
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Validation => EXIT_VALIDATION,
        ErrorKind::Unavailable => EXIT_UNAVAILABLE,
        ErrorKind::NumericDomain | ErrorKind::Inference | ErrorKind::Internal => EXIT_FAILURE,
    }
}

/// Parse and predict one payload, returning the response line.
fn handle(state: &ServiceState, payload: &str) -> std::result::Result<String, GlucoguardError> {
    let record = FeatureRecord::from_json(payload)?;
    let result = state.predict(&record)?;
    Ok(serde_json::to_string(&result.to_response())?)
}

fn report(err: &GlucoguardError) -> Result<String> {
    match err.kind() {
        ErrorKind::Inference | ErrorKind::Internal => tracing::error!("Request failed: {}", err),
        _ => tracing::warn!("Request rejected: {}", err),
    }
    serde_json::to_string(&err.to_response()).context("Failed to serialize error response")
}

fn predict(state: &ServiceState, input: Option<&PathBuf>) -> Result<u8> {
    let payload = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {path:?}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    match handle(state, &payload) {
        Ok(line) => {
            println!("{line}");
            Ok(0)
        }
        Err(err) => {
            println!("{}", report(&err)?);
            Ok(exit_code(err.kind()))
        }
    }
}

fn batch(state: &ServiceState) -> Result<u8> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let (mut ok, mut failed) = (0usize, 0usize);

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let out = match handle(state, &line) {
            Ok(response) => {
                ok += 1;
                response
            }
            Err(err) => {
                failed += 1;
                report(&err)?
            }
        };
        writeln!(stdout, "{out}").context("Failed to write stdout")?;
    }

    tracing::info!("Batch complete: {} succeeded, {} failed", ok, failed);
    Ok(if state.is_ready() { 0 } else { EXIT_UNAVAILABLE })
}

fn run(cli: &Cli, config: &ServiceConfig) -> Result<u8> {
    let state = ServiceState::from_load(ArtifactBundle::load(
        &config.bundle_dir,
        &config.bundle_options(),
    ));

    match &cli.command {
        Command::Predict { input } => predict(&state, input.as_ref()),
        Command::Batch => batch(&state),
        Command::Health => {
            let health = state.health();
            println!("{}", serde_json::to_string(&health)?);
            Ok(if state.is_ready() { 0 } else { EXIT_UNAVAILABLE })
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let (config, config_warnings) = resolve_config(&cli);

    let _guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    tracing::info!("Starting Glucoguard...");
    for warning in &config_warnings {
        tracing::warn!("Configuration: {}", warning);
    }

    match run(&cli, &config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
