//! relscout CLI - detect undeclared relationships in a schema snapshot
//!
//! Usage:
//!   relscout detect <snapshot.json> [--samples <samples.json>] [--config <relscout.toml>]
//!   relscout validate <snapshot.json>
//!
//! Examples:
//!   relscout detect schema.json
//!   relscout detect schema.json --samples samples.json --verifier rules --format json
//!   RUST_LOG=relscout=debug relscout detect schema.json

use clap::{Parser, Subcommand, ValueEnum};
use relscout::config::Settings;
use relscout::semantic::inference::{
    render_report, DeferVerifier, NoSampler, RelationshipDetector, RuleBasedVerifier, SampleSet,
    ValueSampler, Verifier,
};
use relscout::{DetectError, DetectResult, SchemaSnapshot};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relscout")]
#[command(about = "relscout - infer undeclared foreign-key relationships")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect relationships in a schema snapshot
    Detect {
        /// Path to the snapshot JSON file
        snapshot: PathBuf,

        /// Sampled column values ({"table.column": [...]})
        #[arg(short, long)]
        samples: Option<PathBuf>,

        /// Settings file (defaults to RELSCOUT_CONFIG, ./relscout.toml, user config)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// How uncertain candidates are verified
        #[arg(long, default_value = "defer")]
        verifier: VerifierArg,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a schema snapshot without running detection
    Validate {
        /// Path to the snapshot JSON file
        snapshot: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum VerifierArg {
    /// Leave uncertain candidates unverified
    Defer,
    /// Decide uncertain candidates with offline rules
    Rules,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable report
    Text,
    /// Full report as JSON
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Detect {
            snapshot,
            samples,
            config,
            verifier,
            format,
        } => cmd_detect(&snapshot, samples.as_deref(), config.as_deref(), verifier, format),
        Commands::Validate { snapshot } => cmd_validate(&snapshot),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read(path: &Path) -> DetectResult<String> {
    fs::read_to_string(path).map_err(|source| DetectError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn load_snapshot(path: &Path) -> DetectResult<SchemaSnapshot> {
    SchemaSnapshot::from_json(&read(path)?).map_err(DetectError::SnapshotParse)
}

fn cmd_detect(
    snapshot: &Path,
    samples: Option<&Path>,
    config: Option<&Path>,
    verifier: VerifierArg,
    format: OutputFormat,
) -> DetectResult<()> {
    let snapshot = load_snapshot(snapshot)?;
    let sampler: Box<dyn ValueSampler> = match samples {
        Some(path) => Box::new(SampleSet::from_json(&read(path)?)?),
        None => Box::new(NoSampler),
    };
    let settings = match config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };

    let detector = RelationshipDetector::new(settings.to_detection_config()?);
    let verifier: Box<dyn Verifier> = match verifier {
        VerifierArg::Defer => Box::new(DeferVerifier),
        VerifierArg::Rules => Box::new(RuleBasedVerifier::default()),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(DetectError::Runtime)?;
    let report = runtime.block_on(detector.analyze(&snapshot, sampler.as_ref(), verifier.as_ref()));

    match format {
        OutputFormat::Text => println!("{}", render_report(&report)),
        OutputFormat::Json => println!(
            "{}",
            report.to_json().map_err(DetectError::Serialize)?
        ),
    }
    Ok(())
}

fn cmd_validate(snapshot: &Path) -> DetectResult<()> {
    let parsed = load_snapshot(snapshot)?;
    let declared = parsed.declared_foreign_keys().count();
    println!(
        "OK: {} is valid ({} tables, {} declared foreign keys)",
        snapshot.display(),
        parsed.len(),
        declared
    );
    Ok(())
}
