//! Binary entry point for the srcremap CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Extract and apply, rewriting the input in place
//! srcremap --in src.zip --lib rt.jar --srg joined.srg --exc joined.exc
//!
//! # Write the result to a separate collection, keeping the range map
//! srcremap --in src/ --out remapped/ --srg joined.srg --rangemap out.rangemap
//!
//! # Extraction only
//! srcremap extract --in src/ --lib rt.jar --rangemap out.rangemap
//!
//! # Application only, from an existing range map
//! srcremap apply --in src/ --out remapped/ --srg joined.srg --rangemap out.rangemap
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};

use srcremap::remap::{run_apply, run_extract, run_remap, OutputMode, RemapConfig};
use srcremap_core::error::{OutputErrorCode, RemapError};
use srcremap_core::output::{emit_response, RunSummary};

// ============================================================================
// CLI Structure
// ============================================================================

/// Source-accurate symbol remapping for Java sources.
///
/// Prints one JSON summary to stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "srcremap", version, about = "Source-accurate symbol remapping for Java sources")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Option<Command>,
}

/// Arguments shared by all subcommands.
#[derive(Args, Debug)]
struct GlobalArgs {
    /// Input source collection (directory, `.zip` or `.jar`).
    #[arg(long = "in", global = true)]
    input: Option<PathBuf>,

    /// Output collection. Without it the input is rewritten in place.
    #[arg(long = "out", global = true, conflicts_with = "in_place")]
    output: Option<PathBuf>,

    /// Rewrite the input collection in place (the default without `--out`).
    #[arg(long, global = true)]
    in_place: bool,

    /// Classpath entry. Repeatable; earlier entries win.
    #[arg(long = "lib", global = true)]
    classpath: Vec<PathBuf>,

    /// Primary mapping file. Repeatable; later files override earlier ones.
    #[arg(long = "srg", global = true)]
    primary: Vec<PathBuf>,

    /// Secondary (parameter) mapping file. Repeatable.
    #[arg(long = "exc", global = true)]
    secondary: Vec<PathBuf>,

    /// Range map file (default: a temporary file).
    #[arg(long = "rangemap", global = true)]
    range_map: Option<PathBuf>,

    /// Rename log file (default: a temporary file).
    #[arg(long = "rangelog", global = true)]
    rename_log: Option<PathBuf>,

    /// Abort when more than this fraction of units fails to parse.
    #[arg(long, global = true, default_value_t = 0.5)]
    max_parse_failure_ratio: f64,

    /// Abort when more references than this are unresolved or ambiguous.
    #[arg(long, global = true)]
    max_unresolved: Option<usize>,

    /// Write units in place even when nothing in them changed.
    #[arg(long, global = true)]
    overwrite_unmapped: bool,

    /// Resolve and rewrite units on one thread.
    #[arg(long, global = true)]
    sequential: bool,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the range map only.
    Extract,
    /// Apply an existing range map (`--rangemap` is required).
    Apply,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    let command = match cli.command {
        None => "remap",
        Some(Command::Extract) => "extract",
        Some(Command::Apply) => "apply",
    };
    let mut summary = RunSummary::new(command);
    let result = execute(&cli, &mut summary);
    if let Err(err) = &result {
        summary.fail(err);
    }

    // The summary goes to stdout whether or not the run worked.
    let _ = emit_response(&summary, &mut io::stdout());
    let _ = io::stdout().flush();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(OutputErrorCode::from(&err).code()),
    }
}

/// Initialize tracing subscriber. `RUST_LOG` overrides `--log-level`.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
fn execute(cli: &Cli, summary: &mut RunSummary) -> Result<(), RemapError> {
    let config = build_config(&cli.global)?;
    match cli.command {
        None => run_remap(&config, summary),
        Some(Command::Extract) => run_extract(&config, summary),
        Some(Command::Apply) => {
            let range_map = cli
                .global
                .range_map
                .as_deref()
                .ok_or_else(|| RemapError::invalid_args("apply needs --rangemap"))?;
            run_apply(&config, range_map, summary)
        }
    }
}

fn build_config(args: &GlobalArgs) -> Result<RemapConfig, RemapError> {
    let input = args
        .input
        .clone()
        .ok_or_else(|| RemapError::invalid_args("--in is required"))?;
    if !(0.0..=1.0).contains(&args.max_parse_failure_ratio) {
        return Err(RemapError::invalid_args(format!(
            "--max-parse-failure-ratio must be between 0 and 1, got {}",
            args.max_parse_failure_ratio
        )));
    }

    let mut config = RemapConfig::new(input);
    config.output = match &args.output {
        Some(out) => OutputMode::Separate(out.clone()),
        None => OutputMode::InPlace,
    };
    config.check_output()?;
    config.classpath = args.classpath.clone();
    config.primary = args.primary.clone();
    config.secondary = args.secondary.clone();
    config.range_map = args.range_map.clone();
    config.rename_log = args.rename_log.clone();
    config.extract.max_parse_failure_ratio = args.max_parse_failure_ratio;
    config.extract.max_unresolved = args.max_unresolved;
    config.extract.parallel = !args.sequential;
    config.apply.overwrite_if_unmapped = args.overwrite_unmapped;
    config.apply.parallel = !args.sequential;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_the_config() {
        let cli = Cli::try_parse_from([
            "srcremap",
            "--in",
            "src.zip",
            "--lib",
            "a.jar",
            "--lib",
            "b.jar",
            "--srg",
            "joined.srg",
            "--exc",
            "joined.exc",
            "--max-parse-failure-ratio",
            "0.25",
            "--overwrite-unmapped",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        let config = build_config(&cli.global).unwrap();
        assert_eq!(config.input, PathBuf::from("src.zip"));
        assert!(config.is_in_place());
        assert_eq!(config.classpath, vec![PathBuf::from("a.jar"), PathBuf::from("b.jar")]);
        assert_eq!(config.primary, vec![PathBuf::from("joined.srg")]);
        assert_eq!(config.secondary, vec![PathBuf::from("joined.exc")]);
        assert_eq!(config.extract.max_parse_failure_ratio, 0.25);
        assert!(config.apply.overwrite_if_unmapped);
    }

    #[test]
    fn subcommands_take_global_flags() {
        let cli = Cli::try_parse_from(["srcremap", "extract", "--in", "src", "--rangemap", "out.map"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Extract)));
        assert_eq!(cli.global.range_map, Some(PathBuf::from("out.map")));
    }

    #[test]
    fn output_mode_is_explicit() {
        let cli = Cli::try_parse_from(["srcremap", "--in", "src", "--out", "out"]).unwrap();
        let config = build_config(&cli.global).unwrap();
        assert_eq!(config.output, OutputMode::Separate(PathBuf::from("out")));

        let cli = Cli::try_parse_from(["srcremap", "--in", "src", "--in-place"]).unwrap();
        assert!(build_config(&cli.global).unwrap().is_in_place());

        assert!(Cli::try_parse_from(["srcremap", "--in", "src", "--in-place", "--out", "o"]).is_err());
    }

    #[test]
    fn output_naming_the_input_is_invalid() {
        let cli = Cli::try_parse_from(["srcremap", "--in", "src.zip", "--out", "src.zip"]).unwrap();
        let err = build_config(&cli.global).unwrap_err();
        assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
    }

    #[test]
    fn missing_input_is_invalid() {
        let cli = Cli::try_parse_from(["srcremap"]).unwrap();
        let err = build_config(&cli.global).unwrap_err();
        assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
    }

    #[test]
    fn ratio_out_of_range_is_invalid() {
        let cli = Cli::try_parse_from(["srcremap", "--in", "src", "--max-parse-failure-ratio", "2"]).unwrap();
        assert!(build_config(&cli.global).is_err());
    }
}
