mod atomic;
mod config;
mod discover;
mod errors;
mod logging;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use pactcheck_core::ArtifactKind;
use pactcheck_report::{ExitStatus, report_schema};
use pactcheck_rules::{PolicyGranularity, registry};

use config::{Overrides, load_file, resolve};
use errors::{CliError, CliResult};
use logging::init_logging;
use run::run_check;

/// Report file written below the project root when `--out` is absent.
const DEFAULT_REPORT_FILE: &str = "pactcheck-report.json";

#[derive(Parser, Debug)]
#[command(
    name = "pactcheck",
    version,
    about = "Cross-check schema, types, endpoints, validation and error contracts"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a project and write the JSON report.
    Check(CheckArgs),
    /// List the registered rules.
    Rules,
    /// Print the JSON Schema of the report.
    Schema,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Project root; artifact paths and globs are relative to it.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Config file (defaults to pactcheck.toml in the root, if present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQL schema file or glob.
    #[arg(long, value_name = "PATH")]
    schema: Vec<String>,
    /// Type declarations file or glob.
    #[arg(long, value_name = "PATH")]
    types: Vec<String>,
    /// Endpoint table file or glob.
    #[arg(long, value_name = "PATH")]
    endpoints: Vec<String>,
    /// Validation schema file or glob.
    #[arg(long, value_name = "PATH")]
    validation: Vec<String>,
    /// Error taxonomy file or glob.
    #[arg(long, value_name = "PATH")]
    errors: Vec<String>,
    /// Backend route file or glob.
    #[arg(long, value_name = "GLOB")]
    routes: Vec<String>,
    /// Frontend source file or glob scanned for API calls.
    #[arg(long, value_name = "GLOB")]
    usage: Vec<String>,
    /// Output path for the JSON report.
    #[arg(long)]
    out: Option<PathBuf>,
    /// How missing row-level security policies are reported.
    #[arg(long, value_name = "aggregate|per_verb", value_parser = parse_granularity)]
    policy_granularity: Option<PolicyGranularity>,
    /// Identity table whose referencing tables must declare policies.
    #[arg(long = "identity-table", value_name = "TABLE")]
    identity_tables: Vec<String>,
    /// Path prefix marking frontend calls as API calls.
    #[arg(long)]
    api_prefix: Option<String>,
    /// Name of the endpoint table constant.
    #[arg(long)]
    endpoint_table: Option<String>,
    /// Explicit table to type pairing, e.g. `cvs=CV`.
    #[arg(long = "pair", value_name = "TABLE=TYPE")]
    pairs: Vec<String>,
    /// Append JSON log lines to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Raise stderr log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_granularity(value: &str) -> Result<PolicyGranularity, String> {
    PolicyGranularity::parse(value)
        .ok_or_else(|| format!("unknown policy granularity `{value}`; use aggregate or per_verb"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Check(args) => check(args),
        Command::Rules => list_rules(),
        Command::Schema => print_schema(),
    };

    match result {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            tracing::error!(event = "run_failed", error = %err);
            eprintln!("pactcheck: {err}");
            ExitCode::from(ExitStatus::Invocation.code())
        }
    }
}

fn check(args: CheckArgs) -> CliResult<ExitStatus> {
    let CheckArgs {
        root,
        config,
        schema,
        types,
        endpoints,
        validation,
        errors,
        routes,
        usage,
        out,
        policy_granularity,
        identity_tables,
        api_prefix,
        endpoint_table,
        pairs,
        log_file,
        verbose,
    } = args;

    init_logging(verbose, log_file.as_deref())?;

    if !root.is_dir() {
        return Err(CliError::InvalidRoot(root));
    }

    let (file_config, config_file) = load_file(&root, config.as_deref())?;
    let overrides = Overrides {
        artifacts: vec![
            (ArtifactKind::Schema, schema),
            (ArtifactKind::Types, types),
            (ArtifactKind::Endpoints, endpoints),
            (ArtifactKind::Validation, validation),
            (ArtifactKind::Errors, errors),
            (ArtifactKind::Routes, routes),
            (ArtifactKind::Usage, usage),
        ],
        policy_granularity,
        identity_tables,
        api_prefix,
        endpoint_table,
        pairs,
    };
    let out = out.unwrap_or_else(|| root.join(DEFAULT_REPORT_FILE));
    let settings = resolve(root, config_file, file_config, overrides)?;

    run_check(&settings, &out)
}

fn list_rules() -> CliResult<ExitStatus> {
    for rule in registry() {
        let requires: Vec<&str> = rule.requires().iter().map(ArtifactKind::as_str).collect();
        let requires = if requires.is_empty() {
            "any".to_string()
        } else {
            requires.join(", ")
        };
        println!(
            "{:<4}{:<30}{:<24}{}",
            rule.id(),
            rule.name(),
            requires,
            rule.description()
        );
    }
    Ok(ExitStatus::Clean)
}

fn print_schema() -> CliResult<ExitStatus> {
    print!("{}", report_schema()?);
    Ok(ExitStatus::Clean)
}
