use std::path::PathBuf;

use thiserror::Error;

/// Every variant aborts the run with exit status 2.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Core(#[from] pactcheck_core::Error),
    #[error("report error: {0}")]
    Report(#[from] pactcheck_report::ReportError),
    #[error("invalid config file {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config file {} does not exist", .0.display())]
    MissingConfig(PathBuf),
    #[error("project root {} is not a directory", .0.display())]
    InvalidRoot(PathBuf),
    #[error("{kind} path `{path}` does not exist")]
    MissingArtifact { kind: &'static str, path: String },
    #[error("{kind} glob `{pattern}` matched no files")]
    EmptyGlob { kind: &'static str, pattern: String },
    #[error("invalid {kind} glob `{pattern}`: {source}")]
    InvalidGlob {
        kind: &'static str,
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("invalid pair `{0}`; expected table=Type")]
    InvalidPair(String),
    #[error("extraction worker stopped unexpectedly")]
    Extraction,
    #[error("logging error: {0}")]
    Logging(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = std::result::Result<T, CliError>;
