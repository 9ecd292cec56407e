use pactcheck_core::{ArtifactKind, Location, ParseWarning};
use pactcheck_rules::{FindingKind, Severity, Skipped};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The machine-readable report written for CI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_version: String,
    pub summary: Summary,
    /// Sorted by severity, then location.
    pub findings: Vec<ReportFinding>,
    pub parse_issues: Vec<ParseIssue>,
    /// Rules or items that could not be checked, with the reason.
    pub skipped: Vec<Skipped>,
    /// Run-level notices such as `no artifacts discovered`.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub parse_issues: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportFinding {
    /// `<rule>-<12 hex>`, stable for identical input.
    pub id: String,
    pub kind: FindingKind,
    pub severity: Severity,
    pub rule: String,
    pub artifacts: Vec<ArtifactKind>,
    pub message: String,
    pub locations: Vec<Location>,
    /// Suggested fix, when the rule can name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParseIssue {
    pub location: Location,
    pub artifact: ArtifactKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl From<&ParseWarning> for ParseIssue {
    fn from(warning: &ParseWarning) -> Self {
        Self {
            location: warning.location.clone(),
            artifact: warning.artifact,
            message: warning.message.clone(),
            snippet: warning.snippet.clone(),
        }
    }
}

/// Process exit status derived from a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// No error-severity finding.
    Clean,
    /// At least one error-severity finding.
    Errors,
    /// The run could not start: bad arguments, paths or configuration.
    Invocation,
}

impl ExitStatus {
    pub fn of(report: &Report) -> Self {
        if report.summary.errors > 0 {
            ExitStatus::Errors
        } else {
            ExitStatus::Clean
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::Errors => 1,
            ExitStatus::Invocation => 2,
        }
    }
}
