use std::fmt;

use pactcheck_core::{ArtifactKind, Location};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finding severity. Errors sort before warnings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// The artifacts disagree.
    Consistency,
    /// The rule itself failed; its other results are missing.
    InternalRuleError,
}

/// A diagnostic produced by one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule: String,
    pub kind: FindingKind,
    pub severity: Severity,
    /// Artifact kinds involved, sorted and unique.
    pub artifacts: Vec<ArtifactKind>,
    pub message: String,
    pub locations: Vec<Location>,
    /// Suggested fix, when the rule can name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Finding {
    pub fn error(rule: &str, message: impl Into<String>) -> Self {
        Self::new(rule, FindingKind::Consistency, Severity::Error, message)
    }

    pub fn warning(rule: &str, message: impl Into<String>) -> Self {
        Self::new(rule, FindingKind::Consistency, Severity::Warning, message)
    }

    pub fn internal(rule: &str, message: impl Into<String>) -> Self {
        Self::new(rule, FindingKind::InternalRuleError, Severity::Error, message)
    }

    fn new(rule: &str, kind: FindingKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            kind,
            severity,
            artifacts: Vec::new(),
            message: message.into(),
            locations: Vec::new(),
            hint: None,
        }
    }

    pub fn with_artifacts(mut self, artifacts: impl IntoIterator<Item = ArtifactKind>) -> Self {
        self.artifacts.extend(artifacts);
        self.artifacts.sort();
        self.artifacts.dedup();
        self
    }

    pub fn at(mut self, location: &Location) -> Self {
        if !self.locations.contains(location) {
            self.locations.push(location.clone());
        }
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Something a rule did not check, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct Skipped {
    pub rule: String,
    pub reason: String,
}

impl Skipped {
    pub fn new(rule: &str, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}
