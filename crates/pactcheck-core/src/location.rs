use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The kind of hand-authored artifact an entity was extracted from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Schema,
    Types,
    Endpoints,
    Validation,
    Errors,
    /// Backend route registrations.
    Routes,
    Usage,
}

impl ArtifactKind {
    /// All kinds in report order.
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::Schema,
        ArtifactKind::Types,
        ArtifactKind::Endpoints,
        ArtifactKind::Validation,
        ArtifactKind::Errors,
        ArtifactKind::Routes,
        ArtifactKind::Usage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Schema => "schema",
            ArtifactKind::Types => "types",
            ArtifactKind::Endpoints => "endpoints",
            ArtifactKind::Validation => "validation",
            ArtifactKind::Errors => "errors",
            ArtifactKind::Routes => "routes",
            ArtifactKind::Usage => "usage",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a construct inside an artifact file.
///
/// `file` is relative to the project root and always uses `/` separators so
/// reports are identical across platforms. Ordering is file, line, column.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
