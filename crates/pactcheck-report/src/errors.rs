use thiserror::Error;

/// Errors emitted while serializing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
