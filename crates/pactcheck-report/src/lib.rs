//! Report assembly for pactcheck.
//!
//! Turns rule output and extraction warnings into a deterministic JSON
//! report, a human summary and a process exit status.

mod build;
mod errors;
mod model;
mod render;

pub use build::{build_report, finding_id};
pub use errors::ReportError;
pub use model::{ExitStatus, ParseIssue, Report, ReportFinding, Summary};
pub use render::{render_summary, report_schema, to_json};
