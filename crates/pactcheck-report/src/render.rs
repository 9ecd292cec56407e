use pactcheck_rules::Severity;

use crate::errors::ReportError;
use crate::model::{Report, ReportFinding};

/// Pretty JSON with a trailing newline.
pub fn to_json(report: &Report) -> Result<String, ReportError> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}

/// JSON Schema of [`Report`].
pub fn report_schema() -> Result<String, ReportError> {
    let schema = schemars::schema_for!(Report);
    let mut json = serde_json::to_string_pretty(&schema)?;
    json.push('\n');
    Ok(json)
}

/// Render the human-readable summary printed on stdout.
pub fn render_summary(report: &Report) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "pactcheck: {} error(s), {} warning(s), {} parse issue(s), {} skipped",
        report.summary.errors,
        report.summary.warnings,
        report.summary.parse_issues,
        report.summary.skipped
    ));

    for notice in &report.warnings {
        lines.push(format!("warning: {notice}"));
    }

    for (severity, title) in [(Severity::Error, "Errors"), (Severity::Warning, "Warnings")] {
        let findings: Vec<&ReportFinding> = report
            .findings
            .iter()
            .filter(|finding| finding.severity == severity)
            .collect();
        if findings.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("{title}:"));
        for finding in findings {
            lines.push(format!("- [{}] {}", finding.id, finding.message));
            for location in &finding.locations {
                lines.push(format!("    at {location}"));
            }
            if let Some(hint) = &finding.hint {
                lines.push(format!("    hint: {hint}"));
            }
        }
    }

    if !report.parse_issues.is_empty() {
        lines.push(String::new());
        lines.push("Parse issues:".to_string());
        for issue in &report.parse_issues {
            let snippet = issue
                .snippet
                .as_ref()
                .map(|snippet| format!(" ({snippet})"))
                .unwrap_or_default();
            lines.push(format!("- {}: {}{}", issue.location, issue.message, snippet));
        }
    }

    if !report.skipped.is_empty() {
        lines.push(String::new());
        lines.push("Not checked:".to_string());
        for skipped in &report.skipped {
            lines.push(format!("- {}: {}", skipped.rule, skipped.reason));
        }
    }

    lines.join("\n")
}
