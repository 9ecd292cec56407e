use std::collections::BTreeMap;

use pactcheck_core::{ArtifactKind, ParseWarning, REPORT_VERSION};
use pactcheck_rules::{Finding, Outcome, Severity};
use sha2::{Digest, Sha256};

use crate::model::{ParseIssue, Report, ReportFinding, Summary};

/// Assemble the final report from rule output and extraction warnings.
///
/// Findings sharing rule, artifacts and message are merged and their
/// locations combined. The result is sorted so that identical input always
/// serializes to identical bytes.
pub fn build_report(outcome: Outcome, parse_warnings: &[ParseWarning], notices: Vec<String>) -> Report {
    let findings = merge_findings(outcome.findings);

    let mut parse_issues: Vec<ParseIssue> = parse_warnings.iter().map(ParseIssue::from).collect();
    parse_issues.sort();
    parse_issues.dedup();

    let mut skipped = outcome.skipped;
    skipped.sort();
    skipped.dedup();

    let summary = Summary {
        errors: count(&findings, Severity::Error),
        warnings: count(&findings, Severity::Warning),
        parse_issues: parse_issues.len(),
        skipped: skipped.len(),
    };

    tracing::debug!(
        event = "report_built",
        errors = summary.errors,
        warnings = summary.warnings,
        parse_issues = summary.parse_issues,
        skipped = summary.skipped
    );

    Report {
        report_version: REPORT_VERSION.to_string(),
        summary,
        findings,
        parse_issues,
        skipped,
        warnings: notices,
    }
}

fn merge_findings(findings: Vec<Finding>) -> Vec<ReportFinding> {
    let mut merged: BTreeMap<(String, Vec<ArtifactKind>, String), Finding> = BTreeMap::new();
    for finding in findings {
        let key = (
            finding.rule.clone(),
            finding.artifacts.clone(),
            finding.message.clone(),
        );
        match merged.get_mut(&key) {
            Some(existing) => {
                existing.severity = existing.severity.min(finding.severity);
                existing.locations.extend(finding.locations);
                if existing.hint.is_none() {
                    existing.hint = finding.hint;
                }
            }
            None => {
                merged.insert(key, finding);
            }
        }
    }

    let mut findings: Vec<ReportFinding> = merged
        .into_values()
        .map(|mut finding| {
            finding.locations.sort();
            finding.locations.dedup();
            ReportFinding {
                id: finding_id(&finding),
                kind: finding.kind,
                severity: finding.severity,
                rule: finding.rule,
                artifacts: finding.artifacts,
                message: finding.message,
                locations: finding.locations,
                hint: finding.hint,
            }
        })
        .collect();
    sort_findings(&mut findings);
    findings
}

fn sort_findings(findings: &mut [ReportFinding]) {
    findings.sort_by(|a, b| {
        (
            a.severity,
            a.locations.is_empty(),
            a.locations.first(),
            &a.rule,
            &a.message,
        )
            .cmp(&(
                b.severity,
                b.locations.is_empty(),
                b.locations.first(),
                &b.rule,
                &b.message,
            ))
    });
}

/// `R1-` plus the first 12 hex digits of SHA-256 over rule, artifacts and
/// message.
pub fn finding_id(finding: &Finding) -> String {
    let artifacts: Vec<&str> = finding.artifacts.iter().map(ArtifactKind::as_str).collect();
    let mut hasher = Sha256::new();
    hasher.update(finding.rule.as_bytes());
    hasher.update([0]);
    hasher.update(artifacts.join(",").as_bytes());
    hasher.update([0]);
    hasher.update(finding.message.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", finding.rule, &digest[..12])
}

fn count(findings: &[ReportFinding], severity: Severity) -> usize {
    findings
        .iter()
        .filter(|finding| finding.severity == severity)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactcheck_core::Location;
    use pactcheck_rules::Skipped;

    fn at(file: &str, line: u32) -> Location {
        Location::new(file, line, 1)
    }

    #[test]
    fn merges_duplicates_and_sorts_errors_first() {
        let outcome = Outcome {
            findings: vec![
                Finding::warning("R5", "casing").at(&at("contracts/database.sql", 2)),
                Finding::error("R1", "missing").at(&at("contracts/types.ts", 9)),
                Finding::error("R1", "missing").at(&at("contracts/database.sql", 4)),
                Finding::internal("R7", "rule R7 (reference-integrity) failed: boom"),
                Finding::error("R4", "nullable").at(&at("contracts/database.sql", 7)),
            ],
            skipped: vec![
                Skipped::new("R2", "no usage artifact supplied"),
                Skipped::new("R2", "no usage artifact supplied"),
            ],
        };
        let report = build_report(outcome, &[], Vec::new());

        let order: Vec<(&str, &str)> = report
            .findings
            .iter()
            .map(|f| (f.rule.as_str(), f.message.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("R1", "missing"),
                ("R4", "nullable"),
                ("R7", "rule R7 (reference-integrity) failed: boom"),
                ("R5", "casing"),
            ]
        );
        assert_eq!(report.findings[0].locations.len(), 2);
        assert_eq!(report.summary.errors, 3);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn ids_depend_only_on_rule_artifacts_and_message() {
        let a = Finding::error("R1", "missing")
            .with_artifacts([ArtifactKind::Schema, ArtifactKind::Types])
            .at(&at("contracts/database.sql", 1));
        let b = Finding::error("R1", "missing")
            .with_artifacts([ArtifactKind::Types, ArtifactKind::Schema])
            .at(&at("contracts/database.sql", 40));
        let c = Finding::error("R1", "missing other").with_artifacts([ArtifactKind::Schema]);

        assert_eq!(finding_id(&a), finding_id(&b));
        assert_ne!(finding_id(&a), finding_id(&c));
        assert!(finding_id(&a).starts_with("R1-"));
        assert_eq!(finding_id(&a).len(), "R1-".len() + 12);
    }
}
