use pactcheck_core::{ArtifactKind, BuildOptions, CanonicalModel, ModelBuilder};
use pactcheck_extract::{ExtractOptions, SourceText, extract};
use pactcheck_rules::{Finding, PolicyGranularity, RuleOptions, Severity, evaluate};

fn model(artifacts: &[(ArtifactKind, &str, &str)]) -> CanonicalModel {
    let mut builder = ModelBuilder::new(BuildOptions::default());
    for (kind, path, text) in artifacts {
        builder.add(extract(*kind, &SourceText::new(*path, *text), &ExtractOptions::default()));
    }
    builder.build()
}

fn summary(findings: &[Finding]) -> Vec<(&str, Severity)> {
    findings
        .iter()
        .map(|finding| (finding.rule.as_str(), finding.severity))
        .collect()
}

#[test]
fn agreeing_table_and_type_produce_no_findings() {
    let model = model(&[
        (
            ArtifactKind::Schema,
            "contracts/database.sql",
            "CREATE TABLE cvs (\n  id UUID PRIMARY KEY,\n  user_id UUID NOT NULL,\n  pages INTEGER NOT NULL,\n  archived BOOLEAN NOT NULL,\n  meta JSONB,\n  created_at TIMESTAMPTZ NOT NULL\n);\n",
        ),
        (
            ArtifactKind::Types,
            "contracts/types.ts",
            "export interface CV {\n  id: string;\n  user_id: string;\n  pages: number;\n  archived: boolean;\n  meta?: Record<string, unknown>;\n  created_at: string;\n}\n",
        ),
    ]);
    let outcome = evaluate(&model, &RuleOptions::default());
    assert!(outcome.findings.is_empty(), "{:#?}", outcome.findings);
}

#[test]
fn casing_drift_yields_missing_field_and_naming_warning() {
    let model = model(&[
        (
            ArtifactKind::Schema,
            "contracts/database.sql",
            "CREATE TABLE cvs (user_id UUID NOT NULL);",
        ),
        (
            ArtifactKind::Types,
            "contracts/types.ts",
            "export interface CV { userId: string }",
        ),
    ]);
    let outcome = evaluate(&model, &RuleOptions::default());
    assert_eq!(
        summary(&outcome.findings),
        vec![("R1", Severity::Error), ("R5", Severity::Warning)]
    );
    assert!(outcome.findings[0].message.contains("`user_id`"));
    assert!(outcome.findings[1].message.contains("`CV.userId`"));
}

#[test]
fn unprotected_identity_reference_is_one_error_or_verb_warnings() {
    let schema = "CREATE TABLE cvs (\n  id UUID PRIMARY KEY,\n  user_id UUID NOT NULL REFERENCES auth.users(id)\n);\n";
    let model = model(&[(ArtifactKind::Schema, "contracts/database.sql", schema)]);

    let aggregate = evaluate(&model, &RuleOptions::default());
    assert_eq!(summary(&aggregate.findings), vec![("R6", Severity::Error)]);

    let per_verb = evaluate(
        &model,
        &RuleOptions {
            policy_granularity: PolicyGranularity::PerVerb,
            ..RuleOptions::default()
        },
    );
    assert_eq!(summary(&per_verb.findings), vec![("R6", Severity::Error)]);
}

#[test]
fn differing_bounds_cite_both_literals_and_locations() {
    let model = model(&[
        (
            ArtifactKind::Validation,
            "contracts/validation.ts",
            "export const UploadCVSchema = z.object({\n  maxSize: z.number().max('10MB'),\n});\n",
        ),
        (
            ArtifactKind::Types,
            "contracts/types.ts",
            "export interface UploadCV { maxSize: number }\n\n/** @bound UploadCV.maxSize max */\nexport const UPLOAD_LIMIT = '20MB';\n",
        ),
    ]);
    let outcome = evaluate(&model, &RuleOptions::default());
    assert_eq!(summary(&outcome.findings), vec![("R3", Severity::Error)]);
    let finding = &outcome.findings[0];
    assert!(finding.message.contains("`'10MB'`"));
    assert!(finding.message.contains("`'20MB'`"));
    let files: Vec<&str> = finding.locations.iter().map(|l| l.file.as_str()).collect();
    assert_eq!(files, vec!["contracts/types.ts", "contracts/validation.ts"]);
}

#[test]
fn empty_model_skips_every_artifact_bound_rule() {
    let outcome = evaluate(&CanonicalModel::default(), &RuleOptions::default());
    assert!(outcome.findings.is_empty());
    let skipped: Vec<&str> = outcome.skipped.iter().map(|s| s.rule.as_str()).collect();
    assert_eq!(skipped, vec!["R1", "R2", "R4", "R5", "R6", "R7", "R8", "R9", "R10"]);
}
