use std::fs;
use std::path::Path;

use pactcheck_core::{ArtifactKind, BuildOptions, CanonicalModel, ModelBuilder};
use pactcheck_extract::{ExtractOptions, SourceText, extract};
use pactcheck_rules::{Finding, FindingKind, RuleOptions, Severity, evaluate};

const ARTIFACTS: [(ArtifactKind, &str); 6] = [
    (ArtifactKind::Schema, "contracts/database.sql"),
    (ArtifactKind::Types, "contracts/types.ts"),
    (ArtifactKind::Endpoints, "contracts/endpoints.ts"),
    (ArtifactKind::Validation, "contracts/validation.ts"),
    (ArtifactKind::Errors, "contracts/errors.ts"),
    (ArtifactKind::Usage, "apps/web/src/lib/api.ts"),
];

const ROUTES: &str = "apps/server/src/routes/cv.ts";

fn load(project: &str, usage: &[&str]) -> CanonicalModel {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(project);
    let mut files: Vec<(ArtifactKind, String)> = ARTIFACTS[..5]
        .iter()
        .map(|(kind, path)| (*kind, path.to_string()))
        .collect();
    files.push((ArtifactKind::Routes, ROUTES.to_string()));
    files.extend(usage.iter().map(|path| (ArtifactKind::Usage, path.to_string())));

    let mut builder = ModelBuilder::new(BuildOptions::default());
    for (kind, path) in files {
        let text = fs::read_to_string(root.join(&path))
            .unwrap_or_else(|_| panic!("missing fixture {project}/{path}"));
        let source = SourceText::new(path.as_str(), text.as_str());
        builder.add(extract(kind, &source, &ExtractOptions::default()));
    }
    builder.build()
}

fn has(findings: &[Finding], rule: &str, severity: Severity, fragment: &str) -> bool {
    findings
        .iter()
        .any(|f| f.rule == rule && f.severity == severity && f.message.contains(fragment))
}

#[test]
fn aligned_project_has_no_findings() {
    let model = load("aligned", &[ARTIFACTS[5].1]);
    let outcome = evaluate(&model, &RuleOptions::default());
    assert!(outcome.findings.is_empty(), "{:#?}", outcome.findings);
    assert!(
        outcome
            .skipped
            .iter()
            .any(|s| s.rule == "R7" && s.reason.contains("PaginatedResponse<CV>"))
    );
}

#[test]
fn drifted_project_reports_every_kind_of_drift() {
    let model = load(
        "recruiting",
        &["apps/web/src/components/CvCard.tsx", "apps/web/src/lib/cv.ts"],
    );
    let outcome = evaluate(&model, &RuleOptions::default());
    let findings = &outcome.findings;

    let expected = [
        ("R1", Severity::Error, "column `cvs.user_id` has no field `user_id` in type `CV`"),
        ("R1", Severity::Error, "column `cv_analyses.score` is INTEGER (number)"),
        ("R2", Severity::Error, "no declared endpoint matches `POST /api/v1/cv/{id}/share`"),
        ("R2", Severity::Warning, "endpoint `CV.ANALYZE`"),
        ("R3", Severity::Error, "`'20MB'` (constant MAX_CV_FILE_SIZE)"),
        ("R4", Severity::Error, "column `cvs.summary` is nullable"),
        ("R5", Severity::Warning, "`cvs.user_id` and field `CV.userId`"),
        ("R6", Severity::Error, "table `interview_sessions` references identity table"),
        ("R7", Severity::Error, "undeclared request type `UploadCVRequest`"),
        ("R8", Severity::Error, "error code `RATE_LIMITED` has no HTTP status"),
        ("R9", Severity::Warning, "table `interview_sessions` has no corresponding type"),
        ("R10", Severity::Warning, "endpoint `CV.ANALYZE` (POST /api/v1/cv/{id}/analyze) has no backend route"),
        ("R10", Severity::Warning, "backend route `POST /{id}/share` (relative to its mount point)"),
    ];
    for (rule, severity, fragment) in expected {
        assert!(
            has(findings, rule, severity, fragment),
            "missing {rule} {severity} `{fragment}` in {findings:#?}"
        );
    }
    assert!(findings.iter().all(|f| f.kind == FindingKind::Consistency));
    assert!(!has(findings, "R2", Severity::Warning, "`CV.LIST`"));
    assert!(!has(findings, "R2", Severity::Error, "legacy"));
}

#[test]
fn per_verb_granularity_adds_verb_warnings() {
    let model = load("recruiting", &["apps/web/src/lib/cv.ts"]);
    let options = RuleOptions {
        policy_granularity: pactcheck_rules::PolicyGranularity::PerVerb,
        ..RuleOptions::default()
    };
    let outcome = evaluate(&model, &options);
    let verbs: Vec<&str> = outcome
        .findings
        .iter()
        .filter(|f| f.rule == "R6" && f.severity == Severity::Warning)
        .map(|f| f.message.as_str())
        .collect();
    assert_eq!(
        verbs,
        vec!["table `cvs` has no UPDATE policy", "table `cvs` has no DELETE policy"]
    );
}

#[test]
fn row_security_in_a_later_migration_satisfies_identity_tables() {
    let migrations = [
        (
            "supabase/migrations/001_tables.sql",
            "CREATE TABLE cvs (\n  id UUID PRIMARY KEY,\n  user_id UUID NOT NULL REFERENCES auth.users(id)\n);\n",
        ),
        (
            "supabase/migrations/002_rls.sql",
            "ALTER TABLE cvs ENABLE ROW LEVEL SECURITY;\nCREATE POLICY cvs_all ON cvs FOR ALL USING (auth.uid() = user_id);\n",
        ),
    ];
    let mut builder = ModelBuilder::new(BuildOptions::default());
    for (path, text) in migrations.iter().rev() {
        let source = SourceText::new(*path, *text);
        builder.add(extract(ArtifactKind::Schema, &source, &ExtractOptions::default()));
    }
    let model = builder.build();

    let cvs = model.table("cvs").expect("cvs merged");
    assert!(cvs.rls_enabled);
    assert!(cvs.policies.missing_verbs().is_empty());
    assert!(model.warnings().is_empty(), "{:?}", model.warnings());

    let outcome = evaluate(&model, &RuleOptions::default());
    assert!(
        outcome.findings.iter().all(|f| f.rule != "R6"),
        "{:#?}",
        outcome.findings
    );
}
