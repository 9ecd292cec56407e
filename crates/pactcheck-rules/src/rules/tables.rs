use pactcheck_core::naming::table_type_name;
use pactcheck_core::{ArtifactKind, CanonicalModel};

use crate::engine::{Evaluation, Rule};
use crate::errors::RuleError;
use crate::finding::Finding;
use crate::options::RuleOptions;

const ARTIFACTS: [ArtifactKind; 2] = [ArtifactKind::Schema, ArtifactKind::Types];

/// R9: every table has a declared type.
pub struct TableTypeCoverage;

impl Rule for TableTypeCoverage {
    fn id(&self) -> &'static str {
        "R9"
    }

    fn name(&self) -> &'static str {
        "table-type-coverage"
    }

    fn description(&self) -> &'static str {
        "every table pairs with a declared type"
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &ARTIFACTS
    }

    fn check(&self, model: &CanonicalModel, _: &RuleOptions) -> Result<Evaluation, RuleError> {
        let mut evaluation = Evaluation::default();
        for table in model.tables().values() {
            if model.pairing_for_table(&table.name).is_some() {
                continue;
            }
            evaluation.push(
                Finding::warning(
                    self.id(),
                    format!(
                        "table `{}` has no corresponding type (expected `{}`, an `@table {}` tag or a configured pair)",
                        table.name,
                        table_type_name(&table.name),
                        table.name
                    ),
                )
                .with_hint(format!(
                    "declare `{}` or tag an existing type with `@table {}`",
                    table_type_name(&table.name),
                    table.name
                ))
                .with_artifacts(ARTIFACTS)
                .at(&table.location),
            );
        }
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::model;

    #[test]
    fn unpaired_tables_are_warned() {
        let model = model(&[
            (
                ArtifactKind::Schema,
                "contracts/database.sql",
                "CREATE TABLE cvs (id UUID PRIMARY KEY);\nCREATE TABLE cv_analyses (id UUID PRIMARY KEY);\nCREATE TABLE audit_log (id UUID PRIMARY KEY);",
            ),
            (
                ArtifactKind::Types,
                "contracts/types.ts",
                "export interface CV { id: string }\n/** @table audit_log */\nexport interface AuditEntry { id: string }\n",
            ),
        ]);
        let evaluation = TableTypeCoverage
            .check(&model, &RuleOptions::default())
            .expect("rule runs");
        assert_eq!(evaluation.findings.len(), 1);
        assert_eq!(
            evaluation.findings[0].message,
            "table `cv_analyses` has no corresponding type (expected `CvAnalysis`, an `@table cv_analyses` tag or a configured pair)"
        );
    }
}
