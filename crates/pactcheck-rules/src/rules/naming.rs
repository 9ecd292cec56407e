use pactcheck_core::naming::{camel_to_snake, differs_only_in_casing, snake_to_camel};
use pactcheck_core::{ArtifactKind, CanonicalModel};

use crate::engine::{Evaluation, Rule};
use crate::errors::RuleError;
use crate::finding::Finding;
use crate::options::RuleOptions;
use crate::rules::paired;

const ARTIFACTS: [ArtifactKind; 2] = [ArtifactKind::Schema, ArtifactKind::Types];

/// R5: a column without an exact field, whose name only differs from a
/// field by casing convention.
pub struct NamingConsistency;

impl Rule for NamingConsistency {
    fn id(&self) -> &'static str {
        "R5"
    }

    fn name(&self) -> &'static str {
        "naming-convention-consistency"
    }

    fn description(&self) -> &'static str {
        "column and field names that differ only in casing convention"
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &ARTIFACTS
    }

    fn check(&self, model: &CanonicalModel, _: &RuleOptions) -> Result<Evaluation, RuleError> {
        let schema = model.fingerprint(ArtifactKind::Schema).describe();
        let types = model.fingerprint(ArtifactKind::Types).describe();
        let mut evaluation = Evaluation::default();
        for (table, def) in paired(model)? {
            for column in &table.fields {
                if def.field(&column.name).is_some() {
                    continue;
                }
                for field in &def.fields {
                    if !differs_only_in_casing(&column.name, &field.name) {
                        continue;
                    }
                    evaluation.push(
                        Finding::warning(
                            self.id(),
                            format!(
                                "column `{}.{}` and field `{}.{}` differ only in casing (schema: {schema}; types: {types})",
                                table.name, column.name, def.name, field.name
                            ),
                        )
                        .with_hint(format!(
                            "rename the field to `{}` or the column to `{}` so the names match exactly",
                            camel_to_snake(&field.name),
                            snake_to_camel(&column.name)
                        ))
                        .with_artifacts(ARTIFACTS)
                        .at(&column.location)
                        .at(&field.location),
                    );
                }
            }
        }
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::model;

    #[test]
    fn flags_casing_only_pairs_with_fingerprints() {
        let model = model(&[
            (
                ArtifactKind::Schema,
                "contracts/database.sql",
                "CREATE TABLE cvs (user_id UUID NOT NULL, file_size INTEGER);",
            ),
            (
                ArtifactKind::Types,
                "contracts/types.ts",
                "export interface CV { userId: string; file_size?: number }",
            ),
        ]);
        let evaluation = NamingConsistency
            .check(&model, &RuleOptions::default())
            .expect("rule runs");
        assert_eq!(evaluation.findings.len(), 1);
        assert_eq!(
            evaluation.findings[0].message,
            "column `cvs.user_id` and field `CV.userId` differ only in casing (schema: 100% snake_case, 0% camelCase; types: 50% snake_case, 50% camelCase)"
        );
        assert_eq!(
            evaluation.findings[0].hint.as_deref(),
            Some("rename the field to `user_id` or the column to `userId` so the names match exactly")
        );
    }
}
