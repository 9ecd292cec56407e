use pactcheck_core::{ArtifactKind, CanonicalModel};

use crate::engine::{Evaluation, Rule};
use crate::errors::RuleError;
use crate::finding::Finding;
use crate::options::RuleOptions;
use crate::rules::paired;

const ARTIFACTS: [ArtifactKind; 2] = [ArtifactKind::Schema, ArtifactKind::Types];

/// R4: a nullable column maps to an optional or nullable field, and the
/// reverse.
pub struct NullabilityConsistency;

impl Rule for NullabilityConsistency {
    fn id(&self) -> &'static str {
        "R4"
    }

    fn name(&self) -> &'static str {
        "nullability-consistency"
    }

    fn description(&self) -> &'static str {
        "nullable columns and optional or nullable fields correspond both ways"
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &ARTIFACTS
    }

    fn check(&self, model: &CanonicalModel, _: &RuleOptions) -> Result<Evaluation, RuleError> {
        let mut evaluation = Evaluation::default();
        for (table, def) in paired(model)? {
            for column in &table.fields {
                let Some(field) = def.field(&column.name) else {
                    continue;
                };
                let (message, hint) = match (column.nullable, field.nullable) {
                    (true, false) => (
                        format!(
                            "column `{}.{}` is nullable but field `{}.{}` is required",
                            table.name, column.name, def.name, field.name
                        ),
                        format!(
                            "type `{}.{}` as `| null` or add NOT NULL to the column",
                            def.name, field.name
                        ),
                    ),
                    (false, true) => (
                        format!(
                            "column `{}.{}` is NOT NULL but field `{}.{}` is optional or nullable",
                            table.name, column.name, def.name, field.name
                        ),
                        if column.has_default {
                            format!(
                                "rows always carry `{}` once its default applies; make the field required and leave it optional only in a request type",
                                column.name
                            )
                        } else {
                            format!(
                                "make `{}.{}` required or drop NOT NULL from the column",
                                def.name, field.name
                            )
                        },
                    ),
                    _ => continue,
                };
                evaluation.push(
                    Finding::error(self.id(), message)
                        .with_hint(hint)
                        .with_artifacts(ARTIFACTS)
                        .at(&column.location)
                        .at(&field.location),
                );
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
    fn reports_mismatches_in_both_directions() {
        let model = model(&[
            (
                ArtifactKind::Schema,
                "contracts/database.sql",
                "CREATE TABLE cvs (id UUID PRIMARY KEY, summary TEXT, title TEXT NOT NULL, notes TEXT, score INTEGER NOT NULL);",
            ),
            (
                ArtifactKind::Types,
                "contracts/types.ts",
                "export interface CV {\n  id: string;\n  summary: string;\n  title?: string;\n  notes: string | null;\n  score: number;\n}",
            ),
        ]);
        let evaluation = NullabilityConsistency
            .check(&model, &RuleOptions::default())
            .expect("rule runs");
        let messages: Vec<_> = evaluation.findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "column `cvs.summary` is nullable but field `CV.summary` is required",
                "column `cvs.title` is NOT NULL but field `CV.title` is optional or nullable",
            ]
        );
        assert_eq!(evaluation.findings[0].locations[1].line, 3);
    }

    #[test]
    fn defaulted_columns_point_at_request_types() {
        let model = model(&[
            (
                ArtifactKind::Schema,
                "contracts/database.sql",
                "CREATE TABLE cvs (id UUID PRIMARY KEY DEFAULT gen_random_uuid(), title TEXT NOT NULL);",
            ),
            (
                ArtifactKind::Types,
                "contracts/types.ts",
                "export interface CV { id?: string; title?: string; }",
            ),
        ]);
        let evaluation = NullabilityConsistency
            .check(&model, &RuleOptions::default())
            .expect("rule runs");
        let hints: Vec<_> = evaluation
            .findings
            .iter()
            .filter_map(|f| f.hint.as_deref())
            .collect();
        assert_eq!(
            hints,
            vec![
                "rows always carry `id` once its default applies; make the field required and leave it optional only in a request type",
                "make `CV.title` required or drop NOT NULL from the column",
            ]
        );
    }
}
