use pactcheck_core::naming::differs_only_in_casing;
use pactcheck_core::{ArtifactKind, CanonicalModel};

use crate::engine::{Evaluation, Rule};
use crate::errors::RuleError;
use crate::finding::Finding;
use crate::options::RuleOptions;
use crate::rules::paired;

const ARTIFACTS: [ArtifactKind; 2] = [ArtifactKind::Schema, ArtifactKind::Types];

/// R1: columns and fields of a paired table and type agree by exact name and
/// compatible kind.
pub struct FieldParity;

impl Rule for FieldParity {
    fn id(&self) -> &'static str {
        "R1"
    }

    fn name(&self) -> &'static str {
        "table-type-field-parity"
    }

    fn description(&self) -> &'static str {
        "every column of a paired table has a same-named field of a compatible kind, and every required field has a column"
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &ARTIFACTS
    }

    fn check(&self, model: &CanonicalModel, _: &RuleOptions) -> Result<Evaluation, RuleError> {
        let mut evaluation = Evaluation::default();
        for (table, def) in paired(model)? {
            let mut missing = Vec::new();
            for column in &table.fields {
                match def.field(&column.name) {
                    None => {
                        missing.push(column.name.as_str());
                        evaluation.push(
                            Finding::error(
                                self.id(),
                                format!(
                                    "column `{}.{}` has no field `{}` in type `{}`",
                                    table.name, column.name, column.name, def.name
                                ),
                            )
                            .with_hint(format!(
                                "add `{}` to `{}` or pair the table with a different type",
                                column.name, def.name
                            ))
                            .with_artifacts(ARTIFACTS)
                            .at(&column.location)
                            .at(&def.location),
                        );
                    }
                    Some(field) if !column.kind.accepts(field.kind) => evaluation.push(
                        Finding::error(
                            self.id(),
                            format!(
                                "column `{}.{}` is {} ({}) but field `{}.{}` is {} ({})",
                                table.name,
                                column.name,
                                column.raw_type,
                                column.kind,
                                def.name,
                                field.name,
                                field.raw_type,
                                field.kind
                            ),
                        )
                        .with_hint(format!(
                            "declare `{}.{}` as a {} field",
                            def.name, field.name, column.kind
                        ))
                        .with_artifacts(ARTIFACTS)
                        .at(&column.location)
                        .at(&field.location),
                    ),
                    Some(_) => {}
                }
            }

            for field in &def.fields {
                if field.nullable || table.field(&field.name).is_some() {
                    continue;
                }
                // Casing variants of a missing column are left to R5.
                if missing
                    .iter()
                    .any(|column| differs_only_in_casing(column, &field.name))
                {
                    continue;
                }
                evaluation.push(
                    Finding::error(
                        self.id(),
                        format!(
                            "required field `{}.{}` has no column in table `{}`",
                            def.name, field.name, table.name
                        ),
                    )
                    .with_hint(format!(
                        "add column `{}` to `{}` or mark the field optional",
                        field.name, table.name
                    ))
                    .with_artifacts(ARTIFACTS)
                    .at(&field.location)
                    .at(&table.location),
                );
            }
        }
        Ok(evaluation)
    }
}
