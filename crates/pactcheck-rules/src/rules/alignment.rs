use std::collections::BTreeMap;

use pactcheck_core::{ArtifactKind, BoundKind, BoundOrigin, CanonicalModel, Location};

use crate::engine::{Evaluation, Rule};
use crate::errors::RuleError;
use crate::finding::Finding;
use crate::options::RuleOptions;
use crate::rules::{artifact_of, format_value};

/// R3: a field's numeric or length bound has one value wherever it is
/// declared.
pub struct BoundAlignment;

/// One declaration of a bound, whatever its origin.
struct Declared<'a> {
    value: f64,
    literal: String,
    origin: BoundOrigin,
    location: &'a Location,
}

impl Rule for BoundAlignment {
    fn id(&self) -> &'static str {
        "R3"
    }

    fn name(&self) -> &'static str {
        "validation-alignment"
    }

    fn description(&self) -> &'static str {
        "a bound declared for the same field in several places has the same value everywhere"
    }

    // Bounds can come from any artifact, so the rule always runs.
    fn requires(&self) -> &'static [ArtifactKind] {
        &[]
    }

    fn check(&self, model: &CanonicalModel, _: &RuleOptions) -> Result<Evaluation, RuleError> {
        let mut groups: BTreeMap<(String, String, BoundKind), Vec<Declared<'_>>> = BTreeMap::new();

        for (target, rules) in model.validations() {
            let owner = model.owner_type(&target.owner).to_string();
            for rule in rules {
                let Some((kind, value)) = rule.constraint.bound() else {
                    continue;
                };
                groups
                    .entry((owner.clone(), target.field.clone(), kind))
                    .or_default()
                    .push(Declared {
                        value,
                        literal: rule.literal.clone().unwrap_or_else(|| format_value(value)),
                        origin: BoundOrigin::Validation,
                        location: &rule.location,
                    });
            }
        }
        for bound in model.bounds() {
            let owner = model.owner_type(&bound.target.owner).to_string();
            groups
                .entry((owner, bound.target.field.clone(), bound.kind))
                .or_default()
                .push(Declared {
                    value: bound.value,
                    literal: bound.literal.clone(),
                    origin: bound.origin.clone(),
                    location: &bound.location,
                });
        }

        let mut evaluation = Evaluation::default();
        for ((owner, field, kind), mut declared) in groups {
            if declared.len() < 2 {
                continue;
            }
            declared.sort_by(|a, b| a.location.cmp(b.location));
            let first = &declared[0];
            for other in &declared[1..] {
                if other.value == first.value {
                    continue;
                }
                let artifacts = [first.location, other.location]
                    .into_iter()
                    .filter_map(|location| artifact_of(model, location));
                evaluation.push(
                    Finding::error(
                        self.id(),
                        format!(
                            "{kind} of `{owner}.{field}` disagrees: `{}` ({}) at {} vs `{}` ({}) at {}",
                            first.literal,
                            first.origin,
                            first.location,
                            other.literal,
                            other.origin,
                            other.location
                        ),
                    )
                    .with_hint(format!(
                        "derive both from one shared value, e.g. `{}` from the {}",
                        first.literal, first.origin
                    ))
                    .with_artifacts(artifacts)
                    .at(first.location)
                    .at(other.location),
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
    fn differing_validation_and_constant_produce_one_error() {
        let model = model(&[
            (
                ArtifactKind::Validation,
                "contracts/validation.ts",
                "export const UploadCVSchema = z.object({\n  file_size: z.number().max(10 * 1024 * 1024),\n  title: z.string().min(1),\n});\n",
            ),
            (
                ArtifactKind::Endpoints,
                "contracts/endpoints.ts",
                "/** @bound UploadCV.file_size max */\nexport const MAX_UPLOAD_BYTES = '20MB';\n",
            ),
        ]);
        let evaluation = BoundAlignment
            .check(&model, &RuleOptions::default())
            .expect("rule runs");
        assert_eq!(evaluation.findings.len(), 1);
        let finding = &evaluation.findings[0];
        assert!(finding.message.contains("`10 * 1024 * 1024` (validation rule)"));
        assert!(finding.message.contains("`'20MB'` (constant MAX_UPLOAD_BYTES)"));
        assert_eq!(finding.locations.len(), 2);
        assert_eq!(
            finding.artifacts,
            vec![ArtifactKind::Endpoints, ArtifactKind::Validation]
        );
    }

    #[test]
    fn table_bounds_meet_validation_through_pairing() {
        let model = model(&[
            (
                ArtifactKind::Schema,
                "contracts/database.sql",
                "CREATE TABLE cvs (id UUID PRIMARY KEY, title VARCHAR(100) NOT NULL);",
            ),
            (
                ArtifactKind::Types,
                "contracts/types.ts",
                "export interface CV { id: string; title: string }",
            ),
            (
                ArtifactKind::Validation,
                "contracts/validation.ts",
                "export const CVSchema = z.object({ title: z.string().max(100) });",
            ),
        ]);
        let evaluation = BoundAlignment
            .check(&model, &RuleOptions::default())
            .expect("rule runs");
        assert!(evaluation.findings.is_empty(), "{:?}", evaluation.findings);
    }

    #[test]
    fn equal_values_written_differently_agree() {
        let model = model(&[
            (
                ArtifactKind::Validation,
                "contracts/validation.ts",
                "export const UploadCVSchema = z.object({ file_size: z.number().max(10485760) });",
            ),
            (
                ArtifactKind::Types,
                "contracts/types.ts",
                "/** @bound UploadCV.file_size max */\nexport const MAX_UPLOAD = 10 * 1024 * 1024;\n",
            ),
        ]);
        let evaluation = BoundAlignment
            .check(&model, &RuleOptions::default())
            .expect("rule runs");
        assert!(evaluation.findings.is_empty());
    }
}
