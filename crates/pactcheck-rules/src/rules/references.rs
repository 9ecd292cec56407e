use std::collections::BTreeSet;

use pactcheck_core::{ArtifactKind, CanonicalModel, Endpoint};

use crate::engine::{Evaluation, Rule};
use crate::errors::RuleError;
use crate::finding::Finding;
use crate::options::RuleOptions;

const REQUIRES: [ArtifactKind; 1] = [ArtifactKind::Types];

/// Names that never refer to a declared type.
const BUILTINS: [&str; 14] = [
    "string", "number", "boolean", "bigint", "void", "null", "undefined", "unknown", "any",
    "object", "never", "Blob", "File", "FormData",
];

/// R7: type names used by endpoints and validation schemas are declared.
pub struct ReferenceIntegrity;

impl Rule for ReferenceIntegrity {
    fn id(&self) -> &'static str {
        "R7"
    }

    fn name(&self) -> &'static str {
        "reference-integrity"
    }

    fn description(&self) -> &'static str {
        "endpoint request/response types and validation targets name declared types and fields"
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &REQUIRES
    }

    fn check(&self, model: &CanonicalModel, _: &RuleOptions) -> Result<Evaluation, RuleError> {
        let mut evaluation = Evaluation::default();

        for endpoint in model.endpoints().values() {
            for (role, name) in [
                ("request", endpoint.request_type.as_deref()),
                ("response", endpoint.response_type.as_deref()),
            ] {
                if let Some(name) = name {
                    self.check_type_ref(model, endpoint, role, name, &mut evaluation);
                }
            }
        }

        let mut undeclared_owners = BTreeSet::new();
        for (target, rules) in model.validations() {
            let Some(first) = rules.first() else {
                continue;
            };
            let Some(def) = model.type_def(&target.owner) else {
                if undeclared_owners.insert(target.owner.as_str()) {
                    evaluation.push(
                        Finding::warning(
                            self.id(),
                            format!("validation schema targets undeclared type `{}`", target.owner),
                        )
                        .with_hint(format!(
                            "declare `{}` in the types artifact or rename the schema after an existing type",
                            target.owner
                        ))
                        .with_artifacts([ArtifactKind::Types, ArtifactKind::Validation])
                        .at(&first.location),
                    );
                }
                continue;
            };
            if def.field(&target.field).is_none() {
                evaluation.push(
                    Finding::error(
                        self.id(),
                        format!(
                            "validation rule targets `{target}` but type `{}` has no field `{}`",
                            def.name, target.field
                        ),
                    )
                    .with_hint(format!(
                        "add `{}` to `{}` or remove the rule from the schema",
                        target.field, def.name
                    ))
                    .with_artifacts([ArtifactKind::Types, ArtifactKind::Validation])
                    .at(&first.location)
                    .at(&def.location),
                );
            }
        }
        Ok(evaluation)
    }
}

impl ReferenceIntegrity {
    fn check_type_ref(
        &self,
        model: &CanonicalModel,
        endpoint: &Endpoint,
        role: &str,
        name: &str,
        evaluation: &mut Evaluation,
    ) {
        let name = name.trim_end_matches("[]");
        if BUILTINS.contains(&name) {
            return;
        }
        if name.contains('<') {
            evaluation.skip(
                self.id(),
                format!(
                    "endpoint `{}` {role} type `{name}` is a generic instantiation; unsupported, skipped",
                    endpoint.key()
                ),
            );
            return;
        }
        if model.type_def(name).is_none() {
            evaluation.push(
                Finding::error(
                    self.id(),
                    format!(
                        "endpoint `{}` names undeclared {role} type `{name}`",
                        endpoint.key()
                    ),
                )
                .with_hint(format!(
                    "declare `{name}` in the types artifact or fix the endpoint annotation"
                ))
                .with_artifacts([ArtifactKind::Endpoints, ArtifactKind::Types])
                .at(&endpoint.location),
            );
        }
    }
}
