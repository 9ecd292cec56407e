use pactcheck_core::{ArtifactKind, CanonicalModel};

use crate::engine::{Evaluation, Rule};
use crate::errors::RuleError;
use crate::finding::Finding;
use crate::options::RuleOptions;

const ARTIFACTS: [ArtifactKind; 1] = [ArtifactKind::Errors];

/// R8: every listed error code has an HTTP error status and a message.
pub struct ErrorTaxonomyCompleteness;

impl Rule for ErrorTaxonomyCompleteness {
    fn id(&self) -> &'static str {
        "R8"
    }

    fn name(&self) -> &'static str {
        "error-taxonomy-completeness"
    }

    fn description(&self) -> &'static str {
        "listed error codes map to a 4xx/5xx status and a message; mapped codes are listed"
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &ARTIFACTS
    }

    fn check(&self, model: &CanonicalModel, _: &RuleOptions) -> Result<Evaluation, RuleError> {
        let codes = model.error_codes();
        // Without a code list every mapped code counts as listed.
        let has_list = codes.values().any(|code| code.listed);
        let mut evaluation = Evaluation::default();

        for code in codes.values() {
            let listed = code.listed || !has_list;
            if let Some(status) = code.status {
                if !(400..=599).contains(&status) {
                    evaluation.push(
                        Finding::error(
                            self.id(),
                            format!(
                                "error code `{}` maps to status {status}, outside 400-599",
                                code.code
                            ),
                        )
                        .with_hint("client errors use 4xx and server errors use 5xx")
                        .with_artifacts(ARTIFACTS)
                        .at(code.status_location.as_ref().unwrap_or(&code.location)),
                    );
                }
            }

            if !listed {
                let mut finding = Finding::warning(
                    self.id(),
                    format!(
                        "error code `{}` has a status or message but is not in the code list",
                        code.code
                    ),
                )
                .with_hint(format!(
                    "add `{}` to the code list or remove its status and message",
                    code.code
                ))
                .with_artifacts(ARTIFACTS)
                .at(&code.location);
                for location in [&code.status_location, &code.message_location]
                    .into_iter()
                    .flatten()
                {
                    finding = finding.at(location);
                }
                evaluation.push(finding);
                continue;
            }

            if code.status.is_none() {
                evaluation.push(
                    Finding::error(
                        self.id(),
                        format!("error code `{}` has no HTTP status", code.code),
                    )
                    .with_hint(format!("map `{}` to a 4xx or 5xx status", code.code))
                    .with_artifacts(ARTIFACTS)
                    .at(&code.location),
                );
            }
            if code.message.is_none() {
                evaluation.push(
                    Finding::warning(self.id(), format!("error code `{}` has no message", code.code))
                        .with_hint(format!("give `{}` a user-facing message", code.code))
                        .with_artifacts(ARTIFACTS)
                        .at(&code.location),
                );
            }
        }
        Ok(evaluation)
    }
}
