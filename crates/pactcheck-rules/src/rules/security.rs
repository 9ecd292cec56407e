use pactcheck_core::{ArtifactKind, CanonicalModel, ForeignKeyRef, Table};

use crate::engine::{Evaluation, Rule};
use crate::errors::RuleError;
use crate::finding::Finding;
use crate::options::{PolicyGranularity, RuleOptions};

const ARTIFACTS: [ArtifactKind; 1] = [ArtifactKind::Schema];

/// R6: tables that reference an identity table are protected by row-level
/// security policies.
pub struct SecurityPolicyPresence;

impl Rule for SecurityPolicyPresence {
    fn id(&self) -> &'static str {
        "R6"
    }

    fn name(&self) -> &'static str {
        "security-policy-presence"
    }

    fn description(&self) -> &'static str {
        "tables with a foreign key to an identity table declare row-level security policies"
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &ARTIFACTS
    }

    fn check(&self, model: &CanonicalModel, options: &RuleOptions) -> Result<Evaluation, RuleError> {
        let mut evaluation = Evaluation::default();
        for table in model.tables().values() {
            if is_identity(table, &options.identity_tables) {
                continue;
            }
            let Some(fk) = identity_reference(table, &options.identity_tables) else {
                continue;
            };

            if table.policies.is_empty() {
                evaluation.push(
                    Finding::error(
                        self.id(),
                        format!(
                            "table `{}` references identity table `{}` but declares no row-level security policy",
                            table.name, fk.table
                        ),
                    )
                    .with_hint(format!(
                        "ALTER TABLE {} ENABLE ROW LEVEL SECURITY and add a policy scoped to the owning user",
                        table.name
                    ))
                    .with_artifacts(ARTIFACTS)
                    .at(&table.location)
                    .at(&fk.location),
                );
                continue;
            }

            if !table.rls_enabled {
                evaluation.push(
                    Finding::warning(
                        self.id(),
                        format!(
                            "table `{}` declares policies but never enables row level security",
                            table.name
                        ),
                    )
                    .with_hint(format!(
                        "ALTER TABLE {} ENABLE ROW LEVEL SECURITY",
                        table.name
                    ))
                    .with_artifacts(ARTIFACTS)
                    .at(&table.location),
                );
            }

            if options.policy_granularity == PolicyGranularity::PerVerb
                && table.policies.is_granular()
            {
                for verb in table.policies.missing_verbs() {
                    evaluation.push(
                        Finding::warning(
                            self.id(),
                            format!(
                                "table `{}` has no {} policy",
                                table.name,
                                verb.to_ascii_uppercase()
                            ),
                        )
                        .with_hint(format!(
                            "CREATE POLICY .. ON {} FOR {}",
                            table.name,
                            verb.to_ascii_uppercase()
                        ))
                        .with_artifacts(ARTIFACTS)
                        .at(&table.location),
                    );
                }
            }
        }
        Ok(evaluation)
    }
}

fn is_identity(table: &Table, identity_tables: &[String]) -> bool {
    let qualified = table.qualified_name();
    identity_tables
        .iter()
        .any(|name| name.eq_ignore_ascii_case(&qualified) || name.eq_ignore_ascii_case(&table.name))
}

fn identity_reference<'a>(table: &'a Table, identity_tables: &[String]) -> Option<&'a ForeignKeyRef> {
    table
        .foreign_keys
        .iter()
        .find(|fk| identity_tables.iter().any(|name| fk.targets(name)))
}
