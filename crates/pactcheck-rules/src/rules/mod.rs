//! The registered rules, one module per concern.

mod alignment;
mod coverage;
mod naming;
mod nullability;
mod parity;
mod references;
mod routes;
mod security;
mod tables;
mod taxonomy;

pub use alignment::BoundAlignment;
pub use coverage::EndpointCoverage;
pub use naming::NamingConsistency;
pub use nullability::NullabilityConsistency;
pub use parity::FieldParity;
pub use references::ReferenceIntegrity;
pub use routes::RouteParity;
pub use security::SecurityPolicyPresence;
pub use tables::TableTypeCoverage;
pub use taxonomy::ErrorTaxonomyCompleteness;

use pactcheck_core::{ArtifactKind, CanonicalModel, Location, Table, TypeDef};

use crate::errors::RuleError;

/// Paired tables and types, resolved against the model.
pub(crate) fn paired(model: &CanonicalModel) -> Result<Vec<(&Table, &TypeDef)>, RuleError> {
    model
        .pairings()
        .iter()
        .map(|pairing| {
            let table = model
                .table(&pairing.table)
                .ok_or_else(|| RuleError::MissingEntity {
                    entity: "table",
                    name: pairing.table.clone(),
                })?;
            let def = model
                .type_def(&pairing.type_name)
                .ok_or_else(|| RuleError::MissingEntity {
                    entity: "type",
                    name: pairing.type_name.clone(),
                })?;
            Ok((table, def))
        })
        .collect()
}

/// Artifact kind whose files contain `location`.
pub(crate) fn artifact_of(model: &CanonicalModel, location: &Location) -> Option<ArtifactKind> {
    ArtifactKind::ALL
        .into_iter()
        .find(|kind| model.files(*kind).iter().any(|file| *file == location.file))
}

/// `10485760` rather than `10485760.0`.
pub(crate) fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use pactcheck_core::{ArtifactKind, BuildOptions, CanonicalModel, ModelBuilder};
    use pactcheck_extract::{ExtractOptions, SourceText, extract};

    /// Build a model from in-memory artifacts.
    pub fn model(artifacts: &[(ArtifactKind, &str, &str)]) -> CanonicalModel {
        let mut builder = ModelBuilder::new(BuildOptions::default());
        for (kind, path, text) in artifacts {
            let source = SourceText::new(*path, *text);
            builder.add(extract(*kind, &source, &ExtractOptions::default()));
        }
        builder.build()
    }
}
