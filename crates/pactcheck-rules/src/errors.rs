use thiserror::Error;

/// Reasons a rule could not finish evaluating.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{entity} `{name}` is referenced by the model but missing from it")]
    MissingEntity { entity: &'static str, name: String },
    #[error("rule panicked: {0}")]
    Panicked(String),
}
