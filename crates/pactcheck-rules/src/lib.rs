//! Consistency rules evaluated against the canonical model.
//!
//! Every rule is a pure function of the model and the rule options. The
//! engine runs them concurrently and isolates failures per rule.

mod engine;
mod errors;
mod finding;
mod options;
pub mod rules;

pub use engine::{Evaluation, Outcome, Rule, evaluate, evaluate_rules, registry};
pub use errors::RuleError;
pub use finding::{Finding, FindingKind, Severity, Skipped};
pub use options::{PolicyGranularity, RuleOptions};
