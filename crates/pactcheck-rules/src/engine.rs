use std::any::Any;
use std::thread;

use pactcheck_core::{ArtifactKind, CanonicalModel};

use crate::errors::RuleError;
use crate::finding::{Finding, Skipped};
use crate::options::RuleOptions;
use crate::rules::{
    BoundAlignment, EndpointCoverage, ErrorTaxonomyCompleteness, FieldParity,
    NamingConsistency, NullabilityConsistency, ReferenceIntegrity, RouteParity,
    SecurityPolicyPresence, TableTypeCoverage,
};

/// A pure check over the canonical model.
pub trait Rule: Send + Sync {
    /// Stable id such as `R1`.
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Artifact kinds that must all be present for the rule to run.
    fn requires(&self) -> &'static [ArtifactKind];
    fn check(&self, model: &CanonicalModel, options: &RuleOptions)
    -> Result<Evaluation, RuleError>;
}

/// Output of one rule.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub findings: Vec<Finding>,
    /// Items the rule saw but could not check.
    pub unchecked: Vec<Skipped>,
}

impl Evaluation {
    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn skip(&mut self, rule: &str, reason: impl Into<String>) {
        self.unchecked.push(Skipped::new(rule, reason));
    }
}

/// Combined output of every rule, in registry order.
#[derive(Debug, Default)]
pub struct Outcome {
    pub findings: Vec<Finding>,
    pub skipped: Vec<Skipped>,
}

static REGISTRY: [&dyn Rule; 10] = [
    &FieldParity,
    &EndpointCoverage,
    &BoundAlignment,
    &NullabilityConsistency,
    &NamingConsistency,
    &SecurityPolicyPresence,
    &ReferenceIntegrity,
    &ErrorTaxonomyCompleteness,
    &TableTypeCoverage,
    &RouteParity,
];

/// Every registered rule in id order.
pub fn registry() -> &'static [&'static dyn Rule] {
    &REGISTRY
}

/// Run the full registry.
pub fn evaluate(model: &CanonicalModel, options: &RuleOptions) -> Outcome {
    evaluate_rules(registry(), model, options)
}

/// Run `rules` concurrently against `model`.
///
/// Rules whose artifacts were not supplied are skipped. A rule that returns
/// an error or panics contributes one internal-rule-error finding and does
/// not affect the others.
pub fn evaluate_rules(
    rules: &[&dyn Rule],
    model: &CanonicalModel,
    options: &RuleOptions,
) -> Outcome {
    let mut outcome = Outcome::default();
    let mut runnable = Vec::new();
    for rule in rules.iter().copied() {
        let missing: Vec<&str> = rule
            .requires()
            .iter()
            .filter(|kind| !model.has(**kind))
            .map(ArtifactKind::as_str)
            .collect();
        if missing.is_empty() {
            runnable.push(rule);
        } else {
            tracing::info!(event = "rule_skipped", rule = rule.id(), missing = ?missing);
            outcome.skipped.push(Skipped::new(
                rule.id(),
                format!("no {} artifact supplied", missing.join(" or ")),
            ));
        }
    }

    let results: Vec<(&dyn Rule, Result<Evaluation, RuleError>)> = thread::scope(|scope| {
        let handles: Vec<_> = runnable
            .iter()
            .map(|rule| {
                let rule = *rule;
                (rule, scope.spawn(move || rule.check(model, options)))
            })
            .collect();
        handles
            .into_iter()
            .map(|(rule, handle)| {
                let result = handle
                    .join()
                    .unwrap_or_else(|payload| Err(RuleError::Panicked(panic_message(&*payload))));
                (rule, result)
            })
            .collect()
    });

    for (rule, result) in results {
        match result {
            Ok(evaluation) => {
                tracing::debug!(
                    event = "rule_finished",
                    rule = rule.id(),
                    findings = evaluation.findings.len(),
                    unchecked = evaluation.unchecked.len()
                );
                outcome.findings.extend(evaluation.findings);
                outcome.skipped.extend(evaluation.unchecked);
            }
            Err(err) => {
                tracing::warn!(event = "rule_failed", rule = rule.id(), error = %err);
                outcome.findings.push(Finding::internal(
                    rule.id(),
                    format!("rule {} ({}) failed: {err}", rule.id(), rule.name()),
                ));
            }
        }
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
