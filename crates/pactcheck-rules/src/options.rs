use serde::{Deserialize, Serialize};

/// How R6 reports tables whose policies do not cover every verb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyGranularity {
    /// One error per table with no policy at all.
    #[default]
    Aggregate,
    /// Additionally one warning per missing CRUD verb.
    PerVerb,
}

impl PolicyGranularity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "aggregate" => Some(PolicyGranularity::Aggregate),
            "per_verb" => Some(PolicyGranularity::PerVerb),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyGranularity::Aggregate => "aggregate",
            PolicyGranularity::PerVerb => "per_verb",
        }
    }
}

/// Options shared by every rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOptions {
    pub policy_granularity: PolicyGranularity,
    /// Tables whose referencing tables must declare policies.
    pub identity_tables: Vec<String>,
    /// Prefix that marks a resolved call path as an API call.
    pub api_prefix: String,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            policy_granularity: PolicyGranularity::Aggregate,
            identity_tables: vec!["auth.users".to_string(), "users".to_string()],
            api_prefix: "/api".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_granularity_spellings() {
        assert_eq!(PolicyGranularity::parse("per-verb"), Some(PolicyGranularity::PerVerb));
        assert_eq!(PolicyGranularity::parse("Aggregate"), Some(PolicyGranularity::Aggregate));
        assert_eq!(PolicyGranularity::parse("sometimes"), None);
    }
}
