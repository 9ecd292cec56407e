use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pactcheck_core::{ArtifactKind, BuildOptions};
use pactcheck_extract::ExtractOptions;
use pactcheck_rules::{PolicyGranularity, RuleOptions};
use serde::Deserialize;

use crate::errors::{CliError, CliResult};

/// Config file looked up in the project root when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "pactcheck.toml";

/// Contents of `pactcheck.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub artifacts: ArtifactPatterns,
    pub rules: RulesConfig,
    /// Explicit table -> type pairing.
    pub pairs: BTreeMap<String, String>,
}

/// Paths or globs per artifact kind, relative to the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactPatterns {
    pub schema: Vec<String>,
    pub types: Vec<String>,
    pub endpoints: Vec<String>,
    pub validation: Vec<String>,
    pub errors: Vec<String>,
    pub routes: Vec<String>,
    pub usage: Vec<String>,
}

impl ArtifactPatterns {
    pub fn get(&self, kind: ArtifactKind) -> &[String] {
        match kind {
            ArtifactKind::Schema => &self.schema,
            ArtifactKind::Types => &self.types,
            ArtifactKind::Endpoints => &self.endpoints,
            ArtifactKind::Validation => &self.validation,
            ArtifactKind::Errors => &self.errors,
            ArtifactKind::Routes => &self.routes,
            ArtifactKind::Usage => &self.usage,
        }
    }

    fn slot(&mut self, kind: ArtifactKind) -> &mut Vec<String> {
        match kind {
            ArtifactKind::Schema => &mut self.schema,
            ArtifactKind::Types => &mut self.types,
            ArtifactKind::Endpoints => &mut self.endpoints,
            ArtifactKind::Validation => &mut self.validation,
            ArtifactKind::Errors => &mut self.errors,
            ArtifactKind::Routes => &mut self.routes,
            ArtifactKind::Usage => &mut self.usage,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    pub policy_granularity: Option<PolicyGranularity>,
    pub identity_tables: Option<Vec<String>>,
    pub api_prefix: Option<String>,
    pub endpoint_table: Option<String>,
}

/// Values given on the command line; each one overrides the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub artifacts: Vec<(ArtifactKind, Vec<String>)>,
    pub policy_granularity: Option<PolicyGranularity>,
    pub identity_tables: Vec<String>,
    pub api_prefix: Option<String>,
    pub endpoint_table: Option<String>,
    pub pairs: Vec<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub config_file: Option<PathBuf>,
    pub artifacts: ArtifactPatterns,
    pub rules: RuleOptions,
    pub extract: ExtractOptions,
    pub build: BuildOptions,
}

/// Read the config file: `explicit` must exist, the default one may not.
pub fn load_file(root: &Path, explicit: Option<&Path>) -> CliResult<(FileConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) if !path.is_file() => return Err(CliError::MissingConfig(path.to_path_buf())),
        Some(path) => path.to_path_buf(),
        None => {
            let path = root.join(DEFAULT_CONFIG_FILE);
            if !path.is_file() {
                return Ok((FileConfig::default(), None));
            }
            path
        }
    };
    let content = std::fs::read_to_string(&path)?;
    let config = parse(&content).map_err(|source| CliError::Config {
        path: path.clone(),
        source,
    })?;
    tracing::info!(event = "config_loaded", path = %path.display());
    Ok((config, Some(path)))
}

pub fn parse(content: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Layer `overrides` over `file` and fill in defaults.
pub fn resolve(
    root: PathBuf,
    config_file: Option<PathBuf>,
    file: FileConfig,
    overrides: Overrides,
) -> CliResult<Settings> {
    let FileConfig {
        mut artifacts,
        rules: file_rules,
        mut pairs,
    } = file;

    for (kind, patterns) in overrides.artifacts {
        if !patterns.is_empty() {
            *artifacts.slot(kind) = patterns;
        }
    }

    for pair in &overrides.pairs {
        let (table, type_name) = pair
            .split_once('=')
            .map(|(table, type_name)| (table.trim(), type_name.trim()))
            .filter(|(table, type_name)| !table.is_empty() && !type_name.is_empty())
            .ok_or_else(|| CliError::InvalidPair(pair.clone()))?;
        pairs.insert(table.to_string(), type_name.to_string());
    }

    let mut rules = RuleOptions::default();
    let mut extract = ExtractOptions::default();

    if let Some(granularity) = overrides.policy_granularity.or(file_rules.policy_granularity) {
        rules.policy_granularity = granularity;
    }
    if !overrides.identity_tables.is_empty() {
        rules.identity_tables = overrides.identity_tables;
    } else if let Some(tables) = file_rules.identity_tables {
        rules.identity_tables = tables;
    }
    if let Some(prefix) = overrides.api_prefix.or(file_rules.api_prefix) {
        rules.api_prefix = prefix.clone();
        extract.api_prefix = prefix;
    }
    if let Some(table) = overrides.endpoint_table.or(file_rules.endpoint_table) {
        extract.endpoint_table = table;
    }

    Ok(Settings {
        root,
        config_file,
        artifacts,
        rules,
        extract,
        build: BuildOptions { table_types: pairs },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[artifacts]
schema = ["db/schema.sql"]
routes = ["server/src/routes/*.ts"]
usage = ["web/src/**/*.ts"]

[rules]
policy_granularity = "per_verb"
identity_tables = ["auth.users"]
api_prefix = "/v1"

[pairs]
cvs = "CV"
"#;

    #[test]
    fn parses_every_section() {
        let config = parse(SAMPLE).expect("valid config");
        assert_eq!(config.artifacts.schema, vec!["db/schema.sql"]);
        assert!(config.artifacts.types.is_empty());
        assert_eq!(config.artifacts.get(ArtifactKind::Routes), ["server/src/routes/*.ts"]);
        assert_eq!(config.rules.policy_granularity, Some(PolicyGranularity::PerVerb));
        assert_eq!(config.pairs.get("cvs").map(String::as_str), Some("CV"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(parse("[rules]\nstrict = true\n").is_err());
        assert!(parse("[artefacts]\nschema = []\n").is_err());
    }

    #[test]
    fn flags_override_the_file() {
        let overrides = Overrides {
            artifacts: vec![
                (ArtifactKind::Schema, vec!["schema.sql".to_string()]),
                (ArtifactKind::Types, Vec::new()),
            ],
            api_prefix: Some("/api/v2".to_string()),
            pairs: vec!["interview_sessions = Session".to_string()],
            ..Overrides::default()
        };
        let settings = resolve(
            PathBuf::from("."),
            None,
            parse(SAMPLE).expect("valid config"),
            overrides,
        )
        .expect("resolves");

        assert_eq!(settings.artifacts.schema, vec!["schema.sql"]);
        assert_eq!(settings.artifacts.usage, vec!["web/src/**/*.ts"]);
        assert_eq!(settings.rules.api_prefix, "/api/v2");
        assert_eq!(settings.extract.api_prefix, "/api/v2");
        assert_eq!(settings.extract.endpoint_table, "ENDPOINTS");
        assert_eq!(settings.rules.policy_granularity, PolicyGranularity::PerVerb);
        assert_eq!(settings.rules.identity_tables, vec!["auth.users"]);
        assert_eq!(settings.build.table_types.len(), 2);
        assert_eq!(
            settings.build.table_types.get("interview_sessions").map(String::as_str),
            Some("Session")
        );
    }

    #[test]
    fn malformed_pair_is_rejected() {
        let overrides = Overrides {
            pairs: vec!["cvs".to_string()],
            ..Overrides::default()
        };
        let result = resolve(PathBuf::from("."), None, FileConfig::default(), overrides);
        assert!(matches!(result, Err(CliError::InvalidPair(pair)) if pair == "cvs"));
    }
}
