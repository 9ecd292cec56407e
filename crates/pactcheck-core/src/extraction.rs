use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::location::{ArtifactKind, Location};
use crate::model::{
    CallSite, DeclaredBound, Endpoint, ErrorCode, Route, Table, TableAmendment, TypeDef,
    ValidationRule,
};

/// Closed set of entities an artifact can contribute to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Entity {
    Table(Table),
    TypeDef(TypeDef),
    Endpoint(Endpoint),
    Validation(ValidationRule),
    ErrorCode(ErrorCode),
}

impl Entity {
    /// Name used for duplicate detection within one artifact kind.
    pub fn name(&self) -> String {
        match self {
            Entity::Table(table) => table.name.clone(),
            Entity::TypeDef(def) => def.name.clone(),
            Entity::Endpoint(endpoint) => endpoint.key(),
            Entity::Validation(rule) => rule.target.to_string(),
            Entity::ErrorCode(code) => code.code.clone(),
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Entity::Table(table) => &table.location,
            Entity::TypeDef(def) => &def.location,
            Entity::Endpoint(endpoint) => &endpoint.location,
            Entity::Validation(rule) => &rule.location,
            Entity::ErrorCode(code) => &code.location,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Entity::Table(_) => "table",
            Entity::TypeDef(_) => "type",
            Entity::Endpoint(_) => "endpoint",
            Entity::Validation(_) => "validation rule",
            Entity::ErrorCode(_) => "error code",
        }
    }
}

/// A construct that could not be extracted. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub artifact: ArtifactKind,
    pub location: Location,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl ParseWarning {
    pub fn new(artifact: ArtifactKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            artifact,
            location,
            message: message.into(),
            snippet: None,
        }
    }

    pub fn with_snippet(mut self, snippet: impl AsRef<str>) -> Self {
        let snippet = snippet.as_ref().trim();
        if !snippet.is_empty() {
            let mut short: String = snippet.chars().take(80).collect();
            if snippet.chars().count() > 80 {
                short.push_str("...");
            }
            self.snippet = Some(short.replace('\n', " "));
        }
        self
    }
}

/// Everything one extractor produced for one artifact file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub artifact: ArtifactKind,
    pub file: String,
    pub entities: Vec<Entity>,
    pub bounds: Vec<DeclaredBound>,
    pub call_sites: Vec<CallSite>,
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Row-security changes and policies for tables this file does not create.
    #[serde(default)]
    pub amendments: Vec<TableAmendment>,
    /// Top-level string constants usable as path prefixes (`API_BASE`).
    pub constants: BTreeMap<String, String>,
    pub warnings: Vec<ParseWarning>,
}

impl Extraction {
    pub fn new(artifact: ArtifactKind, file: impl Into<String>) -> Self {
        Self {
            artifact,
            file: file.into(),
            entities: Vec::new(),
            bounds: Vec::new(),
            call_sites: Vec::new(),
            routes: Vec::new(),
            amendments: Vec::new(),
            constants: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, location: Location, message: impl Into<String>) {
        self.warnings
            .push(ParseWarning::new(self.artifact, location, message));
    }

    pub fn warn_with(&mut self, location: Location, message: impl Into<String>, snippet: &str) {
        self.warnings
            .push(ParseWarning::new(self.artifact, location, message).with_snippet(snippet));
    }
}
