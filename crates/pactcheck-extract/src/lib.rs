//! Per-artifact extractors.
//!
//! Every extractor is total: it never fails, and anything it cannot read
//! becomes a `ParseWarning` on the returned `Extraction` while the rest of
//! the file is still processed.

mod endpoints;
mod lexer;
mod literals;
mod routes;
mod script;
mod source;
mod sql;
mod taxonomy;
mod typedefs;
mod usage;
mod validation;

use pactcheck_core::{ArtifactKind, Extraction};
use serde::{Deserialize, Serialize};

pub use source::SourceText;

/// Knobs shared by the extractors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Literal call paths outside this prefix are not API calls.
    pub api_prefix: String,
    /// Name of the route table constant.
    pub endpoint_table: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            endpoint_table: "ENDPOINTS".to_string(),
        }
    }
}

/// Extract everything `kind` contributes from one file.
pub fn extract(kind: ArtifactKind, source: &SourceText, options: &ExtractOptions) -> Extraction {
    let extraction = match kind {
        ArtifactKind::Schema => sql::extract_schema(source),
        ArtifactKind::Usage => {
            let mut extraction = Extraction::new(kind, source.path.clone());
            usage::extract_usage(source, options, &mut extraction);
            extraction
        }
        ArtifactKind::Routes => {
            let mut extraction = Extraction::new(kind, source.path.clone());
            routes::extract_routes(source, &mut extraction);
            extraction
        }
        ArtifactKind::Types
        | ArtifactKind::Endpoints
        | ArtifactKind::Validation
        | ArtifactKind::Errors => extract_script(kind, source, options),
    };
    tracing::debug!(
        event = "artifact_extracted",
        artifact = %kind,
        file = %source.path,
        entities = extraction.entities.len(),
        bounds = extraction.bounds.len(),
        call_sites = extraction.call_sites.len(),
        routes = extraction.routes.len(),
        warnings = extraction.warnings.len(),
    );
    extraction
}

fn extract_script(kind: ArtifactKind, source: &SourceText, options: &ExtractOptions) -> Extraction {
    let mut extraction = Extraction::new(kind, source.path.clone());
    let script = script::Script::parse(source);
    if let Some(error) = &script.lexed.error {
        extraction.warn(
            source.location(error.offset),
            format!("{}; the rest of the file is skipped", error.message),
        );
    }
    literals::collect_bound_constants(
        source,
        &script.lexed,
        &script.consts,
        &script.numbers,
        &mut extraction,
    );
    match kind {
        ArtifactKind::Types => typedefs::extract_types(&script, &mut extraction),
        ArtifactKind::Endpoints => endpoints::extract_endpoints(&script, options, &mut extraction),
        ArtifactKind::Validation => validation::extract_validation(&script, &mut extraction),
        ArtifactKind::Errors => taxonomy::extract_taxonomy(&script, &mut extraction),
        ArtifactKind::Schema | ArtifactKind::Routes | ArtifactKind::Usage => {}
    }
    extraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_errors_keep_earlier_declarations() {
        let source = SourceText::new(
            "contracts/types.ts",
            "export interface CV { id: string }\nconst broken = 'unterminated\n",
        );
        let extraction = extract(ArtifactKind::Types, &source, &ExtractOptions::default());
        assert_eq!(extraction.entities.len(), 1);
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].message.contains("the rest of the file is skipped"));
        assert_eq!(extraction.warnings[0].location.line, 2);
    }

    #[test]
    fn bound_constants_are_read_from_any_script_artifact() {
        let source = SourceText::new(
            "contracts/validation.ts",
            "/** @bound CreateCVRequest.file_size max */\nexport const MAX_FILE_SIZE = 10 * 1024 * 1024;\n",
        );
        let extraction = extract(ArtifactKind::Validation, &source, &ExtractOptions::default());
        assert_eq!(extraction.bounds.len(), 1);
        assert_eq!(extraction.bounds[0].value, 10485760.0);
        assert_eq!(extraction.bounds[0].literal, "10 * 1024 * 1024");
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ExtractOptions = serde_json::from_str(r#"{"api_prefix": "/v2"}"#).unwrap();
        assert_eq!(options.api_prefix, "/v2");
        assert_eq!(options.endpoint_table, "ENDPOINTS");
    }
}
