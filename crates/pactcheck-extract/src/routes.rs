//! Backend route scan.
//!
//! Only direct registrations on a router or app object are read:
//! `router.get('/path', ..)`, `app.post('/path', ..)` and the like. The path
//! must be a string literal or a template without interpolations; anything
//! else is reported and left unchecked. Routers mounted under a prefix keep
//! their relative paths.

use std::sync::LazyLock;

use pactcheck_core::{Extraction, HttpMethod, PathTemplate, Route};
use regex::Regex;

use crate::lexer::{TemplatePart, TokenKind, call_arguments, comment_spans, split_commas};
use crate::source::SourceText;

static REGISTRATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(?:router|app|[A-Za-z_$][\w$]*Router)\s*\.\s*(get|post|put|patch|delete|all)\s*\(")
        .ok()
});

pub fn extract_routes(source: &SourceText, extraction: &mut Extraction) {
    let Some(registration) = REGISTRATION.as_ref() else {
        return;
    };
    let text = source.text.as_str();
    let comments = comment_spans(text, source.index());

    for caps in registration.captures_iter(text) {
        let (Some(whole), Some(verb)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let start = whole.start();
        if comments.iter().any(|comment| comment.contains(&start)) {
            continue;
        }
        let location = source.location(start);
        let Some((tokens, _)) = call_arguments(text, whole.end() - 1, source.index()) else {
            extraction.warn(location, "could not read route arguments");
            continue;
        };
        let args = split_commas(&tokens, 0..tokens.len());
        let first = args.first().map(|range| &tokens[range.clone()]);
        let raw_path = match first {
            Some([token]) => match &token.kind {
                TokenKind::Str(value) => Some(value.clone()),
                TokenKind::Template(parts) => literal_template(parts),
                _ => None,
            },
            _ => None,
        };
        let Some(raw_path) = raw_path else {
            extraction.warn_with(
                location,
                "route path is not a literal; not checked",
                &text[start..whole.end()],
            );
            continue;
        };
        // `app.get('env')` reads a setting.
        if !raw_path.starts_with('/') {
            continue;
        }

        let method = match verb.as_str() {
            "all" => HttpMethod::Any,
            verb => HttpMethod::parse(verb).unwrap_or(HttpMethod::Any),
        };
        extraction.routes.push(Route {
            method,
            path: PathTemplate::parse(&raw_path),
            raw_path,
            location,
        });
    }
}

fn literal_template(parts: &[TemplatePart]) -> Option<String> {
    parts
        .iter()
        .map(|part| match part {
            TemplatePart::Text(text) => Some(text.as_str()),
            TemplatePart::Expr(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactcheck_core::ArtifactKind;

    fn scan(text: &str) -> Extraction {
        let source = SourceText::new("apps/server/src/routes/cv.ts", text);
        let mut extraction = Extraction::new(ArtifactKind::Routes, "apps/server/src/routes/cv.ts");
        extract_routes(&source, &mut extraction);
        extraction
    }

    #[test]
    fn reads_literal_registrations() {
        let extraction = scan(
            r#"
import { Router } from 'express';

export const cvRouter = Router();
// router.get('/api/v1/legacy', legacy);
router.get('/api/v1/cv', requireAuth, listCvs);
router.post(`/api/v1/cv/upload`, upload.single('file'), uploadCv);
cvRouter.delete('/api/v1/cv/:id', removeCv);
app.all('/api/v1/health', health);
app.set('trust proxy', 1);
const env = app.get('env');
"#,
        );
        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
        let routes: Vec<(HttpMethod, String)> = extraction
            .routes
            .iter()
            .map(|route| (route.method, route.path.to_string()))
            .collect();
        assert_eq!(
            routes,
            vec![
                (HttpMethod::Get, "/api/v1/cv".to_string()),
                (HttpMethod::Post, "/api/v1/cv/upload".to_string()),
                (HttpMethod::Delete, "/api/v1/cv/{id}".to_string()),
                (HttpMethod::Any, "/api/v1/health".to_string()),
            ]
        );
        assert_eq!(extraction.routes[0].location.line, 6);
        assert_eq!(extraction.routes[2].raw_path, "/api/v1/cv/:id");
    }

    #[test]
    fn computed_paths_are_reported() {
        let extraction = scan("router.get(`${BASE}/cv`, list);\nrouter.put(paths.cv, update);\n");
        assert!(extraction.routes.is_empty());
        assert_eq!(extraction.warnings.len(), 2);
        assert!(extraction.warnings[0].message.contains("not a literal"));
        assert_eq!(extraction.warnings[1].location.line, 2);
    }
}
