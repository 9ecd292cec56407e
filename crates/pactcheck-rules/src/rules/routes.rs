use pactcheck_core::{ArtifactKind, CanonicalModel, Endpoint, PathTemplate, Route, Segment};

use crate::engine::{Evaluation, Rule};
use crate::errors::RuleError;
use crate::finding::Finding;
use crate::options::RuleOptions;
use crate::rules::coverage::declared_path;

const ARTIFACTS: [ArtifactKind; 2] = [ArtifactKind::Endpoints, ArtifactKind::Routes];

/// R10: declared endpoints are served by a backend route, and backend routes
/// under the API prefix are declared.
pub struct RouteParity;

impl Rule for RouteParity {
    fn id(&self) -> &'static str {
        "R10"
    }

    fn name(&self) -> &'static str {
        "backend-route-parity"
    }

    fn description(&self) -> &'static str {
        "every declared endpoint has a backend route with the same method and path, and every backend route is declared"
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &ARTIFACTS
    }

    fn check(&self, model: &CanonicalModel, options: &RuleOptions) -> Result<Evaluation, RuleError> {
        let mut evaluation = Evaluation::default();
        if model.routes().is_empty() {
            evaluation.skip(
                self.id(),
                "the routes artifact registers no literal routes; endpoints not checked against the backend",
            );
            return Ok(evaluation);
        }

        let prefix = PathTemplate::parse(&options.api_prefix);
        let declared: Vec<(&Endpoint, PathTemplate)> = model
            .endpoints()
            .values()
            .map(|endpoint| (endpoint, declared_path(endpoint)))
            .collect();

        for route in model.routes() {
            if declared
                .iter()
                .any(|(endpoint, path)| serves(route, endpoint, path, &prefix))
            {
                continue;
            }
            let mounted = if route.path.starts_with(&prefix) {
                ""
            } else {
                " (relative to its mount point)"
            };
            evaluation.push(
                Finding::warning(
                    self.id(),
                    format!(
                        "backend route `{} {}`{mounted} has no declared endpoint",
                        route.method, route.path
                    ),
                )
                .with_hint("declare it in the endpoint table or remove the route")
                .with_artifacts(ARTIFACTS)
                .at(&route.location),
            );
        }

        for (endpoint, path) in &declared {
            if model
                .routes()
                .iter()
                .any(|route| serves(route, endpoint, path, &prefix))
            {
                continue;
            }
            evaluation.push(
                Finding::warning(
                    self.id(),
                    format!(
                        "endpoint `{}` ({} {path}) has no backend route",
                        endpoint.key(),
                        endpoint.method
                    ),
                )
                .with_hint(format!(
                    "register `{}` on the server or remove the endpoint",
                    express_route(endpoint, path)
                ))
                .with_artifacts(ARTIFACTS)
                .at(&endpoint.location),
            );
        }
        Ok(evaluation)
    }
}

/// Routes under the prefix must match the declared shape exactly. Any other
/// route belongs to a router mounted elsewhere and only has to match the tail
/// of the declared path; its root matches collection paths.
fn serves(route: &Route, endpoint: &Endpoint, path: &PathTemplate, prefix: &PathTemplate) -> bool {
    if !route.method.matches(endpoint.method) {
        return false;
    }
    if route.path.starts_with(prefix) {
        return route.path.shape() == path.shape();
    }
    if route.path.segments.is_empty() {
        return matches!(path.segments.last(), Some(Segment::Literal(_)));
    }
    path.shape().ends_with(&route.path.shape())
}

/// `router.post('/api/v1/cv/:id/share', ..)`.
fn express_route(endpoint: &Endpoint, path: &PathTemplate) -> String {
    let verb = match endpoint.method.as_str() {
        "ANY" => "all".to_string(),
        verb => verb.to_ascii_lowercase(),
    };
    let mut rendered = String::new();
    for segment in &path.segments {
        rendered.push('/');
        match segment {
            Segment::Literal(value) => rendered.push_str(value),
            Segment::Param(name) => {
                rendered.push(':');
                rendered.push_str(name);
            }
        }
    }
    if rendered.is_empty() {
        rendered.push('/');
    }
    format!("router.{verb}('{rendered}', ..)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Severity;
    use crate::rules::testing::model;

    const ENDPOINTS: &str = r#"
export const API_BASE = '/api/v1';

export const ENDPOINTS = {
  CV: {
    LIST: `${API_BASE}/cv`,
    GET: (id: string) => `${API_BASE}/cv/${id}`,
    UPLOAD: `${API_BASE}/cv/upload`,
    SHARE: (id: string) => `${API_BASE}/cv/${id}/share`,
  },
};
"#;

    fn run(routes: &str) -> Evaluation {
        let model = model(&[
            (ArtifactKind::Endpoints, "contracts/endpoints.ts", ENDPOINTS),
            (ArtifactKind::Routes, "apps/server/src/routes/cv.ts", routes),
        ]);
        RouteParity
            .check(&model, &RuleOptions::default())
            .expect("rule runs")
    }

    fn messages(evaluation: &Evaluation) -> Vec<&str> {
        evaluation.findings.iter().map(|f| f.message.as_str()).collect()
    }

    #[test]
    fn compares_routes_and_endpoints_both_ways() {
        let evaluation = run(
            "router.get('/api/v1/cv', list);\n\
             router.get('/api/v1/cv/:cvId', get);\n\
             router.post('/api/v1/cv/upload', upload);\n\
             router.delete('/api/v1/cv/:id', remove);\n",
        );
        assert_eq!(
            messages(&evaluation),
            vec![
                "backend route `DELETE /api/v1/cv/{id}` has no declared endpoint",
                "endpoint `CV.SHARE` (ANY /api/v1/cv/{id}/share) has no backend route",
            ]
        );
        assert!(evaluation.findings.iter().all(|f| f.severity == Severity::Warning));
        assert_eq!(
            evaluation.findings[1].hint.as_deref(),
            Some("register `router.all('/api/v1/cv/:id/share', ..)` on the server or remove the endpoint")
        );
    }

    #[test]
    fn mounted_routers_match_the_tail_of_declared_paths() {
        let evaluation = run(
            "router.get('/', list);\n\
             router.get('/:id', get);\n\
             router.post('/upload', upload);\n\
             router.post('/:id/share', share);\n\
             router.post('/:id/archive', archive);\n",
        );
        assert_eq!(
            messages(&evaluation),
            vec!["backend route `POST /{id}/archive` (relative to its mount point) has no declared endpoint"]
        );
    }

    #[test]
    fn files_without_literal_routes_are_not_checked() {
        let evaluation = run("router.get(paths.list, list);\n");
        assert!(evaluation.findings.is_empty());
        assert_eq!(evaluation.unchecked.len(), 1);
    }
}
