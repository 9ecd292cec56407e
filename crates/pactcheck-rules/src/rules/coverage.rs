use std::collections::BTreeSet;

use pactcheck_core::{
    ArtifactKind, CallSite, CallTarget, CanonicalModel, Endpoint, HttpMethod, PathTemplate,
    Segment,
};

use crate::engine::{Evaluation, Rule};
use crate::errors::RuleError;
use crate::finding::Finding;
use crate::options::RuleOptions;

const ARTIFACTS: [ArtifactKind; 2] = [ArtifactKind::Endpoints, ArtifactKind::Usage];

/// R2: every frontend call resolves to a declared endpoint, and every
/// declared endpoint is called somewhere.
pub struct EndpointCoverage;

impl Rule for EndpointCoverage {
    fn id(&self) -> &'static str {
        "R2"
    }

    fn name(&self) -> &'static str {
        "endpoint-coverage"
    }

    fn description(&self) -> &'static str {
        "frontend call sites resolve by method and path to declared endpoints; unreferenced endpoints are reported"
    }

    fn requires(&self) -> &'static [ArtifactKind] {
        &ARTIFACTS
    }

    fn check(&self, model: &CanonicalModel, options: &RuleOptions) -> Result<Evaluation, RuleError> {
        let prefix = PathTemplate::parse(&options.api_prefix);
        let mut evaluation = Evaluation::default();
        let mut referenced: BTreeSet<String> = BTreeSet::new();

        for site in model.call_sites() {
            match &site.target {
                CallTarget::Member { resource, name } => {
                    let key = format!("{resource}.{name}");
                    let Some(endpoint) = model.endpoints().get(&key) else {
                        evaluation.push(
                            Finding::error(
                                self.id(),
                                format!("call references undeclared endpoint `{key}`"),
                            )
                            .with_hint(format!(
                                "declare `{name}` under `{resource}` in the endpoint table or fix the reference"
                            ))
                            .with_artifacts(ARTIFACTS)
                            .at(&site.location),
                        );
                        continue;
                    };
                    referenced.insert(key);
                    if !endpoint.method.matches(site.method) {
                        evaluation.push(
                            Finding::error(
                                self.id(),
                                format!(
                                    "call uses {} but endpoint `{}` is declared {}",
                                    site.method,
                                    endpoint.key(),
                                    endpoint.method
                                ),
                            )
                            .with_hint(method_hint(endpoint, site.method))
                            .with_artifacts(ARTIFACTS)
                            .at(&site.location)
                            .at(&endpoint.location),
                        );
                    }
                }
                CallTarget::Path { base, path } => {
                    let Some(path) = resolve(model, base.as_deref(), path, &prefix) else {
                        evaluation.skip(
                            self.id(),
                            format!(
                                "call at {} starts with unknown base `{}`; not checked",
                                site.location,
                                base.as_deref().unwrap_or_default()
                            ),
                        );
                        continue;
                    };
                    self.match_path(model, site, &path, &mut referenced, &mut evaluation);
                }
            }
        }

        for (key, endpoint) in model.endpoints() {
            if referenced.contains(key) {
                continue;
            }
            evaluation.push(
                Finding::warning(
                    self.id(),
                    format!(
                        "endpoint `{key}` ({} {}) is never referenced by the scanned frontend",
                        endpoint.method,
                        declared_path(endpoint)
                    ),
                )
                .with_hint("call it from the frontend or remove it from the endpoint table")
                .with_artifacts(ARTIFACTS)
                .at(&endpoint.location),
            );
        }
        Ok(evaluation)
    }
}

impl EndpointCoverage {
    fn match_path(
        &self,
        model: &CanonicalModel,
        site: &CallSite,
        path: &PathTemplate,
        referenced: &mut BTreeSet<String>,
        evaluation: &mut Evaluation,
    ) {
        let by_path: Vec<&Endpoint> = model
            .endpoints()
            .values()
            .filter(|endpoint| declared_path(endpoint).accepts(path))
            .collect();
        let matched: Vec<&Endpoint> = by_path
            .iter()
            .copied()
            .filter(|endpoint| endpoint.method.matches(site.method))
            .collect();
        if !matched.is_empty() {
            referenced.extend(matched.iter().map(|endpoint| endpoint.key()));
            return;
        }

        let finding = match by_path.first() {
            Some(endpoint) => Finding::error(
                self.id(),
                format!(
                    "`{} {path}` matches the path of `{}` but not its method {}",
                    site.method,
                    endpoint.key(),
                    endpoint.method
                ),
            )
            .with_hint(method_hint(endpoint, site.method))
            .at(&site.location)
            .at(&endpoint.location),
            None => Finding::error(
                self.id(),
                format!("no declared endpoint matches `{} {path}`", site.method),
            )
            .with_hint(format!(
                "declare `{} {path}` in the endpoint table or fix the call path",
                site.method
            ))
            .at(&site.location),
        };
        evaluation.push(finding.with_artifacts(ARTIFACTS));
    }
}

/// A method taken from the endpoint name is a guess; an annotation settles it.
fn method_hint(endpoint: &Endpoint, called: HttpMethod) -> String {
    if endpoint.method_declared {
        format!(
            "call `{}` with {} or change its declared method",
            endpoint.key(),
            endpoint.method
        )
    } else {
        format!(
            "{} was inferred from the name `{}`; annotate the endpoint with `@method {called}` if the call is right",
            endpoint.method, endpoint.name
        )
    }
}

/// Call path with its base expanded. The base is a path constant or an
/// endpoint-table member; `None` when it is neither and the rest of the path
/// is not under the API prefix.
fn resolve(
    model: &CanonicalModel,
    base: Option<&str>,
    path: &PathTemplate,
    prefix: &PathTemplate,
) -> Option<PathTemplate> {
    let Some(base) = base else {
        return Some(path.clone());
    };
    let expanded = match model.constants().get(base) {
        Some(value) => Some(without_origin(PathTemplate::parse(value))),
        None => member_endpoint(model, base).map(declared_path),
    };
    match expanded {
        Some(mut joined) => {
            joined.segments.extend(path.segments.iter().cloned());
            Some(joined)
        }
        None if path.starts_with(prefix) => Some(path.clone()),
        None => None,
    }
}

/// `ENDPOINTS.CV.LIST` used as a template base.
fn member_endpoint<'a>(model: &'a CanonicalModel, base: &str) -> Option<&'a Endpoint> {
    let mut parts = base.split('.');
    let (_, resource, name) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    model.endpoints().get(&format!("{resource}.{name}"))
}

pub(crate) fn declared_path(endpoint: &Endpoint) -> PathTemplate {
    without_origin(endpoint.path.clone())
}

/// `http://host:3000/api` parses as `http:`, `host:3000`, `api`.
fn without_origin(path: PathTemplate) -> PathTemplate {
    let scheme = matches!(
        path.segments.first(),
        Some(Segment::Literal(first)) if first.ends_with(':')
    );
    if scheme {
        PathTemplate {
            segments: path.segments.into_iter().skip(2).collect(),
        }
    } else {
        path
    }
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
    DELETE: (id: string) => `${API_BASE}/cv/${id}`,
    SHARE: (id: string) => `${API_BASE}/cv/${id}/share`,
  },
};
"#;

    const USAGE: &str = r#"
export async function load(id: string, body: FormData) {
  await fetch(`${API_BASE}/cv`);
  await api.post('/api/v1/cv/upload', body);
  await fetch(`/api/v1/cv/${id}`, { method: 'PUT' });
  await axios.get(ENDPOINTS.CV.GET(id));
  await fetch('/api/v1/profile');
  await axios.get(ENDPOINTS.CV.ARCHIVE);
}
"#;

    fn run(usage: &str) -> Evaluation {
        let model = model(&[
            (ArtifactKind::Endpoints, "contracts/endpoints.ts", ENDPOINTS),
            (ArtifactKind::Usage, "web/src/cv.ts", usage),
        ]);
        EndpointCoverage
            .check(&model, &RuleOptions::default())
            .expect("rule runs")
    }

    #[test]
    fn unresolved_calls_are_errors() {
        let evaluation = run(USAGE);
        let errors: Vec<_> = evaluation
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .map(|f| f.message.as_str())
            .collect();
        assert_eq!(
            errors,
            vec![
                "`PUT /api/v1/cv/{id}` matches the path of `CV.DELETE` but not its method DELETE",
                "no declared endpoint matches `GET /api/v1/profile`",
                "call references undeclared endpoint `CV.ARCHIVE`",
            ]
        );
    }

    #[test]
    fn unreferenced_endpoints_are_warnings() {
        let evaluation = run(USAGE);
        let warnings: Vec<_> = evaluation
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .map(|f| f.message.as_str())
            .collect();
        assert_eq!(
            warnings,
            vec![
                "endpoint `CV.DELETE` (DELETE /api/v1/cv/{id}) is never referenced by the scanned frontend",
                "endpoint `CV.SHARE` (ANY /api/v1/cv/{id}/share) is never referenced by the scanned frontend",
            ]
        );
    }

    #[test]
    fn method_hints_distinguish_inferred_methods() {
        let evaluation = run(USAGE);
        let hint = evaluation
            .findings
            .iter()
            .find(|f| f.message.contains("not its method"))
            .and_then(|f| f.hint.as_deref());
        assert_eq!(
            hint,
            Some(
                "DELETE was inferred from the name `DELETE`; annotate the endpoint with `@method PUT` if the call is right"
            )
        );
        assert!(evaluation.findings.iter().all(|f| f.hint.is_some()));
    }

    #[test]
    fn unknown_bases_outside_the_prefix_are_not_checked() {
        let evaluation = run("fetch(`${config.origin}/health`);\n");
        assert_eq!(evaluation.unchecked.len(), 1);
        assert!(evaluation.unchecked[0].reason.contains("`config.origin`"));
    }
}
