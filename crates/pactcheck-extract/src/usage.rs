//! Usage scan over frontend sources.
//!
//! Component files mix markup with code, so the file is never parsed as a
//! whole. Call heads (`fetch(`, `axios.get(`, `api.post(`) and endpoint
//! table references are located by pattern, and only the argument list of
//! each call is lexed. Comments come from a line-resilient lexer pass, so
//! comment markers inside strings are not mistaken for comments.

use std::ops::Range;
use std::sync::LazyLock;

use pactcheck_core::{CallSite, CallTarget, Extraction, HttpMethod, PathTemplate, Segment};
use regex::Regex;

use crate::ExtractOptions;
use crate::lexer::{
    Entry, TemplatePart, Token, TokenKind, call_arguments, comment_spans, object_entries,
};
use crate::source::SourceText;

const RAW_LIMIT: usize = 120;

pub fn extract_usage(source: &SourceText, options: &ExtractOptions, extraction: &mut Extraction) {
    let text = source.text.as_str();
    let comments = comment_spans(text, source.index());
    let mut found: Vec<(usize, CallSite)> = Vec::new();
    let mut consumed: Vec<Range<usize>> = Vec::new();

    let Some(head) = CALL_HEAD.as_ref() else {
        return;
    };
    for caps in head.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let start = whole.start();
        if in_comment(start, &comments) || is_definition(text, start) {
            continue;
        }
        let method = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|verb| verb.as_str().to_ascii_uppercase());
        let open = whole.end() - 1;
        let location = source.location(start);

        let Some((tokens, close)) = call_arguments(&source.text, open, source.index()) else {
            extraction.warn_with(
                location,
                "could not read call arguments",
                &line_snippet(text, start),
            );
            continue;
        };
        consumed.push(start..close);
        let raw = collapse(&text[start..close]);
        let args = split_args(&tokens);
        let Some(first) = args.first() else {
            continue;
        };

        let method = match method.as_deref() {
            Some("REQUEST") => HttpMethod::Any,
            Some(verb) => HttpMethod::parse(verb).unwrap_or(HttpMethod::Any),
            None => fetch_method(&tokens, args.get(1)),
        };

        let target = match call_target(&tokens[first.clone()], options) {
            Target::Call(target) => target,
            Target::Ignored => continue,
            Target::Unreadable => {
                extraction.warn_with(
                    location,
                    "call path is not a literal or an endpoint table reference; not checked",
                    &raw,
                );
                continue;
            }
        };
        found.push((
            start,
            CallSite {
                method,
                target,
                raw,
                location,
            },
        ));
    }

    if let Some(member) = member_pattern(&options.endpoint_table) {
        for caps in member.captures_iter(text) {
            let (Some(whole), Some(resource), Some(name)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let start = whole.start();
            if in_comment(start, &comments)
                || consumed.iter().any(|span| span.contains(&start))
            {
                continue;
            }
            found.push((
                start,
                CallSite {
                    method: HttpMethod::Any,
                    target: CallTarget::Member {
                        resource: resource.as_str().to_string(),
                        name: name.as_str().to_string(),
                    },
                    raw: collapse(whole.as_str()),
                    location: source.location(start),
                },
            ));
        }
    }

    found.sort_by_key(|(start, _)| *start);
    extraction
        .call_sites
        .extend(found.into_iter().map(|(_, site)| site));
}

static CALL_HEAD: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"\b(fetch|axios\s*\.\s*(get|post|put|patch|delete|request)|(?:api|apiClient|client|http)\s*\.\s*(get|post|put|patch|delete|request))\s*(?:<[^()]*?>)?\s*\(",
    )
    .ok()
});

static ORIGIN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://[^/]*").ok());

static UUID: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").ok()
});

/// Built per scan; the table name comes from the options.
fn member_pattern(table: &str) -> Option<Regex> {
    Regex::new(&format!(
        r"\b{}\s*\.\s*([A-Za-z_$][\w$]*)\s*\.\s*([A-Za-z_$][\w$]*)",
        regex::escape(table)
    ))
    .ok()
}

fn line_prefix(text: &str, offset: usize) -> &str {
    let line_start = text[..offset].rfind('\n').map_or(0, |idx| idx + 1);
    &text[line_start..offset]
}

fn in_comment(offset: usize, comments: &[Range<usize>]) -> bool {
    comments.iter().any(|comment| comment.contains(&offset))
}

/// `function fetch(` or a `fetch(...) {` method definition.
fn is_definition(text: &str, offset: usize) -> bool {
    let prefix = line_prefix(text, offset).trim_end();
    prefix.ends_with("function") || prefix.ends_with("async")
}

fn line_snippet(text: &str, offset: usize) -> String {
    let end = text[offset..].find('\n').map_or(text.len(), |idx| offset + idx);
    collapse(&text[offset..end])
}

fn collapse(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > RAW_LIMIT {
        let mut short: String = collapsed.chars().take(RAW_LIMIT).collect();
        short.push_str("...");
        short
    } else {
        collapsed
    }
}

fn split_args(tokens: &[Token]) -> Vec<Range<usize>> {
    crate::lexer::split_commas(tokens, 0..tokens.len())
}

/// Method of a `fetch` call: `GET` without options, the literal `method`
/// option when present, unknown otherwise.
fn fetch_method(tokens: &[Token], options: Option<&Range<usize>>) -> HttpMethod {
    let Some(options) = options else {
        return HttpMethod::Get;
    };
    let Some((entries, _)) = object_entries(tokens, options.start) else {
        return HttpMethod::Any;
    };
    for entry in entries {
        let Entry::Property(property) = entry else {
            continue;
        };
        if property.key != "method" {
            continue;
        }
        return match &tokens[property.value] {
            [token] => token
                .string()
                .and_then(HttpMethod::parse)
                .unwrap_or(HttpMethod::Any),
            _ => HttpMethod::Any,
        };
    }
    HttpMethod::Get
}

enum Target {
    Call(CallTarget),
    /// A literal path outside the API prefix.
    Ignored,
    Unreadable,
}

fn call_target(arg: &[Token], options: &ExtractOptions) -> Target {
    if let Some((resource, name)) = member_ref(arg, &options.endpoint_table) {
        return Target::Call(CallTarget::Member { resource, name });
    }
    let [token] = arg else {
        return Target::Unreadable;
    };
    let (base, rendered) = match &token.kind {
        TokenKind::Str(value) => (None, strip_query(value).to_string()),
        TokenKind::Template(parts) => render_template(parts),
        _ => return Target::Unreadable,
    };

    let path = match base {
        Some(_) => rendered,
        None => strip_origin(&rendered),
    };
    let path = concretize(PathTemplate::parse(&path));
    if base.is_none() && !path.starts_with(&PathTemplate::parse(&options.api_prefix)) {
        return Target::Ignored;
    }
    Target::Call(CallTarget::Path { base, path })
}

/// `ENDPOINTS.CV.LIST` or `ENDPOINTS.CV.GET(id)`.
fn member_ref(arg: &[Token], table: &str) -> Option<(String, String)> {
    match arg {
        [root, dot1, resource, dot2, name, rest @ ..]
            if root.is_ident(table) && dot1.is_punct('.') && dot2.is_punct('.') =>
        {
            let called = rest.is_empty()
                || (rest.first().is_some_and(|t| t.is_punct('('))
                    && rest.last().is_some_and(|t| t.is_punct(')')));
            if !called {
                return None;
            }
            Some((resource.ident()?.to_string(), name.ident()?.to_string()))
        }
        _ => None,
    }
}

/// Leading `${CONST}` becomes the base; the query string is dropped.
fn render_template(parts: &[TemplatePart]) -> (Option<String>, String) {
    let mut base = None;
    let mut rendered = String::new();
    for (idx, part) in parts.iter().enumerate() {
        match part {
            TemplatePart::Expr(expr) if idx == 0 && is_reference(expr) => {
                base = Some(expr.trim().to_string())
            }
            TemplatePart::Expr(expr) => rendered.push_str(&format!("${{{}}}", expr.trim())),
            TemplatePart::Text(text) => {
                let kept = strip_query(text);
                rendered.push_str(kept);
                if kept.len() < text.len() {
                    break;
                }
            }
        }
    }
    (base, rendered)
}

fn is_reference(expr: &str) -> bool {
    let expr = expr.trim();
    !expr.is_empty()
        && expr
            .split('.')
            .all(|part| {
                let mut chars = part.chars();
                chars
                    .next()
                    .is_some_and(|ch| ch.is_alphabetic() || ch == '_' || ch == '$')
                    && chars.all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '$')
            })
}

fn strip_query(text: &str) -> &str {
    match text.find(['?', '#']) {
        Some(idx) => &text[..idx],
        None => text,
    }
}

fn strip_origin(path: &str) -> String {
    match ORIGIN.as_ref() {
        Some(origin) => origin.replace(path, "").into_owned(),
        None => path.to_string(),
    }
}

/// Concrete ids in a literal path behave like parameters.
fn concretize(path: PathTemplate) -> PathTemplate {
    let segments = path
        .segments
        .into_iter()
        .map(|segment| match segment {
            Segment::Literal(value)
                if UUID.as_ref().is_some_and(|uuid| uuid.is_match(&value)) || value.chars().all(|ch| ch.is_ascii_digit()) =>
            {
                Segment::Param(value)
            }
            other => other,
        })
        .collect();
    PathTemplate { segments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactcheck_core::ArtifactKind;

    const COMPONENT: &str = r#"
import { ENDPOINTS, API_BASE } from '@/contracts/endpoints';

export async function loadCvs(page: number) {
  const res = await fetch(`${API_BASE}/cv?page=${page}`);
  return api.post<CV>('/api/v1/cv/upload', body);
}

export function Remove({ id }: Props) {
  // fetch('/api/v1/legacy')
  const onClick = () => fetch(`/api/v1/cv/${id}`, { method: 'DELETE' });
  const url = ENDPOINTS.CV.GET(id);
  axios.get(ENDPOINTS.CV.LIST);
  fetch('https://cdn.example.com/assets/logo.png');
  fetch('/api/v1/cv/3f2b8c1e-1111-2222-3333-444455556666/analyze', { method: 'POST' });
  return <button onClick={onClick}>Delete {id}</button>;
}
"#;

    fn scan(text: &str) -> Extraction {
        let source = SourceText::new("web/src/cv.tsx", text);
        let mut extraction = Extraction::new(ArtifactKind::Usage, "web/src/cv.tsx");
        extract_usage(&source, &ExtractOptions::default(), &mut extraction);
        extraction
    }

    fn path(site: &CallSite) -> (Option<String>, String) {
        match &site.target {
            CallTarget::Path { base, path } => (base.clone(), path.to_string()),
            CallTarget::Member { resource, name } => (None, format!("{resource}.{name}")),
        }
    }

    #[test]
    fn finds_literal_calls_and_table_references() {
        let extraction = scan(COMPONENT);
        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
        let sites: Vec<_> = extraction
            .call_sites
            .iter()
            .map(|site| (site.method, path(site)))
            .collect();
        assert_eq!(
            sites,
            vec![
                (HttpMethod::Get, (Some("API_BASE".to_string()), "/cv".to_string())),
                (HttpMethod::Post, (None, "/api/v1/cv/upload".to_string())),
                (HttpMethod::Delete, (None, "/api/v1/cv/{id}".to_string())),
                (HttpMethod::Any, (None, "CV.GET".to_string())),
                (HttpMethod::Get, (None, "CV.LIST".to_string())),
                (
                    HttpMethod::Post,
                    (
                        None,
                        "/api/v1/cv/{3f2b8c1e-1111-2222-3333-444455556666}/analyze".to_string()
                    )
                ),
            ]
        );
    }

    #[test]
    fn call_sites_point_at_the_call_head() {
        let extraction = scan(COMPONENT);
        let first = &extraction.call_sites[0];
        assert_eq!((first.location.line, first.location.column), (5, 21));
        assert!(first.raw.starts_with("fetch(`${API_BASE}/cv"));
    }

    #[test]
    fn dynamic_paths_are_reported_as_unchecked() {
        let extraction = scan("const load = (url: string) => fetch(url);\n");
        assert!(extraction.call_sites.is_empty());
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].message.contains("not checked"));
    }

    #[test]
    fn comment_markers_inside_strings_do_not_hide_calls() {
        let extraction = scan(
            "await fetch('/api/v1/a', { headers: { Accept: '*/*' } });\n\
             await fetch('/api/v1/b');\n\
             const pattern = 'src/*.ts';\n\
             const note = 'a //b'; await fetch('/api/v1/c');\n\
             /** docs */\n\
             // fetch('/api/v1/commented')\n",
        );
        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
        let paths: Vec<_> = extraction.call_sites.iter().map(|site| path(site).1).collect();
        assert_eq!(paths, vec!["/api/v1/a", "/api/v1/b", "/api/v1/c"]);
    }

    #[test]
    fn calls_after_markup_prose_are_still_found() {
        let extraction = scan(
            "return <p>Don't reload // yet</p>;\n\
             /* fetch('/api/v1/old') */\n\
             fetch('/api/v1/cv');\n",
        );
        let paths: Vec<_> = extraction.call_sites.iter().map(|site| path(site).1).collect();
        assert_eq!(paths, vec!["/api/v1/cv"]);
    }

    #[test]
    fn non_literal_fetch_method_matches_any_verb() {
        let extraction = scan("fetch('/api/v1/cv', { method: verb });\nfetch('/api/v1/cv', init);\n");
        let methods: Vec<_> = extraction.call_sites.iter().map(|site| site.method).collect();
        assert_eq!(methods, vec![HttpMethod::Any, HttpMethod::Any]);
    }
}
