//! Endpoint extractor for the route table (`ENDPOINTS = { RESOURCE: { NAME: path } }`).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use pactcheck_core::{Endpoint, Entity, Extraction, HttpMethod, PathTemplate};
use regex::Regex;

use crate::ExtractOptions;
use crate::lexer::{Entry, Property, Token, TokenKind, object_entries, split_commas};
use crate::script::{Script, render_literal};

/// Method, request and response declared next to an endpoint.
#[derive(Debug, Default, Clone, PartialEq)]
struct Annotation {
    method: Option<HttpMethod>,
    request: Option<String>,
    response: Option<String>,
}

impl Annotation {
    fn or(self, other: Annotation) -> Annotation {
        Annotation {
            method: self.method.or(other.method),
            request: self.request.or(other.request),
            response: self.response.or(other.response),
        }
    }
}

pub fn extract_endpoints(script: &Script<'_>, options: &ExtractOptions, extraction: &mut Extraction) {
    let constants = path_constants(script);
    extraction.constants.extend(constants.clone());

    let tokens = script.tokens();
    let Some(table) = script.const_named(&options.endpoint_table) else {
        extraction.warn(
            script.source.location(0),
            format!("no `{}` table found; no endpoints declared", options.endpoint_table),
        );
        return;
    };
    let Some((resources, _)) = object_entries(tokens, table.value.start) else {
        extraction.warn_with(
            script.location(&tokens[table.name_idx]),
            format!("`{}` is not an object literal", options.endpoint_table),
            &script.text(&tokens[table.value.clone()]),
        );
        return;
    };

    let mut count = 0usize;
    for entry in resources {
        let group = match entry {
            Entry::Property(group) => group,
            Entry::Other(range) => {
                extraction.warn_with(
                    script.location(&tokens[range.start]),
                    "unsupported entry in endpoint table",
                    &script.text(&tokens[range]),
                );
                continue;
            }
        };
        let Some((members, _)) = object_entries(tokens, group.value.start) else {
            extraction.warn_with(
                script.location(&tokens[group.key_idx]),
                format!("endpoint group `{}` is not an object literal", group.key),
                &script.text(&tokens[group.value.clone()]),
            );
            continue;
        };
        for member in members {
            match member {
                Entry::Property(property) => {
                    if let Some(endpoint) =
                        endpoint(script, &group.key, &property, &constants, extraction)
                    {
                        extraction.entities.push(Entity::Endpoint(endpoint));
                        count += 1;
                    }
                }
                Entry::Other(range) => extraction.warn_with(
                    script.location(&tokens[range.start]),
                    format!("unsupported entry in endpoint group `{}`", group.key),
                    &script.text(&tokens[range]),
                ),
            }
        }
    }
    tracing::trace!(event = "endpoints_collected", file = %script.source.path, count);
}

/// Top-level string constants, interpolated in declaration order.
fn path_constants(script: &Script<'_>) -> BTreeMap<String, String> {
    let tokens = script.tokens();
    let mut constants = BTreeMap::new();
    for decl in &script.consts {
        let [token] = &tokens[decl.value.clone()] else {
            continue;
        };
        let rendered = render_literal(token, |expr| match constants.get(expr) {
            Some(value) => String::clone(value),
            None => format!("${{{expr}}}"),
        });
        if let Some(value) = rendered {
            constants.insert(decl.name.clone(), value);
        }
    }
    constants
}

fn endpoint(
    script: &Script<'_>,
    resource: &str,
    property: &Property,
    constants: &BTreeMap<String, String>,
    extraction: &mut Extraction,
) -> Option<Endpoint> {
    let tokens = script.tokens();
    let key_token = &tokens[property.key_idx];
    let value = property.value.clone();
    let key = format!("{resource}.{}", property.key);

    let (raw_path, declared) = if tokens[value.start].is_punct('{') {
        object_form(script, value.start, &key, constants, extraction)?
    } else {
        (path_value(script, value.clone(), &key, constants, extraction)?, Annotation::default())
    };

    let annotation = declared.or(comment_annotation(script, property));
    let method_declared = annotation.method.is_some();
    let method = annotation
        .method
        .unwrap_or_else(|| infer_method(&property.key));

    Some(Endpoint {
        resource: resource.to_string(),
        name: property.key.clone(),
        method,
        method_declared,
        path: PathTemplate::parse(&raw_path),
        raw_path,
        request_type: annotation.request,
        response_type: annotation.response,
        location: script.location(key_token),
    })
}

/// `{ method, path, request, response }`.
fn object_form(
    script: &Script<'_>,
    open: usize,
    key: &str,
    constants: &BTreeMap<String, String>,
    extraction: &mut Extraction,
) -> Option<(String, Annotation)> {
    let tokens = script.tokens();
    let (entries, _) = object_entries(tokens, open)?;
    let mut annotation = Annotation::default();
    let mut path = None;
    for entry in entries {
        let Entry::Property(property) = entry else {
            continue;
        };
        let value = &tokens[property.value.clone()];
        let text = match value {
            [token] => token
                .string()
                .or_else(|| token.ident())
                .map(str::to_string),
            _ => None,
        };
        match property.key.as_str() {
            "method" => annotation.method = text.as_deref().and_then(HttpMethod::parse),
            "request" => annotation.request = text,
            "response" => annotation.response = text,
            "path" | "url" => {
                path = path_value(script, property.value.clone(), key, constants, extraction)
            }
            _ => {}
        }
    }
    if path.is_none() {
        extraction.warn_with(
            script.location(&tokens[open]),
            format!("endpoint `{key}` has no literal `path`"),
            &script.text(&tokens[open..open + 1]),
        );
    }
    path.map(|path| (path, annotation))
}

/// A string, template or arrow function returning one.
fn path_value(
    script: &Script<'_>,
    value: std::ops::Range<usize>,
    key: &str,
    constants: &BTreeMap<String, String>,
    extraction: &mut Extraction,
) -> Option<String> {
    let tokens = script.tokens();
    let value_tokens = &tokens[value.clone()];
    let (params, body) = match arrow_index(value_tokens) {
        Some(arrow) => (
            arrow_params(&value_tokens[..arrow]),
            strip_parens(&value_tokens[arrow + 2..]),
        ),
        None => (Vec::new(), value_tokens),
    };

    let rendered = match body {
        [token] => render_literal(token, |expr| {
            if let Some(value) = constants.get(expr) {
                return value.clone();
            }
            let param = params
                .iter()
                .find(|param| mentions(expr, param))
                .cloned()
                .unwrap_or_else(|| expr.to_string());
            format!("{{{param}}}")
        }),
        _ => None,
    };
    let Some(path) = rendered else {
        extraction.warn_with(
            script.location(&value_tokens[0]),
            format!("endpoint `{key}` is not a path literal or path-builder function"),
            &script.text(value_tokens),
        );
        return None;
    };

    for part in template_exprs(body) {
        let known = constants.contains_key(&part) || params.iter().any(|p| mentions(&part, p));
        if !known {
            extraction.warn(
                script.location(&value_tokens[0]),
                format!("unresolved `${{{part}}}` in endpoint `{key}`; treated as a parameter"),
            );
        }
    }
    Some(path)
}

fn template_exprs(body: &[Token]) -> Vec<String> {
    match body {
        [token] => match &token.kind {
            TokenKind::Template(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    crate::lexer::TemplatePart::Expr(expr) => Some(expr.clone()),
                    crate::lexer::TemplatePart::Text(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Whether `expr` uses the identifier `name`.
fn mentions(expr: &str, name: &str) -> bool {
    expr.split(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '$'))
        .any(|word| word == name)
}

/// Index of the `=` of a depth-zero `=>`.
fn arrow_index(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0i32;
    for idx in 0..tokens.len().saturating_sub(1) {
        let token = &tokens[idx];
        match token.kind {
            TokenKind::Punct('(') | TokenKind::Punct('{') | TokenKind::Punct('[') => depth += 1,
            TokenKind::Punct(')') | TokenKind::Punct('}') | TokenKind::Punct(']') => depth -= 1,
            TokenKind::Punct('=') if depth == 0 => {
                let next = &tokens[idx + 1];
                if next.is_punct('>') && next.start == token.end {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn arrow_params(head: &[Token]) -> Vec<String> {
    let head = match head.first() {
        Some(first) if first.is_ident("async") => &head[1..],
        _ => head,
    };
    match head {
        [single] => single.ident().map(str::to_string).into_iter().collect(),
        [open, .., close] if open.is_punct('(') && close.is_punct(')') => {
            split_commas(head, 1..head.len() - 1)
                .into_iter()
                .filter_map(|item| head[item].first()?.ident().map(str::to_string))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn strip_parens(tokens: &[Token]) -> &[Token] {
    match tokens {
        [open, inner @ .., close] if open.is_punct('(') && close.is_punct(')') => inner,
        _ => tokens,
    }
}

fn comment_annotation(script: &Script<'_>, property: &Property) -> Annotation {
    let tokens = script.tokens();
    let key_token = &tokens[property.key_idx];
    let last = &tokens[property.value.end - 1];
    let trailing = script
        .lexed
        .trailing_comment(last.line, last.end)
        .and_then(|comment| parse_annotation(&comment.text));
    let above = script
        .lexed
        .comment_above(key_token.line)
        .and_then(|comment| parse_annotation(&comment.text));
    match (trailing, above) {
        (Some(trailing), Some(above)) => trailing.or(above),
        (Some(found), None) | (None, Some(found)) => found,
        (None, None) => Annotation::default(),
    }
}

/// `METHOD [Request] [-> Response]` or `@method` / `@request` / `@response` tags.
fn parse_annotation(text: &str) -> Option<Annotation> {
    let tagged = Annotation {
        method: tag_value(text, "method").and_then(|value| HttpMethod::parse(&value)),
        request: tag_value(text, "request"),
        response: tag_value(text, "response"),
    };
    if tagged != Annotation::default() {
        return Some(tagged);
    }

    let caps = METHOD_LINE.as_ref()?.captures(text.lines().next()?)?;
    let method = HttpMethod::parse(&caps[1]);
    let rest = caps[2].trim();
    let (request, response) = match rest.split_once("->") {
        Some((request, response)) => (type_name(request), type_name(response)),
        None => (type_name(rest), None),
    };
    Some(Annotation {
        method,
        request,
        response,
    })
}

static METHOD_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(GET|POST|PUT|PATCH|DELETE)\b\s*(.*)$").ok());

static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"@(\w+)\s+(\S+)").ok());

static TYPE_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][\w$]*(?:<[^>]*>+)?(?:\[\])?$").ok());

fn tag_value(text: &str, tag: &str) -> Option<String> {
    TAG.as_ref()?
        .captures_iter(text)
        .find(|caps| &caps[1] == tag)
        .map(|caps| caps[2].to_string())
}

fn type_name(text: &str) -> Option<String> {
    let text = text.trim();
    TYPE_NAME
        .as_ref()?
        .is_match(text)
        .then(|| text.to_string())
}

/// Method implied by the first word of an endpoint name.
pub(crate) fn infer_method(name: &str) -> HttpMethod {
    let first = name
        .split(|ch: char| ch == '_' || ch == '-')
        .next()
        .unwrap_or(name)
        .to_ascii_uppercase();
    match first.as_str() {
        "LIST" | "GET" | "FETCH" | "SHOW" => HttpMethod::Get,
        "CREATE" | "UPLOAD" | "ANALYZE" | "SUBMIT" | "GENERATE" | "LOGIN" | "LOGOUT"
        | "REGISTER" | "SIGNUP" => HttpMethod::Post,
        "UPDATE" | "EDIT" | "PATCH" => HttpMethod::Patch,
        "PUT" | "REPLACE" => HttpMethod::Put,
        "DELETE" | "REMOVE" => HttpMethod::Delete,
        _ => HttpMethod::Any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceText;
    use pactcheck_core::ArtifactKind;

    const ENDPOINTS: &str = r#"
export const API_VERSION = 'v1';
export const API_BASE = `/api/${API_VERSION}`;

export const ENDPOINTS = {
  // CV
  CV: {
    LIST: `${API_BASE}/cv`, // GET -> PaginatedResponse<CV>
    GET: (id: string) => `${API_BASE}/cv/${id}`,
    // POST CreateCVRequest -> CV
    UPLOAD: `${API_BASE}/cv/upload`,
    ANALYZE: (cvId: string) => `${API_BASE}/cv/${encodeURIComponent(cvId)}/analyze`,
  },
  AUTH: {
    LOGIN: { method: 'POST', path: `${API_BASE}/auth/login`, request: 'LoginRequest' },
    /** @method GET @response Profile */
    ME: '/api/v1/auth/me',
    BROKEN: buildPath('x'),
  },
} as const;
"#;

    fn extract(text: &str) -> Extraction {
        let source = SourceText::new("contracts/endpoints.ts", text);
        let script = Script::parse(&source);
        let mut extraction = Extraction::new(ArtifactKind::Endpoints, "contracts/endpoints.ts");
        extract_endpoints(&script, &ExtractOptions::default(), &mut extraction);
        extraction
    }

    fn endpoints(extraction: &Extraction) -> BTreeMap<String, Endpoint> {
        extraction
            .entities
            .iter()
            .filter_map(|entity| match entity {
                Entity::Endpoint(endpoint) => Some((endpoint.key(), endpoint.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn resolves_paths_against_constants() {
        let extraction = extract(ENDPOINTS);
        assert_eq!(extraction.constants.get("API_BASE").map(String::as_str), Some("/api/v1"));
        let endpoints = endpoints(&extraction);
        assert_eq!(endpoints.len(), 6);
        assert_eq!(endpoints["CV.LIST"].raw_path, "/api/v1/cv");
        assert_eq!(endpoints["CV.GET"].path.to_string(), "/api/v1/cv/{id}");
        assert_eq!(endpoints["CV.ANALYZE"].path.to_string(), "/api/v1/cv/{cvId}/analyze");
        assert_eq!(endpoints["AUTH.LOGIN"].raw_path, "/api/v1/auth/login");
    }

    #[test]
    fn reads_methods_and_types_from_annotations() {
        let endpoints = endpoints(&extract(ENDPOINTS));
        let list = &endpoints["CV.LIST"];
        assert_eq!(list.method, HttpMethod::Get);
        assert!(list.method_declared);
        assert_eq!(list.response_type.as_deref(), Some("PaginatedResponse<CV>"));

        let upload = &endpoints["CV.UPLOAD"];
        assert_eq!(upload.method, HttpMethod::Post);
        assert_eq!(upload.request_type.as_deref(), Some("CreateCVRequest"));
        assert_eq!(upload.response_type.as_deref(), Some("CV"));

        let get = &endpoints["CV.GET"];
        assert_eq!(get.method, HttpMethod::Get);
        assert!(!get.method_declared);

        let login = &endpoints["AUTH.LOGIN"];
        assert_eq!(login.method, HttpMethod::Post);
        assert_eq!(login.request_type.as_deref(), Some("LoginRequest"));

        let me = &endpoints["AUTH.ME"];
        assert_eq!(me.method, HttpMethod::Get);
        assert_eq!(me.response_type.as_deref(), Some("Profile"));
    }

    #[test]
    fn warns_about_values_it_cannot_read() {
        let extraction = extract(ENDPOINTS);
        assert_eq!(extraction.warnings.len(), 1, "{:?}", extraction.warnings);
        assert!(extraction.warnings[0].message.contains("`AUTH.BROKEN`"));
    }

    #[test]
    fn missing_table_is_reported() {
        let extraction = extract("export const API_BASE = '/api';");
        assert!(endpoints(&extraction).is_empty());
        assert!(extraction.warnings[0].message.contains("no `ENDPOINTS` table"));
    }

    #[test]
    fn infers_methods_from_names() {
        assert_eq!(infer_method("LIST"), HttpMethod::Get);
        assert_eq!(infer_method("UPLOAD_AVATAR"), HttpMethod::Post);
        assert_eq!(infer_method("REMOVE"), HttpMethod::Delete);
        assert_eq!(infer_method("STATUS"), HttpMethod::Any);
    }
}
