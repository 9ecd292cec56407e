//! Error-taxonomy extractor: code lists, code → status maps and
//! code → message maps, in whichever shape the file declares them.

use std::collections::{BTreeMap, BTreeSet};

use pactcheck_core::{Entity, ErrorCode, Extraction, Location};

use crate::lexer::{Entry, Property, Token, TokenKind, matching_close, object_entries, split_commas};
use crate::literals::eval_number;
use crate::script::Script;

/// What a single map entry says about its code.
#[derive(Debug, Clone, PartialEq)]
enum Fact {
    Listed,
    Status(f64),
    Message(String),
    Both { status: Option<f64>, message: Option<String> },
}

impl Fact {
    fn class(&self) -> &'static str {
        match self {
            Fact::Listed => "code list",
            Fact::Status(_) => "status map",
            Fact::Message(_) => "message map",
            Fact::Both { .. } => "error table",
        }
    }
}

/// Codes in first-seen order.
#[derive(Default)]
struct Taxonomy {
    codes: Vec<ErrorCode>,
    index: BTreeMap<String, usize>,
}

impl Taxonomy {
    fn entry(&mut self, code: &str, location: &Location) -> &mut ErrorCode {
        let idx = match self.index.get(code) {
            Some(idx) => *idx,
            None => {
                self.codes.push(ErrorCode {
                    code: code.to_string(),
                    status: None,
                    message: None,
                    listed: false,
                    location: location.clone(),
                    status_location: None,
                    message_location: None,
                });
                self.index.insert(code.to_string(), self.codes.len() - 1);
                self.codes.len() - 1
            }
        };
        &mut self.codes[idx]
    }
}

pub fn extract_taxonomy(script: &Script<'_>, extraction: &mut Extraction) {
    let tokens = script.tokens();
    let mut taxonomy = Taxonomy::default();

    for (name, facts) in enum_lists(script) {
        apply(script, &name, facts, &mut taxonomy, extraction);
    }

    for decl in &script.consts {
        let Some(first) = tokens.get(decl.value.start) else {
            continue;
        };
        let facts = if first.is_punct('[') {
            match code_array(script, decl.value.start) {
                Some(facts) => facts,
                None => continue,
            }
        } else if first.is_punct('{') {
            let Some((entries, _)) = object_entries(tokens, decl.value.start) else {
                continue;
            };
            map_facts(script, &decl.name, entries, extraction)
        } else {
            continue;
        };
        if facts.is_empty() {
            continue;
        }

        let classes: BTreeSet<&str> = facts.iter().map(|(_, _, fact)| fact.class()).collect();
        if classes.len() > 1 {
            extraction.warn_with(
                script.location(&tokens[decl.name_idx]),
                format!(
                    "`{}` mixes {}; skipped",
                    decl.name,
                    classes.into_iter().collect::<Vec<_>>().join(" and ")
                ),
                &script.text(&tokens[decl.value.clone()]),
            );
            continue;
        }
        apply(script, &decl.name, facts, &mut taxonomy, extraction);
    }

    let count = taxonomy.codes.len();
    extraction
        .entities
        .extend(taxonomy.codes.into_iter().map(Entity::ErrorCode));
    tracing::trace!(event = "error_codes_collected", file = %script.source.path, count);
}

type Facts = Vec<(String, usize, Fact)>;

fn apply(
    script: &Script<'_>,
    container: &str,
    facts: Facts,
    taxonomy: &mut Taxonomy,
    extraction: &mut Extraction,
) {
    let tokens = script.tokens();
    let mut seen = BTreeSet::new();
    for (code, key_idx, fact) in facts {
        let location = script.location(&tokens[key_idx]);
        if !seen.insert(code.clone()) {
            extraction.warn(
                location,
                format!("duplicate key `{code}` in `{container}`; the first is kept"),
            );
            continue;
        }
        let (status, message) = match fact {
            Fact::Listed => {
                let entry = taxonomy.entry(&code, &location);
                if !entry.listed {
                    entry.listed = true;
                    entry.location = location;
                }
                continue;
            }
            Fact::Status(status) => (Some(status), None),
            Fact::Message(message) => (None, Some(message)),
            Fact::Both { status, message } => (status, message),
        };

        if let Some(raw) = status {
            match http_status(raw) {
                Some(status) => {
                    let entry = taxonomy.entry(&code, &location);
                    if entry.status.is_none() {
                        entry.status = Some(status);
                        entry.status_location = Some(location.clone());
                    } else {
                        extraction.warn(
                            location.clone(),
                            format!("status for `{code}` is declared twice; the first is kept"),
                        );
                    }
                }
                None => extraction.warn(
                    location.clone(),
                    format!("status `{raw}` for `{code}` is not an integer status code"),
                ),
            }
        }
        if let Some(message) = message {
            let entry = taxonomy.entry(&code, &location);
            if entry.message.is_none() {
                entry.message = Some(message);
                entry.message_location = Some(location);
            } else {
                extraction.warn(
                    location,
                    format!("message for `{code}` is declared twice; the first is kept"),
                );
            }
        }
    }
}

fn http_status(raw: f64) -> Option<u16> {
    (raw.fract() == 0.0 && (0.0..=u16::MAX as f64).contains(&raw)).then_some(raw as u16)
}

/// `['UNAUTHORIZED', 'NOT_FOUND'] as const`
fn code_array(script: &Script<'_>, open: usize) -> Option<Facts> {
    let tokens = script.tokens();
    let close = matching_close(tokens, open)?;
    split_commas(tokens, open + 1..close)
        .into_iter()
        .map(|item| match &tokens[item.clone()] {
            [token] => token
                .string()
                .map(|code| (code.to_string(), item.start, Fact::Listed)),
            _ => None,
        })
        .collect()
}

fn map_facts(script: &Script<'_>, container: &str, entries: Vec<Entry>, extraction: &mut Extraction) -> Facts {
    let tokens = script.tokens();
    let mut facts = Vec::new();
    for entry in entries {
        match entry {
            Entry::Property(property) => match fact(script, &property) {
                Some(fact) => facts.push((property.key.clone(), property.key_idx, fact)),
                None => extraction.warn_with(
                    script.location(&tokens[property.key_idx]),
                    format!("value for `{}` in `{container}` is not a code, status or message", property.key),
                    &script.text(&tokens[property.value.clone()]),
                ),
            },
            Entry::Other(range) => extraction.warn_with(
                script.location(&tokens[range.start]),
                format!("entry of `{container}` has no plain key; skipped"),
                &script.text(&tokens[range]),
            ),
        }
    }
    facts
}

fn fact(script: &Script<'_>, property: &Property) -> Option<Fact> {
    let tokens = script.tokens();
    let value = &tokens[property.value.clone()];
    if let [token] = value {
        if let TokenKind::Str(text) = &token.kind {
            return Some(if *text == property.key {
                Fact::Listed
            } else {
                Fact::Message(text.clone())
            });
        }
        if let TokenKind::Template(_) = &token.kind {
            return None;
        }
    }
    if let Some(status) = eval_number(value, &script.numbers) {
        return Some(Fact::Status(status));
    }

    let (entries, _) = object_entries(tokens, property.value.start)?;
    let mut status = None;
    let mut message = None;
    for entry in entries {
        let Entry::Property(inner) = entry else {
            continue;
        };
        let inner_value = &tokens[inner.value.clone()];
        match inner.key.as_str() {
            "status" | "statusCode" | "httpStatus" => {
                status = eval_number(inner_value, &script.numbers)
            }
            "message" => message = single_string(inner_value),
            _ => {}
        }
    }
    (status.is_some() || message.is_some()).then_some(Fact::Both { status, message })
}

fn single_string(tokens: &[Token]) -> Option<String> {
    match tokens {
        [token] => token.string().map(str::to_string),
        _ => None,
    }
}

/// `enum ErrorCode { UNAUTHORIZED = 'UNAUTHORIZED', NOT_FOUND }` at depth zero.
fn enum_lists(script: &Script<'_>) -> Vec<(String, Facts)> {
    let tokens = script.tokens();
    let mut lists = Vec::new();
    let mut depth = 0i32;
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Punct('{') | TokenKind::Punct('(') | TokenKind::Punct('[') => depth += 1,
            TokenKind::Punct('}') | TokenKind::Punct(')') | TokenKind::Punct(']') => depth -= 1,
            _ => {}
        }
        if depth != 0 || !token.is_ident("enum") {
            continue;
        }
        let Some(name) = tokens.get(idx + 1).and_then(Token::ident) else {
            continue;
        };
        let open = idx + 2;
        if !tokens.get(open).is_some_and(|token| token.is_punct('{')) {
            continue;
        }
        let Some(close) = matching_close(tokens, open) else {
            continue;
        };
        let facts = split_commas(tokens, open + 1..close)
            .into_iter()
            .filter_map(|item| {
                let member = tokens[item.start].ident()?;
                Some((member.to_string(), item.start, Fact::Listed))
            })
            .collect();
        lists.push((name.to_string(), facts));
    }
    lists
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceText;
    use pactcheck_core::ArtifactKind;

    const ERRORS: &str = r#"
export const ERROR_CODES = {
  UNAUTHORIZED: 'UNAUTHORIZED',
  NOT_FOUND: 'NOT_FOUND',
  RATE_LIMITED: 'RATE_LIMITED',
} as const;

export type ErrorCode = typeof ERROR_CODES[keyof typeof ERROR_CODES];

export const HTTP_STATUS: Record<ErrorCode, number> = {
  UNAUTHORIZED: 401,
  [ERROR_CODES.NOT_FOUND]: 404,
  RATE_LIMITED: 42.5,
  PAYMENT_REQUIRED: 402,
};

export const ERROR_MESSAGES: Record<ErrorCode, string> = {
  UNAUTHORIZED: 'Authentication required',
  NOT_FOUND: 'Resource not found',
  NOT_FOUND: 'Duplicate',
};
"#;

    fn extract(text: &str) -> BTreeMap<String, ErrorCode> {
        let (codes, _) = extract_with_warnings(text);
        codes
    }

    fn extract_with_warnings(text: &str) -> (BTreeMap<String, ErrorCode>, Vec<String>) {
        let source = SourceText::new("contracts/errors.ts", text);
        let script = Script::parse(&source);
        let mut extraction = Extraction::new(ArtifactKind::Errors, "contracts/errors.ts");
        extract_taxonomy(&script, &mut extraction);
        let codes = extraction
            .entities
            .iter()
            .filter_map(|entity| match entity {
                Entity::ErrorCode(code) => Some((code.code.clone(), code.clone())),
                _ => None,
            })
            .collect();
        let warnings = extraction
            .warnings
            .iter()
            .map(|warning| warning.message.clone())
            .collect();
        (codes, warnings)
    }

    #[test]
    fn joins_lists_and_maps_by_code() {
        let codes = extract(ERRORS);
        let unauthorized = &codes["UNAUTHORIZED"];
        assert!(unauthorized.listed);
        assert_eq!(unauthorized.status, Some(401));
        assert_eq!(unauthorized.message.as_deref(), Some("Authentication required"));
        assert_eq!(unauthorized.location.line, 3);
        assert_eq!(unauthorized.status_location.as_ref().map(|loc| loc.line), Some(11));

        assert_eq!(codes["NOT_FOUND"].status, Some(404));
        assert_eq!(codes["NOT_FOUND"].message.as_deref(), Some("Resource not found"));
    }

    #[test]
    fn map_only_codes_are_not_listed() {
        let codes = extract(ERRORS);
        let payment = &codes["PAYMENT_REQUIRED"];
        assert!(!payment.listed);
        assert_eq!(payment.status, Some(402));
        assert_eq!(payment.message, None);
    }

    #[test]
    fn warns_about_bad_statuses_and_duplicates() {
        let (codes, warnings) = extract_with_warnings(ERRORS);
        assert_eq!(codes["RATE_LIMITED"].status, None);
        assert_eq!(warnings.len(), 2, "{warnings:?}");
        assert!(warnings[0].contains("`42.5`"));
        assert!(warnings[1].contains("duplicate key `NOT_FOUND`"));
    }

    #[test]
    fn reads_enums_arrays_and_combined_tables() {
        let codes = extract(
            r#"
export enum ApiError { FORBIDDEN = 'FORBIDDEN', CONFLICT }
export const EXTRA = ['TIMEOUT'] as const;
export const ERRORS = {
  FORBIDDEN: { status: 403, message: 'Forbidden' },
  CONFLICT: { status: 409 },
};
"#,
        );
        assert_eq!(codes.len(), 3);
        assert!(codes["FORBIDDEN"].listed);
        assert_eq!(codes["FORBIDDEN"].status, Some(403));
        assert_eq!(codes["FORBIDDEN"].message.as_deref(), Some("Forbidden"));
        assert_eq!(codes["CONFLICT"].status, Some(409));
        assert!(codes["TIMEOUT"].listed);
    }

    #[test]
    fn mixed_maps_are_skipped() {
        let (codes, warnings) =
            extract_with_warnings("export const MIXED = { A: 'A', B: 404 };");
        assert!(codes.is_empty());
        assert!(warnings[0].contains("mixes code list and status map"));
    }
}
