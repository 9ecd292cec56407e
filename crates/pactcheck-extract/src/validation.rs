//! Validation extractor for schema-builder chains
//! (`export const CreateCVRequestSchema = z.object({ title: z.string().max(200) })`).

use std::collections::BTreeMap;
use std::ops::Range;

use pactcheck_core::{Constraint, Entity, Extraction, FieldRef, ValidationRule};

use crate::lexer::{Entry, Property, TokenKind, matching_close, object_entries, split_commas};
use crate::literals::eval_number;
use crate::script::Script;

const SCHEMA_SUFFIX: &str = "Schema";
const BUILDER: &str = "z";
const MAX_REFERENCE_DEPTH: usize = 4;

/// `.name(args)` link of a chain. `args` is empty for plain member access.
#[derive(Debug, Clone)]
struct Call {
    name: String,
    name_idx: usize,
    args: Range<usize>,
}

#[derive(Debug, Clone)]
struct Chain {
    root: String,
    calls: Vec<Call>,
}

/// How `min`/`max` apply to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measure {
    Length,
    Value,
    Neither,
    Unknown,
}

pub fn extract_validation(script: &Script<'_>, extraction: &mut Extraction) {
    let tokens = script.tokens();
    let mut schemas: BTreeMap<String, Vec<ValidationRule>> = BTreeMap::new();

    for decl in &script.consts {
        let Some(owner) = decl.name.strip_suffix(SCHEMA_SUFFIX).filter(|o| !o.is_empty()) else {
            continue;
        };
        let location = script.location(&tokens[decl.name_idx]);
        let snippet = script.text(&tokens[decl.value.clone()]);

        let Some(chain) = parse_chain(script, decl.value.clone()) else {
            extraction.warn_with(
                location,
                format!("schema `{}` is not a builder chain", decl.name),
                &snippet,
            );
            continue;
        };
        let Some(first) = chain.calls.first() else {
            extraction.warn_with(location, format!("schema `{}` is not an object schema", decl.name), &snippet);
            continue;
        };

        let mut rules = Vec::new();
        match (chain.root.as_str(), first.name.as_str()) {
            (BUILDER, "object") => {}
            (base, "extend") => match schemas.get(base) {
                Some(inherited) => rules.extend(inherited.iter().map(|rule| ValidationRule {
                    target: FieldRef::new(owner, rule.target.field.clone()),
                    ..rule.clone()
                })),
                None => extraction.warn(
                    location.clone(),
                    format!(
                        "base schema `{base}` of `{}` is not declared above it; only its own fields are checked",
                        decl.name
                    ),
                ),
            },
            _ => {
                extraction.warn_with(
                    location,
                    format!("schema `{}` is not a `z.object` or an `.extend` of one", decl.name),
                    &snippet,
                );
                continue;
            }
        }

        let Some((entries, _)) = object_entries(tokens, first.args.start) else {
            extraction.warn_with(
                location,
                format!("schema `{}` has no object literal shape", decl.name),
                &snippet,
            );
            continue;
        };
        let partial = chain.calls[1..].iter().any(|call| call.name == "partial");
        for entry in entries {
            match entry {
                Entry::Property(property) => {
                    rules.retain(|rule| rule.target.field != property.key);
                    rules.extend(field_rules(script, owner, &property, partial, extraction));
                }
                Entry::Other(range) => extraction.warn_with(
                    script.location(&tokens[range.start]),
                    format!("entry of schema `{}` has no plain key; its fields are not checked", decl.name),
                    &script.text(&tokens[range]),
                ),
            }
        }

        extraction
            .entities
            .extend(rules.iter().cloned().map(Entity::Validation));
        schemas.insert(decl.name.clone(), rules);
    }
    tracing::trace!(event = "schemas_collected", file = %script.source.path, count = schemas.len());
}

/// Parse `root.a(..).b(..)` over `range`; the whole range must be a chain.
fn parse_chain(script: &Script<'_>, range: Range<usize>) -> Option<Chain> {
    let tokens = script.tokens();
    let root = tokens.get(range.start)?.ident()?.to_string();
    let mut calls = Vec::new();
    let mut pos = range.start + 1;
    while pos < range.end {
        if !tokens[pos].is_punct('.') {
            return None;
        }
        let name_idx = pos + 1;
        let name = tokens.get(name_idx)?.ident()?.to_string();
        pos = name_idx + 1;
        let mut args = pos..pos;
        if pos < range.end && tokens[pos].is_punct('(') {
            let close = matching_close(tokens, pos)?;
            if close >= range.end {
                return None;
            }
            args = pos + 1..close;
            pos = close + 1;
        }
        calls.push(Call {
            name,
            name_idx,
            args,
        });
    }
    Some(Chain { root, calls })
}

/// Expand a chain rooted at another constant into one rooted at the builder.
fn resolve(script: &Script<'_>, mut chain: Chain) -> Chain {
    for _ in 0..MAX_REFERENCE_DEPTH {
        if chain.root == BUILDER {
            break;
        }
        let Some(decl) = script.const_named(&chain.root) else {
            break;
        };
        let Some(mut base) = parse_chain(script, decl.value.clone()) else {
            break;
        };
        base.calls.extend(chain.calls);
        chain = base;
    }
    chain
}

fn field_rules(
    script: &Script<'_>,
    owner: &str,
    property: &Property,
    partial: bool,
    extraction: &mut Extraction,
) -> Vec<ValidationRule> {
    let tokens = script.tokens();
    let target = FieldRef::new(owner, property.key.clone());
    let key_location = script.location(&tokens[property.key_idx]);
    let Some(chain) = parse_chain(script, property.value.clone()) else {
        extraction.warn_with(
            key_location,
            format!("validation for `{target}` is not a builder chain"),
            &script.text(&tokens[property.value.clone()]),
        );
        return Vec::new();
    };
    let chain = resolve(script, chain);

    let mut calls = chain.calls.iter().peekable();
    let mut measure = Measure::Unknown;
    if chain.root == BUILDER {
        while calls.next_if(|call| call.name == "coerce").is_some() {}
        measure = calls.next().map_or(Measure::Unknown, |base| match base.name.as_str() {
            "string" | "array" | "set" => Measure::Length,
            "number" | "bigint" => Measure::Value,
            _ => Measure::Neither,
        });
    }

    let mut rules = Vec::new();
    let mut required = !partial;
    if chain.root == BUILDER {
        if let Some(base) = chain.calls.iter().find(|call| call.name != "coerce") {
            if base.name == "enum" {
                match enum_values(script, base.args.clone()) {
                    Some(values) => rules.push(rule(script, &target, base, Constraint::OneOf(values), None)),
                    None => extraction.warn(
                        script.location(&tokens[base.name_idx]),
                        format!("enum values of `{target}` are not string literals"),
                    ),
                }
            }
        }
    }

    for call in calls {
        match call.name.as_str() {
            "optional" | "nullish" | "default" | "catch" => required = false,
            "nonempty" if measure == Measure::Length => {
                rules.push(rule(script, &target, call, Constraint::MinLength(1.0), Some("nonempty()")))
            }
            "positive" | "nonnegative" => {
                let literal = format!("{}()", call.name);
                rules.push(rule(script, &target, call, Constraint::Min(0.0), Some(&literal)))
            }
            "negative" | "nonpositive" => {
                let literal = format!("{}()", call.name);
                rules.push(rule(script, &target, call, Constraint::Max(0.0), Some(&literal)))
            }
            "min" | "max" | "length" | "gte" | "gt" | "lte" | "lt" => {
                let Some((value, literal)) = first_number(script, call) else {
                    extraction.warn_with(
                        script.location(&tokens[call.name_idx]),
                        format!("cannot evaluate `{}` argument of `{target}`", call.name),
                        &script.text(&tokens[call.args.clone()]),
                    );
                    continue;
                };
                let constraints = match (measure, call.name.as_str()) {
                    (Measure::Length, "min") => vec![Constraint::MinLength(value)],
                    (Measure::Length, "max") => vec![Constraint::MaxLength(value)],
                    (Measure::Length, "length") => {
                        vec![Constraint::MinLength(value), Constraint::MaxLength(value)]
                    }
                    (Measure::Value, "min" | "gte" | "gt") => vec![Constraint::Min(value)],
                    (Measure::Value, "max" | "lte" | "lt") => vec![Constraint::Max(value)],
                    (Measure::Unknown, _) => {
                        extraction.warn(
                            script.location(&tokens[call.name_idx]),
                            format!(
                                "cannot tell whether `{}` on `{target}` bounds a length or a value",
                                call.name
                            ),
                        );
                        continue;
                    }
                    _ => continue,
                };
                for constraint in constraints {
                    rules.push(rule(script, &target, call, constraint, Some(&literal)));
                }
            }
            _ => {}
        }
    }

    if required {
        rules.push(ValidationRule {
            target: target.clone(),
            constraint: Constraint::Required,
            literal: None,
            location: key_location,
        });
    }
    rules
}

fn rule(
    script: &Script<'_>,
    target: &FieldRef,
    call: &Call,
    constraint: Constraint,
    literal: Option<&str>,
) -> ValidationRule {
    ValidationRule {
        target: target.clone(),
        constraint,
        literal: literal.map(str::to_string),
        location: script.location(&script.tokens()[call.name_idx]),
    }
}

/// First argument evaluated as a number, with its source text.
fn first_number(script: &Script<'_>, call: &Call) -> Option<(f64, String)> {
    let tokens = script.tokens();
    let first = split_commas(tokens, call.args.clone()).into_iter().next()?;
    let value = eval_number(&tokens[first.clone()], &script.numbers)?;
    Some((value, script.text(&tokens[first])))
}

fn enum_values(script: &Script<'_>, args: Range<usize>) -> Option<Vec<String>> {
    let tokens = script.tokens();
    if !tokens.get(args.start)?.is_punct('[') {
        return None;
    }
    let close = matching_close(tokens, args.start)?;
    split_commas(tokens, args.start + 1..close)
        .into_iter()
        .map(|item| match &tokens[item] {
            [token] => match &token.kind {
                TokenKind::Str(value) => Some(value.clone()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceText;
    use pactcheck_core::ArtifactKind;

    const VALIDATION: &str = r#"
import { z } from 'zod';

const MAX_TITLE = 200;
const titleField = z.string().min(1).max(MAX_TITLE);

export const PaginationSchema = z.object({
  page: z.coerce.number().int().min(1).default(1),
  limit: z.coerce.number().int().min(1).max(100).default(20),
});

export const CreateCVRequestSchema = z.object({
  title: titleField,
  file_size: z.number().int().positive().max(10 * 1024 * 1024),
  tags: z.array(z.string()).max(5).optional(),
  status: z.enum(['draft', 'published']),
  summary: z.string().nullable(),
  code: z.string().length(6),
});

export const UpdateCVRequestSchema = CreateCVRequestSchema.extend({
  id: z.string().uuid(),
});

export const LooseSchema = z.union([z.string(), z.number()]);

export type CreateCVRequestInput = z.infer<typeof CreateCVRequestSchema>;
"#;

    fn extract(text: &str) -> Extraction {
        let source = SourceText::new("contracts/validation.ts", text);
        let script = Script::parse(&source);
        let mut extraction = Extraction::new(ArtifactKind::Validation, "contracts/validation.ts");
        extract_validation(&script, &mut extraction);
        extraction
    }

    fn constraints(extraction: &Extraction, owner: &str, field: &str) -> Vec<Constraint> {
        extraction
            .entities
            .iter()
            .filter_map(|entity| match entity {
                Entity::Validation(rule)
                    if rule.target.owner == owner && rule.target.field == field =>
                {
                    Some(rule.constraint.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn reduces_chains_to_constraints() {
        let extraction = extract(VALIDATION);
        assert_eq!(
            constraints(&extraction, "CreateCVRequest", "title"),
            vec![
                Constraint::MinLength(1.0),
                Constraint::MaxLength(200.0),
                Constraint::Required
            ]
        );
        assert_eq!(
            constraints(&extraction, "CreateCVRequest", "file_size"),
            vec![
                Constraint::Min(0.0),
                Constraint::Max(10485760.0),
                Constraint::Required
            ]
        );
        assert_eq!(
            constraints(&extraction, "CreateCVRequest", "tags"),
            vec![Constraint::MaxLength(5.0)]
        );
        assert_eq!(
            constraints(&extraction, "CreateCVRequest", "status"),
            vec![
                Constraint::OneOf(vec!["draft".to_string(), "published".to_string()]),
                Constraint::Required
            ]
        );
        assert_eq!(
            constraints(&extraction, "CreateCVRequest", "code"),
            vec![
                Constraint::MinLength(6.0),
                Constraint::MaxLength(6.0),
                Constraint::Required
            ]
        );
        assert_eq!(
            constraints(&extraction, "Pagination", "limit"),
            vec![Constraint::Min(1.0), Constraint::Max(100.0)]
        );
    }

    #[test]
    fn keeps_argument_text_as_literal() {
        let extraction = extract(VALIDATION);
        let literal = extraction.entities.iter().find_map(|entity| match entity {
            Entity::Validation(rule)
                if rule.target.field == "file_size"
                    && rule.constraint == Constraint::Max(10485760.0) =>
            {
                rule.literal.clone()
            }
            _ => None,
        });
        assert_eq!(literal.as_deref(), Some("10 * 1024 * 1024"));
    }

    #[test]
    fn extended_schemas_inherit_rules() {
        let extraction = extract(VALIDATION);
        assert_eq!(
            constraints(&extraction, "UpdateCVRequest", "title"),
            constraints(&extraction, "CreateCVRequest", "title")
        );
        assert_eq!(
            constraints(&extraction, "UpdateCVRequest", "id"),
            vec![Constraint::Required]
        );
    }

    #[test]
    fn unsupported_schemas_warn() {
        let extraction = extract(VALIDATION);
        assert_eq!(extraction.warnings.len(), 1, "{:?}", extraction.warnings);
        assert!(extraction.warnings[0].message.contains("`LooseSchema`"));
    }

    #[test]
    fn unresolved_references_cannot_be_classified() {
        let extraction = extract(
            "import { name } from './fields';\nexport const PersonSchema = z.object({ name: name.max(5) });",
        );
        assert_eq!(constraints(&extraction, "Person", "name"), vec![Constraint::Required]);
        assert!(extraction.warnings[0].message.contains("bounds a length or a value"));
    }
}
