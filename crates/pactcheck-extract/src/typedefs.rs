//! TypeDef extractor for TypeScript `interface` and `type` declarations.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::LazyLock;

use pactcheck_core::{Entity, Extraction, Field, FieldKind, TypeDef, TypeRole};
use regex::Regex;

use crate::lexer::{Token, TokenKind, expression_end, matching_close};
use crate::script::Script;

/// Alias resolution stops after this many hops.
const MAX_ALIAS_DEPTH: usize = 8;

#[derive(Debug, Clone)]
enum Shape {
    /// Interface body or object-literal type, possibly an intersection.
    Object {
        extends: Vec<String>,
        bodies: Vec<Range<usize>>,
    },
    /// Any other type expression, kept as text for kind resolution.
    Alias(String),
    Enum,
}

#[derive(Debug, Clone)]
struct Decl {
    name: String,
    keyword_idx: usize,
    name_idx: usize,
    generics: Vec<String>,
    shape: Shape,
}

/// Names visible while mapping member types to kinds.
struct TypeScope {
    objects: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
    enums: BTreeSet<String>,
}

pub fn extract_types(script: &Script<'_>, extraction: &mut Extraction) {
    let decls = collect_decls(script, extraction);
    let scope = TypeScope {
        objects: decls
            .iter()
            .filter(|decl| matches!(decl.shape, Shape::Object { .. }))
            .map(|decl| decl.name.clone())
            .collect(),
        aliases: decls
            .iter()
            .filter_map(|decl| match &decl.shape {
                Shape::Alias(text) => Some((decl.name.clone(), text.clone())),
                _ => None,
            })
            .collect(),
        enums: decls
            .iter()
            .filter(|decl| matches!(decl.shape, Shape::Enum))
            .map(|decl| decl.name.clone())
            .collect(),
    };

    let mut own: BTreeMap<String, (Vec<Field>, Vec<String>)> = BTreeMap::new();
    let mut object_decls: Vec<&Decl> = Vec::new();
    for decl in &decls {
        let Shape::Object { extends, bodies } = &decl.shape else {
            continue;
        };
        let mut fields: Vec<Field> = Vec::new();
        for body in bodies {
            for field in members(script, body.clone(), &decl.generics, &scope, extraction) {
                push_field(&mut fields, field, &decl.name, extraction);
            }
        }
        if let Some(first) = object_decls.iter().find(|kept| kept.name == decl.name) {
            let kept_at = script.location(&script.tokens()[first.name_idx]);
            extraction.warn(
                script.location(&script.tokens()[decl.name_idx]),
                format!("duplicate type `{}`; the definition at {kept_at} is kept", decl.name),
            );
            continue;
        }
        own.insert(decl.name.clone(), (fields, extends.clone()));
        object_decls.push(decl);
    }

    for decl in object_decls {
        let Some((own_fields, extends)) = own.get(&decl.name) else {
            continue;
        };
        let mut fields = Vec::new();
        for base in extends {
            if own.contains_key(base) {
                let mut visiting = vec![decl.name.clone()];
                for field in resolved_fields(base, &own, &mut visiting) {
                    merge_field(&mut fields, field);
                }
            } else {
                let location = script.location(&script.tokens()[decl.name_idx]);
                extraction.warn(
                    location,
                    format!(
                        "base type `{base}` of `{}` is not declared in this file; its fields are not inherited",
                        decl.name
                    ),
                );
            }
        }
        for field in own_fields {
            merge_field(&mut fields, field.clone());
        }

        let table_hint = script
            .doc_comment(decl.keyword_idx)
            .and_then(table_tag);
        extraction.entities.push(Entity::TypeDef(TypeDef {
            name: decl.name.clone(),
            role: TypeRole::from_name(&decl.name),
            generics: decl.generics.clone(),
            extends: extends.clone(),
            table_hint,
            fields,
            location: script.location(&script.tokens()[decl.name_idx]),
        }));
    }
}

fn push_field(fields: &mut Vec<Field>, field: Field, owner: &str, extraction: &mut Extraction) {
    if fields.iter().any(|existing| existing.name == field.name) {
        extraction.warn(
            field.location.clone(),
            format!("duplicate member `{}` in `{owner}`; the first is kept", field.name),
        );
        return;
    }
    fields.push(field);
}

/// Later definitions of a name replace earlier ones in place.
fn merge_field(fields: &mut Vec<Field>, field: Field) {
    match fields.iter_mut().find(|existing| existing.name == field.name) {
        Some(existing) => *existing = field,
        None => fields.push(field),
    }
}

fn resolved_fields(
    name: &str,
    own: &BTreeMap<String, (Vec<Field>, Vec<String>)>,
    visiting: &mut Vec<String>,
) -> Vec<Field> {
    if visiting.iter().any(|seen| seen == name) {
        return Vec::new();
    }
    let Some((own_fields, extends)) = own.get(name) else {
        return Vec::new();
    };
    visiting.push(name.to_string());
    let mut fields = Vec::new();
    for base in extends {
        for field in resolved_fields(base, own, visiting) {
            merge_field(&mut fields, field);
        }
    }
    for field in own_fields {
        merge_field(&mut fields, field.clone());
    }
    visiting.pop();
    fields
}

static TABLE_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"@table\s+([\w.]+)").ok());

fn table_tag(comment: &str) -> Option<String> {
    let caps = TABLE_TAG.as_ref()?.captures(comment)?;
    let table = &caps[1];
    Some(table.rsplit('.').next().unwrap_or(table).to_string())
}

fn collect_decls(script: &Script<'_>, extraction: &mut Extraction) -> Vec<Decl> {
    let tokens = script.tokens();
    let mut decls = Vec::new();
    let mut depth = 0i32;
    let mut idx = 0;
    while idx < tokens.len() {
        let token = &tokens[idx];
        match token.kind {
            TokenKind::Punct('{') | TokenKind::Punct('(') | TokenKind::Punct('[') => depth += 1,
            TokenKind::Punct('}') | TokenKind::Punct(')') | TokenKind::Punct(']') => depth -= 1,
            _ => {}
        }
        let keyword = token.ident().unwrap_or_default();
        let named = tokens.get(idx + 1).and_then(Token::ident).is_some();
        if depth != 0 || !named || !matches!(keyword, "interface" | "type" | "enum") {
            idx += 1;
            continue;
        }
        let parsed = match keyword {
            "interface" => interface_decl(tokens, idx),
            "type" => alias_decl(script, idx),
            _ => enum_decl(tokens, idx),
        };
        match parsed {
            Some((decl, next)) => {
                decls.push(decl);
                idx = next;
            }
            None => {
                let end = expression_end(tokens, idx).max(idx + 1);
                let snippet = script.text(&tokens[idx..end.min(tokens.len())]);
                extraction.warn_with(
                    script.location(token),
                    format!("unsupported `{keyword}` declaration"),
                    &snippet,
                );
                idx = end;
            }
        }
    }
    decls
}

fn generics(tokens: &[Token], idx: usize) -> Option<(Vec<String>, usize)> {
    if !tokens.get(idx).is_some_and(|t| t.is_punct('<')) {
        return Some((Vec::new(), idx));
    }
    let close = angle_close(tokens, idx)?;
    let mut names = Vec::new();
    let mut depth = 0i32;
    let mut expect_name = true;
    for token in &tokens[idx + 1..close] {
        match token.kind {
            TokenKind::Punct('<') | TokenKind::Punct('{') | TokenKind::Punct('(') => depth += 1,
            TokenKind::Punct('>') | TokenKind::Punct('}') | TokenKind::Punct(')') => depth -= 1,
            TokenKind::Punct(',') if depth == 0 => expect_name = true,
            TokenKind::Ident(ref name) if depth == 0 && expect_name => {
                names.push(name.clone());
                expect_name = false;
            }
            _ => {}
        }
    }
    Some((names, close + 1))
}

/// Closing `>` of the angle group at `open`, ignoring `=>` arrows.
fn angle_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for idx in open..tokens.len() {
        let token = &tokens[idx];
        if token.is_punct('<') {
            depth += 1;
        } else if token.is_punct('>') && !is_arrow(tokens, idx) {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        } else if token.is_punct(';') || token.is_punct('{') && depth == 0 {
            return None;
        }
    }
    None
}

fn is_arrow(tokens: &[Token], idx: usize) -> bool {
    idx > 0 && tokens[idx - 1].is_punct('=') && tokens[idx - 1].end == tokens[idx].start
}

/// Name of a heritage clause entry, with generic arguments dropped.
fn heritage(tokens: &[Token], range: Range<usize>) -> Vec<String> {
    let mut names = Vec::new();
    let mut depth = 0i32;
    let mut expect_name = true;
    for idx in range {
        let token = &tokens[idx];
        match &token.kind {
            TokenKind::Punct('<') => depth += 1,
            TokenKind::Punct('>') if !is_arrow(tokens, idx) => depth -= 1,
            TokenKind::Punct(',') if depth == 0 => expect_name = true,
            TokenKind::Ident(name) if depth == 0 && expect_name => {
                names.push(name.clone());
                expect_name = false;
            }
            _ => {}
        }
    }
    names
}

fn interface_decl(tokens: &[Token], idx: usize) -> Option<(Decl, usize)> {
    let name_idx = idx + 1;
    let name = tokens.get(name_idx)?.ident()?.to_string();
    let (generics, mut next) = generics(tokens, name_idx + 1)?;
    let mut extends = Vec::new();
    if tokens.get(next).is_some_and(|t| t.is_ident("extends")) {
        let open = (next + 1..tokens.len()).find(|pos| tokens[*pos].is_punct('{'))?;
        extends = heritage(tokens, next + 1..open);
        next = open;
    }
    if !tokens.get(next)?.is_punct('{') {
        return None;
    }
    let close = matching_close(tokens, next)?;
    let decl = Decl {
        name,
        keyword_idx: idx,
        name_idx,
        generics,
        shape: Shape::Object {
            extends,
            bodies: vec![next + 1..close],
        },
    };
    Some((decl, close + 1))
}

fn alias_decl(script: &Script<'_>, idx: usize) -> Option<(Decl, usize)> {
    let tokens = script.tokens();
    let name_idx = idx + 1;
    let name = tokens.get(name_idx)?.ident()?.to_string();
    let (generics, eq) = generics(tokens, name_idx + 1)?;
    if !tokens.get(eq)?.is_punct('=') {
        return None;
    }
    let start = eq + 1;
    let end = expression_end(tokens, start);
    if end <= start {
        return None;
    }

    let shape = object_intersection(tokens, start..end)
        .unwrap_or_else(|| Shape::Alias(script.text(&tokens[start..end])));
    let decl = Decl {
        name,
        keyword_idx: idx,
        name_idx,
        generics,
        shape,
    };
    Some((decl, end))
}

/// `{..}`, `Base & {..}` and similar intersections of object types.
fn object_intersection(tokens: &[Token], range: Range<usize>) -> Option<Shape> {
    let mut extends = Vec::new();
    let mut bodies = Vec::new();
    let mut idx = range.start;
    if tokens.get(idx).is_some_and(|t| t.is_punct('&')) {
        idx += 1;
    }
    loop {
        let token = tokens.get(idx)?;
        if token.is_punct('{') {
            let close = matching_close(tokens, idx)?;
            bodies.push(idx + 1..close);
            idx = close + 1;
        } else if let Some(name) = token.ident() {
            extends.push(name.to_string());
            idx += 1;
            if tokens.get(idx).is_some_and(|t| t.is_punct('<')) {
                idx = angle_close(tokens, idx)? + 1;
            }
        } else {
            return None;
        }
        if idx >= range.end {
            break;
        }
        if !tokens[idx].is_punct('&') {
            return None;
        }
        idx += 1;
    }
    if bodies.is_empty() {
        return None;
    }
    Some(Shape::Object { extends, bodies })
}

fn enum_decl(tokens: &[Token], idx: usize) -> Option<(Decl, usize)> {
    let name_idx = idx + 1;
    let name = tokens.get(name_idx)?.ident()?.to_string();
    let open = name_idx + 1;
    if !tokens.get(open)?.is_punct('{') {
        return None;
    }
    let close = matching_close(tokens, open)?;
    let decl = Decl {
        name,
        keyword_idx: idx,
        name_idx,
        generics: Vec::new(),
        shape: Shape::Enum,
    };
    Some((decl, close + 1))
}

fn members(
    script: &Script<'_>,
    body: Range<usize>,
    generics: &[String],
    scope: &TypeScope,
    extraction: &mut Extraction,
) -> Vec<Field> {
    let tokens = script.tokens();
    let mut fields = Vec::new();
    let mut idx = body.start;
    while idx < body.end {
        let token = &tokens[idx];
        if token.is_punct(';') || token.is_punct(',') {
            idx += 1;
            continue;
        }
        let end = member_end(tokens, idx, body.end);
        if let Some(field) = member(script, idx..end, generics, scope, extraction) {
            fields.push(field);
        }
        idx = end;
    }
    fields
}

/// Members end at `;`, `,` or a line break that does not continue a type.
fn member_end(tokens: &[Token], start: usize, end: usize) -> usize {
    let mut depth = 0i32;
    for idx in start..end {
        let token = &tokens[idx];
        if depth == 0 && idx > start && token.line > tokens[idx - 1].line {
            let previous = &tokens[idx - 1];
            let continues = token.is_punct('|')
                || token.is_punct('&')
                || previous.is_punct('|')
                || previous.is_punct('&')
                || previous.is_punct(':')
                || (previous.is_punct('>') && is_arrow(tokens, idx - 1));
            if !continues {
                return idx;
            }
        }
        match token.kind {
            TokenKind::Punct('{') | TokenKind::Punct('(') | TokenKind::Punct('[') => depth += 1,
            TokenKind::Punct('}') | TokenKind::Punct(')') | TokenKind::Punct(']') => depth -= 1,
            TokenKind::Punct('<') => depth += 1,
            TokenKind::Punct('>') if !is_arrow(tokens, idx) => depth -= 1,
            TokenKind::Punct(';') | TokenKind::Punct(',') if depth == 0 => return idx,
            _ => {}
        }
    }
    end
}

fn member(
    script: &Script<'_>,
    range: Range<usize>,
    generics: &[String],
    scope: &TypeScope,
    extraction: &mut Extraction,
) -> Option<Field> {
    let tokens = &script.tokens()[range];
    let mut idx = 0;
    if tokens[idx].is_ident("readonly")
        && tokens
            .get(idx + 1)
            .is_some_and(|t| !t.is_punct(':') && !t.is_punct('?'))
    {
        idx += 1;
    }
    let name_token = tokens.get(idx)?;
    if name_token.is_punct('[') {
        // index signature
        return None;
    }
    let name = match &name_token.kind {
        TokenKind::Ident(name) | TokenKind::Str(name) => name.clone(),
        _ => {
            extraction.warn_with(
                script.location(name_token),
                "unsupported member",
                &script.text(tokens),
            );
            return None;
        }
    };
    idx += 1;
    let optional = tokens.get(idx).is_some_and(|t| t.is_punct('?'));
    if optional {
        idx += 1;
    }
    match tokens.get(idx) {
        Some(token) if token.is_punct(':') => {}
        Some(token) if token.is_punct('(') || token.is_punct('<') => {
            extraction.warn_with(
                script.location(name_token),
                format!("method signature `{name}` is not a data field; skipped"),
                &script.text(tokens),
            );
            return None;
        }
        _ => {
            extraction.warn_with(
                script.location(name_token),
                format!("member `{name}` has no type annotation"),
                &script.text(tokens),
            );
            return None;
        }
    }
    let type_tokens = &tokens[idx + 1..];
    if type_tokens.is_empty() {
        extraction.warn_with(
            script.location(name_token),
            format!("member `{name}` has an empty type"),
            &script.text(tokens),
        );
        return None;
    }
    let raw_type = script.text(type_tokens);
    Some(Field {
        name,
        kind: ts_kind(&raw_type, generics, scope, 0),
        nullable: optional || has_null_member(&raw_type),
        raw_type,
        has_default: false,
        location: script.location(name_token),
    })
}

fn has_null_member(text: &str) -> bool {
    split_top_level(text, '|')
        .iter()
        .any(|member| matches!(member.trim(), "null" | "undefined"))
}

/// Split `text` on `sep` outside brackets, quotes and arrows.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut previous = '\0';
    for (idx, ch) in text.char_indices() {
        if let Some(open) = quote {
            if ch == open && previous != '\\' {
                quote = None;
            }
        } else {
            match ch {
                '\'' | '"' | '`' => quote = Some(ch),
                '(' | '[' | '{' | '<' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                '>' if previous != '=' => depth -= 1,
                c if c == sep && depth == 0 => {
                    parts.push(&text[start..idx]);
                    start = idx + c.len_utf8();
                }
                _ => {}
            }
        }
        previous = ch;
    }
    parts.push(&text[start..]);
    parts
}

/// Semantic kind of a TypeScript type expression.
fn ts_kind(text: &str, generics: &[String], scope: &TypeScope, hops: usize) -> FieldKind {
    let members: Vec<&str> = split_top_level(text.trim(), '|')
        .into_iter()
        .map(str::trim)
        .filter(|member| !member.is_empty() && !matches!(*member, "null" | "undefined"))
        .collect();
    match members.as_slice() {
        [] => FieldKind::Unknown,
        [single] => single_kind(single, generics, scope, hops),
        several => {
            let kinds: BTreeSet<FieldKind> = several
                .iter()
                .map(|member| single_kind(member, generics, scope, hops))
                .collect();
            if kinds.len() == 1 {
                kinds.into_iter().next().unwrap_or(FieldKind::Unknown)
            } else {
                FieldKind::Unknown
            }
        }
    }
}

fn single_kind(member: &str, generics: &[String], scope: &TypeScope, hops: usize) -> FieldKind {
    if split_top_level(member, '&').len() > 1 {
        return FieldKind::Object;
    }
    if member.contains("=>") && !member.starts_with('{') {
        return FieldKind::Unknown;
    }
    if let Some(inner) = member.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        return ts_kind(inner, generics, scope, hops);
    }
    if member.ends_with("[]") || member.starts_with('[') {
        return FieldKind::Array;
    }
    if member.starts_with('{') {
        return FieldKind::Object;
    }
    if member.starts_with(['\'', '"', '`']) {
        return FieldKind::String;
    }
    if member.parse::<f64>().is_ok() {
        return FieldKind::Number;
    }

    let base = member.split('<').next().unwrap_or(member).trim();
    match base {
        "string" => FieldKind::String,
        "number" | "bigint" => FieldKind::Number,
        "boolean" | "true" | "false" => FieldKind::Boolean,
        "Date" => FieldKind::Timestamp,
        "Array" | "ReadonlyArray" | "Set" => FieldKind::Array,
        "Record" | "object" | "Object" | "Map" => FieldKind::Object,
        _ if generics.iter().any(|param| param == base) => FieldKind::Unknown,
        _ if scope.objects.contains(base) => FieldKind::Object,
        _ if scope.enums.contains(base) => FieldKind::String,
        _ => match scope.aliases.get(base) {
            Some(alias) if hops < MAX_ALIAS_DEPTH => ts_kind(alias, &[], scope, hops + 1),
            _ => FieldKind::Unknown,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceText;
    use pactcheck_core::ArtifactKind;

    fn extract(text: &str) -> Extraction {
        let source = SourceText::new("contracts/types.ts", text);
        let script = Script::parse(&source);
        let mut extraction = Extraction::new(ArtifactKind::Types, "contracts/types.ts");
        extract_types(&script, &mut extraction);
        extraction
    }

    fn types(extraction: &Extraction) -> BTreeMap<String, TypeDef> {
        extraction
            .entities
            .iter()
            .filter_map(|entity| match entity {
                Entity::TypeDef(def) => Some((def.name.clone(), def.clone())),
                _ => None,
            })
            .collect()
    }

    const TYPES: &str = r#"
export type AnalysisStatus = 'pending' | 'processing' | 'done';

/** @table public.cvs */
export interface CV {
  id: string;
  userId: string
  title: string,
  fileSize: number;
  status: AnalysisStatus;
  tags?: string[];
  metadata: Record<string, unknown> | null;
  createdAt: Date;
  onSave(): void;
  [key: string]: unknown;
}

export interface Timestamps {
  created_at: string;
  updated_at: string | null;
}

export interface Profile extends Timestamps {
  id: string;
  full_name: string;
}

export interface ApiResponse<T> {
  data: T;
  error?: {
    code: string;
    message: string;
  };
}

export type CreateCVRequest = Pick<CV, 'title'> & {
  file: File;
};

export type WithId = { id: string } & Timestamps;
"#;

    #[test]
    fn extracts_interfaces_with_kinds_and_nullability() {
        let extraction = extract(TYPES);
        let types = types(&extraction);
        let cv = &types["CV"];
        assert_eq!(cv.table_hint.as_deref(), Some("cvs"));
        let names: Vec<&str> = cv.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["id", "userId", "title", "fileSize", "status", "tags", "metadata", "createdAt"]
        );
        assert_eq!(cv.field("fileSize").map(|f| f.kind), Some(FieldKind::Number));
        assert_eq!(cv.field("status").map(|f| f.kind), Some(FieldKind::String));
        assert_eq!(cv.field("tags").map(|f| (f.kind, f.nullable)), Some((FieldKind::Array, true)));
        let metadata = cv.field("metadata").expect("metadata");
        assert_eq!(metadata.kind, FieldKind::Object);
        assert!(metadata.nullable);
        assert_eq!(cv.field("createdAt").map(|f| f.kind), Some(FieldKind::Timestamp));
        assert!(!cv.field("id").expect("id").nullable);

        let messages: Vec<&str> = extraction
            .warnings
            .iter()
            .map(|warning| warning.message.as_str())
            .collect();
        assert_eq!(messages.len(), 2, "{messages:?}");
        assert!(messages[0].contains("method signature `onSave`"));
        assert!(messages[1].contains("base type `Pick` of `CreateCVRequest`"));
    }

    #[test]
    fn inherits_fields_from_declared_bases() {
        let extraction = extract(TYPES);
        let types = types(&extraction);
        let profile = &types["Profile"];
        let names: Vec<&str> = profile.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["created_at", "updated_at", "id", "full_name"]);
        assert!(profile.field("updated_at").expect("updated_at").nullable);

        let with_id = &types["WithId"];
        let names: Vec<&str> = with_id.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["created_at", "updated_at", "id"]);
    }

    #[test]
    fn records_generics_roles_and_unknown_bases() {
        let extraction = extract(TYPES);
        let types = types(&extraction);
        let wrapper = &types["ApiResponse"];
        assert_eq!(wrapper.generics, vec!["T".to_string()]);
        assert_eq!(wrapper.field("data").map(|f| f.kind), Some(FieldKind::Unknown));
        assert_eq!(wrapper.role, TypeRole::Response);

        let request = &types["CreateCVRequest"];
        assert_eq!(request.role, TypeRole::Request);
        assert_eq!(request.extends, vec!["Pick".to_string()]);
        assert_eq!(request.fields.len(), 1);
        assert!(!types.contains_key("AnalysisStatus"));
    }

    #[test]
    fn maps_unions_and_aliases() {
        let scope = TypeScope {
            objects: BTreeSet::from(["CV".to_string()]),
            aliases: BTreeMap::from([("Id".to_string(), "string".to_string())]),
            enums: BTreeSet::new(),
        };
        assert_eq!(ts_kind("Id", &[], &scope, 0), FieldKind::String);
        assert_eq!(ts_kind("CV | null", &[], &scope, 0), FieldKind::Object);
        assert_eq!(ts_kind("Array<CV>", &[], &scope, 0), FieldKind::Array);
        assert_eq!(ts_kind("true | false", &[], &scope, 0), FieldKind::Boolean);
        assert_eq!(ts_kind("string | number", &[], &scope, 0), FieldKind::Unknown);
        assert_eq!(ts_kind("(id: string) => void", &[], &scope, 0), FieldKind::Unknown);
        assert!(has_null_member("string | null"));
        assert!(!has_null_member("Array<string | null>"));
    }
}
