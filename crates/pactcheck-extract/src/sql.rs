//! Schema extractor for PostgreSQL-flavoured DDL.
//!
//! The file is split into statements after comments are blanked out, each
//! statement is tokenized, and only the contract-relevant statements are
//! interpreted: `CREATE TABLE`, `ALTER TABLE`, `CREATE POLICY` and
//! `CREATE TYPE .. AS ENUM`. Everything else is either skipped silently
//! (indexes, functions, grants, ...) or reported as a parse warning.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

use pactcheck_core::{
    ArtifactKind, BoundKind, BoundOrigin, DeclaredBound, Entity, Extraction, Field, FieldKind,
    FieldRef, ForeignKeyRef, Location, PolicySet, Table, TableAmendment, TableChange,
};
use regex::Regex;

use crate::source::SourceText;

/// Statements that carry no contract information.
const SILENT_STATEMENTS: &[&str] = &[
    "GRANT", "REVOKE", "COMMENT", "INSERT", "UPDATE", "DELETE", "SELECT", "BEGIN", "COMMIT",
    "ROLLBACK", "START", "END", "SET", "DROP", "DO", "TRUNCATE", "ANALYZE", "VACUUM", "NOTIFY",
    "REFRESH", "WITH", "COPY", "SECURITY", "REINDEX", "CALL",
];

const SILENT_CREATE: &[&str] = &[
    "EXTENSION", "INDEX", "UNIQUE", "FUNCTION", "PROCEDURE", "TRIGGER", "SCHEMA", "VIEW",
    "MATERIALIZED", "SEQUENCE", "ROLE", "DOMAIN", "PUBLICATION", "RULE", "AGGREGATE",
    "CONSTRAINT", "EVENT", "OPERATOR", "CAST", "COLLATION", "SERVER",
];

const SILENT_ALTER_ACTIONS: &[&str] = &[
    "OWNER", "SET", "RESET", "REPLICA", "CLUSTER", "VALIDATE", "INHERIT", "NO",
];

const COLUMN_MODIFIERS: &[&str] = &[
    "NOT", "NULL", "PRIMARY", "DEFAULT", "REFERENCES", "UNIQUE", "CHECK", "GENERATED",
    "CONSTRAINT", "COLLATE", "DEFERRABLE", "INITIALLY",
];

const TABLE_CONSTRAINTS: &[&str] = &[
    "CONSTRAINT", "PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "EXCLUDE", "LIKE",
];

/// Extract tables, policies and declared bounds from one DDL file.
pub fn extract_schema(source: &SourceText) -> Extraction {
    let blanked = blank_comments(&source.text);
    let statements: Vec<Vec<SqlToken>> = split_statements(&blanked)
        .into_iter()
        .map(|range| tokenize(&blanked, range))
        .filter(|tokens| !tokens.is_empty())
        .collect();

    let mut parser = SchemaParser {
        ctx: ParseCtx {
            source,
            text: &blanked,
            enums: collect_enum_types(&statements),
            extraction: Extraction::new(ArtifactKind::Schema, source.path.clone()),
        },
        tables: Vec::new(),
    };
    for statement in &statements {
        parser.statement(statement);
    }
    parser.finish()
}

#[derive(Debug, Clone, PartialEq)]
enum SqlKind {
    Word(String),
    /// Double-quoted identifier.
    Quoted(String),
    /// String literal or dollar-quoted body.
    Str(String),
    Number(String),
    Punct(char),
}

#[derive(Debug, Clone, PartialEq)]
struct SqlToken {
    kind: SqlKind,
    start: usize,
    end: usize,
}

impl SqlToken {
    fn keyword(&self) -> Option<String> {
        match &self.kind {
            SqlKind::Word(word) => Some(word.to_ascii_uppercase()),
            _ => None,
        }
    }

    fn is_kw(&self, keyword: &str) -> bool {
        matches!(&self.kind, SqlKind::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    fn is_any_kw(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|keyword| self.is_kw(keyword))
    }

    /// Identifier value; unquoted identifiers fold to lower case.
    fn ident(&self) -> Option<String> {
        match &self.kind {
            SqlKind::Word(word) => Some(word.to_ascii_lowercase()),
            SqlKind::Quoted(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn is_punct(&self, ch: char) -> bool {
        self.kind == SqlKind::Punct(ch)
    }
}

fn kw_at(tokens: &[SqlToken], idx: usize) -> String {
    tokens
        .get(idx)
        .and_then(SqlToken::keyword)
        .unwrap_or_default()
}

struct ParseCtx<'a> {
    source: &'a SourceText,
    text: &'a str,
    enums: BTreeSet<String>,
    extraction: Extraction,
}

/// Column definition before it is attached to its table.
struct ColumnDef {
    field: Field,
    primary_key: bool,
    foreign_key: Option<ForeignKeyRef>,
    bounds: Vec<DeclaredBound>,
}

impl ParseCtx<'_> {
    fn location(&self, token: &SqlToken) -> Location {
        self.source.location(token.start)
    }

    fn span(&self, tokens: &[SqlToken]) -> String {
        match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => self.text[first.start..last.end]
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        }
    }

    fn warn(&mut self, tokens: &[SqlToken], message: impl Into<String>) {
        let Some(first) = tokens.first() else {
            return;
        };
        let location = self.location(first);
        let snippet = self.span(tokens);
        self.extraction.warn_with(location, message, &snippet);
    }

    fn column(&mut self, table: &str, tokens: &[SqlToken]) -> Option<ColumnDef> {
        let Some(name) = tokens.first().and_then(SqlToken::ident) else {
            self.warn(tokens, "column definition without a name");
            return None;
        };
        let location = self.location(&tokens[0]);

        let mut idx = 1;
        let mut depth = 0i32;
        while idx < tokens.len() {
            let token = &tokens[idx];
            if token.is_punct('(') {
                depth += 1;
            } else if token.is_punct(')') {
                depth -= 1;
            } else if depth == 0 && token.is_any_kw(COLUMN_MODIFIERS) {
                break;
            }
            idx += 1;
        }
        let raw_type = self.span(&tokens[1..idx]);
        if raw_type.is_empty() {
            self.warn(tokens, format!("column `{name}` has no type"));
            return None;
        }

        let mut def = ColumnDef {
            field: Field {
                name: name.clone(),
                kind: sql_kind(&raw_type, &self.enums),
                raw_type: raw_type.clone(),
                nullable: true,
                has_default: false,
                location: location.clone(),
            },
            primary_key: false,
            foreign_key: None,
            bounds: Vec::new(),
        };
        if let Some(length) = declared_length(&raw_type) {
            def.bounds.push(DeclaredBound {
                target: FieldRef::new(table, &name),
                kind: BoundKind::MaxLength,
                value: length,
                literal: raw_type.clone(),
                origin: BoundOrigin::ColumnLength,
                location,
            });
        }

        while idx < tokens.len() {
            match kw_at(tokens, idx).as_str() {
                "NOT" if tokens.get(idx + 1).is_some_and(|t| t.is_kw("NULL")) => {
                    def.field.nullable = false;
                    idx += 2;
                }
                "NULL" => {
                    idx += 1;
                }
                "PRIMARY" => {
                    def.primary_key = true;
                    def.field.nullable = false;
                    idx += if tokens.get(idx + 1).is_some_and(|t| t.is_kw("KEY")) {
                        2
                    } else {
                        1
                    };
                }
                "UNIQUE" | "DEFERRABLE" => idx += 1,
                "INITIALLY" | "CONSTRAINT" | "COLLATE" => idx += 2,
                "DEFAULT" => {
                    def.field.has_default = true;
                    idx = skip_expression(tokens, idx + 1);
                }
                "GENERATED" => {
                    def.field.has_default = true;
                    idx += 1;
                    if tokens.get(idx).is_some_and(|t| t.is_kw("BY")) {
                        idx += 2;
                    }
                    idx = skip_expression(tokens, idx);
                }
                "REFERENCES" => {
                    let Some((target, columns, next)) = reference(tokens, idx + 1) else {
                        self.warn(tokens, format!("unparseable REFERENCES clause on `{name}`"));
                        break;
                    };
                    def.foreign_key = Some(ForeignKeyRef {
                        columns: vec![name.clone()],
                        table: target,
                        referenced_columns: columns,
                        location: self.location(&tokens[idx]),
                    });
                    idx = next;
                }
                "CHECK" => {
                    let Some(close) = paren_close(tokens, idx + 1) else {
                        self.warn(tokens, format!("unparseable CHECK on `{name}`"));
                        break;
                    };
                    let expression = self.span(&tokens[idx + 2..close]);
                    let location = self.location(&tokens[idx]);
                    def.bounds
                        .extend(check_bounds(table, &expression, &location));
                    idx = close + 1;
                }
                other => {
                    self.warn(
                        &tokens[idx..],
                        format!("unsupported column modifier `{other}` on `{name}`"),
                    );
                    break;
                }
            }
        }
        Some(def)
    }

    fn table_constraint(&mut self, table: &mut Table, tokens: &[SqlToken]) {
        let mut idx = 0;
        if tokens.first().is_some_and(|t| t.is_kw("CONSTRAINT")) {
            idx = 2;
        }
        match kw_at(tokens, idx).as_str() {
            "PRIMARY" => match ident_list(tokens, idx + 2) {
                Some((columns, _)) => {
                    for field in &mut table.fields {
                        if columns.contains(&field.name) {
                            field.nullable = false;
                        }
                    }
                    table.primary_key = columns;
                }
                None => self.warn(tokens, "unparseable PRIMARY KEY constraint"),
            },
            "FOREIGN" => {
                let parsed = ident_list(tokens, idx + 2).and_then(|(columns, next)| {
                    if !tokens.get(next)?.is_kw("REFERENCES") {
                        return None;
                    }
                    let (target, referenced, _) = reference(tokens, next + 1)?;
                    Some((columns, target, referenced))
                });
                match parsed {
                    Some((columns, target, referenced_columns)) => {
                        table.foreign_keys.push(ForeignKeyRef {
                            columns,
                            table: target,
                            referenced_columns,
                            location: self.location(&tokens[0]),
                        });
                    }
                    None => self.warn(tokens, "unparseable FOREIGN KEY constraint"),
                }
            }
            "UNIQUE" => {}
            "CHECK" => match paren_close(tokens, idx + 1) {
                Some(close) => {
                    let expression = self.span(&tokens[idx + 2..close]);
                    let location = self.location(&tokens[idx]);
                    let bounds = check_bounds(&table.name, &expression, &location);
                    self.accept_bounds(table, bounds, tokens);
                }
                None => self.warn(tokens, "unparseable CHECK constraint"),
            },
            other => self.warn(tokens, format!("unsupported table constraint `{other}`")),
        }
    }

    /// Keep bounds whose column exists on the table.
    fn accept_bounds(&mut self, table: &Table, bounds: Vec<DeclaredBound>, tokens: &[SqlToken]) {
        for bound in bounds {
            if table.field(&bound.target.field).is_some() {
                self.extraction.bounds.push(bound);
            } else {
                self.warn(
                    tokens,
                    format!(
                        "CHECK constraint references unknown column `{}`",
                        bound.target.field
                    ),
                );
            }
        }
    }

    fn add_column(&mut self, table: &mut Table, tokens: &[SqlToken]) {
        let Some(def) = self.column(&table.name, tokens) else {
            return;
        };
        if def.primary_key {
            table.primary_key = vec![def.field.name.clone()];
        }
        if let Some(foreign_key) = def.foreign_key {
            table.foreign_keys.push(foreign_key);
        }
        table.fields.push(def.field);
        self.accept_bounds(table, def.bounds, tokens);
    }
}

struct SchemaParser<'a> {
    ctx: ParseCtx<'a>,
    tables: Vec<Table>,
}

impl SchemaParser<'_> {
    fn finish(self) -> Extraction {
        let SchemaParser { ctx, tables } = self;
        let mut extraction = ctx.extraction;
        extraction
            .entities
            .extend(tables.into_iter().map(Entity::Table));
        extraction
    }

    fn table_index(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|table| table.name == name)
    }

    fn statement(&mut self, tokens: &[SqlToken]) {
        match kw_at(tokens, 0).as_str() {
            "CREATE" => {
                let mut idx = 1;
                if tokens.get(idx).is_some_and(|t| t.is_kw("OR")) {
                    idx += 2;
                }
                while tokens
                    .get(idx)
                    .is_some_and(|t| t.is_any_kw(&["TEMP", "TEMPORARY", "UNLOGGED", "GLOBAL", "LOCAL"]))
                {
                    idx += 1;
                }
                match kw_at(tokens, idx).as_str() {
                    "TABLE" => self.create_table(tokens, idx + 1),
                    "POLICY" => self.create_policy(tokens, idx + 1),
                    "TYPE" => {}
                    other if SILENT_CREATE.contains(&other) => {}
                    other => self
                        .ctx
                        .warn(tokens, format!("unrecognized statement `CREATE {other}`")),
                }
            }
            "ALTER" => {
                if tokens.get(1).is_some_and(|t| t.is_kw("TABLE")) {
                    self.alter_table(tokens, 2);
                }
            }
            other if SILENT_STATEMENTS.contains(&other) => {}
            _ => self.ctx.warn(tokens, "unrecognized statement"),
        }
    }

    fn create_table(&mut self, tokens: &[SqlToken], mut idx: usize) {
        if tokens.get(idx).is_some_and(|t| t.is_kw("IF")) {
            idx += 3;
        }
        let Some((schema, name, next)) = qualified_name(tokens, idx) else {
            self.ctx.warn(tokens, "CREATE TABLE without a table name");
            return;
        };
        let Some(close) = paren_close(tokens, next) else {
            self.ctx
                .warn(tokens, format!("unsupported CREATE TABLE form for `{name}`"));
            return;
        };

        let mut table = Table {
            name: name.clone(),
            schema,
            fields: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            policies: PolicySet::default(),
            rls_enabled: false,
            location: self.ctx.location(&tokens[idx]),
        };

        let items = split_commas(tokens, next + 1, close);
        let mut pending_bounds = Vec::new();
        let mut constraints = Vec::new();
        for item in items {
            let item_tokens = &tokens[item];
            if item_tokens
                .first()
                .is_some_and(|t| t.is_any_kw(TABLE_CONSTRAINTS))
            {
                constraints.push(item_tokens);
                continue;
            }
            let Some(def) = self.ctx.column(&name, item_tokens) else {
                continue;
            };
            if def.primary_key {
                table.primary_key.push(def.field.name.clone());
            }
            if let Some(foreign_key) = def.foreign_key {
                table.foreign_keys.push(foreign_key);
            }
            table.fields.push(def.field);
            pending_bounds.push((def.bounds, item_tokens));
        }
        for (bounds, item_tokens) in pending_bounds {
            self.ctx.accept_bounds(&table, bounds, item_tokens);
        }
        for constraint in constraints {
            self.ctx.table_constraint(&mut table, constraint);
        }

        if tokens.len() > close + 1 {
            let trailing = kw_at(tokens, close + 1);
            if !matches!(trailing.as_str(), "WITH" | "TABLESPACE" | "INHERITS" | "PARTITION") {
                self.ctx.warn(
                    &tokens[close + 1..],
                    format!("unexpected text after CREATE TABLE `{name}`"),
                );
            }
        }
        self.tables.push(table);
    }

    fn alter_table(&mut self, tokens: &[SqlToken], mut idx: usize) {
        if tokens.get(idx).is_some_and(|t| t.is_kw("IF")) {
            idx += 2;
        }
        if tokens.get(idx).is_some_and(|t| t.is_kw("ONLY")) {
            idx += 1;
        }
        let Some((_, name, next)) = qualified_name(tokens, idx) else {
            self.ctx.warn(tokens, "ALTER TABLE without a table name");
            return;
        };
        let Some(table_idx) = self.table_index(&name) else {
            self.defer_alter(tokens, &name, next);
            return;
        };

        for action in split_commas(tokens, next, tokens.len()) {
            let action = &tokens[action];
            let table = &mut self.tables[table_idx];
            match kw_at(action, 0).as_str() {
                "ENABLE" | "FORCE" if action.get(1).is_some_and(|t| t.is_kw("ROW")) => {
                    table.rls_enabled = true;
                }
                "DISABLE" if action.get(1).is_some_and(|t| t.is_kw("ROW")) => {
                    table.rls_enabled = false;
                }
                "ENABLE" | "DISABLE" => {}
                "ADD" => {
                    let rest = &action[1..];
                    if rest.first().is_some_and(|t| t.is_any_kw(TABLE_CONSTRAINTS)) {
                        self.ctx.table_constraint(table, rest);
                    } else {
                        let mut skip = 0;
                        if rest.first().is_some_and(|t| t.is_kw("COLUMN")) {
                            skip += 1;
                        }
                        if rest.get(skip).is_some_and(|t| t.is_kw("IF")) {
                            skip += 3;
                        }
                        self.ctx.add_column(table, &rest[skip.min(rest.len())..]);
                    }
                }
                "ALTER" => self.alter_column(table_idx, action),
                "DROP" => {
                    let mut skip = 1;
                    if action.get(skip).is_some_and(|t| t.is_kw("COLUMN")) {
                        skip += 1;
                    }
                    if action.get(skip).is_some_and(|t| t.is_kw("IF")) {
                        skip += 2;
                    }
                    if action.get(1).is_some_and(|t| t.is_kw("CONSTRAINT")) {
                        continue;
                    }
                    if let Some(column) = action.get(skip).and_then(SqlToken::ident) {
                        table.fields.retain(|field| field.name != column);
                    }
                }
                other if SILENT_ALTER_ACTIONS.contains(&other) => {}
                other => self
                    .ctx
                    .warn(action, format!("unsupported ALTER TABLE action `{other}`")),
            }
        }
    }

    /// Row-security toggles on a table from another file wait for the merge.
    /// Structural changes to such a table are not tracked.
    fn defer_alter(&mut self, tokens: &[SqlToken], name: &str, next: usize) {
        let mut untracked = false;
        for action in split_commas(tokens, next, tokens.len()) {
            let action = &tokens[action];
            let enabled = match kw_at(action, 0).as_str() {
                "ENABLE" | "FORCE" if action.get(1).is_some_and(|t| t.is_kw("ROW")) => true,
                "DISABLE" if action.get(1).is_some_and(|t| t.is_kw("ROW")) => false,
                other if SILENT_ALTER_ACTIONS.contains(&other) => continue,
                _ => {
                    untracked = true;
                    continue;
                }
            };
            let location = self.ctx.location(&action[0]);
            self.ctx.extraction.amendments.push(TableAmendment {
                table: name.to_string(),
                change: TableChange::RowSecurity { enabled },
                location,
            });
        }
        if untracked {
            self.ctx
                .warn(tokens, format!("ALTER TABLE references unknown table `{name}`"));
        }
    }

    fn alter_column(&mut self, table_idx: usize, action: &[SqlToken]) {
        let mut idx = 1;
        if action.get(idx).is_some_and(|t| t.is_kw("COLUMN")) {
            idx += 1;
        }
        let Some(column) = action.get(idx).and_then(SqlToken::ident) else {
            self.ctx.warn(action, "ALTER COLUMN without a column name");
            return;
        };
        let change = (kw_at(action, idx + 1), kw_at(action, idx + 2));
        let table = &mut self.tables[table_idx];
        let Some(field) = table.fields.iter_mut().find(|field| field.name == column) else {
            self.ctx
                .warn(action, format!("ALTER COLUMN references unknown column `{column}`"));
            return;
        };
        match (change.0.as_str(), change.1.as_str()) {
            ("SET", "NOT") => field.nullable = false,
            ("DROP", "NOT") => field.nullable = true,
            ("SET", "DEFAULT") => field.has_default = true,
            ("DROP", "DEFAULT") => field.has_default = false,
            _ => {}
        }
    }

    fn create_policy(&mut self, tokens: &[SqlToken], idx: usize) {
        let policy = tokens
            .get(idx)
            .and_then(SqlToken::ident)
            .unwrap_or_default();
        let on = tokens
            .iter()
            .enumerate()
            .skip(idx + 1)
            .find(|(_, token)| token.is_kw("ON"))
            .map(|(pos, _)| pos);
        let Some((_, name, next)) = on.and_then(|on| qualified_name(tokens, on + 1)) else {
            self.ctx
                .warn(tokens, format!("policy `{policy}` without a target table"));
            return;
        };
        let mut depth = 0i32;
        let mut verb = None;
        for (pos, token) in tokens.iter().enumerate().skip(next) {
            if token.is_punct('(') {
                depth += 1;
            } else if token.is_punct(')') {
                depth -= 1;
            } else if depth == 0 && token.is_kw("FOR") {
                verb = Some(kw_at(tokens, pos + 1));
                break;
            }
        }

        match self.table_index(&name) {
            Some(table_idx) => self.tables[table_idx].policies.record(verb.as_deref()),
            None => {
                let location = self.ctx.location(&tokens[0]);
                self.ctx.extraction.amendments.push(TableAmendment {
                    table: name,
                    change: TableChange::Policy { name: policy, verb },
                    location,
                });
            }
        }
    }
}

fn collect_enum_types(statements: &[Vec<SqlToken>]) -> BTreeSet<String> {
    statements
        .iter()
        .filter(|tokens| {
            tokens.first().is_some_and(|t| t.is_kw("CREATE"))
                && tokens.get(1).is_some_and(|t| t.is_kw("TYPE"))
        })
        .filter_map(|tokens| {
            let (_, name, next) = qualified_name(tokens, 2)?;
            let is_enum = tokens.get(next)?.is_kw("AS") && tokens.get(next + 1)?.is_kw("ENUM");
            is_enum.then_some(name)
        })
        .collect()
}

/// Map a SQL column type to its semantic kind.
fn sql_kind(raw_type: &str, enums: &BTreeSet<String>) -> FieldKind {
    let lower = raw_type.trim().to_ascii_lowercase();
    if lower.ends_with("[]") || lower.starts_with("array") || lower.ends_with(" array") {
        return FieldKind::Array;
    }
    let base = lower.split('(').next().unwrap_or_default().trim();
    let name = base.rsplit('.').next().unwrap_or(base).trim_matches('"');
    let first = name.split_whitespace().next().unwrap_or_default();
    match first {
        "uuid" => FieldKind::Uuid,
        "text" | "varchar" | "char" | "character" | "citext" | "bpchar" | "name" | "inet"
        | "cidr" => FieldKind::String,
        "smallint" | "integer" | "int" | "int2" | "int4" | "int8" | "bigint" | "serial"
        | "serial4" | "serial8" | "bigserial" | "smallserial" | "numeric" | "decimal" | "real"
        | "double" | "float" | "float4" | "float8" | "money" => FieldKind::Number,
        "boolean" | "bool" => FieldKind::Boolean,
        "timestamp" | "timestamptz" | "date" | "time" | "timetz" => FieldKind::Timestamp,
        "json" | "jsonb" => FieldKind::Object,
        _ if enums.contains(name) => FieldKind::String,
        _ => FieldKind::Unknown,
    }
}

static LENGTH_TYPE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:varchar|character\s+varying|char|character|bpchar)\s*\(\s*(\d+)\s*\)\s*$",
    )
    .ok()
});

static AND: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)\s+and\s+").ok());

static BETWEEN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\w+)\s+between\s+([^\s]+)\s+and\s+([^\s]+)\s*$").ok()
});

static COMPARISON: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(\w+)\s*(=|>=|<=|>|<)\s*([^\s]+)\s*$").ok());

static LENGTH_COMPARISON: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:char_length|character_length|length)\s*\(\s*(\w+)\s*\)\s*(>=|<=|>|<)\s*([^\s]+)\s*$",
    )
    .ok()
});

fn declared_length(raw_type: &str) -> Option<f64> {
    let caps = LENGTH_TYPE.as_ref()?.captures(raw_type)?;
    caps[1].parse().ok()
}

/// Bounds implied by a CHECK expression. Unsupported shapes yield nothing.
fn check_bounds(table: &str, expression: &str, location: &Location) -> Vec<DeclaredBound> {
    let expr = normalize_expression(expression);
    let parts = split_and(&expr).unwrap_or_else(|| vec![expr.clone()]);
    let mut found = Vec::new();
    for part in parts {
        let part = normalize_expression(&part);
        if let Some((column, min, max)) = parse_between(&part) {
            found.push((column.clone(), BoundKind::Min, min));
            found.push((column, BoundKind::Max, max));
        } else if let Some((column, op, value)) = parse_length_comparison(&part) {
            let kind = if op.starts_with('<') {
                BoundKind::MaxLength
            } else {
                BoundKind::MinLength
            };
            found.push((column, kind, value));
        } else if let Some((column, op, value)) = parse_comparison(&part) {
            let kind = match op.as_str() {
                "<=" | "<" => BoundKind::Max,
                ">=" | ">" => BoundKind::Min,
                _ => continue,
            };
            found.push((column, kind, value));
        }
    }

    found
        .into_iter()
        .filter_map(|(column, kind, literal)| {
            let value = literal.parse::<f64>().ok()?;
            Some(DeclaredBound {
                target: FieldRef::new(table, column),
                kind,
                value,
                literal,
                origin: BoundOrigin::SchemaCheck,
                location: location.clone(),
            })
        })
        .collect()
}

fn normalize_expression(expression: &str) -> String {
    let mut expr = expression.trim().to_string();
    if expr.to_uppercase().starts_with("CHECK") {
        expr = expr[5..].trim().to_string();
    }
    while expr.starts_with('(') && expr.ends_with(')') && outer_parens_match(&expr) {
        expr = expr[1..expr.len() - 1].trim().to_string();
    }
    expr
}

fn outer_parens_match(expr: &str) -> bool {
    let mut depth = 0i32;
    for (idx, ch) in expr.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && idx + 1 < expr.len() {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn split_and(expr: &str) -> Option<Vec<String>> {
    if expr.to_lowercase().contains(" between ") {
        return None;
    }
    let parts = AND
        .as_ref()?
        .split(expr)
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    if parts.len() > 1 { Some(parts) } else { None }
}

fn parse_between(expr: &str) -> Option<(String, String, String)> {
    let caps = BETWEEN.as_ref()?.captures(expr)?;
    Some((
        caps[1].to_lowercase(),
        caps[2].to_string(),
        caps[3].to_string(),
    ))
}

fn parse_comparison(expr: &str) -> Option<(String, String, String)> {
    let caps = COMPARISON.as_ref()?.captures(expr)?;
    Some((
        caps[1].to_lowercase(),
        caps[2].to_string(),
        caps[3].to_string(),
    ))
}

fn parse_length_comparison(expr: &str) -> Option<(String, String, String)> {
    let caps = LENGTH_COMPARISON.as_ref()?.captures(expr)?;
    Some((
        caps[1].to_lowercase(),
        caps[2].to_string(),
        caps[3].to_string(),
    ))
}

/// `[schema.]name` starting at `idx`.
fn qualified_name(tokens: &[SqlToken], idx: usize) -> Option<(Option<String>, String, usize)> {
    let first = tokens.get(idx)?.ident()?;
    if tokens.get(idx + 1).is_some_and(|t| t.is_punct('.')) {
        let second = tokens.get(idx + 2)?.ident()?;
        Some((Some(first), second, idx + 3))
    } else {
        Some((None, first, idx + 1))
    }
}

/// `table [(columns)] [ON DELETE|UPDATE action]...` after REFERENCES.
fn reference(tokens: &[SqlToken], idx: usize) -> Option<(String, Vec<String>, usize)> {
    let (schema, name, mut next) = qualified_name(tokens, idx)?;
    let target = match schema {
        Some(schema) => format!("{schema}.{name}"),
        None => name,
    };
    let mut columns = Vec::new();
    if tokens.get(next).is_some_and(|t| t.is_punct('(')) {
        let (list, after) = ident_list(tokens, next)?;
        columns = list;
        next = after;
    }
    loop {
        match kw_at(tokens, next).as_str() {
            "ON" => {
                next += 2;
                next += match (kw_at(tokens, next).as_str(), kw_at(tokens, next + 1).as_str()) {
                    ("SET", _) | ("NO", "ACTION") => 2,
                    _ => 1,
                };
            }
            "MATCH" => next += 2,
            _ => return Some((target, columns, next)),
        }
    }
}

/// Identifiers inside the parenthesis group opened at `open`.
fn ident_list(tokens: &[SqlToken], open: usize) -> Option<(Vec<String>, usize)> {
    let close = paren_close(tokens, open)?;
    let names = tokens[open + 1..close]
        .iter()
        .filter(|token| !token.is_punct(','))
        .map(SqlToken::ident)
        .collect::<Option<Vec<_>>>()?;
    Some((names, close + 1))
}

fn paren_close(tokens: &[SqlToken], open: usize) -> Option<usize> {
    if !tokens.get(open)?.is_punct('(') {
        return None;
    }
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// Advance past a default/generation expression up to the next modifier.
fn skip_expression(tokens: &[SqlToken], mut idx: usize) -> usize {
    let mut depth = 0i32;
    while idx < tokens.len() {
        let token = &tokens[idx];
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth -= 1;
        } else if depth == 0 && token.is_any_kw(COLUMN_MODIFIERS) {
            break;
        }
        idx += 1;
    }
    idx
}

/// Token ranges between depth-zero commas in `start..end`.
fn split_commas(tokens: &[SqlToken], start: usize, end: usize) -> Vec<Range<usize>> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut item_start = start;
    for idx in start..end.min(tokens.len()) {
        let token = &tokens[idx];
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth -= 1;
        } else if depth == 0 && token.is_punct(',') {
            if idx > item_start {
                items.push(item_start..idx);
            }
            item_start = idx + 1;
        }
    }
    if end.min(tokens.len()) > item_start {
        items.push(item_start..end.min(tokens.len()));
    }
    items
}

/// Replace comments with spaces, keeping offsets and newlines intact.
fn blank_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\'' | b'"' => idx = skip_quoted(bytes, idx),
            b'$' => match dollar_tag(bytes, idx) {
                Some(len) => idx = skip_dollar(text, idx, len),
                None => idx += 1,
            },
            b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    out[idx] = b' ';
                    idx += 1;
                }
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                let mut depth = 0usize;
                while idx < bytes.len() {
                    if bytes[idx] == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                        depth += 1;
                        out[idx] = b' ';
                        out[idx + 1] = b' ';
                        idx += 2;
                        continue;
                    }
                    if bytes[idx] == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                        depth -= 1;
                        out[idx] = b' ';
                        out[idx + 1] = b' ';
                        idx += 2;
                        if depth == 0 {
                            break;
                        }
                        continue;
                    }
                    if bytes[idx] != b'\n' {
                        out[idx] = b' ';
                    }
                    idx += 1;
                }
            }
            _ => idx += 1,
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Byte ranges of `;`-terminated statements.
fn split_statements(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut statements = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\'' | b'"' => {
                idx = skip_quoted(bytes, idx);
                continue;
            }
            b'$' => {
                if let Some(len) = dollar_tag(bytes, idx) {
                    idx = skip_dollar(text, idx, len);
                    continue;
                }
            }
            b'(' => depth += 1,
            b')' => depth -= 1,
            b';' if depth <= 0 => {
                statements.push(start..idx);
                start = idx + 1;
                depth = 0;
            }
            _ => {}
        }
        idx += 1;
    }
    if start < bytes.len() {
        statements.push(start..bytes.len());
    }
    statements
}

fn skip_quoted(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    bytes[open + 1..]
        .iter()
        .position(|byte| *byte == quote)
        .map(|rel| open + 1 + rel + 1)
        .unwrap_or(bytes.len())
}

/// Length of a `$tag$` opener at `idx`, if any.
fn dollar_tag(bytes: &[u8], idx: usize) -> Option<usize> {
    if bytes.get(idx) != Some(&b'$') {
        return None;
    }
    let mut end = idx + 1;
    if bytes.get(end).is_some_and(|byte| byte.is_ascii_digit()) {
        return None;
    }
    while bytes
        .get(end)
        .is_some_and(|byte| byte.is_ascii_alphanumeric() || *byte == b'_')
    {
        end += 1;
    }
    (bytes.get(end) == Some(&b'$')).then_some(end - idx + 1)
}

fn skip_dollar(text: &str, open: usize, tag_len: usize) -> usize {
    let tag = &text[open..open + tag_len];
    let body = open + tag_len;
    text[body..]
        .find(tag)
        .map(|rel| body + rel + tag_len)
        .unwrap_or(text.len())
}

fn tokenize(text: &str, range: Range<usize>) -> Vec<SqlToken> {
    let bytes = text.as_bytes();
    let end = range.end;
    let mut tokens = Vec::new();
    let mut pos = range.start;
    let is_word = |byte: u8| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$' || byte >= 0x80;

    while pos < end {
        let byte = bytes[pos];
        if byte.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;
        let kind = if byte.is_ascii_alphabetic() || byte == b'_' || byte >= 0x80 {
            while pos < end && is_word(bytes[pos]) {
                pos += 1;
            }
            SqlKind::Word(text[start..pos].to_string())
        } else if byte.is_ascii_digit() {
            while pos < end && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                pos += 1;
            }
            SqlKind::Number(text[start..pos].to_string())
        } else if byte == b'\'' || byte == b'"' {
            let (value, next) = quoted(text, pos, end);
            pos = next;
            if byte == b'"' {
                SqlKind::Quoted(value)
            } else {
                SqlKind::Str(value)
            }
        } else if let Some(tag_len) = dollar_tag(bytes, pos) {
            let body = (pos + tag_len).min(end);
            let tag = &text[pos..body];
            let (body_end, next) = match text[body..end].find(tag) {
                Some(rel) => (body + rel, body + rel + tag.len()),
                None => (end, end),
            };
            pos = next;
            SqlKind::Str(text[body..body_end].to_string())
        } else {
            pos += 1;
            SqlKind::Punct(byte as char)
        };
        tokens.push(SqlToken {
            kind,
            start,
            end: pos,
        });
    }
    tokens
}

/// Quoted literal starting at `open`; a doubled quote is an escaped quote.
fn quoted(text: &str, open: usize, end: usize) -> (String, usize) {
    let bytes = text.as_bytes();
    let quote = bytes[open];
    let mut value = String::new();
    let mut chunk = open + 1;
    let mut idx = open + 1;
    while idx < end {
        if bytes[idx] == quote {
            if idx + 1 < end && bytes[idx + 1] == quote {
                value.push_str(&text[chunk..=idx]);
                idx += 2;
                chunk = idx;
                continue;
            }
            value.push_str(&text[chunk..idx]);
            return (value, idx + 1);
        }
        idx += 1;
    }
    value.push_str(&text[chunk..end]);
    (value, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(extraction: &Extraction) -> Vec<&Table> {
        extraction
            .entities
            .iter()
            .filter_map(|entity| match entity {
                Entity::Table(table) => Some(table),
                _ => None,
            })
            .collect()
    }

    const CVS: &str = r#"
-- Users are managed by auth.users
CREATE EXTENSION IF NOT EXISTS "uuid-ossp";
CREATE TYPE analysis_status AS ENUM ('pending', 'done');

CREATE TABLE public.cvs (
  id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
  user_id UUID NOT NULL REFERENCES auth.users(id) ON DELETE SET NULL,
  title VARCHAR(200) NOT NULL,
  file_size INTEGER CHECK (file_size <= 10485760),
  status analysis_status DEFAULT '--not-a-comment',
  tags TEXT[],
  metadata JSONB, /* free-form; may hold ; */
  created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

ALTER TABLE public.cvs ENABLE ROW LEVEL SECURITY;
CREATE POLICY "Users can view own CVs" ON public.cvs FOR SELECT USING (auth.uid() = user_id);
CREATE INDEX idx_cvs_user ON public.cvs(user_id);
CREATE OR REPLACE FUNCTION touch() RETURNS trigger AS $$
BEGIN NEW.updated_at = NOW(); RETURN NEW; END;
$$ LANGUAGE plpgsql;
"#;

    #[test]
    fn extracts_columns_keys_and_policies() {
        let extraction = extract_schema(&SourceText::new("contracts/database.sql", CVS));
        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
        let tables = tables(&extraction);
        assert_eq!(tables.len(), 1);
        let cvs = tables[0];
        assert_eq!(cvs.name, "cvs");
        assert_eq!(cvs.schema.as_deref(), Some("public"));
        assert_eq!(cvs.fields.len(), 8);
        assert_eq!(cvs.primary_key, vec!["id".to_string()]);
        assert_eq!(cvs.location.line, 6);

        let id = cvs.field("id").expect("id");
        assert!(!id.nullable);
        assert!(id.has_default);
        let user_id = cvs.field("user_id").expect("user_id");
        assert_eq!(user_id.kind, FieldKind::Uuid);
        assert!(!user_id.nullable);
        assert_eq!(cvs.field("status").map(|f| f.kind), Some(FieldKind::String));
        assert_eq!(cvs.field("tags").map(|f| f.kind), Some(FieldKind::Array));
        assert_eq!(cvs.field("metadata").map(|f| f.kind), Some(FieldKind::Object));
        assert_eq!(
            cvs.field("created_at").map(|f| f.kind),
            Some(FieldKind::Timestamp)
        );

        assert_eq!(cvs.foreign_keys.len(), 1);
        assert!(cvs.foreign_keys[0].targets("auth.users"));
        assert!(cvs.rls_enabled);
        assert!(cvs.policies.select);
        assert!(!cvs.policies.insert);
    }

    #[test]
    fn records_length_and_check_bounds() {
        let extraction = extract_schema(&SourceText::new("database.sql", CVS));
        let mut bounds: Vec<(String, BoundKind, f64)> = extraction
            .bounds
            .iter()
            .map(|bound| (bound.target.to_string(), bound.kind, bound.value))
            .collect();
        bounds.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            bounds,
            vec![
                ("cvs.file_size".to_string(), BoundKind::Max, 10485760.0),
                ("cvs.title".to_string(), BoundKind::MaxLength, 200.0),
            ]
        );
    }

    #[test]
    fn table_constraints_and_alter_statements_apply_to_earlier_tables() {
        let sql = "
CREATE TABLE interview_questions (
  id BIGINT,
  session_id UUID,
  score NUMERIC,
  PRIMARY KEY (id),
  CONSTRAINT fk_session FOREIGN KEY (session_id) REFERENCES interview_sessions (id),
  CHECK (score BETWEEN 0 AND 10)
);
ALTER TABLE interview_questions ADD COLUMN prompt TEXT NOT NULL;
ALTER TABLE interview_questions ADD CONSTRAINT prompt_len CHECK (char_length(prompt) <= 500);
CREATE POLICY manage ON interview_questions;
";
        let extraction = extract_schema(&SourceText::new("database.sql", sql));
        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
        let table = tables(&extraction)[0];
        assert_eq!(table.primary_key, vec!["id".to_string()]);
        assert!(!table.field("id").expect("id").nullable);
        assert!(table.foreign_keys[0].targets("interview_sessions"));
        assert_eq!(table.field("prompt").map(|f| f.nullable), Some(false));
        assert!(table.policies.missing_verbs().is_empty());

        let kinds: Vec<BoundKind> = extraction.bounds.iter().map(|bound| bound.kind).collect();
        assert_eq!(kinds, vec![BoundKind::Min, BoundKind::Max, BoundKind::MaxLength]);
        assert_eq!(extraction.bounds[1].literal, "10");
    }

    #[test]
    fn unsupported_constructs_warn_and_continue() {
        let sql = "
CREATE TABLE a (id INT, EXCLUDE USING gist (id WITH =));
FROBNICATE everything;
CREATE POLICY orphan ON missing FOR SELECT;
CREATE TABLE b (id INT PRIMARY KEY);
";
        let extraction = extract_schema(&SourceText::new("database.sql", sql));
        assert_eq!(tables(&extraction).len(), 2);
        let messages: Vec<&str> = extraction
            .warnings
            .iter()
            .map(|warning| warning.message.as_str())
            .collect();
        assert_eq!(messages.len(), 2, "{messages:?}");
        assert!(messages[0].contains("unsupported table constraint `EXCLUDE`"));
        assert_eq!(messages[1], "unrecognized statement");
        assert_eq!(extraction.warnings[1].location.line, 3);
        assert_eq!(extraction.amendments.len(), 1);
        assert_eq!(extraction.amendments[0].table, "missing");
    }

    #[test]
    fn statements_on_tables_from_other_files_become_amendments() {
        let sql = "
ALTER TABLE public.cvs ENABLE ROW LEVEL SECURITY;
CREATE POLICY cvs_all ON cvs FOR ALL USING (auth.uid() = user_id);
ALTER TABLE cvs OWNER TO postgres;
ALTER TABLE cvs ADD COLUMN notes TEXT;
";
        let extraction = extract_schema(&SourceText::new("002_rls.sql", sql));
        assert!(tables(&extraction).is_empty());
        assert_eq!(
            extraction.amendments,
            vec![
                TableAmendment {
                    table: "cvs".to_string(),
                    change: TableChange::RowSecurity { enabled: true },
                    location: Location::new("002_rls.sql", 2, 24),
                },
                TableAmendment {
                    table: "cvs".to_string(),
                    change: TableChange::Policy {
                        name: "cvs_all".to_string(),
                        verb: Some("ALL".to_string()),
                    },
                    location: Location::new("002_rls.sql", 3, 1),
                },
            ]
        );
        assert_eq!(extraction.warnings.len(), 1, "{:?}", extraction.warnings);
        assert!(
            extraction.warnings[0]
                .message
                .contains("ALTER TABLE references unknown table `cvs`")
        );
    }

    #[test]
    fn maps_sql_types_to_kinds() {
        let enums = BTreeSet::new();
        assert_eq!(sql_kind("BIGINT", &enums), FieldKind::Number);
        assert_eq!(sql_kind("double precision", &enums), FieldKind::Number);
        assert_eq!(sql_kind("TIMESTAMP WITH TIME ZONE", &enums), FieldKind::Timestamp);
        assert_eq!(sql_kind("character varying(40)", &enums), FieldKind::String);
        assert_eq!(sql_kind("BOOLEAN", &enums), FieldKind::Boolean);
        assert_eq!(sql_kind("tsvector", &enums), FieldKind::Unknown);
        assert_eq!(declared_length("character varying(40)"), Some(40.0));
    }
}
