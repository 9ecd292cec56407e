use std::fmt;

use serde::{Deserialize, Serialize};

use crate::location::Location;

/// Semantic kind shared by SQL columns and declared type fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Uuid,
    Timestamp,
    Object,
    Array,
    Unknown,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Uuid => "uuid",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
            FieldKind::Unknown => "unknown",
        }
    }

    /// Whether a declared type field of kind `field` can carry a column of
    /// kind `self`.
    ///
    /// Uuid and timestamp columns travel as strings; unknown on either side
    /// is accepted.
    pub fn accepts(&self, field: FieldKind) -> bool {
        if *self == FieldKind::Unknown || field == FieldKind::Unknown {
            return true;
        }
        match self {
            FieldKind::Uuid => matches!(field, FieldKind::String | FieldKind::Uuid),
            FieldKind::Timestamp => matches!(field, FieldKind::String | FieldKind::Timestamp),
            other => *other == field,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column of a table or a member of a declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    /// Type text as written in the artifact.
    pub raw_type: String,
    pub nullable: bool,
    pub has_default: bool,
    pub location: Location,
}

/// Foreign key reference from one or more columns to another table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub columns: Vec<String>,
    /// Referenced table as written, possibly schema-qualified (`auth.users`).
    pub table: String,
    pub referenced_columns: Vec<String>,
    pub location: Location,
}

impl ForeignKeyRef {
    /// Referenced table without its schema qualifier.
    pub fn target_name(&self) -> &str {
        self.table
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.table)
    }

    /// Whether this reference points at `table`, which may itself be
    /// qualified (`auth.users`) or bare (`users`).
    pub fn targets(&self, table: &str) -> bool {
        if table.contains('.') {
            self.table.eq_ignore_ascii_case(table)
        } else {
            self.target_name().eq_ignore_ascii_case(table)
        }
    }
}

/// Row-level security policies declared for a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySet {
    pub select: bool,
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
    /// A policy exists but its verb could not be determined.
    pub unspecified: bool,
}

impl PolicySet {
    pub const VERBS: [&'static str; 4] = ["select", "insert", "update", "delete"];

    pub fn is_empty(&self) -> bool {
        !(self.select || self.insert || self.update || self.delete || self.unspecified)
    }

    /// Verb-level detail is only meaningful when every policy had a known verb.
    pub fn is_granular(&self) -> bool {
        !self.unspecified
    }

    pub fn grant(&mut self, verb: &str) -> bool {
        match verb.to_ascii_lowercase().as_str() {
            "select" => self.select = true,
            "insert" => self.insert = true,
            "update" => self.update = true,
            "delete" => self.delete = true,
            "all" => {
                self.select = true;
                self.insert = true;
                self.update = true;
                self.delete = true;
            }
            _ => return false,
        }
        true
    }

    /// Record one policy. `None` is a policy without a `FOR` clause, which
    /// covers every verb.
    pub fn record(&mut self, verb: Option<&str>) {
        match verb {
            None => {
                self.grant("all");
            }
            Some(verb) => {
                if !self.grant(verb) {
                    self.unspecified = true;
                }
            }
        }
    }

    pub fn has(&self, verb: &str) -> bool {
        match verb {
            "select" => self.select,
            "insert" => self.insert,
            "update" => self.update,
            "delete" => self.delete,
            _ => false,
        }
    }

    pub fn missing_verbs(&self) -> Vec<&'static str> {
        Self::VERBS
            .iter()
            .copied()
            .filter(|verb| !self.has(verb))
            .collect()
    }
}

/// A table declared in the relational schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub schema: Option<String>,
    pub fields: Vec<Field>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
    pub policies: PolicySet,
    pub rls_enabled: bool,
    pub location: Location,
}

impl Table {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn amend(&mut self, change: &TableChange) {
        match change {
            TableChange::RowSecurity { enabled } => self.rls_enabled = *enabled,
            TableChange::Policy { verb, .. } => self.policies.record(verb.as_deref()),
        }
    }
}

/// A schema statement aimed at a table created in another file, applied once
/// every file has been merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAmendment {
    pub table: String,
    pub change: TableChange,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum TableChange {
    /// `ALTER TABLE .. ENABLE | DISABLE ROW LEVEL SECURITY`.
    RowSecurity { enabled: bool },
    Policy { name: String, verb: Option<String> },
}

impl TableChange {
    pub fn describe(&self, table: &str) -> String {
        match self {
            TableChange::RowSecurity { .. } => {
                format!("ALTER TABLE references unknown table `{table}`")
            }
            TableChange::Policy { name, .. } => {
                format!("policy `{name}` targets unknown table `{table}`")
            }
        }
    }
}

/// What a declared type is used for. An attribute, not a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRole {
    Row,
    Request,
    Response,
    Other,
}

impl TypeRole {
    /// Infer a role from naming suffixes.
    pub fn from_name(name: &str) -> Self {
        const REQUEST: [&str; 4] = ["Request", "Input", "Params", "Payload"];
        const RESPONSE: [&str; 2] = ["Response", "Result"];
        if REQUEST.iter().any(|suffix| name.ends_with(suffix)) {
            TypeRole::Request
        } else if RESPONSE.iter().any(|suffix| name.ends_with(suffix)) {
            TypeRole::Response
        } else {
            TypeRole::Other
        }
    }
}

/// A named structural type declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub role: TypeRole,
    pub generics: Vec<String>,
    pub extends: Vec<String>,
    /// Table pinned with an `@table` doc tag.
    pub table_hint: Option<String>,
    pub fields: Vec<Field>,
    pub location: Location,
}

impl TypeDef {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// HTTP method of an endpoint or call site. `Any` matches every method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Any,
}

impl HttpMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "ANY" | "REQUEST" => Some(HttpMethod::Any),
            _ => None,
        }
    }

    pub fn matches(&self, other: HttpMethod) -> bool {
        *self == HttpMethod::Any || other == HttpMethod::Any || *self == other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Any => "ANY",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `/`-separated piece of a path template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// A path made of literal segments and named parameter slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTemplate {
    pub segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a path using `:id`, `{id}` or `${id}` parameter notation.
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                if let Some(name) = segment.strip_prefix(':') {
                    Segment::Param(name.to_string())
                } else if let Some(name) = segment
                    .strip_prefix("${")
                    .and_then(|rest| rest.strip_suffix('}'))
                {
                    Segment::Param(name.to_string())
                } else if let Some(name) = segment
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                {
                    Segment::Param(name.to_string())
                } else if segment.contains("${") {
                    Segment::Param(segment.to_string())
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    /// Parameter names erased, e.g. `/api/v1/cv/{}`.
    pub fn shape(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(value) => out.push_str(value),
                Segment::Param(_) => out.push_str("{}"),
            }
        }
        out
    }

    /// Whether a concrete call path fits this declared template.
    ///
    /// Declared slots accept anything; declared literals only accept the same
    /// literal.
    pub fn accepts(&self, call: &PathTemplate) -> bool {
        self.segments.len() == call.segments.len()
            && self
                .segments
                .iter()
                .zip(&call.segments)
                .all(|(declared, called)| match (declared, called) {
                    (Segment::Param(_), _) => true,
                    (Segment::Literal(left), Segment::Literal(right)) => left == right,
                    (Segment::Literal(_), Segment::Param(_)) => false,
                })
    }

    pub fn starts_with(&self, prefix: &PathTemplate) -> bool {
        prefix.segments.len() <= self.segments.len()
            && prefix
                .segments
                .iter()
                .zip(&self.segments)
                .all(|(left, right)| left == right)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(value) => write!(f, "/{value}")?,
                Segment::Param(name) => write!(f, "/{{{name}}}")?,
            }
        }
        Ok(())
    }
}

/// A declared API route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub resource: String,
    pub name: String,
    pub method: HttpMethod,
    /// True when the method came from an annotation rather than the name.
    pub method_declared: bool,
    pub path: PathTemplate,
    pub raw_path: String,
    pub request_type: Option<String>,
    pub response_type: Option<String>,
    pub location: Location,
}

impl Endpoint {
    /// Lookup key, e.g. `CV.LIST`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.resource, self.name)
    }
}

/// A route registered by the backend, e.g. `router.get('/api/v1/cv', ..)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub method: HttpMethod,
    pub path: PathTemplate,
    pub raw_path: String,
    pub location: Location,
}

/// `Owner.field` reference. The owner is a type name or a table name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub owner: String,
    pub field: String,
}

impl FieldRef {
    pub fn new(owner: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.field)
    }
}

/// Constraint reduced from a schema-builder chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Constraint {
    MinLength(f64),
    MaxLength(f64),
    Min(f64),
    Max(f64),
    OneOf(Vec<String>),
    Required,
}

impl Constraint {
    /// Numeric or length bound carried by this constraint, if any.
    pub fn bound(&self) -> Option<(BoundKind, f64)> {
        match self {
            Constraint::MinLength(value) => Some((BoundKind::MinLength, *value)),
            Constraint::MaxLength(value) => Some((BoundKind::MaxLength, *value)),
            Constraint::Min(value) => Some((BoundKind::Min, *value)),
            Constraint::Max(value) => Some((BoundKind::Max, *value)),
            Constraint::OneOf(_) | Constraint::Required => None,
        }
    }
}

/// A validation constraint for one field of a declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub target: FieldRef,
    pub constraint: Constraint,
    /// Argument text as written, e.g. `10 * 1024 * 1024`.
    pub literal: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    Min,
    Max,
    MinLength,
    MaxLength,
}

impl BoundKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "min" => Some(BoundKind::Min),
            "max" => Some(BoundKind::Max),
            "minLength" | "min_length" => Some(BoundKind::MinLength),
            "maxLength" | "max_length" => Some(BoundKind::MaxLength),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoundKind::Min => "min",
            BoundKind::Max => "max",
            BoundKind::MinLength => "minLength",
            BoundKind::MaxLength => "maxLength",
        }
    }
}

impl fmt::Display for BoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a declared bound came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundOrigin {
    Validation,
    Constant { name: String },
    SchemaCheck,
    ColumnLength,
}

impl fmt::Display for BoundOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundOrigin::Validation => f.write_str("validation rule"),
            BoundOrigin::Constant { name } => write!(f, "constant {name}"),
            BoundOrigin::SchemaCheck => f.write_str("CHECK constraint"),
            BoundOrigin::ColumnLength => f.write_str("column length"),
        }
    }
}

/// A numeric or length limit declared for a field somewhere in the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredBound {
    pub target: FieldRef,
    pub kind: BoundKind,
    pub value: f64,
    pub literal: String,
    pub origin: BoundOrigin,
    pub location: Location,
}

/// An entry of the error taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCode {
    pub code: String,
    pub status: Option<u16>,
    pub message: Option<String>,
    /// Declared in a code list, as opposed to only appearing in a map.
    pub listed: bool,
    pub location: Location,
    pub status_location: Option<Location>,
    pub message_location: Option<Location>,
}

/// What a frontend call expression points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallTarget {
    /// A literal or template path. `base` holds a leading `${CONST}`
    /// interpolation that is resolved against endpoint constants.
    Path {
        base: Option<String>,
        path: PathTemplate,
    },
    /// A member of the endpoint table, e.g. `ENDPOINTS.CV.LIST`.
    Member { resource: String, name: String },
}

/// A literal call site found by the usage scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub method: HttpMethod,
    pub target: CallTarget,
    pub raw: String,
    pub location: Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_template_accepts_concrete_calls() {
        let declared = PathTemplate::parse("/api/v1/cv/:id/analyze");
        assert!(declared.accepts(&PathTemplate::parse("/api/v1/cv/${cvId}/analyze")));
        assert!(declared.accepts(&PathTemplate::parse("/api/v1/cv/abc/analyze")));
        assert!(!declared.accepts(&PathTemplate::parse("/api/v1/cv/abc")));
        assert_eq!(declared.shape(), "/api/v1/cv/{}/analyze");
        assert_eq!(declared.to_string(), "/api/v1/cv/{id}/analyze");
    }

    #[test]
    fn literal_segment_rejects_call_param() {
        let declared = PathTemplate::parse("/api/v1/cv/upload");
        assert!(!declared.accepts(&PathTemplate::parse("/api/v1/cv/{id}")));
    }

    #[test]
    fn uuid_and_timestamp_columns_travel_as_strings() {
        assert!(FieldKind::Uuid.accepts(FieldKind::String));
        assert!(FieldKind::Timestamp.accepts(FieldKind::String));
        assert!(!FieldKind::Number.accepts(FieldKind::String));
        assert!(FieldKind::Object.accepts(FieldKind::Unknown));
    }

    #[test]
    fn policy_set_reports_missing_verbs() {
        let mut policies = PolicySet::default();
        assert!(policies.is_empty());
        policies.grant("SELECT");
        policies.grant("insert");
        assert_eq!(policies.missing_verbs(), vec!["update", "delete"]);
        policies.grant("all");
        assert!(policies.missing_verbs().is_empty());
    }

    #[test]
    fn foreign_key_matches_qualified_and_bare_targets() {
        let fk = ForeignKeyRef {
            columns: vec!["user_id".to_string()],
            table: "auth.users".to_string(),
            referenced_columns: vec!["id".to_string()],
            location: Location::new("database.sql", 1, 1),
        };
        assert!(fk.targets("auth.users"));
        assert!(fk.targets("users"));
        assert!(!fk.targets("public.users"));
    }
}
