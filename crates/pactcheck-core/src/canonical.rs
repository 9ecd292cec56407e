use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::extraction::{Entity, Extraction, ParseWarning};
use crate::location::ArtifactKind;
use crate::model::{
    CallSite, DeclaredBound, Endpoint, ErrorCode, FieldRef, Route, Table, TableAmendment,
    TypeDef, TypeRole, ValidationRule,
};
use crate::naming::{Convention, convention, table_type_name};

/// Options that influence how the model is assembled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Explicit table -> type pairings.
    #[serde(default)]
    pub table_types: BTreeMap<String, String>,
}

/// How a table was paired with a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingBasis {
    /// Configured explicitly.
    Declared,
    /// The type carries an `@table` tag.
    Tagged,
    /// Identical names.
    Exact,
    /// Singularised PascalCase of the table name.
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePairing {
    pub table: String,
    pub type_name: String,
    pub basis: PairingBasis,
}

/// Share of snake_case versus camelCase identifiers in one artifact kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingFingerprint {
    pub snake: usize,
    pub camel: usize,
}

impl NamingFingerprint {
    pub fn observe(&mut self, ident: &str) {
        match convention(ident) {
            Convention::Snake => self.snake += 1,
            Convention::Camel => self.camel += 1,
            Convention::Neutral => {}
        }
    }

    /// Fraction of snake_case identifiers, `None` without evidence.
    pub fn snake_ratio(&self) -> Option<f64> {
        let total = self.snake + self.camel;
        if total == 0 {
            None
        } else {
            Some(self.snake as f64 / total as f64)
        }
    }

    pub fn describe(&self) -> String {
        match self.snake_ratio() {
            Some(ratio) => format!(
                "{:.0}% snake_case, {:.0}% camelCase",
                ratio * 100.0,
                (1.0 - ratio) * 100.0
            ),
            None => "no casing evidence".to_string(),
        }
    }
}

/// Immutable, name-indexed merge of every extracted artifact.
///
/// Built once per run by [`ModelBuilder`] and shared read-only with every
/// rule. There are no mutating methods.
#[derive(Debug, Clone, Default)]
pub struct CanonicalModel {
    tables: BTreeMap<String, Table>,
    types: BTreeMap<String, TypeDef>,
    endpoints: BTreeMap<String, Endpoint>,
    validations: BTreeMap<FieldRef, Vec<ValidationRule>>,
    error_codes: BTreeMap<String, ErrorCode>,
    bounds: Vec<DeclaredBound>,
    call_sites: Vec<CallSite>,
    routes: Vec<Route>,
    constants: BTreeMap<String, String>,
    pairings: Vec<TablePairing>,
    fingerprints: BTreeMap<ArtifactKind, NamingFingerprint>,
    files: BTreeMap<ArtifactKind, Vec<String>>,
    warnings: Vec<ParseWarning>,
}

impl CanonicalModel {
    pub fn tables(&self) -> &BTreeMap<String, Table> {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn types(&self) -> &BTreeMap<String, TypeDef> {
        &self.types
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn endpoints(&self) -> &BTreeMap<String, Endpoint> {
        &self.endpoints
    }

    pub fn validations(&self) -> &BTreeMap<FieldRef, Vec<ValidationRule>> {
        &self.validations
    }

    pub fn error_codes(&self) -> &BTreeMap<String, ErrorCode> {
        &self.error_codes
    }

    pub fn bounds(&self) -> &[DeclaredBound] {
        &self.bounds
    }

    pub fn call_sites(&self) -> &[CallSite] {
        &self.call_sites
    }

    /// Backend routes in file order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Path constants declared next to the endpoint table.
    pub fn constants(&self) -> &BTreeMap<String, String> {
        &self.constants
    }

    pub fn pairings(&self) -> &[TablePairing] {
        &self.pairings
    }

    pub fn pairing_for_table(&self, table: &str) -> Option<&TablePairing> {
        self.pairings.iter().find(|pairing| pairing.table == table)
    }

    /// Type name a bound owner resolves to: a paired table maps to its type.
    pub fn owner_type<'a>(&'a self, owner: &'a str) -> &'a str {
        match self.pairing_for_table(owner) {
            Some(pairing) => &pairing.type_name,
            None => owner,
        }
    }

    pub fn fingerprint(&self, kind: ArtifactKind) -> NamingFingerprint {
        self.fingerprints.get(&kind).copied().unwrap_or_default()
    }

    /// Whether at least one file of this kind was supplied.
    pub fn has(&self, kind: ArtifactKind) -> bool {
        self.files.contains_key(&kind)
    }

    pub fn files(&self, kind: ArtifactKind) -> &[String] {
        self.files.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Extraction warnings plus duplicate-name warnings from the merge.
    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }
}

/// Collects extractions and merges them into a [`CanonicalModel`].
#[derive(Debug, Default)]
pub struct ModelBuilder {
    options: BuildOptions,
    extractions: Vec<Extraction>,
}

impl ModelBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            extractions: Vec::new(),
        }
    }

    pub fn add(&mut self, extraction: Extraction) -> &mut Self {
        self.extractions.push(extraction);
        self
    }

    /// Merge everything collected so far.
    ///
    /// Extractions are ordered by artifact kind and file first, so the result
    /// does not depend on the order in which extractors finished. Duplicate
    /// names keep the first definition and record a warning.
    pub fn build(self) -> CanonicalModel {
        let ModelBuilder {
            options,
            mut extractions,
        } = self;
        extractions.sort_by(|a, b| (a.artifact, &a.file).cmp(&(b.artifact, &b.file)));

        let mut model = CanonicalModel::default();
        let mut validation_fields: BTreeSet<FieldRef> = BTreeSet::new();
        let mut amendments: Vec<TableAmendment> = Vec::new();

        for extraction in extractions {
            let Extraction {
                artifact,
                file,
                entities,
                bounds,
                call_sites,
                routes,
                amendments: file_amendments,
                constants,
                warnings,
            } = extraction;

            model.files.entry(artifact).or_default().push(file);
            model.warnings.extend(warnings);
            model.bounds.extend(bounds);
            model.call_sites.extend(call_sites);
            model.routes.extend(routes);
            amendments.extend(file_amendments);
            for (name, value) in constants {
                model.constants.entry(name).or_insert(value);
            }

            for entity in entities {
                merge_entity(&mut model, artifact, entity, &mut validation_fields);
            }
        }
        apply_amendments(&mut model, amendments);

        let fingerprints = compute_fingerprints(&model, &validation_fields);
        model.fingerprints = fingerprints;

        let (pairings, pairing_warnings) = pair_tables(&model, &options);
        for pairing in &pairings {
            if let Some(def) = model.types.get_mut(&pairing.type_name) {
                def.role = TypeRole::Row;
            }
        }
        model.pairings = pairings;
        model.warnings.extend(pairing_warnings);

        tracing::debug!(
            event = "model_merged",
            tables = model.tables.len(),
            types = model.types.len(),
            endpoints = model.endpoints.len(),
            error_codes = model.error_codes.len(),
            routes = model.routes.len(),
            pairings = model.pairings.len()
        );

        model
    }
}

fn merge_entity(
    model: &mut CanonicalModel,
    artifact: ArtifactKind,
    entity: Entity,
    validation_fields: &mut BTreeSet<FieldRef>,
) {
    let name = entity.name();
    let label = entity.label();
    let location = entity.location().clone();

    let first = match entity {
        Entity::Table(table) => insert_first(&mut model.tables, name.clone(), table),
        Entity::TypeDef(def) => insert_first(&mut model.types, name.clone(), def),
        Entity::Endpoint(endpoint) => insert_first(&mut model.endpoints, name.clone(), endpoint),
        Entity::ErrorCode(code) => insert_first(&mut model.error_codes, name.clone(), code),
        Entity::Validation(rule) => {
            validation_fields.insert(rule.target.clone());
            model
                .validations
                .entry(rule.target.clone())
                .or_default()
                .push(rule);
            None
        }
    };

    if let Some(first) = first {
        model.warnings.push(ParseWarning::new(
            artifact,
            location,
            format!("duplicate {label} `{name}`; the definition at {first} is kept"),
        ));
    }
}

/// Amendments run after every table is known, in file order.
fn apply_amendments(model: &mut CanonicalModel, amendments: Vec<TableAmendment>) {
    for amendment in amendments {
        match model.tables.get_mut(&amendment.table) {
            Some(table) => table.amend(&amendment.change),
            None => model.warnings.push(ParseWarning::new(
                ArtifactKind::Schema,
                amendment.location.clone(),
                amendment.change.describe(&amendment.table),
            )),
        }
    }
}

/// Insert unless present; returns the kept definition's location on conflict.
fn insert_first<T: HasLocation>(
    map: &mut BTreeMap<String, T>,
    name: String,
    value: T,
) -> Option<String> {
    match map.get(&name) {
        Some(existing) => Some(existing.location_text()),
        None => {
            map.insert(name, value);
            None
        }
    }
}

trait HasLocation {
    fn location_text(&self) -> String;
}

impl HasLocation for Table {
    fn location_text(&self) -> String {
        self.location.to_string()
    }
}

impl HasLocation for TypeDef {
    fn location_text(&self) -> String {
        self.location.to_string()
    }
}

impl HasLocation for Endpoint {
    fn location_text(&self) -> String {
        self.location.to_string()
    }
}

impl HasLocation for ErrorCode {
    fn location_text(&self) -> String {
        self.location.to_string()
    }
}

fn compute_fingerprints(
    model: &CanonicalModel,
    validation_fields: &BTreeSet<FieldRef>,
) -> BTreeMap<ArtifactKind, NamingFingerprint> {
    let mut fingerprints = BTreeMap::new();

    let mut schema = NamingFingerprint::default();
    for field in model.tables.values().flat_map(|table| &table.fields) {
        schema.observe(&field.name);
    }
    fingerprints.insert(ArtifactKind::Schema, schema);

    let mut types = NamingFingerprint::default();
    for field in model.types.values().flat_map(|def| &def.fields) {
        types.observe(&field.name);
    }
    fingerprints.insert(ArtifactKind::Types, types);

    let mut validation = NamingFingerprint::default();
    for target in validation_fields {
        validation.observe(&target.field);
    }
    fingerprints.insert(ArtifactKind::Validation, validation);

    fingerprints
}

fn pair_tables(
    model: &CanonicalModel,
    options: &BuildOptions,
) -> (Vec<TablePairing>, Vec<ParseWarning>) {
    let mut pairings = Vec::new();
    let mut warnings = Vec::new();

    for table in model.tables.values() {
        if let Some(type_name) = options.table_types.get(&table.name) {
            if model.types.contains_key(type_name) {
                pairings.push(TablePairing {
                    table: table.name.clone(),
                    type_name: type_name.clone(),
                    basis: PairingBasis::Declared,
                });
            } else {
                warnings.push(ParseWarning::new(
                    ArtifactKind::Types,
                    table.location.clone(),
                    format!(
                        "configured pairing `{}` -> `{type_name}` names an undeclared type",
                        table.name
                    ),
                ));
            }
            continue;
        }

        let tagged = model
            .types
            .values()
            .find(|def| def.table_hint.as_deref() == Some(table.name.as_str()));
        if let Some(def) = tagged {
            pairings.push(TablePairing {
                table: table.name.clone(),
                type_name: def.name.clone(),
                basis: PairingBasis::Tagged,
            });
            continue;
        }

        if model.types.contains_key(&table.name) {
            pairings.push(TablePairing {
                table: table.name.clone(),
                type_name: table.name.clone(),
                basis: PairingBasis::Exact,
            });
            continue;
        }

        let derived = table_type_name(&table.name);
        let candidate = model.types.values().find(|def| {
            def.table_hint.is_none()
                && !matches!(def.role, TypeRole::Request | TypeRole::Response)
                && def.name.eq_ignore_ascii_case(&derived)
        });
        if let Some(def) = candidate {
            pairings.push(TablePairing {
                table: table.name.clone(),
                type_name: def.name.clone(),
                basis: PairingBasis::Derived,
            });
        }
    }

    (pairings, warnings)
}
