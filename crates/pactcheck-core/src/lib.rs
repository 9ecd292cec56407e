//! Core contracts for pactcheck.
//!
//! This crate defines the normalized entity types every extractor produces,
//! the per-artifact `Extraction` bundle, and the immutable `CanonicalModel`
//! that rules are evaluated against.

pub mod canonical;
pub mod error;
pub mod extraction;
pub mod location;
pub mod model;
pub mod naming;

pub use canonical::{
    BuildOptions, CanonicalModel, ModelBuilder, NamingFingerprint, PairingBasis, TablePairing,
};
pub use error::{Error, Result};
pub use extraction::{Entity, Extraction, ParseWarning};
pub use location::{ArtifactKind, Location};
pub use model::{
    BoundKind, BoundOrigin, CallSite, CallTarget, Constraint, DeclaredBound, Endpoint, ErrorCode,
    Field, FieldKind, FieldRef, ForeignKeyRef, HttpMethod, PathTemplate, PolicySet, Route,
    Segment, Table, TableAmendment, TableChange, TypeDef, TypeRole, ValidationRule,
};

/// Contract version for the JSON report emitted by the CLI.
pub const REPORT_VERSION: &str = "0.1";
