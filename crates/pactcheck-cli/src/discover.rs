use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use pactcheck_core::ArtifactKind;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::errors::{CliError, CliResult};

/// Directories searched for contract files when none are configured.
pub const CONTRACT_DIRS: [&str; 4] = [
    "contracts",
    "packages/shared/src/contracts",
    "packages/shared/contracts",
    "src/contracts",
];

/// Frontend roots scanned for call sites when no usage glob is configured.
pub const USAGE_DIRS: [&str; 3] = ["apps/web/src", "frontend/src", "src"];

/// Backend roots scanned for route registrations when no routes glob is
/// configured.
pub const ROUTE_DIRS: [&str; 3] = ["apps/server/src", "server/src", "backend/src"];

const USAGE_EXTENSIONS: [&str; 2] = [".ts", ".tsx"];
const ROUTE_EXTENSIONS: [&str; 2] = [".ts", ".js"];

const SKIPPED_DIRS: [&str; 5] = ["node_modules", ".git", "target", "dist", "build"];

/// One file to extract.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArtifactFile {
    pub kind: ArtifactKind,
    /// Root-relative path with `/` separators, used in every location.
    pub name: String,
    pub path: PathBuf,
}

fn default_file_name(kind: ArtifactKind) -> Option<&'static str> {
    match kind {
        ArtifactKind::Schema => Some("database.sql"),
        ArtifactKind::Types => Some("types.ts"),
        ArtifactKind::Endpoints => Some("endpoints.ts"),
        ArtifactKind::Validation => Some("validation.ts"),
        ArtifactKind::Errors => Some("errors.ts"),
        ArtifactKind::Routes | ArtifactKind::Usage => None,
    }
}

/// Resolve every artifact kind to a sorted list of files.
///
/// Configured paths must exist and configured globs must match something;
/// unconfigured kinds fall back to the well-known locations and may find
/// nothing.
pub fn discover(settings: &Settings) -> CliResult<Vec<ArtifactFile>> {
    let root = settings.root.as_path();
    let mut tree = ProjectTree::new(root);
    let mut claimed = BTreeSet::new();
    let mut files = Vec::new();

    for kind in ArtifactKind::ALL {
        let patterns = settings.artifacts.get(kind);
        let names = match (patterns.is_empty(), kind) {
            (false, _) => resolve_patterns(&mut tree, kind, patterns)?,
            (true, ArtifactKind::Routes) => default_sources(&mut tree, &ROUTE_DIRS, &ROUTE_EXTENSIONS)?,
            (true, ArtifactKind::Usage) => default_sources(&mut tree, &USAGE_DIRS, &USAGE_EXTENSIONS)?,
            (true, _) => default_contract(root, kind),
        };
        let names: Vec<String> = if kind == ArtifactKind::Usage {
            names.into_iter().filter(|name| !claimed.contains(name)).collect()
        } else {
            claimed.extend(names.iter().cloned());
            names
        };
        tracing::debug!(event = "artifacts_resolved", artifact = %kind, files = names.len());
        files.extend(names.into_iter().map(|name| ArtifactFile {
            kind,
            path: root.join(&name),
            name,
        }));
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn default_contract(root: &Path, kind: ArtifactKind) -> Vec<String> {
    let Some(file_name) = default_file_name(kind) else {
        return Vec::new();
    };
    CONTRACT_DIRS
        .iter()
        .map(|dir| format!("{dir}/{file_name}"))
        .find(|name| root.join(name).is_file())
        .into_iter()
        .collect()
}

/// Source files below the first-party directories that exist, test files and
/// declaration files excluded.
fn default_sources(
    tree: &mut ProjectTree<'_>,
    roots: &[&str],
    extensions: &[&str],
) -> CliResult<Vec<String>> {
    let dirs: Vec<String> = roots
        .iter()
        .filter(|dir| tree.root.join(dir).is_dir())
        .map(|dir| format!("{dir}/"))
        .collect();
    if dirs.is_empty() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = tree
        .files()?
        .iter()
        .filter(|name| dirs.iter().any(|dir| name.starts_with(dir.as_str())))
        .filter(|name| extensions.iter().any(|ext| name.ends_with(ext)))
        .filter(|name| !name.ends_with(".d.ts") && !is_test_file(name))
        .cloned()
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

fn is_test_file(name: &str) -> bool {
    let stem = name.rsplit('/').next().unwrap_or(name);
    stem.contains(".test.") || stem.contains(".spec.")
}

fn resolve_patterns(
    tree: &mut ProjectTree<'_>,
    kind: ArtifactKind,
    patterns: &[String],
) -> CliResult<Vec<String>> {
    let mut names = Vec::new();
    for pattern in patterns {
        if is_glob(pattern) {
            let matcher = compile(kind, pattern)?;
            let matched: Vec<String> = tree
                .files()?
                .iter()
                .filter(|name| matcher.is_match(name.as_str()))
                .cloned()
                .collect();
            if matched.is_empty() {
                return Err(CliError::EmptyGlob {
                    kind: kind.as_str(),
                    pattern: pattern.clone(),
                });
            }
            names.extend(matched);
        } else {
            let path = tree.root.join(pattern);
            if !path.is_file() {
                return Err(CliError::MissingArtifact {
                    kind: kind.as_str(),
                    path: pattern.clone(),
                });
            }
            names.push(relative_name(tree.root, &path));
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

fn compile(kind: ArtifactKind, pattern: &str) -> CliResult<GlobMatcher> {
    let pattern_text = pattern.trim_start_matches("./");
    GlobBuilder::new(pattern_text)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| CliError::InvalidGlob {
            kind: kind.as_str(),
            pattern: pattern.to_string(),
            source,
        })
}

/// Root-relative path with `/` separators.
pub fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Files below the root, walked once on first use.
struct ProjectTree<'a> {
    root: &'a Path,
    files: Option<Vec<String>>,
}

impl<'a> ProjectTree<'a> {
    fn new(root: &'a Path) -> Self {
        Self { root, files: None }
    }

    fn files(&mut self) -> CliResult<&[String]> {
        if self.files.is_none() {
            self.files = Some(walk(self.root)?);
        }
        Ok(self.files.as_deref().unwrap_or_default())
    }
}

fn walk(root: &Path) -> CliResult<Vec<String>> {
    let mut files = Vec::new();
    let entries = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let skipped = entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name));
            entry.depth() == 0 || !skipped
        });
    for entry in entries {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(relative_name(root, entry.path()));
        }
    }
    Ok(files)
}
