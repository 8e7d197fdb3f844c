//! `publish.yml` and `book.json`: parsed once at the boundary into typed structs.
//!
//! The publish manifest drives everything downstream: which content root to
//! publish, how to order its summary, which fonts to bundle, and which
//! `docker_config` overrides apply. Internal code never looks at the raw YAML.
//!
//! ## `publish.yml`
//!
//! ```yaml
//! version: 1.0.0
//! project:
//!   name: Handbook
//!   license: CC-BY-4.0
//!   date: 2024-05-01
//!   authors: [Jane Doe]
//!   attribution_policy: warn   # or fail (default)
//! docker_config:
//!   docker_names:
//!     default: { image: "book-{branch}" }
//! fonts:
//!   - { name: SERIF, path: fonts/serif.ttf }
//! profiles:
//!   default:
//!     steps: [publisher]
//! publish:
//!   - name: handbook
//!     path: content
//!     out: handbook.pdf
//!     summary_mode: gitbook
//!     summary_appendices_last: true
//! ```
//!
//! ## Project Metadata
//!
//! Attribution fields are resolved manifest first, `book.json` second. Under
//! `attribution_policy: fail` a missing license aborts the publication;
//! under `warn` a visible placeholder is emitted instead.

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Manifest file names, in lookup order.
pub const PUBLISH_FILENAMES: [&str; 2] = ["publish.yml", "publish.yaml"];

/// Steps a profile may name.
pub const KNOWN_STEPS: [&str; 7] = [
    "check_if_to_publish",
    "ensure_readme",
    "update_citation",
    "ai-reference-check",
    "converter",
    "engineering-document-formatter",
    "publisher",
];

/// Steps used when the manifest declares no profiles.
pub const DEFAULT_STEPS: [&str; 6] = [
    "check_if_to_publish",
    "ensure_readme",
    "update_citation",
    "converter",
    "engineering-document-formatter",
    "publisher",
];

static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?$",
    )
    .unwrap()
});

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no publish.yml found under {0}")]
    NotFound(PathBuf),
    #[error("invalid version '{0}': expected MAJOR.MINOR.PATCH")]
    InvalidVersion(String),
    #[error("project.{field} is missing (attribution_policy: fail)")]
    MissingProjectField { field: &'static str },
    #[error("{source_name} date '{value}' is invalid: expected YYYY-MM-DD")]
    InvalidDate {
        source_name: &'static str,
        value: String,
    },
    #[error("no publish entry named '{0}'")]
    UnknownPublishEntry(String),
    #[error("profile '{name}' not found; available: {available}")]
    UnknownProfile { name: String, available: String },
    #[error("profile '{profile}' names unknown step '{step}'")]
    UnknownStep { profile: String, step: String },
}

/// Returns `true` if `version` is a valid semantic version.
pub fn is_semver(version: &str) -> bool {
    SEMVER_RE.is_match(version.trim())
}

/// A YAML value that may be written as a single string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionPolicy {
    #[default]
    Fail,
    Warn,
}

/// The `project` section of `publish.yml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    pub name: Option<String>,
    pub license: Option<String>,
    pub license_url: Option<String>,
    pub date: Option<String>,
    pub authors: Option<OneOrMany>,
    pub attribution_policy: AttributionPolicy,
}

/// One `fonts:` override entry in `publish.yml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FontOverride {
    pub name: Option<String>,
    pub path: Option<String>,
    pub url: Option<String>,
}

/// A named orchestration profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub steps: Vec<String>,
    pub description: Option<String>,
}

/// One entry of the `publish:` list.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishEntry {
    pub name: Option<String>,
    /// Content root, relative to the manifest directory.
    #[serde(default = "default_entry_path")]
    pub path: String,
    pub out: Option<String>,
    pub out_dir: Option<String>,
    #[serde(default = "default_out_format")]
    pub out_format: String,
    pub summary_mode: Option<String>,
    pub summary_submode: Option<String>,
    pub summary_order_manifest: Option<String>,
    #[serde(default)]
    pub summary_appendices_last: bool,
    pub summary_manual_marker: Option<String>,
    pub paper_format: Option<String>,
    #[serde(default = "default_true")]
    pub use_summary: bool,
    #[serde(default = "default_true")]
    pub use_book_json: bool,
    pub docker_config: Option<Mapping>,
}

fn default_entry_path() -> String {
    ".".to_string()
}

fn default_out_format() -> String {
    "pdf".to_string()
}

fn default_true() -> bool {
    true
}

impl PublishEntry {
    /// Output file name: `out`, else `<name>.<out_format>`, else `publish.<out_format>`.
    pub fn output_name(&self) -> String {
        if let Some(out) = self.out.as_deref().filter(|s| !s.trim().is_empty()) {
            return out.to_string();
        }
        let stem = self.name.as_deref().unwrap_or("publish");
        format!("{stem}.{}", self.out_format)
    }
}

/// Parsed `publish.yml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishManifest {
    pub version: Option<String>,
    pub project: Option<ProjectSection>,
    pub docker_config: Option<Mapping>,
    pub publish: Vec<PublishEntry>,
    pub fonts: Vec<FontOverride>,
    pub profiles: BTreeMap<String, Profile>,
}

impl PublishManifest {
    /// Locate `publish.yml` / `publish.yaml` directly in `dir`.
    pub fn locate(dir: &Path) -> Option<PathBuf> {
        PUBLISH_FILENAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }

    /// Parse a manifest file without validating it.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Check invariants that serde cannot express.
    ///
    /// A missing `version` defaults to `1.0.0`.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if let Some(version) = &self.version
            && !is_semver(version)
        {
            return Err(ManifestError::InvalidVersion(version.clone()));
        }
        for (name, profile) in &self.profiles {
            if let Some(step) = profile
                .steps
                .iter()
                .find(|s| !KNOWN_STEPS.contains(&s.trim()))
            {
                return Err(ManifestError::UnknownStep {
                    profile: name.clone(),
                    step: step.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or("1.0.0")
    }

    /// Find a publish entry by name; `None` selects the first entry.
    pub fn entry(&self, name: Option<&str>) -> Result<&PublishEntry, ManifestError> {
        match name {
            Some(n) => self
                .publish
                .iter()
                .find(|e| e.name.as_deref() == Some(n))
                .ok_or_else(|| ManifestError::UnknownPublishEntry(n.to_string())),
            None => self
                .publish
                .first()
                .ok_or_else(|| ManifestError::UnknownPublishEntry("<first>".to_string())),
        }
    }

    /// Resolve a profile's step list, falling back to `default`.
    ///
    /// A manifest without profiles runs [`DEFAULT_STEPS`].
    pub fn resolve_profile(&self, name: &str) -> Result<Vec<String>, ManifestError> {
        if self.profiles.is_empty() {
            return Ok(DEFAULT_STEPS.iter().map(|s| s.to_string()).collect());
        }
        let profile = match self.profiles.get(name) {
            Some(p) => p,
            None => match self.profiles.get("default") {
                Some(p) => {
                    warn!(profile = name, "profile not found, falling back to 'default'");
                    p
                }
                None => {
                    let available = self.profiles.keys().cloned().collect::<Vec<_>>().join(", ");
                    return Err(ManifestError::UnknownProfile {
                        name: name.to_string(),
                        available,
                    });
                }
            },
        };
        let steps: Vec<String> = profile
            .steps
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if steps.is_empty() {
            return Ok(DEFAULT_STEPS.iter().map(|s| s.to_string()).collect());
        }
        Ok(steps)
    }
}

// =============================================================================
// book.json
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookStructure {
    pub summary: Option<String>,
}

/// The subset of GitBook's `book.json` this tool reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookJson {
    pub title: Option<String>,
    pub author: Option<OneOrMany>,
    pub authors: Option<OneOrMany>,
    pub license: Option<String>,
    pub date: Option<String>,
    pub root: Option<String>,
    pub structure: BookStructure,
}

impl BookJson {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Walk up from `start` to the nearest `book.json`. Returns its directory
    /// and parsed content; an unreadable file is logged and ignored.
    pub fn find(start: &Path) -> Option<(PathBuf, BookJson)> {
        let dir = crate::paths::find_upwards(start, &["book.json"])?;
        match Self::load(&dir.join("book.json")) {
            Ok(book) => Some((dir, book)),
            Err(e) => {
                warn!(path = %dir.join("book.json").display(), error = %e, "ignoring unreadable book.json");
                None
            }
        }
    }

    /// Summary file name from `structure.summary`, default `SUMMARY.md`.
    pub fn summary_file(&self) -> &str {
        self.structure
            .summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("SUMMARY.md")
    }

    /// Content root: `root` resolved against the book.json directory.
    pub fn content_root(&self, book_dir: &Path) -> PathBuf {
        match self.root.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(root) => book_dir.join(root),
            None => book_dir.to_path_buf(),
        }
    }

    fn author_list(&self) -> Vec<String> {
        self.authors
            .clone()
            .or_else(|| self.author.clone())
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
    }
}

// =============================================================================
// Project metadata
// =============================================================================

/// Attribution metadata after applying the manifest / book.json fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectMetadata {
    pub name: String,
    pub authors: Vec<String>,
    pub license: String,
    pub license_url: Option<String>,
    pub date: Option<NaiveDate>,
    pub policy: AttributionPolicy,
    /// Human-readable notes for every placeholder that was substituted.
    pub warnings: Vec<String>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_date(source_name: &'static str, raw: &str) -> Result<NaiveDate, ManifestError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ManifestError::InvalidDate {
        source_name,
        value: raw.to_string(),
    })
}

/// Resolve attribution fields for a publication.
///
/// `repo_name` and `repo_owner` only appear inside placeholders.
pub fn resolve_project_metadata(
    manifest: &PublishManifest,
    book: Option<&BookJson>,
    repo_name: &str,
    repo_owner: Option<&str>,
) -> Result<ProjectMetadata, ManifestError> {
    let project = manifest.project.clone().unwrap_or_default();
    let policy = project.attribution_policy;
    let mut warnings = Vec::new();

    let name = non_empty(project.name.as_ref())
        .or_else(|| book.and_then(|b| non_empty(b.title.as_ref())))
        .unwrap_or_else(|| {
            warnings.push("project.name is missing; using the repository name".to_string());
            format!("<MISSING project.name | using repo '{repo_name}'>")
        });

    let mut authors = project.authors.map(OneOrMany::into_vec).unwrap_or_default();
    if authors.is_empty() {
        authors = book.map(BookJson::author_list).unwrap_or_default();
    }
    if authors.is_empty() {
        let placeholder = match repo_owner {
            Some(owner) => format!("<MISSING project.authors | using repo owner '{owner}'>"),
            None => "<MISSING project.authors>".to_string(),
        };
        warnings.push("project.authors is missing; using a placeholder".to_string());
        authors.push(placeholder);
    }

    let license = match non_empty(project.license.as_ref())
        .or_else(|| book.and_then(|b| non_empty(b.license.as_ref())))
    {
        Some(l) => l,
        None if policy == AttributionPolicy::Fail => {
            return Err(ManifestError::MissingProjectField { field: "license" });
        }
        None => {
            warnings.push("project.license is missing (attribution_policy: warn)".to_string());
            "<MISSING project.license>".to_string()
        }
    };

    let date = match (project.date.as_deref(), book.and_then(|b| b.date.as_deref())) {
        (Some(raw), _) => Some(parse_date("project", raw)?),
        (None, Some(raw)) => Some(parse_date("book.json", raw)?),
        (None, None) => None,
    };

    for w in &warnings {
        warn!(policy = ?policy, "{w}");
    }
    debug!(name = %name, license = %license, "resolved project metadata");

    Ok(ProjectMetadata {
        name,
        authors,
        license,
        license_url: non_empty(project.license_url.as_ref()),
        date,
        policy,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest(yaml: &str) -> PublishManifest {
        PublishManifest::parse(yaml).unwrap()
    }

    // =========================================================================
    // Versions and validation
    // =========================================================================

    #[test]
    fn semver_accepts_prerelease_and_build() {
        assert!(is_semver("1.0.0"));
        assert!(is_semver("0.12.3-rc.1+build.5"));
        assert!(!is_semver("1.0"));
        assert!(!is_semver("01.0.0"));
        assert!(!is_semver("v1.0.0"));
    }

    #[test]
    fn validate_rejects_bad_version() {
        let m = manifest("version: 1.x\n");
        assert!(matches!(m.validate(), Err(ManifestError::InvalidVersion(_))));
    }

    #[test]
    fn missing_version_defaults() {
        let m = manifest("publish: []\n");
        assert!(m.validate().is_ok());
        assert_eq!(m.version_or_default(), "1.0.0");
    }

    #[test]
    fn empty_manifest_parses() {
        let m = manifest("");
        assert!(m.publish.is_empty());
    }

    // =========================================================================
    // Publish entries
    // =========================================================================

    #[test]
    fn entry_defaults_applied() {
        let m = manifest("publish:\n  - name: book\n");
        let e = m.entry(Some("book")).unwrap();
        assert_eq!(e.path, ".");
        assert_eq!(e.out_format, "pdf");
        assert!(e.use_summary);
        assert_eq!(e.output_name(), "book.pdf");
    }

    #[test]
    fn entry_lookup_by_name_and_first() {
        let m = manifest("publish:\n  - name: a\n    out: a.pdf\n  - name: b\n");
        assert_eq!(m.entry(None).unwrap().name.as_deref(), Some("a"));
        assert_eq!(m.entry(Some("b")).unwrap().name.as_deref(), Some("b"));
        assert!(matches!(m.entry(Some("zz")), Err(ManifestError::UnknownPublishEntry(_))));
    }

    #[test]
    fn entry_docker_config_is_mapping() {
        let m = manifest("publish:\n  - name: a\n    docker_config:\n      x: 1\n");
        assert!(m.publish[0].docker_config.is_some());
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    #[test]
    fn profile_fallback_to_default() {
        let m = manifest("profiles:\n  default:\n    steps: [publisher]\n");
        assert_eq!(m.resolve_profile("ci").unwrap(), vec!["publisher"]);
    }

    #[test]
    fn profile_unknown_without_default_errors() {
        let m = manifest("profiles:\n  local:\n    steps: [publisher]\n");
        assert!(matches!(
            m.resolve_profile("ci"),
            Err(ManifestError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn no_profiles_runs_default_steps() {
        let m = manifest("");
        assert_eq!(m.resolve_profile("any").unwrap().len(), DEFAULT_STEPS.len());
    }

    #[test]
    fn validate_flags_unknown_step() {
        let m = manifest("profiles:\n  default:\n    steps: [unknown-step]\n");
        assert!(matches!(m.validate(), Err(ManifestError::UnknownStep { .. })));
    }

    // =========================================================================
    // book.json
    // =========================================================================

    #[test]
    fn book_json_summary_and_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("book.json"),
            r#"{"title": "T", "root": "content", "structure": {"summary": "NAV.md"}}"#,
        )
        .unwrap();
        let (dir, book) = BookJson::find(tmp.path()).unwrap();
        assert_eq!(book.summary_file(), "NAV.md");
        assert!(book.content_root(&dir).ends_with("content"));
    }

    #[test]
    fn book_json_default_summary() {
        assert_eq!(BookJson::default().summary_file(), "SUMMARY.md");
    }

    // =========================================================================
    // Project metadata
    // =========================================================================

    #[test]
    fn metadata_from_manifest() {
        let m = manifest(
            "project:\n  name: Book\n  license: MIT\n  authors: [A, B]\n  date: 2024-05-01\n",
        );
        let meta = resolve_project_metadata(&m, None, "repo", None).unwrap();
        assert_eq!(meta.name, "Book");
        assert_eq!(meta.authors, vec!["A", "B"]);
        assert_eq!(meta.date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert!(meta.warnings.is_empty());
    }

    #[test]
    fn metadata_falls_back_to_book_json() {
        let m = manifest("project:\n  license: MIT\n");
        let book = BookJson {
            title: Some("From Book".into()),
            author: Some(OneOrMany::One("Writer".into())),
            ..Default::default()
        };
        let meta = resolve_project_metadata(&m, Some(&book), "repo", None).unwrap();
        assert_eq!(meta.name, "From Book");
        assert_eq!(meta.authors, vec!["Writer"]);
    }

    #[test]
    fn missing_license_fails_under_fail_policy() {
        let m = manifest("project:\n  name: Book\n");
        let err = resolve_project_metadata(&m, None, "repo", None).unwrap_err();
        assert!(matches!(err, ManifestError::MissingProjectField { field: "license" }));
    }

    #[test]
    fn missing_license_placeholder_under_warn_policy() {
        let m = manifest("project:\n  attribution_policy: warn\n");
        let meta = resolve_project_metadata(&m, None, "handbook", Some("acme")).unwrap();
        assert_eq!(meta.license, "<MISSING project.license>");
        assert_eq!(meta.name, "<MISSING project.name | using repo 'handbook'>");
        assert_eq!(meta.authors, vec!["<MISSING project.authors | using repo owner 'acme'>"]);
        assert_eq!(meta.warnings.len(), 3);
    }

    #[test]
    fn invalid_date_is_fatal() {
        let m = manifest("project:\n  license: MIT\n  date: 01.05.2024\n");
        assert!(matches!(
            resolve_project_metadata(&m, None, "r", None),
            Err(ManifestError::InvalidDate { .. })
        ));
    }
}
