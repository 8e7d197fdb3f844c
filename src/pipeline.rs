//! Preparation pipeline: one `publish.yml` entry to one combined Markdown
//! file ready for Pandoc.
//!
//! ```text
//! publish.yml ──► project metadata ──► layered config
//!      │
//!      ▼
//! front matter check ──► SUMMARY.md (ensure) ──► reading order
//!                                                    │
//!                     ┌──────────────────────────────┘
//!                     ▼
//!        for each document: align headings ──► preprocess ──► normalize
//!                     │
//!                     ▼
//!        combine ──► geometry header ──► <out_dir>/<stem>.md
//! ```
//!
//! Stages run strictly in this order on one thread. Fonts are resolved
//! separately ([`crate::fonts::prepare_fonts`]) since they may hit the
//! network.

use crate::combine;
use crate::config::{self, LayeredConfig, TemplateVars};
use crate::frontmatter::{self, FrontMatterError, FrontMatterIssue};
use crate::headings;
use crate::manifest::{self, BookJson, ManifestError, ProjectMetadata, PublishManifest};
use crate::paths;
use crate::preprocess::{PageStats, Paper, PreprocessError, Preprocessor};
use crate::summary::{self, SummaryError, SummaryOptions, SummaryOutcome};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{info, warn};

/// Output directory when the entry names none.
pub const DEFAULT_OUT_DIR: &str = "publish";

static SUMMARY_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]\(([^)\s]+)\)").unwrap());

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),
    #[error("summary: {0}")]
    Summary(#[from] SummaryError),
    #[error("preprocess: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("front matter: {0}")]
    FrontMatterScan(#[from] FrontMatterError),
    #[error("{} file(s) with malformed front matter", .0.len())]
    FrontMatter(Vec<FrontMatterIssue>),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One document of the reading order after preparation.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Path as linked from the summary.
    pub link: String,
    pub path: PathBuf,
    pub anchor: String,
    pub stats: PageStats,
}

/// Everything [`prepare_publication`] did.
#[derive(Debug)]
pub struct PreparedPublication {
    pub name: String,
    pub manifest_path: PathBuf,
    pub content_root: PathBuf,
    pub metadata: ProjectMetadata,
    pub config: LayeredConfig,
    pub summary: Option<SummaryOutcome>,
    pub paper: Paper,
    pub documents: Vec<PreparedDocument>,
    /// Summary links that pointed at missing files.
    pub skipped: Vec<String>,
    pub stats: PageStats,
    pub output_path: PathBuf,
}

/// Link targets of a summary file in order, without external links,
/// fragments or duplicates.
pub fn summary_links(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .flat_map(|line| SUMMARY_LINK_RE.captures_iter(line).map(|c| c[1].to_string()))
        .map(|target| target.split('#').next().unwrap_or_default().to_string())
        .filter(|target| !target.is_empty() && !target.contains("://") && !target.starts_with("mailto:"))
        .filter(|target| seen.insert(target.clone()))
        .collect()
}

/// Reading order for the content root: the links of the summary file, or
/// an in-memory summary tree when summaries are disabled.
fn reading_order(
    content_dir: &Path,
    use_summary: bool,
    options: &SummaryOptions,
) -> Result<(Option<SummaryOutcome>, PathBuf, Vec<String>), PipelineError> {
    let layout = summary::summary_layout(content_dir);
    if use_summary {
        let outcome = summary::ensure_summary(content_dir, options)?;
        let base = outcome
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| layout.root_dir.clone());
        let content = fs::read_to_string(outcome.path()).unwrap_or_else(|e| {
            warn!(path = %outcome.path().display(), error = %e, "summary unreadable, no documents to combine");
            String::new()
        });
        return Ok((Some(outcome), base, summary_links(&content)));
    }

    let tree = summary::build_summary_tree(&layout.root_dir, options.mode, options.submode, None)?;
    let links = tree.documents().iter().filter_map(|n| n.path.clone()).collect();
    Ok((None, layout.root_dir, links))
}

/// Prepare the publish entry `publish_name` (the first entry when `None`)
/// of the manifest in `repo_root`.
pub fn prepare_publication(repo_root: &Path, publish_name: Option<&str>) -> Result<PreparedPublication, PipelineError> {
    let repo_root = paths::resolve(repo_root);
    let manifest_path =
        PublishManifest::locate(&repo_root).ok_or_else(|| ManifestError::NotFound(repo_root.clone()))?;
    let manifest = PublishManifest::load(&manifest_path)?;
    manifest.validate()?;
    let entry = manifest.entry(publish_name)?;
    let name = entry.name.clone().unwrap_or_else(|| "default".to_string());
    let manifest_dir = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| repo_root.clone());
    let content_dir = paths::resolve(&manifest_dir.join(&entry.path));
    info!(publication = %name, content = %content_dir.display(), "preparing publication");

    let book = if entry.use_book_json { BookJson::find(&content_dir) } else { None };
    let repo_name = repo_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repository".to_string());
    let metadata = manifest::resolve_project_metadata(&manifest, book.as_ref().map(|(_, b)| b), &repo_name, None)?;
    let config = config::merge_configs(&repo_root, entry.name.as_deref(), &TemplateVars::new());

    let content_root = summary::summary_layout(&content_dir).root_dir;
    let issues = frontmatter::check_tree(&content_root)?;
    if !issues.is_empty() {
        return Err(PipelineError::FrontMatter(issues));
    }

    let options = SummaryOptions::from_publish_entry(entry);
    let (summary, base, links) = reading_order(&content_dir, entry.use_summary, &options)?;

    let paper = Paper::or_default(entry.paper_format.as_deref().unwrap_or("a4"));
    let mut preprocessor = Preprocessor::new();
    let mut documents = Vec::new();
    let mut skipped = Vec::new();
    let mut texts = Vec::new();
    let mut stats = PageStats::default();

    for link in links {
        let path = paths::clean(&base.join(&link));
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable document");
                skipped.push(link);
                continue;
            }
        };
        let aligned = headings::align(&raw, &path);
        let prepared = preprocessor.process_text(&aligned, &path, &paper);
        stats.add(prepared.stats);
        texts.push(prepared.text);
        documents.push(PreparedDocument {
            link,
            path,
            anchor: prepared.anchor,
            stats: prepared.stats,
        });
    }

    let combined = combine::add_geometry_header(&combine::combine(&texts), &paper)?;
    let out_dir = manifest_dir.join(entry.out_dir.as_deref().unwrap_or(DEFAULT_OUT_DIR));
    let output_name = entry.output_name();
    let stem = Path::new(&output_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());
    let output_path = out_dir.join(format!("{stem}.md"));
    paths::atomic_write(&output_path, combined.as_bytes())?;
    info!(path = %output_path.display(), documents = documents.len(), "combined markdown written");

    Ok(PreparedPublication {
        name,
        manifest_path,
        content_root,
        metadata,
        config,
        summary,
        paper,
        documents,
        skipped,
        stats,
        output_path,
    })
}
