//! GitBook `SUMMARY.md` generation.
//!
//! The content directory is the source of truth: every Markdown file becomes
//! an entry, every directory with a `README.md` (or `index.md`) becomes an
//! entry holding its folder's files, and directories without one are
//! flattened into their parent.
//!
//! ```text
//! content/                      # Summary
//! ├── README.md      # Book
//! ├── 2-setup.md     # Setup    * [Book](README.md)
//! ├── 10-intro.md    # Intro    * [Setup](2-setup.md)
//! └── part/                     * [Intro](10-intro.md)
//!     ├── README.md  # Part     * [Part](part/README.md)
//!     └── one.md     # One        * [One](part/one.md)
//! ```
//!
//! # Ordering Modes
//!
//! | Mode | Submode | Siblings ordered by |
//! |------|---------|---------------------|
//! | `ordered-by-filesystem` | `none` / `flip` | directory listing, optionally reversed |
//! | `ordered-by-alphanumeric` | `none` / `flip` | natural sort on title |
//! | `gitbook-style` | `none` | natural sort on file name |
//! | `gitbook-style` | `appendix-last` | as `none`, appendices moved to the end |
//! | `gitbook-style` | `no-change` | discovery order |
//! | `manual` | any | discovery order, manifest priorities only |
//!
//! An optional order manifest ([`ManifestOrder`]) lifts the paths it lists
//! ahead of their siblings. The root README is always listed first.
//!
//! # Maintenance
//!
//! [`ensure_summary`] regenerates the file in place, writing only when the
//! content changed, and never touches a summary that carries the manual
//! marker `<!-- SUMMARY: MANUAL -->`.

mod ordering;
mod tree;

pub use ordering::{
    ManifestOrder, apply_manifest_order, entries_from_lines, entries_from_value, is_root_readme,
    key_candidates, load_manifest_order, sort_nodes,
};
pub use tree::{extract_title, is_appendix_path};

use crate::manifest::{BookJson, PublishEntry};
use crate::paths::{atomic_write, resolve};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Marker that freezes a hand-maintained summary.
pub const DEFAULT_MANUAL_MARKER: &str = "<!-- SUMMARY: MANUAL -->";

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("content root not found: {0}")]
    RootNotFound(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    Filesystem,
    Alphanumeric,
    GitbookStyle,
    Manual,
}

impl SummaryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryMode::Filesystem => "ordered-by-filesystem",
            SummaryMode::Alphanumeric => "ordered-by-alphanumeric",
            SummaryMode::GitbookStyle => "gitbook-style",
            SummaryMode::Manual => "manual",
        }
    }
}

impl fmt::Display for SummaryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts canonical names and the short `publish.yml` aliases
/// (`gitbook`, `manifest`, `unsorted`, `alpha`).
impl FromStr for SummaryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ordered-by-filesystem" | "filesystem" | "unsorted" => Ok(SummaryMode::Filesystem),
            "ordered-by-alphanumeric" | "alphanumeric" | "alpha" => Ok(SummaryMode::Alphanumeric),
            "gitbook-style" | "gitbook" | "manifest" => Ok(SummaryMode::GitbookStyle),
            "manual" => Ok(SummaryMode::Manual),
            other => Err(format!("unknown summary mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubMode {
    #[default]
    None,
    Flip,
    AppendixLast,
    NoChange,
}

impl SubMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SubMode::None => "none",
            SubMode::Flip => "flip",
            SubMode::AppendixLast => "appendix-last",
            SubMode::NoChange => "no-change",
        }
    }
}

impl fmt::Display for SubMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(SubMode::None),
            "flip" => Ok(SubMode::Flip),
            "appendix-last" => Ok(SubMode::AppendixLast),
            "no-change" => Ok(SubMode::NoChange),
            other => Err(format!("unknown summary submode '{other}'")),
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// One entry in the summary tree.
///
/// `path` is the document the bullet links to; `source_path` is the file or
/// directory the node was built from. Both are posix paths relative to the
/// content root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentNode {
    pub title: String,
    pub path: Option<String>,
    pub level: usize,
    pub children: Vec<ContentNode>,
    pub is_appendix: bool,
    pub source_path: Option<String>,
    pub promote_children: bool,
    pub attach_to_parent_entry: bool,
}

impl ContentNode {
    /// A leaf entry for a document at `path`.
    pub fn document(title: impl Into<String>, path: &str) -> Self {
        Self {
            title: title.into(),
            path: Some(path.to_string()),
            source_path: Some(path.to_string()),
            ..Self::default()
        }
    }

    /// Append `child`, re-levelling its whole subtree below this node.
    pub fn add_child(&mut self, mut child: ContentNode) {
        child.set_level(self.level + 1);
        self.children.push(child);
    }

    /// Set this node's level and cascade `level + 1` to descendants.
    pub fn set_level(&mut self, level: usize) {
        self.level = level;
        for child in &mut self.children {
            child.set_level(level + 1);
        }
    }

    /// Render this node and its descendants as indented bullets.
    pub fn write_lines(&self, out: &mut Vec<String>) {
        let indent = "  ".repeat(self.level);
        match &self.path {
            Some(path) => out.push(format!("{indent}* [{}]({path})", self.title)),
            None if !self.children.is_empty() && !self.title.is_empty() => {
                out.push(format!("{indent}* {}", self.title))
            }
            None => {}
        }
        for child in &self.children {
            child.write_lines(out);
        }
    }

    fn collect_documents<'a>(&'a self, out: &mut Vec<&'a ContentNode>) {
        if self.path.is_some() {
            out.push(self);
        }
        for child in &self.children {
            child.collect_documents(out);
        }
    }
}

/// The ordered summary of one content root.
#[derive(Debug, Clone)]
pub struct SummaryTree {
    pub entries: Vec<ContentNode>,
    pub mode: SummaryMode,
    pub submode: SubMode,
    pub manual_order: Option<ManifestOrder>,
}

impl SummaryTree {
    /// `# Summary`, a blank line, then one bullet per node.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec!["# Summary".to_string(), String::new()];
        for entry in &self.entries {
            entry.write_lines(&mut lines);
        }
        lines
    }

    /// File content as written to disk: LF endings, single trailing newline.
    pub fn to_markdown(&self) -> String {
        format!("{}\n", self.to_lines().join("\n").trim_end())
    }

    /// Every linked document in reading order.
    pub fn documents(&self) -> Vec<&ContentNode> {
        let mut out = Vec::new();
        for entry in &self.entries {
            entry.collect_documents(&mut out);
        }
        out
    }
}

/// Walk `root_dir` and build the ordered summary tree.
pub fn build_summary_tree(
    root_dir: &Path,
    mode: SummaryMode,
    submode: SubMode,
    manual_order: Option<ManifestOrder>,
) -> Result<SummaryTree, SummaryError> {
    build_summary_tree_excluding(root_dir, mode, submode, manual_order, &[])
}

fn build_summary_tree_excluding(
    root_dir: &Path,
    mode: SummaryMode,
    submode: SubMode,
    manual_order: Option<ManifestOrder>,
    excluded: &[String],
) -> Result<SummaryTree, SummaryError> {
    let mut holder = ContentNode {
        children: tree::collect_entries(root_dir, mode, excluded)?,
        ..ContentNode::default()
    };
    ordering::sort_tree(&mut holder, mode, submode, manual_order.as_ref());
    Ok(SummaryTree {
        entries: holder.children,
        mode,
        submode,
        manual_order,
    })
}

/// Summary lines for `root_dir`: the header followed by one bullet per node.
pub fn generate_summary(
    root_dir: &Path,
    mode: SummaryMode,
    submode: SubMode,
    manual_order: Option<ManifestOrder>,
) -> Result<Vec<String>, SummaryError> {
    Ok(build_summary_tree(root_dir, mode, submode, manual_order)?.to_lines())
}

// =============================================================================
// SUMMARY.md maintenance
// =============================================================================

/// Where the summary of a book lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLayout {
    /// Directory holding `book.json` (or the starting directory).
    pub base_dir: PathBuf,
    /// Content root the summary describes.
    pub root_dir: PathBuf,
    pub summary_path: PathBuf,
}

/// Resolve the summary layout from `book.json` (searched upwards from
/// `base_dir`): its `root` and `structure.summary`, or `SUMMARY.md` /
/// `summary.md` in the content root.
pub fn summary_layout(base_dir: &Path) -> SummaryLayout {
    let base_dir = resolve(base_dir);
    let (book_dir, book) = BookJson::find(&base_dir).unwrap_or_else(|| (base_dir.clone(), BookJson::default()));
    let root_dir = resolve(&book.content_root(&book_dir));
    let summary_name = match book.structure.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(name) => name.to_string(),
        None => ["SUMMARY.md", "summary.md"]
            .into_iter()
            .find(|c| root_dir.join(c).exists())
            .unwrap_or("SUMMARY.md")
            .to_string(),
    };
    SummaryLayout {
        base_dir: book_dir,
        summary_path: root_dir.join(summary_name),
        root_dir,
    }
}

/// How [`ensure_summary`] should build the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOptions {
    pub mode: SummaryMode,
    pub submode: SubMode,
    /// Order manifest, relative to the content root unless absolute.
    pub order_manifest: Option<PathBuf>,
    pub manual_marker: Option<String>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            mode: SummaryMode::GitbookStyle,
            submode: SubMode::None,
            order_manifest: None,
            manual_marker: Some(DEFAULT_MANUAL_MARKER.to_string()),
        }
    }
}

impl SummaryOptions {
    /// Options from a `publish.yml` entry. Unknown modes fall back to
    /// `gitbook-style` with a warning.
    pub fn from_publish_entry(entry: &PublishEntry) -> Self {
        let mode = match entry.summary_mode.as_deref() {
            None => SummaryMode::GitbookStyle,
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!(error = %e, "falling back to gitbook-style summary");
                SummaryMode::GitbookStyle
            }),
        };
        let submode = match entry.summary_submode.as_deref().map(str::parse::<SubMode>) {
            Some(Ok(s)) => s,
            Some(Err(e)) => {
                warn!(error = %e, "ignoring summary submode");
                SubMode::None
            }
            None if entry.summary_appendices_last => SubMode::AppendixLast,
            None => SubMode::None,
        };
        Self {
            mode,
            submode,
            order_manifest: entry.summary_order_manifest.as_ref().map(PathBuf::from),
            manual_marker: Some(
                entry
                    .summary_manual_marker
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MANUAL_MARKER.to_string()),
            ),
        }
    }
}

/// What [`ensure_summary`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// The summary was (re)written.
    Updated(PathBuf),
    /// The generated summary matched the file on disk.
    Unchanged(PathBuf),
    /// Manual mode or manual marker: the file was left alone.
    Manual(PathBuf),
}

impl SummaryOutcome {
    pub fn path(&self) -> &Path {
        match self {
            SummaryOutcome::Updated(p) | SummaryOutcome::Unchanged(p) | SummaryOutcome::Manual(p) => p,
        }
    }
}

/// Regenerate the book's summary file if it is out of date.
///
/// The write goes through a sibling temp file and an atomic rename.
pub fn ensure_summary(base_dir: &Path, options: &SummaryOptions) -> Result<SummaryOutcome, SummaryError> {
    let layout = summary_layout(base_dir);
    let summary_path = layout.summary_path.clone();

    if options.mode == SummaryMode::Manual {
        info!(path = %summary_path.display(), "manual summary mode, leaving summary untouched");
        return Ok(SummaryOutcome::Manual(summary_path));
    }

    let old_content = fs::read_to_string(&summary_path).unwrap_or_default();
    if let Some(marker) = options.manual_marker.as_deref().filter(|m| !m.is_empty())
        && old_content.contains(marker)
    {
        info!(path = %summary_path.display(), marker, "summary carries manual marker, leaving it untouched");
        return Ok(SummaryOutcome::Manual(summary_path));
    }

    let order = options.order_manifest.as_ref().map(|p| {
        let path = if p.is_absolute() { p.clone() } else { layout.root_dir.join(p) };
        load_manifest_order(&path)
    });
    let summary_name = summary_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tree = build_summary_tree_excluding(
        &layout.root_dir,
        options.mode,
        options.submode,
        order,
        &[summary_name],
    )?;
    let new_content = tree.to_markdown();

    if new_content == old_content {
        info!(path = %summary_path.display(), "summary unchanged");
        return Ok(SummaryOutcome::Unchanged(summary_path));
    }
    atomic_write(&summary_path, new_content.as_bytes())?;
    info!(
        path = %summary_path.display(),
        mode = %options.mode,
        submode = %options.submode,
        entries = tree.documents().len(),
        "summary updated"
    );
    Ok(SummaryOutcome::Updated(summary_path))
}
