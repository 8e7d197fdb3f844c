//! Markdown preprocessing for paged output.
//!
//! One pass over a chapter file before it is handed to Pandoc:
//!
//! 1. **Figures**: HTML `<figure>` blocks become Markdown images
//! 2. **Links**: relative links to existing `.md` files become `#anchor` jumps
//! 3. **Tables**: pipe tables get LaTeX specials escaped; tables too wide for
//!    the current paper (or with 10+ columns) move onto a larger page
//! 4. **Images**: standalone images wider than the page at 300 dpi move onto
//!    a larger page
//! 5. **Anchor**: `<a id="md-…"></a>` goes after the front matter
//!
//! Fenced code blocks and front matter pass through untouched. Wrapped
//! regions use the geometry-switch text described in [`geometry`].
//!
//! ```text
//! | a | … | l |      \newpage
//! |---|…|---|   ->   \newgeometry{paperwidth=420mm,…}
//! | 1 | … | 9 |      \begin{longtable}…\end{longtable}
//!                    \restoregeometry …
//! ```

pub mod figures;
pub mod geometry;
pub mod links;
pub mod paper;
pub mod tables;

pub use links::{AnchorCache, anchor_from_path};
pub use paper::{Paper, paper_for_columns, paper_for_width};

use crate::imaging::{ImageProbe, RasterProbe};
use crate::markdown::{FenceTracker, front_matter_end};
use crate::paths::resolve;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

static IMAGE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^!\[[^\]]*\]\(([^)]+)\)").unwrap());

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Counts of what one preprocessing pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub tables: usize,
    pub wrapped_tables: usize,
    pub images: usize,
    pub wrapped_images: usize,
}

impl PageStats {
    pub fn add(&mut self, other: PageStats) {
        self.tables += other.tables;
        self.wrapped_tables += other.wrapped_tables;
        self.images += other.images;
        self.wrapped_images += other.wrapped_images;
    }
}

/// Preprocessed text plus what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    pub text: String,
    pub anchor: String,
    pub stats: PageStats,
}

/// Process-scoped preprocessor: holds the image probe and the anchor cache
/// shared by all documents of one publication.
pub struct Preprocessor<P: ImageProbe = RasterProbe> {
    probe: P,
    anchors: AnchorCache,
}

impl Preprocessor<RasterProbe> {
    pub fn new() -> Self {
        Self::with_probe(RasterProbe)
    }
}

impl Default for Preprocessor<RasterProbe> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ImageProbe> Preprocessor<P> {
    pub fn with_probe(probe: P) -> Self {
        Self {
            probe,
            anchors: AnchorCache::new(),
        }
    }

    pub fn anchors(&self) -> &AnchorCache {
        &self.anchors
    }

    /// Anchor id for `path`, cached per resolved path.
    pub fn anchor_for(&mut self, path: &Path) -> String {
        self.anchors.anchor_for(path)
    }

    /// Read and preprocess `md_path` for `paper_format` (e.g. `a4`).
    pub fn preprocess(&mut self, md_path: &Path, paper_format: &str) -> Result<String, PreprocessError> {
        Ok(self.preprocess_file(md_path, &Paper::or_default(paper_format))?.text)
    }

    pub fn preprocess_file(&mut self, md_path: &Path, paper: &Paper) -> Result<Preprocessed, PreprocessError> {
        let text = fs::read_to_string(md_path).map_err(|source| PreprocessError::Read {
            path: md_path.to_path_buf(),
            source,
        })?;
        let result = self.process_text(&text, md_path, paper);
        info!(
            path = %md_path.display(),
            anchor = %result.anchor,
            tables = result.stats.tables,
            wrapped_tables = result.stats.wrapped_tables,
            images = result.stats.images,
            wrapped_images = result.stats.wrapped_images,
            "preprocessed"
        );
        Ok(result)
    }

    /// Preprocess `text` as if read from `md_path`. Links and images resolve
    /// relative to `md_path`'s directory.
    pub fn process_text(&mut self, text: &str, md_path: &Path, paper: &Paper) -> Preprocessed {
        let current_file = resolve(md_path);
        let base_dir = current_file.parent().map(Path::to_path_buf).unwrap_or_default();

        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let lines = figures::convert_html_figures(lines);
        let lines = links::rewrite_internal_links(lines, &current_file, &mut self.anchors);
        let (out, stats) = self.paginate(lines, &base_dir, paper);

        let anchor = self.anchors.anchor_for(&current_file);
        Preprocessed {
            text: links::insert_anchor(&out.concat(), &anchor),
            anchor,
            stats,
        }
    }

    fn paginate(&self, lines: Vec<String>, base_dir: &Path, current: &Paper) -> (Vec<String>, PageStats) {
        let mut stats = PageStats::default();
        let mut out: Vec<String> = Vec::with_capacity(lines.len());
        let prose_start = front_matter_end(&lines).map(|end| end + 1).unwrap_or(0);
        let mut fences = FenceTracker::new();
        let mut i = 0;

        while i < lines.len() {
            let line = &lines[i];
            if i < prose_start || fences.is_fenced(line) {
                out.push(line.clone());
                i += 1;
                continue;
            }

            if tables::starts_table(&lines, i) {
                let start = i;
                i += 2;
                while i < lines.len() && tables::is_table_row(&lines[i]) {
                    i += 1;
                }
                let table = &lines[start..i];
                let cols = tables::column_count(&table[0]);
                let paper = paper_for_columns(cols, None, current);
                let escaped: Vec<String> = table.iter().map(|l| tables::escape_table_line(l)).collect();
                stats.tables += 1;
                debug!(columns = cols, paper = %paper, "table detected");

                if paper != *current || cols >= paper::MIN_COLS_FOR_WRAP {
                    stats.wrapped_tables += 1;
                    let mut block = take_lead_in(&mut out);
                    block.extend(escaped);
                    out.extend(geometry::wrap_block(block, &paper, current));
                } else {
                    out.extend(escaped);
                }
                continue;
            }

            if let Some(caps) = IMAGE_LINE_RE.captures(line.trim()) {
                let target = caps[1].split_whitespace().next().unwrap_or_default();
                let width = self.probe.width_px(&base_dir.join(target));
                let paper = paper_for_width(width, current);
                stats.images += 1;
                if paper != *current {
                    stats.wrapped_images += 1;
                    debug!(image = target, width_px = width, paper = %paper, "image needs larger page");
                    out.extend(geometry::wrap_block(vec![line.clone()], &paper, current));
                } else {
                    out.push(line.clone());
                }
                i += 1;
                continue;
            }

            out.push(line.clone());
            i += 1;
        }
        (out, stats)
    }
}

/// Pop the heading, blockquote and blank lines directly above a table so
/// they move to the new page with it.
fn take_lead_in(out: &mut Vec<String>) -> Vec<String> {
    let mut lead_in = Vec::new();
    while let Some(last) = out.last() {
        let stripped = last.trim_start();
        if last.trim().is_empty() || stripped.starts_with('#') || stripped.starts_with('>') {
            lead_in.push(out.pop().unwrap_or_default());
        } else {
            break;
        }
    }
    lead_in.reverse();
    lead_in
}

/// Preprocess one file with a fresh [`Preprocessor`] and the raster probe.
pub fn preprocess(md_path: &Path, paper_format: &str) -> Result<String, PreprocessError> {
    Preprocessor::new().preprocess(md_path, paper_format)
}
