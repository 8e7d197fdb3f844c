//! Front matter validation.
//!
//! Pandoc aborts on the first malformed YAML header, far from the file that
//! caused it. This check walks the content tree up front and reports every
//! broken block with its file, line and surrounding lines.

use crate::markdown::front_matter_end;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Directories never checked.
pub const SKIP_DIRS: &[&str] = &["publish", "temp", ".git", ".venv", ".gitbook"];

/// Lines of context shown around the offending line.
const SNIPPET_CONTEXT: usize = 2;

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A broken front matter block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatterIssue {
    pub path: PathBuf,
    /// 1-based line in the Markdown file.
    pub line: usize,
    pub message: String,
    pub snippet: Option<String>,
}

fn snippet(block: &[&str], line_in_block: usize) -> Option<String> {
    if block.is_empty() {
        return None;
    }
    let start = line_in_block.saturating_sub(1 + SNIPPET_CONTEXT);
    let end = (line_in_block + SNIPPET_CONTEXT).min(block.len());
    let text = block[start.min(end)..end].join("\n");
    (!text.trim().is_empty()).then_some(text)
}

/// Check the front matter of one document's text.
pub fn check_text(path: &Path, text: &str) -> Option<FrontMatterIssue> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.first().is_none_or(|l| l.trim() != "---") {
        return None;
    }
    let Some(end) = front_matter_end(&lines) else {
        return Some(FrontMatterIssue {
            path: path.to_path_buf(),
            line: 1,
            message: "front matter block is never closed with '---'".to_string(),
            snippet: snippet(&lines[1..], 1),
        });
    };

    let block = &lines[1..end];
    let yaml = block.join("\n");
    match serde_yaml::from_str::<serde_yaml::Value>(&yaml) {
        Ok(_) => None,
        Err(e) => {
            let line_in_block = e.location().map(|l| l.line()).unwrap_or(1);
            Some(FrontMatterIssue {
                path: path.to_path_buf(),
                line: line_in_block + 1,
                message: e.to_string(),
                snippet: snippet(block, line_in_block),
            })
        }
    }
}

pub fn check_file(path: &Path) -> Result<Option<FrontMatterIssue>, FrontMatterError> {
    let text = fs::read_to_string(path)?;
    Ok(check_text(path, &text))
}

fn is_skipped(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .any(|c| SKIP_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
        })
        .unwrap_or(false)
}

/// Markdown files under `root`, minus [`SKIP_DIRS`], sorted by path.
pub fn markdown_files(root: &Path) -> Result<Vec<PathBuf>, FrontMatterError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_skipped(root, e.path())));
    for entry in walker {
        let entry = entry?;
        let is_md = entry
            .path()
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("md"));
        if entry.file_type().is_file() && is_md {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Every front matter issue under `root`.
pub fn check_tree(root: &Path) -> Result<Vec<FrontMatterIssue>, FrontMatterError> {
    let mut issues = Vec::new();
    for path in markdown_files(root)? {
        debug!(path = %path.display(), "checking front matter");
        issues.extend(check_file(&path)?);
    }
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn valid_and_absent_front_matter_pass() {
        let p = Path::new("a.md");
        assert_eq!(check_text(p, "---\ntitle: Hi\ntags: [a, b]\n---\n# A\n"), None);
        assert_eq!(check_text(p, "# No front matter\n"), None);
        assert_eq!(check_text(p, "---\n---\nbody\n"), None);
    }

    #[test]
    fn yaml_error_reports_file_line() {
        let text = "---\ntitle: ok\nbad: [unclosed\nother: 1\n---\nbody\n";
        let issue = check_text(Path::new("doc.md"), text).unwrap();
        assert_eq!(issue.path, PathBuf::from("doc.md"));
        assert!(issue.line >= 2, "line {}", issue.line);
        assert!(issue.snippet.unwrap().contains("bad: [unclosed"));
    }

    #[test]
    fn unclosed_block_is_an_issue() {
        let issue = check_text(Path::new("doc.md"), "---\ntitle: x\n# Body\n").unwrap();
        assert_eq!(issue.line, 1);
        assert!(issue.message.contains("never closed"));
    }

    #[test]
    fn tree_skips_excluded_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let broken = "---\na: [\n---\n";
        fs::create_dir_all(root.join("publish")).unwrap();
        fs::create_dir_all(root.join("chapter/.gitbook")).unwrap();
        fs::create_dir_all(root.join("chapter")).unwrap();
        fs::write(root.join("publish/out.md"), broken).unwrap();
        fs::write(root.join("chapter/.gitbook/x.md"), broken).unwrap();
        fs::write(root.join("chapter/bad.md"), broken).unwrap();
        fs::write(root.join("chapter/good.md"), "---\ntitle: ok\n---\n").unwrap();
        fs::write(root.join("notes.txt"), broken).unwrap();

        let issues = check_tree(root).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].path.ends_with("chapter/bad.md"));
    }
}
