//! Filesystem walk that turns a content directory into [`ContentNode`]s.

use super::{ContentNode, SummaryError, SummaryMode};
use crate::markdown::{first_heading_text, front_matter_end};
use crate::naming::title_from_stem;
use crate::paths::relative_posix;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static APPENDIX_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(anhang|appendix)\b").unwrap());
static APPENDIX_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#\s*(Anhang|Appendix)\b").unwrap());

const APPENDIX_PREFIXES: [&str; 3] = ["anhang-", "appendix-", "appendices-"];

/// Title of a Markdown file: its first `#` heading after any front matter,
/// else the file stem with separators turned into spaces.
///
/// Read failures fall back to the stem.
pub fn extract_title(md_path: &Path) -> String {
    let stem = md_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = match fs::read_to_string(md_path) {
        Ok(t) => t,
        Err(e) => {
            debug!(path = %md_path.display(), error = %e, "title read failed, using file name");
            String::new()
        }
    };
    if let Some(title) = first_heading_text(&text) {
        return title;
    }
    let derived = title_from_stem(&stem).trim().to_string();
    if derived.is_empty() { stem } else { derived }
}

/// Whether a file or directory is an appendix, by name or first heading.
pub fn is_appendix_path(path: &Path) -> bool {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if APPENDIX_PREFIXES.iter().any(|p| stem.starts_with(p)) || APPENDIX_WORD_RE.is_match(&stem) {
        return true;
    }
    let is_md = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("md"));
    if !is_md || !path.is_file() {
        return false;
    }
    match fs::read_to_string(path) {
        Ok(text) => {
            let lines: Vec<&str> = text.lines().collect();
            let start = front_matter_end(&lines).map(|e| e + 1).unwrap_or(0);
            lines[start..]
                .iter()
                .find(|l| l.trim().starts_with('#'))
                .is_some_and(|l| APPENDIX_HEADING_RE.is_match(l))
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "appendix check read failed");
            false
        }
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

fn lower_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// List a directory's Markdown files and visible subdirectories.
///
/// Filesystem mode keeps the order `read_dir` yields; every other mode
/// starts from name order so results do not depend on the platform.
fn list_dir(dir: &Path, mode: SummaryMode) -> Result<(Vec<PathBuf>, Vec<PathBuf>), SummaryError> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if !lower_name(&path).starts_with('.') {
                dirs.push(path);
            }
        } else if is_markdown(&path) {
            files.push(path);
        }
    }
    if mode != SummaryMode::Filesystem {
        files.sort();
        dirs.sort();
    }
    Ok((files, dirs))
}

struct Walker<'a> {
    root: &'a Path,
    mode: SummaryMode,
    excluded: Vec<String>,
}

impl Walker<'_> {
    fn directory(&self, dir: &Path, level: usize) -> Result<ContentNode, SummaryError> {
        let is_root = dir == self.root;
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir_title = title_from_stem(&name).trim().to_string();
        let mut node = ContentNode {
            title: if dir_title.is_empty() { name } else { dir_title },
            level,
            is_appendix: !is_root && is_appendix_path(dir),
            source_path: (!is_root).then(|| relative_posix(dir, self.root)),
            ..ContentNode::default()
        };

        let (files, subdirs) = list_dir(dir, self.mode)?;
        let mut readme = None;
        let mut index = None;
        let mut children = Vec::new();
        for file in files {
            let lower = lower_name(&file);
            if lower == "summary.md" || self.excluded.contains(&lower) {
                continue;
            }
            match lower.as_str() {
                "readme.md" => readme = Some(file),
                "index.md" => index = Some(file),
                _ => {
                    let rel = relative_posix(&file, self.root);
                    let mut child = ContentNode::document(extract_title(&file), &rel);
                    child.is_appendix = is_appendix_path(&file);
                    children.push(child);
                }
            }
        }
        if let Some(entry) = readme.or(index) {
            node.path = Some(relative_posix(&entry, self.root));
            node.title = extract_title(&entry);
        }

        for subdir in subdirs {
            let sub = self.directory(&subdir, level + 1)?;
            if sub.promote_children {
                children.extend(sub.children);
            } else {
                children.push(sub);
            }
        }
        for child in children {
            node.add_child(child);
        }

        if node.path.is_none() && !is_root {
            node.promote_children = true;
            for child in &mut node.children {
                child.attach_to_parent_entry = true;
            }
        }
        Ok(node)
    }
}

/// Walk `root_dir` and return the top-level entries of the summary.
///
/// The root README becomes a level-0 entry holding the contents of any
/// flattened top-level directories; everything else moves up one level so
/// top-level directories sit at level 0.
pub fn collect_entries(
    root_dir: &Path,
    mode: SummaryMode,
    excluded: &[String],
) -> Result<Vec<ContentNode>, SummaryError> {
    if !root_dir.is_dir() {
        return Err(SummaryError::RootNotFound(root_dir.to_path_buf()));
    }
    let walker = Walker {
        root: root_dir,
        mode,
        excluded: excluded.iter().map(|e| e.to_lowercase()).collect(),
    };
    let root_node = walker.directory(root_dir, 0)?;

    let mut entries = Vec::new();
    let mut root_entry = root_node.path.clone().map(|path| {
        let mut entry = ContentNode::document(root_node.title.clone(), &path);
        entry.is_appendix = root_node.is_appendix;
        entry
    });
    let mut top_level = Vec::new();
    for mut child in root_node.children {
        match root_entry.as_mut() {
            Some(entry) if child.attach_to_parent_entry => entry.add_child(child),
            _ => {
                child.set_level(0);
                top_level.push(child);
            }
        }
    }
    entries.extend(root_entry);
    entries.extend(top_level);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    // =========================================================================
    // Titles
    // =========================================================================

    #[test]
    fn title_from_heading_after_front_matter() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.md", "---\ntitle: x\n---\n\n# Real Title\n");
        assert_eq!(extract_title(&tmp.path().join("a.md")), "Real Title");
    }

    #[test]
    fn title_falls_back_to_stem() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "getting_started-now.md", "no heading here\n");
        assert_eq!(extract_title(&tmp.path().join("getting_started-now.md")), "getting started now");
    }

    #[test]
    fn title_of_missing_file_is_stem() {
        assert_eq!(extract_title(Path::new("/nonexistent/my-doc.md")), "my doc");
    }

    // =========================================================================
    // Appendix detection
    // =========================================================================

    #[test]
    fn appendix_by_prefix_and_word() {
        assert!(is_appendix_path(Path::new("/x/appendix-a.md")));
        assert!(is_appendix_path(Path::new("/x/Anhang-B.md")));
        assert!(is_appendix_path(Path::new("/x/appendices-all.md")));
        assert!(is_appendix_path(Path::new("/x/99 appendix.md")));
        assert!(!is_appendix_path(Path::new("/x/appendixes.md")));
    }

    #[test]
    fn appendix_by_first_heading() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "glossary.md", "# Anhang C: Glossar\n");
        write(tmp.path(), "plain.md", "# Chapter\n\n# Appendix later\n");
        assert!(is_appendix_path(&tmp.path().join("glossary.md")));
        assert!(!is_appendix_path(&tmp.path().join("plain.md")));
    }

    // =========================================================================
    // Walk
    // =========================================================================

    #[test]
    fn walk_skips_hidden_dirs_summary_and_non_markdown() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "README.md", "# Book\n");
        write(tmp.path(), "SUMMARY.md", "# Summary\n");
        write(tmp.path(), "notes.txt", "x");
        write(tmp.path(), ".git/README.md", "# Hidden\n");
        write(tmp.path(), "a.md", "# A\n");
        let entries = collect_entries(tmp.path(), SummaryMode::GitbookStyle, &[]).unwrap();
        let paths: Vec<_> = entries.iter().filter_map(|e| e.path.as_deref()).collect();
        assert_eq!(paths, vec!["README.md", "a.md"]);
    }

    #[test]
    fn directory_with_readme_becomes_entry() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "part/README.md", "# Part\n");
        write(tmp.path(), "part/one.md", "# One\n");
        let entries = collect_entries(tmp.path(), SummaryMode::GitbookStyle, &[]).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path.as_deref(), Some("part/README.md"));
        assert_eq!(entries[0].title, "Part");
        assert_eq!(entries[0].level, 0);
        assert_eq!(entries[0].children[0].level, 1);
        assert_eq!(entries[0].children[0].path.as_deref(), Some("part/one.md"));
    }

    #[test]
    fn readme_preferred_over_index() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "part/index.md", "# Index\n");
        write(tmp.path(), "part/readme.md", "# Readme\n");
        let entries = collect_entries(tmp.path(), SummaryMode::GitbookStyle, &[]).unwrap();
        assert_eq!(entries[0].title, "Readme");
        assert!(entries[0].children.is_empty());
    }

    #[test]
    fn directory_without_readme_is_flattened_under_root_readme() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "README.md", "# Book\n");
        write(tmp.path(), "loose/a.md", "# A\n");
        let entries = collect_entries(tmp.path(), SummaryMode::GitbookStyle, &[]).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].children[0].title, "A");
        assert_eq!(entries[0].children[0].level, 1);
    }

    #[test]
    fn nested_flattening_keeps_levels_consistent() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "part/README.md", "# Part\n");
        write(tmp.path(), "part/group/deeper/x.md", "# X\n");
        let entries = collect_entries(tmp.path(), SummaryMode::GitbookStyle, &[]).unwrap();
        let part = &entries[0];
        assert_eq!(part.children.len(), 1);
        assert_eq!(part.children[0].title, "X");
        assert_eq!(part.children[0].level, part.level + 1);
    }

    #[test]
    fn missing_root_is_error() {
        let err = collect_entries(Path::new("/nonexistent/root"), SummaryMode::GitbookStyle, &[]);
        assert!(matches!(err, Err(SummaryError::RootNotFound(_))));
    }

    #[test]
    fn excluded_names_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "NAV.md", "# Nav\n");
        write(tmp.path(), "a.md", "# A\n");
        let entries = collect_entries(tmp.path(), SummaryMode::GitbookStyle, &["NAV.md".to_string()]).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
