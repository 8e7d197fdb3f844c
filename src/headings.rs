//! Heading realignment for documents included into a combined book.
//!
//! A chapter file is written as if it stood alone, usually opening with a
//! `#` heading. Once it is placed under its folder's README it has to sit one
//! level below that README's first heading, with its inner hierarchy kept
//! intact:
//!
//! ```text
//! a/README.md   ## Section A          a/b.md   # Details     ->  ### Details
//!                                              ## Sub        ->  #### Sub
//! ```
//!
//! Front matter and fenced code blocks are never touched. Levels are clamped
//! to `1..=6`.

use crate::markdown::{FenceTracker, first_heading_level, front_matter_end, parse_atx};
use std::fs;
use std::path::Path;
use tracing::debug;

fn is_readme(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case("readme.md"))
}

/// First heading level of the README next to `source_path`.
///
/// The document itself is never its own parent, so a README yields `None`.
pub fn parent_readme_level(source_path: &Path) -> Option<usize> {
    if is_readme(source_path) {
        return None;
    }
    let folder = source_path.parent()?;
    ["README.md", "readme.md"]
        .iter()
        .map(|name| folder.join(name))
        .filter(|candidate| candidate.is_file())
        .find_map(|candidate| {
            let content = fs::read_to_string(&candidate).ok()?;
            first_heading_level(&content)
        })
}

/// Shift every heading of `content` by `delta`, clamped to `1..=6`.
pub fn shift_headings(content: &str, delta: isize) -> String {
    if delta == 0 {
        return content.to_string();
    }
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let front_matter = front_matter_end(&lines.iter().map(|l| l.trim_end()).collect::<Vec<_>>());
    let mut fences = FenceTracker::new();
    let mut out = String::with_capacity(content.len() + 16);

    for (idx, raw) in lines.iter().enumerate() {
        let line = raw.trim_end_matches(['\n', '\r']);
        let newline = &raw[line.len()..];
        if front_matter.is_some_and(|end| idx <= end) || fences.is_fenced(line) {
            out.push_str(raw);
            continue;
        }
        match parse_atx(line) {
            Some(heading) => {
                let level = (heading.level as isize + delta).clamp(1, 6) as usize;
                out.push_str(&"#".repeat(level));
                if !heading.text.is_empty() {
                    out.push(' ');
                    out.push_str(heading.text);
                }
                out.push_str(newline);
            }
            None => out.push_str(raw),
        }
    }
    out
}

/// Shift headings so the first one lands at `target_level`.
pub fn align_to_level(content: &str, target_level: usize) -> String {
    match first_heading_level(content) {
        Some(current) => shift_headings(content, target_level as isize - current as isize),
        None => content.to_string(),
    }
}

/// Realign `content` (read from `source_path`) one level below the first
/// heading of the README in the same folder.
///
/// Returns the content unchanged when there is no parent README, the
/// document has no heading, or the document is itself a README.
pub fn align(content: &str, source_path: &Path) -> String {
    let Some(parent_level) = parent_readme_level(source_path) else {
        return content.to_string();
    };
    let Some(current) = first_heading_level(content) else {
        return content.to_string();
    };
    let target = (parent_level + 1).min(6);
    if target != current {
        debug!(path = %source_path.display(), from = current, to = target, "realigning headings");
    }
    shift_headings(content, target as isize - current as isize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn book(readme: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("a/README.md"), readme).unwrap();
        tmp
    }

    // =========================================================================
    // align
    // =========================================================================

    #[test]
    fn child_sits_below_parent_readme() {
        let tmp = book("## Section A\n");
        let out = align("# Details\n## Sub\n", &tmp.path().join("a/b.md"));
        assert_eq!(out, "### Details\n#### Sub\n");
    }

    #[test]
    fn align_is_idempotent() {
        let tmp = book("## Section A\n");
        let path = tmp.path().join("a/b.md");
        let once = align("# Details\n\ntext\n## Sub\n", &path);
        assert_eq!(align(&once, &path), once);
    }

    #[test]
    fn shallower_when_child_is_too_deep() {
        let tmp = book("# Top\n");
        let out = align("### Deep\n#### Deeper\n", &tmp.path().join("a/b.md"));
        assert_eq!(out, "## Deep\n### Deeper\n");
    }

    #[test]
    fn no_parent_readme_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let content = "# Title\n";
        assert_eq!(align(content, &tmp.path().join("b.md")), content);
    }

    #[test]
    fn readme_itself_is_unchanged() {
        let tmp = book("## Section A\n");
        let content = "## Section A\n### Sub\n";
        assert_eq!(align(content, &tmp.path().join("a/README.md")), content);
    }

    #[test]
    fn front_matter_only_is_unchanged() {
        let tmp = book("## Section A\n");
        let content = "---\ntitle: x\n---\n";
        assert_eq!(align(content, &tmp.path().join("a/b.md")), content);
    }

    #[test]
    fn parent_heading_inside_fence_is_ignored() {
        let tmp = book("```\n# not a heading\n```\n### Real\n");
        let out = align("# Child\n", &tmp.path().join("a/b.md"));
        assert_eq!(out, "#### Child\n");
    }

    // =========================================================================
    // shift_headings
    // =========================================================================

    #[test]
    fn skips_front_matter_and_fences() {
        let content = "---\n# yaml comment\n---\n# Title\n~~~\n# code\n```\n# still code\n~~~\n## Tail\n";
        let out = shift_headings(content, 1);
        assert_eq!(
            out,
            "---\n# yaml comment\n---\n## Title\n~~~\n# code\n```\n# still code\n~~~\n### Tail\n"
        );
    }

    #[test]
    fn clamps_to_valid_range() {
        assert_eq!(shift_headings("# A\n###### B\n", 2), "### A\n###### B\n");
        assert_eq!(shift_headings("## A\n# B\n", -3), "# A\n# B\n");
    }

    #[test]
    fn hashtags_are_not_headings() {
        assert_eq!(shift_headings("#tag\n# Real\n", 1), "#tag\n## Real\n");
    }

    #[test]
    fn preserves_missing_trailing_newline_and_crlf() {
        assert_eq!(shift_headings("# A\r\ntext", 1), "## A\r\ntext");
    }

    #[test]
    fn align_to_explicit_level() {
        assert_eq!(align_to_level("## A\n### B\n", 1), "# A\n## B\n");
        assert_eq!(align_to_level("plain\n", 3), "plain\n");
    }
}
