//! Cross-document links and per-file anchors.
//!
//! In a combined PDF every chapter lives in one document, so a link to
//! `../ch2/setup.md` must become a jump to an anchor placed at the top of
//! that chapter. Anchors are derived from the file path alone:
//!
//! ```text
//! /book/content/ch2/setup.md  ->  md-ch2-setup
//! ```
//!
//! Segments after a `content` directory are used when present; at most the
//! last three segments are kept.

use crate::markdown::{FenceTracker, front_matter_end};
use crate::paths::{clean, resolve};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?P<label>[^\]]+)\]\((?P<inner>[^)]+)\)").unwrap());
static URL_SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").unwrap());
static NON_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9a-z]+").unwrap());

const ANCHOR_ROOT_HINTS: [&str; 1] = ["content"];
const MAX_ANCHOR_SEGMENTS: usize = 3;

/// Path segments an anchor is built from.
fn anchor_parts(path: &Path) -> Vec<String> {
    let without_ext = path.with_extension("");
    let parts: Vec<String> = without_ext
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let hinted = ANCHOR_ROOT_HINTS.iter().find_map(|hint| {
        let idx = parts.iter().position(|p| p.eq_ignore_ascii_case(hint))?;
        let tail = &parts[idx + 1..];
        (!tail.is_empty()).then_some(tail)
    });
    let tail = hinted.unwrap_or(&parts);
    tail[tail.len().saturating_sub(MAX_ANCHOR_SEGMENTS)..].to_vec()
}

/// Deterministic anchor id (`md-…`) for a Markdown file.
pub fn anchor_from_path(path: &Path) -> String {
    let source = anchor_parts(path).join("-").to_lowercase();
    let slug = NON_ALNUM_RE.replace_all(&source, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "md-section".to_string()
    } else {
        format!("md-{slug}")
    }
}

/// Anchor ids per resolved path, kept for the lifetime of one publication.
#[derive(Debug, Default)]
pub struct AnchorCache {
    anchors: HashMap<PathBuf, String>,
}

impl AnchorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor_for(&mut self, path: &Path) -> String {
        let resolved = resolve(path);
        self.anchors
            .entry(resolved)
            .or_insert_with_key(|p| anchor_from_path(p))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

/// Split a link destination into the URL and whatever follows it (a title,
/// surrounding whitespace). `<…>` destinations are unwrapped.
pub fn split_destination(inner: &str) -> (&str, String) {
    let trimmed = inner.trim_start();
    let leading = &inner[..inner.len() - trimmed.len()];
    if trimmed.is_empty() {
        return ("", inner.to_string());
    }
    if let Some(rest) = trimmed.strip_prefix('<')
        && let Some(end) = rest.find('>')
    {
        return (&rest[..end], format!("{leading}{}", &rest[end + 1..]));
    }
    match trimmed.find(char::is_whitespace) {
        Some(idx) => (&trimmed[..idx], format!("{leading}{}", &trimmed[idx..])),
        None => (trimmed, leading.to_string()),
    }
}

/// Links that never point into the book: fragments, `mailto:`, `tel:`,
/// protocol-relative and anything with a URI scheme.
pub fn is_external(target: &str) -> bool {
    let t = target.trim();
    t.is_empty()
        || t.starts_with('#')
        || t.starts_with("mailto:")
        || t.starts_with("tel:")
        || t.starts_with("//")
        || URL_SCHEME_RE.is_match(t)
}

fn is_markdown_target(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".md") || lower.ends_with(".markdown")
}

/// New destination for `target`, or `None` to leave the link alone.
///
/// Only links to existing Markdown files are rewritten. An explicit
/// fragment wins over the file anchor.
pub fn rewrite_target(target: &str, base_dir: &Path, anchors: &mut AnchorCache) -> Option<String> {
    if is_external(target) {
        return None;
    }
    let (path_part, fragment) = target.split_once('#').unwrap_or((target, ""));
    if !is_markdown_target(path_part) {
        return None;
    }
    let candidate = PathBuf::from(path_part.replace('\\', "/"));
    let joined = if candidate.is_absolute() { candidate } else { base_dir.join(candidate) };
    let resolved = resolve(&clean(&joined));
    if !resolved.exists() {
        return None;
    }
    if !fragment.is_empty() {
        return Some(format!("#{fragment}"));
    }
    Some(format!("#{}", anchors.anchor_for(&resolved)))
}

/// Rewrite one line's links. Image links (`![…](…)`) are left alone.
pub fn rewrite_line(line: &str, base_dir: &Path, anchors: &mut AnchorCache) -> String {
    LINK_RE
        .replace_all(line, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            if line[..start].ends_with('!') {
                return whole.to_string();
            }
            let (url, suffix) = split_destination(&caps["inner"]);
            if url.is_empty() {
                return whole.to_string();
            }
            match rewrite_target(url, base_dir, anchors) {
                Some(target) => format!("[{}]({target}{suffix})", &caps["label"]),
                None => whole.to_string(),
            }
        })
        .into_owned()
}

/// Rewrite internal links on every line outside front matter and fenced code.
pub fn rewrite_internal_links(lines: Vec<String>, current_file: &Path, anchors: &mut AnchorCache) -> Vec<String> {
    let base_dir = current_file.parent().map(Path::to_path_buf).unwrap_or_default();
    let prose_start = front_matter_end(&lines).map(|end| end + 1).unwrap_or(0);
    let mut fences = FenceTracker::new();
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            if i < prose_start || fences.is_fenced(&line) {
                line
            } else {
                rewrite_line(&line, &base_dir, anchors)
            }
        })
        .collect()
}

/// Insert `<a id="anchor"></a>` and a blank line after the front matter,
/// or at the top. A document already carrying that anchor is unchanged.
pub fn insert_anchor(body: &str, anchor: &str) -> String {
    let anchor_line = format!("<a id=\"{anchor}\"></a>\n\n");
    let lines: Vec<&str> = body.split_inclusive('\n').collect();
    let trimmed: Vec<&str> = lines.iter().map(|l| l.trim_end()).collect();
    let insert_at = front_matter_end(&trimmed).map(|end| end + 1).unwrap_or(0);

    let existing = format!("<a id=\"{anchor}\"></a>");
    if trimmed.get(insert_at).is_some_and(|l| l.trim() == existing) {
        return body.to_string();
    }
    let split = lines[..insert_at].iter().map(|l| l.len()).sum::<usize>();
    let mut out = String::with_capacity(body.len() + anchor_line.len());
    out.push_str(&body[..split]);
    out.push_str(&anchor_line);
    out.push_str(&body[split..]);
    out
}
