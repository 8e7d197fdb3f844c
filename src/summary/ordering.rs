//! Sibling ordering: natural sort, appendix placement, manifest priorities.

use super::{ContentNode, SubMode, SummaryMode};
use crate::naming::{SortKey, natural_sort_key};
use crate::paths::normalize_key;
use regex::Regex;
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static APPENDIX_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(Anhang|Appendix)\s+([A-Z])").unwrap());

/// Explicit ordering priorities keyed by normalized path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestOrder {
    index: HashMap<String, usize>,
}

impl ManifestOrder {
    /// Build from entries in order. Keys are normalized; the first position
    /// of a repeated key wins and empty keys are ignored.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = HashMap::new();
        for (pos, raw) in entries.into_iter().enumerate() {
            let key = normalize_key(raw.as_ref());
            if !key.is_empty() {
                index.entry(key).or_insert(pos);
            }
        }
        Self { index }
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Priority of `node`, trying its path then its source path in several
    /// spellings. The first candidate that matches wins.
    pub fn index_of(&self, node: &ContentNode) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        [node.path.as_deref(), node.source_path.as_deref()]
            .into_iter()
            .flatten()
            .flat_map(key_candidates)
            .map(|c| normalize_key(&c))
            .filter(|k| !k.is_empty())
            .find_map(|k| self.get(&k))
    }
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = s.len().checked_sub(suffix.len())?;
    (s.is_char_boundary(cut) && s[cut..].eq_ignore_ascii_case(suffix)).then(|| &s[..cut])
}

/// Candidate spellings of a path, in match precedence order:
///
/// 1. the path itself
/// 2. without `.md`
/// 3. without `/readme`
/// 4. without `readme.md` (trailing slash kept)
/// 5. without `/readme.md`
/// 6. without `/index.md`
/// 7. the path with a trailing `/`
pub fn key_candidates(posix: &str) -> Vec<String> {
    let mut out = vec![posix.to_string()];
    if let Some(s) = strip_suffix_ci(posix, ".md") {
        out.push(s.to_string());
    }
    if let Some(s) = strip_suffix_ci(posix, "/readme") {
        out.push(s.to_string());
    }
    if let Some(s) = strip_suffix_ci(posix, "/readme.md") {
        out.push(format!("{s}/"));
        out.push(s.to_string());
    }
    if let Some(s) = strip_suffix_ci(posix, "/index.md") {
        out.push(s.to_string());
    }
    out.push(format!("{posix}/"));
    out
}

/// The root README (or index) entry, always listed first.
pub fn is_root_readme(node: &ContentNode) -> bool {
    node.level == 0
        && node
            .path
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("readme.md") || p.eq_ignore_ascii_case("index.md"))
}

/// Natural key on the node title (falling back to its paths).
fn title_key(node: &ContentNode) -> SortKey {
    if is_root_readme(node) {
        return SortKey::first();
    }
    let raw = if !node.title.is_empty() {
        node.title.as_str()
    } else {
        node.path.as_deref().or(node.source_path.as_deref()).unwrap_or("")
    };
    natural_sort_key(raw)
}

/// Natural key on the node's filesystem location, so numbered file names
/// drive the order regardless of their headings.
fn location_key(node: &ContentNode) -> SortKey {
    if is_root_readme(node) {
        return SortKey::first();
    }
    let raw = node
        .source_path
        .as_deref()
        .or(node.path.as_deref())
        .unwrap_or(node.title.as_str());
    natural_sort_key(raw)
}

fn appendix_key(node: &ContentNode) -> (u8, String, String) {
    match APPENDIX_LETTER_RE.captures(&node.title) {
        Some(caps) => (0, caps[2].to_uppercase(), node.title.to_lowercase()),
        None => (
            1,
            node.title.to_lowercase(),
            node.path.clone().unwrap_or_default(),
        ),
    }
}

/// Stable reorder: manifest-listed nodes first by priority, the root README
/// before everything, then the rest in their current order.
pub fn apply_manifest_order(nodes: Vec<ContentNode>, order: Option<&ManifestOrder>) -> Vec<ContentNode> {
    let Some(order) = order.filter(|o| !o.is_empty()) else {
        return nodes;
    };
    let mut keyed: Vec<((i8, usize, usize), ContentNode)> = nodes
        .into_iter()
        .enumerate()
        .map(|(fallback, node)| {
            let key = match order.index_of(&node) {
                Some(idx) => (0, idx, fallback),
                None if is_root_readme(&node) => (-1, fallback, 0),
                None => (1, fallback, 0),
            };
            (key, node)
        })
        .collect();
    keyed.sort_by_key(|(key, _)| *key);
    keyed.into_iter().map(|(_, node)| node).collect()
}

fn sorted_by<K: Ord>(mut nodes: Vec<ContentNode>, key: impl Fn(&ContentNode) -> K) -> Vec<ContentNode> {
    nodes.sort_by_cached_key(|n| key(n));
    nodes
}

/// Reverse sibling order, keeping the root README in front.
fn flip(mut nodes: Vec<ContentNode>) -> Vec<ContentNode> {
    nodes.reverse();
    if let Some(pos) = nodes.iter().position(is_root_readme) {
        let readme = nodes.remove(pos);
        nodes.insert(0, readme);
    }
    nodes
}

/// Order one list of siblings according to mode and submode.
pub fn sort_nodes(
    nodes: Vec<ContentNode>,
    mode: SummaryMode,
    submode: SubMode,
    order: Option<&ManifestOrder>,
) -> Vec<ContentNode> {
    let sorted = match (mode, submode) {
        (SummaryMode::Manual, _) => return apply_manifest_order(nodes, order),
        (SummaryMode::GitbookStyle, SubMode::NoChange) => return nodes,
        (SummaryMode::GitbookStyle, SubMode::AppendixLast) => {
            let (appendices, regular): (Vec<_>, Vec<_>) = nodes.into_iter().partition(|n| n.is_appendix);
            let regular = sorted_by(regular, location_key);
            let appendices = sorted_by(appendices, |n| {
                let idx = order.and_then(|o| o.index_of(n));
                (idx.is_none(), idx.unwrap_or(0), appendix_key(n))
            });
            let mut out = apply_manifest_order(regular, order);
            out.extend(apply_manifest_order(appendices, order));
            return out;
        }
        (SummaryMode::Filesystem, _) => apply_manifest_order(nodes, order),
        (SummaryMode::Alphanumeric, _) => apply_manifest_order(sorted_by(nodes, title_key), order),
        (SummaryMode::GitbookStyle, _) => apply_manifest_order(sorted_by(nodes, location_key), order),
    };
    if submode == SubMode::Flip {
        flip(sorted)
    } else {
        sorted
    }
}

/// Sort the children of `node` and of every descendant.
pub fn sort_tree(node: &mut ContentNode, mode: SummaryMode, submode: SubMode, order: Option<&ManifestOrder>) {
    for child in &mut node.children {
        sort_tree(child, mode, submode, order);
    }
    let children = std::mem::take(&mut node.children);
    node.children = sort_nodes(children, mode, submode, order);
}

// =============================================================================
// Order manifest files
// =============================================================================

/// Extract path entries from a parsed YAML/JSON order document.
///
/// Accepts a list of strings or `{path|file|src}` mappings, or a mapping
/// holding such a list under `order`, `summary`, `chapters` or `items`.
pub fn entries_from_value(data: &Value) -> Vec<String> {
    let mut entries = Vec::new();
    match data {
        Value::Sequence(items) => {
            for item in items {
                match item {
                    Value::String(s) => entries.push(s.clone()),
                    Value::Mapping(m) => {
                        let path = ["path", "file", "src"]
                            .iter()
                            .find_map(|k| m.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()));
                        if let Some(p) = path {
                            entries.push(p.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        Value::Mapping(m) => {
            for key in ["order", "summary", "chapters", "items"] {
                if let Some(nested @ (Value::Sequence(_) | Value::Mapping(_))) = m.get(key) {
                    entries.extend(entries_from_value(nested));
                }
            }
            if entries.is_empty() {
                entries.extend(m.values().filter_map(Value::as_str).map(str::to_string));
            }
        }
        _ => {}
    }
    entries
}

/// Plain-text order file: one path per line, `#` comments, optional `- `.
pub fn entries_from_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let mut s = line.trim();
            if s.is_empty() || s.starts_with('#') {
                return None;
            }
            if let Some(rest) = s.strip_prefix("- ") {
                s = rest.trim();
            }
            let comment = s
                .char_indices()
                .find(|&(i, c)| c == '#' && s[..i].ends_with(char::is_whitespace))
                .map(|(i, _)| i);
            if let Some(i) = comment {
                s = s[..i].trim();
            }
            (!s.is_empty()).then(|| s.to_string())
        })
        .collect()
}

/// Load a summary order manifest (YAML, JSON or plain lines).
///
/// An unreadable file yields an empty order with a warning.
pub fn load_manifest_order(path: &Path) -> ManifestOrder {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "summary order manifest not readable");
            return ManifestOrder::default();
        }
    };
    let data = serde_yaml::from_str::<Value>(&text)
        .ok()
        .or_else(|| serde_json::from_str::<serde_json::Value>(&text).ok().and_then(|j| serde_yaml::to_value(j).ok()));
    let mut entries = data.as_ref().map(entries_from_value).unwrap_or_default();
    if entries.is_empty() {
        entries = entries_from_lines(&text);
    }
    let order = ManifestOrder::from_entries(entries);
    debug!(path = %path.display(), entries = order.len(), "loaded summary order manifest");
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn node(title: &str, path: &str) -> ContentNode {
        ContentNode::document(title, path)
    }

    fn titles(nodes: &[ContentNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.title.as_str()).collect()
    }

    // =========================================================================
    // Candidates and manifest matching
    // =========================================================================

    #[test]
    fn candidates_for_readme_in_order() {
        assert_eq!(
            key_candidates("part/README.md"),
            vec!["part/README.md", "part/README", "part/", "part", "part/README.md/"]
        );
    }

    #[test]
    fn candidates_for_index() {
        let c = key_candidates("a/index.md");
        assert!(c.contains(&"a".to_string()));
    }

    #[test]
    fn manifest_matches_without_extension_and_case() {
        let order = ManifestOrder::from_entries(["./Chapter-2", "chapter-1.md"]);
        assert_eq!(order.index_of(&node("x", "chapter-2.md")), Some(0));
        assert_eq!(order.index_of(&node("x", "chapter-1.md")), Some(1));
        assert_eq!(order.index_of(&node("x", "other.md")), None);
    }

    #[test]
    fn manifest_matches_directory_readme() {
        let order = ManifestOrder::from_entries(["part-b/", "part-a"]);
        let mut n = node("B", "part-b/README.md");
        n.source_path = Some("part-b".into());
        assert_eq!(order.index_of(&n), Some(0));
    }

    #[test]
    fn manifest_first_position_wins() {
        let order = ManifestOrder::from_entries(["a.md", "b.md", "a"]);
        assert_eq!(order.get("a.md"), Some(0));
        assert_eq!(order.get("a"), Some(2));
    }

    #[test]
    fn apply_manifest_is_stable_and_pins_root_readme() {
        let mut readme = node("Book", "README.md");
        readme.level = 0;
        let nodes = vec![node("C", "c.md"), readme, node("A", "a.md"), node("B", "b.md")];
        let order = ManifestOrder::from_entries(["b.md"]);
        let out = apply_manifest_order(nodes, Some(&order));
        assert_eq!(titles(&out), vec!["Book", "B", "C", "A"]);
    }

    // =========================================================================
    // Modes
    // =========================================================================

    #[test]
    fn alphanumeric_sorts_titles_naturally() {
        let nodes = vec![node("Part 10", "x.md"), node("part 2", "y.md"), node("Part 1", "z.md")];
        let out = sort_nodes(nodes, SummaryMode::Alphanumeric, SubMode::None, None);
        assert_eq!(titles(&out), vec!["Part 1", "part 2", "Part 10"]);
    }

    #[test]
    fn alphanumeric_flip_reverses() {
        let nodes = vec![node("a", "a.md"), node("b", "b.md"), node("c", "c.md")];
        let out = sort_nodes(nodes, SummaryMode::Alphanumeric, SubMode::Flip, None);
        assert_eq!(titles(&out), vec!["c", "b", "a"]);
    }

    #[test]
    fn flip_keeps_root_readme_first() {
        let nodes = vec![node("Book", "README.md"), node("a", "a.md"), node("b", "b.md")];
        let out = sort_nodes(nodes, SummaryMode::Filesystem, SubMode::Flip, None);
        assert_eq!(titles(&out), vec!["Book", "b", "a"]);
    }

    #[test]
    fn gitbook_sorts_by_file_name() {
        let nodes = vec![node("Intro", "10-intro.md"), node("Setup", "2-setup.md")];
        let out = sort_nodes(nodes, SummaryMode::GitbookStyle, SubMode::None, None);
        assert_eq!(titles(&out), vec!["Setup", "Intro"]);
    }

    #[test]
    fn appendix_last_orders_by_letter() {
        let mut b = node("Appendix B: Tables", "zz.md");
        b.is_appendix = true;
        let mut a = node("Anhang A: Glossar", "yy.md");
        a.is_appendix = true;
        let mut misc = node("Appendix notes", "aa.md");
        misc.is_appendix = true;
        let nodes = vec![b, node("Main", "1-main.md"), misc, a];
        let out = sort_nodes(nodes, SummaryMode::GitbookStyle, SubMode::AppendixLast, None);
        assert_eq!(
            titles(&out),
            vec!["Main", "Anhang A: Glossar", "Appendix B: Tables", "Appendix notes"]
        );
    }

    #[test]
    fn no_change_preserves_order() {
        let nodes = vec![node("b", "b.md"), node("a", "a.md")];
        let out = sort_nodes(nodes, SummaryMode::GitbookStyle, SubMode::NoChange, None);
        assert_eq!(titles(&out), vec!["b", "a"]);
    }

    #[test]
    fn manual_applies_only_manifest() {
        let nodes = vec![node("b", "b.md"), node("a", "a.md"), node("c", "c.md")];
        let order = ManifestOrder::from_entries(["c"]);
        let out = sort_nodes(nodes, SummaryMode::Manual, SubMode::None, Some(&order));
        assert_eq!(titles(&out), vec!["c", "b", "a"]);
    }

    // =========================================================================
    // Order manifest files
    // =========================================================================

    #[test]
    fn load_yaml_list() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("order.yml");
        fs::write(&path, "- b.md\n- path: a.md\n- file: c\n").unwrap();
        let order = load_manifest_order(&path);
        assert_eq!(order.get("b.md"), Some(0));
        assert_eq!(order.get("a.md"), Some(1));
        assert_eq!(order.get("c"), Some(2));
    }

    #[test]
    fn load_yaml_mapping_with_chapters_key() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("order.yml");
        fs::write(&path, "chapters:\n  - intro.md\n  - setup.md\n").unwrap();
        assert_eq!(load_manifest_order(&path).get("setup.md"), Some(1));
    }

    #[test]
    fn load_json_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("order.json");
        fs::write(&path, r#"{"order": ["x.md", {"src": "y.md"}]}"#).unwrap();
        let order = load_manifest_order(&path);
        assert_eq!(order.get("y.md"), Some(1));
    }

    #[test]
    fn plain_lines_with_comments() {
        let entries = entries_from_lines("# heading\n\nintro.md  # first\n- setup.md\nissue#3.md\n");
        assert_eq!(entries, vec!["intro.md", "setup.md", "issue#3.md"]);
    }

    #[test]
    fn missing_manifest_is_empty() {
        assert!(load_manifest_order(Path::new("/nonexistent/order.yml")).is_empty());
    }
}
