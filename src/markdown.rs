//! Line-level Markdown helpers: front matter, fenced code, ATX headings.
//!
//! None of the publishing steps parse Markdown into a tree. They walk lines
//! and need three facts about each one: is it inside the leading YAML front
//! matter, is it inside a fenced code block, and is it an ATX heading.

/// Index of the closing `---` of a front matter block starting on line 0.
///
/// Returns `None` if the document does not open with `---` or the block is
/// never closed.
pub fn front_matter_end<S: AsRef<str>>(lines: &[S]) -> Option<usize> {
    let first = lines.first()?;
    if first.as_ref().trim() != "---" {
        return None;
    }
    lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| line.as_ref().trim() == "---")
        .map(|(idx, _)| idx)
}

/// Tracks whether a line walk is inside a fenced code block.
///
/// Fences open with ```` ``` ```` or `~~~`; only a fence of the same marker
/// closes the block.
#[derive(Debug, Default)]
pub struct FenceTracker {
    marker: Option<&'static str>,
}

impl FenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next line. Returns `true` if the line belongs to a fenced
    /// block (including the fence lines themselves) and must be left alone.
    pub fn is_fenced(&mut self, line: &str) -> bool {
        let stripped = line.trim_start();
        let marker = if stripped.starts_with("```") {
            Some("```")
        } else if stripped.starts_with("~~~") {
            Some("~~~")
        } else {
            None
        };
        match (self.marker, marker) {
            (None, Some(m)) => {
                self.marker = Some(m);
                true
            }
            (Some(open), Some(m)) if open == m => {
                self.marker = None;
                true
            }
            (Some(_), _) => true,
            (None, None) => false,
        }
    }

    pub fn in_fence(&self) -> bool {
        self.marker.is_some()
    }
}

/// An ATX heading split into its level and the text after the hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtxHeading<'a> {
    pub level: usize,
    pub text: &'a str,
}

/// Parse an ATX heading: 1 to 6 `#` after optional indentation, followed by
/// whitespace or end of line.
pub fn parse_atx(line: &str) -> Option<AtxHeading<'_>> {
    let stripped = line.trim_start();
    let level = stripped.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &stripped[level..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(AtxHeading {
        level,
        text: rest.trim(),
    })
}

/// Iterate the content lines of a document that are neither front matter
/// nor fenced code, together with their line index.
pub fn prose_lines<'a>(lines: &'a [&'a str]) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    let skip_until = front_matter_end(lines).map(|end| end + 1).unwrap_or(0);
    let mut fences = FenceTracker::new();
    lines
        .iter()
        .enumerate()
        .skip(skip_until)
        .filter(move |(_, line)| !fences.is_fenced(line))
        .map(|(idx, line)| (idx, *line))
}

/// Level of the first ATX heading outside front matter and fenced code.
pub fn first_heading_level(content: &str) -> Option<usize> {
    let lines: Vec<&str> = content.lines().collect();
    prose_lines(&lines).find_map(|(_, line)| parse_atx(line).map(|h| h.level))
}

/// Text of the first `#` line after the front matter, hashes stripped.
///
/// Looser than [`parse_atx`]: `#Title` also counts, matching how GitBook
/// picks chapter titles.
pub fn first_heading_text(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let skip_until = front_matter_end(&lines).map(|end| end + 1).unwrap_or(0);
    lines.iter().skip(skip_until).find_map(|line| {
        let stripped = line.trim();
        stripped
            .starts_with('#')
            .then(|| stripped.trim_start_matches('#').trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Front matter
    // =========================================================================

    #[test]
    fn front_matter_closed_block() {
        let lines = ["---", "title: x", "---", "# H"];
        assert_eq!(front_matter_end(&lines), Some(2));
    }

    #[test]
    fn front_matter_unclosed_is_none() {
        let lines = ["---", "title: x", "# H"];
        assert_eq!(front_matter_end(&lines), None);
    }

    #[test]
    fn front_matter_must_start_on_first_line() {
        let lines = ["", "---", "a: 1", "---"];
        assert_eq!(front_matter_end(&lines), None);
    }

    // =========================================================================
    // Fences
    // =========================================================================

    #[test]
    fn fence_closes_only_on_matching_marker() {
        let mut f = FenceTracker::new();
        assert!(!f.is_fenced("text"));
        assert!(f.is_fenced("```rust"));
        assert!(f.is_fenced("~~~"));
        assert!(f.in_fence());
        assert!(f.is_fenced("```"));
        assert!(!f.in_fence());
        assert!(!f.is_fenced("after"));
    }

    #[test]
    fn tilde_fence() {
        let mut f = FenceTracker::new();
        assert!(f.is_fenced("  ~~~"));
        assert!(f.is_fenced("# not a heading"));
        assert!(f.is_fenced("~~~"));
        assert!(!f.is_fenced("# heading"));
    }

    // =========================================================================
    // Headings
    // =========================================================================

    #[test]
    fn parse_atx_levels() {
        assert_eq!(parse_atx("# Title").map(|h| h.level), Some(1));
        assert_eq!(parse_atx("###### Six").map(|h| h.level), Some(6));
        assert_eq!(parse_atx("####### Seven"), None);
        assert_eq!(parse_atx("#hashtag"), None);
        assert_eq!(parse_atx("##").map(|h| h.level), Some(2));
        assert_eq!(parse_atx("  ## Indented").map(|h| h.text), Some("Indented"));
    }

    #[test]
    fn first_heading_skips_front_matter_and_fences() {
        let doc = "---\ntitle: '# no'\n---\n```\n# code\n```\n## Real\n";
        assert_eq!(first_heading_level(doc), Some(2));
    }

    #[test]
    fn first_heading_none_when_only_front_matter() {
        assert_eq!(first_heading_level("---\na: 1\n---\n"), None);
    }

    #[test]
    fn first_heading_text_strips_hashes() {
        assert_eq!(first_heading_text("---\na: 1\n---\n\n## Setup\n").as_deref(), Some("Setup"));
        assert_eq!(first_heading_text("no heading"), None);
    }
}
