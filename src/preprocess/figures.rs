//! HTML `<figure>` blocks to Markdown images.
//!
//! GitBook content often embeds figures as raw HTML, which LaTeX output
//! drops. Each block becomes a single image line; the caption (or the
//! image's `alt`) becomes the Markdown alt text.

use crate::markdown::FenceTracker;
use regex::Regex;
use std::sync::LazyLock;

static FIGURE_START_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<figure\b").unwrap());
static FIGURE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</figure>").unwrap());
static IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<img\b[^>]*src=["'](?P<src>[^"']+)["'][^>]*?(?:alt=["'](?P<alt>[^"']*)["'][^>]*)?>"#,
    )
    .unwrap()
});
static FIGCAPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<figcaption\b[^>]*>(?P<caption>.*?)</figcaption>").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

fn strip_html(value: &str) -> String {
    let without_tags = HTML_TAG_RE.replace_all(value, "");
    html_escape::decode_html_entities(&without_tags).trim().to_string()
}

/// Convert one `<figure>…</figure>` block. Blocks without an `<img src>`
/// are returned unchanged.
pub fn convert_figure_block(block: &str) -> String {
    let Some(img) = IMG_RE.captures(block) else {
        return block.to_string();
    };
    let src = img.name("src").map(|m| m.as_str().trim()).unwrap_or("");
    if src.is_empty() {
        return block.to_string();
    }
    let alt = img
        .name("alt")
        .map(|m| html_escape::decode_html_entities(m.as_str()).trim().to_string())
        .unwrap_or_default();
    let caption = FIGCAPTION_RE
        .captures(block)
        .and_then(|c| c.name("caption").map(|m| strip_html(m.as_str())))
        .unwrap_or_default();

    let alt_text = [caption.as_str(), alt.as_str()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or("Image");
    let safe_alt_text = alt_text.replace('[', r"\[").replace(']', r"\]");
    let attrs = if !alt.is_empty() && alt_text != alt {
        format!("{{fig-alt=\"{}\"}}", alt.replace('"', "\\\""))
    } else {
        String::new()
    };
    format!("![{safe_alt_text}]({src}){attrs}\n")
}

/// Replace HTML figure blocks outside fenced code with Markdown images.
/// An unclosed figure is kept as written.
pub fn convert_html_figures(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    let mut buffer: Vec<String> = Vec::new();
    let mut fences = FenceTracker::new();

    for line in lines {
        if !buffer.is_empty() {
            let closes = FIGURE_END_RE.is_match(&line);
            buffer.push(line);
            if closes {
                out.push(convert_figure_block(&buffer.concat()));
                buffer.clear();
            }
            continue;
        }
        if fences.is_fenced(&line) || !FIGURE_START_RE.is_match(&line) {
            out.push(line);
            continue;
        }
        if FIGURE_END_RE.is_match(&line) {
            out.push(convert_figure_block(&line));
        } else {
            buffer.push(line);
        }
    }
    out.extend(buffer);
    out
}
