//! Joining preprocessed documents into the single Markdown file Pandoc
//! renders.
//!
//! Two text fixes run on every document before joining:
//!
//! - Unicode subscript digits (`H₂O`) have no glyph in most text fonts.
//!   Outside math they become `$_2$`; inside `$…$` or `$$…$$` they become
//!   `_{2}`.
//! - `\[m]` (an escaped opening bracket GitBook writes for literal brackets)
//!   is turned back into `[m]`. Display math `\[x\]` is left alone.
//!
//! The combined document then gets a YAML header carrying the page geometry
//! and the LaTeX packages the longtable output relies on.

use crate::markdown::front_matter_end;
use crate::preprocess::Paper;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::LazyLock;
use tracing::{info, warn};

/// Separator between documents.
pub const PAGE_BREAK: &str = "\n\n\\newpage\n\n";

/// `header-includes` lines every combined document carries.
pub const HEADER_INCLUDES: &[&str] = &[
    r"\usepackage{calc}",
    r"\usepackage{enumitem}",
    r"\setlistdepth{20}",
    r"\usepackage{longtable}",
    r"\usepackage{ltablex}",
    r"\usepackage{booktabs}",
    r"\usepackage{array}",
    r"\keepXColumns",
    r"\setlength\LTleft{0pt}",
    r"\setlength\LTright{0pt}",
];

static ESCAPED_BRACKET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\\[([^\n\\]*?)\]").unwrap());

fn subscript_digit(c: char) -> Option<char> {
    match c {
        '₀'..='₉' => char::from_digit(c as u32 - '₀' as u32, 10),
        _ => None,
    }
}

/// Rewrite subscript digits and unescape `\[…]` brackets.
pub fn normalize_md(text: &str) -> String {
    let text = ESCAPED_BRACKET_RE.replace_all(text, "[$1]");
    let mut out = String::with_capacity(text.len());
    let mut in_math = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            in_math = !in_math;
            out.push('$');
            if chars.peek() == Some(&'$') {
                chars.next();
                out.push('$');
            }
            continue;
        }
        match subscript_digit(c) {
            Some(d) if in_math => {
                out.push_str("_{");
                out.push(d);
                out.push('}');
            }
            Some(d) => {
                out.push_str("$_");
                out.push(d);
                out.push('$');
            }
            None => out.push(c),
        }
    }
    out
}

/// Normalize each document and join them with [`PAGE_BREAK`].
pub fn combine<S: AsRef<str>>(documents: &[S]) -> String {
    info!(documents = documents.len(), "combining documents");
    documents
        .iter()
        .map(|d| normalize_md(d.as_ref()))
        .collect::<Vec<_>>()
        .join(PAGE_BREAK)
}

fn split_front_matter(text: &str) -> (Mapping, String) {
    let lines: Vec<&str> = text.lines().collect();
    let Some(end) = front_matter_end(&lines) else {
        return (Mapping::new(), text.to_string());
    };
    let head = lines[1..end].join("\n");
    let mut body = lines[end + 1..].join("\n").trim_start_matches('\n').to_string();
    if text.ends_with('\n') && !body.is_empty() {
        body.push('\n');
    }
    let meta = match serde_yaml::from_str::<Value>(&head) {
        Ok(Value::Mapping(m)) => m,
        Ok(_) => Mapping::new(),
        Err(e) => {
            warn!(error = %e, "replacing unreadable front matter");
            Mapping::new()
        }
    };
    (meta, body)
}

/// Set the top-level `geometry` list for `paper` and make sure
/// [`HEADER_INCLUDES`] are present in `header-includes`. Existing front
/// matter keys are kept; applying twice gives the same result.
pub fn add_geometry_header(text: &str, paper: &Paper) -> Result<String, serde_yaml::Error> {
    let (mut meta, body) = split_front_matter(text);
    let (width, height) = paper.size_mm;
    let (left, top, right, bottom) = paper.margins_mm;

    let geometry = [
        format!("paperwidth={width}mm"),
        format!("paperheight={height}mm"),
        format!("left={left}mm"),
        format!("right={right}mm"),
        format!("top={top}mm"),
        format!("bottom={bottom}mm"),
    ];
    meta.insert(
        Value::from("geometry"),
        Value::Sequence(geometry.into_iter().map(Value::from).collect()),
    );

    let mut includes: Vec<String> = match meta.get("header-includes") {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    };
    for line in HEADER_INCLUDES {
        if !includes.iter().any(|l| l == line) {
            includes.push(line.to_string());
        }
    }
    includes.retain(|l| !l.trim().starts_with(r"\usepackage{geometry}"));
    meta.insert(
        Value::from("header-includes"),
        Value::Sequence(includes.into_iter().map(Value::from).collect()),
    );

    let yaml = serde_yaml::to_string(&meta)?;
    Ok(format!("---\n{yaml}---\n\n{body}"))
}
