//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Output leads with what the user cares about (document titles, font
//! names, layer kinds) and shows filesystem paths as indented `Source:`
//! context lines underneath. Positional indices are 1-based and padded to
//! three digits so long reading orders stay aligned.
//!
//! # Output Format
//!
//! ## Summary
//!
//! ```text
//! Summary (updated): content/SUMMARY.md
//! 001 Introduction
//!     Source: README.md
//! 002 Guide
//!     Source: guide/README.md
//!     001 Setup
//!         Source: guide/setup.md
//! ```
//!
//! ## Fonts
//!
//! ```text
//! Fonts (2 resolved, 1 downloaded)
//! 001 EMOJI Twemoji Mozilla [downloaded]
//!     Source: ~/.cache/gitbook-worker/fonts/emoji/Twemoji.Mozilla.ttf
//! Descriptor: /tmp/gitbook-worker-fonts-x1/fonts.meta.yml
//! ```
//!
//! ## Build
//!
//! ```text
//! Publication book (a4)
//!     Project: Handbook
//!     Summary: updated
//! 001 README.md → #md-readme
//! 002 guide/setup.md → #md-guide-setup (1 table, 1 wrapped)
//! Prepared 2 documents → publish/handbook.md
//! ```
//!
//! # Architecture
//!
//! Each entity has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::LayeredConfig;
use crate::exit_codes::ExitCodeInfo;
use crate::fonts::FontResult;
use crate::frontmatter::FrontMatterIssue;
use crate::paths::to_posix;
use crate::pipeline::PreparedPublication;
use crate::preprocess::PageStats;
use crate::summary::{ContentNode, SummaryOutcome, SummaryTree};

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 { format!("{n} {word}") } else { format!("{n} {word}s") }
}

fn outcome_label(outcome: &SummaryOutcome) -> &'static str {
    match outcome {
        SummaryOutcome::Updated(_) => "updated",
        SummaryOutcome::Unchanged(_) => "unchanged",
        SummaryOutcome::Manual(_) => "manual",
    }
}

/// Short page statistics, empty when nothing was found.
///
/// ```text
/// (2 tables, 1 wrapped; 3 images)
/// ```
fn stats_detail(stats: &PageStats) -> String {
    let mut parts = Vec::new();
    if stats.tables > 0 {
        let mut part = plural(stats.tables, "table");
        if stats.wrapped_tables > 0 {
            part.push_str(&format!(", {} wrapped", stats.wrapped_tables));
        }
        parts.push(part);
    }
    if stats.images > 0 {
        let mut part = plural(stats.images, "image");
        if stats.wrapped_images > 0 {
            part.push_str(&format!(", {} wrapped", stats.wrapped_images));
        }
        parts.push(part);
    }
    if parts.is_empty() { String::new() } else { format!(" ({})", parts.join("; ")) }
}

// ============================================================================
// Summary
// ============================================================================

fn summary_node_lines(nodes: &[ContentNode], depth: usize, lines: &mut Vec<String>) {
    for (i, node) in nodes.iter().enumerate() {
        lines.push(format!("{}{} {}", indent(depth), format_index(i + 1), node.title));
        if let Some(path) = &node.path {
            lines.push(format!("{}Source: {}", indent(depth + 1), path));
        }
        summary_node_lines(&node.children, depth + 1, lines);
    }
}

/// Format a summary tree as an indexed outline.
pub fn format_summary_tree(tree: &SummaryTree) -> Vec<String> {
    let mut lines = Vec::new();
    summary_node_lines(&tree.entries, 0, &mut lines);
    lines
}

/// Format what `ensure_summary` did, followed by the outline when known.
pub fn format_summary(outcome: &SummaryOutcome, tree: Option<&SummaryTree>) -> Vec<String> {
    let mut lines = vec![format!(
        "Summary ({}): {}",
        outcome_label(outcome),
        to_posix(outcome.path())
    )];
    if let Some(tree) = tree {
        lines.extend(format_summary_tree(tree));
    }
    lines
}

pub fn print_summary(outcome: &SummaryOutcome, tree: Option<&SummaryTree>) {
    for line in format_summary(outcome, tree) {
        println!("{}", line);
    }
}

// ============================================================================
// Fonts
// ============================================================================

/// Format resolved fonts and the runtime descriptor location.
pub fn format_fonts(result: &FontResult) -> Vec<String> {
    let mut lines = vec![format!(
        "Fonts ({} resolved, {} downloaded)",
        result.resolved.len(),
        result.downloads
    )];
    for (i, font) in result.resolved.iter().enumerate() {
        lines.push(format!(
            "{} {} {} [{}]",
            format_index(i + 1),
            font.key,
            font.name,
            font.source
        ));
        for path in &font.paths {
            lines.push(format!("{}Source: {}", indent(1), to_posix(path)));
        }
    }
    lines.push(format!("Descriptor: {}", to_posix(&result.meta_path)));
    lines
}

pub fn print_fonts(result: &FontResult) {
    for line in format_fonts(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Config
// ============================================================================

/// Format the layers that went into a merged configuration.
pub fn format_config_layers(config: &LayeredConfig) -> Vec<String> {
    let mut lines = vec!["Layers".to_string()];
    for (i, (kind, path)) in config.applied.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), kind));
        lines.push(format!("{}Source: {}", indent(1), to_posix(path)));
    }
    for (kind, path) in &config.skipped {
        lines.push(format!("--- {} (skipped, unreadable)", kind));
        lines.push(format!("{}Source: {}", indent(1), to_posix(path)));
    }
    lines
}

// ============================================================================
// Front matter
// ============================================================================

/// Format front matter issues, one block per file.
///
/// ```text
/// content/intro.md:3: did not find expected ',' or ']'
///     title: [broken
/// ```
pub fn format_frontmatter_issues(issues: &[FrontMatterIssue]) -> Vec<String> {
    let mut lines = Vec::new();
    for issue in issues {
        lines.push(format!("{}:{}: {}", to_posix(&issue.path), issue.line, issue.message));
        if let Some(snippet) = &issue.snippet {
            lines.extend(snippet.lines().map(|l| format!("{}{}", indent(1), l)));
        }
    }
    if issues.is_empty() {
        lines.push("Front matter OK".to_string());
    } else {
        lines.push(format!("{} with malformed front matter", plural(issues.len(), "file")));
    }
    lines
}

pub fn print_frontmatter_issues(issues: &[FrontMatterIssue]) {
    for line in format_frontmatter_issues(issues) {
        println!("{}", line);
    }
}

// ============================================================================
// Exit codes
// ============================================================================

/// Format registry entries as a fixed-width table.
pub fn format_exit_codes(infos: &[&ExitCodeInfo]) -> Vec<String> {
    let rows: Vec<[String; 4]> = std::iter::once(["Code", "Component", "Summary", "Healing"].map(String::from))
        .chain(infos.iter().map(|i| {
            [
                i.code.to_string(),
                i.component.to_string(),
                i.summary.to_string(),
                i.healing.to_string(),
            ]
        }))
        .collect();
    let widths: Vec<usize> = (0..4)
        .map(|c| rows.iter().map(|r| r[c].chars().count()).max().unwrap_or(0))
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (idx, row) in rows.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        lines.push(cells.join(" | ").trim_end().to_string());
        if idx == 0 {
            lines.push(widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
        }
    }
    lines
}

pub fn print_exit_codes(infos: &[&ExitCodeInfo]) {
    for line in format_exit_codes(infos) {
        println!("{}", line);
    }
}

// ============================================================================
// Publication
// ============================================================================

/// Format a prepared publication: header, documents in reading order, totals.
pub fn format_publication(publication: &PreparedPublication) -> Vec<String> {
    let mut lines = vec![format!("Publication {} ({})", publication.name, publication.paper)];
    lines.push(format!("{}Project: {}", indent(1), publication.metadata.name));
    if let Some(summary) = &publication.summary {
        lines.push(format!("{}Summary: {}", indent(1), outcome_label(summary)));
    }
    for warning in &publication.metadata.warnings {
        lines.push(format!("{}Warning: {}", indent(1), warning));
    }

    for (i, doc) in publication.documents.iter().enumerate() {
        lines.push(format!(
            "{} {} → #{}{}",
            format_index(i + 1),
            doc.link,
            doc.anchor,
            stats_detail(&doc.stats)
        ));
    }
    for link in &publication.skipped {
        lines.push(format!("--- {} (missing, skipped)", link));
    }

    lines.push(format!(
        "Prepared {} → {}",
        plural(publication.documents.len(), "document"),
        to_posix(&publication.output_path)
    ));
    lines
}

pub fn print_publication(publication: &PreparedPublication) {
    for line in format_publication(publication) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::lookup;
    use crate::summary::{SubMode, SummaryMode};
    use std::path::PathBuf;

    fn tree() -> SummaryTree {
        let mut guide = ContentNode::document("Guide", "guide/README.md");
        guide.add_child(ContentNode::document("Setup", "guide/setup.md"));
        SummaryTree {
            entries: vec![ContentNode::document("Introduction", "README.md"), guide],
            mode: SummaryMode::GitbookStyle,
            submode: SubMode::None,
            manual_order: None,
        }
    }

    // =========================================================================
    // Summary
    // =========================================================================

    #[test]
    fn summary_outline_is_indexed_and_nested() {
        let outcome = SummaryOutcome::Updated(PathBuf::from("content/SUMMARY.md"));
        let lines = format_summary(&outcome, Some(&tree()));
        assert_eq!(
            lines,
            vec![
                "Summary (updated): content/SUMMARY.md",
                "001 Introduction",
                "    Source: README.md",
                "002 Guide",
                "    Source: guide/README.md",
                "    001 Setup",
                "        Source: guide/setup.md",
            ]
        );
    }

    // =========================================================================
    // Stats and tables
    // =========================================================================

    #[test]
    fn stats_detail_only_mentions_what_exists() {
        assert_eq!(stats_detail(&PageStats::default()), "");
        let stats = PageStats {
            tables: 2,
            wrapped_tables: 1,
            images: 1,
            wrapped_images: 0,
        };
        assert_eq!(stats_detail(&stats), " (2 tables, 1 wrapped; 1 image)");
    }

    #[test]
    fn exit_code_table_is_aligned() {
        let lines = format_exit_codes(&lookup(Some(42)));
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Code | Component"));
        assert!(lines[1].starts_with("-----+-"));
        assert!(lines[2].starts_with("42   | frontmatter"));
    }

    #[test]
    fn frontmatter_report_counts_files() {
        let issues = vec![FrontMatterIssue {
            path: PathBuf::from("content/a.md"),
            line: 3,
            message: "bad".into(),
            snippet: Some("title: [x".into()),
        }];
        assert_eq!(
            format_frontmatter_issues(&issues),
            vec!["content/a.md:3: bad", "    title: [x", "1 file with malformed front matter"]
        );
        assert_eq!(format_frontmatter_issues(&[]), vec!["Front matter OK"]);
    }
}
