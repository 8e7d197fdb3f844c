//! End-to-end checks of each component through the public API.
//!
//! Every test builds its own book in a temp directory; nothing touches the
//! network or needs external converters.
//!
//! Run with: cargo test --test scenarios

use gitbook_worker::config::{self, NameKind, TemplateVars};
use gitbook_worker::fonts::{self, FontCatalog, FontError, FontSource, PrepareOptions};
use gitbook_worker::headings;
use gitbook_worker::preprocess::{Paper, Preprocessor};
use gitbook_worker::summary::{self, SubMode, SummaryMode};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

// =============================================================================
// Summary
// =============================================================================

#[test]
fn summary_uses_natural_sort_and_appendix_last() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(&root.join("README.md"), "# Book\n");
    write(&root.join("10-intro.md"), "# Intro\n");
    write(&root.join("2-setup.md"), "# Setup\n");
    write(&root.join("appendix-a.md"), "# Anhang A: Glossary\n");

    let lines = summary::generate_summary(root, SummaryMode::GitbookStyle, SubMode::AppendixLast, None).unwrap();
    assert_eq!(
        &lines[2..],
        &[
            "* [Book](README.md)",
            "* [Setup](2-setup.md)",
            "* [Intro](10-intro.md)",
            "* [Anhang A: Glossary](appendix-a.md)",
        ]
    );
}

// =============================================================================
// Headings
// =============================================================================

#[test]
fn child_headings_nest_below_parent_readme() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("a/README.md"), "## Section A\n");
    let child = tmp.path().join("a/b.md");
    write(&child, "# Details\n## Sub\n");

    let aligned = headings::align(&fs::read_to_string(&child).unwrap(), &child);
    assert!(aligned.starts_with("### Details\n#### Sub"));
}

// =============================================================================
// Links and anchors
// =============================================================================

#[test]
fn internal_links_become_anchors() {
    let tmp = TempDir::new().unwrap();
    let content = tmp.path().join("content");
    write(&content.join("ch2/setup.md"), "# Setup\n");
    let intro = content.join("ch1/intro.md");
    write(&intro, "# Intro\n\n[see](../ch2/setup.md#env)\n\n[see](../ch2/setup.md)\n");

    let mut preprocessor = Preprocessor::new();
    let out = preprocessor.preprocess(&intro, "a4").unwrap();
    assert!(out.starts_with("<a id=\"md-ch1-intro\"></a>\n\n"));
    assert!(out.contains("[see](#env)"));
    assert!(out.contains("[see](#md-ch2-setup)"));

    write(&intro, &out);
    let again = preprocessor.preprocess(&intro, "a4").unwrap();
    assert_eq!(again, out);
}

// =============================================================================
// Tables
// =============================================================================

#[test]
fn twelve_column_table_switches_to_landscape() {
    let mut header = vec!["a_b&c".to_string(), "$x_1$".to_string()];
    header.extend((3..=12).map(|i| format!("c{i}")));
    let text = format!(
        "# Data\n\n| {} |\n|{}\n| {} |\n",
        header.join(" | "),
        "---|".repeat(12),
        vec!["1"; 12].join(" | ")
    );
    let tmp = TempDir::new().unwrap();
    let doc = tmp.path().join("data.md");
    write(&doc, &text);

    let out = Preprocessor::new().preprocess_file(&doc, &Paper::a4()).unwrap();
    assert_eq!(out.stats.tables, 1);
    assert_eq!(out.stats.wrapped_tables, 1);
    assert!(out.text.contains("paperwidth=297mm,paperheight=210mm"));
    assert!(out.text.contains("\\begin{longtable}{@{}llllllllllll@{}}"));
    assert!(out.text.contains("a\\_b\\&c"));
    assert!(out.text.contains("$x_1$"));
    assert!(!out.text.contains("$x\\_1$"));
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn repository_layer_overrides_default_template() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path();
    write(
        &repo.join("defaults/docker_config.yml"),
        "docker_names:\n  test:\n    image: \"img-{branch}:latest\"\n",
    );
    write(
        &repo.join("docker_config.yml"),
        "docker_names:\n  test:\n    image: \"custom-{branch}:v1\"\n",
    );

    let vars = TemplateVars::from([("branch".to_string(), "main".to_string())]);
    let merged = config::merge_configs(repo, None, &vars);
    assert_eq!(merged.applied.len(), 2);
    let name = config::resolve_docker_name(&merged.values, NameKind::Image, "test", &vars).unwrap();
    assert_eq!(name, "custom-main:v1");
}

// =============================================================================
// Fonts
// =============================================================================

/// Serves fixed bytes for every URL and counts requests.
struct StaticFetcher {
    body: Vec<u8>,
    calls: RefCell<usize>,
}

impl fonts::Fetcher for StaticFetcher {
    fn fetch(&self, _url: &str, dest: &Path) -> Result<(), FontError> {
        *self.calls.borrow_mut() += 1;
        fs::write(dest, &self.body)?;
        Ok(())
    }
}

#[test]
fn downloaded_font_is_cached_and_refetched_when_corrupt() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let cache = tmp.path().join("cache");
    fs::create_dir_all(&repo).unwrap();

    let body = b"not really a font".to_vec();
    let sha = format!("{:x}", Sha256::digest(&body));
    let catalog = FontCatalog::parse(&format!(
        "fonts:\n  EMOJI:\n    name: Twemoji Mozilla\n    download_url: https://fonts.example/Twemoji.Mozilla.ttf\n    sha256: {sha}\n    license: CC BY 4.0\n    license_url: https://creativecommons.org/licenses/by/4.0/\n"
    ))
    .unwrap();
    let options = PrepareOptions {
        cache_dir: Some(cache.clone()),
        system_dirs: Some(Vec::new()),
        catalog: Some(catalog),
        ..PrepareOptions::new(&repo)
    };
    let fetcher = StaticFetcher {
        body,
        calls: RefCell::new(0),
    };

    let first = fonts::prepare_fonts(&options, &fetcher).unwrap();
    let cached = first.resolved[0].paths[0].clone();
    assert!(cached.ends_with("emoji/Twemoji.Mozilla.ttf"));
    assert_eq!(first.resolved[0].source, FontSource::Downloaded);
    assert_eq!(*fetcher.calls.borrow(), 1);

    let second = fonts::prepare_fonts(&options, &fetcher).unwrap();
    assert_eq!(second.downloads, 0);
    assert_eq!(*fetcher.calls.borrow(), 1);

    fs::write(&cached, b"corrupted").unwrap();
    let third = fonts::prepare_fonts(&options, &fetcher).unwrap();
    assert_eq!(third.downloads, 1);
    assert_eq!(*fetcher.calls.borrow(), 2);
    assert_eq!(fs::read(&cached).unwrap(), b"not really a font");
}
