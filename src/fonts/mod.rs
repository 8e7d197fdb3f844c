//! Font bundle resolution.
//!
//! The LaTeX template references fonts by symbolic key (`SERIF`, `EMOJI`,
//! ...). Before a build, every key declared in `fonts.yml` (plus any
//! `publish.yml` overrides) is resolved to concrete files and written to a
//! runtime descriptor the template loader reads.
//!
//! ## Lookup order
//!
//! | Step | Source | Notes |
//! |------|--------|-------|
//! | 1 | declared `paths` | relative to the repo root; directories are scanned |
//! | 2 | search directories | repo `.github/fonts`, repo `fonts`, system, extras |
//! | 3 | `download_url` | cached under `cache_dir/<key-lowercase>/` |
//!
//! Downloads land in a `.part` sibling and are renamed (or unpacked) only
//! after the optional `sha256` matched. A checksum mismatch is always fatal,
//! even with `allow_partial`; the bad file is deleted first.
//!
//! ## Runtime descriptor
//!
//! `fonts.meta.yml` lives in a private temp directory owned by
//! [`FontResult`] and disappears when the result is dropped:
//!
//! ```yaml
//! version: 1.0.0
//! fonts:
//!   EMOJI:
//!     name: Twemoji Mozilla
//!     paths:
//!     - /home/me/.cache/gitbook-worker/fonts/emoji/Twemoji.Mozilla.ttf
//!     license: CC BY 4.0
//!     license_url: https://creativecommons.org/licenses/by/4.0/
//!     download_url: https://github.com/...
//! ```

pub mod cache;
pub mod catalog;
pub mod download;
pub mod search;

pub use catalog::{FontCatalog, FontSpec, stock_fonts_yaml};
pub use download::{ArchiveKind, Fetcher, HttpFetcher};

use crate::manifest::FontOverride;
use crate::paths;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum FontError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fonts config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("SHA256 mismatch for {}: expected {expected}, got {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("Missing fonts: {}", names.join(", "))]
    Missing { keys: Vec<String>, names: Vec<String> },
    #[error("font {key} is missing required field '{field}'")]
    InvalidSpec { key: String, field: &'static str },
    #[error("font {key} has a download_url without a file name: {url}")]
    InvalidUrl { key: String, url: String },
}

/// Inputs of [`prepare_fonts`].
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub repo_root: PathBuf,
    /// Defaults to [`search::default_cache_dir`].
    pub cache_dir: Option<PathBuf>,
    pub extra_search_paths: Vec<PathBuf>,
    /// Defaults to [`search::system_font_dirs`].
    pub system_dirs: Option<Vec<PathBuf>>,
    pub allow_partial: bool,
    pub manifest_fonts: Vec<FontOverride>,
    /// Defaults to the stock catalog.
    pub catalog: Option<FontCatalog>,
}

impl PrepareOptions {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            cache_dir: None,
            extra_search_paths: Vec::new(),
            system_dirs: None,
            allow_partial: false,
            manifest_fonts: Vec::new(),
            catalog: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSource {
    Existing,
    Downloaded,
}

impl fmt::Display for FontSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Existing => "existing",
            Self::Downloaded => "downloaded",
        })
    }
}

/// A declared font with the files it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFont {
    pub key: String,
    pub name: String,
    pub paths: Vec<PathBuf>,
    pub source: FontSource,
}

/// Result of [`prepare_fonts`]. Dropping it removes the runtime descriptor.
#[derive(Debug)]
pub struct FontResult {
    pub catalog: FontCatalog,
    pub meta_path: PathBuf,
    pub resolved: Vec<ResolvedFont>,
    /// Number of files actually fetched during this run.
    pub downloads: usize,
    _work_dir: TempDir,
}

#[derive(Serialize)]
struct MetaFont<'a> {
    name: &'a str,
    paths: Vec<String>,
    license: &'a str,
    license_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
}

#[derive(Serialize)]
struct MetaConfig<'a> {
    version: &'a str,
    fonts: BTreeMap<&'a str, MetaFont<'a>>,
}

/// Runtime descriptor YAML for `resolved` fonts of `catalog`.
pub fn meta_config_yaml(catalog: &FontCatalog, resolved: &[ResolvedFont]) -> Result<String, FontError> {
    let fonts = resolved
        .iter()
        .filter_map(|font| {
            let spec = catalog.fonts.get(&font.key)?;
            Some((
                font.key.as_str(),
                MetaFont {
                    name: &spec.name,
                    paths: font.paths.iter().map(|p| paths::to_posix(p)).collect(),
                    license: &spec.license,
                    license_url: &spec.license_url,
                    source_url: spec.source_url.as_deref(),
                    download_url: spec.download_url.as_deref(),
                    sha256: spec.sha256.as_deref(),
                    version: spec.version.as_deref(),
                },
            ))
        })
        .collect();
    let meta = MetaConfig {
        version: &catalog.version,
        fonts,
    };
    Ok(serde_yaml::to_string(&meta)?)
}

/// Resolve every declared font and write the runtime descriptor.
pub fn prepare_fonts(options: &PrepareOptions, fetcher: &dyn Fetcher) -> Result<FontResult, FontError> {
    let repo_root = paths::resolve(&options.repo_root);
    let cache_dir = options
        .cache_dir
        .as_deref()
        .map(paths::resolve)
        .unwrap_or_else(search::default_cache_dir);
    let system_dirs = options
        .system_dirs
        .clone()
        .unwrap_or_else(search::system_font_dirs);
    let search_paths = search::build_search_paths(&repo_root, &system_dirs, &options.extra_search_paths);

    let catalog = options.catalog.clone().unwrap_or_else(FontCatalog::stock);
    let catalog = if options.manifest_fonts.is_empty() {
        catalog
    } else {
        catalog.merge_manifest_fonts(&options.manifest_fonts)
    };

    let mut resolved = Vec::new();
    let mut missing: Vec<(String, String)> = Vec::new();
    let mut downloads = 0;

    for (key, spec) in &catalog.fonts {
        let display_name = if spec.name.is_empty() { key.clone() } else { spec.name.clone() };

        let mut found = search::expand_declared_paths(spec, &repo_root);
        if found.is_empty() {
            found = search::find_in_search_paths(spec, &search_paths);
        }
        let mut source = FontSource::Existing;
        if found.is_empty() && spec.download_url.is_some() {
            match download_font(key, spec, &cache_dir, fetcher) {
                Ok((files, fetched)) => {
                    found = files;
                    source = FontSource::Downloaded;
                    downloads += fetched;
                }
                Err(e @ FontError::Integrity { .. }) => return Err(e),
                Err(e) if options.allow_partial => {
                    warn!(key = %key, error = %e, "skipping font");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        found.retain(|p| p.exists());

        if found.is_empty() {
            if options.allow_partial {
                warn!(key = %key, name = %display_name, "font not found, skipping");
            } else {
                missing.push((key.clone(), display_name));
            }
            continue;
        }

        info!(key = %key, name = %display_name, files = found.len(), source = %source, "resolved font");
        resolved.push(ResolvedFont {
            key: key.clone(),
            name: display_name,
            paths: found,
            source,
        });
    }

    if !missing.is_empty() {
        missing.sort_by(|a, b| a.1.cmp(&b.1));
        let (keys, names): (Vec<String>, Vec<String>) = missing.into_iter().unzip();
        return Err(FontError::Missing { keys, names });
    }

    let work_dir = tempfile::Builder::new()
        .prefix("gitbook-worker-fonts-")
        .tempdir()?;
    let meta_path = work_dir.path().join("fonts.meta.yml");
    paths::atomic_write(&meta_path, meta_config_yaml(&catalog, &resolved)?.as_bytes())?;
    info!(path = %meta_path.display(), fonts = resolved.len(), downloads, "font descriptor written");

    Ok(FontResult {
        catalog,
        meta_path,
        resolved,
        downloads,
        _work_dir: work_dir,
    })
}

/// Cached or freshly fetched files for `spec`, plus how many fetches it took.
fn download_font(
    key: &str,
    spec: &FontSpec,
    cache_dir: &Path,
    fetcher: &dyn Fetcher,
) -> Result<(Vec<PathBuf>, usize), FontError> {
    let Some(url) = spec.download_url.as_deref() else {
        return Ok((Vec::new(), 0));
    };
    let file_name = search::url_file_name(url).ok_or_else(|| FontError::InvalidUrl {
        key: key.to_string(),
        url: url.to_string(),
    })?;
    let target_dir = cache_dir.join(key.to_lowercase());
    fs::create_dir_all(&target_dir)?;

    let cached = cache::cached_font_files(&target_dir, &file_name, spec.sha256.as_deref());
    if !cached.is_empty() {
        info!(key, dir = %target_dir.display(), "using cached font");
        return Ok((cached, 0));
    }

    let part = target_dir.join(format!("{file_name}.part"));
    if let Err(e) = fetcher.fetch(url, &part) {
        let _ = fs::remove_file(&part);
        return Err(e);
    }
    if let Some(expected) = spec.sha256.as_deref() {
        cache::verify_sha256(&part, expected)?;
    }

    let files = match ArchiveKind::from_file_name(&file_name) {
        Some(kind) => {
            let dest = cache::extraction_dir(&target_dir, &file_name);
            let files = kind.extract_staged(&part, &dest);
            fs::remove_file(&part)?;
            files?
        }
        None => {
            let final_path = target_dir.join(&file_name);
            download::finalize(&part, &final_path)?;
            vec![final_path]
        }
    };
    Ok((files, 1))
}

#[cfg(test)]
mod tests {
    use super::download::tests::MockFetcher;
    use super::*;
    use sha2::{Digest, Sha256};

    const URL: &str = "https://example.org/releases/Twemoji.Mozilla.ttf";
    const BYTES: &[u8] = b"twemoji font bytes";

    fn sha_of(bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }

    fn emoji_catalog(sha256: Option<String>) -> FontCatalog {
        let mut catalog = FontCatalog::default();
        catalog.fonts.insert(
            "EMOJI".into(),
            FontSpec {
                name: "Twemoji Mozilla".into(),
                paths: vec!["Twemoji.Mozilla.ttf".into()],
                download_url: Some(URL.into()),
                sha256,
                license: "CC BY 4.0".into(),
                license_url: "https://creativecommons.org/licenses/by/4.0/".into(),
                ..FontSpec::default()
            },
        );
        catalog
    }

    fn options(tmp: &TempDir, catalog: FontCatalog) -> PrepareOptions {
        let repo = tmp.path().join("repo");
        fs::create_dir_all(&repo).unwrap();
        PrepareOptions {
            cache_dir: Some(tmp.path().join("cache")),
            system_dirs: Some(Vec::new()),
            catalog: Some(catalog),
            ..PrepareOptions::new(repo)
        }
    }

    // =========================================================================
    // Local resolution
    // =========================================================================

    #[test]
    fn declared_repo_file_is_existing() {
        let tmp = TempDir::new().unwrap();
        let opts = options(&tmp, emoji_catalog(None));
        fs::write(opts.repo_root.join("Twemoji.Mozilla.ttf"), BYTES).unwrap();

        let fetcher = MockFetcher::new();
        let result = prepare_fonts(&opts, &fetcher).unwrap();
        assert_eq!(result.resolved[0].source, FontSource::Existing);
        assert_eq!(result.downloads, 0);
        assert!(fetcher.get_calls().is_empty());
    }

    #[test]
    fn found_in_repo_fonts_dir() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = emoji_catalog(None);
        catalog.fonts.get_mut("EMOJI").unwrap().paths = vec!["/nowhere/Twemoji.Mozilla.ttf".into()];
        let opts = options(&tmp, catalog);
        let dir = opts.repo_root.join("fonts/emoji");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Twemoji.Mozilla.ttf"), BYTES).unwrap();

        let result = prepare_fonts(&opts, &MockFetcher::new()).unwrap();
        assert!(result.resolved[0].paths[0].ends_with("fonts/emoji/Twemoji.Mozilla.ttf"));
    }

    // =========================================================================
    // Downloads and integrity
    // =========================================================================

    #[test]
    fn download_is_cached_and_reverified() {
        let tmp = TempDir::new().unwrap();
        let opts = options(&tmp, emoji_catalog(Some(sha_of(BYTES))));
        let fetcher = MockFetcher::new().with(URL, BYTES);
        let cached = tmp.path().join("cache/emoji/Twemoji.Mozilla.ttf");

        let first = prepare_fonts(&opts, &fetcher).unwrap();
        assert_eq!(first.downloads, 1);
        assert_eq!(first.resolved[0].source, FontSource::Downloaded);
        assert_eq!(first.resolved[0].paths, vec![cached.clone()]);
        assert_eq!(fs::read(&cached).unwrap(), BYTES);
        assert!(!tmp.path().join("cache/emoji/Twemoji.Mozilla.ttf.part").exists());

        let second = prepare_fonts(&opts, &fetcher).unwrap();
        assert_eq!(second.downloads, 0);
        assert_eq!(fetcher.get_calls().len(), 1);

        fs::write(&cached, b"corrupted").unwrap();
        let third = prepare_fonts(&opts, &fetcher).unwrap();
        assert_eq!(third.downloads, 1);
        assert_eq!(fetcher.get_calls().len(), 2);
        assert_eq!(fs::read(&cached).unwrap(), BYTES);
    }

    #[test]
    fn checksum_mismatch_is_fatal_even_when_partial() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(&tmp, emoji_catalog(Some(sha_of(b"expected"))));
        opts.allow_partial = true;
        let fetcher = MockFetcher::new().with(URL, BYTES);

        let err = prepare_fonts(&opts, &fetcher).unwrap_err();
        assert!(matches!(err, FontError::Integrity { .. }));
        let dir = tmp.path().join("cache/emoji");
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn failed_fetch_is_skipped_when_partial() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(&tmp, emoji_catalog(None));
        opts.allow_partial = true;
        let result = prepare_fonts(&opts, &MockFetcher::new()).unwrap();
        assert!(result.resolved.is_empty());
    }

    #[test]
    fn unresolved_font_is_missing() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = emoji_catalog(None);
        catalog.fonts.get_mut("EMOJI").unwrap().download_url = None;
        let opts = options(&tmp, catalog);

        let err = prepare_fonts(&opts, &MockFetcher::new()).unwrap_err();
        match err {
            FontError::Missing { keys, names } => {
                assert_eq!(keys, vec!["EMOJI"]);
                assert_eq!(names, vec!["Twemoji Mozilla"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // =========================================================================
    // Runtime descriptor
    // =========================================================================

    #[test]
    fn meta_config_lists_resolved_fonts() {
        let tmp = TempDir::new().unwrap();
        let opts = options(&tmp, emoji_catalog(Some(sha_of(BYTES))));
        let result = prepare_fonts(&opts, &MockFetcher::new().with(URL, BYTES)).unwrap();

        let meta: serde_yaml::Value =
            serde_yaml::from_str(&fs::read_to_string(&result.meta_path).unwrap()).unwrap();
        let emoji = &meta["fonts"]["EMOJI"];
        assert_eq!(meta["version"].as_str(), Some("1.0.0"));
        assert_eq!(emoji["license"].as_str(), Some("CC BY 4.0"));
        assert_eq!(emoji["sha256"].as_str(), Some(sha_of(BYTES).as_str()));
        assert!(emoji.get("version").is_none());
        let path = emoji["paths"][0].as_str().unwrap();
        assert!(path.starts_with('/') && path.ends_with("emoji/Twemoji.Mozilla.ttf"));

        let meta_path = result.meta_path.clone();
        drop(result);
        assert!(!meta_path.exists());
    }

    #[test]
    fn manifest_override_points_at_repo_file() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(&tmp, emoji_catalog(None));
        fs::create_dir_all(opts.repo_root.join("assets")).unwrap();
        fs::write(opts.repo_root.join("assets/Noto.ttf"), b"noto").unwrap();
        opts.manifest_fonts = vec![FontOverride {
            name: Some("emoji".into()),
            path: Some("assets/Noto.ttf".into()),
            url: None,
        }];

        let result = prepare_fonts(&opts, &MockFetcher::new()).unwrap();
        assert!(result.resolved[0].paths[0].ends_with("assets/Noto.ttf"));
        assert_eq!(result.catalog.fonts["EMOJI"].paths, vec!["assets/Noto.ttf"]);
    }
}
