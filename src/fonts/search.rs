//! Where fonts are looked for before anything is downloaded.

use super::catalog::FontSpec;
use crate::paths;
use std::collections::HashSet;
use std::env;
use reqwest::Url;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Font file extensions picked up by directory scans.
pub const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

/// Machine-wide font cache shared by CI images, searched on every platform.
pub const SHARED_CACHE_DIR: &str = "/var/cache/gitbook-worker/fonts";

/// Marker files identifying a repository root.
const REPO_MARKERS: &[&str] = &[".git", "publish.yml", "publish.yaml", "book.json"];

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Platform font directories, in lookup order.
pub fn system_font_dirs() -> Vec<PathBuf> {
    let home = home_dir();
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        let windir = env::var_os("WINDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("C:/Windows"));
        dirs.push(windir.join("Fonts"));
        if let Some(home) = &home {
            dirs.push(home.join("AppData/Local/Microsoft/Windows/Fonts"));
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = &home {
            dirs.push(home.join("Library/Fonts"));
        }
        dirs.push(PathBuf::from("/Library/Fonts"));
        dirs.push(PathBuf::from("/System/Library/Fonts"));
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(home) = &home {
            dirs.push(home.join(".local/share/fonts"));
        }
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        dirs.push(PathBuf::from("/usr/share/fonts"));
    }

    if let Some(home) = &home {
        dirs.push(home.join("texmf-local/fonts"));
    }
    dirs.push(PathBuf::from(SHARED_CACHE_DIR));
    dirs
}

/// Ordered, de-duplicated search directories: repo `.github/fonts`, repo
/// `fonts`, then `system` (usually [`system_font_dirs`]), then `extras`.
pub fn build_search_paths(repo_root: &Path, system: &[PathBuf], extras: &[PathBuf]) -> Vec<PathBuf> {
    let candidates = [repo_root.join(".github/fonts"), repo_root.join("fonts")]
        .into_iter()
        .chain(system.iter().cloned())
        .chain(extras.iter().cloned());

    let mut seen = HashSet::new();
    candidates
        .map(|p| paths::resolve(&p))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

pub fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| FONT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// All font files below `dir`, sorted by path.
pub fn collect_font_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_font_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Existing files named by `spec.paths`. Relative entries resolve against
/// `repo_root`; directories contribute every font file below them.
pub fn expand_declared_paths(spec: &FontSpec, repo_root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for raw in &spec.paths {
        let candidate = PathBuf::from(raw);
        let candidate = if candidate.is_absolute() {
            candidate
        } else {
            paths::resolve(&repo_root.join(candidate))
        };
        if candidate.is_file() {
            out.push(candidate);
        } else if candidate.is_dir() {
            out.extend(collect_font_files(&candidate));
        }
    }
    out
}

/// Last segment of a URL's path, ignoring query and fragment. `None` for
/// unparsable URLs and for paths that are empty or end in `/`.
pub fn url_file_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let name = parsed.path_segments()?.next_back()?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// File names a font is expected to have: basenames of the declared paths
/// and of the download URL, first occurrence wins.
pub fn expected_filenames(spec: &FontSpec) -> Vec<String> {
    let declared = spec.paths.iter().filter_map(|raw| {
        Path::new(raw)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    });
    let from_url = spec.download_url.as_deref().and_then(url_file_name);

    let mut seen = HashSet::new();
    declared
        .chain(from_url)
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}

/// Look for the expected file names directly in, then anywhere below, each
/// search directory.
pub fn find_in_search_paths(spec: &FontSpec, search_paths: &[PathBuf]) -> Vec<PathBuf> {
    let names = expected_filenames(spec);
    let mut matches = Vec::new();
    for dir in search_paths.iter().filter(|d| d.is_dir()) {
        for name in &names {
            let direct = dir.join(name);
            if direct.is_file() {
                matches.push(paths::resolve(&direct));
                continue;
            }
            let found = WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .find(|e| e.file_type().is_file() && e.file_name().to_string_lossy() == name.as_str());
            if let Some(entry) = found {
                matches.push(entry.into_path());
            }
        }
    }
    matches
}

/// Repository root: the closest ancestor of `start` holding `.git`,
/// `publish.yml`, `publish.yaml` or `book.json`; `start` itself otherwise.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    paths::find_upwards(start, REPO_MARKERS).unwrap_or_else(|| paths::resolve(start))
}

/// `$XDG_CACHE_HOME/gitbook-worker/fonts`, falling back to
/// `~/.cache/gitbook-worker/fonts`.
pub fn default_cache_dir() -> PathBuf {
    let root = env::var_os("XDG_CACHE_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(env::temp_dir);
    root.join("gitbook-worker").join("fonts")
}
