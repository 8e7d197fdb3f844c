//! Path normalization shared by every filesystem-facing module.
//!
//! Comparisons between paths (manifest keys, link targets, anchors, font
//! candidates) always go through the helpers here so that separators, case
//! and `./` prefixes are handled the same way everywhere.

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Render a path with `/` separators, independent of the host platform.
pub fn to_posix(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir => Some(String::new()),
            Component::Prefix(p) => Some(p.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir => None,
        })
        .collect();
    if parts.len() == 1 && parts[0].is_empty() {
        return "/".to_string();
    }
    parts.join("/")
}

/// Normalize a string key for case-insensitive path comparison.
///
/// - backslashes become `/`
/// - repeated `/` collapse to one
/// - leading `./` and leading/trailing `/` are removed
/// - the result is lowercased
pub fn normalize_key(raw: &str) -> String {
    let mut s = raw.trim().replace('\\', "/");
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    while let Some(rest) = s.strip_prefix("./") {
        s = rest.to_string();
    }
    s.trim_matches('/').to_lowercase()
}

/// Absolute, symlink-resolved form of `path`.
///
/// Falls back to a lexical absolute path when the file does not exist.
pub fn resolve(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Lexically collapse `.` and `..` components without touching the disk.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Posix-style path of `path` relative to `base`, or the full posix path if
/// `path` is not under `base`.
pub fn relative_posix(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) => to_posix(rel),
        Err(_) => to_posix(path),
    }
}

/// Walk up from `start` and return the first directory containing any of `names`.
pub fn find_upwards(start: &Path, names: &[&str]) -> Option<PathBuf> {
    let start = resolve(start);
    let mut current = if start.is_file() {
        start.parent().map(Path::to_path_buf)
    } else {
        Some(start)
    };
    while let Some(dir) = current {
        if names.iter().any(|n| dir.join(n).exists()) {
            return Some(dir);
        }
        current = dir.parent().map(Path::to_path_buf);
    }
    None
}

/// Write `content` to `path` through a sibling temp file and an atomic rename.
///
/// Readers never observe a half-written file; an interrupted write leaves
/// the previous version in place.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
