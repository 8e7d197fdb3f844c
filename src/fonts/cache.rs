//! Download cache layout and checksum checks.
//!
//! Every font with a `download_url` owns `cache_dir/<key-lowercase>/`.
//! Single files keep their URL file name; archives are unpacked into a
//! directory named after the archive without its extension:
//!
//! ```text
//! ~/.cache/gitbook-worker/fonts/
//! ├── emoji/
//! │   └── Twemoji.Mozilla.ttf
//! └── cjk/
//!     └── NotoSansCJK/          ← from NotoSansCJK.zip
//!         └── NotoSansCJK-Regular.ttc
//! ```
//!
//! Checksums are SHA-256 hex strings compared case-insensitively.

use super::download::ArchiveKind;
use super::search::collect_font_files;
use super::FontError;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// SHA-256 of a file's contents, lowercase hex.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Check `path` against `expected`. A mismatching file is deleted.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), FontError> {
    let actual = hash_file(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        return Ok(());
    }
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "could not delete file with bad checksum");
    }
    Err(FontError::Integrity {
        path: path.to_path_buf(),
        expected: expected.trim().to_lowercase(),
        actual,
    })
}

/// Directory an archive named `file_name` is unpacked into.
pub fn extraction_dir(target_dir: &Path, file_name: &str) -> PathBuf {
    target_dir.join(ArchiveKind::stem(file_name))
}

/// Files from a previous download of `file_name`, if any.
///
/// A cached single file with a known checksum is re-verified; a mismatch
/// removes it so the caller fetches it again.
pub fn cached_font_files(target_dir: &Path, file_name: &str, sha256: Option<&str>) -> Vec<PathBuf> {
    if ArchiveKind::from_file_name(file_name).is_some() {
        let dir = extraction_dir(target_dir, file_name);
        return if dir.is_dir() { collect_font_files(&dir) } else { Vec::new() };
    }

    let cached = target_dir.join(file_name);
    if !cached.is_file() {
        return Vec::new();
    }
    if let Some(expected) = sha256 {
        match verify_sha256(&cached, expected) {
            Ok(()) => {}
            Err(e) => {
                warn!(error = %e, "cached font failed verification, fetching again");
                return Vec::new();
            }
        }
    }
    vec![cached]
}
