//! Fetching font files and unpacking archives.

use super::FontError;
use super::search::collect_font_files;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Downloads one URL to a local file.
///
/// `fetch` either leaves a complete file at `dest` or returns an error;
/// a partially written `dest` is the caller's to clean up.
pub trait Fetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), FontError>;
}

/// HTTP(S) fetcher on a blocking reqwest client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FontError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("gitbook-worker/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), FontError> {
        info!(url, "downloading font");
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut response = self.client.get(url).send()?.error_for_status()?;
        let mut file = File::create(dest)?;
        let bytes = response.copy_to(&mut file)?;
        debug!(url, bytes, dest = %dest.display(), "download complete");
        Ok(())
    }
}

/// Archive formats unpacked after download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveKind {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    /// `name` without its archive extension (`Noto.tar.gz` → `Noto`).
    pub fn stem(name: &str) -> &str {
        let lower = name.to_ascii_lowercase();
        for ext in [".tar.gz", ".tgz", ".tar", ".zip"] {
            if lower.ends_with(ext) {
                return &name[..name.len() - ext.len()];
            }
        }
        name
    }

    /// Unpack `archive` into `dest` and return the font files found there.
    pub fn extract(self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, FontError> {
        fs::create_dir_all(dest)?;
        let reader = BufReader::new(File::open(archive)?);
        match self {
            Self::Zip => {
                let mut zip = zip::ZipArchive::new(reader)?;
                zip.extract(dest)?;
            }
            Self::Tar => tar::Archive::new(reader).unpack(dest)?,
            Self::TarGz => tar::Archive::new(GzDecoder::new(reader)).unpack(dest)?,
        }
        Ok(collect_font_files(dest))
    }

    /// Unpack `archive` into a staging directory beside `dest`, then move it
    /// into place. A failed extraction leaves `dest` as it was.
    pub fn extract_staged(self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, FontError> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let staging = tempfile::Builder::new().prefix(".extract-").tempdir_in(parent)?;
        self.extract(archive, staging.path())?;
        if dest.exists() {
            fs::remove_dir_all(dest)?;
        }
        fs::rename(staging.path(), dest)?;
        debug!(dest = %dest.display(), "archive moved into cache");
        Ok(collect_font_files(dest))
    }
}

/// Move a finished `.part` download to `final_path`.
pub fn finalize(part: &Path, final_path: &Path) -> io::Result<()> {
    fs::rename(part, final_path)
}
