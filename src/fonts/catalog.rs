//! `fonts.yml`: declared fonts and their license metadata.

use super::FontError;
use crate::manifest::FontOverride;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Placeholder license for fonts added by a `publish.yml` override.
pub const UNDECLARED_LICENSE: &str = "<MISSING license>";

/// One declared font.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    pub name: String,
    /// Candidate files or directories, absolute or repository-relative.
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub license: String,
    pub license_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Parsed `fonts.yml`: a version plus fonts keyed by symbolic key
/// (`SERIF`, `EMOJI`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontCatalog {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub fonts: BTreeMap<String, FontSpec>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// The stock font catalog shipped with the binary.
pub fn stock_fonts_yaml() -> &'static str {
    include_str!("../../defaults/fonts.yml")
}

impl FontCatalog {
    pub fn parse(content: &str) -> Result<Self, FontError> {
        let catalog: FontCatalog = serde_yaml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, FontError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// The embedded stock catalog.
    pub fn stock() -> Self {
        Self::parse(stock_fonts_yaml()).expect("stock fonts.yml must be valid")
    }

    /// Every font must carry `license` and `license_url`.
    pub fn validate(&self) -> Result<(), FontError> {
        for (key, spec) in &self.fonts {
            for (field, value) in [("license", &spec.license), ("license_url", &spec.license_url)] {
                if value.trim().is_empty() {
                    return Err(FontError::InvalidSpec {
                        key: key.clone(),
                        field,
                    });
                }
            }
        }
        Ok(())
    }

    /// Key for `name`: exact key first, then a case-insensitive partial
    /// match on key or display name.
    pub fn match_font_key(&self, name: &str) -> Option<String> {
        if self.fonts.contains_key(name) {
            return Some(name.to_string());
        }
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.fonts
            .iter()
            .find(|(key, spec)| {
                let key = key.to_lowercase();
                let display = spec.name.to_lowercase();
                key.contains(&needle) || needle.contains(&key) || display.contains(&needle)
            })
            .map(|(key, _)| key.clone())
    }

    /// Apply `publish.yml` font overrides.
    ///
    /// A matched override replaces `paths` with its `path` and sets
    /// `download_url` from `url`, dropping the catalog `sha256` when the URL
    /// changes. An unmatched override with both `name` and
    /// `path` adds a font keyed by the uppercased name.
    pub fn merge_manifest_fonts(mut self, overrides: &[FontOverride]) -> Self {
        for entry in overrides {
            let Some(name) = entry.name.as_deref().filter(|n| !n.trim().is_empty()) else {
                warn!(?entry, "ignoring font override without name");
                continue;
            };
            match self.match_font_key(name) {
                Some(key) => {
                    if let Some(spec) = self.fonts.get_mut(&key) {
                        if let Some(path) = &entry.path {
                            spec.paths = vec![path.clone()];
                        }
                        if let Some(url) = &entry.url
                            && spec.download_url.as_deref() != Some(url.as_str())
                        {
                            // The catalog checksum belongs to the old file.
                            spec.download_url = Some(url.clone());
                            spec.sha256 = None;
                        }
                        info!(key = %key, name, "applied font override");
                    }
                }
                None => match &entry.path {
                    Some(path) => {
                        let key = name.to_uppercase();
                        warn!(key = %key, "font override adds a font without license metadata");
                        self.fonts.insert(
                            key,
                            FontSpec {
                                name: name.to_string(),
                                paths: vec![path.clone()],
                                download_url: entry.url.clone(),
                                license: UNDECLARED_LICENSE.to_string(),
                                license_url: UNDECLARED_LICENSE.to_string(),
                                ..FontSpec::default()
                            },
                        );
                    }
                    None => warn!(name, "font override matches no font and has no path"),
                },
            }
        }
        self
    }
}
