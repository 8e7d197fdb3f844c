//! Stable process exit codes.
//!
//! CI orchestration branches on these numbers, so they never change
//! meaning. Each code carries a short description and a healing hint,
//! printed by `gitbook-worker exit-codes`.
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | unspecified failure |
//! | 42 | malformed YAML front matter under the content root |
//! | 45 | required emoji font missing |
//! | 46 | required CJK font missing |
//! | 130 | interrupted by the user |

use crate::fonts::FontError;
use std::fmt;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
    FrontMatter,
    EmojiFontMissing,
    CjkFontMissing,
    Interrupted,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::FrontMatter => 42,
            Self::EmojiFontMissing => 45,
            Self::CjkFontMissing => 46,
            Self::Interrupted => 130,
        }
    }

    /// Registry entry describing this status.
    pub fn info(self) -> &'static ExitCodeInfo {
        let code = self.code();
        EXIT_CODES
            .iter()
            .find(|info| info.code == code)
            .unwrap_or(&EXIT_CODES[1])
    }

    /// Status for a font resolution failure: a missing `EMOJI` font wins
    /// over a missing `CJK` font; anything else is a generic failure.
    pub fn for_font_error(err: &FontError) -> Self {
        match err {
            FontError::Missing { keys, .. } => {
                let has = |wanted: &str| keys.iter().any(|k| k.eq_ignore_ascii_case(wanted));
                if has("EMOJI") {
                    Self::EmojiFontMissing
                } else if has("CJK") {
                    Self::CjkFontMissing
                } else {
                    Self::Failure
                }
            }
            _ => Self::Failure,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodeInfo {
    pub code: u8,
    pub component: &'static str,
    pub summary: &'static str,
    pub healing: &'static str,
}

pub static EXIT_CODES: &[ExitCodeInfo] = &[
    ExitCodeInfo {
        code: 0,
        component: "all",
        summary: "Success",
        healing: "Nothing to do.",
    },
    ExitCodeInfo {
        code: 1,
        component: "all",
        summary: "Unspecified failure",
        healing: "Read the error line above; rerun with --verbose or GITBOOK_WORKER_LOG=debug.",
    },
    ExitCodeInfo {
        code: 42,
        component: "frontmatter",
        summary: "Malformed YAML front matter",
        healing: "Fix the reported file and line, or run 'gitbook-worker check-frontmatter <root>' to list all issues.",
    },
    ExitCodeInfo {
        code: 45,
        component: "fonts",
        summary: "Emoji font missing",
        healing: "Add the emoji font under fonts/ or allow the download_url in fonts.yml to be fetched.",
    },
    ExitCodeInfo {
        code: 46,
        component: "fonts",
        summary: "CJK font missing",
        healing: "Install a CJK font (e.g. fonts-noto-cjk) or declare its path in fonts.yml.",
    },
    ExitCodeInfo {
        code: 130,
        component: "all",
        summary: "Interrupted by user",
        healing: "Rerun the command.",
    },
];

/// Registry entries, optionally filtered by code.
pub fn lookup(code: Option<u8>) -> Vec<&'static ExitCodeInfo> {
    EXIT_CODES
        .iter()
        .filter(|info| code.is_none_or(|c| c == info.code))
        .collect()
}

impl fmt::Display for ExitCodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>3}  {:<12} {}", self.code, self.component, self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let codes: Vec<u8> = EXIT_CODES.iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![0, 1, 42, 45, 46, 130]);
        assert_eq!(ExitStatus::FrontMatter.info().code, 42);
        assert_eq!(ExitStatus::Interrupted.info().summary, "Interrupted by user");
    }

    #[test]
    fn missing_fonts_map_to_specific_codes() {
        let missing = |keys: &[&str]| FontError::Missing {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            names: Vec::new(),
        };
        assert_eq!(ExitStatus::for_font_error(&missing(&["CJK", "EMOJI"])), ExitStatus::EmojiFontMissing);
        assert_eq!(ExitStatus::for_font_error(&missing(&["CJK"])), ExitStatus::CjkFontMissing);
        assert_eq!(ExitStatus::for_font_error(&missing(&["SERIF"])), ExitStatus::Failure);
    }

    #[test]
    fn lookup_filters_by_code() {
        assert_eq!(lookup(None).len(), 6);
        assert_eq!(lookup(Some(45))[0].component, "fonts");
        assert!(lookup(Some(7)).is_empty());
    }
}
