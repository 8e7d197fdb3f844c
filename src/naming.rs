//! Natural-sort keys and filename-derived titles.
//!
//! Content files are usually numbered (`2-setup.md`, `10-intro.md`), and the
//! summary must list them in the order a reader expects: digit runs compare
//! as integers, everything else compares case-insensitively.
//!
//! ## Sort Keys
//!
//! A name is split into alternating text and digit runs:
//! - `"10-intro"` → `["", 10, "-intro"]`
//! - `"Chapter 2b"` → `["chapter ", 2, "b"]`
//!
//! Because the split always starts with a (possibly empty) text run, two keys
//! line up part by part and never compare a number against text.

use std::cmp::Ordering;

/// One run of a natural sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortPart {
    /// Lowercased non-digit run.
    Text(String),
    /// Digit run with leading zeros stripped, compared by numeric value.
    Num(String),
}

impl Ord for SortPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortPart::Num(a), SortPart::Num(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (SortPart::Text(a), SortPart::Text(b)) => a.cmp(b),
            (SortPart::Num(_), SortPart::Text(_)) => Ordering::Less,
            (SortPart::Text(_), SortPart::Num(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for SortPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Natural sort key: compare with `Ord`, the derived ordering is lexicographic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey(pub Vec<SortPart>);

impl SortKey {
    /// The smallest possible key. Used to pin the root README first.
    pub fn first() -> Self {
        SortKey(vec![SortPart::Text(String::new())])
    }
}

/// Build the natural sort key for `name`.
pub fn natural_sort_key(name: &str) -> SortKey {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();
    for ch in name.chars() {
        if ch.is_ascii_digit() {
            if digits.is_empty() {
                parts.push(SortPart::Text(std::mem::take(&mut text).to_lowercase()));
            }
            digits.push(ch);
        } else {
            if !digits.is_empty() {
                parts.push(number_part(&std::mem::take(&mut digits)));
            }
            text.push(ch);
        }
    }
    if !digits.is_empty() {
        parts.push(number_part(&digits));
    }
    parts.push(SortPart::Text(text.to_lowercase()));
    SortKey(parts)
}

fn number_part(digits: &str) -> SortPart {
    let trimmed = digits.trim_start_matches('0');
    SortPart::Num(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() })
}

/// Display title derived from a file stem: dashes and underscores become spaces.
///
/// - `getting-started` → "getting started"
/// - `api_reference` → "api reference"
pub fn title_from_stem(stem: &str) -> String {
    stem.replace(['-', '_'], " ")
}
