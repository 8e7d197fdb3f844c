//! ISO 216 paper formats and the search for a page wide enough for content.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::warn;

/// Assumed width of one table column, spacing included.
pub const COLUMN_WIDTH_MM: u32 = 25;
/// Assumed height of one table row, spacing included.
pub const ROW_HEIGHT_MM: u32 = 10;
/// 300 dpi: 300 / 25.4.
pub const PIXELS_PER_MM: f64 = 11.81;
/// Tables with at least this many columns are always wrapped.
pub const MIN_COLS_FOR_WRAP: usize = 10;

/// Candidate order when looking for a larger page.
pub const CANDIDATE_CODES: [&str; 8] = [
    "a4",
    "a4-landscape",
    "a3",
    "a3-landscape",
    "a2",
    "a2-landscape",
    "a1",
    "a1-landscape",
];

const PORTRAIT_SIZES: [(&str, (u32, u32)); 7] = [
    ("a0", (841, 1189)),
    ("a1", (594, 841)),
    ("a2", (420, 594)),
    ("a3", (297, 420)),
    ("a4", (210, 297)),
    ("a5", (148, 210)),
    ("a6", (105, 148)),
];

static PAPER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(a[0-6])(?:-?(p|portrait|l|landscape))?$").unwrap());

/// A named page format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Paper {
    /// Normalized name, e.g. `a4` or `a3-landscape`.
    pub name: String,
    /// `(width, height)` in millimetres.
    pub size_mm: (u32, u32),
    /// `(left, top, right, bottom)` in millimetres.
    pub margins_mm: (u32, u32, u32, u32),
}

fn margin_for(base: &str) -> u32 {
    match base {
        "a1" => 20,
        "a2" => 18,
        _ => 15,
    }
}

fn normalize_name(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();
    for prefix in ["din", "iso"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim_start().to_string();
        }
    }
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '_' { '-' } else { c })
        .collect()
}

impl Paper {
    /// Parse a paper name such as `a4`, `A3-landscape`, `DIN A4`, `a4l`.
    pub fn parse(raw: &str) -> Option<Paper> {
        let name = normalize_name(raw);
        let caps = PAPER_RE.captures(&name)?;
        let base = caps.get(1)?.as_str();
        let landscape = matches!(caps.get(2).map(|m| m.as_str()), Some("l" | "landscape"));
        let (_, (w, h)) = PORTRAIT_SIZES.iter().find(|(code, _)| *code == base)?;
        let m = margin_for(base);
        let portrait_margins = (m, m, m, m);
        Some(if landscape {
            let (l, t, r, b) = portrait_margins;
            Paper {
                name: format!("{base}-landscape"),
                size_mm: (*h, *w),
                margins_mm: (t, l, b, r),
            }
        } else {
            Paper {
                name: base.to_string(),
                size_mm: (*w, *h),
                margins_mm: portrait_margins,
            }
        })
    }

    /// A4 portrait.
    pub fn a4() -> Paper {
        Paper {
            name: "a4".into(),
            size_mm: (210, 297),
            margins_mm: (15, 15, 15, 15),
        }
    }

    /// Parse `raw`, falling back to A4 with a warning.
    pub fn or_default(raw: &str) -> Paper {
        Paper::parse(raw).unwrap_or_else(|| {
            warn!(paper = raw, "unknown paper format, using a4");
            Paper::a4()
        })
    }

    pub fn width(&self) -> u32 {
        self.size_mm.0
    }

    pub fn height(&self) -> u32 {
        self.size_mm.1
    }
}

impl Default for Paper {
    fn default() -> Self {
        Paper::a4()
    }
}

impl fmt::Display for Paper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x{}mm)", self.name, self.size_mm.0, self.size_mm.1)
    }
}

/// Papers to try for content that may not fit `base`: `base` itself, then
/// the candidate sequence starting after `base`, wrapping around.
pub fn candidates(base: &Paper) -> Vec<Paper> {
    let start = CANDIDATE_CODES
        .iter()
        .position(|code| *code == base.name)
        .map(|i| i + 1)
        .unwrap_or(0);
    let mut out = vec![base.clone()];
    for code in CANDIDATE_CODES[start..].iter().chain(&CANDIDATE_CODES[..start]) {
        if let Some(paper) = Paper::parse(code)
            && !out.contains(&paper)
        {
            out.push(paper);
        }
    }
    out
}

/// Smallest candidate paper for a table of `cols` columns (and `rows` rows
/// when known). Falls back to `base` with a warning if nothing fits.
pub fn paper_for_columns(cols: usize, rows: Option<usize>, base: &Paper) -> Paper {
    let min_width = (cols as u32 * COLUMN_WIDTH_MM).max(base.width());
    let min_height = rows
        .filter(|&r| r > 0)
        .map(|r| (r as u32 * ROW_HEIGHT_MM).max(base.height()));
    let found = candidates(base)
        .into_iter()
        .find(|p| p.width() >= min_width && min_height.is_none_or(|h| p.height() >= h));
    found.unwrap_or_else(|| {
        warn!(
            width_mm = min_width,
            height_mm = min_height.unwrap_or(base.height()),
            fallback = %base.name,
            "table needs a custom paper size, falling back"
        );
        base.clone()
    })
}

/// Smallest candidate paper for an image `px` pixels wide at 300 dpi.
pub fn paper_for_width(px: u32, base: &Paper) -> Paper {
    let min_width = (f64::from(px) / PIXELS_PER_MM).max(f64::from(base.width()));
    let found = candidates(base)
        .into_iter()
        .find(|p| f64::from(p.width()) >= min_width);
    found.unwrap_or_else(|| {
        warn!(
            width_mm = min_width,
            fallback = %base.name,
            "image needs a custom paper width, falling back"
        );
        base.clone()
    })
}
