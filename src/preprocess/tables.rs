//! Pipe tables: detection, LaTeX escaping, and `longtable` conversion.

use regex::Regex;
use std::sync::LazyLock;

static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\|?\s*:?-+").unwrap());
static MATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[^$]*\$").unwrap());

const LATEX_SPECIALS: [char; 4] = ['_', '&', '#', '%'];

/// Whether `line` is a pipe table separator row (`|---|:--:|`).
pub fn is_separator(line: &str) -> bool {
    SEPARATOR_RE.is_match(line)
}

/// Whether a table starts at `lines[idx]`: a line holding `|` followed by a
/// separator row.
pub fn starts_table<S: AsRef<str>>(lines: &[S], idx: usize) -> bool {
    lines[idx].as_ref().contains('|') && lines.get(idx + 1).is_some_and(|next| is_separator(next.as_ref()))
}

/// Whether `line` continues a table body.
pub fn is_table_row(line: &str) -> bool {
    line.contains('|') && !line.trim().is_empty()
}

/// Column count of a header line: number of `|` minus one.
pub fn column_count(header: &str) -> usize {
    header.matches('|').count().saturating_sub(1)
}

fn escape_plain(text: &str, out: &mut String) {
    let mut prev = None;
    for c in text.chars() {
        if LATEX_SPECIALS.contains(&c) && prev != Some('\\') {
            out.push('\\');
        }
        out.push(c);
        prev = Some(c);
    }
}

/// Escape `_ & # %` with a backslash, leaving `$…$` math and characters
/// that are already escaped alone.
pub fn escape_table_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    let mut last = 0;
    for m in MATH_RE.find_iter(value) {
        escape_plain(&value[last..m.start()], &mut out);
        out.push_str(m.as_str());
        last = m.end();
    }
    escape_plain(&value[last..], &mut out);
    out
}

/// Escape the cells between the first and last `|` of a table line.
pub fn escape_table_line(line: &str) -> String {
    if !line.contains('|') {
        return line.to_string();
    }
    let segments: Vec<&str> = line.split('|').collect();
    let last = segments.len() - 1;
    segments
        .iter()
        .enumerate()
        .map(|(i, seg)| {
            if i == 0 || i == last {
                seg.to_string()
            } else {
                escape_table_text(seg)
            }
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn split_cells(line: &str) -> Vec<&str> {
    line.trim().trim_matches('|').split('|').map(str::trim).collect()
}

/// `longtable` column spec from a separator row: `:-:` centre, `-:` right,
/// anything else left.
pub fn column_specs(separator: &str) -> String {
    split_cells(separator)
        .into_iter()
        .map(|cell| match (cell.starts_with(':'), cell.ends_with(':')) {
            (true, true) => 'c',
            (_, true) => 'r',
            _ => 'l',
        })
        .collect()
}

fn latex_row(line: &str) -> String {
    let cells: Vec<String> = split_cells(line).into_iter().map(escape_table_text).collect();
    format!("{} \\\\\n", cells.join(" & "))
}

/// Replace every pipe table in `lines` with a `longtable` environment.
/// Other lines pass through unchanged.
pub fn tables_to_longtable(lines: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len() + 8);
    let mut i = 0;
    while i < lines.len() {
        if !starts_table(lines, i) {
            out.push(lines[i].clone());
            i += 1;
            continue;
        }
        out.push(format!("\\begin{{longtable}}{{@{{}}{}@{{}}}}\n", column_specs(&lines[i + 1])));
        out.push("\\toprule\n".to_string());
        out.push(latex_row(&lines[i]));
        out.push("\\midrule\n".to_string());
        out.push("\\endhead\n".to_string());
        i += 2;
        while i < lines.len() && is_table_row(&lines[i]) {
            out.push(latex_row(&lines[i]));
            i += 1;
        }
        out.push("\\bottomrule\n".to_string());
        out.push("\\end{longtable}\n".to_string());
    }
    out
}
