//! Geometry-switch blocks.
//!
//! A wrapped block moves its content onto a page of a different size and
//! then returns to the previous one. The LaTeX header of the book reads
//! these lines literally, so the text below is fixed:
//!
//! ```text
//!
//! \newpage
//! \newgeometry{paperwidth=297mm,paperheight=210mm,left=15mm,right=15mm,top=15mm,bottom=15mm}
//!
//! \pagewidth=297mm
//! \pageheight=210mm
//! ...content, pipe tables as longtable...
//!
//! \restoregeometry
//! \pagewidth=210mm
//! \pageheight=297mm
//! \newpage
//! ```

use super::paper::Paper;
use super::tables::tables_to_longtable;
use tracing::info;

/// Lines opening a region on `paper`.
pub fn prologue(paper: &Paper) -> String {
    let (width, height) = paper.size_mm;
    let (left, top, right, bottom) = paper.margins_mm;
    format!(
        "\n\\newpage\n\
         \\newgeometry{{paperwidth={width}mm,paperheight={height}mm,left={left}mm,right={right}mm,top={top}mm,bottom={bottom}mm}}\n\
         \n\
         \\pagewidth={width}mm\n\
         \\pageheight={height}mm\n"
    )
}

/// Lines returning to `previous` after a wrapped region.
pub fn epilogue(previous: &Paper) -> String {
    let (width, height) = previous.size_mm;
    format!("\n\\restoregeometry\n\\pagewidth={width}mm\n\\pageheight={height}mm\n\\newpage\n")
}

/// Wrap `lines` in a switch to `paper` and back to `current`.
pub fn wrap_block(mut lines: Vec<String>, paper: &Paper, current: &Paper) -> Vec<String> {
    info!(paper = %paper, previous = %current.name, "wrapping block in geometry switch");
    if let Some(last) = lines.last_mut()
        && !last.ends_with('\n')
    {
        last.push('\n');
    }
    let mut out = Vec::with_capacity(lines.len() + 12);
    out.push(prologue(paper));
    out.extend(tables_to_longtable(&lines));
    out.push(epilogue(current));
    out
}
