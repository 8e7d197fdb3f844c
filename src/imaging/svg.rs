//! SVG to PDF conversion through interchangeable adapters.
//!
//! LaTeX cannot embed SVG directly, so every SVG referenced by a book needs a
//! PDF sibling. Which converter exists depends on the machine; each adapter
//! reports whether it can run and [`ensure_svg_pdf`] tries the available ones
//! in order until one succeeds.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{converter} failed: {message}")]
    Failed { converter: String, message: String },
}

/// Converts one SVG file into a PDF file.
pub trait SvgConverter {
    fn name(&self) -> &str;

    /// Whether this converter can run in the current environment.
    fn is_available(&self) -> bool;

    fn convert(&self, svg: &Path, pdf: &Path) -> Result<(), ConvertError>;
}

/// An external command line tool.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    name: String,
    program: String,
    args: fn(&Path, &Path) -> Vec<String>,
}

impl CommandConverter {
    /// `rsvg-convert -f pdf -o OUT IN`
    pub fn rsvg_convert() -> Self {
        Self {
            name: "rsvg-convert".into(),
            program: "rsvg-convert".into(),
            args: |svg, pdf| {
                vec![
                    "-f".into(),
                    "pdf".into(),
                    "-o".into(),
                    pdf.display().to_string(),
                    svg.display().to_string(),
                ]
            },
        }
    }

    /// `inkscape IN --export-type=pdf --export-filename=OUT`
    pub fn inkscape() -> Self {
        Self {
            name: "inkscape".into(),
            program: "inkscape".into(),
            args: |svg, pdf| {
                vec![
                    svg.display().to_string(),
                    "--export-type=pdf".into(),
                    format!("--export-filename={}", pdf.display()),
                ]
            },
        }
    }
}

/// Locate `program` on `PATH`.
fn find_program(program: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| {
            let plain = dir.join(program);
            let exe = dir.join(format!("{program}.exe"));
            [plain, exe]
        })
        .find(|candidate| candidate.is_file())
}

impl SvgConverter for CommandConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        find_program(&self.program).is_some()
    }

    fn convert(&self, svg: &Path, pdf: &Path) -> Result<(), ConvertError> {
        let output = Command::new(&self.program).args((self.args)(svg, pdf)).output()?;
        if output.status.success() && pdf.exists() {
            Ok(())
        } else {
            Err(ConvertError::Failed {
                converter: self.name.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Converters this machine can run, in default preference order.
pub fn default_converters() -> Vec<Box<dyn SvgConverter>> {
    let candidates: Vec<Box<dyn SvgConverter>> = vec![
        Box::new(CommandConverter::rsvg_convert()),
        Box::new(CommandConverter::inkscape()),
    ];
    candidates.into_iter().filter(|c| c.is_available()).collect()
}

/// Put converters named in `prefer` first, keeping the rest in their order.
pub fn order_converters<'a>(converters: &'a [Box<dyn SvgConverter>], prefer: &[&str]) -> Vec<&'a dyn SvgConverter> {
    let mut ordered: Vec<&dyn SvgConverter> = prefer
        .iter()
        .filter_map(|name| converters.iter().find(|c| c.name() == *name))
        .map(|c| &**c)
        .collect();
    for converter in converters {
        if !ordered.iter().any(|c| c.name() == converter.name()) {
            ordered.push(&**converter);
        }
    }
    ordered
}

/// Outcome of [`ensure_svg_pdf`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SvgOutcome {
    /// A fresh PDF was written by the named converter.
    Converted { converter: String, pdf: PathBuf },
    /// The PDF already exists and is not older than the SVG.
    UpToDate(PathBuf),
    /// Not an SVG, or no converter succeeded.
    Skipped,
}

/// Make sure `svg` has an up-to-date PDF next to it (or at `pdf`).
pub fn ensure_svg_pdf(
    svg: &Path,
    pdf: Option<&Path>,
    converters: &[Box<dyn SvgConverter>],
    prefer: &[&str],
) -> Result<SvgOutcome, ConvertError> {
    let is_svg = svg.extension().is_some_and(|e| e.eq_ignore_ascii_case("svg"));
    if !is_svg || !svg.is_file() {
        return Ok(SvgOutcome::Skipped);
    }
    let target = pdf.map(Path::to_path_buf).unwrap_or_else(|| svg.with_extension("pdf"));

    if let (Ok(svg_meta), Ok(pdf_meta)) = (fs::metadata(svg), fs::metadata(&target))
        && let (Ok(svg_time), Ok(pdf_time)) = (svg_meta.modified(), pdf_meta.modified())
        && pdf_time >= svg_time
    {
        return Ok(SvgOutcome::UpToDate(target));
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    for converter in order_converters(converters, prefer) {
        match converter.convert(svg, &target) {
            Ok(()) => {
                info!(converter = converter.name(), pdf = %target.display(), "converted SVG to PDF");
                return Ok(SvgOutcome::Converted {
                    converter: converter.name().to_string(),
                    pdf: target,
                });
            }
            Err(e) => debug!(converter = converter.name(), error = %e, "SVG converter failed"),
        }
    }
    Ok(SvgOutcome::Skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct MockConverter {
        name: &'static str,
        succeed: bool,
    }

    impl MockConverter {
        fn boxed(name: &'static str, succeed: bool) -> Box<dyn SvgConverter> {
            Box::new(Self {
                name,
                succeed,
            })
        }
    }

    impl SvgConverter for MockConverter {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            true
        }

        fn convert(&self, svg: &Path, pdf: &Path) -> Result<(), ConvertError> {
            assert!(svg.exists());
            if self.succeed {
                fs::write(pdf, b"%PDF-1.4")?;
                Ok(())
            } else {
                Err(ConvertError::Failed {
                    converter: self.name.into(),
                    message: "boom".into(),
                })
            }
        }
    }

    fn svg_file(tmp: &TempDir) -> PathBuf {
        let svg = tmp.path().join("fig.svg");
        fs::write(&svg, "<svg/>").unwrap();
        svg
    }

    #[test]
    fn falls_through_to_next_converter() {
        let tmp = TempDir::new().unwrap();
        let svg = svg_file(&tmp);
        let converters = vec![MockConverter::boxed("broken", false), MockConverter::boxed("ok", true)];
        let outcome = ensure_svg_pdf(&svg, None, &converters, &[]).unwrap();
        assert_eq!(
            outcome,
            SvgOutcome::Converted {
                converter: "ok".into(),
                pdf: tmp.path().join("fig.pdf")
            }
        );
    }

    #[test]
    fn preferred_converter_runs_first() {
        let converters = vec![MockConverter::boxed("a", true), MockConverter::boxed("b", true)];
        let ordered = order_converters(&converters, &["b", "missing"]);
        let names: Vec<_> = ordered.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn existing_newer_pdf_is_up_to_date() {
        let tmp = TempDir::new().unwrap();
        let svg = svg_file(&tmp);
        fs::write(tmp.path().join("fig.pdf"), b"%PDF").unwrap();
        let converters = vec![MockConverter::boxed("ok", true)];
        let outcome = ensure_svg_pdf(&svg, None, &converters, &[]).unwrap();
        assert!(matches!(outcome, SvgOutcome::UpToDate(_)));
    }

    #[test]
    fn non_svg_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let png = tmp.path().join("a.png");
        fs::write(&png, b"x").unwrap();
        let outcome = ensure_svg_pdf(&png, None, &[], &[]).unwrap();
        assert_eq!(outcome, SvgOutcome::Skipped);
    }

    #[test]
    fn all_failing_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let svg = svg_file(&tmp);
        let converters = vec![MockConverter::boxed("broken", false)];
        assert_eq!(ensure_svg_pdf(&svg, None, &converters, &[]).unwrap(), SvgOutcome::Skipped);
    }
}
