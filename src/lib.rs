//! # gitbook-worker
//!
//! The preparation core of a GitBook-style publishing toolkit. A book is a
//! directory of Markdown files; this crate turns it into one Markdown
//! document that Pandoc and LuaLaTeX can render to PDF, plus the runtime
//! configuration those tools need.
//!
//! # Architecture: Five Components
//!
//! ```text
//! C1 Config Merger      defaults ⊕ repo ⊕ publish.yml ⊕ entry  →  merged mapping, docker names
//! C2 Font Resolver      fonts.yml ⊕ overrides                  →  font files + fonts.meta.yml
//! C3 Summary Builder    content tree                           →  SUMMARY.md
//! C4 Heading Aligner    document + parent README               →  shifted headings
//! C5 Page Preprocessor  document + paper                       →  geometry blocks, anchors, links
//! ```
//!
//! C1 and C2 run once at startup. C3 runs once per publication; C4 then C5
//! run for every document in summary order. [`pipeline`] chains them.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | C1: layered `docker_config` YAML merge and `{var}` name templates |
//! | [`fonts`] | C2: font lookup, download cache, integrity checks, runtime descriptor |
//! | [`summary`] | C3: content tree walk, ordering modes, `SUMMARY.md` maintenance |
//! | [`headings`] | C4: ATX heading realignment below the parent README |
//! | [`preprocess`] | C5: paper selection, geometry blocks, longtables, figures, link anchors |
//! | [`imaging`] | Image width probing and SVG to PDF adapters used by C5 |
//! | [`manifest`] | `publish.yml` and `book.json` models, project metadata |
//! | [`frontmatter`] | YAML front matter validation (exit code 42) |
//! | [`combine`] | Subscript/bracket normalization, page-break joining, geometry header |
//! | [`pipeline`] | One publish entry to one combined Markdown file |
//! | [`exit_codes`] | Stable process exit codes and their healing hints |
//! | [`markdown`] | Line-level helpers: front matter, code fences, ATX headings |
//! | [`naming`] | Natural sort keys and titles from file names |
//! | [`paths`] | Posix rendering, lexical cleanup, atomic writes |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Line-Oriented Markdown
//!
//! No step parses Markdown into a tree. Every transformation walks lines and
//! only needs to know whether a line sits in front matter, in a fenced code
//! block, or is an ATX heading ([`markdown`]). Everything else passes through
//! byte for byte, so Pandoc sees the author's text unchanged.
//!
//! ## Byte-Exact Geometry Blocks
//!
//! The LaTeX header of the book reads `\newgeometry`, `\pagewidth` and
//! `\pageheight` lines verbatim. Their text is produced in one place
//! ([`preprocess::geometry`]) and tested literally.
//!
//! ## Recoverable Versus Fatal
//!
//! An unreadable config layer, an image whose width cannot be probed, an
//! exhausted paper list or a missing parent README log a warning and the
//! build continues. A checksum mismatch on a downloaded font, a missing
//! template variable or malformed front matter stop it.
//!
//! ## Collaborators Behind Traits
//!
//! Image probing ([`imaging::ImageProbe`]), font downloads
//! ([`fonts::Fetcher`]) and SVG conversion ([`imaging::SvgConverter`]) sit
//! behind small traits so tests run without network access, external
//! binaries or real images.

pub mod combine;
pub mod config;
pub mod exit_codes;
pub mod fonts;
pub mod frontmatter;
pub mod headings;
pub mod imaging;
pub mod manifest;
pub mod markdown;
pub mod naming;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod preprocess;
pub mod summary;
