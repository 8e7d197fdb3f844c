use clap::{Parser, Subcommand};
use gitbook_worker::config::{self, NameKind};
use gitbook_worker::exit_codes::{self, ExitStatus};
use gitbook_worker::fonts::{self, FontCatalog, HttpFetcher, PrepareOptions};
use gitbook_worker::imaging::{self, SvgOutcome};
use gitbook_worker::manifest::PublishManifest;
use gitbook_worker::pipeline::{self, PipelineError};
use gitbook_worker::preprocess::Preprocessor;
use gitbook_worker::summary::{self, SubMode, SummaryMode, SummaryOptions};
use gitbook_worker::{frontmatter, headings, output};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (`info`, `debug`, `gitbook_worker=trace`, ...).
const LOG_ENV: &str = "GITBOOK_WORKER_LOG";

#[derive(Parser)]
#[command(name = "gitbook-worker")]
#[command(about = "Prepare GitBook-style Markdown books for Pandoc/LaTeX publishing")]
#[command(long_about = "\
Prepare GitBook-style Markdown books for Pandoc/LaTeX publishing

A repository holds a publish.yml describing one or more publications.
Each publication points at a content root:

  repo/
  ├── publish.yml                  # version, project metadata, publish entries
  ├── docker_config.yml            # Repository config layer (optional)
  ├── fonts/                       # Searched before system font directories
  └── content/
      ├── book.json                # root, structure.summary (optional)
      ├── SUMMARY.md               # Generated unless it carries the manual marker
      ├── README.md                # Book entry document
      └── guide/
          ├── README.md            # Chapter entry; children nest below it
          └── setup.md

'build' regenerates the summary, aligns headings below each parent README,
wraps wide tables and images in page-geometry blocks, rewrites internal
links to anchors and writes one combined Markdown file.

Logging goes to stderr; set GITBOOK_WORKER_LOG to change the filter.")]
#[command(version)]
struct Cli {
    /// Log at debug level unless GITBOOK_WORKER_LOG is set
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate or refresh SUMMARY.md for a content root
    Summary {
        /// Content root (or a directory below a book.json)
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Ordering mode: gitbook-style, alphanumeric, manifest, manual, ...
        #[arg(long)]
        mode: Option<SummaryMode>,
        /// Post-processing: flip, appendix-last, no-change
        #[arg(long)]
        submode: Option<SubMode>,
        /// Order manifest (YAML, JSON or one path per line)
        #[arg(long)]
        order: Option<PathBuf>,
        /// Print the generated summary instead of writing it
        #[arg(long)]
        check: bool,
    },
    /// Preprocess one Markdown file for LaTeX output
    Preprocess {
        file: PathBuf,
        /// Base paper format (a4, a3-landscape, ...)
        #[arg(long, default_value = "a4")]
        paper: String,
        /// Write here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Realign the headings of one Markdown file
    Align {
        file: PathBuf,
        /// Target level of the first heading; default is parent README + 1
        #[arg(long)]
        level: Option<usize>,
        /// Write here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Layered configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Font bundle
    Fonts {
        #[command(subcommand)]
        command: FontsCommand,
    },
    /// Convert an SVG to PDF with the first available converter
    Svg {
        file: PathBuf,
        /// Target PDF; default is next to the SVG
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Converter to try first (rsvg-convert, inkscape)
        #[arg(long)]
        prefer: Vec<String>,
    },
    /// Validate YAML front matter below a directory
    CheckFrontmatter {
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Resolve the steps of an orchestration profile
    Profile {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(default_value = "default")]
        name: String,
    },
    /// Print the exit code registry
    ExitCodes {
        /// Only this code
        #[arg(long)]
        code: Option<u8>,
    },
    /// Run the whole preparation pipeline for a publish entry
    Build {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Publish entry name; default is the first entry
        #[arg(long)]
        publish: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the merged configuration mapping as YAML
    Merge {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        publish: Option<String>,
        /// Extra template variable, key=value (repeatable)
        #[arg(long = "var")]
        vars: Vec<String>,
    },
    /// Resolve an image or container name; both when --kind is omitted
    DockerName {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        kind: Option<NameKind>,
        #[arg(long, default_value = "default")]
        context: String,
        #[arg(long)]
        publish: Option<String>,
        #[arg(long = "var")]
        vars: Vec<String>,
    },
    /// Print the stock docker_config.yml
    Stock,
}

#[derive(Subcommand)]
enum FontsCommand {
    /// Resolve every declared font, downloading what is missing
    Prepare {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// fonts.yml to use instead of the stock catalog
        #[arg(long)]
        fonts: Option<PathBuf>,
        /// Download cache directory
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Extra directory to search (repeatable)
        #[arg(long = "search-path")]
        search_paths: Vec<PathBuf>,
        /// Skip fonts that cannot be resolved instead of failing
        #[arg(long)]
        allow_partial: bool,
        /// Copy the runtime descriptor here
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the stock fonts.yml
    Stock,
}

/// A command failure: the component it came from and the exit status.
struct CliError {
    component: &'static str,
    status: ExitStatus,
    message: String,
}

impl CliError {
    fn new(component: &'static str, err: impl Display) -> Self {
        Self {
            component,
            status: ExitStatus::Failure,
            message: err.to_string(),
        }
    }

    fn with_status(mut self, status: ExitStatus) -> Self {
        self.status = status;
        self
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("error [{}]: {}", e.component, e.message);
            e.status.into()
        }
    }
}

fn run(command: Command) -> Result<ExitStatus, CliError> {
    match command {
        Command::Summary {
            root,
            mode,
            submode,
            order,
            check,
        } => {
            let defaults = SummaryOptions::default();
            let options = SummaryOptions {
                mode: mode.unwrap_or(defaults.mode),
                submode: submode.unwrap_or(defaults.submode),
                order_manifest: order,
                ..defaults
            };
            if check {
                let layout = summary::summary_layout(&root);
                let order = options.order_manifest.as_deref().map(summary::load_manifest_order);
                let lines = summary::generate_summary(&layout.root_dir, options.mode, options.submode, order)
                    .map_err(|e| CliError::new("summary", e))?;
                for line in lines {
                    println!("{}", line);
                }
            } else {
                let outcome = summary::ensure_summary(&root, &options).map_err(|e| CliError::new("summary", e))?;
                output::print_summary(&outcome, None);
            }
        }
        Command::Preprocess { file, paper, output } => {
            let text = Preprocessor::new()
                .preprocess(&file, &paper)
                .map_err(|e| CliError::new("preprocess", e))?;
            write_or_print(output.as_deref(), &text).map_err(|e| CliError::new("preprocess", e))?;
        }
        Command::Align { file, level, output } => {
            let content = fs::read_to_string(&file).map_err(|e| CliError::new("headings", e))?;
            let aligned = match level {
                Some(level) => headings::align_to_level(&content, level),
                None => headings::align(&content, &file),
            };
            write_or_print(output.as_deref(), &aligned).map_err(|e| CliError::new("headings", e))?;
        }
        Command::Config { command } => run_config(command)?,
        Command::Fonts { command } => run_fonts(command)?,
        Command::Svg { file, output, prefer } => {
            let converters = imaging::default_converters();
            let prefer: Vec<&str> = prefer.iter().map(String::as_str).collect();
            let outcome = imaging::ensure_svg_pdf(&file, output.as_deref(), &converters, &prefer)
                .map_err(|e| CliError::new("svg", e))?;
            match outcome {
                SvgOutcome::Converted { converter, pdf } => println!("{} → {} ({})", file.display(), pdf.display(), converter),
                SvgOutcome::UpToDate(pdf) => println!("{} is up to date", pdf.display()),
                SvgOutcome::Skipped => {
                    return Err(CliError::new("svg", format!("no converter could convert {}", file.display())));
                }
            }
        }
        Command::CheckFrontmatter { root } => {
            let issues = frontmatter::check_tree(&root).map_err(|e| CliError::new("frontmatter", e))?;
            output::print_frontmatter_issues(&issues);
            if !issues.is_empty() {
                return Ok(ExitStatus::FrontMatter);
            }
        }
        Command::Profile { repo, name } => {
            let path = PublishManifest::locate(&repo)
                .ok_or_else(|| CliError::new("manifest", format!("no publish.yml found under {}", repo.display())))?;
            let manifest = PublishManifest::load(&path).map_err(|e| CliError::new("manifest", e))?;
            manifest.validate().map_err(|e| CliError::new("manifest", e))?;
            let steps = manifest.resolve_profile(&name).map_err(|e| CliError::new("manifest", e))?;
            for (i, step) in steps.iter().enumerate() {
                println!("{:0>3} {}", i + 1, step);
            }
        }
        Command::ExitCodes { code } => {
            output::print_exit_codes(&exit_codes::lookup(code));
        }
        Command::Build { repo, publish } => match pipeline::prepare_publication(&repo, publish.as_deref()) {
            Ok(publication) => output::print_publication(&publication),
            Err(PipelineError::FrontMatter(issues)) => {
                output::print_frontmatter_issues(&issues);
                return Err(CliError::new("frontmatter", format!("{} file(s) with malformed front matter", issues.len()))
                    .with_status(ExitStatus::FrontMatter));
            }
            Err(e) => return Err(CliError::new("pipeline", e)),
        },
    }
    Ok(ExitStatus::Success)
}

fn run_config(command: ConfigCommand) -> Result<(), CliError> {
    match command {
        ConfigCommand::Merge { repo, publish, vars } => {
            let vars = config::parse_var_pairs(&vars).map_err(|e| CliError::new("config", e))?;
            let merged = config::merge_configs(&repo, publish.as_deref(), &vars);
            // Layer report goes to stderr so stdout stays valid YAML.
            for line in output::format_config_layers(&merged) {
                eprintln!("{}", line);
            }
            let yaml = serde_yaml::to_string(&merged.values).map_err(|e| CliError::new("config", e))?;
            print!("{}", yaml);
        }
        ConfigCommand::DockerName {
            repo,
            kind,
            context,
            publish,
            vars,
        } => {
            let vars = config::parse_var_pairs(&vars).map_err(|e| CliError::new("config", e))?;
            match kind {
                Some(kind) => {
                    let name = config::merge_configs(&repo, publish.as_deref(), &vars)
                        .docker_name(kind, &context)
                        .map_err(|e| CliError::new("config", e))?;
                    println!("{}", name);
                }
                None => {
                    let names = config::resolve_all_names(&repo, publish.as_deref(), &context, &vars)
                        .map_err(|e| CliError::new("config", e))?;
                    println!("image: {}", names.image);
                    println!("container: {}", names.container);
                }
            }
        }
        ConfigCommand::Stock => print!("{}", config::stock_config_yaml()),
    }
    Ok(())
}

fn run_fonts(command: FontsCommand) -> Result<(), CliError> {
    match command {
        FontsCommand::Prepare {
            repo,
            fonts,
            cache,
            search_paths,
            allow_partial,
            output,
        } => {
            let catalog = fonts
                .as_deref()
                .map(FontCatalog::load)
                .transpose()
                .map_err(|e| CliError::new("fonts", e))?;
            let repo_root = fonts::search::detect_repo_root(&repo);
            let manifest_fonts = match PublishManifest::locate(&repo_root) {
                Some(path) => {
                    PublishManifest::load(&path)
                        .map_err(|e| CliError::new("manifest", e))?
                        .fonts
                }
                None => Vec::new(),
            };
            let options = PrepareOptions {
                cache_dir: cache,
                extra_search_paths: search_paths,
                allow_partial,
                manifest_fonts,
                catalog,
                ..PrepareOptions::new(repo_root)
            };
            let fetcher = HttpFetcher::new().map_err(|e| CliError::new("fonts", e))?;
            let result = fonts::prepare_fonts(&options, &fetcher)
                .map_err(|e| CliError::new("fonts", &e).with_status(ExitStatus::for_font_error(&e)))?;
            output::print_fonts(&result);
            if let Some(target) = output {
                fs::copy(&result.meta_path, &target).map_err(|e| CliError::new("fonts", e))?;
                println!("Descriptor copied to {}", target.display());
            }
        }
        FontsCommand::Stock => print!("{}", fonts::stock_fonts_yaml()),
    }
    Ok(())
}

fn write_or_print(target: Option<&Path>, text: &str) -> std::io::Result<()> {
    match target {
        Some(path) => gitbook_worker::paths::atomic_write(path, text.as_bytes()),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}
