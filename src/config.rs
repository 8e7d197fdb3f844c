//! Layered docker configuration and `{placeholder}` name templates.
//!
//! Configuration is assembled from four YAML layers, lowest precedence first:
//!
//! ```text
//! .github/gitbook_worker/defaults/docker_config.yml   ← defaults (or defaults/docker_config.yml)
//! docker_config.yml                                    ← repository override
//! publish.yml → docker_config                          ← manifest, all publications
//! publish.yml → publish[name] → docker_config          ← manifest, active publication
//! ```
//!
//! Each layer is deep-merged onto the previous one. Mappings merge key by
//! key at every depth; any other value replaces what was there.
//!
//! ## Layer Failures
//!
//! A layer that does not exist contributes nothing. A layer that exists but
//! does not parse is logged and skipped, never fatal: a typo in a repository
//! override must not stop a publication that the defaults can still serve.
//!
//! ## Name Templates
//!
//! ```yaml
//! docker_names:
//!   default:
//!     image: "book-{repo_name}:{branch}"
//!     container: "book-{publish_name}"
//!   test:
//!     image: "book-test:{branch}"
//! ```
//!
//! A name is looked up under the execution context first, then under
//! `default`. Placeholders are filled from the built-in variables
//! (`context`, `repo_name`, `branch`, `publish_name`) overridden by
//! caller-supplied extras. `{{` and `}}` produce literal braces.

use crate::manifest::PublishManifest;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Template variables, ordered for stable output.
pub type TemplateVars = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("template '{template}' references missing variable '{name}'")]
    MissingVariable { name: String, template: String },
    #[error("template '{template}' is malformed: {reason}")]
    MalformedTemplate {
        template: String,
        reason: &'static str,
    },
    #[error("no docker_names.{context}.{kind} or docker_names.default.{kind} template configured")]
    MissingTemplate { kind: NameKind, context: String },
}

/// Which deployment name to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Image,
    Container,
}

impl NameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NameKind::Image => "image",
            NameKind::Container => "container",
        }
    }
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NameKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(NameKind::Image),
            "container" => Ok(NameKind::Container),
            other => Err(format!("unknown name kind '{other}' (expected image or container)")),
        }
    }
}

/// The four configuration layers, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Defaults,
    Repository,
    PublishGeneral,
    PublishEntry,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayerKind::Defaults => "defaults",
            LayerKind::Repository => "repository",
            LayerKind::PublishGeneral => "publish.yml",
            LayerKind::PublishEntry => "publish entry",
        })
    }
}

/// Result of [`merge_configs`].
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    /// The fully merged mapping.
    pub values: Mapping,
    /// Built-in variables plus extras, for rendering templates from `values`.
    pub variables: TemplateVars,
    /// Layers that contributed, in merge order.
    pub applied: Vec<(LayerKind, PathBuf)>,
    /// Layers that existed but failed to parse.
    pub skipped: Vec<(LayerKind, PathBuf)>,
}

impl LayeredConfig {
    /// Resolve a docker name against the merged mapping and this config's variables.
    pub fn docker_name(&self, kind: NameKind, context: &str) -> Result<String, ConfigError> {
        resolve_docker_name(&self.values, kind, context, &self.variables)
    }
}

/// The stock `docker_config.yml` shipped with the binary.
pub fn stock_config_yaml() -> &'static str {
    include_str!("../defaults/docker_config.yml")
}

/// The stock defaults as a mapping.
pub fn stock_defaults() -> Mapping {
    serde_yaml::from_str(stock_config_yaml()).expect("stock docker_config.yml must parse")
}

// =============================================================================
// Merging
// =============================================================================

/// Recursively merge `overlay` on top of `base`.
///
/// - Mappings are merged key-by-key (overlay keys override base keys).
/// - Non-mapping values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_yaml(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            Value::Mapping(merge_mappings(base_map, overlay_map))
        }
        (_, overlay) => overlay,
    }
}

/// [`merge_yaml`] specialised to mappings.
pub fn merge_mappings(mut base: Mapping, overlay: Mapping) -> Mapping {
    for (key, overlay_val) in overlay {
        let merged = match base.remove(&key) {
            Some(base_val) => merge_yaml(base_val, overlay_val),
            None => overlay_val,
        };
        base.insert(key, merged);
    }
    base
}

enum LayerLoad {
    Missing,
    Loaded(Mapping),
    Skipped,
}

/// Load one YAML layer. Non-mapping documents count as empty.
fn load_layer(path: &Path) -> LayerLoad {
    if !path.is_file() {
        return LayerLoad::Missing;
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read config layer, skipping");
            return LayerLoad::Skipped;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(Value::Mapping(m)) => LayerLoad::Loaded(m),
        Ok(_) => LayerLoad::Loaded(Mapping::new()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not parse config layer, skipping");
            LayerLoad::Skipped
        }
    }
}

fn apply_file_layer(config: &mut LayeredConfig, kind: LayerKind, path: PathBuf) {
    match load_layer(&path) {
        LayerLoad::Missing => debug!(layer = %kind, path = %path.display(), "layer absent"),
        LayerLoad::Loaded(m) => {
            config.values = merge_mappings(std::mem::take(&mut config.values), m);
            config.applied.push((kind, path));
        }
        LayerLoad::Skipped => config.skipped.push((kind, path)),
    }
}

/// `docker_config` of the publish entry called `name` in a raw manifest.
fn entry_layer<'a>(doc: &'a Mapping, name: &str) -> Option<&'a Mapping> {
    doc.get("publish")?
        .as_sequence()?
        .iter()
        .find(|e| e.get("name").and_then(Value::as_str) == Some(name))?
        .get("docker_config")?
        .as_mapping()
}

/// Location of the defaults layer inside a repository.
pub fn defaults_layer_path(repo_root: &Path) -> PathBuf {
    let nested = repo_root
        .join(".github")
        .join("gitbook_worker")
        .join("defaults")
        .join("docker_config.yml");
    if nested.is_file() {
        nested
    } else {
        repo_root.join("defaults").join("docker_config.yml")
    }
}

/// Built-in template variables for an execution context.
pub fn builtin_variables(context: &str) -> TemplateVars {
    TemplateVars::from([
        ("context".to_string(), context.to_string()),
        ("repo_name".to_string(), "erda-book".to_string()),
        ("branch".to_string(), "main".to_string()),
        ("publish_name".to_string(), "default".to_string()),
    ])
}

/// Merge the four configuration layers of `repo_root`.
///
/// `publish_name` selects the publish entry for layer 4 and becomes the
/// `publish_name` template variable; `extra_vars` override every built-in.
pub fn merge_configs(
    repo_root: &Path,
    publish_name: Option<&str>,
    extra_vars: &TemplateVars,
) -> LayeredConfig {
    let mut config = LayeredConfig::default();

    apply_file_layer(&mut config, LayerKind::Defaults, defaults_layer_path(repo_root));
    apply_file_layer(&mut config, LayerKind::Repository, repo_root.join("docker_config.yml"));

    if let Some(manifest_path) = PublishManifest::locate(repo_root) {
        // Read untyped: an unrelated field the typed manifest rejects must
        // not drop the docker_config layers.
        match load_layer(&manifest_path) {
            LayerLoad::Missing => {}
            LayerLoad::Loaded(doc) => {
                if let Some(general) = doc.get("docker_config").and_then(Value::as_mapping) {
                    config.values = merge_mappings(std::mem::take(&mut config.values), general.clone());
                    config.applied.push((LayerKind::PublishGeneral, manifest_path.clone()));
                }
                if let Some(entry) = publish_name.and_then(|name| entry_layer(&doc, name)) {
                    config.values = merge_mappings(std::mem::take(&mut config.values), entry.clone());
                    config.applied.push((LayerKind::PublishEntry, manifest_path));
                }
            }
            LayerLoad::Skipped => config.skipped.push((LayerKind::PublishGeneral, manifest_path)),
        }
    }

    let mut variables = builtin_variables("default");
    variables.remove("context");
    if let Some(name) = publish_name {
        variables.insert("publish_name".to_string(), name.to_string());
    }
    variables.extend(extra_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    config.variables = variables;

    info!(
        applied = config.applied.len(),
        skipped = config.skipped.len(),
        "merged configuration layers"
    );
    config
}

// =============================================================================
// Templates
// =============================================================================

/// Substitute `{name}` placeholders in `template`.
pub fn render(template: &str, variables: &TemplateVars) -> Result<String, ConfigError> {
    let malformed = |reason| ConfigError::MalformedTemplate {
        template: template.to_string(),
        reason,
    };
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => return Err(malformed("nested '{'")),
                        Some(ch) => name.push(ch),
                        None => return Err(malformed("unclosed '{'")),
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(malformed("empty placeholder"));
                }
                let value = variables.get(name).ok_or_else(|| ConfigError::MissingVariable {
                    name: name.to_string(),
                    template: template.to_string(),
                })?;
                out.push_str(value);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(malformed("single '}'")),
            other => out.push(other),
        }
    }
    Ok(out)
}

fn template_for<'a>(names: &'a Mapping, section: &str, kind: NameKind) -> Option<&'a str> {
    names
        .get(section)?
        .get(kind.as_str())?
        .as_str()
        .filter(|s| !s.trim().is_empty())
}

/// Resolve a deployment name from a merged configuration.
///
/// Template lookup: `docker_names[context][kind]`, then
/// `docker_names.default[kind]`.
pub fn resolve_docker_name(
    config: &Mapping,
    kind: NameKind,
    context: &str,
    vars: &TemplateVars,
) -> Result<String, ConfigError> {
    let missing = || ConfigError::MissingTemplate {
        kind,
        context: context.to_string(),
    };
    let names = config
        .get("docker_names")
        .and_then(Value::as_mapping)
        .ok_or_else(missing)?;
    let template = template_for(names, context, kind)
        .or_else(|| template_for(names, "default", kind))
        .ok_or_else(missing)?;

    let mut variables = builtin_variables(context);
    variables.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    let name = render(template, &variables)?;
    debug!(kind = %kind, context, name = %name, "resolved docker name");
    Ok(name)
}

/// Image and container names for one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerNames {
    pub image: String,
    pub container: String,
}

/// Merge the layers of `repo_root` and resolve both names for `context`.
pub fn resolve_all_names(
    repo_root: &Path,
    publish_name: Option<&str>,
    context: &str,
    extra_vars: &TemplateVars,
) -> Result<DockerNames, ConfigError> {
    let config = merge_configs(repo_root, publish_name, extra_vars);
    Ok(DockerNames {
        image: config.docker_name(NameKind::Image, context)?,
        container: config.docker_name(NameKind::Container, context)?,
    })
}

/// Parse `key=value` pairs (CLI `--var`) into template variables.
pub fn parse_var_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<TemplateVars, String> {
    pairs
        .iter()
        .map(|pair| {
            let pair = pair.as_ref();
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| format!("expected key=value, got '{pair}'"))
        })
        .collect()
}
