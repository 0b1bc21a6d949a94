//! Site configuration management.
//!
//! The config file may be YAML, JSON or TOML; the format is picked from the
//! file extension.
//!
//! # Keys
//!
//! | Key             | Purpose                                         |
//! |-----------------|-------------------------------------------------|
//! | `ignore`        | Glob patterns excluded from the crawl           |
//! | `output_dir`    | Where the site is written (default `_build`)    |
//! | `templates_dir` | Output templates (default `_templates`)         |
//! | `copy`          | Extra paths always copied to the output         |
//! | `pretty_links`  | Write `<id>/index.html` instead of `<id>.html`  |
//! | `serve`         | Development server (port, interface, watch)     |
//! | anything else   | Passed through to templates as `config.*`       |
//!
//! # Example
//!
//! ```yaml
//! title: My Research Group
//! ignore:
//!   - README.md
//!   - drafts/**
//! copy:
//!   - _static
//! pretty_links: true
//! serve:
//!   port: 8000
//! ```

mod defaults;
mod error;
mod serve;

pub use error::ConfigError;
pub use serve::ServeConfig;

use crate::cli::Cli;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::IpAddr,
    path::{Component, Path, PathBuf},
};

// ============================================================================
// Config Format
// ============================================================================

/// Supported config file formats, selected by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => Some(Self::Yaml),
            Some("json") => Some(Self::Json),
            Some("toml") => Some(Self::Toml),
            _ => None,
        }
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure, loaded once per build.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
pub struct SiteConfig {
    /// Site root every other path is relative to (set after loading)
    #[serde(skip, default = "defaults::root")]
    #[educe(Default = defaults::root())]
    pub root: PathBuf,

    /// Config file path relative to root (set after loading)
    #[serde(skip_deserializing, default = "defaults::config_file")]
    #[educe(Default = defaults::config_file())]
    pub config_file: PathBuf,

    /// Glob patterns, matched against paths relative to root
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Build output directory
    #[serde(default = "defaults::output_dir")]
    #[educe(Default = defaults::output_dir())]
    pub output_dir: PathBuf,

    /// Directory holding output templates
    #[serde(default = "defaults::templates_dir")]
    #[educe(Default = defaults::templates_dir())]
    pub templates_dir: PathBuf,

    /// Extra files or directories always copied to the output
    #[serde(default)]
    pub copy: Vec<PathBuf>,

    /// Write pages to `<id>/index.html`
    #[serde(default)]
    pub pretty_links: bool,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// User-defined fields, available to templates as `config.*`
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SiteConfig {
    /// Parse configuration from a string in the given format.
    pub fn from_str(content: &str, format: ConfigFormat, path: &Path) -> Result<Self, ConfigError> {
        let path = path.to_path_buf();
        match format {
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|err| ConfigError::Yaml(path, err))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|err| ConfigError::Json(path, err))
            }
            ConfigFormat::Toml => toml::from_str(content).map_err(|err| ConfigError::Toml(path, err)),
        }
    }

    /// Load configuration from `root/config_file` and apply the fixed rules:
    /// the config file, output and template directories are always ignored.
    pub fn load(root: &Path, config_file: &Path) -> Result<Self, ConfigError> {
        let config_file = config_file
            .strip_prefix(root)
            .unwrap_or(config_file)
            .to_path_buf();
        let full_path = root.join(&config_file);

        let format = ConfigFormat::from_path(&config_file)
            .ok_or_else(|| ConfigError::UnsupportedFormat(config_file.clone()))?;
        let content =
            fs::read_to_string(&full_path).map_err(|err| ConfigError::Io(full_path.clone(), err))?;

        let mut config = Self::from_str(&content, format, &full_path)?;
        config.root = root.to_path_buf();
        config.config_file = config_file;
        // `config_file` is reserved; a user value would shadow the real one
        config.extra.remove("config_file");

        config.output_dir = expand_tilde(&config.output_dir);
        config.templates_dir = expand_tilde(&config.templates_dir);

        let config_glob = to_slash(&config.config_file);
        let output_glob = format!("{}/**", to_slash(&config.output_dir));
        let templates_glob = format!("{}/**", to_slash(&config.templates_dir));
        for pattern in [config_glob, output_glob, templates_glob] {
            if !config.ignore.contains(&pattern) {
                config.ignore.push(pattern);
            }
        }

        Ok(config)
    }

    /// Update configuration with CLI arguments.
    pub fn update_with_cli(&mut self, cli: &Cli) {
        if let Some(port) = cli.port {
            self.serve.port = port;
            // An explicit port is a request for that port only
            self.serve.port_attempts = 1;
        }
        if let Some(interface) = &cli.interface {
            self.serve.interface.clone_from(interface);
        }
    }

    /// Validate configuration values that serde cannot check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serve.interface.parse::<IpAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "[serve.interface] `{}` is not an IP address",
                self.serve.interface
            )));
        }
        if self.serve.port_attempts == 0 {
            return Err(ConfigError::Validation(
                "[serve.port_attempts] must be at least 1".into(),
            ));
        }
        for pattern in &self.ignore {
            if let Err(err) = glob::Pattern::new(pattern) {
                return Err(ConfigError::Validation(format!(
                    "[ignore] `{pattern}` is not a valid glob: {err}"
                )));
            }
        }
        Ok(())
    }

    /// Absolute-or-root-relative path of the config file.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(&self.config_file)
    }

    /// Output directory joined with root.
    pub fn output_path(&self) -> PathBuf {
        self.root.join(&self.output_dir)
    }

    /// Templates directory joined with root.
    pub fn templates_path(&self) -> PathBuf {
        self.root.join(&self.templates_dir)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Expand a leading `~` in a configured path.
fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    }
}

/// Whether `path`, joined onto a directory, stays inside that directory.
pub fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Render a relative path with `/` separators on every platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .filter(|c| c != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Tests
// ============================================================================
