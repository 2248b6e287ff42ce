//! Configuration management for the MDX language server.
//!
//! Handles:
//! - Command-line argument parsing
//! - The project file `.mdx-ls.toml`
//! - Merging both over the built-in defaults (CLI wins)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::compiler::CompileOptions;
use crate::preview::{ContentStore, SessionSettings, DEFAULT_DEBOUNCE};
use crate::render::Theme;

/// Name of the project configuration file
pub const PROJECT_CONFIG_FILE: &str = ".mdx-ls.toml";

/// Command-line arguments for the MDX language server
#[derive(Debug, Parser)]
#[command(name = "mdx-ls")]
#[command(about = "Language server with live MDX preview")]
#[command(version)]
pub struct Args {
    /// Preview theme
    #[arg(long, value_enum)]
    pub theme: Option<Theme>,

    /// Debounce delay before compiling, in milliseconds
    #[arg(long, help = "Quiet period after an edit before compiling (ms)")]
    pub debounce_ms: Option<u64>,

    /// Where the current document is persisted
    #[arg(long, help = "Storage file (default: <data dir>/mdx-ls/storage.json)")]
    pub storage_path: Option<PathBuf>,

    /// Disable persistence entirely
    #[arg(long)]
    pub no_persist: bool,

    /// Fail on code fences in unknown languages
    #[arg(long)]
    pub strict_languages: bool,

    /// Project configuration file
    #[arg(long, help = "Project config file (default: ./.mdx-ls.toml if present)")]
    pub config: Option<PathBuf>,

    /// Log level for the language server
    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// `[preview]` section of the project file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewSection {
    pub theme: Option<Theme>,
    pub debounce_ms: Option<u64>,
}

/// Contents of `.mdx-ls.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub preview: PreviewSection,
    pub compile: CompileOptions,
}

impl ProjectConfig {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read project config: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse project config: {}", path.display()))
    }
}

/// Values given on the command line, kept to re-apply over reloaded files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Overrides {
    theme: Option<Theme>,
    debounce_ms: Option<u64>,
    strict_languages: bool,
}

/// Combined configuration from all sources
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub theme: Theme,
    pub debounce: Duration,
    pub compile: CompileOptions,
    /// Storage file; `None` when persistence is disabled
    pub storage_path: Option<PathBuf>,
    /// Project file the settings were read from
    pub project_config_path: Option<PathBuf>,
    /// Log level
    pub log_level: String,
    overrides: Overrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            debounce: DEFAULT_DEBOUNCE,
            compile: CompileOptions::default(),
            storage_path: ContentStore::default_path(),
            project_config_path: None,
            log_level: "info".to_string(),
            overrides: Overrides::default(),
        }
    }
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        let project_config_path = match args.config {
            Some(path) => Some(path),
            None => {
                let local = PathBuf::from(PROJECT_CONFIG_FILE);
                local.is_file().then_some(local)
            }
        };

        let storage_path = if args.no_persist {
            None
        } else {
            args.storage_path.or_else(ContentStore::default_path)
        };

        let config = Config {
            storage_path,
            log_level: args.log_level,
            overrides: Overrides {
                theme: args.theme,
                debounce_ms: args.debounce_ms,
                strict_languages: args.strict_languages,
            },
            ..Config::default()
        };

        match project_config_path {
            Some(path) => config.with_project_file(&path),
            None => Ok(config.merged(ProjectConfig::default())),
        }
    }

    /// Re-read settings from `path`, keeping command-line overrides.
    pub fn with_project_file(&self, path: &Path) -> Result<Self> {
        let project = ProjectConfig::load(path)?;
        let mut config = self.merged(project);
        config.project_config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// CLI > project file > defaults
    fn merged(&self, project: ProjectConfig) -> Self {
        let overrides = self.overrides.clone();

        let theme = overrides
            .theme
            .or(project.preview.theme)
            .unwrap_or_default();
        let debounce = overrides
            .debounce_ms
            .or(project.preview.debounce_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);
        let mut compile = project.compile;
        if overrides.strict_languages {
            compile.ignore_missing_languages = false;
        }

        Config {
            theme,
            debounce,
            compile,
            storage_path: self.storage_path.clone(),
            project_config_path: self.project_config_path.clone(),
            log_level: self.log_level.clone(),
            overrides,
        }
    }

    pub fn has_project_config(&self) -> bool {
        self.project_config_path.is_some()
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            theme: self.theme,
            debounce: self.debounce,
        }
    }
}
