//! Configuration management for demobatch.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Command-line flags
//! 2. Config file (`--config`, `DEMOBATCH_CONFIG`, or the platform config dir)
//! 3. Default values

use anyhow::{Context, Result, bail};
use demobatch_core::ArtifactLayout;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::Cli;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// External parser settings
    #[serde(default)]
    pub parser: ParserConfig,

    /// File-naming conventions
    #[serde(default)]
    pub layout: ArtifactLayout,

    /// Run behaviour
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Parser executable; relative paths resolve against the demobatch binary first
    #[serde(default = "default_parser_executable")]
    pub executable: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Wait for Enter before exiting so the summary stays on screen
    #[serde(default = "default_true")]
    pub wait_for_keypress: bool,

    /// Keep decompressed captures whose parse failed
    #[serde(default)]
    pub keep_failed_extractions: bool,
}

// Default value functions
fn default_parser_executable() -> PathBuf {
    PathBuf::from(format!(
        "bin/Debug/net7.0/DemoFile.Example.FastParser{}",
        std::env::consts::EXE_SUFFIX
    ))
}

fn default_true() -> bool {
    true
}

fn default_config_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "demobatch", "demobatch") {
        proj_dirs.config_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".demobatch")
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            executable: default_parser_executable(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            wait_for_keypress: default_true(),
            keep_failed_extractions: false,
        }
    }
}

impl Config {
    /// Load configuration from `explicit`, or from the default location.
    ///
    /// A missing default file means defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found at: {}", path.display());
                }
                path.to_path_buf()
            }
            None => Self::config_path(),
        };

        let config: Config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config
            .layout
            .validate()
            .with_context(|| format!("Invalid layout in {}", config_path.display()))?;

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_path() -> PathBuf {
        default_config_dir().join("config.toml")
    }

    /// Apply command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref parser) = cli.parser {
            self.parser.executable = parser.clone();
        }
        if cli.no_wait {
            self.run.wait_for_keypress = false;
        }
        if cli.keep_failed_extractions {
            self.run.keep_failed_extractions = true;
        }
    }
}
