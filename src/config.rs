//! Configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{AppError, Result};

/// Settings for spawning a local evaluator process.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EvaluatorConfig {
    /// Evaluator binary (e.g. a Scheme interpreter started in network-REPL
    /// mode).
    pub command: String,
    /// Arguments passed to the evaluator binary.
    #[serde(default)]
    pub args: Vec<String>,
    /// Maximum time to wait for the evaluator's port announcement before
    /// the spawn is abandoned and the process killed.
    #[serde(default = "default_startup_timeout_seconds")]
    pub startup_timeout_seconds: u64,
}

fn default_startup_timeout_seconds() -> u64 {
    30
}

/// Settings for connecting to an already-listening evaluator.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RemoteConfig {
    /// Evaluator host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Evaluator port.
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_source_dirs() -> Vec<String> {
    vec!["src".into()]
}

/// Global configuration parsed from `config.toml`.
///
/// At least one of `[evaluator]` (spawn a local process) or `[remote]`
/// (connect to a listening evaluator) must be present.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Local evaluator spawn settings.
    #[serde(default)]
    pub evaluator: Option<EvaluatorConfig>,
    /// Remote evaluator connection settings.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    /// Workspace root used by module-name resolution.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    /// Directories under the workspace root whose files map to named
    /// modules (first match wins).
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<String>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        if self.evaluator.is_none() && self.remote.is_none() {
            return Err(AppError::Config(
                "config must define [evaluator] or [remote]".into(),
            ));
        }

        if let Some(evaluator) = &self.evaluator {
            if evaluator.command.trim().is_empty() {
                return Err(AppError::Config("evaluator.command must not be empty".into()));
            }
            if evaluator.startup_timeout_seconds == 0 {
                return Err(AppError::Config(
                    "evaluator.startup_timeout_seconds must be greater than zero".into(),
                ));
            }
        }

        if self.source_dirs.is_empty() {
            return Err(AppError::Config("source_dirs must not be empty".into()));
        }

        if let Some(root) = &self.workspace_root {
            let canonical = root
                .canonicalize()
                .map_err(|err| AppError::Config(format!("workspace_root invalid: {err}")))?;
            self.workspace_root = Some(canonical);
        }

        Ok(())
    }
}
