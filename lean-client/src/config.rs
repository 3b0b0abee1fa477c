//! Server launch configuration
//!
//! Loads the `[server]` table from the shared config file. The `--server`
//! flag is always appended to the configured command.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lean_utils::{LeanError, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the configured command (whitespace-split)
pub const COMMAND_ENV: &str = "LEAN_CLIENT_COMMAND";

/// What to do with the server's stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrMode {
    /// Share the parent's stderr
    #[default]
    Inherit,
    /// Discard
    Null,
    /// Forward each line to the log at warn level
    Log,
}

/// How to launch the Lean server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Program followed by its arguments, e.g. `["lean"]` or
    /// `["elan", "run", "stable", "lean"]`
    pub command: Vec<String>,
    /// Working directory of the server; its `leanpkg.path` decides the
    /// search path
    pub working_dir: Option<PathBuf>,
    pub stderr: StderrMode,
    /// Extra environment variables for the server process
    pub env: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: vec!["lean".into()],
            working_dir: None,
            stderr: StderrMode::default(),
            env: HashMap::new(),
        }
    }
}

/// Config file layout (only the `[server]` table is ours)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerConfig,
}

impl ServerConfig {
    /// Config running the given command
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_stderr(mut self, stderr: StderrMode) -> Self {
        self.stderr = stderr;
        self
    }

    /// Program to execute and its full argument list, `--server` included
    pub fn program_and_args(&self) -> Result<(&str, Vec<&str>)> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| LeanError::config("server command is empty"))?;
        let mut args: Vec<&str> = args.iter().map(String::as_str).collect();
        args.push(lean_protocol::SERVER_FLAG);
        Ok((program.as_str(), args))
    }

    /// Replace the command with a whitespace-separated override, if any
    pub fn with_command_override(mut self, command: Option<&str>) -> Self {
        if let Some(command) = command {
            let parts: Vec<String> = command.split_whitespace().map(String::from).collect();
            if parts.is_empty() {
                tracing::warn!("Ignoring empty {} override", COMMAND_ENV);
            } else {
                self.command = parts;
            }
        }
        self
    }

    /// Parse the `[server]` table of a config file
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str::<ConfigFile>(content).map(|file| file.server)
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LeanError::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| LeanError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|e| LeanError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from the default config file plus environment overrides
    ///
    /// Returns defaults if the config file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = lean_utils::config_file();

        let config = match Self::load_from(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), command = ?config.command, "Loaded server config");
                config
            }
            Err(LeanError::ConfigNotFound(_)) => {
                tracing::debug!("Config file not found, using default server config");
                Self::default()
            }
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        };

        config.with_command_override(std::env::var(COMMAND_ENV).ok().as_deref())
    }
}
