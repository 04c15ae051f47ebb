// Configuration for the sync daemon.
//
// Global config: `~/.autopush/config.toml`. Every field has a default, so a
// partial (or missing) file is fine; only `remote_base_url` must be supplied,
// either here or on the command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Root directory for autopush global state: `~/.autopush/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".autopush"))
}

/// Path to the global config file: `~/.autopush/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Everything the bootstrapper, the sync cycle and the scheduler need.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Branch the local branch is renamed to and pushed as.
    pub branch: String,
    /// Remote name to configure and push to.
    pub remote: String,
    /// Prefix of the remote URL, e.g. `https://github.com/someone/`.
    /// The repository directory name and `.git` are appended verbatim.
    pub remote_base_url: String,
    /// Seconds between sync cycles.
    pub interval_sec: u64,
    /// Commit counter record. Relative paths resolve inside `<repo>/.git`.
    pub counter_file: PathBuf,
    /// Per-command timeout in seconds (0 = no timeout).
    pub command_timeout_sec: u64,
    /// Push with `-u` so the branch tracks the remote.
    pub set_upstream: bool,
    /// Run a cycle immediately after startup instead of waiting one interval.
    pub run_on_start: bool,
    /// Git executable to invoke.
    pub git_program: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            branch: "main".into(),
            remote: "origin".into(),
            remote_base_url: String::new(),
            interval_sec: 25 * 60,
            counter_file: PathBuf::from("git_commit_count.txt"),
            command_timeout_sec: 120,
            set_upstream: true,
            run_on_start: true,
            git_program: "git".into(),
        }
    }
}

impl SyncConfig {
    /// Load from `~/.autopush/config.toml`. A missing file yields defaults;
    /// an unreadable or malformed one is an error.
    pub fn load() -> Result<Self, ConfigError> {
        match global_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Io { path: parent.to_path_buf(), source })?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("remote_base_url must be set".into()));
        }
        if self.branch.trim().is_empty() {
            return Err(ConfigError::Invalid("branch must not be empty".into()));
        }
        if self.remote.trim().is_empty() {
            return Err(ConfigError::Invalid("remote must not be empty".into()));
        }
        if self.interval_sec == 0 {
            return Err(ConfigError::Invalid("interval_sec must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_sec)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_sec > 0).then(|| Duration::from_secs(self.command_timeout_sec))
    }

    /// Where the commit counter lives, given the repository's resolved git
    /// directory. An absolute `counter_file` wins.
    pub fn counter_path(&self, git_dir: &Path) -> PathBuf {
        if self.counter_file.is_absolute() {
            self.counter_file.clone()
        } else {
            git_dir.join(&self.counter_file)
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error at `{}`: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("config parse error: {0}")]
    Parse(toml::de::Error),

    #[error("config serialize error: {0}")]
    Serialize(toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
