use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where the event log lives. A caller-supplied path wins, then the
/// `CHRONICLE_PATH` environment variable; with neither set the root is
/// `<XDG data dir>/chronicle`, or `~/.chronicle` on systems without one.
/// Caller and env paths may start with `~/`.
pub fn resolve_data_root(explicit_path: Option<&str>) -> Result<PathBuf> {
    let override_path = explicit_path
        .map(str::to_string)
        .or_else(|| std::env::var("CHRONICLE_PATH").ok());

    if let Some(raw) = override_path {
        let expanded = match raw.strip_prefix("~/") {
            Some(rest) => home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&raw)),
            None => PathBuf::from(&raw),
        };
        return Ok(expanded);
    }

    dirs::data_dir()
        .map(|data| data.join("chronicle"))
        .or_else(|| home_dir().map(|home| home.join(".chronicle")))
        .ok_or_else(|| {
            Error::Config(
                "Could not determine data root: no HOME directory or XDG data directory found"
                    .to_string(),
            )
        })
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn default_preserve_recent_turns() -> usize {
    5
}

fn default_subagent_timeout_secs() -> u64 {
    3_600
}

fn default_tmux_spawn_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Override for the data root; resolution falls back to the usual
    /// chain when absent.
    #[serde(default)]
    pub data_root: Option<String>,

    /// Turns preserved verbatim through compaction.
    #[serde(default = "default_preserve_recent_turns")]
    pub preserve_recent_turns: usize,

    /// Guardrail timeout for subagent runs, in seconds.
    #[serde(default = "default_subagent_timeout_secs")]
    pub subagent_timeout_secs: u64,

    /// Startup timeout for tmux-spawned subagents, in seconds.
    #[serde(default = "default_tmux_spawn_timeout_secs")]
    pub tmux_spawn_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: None,
            preserve_recent_turns: default_preserve_recent_turns(),
            subagent_timeout_secs: default_subagent_timeout_secs(),
            tmux_spawn_timeout_secs: default_tmux_spawn_timeout_secs(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(resolve_data_root(None)?.join("config.toml"))
    }

    /// Resolved data root for this config.
    pub fn data_root(&self) -> Result<PathBuf> {
        resolve_data_root(self.data_root.as_deref())
    }

    /// Single database file holding the event log.
    pub fn db_path(&self) -> Result<PathBuf> {
        Ok(self.data_root()?.join("events.db"))
    }

    /// Directory for optional mirrored log files.
    pub fn logs_dir(&self) -> Result<PathBuf> {
        Ok(self.data_root()?.join("logs"))
    }
}
