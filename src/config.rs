//! Persistent arbiter settings (`~/.config/narrator/config.toml`).
//!
//! Every key is optional; a missing file or missing key falls back to the
//! defaults below. Unknown keys are ignored so older builds can read newer
//! files.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::region::{regions, Region};
use crate::scheduler;

const CONFIG_FILE: &str = "config.toml";
const CONFIG_DIR_ENV: &str = "NARRATOR_CONFIG_DIR";

/// Trace logging switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Write JSON trace lines to the trace file.
    pub enabled: bool,
    /// Trace file override; `NARRATOR_TRACE_LOG` wins over this.
    pub trace_path: Option<PathBuf>,
}

/// Tunables for one [`Arbiter`](crate::Arbiter).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Pending deferred actions above which a warning is logged.
    pub scheduler_capacity: usize,
    /// Region names the generic observer checks, highest priority first.
    /// Empty means the built-in order.
    pub generic_priority: Vec<String>,
    /// When false the arbiter runs with a silent speech channel.
    pub speech_enabled: bool,
    /// Repeat window for the generic observer; 0 means plain value dedup.
    pub generic_repeat_window_ms: u64,
    pub logging: LogConfig,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            scheduler_capacity: scheduler::DEFAULT_CAPACITY,
            generic_priority: Vec::new(),
            speech_enabled: true,
            generic_repeat_window_ms: 0,
            logging: LogConfig::default(),
        }
    }
}

impl ArbiterConfig {
    /// Generic observer priority as regions.
    #[must_use]
    pub fn priority(&self) -> Vec<Region> {
        if self.generic_priority.is_empty() {
            return regions::default_priority();
        }
        self.generic_priority
            .iter()
            .map(|name| Region::new(name.trim()))
            .collect()
    }

    #[must_use]
    pub fn generic_repeat_window(&self) -> Option<Duration> {
        (self.generic_repeat_window_ms > 0)
            .then(|| Duration::from_millis(self.generic_repeat_window_ms))
    }
}

fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::config_dir().map(|dir| dir.join("narrator"))
}

/// Resolve the full config file path.
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Load the user config, or defaults when no file exists.
pub fn load_config() -> Result<ArbiterConfig> {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Ok(ArbiterConfig::default()),
    }
}

pub fn load_config_from(path: &Path) -> Result<ArbiterConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<ArbiterConfig> {
    toml::from_str(contents).context("config is not valid TOML for narrator")
}
