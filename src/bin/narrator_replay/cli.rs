//! CLI flags for the replay tool; file config is loaded first and flags win.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use narrator::config::{load_config, load_config_from};
use narrator::ArbiterConfig;

#[derive(Debug, Parser)]
#[command(
    name = "narrator-replay",
    version,
    about = "Replay a host notification script through the narration arbiter"
)]
pub(crate) struct ReplayArgs {
    /// Newline-delimited JSON script; reads stdin when omitted or "-".
    pub(crate) script: Option<PathBuf>,

    /// Config file to use instead of the user config.
    #[arg(long, env = "NARRATOR_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Override the deferred-action limit.
    #[arg(long)]
    pub(crate) scheduler_capacity: Option<usize>,

    /// Print spoken requests as JSON lines.
    #[arg(long)]
    pub(crate) json: bool,

    /// Also print arbitration decisions (yields, duplicates).
    #[arg(long)]
    pub(crate) explain: bool,

    /// Write JSON trace logs (see NARRATOR_TRACE_LOG).
    #[arg(long)]
    pub(crate) logs: bool,
}

impl ReplayArgs {
    pub(crate) fn resolve_config(&self) -> Result<ArbiterConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        if let Some(capacity) = self.scheduler_capacity {
            config.scheduler_capacity = capacity;
        }
        if self.logs {
            config.logging.enabled = true;
        }
        Ok(config)
    }
}
