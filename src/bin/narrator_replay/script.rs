//! Replay script format: one JSON object per line, tagged by `op`.
//!
//! ```text
//! # battle turn where target selection opens in the same frame
//! {"op":"claim","region":"battle-command"}
//! {"op":"defer","text":"Attack","unless_active":"battle-target"}
//! {"op":"claim","region":"battle-target"}
//! {"op":"tick"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum ScriptStep {
    /// Owner screen opened; its oracle stays true until `invalidate`.
    Claim {
        region: String,
        #[serde(default)]
        contexts: Vec<String>,
    },
    /// Owner reports a new focused value.
    Announce {
        region: String,
        context: String,
        text: String,
        #[serde(default = "default_true")]
        interrupt: bool,
    },
    /// Generic cursor observer fired, optionally deferred by some ticks.
    Generic {
        context: String,
        text: String,
        #[serde(default)]
        defer: Option<u32>,
    },
    /// Incidental speech with no ownership change.
    Speak {
        text: String,
        #[serde(default)]
        interrupt: bool,
    },
    /// Owner's screen vanished without a close notification.
    Invalidate { region: String },
    /// Explicit close notification.
    Close { region: String },
    Defer {
        text: String,
        #[serde(default = "default_one")]
        ticks: u32,
        #[serde(default)]
        interrupt: bool,
        #[serde(default)]
        while_owned: Option<String>,
        #[serde(default)]
        unless_active: Option<String>,
    },
    Tick {
        #[serde(default = "default_one")]
        count: u32,
    },
    /// Synthesizer finished the current utterance.
    Finish,
    Silence,
    Reset,
}

pub(crate) fn parse_script(source: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step = serde_json::from_str(line)
            .with_context(|| format!("script line {}: invalid step", index + 1))?;
        steps.push(step);
    }
    Ok(steps)
}
