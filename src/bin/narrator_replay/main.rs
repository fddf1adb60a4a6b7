//! `narrator-replay`: run a notification script through the arbiter and print
//! what the synthesizer was asked to say.
//!
//! Output lines are `> text` for interrupting speech and `+ text` for queued
//! speech; `--explain` adds `# ...` lines for arbitration decisions and
//! `--json` prints each request as a JSON object instead.

mod cli;
mod host;
mod script;

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::ReplayArgs;
use crate::host::{ReplayHost, ReplayLine};

fn read_script(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display())),
        _ => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("failed to read script from stdin")?;
            Ok(source)
        }
    }
}

fn write_line(out: &mut impl Write, line: &ReplayLine, args: &ReplayArgs) -> Result<()> {
    match line {
        ReplayLine::Spoken(request) if args.json => {
            writeln!(out, "{}", serde_json::to_string(request)?)?;
        }
        ReplayLine::Spoken(request) => {
            let marker = if request.interrupt { '>' } else { '+' };
            writeln!(out, "{marker} {}", request.text)?;
        }
        ReplayLine::Note(note) if args.explain => writeln!(out, "# {note}")?,
        ReplayLine::Note(_) => {}
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = ReplayArgs::parse();
    let config = args.resolve_config()?;
    narrator::telemetry::init_tracing(&config.logging);

    let source = read_script(args.script.as_deref())?;
    let steps = script::parse_script(&source)?;
    let step_count = steps.len();

    let mut host = ReplayHost::new(&config);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for step in steps {
        for line in host.apply(step) {
            write_line(&mut out, &line, &args)?;
        }
    }
    out.flush()?;
    tracing::debug!(steps = step_count, "replay finished");
    Ok(())
}
