//! Single-slot speech output with interrupt/enqueue semantics.
//!
//! Focus changes (a turn starting, a menu opening, the cursor landing on a new
//! row) must interrupt whatever is being said so the user always hears where
//! they are now. Supplementary details (damage numbers, status effects) queue
//! behind the current utterance instead, and only the newest queued detail
//! survives: older ones describe a state the user has already moved past.

mod scripted;
mod worker;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use scripted::{ScriptedSynth, SynthProbe};
pub use worker::ThreadedSynth;

/// One utterance handed to the speech channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub interrupt: bool,
}

impl SpeechRequest {
    #[must_use]
    pub fn interrupting(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            interrupt: true,
        }
    }

    #[must_use]
    pub fn queued(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            interrupt: false,
        }
    }
}

/// Failures reported by a synthesizer backend. The channel logs and absorbs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    /// No screen reader or TTS engine is loaded.
    Unavailable(String),
    /// The engine refused the utterance.
    Rejected(String),
    /// The worker thread that owned the engine has exited.
    Disconnected,
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "speech synthesizer unavailable: {reason}"),
            Self::Rejected(reason) => write!(f, "speech synthesizer rejected utterance: {reason}"),
            Self::Disconnected => f.write_str("speech worker disconnected"),
        }
    }
}

impl std::error::Error for SpeechError {}

/// Speech backend driven by the channel (screen reader bridge, TTS engine, ...).
pub trait Synthesizer: Send {
    /// Start speaking `text`; `interrupt` asks the engine to cut off current output.
    fn speak(&mut self, text: &str, interrupt: bool) -> Result<(), SpeechError>;
    /// Stop all output.
    fn silence(&mut self) -> Result<(), SpeechError>;
    /// Whether an utterance is still being voiced.
    fn is_speaking(&self) -> bool;
}

/// Synthesizer that writes utterances to the trace log; never reports busy.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSynth;

impl Synthesizer for LogSynth {
    fn speak(&mut self, text: &str, interrupt: bool) -> Result<(), SpeechError> {
        info!(target: "narrator::speech", interrupt, text, "speak");
        Ok(())
    }

    fn silence(&mut self) -> Result<(), SpeechError> {
        info!(target: "narrator::speech", "silence");
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        false
    }
}

/// Speech output sink owning the synthesizer plus one pending utterance.
pub struct SpeechChannel {
    synth: Option<Box<dyn Synthesizer>>,
    current: Option<String>,
    pending: Option<String>,
}

impl SpeechChannel {
    #[must_use]
    pub fn new(synth: impl Synthesizer + 'static) -> Self {
        Self {
            synth: Some(Box::new(synth)),
            current: None,
            pending: None,
        }
    }

    /// Channel with no synthesizer; every call is a no-op.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            synth: None,
            current: None,
            pending: None,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.synth.is_some()
    }

    /// Speak now (interrupting) or after the current utterance (queued).
    pub fn speak(&mut self, text: impl Into<String>, interrupt: bool) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        if self.synth.is_none() {
            debug!("speech dropped: no synthesizer");
            return;
        }
        if interrupt {
            if let Some(dropped) = self.pending.take() {
                debug!(dropped = %dropped, "pending speech discarded by interrupt");
            }
            self.start(text, true);
        } else if self.is_speaking() {
            if let Some(superseded) = self.pending.replace(text) {
                debug!(superseded = %superseded, "pending speech coalesced");
            }
        } else {
            if let Some(superseded) = self.pending.take() {
                debug!(superseded = %superseded, "pending speech coalesced");
            }
            self.start(text, false);
        }
    }

    pub fn submit(&mut self, request: SpeechRequest) {
        self.speak(request.text, request.interrupt);
    }

    fn start(&mut self, text: String, interrupt: bool) {
        let Some(synth) = self.synth.as_mut() else {
            return;
        };
        match synth.speak(&text, interrupt) {
            Ok(()) => self.current = Some(text),
            Err(err) => {
                warn!(error = %err, "speech request failed");
                self.current = None;
            }
        }
    }

    /// Per-tick upkeep: once the synthesizer goes idle, start the pending
    /// utterance. Returns true when one was started.
    pub fn poll(&mut self) -> bool {
        if self.is_speaking() {
            return false;
        }
        self.current = None;
        match self.pending.take() {
            Some(next) => {
                self.start(next, false);
                true
            }
            None => false,
        }
    }

    /// Stop output and drop anything pending.
    pub fn silence(&mut self) {
        self.pending = None;
        self.current = None;
        if let Some(synth) = self.synth.as_mut() {
            if let Err(err) = synth.silence() {
                warn!(error = %err, "speech silence failed");
            }
        }
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.synth.as_ref().is_some_and(|synth| synth.is_speaking())
    }

    #[must_use]
    pub fn current_text(&self) -> Option<&str> {
        self.current.as_deref()
    }

    #[must_use]
    pub fn pending_text(&self) -> Option<&str> {
        self.pending.as_deref()
    }
}

impl fmt::Debug for SpeechChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechChannel")
            .field("available", &self.synth.is_some())
            .field("current", &self.current)
            .field("pending", &self.pending)
            .finish()
    }
}
