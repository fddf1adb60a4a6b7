//! In-memory synthesizer that records requests and stays busy until told an
//! utterance finished. Drives tests and the replay tool.

use std::sync::{Arc, Mutex};

use super::{SpeechError, SpeechRequest, Synthesizer};
use crate::lock_or_recover;

#[derive(Debug)]
struct ScriptedState {
    spoken: Vec<SpeechRequest>,
    speaking: bool,
    available: bool,
    silenced: usize,
}

/// Synthesizer half, handed to the [`SpeechChannel`](super::SpeechChannel).
#[derive(Debug)]
pub struct ScriptedSynth {
    state: Arc<Mutex<ScriptedState>>,
}

/// Observer half, kept by the test or host simulator.
#[derive(Debug, Clone)]
pub struct SynthProbe {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedSynth {
    #[must_use]
    pub fn new() -> (Self, SynthProbe) {
        let state = Arc::new(Mutex::new(ScriptedState {
            spoken: Vec::new(),
            speaking: false,
            available: true,
            silenced: 0,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            SynthProbe { state },
        )
    }
}

impl Synthesizer for ScriptedSynth {
    fn speak(&mut self, text: &str, interrupt: bool) -> Result<(), SpeechError> {
        let mut state = lock_or_recover(&self.state, "scripted synth speak");
        if !state.available {
            return Err(SpeechError::Unavailable("scripted synth offline".to_string()));
        }
        state.spoken.push(SpeechRequest {
            text: text.to_string(),
            interrupt,
        });
        state.speaking = true;
        Ok(())
    }

    fn silence(&mut self) -> Result<(), SpeechError> {
        let mut state = lock_or_recover(&self.state, "scripted synth silence");
        state.speaking = false;
        state.silenced += 1;
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        lock_or_recover(&self.state, "scripted synth status").speaking
    }
}

impl SynthProbe {
    /// Every request the synthesizer accepted, oldest first.
    #[must_use]
    pub fn spoken(&self) -> Vec<SpeechRequest> {
        lock_or_recover(&self.state, "synth probe").spoken.clone()
    }

    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        lock_or_recover(&self.state, "synth probe")
            .spoken
            .iter()
            .map(|request| request.text.clone())
            .collect()
    }

    /// Mark the current utterance as finished.
    pub fn finish(&self) {
        lock_or_recover(&self.state, "synth probe").speaking = false;
    }

    /// Simulate the screen reader going away (or coming back).
    pub fn set_available(&self, available: bool) {
        let mut state = lock_or_recover(&self.state, "synth probe");
        state.available = available;
        if !available {
            state.speaking = false;
        }
    }

    #[must_use]
    pub fn silenced(&self) -> usize {
        lock_or_recover(&self.state, "synth probe").silenced
    }
}
