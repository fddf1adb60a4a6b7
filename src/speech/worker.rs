//! Speech worker thread so native screen-reader calls never run concurrently.
//!
//! Observers can fire from several host callbacks; the native bridge behind a
//! synthesizer is not re-entrant. [`ThreadedSynth`] forwards requests over a
//! channel to one thread that owns the real synthesizer and reports its busy
//! state back through an atomic flag.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use super::{SpeechError, SpeechRequest, Synthesizer};

const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(20);

enum SynthCommand {
    Speak(SpeechRequest),
    Silence,
    Shutdown,
}

/// Synthesizer front-end that hands every call to a dedicated worker thread.
#[derive(Debug)]
pub struct ThreadedSynth {
    tx: Sender<SynthCommand>,
    speaking: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadedSynth {
    /// Move `inner` onto a new worker thread.
    pub fn spawn<S>(inner: S) -> Result<Self, SpeechError>
    where
        S: Synthesizer + 'static,
    {
        let (tx, rx) = unbounded();
        let speaking = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let worker_speaking = Arc::clone(&speaking);
        let worker_in_flight = Arc::clone(&in_flight);
        let handle = thread::Builder::new()
            .name("narrator-speech".to_string())
            .spawn(move || run_worker(inner, &rx, &worker_speaking, &worker_in_flight))
            .map_err(|err| SpeechError::Unavailable(format!("speech worker spawn failed: {err}")))?;
        Ok(Self {
            tx,
            speaking,
            in_flight,
            handle: Some(handle),
        })
    }

    fn send(&self, command: SynthCommand) -> Result<(), SpeechError> {
        self.tx
            .send(command)
            .map_err(|_| SpeechError::Disconnected)
    }
}

fn run_worker<S: Synthesizer>(
    mut inner: S,
    rx: &Receiver<SynthCommand>,
    speaking: &AtomicBool,
    in_flight: &AtomicUsize,
) {
    loop {
        match rx.recv_timeout(WORKER_POLL_INTERVAL) {
            Ok(SynthCommand::Speak(request)) => {
                if let Err(err) = inner.speak(&request.text, request.interrupt) {
                    warn!(error = %err, "speech worker: speak failed");
                }
                speaking.store(inner.is_speaking(), Ordering::Release);
                in_flight.fetch_sub(1, Ordering::AcqRel);
                continue;
            }
            Ok(SynthCommand::Silence) => {
                if let Err(err) = inner.silence() {
                    warn!(error = %err, "speech worker: silence failed");
                }
            }
            Ok(SynthCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        speaking.store(inner.is_speaking(), Ordering::Release);
    }
    speaking.store(false, Ordering::Release);
    debug!("speech worker exited");
}

impl Synthesizer for ThreadedSynth {
    fn speak(&mut self, text: &str, interrupt: bool) -> Result<(), SpeechError> {
        // Busy while the request is still on its way to the worker, so a queued
        // follow-up made in the same tick waits in the pending slot.
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let sent = self.send(SynthCommand::Speak(SpeechRequest {
            text: text.to_string(),
            interrupt,
        }));
        if sent.is_err() {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        sent
    }

    fn silence(&mut self) -> Result<(), SpeechError> {
        self.send(SynthCommand::Silence)
    }

    fn is_speaking(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0 || self.speaking.load(Ordering::Acquire)
    }
}

impl Drop for ThreadedSynth {
    fn drop(&mut self) {
        let _ = self.tx.send(SynthCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("speech worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{ScriptedSynth, SpeechChannel};

    #[test]
    fn worker_forwards_requests_in_order() {
        let (inner, probe) = ScriptedSynth::new();
        let mut synth = ThreadedSynth::spawn(inner).expect("spawn speech worker");
        synth.speak("Battle start", true).expect("speak");
        synth.speak("Goblin x2", false).expect("speak");
        synth.silence().expect("silence");
        drop(synth);

        assert_eq!(
            probe.spoken(),
            vec![
                SpeechRequest::interrupting("Battle start"),
                SpeechRequest::queued("Goblin x2"),
            ]
        );
        assert_eq!(probe.silenced(), 1);
    }

    #[test]
    fn queued_speech_waits_behind_worker_utterance() {
        let (inner, probe) = ScriptedSynth::new();
        let synth = ThreadedSynth::spawn(inner).expect("spawn speech worker");
        let mut speech = SpeechChannel::new(synth);
        speech.speak("Turn start", true);
        speech.speak("Poisoned", false);
        assert_eq!(speech.pending_text(), Some("Poisoned"));
        drop(speech);
        assert_eq!(probe.texts(), ["Turn start"]);
    }

    #[test]
    fn busy_flag_clears_when_inner_synth_finishes() {
        let (inner, probe) = ScriptedSynth::new();
        let mut synth = ThreadedSynth::spawn(inner).expect("spawn speech worker");
        synth.speak("Hello", true).expect("speak");
        assert!(synth.is_speaking());

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while probe.spoken().is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        probe.finish();
        while synth.is_speaking() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!synth.is_speaking());
    }
}
