//! Single-lock wrapper for hosts that call observers from more than one thread.

use std::sync::{Arc, Mutex};

use crate::arbiter::Arbiter;
use crate::lock_or_recover;

/// Cloneable handle to one [`Arbiter`] behind a single mutex.
///
/// Every call goes through the same lock, so the registry and deduplicator
/// still see exactly one writer at a time.
#[derive(Debug, Clone)]
pub struct SharedArbiter {
    inner: Arc<Mutex<Arbiter>>,
}

impl SharedArbiter {
    #[must_use]
    pub fn new(arbiter: Arbiter) -> Self {
        Self {
            inner: Arc::new(Mutex::new(arbiter)),
        }
    }

    /// Run `f` with exclusive access to the arbiter.
    pub fn with<R>(&self, f: impl FnOnce(&mut Arbiter) -> R) -> R {
        let mut guard = lock_or_recover(&self.inner, "shared arbiter");
        f(&mut guard)
    }

    pub fn tick(&self) {
        self.with(Arbiter::tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::contexts::BATTLE_MESSAGE;
    use crate::region::regions::BATTLE_COMMAND;
    use crate::speech::{ScriptedSynth, SpeechChannel};
    use std::thread;

    #[test]
    fn observers_on_many_threads_share_one_dedup() {
        let (synth, probe) = ScriptedSynth::new();
        let shared = SharedArbiter::new(Arbiter::new(SpeechChannel::new(synth)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared.with(|arbiter| {
                        arbiter.announce(&BATTLE_COMMAND, BATTLE_MESSAGE, "Goblin attacks", true)
                    })
                })
            })
            .collect();
        let spoken = handles
            .into_iter()
            .map(|handle| handle.join().expect("observer thread"))
            .filter(|spoke| *spoke)
            .count();

        assert_eq!(spoken, 1);
        assert_eq!(probe.texts(), ["Goblin attacks"]);
    }

    #[test]
    fn panicking_observer_does_not_poison_narration() {
        let (synth, probe) = ScriptedSynth::new();
        let shared = SharedArbiter::new(Arbiter::new(SpeechChannel::new(synth)));

        let crashing = shared.clone();
        let _ = thread::spawn(move || {
            crashing.with(|_| panic!("hook crashed while holding the arbiter"));
        })
        .join();

        shared.with(|arbiter| arbiter.speak("Still here", true));
        shared.tick();
        assert_eq!(probe.texts(), ["Still here"]);
    }
}
