//! Simulated host: applies script steps to an arbiter backed by a scripted
//! synthesizer and reports what got spoken.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use narrator::{
    Arbiter, ArbiterConfig, Claim, GenericOutcome, Region, ScriptedSynth, SpeechChannel,
    SpeechRequest, SynthProbe,
};

use crate::script::ScriptStep;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReplayLine {
    Spoken(SpeechRequest),
    Note(String),
}

pub(crate) struct ReplayHost {
    arbiter: Arbiter,
    probe: SynthProbe,
    on_screen: HashMap<Region, Arc<AtomicBool>>,
    reported: usize,
}

impl ReplayHost {
    pub(crate) fn new(config: &ArbiterConfig) -> Self {
        let (synth, probe) = ScriptedSynth::new();
        Self {
            arbiter: Arbiter::with_config(SpeechChannel::new(synth), config),
            probe,
            on_screen: HashMap::new(),
            reported: 0,
        }
    }

    pub(crate) fn apply(&mut self, step: ScriptStep) -> Vec<ReplayLine> {
        let mut lines = Vec::new();
        match step {
            ScriptStep::Claim { region, contexts } => {
                let region = Region::new(region);
                let flag = Arc::new(AtomicBool::new(true));
                self.on_screen.insert(region.clone(), Arc::clone(&flag));
                self.arbiter.claim(
                    Claim::new(region)
                        .validated_by(move || flag.load(Ordering::Relaxed))
                        .with_contexts(contexts),
                );
            }
            ScriptStep::Announce {
                region,
                context,
                text,
                interrupt,
            } => {
                if !self
                    .arbiter
                    .announce(&Region::new(region), &context, &text, interrupt)
                {
                    lines.push(ReplayLine::Note(format!("duplicate {context}: {text}")));
                }
            }
            ScriptStep::Generic {
                context,
                text,
                defer: Some(ticks),
            } => {
                self.arbiter.defer_generic(ticks, context, text);
            }
            ScriptStep::Generic {
                context,
                text,
                defer: None,
            } => match self.arbiter.narrate_generic(&context, &text) {
                GenericOutcome::Yielded(owner) => {
                    lines.push(ReplayLine::Note(format!("yielded to {owner}")));
                }
                GenericOutcome::Duplicate => {
                    lines.push(ReplayLine::Note(format!("duplicate {context}: {text}")));
                }
                GenericOutcome::Empty => {
                    lines.push(ReplayLine::Note(format!("nothing to read for {context}")));
                }
                GenericOutcome::Spoken => {}
            },
            ScriptStep::Speak { text, interrupt } => self.arbiter.speak(text, interrupt),
            ScriptStep::Invalidate { region } => {
                match self.on_screen.get(&Region::new(region.as_str())) {
                    Some(flag) => flag.store(false, Ordering::Relaxed),
                    None => lines.push(ReplayLine::Note(format!("{region} was never claimed"))),
                }
            }
            ScriptStep::Close { region } => {
                self.arbiter.release(&Region::new(region));
            }
            ScriptStep::Defer {
                text,
                ticks,
                interrupt,
                while_owned,
                unless_active,
            } => {
                let owner = while_owned.map(Region::new);
                let blocker = unless_active.map(Region::new);
                self.arbiter
                    .defer_speech(ticks, text, interrupt, move |arbiter: &Arbiter| {
                        let owned = owner
                            .as_ref()
                            .is_none_or(|region| arbiter.regions().is_active(region));
                        let unblocked = blocker
                            .as_ref()
                            .is_none_or(|region| !arbiter.regions().is_active(region));
                        owned && unblocked
                    });
            }
            ScriptStep::Tick { count } => {
                for _ in 0..count {
                    self.arbiter.tick();
                }
            }
            ScriptStep::Finish => self.probe.finish(),
            ScriptStep::Silence => self.arbiter.silence(),
            ScriptStep::Reset => self.arbiter.reset_all(),
        }

        let fresh: Vec<SpeechRequest> = self.probe.spoken().into_iter().skip(self.reported).collect();
        self.reported += fresh.len();
        lines.extend(fresh.into_iter().map(ReplayLine::Spoken));
        lines
    }
}
