//! The arbitration context every observer shares.
//!
//! One [`Arbiter`] is built at startup and handed to every hook. It owns the
//! deduplicator, the region registry, the speech channel and the scheduler,
//! and exposes the protocol observers follow:
//!
//! - a specialised owner [`claim`](Arbiter::claim)s its region when its screen
//!   opens, [`announce`](Arbiter::announce)s changes, and
//!   [`release`](Arbiter::release)s on an explicit close;
//! - the generic cursor observer calls [`narrate_generic`](Arbiter::narrate_generic),
//!   which yields to any active and still-valid owner;
//! - the host calls [`tick`](Arbiter::tick) once per update cycle.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::ArbiterConfig;
use crate::dedup::Deduplicator;
use crate::region::{Claim, Region, RegionRegistry};
use crate::scheduler::Scheduler;
use crate::speech::SpeechChannel;

/// What the generic observer did with a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenericOutcome {
    /// A specialised owner holds the channel; the caller stays quiet (or, for
    /// owners like popups, hands the notification to that owner).
    Yielded(Region),
    /// Same value as last time for this context.
    Duplicate,
    /// No text to speak.
    Empty,
    Spoken,
}

/// Arbitration context: shared state plus the narration protocol.
pub struct Arbiter {
    dedup: Deduplicator,
    regions: RegionRegistry,
    speech: SpeechChannel,
    scheduler: Scheduler<Arbiter>,
    priority: Vec<Region>,
    generic_window: Option<Duration>,
    ticks: u64,
}

impl Arbiter {
    #[must_use]
    pub fn new(speech: SpeechChannel) -> Self {
        Self::with_config(speech, &ArbiterConfig::default())
    }

    #[must_use]
    pub fn with_config(speech: SpeechChannel, config: &ArbiterConfig) -> Self {
        let speech = if config.speech_enabled {
            speech
        } else {
            SpeechChannel::unavailable()
        };
        Self {
            dedup: Deduplicator::new(),
            regions: RegionRegistry::new(),
            speech,
            scheduler: Scheduler::new(config.scheduler_capacity),
            priority: config.priority(),
            generic_window: config.generic_repeat_window(),
            ticks: 0,
        }
    }

    #[must_use]
    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn dedup_mut(&mut self) -> &mut Deduplicator {
        &mut self.dedup
    }

    #[must_use]
    pub fn regions(&self) -> &RegionRegistry {
        &self.regions
    }

    pub fn regions_mut(&mut self) -> &mut RegionRegistry {
        &mut self.regions
    }

    #[must_use]
    pub fn speech(&self) -> &SpeechChannel {
        &self.speech
    }

    pub fn speech_mut(&mut self) -> &mut SpeechChannel {
        &mut self.speech
    }

    /// Update cycles seen so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub fn pending_deferred(&self) -> usize {
        self.scheduler.pending()
    }

    /// Take exclusive ownership, evicting every other region.
    pub fn claim(&mut self, claim: Claim) {
        debug!(region = %claim.region(), "region claimed");
        self.regions.claim(claim);
    }

    /// Owner path: dedup `text` under `context`, then claim `region` and speak.
    /// Returns whether anything was spoken.
    pub fn announce(&mut self, region: &Region, context: &str, text: &str, interrupt: bool) -> bool {
        if !self.dedup.should_announce(context, text) {
            return false;
        }
        self.speak_as(region, text, interrupt);
        true
    }

    /// Claim `region` and speak without consulting the deduplicator; for owners
    /// that already ran their own dedup check (index, handle, timed).
    ///
    /// An oracle from an earlier [`claim`](Self::claim) is kept only while the
    /// region stayed active; otherwise the ownership taken here is unvalidated.
    pub fn speak_as(&mut self, region: &Region, text: &str, interrupt: bool) {
        self.regions.set_active_exclusive(region);
        self.speech.speak(text, interrupt);
    }

    /// Speak without touching ownership (incidental detail such as damage).
    pub fn speak(&mut self, text: impl Into<String>, interrupt: bool) {
        self.speech.speak(text, interrupt);
    }

    /// Explicit close: drop ownership and forget the region's dedup contexts so
    /// re-entry announces fresh values.
    pub fn release(&mut self, region: &Region) -> bool {
        let contexts = self.regions.contexts(region).to_vec();
        let was_active = self.regions.reset(region);
        self.dedup.reset_many(&contexts);
        debug!(region = %region, was_active, "region released");
        was_active
    }

    /// Validate-or-evict for one region.
    pub fn validate(&mut self, region: &Region) -> bool {
        self.regions.validate(region)
    }

    /// The first active and still-valid owner, checked in priority order and
    /// then in first-reference order. Stale owners met along the way are reset.
    pub fn yield_to_owner(&mut self) -> Option<Region> {
        let mut order = self.priority.clone();
        for region in self.regions.known_regions() {
            if !order.contains(region) {
                order.push(region.clone());
            }
        }
        order.into_iter().find(|region| self.regions.validate(region))
    }

    /// Generic/default observer: narrate the focused text unless a specialised
    /// owner is active. Focus changes interrupt.
    pub fn narrate_generic(&mut self, context: &str, text: &str) -> GenericOutcome {
        if let Some(owner) = self.yield_to_owner() {
            debug!(owner = %owner, context, "generic observer yielded");
            return GenericOutcome::Yielded(owner);
        }
        if text.trim().is_empty() {
            return GenericOutcome::Empty;
        }
        let fresh = match self.generic_window {
            Some(window) => self
                .dedup
                .should_announce_within(context, text, window, Instant::now()),
            None => self.dedup.should_announce(context, text),
        };
        if !fresh {
            return GenericOutcome::Duplicate;
        }
        self.speech.speak(text, true);
        GenericOutcome::Spoken
    }

    /// Generic narration after `ticks` update cycles, so the host can finish
    /// laying out the screen. Ownership is checked when it fires, not now.
    pub fn defer_generic(
        &mut self,
        ticks: u32,
        context: impl Into<String>,
        text: impl Into<String>,
    ) -> u64 {
        let context = context.into();
        let text = text.into();
        self.scheduler.defer(
            ticks,
            move |arbiter: &mut Arbiter| {
                let _ = arbiter.narrate_generic(&context, &text);
            },
            |_: &Arbiter| true,
        )
    }

    /// Schedule arbitrary work on the update loop.
    pub fn defer<A, V>(&mut self, ticks: u32, action: A, validity: V) -> u64
    where
        A: FnOnce(&mut Arbiter) + Send + 'static,
        V: Fn(&Arbiter) -> bool + Send + 'static,
    {
        self.scheduler.defer(ticks, action, validity)
    }

    /// Speak after `ticks` update cycles if `validity` still holds then.
    pub fn defer_speech<V>(
        &mut self,
        ticks: u32,
        text: impl Into<String>,
        interrupt: bool,
        validity: V,
    ) -> u64
    where
        V: Fn(&Arbiter) -> bool + Send + 'static,
    {
        let text = text.into();
        self.scheduler.defer(
            ticks,
            move |arbiter: &mut Arbiter| arbiter.speech.speak(text, interrupt),
            validity,
        )
    }

    /// One host update cycle: run due deferred actions, then let the speech
    /// channel start its pending utterance if the synthesizer went idle.
    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
        for deferred in self.scheduler.take_due() {
            deferred.run(self);
        }
        self.speech.poll();
    }

    /// Stop speech now (user "silence" key).
    pub fn silence(&mut self) {
        self.speech.silence();
    }

    /// Return-to-title cleanup: no owners, no remembered values. Deferred
    /// actions stay queued; their own validity checks decide their fate.
    pub fn reset_all(&mut self) {
        self.regions.reset_all();
        self.dedup.reset_all();
        debug!("all regions and dedup contexts reset");
    }
}

impl fmt::Debug for Arbiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arbiter")
            .field("regions", &self.regions)
            .field("speech", &self.speech)
            .field("scheduler", &self.scheduler)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

/// Validity check: `region` still holds ownership.
pub fn while_owned(region: Region) -> impl Fn(&Arbiter) -> bool + Send + 'static {
    move |arbiter: &Arbiter| arbiter.regions().is_active(&region)
}

/// Validity check: `region` has not taken over in the meantime.
pub fn unless_active(region: Region) -> impl Fn(&Arbiter) -> bool + Send + 'static {
    move |arbiter: &Arbiter| !arbiter.regions().is_active(&region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::contexts::{GENERIC_CURSOR, SHOP_ITEM, SHOP_QUANTITY};
    use crate::region::regions::{BATTLE_COMMAND, BATTLE_TARGET, MAGIC_MENU, POPUP, SHOP_MENU};
    use crate::speech::{ScriptedSynth, SpeechRequest, SynthProbe};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn arbiter() -> (Arbiter, SynthProbe) {
        let (synth, probe) = ScriptedSynth::new();
        (Arbiter::new(SpeechChannel::new(synth)), probe)
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn arbiter_can_move_across_threads() {
        assert_send::<Arbiter>();
    }

    #[test]
    fn announce_claims_region_and_speaks() {
        let (mut arbiter, probe) = arbiter();
        arbiter.claim(Claim::new(MAGIC_MENU));
        assert!(arbiter.announce(&SHOP_MENU, SHOP_ITEM, "Potion, 50", true));
        assert!(arbiter.regions().is_active(&SHOP_MENU));
        assert!(!arbiter.regions().is_active(&MAGIC_MENU));
        assert_eq!(probe.spoken(), vec![SpeechRequest::interrupting("Potion, 50")]);
    }

    #[test]
    fn duplicate_announce_is_silent() {
        let (mut arbiter, probe) = arbiter();
        assert!(arbiter.announce(&SHOP_MENU, SHOP_ITEM, "Potion, 50", true));
        assert!(!arbiter.announce(&SHOP_MENU, SHOP_ITEM, "Potion, 50", true));
        assert_eq!(probe.texts(), ["Potion, 50"]);
    }

    #[test]
    fn release_resets_region_contexts() {
        let (mut arbiter, probe) = arbiter();
        arbiter.claim(Claim::new(SHOP_MENU).with_contexts([SHOP_ITEM, SHOP_QUANTITY]));
        assert!(arbiter.announce(&SHOP_MENU, SHOP_ITEM, "Potion, 50", true));
        assert!(arbiter.dedup_mut().should_announce("unrelated", "x"));

        assert!(arbiter.release(&SHOP_MENU));
        assert!(!arbiter.regions().is_active(&SHOP_MENU));
        assert!(arbiter.announce(&SHOP_MENU, SHOP_ITEM, "Potion, 50", true));
        assert!(!arbiter.dedup_mut().should_announce("unrelated", "x"));
        assert_eq!(probe.texts(), ["Potion, 50", "Potion, 50"]);
    }

    #[test]
    fn speak_as_after_stale_eviction_is_not_evicted_again() {
        let (mut arbiter, probe) = arbiter();
        arbiter.claim(Claim::new(BATTLE_COMMAND).validated_by(|| false));
        assert_eq!(
            arbiter.narrate_generic(GENERIC_CURSOR, "New Game"),
            GenericOutcome::Spoken
        );

        arbiter.speak_as(&BATTLE_COMMAND, "Fight", true);
        assert_eq!(
            arbiter.narrate_generic(GENERIC_CURSOR, "Items"),
            GenericOutcome::Yielded(BATTLE_COMMAND)
        );
        assert_eq!(probe.texts(), ["New Game", "Fight"]);
    }

    #[test]
    fn generic_observer_yields_to_valid_owner() {
        let (mut arbiter, probe) = arbiter();
        arbiter.claim(Claim::new(BATTLE_COMMAND).validated_by(|| true));
        assert_eq!(
            arbiter.narrate_generic(GENERIC_CURSOR, "Fight"),
            GenericOutcome::Yielded(BATTLE_COMMAND)
        );
        assert!(probe.spoken().is_empty());
    }

    #[test]
    fn generic_observer_resumes_after_stale_owner_is_evicted() {
        let (mut arbiter, probe) = arbiter();
        let on_screen = Arc::new(AtomicBool::new(true));
        let probe_flag = Arc::clone(&on_screen);
        arbiter.claim(
            Claim::new(BATTLE_COMMAND).validated_by(move || probe_flag.load(Ordering::Relaxed)),
        );
        on_screen.store(false, Ordering::Relaxed);

        assert_eq!(
            arbiter.narrate_generic(GENERIC_CURSOR, "New Game"),
            GenericOutcome::Spoken
        );
        assert!(!arbiter.regions().is_active(&BATTLE_COMMAND));
        assert_eq!(probe.texts(), ["New Game"]);
    }

    #[test]
    fn generic_observer_dedups_and_skips_empty() {
        let (mut arbiter, _probe) = arbiter();
        assert_eq!(arbiter.narrate_generic(GENERIC_CURSOR, "Items"), GenericOutcome::Spoken);
        assert_eq!(arbiter.narrate_generic(GENERIC_CURSOR, "Items"), GenericOutcome::Duplicate);
        assert_eq!(arbiter.narrate_generic(GENERIC_CURSOR, "  "), GenericOutcome::Empty);
    }

    #[test]
    fn priority_order_decides_between_two_flagged_regions() {
        let (mut arbiter, _probe) = arbiter();
        arbiter.regions_mut().set_active(&POPUP, true);
        arbiter.regions_mut().set_active(&BATTLE_COMMAND, true);
        assert_eq!(arbiter.yield_to_owner(), Some(BATTLE_COMMAND));
    }

    #[test]
    fn custom_regions_are_checked_after_priority_list() {
        let (mut arbiter, _probe) = arbiter();
        let minigame = Region::new("minigame");
        arbiter.claim(Claim::new(minigame.clone()));
        assert_eq!(arbiter.yield_to_owner(), Some(minigame));
    }

    #[test]
    fn deferred_speech_fires_after_tick() {
        let (mut arbiter, probe) = arbiter();
        arbiter.claim(Claim::new(BATTLE_COMMAND));
        arbiter.defer_speech(1, "Attack", false, while_owned(BATTLE_COMMAND));
        assert!(probe.spoken().is_empty());
        arbiter.tick();
        assert_eq!(probe.spoken(), vec![SpeechRequest::queued("Attack")]);
        assert_eq!(arbiter.tick_count(), 1);
    }

    #[test]
    fn deferred_speech_dropped_when_target_selection_takes_over() {
        let (mut arbiter, probe) = arbiter();
        arbiter.claim(Claim::new(BATTLE_COMMAND));
        arbiter.defer_speech(1, "Attack", false, unless_active(BATTLE_TARGET));
        arbiter.claim(Claim::new(BATTLE_TARGET));
        arbiter.tick();
        assert!(probe.spoken().is_empty());
        assert_eq!(arbiter.pending_deferred(), 0);
    }

    #[test]
    fn deferred_speech_survives_a_burst_past_capacity() {
        let (mut arbiter, probe) = arbiter();
        arbiter.defer_speech(1, "Attack", true, |_: &Arbiter| true);
        for _ in 0..crate::scheduler::DEFAULT_CAPACITY {
            arbiter.defer(1, |_: &mut Arbiter| {}, |_: &Arbiter| true);
        }
        arbiter.tick();
        assert_eq!(probe.texts(), ["Attack"]);
        assert_eq!(arbiter.pending_deferred(), 0);
    }

    #[test]
    fn deferred_generic_checks_ownership_when_it_fires() {
        let (mut arbiter, probe) = arbiter();
        arbiter.defer_generic(1, GENERIC_CURSOR, "Continue");
        arbiter.claim(Claim::new(POPUP));
        arbiter.tick();
        assert!(probe.spoken().is_empty());

        arbiter.release(&POPUP);
        arbiter.defer_generic(1, GENERIC_CURSOR, "Continue");
        arbiter.tick();
        assert_eq!(probe.texts(), ["Continue"]);
    }

    #[test]
    fn tick_promotes_pending_speech_once_idle() {
        let (mut arbiter, probe) = arbiter();
        arbiter.speak("Turn start", true);
        arbiter.speak("Poisoned", false);
        arbiter.tick();
        assert_eq!(probe.texts(), ["Turn start"]);
        probe.finish();
        arbiter.tick();
        assert_eq!(probe.texts(), ["Turn start", "Poisoned"]);
    }

    #[test]
    fn reset_all_clears_owners_and_memory() {
        let (mut arbiter, _probe) = arbiter();
        assert!(arbiter.announce(&SHOP_MENU, SHOP_ITEM, "Potion", true));
        arbiter.reset_all();
        assert_eq!(arbiter.yield_to_owner(), None);
        assert!(arbiter.announce(&SHOP_MENU, SHOP_ITEM, "Potion", true));
    }

    #[test]
    fn disabled_speech_config_mutes_channel() {
        let (synth, probe) = ScriptedSynth::new();
        let config = ArbiterConfig {
            speech_enabled: false,
            ..ArbiterConfig::default()
        };
        let mut arbiter = Arbiter::with_config(SpeechChannel::new(synth), &config);
        assert!(arbiter.announce(&SHOP_MENU, SHOP_ITEM, "Potion", true));
        assert!(probe.spoken().is_empty());
        assert!(!arbiter.speech().is_available());
    }

    #[test]
    fn repeat_window_lets_generic_text_repeat_after_expiry() {
        let (synth, probe) = ScriptedSynth::new();
        let config = ArbiterConfig {
            generic_repeat_window_ms: 1,
            ..ArbiterConfig::default()
        };
        let mut arbiter = Arbiter::with_config(SpeechChannel::new(synth), &config);
        assert_eq!(arbiter.narrate_generic(GENERIC_CURSOR, "Items"), GenericOutcome::Spoken);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(arbiter.narrate_generic(GENERIC_CURSOR, "Items"), GenericOutcome::Spoken);
        assert_eq!(probe.texts(), ["Items", "Items"]);
    }
}
