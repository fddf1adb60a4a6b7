//! Narration arbitration for screen-reader hooks inside interactive applications.
//!
//! Dozens of independent hooks report "something changed" without knowing about
//! each other. The [`Arbiter`] decides, per notification, whether it is new
//! ([`dedup`]), who owns the narration channel right now ([`region`]), and
//! whether it interrupts or queues behind current speech ([`speech`]), with
//! tick-based deferral on the host update loop ([`scheduler`]).

pub mod arbiter;
pub mod composite;
pub mod config;
pub mod dedup;
mod lock;
pub mod region;
pub mod scheduler;
pub mod shared;
pub mod speech;
pub mod telemetry;

pub use arbiter::{unless_active, while_owned, Arbiter, GenericOutcome};
pub use composite::CompositeOwner;
pub use config::{ArbiterConfig, LogConfig};
pub use dedup::Deduplicator;
pub(crate) use lock::lock_or_recover;
pub use region::{Claim, Region, RegionRegistry, ValidityOracle};
pub use scheduler::Scheduler;
pub use shared::SharedArbiter;
pub use speech::{
    LogSynth, ScriptedSynth, SpeechChannel, SpeechError, SpeechRequest, Synthesizer, SynthProbe,
    ThreadedSynth,
};
