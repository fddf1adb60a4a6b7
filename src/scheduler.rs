//! Tick-based deferral on the host's update loop.
//!
//! Some announcements must wait for the host to finish its frame: the battle
//! command cursor moves in the same frame that target selection opens, and only
//! one of them should speak. A deferred action runs after its tick budget has
//! elapsed, and only if its validity check still passes at that point.
//! There is no explicit cancel; a state change that makes the check fail is the
//! cancellation.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, warn};

/// Deferred work, run with mutable access to the context it was scheduled on.
pub type DeferredFn<C> = Box<dyn FnOnce(&mut C) + Send>;
/// Re-checked right before the deferred work runs.
pub type ValidityFn<C> = Box<dyn Fn(&C) -> bool + Send>;

/// Default pending-action count above which `defer` logs a warning.
pub const DEFAULT_CAPACITY: usize = 20;

/// One scheduled action awaiting its tick.
pub struct DeferredAction<C> {
    id: u64,
    ticks_remaining: u32,
    action: DeferredFn<C>,
    validity: ValidityFn<C>,
}

impl<C> DeferredAction<C> {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Run the action if its validity check passes. Returns whether it ran.
    pub fn run(self, context: &mut C) -> bool {
        if !(self.validity)(context) {
            debug!(id = self.id, "deferred action discarded: no longer valid");
            return false;
        }
        (self.action)(context);
        true
    }
}

impl<C> fmt::Debug for DeferredAction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAction")
            .field("id", &self.id)
            .field("ticks_remaining", &self.ticks_remaining)
            .finish_non_exhaustive()
    }
}

/// FIFO of deferred actions with a soft limit on how many may be pending.
pub struct Scheduler<C> {
    queue: VecDeque<DeferredAction<C>>,
    capacity: usize,
    next_id: u64,
}

impl<C> Scheduler<C> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: capacity.max(1),
            next_id: 0,
        }
    }

    /// Run `action` once at least `ticks` update cycles have passed, provided
    /// `validity` still holds then. `ticks == 0` runs on the next tick.
    pub fn defer<A, V>(&mut self, ticks: u32, action: A, validity: V) -> u64
    where
        A: FnOnce(&mut C) + Send + 'static,
        V: Fn(&C) -> bool + Send + 'static,
    {
        if self.queue.len() >= self.capacity {
            // Only a validity failure may cancel deferred work, so the limit is
            // reported, never enforced.
            warn!(
                pending = self.queue.len(),
                capacity = self.capacity,
                "deferred action limit exceeded"
            );
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.queue.push_back(DeferredAction {
            id,
            ticks_remaining: ticks,
            action: Box::new(action),
            validity: Box::new(validity),
        });
        id
    }

    /// Advance every action by one tick and hand back the ones now due, in the
    /// order they were deferred.
    pub fn take_due(&mut self) -> Vec<DeferredAction<C>> {
        let mut due = Vec::new();
        let mut waiting = VecDeque::with_capacity(self.queue.len());
        for mut deferred in self.queue.drain(..) {
            deferred.ticks_remaining = deferred.ticks_remaining.saturating_sub(1);
            if deferred.ticks_remaining == 0 {
                due.push(deferred);
            } else {
                waiting.push_back(deferred);
            }
        }
        self.queue = waiting;
        due
    }

    /// Advance one tick against a context that lives outside the scheduler.
    /// Returns how many actions ran.
    pub fn tick(&mut self, context: &mut C) -> usize {
        let mut ran = 0;
        for deferred in self.take_due() {
            if deferred.run(context) {
                ran += 1;
            }
        }
        ran
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.queue.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
