//! Owners with several internal sub-states behind one exclusive claim.
//!
//! The magic menu is the usual example: spell list, target picker and command
//! strip are separate screens to the host, yet to the rest of the system they
//! are a single owner. Entering the first sub-state takes the region
//! exclusively; further sub-states are recorded privately without evicting
//! anyone; the region is released only when the last sub-state leaves.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::region::{Claim, Region, RegionRegistry};

type SharedOracle = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone)]
pub struct CompositeOwner {
    region: Region,
    oracle: Option<SharedOracle>,
    sub_states: BTreeSet<String>,
}

impl CompositeOwner {
    #[must_use]
    pub fn new(region: impl Into<Region>) -> Self {
        Self {
            region: region.into(),
            oracle: None,
            sub_states: BTreeSet::new(),
        }
    }

    /// Live check attached to every claim this owner makes, so a screen that
    /// closes without `leave` stops suppressing the generic observer.
    #[must_use]
    pub fn validated_by<F>(mut self, oracle: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.oracle = Some(Arc::new(oracle));
        self
    }

    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Enter `sub_state`. Claims the region exclusively unless this owner
    /// already holds it.
    pub fn enter(&mut self, registry: &mut RegionRegistry, sub_state: &str) {
        if self.owns(registry) {
            registry.set_active(&self.region, true);
        } else {
            // Lost the region to another owner (or never had it): whatever
            // sub-states we remembered describe a screen that is gone.
            self.sub_states.clear();
            registry.claim(self.claim());
        }
        self.sub_states.insert(sub_state.to_string());
    }

    fn claim(&self) -> Claim {
        let claim = Claim::new(self.region.clone());
        match &self.oracle {
            Some(oracle) => {
                let oracle = Arc::clone(oracle);
                claim.validated_by(move || oracle())
            }
            None => claim,
        }
    }

    /// Leave `sub_state`; the region is released once none remain.
    /// Returns whether this owner still holds the region.
    pub fn leave(&mut self, registry: &mut RegionRegistry, sub_state: &str) -> bool {
        self.sub_states.remove(sub_state);
        if self.sub_states.is_empty() {
            registry.reset(&self.region);
            return false;
        }
        registry.is_active(&self.region)
    }

    /// Whether `sub_state` is current and the region is still ours.
    #[must_use]
    pub fn is_in(&self, registry: &RegionRegistry, sub_state: &str) -> bool {
        self.owns(registry) && self.sub_states.contains(sub_state)
    }

    #[must_use]
    pub fn owns(&self, registry: &RegionRegistry) -> bool {
        !self.sub_states.is_empty() && registry.is_active(&self.region)
    }

    /// Drop every sub-state and the region.
    pub fn clear(&mut self, registry: &mut RegionRegistry) {
        self.sub_states.clear();
        registry.reset(&self.region);
    }
}

impl fmt::Debug for CompositeOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeOwner")
            .field("region", &self.region)
            .field("validated", &self.oracle.is_some())
            .field("sub_states", &self.sub_states)
            .finish()
    }
}
