//! Exclusive narration ownership so only one screen speaks for the focused area.
//!
//! Every specialised observer (battle command list, shop list, magic menu, ...)
//! claims a [`Region`] before it narrates. Claiming through
//! [`RegionRegistry::set_active_exclusive`] or [`RegionRegistry::claim`] evicts
//! every other region, so the generic cursor observer can ask a single question
//! ("does anyone own this?") before it speaks.
//!
//! Ownership flags are never trusted blindly: an owner that registered a
//! validity oracle is re-checked by [`RegionRegistry::validate`], and a failed
//! check resets the flag on the spot. That keeps a screen that closed without
//! notifying us from muting narration for the rest of the session.

use std::borrow::Cow;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

/// Caller-supplied predicate answering "is my screen still the right owner?".
pub type ValidityOracle = Box<dyn Fn() -> bool + Send>;

/// Opaque name of a narration region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region(Cow<'static, str>);

impl Region {
    /// Region backed by a static name, usable in `const` items.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Region with a runtime-provided name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Region {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for Region {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Well-known regions for the menus and battle screens we narrate.
pub mod regions {
    use super::Region;

    pub const EQUIP_MENU: Region = Region::from_static("equip-menu");
    pub const BATTLE_COMMAND: Region = Region::from_static("battle-command");
    pub const BATTLE_TARGET: Region = Region::from_static("battle-target");
    pub const ITEM_MENU: Region = Region::from_static("item-menu");
    pub const STATUS_MENU: Region = Region::from_static("status-menu");
    pub const MAGIC_MENU: Region = Region::from_static("magic-menu");
    pub const CONFIG_MENU: Region = Region::from_static("config-menu");
    pub const SHOP_MENU: Region = Region::from_static("shop-menu");
    pub const BATTLE_ITEM: Region = Region::from_static("battle-item");
    pub const BATTLE_MAGIC: Region = Region::from_static("battle-magic");
    pub const KEYWORD_MENU: Region = Region::from_static("keyword-menu");
    pub const WORDS_MENU: Region = Region::from_static("words-menu");
    pub const SAVE_LOAD_MENU: Region = Region::from_static("save-load-menu");
    pub const POPUP: Region = Region::from_static("popup");

    /// Order in which the generic cursor observer checks for a specialised owner.
    ///
    /// Popups come last: their owner reads the focused button itself, so every
    /// other suppression must have had its chance first.
    #[must_use]
    pub fn default_priority() -> Vec<Region> {
        vec![
            EQUIP_MENU,
            BATTLE_COMMAND,
            BATTLE_TARGET,
            ITEM_MENU,
            STATUS_MENU,
            MAGIC_MENU,
            CONFIG_MENU,
            SHOP_MENU,
            BATTLE_ITEM,
            BATTLE_MAGIC,
            KEYWORD_MENU,
            WORDS_MENU,
            SAVE_LOAD_MENU,
            POPUP,
        ]
    }
}

/// Exclusive claim request: region plus the owner's validity oracle and the
/// dedup contexts it announces under.
pub struct Claim {
    region: Region,
    oracle: Option<ValidityOracle>,
    contexts: Vec<String>,
}

impl Claim {
    #[must_use]
    pub fn new(region: impl Into<Region>) -> Self {
        Self {
            region: region.into(),
            oracle: None,
            contexts: Vec::new(),
        }
    }

    /// Attach the live check run before this ownership is trusted.
    #[must_use]
    pub fn validated_by<F>(mut self, oracle: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        self.oracle = Some(Box::new(oracle));
        self
    }

    /// Dedup contexts cleared when the owner releases the region.
    #[must_use]
    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claim")
            .field("region", &self.region)
            .field("validated", &self.oracle.is_some())
            .field("contexts", &self.contexts)
            .finish()
    }
}

struct RegionSlot {
    region: Region,
    active: bool,
    oracle: Option<ValidityOracle>,
    contexts: Vec<String>,
}

/// Ownership ledger over every region referenced so far.
#[derive(Default)]
pub struct RegionRegistry {
    // Kept in first-reference order so diagnostics and fallback scans are stable.
    slots: Vec<RegionSlot>,
}

impl RegionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, region: &Region) -> Option<&RegionSlot> {
        self.slots.iter().find(|slot| &slot.region == region)
    }

    fn slot_mut(&mut self, region: &Region) -> &mut RegionSlot {
        let index = match self.slots.iter().position(|slot| &slot.region == region) {
            Some(index) => index,
            None => {
                self.slots.push(RegionSlot {
                    region: region.clone(),
                    active: false,
                    oracle: None,
                    contexts: Vec::new(),
                });
                self.slots.len() - 1
            }
        };
        &mut self.slots[index]
    }

    /// True iff `region` currently holds its ownership flag.
    #[must_use]
    pub fn is_active(&self, region: &Region) -> bool {
        self.slot(region).is_some_and(|slot| slot.active)
    }

    /// Activate `region` and deactivate every other known region.
    ///
    /// Evicted regions lose their oracle. Activating a region that holds no
    /// oracle (never claimed, or deactivated since) yields ownership that
    /// [`validate`](Self::validate) trusts until the next claim or reset.
    pub fn set_active_exclusive(&mut self, region: &Region) {
        for slot in &mut self.slots {
            if &slot.region == region {
                continue;
            }
            if slot.active {
                debug!(evicted = %slot.region, claimant = %region, "region evicted");
            }
            slot.active = false;
            slot.oracle = None;
        }
        self.slot_mut(region).active = true;
    }

    /// Flip one region's flag without touching the others.
    ///
    /// Only meant for sub-state bookkeeping inside an owner that already won the
    /// exclusive claim; calling it with `true` from outside can leave two regions
    /// active at once.
    pub fn set_active(&mut self, region: &Region, active: bool) {
        self.slot_mut(region).active = active;
    }

    /// Deactivate `region` only and forget its claim (oracle and contexts).
    /// Returns whether it was active.
    pub fn reset(&mut self, region: &Region) -> bool {
        match self.slots.iter_mut().find(|slot| &slot.region == region) {
            Some(slot) => {
                slot.oracle = None;
                slot.contexts.clear();
                std::mem::replace(&mut slot.active, false)
            }
            None => false,
        }
    }

    /// Deactivate every region and forget every claim. Regions stay known.
    pub fn reset_all(&mut self) {
        for slot in &mut self.slots {
            slot.active = false;
            slot.oracle = None;
            slot.contexts.clear();
        }
    }

    /// Exclusive claim that also records the owner's oracle and dedup contexts.
    pub fn claim(&mut self, claim: Claim) {
        let Claim {
            region,
            oracle,
            contexts,
        } = claim;
        self.set_active_exclusive(&region);
        let slot = self.slot_mut(&region);
        slot.oracle = oracle;
        slot.contexts = contexts;
    }

    /// Validate-or-evict: true only when `region` is active and its oracle (if
    /// any) still confirms ownership. A failing or panicking oracle resets the
    /// region.
    pub fn validate(&mut self, region: &Region) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|slot| &slot.region == region) else {
            return false;
        };
        if !slot.active {
            return false;
        }
        let Some(oracle) = slot.oracle.as_ref() else {
            return true;
        };
        let still_valid = match catch_unwind(AssertUnwindSafe(|| oracle())) {
            Ok(valid) => valid,
            Err(_) => {
                warn!(region = %slot.region, "validity oracle panicked; treating ownership as stale");
                false
            }
        };
        if !still_valid {
            debug!(region = %slot.region, "stale ownership reset");
            slot.active = false;
            slot.oracle = None;
        }
        still_valid
    }

    /// Dedup contexts the region's owner registered at claim time.
    #[must_use]
    pub fn contexts(&self, region: &Region) -> &[String] {
        self.slot(region)
            .map(|slot| slot.contexts.as_slice())
            .unwrap_or_default()
    }

    /// First active region in first-reference order.
    #[must_use]
    pub fn active_region(&self) -> Option<&Region> {
        self.slots
            .iter()
            .find(|slot| slot.active)
            .map(|slot| &slot.region)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.active).count()
    }

    pub fn known_regions(&self) -> impl Iterator<Item = &Region> {
        self.slots.iter().map(|slot| &slot.region)
    }
}

impl fmt::Debug for RegionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|slot| (slot.region.name(), slot.active)))
            .finish()
    }
}
