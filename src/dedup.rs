//! Per-context "last announced value" tracking that keeps repeated hook
//! notifications from re-speaking the same thing.
//!
//! Hooks fire far more often than the focused value actually changes: a cursor
//! update is reported every frame, a battle action object is handed to three
//! different callbacks. Each observer names a context (`"shop-item"`,
//! `"battle-command.cursor"`) and asks whether its value is new for that
//! context. Contexts are independent of regions; closing a screen resets its
//! contexts so re-entering it announces fresh values.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Context names shared between observers that announce the same data.
pub mod contexts {
    pub const BATTLE_ACTION: &str = "battle-action";
    pub const BATTLE_COMMAND_CURSOR: &str = "battle-command.cursor";
    pub const BATTLE_ITEM: &str = "battle-item.selection";
    pub const BATTLE_MAGIC: &str = "battle-magic.selection";
    pub const BATTLE_MESSAGE: &str = "battle-message.action";
    pub const BATTLE_CONDITION: &str = "battle-message.condition";
    pub const EQUIP_MENU: &str = "equip-menu.selection";
    pub const ITEM_MENU: &str = "item-menu.selection";
    pub const STATUS_MENU: &str = "status-menu.selection";
    pub const SHOP_ITEM: &str = "shop-item";
    pub const SHOP_QUANTITY: &str = "shop-quantity";
    pub const KEYWORD_COMMAND: &str = "keyword.command";
    pub const KEYWORD_WORD: &str = "keyword.word";
    pub const WORDS_MENU: &str = "words-menu.selection";
    pub const GENERIC_CURSOR: &str = "generic.cursor";
}

/// Last-seen values keyed by context name.
///
/// Each overload keeps its own table so a context used for both an index and a
/// text never compares one against the other. A context's entry is replaced
/// whole on every accepted value and left untouched on a rejected one.
#[derive(Debug, Default)]
pub struct Deduplicator {
    texts: HashMap<String, String>,
    indices: HashMap<String, i64>,
    indexed: HashMap<String, (i64, String)>,
    handles: HashMap<String, Weak<dyn Any + Send + Sync>>,
    timed: HashMap<String, (String, Instant)>,
}

impl Deduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `text` for `context` unless it equals the last accepted text.
    /// Empty text is never announced and leaves the stored value alone.
    pub fn should_announce(&mut self, context: &str, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        if self.texts.get(context).is_some_and(|last| last == text) {
            return false;
        }
        self.texts.insert(context.to_string(), text.to_string());
        true
    }

    /// Accept a cursor/list index unless it equals the last accepted index.
    pub fn should_announce_index(&mut self, context: &str, index: i64) -> bool {
        if self.indices.get(context) == Some(&index) {
            return false;
        }
        self.indices.insert(context.to_string(), index);
        true
    }

    /// Index and text together: a duplicate only when both match the last pair.
    ///
    /// Lists whose rows can change label in place (shop stock, quantity pickers)
    /// need this so a relabelled row under an unmoved cursor is still spoken.
    pub fn should_announce_indexed(&mut self, context: &str, index: i64, text: &str) -> bool {
        if self
            .indexed
            .get(context)
            .is_some_and(|(last_index, last_text)| *last_index == index && last_text == text)
        {
            return false;
        }
        self.indexed
            .insert(context.to_string(), (index, text.to_string()));
        true
    }

    /// Accept a host object unless it is the very same allocation as last time.
    ///
    /// Identity, not equality: two distinct action objects with identical fields
    /// are both announced. The stored handle is weak, so the host object can be
    /// dropped freely, and while we hold it its address cannot be reused by a
    /// different object.
    pub fn should_announce_handle<T>(&mut self, context: &str, handle: &Arc<T>) -> bool
    where
        T: Any + Send + Sync,
    {
        let candidate = Arc::as_ptr(handle).cast::<()>();
        if self
            .handles
            .get(context)
            .is_some_and(|last| last.as_ptr().cast::<()>() == candidate)
        {
            return false;
        }
        let weak = Arc::downgrade(handle);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        self.handles.insert(context.to_string(), weak);
        true
    }

    /// Time-windowed text check used to absorb bursts of identical ticks.
    ///
    /// A different text is always accepted. The same text is rejected while
    /// `window` has not elapsed since it was last accepted, and accepted again
    /// afterwards.
    pub fn should_announce_within(
        &mut self,
        context: &str,
        text: &str,
        window: Duration,
        now: Instant,
    ) -> bool {
        if text.is_empty() {
            return false;
        }
        if let Some((last, accepted_at)) = self.timed.get(context) {
            if last == text && now.saturating_duration_since(*accepted_at) < window {
                return false;
            }
        }
        self.timed
            .insert(context.to_string(), (text.to_string(), now));
        true
    }

    /// Forget everything stored for `context`.
    pub fn reset(&mut self, context: &str) {
        self.texts.remove(context);
        self.indices.remove(context);
        self.indexed.remove(context);
        self.handles.remove(context);
        self.timed.remove(context);
    }

    pub fn reset_many<I, S>(&mut self, contexts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for context in contexts {
            self.reset(context.as_ref());
        }
    }

    /// Clear every context; used on battle end and scene changes.
    pub fn reset_all(&mut self) {
        self.texts.clear();
        self.indices.clear();
        self.indexed.clear();
        self.handles.clear();
        self.timed.clear();
    }
}
