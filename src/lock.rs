//! Mutex poison recovery so one panicking observer cannot mute narration.

use std::sync::{Mutex, MutexGuard};

pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(context, "mutex poisoned; recovering");
            poisoned.into_inner()
        }
    }
}
