use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::value::ActorId;

/// Stand-in expiry for cooldowns too long to add to `Instant::now()`
pub const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Per-trigger map from actor to cooldown expiry
///
/// Cloning yields another handle onto the same table. Entries whose expiry is
/// at or before "now" are treated as absent; [`CooldownTable::purge_expired`]
/// drops them physically.
#[derive(Debug, Clone, Default)]
pub struct CooldownTable {
    entries: Arc<RwLock<HashMap<ActorId, Instant>>>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `actor` has a live entry right now
    pub fn is_cooling_down(&self, actor: ActorId) -> bool {
        self.is_cooling_down_at(actor, Instant::now())
    }

    /// Whether `actor` has an entry expiring strictly after `now`
    pub fn is_cooling_down_at(&self, actor: ActorId, now: Instant) -> bool {
        self.entries
            .read()
            .get(&actor)
            .is_some_and(|expiry| now < *expiry)
    }

    /// Time left on `actor`'s cooldown, if any
    pub fn remaining(&self, actor: ActorId) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .get(&actor)
            .and_then(|expiry| expiry.checked_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    /// Start a cooldown of `duration` from now
    ///
    /// Durations past what `Instant` can represent saturate to [`FAR_FUTURE`].
    pub fn set(&self, actor: ActorId, duration: Duration) {
        let now = Instant::now();
        let expiry = now
            .checked_add(duration)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        self.set_until(actor, expiry);
    }

    pub fn set_until(&self, actor: ActorId, expiry: Instant) {
        self.entries.write().insert(actor, expiry);
    }

    /// Remove `actor`'s entry; true if it was live
    pub fn clear(&self, actor: ActorId) -> bool {
        let now = Instant::now();
        self.entries
            .write()
            .remove(&actor)
            .is_some_and(|expiry| now < expiry)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, expiry| now < *expiry);
        before - entries.len()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|expiry| now < **expiry)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
