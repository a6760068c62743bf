//! A short-lived cache for the ID of the newest ledger entry.
//!
//! Dashboards poll for the newest entry every few seconds to notify the user
//! of new entries. The cache spares the database a `MAX(id)` query per poll.
//! Every ledger mutation invalidates it, so it never hides a change for
//! longer than it takes to load the value again.
//!
//! The cache lock is never held while loading. Writers hold the database lock
//! when they invalidate the cache, and the loader takes the database lock, so
//! holding both in the other order would deadlock.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use crate::Error;

/// How long the newest entry ID is reused before it is loaded again.
pub const DEFAULT_LAST_ENTRY_TTL: Duration = Duration::from_secs(2);

/// A source of monotonic time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// The clock backed by [Instant::now].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedId {
    id: i64,
    loaded_at: Instant,
}

#[derive(Debug, Default)]
struct CacheSlot {
    cached: Option<CachedId>,
    /// Bumped by every invalidation, so a load that raced with one is not stored.
    generation: u64,
}

/// Caches the ID of the newest ledger entry for a fixed time-to-live.
pub struct LastEntryCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: Mutex<CacheSlot>,
}

impl std::fmt::Debug for LastEntryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LastEntryCache")
            .field("ttl", &self.ttl)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl LastEntryCache {
    /// Create an empty cache that keeps values for `ttl` as measured by `clock`.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            slot: Mutex::new(CacheSlot::default()),
        }
    }

    /// Return the cached ID if it is younger than the TTL, otherwise call
    /// `load`, cache its result and return it.
    ///
    /// # Errors
    ///
    /// Returns the error from `load`, in which case nothing is cached.
    pub fn get_or_load(&self, load: impl FnOnce() -> Result<i64, Error>) -> Result<i64, Error> {
        let now = self.clock.now();
        let generation = {
            let slot = self.lock_slot();

            if let Some(cached) = slot.cached
                && now.saturating_duration_since(cached.loaded_at) < self.ttl
            {
                return Ok(cached.id);
            }

            slot.generation
        };

        let id = load()?;

        let mut slot = self.lock_slot();
        if slot.generation == generation {
            slot.cached = Some(CachedId { id, loaded_at: now });
        }

        Ok(id)
    }

    /// Drop the cached value so the next call to [LastEntryCache::get_or_load] loads it again.
    pub fn invalidate(&self) {
        let mut slot = self.lock_slot();
        slot.cached = None;
        slot.generation = slot.generation.wrapping_add(1);
    }

    fn lock_slot(&self) -> MutexGuard<'_, CacheSlot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for LastEntryCache {
    fn default() -> Self {
        Self::new(DEFAULT_LAST_ENTRY_TTL, Arc::new(SystemClock))
    }
}

#[cfg(test)]
pub(crate) mod test_clock {
    use std::{
        sync::Mutex,
        time::{Duration, Instant},
    };

    use super::Clock;

    /// A clock that only moves when told to.
    pub struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
            }
        }

        pub fn advance(&self, duration: Duration) {
            *self.now.lock().unwrap() += duration;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }
}
