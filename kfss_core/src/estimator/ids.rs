//! Record id generation.
//!
//! Ids are creation-time milliseconds, bumped past the last id handed out so
//! two estimates created in the same millisecond still get distinct, ordered
//! ids. Seeding with the largest persisted id keeps them increasing across
//! restarts even if the clock goes backwards.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator that will only issue ids greater than `last`
    pub fn seeded(last: u64) -> Self {
        IdGenerator {
            last: AtomicU64::new(last),
        }
    }

    /// Record an id issued elsewhere (e.g. loaded from disk)
    pub fn observe(&self, id: u64) {
        self.last.fetch_max(id, Ordering::SeqCst);
    }

    /// Next id for the current wall-clock time
    pub fn next_id(&self) -> u64 {
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        self.next_at(now_ms)
    }

    /// Next id given an explicit clock reading
    pub fn next_at(&self, now_ms: u64) -> u64 {
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now_ms.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange(prev, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}
