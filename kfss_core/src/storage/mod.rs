//! # Durable Key-Value Storage
//!
//! The record store and session persist through a small synchronous
//! key-value interface so they can run against a directory on disk or an
//! in-memory map in tests.
//!
//! - [`MemoryStore`] - `HashMap` backed, nothing touches disk
//! - [`FileStore`] - one JSON file per key, atomic writes
//! - [`DataDirLock`] - advisory lock held while a process mutates a data directory

mod file_store;
mod lock;

use std::collections::HashMap;

use crate::errors::CalcResult;

pub use file_store::FileStore;
pub use lock::{DataDirLock, LockInfo};

/// Key holding the most recent calculation
pub const LAST_CALCULATION_KEY: &str = "kfss_last_calculation";

/// Key holding the bounded recent-calculations list
pub const RECENT_CALCULATIONS_KEY: &str = "kfss_recent_calculations";

/// Key holding the expert-mode flag ("true" / "false")
pub const EXPERT_MODE_KEY: &str = "kfss_expert_mode";

/// Synchronous string key-value storage.
pub trait KeyValueStore {
    /// Stored value, `None` when the key was never set or was removed
    fn get(&self, key: &str) -> CalcResult<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> CalcResult<()>;

    /// Removing a missing key is not an error
    fn remove(&mut self, key: &str) -> CalcResult<()>;
}

/// In-memory store, used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> CalcResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> CalcResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> CalcResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
