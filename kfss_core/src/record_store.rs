//! # Calculation Record Store
//!
//! Bounded history of committed estimates (newest first, at most
//! [`HISTORY_LIMIT`]) plus a "last calculation" slot that survives eviction
//! from the history. Both are written through to a [`KeyValueStore`] on every
//! change.
//!
//! ## Persisted Format
//!
//! Values are JSON envelopes carrying the schema version:
//!
//! ```text
//! kfss_recent_calculations  {"version":"0.1.0","records":[EstimationResult, ...]}
//! kfss_last_calculation     {"version":"0.1.0","record":EstimationResult}
//! ```
//!
//! Unreadable, corrupt or version-incompatible values load as empty and are
//! logged; they never stop the store from opening.
//!
//! ## Example
//!
//! ```rust
//! use kfss_core::estimator::{Estimator, EstimatorInput, ProjectInfo};
//! use kfss_core::record_store::RecordStore;
//! use kfss_core::storage::MemoryStore;
//!
//! let mut store = RecordStore::open(MemoryStore::new());
//! let input = EstimatorInput::new(ProjectInfo::new("Line 1", "Diner"), 3.0, 1.2, 2, 1);
//! let result = Estimator::new().compute(&input).unwrap();
//!
//! store.append(result.clone()).unwrap();
//! assert_eq!(store.all().len(), 1);
//! assert_eq!(store.find_by_id(result.id).unwrap().project.name, "Line 1");
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{CalcError, CalcResult};
use crate::estimator::EstimationResult;
use crate::storage::{KeyValueStore, LAST_CALCULATION_KEY, RECENT_CALCULATIONS_KEY};

/// Current schema version for persisted records
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Most history entries kept
pub const HISTORY_LIMIT: usize = 5;

#[derive(Serialize, Deserialize)]
struct PersistedHistory {
    version: String,
    records: Vec<EstimationResult>,
}

#[derive(Serialize, Deserialize)]
struct PersistedRecord {
    version: String,
    record: EstimationResult,
}

/// What [`RecordStore::load_persisted`] found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub history_entries: usize,
    pub has_last_calculation: bool,
    /// Problems that were recovered by falling back to empty state
    pub recovered: Vec<CalcError>,
}

/// History plus last-calculation slot over a key-value backend.
#[derive(Debug)]
pub struct RecordStore<S: KeyValueStore> {
    backend: S,
    history: Vec<EstimationResult>,
    last: Option<EstimationResult>,
}

impl<S: KeyValueStore> RecordStore<S> {
    /// Empty store; nothing is read from the backend.
    pub fn new(backend: S) -> Self {
        RecordStore {
            backend,
            history: Vec::new(),
            last: None,
        }
    }

    /// Store restored from whatever the backend holds.
    pub fn open(backend: S) -> Self {
        let mut store = RecordStore::new(backend);
        store.load_persisted();
        store
    }

    /// Restore history and last calculation from the backend.
    ///
    /// Anything that cannot be read loads as empty and is reported in
    /// [`LoadReport::recovered`].
    pub fn load_persisted(&mut self) -> LoadReport {
        let mut report = LoadReport::default();

        self.history = match self.read_history() {
            Ok(records) => records,
            Err(e) => {
                warn!(key = RECENT_CALCULATIONS_KEY, error = %e, "discarding unreadable history");
                report.recovered.push(e);
                Vec::new()
            }
        };
        self.history.truncate(HISTORY_LIMIT);

        self.last = match self.read_last() {
            Ok(record) => record,
            Err(e) => {
                warn!(key = LAST_CALCULATION_KEY, error = %e, "discarding unreadable last calculation");
                report.recovered.push(e);
                None
            }
        };

        report.history_entries = self.history.len();
        report.has_last_calculation = self.last.is_some();
        debug!(
            history = report.history_entries,
            last = report.has_last_calculation,
            "loaded persisted calculations"
        );
        report
    }

    fn read_history(&self) -> CalcResult<Vec<EstimationResult>> {
        let Some(raw) = self.backend.get(RECENT_CALCULATIONS_KEY).map_err(|e| as_read_error(RECENT_CALCULATIONS_KEY, e))? else {
            return Ok(Vec::new());
        };
        let persisted: PersistedHistory = serde_json::from_str(&raw)
            .map_err(|e| CalcError::persistence_read(RECENT_CALCULATIONS_KEY, e.to_string()))?;
        validate_version(&persisted.version).map_err(|e| as_read_error(RECENT_CALCULATIONS_KEY, e))?;
        Ok(persisted.records)
    }

    fn read_last(&self) -> CalcResult<Option<EstimationResult>> {
        let Some(raw) = self.backend.get(LAST_CALCULATION_KEY).map_err(|e| as_read_error(LAST_CALCULATION_KEY, e))? else {
            return Ok(None);
        };
        let persisted: PersistedRecord = serde_json::from_str(&raw)
            .map_err(|e| CalcError::persistence_read(LAST_CALCULATION_KEY, e.to_string()))?;
        validate_version(&persisted.version).map_err(|e| as_read_error(LAST_CALCULATION_KEY, e))?;
        Ok(Some(persisted.record))
    }

    /// Push a result to the head of the history (dropping the oldest beyond
    /// the limit) and make it the last calculation. Both are persisted before
    /// the in-memory state changes; if the second write fails the persisted
    /// history is put back.
    pub fn append(&mut self, result: EstimationResult) -> CalcResult<()> {
        let mut history = Vec::with_capacity(HISTORY_LIMIT);
        history.push(result.clone());
        history.extend(self.history.iter().take(HISTORY_LIMIT - 1).cloned());

        self.write_history(&history)?;
        if let Err(e) = self.write_last(&result) {
            self.restore_history();
            return Err(e);
        }

        debug!(id = result.id, history = history.len(), "appended calculation");
        self.history = history;
        self.last = Some(result);
        Ok(())
    }

    /// History, newest first
    pub fn all(&self) -> &[EstimationResult] {
        &self.history
    }

    pub fn find_by_id(&self, id: u64) -> CalcResult<&EstimationResult> {
        self.history
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| CalcError::record_not_found(id))
    }

    pub fn last_calculation(&self) -> Option<&EstimationResult> {
        self.last.as_ref()
    }

    /// Overwrite the last-calculation slot without touching the history
    pub fn set_last_calculation(&mut self, result: EstimationResult) -> CalcResult<()> {
        self.write_last(&result)?;
        self.last = Some(result);
        Ok(())
    }

    /// Empty the history and the last-calculation slot
    pub fn clear(&mut self) -> CalcResult<()> {
        self.backend.remove(RECENT_CALCULATIONS_KEY)?;
        self.backend.remove(LAST_CALCULATION_KEY)?;
        self.history.clear();
        self.last = None;
        Ok(())
    }

    /// Largest id held anywhere in the store
    pub fn max_id(&self) -> Option<u64> {
        self.history
            .iter()
            .chain(self.last.iter())
            .map(|r| r.id)
            .max()
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    fn restore_history(&mut self) {
        let previous = self.history.clone();
        let restored = if previous.is_empty() {
            self.backend.remove(RECENT_CALCULATIONS_KEY)
        } else {
            self.write_history(&previous)
        };
        if let Err(e) = restored {
            warn!(error = %e, "could not restore calculation history");
        }
    }

    fn write_history(&mut self, records: &[EstimationResult]) -> CalcResult<()> {
        let json = serde_json::to_string(&PersistedHistory {
            version: SCHEMA_VERSION.to_string(),
            records: records.to_vec(),
        })?;
        self.backend.set(RECENT_CALCULATIONS_KEY, &json)
    }

    fn write_last(&mut self, record: &EstimationResult) -> CalcResult<()> {
        let json = serde_json::to_string(&PersistedRecord {
            version: SCHEMA_VERSION.to_string(),
            record: record.clone(),
        })?;
        self.backend.set(LAST_CALCULATION_KEY, &json)
    }
}

fn as_read_error(key: &str, error: CalcError) -> CalcError {
    match error {
        CalcError::PersistenceRead { .. } => error,
        other => CalcError::persistence_read(key, other.to_string()),
    }
}

/// Validate that a persisted version is compatible with the current schema.
fn validate_version(file_version: &str) -> CalcResult<()> {
    let mismatch = || CalcError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: SCHEMA_VERSION.to_string(),
    };

    let file_parts: Vec<u32> = file_version
        .split('.')
        .map(|p| p.parse())
        .collect::<Result<_, _>>()
        .map_err(|_| mismatch())?;
    let current_parts: Vec<u32> = SCHEMA_VERSION
        .split('.')
        .filter_map(|p| p.parse().ok())
        .collect();

    if file_parts.is_empty() || file_parts[0] != current_parts[0] {
        return Err(mismatch());
    }

    // 0.x: a newer minor version may have changed the layout
    if current_parts[0] == 0 && file_parts.get(1).copied().unwrap_or(0) > current_parts[1] {
        return Err(mismatch());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{Estimator, EstimatorInput, ProjectInfo};
    use crate::storage::MemoryStore;

    fn result_named(estimator: &Estimator, name: &str) -> EstimationResult {
        let input = EstimatorInput::new(ProjectInfo::new(name, "Client"), 3.0, 1.2, 2, 1);
        estimator.compute(&input).unwrap()
    }

    #[test]
    fn test_append_newest_first() {
        let estimator = Estimator::new();
        let mut store = RecordStore::new(MemoryStore::new());
        store.append(result_named(&estimator, "first")).unwrap();
        store.append(result_named(&estimator, "second")).unwrap();

        let names: Vec<_> = store.all().iter().map(|r| r.project.name.as_str()).collect();
        assert_eq!(names, vec!["second", "first"]);
        assert_eq!(store.last_calculation().unwrap().project.name, "second");
    }

    #[test]
    fn test_sixth_append_evicts_oldest() {
        let estimator = Estimator::new();
        let mut store = RecordStore::new(MemoryStore::new());
        for i in 0..6 {
            store.append(result_named(&estimator, &format!("calc-{}", i))).unwrap();
        }
        assert_eq!(store.all().len(), HISTORY_LIMIT);
        assert_eq!(store.all()[0].project.name, "calc-5");
        assert_eq!(store.all()[4].project.name, "calc-1");
        assert!(store.all().iter().all(|r| r.project.name != "calc-0"));
    }

    #[test]
    fn test_last_calculation_survives_eviction() {
        let estimator = Estimator::new();
        let mut store = RecordStore::new(MemoryStore::new());
        let old = result_named(&estimator, "old");
        store.append(old.clone()).unwrap();
        for i in 0..5 {
            store.append(result_named(&estimator, &format!("new-{}", i))).unwrap();
        }
        assert!(store.find_by_id(old.id).is_err());

        store.set_last_calculation(old.clone()).unwrap();
        assert_eq!(store.last_calculation().unwrap().id, old.id);
        assert_eq!(store.all().len(), 5);
    }

    /// Memory backend whose last-calculation writes can be made to fail
    #[derive(Default)]
    struct FlakyLastSlot {
        inner: MemoryStore,
        fail_last: bool,
    }

    impl KeyValueStore for FlakyLastSlot {
        fn get(&self, key: &str) -> CalcResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> CalcResult<()> {
            if self.fail_last && key == LAST_CALCULATION_KEY {
                return Err(CalcError::file_error("write", key, "disk full"));
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> CalcResult<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_failed_append_leaves_persisted_history_unchanged() {
        let estimator = Estimator::new();
        let mut store = RecordStore::new(FlakyLastSlot::default());
        let kept = result_named(&estimator, "kept");
        store.append(kept.clone()).unwrap();

        store.backend_mut().fail_last = true;
        assert!(store.append(result_named(&estimator, "lost")).is_err());
        assert_eq!(store.all().len(), 1);

        let reopened = RecordStore::open(store.backend().inner.clone());
        let ids: Vec<_> = reopened.all().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![kept.id]);
        assert_eq!(reopened.last_calculation().unwrap().id, kept.id);
    }

    #[test]
    fn test_failed_first_append_leaves_no_history() {
        let estimator = Estimator::new();
        let mut store = RecordStore::new(FlakyLastSlot {
            fail_last: true,
            ..FlakyLastSlot::default()
        });
        assert!(store.append(result_named(&estimator, "lost")).is_err());
        assert!(store.backend().inner.is_empty());
    }

    #[test]
    fn test_find_by_id_miss() {
        let store = RecordStore::new(MemoryStore::new());
        let err = store.find_by_id(12345).unwrap_err();
        assert_eq!(err, CalcError::record_not_found(12345));
    }

    #[test]
    fn test_reload_from_backend() {
        let estimator = Estimator::new();
        let mut store = RecordStore::new(MemoryStore::new());
        let a = result_named(&estimator, "a");
        let b = result_named(&estimator, "b");
        store.append(a.clone()).unwrap();
        store.append(b.clone()).unwrap();

        let backend = store.backend().clone();
        let reopened = RecordStore::open(backend);
        let ids: Vec<_> = reopened.all().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
        assert_eq!(reopened.last_calculation().unwrap().id, b.id);
        assert_eq!(reopened.max_id(), Some(b.id));
    }

    #[test]
    fn test_corrupt_data_loads_empty() {
        let mut backend = MemoryStore::new();
        backend.set(RECENT_CALCULATIONS_KEY, "{not json").unwrap();
        backend.set(LAST_CALCULATION_KEY, "[]").unwrap();

        let mut store = RecordStore::new(backend);
        let report = store.load_persisted();
        assert!(store.all().is_empty());
        assert!(store.last_calculation().is_none());
        assert_eq!(report.recovered.len(), 2);
        assert!(report
            .recovered
            .iter()
            .all(|e| e.error_code() == "PERSISTENCE_READ_ERROR"));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let mut backend = MemoryStore::new();
        backend
            .set(RECENT_CALCULATIONS_KEY, "{\"version\":\"0.9.0\",\"records\":[]}")
            .unwrap();
        let mut store = RecordStore::new(backend);
        let report = store.load_persisted();
        assert_eq!(report.recovered.len(), 1);
        assert!(store.all().is_empty());
    }

    #[test]
    fn test_clear() {
        let estimator = Estimator::new();
        let mut store = RecordStore::new(MemoryStore::new());
        store.append(result_named(&estimator, "x")).unwrap();
        store.clear().unwrap();

        assert!(store.all().is_empty());
        assert!(store.last_calculation().is_none());
        assert!(store.backend().is_empty());

        let reopened = RecordStore::open(store.backend().clone());
        assert!(reopened.last_calculation().is_none());
    }

    #[test]
    fn test_version_validation() {
        assert!(validate_version(SCHEMA_VERSION).is_ok());
        assert!(validate_version("0.1.7").is_ok());
        assert!(validate_version("0.0.9").is_ok());
        assert!(validate_version("1.0.0").is_err());
        assert!(validate_version("0.2.0").is_err());
        assert!(validate_version("latest").is_err());
    }
}
