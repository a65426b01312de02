//! File-backed key-value store.
//!
//! Each key is a `<key>.json` file in the data directory. Writes go to a
//! `.tmp` sibling, are synced, then renamed over the target so an interrupted
//! write never leaves a half-written value behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{CalcError, CalcResult};
use crate::storage::KeyValueStore;

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> CalcResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            CalcError::file_error("create data directory", root.display().to_string(), e.to_string())
        })?;
        Ok(FileStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> CalcResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CalcError::invalid_input(
                "key",
                key,
                "Keys may only contain letters, digits, '_' and '-'",
            ));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> CalcResult<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| CalcError::file_error("read", path.display().to_string(), e.to_string()))
    }

    fn set(&mut self, key: &str, value: &str) -> CalcResult<()> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension("json.tmp");

        let mut tmp_file = File::create(&tmp_path).map_err(|e| {
            CalcError::file_error("create temp file", tmp_path.display().to_string(), e.to_string())
        })?;

        tmp_file.write_all(value.as_bytes()).map_err(|e| {
            CalcError::file_error("write temp file", tmp_path.display().to_string(), e.to_string())
        })?;

        tmp_file.sync_all().map_err(|e| {
            CalcError::file_error("sync temp file", tmp_path.display().to_string(), e.to_string())
        })?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CalcError::file_error("rename to final", path.display().to_string(), e.to_string())
        })?;

        debug!(key, bytes = value.len(), "stored value");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> CalcResult<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                CalcError::file_error("remove", path.display().to_string(), e.to_string())
            })?;
            debug!(key, "removed value");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_remove() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();

        assert_eq!(store.get("kfss_expert_mode").unwrap(), None);
        store.set("kfss_expert_mode", "true").unwrap();
        assert_eq!(store.get("kfss_expert_mode").unwrap().as_deref(), Some("true"));
        assert!(dir.path().join("kfss_expert_mode.json").exists());

        store.remove("kfss_expert_mode").unwrap();
        assert_eq!(store.get("kfss_expert_mode").unwrap(), None);
    }

    #[test]
    fn test_atomic_set_leaves_no_tmp_file() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.set("kfss_last_calculation", "{}").unwrap();
        store.set("kfss_last_calculation", "{\"id\":1}").unwrap();

        assert!(!dir.path().join("kfss_last_calculation.json.tmp").exists());
        assert_eq!(
            store.get("kfss_last_calculation").unwrap().as_deref(),
            Some("{\"id\":1}")
        );
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.set("kfss_recent_calculations", "[]").unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("kfss_recent_calculations").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.root(), nested.as_path());
    }
}
