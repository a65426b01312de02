//! Settings loaded from `kfss.toml`.
//!
//! ```toml
//! data_dir = ".kfss"
//! default_currency = "EUR"
//! quotation_validity_days = 14
//!
//! [company]
//! name = "Fire Safety Solutions"
//! phone = "(555) 123-4567"
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{CalcError, CalcResult};
use crate::pricing::Currency;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "KFSS_DATA_DIR";

/// Default data directory, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = ".kfss";

/// Settings file looked up inside the data directory
pub const CONFIG_FILE_NAME: &str = "kfss.toml";

/// Quotation header details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub name: String,
    pub address_lines: Vec<String>,
    pub phone: String,
    pub email: String,
    pub website: String,
}

impl Default for CompanyInfo {
    fn default() -> Self {
        CompanyInfo {
            name: "Fire Safety Solutions".to_string(),
            address_lines: vec![
                "123 Safety Street".to_string(),
                "Fire City, FC 12345".to_string(),
            ],
            phone: "(555) 123-4567".to_string(),
            email: "info@firesafetysolutions.com".to_string(),
            website: "www.firesafetysolutions.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub default_currency: Currency,
    pub quotation_validity_days: u32,
    pub prepared_by: String,
    pub company: CompanyInfo,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            default_currency: Currency::USD,
            quotation_validity_days: 30,
            prepared_by: "KFSS Calculator".to_string(),
            company: CompanyInfo::default(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> CalcResult<Self> {
        toml::from_str(text).map_err(|e| CalcError::SerializationError {
            reason: format!("Invalid settings: {}", e),
        })
    }

    /// Load settings from a file that must exist
    pub fn load(path: &Path) -> CalcResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| CalcError::file_error("read settings", path.display().to_string(), e.to_string()))?;
        let settings = Self::from_toml(&text)?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Resolve settings the way the CLI does.
    ///
    /// An explicit `config` path must load. Otherwise `kfss.toml` inside the
    /// data directory is used when present, else defaults. The data directory
    /// comes from `data_dir_override`, then `KFSS_DATA_DIR`, then the file,
    /// then `.kfss`.
    pub fn resolve(config: Option<&Path>, data_dir_override: Option<&Path>) -> CalcResult<Self> {
        let env_dir = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        let preferred_dir = data_dir_override.map(Path::to_path_buf).or(env_dir);

        let mut settings = match config {
            Some(path) => Self::load(path)?,
            None => {
                let dir = preferred_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
                let candidate = dir.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Self::load(&candidate)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(dir) = preferred_dir {
            settings.data_dir = dir;
        }
        Ok(settings)
    }

    /// Serialize to TOML, e.g. to seed a config file
    pub fn to_toml(&self) -> CalcResult<String> {
        toml::to_string_pretty(self).map_err(|e| CalcError::SerializationError {
            reason: e.to_string(),
        })
    }
}
