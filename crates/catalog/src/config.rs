//! Catalog configuration via `catalog.toml`
//!
//! Every setting has a default, so an empty file (or no file at all) gives a
//! working catalog. Edit the file and reopen the catalog to change settings.

use serde::{Deserialize, Serialize};
use std::path::Path;

use regionmeta_core::{CatalogError, CatalogResult};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "catalog.toml";

/// Catalog settings loaded from `catalog.toml`.
///
/// # Example
///
/// ```toml
/// scanner_caching = 100
/// use_timeline_reads = false
/// barrier_scan_caching = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Rows fetched per scanner batch.
    #[serde(default = "default_scanner_caching")]
    pub scanner_caching: usize,
    /// Let catalog scans read possibly stale data from secondary replicas.
    #[serde(default)]
    pub use_timeline_reads: bool,
    /// Rows fetched per batch by the reverse barrier scan.
    #[serde(default = "default_barrier_scan_caching")]
    pub barrier_scan_caching: usize,
}

fn default_scanner_caching() -> usize {
    100
}

fn default_barrier_scan_caching() -> usize {
    10
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            scanner_caching: default_scanner_caching(),
            use_timeline_reads: false,
            barrier_scan_caching: default_barrier_scan_caching(),
        }
    }
}

impl CatalogConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error if a caching value is zero.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.scanner_caching == 0 {
            return Err(CatalogError::Config(
                "scanner_caching must be greater than zero".to_string(),
            ));
        }
        if self.barrier_scan_caching == 0 {
            return Err(CatalogError::Config(
                "barrier_scan_caching must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Region catalog configuration
#
# Rows fetched per catalog scanner batch (default: 100)
scanner_caching = 100

# Timeline reads: let catalog scans be answered by secondary replicas,
# possibly with stale data (default: false). Reads that drive a write
# always go to the primary.
use_timeline_reads = false

# Rows fetched per batch by the reverse scan that looks up replication
# barriers of the region containing a row (default: 10)
barrier_scan_caching = 10
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: CatalogConfig = toml::from_str(&content).map_err(|e| {
            CatalogError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> CatalogResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                CatalogError::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> CatalogResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CatalogError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            CatalogError::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
