//! The catalog service
//!
//! [`MetaCatalog`] owns a handle to the store, a clock and the loaded
//! configuration. It is built once and hands out short-lived views that
//! borrow from it:
//!
//! - [`MetaCatalog::writer`]: region lifecycle writes
//! - [`MetaCatalog::reader`]: lookups and listings
//! - [`MetaCatalog::barriers`]: replication barriers
//! - [`MetaCatalog::scanner`]: raw catalog scans
//!
//! Views hold no state of their own, so any number of them can be used
//! from any number of threads at once.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use regionmeta_core::{CatalogResult, CatalogStore, Clock, SystemClock};

use crate::barrier::ReplicationBarrierTracker;
use crate::config::{CatalogConfig, CONFIG_FILE_NAME};
use crate::reader::CatalogReader;
use crate::scanner::CatalogScanner;
use crate::writer::RegionLifecycleWriter;

/// Region catalog over a store
pub struct MetaCatalog<S: CatalogStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: CatalogConfig,
}

impl<S: CatalogStore> MetaCatalog<S> {
    /// Catalog with default settings and the system clock
    pub fn new(store: Arc<S>) -> Self {
        MetaCatalog {
            store,
            clock: Arc::new(SystemClock),
            config: CatalogConfig::default(),
        }
    }

    /// Open a catalog configured from `catalog.toml` in `config_dir`
    ///
    /// A missing file is created with the default settings.
    pub fn open(store: Arc<S>, config_dir: &Path) -> CatalogResult<Self> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        CatalogConfig::write_default_if_missing(&config_path)?;
        let config = CatalogConfig::from_file(&config_path)?;
        info!(
            target: "regionmeta::catalog",
            path = %config_path.display(),
            scanner_caching = config.scanner_caching,
            use_timeline_reads = config.use_timeline_reads,
            "Opened region catalog"
        );
        Ok(MetaCatalog {
            store,
            clock: Arc::new(SystemClock),
            config,
        })
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the configuration
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration does not validate.
    pub fn with_config(mut self, config: CatalogConfig) -> CatalogResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active configuration
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Region lifecycle writes
    pub fn writer(&self) -> RegionLifecycleWriter<'_, S> {
        RegionLifecycleWriter::new(self.store.as_ref(), self.clock.as_ref())
    }

    /// Region and table lookups
    pub fn reader(&self) -> CatalogReader<'_, S> {
        CatalogReader::new(self.store.as_ref(), &self.config)
    }

    /// Replication barriers
    pub fn barriers(&self) -> ReplicationBarrierTracker<'_, S> {
        ReplicationBarrierTracker::new(self.store.as_ref(), self.clock.as_ref(), &self.config)
    }

    /// Raw catalog scans
    pub fn scanner(&self) -> CatalogScanner<'_, S> {
        CatalogScanner::new(self.store.as_ref(), &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionmeta_core::{CatalogError, ManualClock, RegionInfo, TableName};
    use regionmeta_storage::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn test_open_writes_default_config() {
        let dir = TempDir::new().unwrap();
        let catalog = MetaCatalog::open(Arc::new(MemoryStore::new()), dir.path()).unwrap();
        assert_eq!(catalog.config(), &CatalogConfig::default());
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_open_reads_existing_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "scanner_caching = 5\nuse_timeline_reads = true\n",
        )
        .unwrap();
        let catalog = MetaCatalog::open(Arc::new(MemoryStore::new()), dir.path()).unwrap();
        assert_eq!(catalog.config().scanner_caching, 5);
        assert!(catalog.config().use_timeline_reads);
    }

    #[test]
    fn test_with_config_validates() {
        let catalog = MetaCatalog::new(Arc::new(MemoryStore::new()));
        let bad = CatalogConfig {
            scanner_caching: 0,
            ..CatalogConfig::default()
        };
        assert!(matches!(
            catalog.with_config(bad),
            Err(CatalogError::Config(_))
        ));
    }

    #[test]
    fn test_views_share_store_and_clock() {
        let catalog = MetaCatalog::new(Arc::new(MemoryStore::new()))
            .with_clock(Arc::new(ManualClock::new(5_000)));
        let region = RegionInfo::builder(TableName::new("t1").unwrap())
            .region_id(1)
            .build()
            .unwrap();

        catalog.writer().add_region(&region).unwrap();
        let row = catalog.reader().catalog_family_row(&region).unwrap();
        assert!(row.cells().iter().all(|cell| cell.timestamp == 5_000));
        assert_eq!(catalog.scanner().full_scan(crate::QueryKind::Region).unwrap().len(), 1);
        assert_eq!(catalog.store().row_count(), 1);
    }
}
