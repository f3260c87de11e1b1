//! Regionmeta - system catalog for a partitioned, replicated key-value store
//!
//! Tables are split into regions by row key range. The catalog records, one
//! row per region, each region's descriptor, lifecycle state, per-replica
//! assignment, split/merge ancestry and replication barriers.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use regionmeta::{MemoryStore, MetaCatalog, RegionInfo, TableName};
//!
//! let catalog = MetaCatalog::new(Arc::new(MemoryStore::new()));
//! let region = RegionInfo::builder(TableName::new("orders")?).build()?;
//! catalog.writer().add_region(&region)?;
//! let location = catalog.reader().region_location_for(&region)?;
//! ```
//!
//! # Architecture
//!
//! - `regionmeta-core`: identity types, cells, mutations, errors and the
//!   `CatalogStore` seam
//! - `regionmeta-storage`: an ordered, multi-versioned in-memory store
//! - `regionmeta-catalog`: the catalog protocols and the `MetaCatalog` service

pub use regionmeta_catalog::*;
pub use regionmeta_core::*;
pub use regionmeta_storage::MemoryStore;
