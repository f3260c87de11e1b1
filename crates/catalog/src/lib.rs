//! Region catalog
//!
//! The catalog is a table of its own, one row per region, that records
//! where every region of every user table lives and what state it is in.
//! This crate owns the catalog's row and column layout and every protocol
//! that reads or writes it:
//!
//! - schema: families, qualifiers and per-replica column names
//! - columns: encode/decode of every column kind
//! - ancestry: parent chains of split and merged regions
//! - mutator: all-or-nothing multi-row commits
//! - writer: region creation, split, merge, state and location changes
//! - barrier: replication barriers and the barrier lookup scan
//! - scanner: table- and kind-scoped catalog scans with visitors
//! - reader: point lookups and region listings
//! - catalog: the [`MetaCatalog`] service tying the views together
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use regionmeta_catalog::MetaCatalog;
//! use regionmeta_storage::MemoryStore;
//!
//! let catalog = MetaCatalog::new(Arc::new(MemoryStore::new()));
//! catalog.writer().add_regions(&regions, 3)?;
//! let serving = catalog.reader().table_regions(&table, true)?;
//! ```
//!
//! # Row layout
//!
//! | Row | Family | Columns |
//! |-----|--------|---------|
//! | `table,start,id.ENC.` | `info` | `regioninfo`, `state`, `server`, `serverstartcode`, `seqnumDuringOpen`, `sn`, `splitA`, `splitB`, `mergeNNNN` |
//! | `table,start,id.ENC.` | `rep_barrier` | `seqnumDuringOpen` (all versions), `parent` |
//! | `table` | `table` | `state` |
//!
//! Replica `r > 0` columns live in the default replica's row with a `_RRRR`
//! hex suffix.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ancestry;
pub mod barrier;
pub mod catalog;
pub mod columns;
pub mod config;
pub mod mutator;
pub mod reader;
pub mod scanner;
pub mod schema;
pub mod writer;

pub use ancestry::{decode_parents, encode_parent_regions, encode_parents};
pub use barrier::{replication_barriers, ReplicationBarrierResult, ReplicationBarrierTracker};
pub use catalog::MetaCatalog;
pub use config::{CatalogConfig, CONFIG_FILE_NAME};
pub use mutator::{anchor_row, multi_mutate};
pub use reader::CatalogReader;
pub use scanner::{
    CatalogRows, CatalogScanner, CollectAllVisitor, CollectRegionLocationsVisitor, QueryKind,
    Visitor,
};
pub use writer::RegionLifecycleWriter;
