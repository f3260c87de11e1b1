//! Storage layer for the region catalog
//!
//! This crate implements the in-memory catalog store with:
//! - MemoryStore: BTreeMap-based row storage behind a RwLock
//! - VersionChain: per-column versions, newest first
//! - RowData: versions plus row, family and column tombstones
//! - Lazy, batched forward and reverse scanners
//! - All-or-nothing multi-row commits with fault injection for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod versions;

pub use memory::MemoryStore;
pub use versions::{RowData, VersionChain};
