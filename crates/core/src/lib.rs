//! Core types and traits for the region catalog
//!
//! This crate defines the foundational types used throughout the system:
//! - TableName, ServerName, RegionState, TableState: identity and state
//! - RegionInfo, RegionLocation, RegionLocations: region descriptors
//! - row_key: region name construction and parsing
//! - Cell, RowResult: what reads return
//! - Put, Delete, Mutation, MutateRowsRequest: what writes send
//! - Get, Scan, RowFilter: what reads ask for
//! - CatalogError: error type hierarchy
//! - CatalogStore: the storage seam
//! - Clock: injectable time source

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bytes;
pub mod cell;
pub mod clock;
pub mod error;
pub mod mutation;
pub mod query;
pub mod region;
pub mod row_key;
pub mod traits;
pub mod types;

pub use cell::{Cell, RowResult, LATEST_TIMESTAMP};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CatalogError, CatalogResult};
pub use mutation::{Delete, DeleteScope, MutateRowsRequest, Mutation, Put};
pub use query::{ColumnSpec, Consistency, Get, Projection, ReadType, RowFilter, Scan};
pub use region::{RegionInfo, RegionInfoBuilder, RegionLocation, RegionLocations};
pub use row_key::{RegionNameParts, RowKey};
pub use traits::{CatalogStore, RowScanner};
pub use types::{RegionState, ServerName, TableName, TableState, TableStatus};
