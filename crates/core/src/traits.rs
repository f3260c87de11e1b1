//! Core traits for the catalog store abstraction
//!
//! This module defines the CatalogStore trait that lets the catalog run over
//! an in-memory store in tests and a remote store in production without
//! changing the layers above it.

use crate::cell::RowResult;
use crate::error::CatalogResult;
use crate::mutation::{Delete, MutateRowsRequest, Put};
use crate::query::{Get, Scan};

/// Lazily produced scan results
///
/// Rows are pulled on demand; dropping the iterator releases whatever the
/// store holds for the scan.
pub type RowScanner<'a> = Box<dyn Iterator<Item = CatalogResult<RowResult>> + Send + 'a>;

/// Storage abstraction for the catalog table
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
///
/// Single-row atomicity: every `Put` and every `Delete` is applied to its
/// row atomically. Multi-row atomicity is only offered by
/// [`CatalogStore::mutate_rows`].
pub trait CatalogStore: Send + Sync {
    /// Read one row
    ///
    /// Returns an empty result if the row has no visible cells.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, get: &Get) -> CatalogResult<RowResult>;

    /// Apply puts, each one atomic on its own row
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Puts before the
    /// failing one may already be visible.
    fn put(&self, puts: &[Put]) -> CatalogResult<()>;

    /// Apply deletes, each one atomic on its own row
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn delete(&self, deletes: &[Delete]) -> CatalogResult<()>;

    /// Open a scan
    ///
    /// # Errors
    ///
    /// Returns an error if the scan cannot be opened. Failures while
    /// iterating are reported through the iterator.
    fn scan<'a>(&'a self, scan: &Scan) -> CatalogResult<RowScanner<'a>>;

    /// Apply every mutation of the request or none of them
    ///
    /// Concurrent readers observe either the state before or the state after
    /// the whole batch, never a mix.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch was not applied. Nothing is visible in
    /// that case.
    fn mutate_rows(&self, request: &MutateRowsRequest) -> CatalogResult<()>;
}
