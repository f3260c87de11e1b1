//! MemoryStore: in-memory catalog store with BTreeMap and version chains
//!
//! This module implements the CatalogStore trait using:
//! - `BTreeMap<Vec<u8>, RowData>` for ordered row storage
//! - `parking_lot::RwLock` for thread-safe access
//! - per-column version chains with tombstones for delete semantics
//! - an injectable [`Clock`] that resolves `LATEST_TIMESTAMP`
//!
//! # Design Notes
//!
//! - **Single-row atomicity**: each put or delete takes the write lock once
//! - **Multi-row atomicity**: `mutate_rows` validates the whole batch first,
//!   then applies every mutation under one write lock acquisition
//! - **One timestamp per batch**: every `LATEST_TIMESTAMP` in one call
//!   resolves to the same clock reading
//! - **Lazy scans**: scanners fetch `caching` rows per lock acquisition and
//!   never hold the lock between batches
//!
//! # Fault Injection
//!
//! `fail_next_commit` makes the next `mutate_rows` call fail before anything
//! is applied. Tests use it to prove that a failed multi-row commit leaves
//! no partial state behind.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use regionmeta_core::bytes::to_string_binary;
use regionmeta_core::{
    CatalogError, CatalogResult, CatalogStore, Clock, Delete, DeleteScope, Get, MutateRowsRequest,
    Mutation, Put, RowFilter, RowResult, RowScanner, Scan, SystemClock, LATEST_TIMESTAMP,
};

use crate::versions::RowData;

type Rows = BTreeMap<Vec<u8>, RowData>;

/// In-memory catalog store
///
/// Implements [`CatalogStore`] for tests and embedding.
/// Thread-safe through `parking_lot::RwLock` and atomics.
pub struct MemoryStore {
    /// Ordered map from row key to row state
    data: Arc<RwLock<Rows>>,
    /// Resolves `LATEST_TIMESTAMP`
    clock: Arc<dyn Clock>,
    /// Fail the next multi-row commit
    fail_next_commit: AtomicBool,
    /// Successful multi-row commits
    multi_row_commits: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store on the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            clock,
            fail_next_commit: AtomicBool::new(false),
            multi_row_commits: AtomicU64::new(0),
        }
    }

    /// Make the next `mutate_rows` call fail without applying anything
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of multi-row commits applied so far
    pub fn multi_row_commits(&self) -> u64 {
        self.multi_row_commits.load(Ordering::SeqCst)
    }

    /// Number of rows holding data or tombstones
    pub fn row_count(&self) -> usize {
        self.data.read().len()
    }

    #[inline]
    fn resolve(ts: u64, now: u64) -> u64 {
        if ts == LATEST_TIMESTAMP {
            now
        } else {
            ts
        }
    }

    fn apply_put(rows: &mut Rows, put: &Put, now: u64) {
        if put.is_empty() {
            return;
        }
        let row = rows.entry(put.row().to_vec()).or_default();
        for cell in put.cells() {
            row.put(
                &cell.family,
                &cell.qualifier,
                Self::resolve(cell.timestamp, now),
                cell.value.clone(),
            );
        }
    }

    fn apply_delete(rows: &mut Rows, delete: &Delete, now: u64) {
        let row = rows.entry(delete.row().to_vec()).or_default();
        if delete.is_row_delete() {
            row.delete_row(Self::resolve(delete.timestamp(), now));
            return;
        }
        for scope in delete.scopes() {
            match scope {
                DeleteScope::Family { family, timestamp } => {
                    row.delete_family(family, Self::resolve(*timestamp, now));
                }
                DeleteScope::Columns {
                    family,
                    qualifier,
                    timestamp,
                } => {
                    row.delete_column(family, qualifier, Self::resolve(*timestamp, now));
                }
                DeleteScope::Version {
                    family,
                    qualifier,
                    timestamp,
                } => {
                    let exact = (*timestamp != LATEST_TIMESTAMP).then_some(*timestamp);
                    row.delete_version(family, qualifier, exact);
                }
            }
        }
    }

    /// Materialize the visible part of one row for a scan
    fn scan_row(row_key: &[u8], row: &RowData, scan: &Scan) -> RowResult {
        let mut cells = row.visible_cells(|f, q| scan.projection.matches(f, q), scan.max_versions);
        if matches!(scan.filter, Some(RowFilter::FirstKeyOnly)) {
            cells.truncate(1);
        }
        RowResult::new(row_key.to_vec(), cells)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("rows", &self.row_count())
            .field("multi_row_commits", &self.multi_row_commits())
            .finish()
    }
}

impl CatalogStore for MemoryStore {
    fn get(&self, get: &Get) -> CatalogResult<RowResult> {
        let data = self.data.read();
        match data.get(&get.row) {
            Some(row) => {
                let cells =
                    row.visible_cells(|f, q| get.projection.matches(f, q), get.max_versions);
                Ok(RowResult::new(get.row.clone(), cells))
            }
            None => Ok(RowResult::empty(get.row.clone())),
        }
    }

    fn put(&self, puts: &[Put]) -> CatalogResult<()> {
        let now = self.clock.now_millis();
        for put in puts {
            let mut data = self.data.write();
            Self::apply_put(&mut data, put, now);
        }
        Ok(())
    }

    fn delete(&self, deletes: &[Delete]) -> CatalogResult<()> {
        let now = self.clock.now_millis();
        for delete in deletes {
            let mut data = self.data.write();
            Self::apply_delete(&mut data, delete, now);
        }
        Ok(())
    }

    fn scan<'a>(&'a self, scan: &Scan) -> CatalogResult<RowScanner<'a>> {
        trace!(
            target: "regionmeta::storage",
            start = %scan.start_row.as_deref().map(to_string_binary).unwrap_or_default(),
            stop = %scan.stop_row.as_deref().map(to_string_binary).unwrap_or_default(),
            reversed = scan.reversed,
            "opening scanner"
        );
        Ok(Box::new(MemoryScanner::new(self, scan.clone())))
    }

    fn mutate_rows(&self, request: &MutateRowsRequest) -> CatalogResult<()> {
        // Validate before taking the lock so a rejected batch applies nothing
        for mutation in &request.mutations {
            match mutation {
                Mutation::Put(_) | Mutation::Delete(_) => {}
                other => {
                    return Err(CatalogError::DoNotRetry(format!(
                        "multi-row mutation does not support {:?}",
                        other
                    )))
                }
            }
        }
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(CatalogError::Transport(format!(
                "injected failure committing batch at {}",
                request.anchor_as_string()
            )));
        }

        let now = self.clock.now_millis();
        {
            let mut data = self.data.write();
            for mutation in &request.mutations {
                match mutation {
                    Mutation::Put(put) => Self::apply_put(&mut data, put, now),
                    Mutation::Delete(delete) => Self::apply_delete(&mut data, delete, now),
                    _ => {}
                }
            }
        }
        self.multi_row_commits.fetch_add(1, Ordering::SeqCst);
        trace!(
            target: "regionmeta::storage",
            anchor = %request.anchor_as_string(),
            mutations = request.mutations.len(),
            "applied multi-row batch"
        );
        Ok(())
    }
}

/// Lazy scanner over a [`MemoryStore`]
///
/// Holds a cursor, not a lock. Each refill reads up to `caching` rows under
/// a read lock and resumes after the last row it examined.
struct MemoryScanner<'a> {
    store: &'a MemoryStore,
    scan: Scan,
    cursor: Option<Vec<u8>>,
    buffer: VecDeque<RowResult>,
    returned: usize,
    exhausted: bool,
}

impl<'a> MemoryScanner<'a> {
    fn new(store: &'a MemoryStore, scan: Scan) -> Self {
        MemoryScanner {
            store,
            scan,
            cursor: None,
            buffer: VecDeque::new(),
            returned: 0,
            exhausted: false,
        }
    }

    fn accepts(&self, row_key: &[u8]) -> bool {
        self.scan
            .filter
            .as_ref()
            .map_or(true, |f| f.accepts_row(row_key))
    }

    fn refill(&mut self) {
        let data = self.store.data.read();
        let batch = self.scan.caching.max(1);

        let (lower, upper): (Bound<&[u8]>, Bound<&[u8]>) = if self.scan.reversed {
            let upper = match (&self.cursor, &self.scan.start_row) {
                (Some(c), _) => Bound::Excluded(c.as_slice()),
                (None, Some(s)) => Bound::Included(s.as_slice()),
                (None, None) => Bound::Unbounded,
            };
            (Bound::Unbounded, upper)
        } else {
            let lower = match (&self.cursor, &self.scan.start_row) {
                (Some(c), _) => Bound::Excluded(c.as_slice()),
                (None, Some(s)) => Bound::Included(s.as_slice()),
                (None, None) => Bound::Unbounded,
            };
            (lower, Bound::Unbounded)
        };

        let range = data.range::<[u8], _>((lower, upper));
        let rows: Box<dyn Iterator<Item = (&Vec<u8>, &RowData)> + '_> = if self.scan.reversed {
            Box::new(range.rev())
        } else {
            Box::new(range)
        };

        let mut last = None;
        let mut filled = 0;
        let mut ended = true;
        for (key, row) in rows {
            if !self.scan.in_range(key) {
                break;
            }
            if filled >= batch {
                ended = false;
                break;
            }
            last = Some(key.clone());
            if !self.accepts(key) {
                continue;
            }
            let result = MemoryStore::scan_row(key, row, &self.scan);
            if result.is_empty() {
                continue;
            }
            self.buffer.push_back(result);
            filled += 1;
        }
        if let Some(key) = last {
            self.cursor = Some(key);
        }
        self.exhausted = ended;
    }
}

impl Iterator for MemoryScanner<'_> {
    type Item = CatalogResult<RowResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.scan.limit.map_or(false, |limit| self.returned >= limit) {
            return None;
        }
        if self.buffer.is_empty() && !self.exhausted {
            self.refill();
        }
        let row = self.buffer.pop_front()?;
        self.returned += 1;
        Some(Ok(row))
    }
}
