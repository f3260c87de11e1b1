//! Catalog scans
//!
//! This module defines:
//! - QueryKind: which part of the catalog a scan reads
//! - Start/stop rows that confine a scan to one table
//! - CatalogRows: a lazy, finite sequence of non-empty catalog rows
//! - Visitor: push-style consumer driven over [`CatalogRows`]
//! - CatalogScanner: builds scans from configuration and drives visitors
//!
//! Rows are pulled from the store in batches of `scanner_caching`. A
//! consumer that stops pulling ends the scan; nothing is read ahead beyond
//! the current batch.

use tracing::{debug, trace};

use regionmeta_core::bytes::to_string_binary;
use regionmeta_core::{
    CatalogResult, CatalogStore, Consistency, ReadType, RegionInfo, RowFilter, RowResult,
    RowScanner, Scan, ServerName, TableName,
};

use crate::columns;
use crate::config::CatalogConfig;
use crate::schema::{CATALOG_FAMILY, REPLICATION_BARRIER_FAMILY, TABLE_FAMILY};

/// Part of the catalog a scan reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Region rows, catalog family
    Region,
    /// Table state rows, table family
    Table,
    /// Replication barriers and parent chains
    Replication,
    /// Region rows and table state rows
    All,
}

impl QueryKind {
    /// Families the scan projects
    pub fn families(self) -> &'static [&'static [u8]] {
        match self {
            QueryKind::Region => &[CATALOG_FAMILY],
            QueryKind::Table => &[TABLE_FAMILY],
            QueryKind::Replication => &[REPLICATION_BARRIER_FAMILY],
            QueryKind::All => &[CATALOG_FAMILY, TABLE_FAMILY],
        }
    }
}

/// First row of `table` for a scan of `kind`
///
/// Region-keyed kinds start after `table,`; kinds that include the table
/// state row start at the bare table name. No table means unbounded.
pub fn table_start_row(table: Option<&TableName>, kind: QueryKind) -> Option<Vec<u8>> {
    let table = table?;
    let mut row = table.as_bytes().to_vec();
    match kind {
        QueryKind::Region | QueryKind::Replication => row.push(b','),
        QueryKind::Table | QueryKind::All => {}
    }
    Some(row)
}

/// Exclusive stop row of `table` for a scan of `kind`
///
/// `-` is the byte after `,`, so `table-` sorts after every row of `table`.
pub fn table_stop_row(table: Option<&TableName>, _kind: QueryKind) -> Option<Vec<u8>> {
    let mut row = table?.as_bytes().to_vec();
    row.push(b'-');
    Some(row)
}

/// Consumer of catalog rows
///
/// `visit` returns `false` to stop the scan. `close` runs once after the
/// scan ends, however it ends; its failures are logged and dropped.
pub trait Visitor {
    /// Handle one non-empty row
    fn visit(&mut self, row: &RowResult) -> CatalogResult<bool>;

    /// Release whatever the visitor holds
    fn close(&mut self) -> CatalogResult<()> {
        Ok(())
    }
}

impl<F> Visitor for F
where
    F: FnMut(&RowResult) -> CatalogResult<bool>,
{
    fn visit(&mut self, row: &RowResult) -> CatalogResult<bool> {
        self(row)
    }
}

/// Lazy sequence of non-empty catalog rows with an optional row cap
pub struct CatalogRows<'a> {
    inner: RowScanner<'a>,
    remaining: Option<usize>,
}

impl<'a> CatalogRows<'a> {
    /// Wrap a store scanner
    pub fn new(inner: RowScanner<'a>, max_rows: Option<usize>) -> Self {
        CatalogRows {
            inner,
            remaining: max_rows,
        }
    }
}

impl Iterator for CatalogRows<'_> {
    type Item = CatalogResult<RowResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        loop {
            match self.inner.next()? {
                Ok(row) if row.is_empty() => continue,
                Ok(row) => {
                    if let Some(remaining) = self.remaining.as_mut() {
                        *remaining -= 1;
                    }
                    return Some(Ok(row));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Drive `visitor` over `rows`, then close it
fn drive(rows: CatalogRows<'_>, visitor: &mut dyn Visitor) -> CatalogResult<()> {
    let mut outcome = Ok(());
    for row in rows {
        let keep_going = row.and_then(|row| visitor.visit(&row));
        match keep_going {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }
    if let Err(e) = visitor.close() {
        debug!(target: "regionmeta::scan", error = %e, "Got error in closing the catalog scan visitor");
    }
    outcome
}

/// Builds catalog scans and drives visitors over them
pub struct CatalogScanner<'a, S: ?Sized> {
    store: &'a S,
    config: &'a CatalogConfig,
}

impl<'a, S: CatalogStore + ?Sized> CatalogScanner<'a, S> {
    /// Scanner over `store`
    pub fn new(store: &'a S, config: &'a CatalogConfig) -> Self {
        CatalogScanner { store, config }
    }

    /// Scan of `kind` between two rows
    ///
    /// A row cap limits the scan and hints a positional read. Timeline
    /// consistency is used when configured.
    pub fn build_scan(
        &self,
        kind: QueryKind,
        start_row: Option<Vec<u8>>,
        stop_row: Option<Vec<u8>>,
        filter: Option<RowFilter>,
        max_rows: Option<usize>,
    ) -> Scan {
        let mut scan = Scan::new().with_caching(self.config.scanner_caching);
        if self.config.use_timeline_reads {
            scan = scan.with_consistency(Consistency::Timeline);
        }
        if let Some(limit) = max_rows {
            scan = scan.with_limit(limit).with_read_type(ReadType::Pread);
        }
        for family in kind.families() {
            scan = scan.add_family(*family);
        }
        if let Some(start) = start_row {
            scan = scan.with_start_row(start);
        }
        if let Some(stop) = stop_row {
            scan = scan.with_stop_row(stop);
        }
        if let Some(filter) = filter {
            scan = scan.with_filter(filter);
        }
        scan
    }

    /// Open a scan as a lazy row sequence
    pub fn open(&self, scan: &Scan) -> CatalogResult<CatalogRows<'a>> {
        trace!(
            target: "regionmeta::scan",
            start = %scan.start_row.as_deref().map(to_string_binary).unwrap_or_default(),
            stop = %scan.stop_row.as_deref().map(to_string_binary).unwrap_or_default(),
            max = ?scan.limit,
            caching = scan.caching,
            "Scanning catalog"
        );
        Ok(CatalogRows::new(self.store.scan(scan)?, scan.limit))
    }

    /// Rows of `kind` for one table, or the whole catalog
    pub fn rows(
        &self,
        table: Option<&TableName>,
        kind: QueryKind,
        max_rows: Option<usize>,
    ) -> CatalogResult<CatalogRows<'a>> {
        let scan = self.build_scan(
            kind,
            table_start_row(table, kind),
            table_stop_row(table, kind),
            None,
            max_rows,
        );
        self.open(&scan)
    }

    /// Drive `visitor` over rows of `kind` between two rows
    pub fn scan_range(
        &self,
        kind: QueryKind,
        start_row: Option<Vec<u8>>,
        stop_row: Option<Vec<u8>>,
        filter: Option<RowFilter>,
        max_rows: Option<usize>,
        visitor: &mut dyn Visitor,
    ) -> CatalogResult<()> {
        let scan = self.build_scan(kind, start_row, stop_row, filter, max_rows);
        drive(self.open(&scan)?, visitor)
    }

    /// Drive `visitor` over rows of `kind` for one table, or the whole catalog
    pub fn scan_table(
        &self,
        table: Option<&TableName>,
        kind: QueryKind,
        max_rows: Option<usize>,
        visitor: &mut dyn Visitor,
    ) -> CatalogResult<()> {
        drive(self.rows(table, kind, max_rows)?, visitor)
    }

    /// Every non-empty row of `kind`
    pub fn full_scan(&self, kind: QueryKind) -> CatalogResult<Vec<RowResult>> {
        self.rows(None, kind, None)?.collect()
    }
}

/// Collects every row it visits
#[derive(Debug, Default)]
pub struct CollectAllVisitor {
    rows: Vec<RowResult>,
}

impl CollectAllVisitor {
    /// Collected rows, in scan order
    pub fn into_rows(self) -> Vec<RowResult> {
        self.rows
    }
}

impl Visitor for CollectAllVisitor {
    fn visit(&mut self, row: &RowResult) -> CatalogResult<bool> {
        self.rows.push(row.clone());
        Ok(true)
    }
}

/// Collects `(region, server)` for every replica location of every row
#[derive(Debug)]
pub struct CollectRegionLocationsVisitor {
    exclude_split_parents: bool,
    results: Vec<(RegionInfo, Option<ServerName>)>,
}

impl CollectRegionLocationsVisitor {
    /// Visitor optionally skipping offlined split parents
    pub fn new(exclude_split_parents: bool) -> Self {
        CollectRegionLocationsVisitor {
            exclude_split_parents,
            results: Vec::new(),
        }
    }

    /// Collected pairs, in scan order
    pub fn into_results(self) -> Vec<(RegionInfo, Option<ServerName>)> {
        self.results
    }
}

impl Visitor for CollectRegionLocationsVisitor {
    fn visit(&mut self, row: &RowResult) -> CatalogResult<bool> {
        let locations = match columns::region_locations(row)? {
            Some(locations) => locations,
            None => return Ok(true),
        };
        for location in locations.iter() {
            if self.exclude_split_parents && location.region.is_split_parent() {
                continue;
            }
            self.results
                .push((location.region.clone(), location.server.clone()));
        }
        Ok(true)
    }
}
