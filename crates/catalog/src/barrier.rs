//! Replication barriers
//!
//! Every time a region opens with serial replication enabled, the sequence
//! number it opened at is appended as a new version of the barrier column
//! in its row. Replication replays edits of a region between consecutive
//! barriers, and a region's edits only after its parents' (split or merge
//! ancestors) edits are done, so barriers are read back as a sorted,
//! de-duplicated sequence together with the region state and parent chain.
//!
//! Barrier versions outlive the region's catalog family: a merged-away
//! parent keeps its barriers after its descriptor is deleted.

use std::fmt;

use tracing::{debug, trace};

use regionmeta_core::bytes::{bytes_to_u64, to_string_binary};
use regionmeta_core::row_key::{encode_region_name, search_row_key};
use regionmeta_core::{
    CatalogError, CatalogResult, CatalogStore, Clock, Consistency, Get, Put, RegionInfo,
    RegionState, RowFilter, RowResult, Scan, TableName,
};

use crate::ancestry::decode_parents;
use crate::columns::{self, add_replication_barrier};
use crate::config::CatalogConfig;
use crate::scanner::{table_start_row, table_stop_row, CatalogScanner, QueryKind};
use crate::schema::{
    CATALOG_FAMILY, REPLICATION_BARRIER_FAMILY, REPLICATION_PARENT_QUALIFIER, SEQNUM_QUALIFIER,
    STATE_QUALIFIER,
};

/// Barriers, state and parents of the region found for a row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplicationBarrierResult {
    /// Barriers, ascending and distinct
    pub barriers: Vec<u64>,
    /// Lifecycle state; `None` once the catalog family is gone
    pub state: Option<RegionState>,
    /// Region names of the replication parents
    pub parent_region_names: Vec<Vec<u8>>,
}

impl ReplicationBarrierResult {
    /// Result for a region with no catalog record
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether nothing was found
    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty() && self.state.is_none() && self.parent_region_names.is_empty()
    }
}

impl fmt::Display for ReplicationBarrierResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.map(|s| s.as_str()).unwrap_or("null");
        let parents: Vec<String> = self
            .parent_region_names
            .iter()
            .map(|p| to_string_binary(p))
            .collect();
        write!(
            f,
            "ReplicationBarrierResult [barriers={:?}, state={}, parentRegionNames={}]",
            self.barriers,
            state,
            parents.join(", ")
        )
    }
}

/// Every barrier version in `result`, ascending and distinct
pub fn replication_barriers(result: &RowResult) -> CatalogResult<Vec<u64>> {
    let mut barriers = result
        .column_cells(REPLICATION_BARRIER_FAMILY, SEQNUM_QUALIFIER)
        .map(|cell| {
            bytes_to_u64(&cell.value).ok_or_else(|| {
                CatalogError::malformed_column(
                    "rep_barrier:seqnumDuringOpen",
                    format!("expected 8 bytes, found {}", cell.value.len()),
                )
            })
        })
        .collect::<CatalogResult<Vec<u64>>>()?;
    barriers.sort_unstable();
    barriers.dedup();
    Ok(barriers)
}

fn barrier_result_of(result: &RowResult) -> CatalogResult<ReplicationBarrierResult> {
    let parent_region_names =
        match result.value(REPLICATION_BARRIER_FAMILY, REPLICATION_PARENT_QUALIFIER) {
            Some(bytes) => decode_parents(bytes)?,
            None => Vec::new(),
        };
    Ok(ReplicationBarrierResult {
        barriers: replication_barriers(result)?,
        state: columns::region_state(result, 0)?,
        parent_region_names,
    })
}

/// Timestamp for the next barrier version of `row`
///
/// `max(now, newest + 1)`, read from the primary. Every writer of the
/// barrier column stamps through here so no version replaces another.
pub(crate) fn next_barrier_timestamp<S: CatalogStore + ?Sized>(
    store: &S,
    clock: &dyn Clock,
    row: &[u8],
) -> CatalogResult<u64> {
    let newest = store.get(
        &Get::new(row.to_vec())
            .add_column(REPLICATION_BARRIER_FAMILY, SEQNUM_QUALIFIER)
            .consistency(Consistency::Strong),
    )?;
    let now = clock.now_millis();
    Ok(
        match newest.column_latest_cell(REPLICATION_BARRIER_FAMILY, SEQNUM_QUALIFIER) {
            Some(cell) => now.max(cell.timestamp.saturating_add(1)),
            None => now,
        },
    )
}

/// Reads and appends replication barriers
pub struct ReplicationBarrierTracker<'a, S: ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
    config: &'a CatalogConfig,
}

impl<'a, S: CatalogStore + ?Sized> ReplicationBarrierTracker<'a, S> {
    /// Tracker over `store`
    pub fn new(store: &'a S, clock: &'a dyn Clock, config: &'a CatalogConfig) -> Self {
        ReplicationBarrierTracker {
            store,
            clock,
            config,
        }
    }

    /// Append `open_seq` as a new barrier version of `region`
    ///
    /// The version is stamped after the newest existing one, so two appends
    /// within the same millisecond still land as separate versions.
    pub fn append_barrier(&self, region: &RegionInfo, open_seq: u64) -> CatalogResult<()> {
        let row = region.for_default_replica().region_name().to_vec();
        let timestamp = next_barrier_timestamp(self.store, self.clock, &row)?;
        let mut put = Put::new(row, timestamp);
        add_replication_barrier(&mut put, open_seq);
        self.store.put(std::slice::from_ref(&put))?;
        debug!(
            target: "regionmeta::barrier",
            region = %region.region_name_as_string(),
            open_seq,
            timestamp,
            "Appended replication barrier"
        );
        Ok(())
    }

    /// Every barrier of a region, ascending and distinct
    pub fn read_barriers(&self, region_name: &[u8]) -> CatalogResult<Vec<u64>> {
        let result = self.store.get(
            &Get::new(region_name.to_vec())
                .add_column(REPLICATION_BARRIER_FAMILY, SEQNUM_QUALIFIER)
                .max_versions(usize::MAX),
        )?;
        replication_barriers(&result)
    }

    /// Barriers of the region of `table` that holds `row`, if it is the
    /// region with `encoded_name`
    ///
    /// Walks the table's rows backwards from `row` down to `table,`, so
    /// regions whose start key sorts below `,` are reached too. Rows of
    /// other regions (split or merged away ones, or whatever now covers
    /// `row`) are skipped. An exhausted scan gives an empty result.
    pub fn barrier_result(
        &self,
        table: &TableName,
        row: &[u8],
        encoded_name: &str,
    ) -> CatalogResult<ReplicationBarrierResult> {
        let start = search_row_key(table, row);
        let mut stop = table.as_bytes().to_vec();
        stop.push(b',');
        trace!(
            target: "regionmeta::barrier",
            start = %to_string_binary(&start),
            stop = %to_string_binary(&stop),
            encoded_name,
            "Looking up replication barriers"
        );
        let scan = Scan::new()
            .with_start_row(start)
            .with_stop_row(stop)
            .add_column(CATALOG_FAMILY, STATE_QUALIFIER)
            .add_family(REPLICATION_BARRIER_FAMILY)
            .all_versions()
            .reversed(true)
            .with_caching(self.config.barrier_scan_caching);

        for result in self.store.scan(&scan)? {
            let result = result?;
            if encode_region_name(result.row()) != encoded_name {
                continue;
            }
            return barrier_result_of(&result);
        }
        Ok(ReplicationBarrierResult::empty())
    }

    /// `(encoded name, newest barrier)` of every region of `table` with barriers
    pub fn table_encoded_names_and_last_barrier(
        &self,
        table: &TableName,
    ) -> CatalogResult<Vec<(String, u64)>> {
        let mut list = Vec::new();
        let mut collect = |row: &RowResult| -> CatalogResult<bool> {
            let value = match row.value(REPLICATION_BARRIER_FAMILY, SEQNUM_QUALIFIER) {
                Some(value) => value,
                None => return Ok(true),
            };
            let last = bytes_to_u64(value).ok_or_else(|| {
                CatalogError::malformed_column(
                    "rep_barrier:seqnumDuringOpen",
                    format!("expected 8 bytes, found {}", value.len()),
                )
            })?;
            list.push((encode_region_name(row.row()), last));
            Ok(true)
        };
        self.scanner()
            .scan_table(Some(table), QueryKind::Replication, None, &mut collect)?;
        Ok(list)
    }

    /// Encoded names of every region of `table` with a barrier row
    pub fn table_encoded_names_for_serial_replication(
        &self,
        table: &TableName,
    ) -> CatalogResult<Vec<String>> {
        let mut list = Vec::new();
        let mut collect = |row: &RowResult| -> CatalogResult<bool> {
            list.push(encode_region_name(row.row()));
            Ok(true)
        };
        self.scanner().scan_range(
            QueryKind::Replication,
            table_start_row(Some(table), QueryKind::Replication),
            table_stop_row(Some(table), QueryKind::Replication),
            Some(RowFilter::FirstKeyOnly),
            None,
            &mut collect,
        )?;
        Ok(list)
    }

    fn scanner(&self) -> CatalogScanner<'a, S> {
        CatalogScanner::new(self.store, self.config)
    }
}
