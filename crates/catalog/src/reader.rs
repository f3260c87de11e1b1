//! Catalog lookups
//!
//! [`CatalogReader`] answers point lookups (one region, one table state)
//! with single-row gets and listing queries (a table's regions, every
//! table state) with catalog scans. Lookups that are handed a key which may
//! or may not be a region name classify it first and fall back to a
//! verbatim lookup instead of failing.

use tracing::info;

use regionmeta_core::bytes::to_string_binary;
use regionmeta_core::row_key::{create_region_name, search_row_key, ZEROES};
use regionmeta_core::{
    CatalogError, CatalogResult, CatalogStore, Get, RegionInfo, RegionLocation, RowFilter,
    RowKey, RowResult, ServerName, TableName, TableState, TableStatus,
};

use crate::columns;
use crate::config::CatalogConfig;
use crate::scanner::{
    table_start_row, table_stop_row, CatalogScanner, CollectRegionLocationsVisitor, QueryKind,
    Visitor,
};
use crate::schema::{CATALOG_FAMILY, TABLE_FAMILY, TABLE_STATE_QUALIFIER};

/// Reads region and table records from the catalog
pub struct CatalogReader<'a, S: ?Sized> {
    store: &'a S,
    config: &'a CatalogConfig,
}

impl<'a, S: CatalogStore + ?Sized> CatalogReader<'a, S> {
    /// Reader over `store`
    pub fn new(store: &'a S, config: &'a CatalogConfig) -> Self {
        CatalogReader { store, config }
    }

    fn scanner(&self) -> CatalogScanner<'a, S> {
        CatalogScanner::new(self.store, self.config)
    }

    fn catalog_family_get(&self, row: Vec<u8>) -> CatalogResult<RowResult> {
        self.store.get(&Get::new(row).add_family(CATALOG_FAMILY))
    }

    // ========================================================================
    // Point lookups
    // ========================================================================

    /// Location of the region named `region_name`
    ///
    /// Replica names resolve through their default replica's row. A key
    /// that is not a region name (a bare table name, say) is looked up as
    /// is and answers for replica 0.
    pub fn region_location(&self, region_name: &[u8]) -> CatalogResult<Option<RegionLocation>> {
        let (row, replica_id) = match RowKey::classify(region_name) {
            RowKey::Region(parts) => (
                create_region_name(
                    &parts.table,
                    &parts.start_key,
                    parts.region_id.to_string().as_bytes(),
                    0,
                    true,
                ),
                parts.replica_id,
            ),
            RowKey::NotRegion => (region_name.to_vec(), 0),
        };
        let result = self.catalog_family_get(row)?;
        Ok(columns::region_locations(&result)?
            .and_then(|locations| locations.get(replica_id).cloned()))
    }

    /// Location of `region`'s own replica
    pub fn region_location_for(&self, region: &RegionInfo) -> CatalogResult<RegionLocation> {
        let result = self.catalog_family_row(region)?;
        columns::region_location(&result, region, region.replica_id())
    }

    /// Catalog family of the row that holds `region`
    pub fn catalog_family_row(&self, region: &RegionInfo) -> CatalogResult<RowResult> {
        self.catalog_family_get(region.for_default_replica().region_name().to_vec())
    }

    /// Catalog family of the row keyed exactly by `region_name`
    pub fn region_result(&self, region_name: &[u8]) -> CatalogResult<RowResult> {
        self.catalog_family_get(region_name.to_vec())
    }

    /// First row whose key contains `encoded_name`
    pub fn scan_by_encoded_name(&self, encoded_name: &str) -> CatalogResult<Option<RowResult>> {
        let scanner = self.scanner();
        let scan = scanner.build_scan(
            QueryKind::All,
            None,
            None,
            Some(RowFilter::RowContains(encoded_name.as_bytes().to_vec())),
            Some(1),
        );
        scanner.open(&scan)?.next().transpose()
    }

    /// Merge parents recorded in the row `region_name`
    pub fn merge_regions(&self, region_name: &[u8]) -> CatalogResult<Vec<RegionInfo>> {
        Ok(columns::merge_regions(self.region_result(region_name)?.cells()))
    }

    /// Merge parents recorded in the row `region_name`, by qualifier
    pub fn merge_regions_with_name(
        &self,
        region_name: &[u8],
    ) -> CatalogResult<Vec<(String, RegionInfo)>> {
        Ok(columns::merge_regions_with_name(
            self.region_result(region_name)?.cells(),
        ))
    }

    /// Whether the row `region_name` still has merge pointers
    pub fn has_merge_regions(&self, region_name: &[u8]) -> CatalogResult<bool> {
        Ok(columns::has_merge_regions(
            self.region_result(region_name)?.cells(),
        ))
    }

    /// Split daughters recorded in the row `region_name`
    pub fn daughter_regions(
        &self,
        region_name: &[u8],
    ) -> CatalogResult<(Option<RegionInfo>, Option<RegionInfo>)> {
        columns::daughter_regions(&self.region_result(region_name)?)
    }

    /// Server a replica of the row `region_name` is moving to
    pub fn target_server_name(
        &self,
        region_name: &[u8],
        replica_id: u16,
    ) -> CatalogResult<Option<ServerName>> {
        columns::target_server_name(&self.region_result(region_name)?, replica_id)
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Whether `table` has a state row; the catalog table always exists
    pub fn table_exists(&self, table: &TableName) -> CatalogResult<bool> {
        Ok(table.is_catalog() || self.table_state(table)?.is_some())
    }

    /// State of `table`; the catalog table is always enabled
    pub fn table_state(&self, table: &TableName) -> CatalogResult<Option<TableState>> {
        if table.is_catalog() {
            return Ok(Some(TableState::new(table.clone(), TableStatus::Enabled)));
        }
        let result = self.store.get(
            &Get::new(table.as_bytes().to_vec()).add_column(TABLE_FAMILY, TABLE_STATE_QUALIFIER),
        )?;
        columns::table_state(&result)
    }

    /// Every recorded table state, in table order
    pub fn table_states(&self) -> CatalogResult<Vec<TableState>> {
        let mut states = Vec::new();
        for row in self.scanner().rows(None, QueryKind::Table, None)? {
            if let Some(state) = columns::table_state(&row?)? {
                states.push(state);
            }
        }
        Ok(states)
    }

    // ========================================================================
    // Region listings
    // ========================================================================

    /// Every region of every table
    pub fn all_regions(&self, exclude_split_parents: bool) -> CatalogResult<Vec<RegionInfo>> {
        Ok(self
            .table_regions_and_locations(None, exclude_split_parents)?
            .into_iter()
            .map(|(region, _)| region)
            .collect())
    }

    /// Regions of `table`, in start key order
    pub fn table_regions(
        &self,
        table: &TableName,
        exclude_split_parents: bool,
    ) -> CatalogResult<Vec<RegionInfo>> {
        Ok(self
            .table_regions_and_locations(Some(table), exclude_split_parents)?
            .into_iter()
            .map(|(region, _)| region)
            .collect())
    }

    /// `(region, server)` for every replica of `table`, or of every table
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for the catalog table, which does not describe
    /// its own regions.
    pub fn table_regions_and_locations(
        &self,
        table: Option<&TableName>,
        exclude_split_parents: bool,
    ) -> CatalogResult<Vec<(RegionInfo, Option<ServerName>)>> {
        if table.map_or(false, TableName::is_catalog) {
            return Err(CatalogError::InvalidArgument(
                "the catalog table cannot list its own regions".to_string(),
            ));
        }
        let mut visitor = CollectRegionLocationsVisitor::new(exclude_split_parents);
        self.scanner()
            .scan_table(table, QueryKind::Region, None, &mut visitor)?;
        Ok(visitor.into_results())
    }

    /// Number of serving region replicas of `table`
    pub fn region_count(&self, table: &TableName) -> CatalogResult<usize> {
        Ok(self.table_regions_and_locations(Some(table), true)?.len())
    }

    // ========================================================================
    // Scans
    // ========================================================================

    /// Every non-empty region row
    pub fn full_scan_regions(&self) -> CatalogResult<Vec<RowResult>> {
        self.scanner().full_scan(QueryKind::Region)
    }

    /// Every non-empty table state row
    pub fn full_scan_tables(&self) -> CatalogResult<Vec<RowResult>> {
        self.scanner().full_scan(QueryKind::Table)
    }

    /// Drive `visitor` over the region rows of `table`
    pub fn scan_table_regions(
        &self,
        visitor: &mut dyn Visitor,
        table: &TableName,
    ) -> CatalogResult<()> {
        self.scanner()
            .scan_table(Some(table), QueryKind::Region, None, visitor)
    }

    /// Drive `visitor` over region rows of `table`, starting at the region
    /// that contains `row`
    ///
    /// Without a table the whole catalog is scanned and `row` is ignored.
    ///
    /// # Errors
    ///
    /// `TableNotFound` when `table` has no region at or before `row`.
    pub fn scan_from_row(
        &self,
        visitor: &mut dyn Visitor,
        table: Option<&TableName>,
        row: Option<&[u8]>,
        max_rows: Option<usize>,
    ) -> CatalogResult<()> {
        let mut start_row = table_start_row(table, QueryKind::Region);
        if let (Some(table), Some(row)) = (table, row) {
            let closest = self.closest_region_info(table, row)?;
            start_row = Some(create_region_name(
                table,
                closest.start_key(),
                ZEROES,
                0,
                false,
            ));
        }
        let stop_row = table_stop_row(table, QueryKind::Region);
        self.scanner()
            .scan_range(QueryKind::Region, start_row, stop_row, None, max_rows, visitor)
    }

    /// Region of `table` whose row sorts closest at or before `row`
    pub fn closest_region_info(&self, table: &TableName, row: &[u8]) -> CatalogResult<RegionInfo> {
        let scanner = self.scanner();
        let scan = scanner
            .build_scan(
                QueryKind::Region,
                Some(search_row_key(table, row)),
                table_start_row(Some(table), QueryKind::Region),
                None,
                Some(1),
            )
            .reversed(true);
        let result = match scanner.open(&scan)?.next().transpose()? {
            Some(result) => result,
            None => {
                return Err(CatalogError::TableNotFound(format!(
                    "no catalog row for table {}, row={}",
                    table,
                    to_string_binary(row)
                )))
            }
        };
        columns::row_region_info(&result)?.ok_or_else(|| {
            CatalogError::NotFound(format!(
                "region descriptor for table {}, row={}",
                table,
                to_string_binary(row)
            ))
        })
    }

    /// Log every catalog row at info level
    pub fn log_full_scan(&self) -> CatalogResult<()> {
        let mut print = |row: &RowResult| -> CatalogResult<bool> {
            info!(
                target: "regionmeta::catalog",
                row = %to_string_binary(row.row()),
                cells = row.cells().len(),
                "Current catalog row"
            );
            if let Some(state) = columns::table_state(row)? {
                info!(target: "regionmeta::catalog", state = %state, "Table state");
                return Ok(true);
            }
            if let Some(locations) = columns::region_locations(row)? {
                for location in locations.iter() {
                    info!(
                        target: "regionmeta::catalog",
                        region = %location.region.region_name_as_string(),
                        server = ?location.server.as_ref().map(ToString::to_string),
                        "Region"
                    );
                }
            }
            Ok(true)
        };
        self.scanner()
            .scan_table(None, QueryKind::All, None, &mut print)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::RegionLifecycleWriter;
    use regionmeta_core::ManualClock;
    use regionmeta_storage::MemoryStore;

    fn table(name: &str) -> TableName {
        TableName::new(name).unwrap()
    }

    fn region(t: &str, start: &[u8], end: &[u8], id: u64) -> RegionInfo {
        RegionInfo::builder(table(t))
            .start_key(start.to_vec())
            .end_key(end.to_vec())
            .region_id(id)
            .build()
            .unwrap()
    }

    fn server(host: &str) -> ServerName {
        ServerName::new(host, 16020, 1_000)
    }

    struct Fixture {
        store: MemoryStore,
        clock: ManualClock,
        config: CatalogConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                store: MemoryStore::new(),
                clock: ManualClock::new(1_000),
                config: CatalogConfig::default(),
            }
        }

        fn writer(&self) -> RegionLifecycleWriter<'_, MemoryStore> {
            RegionLifecycleWriter::new(&self.store, &self.clock)
        }

        fn reader(&self) -> CatalogReader<'_, MemoryStore> {
            CatalogReader::new(&self.store, &self.config)
        }
    }

    #[test]
    fn test_region_location_resolves_replica_names() {
        let fx = Fixture::new();
        let ri = region("t1", b"", b"m", 7);
        fx.writer().add_regions(&[ri.clone()], 2).unwrap();
        fx.writer()
            .update_region_location(&ri.for_replica(1), &server("r1"), 5, 2_000)
            .unwrap();

        let replica = fx
            .reader()
            .region_location(ri.for_replica(1).region_name())
            .unwrap()
            .unwrap();
        assert_eq!(replica.server, Some(server("r1")));
        assert_eq!(replica.seq_num, Some(5));
        assert_eq!(replica.region.replica_id(), 1);

        let default = fx.reader().region_location(ri.region_name()).unwrap().unwrap();
        assert_eq!(default.server, None);
    }

    #[test]
    fn test_region_location_falls_back_for_non_region_keys() {
        let fx = Fixture::new();
        assert_eq!(fx.reader().region_location(b"t1").unwrap(), None);
        assert_eq!(fx.reader().region_location(b"garbage,,").unwrap(), None);
    }

    #[test]
    fn test_scan_by_encoded_name() {
        let fx = Fixture::new();
        let a = region("t1", b"", b"m", 1);
        let b = region("t1", b"m", b"", 1);
        fx.writer().add_regions(&[a, b.clone()], 1).unwrap();

        let found = fx.reader().scan_by_encoded_name(b.encoded_name()).unwrap().unwrap();
        assert_eq!(found.row(), b.region_name());
        assert!(fx.reader().scan_by_encoded_name("nope").unwrap().is_none());
    }

    #[test]
    fn test_table_state_and_existence() {
        let fx = Fixture::new();
        let t1 = table("t1");
        assert!(!fx.reader().table_exists(&t1).unwrap());
        assert!(fx.reader().table_exists(&TableName::catalog()).unwrap());
        assert_eq!(
            fx.reader().table_state(&TableName::catalog()).unwrap().unwrap().status,
            TableStatus::Enabled
        );

        fx.writer().update_table_state(&t1, TableStatus::Disabled).unwrap();
        fx.writer()
            .update_table_state(&table("t0"), TableStatus::Enabled)
            .unwrap();
        assert!(fx.reader().table_exists(&t1).unwrap());
        assert_eq!(
            fx.reader().table_state(&t1).unwrap().unwrap().status,
            TableStatus::Disabled
        );

        let states = fx.reader().table_states().unwrap();
        let names: Vec<&str> = states.iter().map(|s| s.table.as_str()).collect();
        assert_eq!(names, vec!["t0", "t1"]);
    }

    #[test]
    fn test_table_regions_exclude_split_parents() {
        let fx = Fixture::new();
        let parent = region("t1", b"", b"", 1);
        fx.writer().add_regions(&[parent.clone()], 1).unwrap();
        fx.writer()
            .add_regions(&[region("t2", b"", b"", 1)], 1)
            .unwrap();

        let a = region("t1", b"", b"m", 2);
        let b = region("t1", b"m", b"", 2);
        fx.writer().split_region(&parent, 10, &a, &b, None, 1).unwrap();

        let all = fx.reader().table_regions(&table("t1"), false).unwrap();
        assert_eq!(all.len(), 3);
        let serving = fx.reader().table_regions(&table("t1"), true).unwrap();
        assert_eq!(serving, vec![a.clone(), b.clone()]);
        assert_eq!(fx.reader().all_regions(true).unwrap().len(), 3);
        assert_eq!(fx.reader().region_count(&table("t1")).unwrap(), 2);
    }

    #[test]
    fn test_catalog_table_listing_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .reader()
            .table_regions_and_locations(Some(&TableName::catalog()), false)
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn test_closest_region_info() {
        let fx = Fixture::new();
        let a = region("t1", b"", b"g", 1);
        let b = region("t1", b"g", b"p", 1);
        let c = region("t1", b"p", b"", 1);
        fx.writer().add_regions(&[a.clone(), b.clone(), c.clone()], 1).unwrap();
        fx.writer().add_regions(&[region("t2", b"", b"", 1)], 1).unwrap();

        assert_eq!(fx.reader().closest_region_info(&table("t1"), b"a").unwrap(), a);
        assert_eq!(fx.reader().closest_region_info(&table("t1"), b"g").unwrap(), b);
        assert_eq!(fx.reader().closest_region_info(&table("t1"), b"zz").unwrap(), c);

        let err = fx.reader().closest_region_info(&table("t0"), b"a").unwrap_err();
        assert!(matches!(err, CatalogError::TableNotFound(_)));
    }

    #[test]
    fn test_scan_from_row_starts_at_containing_region() {
        let fx = Fixture::new();
        let a = region("t1", b"", b"g", 1);
        let b = region("t1", b"g", b"p", 1);
        let c = region("t1", b"p", b"", 1);
        fx.writer().add_regions(&[a, b.clone(), c.clone()], 1).unwrap();

        let mut seen = Vec::new();
        let mut collect = |row: &RowResult| -> CatalogResult<bool> {
            seen.push(row.row().to_vec());
            Ok(true)
        };
        fx.reader()
            .scan_from_row(&mut collect, Some(&table("t1")), Some(b"h"), None)
            .unwrap();
        assert_eq!(seen, vec![b.region_name().to_vec(), c.region_name().to_vec()]);
    }

    #[test]
    fn test_daughters_and_target_server() {
        let fx = Fixture::new();
        let parent = region("t1", b"", b"", 1);
        let a = region("t1", b"", b"m", 2);
        let b = region("t1", b"m", b"", 2);
        fx.writer().add_regions(&[parent.clone()], 1).unwrap();
        fx.writer()
            .split_region(&parent, 10, &a, &b, Some(&server("dst")), 1)
            .unwrap();

        let (da, db) = fx.reader().daughter_regions(parent.region_name()).unwrap();
        assert_eq!(da, Some(a.clone()));
        assert_eq!(db, Some(b));
        assert_eq!(
            fx.reader().target_server_name(a.region_name(), 0).unwrap(),
            Some(server("dst"))
        );
        assert!(!fx.reader().has_merge_regions(a.region_name()).unwrap());
    }

    #[test]
    fn test_log_full_scan_visits_everything() {
        let fx = Fixture::new();
        fx.writer().add_regions(&[region("t1", b"", b"", 1)], 2).unwrap();
        fx.writer().update_table_state(&table("t1"), TableStatus::Enabled).unwrap();
        fx.reader().log_full_scan().unwrap();
    }
}
