//! Region lifecycle writes
//!
//! [`RegionLifecycleWriter`] records region creation, split, merge, state
//! and location changes, and cleanup in the catalog.
//!
//! # Atomicity
//!
//! Single-row operations (state, location, delete, table state) use plain
//! puts and deletes. Split and merge touch several rows and go through one
//! anchored multi-row commit, so readers see either the old topology or
//! the new one.
//!
//! # Timestamps
//!
//! - add / split / overwrite / table state: the writer's clock
//! - merge / delete_region_info / merge-qualifier cleanup: the store's clock
//!   at apply time
//! - overwrite: delete at `T`, re-add at `T + 1`, so the re-added cells are
//!   never masked by the delete
//! - split and merge barriers: after the parent's newest barrier version
//! - update_region_location: the caller's timestamp
//!
//! New regions are always written with state `CLOSED`, and every replica
//! `1..N-1` gets an empty assignment triple so readers can tell the replica
//! count from the default replica's row.

use tracing::{debug, info};

use regionmeta_core::bytes::to_string_binary;
use regionmeta_core::{
    CatalogError, CatalogResult, CatalogStore, Clock, Consistency, Delete, Get, Mutation, Put,
    RegionInfo, RegionState, ServerName, TableName, TableState, TableStatus, LATEST_TIMESTAMP,
};

use crate::ancestry::encode_parent_regions;
use crate::barrier::next_barrier_timestamp;
use crate::columns::{
    add_daughters, add_empty_location, add_location, add_merge_regions, add_region_info,
    add_region_state, add_replication_parent, add_sequence_num, add_target_server,
    make_delete_from_region_info, make_put_for_replication_barrier, make_put_from_region_info,
    make_put_from_table_state,
};
use crate::mutator::{anchor_row, debug_log_mutation, multi_mutate};
use crate::schema::{
    is_merge_qualifier, region_state_column, seqnum_column, server_column, server_name_column,
    startcode_column, CATALOG_FAMILY, TABLE_FAMILY, TABLE_STATE_QUALIFIER,
};

/// Writes region lifecycle transitions to the catalog
pub struct RegionLifecycleWriter<'a, S: ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: CatalogStore + ?Sized> RegionLifecycleWriter<'a, S> {
    /// Writer over `store`, stamping with `clock`
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        RegionLifecycleWriter { store, clock }
    }

    /// Apply puts, each one atomic on its own row
    pub fn put_to_catalog(&self, puts: &[Put]) -> CatalogResult<()> {
        if puts.is_empty() {
            return Ok(());
        }
        self.store.put(puts)?;
        for put in puts {
            debug_log_mutation("put", put.row(), put);
        }
        Ok(())
    }

    fn delete_from_catalog(&self, deletes: &[Delete]) -> CatalogResult<()> {
        if deletes.is_empty() {
            return Ok(());
        }
        self.store.delete(deletes)?;
        for delete in deletes {
            debug_log_mutation("delete", delete.row(), delete);
        }
        Ok(())
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Add one region with a single replica
    pub fn add_region(&self, region: &RegionInfo) -> CatalogResult<()> {
        self.add_regions(std::slice::from_ref(region), 1)
    }

    /// Add a row for each default replica in `regions`
    ///
    /// Non-default replicas are skipped; their locations live in the
    /// default replica's row.
    pub fn add_regions(&self, regions: &[RegionInfo], replica_count: u16) -> CatalogResult<()> {
        self.add_regions_at(regions, replica_count, self.clock.now_millis())
    }

    fn add_regions_at(
        &self,
        regions: &[RegionInfo],
        replica_count: u16,
        timestamp: u64,
    ) -> CatalogResult<()> {
        let mut puts = Vec::with_capacity(regions.len());
        for region in regions.iter().filter(|r| r.is_default_replica()) {
            let mut put = make_put_from_region_info(region, timestamp)?;
            add_region_state(&mut put, RegionState::Closed, 0);
            for replica_id in 1..replica_count {
                add_empty_location(&mut put, replica_id);
            }
            puts.push(put);
        }
        self.put_to_catalog(&puts)?;
        info!(target: "regionmeta::catalog", count = puts.len(), "Added regions to catalog");
        Ok(())
    }

    /// Record split daughters in the parent's row only
    pub fn add_splits_to_parent(
        &self,
        parent: &RegionInfo,
        split_a: &RegionInfo,
        split_b: &RegionInfo,
    ) -> CatalogResult<()> {
        let mut put = make_put_from_region_info(parent, self.clock.now_millis())?;
        add_daughters(&mut put, Some(split_a), Some(split_b))?;
        self.put_to_catalog(std::slice::from_ref(&put))?;
        debug!(
            target: "regionmeta::catalog",
            region = %parent.region_name_as_string(),
            "Added daughters to parent"
        );
        Ok(())
    }

    // ========================================================================
    // Split and merge
    // ========================================================================

    /// Split `parent` into two daughters in one atomic commit
    ///
    /// The parent is rewritten offline and split with pointers to both
    /// daughters. Daughters are written `CLOSED` with open sequence 1 and
    /// placeholders for replicas `1..N-1`. A `server` is recorded as the
    /// daughters' target server. When `parent_open_seq > 0` the parent gets
    /// a barrier at that sequence and each daughter a parent chain naming
    /// the parent.
    pub fn split_region(
        &self,
        parent: &RegionInfo,
        parent_open_seq: u64,
        split_a: &RegionInfo,
        split_b: &RegionInfo,
        server: Option<&ServerName>,
        replica_count: u16,
    ) -> CatalogResult<()> {
        for daughter in [split_a, split_b] {
            if daughter.table() != parent.table() {
                return Err(CatalogError::InvalidArgument(format!(
                    "daughter {} does not belong to table {}",
                    daughter.region_name_as_string(),
                    parent.table()
                )));
            }
        }

        let time = self.clock.now_millis();
        let offlined = parent.to_builder().offline(true).split(true).build()?;
        let mut put_parent = make_put_from_region_info(&offlined, time)?;
        add_daughters(&mut put_parent, Some(split_a), Some(split_b))?;

        let mut put_a = make_put_from_region_info(split_a, time)?;
        let mut put_b = make_put_from_region_info(split_b, time)?;
        let mut barrier = None;
        if parent_open_seq > 0 {
            let row = parent.for_default_replica().region_name().to_vec();
            let timestamp = next_barrier_timestamp(self.store, self.clock, &row)?;
            barrier = Some(make_put_for_replication_barrier(parent, parent_open_seq, timestamp));
            let chain = encode_parent_regions(&[parent])?;
            add_replication_parent(&mut put_a, chain.clone());
            add_replication_parent(&mut put_b, chain);
        }
        for (put, daughter) in [(&mut put_a, split_a), (&mut put_b, split_b)] {
            add_region_state(put, RegionState::Closed, 0);
            add_sequence_num(put, 1, daughter.replica_id());
            if let Some(server) = server {
                add_target_server(put, server, daughter.replica_id());
            }
            for replica_id in 1..replica_count {
                add_empty_location(put, replica_id);
            }
        }

        let mut mutations: Vec<Mutation> = vec![put_parent.into(), put_a.into(), put_b.into()];
        mutations.extend(barrier.map(Mutation::from));
        multi_mutate(self.store, &anchor_row(parent), mutations)?;
        info!(
            target: "regionmeta::catalog",
            parent = %parent.region_name_as_string(),
            split_a = %split_a.region_name_as_string(),
            split_b = %split_b.region_name_as_string(),
            "Split region"
        );
        Ok(())
    }

    /// Merge `parents` into `merged` in one atomic commit
    ///
    /// Each parent's catalog family is deleted. Parents with a known
    /// (`> 0`) open sequence get a barrier at it and are listed, in order,
    /// in the merged region's parent chain. The merged row is written
    /// `CLOSED` with `merge0000..` pointers in the given parent order, a
    /// location with open sequence 1 when `server` is given, and
    /// placeholders for replicas `1..N-1`.
    pub fn merge_regions(
        &self,
        merged: &RegionInfo,
        parents: &[(RegionInfo, u64)],
        server: Option<&ServerName>,
        replica_count: u16,
    ) -> CatalogResult<()> {
        if parents.is_empty() {
            return Err(CatalogError::InvalidArgument(format!(
                "merge into {} names no parents",
                merged.region_name_as_string()
            )));
        }

        let time = LATEST_TIMESTAMP;
        let mut mutations: Vec<Mutation> = Vec::with_capacity(parents.len() * 2 + 1);
        let mut replication_parents = Vec::new();
        for (parent, open_seq) in parents {
            mutations.push(make_delete_from_region_info(parent, time).into());
            if *open_seq > 0 {
                let row = parent.for_default_replica().region_name().to_vec();
                let timestamp = next_barrier_timestamp(self.store, self.clock, &row)?;
                mutations
                    .push(make_put_for_replication_barrier(parent, *open_seq, timestamp).into());
                replication_parents.push(parent);
            }
        }

        let mut put_merged = make_put_from_region_info(merged, time)?;
        let parent_regions: Vec<RegionInfo> = parents.iter().map(|(p, _)| p.clone()).collect();
        add_merge_regions(&mut put_merged, &parent_regions)?;
        add_region_state(&mut put_merged, RegionState::Closed, 0);
        if let Some(server) = server {
            add_location(&mut put_merged, server, 1, merged.replica_id());
        }
        for replica_id in 1..replica_count {
            add_empty_location(&mut put_merged, replica_id);
        }
        if !replication_parents.is_empty() {
            add_replication_parent(&mut put_merged, encode_parent_regions(&replication_parents)?);
        }
        mutations.push(put_merged.into());

        multi_mutate(self.store, &anchor_row(merged), mutations)?;
        info!(
            target: "regionmeta::catalog",
            merged = %merged.region_name_as_string(),
            parents = parents.len(),
            "Merged regions"
        );
        Ok(())
    }

    /// Replace the rows of `regions` with fresh `CLOSED` rows
    pub fn overwrite_regions(&self, regions: &[RegionInfo], replica_count: u16) -> CatalogResult<()> {
        let now = self.clock.now_millis();
        self.delete_region_infos_at(regions, now)?;
        self.add_regions_at(regions, replica_count, now + 1)?;
        info!(target: "regionmeta::catalog", count = regions.len(), "Overwrote regions in catalog");
        Ok(())
    }

    // ========================================================================
    // State and location
    // ========================================================================

    /// Set the lifecycle state of a region
    pub fn update_region_state(&self, region: &RegionInfo, state: RegionState) -> CatalogResult<()> {
        let mut put = Put::latest(region.for_default_replica().region_name().to_vec());
        add_region_state(&mut put, state, region.replica_id());
        self.put_to_catalog(std::slice::from_ref(&put))
    }

    /// Record where a region replica is open
    ///
    /// The put is stamped with `timestamp`, normally the coordinator's wall
    /// clock when it ordered the open.
    pub fn update_region_location(
        &self,
        region: &RegionInfo,
        server: &ServerName,
        open_seq: u64,
        timestamp: u64,
    ) -> CatalogResult<()> {
        let mut put = Put::new(region.for_default_replica().region_name().to_vec(), timestamp);
        add_region_info(&mut put, region)?;
        add_location(&mut put, server, open_seq, region.replica_id());
        self.put_to_catalog(std::slice::from_ref(&put))?;
        info!(
            target: "regionmeta::catalog",
            region = %region.region_name_as_string(),
            server = %server,
            "Updated region location"
        );
        Ok(())
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Delete a region's catalog family at the store's clock
    pub fn delete_region_info(&self, region: &RegionInfo) -> CatalogResult<()> {
        self.delete_from_catalog(&[make_delete_from_region_info(region, LATEST_TIMESTAMP)])?;
        info!(
            target: "regionmeta::catalog",
            region = %region.region_name_as_string(),
            "Deleted region from catalog"
        );
        Ok(())
    }

    /// Delete the catalog family of several regions at the writer's clock
    pub fn delete_region_infos(&self, regions: &[RegionInfo]) -> CatalogResult<()> {
        self.delete_region_infos_at(regions, self.clock.now_millis())
    }

    fn delete_region_infos_at(&self, regions: &[RegionInfo], timestamp: u64) -> CatalogResult<()> {
        let deletes: Vec<Delete> = regions
            .iter()
            .map(|region| make_delete_from_region_info(region, timestamp))
            .collect();
        self.delete_from_catalog(&deletes)?;
        info!(target: "regionmeta::catalog", count = regions.len(), "Deleted regions from catalog");
        Ok(())
    }

    /// Remove the merge pointers of a merged region
    ///
    /// The row is re-read from the primary and exactly the `merge*`
    /// qualifiers found are deleted. Returns how many were deleted; 0 means
    /// they were already gone.
    pub fn delete_merge_qualifiers(&self, merged: &RegionInfo) -> CatalogResult<usize> {
        let row = merged.for_default_replica().region_name().to_vec();
        let result = self.store.get(
            &Get::new(row.clone())
                .add_family(CATALOG_FAMILY)
                .consistency(Consistency::Strong),
        )?;
        let qualifiers: Vec<Vec<u8>> = result
            .family_latest_cells(CATALOG_FAMILY)
            .filter(|cell| is_merge_qualifier(&cell.qualifier))
            .map(|cell| cell.qualifier.clone())
            .collect();
        if qualifiers.is_empty() {
            info!(
                target: "regionmeta::catalog",
                region = %merged.region_name_as_string(),
                "No merge qualifiers in catalog, already cleaned up; skipping"
            );
            return Ok(0);
        }

        let delete = qualifiers.iter().fold(Delete::latest(row), |delete, qualifier| {
            delete.add_columns(CATALOG_FAMILY, qualifier.clone(), LATEST_TIMESTAMP)
        });
        self.delete_from_catalog(&[delete])?;
        info!(
            target: "regionmeta::catalog",
            region = %merged.region_name_as_string(),
            qualifiers = %qualifiers
                .iter()
                .map(|q| to_string_binary(q))
                .collect::<Vec<_>>()
                .join(", "),
            "Deleted merge references"
        );
        Ok(qualifiers.len())
    }

    /// Remove the assignment and state columns of replicas
    /// `from_replica..from_replica + count` from each row
    pub fn remove_region_replicas(
        &self,
        rows: &[Vec<u8>],
        from_replica: u16,
        count: u16,
    ) -> CatalogResult<()> {
        let end = u32::from(from_replica) + u32::from(count);
        let replicas: Vec<u16> = (u32::from(from_replica)..end)
            .filter_map(|r| u16::try_from(r).ok())
            .collect();
        let mut deletes = Vec::with_capacity(rows.len());
        for row in rows {
            let now = self.clock.now_millis();
            let mut delete = Delete::new(row.clone(), now);
            for &replica_id in &replicas {
                for qualifier in [
                    server_column(replica_id),
                    seqnum_column(replica_id),
                    startcode_column(replica_id),
                    server_name_column(replica_id),
                    region_state_column(replica_id),
                ] {
                    delete = delete.add_columns(CATALOG_FAMILY, qualifier, now);
                }
            }
            deletes.push(delete);
        }
        self.delete_from_catalog(&deletes)
    }

    // ========================================================================
    // Table state
    // ========================================================================

    /// Record a table's state
    pub fn update_table_state(&self, table: &TableName, status: TableStatus) -> CatalogResult<()> {
        let state = TableState::new(table.clone(), status);
        let put = make_put_from_table_state(&state, self.clock.now_millis())?;
        self.put_to_catalog(std::slice::from_ref(&put))?;
        info!(target: "regionmeta::catalog", state = %state, "Updated table state in catalog");
        Ok(())
    }

    /// Remove a table's state row
    pub fn delete_table_state(&self, table: &TableName) -> CatalogResult<()> {
        let now = self.clock.now_millis();
        let delete = Delete::new(table.as_bytes().to_vec(), now).add_columns(
            TABLE_FAMILY,
            TABLE_STATE_QUALIFIER,
            now,
        );
        self.delete_from_catalog(&[delete])?;
        info!(target: "regionmeta::catalog", table = %table, "Deleted table state from catalog");
        Ok(())
    }
}
