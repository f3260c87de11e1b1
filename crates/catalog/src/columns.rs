//! Column codec for catalog rows
//!
//! This module defines how catalog facts become cells and back:
//! - Descriptor, lifecycle state and split/merge pointers in the catalog family
//! - The per-replica assignment triple (server, start code, open sequence)
//! - Table state rows in the table family
//! - Barrier and parent-chain cells in the replication family
//!
//! Encoders push cells into a caller-owned [`Put`] so one put can carry
//! several facts. Decoders read the newest version of each column from a
//! [`RowResult`].
//!
//! A missing column decodes to `None`. So does a present-but-empty
//! assignment column, which is how an unassigned replica is recorded. A
//! column whose bytes cannot be decoded is a [`CatalogError::MalformedColumn`].

use serde::{Deserialize, Serialize};

use regionmeta_core::bytes::{bytes_to_u64, to_string_binary, u64_to_bytes};
use regionmeta_core::{
    CatalogError, CatalogResult, Cell, Delete, Put, RegionInfo, RegionLocation, RegionLocations,
    RegionState, RowResult, ServerName, TableName, TableState, TableStatus,
};

use crate::schema::{
    is_merge_qualifier, merge_qualifier, parse_replica_id_from_server_column,
    region_state_column, seqnum_column, server_column, server_name_column, startcode_column,
    CATALOG_FAMILY, MAX_MERGE_PARENTS, REGIONINFO_QUALIFIER, REPLICATION_BARRIER_FAMILY,
    REPLICATION_PARENT_QUALIFIER, SEQNUM_QUALIFIER, SPLITA_QUALIFIER, SPLITB_QUALIFIER,
    TABLE_FAMILY, TABLE_STATE_QUALIFIER,
};

/// Magic prefix of a serialized table state
const TABLE_STATE_MAGIC: &[u8; 4] = b"TBST";

fn column_name(family: &[u8], qualifier: &[u8]) -> String {
    format!("{}:{}", to_string_binary(family), to_string_binary(qualifier))
}

fn utf8_column<'a>(family: &[u8], qualifier: &[u8], value: &'a [u8]) -> CatalogResult<&'a str> {
    std::str::from_utf8(value)
        .map_err(|_| CatalogError::malformed_column(column_name(family, qualifier), "not UTF-8"))
}

fn u64_column(family: &[u8], qualifier: &[u8], value: &[u8]) -> CatalogResult<u64> {
    bytes_to_u64(value).ok_or_else(|| {
        CatalogError::malformed_column(
            column_name(family, qualifier),
            format!("expected 8 bytes, found {}", value.len()),
        )
    })
}

// ============================================================================
// Encoders
// ============================================================================

/// Write the descriptor column
///
/// The stored descriptor is always the default replica's, whichever replica
/// the caller holds.
pub fn add_region_info(put: &mut Put, region: &RegionInfo) -> CatalogResult<()> {
    let bytes = region.for_default_replica().to_bytes()?;
    put.push_column(CATALOG_FAMILY, REGIONINFO_QUALIFIER, bytes);
    Ok(())
}

/// Write the lifecycle state of a replica
pub fn add_region_state(put: &mut Put, state: RegionState, replica_id: u16) {
    put.push_column(
        CATALOG_FAMILY,
        region_state_column(replica_id),
        state.as_str().as_bytes().to_vec(),
    );
}

/// Write the assignment triple of a replica
pub fn add_location(put: &mut Put, server: &ServerName, open_seq: u64, replica_id: u16) {
    put.push_column(
        CATALOG_FAMILY,
        server_column(replica_id),
        server.address().into_bytes(),
    );
    put.push_column(
        CATALOG_FAMILY,
        startcode_column(replica_id),
        u64_to_bytes(server.start_code()),
    );
    put.push_column(CATALOG_FAMILY, seqnum_column(replica_id), u64_to_bytes(open_seq));
}

/// Write the unassigned placeholder of a replica
pub fn add_empty_location(put: &mut Put, replica_id: u16) {
    put.push_column(CATALOG_FAMILY, server_column(replica_id), Vec::new());
    put.push_column(CATALOG_FAMILY, startcode_column(replica_id), Vec::new());
    put.push_column(CATALOG_FAMILY, seqnum_column(replica_id), Vec::new());
}

/// Write only the open sequence number of a replica
pub fn add_sequence_num(put: &mut Put, open_seq: u64, replica_id: u16) {
    put.push_column(CATALOG_FAMILY, seqnum_column(replica_id), u64_to_bytes(open_seq));
}

/// Write the server a replica is moving to
pub fn add_target_server(put: &mut Put, server: &ServerName, replica_id: u16) {
    put.push_column(
        CATALOG_FAMILY,
        server_name_column(replica_id),
        server.to_string().into_bytes(),
    );
}

/// Write split daughter pointers
pub fn add_daughters(
    put: &mut Put,
    split_a: Option<&RegionInfo>,
    split_b: Option<&RegionInfo>,
) -> CatalogResult<()> {
    if let Some(a) = split_a {
        put.push_column(CATALOG_FAMILY, SPLITA_QUALIFIER, a.to_bytes()?);
    }
    if let Some(b) = split_b {
        put.push_column(CATALOG_FAMILY, SPLITB_QUALIFIER, b.to_bytes()?);
    }
    Ok(())
}

/// Write `merge0000..` pointers in the given parent order
pub fn add_merge_regions(put: &mut Put, parents: &[RegionInfo]) -> CatalogResult<()> {
    if parents.len() > MAX_MERGE_PARENTS {
        return Err(CatalogError::InvalidArgument(format!(
            "cannot record {} merge parents, at most {} are allowed",
            parents.len(),
            MAX_MERGE_PARENTS
        )));
    }
    for (index, parent) in parents.iter().enumerate() {
        put.push_column(CATALOG_FAMILY, merge_qualifier(index), parent.to_bytes()?);
    }
    Ok(())
}

/// Write one replication barrier version
pub fn add_replication_barrier(put: &mut Put, open_seq: u64) {
    put.push_column(
        REPLICATION_BARRIER_FAMILY,
        SEQNUM_QUALIFIER,
        u64_to_bytes(open_seq),
    );
}

/// Write an encoded parent chain
pub fn add_replication_parent(put: &mut Put, encoded_parents: Vec<u8>) {
    put.push_column(
        REPLICATION_BARRIER_FAMILY,
        REPLICATION_PARENT_QUALIFIER,
        encoded_parents,
    );
}

/// Put carrying the descriptor of a region, keyed by its default-replica row
pub fn make_put_from_region_info(region: &RegionInfo, timestamp: u64) -> CatalogResult<Put> {
    let mut put = Put::new(region.for_default_replica().region_name().to_vec(), timestamp);
    add_region_info(&mut put, region)?;
    Ok(put)
}

/// Delete of the catalog family of a region's row
pub fn make_delete_from_region_info(region: &RegionInfo, timestamp: u64) -> Delete {
    Delete::new(region.for_default_replica().region_name().to_vec(), timestamp)
        .add_family(CATALOG_FAMILY)
}

/// Put recording one barrier on a region's row
pub fn make_put_for_replication_barrier(
    region: &RegionInfo,
    open_seq: u64,
    timestamp: u64,
) -> Put {
    let mut put = Put::new(region.for_default_replica().region_name().to_vec(), timestamp);
    add_replication_barrier(&mut put, open_seq);
    put
}

#[derive(Serialize, Deserialize)]
struct TableStateRecord {
    table: String,
    status: TableStatus,
}

/// Serialize a table state value
pub fn encode_table_state(state: &TableState) -> CatalogResult<Vec<u8>> {
    let record = TableStateRecord {
        table: state.table.as_str().to_string(),
        status: state.status,
    };
    let mut out = TABLE_STATE_MAGIC.to_vec();
    out.extend(bincode::serialize(&record)?);
    Ok(out)
}

/// Deserialize a table state value
pub fn decode_table_state(bytes: &[u8]) -> CatalogResult<TableState> {
    let column = column_name(TABLE_FAMILY, TABLE_STATE_QUALIFIER);
    let body = bytes
        .strip_prefix(TABLE_STATE_MAGIC.as_slice())
        .ok_or_else(|| CatalogError::malformed_column(column.clone(), "no magic prefix"))?;
    let record: TableStateRecord = bincode::deserialize(body)
        .map_err(|e| CatalogError::malformed_column(column.clone(), e.to_string()))?;
    let table = TableName::new(record.table)
        .map_err(|e| CatalogError::malformed_column(column, e.to_string()))?;
    Ok(TableState::new(table, record.status))
}

/// Put writing a table's state row
pub fn make_put_from_table_state(state: &TableState, timestamp: u64) -> CatalogResult<Put> {
    Ok(Put::new(state.table.as_bytes().to_vec(), timestamp).add_column(
        TABLE_FAMILY,
        TABLE_STATE_QUALIFIER,
        encode_table_state(state)?,
    ))
}

// ============================================================================
// Decoders
// ============================================================================

/// Descriptor stored under a catalog-family qualifier
pub fn region_info(result: &RowResult, qualifier: &[u8]) -> CatalogResult<Option<RegionInfo>> {
    match result.value(CATALOG_FAMILY, qualifier) {
        None => Ok(None),
        Some(bytes) if bytes.is_empty() => Ok(None),
        Some(bytes) => RegionInfo::parse_from(bytes)
            .map(Some)
            .map_err(|e| {
                CatalogError::malformed_column(column_name(CATALOG_FAMILY, qualifier), e.to_string())
            }),
    }
}

/// Descriptor of the row's region
pub fn row_region_info(result: &RowResult) -> CatalogResult<Option<RegionInfo>> {
    region_info(result, REGIONINFO_QUALIFIER)
}

/// Lifecycle state of a replica
pub fn region_state(result: &RowResult, replica_id: u16) -> CatalogResult<Option<RegionState>> {
    let qualifier = region_state_column(replica_id);
    match result.value(CATALOG_FAMILY, &qualifier) {
        None => Ok(None),
        Some(bytes) if bytes.is_empty() => Ok(None),
        Some(bytes) => {
            let text = utf8_column(CATALOG_FAMILY, &qualifier, bytes)?;
            text.parse::<RegionState>().map(Some).map_err(|e| {
                CatalogError::malformed_column(column_name(CATALOG_FAMILY, &qualifier), e.to_string())
            })
        }
    }
}

/// Server hosting a replica; `None` when unassigned
///
/// A missing or empty start code reads as 0.
pub fn server_name(result: &RowResult, replica_id: u16) -> CatalogResult<Option<ServerName>> {
    let qualifier = server_column(replica_id);
    let address = match result.value(CATALOG_FAMILY, &qualifier) {
        Some(bytes) if !bytes.is_empty() => utf8_column(CATALOG_FAMILY, &qualifier, bytes)?,
        _ => return Ok(None),
    };
    let start_code_qualifier = startcode_column(replica_id);
    let start_code = match result.value(CATALOG_FAMILY, &start_code_qualifier) {
        Some(bytes) if !bytes.is_empty() => {
            u64_column(CATALOG_FAMILY, &start_code_qualifier, bytes)?
        }
        _ => 0,
    };
    ServerName::from_address(address, start_code)
        .map(Some)
        .map_err(|e| CatalogError::malformed_column(column_name(CATALOG_FAMILY, &qualifier), e.to_string()))
}

/// Open sequence number of a replica
pub fn seq_num_during_open(result: &RowResult, replica_id: u16) -> CatalogResult<Option<u64>> {
    let qualifier = seqnum_column(replica_id);
    match result.value(CATALOG_FAMILY, &qualifier) {
        Some(bytes) if !bytes.is_empty() => u64_column(CATALOG_FAMILY, &qualifier, bytes).map(Some),
        _ => Ok(None),
    }
}

/// Server a replica is moving to, falling back to its current server
pub fn target_server_name(result: &RowResult, replica_id: u16) -> CatalogResult<Option<ServerName>> {
    let qualifier = server_name_column(replica_id);
    match result.value(CATALOG_FAMILY, &qualifier) {
        Some(bytes) if !bytes.is_empty() => {
            let text = utf8_column(CATALOG_FAMILY, &qualifier, bytes)?;
            text.parse::<ServerName>().map(Some).map_err(|e| {
                CatalogError::malformed_column(column_name(CATALOG_FAMILY, &qualifier), e.to_string())
            })
        }
        _ => server_name(result, replica_id),
    }
}

/// Location of one replica of `region` as recorded in the row
pub fn region_location(
    result: &RowResult,
    region: &RegionInfo,
    replica_id: u16,
) -> CatalogResult<RegionLocation> {
    Ok(RegionLocation::new(
        region.for_replica(replica_id),
        server_name(result, replica_id)?,
        seq_num_during_open(result, replica_id)?,
    ))
}

/// Locations of every replica recorded in the row
///
/// Returns `None` when the row has no descriptor. Slot 0 is always filled;
/// replica slots come from the `server_XXXX` columns present in the row.
pub fn region_locations(result: &RowResult) -> CatalogResult<Option<RegionLocations>> {
    let region = match row_region_info(result)? {
        Some(region) => region,
        None => return Ok(None),
    };

    let mut slots = vec![Some(region_location(result, &region, 0)?)];
    for cell in result.family_latest_cells(CATALOG_FAMILY) {
        let replica_id = match parse_replica_id_from_server_column(&cell.qualifier) {
            Some(id) if id > 0 => id,
            _ => continue,
        };
        let index = usize::from(replica_id);
        if slots.len() <= index {
            slots.resize(index + 1, None);
        }
        let location = region_location(result, &region, replica_id)?;
        // Unassigned replicas keep an empty slot
        if location.server.is_some() {
            slots[index] = Some(location);
        }
    }
    Ok(Some(RegionLocations::new(slots)))
}

/// Split daughters recorded in a parent row
pub fn daughter_regions(
    result: &RowResult,
) -> CatalogResult<(Option<RegionInfo>, Option<RegionInfo>)> {
    Ok((
        region_info(result, SPLITA_QUALIFIER)?,
        region_info(result, SPLITB_QUALIFIER)?,
    ))
}

fn merge_cells(cells: &[Cell]) -> impl Iterator<Item = &Cell> {
    cells
        .iter()
        .filter(|c| c.family == CATALOG_FAMILY && is_merge_qualifier(&c.qualifier))
}

/// Merge parents with their qualifier names, in qualifier order
///
/// Values that do not decode are skipped.
pub fn merge_regions_with_name(cells: &[Cell]) -> Vec<(String, RegionInfo)> {
    let mut last: Option<&[u8]> = None;
    let mut parents = Vec::new();
    for cell in merge_cells(cells) {
        // Older versions follow the newest one
        if last == Some(cell.qualifier.as_slice()) {
            continue;
        }
        last = Some(cell.qualifier.as_slice());
        if let Some(region) = RegionInfo::parse_from_or_none(&cell.value) {
            parents.push((String::from_utf8_lossy(&cell.qualifier).into_owned(), region));
        }
    }
    parents
}

/// Merge parents in qualifier order
pub fn merge_regions(cells: &[Cell]) -> Vec<RegionInfo> {
    merge_regions_with_name(cells)
        .into_iter()
        .map(|(_, region)| region)
        .collect()
}

/// Whether any merge pointer is present
pub fn has_merge_regions(cells: &[Cell]) -> bool {
    merge_cells(cells).next().is_some()
}

/// Table state stored in a table-family row
pub fn table_state(result: &RowResult) -> CatalogResult<Option<TableState>> {
    match result.value(TABLE_FAMILY, TABLE_STATE_QUALIFIER) {
        None => Ok(None),
        Some(bytes) => decode_table_state(bytes).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableName {
        TableName::new("orders").unwrap()
    }

    fn region(start: &[u8], end: &[u8]) -> RegionInfo {
        RegionInfo::builder(table())
            .start_key(start.to_vec())
            .end_key(end.to_vec())
            .region_id(1_700_000_000_000)
            .build()
            .unwrap()
    }

    fn result_of(put: &Put) -> RowResult {
        let cells = put
            .cells()
            .iter()
            .map(|c| Cell::new(c.family.clone(), c.qualifier.clone(), 1, c.value.clone()))
            .collect();
        RowResult::new(put.row().to_vec(), cells)
    }

    #[test]
    fn test_region_info_always_default_replica() {
        let ri = region(b"a", b"m");
        let put = make_put_from_region_info(&ri.for_replica(2), 5).unwrap();
        assert_eq!(put.row(), ri.region_name());
        let decoded = row_region_info(&result_of(&put)).unwrap().unwrap();
        assert_eq!(decoded, ri);
    }

    #[test]
    fn test_location_roundtrip() {
        let ri = region(b"", b"");
        let server = ServerName::new("rs1.example.com", 16020, 1234);
        let mut put = make_put_from_region_info(&ri, 1).unwrap();
        add_location(&mut put, &server, 42, 0);
        let row = result_of(&put);

        assert_eq!(server_name(&row, 0).unwrap(), Some(server));
        assert_eq!(seq_num_during_open(&row, 0).unwrap(), Some(42));
        assert_eq!(server_name(&row, 1).unwrap(), None);
    }

    #[test]
    fn test_empty_placeholder_decodes_to_unassigned() {
        let ri = region(b"", b"");
        let mut put = make_put_from_region_info(&ri, 1).unwrap();
        add_empty_location(&mut put, 1);
        let row = result_of(&put);
        assert!(row.contains_column(CATALOG_FAMILY, b"server_0001"));
        assert_eq!(server_name(&row, 1).unwrap(), None);
        assert_eq!(seq_num_during_open(&row, 1).unwrap(), None);
    }

    #[test]
    fn test_region_locations_slots_from_server_columns() {
        let ri = region(b"", b"");
        let server = ServerName::new("rs2", 16020, 9);
        let mut put = make_put_from_region_info(&ri, 1).unwrap();
        add_empty_location(&mut put, 1);
        add_location(&mut put, &server, 7, 2);
        let locations = region_locations(&result_of(&put)).unwrap().unwrap();

        assert_eq!(locations.replica_count(), 3);
        let primary = locations.default_location().unwrap();
        assert_eq!(primary.region, ri);
        assert!(primary.server.is_none());
        assert!(locations.get(1).is_none());
        let replica = locations.get(2).unwrap();
        assert_eq!(replica.region, ri.for_replica(2));
        assert_eq!(replica.server.as_ref(), Some(&server));
        assert_eq!(replica.seq_num, Some(7));
    }

    #[test]
    fn test_region_locations_without_descriptor() {
        let row = RowResult::new(
            b"orders,,1".to_vec(),
            vec![Cell::new(CATALOG_FAMILY.to_vec(), b"state".to_vec(), 1, b"OPEN".to_vec())],
        );
        assert!(region_locations(&row).unwrap().is_none());
    }

    #[test]
    fn test_state_roundtrip_and_malformed() {
        let ri = region(b"", b"");
        let mut put = make_put_from_region_info(&ri, 1).unwrap();
        add_region_state(&mut put, RegionState::SplittingNew, 0);
        assert_eq!(
            region_state(&result_of(&put), 0).unwrap(),
            Some(RegionState::SplittingNew)
        );

        let bad = RowResult::new(
            b"r".to_vec(),
            vec![Cell::new(CATALOG_FAMILY.to_vec(), b"state".to_vec(), 1, b"HALF_OPEN".to_vec())],
        );
        assert!(matches!(
            region_state(&bad, 0),
            Err(CatalogError::MalformedColumn { .. })
        ));
    }

    #[test]
    fn test_malformed_sequence_number() {
        let row = RowResult::new(
            b"r".to_vec(),
            vec![Cell::new(
                CATALOG_FAMILY.to_vec(),
                b"seqnumDuringOpen".to_vec(),
                1,
                vec![1, 2, 3],
            )],
        );
        assert!(matches!(
            seq_num_during_open(&row, 0),
            Err(CatalogError::MalformedColumn { .. })
        ));
    }

    #[test]
    fn test_target_server_falls_back_to_location() {
        let ri = region(b"", b"");
        let current = ServerName::new("rs1", 1, 1);
        let target = ServerName::new("rs2", 2, 2);

        let mut put = make_put_from_region_info(&ri, 1).unwrap();
        add_location(&mut put, &current, 3, 0);
        assert_eq!(target_server_name(&result_of(&put), 0).unwrap(), Some(current));

        add_target_server(&mut put, &target, 0);
        assert_eq!(target_server_name(&result_of(&put), 0).unwrap(), Some(target));
    }

    #[test]
    fn test_daughters() {
        let parent = region(b"", b"");
        let a = region(b"", b"m");
        let b = region(b"m", b"");
        let mut put = make_put_from_region_info(&parent, 1).unwrap();
        add_daughters(&mut put, Some(&a), Some(&b)).unwrap();
        let (da, db) = daughter_regions(&result_of(&put)).unwrap();
        assert_eq!(da, Some(a));
        assert_eq!(db, Some(b));
    }

    #[test]
    fn test_merge_pointers_keep_parent_order() {
        let merged = region(b"", b"");
        let parents = vec![region(b"m", b""), region(b"", b"g"), region(b"g", b"m")];
        let mut put = make_put_from_region_info(&merged, 1).unwrap();
        add_merge_regions(&mut put, &parents).unwrap();
        let row = result_of(&put);

        assert!(has_merge_regions(row.cells()));
        let named = merge_regions_with_name(row.cells());
        let names: Vec<&str> = named.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["merge0000", "merge0001", "merge0002"]);
        assert_eq!(merge_regions(row.cells()), parents);
    }

    #[test]
    fn test_merge_pointer_limit() {
        let merged = region(b"", b"");
        let parents = vec![region(b"", b""); MAX_MERGE_PARENTS + 1];
        let mut put = make_put_from_region_info(&merged, 1).unwrap();
        assert!(matches!(
            add_merge_regions(&mut put, &parents),
            Err(CatalogError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_merge_regions_skip_undecodable() {
        let row = RowResult::new(
            b"r".to_vec(),
            vec![
                Cell::new(CATALOG_FAMILY.to_vec(), b"merge0000".to_vec(), 1, b"junk".to_vec()),
                Cell::new(
                    CATALOG_FAMILY.to_vec(),
                    b"merge0001".to_vec(),
                    1,
                    region(b"", b"").to_bytes().unwrap(),
                ),
            ],
        );
        assert!(has_merge_regions(row.cells()));
        assert_eq!(merge_regions(row.cells()).len(), 1);
    }

    #[test]
    fn test_table_state_roundtrip() {
        let state = TableState::new(table(), TableStatus::Disabling);
        let put = make_put_from_table_state(&state, 3).unwrap();
        assert_eq!(put.row(), b"orders");
        let value = put.value(TABLE_FAMILY, TABLE_STATE_QUALIFIER).unwrap();
        assert!(value.starts_with(b"TBST"));
        assert_eq!(table_state(&result_of(&put)).unwrap(), Some(state));
    }

    #[test]
    fn test_table_state_rejects_garbage() {
        assert!(matches!(
            decode_table_state(b"nope"),
            Err(CatalogError::MalformedColumn { .. })
        ));
    }

    #[test]
    fn test_delete_targets_catalog_family_of_default_row() {
        let ri = region(b"a", b"");
        let delete = make_delete_from_region_info(&ri.for_replica(1), 9);
        assert_eq!(delete.row(), ri.region_name());
        assert_eq!(delete.timestamp(), 9);
        assert!(!delete.is_row_delete());
    }
}
