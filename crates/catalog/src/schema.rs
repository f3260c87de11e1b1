//! Catalog column families and qualifiers
//!
//! Per-replica columns share a base qualifier. Replica 0 uses the bare
//! qualifier; replica `r > 0` appends `_` and four upper-case hex digits,
//! so `server` becomes `server_0001` for replica 1.

/// Region descriptors, state and assignment
pub const CATALOG_FAMILY: &[u8] = b"info";

/// Table state rows
pub const TABLE_FAMILY: &[u8] = b"table";

/// Replication barriers and parent chains
pub const REPLICATION_BARRIER_FAMILY: &[u8] = b"rep_barrier";

/// Serialized default-replica descriptor
pub const REGIONINFO_QUALIFIER: &[u8] = b"regioninfo";

/// Region lifecycle state
pub const STATE_QUALIFIER: &[u8] = b"state";

/// Hosting server address, `host:port`
pub const SERVER_QUALIFIER: &[u8] = b"server";

/// Hosting server start code
pub const STARTCODE_QUALIFIER: &[u8] = b"serverstartcode";

/// Sequence number at open; also the barrier qualifier in the barrier family
pub const SEQNUM_QUALIFIER: &[u8] = b"seqnumDuringOpen";

/// Server a region is transitioning to, `host,port,startcode`
pub const SERVERNAME_QUALIFIER: &[u8] = b"sn";

/// First split daughter
pub const SPLITA_QUALIFIER: &[u8] = b"splitA";

/// Second split daughter
pub const SPLITB_QUALIFIER: &[u8] = b"splitB";

/// Prefix of merge parent pointers
pub const MERGE_QUALIFIER_PREFIX: &[u8] = b"merge";

/// Table state column in the table family
pub const TABLE_STATE_QUALIFIER: &[u8] = b"state";

/// Parent chain column in the barrier family
pub const REPLICATION_PARENT_QUALIFIER: &[u8] = b"parent";

/// Most merge parents one merged row can point at (`merge0000`..`merge9999`)
pub const MAX_MERGE_PARENTS: usize = 10_000;

const REPLICA_SEPARATOR: u8 = b'_';

/// Qualifier of a per-replica column
pub fn replica_column(base: &[u8], replica_id: u16) -> Vec<u8> {
    if replica_id == 0 {
        return base.to_vec();
    }
    let mut column = Vec::with_capacity(base.len() + 5);
    column.extend_from_slice(base);
    column.push(REPLICA_SEPARATOR);
    column.extend_from_slice(format!("{:04X}", replica_id).as_bytes());
    column
}

/// `server` column of a replica
pub fn server_column(replica_id: u16) -> Vec<u8> {
    replica_column(SERVER_QUALIFIER, replica_id)
}

/// `serverstartcode` column of a replica
pub fn startcode_column(replica_id: u16) -> Vec<u8> {
    replica_column(STARTCODE_QUALIFIER, replica_id)
}

/// `seqnumDuringOpen` column of a replica
pub fn seqnum_column(replica_id: u16) -> Vec<u8> {
    replica_column(SEQNUM_QUALIFIER, replica_id)
}

/// `sn` column of a replica
pub fn server_name_column(replica_id: u16) -> Vec<u8> {
    replica_column(SERVERNAME_QUALIFIER, replica_id)
}

/// `state` column of a replica
pub fn region_state_column(replica_id: u16) -> Vec<u8> {
    replica_column(STATE_QUALIFIER, replica_id)
}

/// `mergeNNNN` qualifier for the `index`-th parent
pub fn merge_qualifier(index: usize) -> Vec<u8> {
    format!("merge{:04}", index).into_bytes()
}

/// Whether a qualifier is a merge parent pointer
pub fn is_merge_qualifier(qualifier: &[u8]) -> bool {
    qualifier.starts_with(MERGE_QUALIFIER_PREFIX)
}

/// Replica id encoded in a `server` column, `None` for any other qualifier
pub fn parse_replica_id_from_server_column(qualifier: &[u8]) -> Option<u16> {
    if qualifier == SERVER_QUALIFIER {
        return Some(0);
    }
    let suffix = qualifier.strip_prefix(SERVER_QUALIFIER)?;
    let hex = suffix.strip_prefix(&[REPLICA_SEPARATOR])?;
    if hex.len() != 4 {
        return None;
    }
    let hex = std::str::from_utf8(hex).ok()?;
    u16::from_str_radix(hex, 16).ok()
}
