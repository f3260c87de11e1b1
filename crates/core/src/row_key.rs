//! Catalog row keys
//!
//! A region's name doubles as its catalog row key:
//!
//! ```text
//! <table>,<start key>,<region id>[_<replica hex>].<encoded name>.
//! ```
//!
//! The encoded name is a 32 character hex digest of everything before the
//! first `.`, giving each region a short, stable identifier that ancestry
//! columns and replication bookkeeping refer to.
//!
//! Only the default replica owns a row. Replica-qualified names still parse,
//! so a lookup keyed by a replica's name can be redirected to the default
//! replica's row.
//!
//! Lookups frequently receive keys that are not region names at all (a bare
//! table name, for instance). [`RowKey::classify`] makes that fallback an
//! explicit branch instead of a swallowed parse error.

use xxhash_rust::xxh3::xxh3_128;

use crate::bytes::to_string_binary;
use crate::error::{CatalogError, CatalogResult};
use crate::types::TableName;

/// Separates table, start key and region id
pub const DELIMITER: u8 = b',';

/// Surrounds the encoded name at the end of a region name
pub const ENC_SEPARATOR: u8 = b'.';

/// Separates the region id from the replica id
pub const REPLICA_ID_DELIMITER: u8 = b'_';

/// Length of an encoded region name
pub const ENCODED_NAME_LEN: usize = 32;

/// Region id that sorts after every real region id
pub const NINES: &[u8] = b"99999999999999";

/// Smallest region id, for forward scans that start at a start key
pub const ZEROES: &[u8] = b"00000000000000";

/// Replica id of the region that owns the catalog row
pub const DEFAULT_REPLICA_ID: u16 = 0;

/// Hex digest used for encoded names
pub fn hash_hex(bytes: &[u8]) -> String {
    format!("{:032x}", xxh3_128(bytes))
}

/// Build a region name
///
/// `new_format` appends the `.<encoded>.` suffix; search keys used for
/// reverse scans omit it.
pub fn create_region_name(
    table: &TableName,
    start_key: &[u8],
    id: &[u8],
    replica_id: u16,
    new_format: bool,
) -> Vec<u8> {
    let mut name = Vec::with_capacity(
        table.as_bytes().len() + start_key.len() + id.len() + ENCODED_NAME_LEN + 9,
    );
    name.extend_from_slice(table.as_bytes());
    name.push(DELIMITER);
    name.extend_from_slice(start_key);
    name.push(DELIMITER);
    name.extend_from_slice(id);
    if replica_id > DEFAULT_REPLICA_ID {
        name.push(REPLICA_ID_DELIMITER);
        name.extend_from_slice(format!("{:04X}", replica_id).as_bytes());
    }
    if new_format {
        let encoded = hash_hex(&name);
        name.push(ENC_SEPARATOR);
        name.extend_from_slice(encoded.as_bytes());
        name.push(ENC_SEPARATOR);
    }
    name
}

/// Key that a reverse scan starts from to find the region containing `row`
pub fn search_row_key(table: &TableName, row: &[u8]) -> Vec<u8> {
    create_region_name(table, row, NINES, DEFAULT_REPLICA_ID, false)
}

/// Position of the opening `.` of an encoded-name suffix, if present
fn encoded_suffix_start(name: &[u8]) -> Option<usize> {
    let len = name.len();
    if len > ENCODED_NAME_LEN + 2
        && name[len - 1] == ENC_SEPARATOR
        && name[len - ENCODED_NAME_LEN - 2] == ENC_SEPARATOR
    {
        Some(len - ENCODED_NAME_LEN - 2)
    } else {
        None
    }
}

/// Encoded name of an arbitrary row key
///
/// Region names carry their encoded name; any other key is hashed whole.
pub fn encode_region_name(name: &[u8]) -> String {
    match encoded_suffix_start(name) {
        Some(start) => String::from_utf8_lossy(&name[start + 1..name.len() - 1]).into_owned(),
        None => hash_hex(name),
    }
}

/// Identity fields recovered from a region name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionNameParts {
    /// Owning table
    pub table: TableName,
    /// Inclusive start key
    pub start_key: Vec<u8>,
    /// Creation timestamp / region id
    pub region_id: u64,
    /// Replica index
    pub replica_id: u16,
    /// Encoded name, when the key carried one
    pub encoded_name: Option<String>,
}

/// Parse a region name back into its identity fields
///
/// The start key may itself contain `,`, so the region id delimiter is
/// searched from the end.
pub fn parse_region_name(name: &[u8]) -> CatalogResult<RegionNameParts> {
    let first = name
        .iter()
        .position(|b| *b == DELIMITER)
        .ok_or_else(|| CatalogError::malformed_row_key(name, "no table delimiter"))?;
    let table = TableName::from_bytes(&name[..first])
        .map_err(|e| CatalogError::malformed_row_key(name, e.to_string()))?;

    let (end, encoded_name) = match encoded_suffix_start(name) {
        Some(start) => (
            start,
            Some(String::from_utf8_lossy(&name[start + 1..name.len() - 1]).into_owned()),
        ),
        None => (name.len(), None),
    };

    let last = (first + 1..end)
        .rev()
        .find(|i| name[*i] == DELIMITER)
        .ok_or_else(|| CatalogError::malformed_row_key(name, "no region id delimiter"))?;

    let start_key = name[first + 1..last].to_vec();
    let id_part = &name[last + 1..end];
    let (id, replica) = match id_part.iter().position(|b| *b == REPLICA_ID_DELIMITER) {
        Some(pos) => (&id_part[..pos], Some(&id_part[pos + 1..])),
        None => (id_part, None),
    };

    if id.is_empty() || !id.iter().all(u8::is_ascii_digit) {
        return Err(CatalogError::malformed_row_key(
            name,
            format!("region id '{}' is not numeric", to_string_binary(id)),
        ));
    }
    let region_id = std::str::from_utf8(id)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| CatalogError::malformed_row_key(name, "region id out of range"))?;

    let replica_id = match replica {
        None => DEFAULT_REPLICA_ID,
        Some(hex) => std::str::from_utf8(hex)
            .ok()
            .filter(|s| !s.is_empty())
            .and_then(|s| u16::from_str_radix(s, 16).ok())
            .ok_or_else(|| {
                CatalogError::malformed_row_key(
                    name,
                    format!("replica id '{}' is not hex", to_string_binary(hex)),
                )
            })?,
    };

    Ok(RegionNameParts {
        table,
        start_key,
        region_id,
        replica_id,
        encoded_name,
    })
}

/// Classification of a key handed to a catalog lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKey {
    /// The key parsed as a region name
    Region(RegionNameParts),
    /// Any other key (a table name, a table state row, garbage)
    NotRegion,
}

impl RowKey {
    /// Classify a key without failing
    pub fn classify(key: &[u8]) -> RowKey {
        match parse_region_name(key) {
            Ok(parts) => RowKey::Region(parts),
            Err(_) => RowKey::NotRegion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableName {
        TableName::new("orders").unwrap()
    }

    #[test]
    fn test_create_region_name_layout() {
        let name = create_region_name(&table(), b"row-100", b"1700000000000", 0, true);
        let text = String::from_utf8(name.clone()).unwrap();
        assert!(text.starts_with("orders,row-100,1700000000000."));
        assert!(text.ends_with('.'));
        assert_eq!(name.len(), "orders,row-100,1700000000000".len() + ENCODED_NAME_LEN + 2);
    }

    #[test]
    fn test_replica_suffix_only_for_non_default() {
        let default = create_region_name(&table(), b"a", b"1", 0, false);
        let replica = create_region_name(&table(), b"a", b"1", 10, false);
        assert_eq!(default, b"orders,a,1".to_vec());
        assert_eq!(replica, b"orders,a,1_000A".to_vec());
    }

    #[test]
    fn test_encoded_name_differs_per_replica() {
        let default = create_region_name(&table(), b"a", b"1", 0, true);
        let replica = create_region_name(&table(), b"a", b"1", 1, true);
        assert_ne!(encode_region_name(&default), encode_region_name(&replica));
    }

    #[test]
    fn test_encode_region_name_extracts_suffix() {
        let name = create_region_name(&table(), b"a", b"1", 0, true);
        let encoded = encode_region_name(&name);
        assert_eq!(encoded.len(), ENCODED_NAME_LEN);
        assert_eq!(encoded, hash_hex(b"orders,a,1"));
    }

    #[test]
    fn test_encode_region_name_hashes_other_keys() {
        assert_eq!(encode_region_name(b"orders"), hash_hex(b"orders"));
    }

    #[test]
    fn test_parse_region_name_full() {
        let name = create_region_name(&table(), b"k,with,commas", b"42", 3, true);
        let parts = parse_region_name(&name).unwrap();
        assert_eq!(parts.table, table());
        assert_eq!(parts.start_key, b"k,with,commas".to_vec());
        assert_eq!(parts.region_id, 42);
        assert_eq!(parts.replica_id, 3);
        assert_eq!(parts.encoded_name, Some(encode_region_name(&name)));
    }

    #[test]
    fn test_parse_region_name_empty_start_key() {
        let name = create_region_name(&table(), b"", b"7", 0, true);
        let parts = parse_region_name(&name).unwrap();
        assert!(parts.start_key.is_empty());
        assert_eq!(parts.region_id, 7);
        assert_eq!(parts.replica_id, 0);
    }

    #[test]
    fn test_parse_search_key() {
        let key = search_row_key(&table(), b"zz");
        let parts = parse_region_name(&key).unwrap();
        assert_eq!(parts.start_key, b"zz".to_vec());
        assert_eq!(parts.region_id, 99_999_999_999_999);
        assert_eq!(parts.encoded_name, None);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_region_name(b"orders").is_err());
        assert!(parse_region_name(b"orders,1").is_err());
        assert!(parse_region_name(b"orders,a,").is_err());
        assert!(parse_region_name(b"orders,a,12x").is_err());
        assert!(parse_region_name(b"orders,a,12_").is_err());
        assert!(parse_region_name(b"orders,a,12_zz").is_err());
        assert!(parse_region_name(b"bad table,a,1").is_err());
    }

    #[test]
    fn test_classify_falls_back_for_table_names() {
        assert_eq!(RowKey::classify(b"orders"), RowKey::NotRegion);
        let name = create_region_name(&table(), b"a", b"1", 0, true);
        assert!(matches!(RowKey::classify(&name), RowKey::Region(_)));
    }

    #[test]
    fn test_region_names_of_one_table_sort_together() {
        let other = TableName::new("orders-archive").unwrap();
        let mine = create_region_name(&table(), b"\xff\xff", b"1", 0, true);
        let theirs = create_region_name(&other, b"", b"1", 0, true);
        let mut start = table().as_bytes().to_vec();
        start.push(DELIMITER);
        let mut stop = table().as_bytes().to_vec();
        stop.push(DELIMITER + 1);
        assert!(mine >= start && mine < stop);
        assert!(!(theirs >= start && theirs < stop));
    }
}
