//! Property-based tests for region names
//!
//! These tests use proptest to verify that region names built from
//! arbitrary identity fields parse back to the same fields, and that
//! descriptors survive serialization.

use proptest::prelude::*;

use regionmeta_core::row_key::{self, RowKey};
use regionmeta_core::{RegionInfo, TableName};

/// Generates a legal table name.
fn arb_table() -> impl Strategy<Value = TableName> {
    "[a-z][a-z0-9_.:-]{0,15}".prop_map(|s| TableName::new(s).unwrap())
}

/// Generates an arbitrary start key, including delimiter and high bytes.
fn arb_key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..24)
}

proptest! {
    #[test]
    fn prop_region_name_parses_back(
        table in arb_table(),
        start in arb_key(),
        id in any::<u64>(),
        replica in any::<u16>(),
    ) {
        let name = row_key::create_region_name(
            &table,
            &start,
            id.to_string().as_bytes(),
            replica,
            true,
        );
        let parts = row_key::parse_region_name(&name).unwrap();
        prop_assert_eq!(parts.table, table);
        prop_assert_eq!(parts.start_key, start);
        prop_assert_eq!(parts.region_id, id);
        prop_assert_eq!(parts.replica_id, replica);
        prop_assert_eq!(parts.encoded_name, Some(row_key::encode_region_name(&name)));
        prop_assert!(matches!(RowKey::classify(&name), RowKey::Region(_)));
    }

    #[test]
    fn prop_descriptor_roundtrip(
        table in arb_table(),
        start in arb_key(),
        id in any::<u64>(),
        offline in any::<bool>(),
        split in any::<bool>(),
    ) {
        let region = RegionInfo::builder(table)
            .start_key(start)
            .region_id(id)
            .offline(offline)
            .split(split)
            .build()
            .unwrap();
        let bytes = region.to_bytes().unwrap();
        prop_assert_eq!(RegionInfo::parse_from(&bytes).unwrap(), region);
    }

    #[test]
    fn prop_search_key_sorts_after_region_rows(
        table in arb_table(),
        start in arb_key(),
        id in 0u64..10_000_000_000_000,
    ) {
        let name = row_key::create_region_name(&table, &start, id.to_string().as_bytes(), 0, true);
        let search = row_key::search_row_key(&table, &start);
        prop_assert!(name < search);
    }
}
