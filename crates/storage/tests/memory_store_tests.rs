//! Integration tests for the in-memory catalog store
//!
//! These tests verify that MemoryStore behaves as a complete CatalogStore:
//! - Tombstone semantics across families and versions
//! - Scan ordering, bounds and batching
//! - Multi-row commit atomicity under contention and injected failure

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use regionmeta_core::{
    CatalogStore, Delete, Get, ManualClock, MutateRowsRequest, Put, RowResult, Scan,
};
use regionmeta_storage::MemoryStore;

// ============================================================================
// Helper Functions
// ============================================================================

fn put(row: &[u8], family: &[u8], qualifier: &[u8], value: &[u8]) -> Put {
    Put::latest(row.to_vec()).add_column(family.to_vec(), qualifier.to_vec(), value.to_vec())
}

fn scan_keys(store: &MemoryStore, scan: &Scan) -> Vec<Vec<u8>> {
    store
        .scan(scan)
        .unwrap()
        .map(|r| r.unwrap().row().to_vec())
        .collect()
}

// ============================================================================
// Delete Semantics
// ============================================================================

mod delete_semantics {
    use super::*;

    #[test]
    fn test_delete_family_then_readd_later() {
        let clock = Arc::new(ManualClock::new(100));
        let store = MemoryStore::with_clock(clock.clone());
        store.put(&[put(b"r", b"info", b"state", b"OPEN")]).unwrap();

        store
            .delete(&[Delete::new(b"r".to_vec(), 100).add_family(b"info".to_vec())])
            .unwrap();
        store
            .put(&[Put::new(b"r".to_vec(), 101).add_column(
                b"info".to_vec(),
                b"state".to_vec(),
                b"CLOSED".to_vec(),
            )])
            .unwrap();

        let row = store.get(&Get::new(b"r".to_vec())).unwrap();
        assert_eq!(row.value(b"info", b"state"), Some(&b"CLOSED"[..]));
    }

    #[test]
    fn test_same_timestamp_readd_is_masked() {
        let store = MemoryStore::new();
        store
            .delete(&[Delete::new(b"r".to_vec(), 100).add_family(b"info".to_vec())])
            .unwrap();
        store
            .put(&[Put::new(b"r".to_vec(), 100).add_column(
                b"info".to_vec(),
                b"state".to_vec(),
                b"CLOSED".to_vec(),
            )])
            .unwrap();
        assert!(store.get(&Get::new(b"r".to_vec())).unwrap().is_empty());
    }

    #[test]
    fn test_column_delete_keeps_siblings() {
        let store = MemoryStore::new();
        store
            .put(&[Put::new(b"r".to_vec(), 1)
                .add_column(b"info".to_vec(), b"merge0000".to_vec(), b"a".to_vec())
                .add_column(b"info".to_vec(), b"merge0001".to_vec(), b"b".to_vec())
                .add_column(b"info".to_vec(), b"regioninfo".to_vec(), b"ri".to_vec())])
            .unwrap();
        store
            .delete(&[Delete::latest(b"r".to_vec())
                .add_columns(b"info".to_vec(), b"merge0000".to_vec(), u64::MAX)
                .add_columns(b"info".to_vec(), b"merge0001".to_vec(), u64::MAX)])
            .unwrap();
        let row = store.get(&Get::new(b"r".to_vec())).unwrap();
        assert_eq!(row.cells().len(), 1);
        assert!(row.contains_column(b"info", b"regioninfo"));
    }

    #[test]
    fn test_deleted_row_disappears_from_scans() {
        let store = MemoryStore::new();
        store.put(&[put(b"a", b"f", b"q", b"1"), put(b"b", b"f", b"q", b"2")]).unwrap();
        store.delete(&[Delete::latest(b"a".to_vec())]).unwrap();
        assert_eq!(scan_keys(&store, &Scan::new()), vec![b"b".to_vec()]);
    }
}

// ============================================================================
// Scans
// ============================================================================

mod scans {
    use super::*;

    #[test]
    fn test_all_versions_scan() {
        let clock = Arc::new(ManualClock::new(1));
        let store = MemoryStore::with_clock(clock.clone());
        for seq in [10u64, 20, 30] {
            store
                .put(&[put(b"r", b"rep_barrier", b"seqnumDuringOpen", &seq.to_be_bytes())])
                .unwrap();
            clock.advance(1);
        }
        let scan = Scan::new().add_family(b"rep_barrier".to_vec()).all_versions();
        let rows: Vec<RowResult> = store.scan(&scan).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].column_cells(b"rep_barrier", b"seqnumDuringOpen").count(),
            3
        );
    }

    #[test]
    fn test_consumer_can_stop_early() {
        let store = MemoryStore::new();
        for i in 0..50u8 {
            store.put(&[put(&[b'r', i], b"f", b"q", b"v")]).unwrap();
        }
        let mut scanner = store.scan(&Scan::new().with_caching(5)).unwrap();
        let first = scanner.next().unwrap().unwrap();
        assert_eq!(first.row(), &[b'r', 0]);
        drop(scanner);

        // Writers are not blocked by an abandoned scanner
        store.put(&[put(b"z", b"f", b"q", b"v")]).unwrap();
    }

    proptest! {
        #[test]
        fn prop_reverse_scan_mirrors_forward(
            keys in prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..6), 0..40),
            caching in 1usize..8,
        ) {
            let store = MemoryStore::new();
            for key in &keys {
                store.put(&[put(key, b"f", b"q", b"v")]).unwrap();
            }
            let forward = scan_keys(&store, &Scan::new().with_caching(caching));
            let mut reverse = scan_keys(&store, &Scan::new().with_caching(caching).reversed(true));
            reverse.reverse();
            let expected: Vec<Vec<u8>> = keys.iter().cloned().collect();
            prop_assert_eq!(&forward, &expected);
            prop_assert_eq!(&reverse, &expected);
        }
    }
}

// ============================================================================
// Multi-row Commits
// ============================================================================

mod commits {
    use super::*;

    fn pair_batch(value: &[u8]) -> MutateRowsRequest {
        MutateRowsRequest::new(
            b"left,".to_vec(),
            vec![
                put(b"left", b"f", b"q", value).into(),
                put(b"right", b"f", b"q", value).into(),
            ],
        )
    }

    #[test]
    fn test_failed_commit_is_invisible() {
        let store = MemoryStore::new();
        store.mutate_rows(&pair_batch(b"v1")).unwrap();
        store.fail_next_commit();
        assert!(store.mutate_rows(&pair_batch(b"v2")).is_err());

        let left = store.get(&Get::new(b"left".to_vec())).unwrap();
        let right = store.get(&Get::new(b"right".to_vec())).unwrap();
        assert_eq!(left.value(b"f", b"q"), Some(&b"v1"[..]));
        assert_eq!(right.value(b"f", b"q"), Some(&b"v1"[..]));
        assert_eq!(store.multi_row_commits(), 1);
    }

    #[test]
    fn test_readers_never_observe_torn_pairs() {
        let store = Arc::new(MemoryStore::new());
        store.mutate_rows(&pair_batch(&0u32.to_be_bytes())).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 1..500u32 {
                    store.mutate_rows(&pair_batch(&i.to_be_bytes())).unwrap();
                }
            })
        };

        let mut observed = BTreeSet::new();
        for _ in 0..500 {
            let rows: Vec<RowResult> = store
                .scan(&Scan::new())
                .unwrap()
                .map(|r| r.unwrap())
                .collect();
            assert_eq!(rows.len(), 2);
            let left = rows[0].value(b"f", b"q").map(|v| v.to_vec());
            let right = rows[1].value(b"f", b"q").map(|v| v.to_vec());
            assert_eq!(left, right);
            observed.insert(left);
        }
        writer.join().unwrap();
        assert!(!observed.is_empty());
    }
}
