//! Atomic multi-row mutations
//!
//! The catalog only offers single-row atomicity through plain puts and
//! deletes. Lifecycle transitions that touch several rows go through
//! [`multi_mutate`], which hands the whole batch to the store's anchored
//! multi-row commit. The anchor routes the request and need not be mutated
//! itself; by convention it is a region name followed by `,`.
//!
//! Every failure of the commit is reported as
//! [`CatalogError::CommitFailed`]; the batch left nothing behind.

use std::fmt;

use tracing::{debug, enabled, Level};

use regionmeta_core::bytes::to_string_binary;
use regionmeta_core::row_key::DELIMITER;
use regionmeta_core::{
    CatalogError, CatalogResult, CatalogStore, MutateRowsRequest, Mutation, RegionInfo,
};

/// Anchor row for a batch coordinated by `region`
pub fn anchor_row(region: &RegionInfo) -> Vec<u8> {
    let mut anchor = region.region_name_as_string().into_bytes();
    anchor.push(DELIMITER);
    anchor
}

/// Log one mutation at debug level
pub(crate) fn debug_log_mutation(kind: &str, row: &[u8], mutation: &dyn fmt::Debug) {
    debug!(
        target: "regionmeta::mutations",
        kind,
        row = %to_string_binary(row),
        "{:?}",
        mutation
    );
}

/// Log one debug line per mutation
pub(crate) fn debug_log_mutations(mutations: &[Mutation]) {
    if !enabled!(target: "regionmeta::mutations", Level::DEBUG) {
        return;
    }
    for mutation in mutations {
        debug_log_mutation(mutation.kind(), mutation.row(), mutation);
    }
}

fn check_supported(mutation: &Mutation) -> CatalogResult<()> {
    match mutation {
        Mutation::Put(_) | Mutation::Delete(_) => Ok(()),
        other => Err(CatalogError::DoNotRetry(format!(
            "unsupported mutation kind '{}' for row {}",
            other.kind(),
            to_string_binary(other.row())
        ))),
    }
}

/// Apply `mutations` all-or-nothing, routed by `anchor`
///
/// An empty batch is a successful no-op.
///
/// # Errors
///
/// `DoNotRetry` if a mutation kind is not supported; `CommitFailed` if the
/// store rejects the batch.
pub fn multi_mutate<S>(store: &S, anchor: &[u8], mutations: Vec<Mutation>) -> CatalogResult<()>
where
    S: CatalogStore + ?Sized,
{
    debug_log_mutations(&mutations);
    if mutations.is_empty() {
        debug!(
            target: "regionmeta::mutations",
            anchor = %to_string_binary(anchor),
            "Empty multi-row batch, nothing to commit"
        );
        return Ok(());
    }
    for mutation in &mutations {
        check_supported(mutation)?;
    }

    let request = MutateRowsRequest::new(anchor.to_vec(), mutations);
    store
        .mutate_rows(&request)
        .map_err(|e| CatalogError::commit_failed(anchor, e))?;
    debug!(
        target: "regionmeta::mutations",
        anchor = %request.anchor_as_string(),
        rows = request.mutations.len(),
        "Committed multi-row batch"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionmeta_core::{Get, Put, TableName};
    use regionmeta_storage::MemoryStore;

    fn region() -> RegionInfo {
        RegionInfo::builder(TableName::new("t1").unwrap())
            .region_id(42)
            .build()
            .unwrap()
    }

    #[test]
    fn test_anchor_is_region_name_plus_delimiter() {
        let ri = region();
        let anchor = anchor_row(&ri);
        assert!(anchor.starts_with(ri.region_name()));
        assert_eq!(anchor.last(), Some(&b','));
    }

    #[test]
    fn test_commit_applies_every_row() {
        let store = MemoryStore::new();
        let mutations = vec![
            Put::latest(b"a".to_vec()).add_column(b"info".to_vec(), b"q".to_vec(), b"1".to_vec()).into(),
            Put::latest(b"b".to_vec()).add_column(b"info".to_vec(), b"q".to_vec(), b"2".to_vec()).into(),
        ];
        multi_mutate(&store, b"a,", mutations).unwrap();
        assert!(!store.get(&Get::new(b"a".to_vec())).unwrap().is_empty());
        assert!(!store.get(&Get::new(b"b".to_vec())).unwrap().is_empty());
        assert_eq!(store.multi_row_commits(), 1);
    }

    #[test]
    fn test_store_failure_is_commit_failure() {
        let store = MemoryStore::new();
        store.fail_next_commit();
        let mutations = vec![Put::latest(b"a".to_vec())
            .add_column(b"info".to_vec(), b"q".to_vec(), b"1".to_vec())
            .into()];
        let err = multi_mutate(&store, b"a,", mutations).unwrap_err();
        assert!(matches!(err, CatalogError::CommitFailed { ref anchor, .. } if anchor == "a,"));
        assert!(err.is_retryable());
        assert!(store.get(&Get::new(b"a".to_vec())).unwrap().is_empty());
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let store = MemoryStore::new();
        multi_mutate(&store, b"a,", Vec::new()).unwrap();
        assert_eq!(store.multi_row_commits(), 0);
    }
}
