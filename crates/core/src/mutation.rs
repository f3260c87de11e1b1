//! Row mutations
//!
//! Puts and deletes are plain data. The store decides how they are applied;
//! a timestamp of [`LATEST_TIMESTAMP`] is resolved by the store to its clock
//! when the batch is applied, and every placeholder in one batch resolves to
//! the same instant.
//!
//! Deletes follow tombstone semantics: a delete at time `T` hides every
//! matching cell with timestamp `<= T`, including cells written afterwards
//! with an older timestamp.

use crate::bytes::to_string_binary;
use crate::cell::{Cell, LATEST_TIMESTAMP};

/// Write of one or more cells to one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
    row: Vec<u8>,
    timestamp: u64,
    cells: Vec<Cell>,
}

impl Put {
    /// Put whose cells default to `timestamp`
    pub fn new(row: impl Into<Vec<u8>>, timestamp: u64) -> Self {
        Put {
            row: row.into(),
            timestamp,
            cells: Vec::new(),
        }
    }

    /// Put whose cells default to the store's clock
    pub fn latest(row: impl Into<Vec<u8>>) -> Self {
        Self::new(row, LATEST_TIMESTAMP)
    }

    /// Add a cell at the put's default timestamp
    pub fn add_column(
        mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        let ts = self.timestamp;
        self.cells.push(Cell::new(family, qualifier, ts, value));
        self
    }

    /// Add a cell at an explicit timestamp
    pub fn add_column_at(
        mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: u64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.cells.push(Cell::new(family, qualifier, timestamp, value));
        self
    }

    /// In-place variant of [`Put::add_column`]
    pub fn push_column(
        &mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) {
        let ts = self.timestamp;
        self.cells.push(Cell::new(family, qualifier, ts, value));
    }

    /// Target row
    pub fn row(&self) -> &[u8] {
        &self.row
    }

    /// Default timestamp
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Cells to write
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Whether the put carries no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Newest value written to `family:qualifier` by this put
    pub fn value(&self, family: &[u8], qualifier: &[u8]) -> Option<&[u8]> {
        self.cells
            .iter()
            .filter(|c| c.matches(family, qualifier))
            .max_by_key(|c| c.timestamp)
            .map(|c| c.value.as_slice())
    }
}

/// What a delete removes within its row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteScope {
    /// Every column of a family, versions `<= timestamp`
    Family {
        /// Family to clear
        family: Vec<u8>,
        /// Upper bound, inclusive
        timestamp: u64,
    },
    /// Every version `<= timestamp` of one column
    Columns {
        /// Column family
        family: Vec<u8>,
        /// Column qualifier
        qualifier: Vec<u8>,
        /// Upper bound, inclusive
        timestamp: u64,
    },
    /// Exactly one version of one column
    ///
    /// With [`LATEST_TIMESTAMP`] the newest version is removed.
    Version {
        /// Column family
        family: Vec<u8>,
        /// Column qualifier
        qualifier: Vec<u8>,
        /// Version to remove
        timestamp: u64,
    },
}

/// Removal of cells from one row
///
/// A delete with no scopes removes the whole row up to its timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    row: Vec<u8>,
    timestamp: u64,
    scopes: Vec<DeleteScope>,
}

impl Delete {
    /// Delete at an explicit timestamp
    pub fn new(row: impl Into<Vec<u8>>, timestamp: u64) -> Self {
        Delete {
            row: row.into(),
            timestamp,
            scopes: Vec::new(),
        }
    }

    /// Delete at the store's clock
    pub fn latest(row: impl Into<Vec<u8>>) -> Self {
        Self::new(row, LATEST_TIMESTAMP)
    }

    /// Clear a family at the delete's timestamp
    pub fn add_family(mut self, family: impl Into<Vec<u8>>) -> Self {
        let timestamp = self.timestamp;
        self.scopes.push(DeleteScope::Family {
            family: family.into(),
            timestamp,
        });
        self
    }

    /// Clear every version of a column up to `timestamp`
    pub fn add_columns(
        mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: u64,
    ) -> Self {
        self.scopes.push(DeleteScope::Columns {
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
        });
        self
    }

    /// Remove one version of a column
    pub fn add_column(
        mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: u64,
    ) -> Self {
        self.scopes.push(DeleteScope::Version {
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
        });
        self
    }

    /// Target row
    pub fn row(&self) -> &[u8] {
        &self.row
    }

    /// Row-level timestamp
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Scopes; empty means the whole row
    pub fn scopes(&self) -> &[DeleteScope] {
        &self.scopes
    }

    /// Whether this delete removes the whole row
    pub fn is_row_delete(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// One mutation of a multi-row batch
///
/// Stores reject kinds they do not understand instead of silently
/// dropping them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Mutation {
    /// Write cells
    Put(Put),
    /// Remove cells
    Delete(Delete),
}

impl Mutation {
    /// Target row
    pub fn row(&self) -> &[u8] {
        match self {
            Mutation::Put(p) => p.row(),
            Mutation::Delete(d) => d.row(),
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Put(_) => "put",
            Mutation::Delete(_) => "delete",
        }
    }
}

impl From<Put> for Mutation {
    fn from(p: Put) -> Self {
        Mutation::Put(p)
    }
}

impl From<Delete> for Mutation {
    fn from(d: Delete) -> Self {
        Mutation::Delete(d)
    }
}

/// Atomic batch over several rows of the catalog
///
/// The anchor row only routes the request; it need not be mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutateRowsRequest {
    /// Routing row
    pub anchor: Vec<u8>,
    /// Mutations applied all-or-nothing
    pub mutations: Vec<Mutation>,
}

impl MutateRowsRequest {
    /// Create a request
    pub fn new(anchor: impl Into<Vec<u8>>, mutations: Vec<Mutation>) -> Self {
        MutateRowsRequest {
            anchor: anchor.into(),
            mutations,
        }
    }

    /// Anchor row rendered for logs
    pub fn anchor_as_string(&self) -> String {
        to_string_binary(&self.anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_default_and_explicit_timestamps() {
        let put = Put::new(b"r".to_vec(), 10)
            .add_column(b"f".to_vec(), b"a".to_vec(), b"1".to_vec())
            .add_column_at(b"f".to_vec(), b"b".to_vec(), 3, b"2".to_vec());
        assert_eq!(put.cells()[0].timestamp, 10);
        assert_eq!(put.cells()[1].timestamp, 3);
        assert_eq!(put.value(b"f", b"a"), Some(&b"1"[..]));
    }

    #[test]
    fn test_put_latest_uses_placeholder() {
        let put = Put::latest(b"r".to_vec()).add_column(b"f".to_vec(), b"q".to_vec(), Vec::new());
        assert_eq!(put.cells()[0].timestamp, LATEST_TIMESTAMP);
        assert!(!put.is_empty());
    }

    #[test]
    fn test_delete_scopes() {
        let delete = Delete::new(b"r".to_vec(), 5)
            .add_family(b"f".to_vec())
            .add_column(b"g".to_vec(), b"q".to_vec(), LATEST_TIMESTAMP);
        assert!(!delete.is_row_delete());
        assert_eq!(
            delete.scopes()[0],
            DeleteScope::Family {
                family: b"f".to_vec(),
                timestamp: 5
            }
        );
        assert!(Delete::latest(b"r".to_vec()).is_row_delete());
    }

    #[test]
    fn test_mutation_row_and_kind() {
        let m: Mutation = Put::new(b"a".to_vec(), 1).into();
        assert_eq!(m.row(), b"a");
        assert_eq!(m.kind(), "put");
        let m: Mutation = Delete::new(b"b".to_vec(), 1).into();
        assert_eq!(m.kind(), "delete");
    }

    #[test]
    fn test_request_anchor_rendering() {
        let req = MutateRowsRequest::new(b"t,a,1.x.,\x00".to_vec(), Vec::new());
        assert_eq!(req.anchor_as_string(), "t,a,1.x.,\\x00");
    }
}
