//! Per-column version chains and per-row tombstones
//!
//! Versions are stored in descending timestamp order (newest first) so the
//! common read, "latest visible version", stops at the first unmasked entry.
//!
//! Deletes never rewrite history in place. A delete records a tombstone
//! (row, family or column scope) and prunes the versions it already masks;
//! the tombstone stays behind so that a later put carrying an older
//! timestamp is masked too.

use std::collections::{BTreeMap, VecDeque};

use regionmeta_core::Cell;

/// Versions of one column, newest first
#[derive(Debug, Clone, Default)]
pub struct VersionChain {
    /// (timestamp, value), strictly descending by timestamp
    versions: VecDeque<(u64, Vec<u8>)>,
}

impl VersionChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a version, replacing any existing version with the same timestamp
    ///
    /// Pushing a version newer than every stored one is O(1).
    pub fn put(&mut self, timestamp: u64, value: Vec<u8>) {
        match self.versions.front() {
            None => self.versions.push_front((timestamp, value)),
            Some((newest, _)) if timestamp > *newest => self.versions.push_front((timestamp, value)),
            _ => {
                match self
                    .versions
                    .binary_search_by(|(ts, _)| timestamp.cmp(ts))
                {
                    Ok(pos) => self.versions[pos].1 = value,
                    Err(pos) => self.versions.insert(pos, (timestamp, value)),
                }
            }
        }
    }

    /// Drop every version with timestamp `<= bound`
    pub fn prune_at_or_below(&mut self, bound: u64) {
        while matches!(self.versions.back(), Some((ts, _)) if *ts <= bound) {
            self.versions.pop_back();
        }
    }

    /// Drop exactly the version at `timestamp`; returns whether one existed
    pub fn remove_version(&mut self, timestamp: u64) -> bool {
        match self
            .versions
            .binary_search_by(|(ts, _)| timestamp.cmp(ts))
        {
            Ok(pos) => {
                self.versions.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Newest version with timestamp greater than `mask`
    pub fn latest_visible(&self, mask: Option<u64>) -> Option<(u64, &[u8])> {
        self.visible(mask).next()
    }

    /// Versions not hidden by `mask`, newest first
    pub fn visible(&self, mask: Option<u64>) -> impl Iterator<Item = (u64, &[u8])> + '_ {
        self.versions
            .iter()
            .take_while(move |(ts, _)| mask.map_or(true, |m| *ts > m))
            .map(|(ts, v)| (*ts, v.as_slice()))
    }

    /// Number of versions stored
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Whether the chain holds no versions
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// `(family, qualifier)`
pub type ColumnKey = (Vec<u8>, Vec<u8>);

/// Stored state of one row
#[derive(Debug, Clone, Default)]
pub struct RowData {
    columns: BTreeMap<ColumnKey, VersionChain>,
    row_tombstone: Option<u64>,
    family_tombstones: BTreeMap<Vec<u8>, u64>,
    column_tombstones: BTreeMap<ColumnKey, u64>,
}

impl RowData {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest tombstone covering a column
    fn mask(&self, family: &[u8], qualifier: &[u8]) -> Option<u64> {
        let family_ts = self.family_tombstones.get(family).copied();
        let column_ts = self
            .column_tombstones
            .get(&(family.to_vec(), qualifier.to_vec()))
            .copied();
        [self.row_tombstone, family_ts, column_ts]
            .into_iter()
            .flatten()
            .max()
    }

    /// Write one version
    pub fn put(&mut self, family: &[u8], qualifier: &[u8], timestamp: u64, value: Vec<u8>) {
        self.columns
            .entry((family.to_vec(), qualifier.to_vec()))
            .or_default()
            .put(timestamp, value);
    }

    /// Mask every cell of the row at or below `timestamp`
    pub fn delete_row(&mut self, timestamp: u64) {
        self.row_tombstone = Some(self.row_tombstone.map_or(timestamp, |t| t.max(timestamp)));
        for chain in self.columns.values_mut() {
            chain.prune_at_or_below(timestamp);
        }
        self.columns.retain(|_, chain| !chain.is_empty());
    }

    /// Mask every cell of a family at or below `timestamp`
    pub fn delete_family(&mut self, family: &[u8], timestamp: u64) {
        let entry = self.family_tombstones.entry(family.to_vec()).or_insert(timestamp);
        *entry = (*entry).max(timestamp);
        for ((f, _), chain) in self.columns.iter_mut() {
            if f.as_slice() == family {
                chain.prune_at_or_below(timestamp);
            }
        }
        self.columns.retain(|_, chain| !chain.is_empty());
    }

    /// Mask every version of a column at or below `timestamp`
    pub fn delete_column(&mut self, family: &[u8], qualifier: &[u8], timestamp: u64) {
        let key = (family.to_vec(), qualifier.to_vec());
        if let Some(chain) = self.columns.get_mut(&key) {
            chain.prune_at_or_below(timestamp);
            if chain.is_empty() {
                self.columns.remove(&key);
            }
        }
        let entry = self.column_tombstones.entry(key).or_insert(timestamp);
        *entry = (*entry).max(timestamp);
    }

    /// Remove one version of a column
    ///
    /// `None` removes the newest visible version.
    pub fn delete_version(&mut self, family: &[u8], qualifier: &[u8], timestamp: Option<u64>) {
        let mask = self.mask(family, qualifier);
        let key = (family.to_vec(), qualifier.to_vec());
        if let Some(chain) = self.columns.get_mut(&key) {
            let target = timestamp.or_else(|| chain.latest_visible(mask).map(|(ts, _)| ts));
            if let Some(ts) = target {
                chain.remove_version(ts);
            }
            if chain.is_empty() {
                self.columns.remove(&key);
            }
        }
    }

    /// Visible cells selected by `select`, newest `max_versions` per column
    pub fn visible_cells<F>(&self, mut select: F, max_versions: usize) -> Vec<Cell>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let mut cells = Vec::new();
        for ((family, qualifier), chain) in &self.columns {
            if !select(family.as_slice(), qualifier.as_slice()) {
                continue;
            }
            let mask = self.mask(family, qualifier);
            for (ts, value) in chain.visible(mask).take(max_versions) {
                cells.push(Cell::new(family.clone(), qualifier.clone(), ts, value.to_vec()));
            }
        }
        cells
    }

    /// Whether the row holds no versions and no tombstones
    pub fn is_vacant(&self) -> bool {
        self.columns.is_empty()
            && self.row_tombstone.is_none()
            && self.family_tombstones.is_empty()
            && self.column_tombstones.is_empty()
    }
}
