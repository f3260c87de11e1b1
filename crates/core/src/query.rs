//! Point reads and range scans
//!
//! [`Get`] and [`Scan`] describe what to read; the store decides how. Both
//! carry a column projection, a version limit and a consistency level.
//! Scans add bounds, direction, a row filter, a row limit and a caching hint.

use crate::bytes::contains_subslice;

/// Read consistency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Read from the primary only
    #[default]
    Strong,
    /// Secondary replicas may answer with possibly stale data
    Timeline,
}

/// Store read hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadType {
    /// Store decides
    #[default]
    Default,
    /// Positional read, suited to single-row scans
    Pread,
}

/// Column selection entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSpec {
    /// Every column of a family
    Family(Vec<u8>),
    /// One column
    Column(Vec<u8>, Vec<u8>),
}

/// Which columns a read returns
///
/// An empty projection selects everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Projection {
    specs: Vec<ColumnSpec>,
}

impl Projection {
    /// Select every column of `family`
    pub fn add_family(&mut self, family: impl Into<Vec<u8>>) {
        self.specs.push(ColumnSpec::Family(family.into()));
    }

    /// Select one column
    pub fn add_column(&mut self, family: impl Into<Vec<u8>>, qualifier: impl Into<Vec<u8>>) {
        self.specs
            .push(ColumnSpec::Column(family.into(), qualifier.into()));
    }

    /// Whether a column is selected
    pub fn matches(&self, family: &[u8], qualifier: &[u8]) -> bool {
        self.specs.is_empty()
            || self.specs.iter().any(|spec| match spec {
                ColumnSpec::Family(f) => f.as_slice() == family,
                ColumnSpec::Column(f, q) => f.as_slice() == family && q.as_slice() == qualifier,
            })
    }

    /// Selected entries
    pub fn specs(&self) -> &[ColumnSpec] {
        &self.specs
    }
}

/// Server-side row filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    /// Keep rows whose key contains the given bytes
    RowContains(Vec<u8>),
    /// Return only the first cell of each row
    FirstKeyOnly,
}

impl RowFilter {
    /// Whether a row key passes the filter
    pub fn accepts_row(&self, row: &[u8]) -> bool {
        match self {
            RowFilter::RowContains(needle) => contains_subslice(row, needle),
            RowFilter::FirstKeyOnly => true,
        }
    }
}

/// Read of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Get {
    /// Row to read
    pub row: Vec<u8>,
    /// Columns to return
    pub projection: Projection,
    /// Versions per column
    pub max_versions: usize,
    /// Consistency level
    pub consistency: Consistency,
}

impl Get {
    /// Read the newest version of every column of `row`
    pub fn new(row: impl Into<Vec<u8>>) -> Self {
        Get {
            row: row.into(),
            projection: Projection::default(),
            max_versions: 1,
            consistency: Consistency::Strong,
        }
    }

    /// Restrict to a family
    pub fn add_family(mut self, family: impl Into<Vec<u8>>) -> Self {
        self.projection.add_family(family);
        self
    }

    /// Restrict to a column
    pub fn add_column(mut self, family: impl Into<Vec<u8>>, qualifier: impl Into<Vec<u8>>) -> Self {
        self.projection.add_column(family, qualifier);
        self
    }

    /// Versions per column
    pub fn max_versions(mut self, versions: usize) -> Self {
        self.max_versions = versions.max(1);
        self
    }

    /// Consistency level
    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }
}

/// Range scan
///
/// Forward scans cover `[start_row, stop_row)`. Reversed scans begin at
/// `start_row` (inclusive) and walk down to `stop_row` (exclusive).
/// `None` bounds are open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// First row visited
    pub start_row: Option<Vec<u8>>,
    /// Row at which the scan ends, exclusive
    pub stop_row: Option<Vec<u8>>,
    /// Walk rows in descending order
    pub reversed: bool,
    /// Columns to return
    pub projection: Projection,
    /// Optional row filter
    pub filter: Option<RowFilter>,
    /// Maximum rows returned
    pub limit: Option<usize>,
    /// Rows fetched per round trip
    pub caching: usize,
    /// Versions per column
    pub max_versions: usize,
    /// Consistency level
    pub consistency: Consistency,
    /// Store read hint
    pub read_type: ReadType,
}

impl Default for Scan {
    fn default() -> Self {
        Scan {
            start_row: None,
            stop_row: None,
            reversed: false,
            projection: Projection::default(),
            filter: None,
            limit: None,
            caching: 100,
            max_versions: 1,
            consistency: Consistency::Strong,
            read_type: ReadType::Default,
        }
    }
}

impl Scan {
    /// Unbounded forward scan
    pub fn new() -> Self {
        Self::default()
    }

    /// First row visited
    pub fn with_start_row(mut self, row: impl Into<Vec<u8>>) -> Self {
        self.start_row = Some(row.into());
        self
    }

    /// Exclusive end row
    pub fn with_stop_row(mut self, row: impl Into<Vec<u8>>) -> Self {
        self.stop_row = Some(row.into());
        self
    }

    /// Walk rows in descending order
    pub fn reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    /// Restrict to a family
    pub fn add_family(mut self, family: impl Into<Vec<u8>>) -> Self {
        self.projection.add_family(family);
        self
    }

    /// Restrict to a column
    pub fn add_column(mut self, family: impl Into<Vec<u8>>, qualifier: impl Into<Vec<u8>>) -> Self {
        self.projection.add_column(family, qualifier);
        self
    }

    /// Row filter
    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Row limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Caching hint
    pub fn with_caching(mut self, caching: usize) -> Self {
        self.caching = caching.max(1);
        self
    }

    /// Versions per column
    pub fn with_max_versions(mut self, versions: usize) -> Self {
        self.max_versions = versions.max(1);
        self
    }

    /// Read every stored version
    pub fn all_versions(self) -> Self {
        self.with_max_versions(usize::MAX)
    }

    /// Consistency level
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Read hint
    pub fn with_read_type(mut self, read_type: ReadType) -> Self {
        self.read_type = read_type;
        self
    }

    /// Whether `row` falls inside the scan's bounds
    pub fn in_range(&self, row: &[u8]) -> bool {
        if self.reversed {
            let below_start = self.start_row.as_deref().map_or(true, |s| row <= s);
            let above_stop = self.stop_row.as_deref().map_or(true, |s| row > s);
            below_start && above_stop
        } else {
            let after_start = self.start_row.as_deref().map_or(true, |s| row >= s);
            let before_stop = self
                .stop_row
                .as_deref()
                .map_or(true, |s| s.is_empty() || row < s);
            after_start && before_stop
        }
    }
}
