//! Cells and row results
//!
//! A cell is one version of one column of one row. A [`RowResult`] is what a
//! get or one step of a scan returns: the row key plus its visible cells,
//! ordered by family, then qualifier, then timestamp newest first.

use std::cmp::Ordering;

/// Timestamp placeholder resolved by the store to its clock at apply time
pub const LATEST_TIMESTAMP: u64 = u64::MAX;

/// One version of one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Column family
    pub family: Vec<u8>,
    /// Column qualifier
    pub qualifier: Vec<u8>,
    /// Version timestamp in milliseconds
    pub timestamp: u64,
    /// Value; may be empty (present-but-empty column)
    pub value: Vec<u8>,
}

impl Cell {
    /// Create a cell
    pub fn new(
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: u64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Cell {
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            value: value.into(),
        }
    }

    /// Whether this cell belongs to `family:qualifier`
    #[inline]
    pub fn matches(&self, family: &[u8], qualifier: &[u8]) -> bool {
        self.family == family && self.qualifier == qualifier
    }

    /// Whether the qualifier starts with `prefix` within `family`
    #[inline]
    pub fn qualifier_starts_with(&self, family: &[u8], prefix: &[u8]) -> bool {
        self.family == family && self.qualifier.starts_with(prefix)
    }

    fn sort_order(a: &Cell, b: &Cell) -> Ordering {
        a.family
            .cmp(&b.family)
            .then_with(|| a.qualifier.cmp(&b.qualifier))
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    }
}

/// Cells of one row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowResult {
    row: Vec<u8>,
    cells: Vec<Cell>,
}

impl RowResult {
    /// Create a result, sorting the cells into canonical order
    pub fn new(row: impl Into<Vec<u8>>, mut cells: Vec<Cell>) -> Self {
        cells.sort_by(Cell::sort_order);
        RowResult {
            row: row.into(),
            cells,
        }
    }

    /// Result for a row with no visible cells
    pub fn empty(row: impl Into<Vec<u8>>) -> Self {
        RowResult {
            row: row.into(),
            cells: Vec::new(),
        }
    }

    /// Row key
    pub fn row(&self) -> &[u8] {
        &self.row
    }

    /// All cells in canonical order
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Whether no cells are visible
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Newest cell of a column
    pub fn column_latest_cell(&self, family: &[u8], qualifier: &[u8]) -> Option<&Cell> {
        self.cells.iter().find(|c| c.matches(family, qualifier))
    }

    /// Newest value of a column
    pub fn value(&self, family: &[u8], qualifier: &[u8]) -> Option<&[u8]> {
        self.column_latest_cell(family, qualifier)
            .map(|c| c.value.as_slice())
    }

    /// Every returned version of a column, newest first
    pub fn column_cells<'a>(
        &'a self,
        family: &'a [u8],
        qualifier: &'a [u8],
    ) -> impl Iterator<Item = &'a Cell> + 'a {
        self.cells.iter().filter(move |c| c.matches(family, qualifier))
    }

    /// Newest cell of every column in a family
    pub fn family_latest_cells<'a>(&'a self, family: &'a [u8]) -> impl Iterator<Item = &'a Cell> + 'a {
        let mut last_qualifier: Option<&'a [u8]> = None;
        self.cells.iter().filter(move |c| {
            if c.family != family {
                return false;
            }
            if last_qualifier == Some(c.qualifier.as_slice()) {
                return false;
            }
            last_qualifier = Some(c.qualifier.as_slice());
            true
        })
    }

    /// Whether the column is present (even with an empty value)
    pub fn contains_column(&self, family: &[u8], qualifier: &[u8]) -> bool {
        self.column_latest_cell(family, qualifier).is_some()
    }
}
