//! Core identity and state types for the catalog
//!
//! This module defines:
//! - TableName: validated table identity
//! - ServerName: host, port and start code of a region server
//! - RegionState: lifecycle state of a region as stored in the catalog
//! - TableState: enablement state of a table

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Name of a table
///
/// Table names are restricted to `[A-Za-z0-9_.:-]`. Every allowed byte sorts
/// after the region-name delimiter `,`, which keeps one table's catalog rows
/// contiguous and disjoint from every other table's rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableName(String);

impl TableName {
    /// Name of the catalog table itself
    pub const CATALOG: &'static str = "sys:catalog";

    /// Create a validated table name
    pub fn new(name: impl Into<String>) -> CatalogResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "table name must not be empty".to_string(),
            ));
        }
        if let Some(bad) = name.bytes().find(|b| !Self::is_legal_byte(*b)) {
            return Err(CatalogError::InvalidArgument(format!(
                "illegal byte {:#04x} in table name '{}'",
                bad, name
            )));
        }
        Ok(TableName(name))
    }

    /// The catalog table
    pub fn catalog() -> Self {
        TableName(Self::CATALOG.to_string())
    }

    /// Parse a table name from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> CatalogResult<Self> {
        let s = std::str::from_utf8(bytes).map_err(|_| {
            CatalogError::InvalidArgument("table name is not valid UTF-8".to_string())
        })?;
        Self::new(s)
    }

    #[inline]
    fn is_legal_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'-')
    }

    /// Whether this is the catalog table
    pub fn is_catalog(&self) -> bool {
        self.0 == Self::CATALOG
    }

    /// Name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name as bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a region server process
///
/// The start code distinguishes successive incarnations of a server on the
/// same host and port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerName {
    host: String,
    port: u16,
    start_code: u64,
}

impl ServerName {
    /// Create a server name
    pub fn new(host: impl Into<String>, port: u16, start_code: u64) -> Self {
        ServerName {
            host: host.into(),
            port,
            start_code,
        }
    }

    /// Build from a `host:port` address and a start code
    pub fn from_address(address: &str, start_code: u64) -> CatalogResult<Self> {
        let (host, port) = address.rsplit_once(':').ok_or_else(|| {
            CatalogError::InvalidArgument(format!("server address '{}' has no port", address))
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            CatalogError::InvalidArgument(format!("bad port in server address '{}'", address))
        })?;
        Ok(ServerName::new(host, port, start_code))
    }

    /// Host name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Start code
    pub fn start_code(&self) -> u64 {
        self.start_code
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.host, self.port, self.start_code)
    }
}

impl FromStr for ServerName {
    type Err = CatalogError;

    /// Parse the `host,port,startcode` form
    fn from_str(s: &str) -> CatalogResult<Self> {
        let mut parts = s.split(',');
        let (host, port, code) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(c), None) if !h.is_empty() => (h, p, c),
            _ => {
                return Err(CatalogError::InvalidArgument(format!(
                    "server name '{}' is not host,port,startcode",
                    s
                )))
            }
        };
        let port = port.parse::<u16>().map_err(|_| {
            CatalogError::InvalidArgument(format!("bad port in server name '{}'", s))
        })?;
        let start_code = code.parse::<u64>().map_err(|_| {
            CatalogError::InvalidArgument(format!("bad start code in server name '{}'", s))
        })?;
        Ok(ServerName::new(host, port, start_code))
    }
}

/// Lifecycle state of a region
///
/// New regions are always written as `Closed`. Assignment moves them to
/// `Open`; split and merge move a parent through `Splitting`/`Merging` to
/// the terminal `Split`/`Merged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionState {
    /// Region is offline and not opening
    Offline,
    /// Server has begun to open but not yet done
    Opening,
    /// Server opened region and updated the catalog
    Open,
    /// Server has begun to close but not yet done
    Closing,
    /// Server closed region and updated the catalog
    Closed,
    /// Server started split of a region
    Splitting,
    /// Server completed split of a region
    Split,
    /// Failed to open, and won't retry any more
    FailedOpen,
    /// Failed to close, and won't retry any more
    FailedClose,
    /// Server started merge a region
    Merging,
    /// Server completed merge a region
    Merged,
    /// New region to be created when splitting a region
    SplittingNew,
    /// New region to be created when merging two regions
    MergingNew,
    /// Server hosting the region crashed
    AbnormallyClosed,
}

impl RegionState {
    /// All states, in declaration order
    pub const ALL: [RegionState; 14] = [
        RegionState::Offline,
        RegionState::Opening,
        RegionState::Open,
        RegionState::Closing,
        RegionState::Closed,
        RegionState::Splitting,
        RegionState::Split,
        RegionState::FailedOpen,
        RegionState::FailedClose,
        RegionState::Merging,
        RegionState::Merged,
        RegionState::SplittingNew,
        RegionState::MergingNew,
        RegionState::AbnormallyClosed,
    ];

    /// Stored name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionState::Offline => "OFFLINE",
            RegionState::Opening => "OPENING",
            RegionState::Open => "OPEN",
            RegionState::Closing => "CLOSING",
            RegionState::Closed => "CLOSED",
            RegionState::Splitting => "SPLITTING",
            RegionState::Split => "SPLIT",
            RegionState::FailedOpen => "FAILED_OPEN",
            RegionState::FailedClose => "FAILED_CLOSE",
            RegionState::Merging => "MERGING",
            RegionState::Merged => "MERGED",
            RegionState::SplittingNew => "SPLITTING_NEW",
            RegionState::MergingNew => "MERGING_NEW",
            RegionState::AbnormallyClosed => "ABNORMALLY_CLOSED",
        }
    }
}

impl fmt::Display for RegionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionState {
    type Err = CatalogError;

    fn from_str(s: &str) -> CatalogResult<Self> {
        RegionState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| CatalogError::InvalidArgument(format!("unknown region state '{}'", s)))
    }
}

/// Enablement state of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableStatus {
    /// Table is serving
    Enabled,
    /// Table is offline
    Disabled,
    /// Table is being disabled
    Disabling,
    /// Table is being enabled
    Enabling,
}

/// State row of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableState {
    /// Table this state belongs to
    pub table: TableName,
    /// Current status
    pub status: TableStatus,
}

impl TableState {
    /// Create a table state
    pub fn new(table: TableName, status: TableStatus) -> Self {
        TableState { table, status }
    }

    /// Whether the table is in the given status
    pub fn in_status(&self, status: TableStatus) -> bool {
        self.status == status
    }
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.table, self.status)
    }
}
