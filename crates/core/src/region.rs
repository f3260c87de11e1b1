//! Region descriptors and locations
//!
//! A [`RegionInfo`] is immutable once built. Splits and merges never rename a
//! region; they produce new descriptors and retire the old ones.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bytes::to_string_binary;
use crate::error::{CatalogError, CatalogResult};
use crate::row_key::{self, DEFAULT_REPLICA_ID};
use crate::types::{ServerName, TableName};

/// Magic prefix of a serialized descriptor
const REGION_INFO_MAGIC: &[u8; 4] = b"RDSC";

/// Descriptor of one region replica
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionInfo {
    table: TableName,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    region_id: u64,
    replica_id: u16,
    offline: bool,
    split: bool,
    // Derived from the fields above
    region_name: Vec<u8>,
    encoded_name: String,
}

/// Serialized form of a descriptor
#[derive(Serialize, Deserialize)]
struct RegionInfoRecord {
    table: String,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    region_id: u64,
    replica_id: u16,
    offline: bool,
    split: bool,
}

impl RegionInfo {
    /// Start building a descriptor for `table`
    pub fn builder(table: TableName) -> RegionInfoBuilder {
        RegionInfoBuilder {
            table,
            start_key: Vec::new(),
            end_key: Vec::new(),
            region_id: 0,
            replica_id: DEFAULT_REPLICA_ID,
            offline: false,
            split: false,
        }
    }

    /// Builder seeded from an existing descriptor
    pub fn to_builder(&self) -> RegionInfoBuilder {
        RegionInfoBuilder {
            table: self.table.clone(),
            start_key: self.start_key.clone(),
            end_key: self.end_key.clone(),
            region_id: self.region_id,
            replica_id: self.replica_id,
            offline: self.offline,
            split: self.split,
        }
    }

    /// Owning table
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Inclusive start key (empty = first region)
    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    /// Exclusive end key (empty = last region)
    pub fn end_key(&self) -> &[u8] {
        &self.end_key
    }

    /// Creation timestamp
    pub fn region_id(&self) -> u64 {
        self.region_id
    }

    /// Replica index
    pub fn replica_id(&self) -> u16 {
        self.replica_id
    }

    /// Whether this is the default replica
    pub fn is_default_replica(&self) -> bool {
        self.replica_id == DEFAULT_REPLICA_ID
    }

    /// Whether the region has been taken offline
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Whether the region has been split
    pub fn is_split(&self) -> bool {
        self.split
    }

    /// Whether the region is a split parent awaiting garbage collection
    pub fn is_split_parent(&self) -> bool {
        self.split
    }

    /// Full region name
    pub fn region_name(&self) -> &[u8] {
        &self.region_name
    }

    /// Region name rendered for logs
    pub fn region_name_as_string(&self) -> String {
        to_string_binary(&self.region_name)
    }

    /// Short stable identifier
    pub fn encoded_name(&self) -> &str {
        &self.encoded_name
    }

    /// Whether `row` falls inside `[start_key, end_key)`
    pub fn contains_row(&self, row: &[u8]) -> bool {
        row >= self.start_key.as_slice() && (self.end_key.is_empty() || row < self.end_key.as_slice())
    }

    /// Descriptor of another replica of the same region
    pub fn for_replica(&self, replica_id: u16) -> RegionInfo {
        if replica_id == self.replica_id {
            return self.clone();
        }
        // Fields were already validated; only the derived names change
        let mut builder = self.to_builder();
        builder.replica_id = replica_id;
        builder.finish()
    }

    /// Descriptor of the default replica
    pub fn for_default_replica(&self) -> RegionInfo {
        self.for_replica(DEFAULT_REPLICA_ID)
    }

    /// Serialize for storage in a catalog column
    pub fn to_bytes(&self) -> CatalogResult<Vec<u8>> {
        let record = RegionInfoRecord {
            table: self.table.as_str().to_string(),
            start_key: self.start_key.clone(),
            end_key: self.end_key.clone(),
            region_id: self.region_id,
            replica_id: self.replica_id,
            offline: self.offline,
            split: self.split,
        };
        let mut out = REGION_INFO_MAGIC.to_vec();
        out.extend(bincode::serialize(&record)?);
        Ok(out)
    }

    /// Deserialize a catalog column value
    pub fn parse_from(bytes: &[u8]) -> CatalogResult<RegionInfo> {
        let body = bytes
            .strip_prefix(REGION_INFO_MAGIC.as_slice())
            .ok_or_else(|| {
                CatalogError::Serialization("region descriptor has no magic prefix".to_string())
            })?;
        let record: RegionInfoRecord = bincode::deserialize(body)?;
        RegionInfo::builder(TableName::new(record.table)?)
            .start_key(record.start_key)
            .end_key(record.end_key)
            .region_id(record.region_id)
            .replica_id(record.replica_id)
            .offline(record.offline)
            .split(record.split)
            .build()
    }

    /// Deserialize, mapping any failure to `None`
    pub fn parse_from_or_none(bytes: &[u8]) -> Option<RegionInfo> {
        Self::parse_from(bytes).ok()
    }
}

impl fmt::Display for RegionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ENCODED => {}, NAME => '{}', STARTKEY => '{}', ENDKEY => '{}'",
            self.encoded_name,
            self.region_name_as_string(),
            to_string_binary(&self.start_key),
            to_string_binary(&self.end_key)
        )?;
        if self.offline {
            write!(f, ", OFFLINE => true")?;
        }
        if self.split {
            write!(f, ", SPLIT => true")?;
        }
        if self.replica_id > DEFAULT_REPLICA_ID {
            write!(f, ", REPLICA_ID => {}", self.replica_id)?;
        }
        write!(f, "}}")
    }
}

/// Builder for [`RegionInfo`]
#[derive(Debug, Clone)]
pub struct RegionInfoBuilder {
    table: TableName,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    region_id: u64,
    replica_id: u16,
    offline: bool,
    split: bool,
}

impl RegionInfoBuilder {
    /// Inclusive start key
    pub fn start_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.start_key = key.into();
        self
    }

    /// Exclusive end key
    pub fn end_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.end_key = key.into();
        self
    }

    /// Creation timestamp
    pub fn region_id(mut self, id: u64) -> Self {
        self.region_id = id;
        self
    }

    /// Replica index
    pub fn replica_id(mut self, id: u16) -> Self {
        self.replica_id = id;
        self
    }

    /// Offline flag
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Split flag
    pub fn split(mut self, split: bool) -> Self {
        self.split = split;
        self
    }

    /// Validate and build
    ///
    /// A non-empty end key must sort strictly after the start key.
    pub fn build(self) -> CatalogResult<RegionInfo> {
        if !self.end_key.is_empty() && self.start_key >= self.end_key {
            return Err(CatalogError::InvalidArgument(format!(
                "start key '{}' must be less than end key '{}'",
                to_string_binary(&self.start_key),
                to_string_binary(&self.end_key)
            )));
        }
        Ok(self.finish())
    }

    fn finish(self) -> RegionInfo {
        let region_name = row_key::create_region_name(
            &self.table,
            &self.start_key,
            self.region_id.to_string().as_bytes(),
            self.replica_id,
            true,
        );
        let encoded_name = row_key::encode_region_name(&region_name);
        RegionInfo {
            table: self.table,
            start_key: self.start_key,
            end_key: self.end_key,
            region_id: self.region_id,
            replica_id: self.replica_id,
            offline: self.offline,
            split: self.split,
            region_name,
            encoded_name,
        }
    }
}

/// Where one replica of a region lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionLocation {
    /// Replica-specific descriptor
    pub region: RegionInfo,
    /// Hosting server, `None` when unassigned
    pub server: Option<ServerName>,
    /// Open sequence number, `None` when unknown
    pub seq_num: Option<u64>,
}

impl RegionLocation {
    /// Create a location
    pub fn new(region: RegionInfo, server: Option<ServerName>, seq_num: Option<u64>) -> Self {
        RegionLocation {
            region,
            server,
            seq_num,
        }
    }
}

/// Locations of every replica recorded in one catalog row
///
/// Slot `i` is replica `i`. Slot 0 is always populated; other slots are
/// `None` for provisioned-but-unassigned replicas. The slot count is the
/// replica count of the region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionLocations {
    locations: Vec<Option<RegionLocation>>,
}

impl RegionLocations {
    /// Wrap per-replica slots
    pub fn new(locations: Vec<Option<RegionLocation>>) -> Self {
        RegionLocations { locations }
    }

    /// Location of a replica
    pub fn get(&self, replica_id: u16) -> Option<&RegionLocation> {
        self.locations
            .get(usize::from(replica_id))
            .and_then(|slot| slot.as_ref())
    }

    /// Location of the default replica
    pub fn default_location(&self) -> Option<&RegionLocation> {
        self.get(DEFAULT_REPLICA_ID)
    }

    /// Number of replica slots
    pub fn replica_count(&self) -> usize {
        self.locations.len()
    }

    /// All slots
    pub fn slots(&self) -> &[Option<RegionLocation>] {
        &self.locations
    }

    /// Populated slots
    pub fn iter(&self) -> impl Iterator<Item = &RegionLocation> {
        self.locations.iter().flatten()
    }
}
