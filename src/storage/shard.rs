//! Shard Documents
//!
//! A shard is one JSON file holding every record whose key digest shares the
//! shard's four-character prefix. On disk it is a single JSON object keyed by
//! the full digest:
//!
//! ```text
//! {
//!   "14c4b06b824ec593239362517f538b29": {
//!     "key": "username",
//!     "value": "zhangsan",
//!     "timestamp": 1718000000000
//!   }
//! }
//! ```
//!
//! The whole document is read, modified in memory, and written back on every
//! mutation. There is no append path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use tracing::trace;

/// The stored unit for a single key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The original key, kept so the store can be enumerated
    pub key: String,
    /// The cached value
    pub value: Value,
    /// Last write time in milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl Record {
    /// Creates a record stamped with the current time.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Mapping from full key digest to record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardDocument {
    records: BTreeMap<String, Record>,
}

impl ShardDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, digest: &str) -> Option<&Record> {
        self.records.get(digest)
    }

    /// Inserts or replaces the record for `digest`, returning the previous one.
    pub fn insert(&mut self, digest: impl Into<String>, record: Record) -> Option<Record> {
        self.records.insert(digest.into(), record)
    }

    pub fn remove(&mut self, digest: &str) -> Option<Record> {
        self.records.remove(digest)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in digest order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }
}

/// Why a shard file that exists could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ShardReadError {
    /// The file exists but could not be read
    #[error("unreadable shard: {0}")]
    Unreadable(#[source] io::Error),

    /// The file was read but is not a valid shard document
    #[error("corrupt shard: {0}")]
    Corrupt(#[source] serde_json::Error),
}

/// Reads a shard document from disk.
///
/// Returns `Ok(None)` when the file does not exist. A file holding only
/// whitespace is an empty document.
pub fn read_shard(path: &Path) -> Result<Option<ShardDocument>, ShardReadError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ShardReadError::Unreadable(e)),
    };

    trace!(path = %path.display(), bytes = contents.len(), "Read shard");

    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(Some(ShardDocument::new()));
    }

    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(ShardReadError::Corrupt)
}

/// Writes a shard document, replacing whatever the file held before.
pub fn write_shard(path: &Path, document: &ShardDocument) -> io::Result<()> {
    let contents = serde_json::to_vec_pretty(document)?;
    fs::write(path, &contents)?;
    trace!(
        path = %path.display(),
        bytes = contents.len(),
        records = document.len(),
        "Wrote shard"
    );
    Ok(())
}
