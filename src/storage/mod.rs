//! Storage Module
//!
//! This module provides the core storage functionality for shardcache:
//! a key-value store persisted as JSON shard files on the local filesystem.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ShardStore                            │
//! │                                                             │
//! │  key ──> layout::resolve ──> <root>/a/b/c/d.json            │
//! │                                   │                         │
//! │                        shard::read_shard / write_shard      │
//! │                                   │                         │
//! │                  DiagnosticSink <─┘ (corrupt shards)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Deterministic Sharding**: up to 65,536 shard files chosen by MD5 prefix
//! - **Lazy Layout**: shard directories are created the first time a key needs them
//! - **Self-Cleaning**: a shard whose last record is removed is deleted
//! - **Best-Effort Reads**: corrupt shards read as empty and are reported, not raised
//! - **Optional Buffering**: with auto-save off, writes are held until `flush`
//!
//! ## Example
//!
//! ```
//! use shardcache::storage::{ShardStore, StoreOptions};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut store = ShardStore::open_with(dir.path(), StoreOptions::new()).unwrap();
//!
//! store.set("config", json!({"retries": 3})).unwrap();
//! assert_eq!(store.get("config").unwrap(), Some(json!({"retries": 3})));
//!
//! let location = store.locate("config").unwrap();
//! assert!(location.file.exists());
//! ```

pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod layout;
pub mod shard;

// Re-export commonly used types
pub use diagnostics::{Diagnostic, DiagnosticSink, RecordingSink, TracingSink};
pub use engine::{ShardStore, StoreOptions, StoreStats};
pub use error::{StoreError, StoreKey, StoreResult};
pub use layout::ShardLocation;
pub use shard::{Record, ShardDocument};
