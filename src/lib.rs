//! # shardcache - A Local Key-Value Cache on Sharded JSON Files
//!
//! shardcache is a single-process key-value cache that persists every entry as
//! JSON on the local filesystem. It is meant for command-line tools,
//! development-time mocking and single-machine scripts.
//!
//! ## Features
//!
//! - **Deterministic Sharding**: keys map to one of 65,536 shard files by MD5 prefix
//! - **Plain JSON on Disk**: every shard is a readable JSON document
//! - **No Daemon**: every operation is synchronous file I/O, nothing runs in the background
//! - **Best-Effort Reads**: corrupt shards are reported and read as empty
//! - **Scriptable**: a CLI and a JSON-lines session mode
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              shardcache                                 │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ CLI / stdin │───>│  Session    │───>│  Command    │                  │
//! │  │             │    │  (lines)    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │  Request    │    │               ShardStore                     │    │
//! │  │  Parser     │    │   <root>/0/0/0/0.json ... <root>/f/f/f/f.json│    │
//! │  └─────────────┘    └──────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use shardcache::ShardStore;
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut store = ShardStore::open(dir.path()).unwrap();
//!
//! store.set("user:1", json!({"name": "Ariz", "admin": true})).unwrap();
//! assert_eq!(store.get("user:1").unwrap(), Some(json!({"name": "Ariz", "admin": true})));
//! assert_eq!(store.get("user:2").unwrap(), None);
//! ```
//!
//! ## On-Disk Layout
//!
//! ```text
//! <root>/<h1>/<h2>/<h3>/<h4>.json
//!
//! { "<md5 hex>": { "key": "...", "value": <json>, "timestamp": <ms> }, ... }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: The shard store, shard layout and file protocol
//! - [`protocol`]: JSON-lines request parser and reply types
//! - [`commands`]: Request dispatch against a store
//! - [`session`]: Line-oriented request loop
//!
//! ## Limitations
//!
//! There is no locking. Two stores or processes writing the same root
//! directory at the same time can lose updates or corrupt a shard.

pub mod commands;
pub mod protocol;
pub mod session;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use protocol::{parse_request, ParseError, Reply, Request};
pub use session::{handle_session, SessionStats};
pub use storage::{Record, ShardStore, StoreError, StoreOptions, StoreResult};

/// The default cache root used by the CLI
pub const DEFAULT_ROOT: &str = ".shardcache";

/// Version of shardcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
