//! Command Handler
//!
//! Executes parsed session requests against a [`ShardStore`] and turns the
//! outcome into a [`Reply`].
//!
//! ## Supported Operations
//!
//! ### Key Operations
//! - `set key value` - Store a value
//! - `get key` - Fetch a value (`found:false` when absent)
//! - `remove key` / `del key` - Remove a key (count of removed records)
//! - `contains key` - Whether a record exists
//! - `entry key` - The full record including its timestamp
//! - `locate key` - The digest and shard path for a key
//!
//! ### Store Operations
//! - `keys` - Every key (full scan)
//! - `len` - Number of keys (full scan)
//! - `clear` - Delete everything under the root
//! - `flush` - Write buffered shards (count of shards written)
//! - `stats` - Operation counters
//! - `ping` - Liveness check
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │   Request   │───>│  dispatch() │───>│    Reply    │      │
//! │  └─────────────┘    └──────┬──────┘    └─────────────┘      │
//! │                            │                                │
//! │                            ▼                                │
//! │                        ShardStore                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::{Reply, Request};
use crate::storage::{ShardStore, StoreError, StoreResult};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, warn};

/// Executes requests against a store it owns.
#[derive(Debug)]
pub struct CommandHandler {
    /// The store
    store: ShardStore,
    /// Handler start time, reported by `stats`
    start_time: Instant,
}

impl CommandHandler {
    /// Creates a new command handler around the given store.
    pub fn new(store: ShardStore) -> Self {
        Self {
            store,
            start_time: Instant::now(),
        }
    }

    pub fn store(&self) -> &ShardStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ShardStore {
        &mut self.store
    }

    /// Gives the store back, e.g. to flush it explicitly.
    pub fn into_store(self) -> ShardStore {
        self.store
    }

    /// Executes a request and returns the reply.
    ///
    /// Store failures become error replies; they never abort the caller.
    pub fn execute(&mut self, request: Request) -> Reply {
        let op = request.name();
        match self.dispatch(request) {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    StoreError::Io { .. } => warn!(op, error = %e, "Command failed"),
                    _ => debug!(op, error = %e, "Command rejected"),
                }
                Reply::error(e.kind(), e.to_string())
            }
        }
    }

    /// Dispatches a request to the store.
    fn dispatch(&mut self, request: Request) -> StoreResult<Reply> {
        let reply = match request {
            Request::Set { key, value } => {
                self.store.set(&key, value)?;
                Reply::Ok
            }
            Request::Get { key } => match self.store.get(&key)? {
                Some(value) => Reply::Found(value),
                None => Reply::NotFound,
            },
            Request::Remove { key } => Reply::Count(u64::from(self.store.remove(&key)?)),
            Request::Contains { key } => Reply::Bool(self.store.contains(&key)?),
            Request::Entry { key } => match self.store.entry(&key)? {
                Some(record) => Reply::Found(serde_json::to_value(record)?),
                None => Reply::NotFound,
            },
            Request::Locate { key } => {
                let location = self.store.locate(&key)?;
                Reply::Object(json!({
                    "digest": location.digest,
                    "directory": location.directory.display().to_string(),
                    "file": location.file.display().to_string(),
                }))
            }
            Request::Keys => Reply::Keys(self.store.keys()?),
            Request::Len => Reply::Count(self.store.len()? as u64),
            Request::Clear => {
                self.store.clear()?;
                Reply::Ok
            }
            Request::Flush => Reply::Count(self.store.flush()? as u64),
            Request::Stats => {
                let mut stats = serde_json::to_value(self.store.stats())?;
                stats["uptime_ms"] = json!(self.start_time.elapsed().as_millis() as u64);
                stats["root"] = json!(self.store.root().display().to_string());
                stats["auto_save"] = json!(self.store.options().auto_save);
                Reply::Object(stats)
            }
            Request::Ping => Reply::Pong,
        };
        Ok(reply)
    }
}
