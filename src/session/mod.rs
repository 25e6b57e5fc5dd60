//! Session Module
//!
//! Runs a stream of JSON-line requests against one store, so scripts can
//! drive the cache through a pipe instead of spawning one process per call.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 stdin / any BufRead                         │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ one request per line
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Session                                │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read line   │───>│ Parse JSON  │───>│ Execute cmd │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Write reply │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use shardcache::commands::CommandHandler;
//! use shardcache::session::{handle_session, SessionStats};
//! use shardcache::storage::ShardStore;
//! use std::io::Cursor;
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let handler = CommandHandler::new(ShardStore::open(dir.path()).unwrap());
//!
//! let input = Cursor::new(&b"{\"op\":\"set\",\"key\":\"a\",\"value\":1}\n{\"op\":\"len\"}\n"[..]);
//! let mut output = Vec::new();
//! handle_session(input, &mut output, handler, Arc::new(SessionStats::new())).unwrap();
//!
//! assert_eq!(String::from_utf8(output).unwrap().lines().count(), 2);
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_session, Session, SessionError, SessionStats};
