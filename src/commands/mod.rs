//! Command Handler Module
//!
//! This module implements the command processing layer for shardcache.
//! It receives parsed session requests, executes them against the store,
//! and returns appropriate replies.
//!
//! ## Architecture
//!
//! ```text
//! Request Line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Request Parser  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Execute      │
//! │  - Map errors   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   ShardStore    │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
