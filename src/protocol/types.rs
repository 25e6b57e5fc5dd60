//! Session Reply Types
//!
//! Every request in a session gets exactly one reply: a single-line JSON
//! object terminated by `\n`.
//!
//! ## Reply Shapes
//!
//! ```text
//! Ok           {"ok":true}
//! Pong         {"ok":true,"message":"pong"}
//! Found        {"ok":true,"found":true,"value":<json>}
//! NotFound     {"ok":true,"found":false}
//! Bool         {"ok":true,"result":true}
//! Count        {"ok":true,"count":3}
//! Keys         {"ok":true,"keys":["a","b"]}
//! Object       {"ok":true,"result":{...}}
//! Error        {"ok":false,"error":{"kind":"type_mismatch","message":"..."}}
//! ```
//!
//! `NotFound` is a successful reply. A missing key is never an error.

use serde_json::{json, Value};
use std::fmt;

/// Line terminator for every reply.
pub const NEWLINE: u8 = b'\n';

/// A reply to one session request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The request succeeded and has nothing to return
    Ok,

    /// Reply to `ping`
    Pong,

    /// A value was found (may itself be JSON `null`)
    Found(Value),

    /// No record exists for the key
    NotFound,

    /// A yes/no answer
    Bool(bool),

    /// A count (keys, removed records, flushed shards)
    Count(u64),

    /// A list of keys
    Keys(Vec<String>),

    /// A structured result (stats, shard locations)
    Object(Value),

    /// The request failed
    Error { kind: String, message: String },
}

impl Reply {
    /// Creates an error reply.
    ///
    /// # Example
    /// ```
    /// use shardcache::protocol::Reply;
    /// let reply = Reply::error("io", "disk full");
    /// assert!(reply.is_error());
    /// ```
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Reply::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }

    /// Renders the reply as a JSON object.
    pub fn to_json(&self) -> Value {
        match self {
            Reply::Ok => json!({ "ok": true }),
            Reply::Pong => json!({ "ok": true, "message": "pong" }),
            Reply::Found(value) => json!({ "ok": true, "found": true, "value": value }),
            Reply::NotFound => json!({ "ok": true, "found": false }),
            Reply::Bool(b) => json!({ "ok": true, "result": b }),
            Reply::Count(n) => json!({ "ok": true, "count": n }),
            Reply::Keys(keys) => json!({ "ok": true, "keys": keys }),
            Reply::Object(value) => json!({ "ok": true, "result": value }),
            Reply::Error { kind, message } => json!({
                "ok": false,
                "error": { "kind": kind, "message": message }
            }),
        }
    }

    /// Serializes the reply as one newline-terminated line.
    pub fn serialize(&self) -> Vec<u8> {
        let mut line = self.to_json().to_string().into_bytes();
        line.push(NEWLINE);
        line
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
