//! Session Request Parser
//!
//! Sessions speak JSON lines: one request object per line, dispatched on its
//! `"op"` field.
//!
//! ```text
//! {"op":"set","key":"username","value":"zhangsan"}
//! {"op":"get","key":"username"}
//! {"op":"remove","key":"username"}          (alias: "del")
//! {"op":"contains","key":"username"}
//! {"op":"entry","key":"username"}
//! {"op":"locate","key":"username"}
//! {"op":"keys"}  {"op":"len"}  {"op":"clear"}
//! {"op":"flush"} {"op":"stats"} {"op":"ping"}
//! ```
//!
//! Keys are kept as raw JSON values here. Whether a key is a string is the
//! store's decision, so `{"op":"get","key":123}` parses fine and fails later
//! with a type mismatch.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while parsing a request line.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The line is blank
    #[error("empty input")]
    EmptyInput,

    /// The line is not valid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The JSON is valid but not an object
    #[error("request must be a JSON object")]
    NotAnObject,

    /// The object has no string `op` field
    #[error("request is missing the \"op\" field")]
    MissingOp,

    /// The `op` field names no known operation
    #[error("unknown op '{0}'")]
    UnknownOp(String),

    /// The operation is known but its fields are wrong
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The line is not valid UTF-8
    #[error("request is not valid UTF-8")]
    InvalidUtf8,

    /// The line exceeds the maximum allowed size
    #[error("request too large: {size} bytes (max: {max})")]
    RequestTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size of a single request line (16 MB)
pub const MAX_REQUEST_SIZE: usize = 16 * 1024 * 1024;

/// Every accepted `op` value, aliases included.
pub const OPS: &[&str] = &[
    "set", "get", "remove", "del", "contains", "entry", "locate", "keys", "len", "clear", "flush",
    "stats", "ping",
];

/// A parsed session request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Set { key: Value, value: Value },
    Get { key: Value },
    #[serde(alias = "del")]
    Remove { key: Value },
    Contains { key: Value },
    Entry { key: Value },
    Locate { key: Value },
    Keys,
    Len,
    Clear,
    Flush,
    Stats,
    Ping,
}

impl Request {
    /// The canonical op name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Set { .. } => "set",
            Request::Get { .. } => "get",
            Request::Remove { .. } => "remove",
            Request::Contains { .. } => "contains",
            Request::Entry { .. } => "entry",
            Request::Locate { .. } => "locate",
            Request::Keys => "keys",
            Request::Len => "len",
            Request::Clear => "clear",
            Request::Flush => "flush",
            Request::Stats => "stats",
            Request::Ping => "ping",
        }
    }
}

/// Parses one request line.
///
/// # Example
///
/// ```
/// use shardcache::protocol::{parse_request, Request};
/// use serde_json::json;
///
/// let request = parse_request(r#"{"op":"get","key":"name"}"#).unwrap();
/// assert_eq!(request, Request::Get { key: json!("name") });
/// ```
pub fn parse_request(line: &str) -> ParseResult<Request> {
    if line.len() > MAX_REQUEST_SIZE {
        return Err(ParseError::RequestTooLarge {
            size: line.len(),
            max: MAX_REQUEST_SIZE,
        });
    }

    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let value: Value =
        serde_json::from_str(line).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let op = match &value {
        Value::Object(fields) => match fields.get("op") {
            Some(Value::String(op)) => op.clone(),
            _ => return Err(ParseError::MissingOp),
        },
        _ => return Err(ParseError::NotAnObject),
    };

    if !OPS.contains(&op.as_str()) {
        return Err(ParseError::UnknownOp(op));
    }

    Request::deserialize(value).map_err(|e| ParseError::InvalidRequest(e.to_string()))
}
