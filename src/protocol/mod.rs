//! Session Protocol
//!
//! A line-oriented JSON protocol for driving a store from scripts and other
//! processes through stdin/stdout.
//!
//! ## Overview
//!
//! Each request is one JSON object on one line; each reply is one JSON object
//! on one line, in request order.
//!
//! ## Modules
//!
//! - `types`: Defines the `Reply` enum and its line encoding
//! - `parser`: Parses request lines into `Request`s
//!
//! ## Example
//!
//! ```
//! use shardcache::protocol::{parse_request, Reply, Request};
//! use serde_json::json;
//!
//! let request = parse_request(r#"{"op":"set","key":"name","value":"Ariz"}"#).unwrap();
//! assert_eq!(request.name(), "set");
//!
//! let reply = Reply::Found(json!("Ariz"));
//! assert_eq!(reply.to_json()["value"], json!("Ariz"));
//! assert!(reply.serialize().ends_with(b"\n"));
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_request, ParseError, ParseResult, Request, MAX_REQUEST_SIZE, OPS};
pub use types::Reply;
