//! Store errors.

use serde_json::Value;
use std::io;
use std::path::PathBuf;

/// Errors surfaced by [`ShardStore`](super::ShardStore) operations.
///
/// Corrupt or unreadable shards are not errors: they are reported through a
/// [`DiagnosticSink`](super::DiagnosticSink) and read as empty.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A key was supplied that is not a string
    #[error("key must be a string, got {found}")]
    TypeMismatch { found: &'static str },

    /// Directory creation, file write, or deletion failed
    #[error("I/O failure at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The value could not be converted to or from JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable label for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::TypeMismatch { .. } => "type_mismatch",
            StoreError::Io { .. } => "io",
            StoreError::Serialization(_) => "serialization",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Anything that can be used as a cache key.
///
/// Statically typed callers pass `&str` or `String`. Callers holding
/// dynamically typed input pass a [`serde_json::Value`], which is only
/// accepted when it is a JSON string.
pub trait StoreKey {
    fn as_key(&self) -> StoreResult<&str>;
}

impl StoreKey for str {
    fn as_key(&self) -> StoreResult<&str> {
        Ok(self)
    }
}

impl StoreKey for String {
    fn as_key(&self) -> StoreResult<&str> {
        Ok(self.as_str())
    }
}

impl<K: StoreKey + ?Sized> StoreKey for &K {
    fn as_key(&self) -> StoreResult<&str> {
        (**self).as_key()
    }
}

impl StoreKey for Value {
    fn as_key(&self) -> StoreResult<&str> {
        match self {
            Value::String(s) => Ok(s.as_str()),
            other => Err(StoreError::TypeMismatch {
                found: json_type_name(other),
            }),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_keys() {
        assert_eq!("abc".as_key().unwrap(), "abc");
        assert_eq!(String::from("abc").as_key().unwrap(), "abc");
        assert_eq!(json!("abc").as_key().unwrap(), "abc");
    }

    #[test]
    fn test_non_string_json_keys() {
        for (key, found) in [
            (json!(123), "number"),
            (json!(null), "null"),
            (json!(true), "boolean"),
            (json!(["a"]), "array"),
            (json!({"a": 1}), "object"),
        ] {
            match key.as_key() {
                Err(StoreError::TypeMismatch { found: f }) => assert_eq!(f, found),
                other => panic!("expected type mismatch, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_error_kind_and_display() {
        let err = StoreError::TypeMismatch { found: "number" };
        assert_eq!(err.kind(), "type_mismatch");
        assert_eq!(err.to_string(), "key must be a string, got number");

        let err = StoreError::io("/tmp/x", io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(err.kind(), "io");
        assert_eq!(err.to_string(), "I/O failure at /tmp/x: disk full");
    }
}
