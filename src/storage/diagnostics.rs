//! Diagnostics for recovered shard failures.
//!
//! Read paths never fail on a bad shard: an unreadable or corrupt file is
//! treated as an empty document and the problem is handed to a
//! [`DiagnosticSink`]. The default sink logs through `tracing`; embedders and
//! tests can install their own.

use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A shard problem that was recovered from by treating the shard as empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The shard file exists but does not parse as a shard document
    CorruptShard { path: PathBuf, reason: String },
    /// The shard file exists but could not be read
    UnreadableShard { path: PathBuf, reason: String },
}

impl Diagnostic {
    pub fn path(&self) -> &Path {
        match self {
            Diagnostic::CorruptShard { path, .. } | Diagnostic::UnreadableShard { path, .. } => {
                path
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::CorruptShard { path, reason } => {
                write!(f, "corrupt shard {}: {}", path.display(), reason)
            }
            Diagnostic::UnreadableShard { path, reason } => {
                write!(f, "unreadable shard {}: {}", path.display(), reason)
            }
        }
    }
}

/// Receives diagnostics from a store.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Logs every diagnostic as a `WARN` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::CorruptShard { path, reason } => {
                warn!(path = %path.display(), reason = %reason, "Corrupt shard treated as empty");
            }
            Diagnostic::UnreadableShard { path, reason } => {
                warn!(path = %path.display(), reason = %reason, "Unreadable shard treated as empty");
            }
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything reported so far.
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drains the recorded diagnostics.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        self.events.lock().push(diagnostic.clone());
    }
}
