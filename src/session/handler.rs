//! Session Handler
//!
//! Drives a [`CommandHandler`] from a line-oriented reader, writing one reply
//! line per request.
//!
//! ## Session Lifecycle
//!
//! ```text
//! 1. Session created around a reader, a writer and a store
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read one line           │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Parse request           │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute against store   │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Write + flush reply     │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. End of input: flush buffered shards, return
//! ```
//!
//! A malformed line gets an `invalid_request` reply and the session carries on.
//! That covers bytes that are not UTF-8 and lines over the size limit; an
//! oversized line is never buffered past the limit, the rest of it is skipped.
//! Only I/O failures on the reader or writer end the session early.

use crate::commands::CommandHandler;
use crate::protocol::{parse_request, ParseError, Reply, MAX_REQUEST_SIZE};
use crate::storage::StoreError;
use std::io::{BufRead, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Statistics for session handling
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Total requests processed (including malformed ones)
    pub requests_processed: AtomicU64,
    /// Requests that produced an error reply
    pub errors: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_processed(&self, failed: bool) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading requests or writing replies failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Buffered shards could not be flushed at end of input
    #[error("flush failed: {0}")]
    FlushFailed(#[from] StoreError),
}

/// Runs requests from one reader against one store.
pub struct Session<R, W> {
    reader: R,
    writer: W,

    /// Reused line buffer
    line: Vec<u8>,

    /// Longest accepted request line, newline excluded
    max_request_size: usize,

    command_handler: CommandHandler,

    /// Session statistics (shared)
    stats: Arc<SessionStats>,
}

impl<R: BufRead, W: Write> Session<R, W> {
    /// Creates a new session.
    ///
    /// # Arguments
    ///
    /// * `reader` - Source of request lines
    /// * `writer` - Sink for reply lines
    /// * `command_handler` - The command handler owning the store
    /// * `stats` - Shared session statistics
    pub fn new(
        reader: R,
        writer: W,
        command_handler: CommandHandler,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            reader,
            writer,
            line: Vec::new(),
            max_request_size: MAX_REQUEST_SIZE,
            command_handler,
            stats,
        }
    }

    /// Sets the longest accepted request line.
    pub fn max_request_size(mut self, max: usize) -> Self {
        self.max_request_size = max;
        self
    }

    /// Runs the session until end of input.
    ///
    /// Returns the command handler so the caller can keep using the store.
    pub fn run(mut self) -> Result<CommandHandler, SessionError> {
        debug!("Session started");

        self.main_loop()?;

        let flushed = self.command_handler.store_mut().flush()?;
        info!(
            requests = self.stats.requests_processed.load(Ordering::Relaxed),
            errors = self.stats.errors.load(Ordering::Relaxed),
            flushed,
            "Session finished"
        );

        Ok(self.command_handler)
    }

    /// The main read-execute-reply loop.
    fn main_loop(&mut self) -> Result<(), SessionError> {
        loop {
            self.line.clear();

            // One byte past the limit is enough to tell an oversized line apart.
            let limit = self.max_request_size as u64 + 1;
            let n = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.line)?;
            if n == 0 {
                return Ok(());
            }
            self.stats.bytes_read(n);

            let size = n - usize::from(self.line.last() == Some(&b'\n'));
            let reply = if size > self.max_request_size {
                let (skipped, newline) = self.skip_rest_of_line()?;
                self.stats.bytes_read(skipped);

                let err = ParseError::RequestTooLarge {
                    size: size + skipped - usize::from(newline),
                    max: self.max_request_size,
                };
                warn!(error = %err, "Parse error");
                Reply::error("invalid_request", err.to_string())
            } else {
                match std::str::from_utf8(&self.line) {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => match parse_request(line) {
                        Ok(request) => {
                            trace!(op = request.name(), "Parsed request");
                            self.command_handler.execute(request)
                        }
                        Err(e) => {
                            warn!(error = %e, "Parse error");
                            Reply::error("invalid_request", e.to_string())
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "Request is not UTF-8");
                        Reply::error("invalid_request", ParseError::InvalidUtf8.to_string())
                    }
                }
            };

            self.stats.request_processed(reply.is_error());
            self.send_reply(&reply)?;
        }
    }

    /// Discards input up to and including the next newline. Returns the
    /// number of bytes skipped and whether a newline ended them.
    fn skip_rest_of_line(&mut self) -> Result<(usize, bool), SessionError> {
        let mut skipped = 0;
        loop {
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if available.is_empty() {
                return Ok((skipped, false));
            }

            let (used, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            };
            self.reader.consume(used);
            skipped += used;
            if done {
                return Ok((skipped, true));
            }
        }
    }

    /// Writes one reply line and flushes it.
    fn send_reply(&mut self, reply: &Reply) -> Result<(), SessionError> {
        let bytes = reply.serialize();
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.stats.bytes_written(bytes.len());
        trace!(bytes = bytes.len(), "Sent reply");
        Ok(())
    }
}

/// Runs a session to completion.
///
/// This is a convenience function that creates a [`Session`] and runs it.
///
/// # Arguments
///
/// * `reader` - Source of request lines
/// * `writer` - Sink for reply lines
/// * `command_handler` - The command handler for executing requests
/// * `stats` - Shared session statistics
pub fn handle_session<R: BufRead, W: Write>(
    reader: R,
    writer: W,
    command_handler: CommandHandler,
    stats: Arc<SessionStats>,
) -> Result<CommandHandler, SessionError> {
    Session::new(reader, writer, command_handler, stats).run()
}
