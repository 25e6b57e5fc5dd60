//! Shard Store
//!
//! This module implements the core storage engine for shardcache: a key-value
//! cache persisted as JSON shard files under a root directory.
//!
//! ## Design Decisions
//!
//! 1. **Deterministic Sharding**: Every key maps to exactly one shard file via its MD5 digest.
//! 2. **Read-Modify-Write**: Each mutation reads the whole shard, edits it, and writes it back.
//! 3. **No Hidden State**: With auto-save on (the default) nothing is cached between calls.
//! 4. **Degrade, Don't Fail**: Unreadable shards read as empty and are reported to a
//!    [`DiagnosticSink`]; write failures always propagate.
//!
//! ## Operation Flow
//!
//! ```text
//!   set / get / remove
//!          │
//!          ▼
//!   ┌──────────────┐      ┌──────────────────────────────┐
//!   │ layout::     │─────>│ <root>/a/b/c/d.json          │
//!   │ resolve(key) │      │ { digest: {key,value,ts} }   │
//!   └──────────────┘      └──────────────┬───────────────┘
//!                                        │ read
//!                                        ▼
//!                          modify document in memory
//!                                        │
//!                  ┌─────────────────────┴───────────────────┐
//!                  ▼                                         ▼
//!          write whole document                 delete file when empty
//! ```
//!
//! ## Concurrency Model
//!
//! None. A store instance owns its root directory for its lifetime. Two stores
//! (or processes) writing the same root can interleave and lose updates.

use crate::storage::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::storage::error::{StoreError, StoreKey, StoreResult};
use crate::storage::layout::{self, ShardLocation, SHARD_DEPTH};
use crate::storage::shard::{read_shard, write_shard, Record, ShardDocument, ShardReadError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace};
use walkdir::WalkDir;

/// Configuration for a [`ShardStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Write every mutation through to disk immediately (default: true).
    ///
    /// When disabled, mutated shards are buffered in memory until
    /// [`ShardStore::flush`] is called or the store is dropped.
    pub auto_save: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { auto_save: true }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_save(mut self, enabled: bool) -> Self {
        self.auto_save = enabled;
        self
    }
}

/// Operation counters.
#[derive(Debug, Default)]
struct Counters {
    sets: AtomicU64,
    gets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    removes: AtomicU64,
    clears: AtomicU64,
    flushes: AtomicU64,
    corrupt_shards: AtomicU64,
}

#[inline]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Total set operations
    pub sets: u64,
    /// Total lookups (get, entry, contains)
    pub gets: u64,
    /// Lookups that found a record
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Total remove operations
    pub removes: u64,
    /// Total clear operations
    pub clears: u64,
    /// Total flushes of the pending buffer
    pub flushes: u64,
    /// Shards that were unreadable or corrupt and read as empty
    pub corrupt_shards: u64,
    /// Shards currently waiting to be flushed
    pub pending_shards: u64,
}

/// A key-value cache persisted as sharded JSON files.
///
/// # Example
///
/// ```
/// use shardcache::storage::ShardStore;
/// use serde_json::json;
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut store = ShardStore::open(dir.path()).unwrap();
///
/// store.set("username", "zhangsan").unwrap();
/// assert_eq!(store.get("username").unwrap(), Some(json!("zhangsan")));
/// assert_eq!(store.keys().unwrap(), vec!["username".to_string()]);
/// assert_eq!(store.len().unwrap(), 1);
///
/// store.remove("username").unwrap();
/// assert_eq!(store.get("username").unwrap(), None);
/// assert_eq!(store.len().unwrap(), 0);
///
/// // Dynamically typed keys must be strings
/// assert!(store.get(&json!(123)).is_err());
/// ```
pub struct ShardStore {
    /// Root of the shard tree
    root: PathBuf,

    options: StoreOptions,

    /// Receives recovered shard failures
    diagnostics: Arc<dyn DiagnosticSink>,

    /// Mutated shards not yet written (only used when auto-save is off).
    /// An empty document means the file is due for deletion.
    pending: BTreeMap<PathBuf, ShardDocument>,

    counters: Counters,
}

impl std::fmt::Debug for ShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardStore")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ShardStore {
    /// Opens a store rooted at `root` with default options.
    ///
    /// The root directory and any missing parents are created.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(root, StoreOptions::default())
    }

    /// Opens a store rooted at `root` with the given options.
    pub fn open_with(root: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;

        debug!(root = %root.display(), auto_save = options.auto_save, "Opened shard store");

        Ok(Self {
            root,
            options,
            diagnostics: Arc::new(TracingSink),
            pending: BTreeMap::new(),
            counters: Counters::default(),
        })
    }

    /// Replaces the sink that receives corrupt-shard diagnostics.
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Resolves a key to its shard location without touching the disk.
    pub fn locate<K: StoreKey + ?Sized>(&self, key: &K) -> StoreResult<ShardLocation> {
        Ok(layout::resolve(&self.root, key.as_key()?))
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// The whole shard document is rewritten, so the cost grows with the
    /// number of keys sharing the shard.
    pub fn set<K, V>(&mut self, key: &K, value: V) -> StoreResult<()>
    where
        K: StoreKey + ?Sized,
        V: Serialize,
    {
        let key = key.as_key()?;
        let value = serde_json::to_value(value)?;
        bump(&self.counters.sets);

        let location = layout::resolve(&self.root, key);
        let mut document = match self.pending.remove(&location.file) {
            Some(document) => document,
            None => self.read_document(&location.file).unwrap_or_default(),
        };

        let replaced = document
            .insert(location.digest.clone(), Record::new(key, value))
            .is_some();
        debug!(key = %key, shard = %location.file.display(), replaced, "Set key");

        self.commit(location.file, document)
    }

    /// Returns the value stored under `key`, or `None` if there is no record.
    ///
    /// A stored JSON `null` comes back as `Some(Value::Null)`.
    pub fn get<K: StoreKey + ?Sized>(&self, key: &K) -> StoreResult<Option<Value>> {
        Ok(self.entry(key)?.map(|record| record.value))
    }

    /// Returns the value stored under `key` deserialized as `T`.
    pub fn get_as<T, K>(&self, key: &K) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
        K: StoreKey + ?Sized,
    {
        self.get(key)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Returns the full record (key, value, timestamp) stored under `key`.
    pub fn entry<K: StoreKey + ?Sized>(&self, key: &K) -> StoreResult<Option<Record>> {
        let key = key.as_key()?;
        bump(&self.counters.gets);

        let location = layout::resolve(&self.root, key);
        let record = match self.pending.get(&location.file) {
            Some(document) => document.get(&location.digest).cloned(),
            None => self
                .read_document(&location.file)
                .and_then(|mut document| document.remove(&location.digest)),
        };

        if record.is_some() {
            bump(&self.counters.hits);
        } else {
            bump(&self.counters.misses);
        }
        trace!(key = %key, found = record.is_some(), "Get key");

        Ok(record)
    }

    pub fn contains<K: StoreKey + ?Sized>(&self, key: &K) -> StoreResult<bool> {
        Ok(self.entry(key)?.is_some())
    }

    /// Removes `key` from the store.
    ///
    /// Returns `true` if a record was removed. Removing a key that was never
    /// set is not an error. A shard left empty is deleted from disk.
    pub fn remove<K: StoreKey + ?Sized>(&mut self, key: &K) -> StoreResult<bool> {
        let key = key.as_key()?;
        bump(&self.counters.removes);

        let location = layout::resolve(&self.root, key);
        let buffered = self.pending.remove(&location.file);
        let was_buffered = buffered.is_some();

        let mut document = match buffered.or_else(|| self.read_document(&location.file)) {
            Some(document) => document,
            None => {
                trace!(key = %key, "Remove on missing shard");
                return Ok(false);
            }
        };

        let removed = document.remove(&location.digest).is_some();
        debug!(key = %key, shard = %location.file.display(), removed, "Remove key");

        if removed || document.is_empty() {
            self.commit(location.file, document)?;
        } else if was_buffered {
            self.pending.insert(location.file, document);
        }

        Ok(removed)
    }

    /// Deletes everything under the root directory, leaving the root in place.
    ///
    /// Pending unflushed shards are discarded.
    pub fn clear(&mut self) -> StoreResult<()> {
        bump(&self.counters.clears);
        let discarded = self.pending.len();
        self.pending.clear();

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| StoreError::io(&path, e))?;

            let result = if file_type.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|e| StoreError::io(&path, e))?;
            removed += 1;
        }

        info!(root = %self.root.display(), removed, discarded, "Cleared store");
        Ok(())
    }

    /// Returns every key in the store.
    ///
    /// This scans the whole shard tree. Keys come out in shard path order and
    /// then digest order, but callers should treat the order as unspecified.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        self.visit_documents(|document| {
            keys.extend(document.records().map(|record| record.key.clone()));
        })?;
        Ok(keys)
    }

    /// Returns every record in the store, in the same order as [`keys`](Self::keys).
    pub fn entries(&self) -> StoreResult<Vec<Record>> {
        let mut records = Vec::new();
        self.visit_documents(|document| records.extend(document.records().cloned()))?;
        Ok(records)
    }

    /// Number of keys in the store. Rescans the whole tree on every call.
    pub fn len(&self) -> StoreResult<usize> {
        let mut count = 0;
        self.visit_documents(|document| count += document.len())?;
        Ok(count)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Writes every pending shard to disk, returning how many were written.
    ///
    /// Does nothing when auto-save is on. On failure the unwritten shards stay
    /// buffered so a later flush can retry them.
    pub fn flush(&mut self) -> StoreResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        bump(&self.counters.flushes);

        let mut pending = std::mem::take(&mut self.pending).into_iter();
        let mut written = 0usize;

        while let Some((file, document)) = pending.next() {
            if let Err(e) = self.persist(&file, &document) {
                self.pending.insert(file, document);
                self.pending.extend(pending);
                return Err(e);
            }
            written += 1;
        }

        info!(root = %self.root.display(), shards = written, "Flushed pending shards");
        Ok(written)
    }

    /// Number of shards waiting for [`flush`](Self::flush).
    pub fn pending_shards(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> StoreStats {
        let c = &self.counters;
        StoreStats {
            sets: c.sets.load(Ordering::Relaxed),
            gets: c.gets.load(Ordering::Relaxed),
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            removes: c.removes.load(Ordering::Relaxed),
            clears: c.clears.load(Ordering::Relaxed),
            flushes: c.flushes.load(Ordering::Relaxed),
            corrupt_shards: c.corrupt_shards.load(Ordering::Relaxed),
            pending_shards: self.pending.len() as u64,
        }
    }

    // ========================================================================
    // Shard file protocol
    // ========================================================================

    /// Reads a shard from disk. `None` means the file does not exist; an
    /// unreadable or corrupt file is reported and comes back empty.
    fn read_document(&self, file: &Path) -> Option<ShardDocument> {
        match read_shard(file) {
            Ok(document) => document,
            Err(err) => {
                self.report(file, err);
                Some(ShardDocument::new())
            }
        }
    }

    /// Stores a mutated document: written through, or buffered when auto-save is off.
    fn commit(&mut self, file: PathBuf, document: ShardDocument) -> StoreResult<()> {
        if self.options.auto_save {
            self.persist(&file, &document)
        } else {
            self.pending.insert(file, document);
            Ok(())
        }
    }

    /// Writes a document to its shard file, or deletes the file if the
    /// document is empty.
    fn persist(&self, file: &Path, document: &ShardDocument) -> StoreResult<()> {
        if document.is_empty() {
            return match fs::remove_file(file) {
                Ok(()) => {
                    debug!(shard = %file.display(), "Deleted empty shard");
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::io(file, e)),
            };
        }

        if let Some(directory) = file.parent() {
            fs::create_dir_all(directory).map_err(|e| StoreError::io(directory, e))?;
        }
        write_shard(file, document).map_err(|e| StoreError::io(file, e))
    }

    /// Calls `visit` on every shard document, pending or on disk, in path order.
    fn visit_documents(&self, mut visit: impl FnMut(&ShardDocument)) -> StoreResult<()> {
        let mut files: BTreeSet<PathBuf> = self.pending.keys().cloned().collect();
        files.extend(self.scan_shard_files()?);

        for file in &files {
            if let Some(document) = self.pending.get(file) {
                visit(document);
            } else if let Some(document) = self.read_document(file) {
                visit(&document);
            }
        }
        Ok(())
    }

    /// Lists every shard file under the root by naming convention.
    fn scan_shard_files(&self) -> StoreResult<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let walker = WalkDir::new(&self.root)
            .min_depth(SHARD_DEPTH + 1)
            .max_depth(SHARD_DEPTH + 1)
            .sort_by_file_name();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| self.walk_error(e))?;
            if entry.file_type().is_file() && layout::is_shard_file(&self.root, entry.path()) {
                files.push(entry.into_path());
            }
        }

        trace!(root = %self.root.display(), shards = files.len(), "Scanned shard tree");
        Ok(files)
    }

    fn walk_error(&self, err: walkdir::Error) -> StoreError {
        let path = err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let source = err.into_io_error().unwrap_or_else(|| {
            io::Error::new(ErrorKind::Other, "filesystem loop in shard tree")
        });
        StoreError::io(path, source)
    }

    fn report(&self, file: &Path, err: ShardReadError) {
        bump(&self.counters.corrupt_shards);

        let path = file.to_path_buf();
        let diagnostic = match err {
            ShardReadError::Corrupt(e) => Diagnostic::CorruptShard {
                path,
                reason: e.to_string(),
            },
            ShardReadError::Unreadable(e) => Diagnostic::UnreadableShard {
                path,
                reason: e.to_string(),
            },
        };
        self.diagnostics.report(&diagnostic);
    }
}

impl Drop for ShardStore {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            error!(
                root = %self.root.display(),
                pending = self.pending.len(),
                error = %e,
                "Failed to flush pending shards on drop"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::diagnostics::RecordingSink;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn create_store() -> (TempDir, ShardStore) {
        let dir = TempDir::new().unwrap();
        let store = ShardStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn create_recording_store() -> (TempDir, ShardStore, Arc<RecordingSink>) {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let store = ShardStore::open(dir.path())
            .unwrap()
            .with_diagnostics(sink.clone());
        (dir, store, sink)
    }

    /// Finds two distinct keys that land in the same shard file.
    fn colliding_keys() -> (String, String) {
        let mut seen: HashMap<String, String> = HashMap::new();
        for i in 0.. {
            let key = format!("key:{}", i);
            let prefix = layout::digest(&key)[..4].to_string();
            if let Some(other) = seen.insert(prefix, key.clone()) {
                return (other, key);
            }
        }
        unreachable!()
    }

    #[test]
    fn test_scenario() {
        let (_dir, mut store) = create_store();

        store.set("username", "zhangsan").unwrap();
        assert_eq!(store.get("username").unwrap(), Some(json!("zhangsan")));
        assert_eq!(store.keys().unwrap(), vec!["username".to_string()]);
        assert_eq!(store.len().unwrap(), 1);

        assert!(store.remove("username").unwrap());
        assert_eq!(store.get("username").unwrap(), None);
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_round_trip_values() {
        let (_dir, mut store) = create_store();

        let values = [
            json!(null),
            json!(true),
            json!(42),
            json!(-3.5),
            json!("text with \"quotes\" and ünïcode"),
            json!([1, "two", [3], {"four": 4}]),
            json!({"nested": {"list": [null, false], "n": 1e10}}),
        ];

        for (i, value) in values.iter().enumerate() {
            let key = format!("value:{}", i);
            store.set(&key, value).unwrap();
            assert_eq!(store.get(&key).unwrap().as_ref(), Some(value));
        }
    }

    #[test]
    fn test_stored_null_is_found() {
        let (_dir, mut store) = create_store();

        store.set("nothing", &Value::Null).unwrap();
        assert_eq!(store.get("nothing").unwrap(), Some(Value::Null));
        assert!(store.contains("nothing").unwrap());
        assert_eq!(store.get("never-set").unwrap(), None);
    }

    #[test]
    fn test_typed_values() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Session {
            user: String,
            roles: Vec<String>,
        }

        let (_dir, mut store) = create_store();
        let session = Session {
            user: "ariz".to_string(),
            roles: vec!["admin".to_string()],
        };

        store.set("session", &session).unwrap();
        let loaded: Option<Session> = store.get_as("session").unwrap();
        assert_eq!(loaded, Some(session));

        let wrong: StoreResult<Option<u64>> = store.get_as("session");
        assert!(matches!(wrong, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_overwrite() {
        let (_dir, mut store) = create_store();

        store.set("key", "v1").unwrap();
        assert_eq!(store.len().unwrap(), 1);

        store.set("key", "v2").unwrap();
        assert_eq!(store.get("key").unwrap(), Some(json!("v2")));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_entry_has_timestamp() {
        let (_dir, mut store) = create_store();

        let before = chrono::Utc::now().timestamp_millis();
        store.set("key", "value").unwrap();

        let record = store.entry("key").unwrap().unwrap();
        assert_eq!(record.key, "key");
        assert_eq!(record.value, json!("value"));
        assert!(record.timestamp >= before);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let (dir, mut store) = create_store();

        assert!(!store.remove("ghost").unwrap());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        store.set("present", 1).unwrap();
        let before = fs::read(store.locate("present").unwrap().file).unwrap();

        assert!(!store.remove("ghost").unwrap());
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(fs::read(store.locate("present").unwrap().file).unwrap(), before);
    }

    #[test]
    fn test_shard_sharing() {
        let (_dir, mut store) = create_store();
        let (a, b) = colliding_keys();
        assert_ne!(a, b);

        store.set(&a, "first").unwrap();
        store.set(&b, "second").unwrap();

        let location = store.locate(&a).unwrap();
        assert_eq!(location.file, store.locate(&b).unwrap().file);

        let document = read_shard(&location.file).unwrap().unwrap();
        assert_eq!(document.len(), 2);

        store.remove(&a).unwrap();
        assert_eq!(store.get(&a).unwrap(), None);
        assert_eq!(store.get(&b).unwrap(), Some(json!("second")));
        assert!(location.file.exists());
    }

    #[test]
    fn test_cleanup_on_empty() {
        let (_dir, mut store) = create_store();

        store.set("lonely", "value").unwrap();
        let file = store.locate("lonely").unwrap().file;
        assert!(file.exists());

        store.remove("lonely").unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn test_full_clear() {
        let (dir, mut store) = create_store();

        for i in 0..50 {
            store.set(&format!("key:{}", i), &i).unwrap();
        }
        assert_eq!(store.len().unwrap(), 50);

        store.clear().unwrap();
        assert_eq!(store.len().unwrap(), 0);
        assert!(store.keys().unwrap().is_empty());
        assert_eq!(store.get("key:7").unwrap(), None);

        assert!(dir.path().is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        // Clearing an empty store is fine too
        store.clear().unwrap();

        store.set("again", true).unwrap();
        assert_eq!(store.get("again").unwrap(), Some(json!(true)));
    }

    #[test]
    fn test_clear_missing_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("cache");
        let mut store = ShardStore::open(&root).unwrap();

        store.set("key", 1).unwrap();
        fs::remove_dir_all(&root).unwrap();

        store.clear().unwrap();
        assert_eq!(store.len().unwrap(), 0);

        // Shard directories are recreated on demand
        store.set("key", 2).unwrap();
        assert_eq!(store.get("key").unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_type_enforcement() {
        let (_dir, mut store) = create_store();

        assert!(matches!(
            store.set(&json!(123), "x"),
            Err(StoreError::TypeMismatch { found: "number" })
        ));
        assert!(matches!(
            store.get(&json!(123)),
            Err(StoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            store.remove(&json!(123)),
            Err(StoreError::TypeMismatch { .. })
        ));

        store.set(&json!("dynamic"), "ok").unwrap();
        assert_eq!(store.get("dynamic").unwrap(), Some(json!("ok")));
    }

    #[test]
    fn test_directory_shape() {
        let (dir, mut store) = create_store();

        for i in 0..100 {
            store.set(&format!("shape:{}", i), &i).unwrap();
        }

        for entry in WalkDir::new(dir.path()).min_depth(1) {
            let entry = entry.unwrap();
            let name = entry.file_name().to_str().unwrap().to_string();
            let depth = entry.depth();

            if depth <= SHARD_DEPTH {
                assert!(entry.file_type().is_dir(), "{:?}", entry.path());
                assert_eq!(name.len(), 1);
                assert!(name.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            } else {
                assert_eq!(depth, SHARD_DEPTH + 1);
                assert!(entry.file_type().is_file());
                assert!(layout::is_shard_file(dir.path(), entry.path()));
            }
        }
    }

    #[test]
    fn test_keys_unique_and_complete() {
        let (_dir, mut store) = create_store();

        let mut expected: Vec<String> = (0..200).map(|i| format!("k{}", i)).collect();
        for key in &expected {
            store.set(key, "v").unwrap();
        }
        store.set("k5", "again").unwrap();

        let mut keys = store.keys().unwrap();
        keys.sort();
        expected.sort();
        assert_eq!(keys, expected);
        assert_eq!(store.entries().unwrap().len(), 200);
    }

    #[test]
    fn test_keys_ignores_foreign_files() {
        let (dir, mut store) = create_store();
        store.set("real", 1).unwrap();

        fs::write(dir.path().join("README.txt"), "hello").unwrap();
        fs::create_dir_all(dir.path().join("x/y/z")).unwrap();
        fs::write(dir.path().join("x/y/z/w.json"), "{}").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["real".to_string()]);
    }

    #[test]
    fn test_independent_stores() {
        let (_dir_a, mut a) = create_store();
        let (_dir_b, b) = create_store();

        a.set("key", "a").unwrap();
        assert_eq!(b.get("key").unwrap(), None);
        assert_eq!(b.len().unwrap(), 0);
    }

    #[test]
    fn test_reopen_sees_data() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = ShardStore::open(dir.path()).unwrap();
            store.set("persisted", json!({"a": 1})).unwrap();
        }

        let store = ShardStore::open(dir.path()).unwrap();
        assert_eq!(store.get("persisted").unwrap(), Some(json!({"a": 1})));
    }

    #[test]
    fn test_corrupt_shard_on_get_and_keys() {
        let (_dir, mut store, sink) = create_recording_store();

        store.set("good", "value").unwrap();
        let location = store.locate("broken").unwrap();
        fs::create_dir_all(&location.directory).unwrap();
        fs::write(&location.file, "{ definitely not json").unwrap();

        assert_eq!(store.get("broken").unwrap(), None);
        assert_eq!(sink.len(), 1);
        assert!(matches!(
            &sink.events()[0],
            Diagnostic::CorruptShard { path, .. } if path == &location.file
        ));

        assert_eq!(store.keys().unwrap(), vec!["good".to_string()]);
        assert_eq!(sink.len(), 2);
        assert_eq!(store.stats().corrupt_shards, 2);
    }

    #[test]
    fn test_unreadable_shard_reads_as_empty() {
        let (_dir, mut store, sink) = create_recording_store();

        store.set("good", "value").unwrap();
        let location = store.locate("broken").unwrap();
        fs::create_dir_all(&location.file).unwrap();

        assert_eq!(store.get("broken").unwrap(), None);
        assert_eq!(sink.len(), 1);
        assert!(matches!(
            &sink.events()[0],
            Diagnostic::UnreadableShard { path, .. } if path == &location.file
        ));

        // Not a regular file, so the scan never opens it
        assert_eq!(store.keys().unwrap(), vec!["good".to_string()]);
        assert_eq!(sink.len(), 1);

        let err = store.set("broken", "value").unwrap_err();
        assert_eq!(err.kind(), "io");
        assert_eq!(sink.len(), 2);
        assert_eq!(store.stats().corrupt_shards, 2);
        assert!(location.file.is_dir());
    }

    #[test]
    fn test_corrupt_shard_is_overwritten_by_set() {
        let (_dir, mut store, sink) = create_recording_store();

        let location = store.locate("key").unwrap();
        fs::create_dir_all(&location.directory).unwrap();
        fs::write(&location.file, "garbage").unwrap();

        store.set("key", "fresh").unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(store.get("key").unwrap(), Some(json!("fresh")));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_remove_on_corrupt_shard_deletes_it() {
        let (_dir, mut store, sink) = create_recording_store();

        let location = store.locate("key").unwrap();
        fs::create_dir_all(&location.directory).unwrap();
        fs::write(&location.file, "[1, 2").unwrap();

        assert!(!store.remove("key").unwrap());
        assert!(!location.file.exists());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_write_failure_propagates() {
        let (dir, mut store) = create_store();

        // "hello" lives under 5/d/4; make "5" a file so the directory cannot be created
        fs::write(dir.path().join("5"), "blocker").unwrap();

        let err = store.set("hello", "world").unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_open_on_file_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();

        let err = ShardStore::open(&file).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_unserializable_value() {
        let (_dir, mut store) = create_store();

        let mut bad = HashMap::new();
        bad.insert(vec![1u8], "non-string map key");

        let err = store.set("bad", &bad).unwrap_err();
        assert_eq!(err.kind(), "serialization");
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_buffered_writes() {
        let dir = TempDir::new().unwrap();
        let mut store =
            ShardStore::open_with(dir.path(), StoreOptions::new().auto_save(false)).unwrap();

        store.set("a", 1).unwrap();
        store.set("b", 2).unwrap();
        let file = store.locate("a").unwrap().file;

        assert!(!file.exists());
        assert_eq!(store.get("a").unwrap(), Some(json!(1)));
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.pending_shards(), 2);

        assert_eq!(store.flush().unwrap(), 2);
        assert!(file.exists());
        assert_eq!(store.pending_shards(), 0);
        assert_eq!(store.flush().unwrap(), 0);

        store.remove("a").unwrap();
        assert!(file.exists());
        assert_eq!(store.get("a").unwrap(), None);
        store.flush().unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn test_buffered_writes_flush_on_drop() {
        let dir = TempDir::new().unwrap();
        {
            let mut store =
                ShardStore::open_with(dir.path(), StoreOptions::new().auto_save(false)).unwrap();
            store.set("key", "value").unwrap();
        }

        let store = ShardStore::open(dir.path()).unwrap();
        assert_eq!(store.get("key").unwrap(), Some(json!("value")));
    }

    #[test]
    fn test_buffered_clear_discards_pending() {
        let dir = TempDir::new().unwrap();
        let mut store =
            ShardStore::open_with(dir.path(), StoreOptions::new().auto_save(false)).unwrap();

        store.set("key", "value").unwrap();
        store.clear().unwrap();

        assert_eq!(store.pending_shards(), 0);
        assert_eq!(store.get("key").unwrap(), None);
        assert_eq!(store.flush().unwrap(), 0);
    }

    #[test]
    fn test_stats() {
        let (_dir, mut store) = create_store();

        store.set("a", 1).unwrap();
        store.get("a").unwrap();
        store.get("b").unwrap();
        store.remove("a").unwrap();
        store.clear().unwrap();

        let stats = store.stats();
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.removes, 1);
        assert_eq!(stats.clears, 1);
        assert_eq!(stats.corrupt_shards, 0);
    }
}
