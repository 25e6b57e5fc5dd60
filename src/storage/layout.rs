//! Shard Layout
//!
//! Maps arbitrary string keys onto a bounded set of shard files.
//!
//! ## Path Scheme
//!
//! ```text
//! key ──md5──> "5d41402abc4b2a76b9719d911017c592"
//!               │││└─ file name      (5d41/4.json)
//!               ││└── level 3 dir
//!               │└─── level 2 dir
//!               └──── level 1 dir
//!
//! <root>/5/d/4/1.json
//! ```
//!
//! Three directory levels of 16 entries each give 4096 leaf directories,
//! each holding at most 16 shard files: 65,536 shards in total.
//!
//! MD5 is only used as a stable, evenly distributed hash here. Changing the
//! digest algorithm would orphan every existing shard.

use md5::{Digest, Md5};
use std::path::{Component, Path, PathBuf};

/// Number of single-character directory levels above each shard file.
pub const SHARD_DEPTH: usize = 3;

/// Extension of every shard file.
pub const SHARD_EXTENSION: &str = "json";

/// Where a key lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLocation {
    /// Leaf directory holding the shard file
    pub directory: PathBuf,
    /// The shard file itself
    pub file: PathBuf,
    /// Full lowercase hex digest of the key, used as the record id in the shard
    pub digest: String,
}

/// Computes the 32-character lowercase hex MD5 digest of a key.
pub fn digest(key: &str) -> String {
    hex::encode(Md5::digest(key.as_bytes()))
}

/// Resolves a key to its shard location under `root`.
///
/// This is a pure function: nothing is touched on disk.
///
/// # Example
///
/// ```
/// use shardcache::storage::layout::resolve;
/// use std::path::Path;
///
/// let location = resolve(Path::new("/tmp/cache"), "hello");
/// assert_eq!(location.digest, "5d41402abc4b2a76b9719d911017c592");
/// assert_eq!(location.file, Path::new("/tmp/cache/5/d/4/1.json"));
/// ```
pub fn resolve(root: &Path, key: &str) -> ShardLocation {
    let digest = digest(key);

    let mut directory = root.to_path_buf();
    for level in 0..SHARD_DEPTH {
        directory.push(&digest[level..level + 1]);
    }

    let file_char = &digest[SHARD_DEPTH..SHARD_DEPTH + 1];
    let file = directory.join(format!("{}.{}", file_char, SHARD_EXTENSION));

    ShardLocation {
        directory,
        file,
        digest,
    }
}

/// Returns true if `path` is a shard file under `root` by naming convention:
/// `<root>/<h>/<h>/<h>/<h>.json` where each `<h>` is one lowercase hex digit.
pub fn is_shard_file(root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };

    let components: Vec<_> = relative.components().collect();
    if components.len() != SHARD_DEPTH + 1 {
        return false;
    }

    let (file, dirs) = match components.split_last() {
        Some(split) => split,
        None => return false,
    };

    let dirs_ok = dirs.iter().all(|component| match component {
        Component::Normal(name) => name.to_str().is_some_and(is_hex_char),
        _ => false,
    });
    if !dirs_ok {
        return false;
    }

    match file {
        Component::Normal(name) => name
            .to_str()
            .and_then(|name| name.strip_suffix(SHARD_EXTENSION))
            .and_then(|stem| stem.strip_suffix('.'))
            .is_some_and(is_hex_char),
        _ => false,
    }
}

#[inline]
fn is_hex_char(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('0'..='9' | 'a'..='f'), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_lowercase_md5() {
        assert_eq!(digest(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(digest("hello"), "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(digest("username").len(), 32);
    }

    #[test]
    fn test_resolve_uses_first_four_hex_chars() {
        let root = Path::new("/var/cache/app");
        let location = resolve(root, "hello");

        assert_eq!(location.directory, root.join("5").join("d").join("4"));
        assert_eq!(location.file, root.join("5").join("d").join("4").join("1.json"));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let root = Path::new("cache");
        assert_eq!(resolve(root, "username"), resolve(root, "username"));
        assert_ne!(resolve(root, "username").digest, resolve(root, "password").digest);
    }

    #[test]
    fn test_resolved_paths_are_shard_files() {
        let root = Path::new("cache");
        for i in 0..200 {
            let location = resolve(root, &format!("key:{}", i));
            assert!(is_shard_file(root, &location.file), "{:?}", location.file);
            assert!(location.file.starts_with(&location.directory));
        }
    }

    #[test]
    fn test_is_shard_file_rejects_foreign_paths() {
        let root = Path::new("cache");
        assert!(!is_shard_file(root, &root.join("a/b/c/d.txt")));
        assert!(!is_shard_file(root, &root.join("a/b/d.json")));
        assert!(!is_shard_file(root, &root.join("a/b/c/e/f.json")));
        assert!(!is_shard_file(root, &root.join("a/b/cc/d.json")));
        assert!(!is_shard_file(root, &root.join("a/B/c/d.json")));
        assert!(!is_shard_file(root, &root.join("a/b/c/g.json")));
        assert!(!is_shard_file(root, &root.join("a/b/c/dd.json")));
        assert!(!is_shard_file(root, Path::new("elsewhere/a/b/c/d.json")));
    }
}
