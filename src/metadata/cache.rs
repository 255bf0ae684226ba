//! On-disk provider-response cache.
//!
//! One JSON file per normalized query key. Entries are never expired or
//! evicted; deleting the cache directory wholesale is always safe. Cache I/O
//! failures degrade to a miss (read) or a no-op (write) — they are logged
//! and never propagated.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Directory-backed JSON cache keyed by sanitized query strings.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    dir: PathBuf,
}

impl MetadataCache {
    /// Create a cache rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("Failed to create cache dir {}: {e}", dir.display());
        }
        Self { dir }
    }

    /// Look up a cached value. Missing or unreadable entries are a miss.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read cache entry {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Corrupt cache entry {}: {e}", path.display());
                None
            }
        }
    }

    /// Persist a value under `key`. Failures are logged, never propagated.
    pub fn store<T: Serialize>(&self, key: &str, value: &T) {
        let path = self.path_for(key);
        let json = match serde_json::to_string_pretty(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry {key}: {e}");
                return;
            }
        };
        if let Err(e) = std::fs::write(&path, json) {
            tracing::warn!("Failed to write cache entry {}: {e}", path.display());
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }

    /// Root directory of this cache.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Replace characters that are unsafe in filenames. Non-ASCII titles are
/// kept as-is.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        title: String,
        year: Option<String>,
    }

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::new(dir.path());
        let entry = Entry {
            title: "盗梦空间".into(),
            year: Some("2010".into()),
        };
        cache.store("movie_盗梦空间_2010", &entry);
        let back: Entry = cache.load("movie_盗梦空间_2010").unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn missing_key_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::new(dir.path());
        assert!(cache.load::<Entry>("movie_nothing").is_none());
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::new(dir.path());
        std::fs::write(dir.path().join("movie_bad.json"), "{not json").unwrap();
        assert!(cache.load::<Entry>("movie_bad").is_none());
    }

    #[test]
    fn keys_are_sanitized() {
        assert_eq!(sanitize_key("tv/show: b?"), "tv_show__b_");
        assert_eq!(sanitize_key("movie_盗梦空间_2010"), "movie_盗梦空间_2010");
    }

    #[test]
    fn sanitized_keys_do_not_escape_the_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::new(dir.path());
        cache.store("../escape", &Entry {
            title: "x".into(),
            year: None,
        });
        assert!(dir.path().join(".._escape.json").exists());
    }

    #[test]
    fn unwritable_dir_is_a_noop() {
        let cache = MetadataCache::new("/nonexistent-root/definitely/not/here");
        // Must not panic.
        cache.store("k", &Entry {
            title: "x".into(),
            year: None,
        });
        assert!(cache.load::<Entry>("k").is_none());
    }
}
