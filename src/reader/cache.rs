//! Content-addressed store of readability results.
//!
//! Entries are keyed by the SHA-256 of the normalized page URL. Writers live
//! elsewhere in the application (after a successful extraction); the
//! reader-mode handler only ever reads.

use super::ReadabilityResult;
use crate::security::random_hex;
use crate::{Error, Result};
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use url::Url;

const CONTENT_FILE: &str = "content.json";

/// Key/value contract of the reader cache
pub trait ReaderModeCache: Send + Sync {
    /// Fails with [`Error::NotCached`] when there is no entry
    fn get(&self, url: &Url) -> Result<ReadabilityResult>;
    fn put(&self, url: &Url, result: &ReadabilityResult) -> Result<()>;
    fn contains(&self, url: &Url) -> bool;
    fn delete(&self, url: &Url) -> Result<()>;
}

/// The fragment never changes the article, so it is not part of the key
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}

/// Hex SHA-256 of the normalized URL
pub fn cache_key(url: &Url) -> String {
    hex::encode(Sha256::digest(normalize_url(url).as_str().as_bytes()))
}

fn poisoned() -> Error {
    Error::Other("reader cache lock poisoned".into())
}

/// In-memory cache, safe for concurrent readers
#[derive(Debug, Default)]
pub struct MemoryReaderModeCache {
    entries: RwLock<HashMap<String, ReadabilityResult>>,
}

impl MemoryReaderModeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReaderModeCache for MemoryReaderModeCache {
    fn get(&self, url: &Url) -> Result<ReadabilityResult> {
        self.entries
            .read()
            .map_err(|_| poisoned())?
            .get(&cache_key(url))
            .cloned()
            .ok_or_else(|| Error::NotCached(url.to_string()))
    }

    fn put(&self, url: &Url, result: &ReadabilityResult) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(cache_key(url), result.clone());
        Ok(())
    }

    fn contains(&self, url: &Url) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(&cache_key(url)))
            .unwrap_or(false)
    }

    fn delete(&self, url: &Url) -> Result<()> {
        self.entries.write().map_err(|_| poisoned())?.remove(&cache_key(url));
        Ok(())
    }
}

/// On-disk cache: `<dir>/<key>/content.json`
#[derive(Debug, Clone)]
pub struct DiskReaderModeCache {
    dir: PathBuf,
}

impl DiskReaderModeCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_dir(&self, url: &Url) -> PathBuf {
        self.dir.join(cache_key(url))
    }
}

impl ReaderModeCache for DiskReaderModeCache {
    fn get(&self, url: &Url) -> Result<ReadabilityResult> {
        let path = self.entry_dir(url).join(CONTENT_FILE);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotCached(url.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data)
            .map_err(|e| Error::Other(format!("Corrupt reader cache entry {}: {}", path.display(), e)))
    }

    fn put(&self, url: &Url, result: &ReadabilityResult) -> Result<()> {
        let dir = self.entry_dir(url);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec(result)
            .map_err(|e| Error::Other(format!("Failed to encode reader cache entry: {}", e)))?;
        // Write then rename so readers never see a half-written entry; each
        // writer gets its own temp file
        let tmp = dir.join(format!("{}.{}.tmp", CONTENT_FILE, random_hex(8)?));
        if let Err(e) = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, dir.join(CONTENT_FILE))) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!("Cached reader content for {}", normalize_url(url));
        Ok(())
    }

    fn contains(&self, url: &Url) -> bool {
        self.entry_dir(url).join(CONTENT_FILE).is_file()
    }

    fn delete(&self, url: &Url) -> Result<()> {
        match std::fs::remove_dir_all(self.entry_dir(url)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str) -> ReadabilityResult {
        ReadabilityResult {
            title: title.to_string(),
            content: "<p>Body</p>".to_string(),
            url: "https://example.com/a".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn key_ignores_fragment_only() {
        let a = Url::parse("https://example.com/a#top").unwrap();
        let b = Url::parse("https://example.com/a").unwrap();
        let c = Url::parse("https://example.com/a?page=2").unwrap();
        assert_eq!(cache_key(&a), cache_key(&b));
        assert_ne!(cache_key(&b), cache_key(&c));
        assert_eq!(cache_key(&a).len(), 64);
    }

    #[test]
    fn memory_cache_contract() {
        let cache = MemoryReaderModeCache::new();
        let url = Url::parse("https://example.com/a").unwrap();
        assert!(matches!(cache.get(&url), Err(Error::NotCached(_))));
        cache.put(&url, &article("A")).unwrap();
        assert!(cache.contains(&url));
        assert_eq!(cache.get(&url).unwrap().title, "A");
        cache.delete(&url).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn disk_cache_contract() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskReaderModeCache::new(dir.path());
        let url = Url::parse("https://example.com/a#section").unwrap();
        assert!(matches!(cache.get(&url), Err(Error::NotCached(_))));
        cache.put(&url, &article("Disk")).unwrap();
        let plain = Url::parse("https://example.com/a").unwrap();
        assert!(cache.contains(&plain));
        assert_eq!(cache.get(&plain).unwrap().title, "Disk");
        assert!(dir.path().join(cache_key(&plain)).join(CONTENT_FILE).is_file());
        cache.delete(&plain).unwrap();
        cache.delete(&plain).unwrap();
        assert!(!cache.contains(&url));
    }

    #[test]
    fn concurrent_writers_for_one_url_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = std::sync::Arc::new(DiskReaderModeCache::new(dir.path()));
        let url = Url::parse("https://example.com/hot").unwrap();

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                let url = url.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        cache.put(&url, &article(&format!("writer {}", i))).unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        assert!(cache.get(&url).unwrap().title.starts_with("writer "));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join(cache_key(&url)))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from(CONTENT_FILE)]);
    }

    #[test]
    fn corrupt_disk_entry_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskReaderModeCache::new(dir.path());
        let url = Url::parse("https://example.com/broken").unwrap();
        let entry = dir.path().join(cache_key(&url));
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join(CONTENT_FILE), b"{not json").unwrap();
        assert!(matches!(cache.get(&url), Err(Error::Other(_))));
    }
}
