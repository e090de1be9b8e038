//! Artifact store abstraction and its filesystem implementation.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::atomic::atomic_write;
use crate::error::{PersistenceError, Result};
use crate::page_cache::release_page_cache;

/// Directory holding fixed historical scrape windows.
pub const RAW_PARSES_DIR: &str = "raw_parses";

/// Directory holding the live "today" cache.
pub const TEMP_DIR: &str = "temp";

/// Metadata about a stored artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactInfo {
    /// Key relative to the store root.
    pub key: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Size summary of one artifact directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirStats {
    pub dir: String,
    pub file_count: usize,
    pub total_bytes: u64,
    pub total_mb: f64,
    /// Largest artifacts first.
    pub largest: Vec<ArtifactInfo>,
}

impl DirStats {
    /// Summarizes `artifacts`, keeping the `top` largest.
    pub fn from_artifacts(dir: &str, mut artifacts: Vec<ArtifactInfo>, top: usize) -> Self {
        let total_bytes: u64 = artifacts.iter().map(|a| a.size_bytes).sum();
        let file_count = artifacts.len();
        artifacts.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.key.cmp(&b.key)));
        artifacts.truncate(top);
        Self {
            dir: dir.to_string(),
            file_count,
            total_bytes,
            total_mb: (total_bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0,
            largest: artifacts,
        }
    }
}

/// Persistent storage for scrape artifacts, addressed by relative keys
/// such as `raw_parses/2025-03-09.json`.
///
/// Implementations are synchronous; async callers run them on the
/// blocking pool.
pub trait ArtifactStore: Send + Sync {
    /// Whether an artifact exists under `key`.
    fn exists(&self, key: &str) -> bool;

    /// Last modification time, or `None` if the artifact is missing.
    fn modified_time(&self, key: &str) -> Result<Option<DateTime<Utc>>>;

    /// Reads the full artifact.
    fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Writes the full artifact, replacing any previous content.
    fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Lists artifacts directly under `dir`, sorted by key.
    fn list(&self, dir: &str) -> Result<Vec<ArtifactInfo>>;

    /// Size summary of `dir` with its `top` largest artifacts.
    fn dir_stats(&self, dir: &str, top: usize) -> Result<DirStats> {
        Ok(DirStats::from_artifacts(dir, self.list(dir)?, top))
    }
}

/// Filesystem-backed artifact store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to a path under the root.
    ///
    /// Keys must be relative and may not contain `..`, so every resolved
    /// path stays inside the root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn exists(&self, key: &str) -> bool {
        self.resolve(key).map(|p| p.is_file()).unwrap_or(false)
    }

    fn modified_time(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let path = self.resolve(key)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                let modified = meta
                    .modified()
                    .map_err(|source| PersistenceError::ReadError { path, source })?;
                Ok(Some(DateTime::<Utc>::from(modified)))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::ReadError { path, source }),
        }
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        let data = fs::read(&path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                PersistenceError::NotFound(key.to_string())
            } else {
                PersistenceError::ReadError {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        release_page_cache(&path);
        debug!(key, bytes = data.len(), "artifact read");
        Ok(data)
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        atomic_write(&path, data)?;
        release_page_cache(&path);
        debug!(key, bytes = data.len(), "artifact written");
        Ok(())
    }

    fn list(&self, dir: &str) -> Result<Vec<ArtifactInfo>> {
        let path = self.resolve(dir)?;
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(PersistenceError::ReadError { path, source }),
        };

        let mut infos = Vec::new();
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else { continue };
            infos.push(ArtifactInfo {
                key: format!("{}/{}", dir.trim_end_matches('/'), entry.file_name().to_string_lossy()),
                size_bytes: meta.len(),
                modified: DateTime::<Utc>::from(modified),
            });
        }
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        store.write("raw_parses/2025-03-09.json", b"[1,2]").unwrap();

        assert!(store.exists("raw_parses/2025-03-09.json"));
        assert_eq!(store.read("raw_parses/2025-03-09.json").unwrap(), b"[1,2]");
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        assert!(!store.exists("temp/today_cache.json"));
        assert_eq!(store.modified_time("temp/today_cache.json").unwrap(), None);
        assert!(matches!(
            store.read("temp/today_cache.json"),
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[test]
    fn test_modified_time_tracks_writes() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let before = Utc::now() - chrono::Duration::seconds(5);

        store.write("temp/today_cache.json", b"[]").unwrap();

        let modified = store.modified_time("temp/today_cache.json").unwrap().unwrap();
        assert!(modified >= before);
    }

    #[test]
    fn test_keys_cannot_escape_root() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        assert!(matches!(
            store.write("../outside.json", b"x"),
            Err(PersistenceError::InvalidKey(_))
        ));
        assert!(matches!(
            store.read("/etc/passwd"),
            Err(PersistenceError::InvalidKey(_))
        ));
        assert!(!store.exists("raw_parses/../../x"));
    }

    #[test]
    fn test_list_sorted_and_files_only() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.write("raw_parses/b.json", b"[]").unwrap();
        store.write("raw_parses/a.json", b"[1]").unwrap();
        fs::create_dir_all(dir.path().join("raw_parses/sub")).unwrap();

        let infos = store.list(RAW_PARSES_DIR).unwrap();
        let keys: Vec<_> = infos.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["raw_parses/a.json", "raw_parses/b.json"]);
        assert_eq!(infos[0].size_bytes, 3);
    }

    #[test]
    fn test_dir_stats_largest_first() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.write("raw_parses/small.json", &[b'x'; 10]).unwrap();
        store.write("raw_parses/big.json", &[b'x'; 3000]).unwrap();
        store.write("raw_parses/mid.json", &[b'x'; 500]).unwrap();
        store.write("temp/today_cache.json", &[b'x'; 9999]).unwrap();

        let stats = store.dir_stats(RAW_PARSES_DIR, 2).unwrap();

        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.total_bytes, 3510);
        let keys: Vec<_> = stats.largest.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["raw_parses/big.json", "raw_parses/mid.json"]);
    }

    #[test]
    fn test_dir_stats_missing_dir() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        let stats = store.dir_stats(TEMP_DIR, 10).unwrap();
        assert_eq!(stats.file_count, 0);
        assert_eq!(stats.total_mb, 0.0);
        assert!(stats.largest.is_empty());
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert!(store.list(TEMP_DIR).unwrap().is_empty());
    }
}
