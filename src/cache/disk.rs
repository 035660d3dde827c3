//! Disk Tier Module
//!
//! The persisted slower tier. Each entry is stored as two artifacts under
//! the cache root, keyed by a filesystem-safe transform of the cache key:
//!
//! - `entries/<safe>.value.json` - the serialized value
//! - `entries/<safe>.meta.json`  - the serialized metadata record
//!
//! plus one aggregate `stats.json` at the root. Reads degrade: a missing
//! root, a missing artifact or a corrupted artifact all read as a miss, and
//! corrupted artifacts are deleted so they cannot fail again (self-heal).
//! Writes propagate failures to the caller.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::cache::{CacheStats, EntryMetadata};
use crate::error::{CacheError, Result};

const ENTRIES_DIR: &str = "entries";
const STATS_FILE: &str = "stats.json";
const VALUE_SUFFIX: &str = ".value.json";
const META_SUFFIX: &str = ".meta.json";

// == Disk Tier ==
/// Persisted key-value storage over a filesystem blob store.
#[derive(Debug)]
pub struct DiskTier {
    root: Option<PathBuf>,
}

impl DiskTier {
    // == Constructor ==
    /// Creates a disk tier rooted at `root`, or an unavailable tier when no
    /// root is given. Creates the entries directory if needed.
    pub async fn new(root: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = &root {
            fs::create_dir_all(dir.join(ENTRIES_DIR)).await?;
        }
        Ok(Self { root })
    }

    /// Whether a disk root is configured.
    pub fn available(&self) -> bool {
        self.root.is_some()
    }

    fn root(&self) -> Result<&Path> {
        self.root
            .as_deref()
            .ok_or_else(|| CacheError::TierUnavailable("no disk root configured".to_string()))
    }

    fn value_path(&self, root: &Path, key: &str) -> PathBuf {
        root.join(ENTRIES_DIR).join(format!("{}{}", safe_key(key), VALUE_SUFFIX))
    }

    fn meta_path(&self, root: &Path, key: &str) -> PathBuf {
        root.join(ENTRIES_DIR).join(format!("{}{}", safe_key(key), META_SUFFIX))
    }

    // == Write Entry ==
    /// Persists both artifacts for an entry. Both are staged to temporary
    /// paths and renamed into place, so a failure at any point leaves the
    /// previously stored artifacts untouched. The metadata rename comes
    /// first; if the value rename then fails, the stale metadata artifact
    /// is cleaned up by the next startup scan's orphan check.
    pub async fn write_entry(&self, metadata: &EntryMetadata, value_bytes: &[u8]) -> Result<()> {
        let root = self.root()?;
        let value_path = self.value_path(root, &metadata.key);
        let meta_path = self.meta_path(root, &metadata.key);
        let value_staged = staging_path(&value_path);
        let meta_staged = staging_path(&meta_path);

        let meta_bytes = serde_json::to_vec(metadata)?;

        let staged: Result<()> = async {
            fs::write(&value_staged, value_bytes).await?;
            fs::write(&meta_staged, &meta_bytes).await?;
            fs::rename(&meta_staged, &meta_path).await?;
            fs::rename(&value_staged, &value_path).await?;
            Ok(())
        }
        .await;

        if staged.is_err() {
            let _ = fs::remove_file(&value_staged).await;
            let _ = fs::remove_file(&meta_staged).await;
        }
        staged
    }

    // == Read Value ==
    /// Reads the value artifact for a key. Absence, an unavailable tier and
    /// I/O failures all read as `None`; a corrupted artifact is deleted and
    /// reads as `None`.
    pub async fn read_value(&self, key: &str) -> Option<Value> {
        let root = self.root.as_deref()?;
        let path = self.value_path(root, key);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, error = %e, "disk tier: value read failed, degrading to miss");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "disk tier: corrupted value artifact, self-healing");
                self.delete_entry_best_effort(key).await;
                None
            }
        }
    }

    // == Delete Entry ==
    /// Removes both artifacts for a key. Absence is not an error; other I/O
    /// failures propagate.
    pub async fn delete_entry(&self, key: &str) -> Result<()> {
        let root = self.root()?;
        remove_if_present(&self.value_path(root, key)).await?;
        remove_if_present(&self.meta_path(root, key)).await?;
        Ok(())
    }

    /// Removes both artifacts, swallowing failures. Used on self-heal and on
    /// read-path expiry where the read must not turn into an error.
    pub async fn delete_entry_best_effort(&self, key: &str) {
        if let Err(e) = self.delete_entry(key).await {
            warn!(key, error = %e, "disk tier: best-effort delete failed");
        }
    }

    // == Startup Scan ==
    /// Scans the entries directory and returns the metadata records of every
    /// persisted entry, so a restarted engine can rebuild its index and size
    /// accounting. Corrupted or orphaned artifacts are deleted along the way.
    pub async fn scan(&self) -> Result<Vec<EntryMetadata>> {
        let root = self.root()?;
        let mut records = Vec::new();

        let mut dir = fs::read_dir(root.join(ENTRIES_DIR)).await?;
        while let Some(dirent) = dir.next_entry().await? {
            let path = dirent.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(META_SUFFIX) {
                continue;
            }

            let metadata: EntryMetadata = match fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(artifact = %path.display(), error = %e,
                            "disk tier: corrupted metadata artifact, self-healing");
                        let _ = fs::remove_file(&path).await;
                        let value_path = path.with_file_name(
                            name.replace(META_SUFFIX, VALUE_SUFFIX),
                        );
                        let _ = fs::remove_file(&value_path).await;
                        continue;
                    }
                },
                Err(e) => {
                    warn!(artifact = %path.display(), error = %e, "disk tier: scan read failed");
                    continue;
                }
            };

            // A metadata artifact without its value is an orphan
            if !fs::try_exists(self.value_path(root, &metadata.key)).await? {
                warn!(key = %metadata.key, "disk tier: orphaned metadata artifact, removing");
                let _ = fs::remove_file(&path).await;
                continue;
            }

            records.push(metadata);
        }

        debug!(count = records.len(), "disk tier: startup scan complete");
        Ok(records)
    }

    // == Statistics Artifact ==
    /// Persists the aggregate statistics snapshot under the cache root.
    pub async fn write_stats(&self, stats: &CacheStats) -> Result<()> {
        let root = self.root()?;
        let bytes = serde_json::to_vec_pretty(stats)?;
        fs::write(root.join(STATS_FILE), bytes).await?;
        Ok(())
    }

    /// Loads the persisted statistics snapshot, if any. Corruption reads as
    /// `None` (the artifact will simply be overwritten at the next flush).
    pub async fn read_stats(&self) -> Option<CacheStats> {
        let root = self.root.as_deref()?;
        let bytes = fs::read(root.join(STATS_FILE)).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "disk tier: corrupted statistics artifact, ignoring");
                None
            }
        }
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// == Safe Key Transform ==
/// Maps an arbitrary cache key to a filesystem-safe file stem. Alphanumerics
/// and `-`, `_`, `.` pass through; every other byte becomes `%XX`. A 16-hex
/// hash of the original key is appended so distinct keys can never collide
/// after escaping.
pub fn safe_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 17);
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                out.push(byte as char);
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{:02X}", byte));
            }
        }
    }
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    out.push('-');
    out.push_str(&format!("{:016x}", hasher.finish()));
    out
}
