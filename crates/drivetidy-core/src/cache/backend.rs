/// Storage backends for snapshot records.
///
/// A backend stores opaque byte blobs under string keys. The only hard
/// requirement is that [`SnapshotBackend::write_atomic`] is all-or-nothing:
/// a reader must see either the previous blob or the new one, never a mix.
use crate::error::CacheError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Length of a hex-encoded SHA-256 scope key.
const KEY_LEN: usize = 64;

/// Key/value storage used by [`SnapshotCache`](super::SnapshotCache).
pub trait SnapshotBackend: Send + Sync {
    /// Read the blob stored under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Replace the blob under `key` in one step.
    fn write_atomic(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every record this backend owns.
    fn remove_all(&self) -> Result<(), CacheError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// One JSON file per key inside a cache directory.
///
/// Writes go to `<key>.json.tmp`, are synced, then renamed over
/// `<key>.json`. A crash before the rename leaves only the temp file,
/// which readers never look at.
#[derive(Debug, Clone)]
pub struct DirBackend {
    root: PathBuf,
}

impl DirBackend {
    /// Open (and create if needed) a cache directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of the record for `key`.
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{RECORD_EXTENSION}"))
    }

    /// Staging location used while `key` is being written.
    pub fn temp_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{TEMP_EXTENSION}"))
    }
}

impl SnapshotBackend for DirBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.record_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let tmp = self.temp_path(key);
        let target = self.record_path(key);

        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);

        replace_file(&tmp, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        remove_if_present(&self.record_path(key))?;
        remove_if_present(&self.temp_path(key))?;
        Ok(())
    }

    fn remove_all(&self) -> Result<(), CacheError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        // The directory may be shared: only files named after a scope key go.
        for entry in entries {
            let path = entry?.path();
            let ours = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_record_file_name);
            if ours && path.is_file() {
                remove_if_present(&path)?;
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// `<64 lowercase hex>.json` or `<64 lowercase hex>.json.tmp`.
fn is_record_file_name(name: &str) -> bool {
    let key = name
        .strip_suffix(&format!(".{TEMP_EXTENSION}"))
        .or_else(|| name.strip_suffix(&format!(".{RECORD_EXTENSION}")));
    key.is_some_and(|key| {
        key.len() == KEY_LEN && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    })
}

/// Rename `from` over `to`.
///
/// POSIX rename replaces the target atomically. Windows refuses to rename
/// onto an existing file, so the target is removed first there.
fn replace_file(from: &Path, to: &Path) -> std::io::Result<()> {
    #[cfg(windows)]
    {
        if to.exists() {
            fs::remove_file(to)?;
        }
    }
    fs::rename(from, to)
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Process-local backend for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a record without any validation.
    pub fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
        self.records.write().insert(key.to_string(), bytes);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl SnapshotBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.records.read().get(key).cloned())
    }

    fn write_atomic(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        self.records.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.records.write().remove(key);
        Ok(())
    }

    fn remove_all(&self) -> Result<(), CacheError> {
        self.records.write().clear();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
