//! Model asset lookup and availability checks.
//!
//! Model files usually live in a packaged, read-only bundle and are often
//! only partially present during development. [`verify`] therefore never
//! fails as a whole: it probes every path and returns an [`AssetReport`]
//! that the caller turns into an error only for the assets it cannot do
//! without.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::TtsError;

#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("Asset '{0}' not found")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read asset archive: {0}")]
    Archive(String),
}

/// Read-only access to packaged model assets.
pub trait AssetStore {
    /// Entries directly under `dir`, sorted. Empty when `dir` does not exist.
    fn list(&self, dir: &str) -> Vec<String>;

    /// Open `path` for reading.
    fn open(&self, path: &str) -> Result<Box<dyn Read + '_>, AssetError>;

    /// Whether `path` names a readable entry. Directories are not entries.
    ///
    /// The default opens the entry and drops the stream unread; stores
    /// that can answer from an index should override it.
    fn exists(&self, path: &str) -> Result<bool, AssetError> {
        match self.open(path) {
            Ok(_stream) => Ok(true),
            Err(AssetError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Assets stored under a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetStore for DirAssetStore {
    fn list(&self, dir: &str) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.root.join(dir)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort_unstable();
        names
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + '_>, AssetError> {
        let full = self.root.join(path);
        if !full.is_file() {
            return Err(AssetError::NotFound(path.to_string()));
        }
        Ok(Box::new(File::open(full)?))
    }

    fn exists(&self, path: &str) -> Result<bool, AssetError> {
        Ok(self.root.join(path).is_file())
    }
}

/// Assets stored as entries of a zip archive, the way an application
/// package bundles them.
pub struct ZipAssetStore<R = File> {
    archive: Mutex<ZipArchive<R>>,
}

impl ZipAssetStore<File> {
    pub fn open_file(path: &Path) -> Result<Self, AssetError> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek> ZipAssetStore<R> {
    pub fn new(reader: R) -> Result<Self, AssetError> {
        let archive = ZipArchive::new(reader)
            .map_err(|e| AssetError::Archive(format!("Failed to open zip archive: {e}")))?;
        log::debug!("Opened asset archive with {} entries", archive.len());
        Ok(Self {
            archive: Mutex::new(archive),
        })
    }
}

impl<R: Read + Seek> AssetStore for ZipAssetStore<R> {
    fn list(&self, dir: &str) -> Vec<String> {
        let Ok(archive) = self.archive.lock() else {
            return Vec::new();
        };
        let dir = dir.trim_matches('/');
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let children: BTreeSet<String> = archive
            .file_names()
            .filter_map(|name| name.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.split('/').next())
            .filter(|child| !child.is_empty())
            .map(str::to_string)
            .collect();
        children.into_iter().collect()
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + '_>, AssetError> {
        let mut archive = self
            .archive
            .lock()
            .map_err(|_| AssetError::Archive("archive lock poisoned".to_string()))?;
        let mut entry = archive.by_name(path).map_err(|e| match e {
            ZipError::FileNotFound => AssetError::NotFound(path.to_string()),
            other => AssetError::Archive(format!("Failed to read {path}: {other}")),
        })?;
        if entry.is_dir() {
            return Err(AssetError::NotFound(path.to_string()));
        }

        // The entry borrows the locked archive, so hand out an owned copy.
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        Ok(Box::new(Cursor::new(data)))
    }

    /// Answered from the central directory; no entry data is read.
    fn exists(&self, path: &str) -> Result<bool, AssetError> {
        let archive = self
            .archive
            .lock()
            .map_err(|_| AssetError::Archive("archive lock poisoned".to_string()))?;
        Ok(!path.ends_with('/') && archive.index_for_name(path).is_some())
    }
}

/// Per-path outcome of [`verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetReport {
    entries: BTreeMap<String, bool>,
}

impl AssetReport {
    /// Every probed path with whether it was found, sorted by path.
    pub fn entries(&self) -> &BTreeMap<String, bool> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_found(&self, path: &str) -> bool {
        self.entries.get(path).copied().unwrap_or(false)
    }

    pub fn found(&self) -> Vec<&str> {
        self.filter(true)
    }

    pub fn missing(&self) -> Vec<&str> {
        self.filter(false)
    }

    pub fn is_complete(&self) -> bool {
        self.entries.values().all(|&found| found)
    }

    /// Fail with [`TtsError::MissingAsset`] if any of `paths` was not found.
    /// Paths that were never probed count as missing.
    pub fn require<I, P>(&self, paths: I) -> Result<(), TtsError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let missing: Vec<String> = paths
            .into_iter()
            .filter(|p| !self.is_found(p.as_ref()))
            .map(|p| p.as_ref().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TtsError::MissingAsset { missing })
        }
    }

    fn filter(&self, want: bool) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, &found)| found == want)
            .map(|(path, _)| path.as_str())
            .collect()
    }
}

/// Probe every path in `required` against `store`.
///
/// Duplicates collapse, so the report holds one entry per distinct path.
pub fn verify<S, I, P>(store: &S, required: I) -> AssetReport
where
    S: AssetStore + ?Sized,
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let mut entries = BTreeMap::new();
    for path in required {
        let path = path.as_ref();
        if entries.contains_key(path) {
            continue;
        }
        let found = probe(store, path);
        if !found {
            log::warn!("Asset not found: {path}");
        }
        entries.insert(path.to_string(), found);
    }
    log::info!(
        "Verified {} assets, {} missing",
        entries.len(),
        entries.values().filter(|&&found| !found).count()
    );
    AssetReport { entries }
}

fn probe<S: AssetStore + ?Sized>(store: &S, path: &str) -> bool {
    match store.exists(path) {
        Ok(true) => true,
        // Data directories have no entry of their own.
        Ok(false) => !store.list(path).is_empty(),
        Err(e) => {
            log::warn!("Failed to probe asset {path}: {e}");
            false
        }
    }
}
