//! In-memory filesystem implementation

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::{Error as IoError, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::limits::{FsLimits, FsUsage};
use super::traits::{DEFAULT_DIR_MODE, DirEntry, FileSystem, Metadata};
use crate::error::{Error, Result};

/// In-memory filesystem.
///
/// Every session owns one. It starts with nothing but the root directory.
pub struct InMemoryFs {
    inner: RwLock<Inner>,
    limits: FsLimits,
}

struct Inner {
    entries: BTreeMap<PathBuf, FsEntry>,
    usage: FsUsage,
}

#[derive(Debug, Clone)]
enum FsEntry {
    File { content: Vec<u8>, metadata: Metadata },
    Directory { metadata: Metadata },
}

impl FsEntry {
    fn metadata(&self) -> &Metadata {
        match self {
            FsEntry::File { metadata, .. } | FsEntry::Directory { metadata } => metadata,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, FsEntry::Directory { .. })
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFs {
    /// Create an empty filesystem with default limits.
    pub fn new() -> Self {
        Self::with_limits(FsLimits::default())
    }

    /// Create an empty filesystem with custom limits.
    pub fn with_limits(limits: FsLimits) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            PathBuf::from("/"),
            FsEntry::Directory {
                metadata: Metadata::directory(DEFAULT_DIR_MODE),
            },
        );

        Self {
            inner: RwLock::new(Inner {
                entries,
                usage: FsUsage::default(),
            }),
            limits,
        }
    }

    /// Current byte and file totals.
    pub fn usage(&self) -> FsUsage {
        self.read().usage
    }

    // A panic while holding the lock cannot leave the map half-written:
    // every mutation is a single insert/remove, so poisoned state is usable.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn normalize_path(path: &Path) -> PathBuf {
        let mut result = PathBuf::from("/");

        for component in path.components() {
            match component {
                Component::Normal(name) => result.push(name),
                Component::ParentDir => {
                    result.pop();
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }

        result
    }

    fn require_parent_dir(entries: &BTreeMap<PathBuf, FsEntry>, path: &Path) -> Result<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        match entries.get(parent) {
            Some(entry) if entry.is_dir() => Ok(()),
            Some(_) => Err(Error::NotADirectory(parent.to_path_buf())),
            None => Err(Error::NotFound(parent.to_path_buf())),
        }
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let path = Self::normalize_path(path);
        let inner = self.read();

        match inner.entries.get(&path) {
            Some(FsEntry::File { content, .. }) => Ok(content.clone()),
            Some(FsEntry::Directory { .. }) => Err(IoError::other("is a directory").into()),
            None => Err(Error::NotFound(path)),
        }
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        let path = Self::normalize_path(path);
        self.limits.validate_path(&path)?;
        let mut inner = self.write();

        Self::require_parent_dir(&inner.entries, &path)?;

        let previous = match inner.entries.get(&path) {
            Some(FsEntry::Directory { .. }) => {
                return Err(IoError::other("is a directory").into());
            }
            Some(FsEntry::File { content, .. }) => Some(content.len() as u64),
            None => None,
        };

        let size = content.len() as u64;
        self.limits.check_write(&inner.usage, previous, size)?;

        inner.usage.total_bytes = inner.usage.total_bytes - previous.unwrap_or(0) + size;
        if previous.is_none() {
            inner.usage.file_count += 1;
        }
        inner.entries.insert(
            path,
            FsEntry::File {
                content: content.to_vec(),
                metadata: Metadata::file(size),
            },
        );

        Ok(())
    }

    async fn append_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        let existing = match self.read_file(path).await {
            Ok(existing) => existing,
            Err(Error::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut combined = existing;
        combined.extend_from_slice(content);
        self.write_file(path, &combined).await
    }

    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<()> {
        if recursive {
            return self.mkdir_all(path, DEFAULT_DIR_MODE).await;
        }

        let path = Self::normalize_path(path);
        self.limits.validate_path(&path)?;
        let mut inner = self.write();

        Self::require_parent_dir(&inner.entries, &path)?;
        if inner.entries.contains_key(&path) {
            return Err(IoError::new(ErrorKind::AlreadyExists, "file exists").into());
        }

        inner.entries.insert(
            path,
            FsEntry::Directory {
                metadata: Metadata::directory(DEFAULT_DIR_MODE),
            },
        );
        Ok(())
    }

    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        let path = Self::normalize_path(path);
        self.limits.validate_path(&path)?;
        let mut inner = self.write();

        let mut current = PathBuf::from("/");
        for component in path.components().skip(1) {
            current.push(component);
            match inner.entries.get(&current) {
                Some(entry) if entry.is_dir() => {}
                Some(_) => return Err(Error::NotADirectory(current)),
                None => {
                    inner.entries.insert(
                        current.clone(),
                        FsEntry::Directory {
                            metadata: Metadata::directory(mode),
                        },
                    );
                }
            }
        }

        Ok(())
    }

    async fn remove(&self, path: &Path, recursive: bool) -> Result<()> {
        let path = Self::normalize_path(path);
        if path == Path::new("/") {
            return Err(IoError::new(ErrorKind::PermissionDenied, "cannot remove root").into());
        }
        let mut inner = self.write();

        let is_dir = match inner.entries.get(&path) {
            Some(entry) => entry.is_dir(),
            None => return Err(Error::NotFound(path)),
        };

        let doomed: Vec<PathBuf> = if is_dir {
            let below: Vec<PathBuf> = inner
                .entries
                .keys()
                .filter(|p| p.starts_with(&path) && *p != &path)
                .cloned()
                .collect();
            if !recursive && !below.is_empty() {
                return Err(IoError::other("directory not empty").into());
            }
            below.into_iter().chain(std::iter::once(path)).collect()
        } else {
            vec![path]
        };

        for p in doomed {
            if let Some(FsEntry::File { content, .. }) = inner.entries.remove(&p) {
                inner.usage.total_bytes -= content.len() as u64;
                inner.usage.file_count -= 1;
            }
        }

        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        let path = Self::normalize_path(path);
        let inner = self.read();

        inner
            .entries
            .get(&path)
            .map(|entry| entry.metadata().clone())
            .ok_or(Error::NotFound(path))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let path = Self::normalize_path(path);
        let inner = self.read();

        match inner.entries.get(&path) {
            Some(FsEntry::Directory { .. }) => {
                // BTreeMap order keeps siblings sorted by name
                let result = inner
                    .entries
                    .iter()
                    .filter(|(entry_path, _)| {
                        entry_path.parent() == Some(path.as_path()) && *entry_path != &path
                    })
                    .map(|(entry_path, entry)| DirEntry {
                        name: entry_path
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_default(),
                        metadata: entry.metadata().clone(),
                    })
                    .collect();
                Ok(result)
            }
            Some(FsEntry::File { .. }) => Err(Error::NotADirectory(path)),
            None => Err(Error::NotFound(path)),
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = Self::normalize_path(path);
        Ok(self.read().entries.contains_key(&path))
    }
}

impl std::fmt::Debug for InMemoryFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("InMemoryFs")
            .field("entries", &inner.entries.len())
            .field("usage", &inner.usage)
            .finish()
    }
}
