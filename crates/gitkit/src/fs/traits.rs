//! Filesystem trait definitions

use async_trait::async_trait;
use std::path::Path;
use std::time::SystemTime;

use crate::error::Result;

/// Default mode for directories created without an explicit mode.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Default mode for regular files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Async filesystem trait.
///
/// Implementations only ever receive normalized absolute paths: relative
/// paths are resolved against the session's working directory by
/// [`SessionState::resolve`](crate::SessionState::resolve) before they get
/// here.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a file's contents.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write contents to a file, creating or truncating it.
    ///
    /// The parent directory must already exist.
    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Append contents to a file, creating it if missing.
    async fn append_file(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Create an empty file, truncating any existing one.
    ///
    /// The parent directory must already exist.
    async fn create(&self, path: &Path) -> Result<()> {
        self.write_file(path, b"").await
    }

    /// Create a directory.
    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<()>;

    /// Create every missing directory along `path` with `mode`.
    ///
    /// Succeeds without changes when `path` is already a directory.
    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()>;

    /// Remove a file or directory.
    async fn remove(&self, path: &Path, recursive: bool) -> Result<()>;

    /// Get file metadata.
    async fn stat(&self, path: &Path) -> Result<Metadata>;

    /// Read the immediate children of a directory, ordered by name.
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> Result<bool>;
}

/// File metadata.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// File type
    pub file_type: FileType,
    /// File size in bytes
    pub size: u64,
    /// File permissions (Unix mode)
    pub mode: u32,
    /// Last modification time
    pub modified: SystemTime,
}

impl Metadata {
    pub(crate) fn directory(mode: u32) -> Self {
        Self {
            file_type: FileType::Directory,
            size: 0,
            mode,
            modified: SystemTime::now(),
        }
    }

    pub(crate) fn file(size: u64) -> Self {
        Self {
            file_type: FileType::File,
            size,
            mode: DEFAULT_FILE_MODE,
            modified: SystemTime::now(),
        }
    }
}

/// File type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl FileType {
    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Directory entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (not full path)
    pub name: String,
    /// Entry metadata
    pub metadata: Metadata,
}
