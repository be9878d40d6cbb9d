//! Filesystem resource limits for session filesystems.
//!
//! One tenant must not be able to exhaust process memory through its
//! virtual filesystem, so every write and directory creation is checked
//! against these bounds.

use std::path::{Component, Path};

/// Default maximum total filesystem size: 64MB
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 64_000_000;

/// Default maximum single file size: 8MB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 8_000_000;

/// Default maximum file count: 10,000
pub const DEFAULT_MAX_FILE_COUNT: u64 = 10_000;

/// Default maximum path depth (directory nesting): 64
pub const DEFAULT_MAX_PATH_DEPTH: usize = 64;

/// Default maximum filename (single component) length: 255 bytes
pub const DEFAULT_MAX_FILENAME_LENGTH: usize = 255;

/// Filesystem resource limits.
///
/// # Example
///
/// ```rust
/// use gitkit::{FsLimits, InMemoryFs};
///
/// let fs = InMemoryFs::with_limits(
///     FsLimits::new().max_file_size(1_000_000).max_file_count(500),
/// );
/// ```
///
/// | Limit | Default |
/// |-------|---------|
/// | `max_total_bytes` | 64MB |
/// | `max_file_size` | 8MB |
/// | `max_file_count` | 10,000 |
/// | `max_path_depth` | 64 |
/// | `max_filename_length` | 255 |
#[derive(Debug, Clone)]
pub struct FsLimits {
    /// Maximum total bytes across all files.
    pub max_total_bytes: u64,
    /// Maximum size of a single file in bytes.
    pub max_file_size: u64,
    /// Maximum number of files (directories not counted).
    pub max_file_count: u64,
    /// Maximum directory nesting depth.
    pub max_path_depth: usize,
    /// Maximum length of a single path component in bytes.
    pub max_filename_length: usize,
}

impl Default for FsLimits {
    fn default() -> Self {
        Self {
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
            max_filename_length: DEFAULT_MAX_FILENAME_LENGTH,
        }
    }
}

impl FsLimits {
    /// Create new limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create unlimited limits (no restrictions).
    pub fn unlimited() -> Self {
        Self {
            max_total_bytes: u64::MAX,
            max_file_size: u64::MAX,
            max_file_count: u64::MAX,
            max_path_depth: usize::MAX,
            max_filename_length: usize::MAX,
        }
    }

    /// Set maximum total filesystem size.
    pub fn max_total_bytes(mut self, bytes: u64) -> Self {
        self.max_total_bytes = bytes;
        self
    }

    /// Set maximum single file size.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Set maximum file count.
    pub fn max_file_count(mut self, count: u64) -> Self {
        self.max_file_count = count;
        self
    }

    /// Set maximum path depth.
    pub fn max_path_depth(mut self, depth: usize) -> Self {
        self.max_path_depth = depth;
        self
    }

    /// Set maximum filename length.
    pub fn max_filename_length(mut self, len: usize) -> Self {
        self.max_filename_length = len;
        self
    }

    /// Validate a normalized path against depth, name length and
    /// control-character rules.
    pub fn validate_path(&self, path: &Path) -> Result<(), FsLimitExceeded> {
        let mut depth = 0usize;
        for component in path.components() {
            if let Component::Normal(name) = component {
                let name = name.to_string_lossy();
                if name.len() > self.max_filename_length {
                    return Err(FsLimitExceeded::FilenameTooLong {
                        length: name.len(),
                        limit: self.max_filename_length,
                    });
                }
                if let Some(ch) = name.chars().find(|c| c.is_control()) {
                    return Err(FsLimitExceeded::UnsafePathChar(format!(
                        "U+{:04X}",
                        ch as u32
                    )));
                }
                depth += 1;
            }
        }

        if depth > self.max_path_depth {
            return Err(FsLimitExceeded::PathTooDeep {
                depth,
                limit: self.max_path_depth,
            });
        }
        Ok(())
    }

    /// Check a write that replaces `previous` bytes with `size` bytes.
    pub fn check_write(
        &self,
        usage: &FsUsage,
        previous: Option<u64>,
        size: u64,
    ) -> Result<(), FsLimitExceeded> {
        if size > self.max_file_size {
            return Err(FsLimitExceeded::FileSize {
                size,
                limit: self.max_file_size,
            });
        }
        if previous.is_none() && usage.file_count >= self.max_file_count {
            return Err(FsLimitExceeded::FileCount {
                limit: self.max_file_count,
            });
        }
        let total = usage
            .total_bytes
            .saturating_sub(previous.unwrap_or(0))
            .saturating_add(size);
        if total > self.max_total_bytes {
            return Err(FsLimitExceeded::TotalBytes {
                limit: self.max_total_bytes,
            });
        }
        Ok(())
    }
}

/// Running totals for a filesystem instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsUsage {
    /// Bytes held by regular files.
    pub total_bytes: u64,
    /// Number of regular files.
    pub file_count: u64,
}

/// Error returned when a filesystem limit is exceeded.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FsLimitExceeded {
    #[error("filesystem full: {limit} byte limit reached")]
    TotalBytes { limit: u64 },

    #[error("file too large: {size} bytes exceeds {limit} byte limit")]
    FileSize { size: u64, limit: u64 },

    #[error("too many files: {limit} file limit reached")]
    FileCount { limit: u64 },

    #[error("path too deep: {depth} levels exceeds {limit} level limit")]
    PathTooDeep { depth: usize, limit: usize },

    #[error("filename too long: {length} bytes exceeds {limit} byte limit")]
    FilenameTooLong { length: usize, limit: usize },

    #[error("path contains unsafe character {0}")]
    UnsafePathChar(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_depth() {
        let limits = FsLimits::new().max_path_depth(2);
        assert!(limits.validate_path(Path::new("/a/b")).is_ok());
        assert!(matches!(
            limits.validate_path(Path::new("/a/b/c")),
            Err(FsLimitExceeded::PathTooDeep { depth: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_validate_control_chars() {
        let limits = FsLimits::new();
        assert!(matches!(
            limits.validate_path(Path::new("/bad\u{7}name")),
            Err(FsLimitExceeded::UnsafePathChar(_))
        ));
    }

    #[test]
    fn test_check_write_overwrite_does_not_count_twice() {
        let limits = FsLimits::new().max_total_bytes(10).max_file_count(1);
        let usage = FsUsage {
            total_bytes: 8,
            file_count: 1,
        };
        // Replacing the 8-byte file with a 10-byte one stays within budget
        assert!(limits.check_write(&usage, Some(8), 10).is_ok());
        // A new file is rejected by the count limit
        assert!(matches!(
            limits.check_write(&usage, None, 1),
            Err(FsLimitExceeded::FileCount { limit: 1 })
        ));
    }
}
