//! Virtual filesystem for Gitkit
//!
//! Provides an async filesystem trait and the in-memory implementation
//! each session owns:
//! - `InMemoryFs`: hierarchical store keyed by normalized absolute path
//! - `FsLimits`: per-filesystem resource bounds

mod limits;
mod memory;
mod traits;

pub use limits::{FsLimitExceeded, FsLimits, FsUsage};
pub use memory::InMemoryFs;
pub use traits::{DEFAULT_DIR_MODE, DirEntry, FileSystem, FileType, Metadata};
