//! Append-only record of reference movement within a session.
//!
//! Rendering keeps storage order: the first entry ever appended is
//! `HEAD@{0}` and indices grow toward the newest entry. Real git numbers
//! the other way round; the sandbox keeps insertion order so a learner
//! reading top to bottom sees operations in the order they ran.

use serde::Serialize;
use std::collections::VecDeque;

use crate::engine::short_hash;

/// One reference movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflogEntry {
    /// Full object id the reference moved to
    pub hash: String,
    /// What moved it, e.g. `clone: from https://...`
    pub message: String,
}

/// Ordered reflog with optional retention.
#[derive(Debug, Clone, Default)]
pub struct Reflog {
    entries: VecDeque<ReflogEntry>,
    retention: Option<usize>,
}

impl Reflog {
    /// Unbounded reflog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reflog that keeps at most `retention` entries, dropping the oldest.
    pub fn with_retention(retention: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            retention,
        }
    }

    /// Append an entry at the end of storage order.
    pub fn append(&mut self, hash: impl Into<String>, message: impl Into<String>) {
        if self.retention == Some(0) {
            return;
        }
        if let Some(max) = self.retention {
            while self.entries.len() >= max {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(ReflogEntry {
            hash: hash.into(),
            message: message.into(),
        });
    }

    /// Entries in storage order, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ReflogEntry> {
        self.entries.iter()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&ReflogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `<hash[:7]> HEAD@{<index>}: <message>` per entry, storage order.
    pub fn render(&self) -> Vec<String> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{} HEAD@{{{}}}: {}", short_hash(&e.hash), i, e.message))
            .collect()
    }
}
