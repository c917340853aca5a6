//! crates/course_builder_core/src/staging.rs
//!
//! The file staging registry: an arena of not-yet-uploaded binaries, kept apart
//! from the content tree so large payloads are never copied into tree nodes.

use bytes::Bytes;
use std::collections::HashMap;

/// Typed index into a [`StagingRegistry`]. Keys are handed out in increasing
/// order and never reused, so a key that has been unstaged stays dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StagedKey(u64);

/// A binary attached by the author, held in memory until submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl StagedFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StagingRegistry {
    next_key: u64,
    entries: HashMap<StagedKey, StagedFile>,
}

impl StagingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, file: StagedFile) -> StagedKey {
        let key = StagedKey(self.next_key);
        self.next_key += 1;
        self.entries.insert(key, file);
        key
    }

    /// Removes the entry if present. Cascading deletes can reach a key that
    /// was already removed directly, so absent keys are a no-op.
    pub fn unstage(&mut self, key: StagedKey) {
        self.entries.remove(&key);
    }

    pub fn resolve(&self, key: StagedKey) -> Option<&StagedFile> {
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str) -> StagedFile {
        StagedFile::new(name, "application/pdf", b"%PDF-1.7".to_vec())
    }

    #[test]
    fn stage_then_resolve() {
        let mut registry = StagingRegistry::new();
        let key = registry.stage(pdf("notes.pdf"));
        assert_eq!(registry.resolve(key).map(|f| f.file_name.as_str()), Some("notes.pdf"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unstage_is_idempotent() {
        let mut registry = StagingRegistry::new();
        let key = registry.stage(pdf("a.pdf"));
        registry.unstage(key);
        registry.unstage(key);
        assert!(registry.resolve(key).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn keys_are_never_reused() {
        let mut registry = StagingRegistry::new();
        let stale = registry.stage(pdf("a.pdf"));
        registry.unstage(stale);
        let fresh = registry.stage(pdf("b.pdf"));
        assert_ne!(stale, fresh);
        assert!(registry.resolve(stale).is_none());
    }
}
