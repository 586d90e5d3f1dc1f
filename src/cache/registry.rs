//! Bidirectional tag index.
//!
//! Tracks which cache keys carry which tags so a mutation can drop every
//! affected read in one call.

use std::collections::{HashMap, HashSet};

use super::keys::{CacheKey, Tag};

/// Tracks tag → keys and key → tags mappings.
///
/// The reverse mapping lets a key that is deleted through one tag (or
/// explicitly, or by expiry) disappear from every other tag as well, so no
/// tag keeps pointing at keys that are already gone.
#[derive(Default)]
pub struct TagIndex {
    tag_to_keys: HashMap<Tag, HashSet<CacheKey>>,
    key_to_tags: HashMap<CacheKey, HashSet<Tag>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `key` with `tag`.
    pub fn attach(&mut self, tag: Tag, key: CacheKey) {
        self.tag_to_keys
            .entry(tag.clone())
            .or_default()
            .insert(key.clone());
        self.key_to_tags.entry(key).or_default().insert(tag);
    }

    /// Drop `tag` and return the keys it covered.
    ///
    /// Returned keys are also unlinked from their other tags; the caller is
    /// expected to delete their cache entries.
    pub fn invalidate_by_tag(&mut self, tag: &Tag) -> HashSet<CacheKey> {
        let keys = self.tag_to_keys.remove(tag).unwrap_or_default();
        for key in &keys {
            self.unlink(key);
        }
        keys
    }

    /// Remove `key` from every tag it belongs to.
    pub fn unregister(&mut self, key: &CacheKey) {
        self.unlink(key);
    }

    fn unlink(&mut self, key: &CacheKey) {
        let Some(tags) = self.key_to_tags.remove(key) else {
            return;
        };
        for tag in tags {
            if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_to_keys.remove(&tag);
                }
            }
        }
    }

    /// Keys currently carrying `tag`.
    pub fn keys_for_tag(&self, tag: &Tag) -> HashSet<CacheKey> {
        self.tag_to_keys.get(tag).cloned().unwrap_or_default()
    }

    /// Tags currently attached to `key`.
    pub fn tags_for_key(&self, key: &CacheKey) -> HashSet<Tag> {
        self.key_to_tags.get(key).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.tag_to_keys.clear();
        self.key_to_tags.clear();
    }

    pub fn tag_count(&self) -> usize {
        self.tag_to_keys.len()
    }

    pub fn key_count(&self) -> usize {
        self.key_to_tags.len()
    }
}
