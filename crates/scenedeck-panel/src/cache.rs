use std::collections::{HashMap, HashSet};

use scenedeck_types::assets::CachedAsset;

/// Cover images received during one panel lifetime.
///
/// Entries are never evicted; a repeated push for the same id replaces the
/// previous payload.
#[derive(Debug, Default)]
pub struct AssetCache {
    entries: HashMap<String, CachedAsset>,
    requested: HashSet<String>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, id: &str) -> Option<&CachedAsset> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, payload: CachedAsset) {
        self.entries.insert(id.into(), payload);
    }

    pub fn mark_requested(&mut self, id: impl Into<String>) {
        self.requested.insert(id.into());
    }

    pub fn was_requested(&self, id: &str) -> bool {
        self.requested.contains(id)
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

    #[test]
    fn last_write_wins() {
        let mut cache = AssetCache::new();
        assert!(cache.lookup("cover").is_none());
        cache.insert("cover", CachedAsset::new("AAAA", "image/png"));
        cache.insert("cover", CachedAsset::new("BBBB", "image/webp"));
        let stored = cache.lookup("cover").expect("cached");
        assert_eq!(stored.base64, "BBBB");
        assert_eq!(stored.media_type, "image/webp");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn requested_ids_are_tracked_separately() {
        let mut cache = AssetCache::new();
        cache.mark_requested("cover");
        assert!(cache.was_requested("cover"));
        assert!(!cache.contains("cover"));
        assert!(cache.is_empty());
    }
}
