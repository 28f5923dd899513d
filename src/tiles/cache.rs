//! LRU cache for tile textures
//!
//! Bounded url -> texture store. Every hit and insert marks the entry
//! most-recently-used; once the entry count exceeds capacity the least
//! recently used entries are released.

use std::collections::HashMap;
use std::sync::Arc;

use crate::tiles::texture::TileTexture;

/// Default number of textures kept resident.
pub const DEFAULT_CAPACITY: usize = 64;

/// Bounded LRU texture store keyed by tile URL.
pub struct TextureCache {
    entries: HashMap<String, Arc<TileTexture>>,
    /// Access order: oldest first, newest last.
    access_order: Vec<String>,
    capacity: usize,
}

impl TextureCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            access_order: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Look up a texture, marking it most-recently-used on a hit.
    pub fn get(&mut self, url: &str) -> Option<Arc<TileTexture>> {
        if self.entries.contains_key(url) {
            self.touch(url);
            self.entries.get(url).cloned()
        } else {
            None
        }
    }

    /// Insert or overwrite a texture, then evict down to capacity.
    pub fn put(&mut self, url: impl Into<String>, texture: Arc<TileTexture>) {
        let url = url.into();
        self.remove_from_order(&url);
        self.entries.insert(url.clone(), texture);
        self.access_order.push(url);
        self.evict_if_needed();
    }

    /// Evict least-recently-used entries while over capacity. Ties break
    /// by insertion order (older insert evicts first).
    pub fn evict_if_needed(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.access_order.first().cloned() else {
                break;
            };
            self.access_order.remove(0);
            self.entries.remove(&oldest);
            log::debug!("evicted tile texture {oldest}");
        }
    }

    /// Release every cached texture.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_order.clear();
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Move a key to the most-recently-used end.
    fn touch(&mut self, url: &str) {
        self.remove_from_order(url);
        self.access_order.push(url.to_string());
    }

    fn remove_from_order(&mut self, url: &str) {
        if let Some(pos) = self.access_order.iter().position(|u| u == url) {
            self.access_order.remove(pos);
        }
    }
}
