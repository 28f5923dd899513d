//! Tile streaming configuration

use std::time::Duration;

use crate::tiles::cache::DEFAULT_CAPACITY;
use crate::tiles::loader::DEFAULT_MAX_CONCURRENT;

/// Configuration for a [`TileManager`](crate::tiles::TileManager).
///
/// Options are normalized but not validated: a wrong `base_url` degrades
/// to tiles that never load while the fallback imagery stays visible.
#[derive(Clone, Debug)]
pub struct TileConfig {
    /// Sphere radius, scene units.
    pub radius: f32,
    /// Tile source root; a trailing slash is stripped.
    pub base_url: String,
    /// Quadtree level of the eagerly-created root grid.
    pub min_level: u8,
    /// Deepest level subdivision may reach.
    pub max_level: u8,
    /// Vertex grid resolution per tile edge.
    pub segments: u32,
    /// Maximum anisotropic filtering hint passed to materials.
    pub anisotropy: u8,
    /// Image file extension; a leading dot is stripped.
    pub extension: String,
    /// Texture cache capacity, entries.
    pub cache_capacity: usize,
    /// Simultaneous outstanding tile fetches.
    pub max_concurrent_fetches: usize,
    /// Per-fetch timeout.
    pub fetch_timeout: Duration,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            radius: 1.0,
            base_url: String::new(),
            min_level: 1,
            max_level: 7,
            segments: 16,
            anisotropy: 8,
            extension: "jpg".to_string(),
            cache_capacity: DEFAULT_CAPACITY,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl TileConfig {
    /// Config pointing at a tile source, defaults everywhere else.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
        .sanitized()
    }

    /// Normalize the recognized options: strip the base URL's trailing
    /// slashes and the extension's leading dot, keep the level range
    /// ordered.
    pub fn sanitized(mut self) -> Self {
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        self.extension = self.extension.trim_start_matches('.').to_string();
        self.max_level = self.max_level.max(self.min_level);
        self
    }
}
