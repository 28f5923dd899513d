//! Quadtree tile streaming for planetary surface imagery
//!
//! The sphere is addressed as a WMTS-style matrix of geographic tiles.
//! Each frame the manager walks the quadtree, culls back-facing tiles,
//! subdivides what looks big on screen, and streams imagery through a
//! priority-ordered, concurrency-limited fetch scheduler backed by a
//! bounded LRU texture cache.

pub mod cache;
pub mod config;
pub mod coord;
pub mod geometry;
pub mod loader;
pub mod lod;
pub mod manager;
pub mod texture;

pub use cache::{DEFAULT_CAPACITY, TextureCache};
pub use config::TileConfig;
pub use coord::{TileBounds, TileCoord, sphere_point};
pub use geometry::{PatchVertex, TilePatch, build_globe, build_patch};
pub use loader::{
    DEFAULT_MAX_CONCURRENT, FetchError, FetchOutcome, HttpFetcher, LoadRequest, TextureLoader,
    TileFetcher, priority_score,
};
pub use lod::{
    BACKFACE_DOT_MIN, SPLIT_PIXEL_THRESHOLD, is_back_facing, projected_size_px, should_subdivide,
};
pub use manager::{TileManager, TileNode, TileState};
pub use texture::{DetailLevel, Material, TileTexture, decode_texture};
