//! Decoded tile textures and materials

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A decoded RGBA8 image ready for upload by the host renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileTexture {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 pixel data.
    pub pixels: Vec<u8>,
}

impl TileTexture {
    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}

/// Decode raw image bytes into a texture.
///
/// Accepts any container the `image` crate recognizes (jpg, png, ...).
pub fn decode_texture(bytes: &[u8]) -> Result<TileTexture, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(TileTexture {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Imagery detail tier derived from a tile's quadtree level.
///
/// A closed set of variants instead of detail-by-name lookup, so the
/// filtering branch is exhaustive at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DetailLevel {
    Low,
    Medium,
    High,
    Ultra,
}

impl DetailLevel {
    /// Tier for a quadtree level.
    pub fn for_level(level: u8) -> Self {
        match level {
            0..=1 => DetailLevel::Low,
            2..=3 => DetailLevel::Medium,
            4..=5 => DetailLevel::High,
            _ => DetailLevel::Ultra,
        }
    }

    /// Anisotropic filtering hint for this tier, capped by the
    /// configured maximum.
    pub fn anisotropy(self, max: u8) -> u8 {
        let preferred = match self {
            DetailLevel::Low => 1,
            DetailLevel::Medium => 2,
            DetailLevel::High => 4,
            DetailLevel::Ultra => 8,
        };
        preferred.min(max.max(1))
    }
}

/// Render material for one tile surface.
#[derive(Debug, Clone)]
pub struct Material {
    /// Bound imagery; `None` renders untextured until a fetch lands.
    pub texture: Option<Arc<TileTexture>>,
    pub detail: DetailLevel,
    /// Effective anisotropic filtering hint.
    pub anisotropy: u8,
}

impl Material {
    /// Material for a tile that has no imagery yet.
    pub fn untextured(level: u8, max_anisotropy: u8) -> Self {
        let detail = DetailLevel::for_level(level);
        Self {
            texture: None,
            detail,
            anisotropy: detail.anisotropy(max_anisotropy),
        }
    }

    pub fn is_textured(&self) -> bool {
        self.texture.is_some()
    }
}
