//! LOD and visibility decisions for tiles
//!
//! Pure functions: the quadtree traversal feeds them per-tile values and
//! acts on the answers. Subdivision is driven by projected screen size,
//! culling by the angle between a tile's outward normal and the camera.

use glam::Vec3;

/// Projected size above which a tile subdivides, in pixels.
pub const SPLIT_PIXEL_THRESHOLD: f32 = 120.0;

/// Back-face tolerance: a tile is culled once its outward normal dots
/// below this against the tile-to-camera direction. Slightly negative so
/// tiles bleed a little past the horizon.
pub const BACKFACE_DOT_MIN: f32 = -0.2;

/// Apparent size of a tile on screen, in pixels.
///
/// `arc_length` is the tile's surface arc and `distance` the camera
/// range to the tile center. The angular size `2*atan2(arc/2, distance)`
/// converts to pixels through the viewport's pixels-per-radian.
pub fn projected_size_px(arc_length: f32, distance: f32, viewport_height: f32, fov_y: f32) -> f32 {
    let angular = 2.0 * (arc_length * 0.5).atan2(distance);
    angular * (viewport_height / fov_y)
}

/// Whether a tile should split into its four children.
///
/// Strictly greater-than: a tile exactly at the threshold stays a leaf.
pub fn should_subdivide(projected_px: f32, level: u8, max_level: u8) -> bool {
    level < max_level && projected_px > SPLIT_PIXEL_THRESHOLD
}

/// Whether a tile on the sphere faces away from the camera.
pub fn is_back_facing(center: Vec3, camera_pos: Vec3) -> bool {
    let normal = center.normalize_or_zero();
    let to_camera = (camera_pos - center).normalize_or_zero();
    normal.dot(to_camera) < BACKFACE_DOT_MIN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projected_size_formula() {
        // arc 2 at distance 1: angular size 2*atan(1) = PI/2.
        let px = projected_size_px(2.0, 1.0, 600.0, 1.0);
        assert!((px - std::f32::consts::FRAC_PI_2 * 600.0).abs() < 1e-2);
    }

    #[test]
    fn test_projected_size_shrinks_with_distance() {
        let near = projected_size_px(1.0, 2.0, 600.0, 1.0);
        let far = projected_size_px(1.0, 20.0, 600.0, 1.0);
        assert!(near > far);
        assert!(far > 0.0);
    }

    #[test]
    fn test_projected_size_grows_with_arc() {
        let small = projected_size_px(0.5, 5.0, 600.0, 1.0);
        let large = projected_size_px(2.0, 5.0, 600.0, 1.0);
        assert!(large > small);
    }

    #[test]
    fn test_subdivide_threshold_is_strict() {
        assert!(!should_subdivide(SPLIT_PIXEL_THRESHOLD, 1, 7));
        assert!(should_subdivide(SPLIT_PIXEL_THRESHOLD + 1.0, 1, 7));
        assert!(!should_subdivide(SPLIT_PIXEL_THRESHOLD - 1.0, 1, 7));
    }

    #[test]
    fn test_subdivide_respects_max_level() {
        assert!(!should_subdivide(10_000.0, 7, 7));
        assert!(should_subdivide(10_000.0, 6, 7));
    }

    #[test]
    fn test_front_tile_not_culled() {
        let center = Vec3::new(1.0, 0.0, 0.0);
        let camera = Vec3::new(3.0, 0.0, 0.0);
        assert!(!is_back_facing(center, camera));
    }

    #[test]
    fn test_far_side_tile_culled() {
        let center = Vec3::new(-1.0, 0.0, 0.0);
        let camera = Vec3::new(3.0, 0.0, 0.0);
        assert!(is_back_facing(center, camera));
    }

    #[test]
    fn test_limb_tile_near_camera_culled() {
        // Tangent tile viewed from close up: dot ~ -0.32, past tolerance.
        let center = Vec3::new(0.0, 0.0, 1.0);
        let camera = Vec3::new(3.0, 0.0, 0.0);
        assert!(is_back_facing(center, camera));
    }

    #[test]
    fn test_limb_tile_from_afar_kept() {
        // Same tangent tile from far away stays within the horizon
        // bleed tolerance: dot ~ -0.1.
        let center = Vec3::new(0.0, 0.0, 1.0);
        let camera = Vec3::new(10.0, 0.0, 0.0);
        assert!(!is_back_facing(center, camera));
    }
}
