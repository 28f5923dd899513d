//! Curved surface patch generation for tiles
//!
//! Builds the renderable geometry for one quadtree cell: a grid of
//! vertices bilinearly interpolated across the tile's geographic bounds
//! and projected onto the sphere. Pure functions with no shared state;
//! safe to call concurrently for different tiles.

use std::f64::consts::{FRAC_PI_2, PI};

use glam::Vec3;

use crate::tiles::coord::{TileCoord, sphere_point};

/// Relative outward radial offset applied to tile patches so they never
/// sit coplanar with the fallback globe mesh.
pub const SURFACE_EPSILON: f32 = 1.0e-3;

/// One vertex of a surface patch, laid out for direct GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PatchVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Generated geometry for one tile (or the fallback globe).
#[derive(Debug, Clone)]
pub struct TilePatch {
    pub vertices: Vec<PatchVertex>,
    /// Triangle list, outward winding.
    pub indices: Vec<u32>,
    /// Bounds midpoint on the sphere, scene units.
    pub center: Vec3,
    /// Latitude span in radians.
    pub lat_span: f32,
    /// Longitude span in radians.
    pub lon_span: f32,
}

/// Build the curved patch for one tile.
///
/// Emits a `(segments+1) x (segments+1)` vertex grid covering the tile's
/// bounds, UVs spanning the full `[0,1]x[0,1]` range with V inverted to
/// match image orientation, and a triangle index list wound outward. The
/// surface sits [`SURFACE_EPSILON`] above the configured radius.
pub fn build_patch(coord: TileCoord, segments: u32, radius: f32) -> TilePatch {
    let bounds = coord.bounds();
    grid_patch(
        bounds.lon_west,
        bounds.lon_east,
        bounds.lat_north,
        bounds.lat_south,
        segments,
        radius * (1.0 + SURFACE_EPSILON),
        radius,
    )
}

/// Build the fallback whole-sphere placeholder mesh.
pub fn build_globe(segments: u32, radius: f32) -> TilePatch {
    grid_patch(-PI, PI, FRAC_PI_2, -FRAC_PI_2, segments, radius, radius)
}

fn grid_patch(
    lon_west: f64,
    lon_east: f64,
    lat_north: f64,
    lat_south: f64,
    segments: u32,
    surface_radius: f32,
    center_radius: f32,
) -> TilePatch {
    let seg = segments.max(1);
    let stride = seg + 1;

    let mut vertices = Vec::with_capacity((stride * stride) as usize);
    for i in 0..=seg {
        let v = i as f64 / seg as f64;
        let lat = lat_north + (lat_south - lat_north) * v;
        for j in 0..=seg {
            let u = j as f64 / seg as f64;
            let lon = lon_west + (lon_east - lon_west) * u;
            let unit = sphere_point(lat, lon, 1.0);
            vertices.push(PatchVertex {
                position: (unit * surface_radius).to_array(),
                normal: unit.to_array(),
                // V inverted: image rows run top-down, surface rows
                // run north-to-south.
                uv: [u as f32, 1.0 - v as f32],
            });
        }
    }

    let mut indices = Vec::with_capacity((seg * seg * 6) as usize);
    for i in 0..seg {
        for j in 0..seg {
            let a = i * stride + j;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }

    let mid_lat = (lat_north + lat_south) * 0.5;
    let mid_lon = (lon_west + lon_east) * 0.5;

    TilePatch {
        vertices,
        indices,
        center: sphere_point(mid_lat, mid_lon, center_radius),
        lat_span: (lat_north - lat_south) as f32,
        lon_span: (lon_east - lon_west) as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_vertex_and_index_counts() {
        let patch = build_patch(TileCoord::new(1, 0, 0), 4, 1.0);
        assert_eq!(patch.vertices.len(), 25);
        assert_eq!(patch.indices.len(), 4 * 4 * 6);
    }

    #[test]
    fn test_patch_uv_corners() {
        let patch = build_patch(TileCoord::new(2, 3, 1), 8, 1.0);
        // Northwest corner is emitted first, southeast last.
        assert_eq!(patch.vertices.first().unwrap().uv, [0.0, 1.0]);
        assert_eq!(patch.vertices.last().unwrap().uv, [1.0, 0.0]);

        for vertex in &patch.vertices {
            assert!((0.0..=1.0).contains(&vertex.uv[0]));
            assert!((0.0..=1.0).contains(&vertex.uv[1]));
        }
    }

    #[test]
    fn test_patch_normals_are_radial_units() {
        let patch = build_patch(TileCoord::new(1, 2, 0), 4, 5.0);
        for vertex in &patch.vertices {
            let normal = Vec3::from_array(vertex.normal);
            let position = Vec3::from_array(vertex.position);
            assert!((normal.length() - 1.0).abs() < 1e-5);
            // Normal points along the position vector.
            assert!(normal.dot(position.normalize()) > 0.9999);
        }
    }

    #[test]
    fn test_patch_sits_above_radius() {
        let radius = 2.0;
        let patch = build_patch(TileCoord::new(1, 0, 1), 4, radius);
        for vertex in &patch.vertices {
            let r = Vec3::from_array(vertex.position).length();
            assert!(r > radius);
            assert!((r - radius * (1.0 + SURFACE_EPSILON)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_patch_winding_is_outward() {
        let patch = build_patch(TileCoord::new(1, 1, 0), 4, 1.0);
        for tri in patch.indices.chunks_exact(3) {
            let a = Vec3::from_array(patch.vertices[tri[0] as usize].position);
            let b = Vec3::from_array(patch.vertices[tri[1] as usize].position);
            let c = Vec3::from_array(patch.vertices[tri[2] as usize].position);
            let face_normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(
                face_normal.dot(centroid) > 0.0,
                "inward-facing triangle {:?}",
                tri
            );
        }
    }

    #[test]
    fn test_patch_center_and_spans() {
        let coord = TileCoord::new(1, 2, 0);
        let patch = build_patch(coord, 4, 3.0);
        assert!((patch.center - coord.center_on_sphere(3.0)).length() < 1e-5);
        // Level-1 tiles are square in angle: PI/2 on each side.
        assert!((patch.lat_span - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((patch.lon_span - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_globe_sits_at_radius() {
        let globe = build_globe(8, 4.0);
        for vertex in &globe.vertices {
            let r = Vec3::from_array(vertex.position).length();
            assert!((r - 4.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_degenerate_segment_count_clamped() {
        let patch = build_patch(TileCoord::new(1, 0, 0), 0, 1.0);
        assert_eq!(patch.vertices.len(), 4);
        assert_eq!(patch.indices.len(), 6);
    }
}
