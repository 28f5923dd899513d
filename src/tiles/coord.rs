//! Tile identity and the geographic tiling scheme
//!
//! Tiles address the sphere with a WMTS-style matrix: at level `z` the
//! full sphere splits into `2^(z+1)` columns by `2^z` rows, so tiles are
//! square-ish near the equator. `(level, col, row)` is the stable key for
//! every tile; bounds derive deterministically from it.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Identity of one quadtree cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub level: u8,
    pub col: u32,
    pub row: u32,
}

/// Geographic bounds of a tile, in radians.
///
/// Longitude grows eastward from `-PI`, latitude is `+PI/2` at the north
/// pole, so `lat_north > lat_south` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    pub lon_west: f64,
    pub lon_east: f64,
    pub lat_north: f64,
    pub lat_south: f64,
}

impl TileBounds {
    pub fn lon_span(&self) -> f64 {
        self.lon_east - self.lon_west
    }

    pub fn lat_span(&self) -> f64 {
        self.lat_north - self.lat_south
    }

    /// Bounds midpoint as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.lat_north + self.lat_south) * 0.5,
            (self.lon_west + self.lon_east) * 0.5,
        )
    }
}

impl TileCoord {
    pub fn new(level: u8, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }

    /// Matrix dimensions `(columns, rows)` at a level.
    pub fn grid_size(level: u8) -> (u32, u32) {
        (1u32 << (level + 1), 1u32 << level)
    }

    /// Every tile of the full grid at a level, row-major.
    pub fn level_grid(level: u8) -> Vec<TileCoord> {
        let (cols, rows) = Self::grid_size(level);
        let mut tiles = Vec::with_capacity((cols * rows) as usize);
        for row in 0..rows {
            for col in 0..cols {
                tiles.push(TileCoord::new(level, col, row));
            }
        }
        tiles
    }

    /// Geographic bounds derived from the tiling scheme.
    pub fn bounds(&self) -> TileBounds {
        let (cols, rows) = Self::grid_size(self.level);
        let lon_span = TAU / cols as f64;
        let lat_span = PI / rows as f64;
        let lon_west = -PI + self.col as f64 * lon_span;
        let lat_north = FRAC_PI_2 - self.row as f64 * lat_span;
        TileBounds {
            lon_west,
            lon_east: lon_west + lon_span,
            lat_north,
            lat_south: lat_north - lat_span,
        }
    }

    /// 3D point on the sphere at the bounds midpoint.
    pub fn center_on_sphere(&self, radius: f32) -> Vec3 {
        let (lat, lon) = self.bounds().center();
        sphere_point(lat, lon, radius)
    }

    /// The four child tiles one level down (column/row doubling),
    /// ordered west-to-east, north-to-south.
    pub fn children(&self) -> [TileCoord; 4] {
        let level = self.level + 1;
        let (col, row) = (self.col * 2, self.row * 2);
        [
            TileCoord::new(level, col, row),
            TileCoord::new(level, col + 1, row),
            TileCoord::new(level, col, row + 1),
            TileCoord::new(level, col + 1, row + 1),
        ]
    }

    /// The parent tile, unless already at level 0.
    pub fn parent(&self) -> Option<TileCoord> {
        if self.level == 0 {
            None
        } else {
            Some(TileCoord::new(self.level - 1, self.col / 2, self.row / 2))
        }
    }

    /// Imagery URL for this tile: `{base}/{level}/{row}/{col}.{ext}`
    /// (row before column, tile-matrix convention).
    pub fn url(&self, base_url: &str, extension: &str) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            base_url, self.level, self.row, self.col, extension
        )
    }
}

/// Project geographic coordinates onto a sphere.
///
/// Y points at the north pole, longitude 0 lies on +X, longitude grows
/// eastward toward -Z.
pub fn sphere_point(lat: f64, lon: f64, radius: f32) -> Vec3 {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    Vec3::new(
        (cos_lat * cos_lon) as f32,
        sin_lat as f32,
        -(cos_lat * sin_lon) as f32,
    ) * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_size() {
        assert_eq!(TileCoord::grid_size(0), (2, 1));
        assert_eq!(TileCoord::grid_size(1), (4, 2));
        assert_eq!(TileCoord::grid_size(3), (16, 8));
    }

    #[test]
    fn test_level_grid_counts() {
        assert_eq!(TileCoord::level_grid(0).len(), 2);
        assert_eq!(TileCoord::level_grid(1).len(), 8);
        assert_eq!(TileCoord::level_grid(2).len(), 32);
    }

    #[test]
    fn test_bounds_partition_row() {
        // Longitude spans across any row sum to a full circle.
        for level in 0..4u8 {
            let (cols, rows) = TileCoord::grid_size(level);
            for row in 0..rows {
                let total: f64 = (0..cols)
                    .map(|col| TileCoord::new(level, col, row).bounds().lon_span())
                    .sum();
                assert!((total - TAU).abs() < 1e-9, "level {} row {}", level, row);
            }
        }
    }

    #[test]
    fn test_bounds_partition_column() {
        // Latitude spans down any column sum to pole-to-pole.
        for level in 0..4u8 {
            let (_, rows) = TileCoord::grid_size(level);
            let total: f64 = (0..rows)
                .map(|row| TileCoord::new(level, 0, row).bounds().lat_span())
                .sum();
            assert!((total - PI).abs() < 1e-9, "level {}", level);
        }
    }

    #[test]
    fn test_bounds_no_gaps() {
        // Adjacent tiles share edges exactly.
        let a = TileCoord::new(2, 3, 1).bounds();
        let b = TileCoord::new(2, 4, 1).bounds();
        assert!((a.lon_east - b.lon_west).abs() < 1e-12);

        let c = TileCoord::new(2, 3, 2).bounds();
        assert!((a.lat_south - c.lat_north).abs() < 1e-12);
    }

    #[test]
    fn test_children_doubling_rule() {
        let parent = TileCoord::new(2, 5, 3);
        let children = parent.children();
        for child in children {
            assert_eq!(child.level, 3);
            assert!(child.col == 10 || child.col == 11);
            assert!(child.row == 6 || child.row == 7);
            assert_eq!(child.parent(), Some(parent));
        }
        // All four quadrants are distinct.
        assert_eq!(
            children
                .iter()
                .map(|c| (c.col, c.row))
                .collect::<std::collections::HashSet<_>>()
                .len(),
            4
        );
    }

    #[test]
    fn test_children_cover_parent_bounds() {
        let parent = TileCoord::new(1, 2, 1);
        let pb = parent.bounds();
        let lon_total: f64 = parent.children()[..2]
            .iter()
            .map(|c| c.bounds().lon_span())
            .sum();
        assert!((lon_total - pb.lon_span()).abs() < 1e-12);

        let nw = parent.children()[0].bounds();
        assert!((nw.lon_west - pb.lon_west).abs() < 1e-12);
        assert!((nw.lat_north - pb.lat_north).abs() < 1e-12);
    }

    #[test]
    fn test_root_has_no_parent() {
        assert_eq!(TileCoord::new(0, 1, 0).parent(), None);
    }

    #[test]
    fn test_url_row_before_column() {
        let coord = TileCoord::new(3, 7, 2);
        assert_eq!(
            coord.url("https://tiles.example.com/mars", "jpg"),
            "https://tiles.example.com/mars/3/2/7.jpg"
        );
    }

    #[test]
    fn test_sphere_point_axes() {
        let origin = sphere_point(0.0, 0.0, 2.0);
        assert!((origin - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-6);

        let north = sphere_point(FRAC_PI_2, 0.0, 1.0);
        assert!((north - Vec3::Y).length() < 1e-6);

        let east = sphere_point(0.0, FRAC_PI_2, 1.0);
        assert!((east - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn test_center_on_sphere_radius() {
        for coord in TileCoord::level_grid(2) {
            let center = coord.center_on_sphere(3.5);
            assert!((center.length() - 3.5).abs() < 1e-4);
        }
    }
}
