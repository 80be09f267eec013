//! In-memory decoded tile with bilinear elevation lookup. See spec.md §4.3.

use crate::block::{Block, BLOCK_SIZE_X, BLOCK_SIZE_Y};
use crate::geodesy::Coordinate;

/// A decoded height grid, immutable once constructed. Tiles are never
/// mutated after insertion into the cache (spec.md §3).
#[derive(Debug, Clone)]
pub struct Tile {
    pub sw: Coordinate,
    pub spacing_m: u16,
    pub heights: [[i16; BLOCK_SIZE_Y]; BLOCK_SIZE_X],
    pub valid: bool,
}

impl Tile {
    pub fn from_block(block: &Block) -> Tile {
        Tile {
            sw: Coordinate::new(block.sw_lat, block.sw_lon),
            spacing_m: block.spacing,
            heights: block.height,
            valid: true,
        }
    }

    pub fn invalid() -> Tile {
        Tile {
            sw: Coordinate::new(0, 0),
            spacing_m: 0,
            heights: [[0i16; BLOCK_SIZE_Y]; BLOCK_SIZE_X],
            valid: false,
        }
    }

    /// Bilinear elevation lookup. Returns `NaN` for any coordinate
    /// outside the tile's interior - callers treat that as a cache miss
    /// the tile claimed to satisfy (spec.md §4.3).
    pub fn elevation(&self, coord: Coordinate) -> f64 {
        if !self.valid || self.spacing_m == 0 {
            return f64::NAN;
        }

        let (north_m, east_m) = self.sw.distance_ne(&coord);
        let fx = north_m / self.spacing_m as f64;
        let fy = east_m / self.spacing_m as f64;

        if fx < 0.0 || fy < 0.0 || fx > (BLOCK_SIZE_X - 1) as f64 || fy > (BLOCK_SIZE_Y - 1) as f64 {
            return f64::NAN;
        }

        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(BLOCK_SIZE_X - 1);
        let y1 = (y0 + 1).min(BLOCK_SIZE_Y - 1);

        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;

        let h00 = self.heights[x0][y0] as f64;
        let h10 = self.heights[x1][y0] as f64;
        let h01 = self.heights[x0][y1] as f64;
        let h11 = self.heights[x1][y1] as f64;

        let h0 = h00 * (1.0 - tx) + h10 * tx;
        let h1 = h01 * (1.0 - tx) + h11 * tx;
        h0 * (1.0 - ty) + h1 * ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_block(height_m: i16) -> Block {
        Block {
            bitmap: u64::MAX,
            sw_lat: -35 * 10_000_000,
            sw_lon: 149 * 10_000_000,
            crc16: 0,
            version: 1,
            spacing: 100,
            height: [[height_m; BLOCK_SIZE_Y]; BLOCK_SIZE_X],
            grid_idx_x: 0,
            grid_idx_y: 0,
            lon_degrees: 149,
            lat_degrees: -35,
        }
    }

    #[test]
    fn elevation_is_flat_inside_flat_tile() {
        let tile = Tile::from_block(&flat_block(586));
        let inside = Coordinate::new(tile.sw.lat + 100, tile.sw.lon + 100);
        let elevation = tile.elevation(inside);
        assert!((elevation - 586.0).abs() < 1e-6);
    }

    #[test]
    fn elevation_outside_tile_is_nan() {
        let tile = Tile::from_block(&flat_block(586));
        let far = Coordinate::new(tile.sw.lat - 50_000_000, tile.sw.lon);
        assert!(tile.elevation(far).is_nan());
    }

    #[test]
    fn invalid_tile_always_nan() {
        let tile = Tile::invalid();
        assert!(tile.elevation(Coordinate::new(0, 0)).is_nan());
        assert!(!tile.valid);
    }

    #[test]
    fn bilinear_interpolates_between_corners() {
        let mut block = flat_block(0);
        // Ramp along the x (north-south) axis so we can check the midpoint.
        for (x, row) in block.height.iter_mut().enumerate() {
            for sample in row.iter_mut() {
                *sample = (x as i16) * 10;
            }
        }
        let tile = Tile::from_block(&block);
        let midpoint_north_m = (BLOCK_SIZE_X as f64 / 2.0) * tile.spacing_m as f64;
        let coord = tile.sw.offset(midpoint_north_m, 5.0 * tile.spacing_m as f64);
        let elevation = tile.elevation(coord);
        assert!((elevation - 160.0).abs() < 1.0, "elevation={elevation}");
    }
}
