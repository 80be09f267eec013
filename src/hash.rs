//! Deterministic tile-hash naming. See spec.md §4.8.
//!
//! The hash is the sole identifier through which cache hits cross caller
//! boundaries: two queries landing on the same tile must compute the
//! same `TileHash`, and the two providers must never collide with each
//! other (grounded in `QGCMapEngine::getTileHash`, called from both
//! `TerrainQuerySRTM::_getTileHash` and `TerrainQueryAirMap::_getTileHash`
//! with a different first argument per provider).

use std::fmt;

/// Opaque, deterministic cache key for one tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileHash(String);

impl TileHash {
    /// Hash for a `FileProvider` tile: filename + block grid indices +
    /// the file's east-block stride (so two files with different
    /// spacing, and thus different stride, never collide even if their
    /// grid indices happen to match).
    pub fn for_file(filename: &str, grid_idx_x: u16, grid_idx_y: u16, num_east_blocks: i32) -> TileHash {
        TileHash(format!("file:{filename}:{grid_idx_x}:{grid_idx_y}:{num_east_blocks}"))
    }

    /// Hash for an `HttpProvider` tile: map type + slippy tile indices.
    pub fn for_http(map_type: &str, tile_x: i64, tile_y: i64, zoom: u8) -> TileHash {
        TileHash(format!("http:{map_type}:{tile_x}:{tile_y}:{zoom}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_and_http_hashes_never_collide() {
        let file_hash = TileHash::for_file("N35E149.DAT", 3, 5, 12);
        let http_hash = TileHash::for_http("N35E149.DAT", 3, 5, 12);
        assert_ne!(file_hash, http_hash);
    }

    #[test]
    fn equal_inputs_produce_equal_hashes() {
        assert_eq!(TileHash::for_file("a.DAT", 1, 2, 3), TileHash::for_file("a.DAT", 1, 2, 3));
    }
}
