//! Offline `.DAT` grid file provider. Grounded in
//! `TerrainQuerySRTM::fetchTerrainHeight`/`_calcFilename`/`_calcGridOffset`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::block::{Block, BLOCK_IO_SIZE};
use crate::error::{FetchError, Result};
use crate::geodesy::Coordinate;
use crate::hash::TileHash;
use crate::tile::Tile;

use super::FetchProvider;

/// Unless a file has actually been read, assume SRTM3-equivalent 100m
/// spacing (`TerrainQuerySRTM::kDefaultSpacing`).
const DEFAULT_SPACING: u16 = 100;

/// Block indices plus the file's east-block stride, needed both to seek
/// to the right 2048-byte record and to build a collision-free hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridOffset {
    pub x: u16,
    pub y: u16,
    pub num_east_blocks: i32,
}

/// Reads tiles from a directory of `{N|S}{lat}{E|W}{lon}.DAT` files.
///
/// Caches each file's real on-disk `spacing` after the first successful
/// read, mirroring the original's `sSpacingCache` (`Q_GLOBAL_STATIC`
/// `QHash<filename, spacing>` in `TerrainQuerySRTM.cc`). Without this,
/// `tile_hash`'s pre-read guess of [`DEFAULT_SPACING`] would disagree
/// with `fetch_tile`'s hash (computed from the file's real spacing) for
/// any file whose spacing isn't 100m, and the cache would never see the
/// two hashes match - an endless re-fetch of the same tile.
pub struct FileProvider {
    terrain_dir: PathBuf,
    spacing_cache: RwLock<HashMap<String, u16>>,
}

impl FileProvider {
    pub fn new(terrain_dir: impl Into<PathBuf>) -> Self {
        Self { terrain_dir: terrain_dir.into(), spacing_cache: RwLock::new(HashMap::new()) }
    }

    /// The spacing to assume for `filename` when computing a grid offset
    /// without reading the file: the real spacing if this provider has
    /// already read it once, else [`DEFAULT_SPACING`].
    fn cached_spacing(&self, filename: &str) -> u16 {
        self.spacing_cache.read().unwrap().get(filename).copied().unwrap_or(DEFAULT_SPACING)
    }

    /// `{N|S}{lat}{E|W}{lon}.DAT`, no zero-padding, matching
    /// `TerrainQuerySRTM::_calcFilename`'s plain integer interpolation.
    pub fn filename_for(coord: Coordinate) -> String {
        let lat = coord.lat_floor();
        let lon = coord.lon_floor();
        let lat_prefix = if lat >= 0 { 'N' } else { 'S' };
        let lon_prefix = if lon >= 0 { 'E' } else { 'W' };
        format!("{lat_prefix}{}{lon_prefix}{}.DAT", lat.abs(), lon.abs())
    }

    fn path_for(&self, coord: Coordinate) -> PathBuf {
        self.terrain_dir.join(Self::filename_for(coord))
    }

    /// Compute the grid offset `(x, y)` of the block containing `coord`
    /// within its 1-degree file, plus the file's east-block stride,
    /// exactly as `TerrainQuerySRTM::_calcGridOffset`.
    pub fn calc_grid_offset(coord: Coordinate, spacing_m: u16) -> GridOffset {
        use crate::block::{BLOCK_SIZE_Y as GRID_SIZE_Y, BLOCK_SPACING_X, BLOCK_SPACING_Y};

        let sw_corner = Coordinate::from_degrees(coord.lat_floor() as f64, coord.lon_floor() as f64);
        let east_overlap_m = 2.0 * spacing_m as f64 * GRID_SIZE_Y as f64;
        let se_corner_base = Coordinate::from_degrees(coord.lat_floor() as f64, (coord.lon_floor() + 1) as f64);
        let se_corner = se_corner_base.offset(0.0, east_overlap_m);

        let (north_m, east_m) = sw_corner.distance_ne(&coord);
        let distance_gridunits_x = north_m / spacing_m as f64;
        let distance_gridunits_y = east_m / spacing_m as f64;

        let x = (distance_gridunits_x / BLOCK_SPACING_X as f64).floor() as u16;
        let y = (distance_gridunits_y / BLOCK_SPACING_Y as f64).floor() as u16;

        let grid_width_gridunits = sw_corner.distance_to(&se_corner) / spacing_m as f64;
        let num_east_blocks = (grid_width_gridunits / BLOCK_SPACING_Y as f64).floor() as i32;

        GridOffset { x, y, num_east_blocks }
    }

    fn file_offset(offset: GridOffset) -> u64 {
        let num_blocks = offset.num_east_blocks as i64 * offset.x as i64 + offset.y as i64;
        num_blocks as u64 * BLOCK_IO_SIZE as u64
    }

    async fn read_block_at(path: &Path, byte_offset: u64) -> Result<Block> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let mut file = tokio::fs::File::open(path).await.map_err(|_| FetchError::FileNotFound)?;
        if byte_offset != 0 {
            file.seek(std::io::SeekFrom::Start(byte_offset)).await.map_err(|_| FetchError::FileRead)?;
        }

        let mut buf = vec![0u8; BLOCK_IO_SIZE];
        file.read_exact(&mut buf).await.map_err(|_| FetchError::FileRead)?;

        let block = Block::decode(&buf).map_err(|_| FetchError::FileRead)?;
        if !block.crc_is_valid().map_err(|_| FetchError::FileRead)? {
            return Err(FetchError::Crc);
        }
        Ok(block)
    }
}

#[async_trait]
impl FetchProvider for FileProvider {
    fn tile_hash(&self, coord: Coordinate) -> TileHash {
        let filename = Self::filename_for(coord);
        let spacing = self.cached_spacing(&filename);
        let offset = Self::calc_grid_offset(coord, spacing);
        TileHash::for_file(&filename, offset.x, offset.y, offset.num_east_blocks)
    }

    async fn fetch_tile(&self, coord: Coordinate) -> Result<(Tile, TileHash)> {
        let path = self.path_for(coord);
        debug!(path = %path.display(), "fetching terrain block");

        if !path.exists() {
            warn!(path = %path.display(), "terrain file not found");
            return Err(FetchError::FileNotFound);
        }

        // Read the first block to discover this file's spacing. Per
        // spec.md §4.2 / §9 this initial read is validated exactly like
        // any other block - no "offset 0 needs no seek, skip the CRC"
        // shortcut.
        let header = Self::read_block_at(&path, 0).await?;
        let spacing = header.spacing;

        let filename = Self::filename_for(coord);
        self.spacing_cache.write().unwrap().insert(filename.clone(), spacing);

        let offset = Self::calc_grid_offset(coord, spacing);
        let byte_offset = Self::file_offset(offset);

        let block = Self::read_block_at(&path, byte_offset).await?;

        if block.grid_idx_x != offset.x || block.grid_idx_y != offset.y {
            warn!(
                expected_x = offset.x,
                expected_y = offset.y,
                got_x = block.grid_idx_x,
                got_y = block.grid_idx_y,
                "unexpected block index"
            );
            return Err(FetchError::UnexpectedData);
        }

        let hash = TileHash::for_file(&filename, offset.x, offset.y, offset.num_east_blocks);
        Ok((Tile::from_block(&block), hash))
    }
}
