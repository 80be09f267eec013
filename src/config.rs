//! Collaborator contracts external to the core (spec.md §6): a settings
//! store yielding a terrain directory, and a URL factory mapping a
//! coordinate to an online tile's `(url, x, y)`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the terrain subsystem. A real embedding application
/// supplies this directly rather than using [`TerrainConfig::from_env`];
/// `from_env` exists only so the CLI/tests have a convenient default, the
/// same role the teacher's `TileCache::get_cache_dir` played. Derives
/// `Serialize`/`Deserialize` so an embedding app's settings store can
/// persist it alongside its other config (TOML, JSON, whatever it uses).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainConfig {
    pub terrain_dir: PathBuf,
    pub map_type: String,
    pub batch_timeout: Duration,
    pub http_base_url: Option<String>,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            terrain_dir: std::env::current_dir().unwrap_or_default().join("assets"),
            map_type: "Copernicus Elevation".to_string(),
            batch_timeout: Duration::from_millis(50),
            http_base_url: None,
        }
    }
}

impl TerrainConfig {
    /// Reads `TERRAIN_DAT_DIR` and `TERRAIN_HTTP_BASE_URL`, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("TERRAIN_DAT_DIR") {
            config.terrain_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("TERRAIN_HTTP_BASE_URL") {
            config.http_base_url = Some(url);
        }
        config
    }
}

/// Maps a coordinate to an online tile endpoint's `(url, x, y)`, at a
/// fixed zoom level (spec.md uses zoom=1 for the elevation endpoint).
pub trait UrlFactory: Send + Sync {
    fn long2tile_x(&self, lon_deg: f64, zoom: u8) -> i64;
    fn lat2tile_y(&self, lat_deg: f64, zoom: u8) -> i64;
    fn tile_url(&self, map_type: &str, base_url: &str, x: i64, y: i64, zoom: u8) -> String;
}

/// Standard OSM slippy-map tile numbering.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlippyMapUrlFactory;

impl UrlFactory for SlippyMapUrlFactory {
    fn long2tile_x(&self, lon_deg: f64, zoom: u8) -> i64 {
        let n = 2f64.powi(zoom as i32);
        (((lon_deg + 180.0) / 360.0) * n).floor() as i64
    }

    fn lat2tile_y(&self, lat_deg: f64, zoom: u8) -> i64 {
        let n = 2f64.powi(zoom as i32);
        let lat_rad = lat_deg.to_radians();
        (((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0) * n).floor() as i64
    }

    fn tile_url(&self, map_type: &str, base_url: &str, x: i64, y: i64, zoom: u8) -> String {
        format!("{base_url}/{map_type}/{zoom}/{x}/{y}.png")
    }
}
