//! Polymorphic tile-fetch capability. See spec.md §4.4 and §9 ("Polymorphism
//! over provider type is expressed as a capability trait with three
//! operations ... no inheritance hierarchy is required").

mod file;
mod http;

pub use file::FileProvider;
pub use http::HttpProvider;

use crate::error::Result;
use crate::geodesy::Coordinate;
use crate::hash::TileHash;
use crate::tile::Tile;
use async_trait::async_trait;

/// A pure coordinate -> tile translator. A provider holds no cache state
/// of its own; the [`crate::cache::TileCache`] is the sole owner of
/// fetched tiles.
#[async_trait]
pub trait FetchProvider: Send + Sync {
    /// Resolve the coordinate to a tile hash without performing any I/O.
    /// Used by the cache to probe for a hit before deciding to fetch.
    fn tile_hash(&self, coord: Coordinate) -> TileHash;

    /// Fetch (from disk or network) the tile containing `coord`.
    async fn fetch_tile(&self, coord: Coordinate) -> Result<(Tile, TileHash)>;

    /// Fetch a flat batch of heights for `coords` in one round trip, for
    /// providers that expose an N-coordinates -> N-heights endpoint
    /// (spec.md §4.6). The default implementation is not batch-capable;
    /// [`BatchManager`](crate::batch::BatchManager) only calls this on
    /// providers that opt in.
    async fn batch_heights(&self, coords: &[Coordinate]) -> Result<Vec<f64>> {
        let _ = coords;
        Err(crate::error::FetchError::InvalidDataType)
    }

    /// Whether this provider supports [`FetchProvider::batch_heights`].
    fn supports_batch(&self) -> bool {
        false
    }
}
