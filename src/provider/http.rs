//! Online HTTP tile provider. Grounded in `TerrainQueryAirMap`/
//! `TerrainTileManager::getAltitudesForCoordinates`'s network path: a GET
//! against the map engine's tile URL, decoded into a `Tile`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::UrlFactory;
use crate::error::{FetchError, Result};
use crate::geodesy::Coordinate;
use crate::hash::TileHash;
use crate::tile::Tile;

use super::FetchProvider;

/// Decodes a provider-specific tile payload into a [`Tile`]. The wire
/// encoding is opaque to the rest of the core (spec.md §4.3) - a real
/// embedding supplies a concrete decoder for whatever image format its
/// elevation endpoint returns.
pub trait NetworkTileDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Tile>;
}

/// Decoder used until a real one is wired in; always reports the
/// payload as unrecognized rather than guessing at a pixel format.
#[derive(Default)]
pub struct UnimplementedDecoder;

impl NetworkTileDecoder for UnimplementedDecoder {
    fn decode(&self, _bytes: &[u8]) -> Result<Tile> {
        Err(FetchError::InvalidDataType)
    }
}

const ZOOM: u8 = 1;

pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    map_type: String,
    url_factory: Arc<dyn UrlFactory>,
    decoder: Arc<dyn NetworkTileDecoder>,
}

impl HttpProvider {
    pub fn new(base_url: impl Into<String>, map_type: impl Into<String>, url_factory: Arc<dyn UrlFactory>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            map_type: map_type.into(),
            url_factory,
            decoder: Arc::new(UnimplementedDecoder),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn NetworkTileDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    fn tile_xy(&self, coord: Coordinate) -> (i64, i64) {
        let x = self.url_factory.long2tile_x(coord.lon_degrees(), ZOOM);
        let y = self.url_factory.lat2tile_y(coord.lat_degrees(), ZOOM);
        (x, y)
    }
}

#[async_trait]
impl FetchProvider for HttpProvider {
    fn tile_hash(&self, coord: Coordinate) -> TileHash {
        let (x, y) = self.tile_xy(coord);
        TileHash::for_http(&self.map_type, x, y, ZOOM)
    }

    async fn fetch_tile(&self, coord: Coordinate) -> Result<(Tile, TileHash)> {
        let (x, y) = self.tile_xy(coord);
        let url = self.url_factory.tile_url(&self.map_type, &self.base_url, x, y, ZOOM);
        debug!(%url, "fetching terrain tile");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), %url, "non-success status fetching terrain tile");
            return Err(FetchError::NetworkError(response.status().to_string()));
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::NetworkError(e.to_string()))?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyResponse);
        }

        let tile = self.decoder.decode(&bytes)?;
        let hash = TileHash::for_http(&self.map_type, x, y, ZOOM);
        Ok((tile, hash))
    }
}
