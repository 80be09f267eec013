//! Error kinds shared by every fetch provider and the tile cache.

use thiserror::Error;

/// Terminal failure of a single tile fetch.
///
/// All variants are terminal for the fetch that produced them: the cache
/// layer never retries automatically (see `TileCache::on_fetch_failed`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("terrain file not found")]
    FileNotFound,

    #[error("short read of terrain file")]
    FileRead,

    #[error("CRC mismatch in terrain block")]
    Crc,

    #[error("terrain block did not match the requested grid index")]
    UnexpectedData,

    #[error("network error fetching terrain tile: {0}")]
    NetworkError(String),

    #[error("empty response fetching terrain tile")]
    EmptyResponse,

    #[error("tile response was not a recognized data type")]
    InvalidDataType,
}

pub type Result<T> = std::result::Result<T, FetchError>;
