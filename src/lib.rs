//! Terrain-elevation query and tile-cache subsystem.
//!
//! Given geographic coordinates, a single point, a great-circle path, or
//! a rectangular carpet, this crate answers with ground elevations above
//! mean sea level, drawing from an in-memory tile cache backed by either
//! an offline binary grid ([`provider::FileProvider`]) or an online HTTP
//! tile service ([`provider::HttpProvider`]).
//!
//! The moving parts, leaves first:
//! - [`geodesy`] - fixed-point lat/lon arithmetic shared by every module.
//! - [`block`] - the on-disk `.DAT` record format and its CRC16 check.
//! - [`tile`] - the in-memory decoded tile with bilinear elevation lookup.
//! - [`hash`] - deterministic cache keys shared across callers.
//! - [`provider`] - the polymorphic coordinate -> tile capability.
//! - [`cache`] - the single-dispatch-task tile cache (spec.md §4.5).
//! - [`batch`] - online-only coordinate batching (spec.md §4.6).
//! - [`query`] - the client-facing `CoordinateQuery`/`PathQuery`/
//!   `PolyPathQuery`/`CarpetQuery` handles (spec.md §4.7).
//! - [`config`] - the settings-store and URL-factory collaborator
//!   contracts spec.md §6 externalizes.

pub mod batch;
pub mod block;
pub mod cache;
pub mod config;
pub mod error;
pub mod geodesy;
pub mod hash;
pub mod provider;
pub mod query;
pub mod tile;

pub use cache::{CoordinateOutcome, PathOutcome, TileCache, TileCacheHandle};
pub use error::{FetchError, Result};
pub use geodesy::Coordinate;
pub use hash::TileHash;
pub use query::{Backend, CarpetOutcome, CarpetQuery, CoordinateQuery, PathQuery, PolyPathQuery};
pub use tile::Tile;
