//! Integration coverage for `FileProvider` + `TileCache` +
//! `CoordinateQuery`/`PathQuery` wired together end to end, spec.md §8.
//! Unit tests inside `src/cache.rs` and `src/batch.rs` already cover
//! coalescing and batch-boundary behavior in isolation; this file
//! exercises the same properties through a real `.DAT` file on disk and
//! the public query handles.

use std::path::Path;
use std::sync::Arc;

use terrain_core::block::{Block, BLOCK_SIZE_X, BLOCK_SIZE_Y};
use terrain_core::provider::FileProvider;
use terrain_core::query::{Backend, CoordinateQuery, PathQuery};
use terrain_core::{Coordinate, TileCache};

/// Writes a one-block `.DAT` file at `sw_lat_deg`/`sw_lon_deg` (both
/// non-negative, for simplicity of the filename) with a flat height of
/// `height_m`, 100m spacing, occupying grid index (0, 0).
fn write_flat_dat(dir: &Path, sw_lat_deg: i32, sw_lon_deg: i32, height_m: i16) -> std::path::PathBuf {
    let filename = format!("N{sw_lat_deg}E{sw_lon_deg}.DAT");
    let path = dir.join(filename);

    let block = Block {
        bitmap: (1u64 << 56) - 1,
        sw_lat: sw_lat_deg * 10_000_000,
        sw_lon: sw_lon_deg * 10_000_000,
        crc16: 0,
        version: 1,
        spacing: 100,
        height: [[height_m; BLOCK_SIZE_Y]; BLOCK_SIZE_X],
        grid_idx_x: 0,
        grid_idx_y: 0,
        lon_degrees: sw_lon_deg as i16,
        lat_degrees: sw_lat_deg as i8,
    }
    .with_crc()
    .unwrap();

    std::fs::write(&path, block.encode().unwrap()).unwrap();
    path
}

#[tokio::test]
async fn coordinate_query_returns_flat_elevation() {
    let dir = tempfile::tempdir().unwrap();
    write_flat_dat(dir.path(), 10, 20, 586);

    let provider = Arc::new(FileProvider::new(dir.path()));
    let cache = TileCache::spawn(provider);
    let query = CoordinateQuery::new(Backend::Cache(cache));

    let coord = Coordinate::from_degrees(10.0005, 20.0005);
    let outcome = query.request(vec![coord]).await;

    assert!(outcome.success);
    assert_eq!(outcome.heights.len(), 1);
    assert!((outcome.heights[0] - 586.0).abs() < 1e-6);
}

#[tokio::test]
async fn crc_corruption_is_a_terminal_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_flat_dat(dir.path(), 10, 20, 586);

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[1500] ^= 0xFF; // corrupt a byte inside the height grid
    std::fs::write(&path, bytes).unwrap();

    let provider = Arc::new(FileProvider::new(dir.path()));
    let cache = TileCache::spawn(provider);
    let query = CoordinateQuery::new(Backend::Cache(cache));

    let coord = Coordinate::from_degrees(10.0005, 20.0005);
    let outcome = query.request(vec![coord]).await;

    assert!(!outcome.success);
    assert!(outcome.heights.is_empty());
}

#[tokio::test]
async fn path_query_forces_last_sample_onto_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    write_flat_dat(dir.path(), 10, 20, 586);

    let provider = Arc::new(FileProvider::new(dir.path()));
    let cache = TileCache::spawn(provider);
    let query = PathQuery::new(Backend::Cache(cache));

    let from = Coordinate::from_degrees(10.0002, 20.0002);
    let to = Coordinate::from_degrees(10.0006, 20.0006);
    let outcome = query.request(from, to).await;

    assert!(outcome.success);
    assert!(outcome.heights.len() >= 2);
    assert!((outcome.heights[0] - 586.0).abs() < 1e-6);
    assert!((*outcome.heights.last().unwrap() - 586.0).abs() < 1e-6);
    assert!(outcome.final_dist_between_m <= outcome.dist_between_m + 1e-6);
}

#[tokio::test]
async fn dropped_caller_does_not_poison_a_later_query_for_the_same_tile() {
    let dir = tempfile::tempdir().unwrap();
    write_flat_dat(dir.path(), 10, 20, 586);

    let provider = Arc::new(FileProvider::new(dir.path()));
    let cache = TileCache::spawn(provider);
    let coord = Coordinate::from_degrees(10.0005, 20.0005);

    let cache_for_task = cache.clone();
    let task = tokio::spawn(async move {
        let query = CoordinateQuery::new(Backend::Cache(cache_for_task));
        query.request(vec![coord]).await
    });
    // Give the fetch a moment to start, then abandon the caller.
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    task.abort();

    let query = CoordinateQuery::new(Backend::Cache(cache));
    let outcome = query.request(vec![coord]).await;
    assert!(outcome.success);
    assert!((outcome.heights[0] - 586.0).abs() < 1e-6);
}
