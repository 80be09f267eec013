//! Writes a synthetic single-block `.DAT` file so the CLI and manual
//! testing have something to query without fetching real SRTM data.
//! Produces a one-degree cell (here N00E000.DAT) with a cone-shaped
//! height profile peaking at the block's center.

use std::fs;
use std::io::Write;

use terrain_core::block::{Block, BLOCK_SIZE_X, BLOCK_SIZE_Y};

fn main() {
    let current_dir = std::env::current_dir().expect("could not determine current directory");
    let assets_dir = current_dir.join("assets");
    fs::create_dir_all(&assets_dir).expect("failed to create assets dir");

    let filename = assets_dir.join("N00E000.DAT");
    println!("generating sample terrain file: {}", filename.display());

    let spacing_m: u16 = 100;
    let peak_m: i16 = 2000;
    let center_x = (BLOCK_SIZE_X - 1) as f64 / 2.0;
    let center_y = (BLOCK_SIZE_Y - 1) as f64 / 2.0;
    let max_dist = (center_x * center_x + center_y * center_y).sqrt();

    let mut height = [[0i16; BLOCK_SIZE_Y]; BLOCK_SIZE_X];
    for (x, row) in height.iter_mut().enumerate() {
        for (y, sample) in row.iter_mut().enumerate() {
            let dx = x as f64 - center_x;
            let dy = y as f64 - center_y;
            let dist = (dx * dx + dy * dy).sqrt();
            *sample = (peak_m as f64 * (1.0 - dist / max_dist).max(0.0)) as i16;
        }
    }

    let block = Block {
        bitmap: (1u64 << 56) - 1,
        sw_lat: 0,
        sw_lon: 0,
        crc16: 0,
        version: 1,
        spacing: spacing_m,
        height,
        grid_idx_x: 0,
        grid_idx_y: 0,
        lon_degrees: 0,
        lat_degrees: 0,
    }
    .with_crc()
    .expect("failed to encode block");

    let bytes = block.encode().expect("failed to encode block");
    let mut file = fs::File::create(&filename).expect("failed to create terrain file");
    file.write_all(&bytes).expect("failed to write terrain file");

    println!("wrote one block, spacing={spacing_m}m, peak={peak_m}m");
}
