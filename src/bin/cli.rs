//! Small diagnostic entry point exercising the public query API end to
//! end, with no windowing toolkit involved - the same role
//! `TerrainQueryTest`'s `info`/`edit` subcommands play in the original,
//! kept inside spec.md's out-of-scope boundary (no vehicle UI or
//! mission editor).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use terrain_core::provider::FileProvider;
use terrain_core::query::{Backend, CarpetQuery, CoordinateQuery, PathQuery};
use terrain_core::{Coordinate, TileCache};

#[derive(Parser)]
#[command(name = "terrain-cli", about = "Query elevation from a local terrain tile cache")]
struct Cli {
    /// Directory containing `{N|S}{lat}{E|W}{lon}.DAT` terrain files.
    #[arg(long, env = "TERRAIN_DAT_DIR", default_value = "assets")]
    dat_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query elevation at a single point.
    Point {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lon: f64,
    },
    /// Query elevation along a great-circle path, sampled at the
    /// default tile spacing.
    Path {
        #[arg(long)]
        from_lat: f64,
        #[arg(long)]
        from_lon: f64,
        #[arg(long)]
        to_lat: f64,
        #[arg(long)]
        to_lon: f64,
    },
    /// Query a dense rectangular grid of heights between two corners.
    Carpet {
        #[arg(long)]
        sw_lat: f64,
        #[arg(long)]
        sw_lon: f64,
        #[arg(long)]
        ne_lat: f64,
        #[arg(long)]
        ne_lon: f64,
        #[arg(long)]
        stats_only: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::try_init().ok();

    let cli = Cli::parse();
    let provider = Arc::new(FileProvider::new(cli.dat_dir));
    let cache = TileCache::spawn(provider);
    let backend = Backend::Cache(cache);

    match cli.command {
        Command::Point { lat, lon } => {
            let query = CoordinateQuery::new(backend);
            let coord = Coordinate::from_degrees(lat, lon);
            let outcome = query.request(vec![coord]).await;
            if outcome.success {
                println!("{:.2}", outcome.heights[0]);
            } else {
                eprintln!("query failed");
                std::process::exit(1);
            }
        }
        Command::Path { from_lat, from_lon, to_lat, to_lon } => {
            let query = PathQuery::new(backend);
            let from = Coordinate::from_degrees(from_lat, from_lon);
            let to = Coordinate::from_degrees(to_lat, to_lon);
            let outcome = query.request(from, to).await;
            if outcome.success {
                for (i, h) in outcome.heights.iter().enumerate() {
                    println!("{i}\t{h:.2}");
                }
            } else {
                eprintln!("query failed");
                std::process::exit(1);
            }
        }
        Command::Carpet { sw_lat, sw_lon, ne_lat, ne_lon, stats_only } => {
            let query = CarpetQuery::new(backend);
            let sw = Coordinate::from_degrees(sw_lat, sw_lon);
            let ne = Coordinate::from_degrees(ne_lat, ne_lon);
            let outcome = query.request(sw, ne, stats_only).await;
            if outcome.success {
                println!("min={:.2} max={:.2}", outcome.min, outcome.max);
                if !stats_only {
                    for row in &outcome.grid {
                        println!("{}", row.iter().map(|h| format!("{h:.1}")).collect::<Vec<_>>().join(" "));
                    }
                }
            } else {
                eprintln!("query failed");
                std::process::exit(1);
            }
        }
    }
}
