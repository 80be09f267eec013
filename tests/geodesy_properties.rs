//! Property-style coverage for the fixed-point geodesy primitives,
//! spec.md §8. The per-module unit tests in `src/geodesy.rs` already
//! cover the exact scenarios from the spec; this file adds a randomized
//! sweep across the full coordinate space so the round-trip and wrap
//! invariants are checked well beyond the hand-picked grid.

use rand::Rng;
use terrain_core::geodesy::{self, Coordinate, DEGREE};

#[test]
fn randomized_offset_round_trip_stays_within_a_millimeter() {
    let mut rng = rand::rng();
    for _ in 0..500 {
        let lat_deg = rng.random_range(-80.0..=80.0);
        let lon_deg = rng.random_range(-180.0..180.0);
        let start = Coordinate::from_degrees(lat_deg, lon_deg);

        let north_m = rng.random_range(0.0..100_000.0);
        let east_m = rng.random_range(0.0..100_000.0);

        let out = start.offset(north_m, east_m);
        let back = out.offset(-north_m, -east_m);

        let (north_err, east_err) = start.distance_ne(&back);
        assert!(north_err.abs() < 1e-3, "north error {north_err} at {lat_deg},{lon_deg}");
        assert!(east_err.abs() < 1e-3, "east error {east_err} at {lat_deg},{lon_deg}");
    }
}

#[test]
fn randomized_longitude_wrap_stays_in_range_and_congruent() {
    let mut rng = rand::rng();
    for _ in 0..2000 {
        let lon = rng.random_range(-5_000_000_000i64..=5_000_000_000i64);
        let wrapped = geodesy::wrap_longitude(lon);
        assert!((-180 * DEGREE as i32..180 * DEGREE as i32).contains(&wrapped));
        assert_eq!((wrapped as i64 - lon).rem_euclid(360 * DEGREE), 0);
    }
}

#[test]
fn poles_reflect_latitude_back_into_range() {
    for lat_deg in [91.0, 100.0, -91.0, -123.4, 180.0, -180.0] {
        let coord = Coordinate::from_degrees(lat_deg, 0.0);
        assert!(coord.lat_degrees().abs() <= 90.0 + 1e-6, "lat {lat_deg} -> {}", coord.lat_degrees());
    }
}

#[test]
fn antimeridian_crossing_offset_wraps_sign() {
    let start = Coordinate::from_degrees(0.0, 179.9999);
    let moved = start.offset(0.0, 200.0);
    assert!(moved.lon < 0, "expected wrap to negative longitude, got {}", moved.lon);

    let (north_err, _) = start.distance_ne(&moved);
    assert!(north_err.abs() < 1e-3);
}
