//! Fixed-point lat/lon arithmetic.
//!
//! Coordinates are stored as signed 32-bit integers in units of 1e-7
//! degree so that offset arithmetic agrees bit-for-bit with the
//! precomputed `.DAT` grid files (see `block.rs`). All formulas here are
//! contractual: do not "simplify" the constants, they were chosen to
//! match the original generator's double-precision math.

use std::f64::consts::PI;

/// One whole degree, in 1e-7 degree units.
pub const DEGREE: i64 = 10_000_000;
const HALF_TURN: i64 = 180 * DEGREE;
const FULL_TURN: i64 = 360 * DEGREE;
const QUARTER_TURN: i64 = 90 * DEGREE;

/// WGS84 semi-major axis, meters. Chosen (rather than the mean earth
/// radius) because it reproduces the file generator's `S` constant
/// bit-for-bit.
const R_EARTH_M: f64 = 6_378_137.0;

/// Meters per 1e-7 degree of latitude.
pub const METERS_PER_UNIT: f64 = 1e-7 * (PI / 180.0) * R_EARTH_M;

/// Units of 1e-7 degree per meter of latitude (inverse of [`METERS_PER_UNIT`]).
pub const UNITS_PER_METER: f64 = 1.0 / METERS_PER_UNIT;

/// A geographic coordinate stored as fixed-point 1e-7-degree integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub lat: i32,
    pub lon: i32,
}

impl Coordinate {
    pub fn new(lat: i32, lon: i32) -> Self {
        Self {
            lat: limit_latitude(lat),
            lon: wrap_longitude(lon as i64),
        }
    }

    /// Convert from floating-point degrees. Truncates towards zero, as the
    /// original's `coordinate * 1e7` integer cast does.
    pub fn from_degrees(lat_deg: f64, lon_deg: f64) -> Self {
        Self::new((lat_deg * DEGREE as f64) as i32, (lon_deg * DEGREE as f64) as i32)
    }

    pub fn lat_degrees(&self) -> f64 {
        self.lat as f64 / DEGREE as f64
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon as f64 / DEGREE as f64
    }

    /// Integer floor of the latitude in whole degrees (south of the
    /// equator is negative).
    pub fn lat_floor(&self) -> i32 {
        self.lat_degrees().floor() as i32
    }

    pub fn lon_floor(&self) -> i32 {
        self.lon_degrees().floor() as i32
    }

    /// Offset this coordinate by `north_m`/`east_m` meters, per spec.md
    /// §4.1. Must stay bit-for-bit compatible with the file generator.
    pub fn offset(&self, north_m: f64, east_m: f64) -> Coordinate {
        let dlat_units = north_m * UNITS_PER_METER;
        let mid_lat = self.lat as f64 + dlat_units / 2.0;
        let dlon_units = (east_m * UNITS_PER_METER) / longitude_scale(mid_lat.round() as i32);

        let new_lat = limit_latitude((self.lat as f64 + dlat_units).round() as i32);
        let new_lon = wrap_longitude((self.lon as f64 + dlon_units).round() as i64);

        Coordinate { lat: new_lat, lon: new_lon }
    }

    /// North/east distance in meters from `self` to `other`, per
    /// spec.md §4.1.
    pub fn distance_ne(&self, other: &Coordinate) -> (f64, f64) {
        let north = (other.lat - self.lat) as f64 * METERS_PER_UNIT;
        let mid_lat = (self.lat as i64 + other.lat as i64) / 2;
        let east =
            diff_longitude(other.lon, self.lon) as f64 * METERS_PER_UNIT * longitude_scale(mid_lat as i32) as f64;
        (north, east)
    }

    /// Great-circle distance in meters, via the flat north/east
    /// approximation used throughout this subsystem (the original's
    /// `QGeoCoordinate::distanceTo` is itself a spherical-law-of-cosines
    /// formula; for the short tile-sized legs this cache deals with the
    /// two agree to well under the interpolation error of the grid).
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let (north, east) = self.distance_ne(other);
        (north * north + east * east).sqrt()
    }
}

/// Cosine compression of east-west distance with latitude, floored to
/// avoid blowing up near the poles.
pub fn longitude_scale(lat_units: i32) -> f32 {
    let lat_rad = lat_units as f64 * 1e-7 * (PI / 180.0);
    (lat_rad.cos() as f32).max(0.01)
}

/// Wrap a longitude (in 1e-7-degree units, as an i64 to avoid overflow
/// while summing/subtracting) into `[-180e7, 180e7)`.
pub fn wrap_longitude(mut lon: i64) -> i32 {
    while lon >= HALF_TURN {
        lon -= FULL_TURN;
    }
    while lon < -HALF_TURN {
        lon += FULL_TURN;
    }
    lon as i32
}

/// Reflect a latitude over the poles into `[-90e7, 90e7]`.
pub fn limit_latitude(lat: i32) -> i32 {
    let lat = lat as i64;
    if lat > QUARTER_TURN {
        (HALF_TURN - lat) as i32
    } else if lat < -QUARTER_TURN {
        (-(HALF_TURN + lat)) as i32
    } else {
        lat as i32
    }
}

/// Signed longitude difference `a - b`, wrapping across the antimeridian.
pub fn diff_longitude(a: i32, b: i32) -> i32 {
    let same_sign = (a >= 0) == (b >= 0);
    if same_sign {
        a - b
    } else {
        wrap_longitude(a as i64 - b as i64)
    }
}
