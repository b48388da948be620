/// Coordinate, heading and speed types for GPS fixes.
use std::fmt;

use crate::{DSResult, Error};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// WGS 84 position as signed decimal degrees: (latitude, longitude). North and east are
/// positive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Point2d(pub f64, pub f64);

impl Point2d {
    pub fn new(lat: f64, lon: f64) -> DSResult<Self> {
        Self::validate_lat(lat)?;
        Self::validate_lon(lon)?;
        Ok(Self(lat, lon))
    }

    /// Build from NMEA style degrees + decimal minutes, with the sign taken from the hemisphere.
    pub fn from_nmea(
        lat_deg: u32,
        lat_min: f64,
        north: bool,
        lon_deg: u32,
        lon_min: f64,
        east: bool,
    ) -> DSResult<Self> {
        let lat = Self::signed(lat_deg as f64 + lat_min / 60.0, north);
        let lon = Self::signed(lon_deg as f64 + lon_min / 60.0, east);
        Self::new(lat, lon)
    }

    pub fn lat(&self) -> f64 {
        self.0
    }

    pub fn lon(&self) -> f64 {
        self.1
    }

    fn signed(magnitude: f64, positive: bool) -> f64 {
        if positive {
            magnitude
        } else {
            -magnitude
        }
    }

    fn validate_lat(lat: f64) -> DSResult<()> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidCoord(format!("latitude {lat}")));
        }
        Ok(())
    }

    fn validate_lon(lon: f64) -> DSResult<()> {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidCoord(format!("longitude {lon}")));
        }
        Ok(())
    }
}

/// Hemisphere letter followed by four decimals, e.g. `N48.1173° E11.5167°`.
impl fmt::Display for Point2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.0 >= 0.0 { 'N' } else { 'S' };
        let ew = if self.1 >= 0.0 { 'E' } else { 'W' };
        write!(f, "{}{:.4}° {}{:.4}°", ns, self.0.abs(), ew, self.1.abs())
    }
}

/// True bearing in degrees, always in [0, 360).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Heading(f64);

impl Heading {
    pub fn new(deg: f64) -> Self {
        let deg = deg.rem_euclid(360.0);
        // rem_euclid can round up to the modulus for tiny negative inputs
        Self(if deg >= 360.0 { 0.0 } else { deg })
    }

    pub fn degrees(&self) -> f64 {
        self.0
    }
}

/// Ground speed, stored in m/s.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Speed {
    mps: f64,
}

impl Speed {
    /// Knots to m/s: 1 kn = 1852 m / 3600 s = 463/900 m/s.
    pub fn from_knots(knots: f64) -> Self {
        Self {
            mps: knots * 463.0 / 900.0,
        }
    }

    pub fn mps(&self) -> f64 {
        self.mps
    }

    pub fn kmh(&self) -> f64 {
        self.mps * 3.6
    }
}
