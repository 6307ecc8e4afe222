use std::fmt;
use std::str::FromStr;

use astro::angle::limit_to_360;
use canonical_error::{CanonicalError, invalid_argument_error};

/// Celestial coordinates, in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SkyCoord {
    pub ra: f64,
    pub dec: f64,
}

impl SkyCoord {
    /// Normalizes RA to 0..360.
    pub fn new(ra: f64, dec: f64) -> Self {
        SkyCoord{ra: limit_to_360(ra), dec}
    }
}

/// Coordinate reference frame used to interpret a resolved position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Frame {
    Icrs,
    Fk5,
    Fk4,
    Galactic,
}

impl Frame {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frame::Icrs => "ICRS",
            Frame::Fk5 => "FK5",
            Frame::Fk4 => "FK4",
            Frame::Galactic => "Galactic",
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Frame {
    type Err = CanonicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "icrs" => Ok(Frame::Icrs),
            "fk5" => Ok(Frame::Fk5),
            "fk4" => Ok(Frame::Fk4),
            "galactic" => Ok(Frame::Galactic),
            _ => Err(invalid_argument_error(
                format!("Unrecognized coordinate frame '{}'", s).as_str())),
        }
    }
}

/// Returns the separation, in radians, between the given celestial coordinates
/// (in radians).
pub fn angular_separation(p0_ra: f64, p0_dec: f64,
                          p1_ra: f64, p1_dec: f64) -> f64 {
    (p0_dec.sin() * p1_dec.sin() +
     p0_dec.cos() * p1_dec.cos() * (p0_ra - p1_ra).cos()).acos()
}

/// Formats a right ascension (degrees) as HH:MM:SS.ss.
pub fn format_ra_hms(ra_deg: f64) -> String {
    // Work in integer centiseconds of time to avoid 60.00 rollover artifacts.
    let total_cs = (limit_to_360(ra_deg) / 15.0 * 3600.0 * 100.0).round() as i64;
    let total_cs = total_cs.rem_euclid(24 * 3600 * 100);
    let h = total_cs / (3600 * 100);
    let m = (total_cs / (60 * 100)) % 60;
    let s = total_cs % (60 * 100);
    format!("{:02}:{:02}:{:02}.{:02}", h, m, s / 100, s % 100)
}

/// Formats a declination (degrees) as +DD:MM:SS.s.
pub fn format_dec_dms(dec_deg: f64) -> String {
    let sign = if dec_deg < 0.0 { '-' } else { '+' };
    // Deciseconds of arc.
    let total_ds = (dec_deg.abs() * 3600.0 * 10.0).round() as i64;
    let d = total_ds / (3600 * 10);
    let m = (total_ds / (60 * 10)) % 60;
    let s = total_ds % (60 * 10);
    format!("{}{:02}:{:02}:{:02}.{}", sign, d, m, s / 10, s % 10)
}

// mod tests.
