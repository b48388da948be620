use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use nom::{
    bytes::complete::{tag, take_while_m_n},
    character::complete::{char, digit1, none_of, one_of},
    combinator::{all_consuming, consumed, map_res, opt, recognize},
    sequence::{preceded, tuple},
    IResult,
};
use tracing::debug;

use crate::coord::{Heading, Point2d, Speed};

/// Fix data from an NMEA 0183 "Recommended Minimum" (GPRMC) sentence.
///
/// `$GPRMC,hhmmss[.ss],A|V,DDMM.mmmm,N|S,DDDMM.mmmm,W|E,speed,bearing,ddmmyy,[magvar],[E|W][,mode]*HH`
///
/// A sentence that does not match this grammar, or whose checksum (XOR of every byte between
/// `$` and `*`) is wrong, yields the empty fix: every field absent and `valid == false`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsFix {
    pub ts_utc: Option<DateTime<Utc>>,
    /// Receiver reported `A` (active) rather than `V` (void).
    pub valid: bool,
    pub position: Option<Point2d>,
    pub speed: Option<Speed>,
    pub bearing: Option<Heading>,
    /// Magnetic variation in degrees, east positive.
    pub magnetic_variation: Option<f64>,
}

impl GpsFix {
    pub fn parse(sentence: &str) -> Self {
        let (body, rmc, transmitted) = match all_consuming(nom_sentence)(sentence) {
            Ok((_, parsed)) => parsed,
            Err(e) => {
                debug!("not a GPRMC sentence {:?}: {:?}", sentence, e);
                return Self::default();
            }
        };
        let calculated = checksum(body.as_bytes());
        if calculated != transmitted {
            debug!(
                "GPRMC checksum mismatch: calculated {:02X}, transmitted {:02X}",
                calculated, transmitted
            );
            return Self::default();
        }
        rmc.into_fix().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn v_gnd_m_s(&self) -> Option<f64> {
        self.speed.map(|s| s.mps())
    }

    pub fn v_gnd_km_h(&self) -> Option<f64> {
        self.speed.map(|s| s.kmh())
    }
}

impl fmt::Display for GpsFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut available = Vec::new();
        if let Some(ts) = self.ts_utc {
            available.push(ts.to_string());
        }
        if let Some(kmh) = self.v_gnd_km_h() {
            available.push(format!("{:.0} km/h", kmh));
        }
        if let Some(bearing) = self.bearing {
            available.push(format!("{:.0}°", bearing.degrees()));
        }
        if let Some(pos) = self.position {
            available.push(pos.to_string());
        }
        if available.is_empty() {
            available.push("no fix".to_string());
        }
        write!(f, "GpsFix({})", available.join(", "))
    }
}

/// NMEA checksum: XOR of all bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Fields as matched, before any numeric conversion.
struct RawRmc<'a> {
    hour: u32,
    minute: u32,
    second: u32,
    second_fraction: Option<&'a str>,
    status: char,
    lat_deg: u32,
    lat_min: &'a str,
    lat_hemi: char,
    lon_deg: u32,
    lon_min: &'a str,
    lon_hemi: char,
    speed_knots: &'a str,
    bearing: &'a str,
    day: u32,
    month: u32,
    year: u32,
    magvar: Option<&'a str>,
    magvar_hemi: Option<char>,
}

impl RawRmc<'_> {
    fn into_fix(self) -> Option<GpsFix> {
        let date = NaiveDate::from_ymd_opt(2000 + self.year as i32, self.month, self.day)?;
        let nanos = self.second_fraction.map_or(0, fraction_to_nanos);
        let ts_utc = date
            .and_hms_nano_opt(self.hour, self.minute, self.second, nanos)?
            .and_utc();

        let position = Point2d::from_nmea(
            self.lat_deg,
            self.lat_min.parse().ok()?,
            self.lat_hemi == 'N',
            self.lon_deg,
            self.lon_min.parse().ok()?,
            self.lon_hemi == 'E',
        )
        .map_err(|e| debug!("discarding GPRMC fix: {}", e))
        .ok()?;

        let magnetic_variation = match self.magvar {
            Some(v) => {
                let v: f64 = v.parse().ok()?;
                Some(if self.magvar_hemi == Some('W') { -v } else { v })
            }
            None => None,
        };

        Some(GpsFix {
            ts_utc: Some(ts_utc),
            valid: self.status == 'A',
            position: Some(position),
            speed: Some(Speed::from_knots(self.speed_knots.parse().ok()?)),
            bearing: Some(Heading::new(self.bearing.parse().ok()?)),
            magnetic_variation,
        })
    }
}

/// Decimal fraction digits of a second to nanoseconds, truncating past nanosecond precision.
fn fraction_to_nanos(digits: &str) -> u32 {
    digits
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(9)
        .fold(0, |acc, d| acc * 10 + (d - b'0') as u32)
}

fn nom_sentence(i: &str) -> IResult<&str, (&str, RawRmc<'_>, u8)> {
    let (i, _) = char('$')(i)?;
    let (i, (body, rmc)) = consumed(nom_rmc_body)(i)?;
    let (i, _) = char('*')(i)?;
    let (i, transmitted) = map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |s: &str| u8::from_str_radix(s, 16),
    )(i)?;
    Ok((i, (body, rmc, transmitted)))
}

fn nom_rmc_body(i: &str) -> IResult<&str, RawRmc<'_>> {
    let (i, _) = tag("GPRMC,")(i)?;
    let (i, hour) = fixed_u32(2)(i)?;
    let (i, minute) = fixed_u32(2)(i)?;
    let (i, second) = fixed_u32(2)(i)?;
    let (i, second_fraction) = opt(preceded(char('.'), digit1))(i)?;
    let (i, _) = char(',')(i)?;
    let (i, status) = one_of("AV")(i)?;
    let (i, _) = char(',')(i)?;
    let (i, lat_deg) = fixed_u32(2)(i)?;
    let (i, lat_min) = minutes(i)?;
    let (i, _) = char(',')(i)?;
    let (i, lat_hemi) = one_of("NS")(i)?;
    let (i, _) = char(',')(i)?;
    let (i, lon_deg) = fixed_u32(3)(i)?;
    let (i, lon_min) = minutes(i)?;
    let (i, _) = char(',')(i)?;
    let (i, lon_hemi) = one_of("WE")(i)?;
    let (i, _) = char(',')(i)?;
    let (i, speed_knots) = decimal(i)?;
    let (i, _) = char(',')(i)?;
    let (i, bearing) = decimal(i)?;
    let (i, _) = char(',')(i)?;
    let (i, day) = fixed_u32(2)(i)?;
    let (i, month) = fixed_u32(2)(i)?;
    let (i, year) = fixed_u32(2)(i)?;
    let (i, _) = char(',')(i)?;
    let (i, magvar) = opt(decimal)(i)?;
    let (i, _) = char(',')(i)?;
    let (i, magvar_hemi) = opt(one_of("EW"))(i)?;
    // NMEA 2.3 mode indicator, absent from older receivers
    let (i, _mode) = opt(preceded(char(','), opt(none_of("*\r\n"))))(i)?;
    Ok((
        i,
        RawRmc {
            hour,
            minute,
            second,
            second_fraction,
            status,
            lat_deg,
            lat_min,
            lat_hemi,
            lon_deg,
            lon_min,
            lon_hemi,
            speed_knots,
            bearing,
            day,
            month,
            year,
            magvar,
            magvar_hemi,
        },
    ))
}

fn fixed_digits<'a>(n: usize) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    take_while_m_n(n, n, |c: char| c.is_ascii_digit())
}

fn fixed_u32<'a>(n: usize) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    map_res(fixed_digits(n), |s: &str| s.parse::<u32>())
}

/// `\d+\.\d+`
fn decimal(i: &str) -> IResult<&str, &str> {
    recognize(tuple((digit1, char('.'), digit1)))(i)
}

/// `\d{2}\.\d+`
fn minutes(i: &str) -> IResult<&str, &str> {
    recognize(tuple((fixed_digits(2), char('.'), digit1)))(i)
}
