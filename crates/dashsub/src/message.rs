//! Structured telemetry carried by one decoded subtitle record.
//!
//! The decoded text is four whitespace separated fields: the x, y and z accelerometer readings
//! in milli-g followed by a GPRMC sentence.
use tracing::debug;

use crate::protocol::nmea::GpsFix;

const GPRMC_PREFIX: &str = "$GPRMC";

/// Accelerometer reading in g.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GForce {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl GForce {
    pub fn from_milli_g(x: &str, y: &str, z: &str) -> Option<Self> {
        let axis = |v: &str| v.parse::<f64>().ok().map(|mg| mg / 1000.0);
        Some(Self {
            x: axis(x)?,
            y: axis(y)?,
            z: axis(z)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    /// Absent unless the text split into exactly four fields with numeric axes.
    pub gforce: Option<GForce>,
    pub gps: GpsFix,
}

impl TelemetryMessage {
    pub fn parse(text: &str) -> Self {
        let fields: Vec<&str> = text.split_whitespace().collect();
        let (gforce, sentence) = match fields.as_slice() {
            [x, y, z, sentence] => (GForce::from_milli_g(x, y, z), Some(*sentence)),
            _ => {
                debug!("expected 4 telemetry fields, got {}", fields.len());
                let sentence = fields.iter().copied().find(|f| f.starts_with(GPRMC_PREFIX));
                (None, sentence)
            }
        };
        let gps = sentence.map(GpsFix::parse).unwrap_or_default();
        Self { gforce, gps }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lazy_init_tracing;

    const SENTENCE: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

    #[test]
    fn test_parse_full_message() {
        lazy_init_tracing();
        let msg = TelemetryMessage::parse(&format!("  -12 987\t1003 {}\0\0", SENTENCE));
        // trailing NULs are not whitespace and break the sentence
        assert!(msg.gps.is_empty());
        assert!(msg.gforce.is_some());

        let msg = TelemetryMessage::parse(&format!("  -12 987\t1003 {}\n", SENTENCE));
        assert_eq!(
            msg.gforce,
            Some(GForce {
                x: -0.012,
                y: 0.987,
                z: 1.003
            })
        );
        assert!(msg.gps.valid);
        assert!(msg.gps.position.is_some());
    }

    #[test]
    fn test_wrong_field_count_drops_gforce() {
        lazy_init_tracing();
        let test_cases = [
            format!("-12 987 {}", SENTENCE),
            format!("-12 987 1003 4 {}", SENTENCE),
            SENTENCE.to_string(),
        ];
        for text in &test_cases {
            let msg = TelemetryMessage::parse(text);
            assert_eq!(msg.gforce, None, "{}", text);
            assert!(msg.gps.valid, "gps still parsed for {}", text);
        }
        let msg = TelemetryMessage::parse("");
        assert_eq!(msg.gforce, None);
        assert!(msg.gps.is_empty());
    }

    #[test]
    fn test_non_numeric_axis() {
        lazy_init_tracing();
        let msg = TelemetryMessage::parse(&format!("-12 x 1003 {}", SENTENCE));
        assert_eq!(msg.gforce, None);
        assert!(!msg.gps.is_empty());
    }
}
