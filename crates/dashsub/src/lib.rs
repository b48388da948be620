//! Dashcam subtitle telemetry decoding library.
//!
//! The dashcam hides accelerometer readings and an NMEA GPRMC sentence inside its subtitle
//! track, shifted by a per-record byte offset. [`stream::RecordStream`] walks the raw subtitle
//! stream, each [`protocol::record::SubtitleRecord`] recovers its offset and decodes the
//! [`message::TelemetryMessage`], and [`render::Template`] turns that back into display text.
use std::sync::Once;

use thiserror::Error;

pub mod coord;
pub mod message;
pub mod protocol;
pub mod render;
pub mod srt;
pub mod stream;

/// Result type for this library
pub type DSResult<T> = std::result::Result<T, Error>;

/// Error type for this library
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid coordinate: {0}")]
    InvalidCoord(String),
    #[error("Record too short: {0} bytes, need at least 3")]
    RecordTooShort(usize),
    #[error("{actual} bytes data supplied, but length field was {declared} (expected {expected})")]
    LengthMismatch {
        actual: usize,
        declared: u16,
        expected: usize,
    },
    #[error("Record header byte 2 is {0:#04x}, expected 0x00")]
    BadHeader(u8),
    #[error("Truncated stream at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Invalid render template: {0}")]
    Template(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Test binary helper to init tracing. This is usually the responsibility of the consumer of the
/// library crate.
pub fn lazy_init_tracing() {
    {
        static INIT: Once = Once::new();
        &INIT
    }
    .call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}
