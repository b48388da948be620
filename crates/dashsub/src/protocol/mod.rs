//! Wire level pieces of the dashcam subtitle track: the byte offset cipher, the binary record
//! framing and the embedded NMEA sentence.
pub mod cipher;
pub mod nmea;
pub mod record;
