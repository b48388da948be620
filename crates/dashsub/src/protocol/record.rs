use std::fmt;

use nom::{
    number::complete::{be_u16, be_u8},
    Finish, IResult,
};
use tracing::trace;

use super::cipher;
use crate::{message::TelemetryMessage, DSResult, Error};

/// Length field plus the byte that must be zero.
pub const HEADER_LEN: usize = 3;

/// One binary record of the dashcam subtitle stream.
///
/// ```text
/// [length: u16 BE][0x00][ciphered payload ...]
/// ```
///
/// `length` counts every byte after the length field itself. The payload is the telemetry text
/// with a per-record offset added to each byte, see [`cipher`]. Records whose payload does not
/// contain the known plaintext stay undecoded.
#[derive(Debug, Clone)]
pub struct SubtitleRecord<'a> {
    length_field: u16,
    payload: &'a [u8],
    offset: Option<u8>,
    decoded: Option<String>,
    message: Option<TelemetryMessage>,
}

impl<'a> SubtitleRecord<'a> {
    /// Frame and decode one record. `bytes` must be exactly the record, length field included.
    pub fn parse(bytes: &'a [u8]) -> DSResult<Self> {
        let (payload, (length_field, zero)) = nom_header(bytes)
            .finish()
            .map_err(|_| Error::RecordTooShort(bytes.len()))?;
        let expected = bytes.len() - 2;
        if length_field as usize != expected {
            return Err(Error::LengthMismatch {
                actual: bytes.len(),
                declared: length_field,
                expected,
            });
        }
        if zero != 0 {
            return Err(Error::BadHeader(zero));
        }

        let offset = cipher::recover_offset(payload);
        let decoded = offset.map(|k| cipher::decode(payload, k));
        let message = decoded.as_deref().map(TelemetryMessage::parse);
        trace!("record of {} bytes, offset {:?}", bytes.len(), offset);
        Ok(Self {
            length_field,
            payload,
            offset,
            decoded,
            message,
        })
    }

    pub fn length_field(&self) -> u16 {
        self.length_field
    }

    /// Size of the record on the wire.
    pub fn total_len(&self) -> usize {
        self.length_field as usize + 2
    }

    /// Still ciphered payload bytes.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn decoding_offset(&self) -> Option<u8> {
        self.offset
    }

    pub fn decoded_string(&self) -> Option<&str> {
        self.decoded.as_deref()
    }

    pub fn message(&self) -> Option<&TelemetryMessage> {
        self.message.as_ref()
    }
}

impl fmt::Display for SubtitleRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubtitleRecord(len={}): ", self.total_len())?;
        match &self.decoded {
            Some(text) => write!(f, "{}", text.escape_debug()),
            None => write!(f, "{}", self.payload.escape_ascii()),
        }
    }
}

fn nom_header(bytes: &[u8]) -> IResult<&[u8], (u16, u8)> {
    let (rest, length) = be_u16(bytes)?;
    let (rest, zero) = be_u8(rest)?;
    Ok((rest, (length, zero)))
}

/// Build a record around `plaintext` ciphered with `offset`.
#[cfg(test)]
pub(crate) fn encode_record(plaintext: &[u8], offset: u8) -> Vec<u8> {
    let length = u16::try_from(plaintext.len() + 1).expect("payload fits the length field");
    let mut bytes = Vec::with_capacity(plaintext.len() + HEADER_LEN);
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.push(0);
    bytes.extend(cipher::encode(plaintext, offset));
    bytes
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lazy_init_tracing;

    const TELEMETRY: &[u8] =
        b"-12 987 1003 $GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

    #[test]
    fn test_decode_record() {
        lazy_init_tracing();
        let bytes = encode_record(TELEMETRY, 0xa7);
        assert_eq!(bytes.len(), TELEMETRY.len() + HEADER_LEN);
        let record = SubtitleRecord::parse(&bytes).unwrap();
        assert_eq!(record.total_len(), bytes.len());
        assert_eq!(record.length_field() as usize, TELEMETRY.len() + 1);
        assert_eq!(record.decoding_offset(), Some(0xa7));
        assert_eq!(record.decoded_string().unwrap().as_bytes(), TELEMETRY);
        assert_eq!(record.payload(), &bytes[HEADER_LEN..]);
        let msg = record.message().unwrap();
        assert!(msg.gforce.is_some());
        assert!(msg.gps.valid);
        assert!(record.to_string().starts_with("SubtitleRecord(len=84): -12 987 1003 $GPRMC"));
    }

    #[test]
    fn test_undecoded_record() {
        lazy_init_tracing();
        let bytes = encode_record(b"20170720", 0);
        let record = SubtitleRecord::parse(&bytes).unwrap();
        assert_eq!(record.decoding_offset(), None);
        assert_eq!(record.decoded_string(), None);
        assert!(record.message().is_none());
        assert_eq!(record.payload(), b"20170720");
        assert_eq!(record.to_string(), "SubtitleRecord(len=11): 20170720");
    }

    #[test]
    fn test_framing_errors() {
        lazy_init_tracing();
        let test_cases: [&[u8]; 3] = [&[], &[0], &[0, 1]];
        for bytes in test_cases {
            assert!(
                matches!(SubtitleRecord::parse(bytes), Err(Error::RecordTooShort(n)) if n == bytes.len()),
                "{:?}",
                bytes
            );
        }

        let mut bytes = encode_record(TELEMETRY, 3);
        bytes.pop();
        assert!(matches!(
            SubtitleRecord::parse(&bytes),
            Err(Error::LengthMismatch { declared: 82, expected: 81, .. })
        ));
        bytes.extend_from_slice(&[0, 0]);
        assert!(matches!(
            SubtitleRecord::parse(&bytes),
            Err(Error::LengthMismatch { declared: 82, expected: 83, .. })
        ));

        let mut bytes = encode_record(TELEMETRY, 3);
        bytes[2] = 0x10;
        assert!(matches!(
            SubtitleRecord::parse(&bytes),
            Err(Error::BadHeader(0x10))
        ));
    }

    #[test]
    #[should_panic(expected = "payload fits the length field")]
    fn test_encode_record_rejects_oversized_payload() {
        encode_record(&vec![b' '; u16::MAX as usize], 0);
    }

    #[test]
    fn test_largest_record() {
        lazy_init_tracing();
        let mut plaintext = vec![b' '; u16::MAX as usize - 1];
        plaintext[..5].copy_from_slice(b"GPRMC");
        let bytes = encode_record(&plaintext, 200);
        let record = SubtitleRecord::parse(&bytes).unwrap();
        assert_eq!(record.length_field(), u16::MAX);
        assert_eq!(record.total_len(), bytes.len());
        assert_eq!(record.decoding_offset(), Some(200));
    }

    #[test]
    fn test_empty_payload() {
        lazy_init_tracing();
        let record = SubtitleRecord::parse(&[0, 1, 0]).unwrap();
        assert_eq!(record.payload(), b"");
        assert_eq!(record.decoding_offset(), None);
    }
}
