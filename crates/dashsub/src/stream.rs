/// Walk the raw, concatenated subtitle stream as extracted from the container and decode every
/// record in order.
///
/// Some dashcams interleave purely numeric "seed" records with the telemetry. The seed predicts
/// the cipher offset of the next decodable record; that prediction is only checked and logged,
/// decoding always uses the known plaintext search.
use std::iter::FusedIterator;

use nom::{
    bytes::complete::take,
    combinator::peek,
    number::complete::be_u16,
    Finish, IResult,
};
use tracing::{debug, info, warn};

use crate::{protocol::record::SubtitleRecord, DSResult, Error};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// Numeric payload of a record that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed(String);

impl Seed {
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        if payload.is_empty() || !payload.iter().all(u8::is_ascii_digit) {
            return None;
        }
        Some(Self(payload.iter().map(|&b| char::from(b)).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Experimentally determined: sum of the first eight digits, plus digits 4 and 7 once more.
    /// `None` for seeds shorter than eight digits.
    pub fn predicted_offset(&self) -> Option<u32> {
        let digits: Vec<u32> = self.0.bytes().map(|b| (b - b'0') as u32).collect();
        if digits.len() < 8 {
            return None;
        }
        Some(digits[..8].iter().sum::<u32>() + digits[4] + digits[7])
    }
}

/// Outcome of comparing a pending seed with the offset actually recovered from the next record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedCheck {
    pub seed: Seed,
    pub predicted: Option<u32>,
    pub actual: u8,
}

impl SeedCheck {
    pub fn matches(&self) -> bool {
        self.predicted == Some(self.actual as u32)
    }

    fn log(&self) {
        let predicted = self
            .predicted
            .map_or_else(|| "n/a".to_string(), |p| p.to_string());
        if self.matches() {
            info!(
                "Seed = {:?}, calculated offset = {}, actual offset = {}",
                self.seed.as_str(),
                predicted,
                self.actual
            );
        } else {
            warn!(
                "Seed = {:?}, calculated offset = {}, actual offset = {}",
                self.seed.as_str(),
                predicted,
                self.actual
            );
        }
    }
}

/// Advance the pending seed slot past one record.
///
/// An undecodable numeric record replaces the pending seed. A decoded record consumes it,
/// producing the check against its recovered offset. Anything else leaves it untouched.
pub fn track_seed(
    pending: Option<Seed>,
    record: &SubtitleRecord<'_>,
) -> (Option<Seed>, Option<SeedCheck>) {
    match record.decoding_offset() {
        None => (Seed::from_payload(record.payload()).or(pending), None),
        Some(actual) => {
            let check = pending.map(|seed| SeedCheck {
                predicted: seed.predicted_offset(),
                seed,
                actual,
            });
            (None, check)
        }
    }
}

//  ____                        _   ____  _
// |  _ \ ___  ___ ___  _ __ __| | / ___|| |_ _ __ ___  __ _ _ __ ___
// | |_) / _ \/ __/ _ \| '__/ _` | \___ \| __| '__/ _ \/ _` | '_ ` _ \
// |  _ <  __/ (_| (_) | | | (_| |  ___) | |_| | |  __/ (_| | | | | | |
// |_| \_\___|\___\___/|_|  \__,_| |____/ \__|_|  \___|\__,_|_| |_| |_|
//

/// Lazy, in-order iterator over the records of a subtitle stream.
///
/// Yields `Err` once and then stops if the stream is malformed; callers must not treat the
/// records seen before the error as a complete result.
pub struct RecordStream<'a> {
    input: &'a [u8],
    pos: usize,
    seed: Option<Seed>,
    failed: bool,
}

impl<'a> RecordStream<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            seed: None,
            failed: false,
        }
    }

    fn next_frame(&self) -> DSResult<&'a [u8]> {
        let rest = &self.input[self.pos..];
        nom_frame(rest)
            .finish()
            .map(|(_, frame)| frame)
            .map_err(|_| {
                let needed = match rest {
                    [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]) as usize + 2,
                    _ => 2,
                };
                Error::Truncated {
                    offset: self.pos,
                    needed,
                    available: rest.len(),
                }
            })
    }
}

impl<'a> Iterator for RecordStream<'a> {
    type Item = DSResult<SubtitleRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.input.len() {
            return None;
        }
        let record = match self.next_frame().and_then(SubtitleRecord::parse) {
            Ok(record) => record,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        self.pos += record.total_len();

        debug!("{}", record);
        debug!("    {:?}", record.message());
        let (seed, check) = track_seed(self.seed.take(), &record);
        self.seed = seed;
        if let Some(check) = check {
            check.log();
        }
        Some(Ok(record))
    }
}

impl FusedIterator for RecordStream<'_> {}

/// Decode a whole stream, failing on the first malformed record.
pub fn parse(input: &[u8]) -> DSResult<Vec<SubtitleRecord<'_>>> {
    RecordStream::new(input).collect()
}

fn nom_frame(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (_, length) = peek(be_u16)(input)?;
    take(length as usize + 2)(input)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{lazy_init_tracing, protocol::record::encode_record};

    fn telemetry(gx: i32) -> Vec<u8> {
        format!(
            "{} 10 1000 $GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
            gx
        )
        .into_bytes()
    }

    #[test]
    fn test_seed_predicted_offset() {
        let test_cases = [
            ("12345678", Some(49)),
            ("00000000", Some(0)),
            ("99999999", Some(90)),
            ("1234567890", Some(49)),
            ("2017072", None),
        ];
        for (digits, expected) in test_cases {
            let seed = Seed::from_payload(digits.as_bytes()).unwrap();
            assert_eq!(seed.predicted_offset(), expected, "seed {}", digits);
        }
    }

    #[test]
    fn test_seed_from_payload() {
        assert_eq!(Seed::from_payload(b"0815").unwrap().as_str(), "0815");
        assert_eq!(Seed::from_payload(b""), None);
        assert_eq!(Seed::from_payload(b"12 34"), None);
        assert_eq!(Seed::from_payload(&[b'1', 0xb2]), None);
    }

    #[test]
    fn test_stream_in_order() {
        lazy_init_tracing();
        let offsets = [0u8, 17, 255, 128];
        let stream: Vec<u8> = offsets
            .iter()
            .enumerate()
            .flat_map(|(i, &k)| encode_record(&telemetry(i as i32 * 100), k))
            .collect();
        let records = parse(&stream).unwrap();
        assert_eq!(records.len(), offsets.len());
        for (i, (record, &k)) in records.iter().zip(&offsets).enumerate() {
            assert_eq!(record.decoding_offset(), Some(k));
            let gforce = record.message().unwrap().gforce.unwrap();
            assert!((gforce.x - i as f64 / 10.0).abs() < 1e-12);
        }
        assert_eq!(
            records.iter().map(|r| r.total_len()).sum::<usize>(),
            stream.len()
        );
    }

    #[test]
    fn test_empty_stream() {
        lazy_init_tracing();
        assert!(parse(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_stream() {
        lazy_init_tracing();
        let mut stream = [encode_record(&telemetry(1), 5), encode_record(&telemetry(2), 6)].concat();
        let first_len = stream.len() / 2;
        stream.truncate(stream.len() - 1);

        let mut it = RecordStream::new(&stream);
        assert!(it.next().unwrap().is_ok());
        match it.next() {
            Some(Err(Error::Truncated {
                offset,
                needed,
                available,
            })) => {
                assert_eq!(offset, first_len);
                assert_eq!(needed, first_len);
                assert_eq!(available, first_len - 1);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
        assert!(it.next().is_none());
        assert!(matches!(parse(&stream), Err(Error::Truncated { .. })));

        // dangling single byte where a length field should be
        let stream = [encode_record(&telemetry(1), 5), vec![0]].concat();
        assert!(matches!(
            parse(&stream),
            Err(Error::Truncated {
                needed: 2,
                available: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_bad_header_aborts() {
        lazy_init_tracing();
        let mut bad = encode_record(&telemetry(1), 5);
        bad[2] = 1;
        let stream = [bad, encode_record(&telemetry(2), 6)].concat();
        let results: Vec<_> = RecordStream::new(&stream).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::BadHeader(1))));

        // zero length field frames a record too short to carry the header byte
        assert!(matches!(parse(&[0, 0]), Err(Error::RecordTooShort(2))));
    }

    #[test]
    fn test_seed_tracking() {
        lazy_init_tracing();
        let decoded_bytes = encode_record(&telemetry(1), 49);
        let seed_bytes = encode_record(b"12345678", 0);
        let noise_bytes = encode_record(b"no telemetry here", 0);
        let decoded = SubtitleRecord::parse(&decoded_bytes).unwrap();
        let seed = SubtitleRecord::parse(&seed_bytes).unwrap();
        let noise = SubtitleRecord::parse(&noise_bytes).unwrap();

        let (pending, check) = track_seed(None, &seed);
        assert_eq!(pending.as_ref().map(Seed::as_str), Some("12345678"));
        assert!(check.is_none());

        // undecodable non-numeric records keep the pending seed
        let (pending, check) = track_seed(pending, &noise);
        assert!(pending.is_some());
        assert!(check.is_none());

        let (pending, check) = track_seed(pending, &decoded);
        assert!(pending.is_none());
        let check = check.unwrap();
        assert_eq!(check.predicted, Some(49));
        assert_eq!(check.actual, 49);
        assert!(check.matches());

        // nothing pending, nothing to check
        let (pending, check) = track_seed(None, &decoded);
        assert!(pending.is_none() && check.is_none());

        let mismatched_bytes = encode_record(&telemetry(1), 50);
        let mismatched = SubtitleRecord::parse(&mismatched_bytes).unwrap();
        let (_, check) = track_seed(Seed::from_payload(b"12345678"), &mismatched);
        assert!(!check.unwrap().matches());
    }

    #[test]
    fn test_seed_records_do_not_change_output() {
        lazy_init_tracing();
        let with_seeds = [
            encode_record(b"12345678", 0),
            encode_record(&telemetry(1), 7),
            encode_record(b"99999999", 3),
            encode_record(&telemetry(2), 90),
        ]
        .concat();
        let records = parse(&with_seeds).unwrap();
        assert_eq!(records.len(), 4);
        assert!(records[0].message().is_none());
        assert_eq!(records[1].decoding_offset(), Some(7));
        assert_eq!(records[2].decoded_string(), None);
        assert_eq!(records[3].decoding_offset(), Some(90));
    }
}
