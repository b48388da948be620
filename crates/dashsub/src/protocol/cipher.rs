//! Per-record Caesar style byte offset used to hide the telemetry text.
//!
//! Every plaintext byte has the same unknown offset `k` added (mod 256). Subtracting adjacent
//! ciphertext bytes cancels `k`, so the difference sequence of a known plaintext fragment can be
//! located directly in the difference sequence of the ciphertext.
use tracing::trace;

/// Text every telemetry payload is known to contain.
pub const KNOWN_PLAINTEXT: &[u8; 5] = b"GPRMC";

const KNOWN_DIFF: [u8; 4] = adjacent_diff(KNOWN_PLAINTEXT);

const fn adjacent_diff(p: &[u8; 5]) -> [u8; 4] {
    let mut diff = [0u8; 4];
    let mut i = 0;
    while i < 4 {
        diff[i] = p[i].wrapping_sub(p[i + 1]);
        i += 1;
    }
    diff
}

/// Search the ciphertext for the known plaintext and return the offset it was shifted by.
///
/// Returns `None` when the plaintext does not appear, which is expected for records that carry
/// no telemetry.
pub fn recover_offset(ciphertext: &[u8]) -> Option<u8> {
    let diff: Vec<u8> = ciphertext
        .windows(2)
        .map(|w| w[0].wrapping_sub(w[1]))
        .collect();
    let index = diff.windows(KNOWN_DIFF.len()).position(|w| w == KNOWN_DIFF)?;
    let offset = ciphertext[index].wrapping_sub(KNOWN_PLAINTEXT[0]);
    trace!("known plaintext at index {}, offset {}", index, offset);
    Some(offset)
}

pub fn encode_byte(b: u8, offset: u8) -> u8 {
    b.wrapping_add(offset)
}

pub fn decode_byte(c: u8, offset: u8) -> u8 {
    c.wrapping_sub(offset)
}

pub fn encode(plaintext: &[u8], offset: u8) -> Vec<u8> {
    plaintext.iter().map(|&b| encode_byte(b, offset)).collect()
}

/// Decode into text, one char per byte (latin-1).
pub fn decode(ciphertext: &[u8], offset: u8) -> String {
    ciphertext
        .iter()
        .map(|&c| char::from(decode_byte(c, offset)))
        .collect()
}
