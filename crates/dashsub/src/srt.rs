/// SubRip (SRT) glue: reading cue timings from the demuxer's rendering of the original track and
/// writing the re-rendered track for the muxer.
use std::{fmt, io::Write};

use crate::DSResult;

const TIMING_SEPARATOR: &str = " --> ";

/// Timing lines (`HH:MM:SS,mmm --> HH:MM:SS,mmm`) of an SRT document, in order.
pub fn cue_timings(srt: &str) -> Vec<&str> {
    srt.lines()
        .filter(|line| line.contains(TIMING_SEPARATOR))
        .collect()
}

/// One output cue. `index` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue<'a> {
    pub index: usize,
    pub timing: &'a str,
    pub text: String,
}

impl fmt::Display for Cue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{}", self.timing)?;
        writeln!(
            f,
            "<font face=\"Arial\" size=\"12\" color=\"#000000\">{}</font>",
            self.text
        )?;
        writeln!(f)
    }
}

/// Write one cue per (timing, text) pair and return how many were written.
///
/// Pair the inputs with [`Iterator::zip`]: surplus records or timings are dropped.
pub fn write_track<'a, W, I>(w: &mut W, cues: I) -> DSResult<usize>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut count = 0;
    for (timing, text) in cues {
        count += 1;
        let cue = Cue {
            index: count,
            timing,
            text,
        };
        write!(w, "{}", cue)?;
    }
    w.flush()?;
    Ok(count)
}
