use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dashsub::{
    render::{Template, DEFAULT_TEMPLATE},
    srt, stream,
};

mod ffmpeg;

use ffmpeg::Ffmpeg;

/// Decode the accelerometer and GPS telemetry hidden in a dashcam's subtitle track and replace
/// the track with readable subtitles.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Opts {
    /// printf style format for the new subtitles. Fields: gx, gy, gz, v_kmh. Conversions: f, F,
    /// e, E, g, G, d, i, s.
    #[arg(short, long, default_value = DEFAULT_TEMPLATE)]
    render_string: String,

    /// Be more verbose; repeat for more. Three or more also shows ffmpeg's output.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Dashcam input file.
    infile: PathBuf,

    /// Output file with the re-rendered subtitles.
    outfile: PathBuf,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_tracing(opts.verbose);
    let template = Template::parse(&opts.render_string)?;

    let ffmpeg = Ffmpeg::new(opts.verbose < 3);
    let data = ffmpeg
        .subtitle_data(&opts.infile)
        .context("extracting subtitle stream")?;
    let original = ffmpeg
        .subtitle_timings(&opts.infile)
        .context("extracting subtitle timings")?;

    let records = stream::parse(&data).context("decoding subtitle stream")?;
    let timings = srt::cue_timings(&original);
    info!("{} records, {} cue timings", records.len(), timings.len());

    let mut track = tempfile::Builder::new()
        .suffix(".srt")
        .tempfile()
        .context("creating temporary subtitle file")?;
    let cues = timings
        .into_iter()
        .zip(records.iter().map(|r| template.render_record(r)));
    let written = srt::write_track(&mut track, cues)?;
    track.flush()?;
    info!("wrote {} cues to {}", written, track.path().display());

    ffmpeg
        .remux(&opts.infile, track.path(), &opts.outfile)
        .context("writing output file")?;
    Ok(())
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_opts() {
        Opts::command().debug_assert();

        let opts = Opts::try_parse_from(["dashsub", "in.mp4", "out.mp4"]).unwrap();
        assert_eq!(opts.render_string, DEFAULT_TEMPLATE);
        assert_eq!(opts.verbose, 0);
        assert_eq!(opts.infile, PathBuf::from("in.mp4"));

        let opts =
            Opts::try_parse_from(["dashsub", "-vvv", "-r", "%(v_kmh).0f", "in.mp4", "out.mp4"])
                .unwrap();
        assert_eq!(opts.verbose, 3);
        assert_eq!(opts.render_string, "%(v_kmh).0f");

        assert!(Opts::try_parse_from(["dashsub", "in.mp4"]).is_err());
    }
}
