//! The external demuxer/muxer. Each call runs one ffmpeg process to completion and buffers its
//! whole output.
use std::{
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{bail, Context, Result};
use tracing::debug;

pub struct Ffmpeg {
    program: String,
    /// Drop ffmpeg's own diagnostics instead of passing them to our stderr.
    quiet: bool,
}

impl Ffmpeg {
    pub fn new(quiet: bool) -> Self {
        Self {
            program: "ffmpeg".to_string(),
            quiet,
        }
    }

    /// Raw concatenated records of the first subtitle stream.
    pub fn subtitle_data(&self, input: &Path) -> Result<Vec<u8>> {
        let mut cmd = self.command();
        cmd.arg("-i")
            .arg(input)
            .args(["-map", "0:s", "-c", "copy", "-f", "data", "-"]);
        self.run(cmd)
    }

    /// The subtitle track rendered as SRT, used only for its cue timings.
    pub fn subtitle_timings(&self, input: &Path) -> Result<String> {
        let mut cmd = self.command();
        cmd.arg("-i").arg(input).args(["-f", "srt", "-"]);
        let srt = self.run(cmd)?;
        String::from_utf8(srt).context("subtitle timings are not valid UTF-8")
    }

    /// Copy video and audio of `input`, replacing its subtitles with the SRT track at `srt`.
    pub fn remux(&self, input: &Path, srt: &Path, output: &Path) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("-i")
            .arg(input)
            .args(["-f", "srt", "-i"])
            .arg(srt)
            .args(["-map", "0:0", "-map", "0:1", "-map", "1:0"])
            .args(["-c:v", "copy", "-c:a", "copy", "-c:s", "mov_text", "-y"])
            .arg(output);
        self.run(cmd)?;
        Ok(())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null());
        cmd.stderr(if self.quiet {
            Stdio::null()
        } else {
            Stdio::inherit()
        });
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<Vec<u8>> {
        debug!("running {:?}", cmd);
        let output = cmd
            .output()
            .with_context(|| format!("failed to run {}", self.program))?;
        if !output.status.success() {
            bail!("{:?} failed: {}", cmd, output.status);
        }
        Ok(output.stdout)
    }
}
