//! Audio capture by orchestrating ffmpeg against a PulseAudio source.
//!
//! Two modes:
//! - one-shot: a single WAV, optionally duration-bounded
//! - segmented: ffmpeg's segment muxer writing sequentially numbered fixed-length
//!   chunks into the session workdir (consumed by [`crate::watcher`])
//!
//! Graceful shutdown is a control-channel handshake, not a process signal: we write
//! `q` to ffmpeg's stdin (its interactive quit command), wait a bounded time for it to
//! flush and close the current output, and only then fall back to killing it.

use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::cmd::require_program;
use crate::segment::SEGMENT_PATTERN;

/// Capture sample rate in Hz. Whisper models expect 16 kHz input.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Capture channel count. Mono halves the data for no transcription cost.
pub const TARGET_CHANNELS: u16 = 1;

/// How long [`RecorderHandle::stop_gracefully`] waits after the quit request before
/// force-killing ffmpeg.
pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(3);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawns and supervises ffmpeg capture processes.
#[derive(Debug)]
pub struct Recorder {
    ffmpeg: PathBuf,
}

impl Recorder {
    /// Locate ffmpeg, failing fast when it isn't installed.
    pub fn new() -> crate::Result<Self> {
        let ffmpeg = require_program("ffmpeg")?;
        Ok(Self { ffmpeg })
    }

    /// Record a single WAV from `source` into `out_wav`.
    ///
    /// With `duration`, ffmpeg stops on its own; without it, recording runs until
    /// `cancel` is latched, at which point we perform the quit handshake.
    pub fn record_once(
        &self,
        source: &str,
        out_wav: &Path,
        duration: Option<u64>,
        cancel: &CancelFlag,
    ) -> Result<()> {
        let args = once_args(source, duration, out_wav);
        info!(
            source,
            out = %out_wav.display(),
            duration,
            "starting one-shot capture"
        );

        let mut handle = self.spawn(&args)?;
        let mut stop_requested = false;
        loop {
            if let Some(status) = handle.try_finished()? {
                if !status.success() && !stop_requested {
                    anyhow::bail!("ffmpeg exited with {status}");
                }
                break;
            }

            if cancel.is_cancelled() && !stop_requested {
                info!("stopping capture");
                handle.request_stop()?;
                stop_requested = true;
                if handle.wait_timeout(GRACEFUL_STOP_TIMEOUT)?.is_none() {
                    warn!("ffmpeg ignored quit request; killing it");
                    handle.force_stop()?;
                }
                break;
            }

            std::thread::sleep(EXIT_POLL_INTERVAL);
        }

        info!("capture finished");
        Ok(())
    }

    /// Start segmented capture into `workdir` and hand back a supervision handle.
    ///
    /// Segments land as `seg_00000.wav`, `seg_00001.wav`, … each `segment_seconds`
    /// long (the final one may be shorter).
    pub fn spawn_segmented(
        &self,
        source: &str,
        workdir: &Path,
        segment_seconds: u64,
    ) -> Result<RecorderHandle> {
        let pattern = workdir.join(SEGMENT_PATTERN);
        let args = segment_args(source, segment_seconds, &pattern);
        info!(
            source,
            segment_seconds,
            workdir = %workdir.display(),
            "starting segmented capture"
        );
        self.spawn(&args)
    }

    fn spawn(&self, args: &[String]) -> Result<RecorderHandle> {
        debug!(ffmpeg = %self.ffmpeg.display(), ?args, "spawning ffmpeg");

        // stdin stays piped for the quit handshake; stderr is inherited so ffmpeg's
        // own error output (loglevel=error) reaches the user.
        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .context("failed to spawn ffmpeg")?;

        let stdin = child.stdin.take();
        Ok(RecorderHandle { child, stdin })
    }
}

/// A running ffmpeg capture process.
pub struct RecorderHandle {
    child: Child,
    stdin: Option<ChildStdin>,
}

/// How a graceful stop concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// ffmpeg acknowledged the quit request and exited within the timeout.
    Graceful,

    /// ffmpeg had to be killed after the timeout elapsed.
    Forced,
}

impl RecorderHandle {
    /// Non-blocking exit check.
    pub fn try_finished(&mut self) -> Result<Option<ExitStatus>> {
        self.child
            .try_wait()
            .context("failed to poll ffmpeg status")
    }

    /// Ask ffmpeg to quit by writing `q` to its stdin and closing the channel.
    ///
    /// Safe to call more than once; after the first call the channel is gone and the
    /// request is a no-op.
    pub fn request_stop(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            use std::io::Write;
            // A dead ffmpeg yields a broken pipe here; that's a completed stop,
            // not an error.
            let _ = stdin.write_all(b"q");
            let _ = stdin.flush();
        }
        Ok(())
    }

    /// Wait up to `timeout` for exit. Returns `None` when the deadline passes.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.try_finished()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    /// Kill ffmpeg and reap it.
    pub fn force_stop(&mut self) -> Result<ExitStatus> {
        self.child.kill().context("failed to kill ffmpeg")?;
        self.child.wait().context("failed to reap ffmpeg")
    }

    /// Full request/acknowledge shutdown handshake with a bounded wait.
    pub fn stop_gracefully(&mut self, timeout: Duration) -> Result<StopOutcome> {
        self.request_stop()?;
        match self.wait_timeout(timeout)? {
            Some(status) => {
                debug!(%status, "ffmpeg exited after quit request");
                Ok(StopOutcome::Graceful)
            }
            None => {
                warn!("ffmpeg did not exit within {timeout:?}; killing it");
                self.force_stop()?;
                Ok(StopOutcome::Forced)
            }
        }
    }
}

impl Drop for RecorderHandle {
    fn drop(&mut self) {
        // Never leave a capture process running past the session.
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Build the ffmpeg argument vector for one-shot capture.
fn once_args(source: &str, duration: Option<u64>, out_wav: &Path) -> Vec<String> {
    let mut args = base_args(source);
    if let Some(secs) = duration.filter(|d| *d > 0) {
        args.push("-t".into());
        args.push(secs.to_string());
    }
    args.push("-f".into());
    args.push("wav".into());
    args.push(out_wav.display().to_string());
    args
}

/// Build the ffmpeg argument vector for segmented capture.
fn segment_args(source: &str, segment_seconds: u64, pattern: &Path) -> Vec<String> {
    let mut args = base_args(source);
    args.push("-f".into());
    args.push("segment".into());
    args.push("-segment_time".into());
    args.push(segment_seconds.to_string());
    args.push("-reset_timestamps".into());
    args.push("1".into());
    args.push(pattern.display().to_string());
    args
}

fn base_args(source: &str) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "pulse".into(),
        "-i".into(),
        source.into(),
        "-ac".into(),
        TARGET_CHANNELS.to_string(),
        "-ar".into(),
        TARGET_SAMPLE_RATE.to_string(),
    ]
}
