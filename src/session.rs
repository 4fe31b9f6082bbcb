//! Session lifecycle: wiring the recorder, watcher, engine, and sink together.
//!
//! A live session moves through Idle → Recording → Draining → Stopped. One thread
//! drives the whole watch-transcribe-emit loop; the recorder is an independent
//! process, and the only shared state with it is the filesystem. Cancellation is
//! cooperative: the interrupt latches a flag, the loop notices it at the next
//! suspension point, asks the recorder to stop, and drains whatever finalized
//! segments remain before exiting.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::engine::Engine;
use crate::recorder::{GRACEFUL_STOP_TIMEOUT, Recorder, RecorderHandle, StopOutcome};
use crate::segment::SegmentFile;
use crate::sink::TranscriptSink;
use crate::transcript::segment_window_prefix;
use crate::watcher::{DirWakeup, SegmentWatcher, WatcherConfig};

/// Lifecycle states of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Recording,
    Draining,
    Stopped,
}

/// User-facing options for a live session.
#[derive(Debug, Clone)]
pub struct LiveOpts {
    /// PulseAudio source to capture.
    pub source: String,

    /// Fixed segment length in seconds.
    pub segment_seconds: u64,

    /// Prefix each entry with its wall-clock window.
    pub timestamps: bool,

    /// Append transcript entries to this file as they are produced.
    pub output_path: Option<PathBuf>,

    /// Keep the segment workdir instead of removing it at session end.
    pub keep_segments: bool,
}

/// Timing knobs for the live loop. Defaults suit interactive use.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Upper bound between polls when no filesystem events arrive.
    pub poll_interval: Duration,

    /// Bounded wait for the recorder's quit handshake.
    pub stop_timeout: Duration,

    /// Bounded wait for draining finalized segments after the recorder stops.
    pub drain_timeout: Duration,

    pub watcher: WatcherConfig,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(300),
            stop_timeout: GRACEFUL_STOP_TIMEOUT,
            drain_timeout: Duration::from_secs(60),
            watcher: WatcherConfig::default(),
        }
    }
}

/// What happened over one live session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveReport {
    /// Entries delivered to the sink (including empty-silence entries).
    pub transcribed: u64,

    /// Segments whose transcription failed and were skipped.
    pub failed: u64,

    /// Finalized segments abandoned because the drain timeout elapsed.
    pub dropped: u64,

    /// How the recorder was stopped, when we stopped it ourselves.
    pub producer_stop: Option<StopOutcome>,
}

/// The segment producer as the live driver sees it.
///
/// [`RecorderHandle`] is the real implementation; tests substitute their own to
/// exercise the loop without ffmpeg.
pub trait Producer {
    /// Whether the producer process has exited.
    fn is_finished(&mut self) -> Result<bool>;

    /// Graceful-stop handshake with a bounded wait, then force-stop.
    fn stop(&mut self, timeout: Duration) -> Result<StopOutcome>;
}

impl Producer for RecorderHandle {
    fn is_finished(&mut self) -> Result<bool> {
        match self.try_finished()? {
            Some(status) => {
                debug!(%status, "recorder process exited");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn stop(&mut self, timeout: Duration) -> Result<StopOutcome> {
        self.stop_gracefully(timeout)
    }
}

/// Why the recording loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainReason {
    Cancelled,
    ProducerExited,
}

/// Run a full live session: spawn the recorder into a fresh workdir, drive the
/// watch-transcribe-emit loop until cancelled, and clean up.
///
/// The workdir is removed on every exit path, including errors, unless
/// `opts.keep_segments` is set.
pub fn run_live<W: Write>(
    recorder: &Recorder,
    engine: &mut dyn Engine,
    opts: &LiveOpts,
    cfg: &LiveConfig,
    cancel: &CancelFlag,
    out: W,
) -> Result<LiveReport> {
    let workdir = tempfile::Builder::new()
        .prefix("syscribe_")
        .tempdir()
        .context("failed to create session workdir")?;

    info!(
        source = %opts.source,
        segment_seconds = opts.segment_seconds,
        workdir = %workdir.path().display(),
        "live transcription starting"
    );

    let mut handle = recorder.spawn_segmented(&opts.source, workdir.path(), opts.segment_seconds)?;
    let mut sink = TranscriptSink::new(out, opts.output_path.as_deref())?;
    let result = drive_live(&mut handle, workdir.path(), engine, opts, cfg, cancel, &mut sink);

    if opts.keep_segments {
        let kept = workdir.keep();
        info!(workdir = %kept.display(), "keeping segment workdir");
    }
    // Otherwise TempDir's drop removes the workdir, error path included.

    result
}

/// The live loop proper, factored out of [`run_live`] so it can be driven against an
/// arbitrary producer and pre-existing workdir.
pub fn drive_live<W: Write>(
    producer: &mut dyn Producer,
    workdir: &Path,
    engine: &mut dyn Engine,
    opts: &LiveOpts,
    cfg: &LiveConfig,
    cancel: &CancelFlag,
    sink: &mut TranscriptSink<W>,
) -> Result<LiveReport> {
    let mut state = LifecycleState::Recording;
    let mut report = LiveReport::default();
    let mut watcher = SegmentWatcher::new(workdir, cfg.watcher.clone());
    let wakeup = DirWakeup::new(workdir, cfg.poll_interval);
    debug!(?state, workdir = %workdir.display(), "watch loop started");

    let reason = loop {
        if cancel.is_cancelled() {
            break DrainReason::Cancelled;
        }
        if producer.is_finished()? {
            break DrainReason::ProducerExited;
        }

        for segment in watcher.poll_ready(false)? {
            transcribe_segment(engine, opts, &segment, sink, &mut report)?;
        }

        wakeup.wait();
    };

    state = LifecycleState::Draining;
    debug!(?state, ?reason, "leaving recording loop");
    match reason {
        DrainReason::Cancelled => {
            info!("interrupt received; stopping capture");
            report.producer_stop = Some(producer.stop(cfg.stop_timeout)?);
        }
        DrainReason::ProducerExited => {
            warn!("recorder exited unexpectedly; draining finalized segments");
        }
    }

    // Everything on disk is final now; one poll sees it all.
    let remaining = watcher.poll_ready(true)?;
    let deadline = Instant::now() + cfg.drain_timeout;
    let mut pending = remaining.into_iter();
    for segment in pending.by_ref() {
        if Instant::now() >= deadline {
            report.dropped = 1 + pending.count() as u64;
            warn!(
                dropped = report.dropped,
                "drain timeout exceeded; dropping remaining segments"
            );
            break;
        }
        transcribe_segment(engine, opts, &segment, sink, &mut report)?;
    }

    state = LifecycleState::Stopped;
    info!(
        ?state,
        transcribed = report.transcribed,
        failed = report.failed,
        dropped = report.dropped,
        "live transcription stopped"
    );
    Ok(report)
}

/// Transcribe one finalized segment and deliver its entry (or a skip) to the sink.
///
/// A per-segment engine failure is tolerated: it is reported, the segment's slot in
/// the output ordering is skipped, and the session continues.
fn transcribe_segment<W: Write>(
    engine: &mut dyn Engine,
    opts: &LiveOpts,
    segment: &SegmentFile,
    sink: &mut TranscriptSink<W>,
    report: &mut LiveReport,
) -> Result<()> {
    match engine.transcribe_file(&segment.path) {
        Ok(transcript) => {
            let rendered = transcript.render(opts.timestamps);
            let text = if opts.timestamps {
                let prefix = segment_window_prefix(segment.index, opts.segment_seconds);
                format!("{prefix}{}", rendered.trim())
            } else {
                rendered.trim().to_string()
            };

            sink.push(crate::transcript::TranscriptEntry::new(segment.index, text))?;
            report.transcribed += 1;
        }
        Err(err) => {
            warn!(
                index = segment.index,
                error = format!("{err:#}"),
                "transcription failed; segment omitted"
            );
            sink.skip(segment.index)?;
            report.failed += 1;
        }
    }
    Ok(())
}

/// User-facing options for a one-shot session.
#[derive(Debug, Clone)]
pub struct OnceOpts {
    pub source: String,

    /// Record for this many seconds instead of waiting for an interrupt.
    pub duration: Option<u64>,

    /// Transcribe this existing file instead of recording.
    pub input: Option<PathBuf>,

    pub timestamps: bool,

    /// Write the transcript to this file as well as stdout.
    pub output_path: Option<PathBuf>,
}

/// Record once (or take an existing file) and transcribe it in one pass.
pub fn run_once<W: Write>(
    engine: &mut dyn Engine,
    opts: &OnceOpts,
    cancel: &CancelFlag,
    mut out: W,
) -> Result<()> {
    let text = match &opts.input {
        Some(input) => transcribe_whole(engine, input, opts.timestamps)?,
        None => {
            // The recorder (and its missing-ffmpeg error) comes before any other work
            // so a broken setup fails immediately.
            let recorder = Recorder::new()?;
            let workdir = tempfile::Builder::new()
                .prefix("syscribe_")
                .tempdir()
                .context("failed to create session workdir")?;
            let wav = workdir.path().join("capture.wav");

            recorder.record_once(&opts.source, &wav, opts.duration, cancel)?;
            transcribe_whole(engine, &wav, opts.timestamps)?
            // workdir (and the capture) is removed when TempDir drops.
        }
    };

    writeln!(out, "{text}")?;
    out.flush()?;

    if let Some(path) = &opts.output_path {
        std::fs::write(path, format!("{text}\n"))
            .with_context(|| format!("failed to write transcript to {}", path.display()))?;
    }

    Ok(())
}

fn transcribe_whole(engine: &mut dyn Engine, path: &Path, timestamps: bool) -> Result<String> {
    info!(engine = engine.name(), path = %path.display(), "transcribing");
    let transcript = engine.transcribe_file(path)?;
    Ok(transcript.render(timestamps).trim().to_string())
}
