//! Detects completed audio segments in the session workdir.
//!
//! The recorder writes `seg_00000.wav`, `seg_00001.wav`, … strictly in order, always
//! appending to the highest index. The watcher's contract:
//!
//! - yield each index at most once, in strictly increasing order, no gaps, no
//!   duplicates, regardless of directory listing order
//! - never yield a segment the recorder may still be appending to
//!
//! A segment counts as finalized when its successor index exists on disk, when the
//! recorder process has exited, or when it has gone quiet (no modification) for a
//! configured period. Polling is the source of truth for that decision; native
//! filesystem notification ([`DirWakeup`]) only shortens the wait between polls and
//! degrades to plain interval sleeping when the notify backend is unavailable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, trace, warn};

use crate::segment::{SegmentFile, parse_segment_path};

/// Tuning knobs for segment finalization.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// How long a segment must go unmodified before it is considered finalized even
    /// without a successor. Covers the tail segment while the recorder is alive but
    /// between chunks (should comfortably exceed one write-flush interval).
    pub quiet_period: Duration,

    /// Segments smaller than this once finalized are header-only stubs from a
    /// mid-write stop; they are skipped permanently.
    pub min_segment_bytes: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_secs(2),
            min_segment_bytes: 64,
        }
    }
}

/// Polls a directory for finalized segments and yields them exactly once, in order.
///
/// The monotonic `next_index` cursor is the watcher's only mutable state.
pub struct SegmentWatcher {
    dir: PathBuf,
    cfg: WatcherConfig,
    next_index: u64,
}

impl SegmentWatcher {
    pub fn new(dir: impl Into<PathBuf>, cfg: WatcherConfig) -> Self {
        Self {
            dir: dir.into(),
            cfg,
            next_index: 0,
        }
    }

    /// The first index not yet yielded (or permanently skipped).
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// List the workdir and return every newly finalized segment, in index order.
    ///
    /// `producer_exited` marks everything currently on disk as final: once the
    /// recorder is gone nothing can still be appending.
    pub fn poll_ready(&mut self, producer_exited: bool) -> Result<Vec<SegmentFile>> {
        let on_disk = self.scan()?;
        let mut ready = Vec::new();

        loop {
            let index = self.next_index;
            let Some(path) = on_disk.get(&index) else {
                if !producer_exited {
                    break;
                }
                // The recorder never skips indices, but a crashed recorder can leave a
                // hole if a segment was removed out from under us. Jump the cursor so
                // the drain still empties the directory.
                match on_disk.range(index + 1..).next() {
                    Some((&successor, _)) => {
                        warn!(missing = index, successor, "segment missing on disk; skipping");
                        self.next_index = successor;
                        continue;
                    }
                    None => break,
                }
            };

            let meta = std::fs::metadata(path)
                .with_context(|| format!("failed to stat segment {}", path.display()))?;

            let has_successor = on_disk.contains_key(&(index + 1));
            let finalized =
                producer_exited || has_successor || self.quiet_period_elapsed(&meta)?;
            if !finalized {
                trace!(index, "segment still being written");
                break;
            }

            self.next_index += 1;

            if meta.len() < self.cfg.min_segment_bytes {
                debug!(
                    index,
                    bytes = meta.len(),
                    "skipping finalized stub segment"
                );
                continue;
            }

            ready.push(SegmentFile::new(index, path.clone()));
        }

        Ok(ready)
    }

    fn quiet_period_elapsed(&self, meta: &std::fs::Metadata) -> Result<bool> {
        let modified = meta
            .modified()
            .context("filesystem does not report modification times")?;
        match modified.elapsed() {
            Ok(elapsed) => Ok(elapsed >= self.cfg.quiet_period),
            // Modified in the future (clock skew): treat as still hot.
            Err(_) => Ok(false),
        }
    }

    /// Sorted index → path view of the segment files currently present.
    fn scan(&self) -> Result<BTreeMap<u64, PathBuf>> {
        let mut found = BTreeMap::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list workdir {}", self.dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if let Some(index) = parse_segment_path(&path) {
                found.insert(index, path);
            }
        }

        Ok(found)
    }
}

/// Wakes the poll loop when the workdir changes.
///
/// Wraps a `notify` watcher feeding a channel. [`DirWakeup::wait`] blocks until either
/// a filesystem event arrives or the poll interval elapses, so the loop reacts quickly
/// when notification works and still makes progress when it doesn't.
pub struct DirWakeup {
    rx: mpsc::Receiver<()>,
    poll_interval: Duration,
    // Kept alive for the duration of the session; dropping it unregisters the watch.
    _watcher: Option<RecommendedWatcher>,
}

impl DirWakeup {
    pub fn new(dir: &Path, poll_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel();

        let watcher = match Self::try_watch(dir, tx) {
            Ok(w) => Some(w),
            Err(err) => {
                warn!(
                    dir = %dir.display(),
                    error = %err,
                    "filesystem notification unavailable; falling back to interval polling"
                );
                None
            }
        };

        Self {
            rx,
            poll_interval,
            _watcher: watcher,
        }
    }

    fn try_watch(dir: &Path, tx: mpsc::Sender<()>) -> notify::Result<RecommendedWatcher> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // The session side may have shut down already; a failed send is fine.
            if res.is_ok() {
                let _ = tx.send(());
            }
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }

    /// Block until the directory changes or the poll interval elapses.
    pub fn wait(&self) {
        if self.rx.recv_timeout(self.poll_interval).is_ok() {
            // Collapse bursts of events into one wakeup.
            while self.rx.try_recv().is_ok() {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::segment_filename;
    use std::fs;

    fn write_segment(dir: &Path, index: u64, bytes: usize) -> PathBuf {
        let path = dir.join(segment_filename(index));
        fs::write(&path, vec![0u8; bytes]).unwrap();
        path
    }

    fn watcher_with_quiet(dir: &Path, quiet: Duration) -> SegmentWatcher {
        SegmentWatcher::new(
            dir,
            WatcherConfig {
                quiet_period: quiet,
                ..WatcherConfig::default()
            },
        )
    }

    // A quiet period long enough that it never elapses within a test.
    const NEVER_QUIET: Duration = Duration::from_secs(3600);

    #[test]
    fn yields_only_segments_with_successors_while_producer_runs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for index in 0..4 {
            write_segment(dir.path(), index, 1024);
        }

        let mut watcher = watcher_with_quiet(dir.path(), NEVER_QUIET);
        let ready = watcher.poll_ready(false)?;

        // 3 has no successor and the quiet period hasn't elapsed: still in progress.
        let indices: Vec<u64> = ready.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(watcher.next_index(), 3);
        Ok(())
    }

    #[test]
    fn never_reyields_an_index() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_segment(dir.path(), 0, 1024);
        write_segment(dir.path(), 1, 1024);

        let mut watcher = watcher_with_quiet(dir.path(), NEVER_QUIET);
        let first: Vec<u64> = watcher.poll_ready(false)?.iter().map(|s| s.index).collect();
        assert_eq!(first, vec![0]);

        // Nothing new: repeated polls stay empty.
        assert!(watcher.poll_ready(false)?.is_empty());

        write_segment(dir.path(), 2, 1024);
        let second: Vec<u64> = watcher.poll_ready(false)?.iter().map(|s| s.index).collect();
        assert_eq!(second, vec![1]);
        Ok(())
    }

    #[test]
    fn producer_exit_finalizes_the_tail_segment() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_segment(dir.path(), 0, 1024);
        write_segment(dir.path(), 1, 1024);

        let mut watcher = watcher_with_quiet(dir.path(), NEVER_QUIET);
        let ready: Vec<u64> = watcher.poll_ready(true)?.iter().map(|s| s.index).collect();
        assert_eq!(ready, vec![0, 1]);
        assert!(watcher.poll_ready(true)?.is_empty());
        Ok(())
    }

    #[test]
    fn quiet_period_finalizes_without_successor() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_segment(dir.path(), 0, 1024);

        // Zero quiet period: any untouched file counts as settled.
        let mut watcher = watcher_with_quiet(dir.path(), Duration::ZERO);
        let ready: Vec<u64> = watcher.poll_ready(false)?.iter().map(|s| s.index).collect();
        assert_eq!(ready, vec![0]);
        Ok(())
    }

    #[test]
    fn finalized_stub_segments_are_skipped_permanently() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_segment(dir.path(), 0, 1024);
        write_segment(dir.path(), 1, 10); // header-only stub
        write_segment(dir.path(), 2, 2048);

        let mut watcher = watcher_with_quiet(dir.path(), NEVER_QUIET);
        let ready: Vec<u64> = watcher.poll_ready(true)?.iter().map(|s| s.index).collect();
        assert_eq!(ready, vec![0, 2]);
        assert!(watcher.poll_ready(true)?.is_empty());
        Ok(())
    }

    #[test]
    fn drain_skips_holes_left_by_a_crashed_recorder() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_segment(dir.path(), 0, 1024);
        // 1 is missing entirely.
        write_segment(dir.path(), 2, 1024);

        let mut watcher = watcher_with_quiet(dir.path(), NEVER_QUIET);
        let ready: Vec<u64> = watcher.poll_ready(true)?.iter().map(|s| s.index).collect();
        assert_eq!(ready, vec![0, 2]);
        Ok(())
    }

    #[test]
    fn holes_block_while_producer_is_alive() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_segment(dir.path(), 0, 1024);
        write_segment(dir.path(), 2, 1024);

        // A listing race can briefly hide an index; never jump past it while the
        // recorder might still produce it.
        let mut watcher = watcher_with_quiet(dir.path(), NEVER_QUIET);
        let ready: Vec<u64> = watcher.poll_ready(false)?.iter().map(|s| s.index).collect();
        assert_eq!(ready, vec![0]);
        assert_eq!(watcher.next_index(), 1);
        Ok(())
    }

    #[test]
    fn ignores_unrelated_files_in_workdir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_segment(dir.path(), 0, 1024);
        fs::write(dir.path().join("notes.txt"), "hi")?;
        fs::write(dir.path().join("seg_xxxxx.wav"), vec![0u8; 1024])?;

        let mut watcher = watcher_with_quiet(dir.path(), NEVER_QUIET);
        let ready: Vec<u64> = watcher.poll_ready(true)?.iter().map(|s| s.index).collect();
        assert_eq!(ready, vec![0]);
        Ok(())
    }

    #[test]
    fn wakeup_falls_back_to_interval_when_dir_is_gone() {
        // Watching a nonexistent path fails; wait() must still return promptly.
        let wakeup = DirWakeup::new(
            Path::new("/definitely/not/a/real/dir"),
            Duration::from_millis(10),
        );
        let start = std::time::Instant::now();
        wakeup.wait();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn wakeup_fires_on_new_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let wakeup = DirWakeup::new(dir.path(), Duration::from_secs(2));

        let dir_path = dir.path().to_path_buf();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            fs::write(dir_path.join("seg_00000.wav"), vec![0u8; 128]).unwrap();
        });

        let start = std::time::Instant::now();
        wakeup.wait();
        writer.join().unwrap();
        // Either the notify event woke us early or the interval elapsed; both satisfy
        // the contract.
        assert!(start.elapsed() < Duration::from_secs(5));
        Ok(())
    }
}
