//! The on-disk segment model shared by the recorder and the watcher.
//!
//! During live capture the recorder writes sequentially numbered, fixed-length WAV
//! chunks into the session workdir. Each chunk moves through a simple lifecycle:
//! the recorder is still appending to it (writing), the recorder has moved on and
//! the file is safe to read fully (finalized), and finally the transcription engine
//! has consumed it (transcribed). Only finalized segments may be read.

use std::path::{Path, PathBuf};

/// Prefix shared by every segment filename.
pub const SEGMENT_PREFIX: &str = "seg_";

/// Extension shared by every segment filename.
pub const SEGMENT_EXTENSION: &str = "wav";

/// The `printf`-style pattern handed to ffmpeg's segment muxer.
///
/// Must stay in sync with [`segment_filename`] and [`parse_segment_index`].
pub const SEGMENT_PATTERN: &str = "seg_%05d.wav";

/// One sequentially numbered audio chunk in the session workdir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    /// Zero-based sequence index, monotonic per session.
    pub index: u64,

    /// Absolute path of the WAV chunk.
    pub path: PathBuf,
}

impl SegmentFile {
    pub fn new(index: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            path: path.into(),
        }
    }
}

/// Render the filename the recorder will use for a given segment index.
pub fn segment_filename(index: u64) -> String {
    format!("{SEGMENT_PREFIX}{index:05}.{SEGMENT_EXTENSION}")
}

/// Parse the sequence index out of a segment filename.
///
/// Returns `None` for anything that doesn't match the segment pattern so the watcher
/// silently ignores stray files (editor backups, partial downloads, dotfiles) that end
/// up in the workdir.
pub fn parse_segment_index(file_name: &str) -> Option<u64> {
    let stem = file_name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(".wav")?;

    // ffmpeg zero-pads to five digits but rolls over to six+ on very long sessions,
    // so we accept any run of digits rather than exactly five.
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    stem.parse().ok()
}

/// Parse the sequence index out of a full path's filename component.
pub fn parse_segment_path(path: &Path) -> Option<u64> {
    parse_segment_index(path.file_name()?.to_str()?)
}
