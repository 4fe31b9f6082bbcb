//! Transcript data types and text rendering.

use serde::Serialize;

/// One timed span of recognized speech, as reported by an engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub start_seconds: f32,
    pub end_seconds: f32,
    pub text: String,
}

/// The result of transcribing one audio file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcript {
    pub chunks: Vec<Chunk>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|c| c.text.trim().is_empty())
    }

    /// All chunk texts joined into one line, trimmed.
    pub fn plain_text(&self) -> String {
        self.chunks
            .iter()
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One `[ start- end] text` line per chunk.
    pub fn timestamped_text(&self) -> String {
        self.chunks
            .iter()
            .map(|c| {
                format!(
                    "[{:6.2}-{:6.2}] {}",
                    c.start_seconds,
                    c.end_seconds,
                    c.text.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render with or without per-chunk time ranges.
    pub fn render(&self, timestamps: bool) -> String {
        if timestamps {
            self.timestamped_text()
        } else {
            self.plain_text()
        }
    }
}

/// One live-mode output line, tied to the segment it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    /// Segment sequence index. Entries reach the sink in strictly increasing
    /// index order.
    pub index: u64,

    pub text: String,
}

impl TranscriptEntry {
    pub fn new(index: u64, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// `[start-end s]` wall-clock window prefix for a live segment.
///
/// Live segments carry no absolute time of their own (ffmpeg resets timestamps per
/// segment), so the window is derived from the segment index and length.
pub fn segment_window_prefix(index: u64, segment_seconds: u64) -> String {
    let start = index * segment_seconds;
    let end = start + segment_seconds;
    format!("[{start:>5}-{end:>5}s] ")
}
