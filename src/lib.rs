//! `syscribe` — record a Linux machine's outgoing audio and transcribe it.
//!
//! This crate provides:
//! - PulseAudio/PipeWire monitor-source enumeration and default selection
//! - ffmpeg-backed capture, one-shot or in fixed-length segments
//! - A segment watcher that yields finalized chunks exactly once, in order
//! - Pluggable Whisper transcription engines with ranked fallback
//! - An ordered transcript sink for live output
//!
//! The library is designed around one synchronous control thread; the audio
//! recorder is an external process, and graceful shutdown is an explicit
//! request/acknowledge handshake with a bounded timeout.

// High-level API (most consumers should start here).
pub mod session;

// Audio source discovery and capture.
pub mod recorder;
pub mod sources;

// Segment lifecycle: naming, finalization detection, ordered delivery.
pub mod segment;
pub mod sink;
pub mod watcher;

// Transcription engines and their outputs.
pub mod engine;
pub mod engines;
pub mod models;
pub mod transcript;
pub mod wav;

// Cross-cutting plumbing.
pub mod cancel;
pub mod cmd;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
