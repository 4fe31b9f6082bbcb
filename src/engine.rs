//! Pluggable transcription engines with capability-queried selection.
//!
//! An [`Engine`] turns one finalized audio file into a [`Transcript`]. Engines are
//! probed for availability before use, and `auto` selection walks a fixed ranking
//! (native in-process first, external CLI second) instead of branching on names at
//! call sites.

use std::path::Path;

use tracing::{debug, info};

use crate::engines::external::ExternalEngine;
use crate::engines::native::NativeEngine;
use crate::transcript::Transcript;

/// Which transcription engine to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum EngineChoice {
    /// Ranked fallback: native if its model resolves, else the external CLI.
    #[default]
    Auto,

    /// In-process whisper.cpp via `whisper-rs`.
    Native,

    /// The `whisper-cli` binary as a subprocess.
    External,
}

/// Engine-independent transcription configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model size name (resolved via [`crate::models`]) or an explicit GGML path.
    pub model: String,

    /// Forced language code; `None` lets the model auto-detect.
    pub language: Option<String>,
}

/// One transcription backend.
pub trait Engine: std::fmt::Debug {
    /// Short human-readable engine name for logs and errors.
    fn name(&self) -> &'static str;

    /// Transcribe one finalized audio file.
    fn transcribe_file(&mut self, path: &Path) -> anyhow::Result<Transcript>;
}

/// Pick and construct an engine according to `choice`.
///
/// A forced choice that isn't available is an error carrying the probe's reason; in
/// `auto` mode we fall through the ranking and only fail when nothing is usable.
pub fn select_engine(choice: EngineChoice, cfg: &EngineConfig) -> crate::Result<Box<dyn Engine>> {
    match choice {
        EngineChoice::Native => {
            NativeEngine::probe(cfg).map_err(crate::Error::msg)?;
            Ok(Box::new(NativeEngine::new(cfg)?))
        }
        EngineChoice::External => {
            ExternalEngine::probe(cfg).map_err(crate::Error::msg)?;
            Ok(Box::new(ExternalEngine::new(cfg)?))
        }
        EngineChoice::Auto => {
            let native_reason = match NativeEngine::probe(cfg) {
                Ok(()) => {
                    info!(engine = "native", "selected transcription engine");
                    return Ok(Box::new(NativeEngine::new(cfg)?));
                }
                Err(reason) => {
                    debug!(engine = "native", %reason, "engine unavailable");
                    reason
                }
            };

            let external_reason = match ExternalEngine::probe(cfg) {
                Ok(()) => {
                    info!(engine = "external", "selected transcription engine");
                    return Ok(Box::new(ExternalEngine::new(cfg)?));
                }
                Err(reason) => {
                    debug!(engine = "external", %reason, "engine unavailable");
                    reason
                }
            };

            Err(crate::Error::msg(format!(
                "no transcription engine available: native: {native_reason}; external: {external_reason}"
            )))
        }
    }
}
