//! In-process transcription via `whisper-rs` / whisper.cpp.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
};

use crate::engine::{Engine, EngineConfig};
use crate::models::{missing_model_hint, resolve_model};
use crate::transcript::{Chunk, Transcript};
use crate::wav::samples_from_wav;

use super::whisper_logging::init_whisper_logging;

/// The built-in engine. Loads the GGML model once and reuses the context for every
/// segment, so per-segment cost is inference only.
pub struct NativeEngine {
    ctx: WhisperContext,
    language: Option<String>,
}

impl std::fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEngine")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl NativeEngine {
    /// Capability probe: the configured model file must resolve on disk.
    ///
    /// Returns a human-readable reason on failure, used both for `auto` fallback
    /// logging and for the error when this engine was forced.
    pub fn probe(cfg: &EngineConfig) -> std::result::Result<(), String> {
        let path = resolve_model(&cfg.model);
        if path.is_file() {
            Ok(())
        } else {
            Err(missing_model_hint(&cfg.model, &path))
        }
    }

    pub fn new(cfg: &EngineConfig) -> Result<Self> {
        let model_path = resolve_model(&cfg.model);
        let ctx = load_context(&model_path)?;
        Ok(Self {
            ctx,
            language: cfg.language.clone(),
        })
    }
}

impl Engine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn transcribe_file(&mut self, path: &Path) -> Result<Transcript> {
        let samples = samples_from_wav(path)?;
        if samples.is_empty() {
            return Ok(Transcript::default());
        }

        debug!(
            path = %path.display(),
            samples = samples.len(),
            "running whisper inference"
        );

        let state = run_full(&self.ctx, self.language.as_deref(), &samples)?;

        let mut chunks = Vec::new();
        for segment in state.as_iter() {
            let text = segment
                .to_str()
                .context("failed to get segment text")?
                .to_owned();
            chunks.push(Chunk {
                // Whisper timestamps are centiseconds.
                start_seconds: segment.start_timestamp() as f32 / 100.0,
                end_seconds: segment.end_timestamp() as f32 / 100.0,
                text,
            });
        }

        Ok(Transcript { chunks })
    }
}

fn load_context(model_path: &Path) -> Result<WhisperContext> {
    // Quiet whisper.cpp's own stderr logging before the first context loads.
    init_whisper_logging();

    let ctx_params = WhisperContextParameters::default();
    let ctx = WhisperContext::new_with_params(&model_path.to_string_lossy(), ctx_params)
        .with_context(|| format!("failed to load model from {}", model_path.display()))?;

    Ok(ctx)
}

fn run_full(
    ctx: &WhisperContext,
    language: Option<&str>,
    samples: &[f32],
) -> Result<WhisperState> {
    let mut params = FullParams::new(SamplingStrategy::BeamSearch {
        beam_size: 5,
        patience: 1.0,
    });

    params.set_n_threads(num_cpus::get() as i32);
    params.set_translate(false);
    params.set_language(language);
    params.set_no_context(true);
    params.set_single_segment(false);

    params.set_print_progress(false);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    let mut state = ctx
        .create_state()
        .context("failed to create whisper state")?;

    state
        .full(params, samples)
        .context("failed to run whisper full()")?;

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_fails_with_hint_when_model_is_missing() {
        let cfg = EngineConfig {
            model: "/no/such/model.bin".to_string(),
            language: None,
        };
        let reason = NativeEngine::probe(&cfg).unwrap_err();
        assert!(reason.contains("/no/such/model.bin"));
    }

    #[test]
    fn probe_succeeds_when_model_file_exists() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let model = dir.path().join("ggml-test.bin");
        std::fs::write(&model, b"not a real model")?;

        let cfg = EngineConfig {
            model: model.display().to_string(),
            language: None,
        };
        assert!(NativeEngine::probe(&cfg).is_ok());
        Ok(())
    }
}
