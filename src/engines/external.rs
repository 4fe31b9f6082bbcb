//! Transcription by shelling out to whisper.cpp's `whisper-cli` binary.
//!
//! Useful when a system-provided build (GPU-enabled, distro-packaged) should do the
//! inference instead of the statically linked `whisper-rs`. We invoke it per file and
//! parse its `[HH:MM:SS.mmm --> HH:MM:SS.mmm]  text` stdout lines.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cmd::{program_available, require_program};
use crate::engine::{Engine, EngineConfig};
use crate::models::{missing_model_hint, resolve_model};
use crate::transcript::{Chunk, Transcript};

/// Name of the whisper.cpp CLI binary we look for on `PATH`.
pub const WHISPER_CLI: &str = "whisper-cli";

#[derive(Debug)]
pub struct ExternalEngine {
    binary: PathBuf,
    model_path: PathBuf,
    language: Option<String>,
}

impl ExternalEngine {
    /// Capability probe: the binary must be on `PATH` and the model file must exist.
    pub fn probe(cfg: &EngineConfig) -> std::result::Result<(), String> {
        if !program_available(WHISPER_CLI) {
            return Err(format!("{WHISPER_CLI} not found on PATH"));
        }
        let model_path = resolve_model(&cfg.model);
        if !model_path.is_file() {
            return Err(missing_model_hint(&cfg.model, &model_path));
        }
        Ok(())
    }

    pub fn new(cfg: &EngineConfig) -> Result<Self> {
        let binary = require_program(WHISPER_CLI)?;
        Ok(Self {
            binary,
            model_path: resolve_model(&cfg.model),
            language: cfg.language.clone(),
        })
    }
}

impl Engine for ExternalEngine {
    fn name(&self) -> &'static str {
        "external"
    }

    fn transcribe_file(&mut self, path: &Path) -> Result<Transcript> {
        let args = cli_args(&self.model_path, self.language.as_deref(), path);
        debug!(binary = %self.binary.display(), ?args, "invoking whisper-cli");

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .context("failed to run whisper-cli")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "whisper-cli exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_cli_output(&stdout))
    }
}

/// Build the whisper-cli argument vector.
fn cli_args(model: &Path, language: Option<&str>, audio: &Path) -> Vec<String> {
    let mut args = vec![
        "--no-prints".to_string(),
        "-m".to_string(),
        model.display().to_string(),
    ];
    if let Some(lang) = language {
        args.push("-l".to_string());
        args.push(lang.to_string());
    }
    args.push("-f".to_string());
    args.push(audio.display().to_string());
    args
}

/// Parse whisper-cli stdout into a transcript.
///
/// Recognized lines look like `[00:00:00.000 --> 00:00:04.120]   Hello there.`.
/// Output containing no such lines (a build invoked without timestamps) is kept as a
/// single untimed chunk rather than discarded.
fn parse_cli_output(stdout: &str) -> Transcript {
    let mut chunks = Vec::new();

    for line in stdout.lines() {
        if let Some(chunk) = parse_cli_line(line) {
            chunks.push(chunk);
        }
    }

    if chunks.is_empty() {
        let text = stdout.trim();
        if !text.is_empty() {
            chunks.push(Chunk {
                start_seconds: 0.0,
                end_seconds: 0.0,
                text: text.to_string(),
            });
        }
    }

    Transcript { chunks }
}

fn parse_cli_line(line: &str) -> Option<Chunk> {
    let rest = line.strip_prefix('[')?;
    let (range, text) = rest.split_once(']')?;
    let (start, end) = range.split_once(" --> ")?;

    Some(Chunk {
        start_seconds: parse_cli_timestamp(start.trim())?,
        end_seconds: parse_cli_timestamp(end.trim())?,
        text: text.trim().to_string(),
    })
}

/// Parse `HH:MM:SS.mmm` into seconds.
fn parse_cli_timestamp(ts: &str) -> Option<f32> {
    let mut parts = ts.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some((hours * 3600 + minutes * 60) as f32 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamped_lines() {
        let out = "[00:00:00.000 --> 00:00:04.120]   Hello there.\n\
                   [00:00:04.120 --> 00:00:07.500]   General Kenobi.\n";
        let t = parse_cli_output(out);
        assert_eq!(t.chunks.len(), 2);
        assert_eq!(t.chunks[0].text, "Hello there.");
        assert!((t.chunks[0].end_seconds - 4.12).abs() < 1e-3);
        assert!((t.chunks[1].start_seconds - 4.12).abs() < 1e-3);
        assert_eq!(t.plain_text(), "Hello there. General Kenobi.");
    }

    #[test]
    fn untimestamped_output_becomes_one_chunk() {
        let t = parse_cli_output("  just plain text output\n");
        assert_eq!(t.chunks.len(), 1);
        assert_eq!(t.chunks[0].text, "just plain text output");
        assert_eq!(t.chunks[0].start_seconds, 0.0);
    }

    #[test]
    fn empty_output_is_an_empty_transcript() {
        assert!(parse_cli_output("").is_empty());
        assert!(parse_cli_output("\n  \n").is_empty());
    }

    #[test]
    fn timestamp_parsing_handles_hours_and_rejects_garbage() {
        assert_eq!(parse_cli_timestamp("00:00:00.000"), Some(0.0));
        assert_eq!(parse_cli_timestamp("01:02:03.500"), Some(3723.5));
        assert_eq!(parse_cli_timestamp("00:99:00.000"), None);
        assert_eq!(parse_cli_timestamp("nonsense"), None);
        assert_eq!(parse_cli_timestamp("1:2"), None);
    }

    #[test]
    fn malformed_bracket_lines_are_ignored_when_real_lines_exist() {
        let out = "[not a timestamp] noise\n[00:00:00.000 --> 00:00:01.000] real\n";
        let t = parse_cli_output(out);
        assert_eq!(t.chunks.len(), 1);
        assert_eq!(t.chunks[0].text, "real");
    }

    #[test]
    fn cli_args_include_model_language_and_file() {
        let args = cli_args(
            Path::new("/models/ggml-small.bin"),
            Some("en"),
            Path::new("/tmp/seg_00000.wav"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-m /models/ggml-small.bin"));
        assert!(joined.contains("-l en"));
        assert!(joined.ends_with("-f /tmp/seg_00000.wav"));

        let args = cli_args(Path::new("/m.bin"), None, Path::new("/a.wav"));
        assert!(!args.join(" ").contains("-l"));
    }
}
