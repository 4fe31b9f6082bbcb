use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use syscribe::cancel::CancelFlag;
use syscribe::engine::{EngineChoice, EngineConfig, select_engine};
use syscribe::models::DEFAULT_MODEL_SIZE;
use syscribe::recorder::Recorder;
use syscribe::session::{self, LiveConfig, LiveOpts, OnceOpts};
use syscribe::sources::{default_monitor_source, list_sources};

#[derive(Parser, Debug)]
#[command(name = "syscribe")]
#[command(about = "Record Linux system audio and transcribe it with Whisper")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record once and transcribe after.
    Once {
        #[command(flatten)]
        common: CommonArgs,

        /// Record for N seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        duration: Option<u64>,

        /// Write the transcript to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip recording and transcribe this existing audio file.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Segmented live transcription.
    Live {
        #[command(flatten)]
        common: CommonArgs,

        /// Segment length in seconds.
        #[arg(long, default_value_t = 8)]
        segment_seconds: u64,

        /// Append the live transcript to this file as it's produced.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Keep the segment workdir instead of deleting it at exit.
        #[arg(long)]
        keep_segments: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// PulseAudio source name (e.g. <sink>.monitor). Defaults to auto-selection.
    #[arg(long)]
    source: Option<String>,

    /// Whisper model size (e.g. small, base.en) or a path to a GGML file.
    #[arg(long, default_value = DEFAULT_MODEL_SIZE)]
    model: String,

    /// Transcription engine.
    #[arg(long, value_enum, default_value_t = EngineChoice::Auto)]
    engine: EngineChoice,

    /// Force a language code (e.g. en). Defaults to auto-detect.
    #[arg(long)]
    language: Option<String>,

    /// Print timestamps with the transcript.
    #[arg(long)]
    timestamps: bool,

    /// List PulseAudio sources and exit.
    #[arg(long)]
    list_sources: bool,
}

fn main() -> ExitCode {
    syscribe::logging::init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let common = match &cli.command {
        Command::Once { common, .. } | Command::Live { common, .. } => common.clone(),
    };

    if common.list_sources {
        return print_sources();
    }

    let cancel = CancelFlag::new();
    #[cfg(unix)]
    cancel.register_signals()?;

    let source = match common.source {
        Some(source) => source,
        None => default_monitor_source(),
    };

    let engine_cfg = EngineConfig {
        model: common.model,
        language: common.language,
    };
    let mut engine = select_engine(common.engine, &engine_cfg)?;

    let stdout = io::stdout();
    match cli.command {
        Command::Once {
            duration,
            output,
            input,
            ..
        } => {
            let opts = OnceOpts {
                source,
                duration,
                input,
                timestamps: common.timestamps,
                output_path: output,
            };
            session::run_once(engine.as_mut(), &opts, &cancel, stdout.lock())
        }
        Command::Live {
            segment_seconds,
            output,
            keep_segments,
            ..
        } => {
            anyhow::ensure!(segment_seconds >= 1, "--segment-seconds must be at least 1");

            let recorder = Recorder::new()?;
            let opts = LiveOpts {
                source,
                segment_seconds,
                timestamps: common.timestamps,
                output_path: output,
                keep_segments,
            };
            let report = session::run_live(
                &recorder,
                engine.as_mut(),
                &opts,
                &LiveConfig::default(),
                &cancel,
                stdout.lock(),
            )?;

            if report.failed > 0 || report.dropped > 0 {
                eprintln!(
                    "warning: {} segment(s) failed, {} dropped",
                    report.failed, report.dropped
                );
            }
            Ok(())
        }
    }
}

fn print_sources() -> Result<()> {
    let sources = list_sources()?;
    if sources.is_empty() {
        anyhow::bail!("no PulseAudio sources found. Is PulseAudio/PipeWire running?");
    }

    println!("Available PulseAudio sources:");
    for source in sources {
        println!("  {}", source.name);
    }
    Ok(())
}
