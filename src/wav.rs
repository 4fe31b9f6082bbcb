use std::io::{Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use hound::WavReader;

use crate::recorder::{TARGET_CHANNELS, TARGET_SAMPLE_RATE};

/// Load a recorded WAV segment and return normalized mono samples.
///
/// Format requirements:
/// - Mono (1 channel)
/// - 16 kHz
///
/// The recorder always produces this format; enforcing it here keeps the engines
/// simple and turns a mis-wired invocation into a clear error.
pub fn samples_from_wav(path: &Path) -> Result<Vec<f32>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open audio file {}", path.display()))?;
    samples_from_wav_reader(std::io::BufReader::new(file))
        .with_context(|| format!("failed to decode {}", path.display()))
}

/// Reader-based variant of [`samples_from_wav`].
pub fn samples_from_wav_reader<R>(reader: R) -> Result<Vec<f32>>
where
    R: Read + Seek,
{
    let mut reader = WavReader::new(reader).context("failed to read WAV data")?;
    let spec = reader.spec();

    if spec.channels != TARGET_CHANNELS {
        anyhow::bail!(
            "expected mono WAV ({TARGET_CHANNELS} channel), got {} channels",
            spec.channels
        );
    }

    if spec.sample_rate != TARGET_SAMPLE_RATE {
        anyhow::bail!(
            "expected {TARGET_SAMPLE_RATE} Hz sample rate, got {} Hz",
            spec.sample_rate
        );
    }

    // Normalize i16 PCM to f32 in [-1.0, 1.0], the format whisper expects.
    let mut samples = Vec::new();
    for sample in reader.samples::<i16>() {
        let pcm = sample?;
        samples.push(pcm as f32 / i16::MAX as f32);
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::io::Cursor;

    fn wav_bytes(channels: u16, sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn reads_and_normalizes_mono_16k() -> Result<()> {
        let bytes = wav_bytes(1, 16_000, &[0, i16::MAX, i16::MIN + 1]);
        let samples = samples_from_wav_reader(Cursor::new(bytes))?;
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 1.0).abs() < 1e-6);
        assert!((samples[2] + 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn rejects_stereo() {
        let bytes = wav_bytes(2, 16_000, &[0, 0]);
        let err = samples_from_wav_reader(Cursor::new(bytes)).unwrap_err();
        assert!(err.to_string().contains("mono"));
    }

    #[test]
    fn rejects_wrong_sample_rate() {
        let bytes = wav_bytes(1, 44_100, &[0]);
        let err = samples_from_wav_reader(Cursor::new(bytes)).unwrap_err();
        assert!(err.to_string().contains("44100"));
    }
}
