//! WAV file loading, resampling and export

use std::fs;
use std::path::{Path, PathBuf};

use autospark_core::AudioBuffer;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum AudioIoError {
    #[error("Unreadable audio file {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("Failed to write {path}: {reason}")]
    Unwritable { path: PathBuf, reason: String },
    #[error("Unsupported output bit depth: {0}")]
    UnsupportedBitDepth(u16),
    #[error("Resample error: {0}")]
    Resample(String),
}

impl AudioIoError {
    fn unreadable(path: &Path, reason: impl ToString) -> Self {
        Self::Unreadable { path: path.to_path_buf(), reason: reason.to_string() }
    }

    fn unwritable(path: &Path, reason: impl ToString) -> Self {
        Self::Unwritable { path: path.to_path_buf(), reason: reason.to_string() }
    }
}

/// Read a WAV file at its native sample rate into planar f32 channels
pub fn load_wav(path: &Path) -> Result<AudioBuffer, AudioIoError> {
    let reader = hound::WavReader::open(path).map_err(|e| AudioIoError::unreadable(path, e))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    let raw_samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioIoError::unreadable(path, e))?,
        hound::SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()
                .map_err(|e| AudioIoError::unreadable(path, e))?
        }
    };

    let buffer = AudioBuffer::from_interleaved(&raw_samples, channels, spec.sample_rate)
        .map_err(|e| AudioIoError::unreadable(path, e))?;

    info!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels,
        bits = spec.bits_per_sample,
        frames = buffer.frames(),
        "Loaded audio"
    );
    Ok(buffer)
}

/// Read a WAV file and convert it to `target_rate`
pub fn load_resampled(path: &Path, target_rate: u32) -> Result<AudioBuffer, AudioIoError> {
    let buffer = load_wav(path)?;
    resample(&buffer, target_rate)
}

/// Band-limited sample-rate conversion. Output length is the input duration
/// at the new rate.
pub fn resample(buffer: &AudioBuffer, to_rate: u32) -> Result<AudioBuffer, AudioIoError> {
    let from_rate = buffer.sample_rate();
    if from_rate == to_rate {
        return Ok(buffer.clone());
    }
    if buffer.frames() == 0 || buffer.num_channels() == 0 {
        return Ok(AudioBuffer::silence(buffer.num_channels(), 0, to_rate));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, buffer.frames(), buffer.num_channels())
        .map_err(|e| AudioIoError::Resample(format!("init: {e}")))?;

    let mut output = resampler
        .process(buffer.channels(), None)
        .map_err(|e| AudioIoError::Resample(e.to_string()))?;
    // Flush what is still held in the sinc window
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| AudioIoError::Resample(e.to_string()))?;
    for (out, rest) in output.iter_mut().zip(tail) {
        out.extend(rest);
    }

    let delay = resampler.output_delay();
    let expected = (buffer.frames() as f64 * ratio).round() as usize;
    for channel in &mut output {
        channel.drain(..delay.min(channel.len()));
        channel.resize(expected, 0.0);
    }

    debug!(from_rate, to_rate, frames = expected, "Resampled");
    AudioBuffer::new(output, to_rate).map_err(|e| AudioIoError::Resample(e.to_string()))
}

/// Write interleaved integer PCM. Samples are clamped to ±1 first.
pub fn write_wav(path: &Path, buffer: &AudioBuffer, bit_depth: u16) -> Result<(), AudioIoError> {
    if !matches!(bit_depth, 16 | 24 | 32) {
        return Err(AudioIoError::UnsupportedBitDepth(bit_depth));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AudioIoError::unwritable(path, e))?;
    }

    let spec = hound::WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: bit_depth,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| AudioIoError::unwritable(path, e))?;

    let full_scale = ((1_i64 << (bit_depth - 1)) - 1) as f64;
    for sample in buffer.interleaved() {
        let quantized = (sample.clamp(-1.0, 1.0) as f64 * full_scale).round() as i32;
        writer
            .write_sample(quantized)
            .map_err(|e| AudioIoError::unwritable(path, e))?;
    }

    writer.finalize().map_err(|e| AudioIoError::unwritable(path, e))?;
    info!(
        path = %path.display(),
        sample_rate = buffer.sample_rate(),
        channels = buffer.num_channels(),
        bits = bit_depth,
        frames = buffer.frames(),
        "Wrote audio"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, frames: usize) -> AudioBuffer {
        let samples = (0..frames)
            .map(|i| 0.5 * (std::f32::consts::TAU * freq * i as f32 / rate as f32).sin())
            .collect();
        AudioBuffer::mono(samples, rate)
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = load_wav(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, AudioIoError::Unreadable { .. }));
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let buf = sine(440.0, 44100, 256);
        assert_eq!(resample(&buf, 44100).unwrap(), buf);
    }

    #[test]
    fn test_resample_preserves_duration() {
        let buf = sine(440.0, 48000, 48000);
        let out = resample(&buf, 44100).unwrap();
        assert_eq!(out.sample_rate(), 44100);
        assert_eq!(out.frames(), 44100);
        assert!((out.rms() - buf.rms()).abs() < 0.02, "rms {} vs {}", out.rms(), buf.rms());
    }

    #[test]
    fn test_resample_empty() {
        let buf = AudioBuffer::silence(2, 0, 22050);
        let out = resample(&buf, 44100).unwrap();
        assert_eq!(out.frames(), 0);
        assert_eq!(out.num_channels(), 2);
    }

    #[test]
    fn test_rejects_odd_bit_depth() {
        let dir = std::env::temp_dir();
        let err = write_wav(&dir.join("never.wav"), &sine(1.0, 8000, 8), 12).unwrap_err();
        assert!(matches!(err, AudioIoError::UnsupportedBitDepth(12)));
    }
}
