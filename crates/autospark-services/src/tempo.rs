//! Tempo estimation for a single track

use thiserror::Error;
use tracing::debug;

const PEAK_RATIO: f32 = 0.8;

#[derive(Debug, Error)]
pub enum TempoError {
    #[error("Signal too short to estimate tempo ({frames} frames)")]
    TooShort { frames: usize },
    #[error("No periodicity found in signal")]
    NoPulse,
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    #[error("Invalid estimator settings: hop {hop}, tempo range {min_bpm}..{max_bpm} BPM")]
    InvalidSettings { hop: usize, min_bpm: f64, max_bpm: f64 },
}

/// Anything that can turn mono samples into a BPM figure
pub trait TempoEstimator: Send {
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<f64, TempoError>;
}

/// Returns a tempo known ahead of time
#[derive(Debug, Clone, Copy)]
pub struct FixedTempo(pub f64);

impl TempoEstimator for FixedTempo {
    fn estimate(&self, _samples: &[f32], _sample_rate: u32) -> Result<f64, TempoError> {
        Ok(self.0)
    }
}

/// Autocorrelation of a half-wave rectified energy-flux onset envelope
#[derive(Debug, Clone)]
pub struct OnsetTempoEstimator {
    hop: usize,
    min_bpm: f64,
    max_bpm: f64,
}

impl Default for OnsetTempoEstimator {
    fn default() -> Self {
        Self { hop: 512, min_bpm: 60.0, max_bpm: 200.0 }
    }
}

impl OnsetTempoEstimator {
    /// Hop must be non-zero and `min_bpm` must sit strictly below `max_bpm`
    pub fn new(hop: usize, min_bpm: f64, max_bpm: f64) -> Result<Self, TempoError> {
        let valid = hop > 0 && min_bpm.is_finite() && max_bpm.is_finite() && min_bpm > 0.0 && min_bpm < max_bpm;
        if !valid {
            return Err(TempoError::InvalidSettings { hop, min_bpm, max_bpm });
        }
        Ok(Self { hop, min_bpm, max_bpm })
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn bpm_range(&self) -> (f64, f64) {
        (self.min_bpm, self.max_bpm)
    }

    /// Positive frame-to-frame energy increase per hop
    fn onset_envelope(&self, samples: &[f32]) -> Vec<f32> {
        let energies: Vec<f32> = samples
            .chunks(self.hop)
            .map(|frame| frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32)
            .collect();

        let mut envelope: Vec<f32> = energies
            .windows(2)
            .map(|w| (w[1] - w[0]).max(0.0))
            .collect();

        let mean = envelope.iter().sum::<f32>() / envelope.len().max(1) as f32;
        envelope.iter_mut().for_each(|v| *v -= mean);
        envelope
    }
}

impl TempoEstimator for OnsetTempoEstimator {
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<f64, TempoError> {
        if sample_rate == 0 {
            return Err(TempoError::InvalidSampleRate(sample_rate));
        }

        let frame_rate = sample_rate as f64 / self.hop as f64;
        let min_lag = (frame_rate * 60.0 / self.max_bpm).floor().max(1.0) as usize;
        let max_lag = (frame_rate * 60.0 / self.min_bpm).ceil() as usize;

        let envelope = self.onset_envelope(samples);
        if envelope.len() <= max_lag * 2 {
            return Err(TempoError::TooShort { frames: samples.len() });
        }

        let corr = |lag: usize| -> f32 {
            envelope.iter().zip(&envelope[lag..]).map(|(a, b)| a * b).sum::<f32>()
                / (envelope.len() - lag) as f32
        };
        let scores: Vec<f32> = (min_lag..=max_lag + 1).map(corr).collect();
        let peak = scores[..scores.len() - 1].iter().copied().fold(0.0f32, f32::max);
        if peak <= 0.0 {
            return Err(TempoError::NoPulse);
        }

        // First local maximum close to the global peak, so a strong beat is
        // not mistaken for its half-tempo multiple
        let idx = (0..scores.len() - 1)
            .find(|&i| {
                let left = if i == 0 { f32::MIN } else { scores[i - 1] };
                scores[i] >= PEAK_RATIO * peak && scores[i] >= left && scores[i] >= scores[i + 1]
            })
            .ok_or(TempoError::NoPulse)?;
        let lag = min_lag + idx;

        // Parabolic interpolation around the chosen lag
        let refined = if idx > 0 {
            let (a, b, c) = (scores[idx - 1], scores[idx], scores[idx + 1]);
            let denom = a - 2.0 * b + c;
            if denom.abs() > f32::EPSILON {
                lag as f64 + 0.5 * (a - c) as f64 / denom as f64
            } else {
                lag as f64
            }
        } else {
            lag as f64
        };

        let bpm = 60.0 * frame_rate / refined;
        debug!(lag, bpm, "Estimated tempo");
        Ok(bpm)
    }
}
