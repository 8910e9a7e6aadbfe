//! Planar multichannel sample buffer

use crate::error::{MixError, Result};

/// Fixed-rate audio held as one `Vec<f32>` per channel.
///
/// Every channel always has the same number of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build from planar channel data. Channels must be equally long.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if let Some(first) = channels.first() {
            let expected = first.len();
            if let Some(bad) = channels.iter().find(|ch| ch.len() != expected) {
                return Err(MixError::BufferLengthMismatch { expected, actual: bad.len() });
            }
        }
        Ok(Self { channels, sample_rate })
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { channels: vec![samples], sample_rate }
    }

    pub fn silence(num_channels: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; num_channels],
            sample_rate,
        }
    }

    /// De-interleave `[l, r, l, r, ...]` style data
    pub fn from_interleaved(samples: &[f32], num_channels: usize, sample_rate: u32) -> Result<Self> {
        if num_channels == 0 {
            return Err(MixError::UnsupportedChannelLayout(0));
        }
        let frames = samples.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in samples.chunks_exact(num_channels) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Ok(Self { channels, sample_rate })
    }

    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.frames() * self.num_channels());
        for i in 0..self.frames() {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    /// Apply `f` to every sample of every channel
    pub fn for_each_sample(&mut self, mut f: impl FnMut(&mut f32)) {
        for ch in &mut self.channels {
            ch.iter_mut().for_each(&mut f);
        }
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> Self {
        let n = self.num_channels();
        if n <= 1 {
            return self.clone();
        }
        let samples = (0..self.frames())
            .map(|i| self.channels.iter().map(|ch| ch[i]).sum::<f32>() / n as f32)
            .collect();
        Self::mono(samples, self.sample_rate)
    }

    /// Repeat a mono signal onto `num_channels` identical channels
    pub fn tile(&self, num_channels: usize) -> Result<Self> {
        if self.num_channels() != 1 {
            return Err(MixError::UnsupportedChannelLayout(self.num_channels()));
        }
        Ok(Self {
            channels: vec![self.channels[0].clone(); num_channels],
            sample_rate: self.sample_rate,
        })
    }

    /// Drop every frame past `frames`
    pub fn truncate(&mut self, frames: usize) {
        for ch in &mut self.channels {
            ch.truncate(frames);
        }
    }

    /// Sample-wise sum of `other` into `self`. Shapes must match exactly.
    pub fn mix_in(&mut self, other: &AudioBuffer) -> Result<()> {
        if other.frames() != self.frames() {
            return Err(MixError::BufferLengthMismatch {
                expected: self.frames(),
                actual: other.frames(),
            });
        }
        if other.num_channels() != self.num_channels() {
            return Err(MixError::UnsupportedChannelLayout(other.num_channels()));
        }
        if other.sample_rate != self.sample_rate {
            return Err(MixError::SampleRateMismatch {
                expected: self.sample_rate,
                actual: other.sample_rate,
            });
        }
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += *s;
            }
        }
        Ok(())
    }

    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    pub fn rms(&self) -> f32 {
        let count = self.frames() * self.num_channels();
        if count == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .channels
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&x| (x as f64) * (x as f64))
            .sum();
        (sum / count as f64).sqrt() as f32
    }

    pub fn is_finite(&self) -> bool {
        self.channels.iter().all(|ch| ch.iter().all(|s| s.is_finite()))
    }
}
