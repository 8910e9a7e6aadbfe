//! Native gain, polarity, filter and delay effects using fundsp

use std::fmt;

use autospark_core::AudioBuffer;
use fundsp::hacker::*;

use super::{AudioEffect, EffectParam};

/// Simple gain/volume control
#[derive(Debug)]
pub struct GainEffect {
    gain_db: f32,
    gain_linear: f32,
}

impl GainEffect {
    pub fn new(gain_db: f32) -> Self {
        Self {
            gain_db,
            gain_linear: db_amp(gain_db) as f32,
        }
    }
}

impl AudioEffect for GainEffect {
    fn name(&self) -> &str { "Gain" }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let gain = self.gain_linear;
        buffer.for_each_sample(|s| *s *= gain);
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![EffectParam::new("gain", self.gain_db, "dB")]
    }
}

/// Polarity flip
#[derive(Debug, Default)]
pub struct InvertEffect;

impl InvertEffect {
    pub fn new() -> Self {
        Self
    }
}

impl AudioEffect for InvertEffect {
    fn name(&self) -> &str { "Invert" }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        buffer.for_each_sample(|s| *s = -*s);
    }

    fn get_params(&self) -> Vec<EffectParam> {
        Vec::new()
    }
}

/// The filter responses the mix graph can ask for
#[derive(Clone)]
enum FilterState {
    /// First order, 6 dB per octave
    HighPass(An<Highpole<f64, U1>>),
    LowPass(An<FixedSvf<f64, LowpassMode<f64>>>, f32),
    Bell(An<FixedSvf<f64, BellMode<f64>>>),
    HighShelf(An<FixedSvf<f64, HighshelfMode<f64>>>),
    LowShelf(An<FixedSvf<f64, LowshelfMode<f64>>>),
}

impl FilterState {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        match self {
            FilterState::HighPass(f) => f.set_sample_rate(sample_rate),
            FilterState::LowPass(f, _) => f.set_sample_rate(sample_rate),
            FilterState::Bell(f) => f.set_sample_rate(sample_rate),
            FilterState::HighShelf(f) => f.set_sample_rate(sample_rate),
            FilterState::LowShelf(f) => f.set_sample_rate(sample_rate),
        }
    }

    fn tick(&mut self, sample: f32) -> f32 {
        let input = Frame::from([sample]);
        match self {
            FilterState::HighPass(f) => f.tick(&input)[0],
            FilterState::LowPass(f, gain) => f.tick(&input)[0] * *gain,
            FilterState::Bell(f) => f.tick(&input)[0],
            FilterState::HighShelf(f) => f.tick(&input)[0],
            FilterState::LowShelf(f) => f.tick(&input)[0],
        }
    }
}

/// Filter with one independent state per channel
pub struct FilterEffect {
    name: &'static str,
    params: Vec<EffectParam>,
    prototype: FilterState,
    channels: Vec<FilterState>,
}

/// Keep cutoffs below Nyquist so the filters stay stable at low sample rates
fn clamp_hz(freq_hz: f32, sample_rate: f32) -> f32 {
    freq_hz.clamp(1.0, sample_rate * 0.49)
}

fn eq_params(freq_hz: f32, gain_db: f32, q: f32) -> Vec<EffectParam> {
    vec![
        EffectParam::new("frequency", freq_hz, "Hz"),
        EffectParam::new("gain", gain_db, "dB"),
        EffectParam::new("q", q, ""),
    ]
}

impl FilterEffect {
    fn with_filter(name: &'static str, params: Vec<EffectParam>, mut filter: FilterState, sample_rate: f32) -> Self {
        filter.set_sample_rate(sample_rate as f64);
        Self {
            name,
            params,
            prototype: filter,
            channels: Vec::new(),
        }
    }

    pub fn high_pass(cutoff_hz: f32, sample_rate: f32) -> Self {
        let filter = FilterState::HighPass(highpole_hz(clamp_hz(cutoff_hz, sample_rate)));
        let params = vec![EffectParam::new("cutoff", cutoff_hz, "Hz")];
        Self::with_filter("High Pass", params, filter, sample_rate)
    }

    /// Resonant low pass; `gain_db` scales the passband
    pub fn low_pass(freq_hz: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let svf = lowpass_hz(clamp_hz(freq_hz, sample_rate), q);
        let filter = FilterState::LowPass(svf, db_amp(gain_db) as f32);
        Self::with_filter("Low Pass", eq_params(freq_hz, gain_db, q), filter, sample_rate)
    }

    pub fn peak(freq_hz: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let filter = FilterState::Bell(bell_hz(clamp_hz(freq_hz, sample_rate), q, db_amp(gain_db) as f32));
        Self::with_filter("Peak", eq_params(freq_hz, gain_db, q), filter, sample_rate)
    }

    pub fn high_shelf(freq_hz: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let filter = FilterState::HighShelf(highshelf_hz(clamp_hz(freq_hz, sample_rate), q, db_amp(gain_db) as f32));
        Self::with_filter("High Shelf", eq_params(freq_hz, gain_db, q), filter, sample_rate)
    }

    pub fn low_shelf(freq_hz: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let filter = FilterState::LowShelf(lowshelf_hz(clamp_hz(freq_hz, sample_rate), q, db_amp(gain_db) as f32));
        Self::with_filter("Low Shelf", eq_params(freq_hz, gain_db, q), filter, sample_rate)
    }

    fn ensure_channels(&mut self, count: usize) {
        while self.channels.len() < count {
            self.channels.push(self.prototype.clone());
        }
    }
}

impl fmt::Debug for FilterEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterEffect")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("channels", &self.channels.len())
            .finish()
    }
}

impl AudioEffect for FilterEffect {
    fn name(&self) -> &str { self.name }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        self.ensure_channels(buffer.num_channels());
        for (filter, channel) in self.channels.iter_mut().zip(buffer.channels_mut()) {
            for sample in channel.iter_mut() {
                *sample = filter.tick(*sample);
            }
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        self.params.clone()
    }

    fn reset(&mut self) {
        self.channels.clear();
    }
}

/// Delay line with feedback and wet/dry mix, one line per channel
pub struct DelayEffect {
    delay_secs: f32,
    feedback: f32,
    mix: f32,
    delay_samples: usize,
    lines: Vec<Vec<f32>>,
    write_pos: Vec<usize>,
}

impl DelayEffect {
    pub fn new(delay_secs: f32, feedback: f32, mix: f32, sample_rate: f32) -> Self {
        let delay_secs = delay_secs.max(0.0);
        Self {
            delay_secs,
            feedback: feedback.clamp(0.0, 1.0),
            mix: mix.clamp(0.0, 1.0),
            delay_samples: (delay_secs * sample_rate).round() as usize,
            lines: Vec::new(),
            write_pos: Vec::new(),
        }
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    fn ensure_channels(&mut self, count: usize) {
        while self.lines.len() < count {
            self.lines.push(vec![0.0; self.delay_samples]);
            self.write_pos.push(0);
        }
    }
}

impl fmt::Debug for DelayEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayEffect")
            .field("delay_secs", &self.delay_secs)
            .field("feedback", &self.feedback)
            .field("mix", &self.mix)
            .field("delay_samples", &self.delay_samples)
            .finish()
    }
}

impl AudioEffect for DelayEffect {
    fn name(&self) -> &str { "Delay" }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        // A zero-length line passes audio straight through
        if self.delay_samples == 0 {
            return;
        }
        self.ensure_channels(buffer.num_channels());

        let len = self.delay_samples;
        for ((line, pos), channel) in self
            .lines
            .iter_mut()
            .zip(self.write_pos.iter_mut())
            .zip(buffer.channels_mut())
        {
            for sample in channel.iter_mut() {
                let delayed = line[*pos];
                line[*pos] = *sample + delayed * self.feedback;
                *pos = (*pos + 1) % len;
                *sample = *sample * (1.0 - self.mix) + delayed * self.mix;
            }
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("delay", self.delay_secs * 1000.0, "ms"),
            EffectParam::new("feedback", self.feedback, ""),
            EffectParam::new("mix", self.mix, ""),
        ]
    }

    fn reset(&mut self) {
        self.lines.clear();
        self.write_pos.clear();
    }
}
