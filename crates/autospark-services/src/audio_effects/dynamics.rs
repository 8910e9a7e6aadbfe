//! Peak-sensing dynamics: compressor and two-stage brickwall limiter

use std::f32::consts::TAU;

use autospark_core::AudioBuffer;
use fundsp::hacker::db_amp;

use super::{AudioEffect, EffectParam};

/// One-pole smoothing coefficient for a time constant in milliseconds
fn ballistics_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    if time_ms < 1e-3 {
        0.0
    } else {
        (-TAU * 1000.0 / (sample_rate * time_ms)).exp()
    }
}

/// Peak envelope follower with separate attack and release, state per channel
#[derive(Debug, Clone)]
struct Ballistics {
    attack: f32,
    release: f32,
    state: Vec<f32>,
}

impl Ballistics {
    fn new(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self {
            attack: ballistics_coeff(attack_ms, sample_rate),
            release: ballistics_coeff(release_ms, sample_rate),
            state: Vec::new(),
        }
    }

    fn ensure_channels(&mut self, count: usize) {
        if self.state.len() < count {
            self.state.resize(count, 0.0);
        }
    }

    fn follow(&mut self, channel: usize, input: f32) -> f32 {
        let level = input.abs();
        let prev = self.state[channel];
        let cte = if level > prev { self.attack } else { self.release };
        let env = level + cte * (prev - level);
        self.state[channel] = env;
        env
    }

    fn reset(&mut self) {
        self.state.clear();
    }
}

/// Downward compressor with hard knee
#[derive(Debug)]
pub struct CompressorEffect {
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    threshold: f32,
    ratio_exp: f32,
    envelope: Ballistics,
}

impl CompressorEffect {
    pub fn new(threshold_db: f32, ratio: f32, attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        let ratio = ratio.max(1.0);
        Self {
            threshold_db,
            ratio,
            attack_ms,
            release_ms,
            threshold: db_amp(threshold_db) as f32,
            ratio_exp: 1.0 / ratio - 1.0,
            envelope: Ballistics::new(attack_ms, release_ms, sample_rate),
        }
    }

    fn gain_for(&self, env: f32) -> f32 {
        if env < self.threshold {
            1.0
        } else {
            (env / self.threshold).powf(self.ratio_exp)
        }
    }
}

impl AudioEffect for CompressorEffect {
    fn name(&self) -> &str { "Compressor" }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        self.envelope.ensure_channels(buffer.num_channels());
        for (index, channel) in buffer.channels_mut().iter_mut().enumerate() {
            for sample in channel.iter_mut() {
                let env = self.envelope.follow(index, *sample);
                *sample *= self.gain_for(env);
            }
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("threshold", self.threshold_db, "dB"),
            EffectParam::new("ratio", self.ratio, ":1"),
            EffectParam::new("attack", self.attack_ms, "ms"),
            EffectParam::new("release", self.release_ms, "ms"),
        ]
    }

    fn reset(&mut self) {
        self.envelope.reset();
    }
}

/// Brickwall limiter: a gentle 4:1 stage at -10 dB with a fixed 200 ms release
/// feeding a near-infinite ratio stage at the threshold, then make-up gain and
/// a hard clip at ±1.
const FIRST_STAGE_RELEASE_MS: f32 = 200.0;

#[derive(Debug)]
pub struct LimiterEffect {
    threshold_db: f32,
    release_ms: f32,
    first: CompressorEffect,
    second: CompressorEffect,
    makeup: f32,
}

impl LimiterEffect {
    pub fn new(threshold_db: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self {
            threshold_db,
            release_ms,
            first: CompressorEffect::new(-10.0, 4.0, 2.0, FIRST_STAGE_RELEASE_MS, sample_rate),
            second: CompressorEffect::new(threshold_db, 1000.0, 0.001, release_ms, sample_rate),
            makeup: db_amp(-threshold_db) as f32,
        }
    }
}

impl AudioEffect for LimiterEffect {
    fn name(&self) -> &str { "Limiter" }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        self.first.process(buffer);
        self.second.process(buffer);
        let makeup = self.makeup;
        buffer.for_each_sample(|s| *s = (*s * makeup).clamp(-1.0, 1.0));
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("threshold", self.threshold_db, "dB"),
            EffectParam::new("release", self.release_ms, "ms"),
        ]
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
    }
}
