//! Schroeder/Moorer style algorithmic reverb (eight damped combs into four
//! allpasses per side)

use std::fmt;

use autospark_core::AudioBuffer;
use autospark_core::graph::ReverbParams;

use super::{AudioEffect, EffectParam};

const COMB_TUNINGS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNINGS: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;
const TUNING_RATE: f32 = 44100.0;

const WET_SCALE: f32 = 3.0;
const DRY_SCALE: f32 = 2.0;
const ROOM_SCALE: f32 = 0.28;
const ROOM_OFFSET: f32 = 0.7;
const DAMP_SCALE: f32 = 0.4;
const INPUT_GAIN: f32 = 0.015;

#[derive(Clone)]
struct Comb {
    buffer: Vec<f32>,
    index: usize,
    last: f32,
}

impl Comb {
    fn new(size: usize) -> Self {
        Self { buffer: vec![0.0; size.max(1)], index: 0, last: 0.0 }
    }

    fn process(&mut self, input: f32, damp: f32, feedback: f32) -> f32 {
        let output = self.buffer[self.index];
        self.last = output * (1.0 - damp) + self.last * damp;
        self.buffer[self.index] = input + self.last * feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }
}

#[derive(Clone)]
struct Allpass {
    buffer: Vec<f32>,
    index: usize,
}

impl Allpass {
    fn new(size: usize) -> Self {
        Self { buffer: vec![0.0; size.max(1)], index: 0 }
    }

    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        self.buffer[self.index] = input + buffered * 0.5;
        self.index = (self.index + 1) % self.buffer.len();
        buffered - input
    }
}

/// Comb and allpass bank for one output side
#[derive(Clone)]
struct Tank {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl Tank {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let scale = sample_rate / TUNING_RATE;
        let sized = |n: usize| ((n + spread) as f32 * scale) as usize;
        Self {
            combs: COMB_TUNINGS.iter().map(|&n| Comb::new(sized(n))).collect(),
            allpasses: ALLPASS_TUNINGS.iter().map(|&n| Allpass::new(sized(n))).collect(),
        }
    }

    fn process(&mut self, input: f32, damp: f32, feedback: f32) -> f32 {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input, damp, feedback);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }
}

pub struct ReverbEffect {
    params: ReverbParams,
    sample_rate: f32,
    gain: f32,
    damp: f32,
    feedback: f32,
    wet1: f32,
    wet2: f32,
    dry: f32,
    tanks: Vec<Tank>,
}

impl ReverbEffect {
    pub fn new(params: ReverbParams, sample_rate: f32) -> Self {
        let room_size = params.room_size.clamp(0.0, 1.0);
        let damping = params.damping.clamp(0.0, 1.0);
        let width = params.width.clamp(0.0, 1.0);
        let wet = params.wet_level * WET_SCALE;

        let (gain, damp, feedback) = if params.freeze {
            (0.0, 0.0, 1.0)
        } else {
            (INPUT_GAIN, damping * DAMP_SCALE, room_size * ROOM_SCALE + ROOM_OFFSET)
        };

        Self {
            params,
            sample_rate,
            gain,
            damp,
            feedback,
            wet1: 0.5 * wet * (1.0 + width),
            wet2: 0.5 * wet * (1.0 - width),
            dry: params.dry_level * DRY_SCALE,
            tanks: Vec::new(),
        }
    }

    fn ensure_channels(&mut self, count: usize) {
        while self.tanks.len() < count {
            let spread = if self.tanks.len() % 2 == 1 { STEREO_SPREAD } else { 0 };
            self.tanks.push(Tank::new(self.sample_rate, spread));
        }
    }

    fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        let (tank_l, rest) = self.tanks.split_at_mut(1);
        let (tank_l, tank_r) = (&mut tank_l[0], &mut rest[0]);

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let input = (*l + *r) * self.gain;
            let out_l = tank_l.process(input, self.damp, self.feedback);
            let out_r = tank_r.process(input, self.damp, self.feedback);
            let (dry_l, dry_r) = (*l, *r);
            *l = out_l * self.wet1 + out_r * self.wet2 + dry_l * self.dry;
            *r = out_r * self.wet1 + out_l * self.wet2 + dry_r * self.dry;
        }
    }

    fn process_mono(tank: &mut Tank, samples: &mut [f32], gain: f32, damp: f32, feedback: f32, wet: f32, dry: f32) {
        for s in samples.iter_mut() {
            let out = tank.process(*s * gain, damp, feedback);
            *s = out * wet + *s * dry;
        }
    }
}

impl fmt::Debug for ReverbEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReverbEffect")
            .field("params", &self.params)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl AudioEffect for ReverbEffect {
    fn name(&self) -> &str { "Reverb" }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let channels = buffer.num_channels();
        self.ensure_channels(channels);

        if channels == 2 {
            let (left, right) = buffer.channels_mut().split_at_mut(1);
            self.process_stereo(&mut left[0], &mut right[0]);
            return;
        }

        // Mono, or more channels than a stereo pair: each side runs on its own
        let (gain, damp, feedback, wet, dry) = (self.gain, self.damp, self.feedback, self.wet1, self.dry);
        for (tank, channel) in self.tanks.iter_mut().zip(buffer.channels_mut()) {
            Self::process_mono(tank, channel, gain, damp, feedback, wet, dry);
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("room_size", self.params.room_size, ""),
            EffectParam::new("damping", self.params.damping, ""),
            EffectParam::new("wet_level", self.params.wet_level, ""),
            EffectParam::new("dry_level", self.params.dry_level, ""),
            EffectParam::new("width", self.params.width, ""),
            EffectParam::new("freeze", if self.params.freeze { 1.0 } else { 0.0 }, ""),
        ]
    }

    fn reset(&mut self) {
        self.tanks.clear();
    }
}
