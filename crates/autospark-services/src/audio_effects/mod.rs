//! Effect processors and the series/parallel containers that host them

mod dynamics;
mod native;
mod reverb;

pub use dynamics::{CompressorEffect, LimiterEffect};
pub use native::{DelayEffect, FilterEffect, GainEffect, InvertEffect};
pub use reverb::ReverbEffect;

use std::fmt::Debug;

use autospark_core::{AudioBuffer, EffectNode};

/// Audio effect that processes a whole buffer in place.
///
/// Implementations keep per-channel state and never change the number of
/// frames in the buffer.
pub trait AudioEffect: Send + Debug {
    fn name(&self) -> &str;
    fn process(&mut self, buffer: &mut AudioBuffer);
    fn get_params(&self) -> Vec<EffectParam>;
    /// Clear internal state (delay lines, envelopes, filter memory)
    fn reset(&mut self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectParam {
    pub name: String,
    pub value: f32,
    pub unit: String,
}

impl EffectParam {
    pub fn new(name: &str, value: f32, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            unit: unit.to_string(),
        }
    }
}

/// Chain of audio effects processed in order
#[derive(Debug, Default)]
pub struct EffectChain {
    effects: Vec<Box<dyn AudioEffect>>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Box<dyn AudioEffect>) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Box<dyn AudioEffect>] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

impl AudioEffect for EffectChain {
    fn name(&self) -> &str { "Series" }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        for effect in &mut self.effects {
            effect.process(buffer);
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        Vec::new()
    }

    fn reset(&mut self) {
        for effect in &mut self.effects {
            effect.reset();
        }
    }
}

/// Parallel branches fed copies of the same input, outputs summed.
///
/// No gain compensation is applied; branch levels are staged by the
/// branches themselves.
#[derive(Debug, Default)]
pub struct MixBus {
    branches: Vec<Box<dyn AudioEffect>>,
}

impl MixBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, branch: Box<dyn AudioEffect>) {
        self.branches.push(branch);
    }

    pub fn branches(&self) -> &[Box<dyn AudioEffect>] {
        &self.branches
    }
}

impl AudioEffect for MixBus {
    fn name(&self) -> &str { "Mix" }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let mut sum = AudioBuffer::silence(buffer.num_channels(), buffer.frames(), buffer.sample_rate());

        for branch in &mut self.branches {
            let mut copy = buffer.clone();
            branch.process(&mut copy);
            for (dst, src) in sum.channels_mut().iter_mut().zip(copy.channels()) {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d += *s;
                }
            }
        }

        *buffer = sum;
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![EffectParam::new("branches", self.branches.len() as f32, "")]
    }

    fn reset(&mut self) {
        for branch in &mut self.branches {
            branch.reset();
        }
    }
}

/// Instantiate processors for an effect-graph description
pub fn build_effect(node: &EffectNode, sample_rate: f32) -> Box<dyn AudioEffect> {
    match node {
        EffectNode::Gain { db } => Box::new(GainEffect::new(*db)),
        EffectNode::Invert => Box::new(InvertEffect::new()),
        EffectNode::HighPass { freq_hz } => Box::new(FilterEffect::high_pass(*freq_hz, sample_rate)),
        EffectNode::LowPass { freq_hz, gain_db, q } => {
            Box::new(FilterEffect::low_pass(*freq_hz, *gain_db, *q, sample_rate))
        }
        EffectNode::LowShelf { freq_hz, gain_db, q } => {
            Box::new(FilterEffect::low_shelf(*freq_hz, *gain_db, *q, sample_rate))
        }
        EffectNode::HighShelf { freq_hz, gain_db, q } => {
            Box::new(FilterEffect::high_shelf(*freq_hz, *gain_db, *q, sample_rate))
        }
        EffectNode::Peak { freq_hz, gain_db, q } => {
            Box::new(FilterEffect::peak(*freq_hz, *gain_db, *q, sample_rate))
        }
        EffectNode::Delay { seconds, feedback, mix } => {
            Box::new(DelayEffect::new(*seconds, *feedback, *mix, sample_rate))
        }
        EffectNode::Reverb(params) => Box::new(ReverbEffect::new(*params, sample_rate)),
        EffectNode::Compressor { threshold_db, ratio, attack_ms, release_ms } => Box::new(
            CompressorEffect::new(*threshold_db, *ratio, *attack_ms, *release_ms, sample_rate),
        ),
        EffectNode::Limiter { threshold_db, release_ms } => {
            Box::new(LimiterEffect::new(*threshold_db, *release_ms, sample_rate))
        }
        EffectNode::Series(children) => {
            let mut chain = EffectChain::new();
            for child in children {
                chain.add(build_effect(child, sample_rate));
            }
            Box::new(chain)
        }
        EffectNode::Mix(branches) => {
            let mut bus = MixBus::new();
            for branch in branches {
                bus.add(build_effect(branch, sample_rate));
            }
            Box::new(bus)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44100.0;

    fn ramp(frames: usize) -> AudioBuffer {
        AudioBuffer::mono((0..frames).map(|i| i as f32 / frames as f32).collect(), SR as u32)
    }

    #[test]
    fn test_series_applies_in_order() {
        let node = EffectNode::Series(vec![EffectNode::gain(-6.0), EffectNode::Invert]);
        let mut fx = build_effect(&node, SR);
        let mut buf = AudioBuffer::mono(vec![1.0; 4], SR as u32);
        fx.process(&mut buf);
        let expected = -(10f32.powf(-6.0 / 20.0));
        for &s in buf.channel(0).unwrap() {
            assert!((s - expected).abs() < 1e-4, "got {s}, want {expected}");
        }
    }

    #[test]
    fn test_mix_sums_branches_without_compensation() {
        let node = EffectNode::Mix(vec![EffectNode::gain(0.0), EffectNode::gain(0.0)]);
        let mut fx = build_effect(&node, SR);
        let input = ramp(64);
        let mut buf = input.clone();
        fx.process(&mut buf);
        for (out, inp) in buf.channel(0).unwrap().iter().zip(input.channel(0).unwrap()) {
            assert!((out - 2.0 * inp).abs() < 1e-6);
        }
    }

    #[test]
    fn test_mix_with_inverted_branch_cancels() {
        let node = EffectNode::Mix(vec![
            EffectNode::gain(0.0),
            EffectNode::Series(vec![EffectNode::Invert]),
        ]);
        let mut fx = build_effect(&node, SR);
        let mut buf = ramp(128);
        fx.process(&mut buf);
        assert!(buf.peak() < 1e-7);
    }

    #[test]
    fn test_mix_branches_do_not_share_state() {
        // A delayed branch must see the unprocessed input, not the output of
        // the branch processed before it.
        let node = EffectNode::Mix(vec![
            EffectNode::gain(-120.0),
            EffectNode::delay(2.0 / SR, 0.0, 1.0),
        ]);
        let mut fx = build_effect(&node, SR);
        let mut buf = AudioBuffer::mono(vec![1.0, 0.0, 0.0, 0.0], SR as u32);
        fx.process(&mut buf);
        let out = buf.channel(0).unwrap();
        assert!((out[2] - 1.0).abs() < 1e-4, "delayed impulse missing: {out:?}");
    }

    #[test]
    fn test_build_series_root_is_chain() {
        let node = EffectNode::Series(vec![
            EffectNode::gain(0.0),
            EffectNode::Mix(vec![EffectNode::gain(0.0), EffectNode::Invert]),
        ]);
        let fx = build_effect(&node, SR);
        assert_eq!(fx.name(), "Series");
    }

    #[test]
    fn test_effects_preserve_length_and_channels() {
        let nodes = [
            EffectNode::gain(3.0),
            EffectNode::high_pass(230.0),
            EffectNode::LowPass { freq_hz: 5000.0, gain_db: 0.0, q: 0.707 },
            EffectNode::LowShelf { freq_hz: 200.0, gain_db: 3.0, q: 0.7 },
            EffectNode::high_shelf(20000.0, -2.0, 1.8),
            EffectNode::peak(1400.0, 3.0, 1.15),
            EffectNode::delay(0.01, 0.3, 1.0),
            EffectNode::Reverb(autospark_core::graph::ReverbParams::wet(0.45, 0.55)),
            EffectNode::compressor(-18.0, 2.5, 19.0, 300.0),
            EffectNode::limiter(-3.0, 500.0),
            EffectNode::Invert,
        ];
        for node in &nodes {
            let mut fx = build_effect(node, SR);
            let mut buf = ramp(2048).tile(2).unwrap();
            fx.process(&mut buf);
            assert_eq!(buf.frames(), 2048, "{} changed length", node.name());
            assert_eq!(buf.num_channels(), 2, "{} changed channels", node.name());
            assert!(buf.is_finite(), "{} produced non-finite output", node.name());
        }
    }
}
