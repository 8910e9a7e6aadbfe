//! Runs the four chains of a mix graph against vocal and instrument stems

use std::fmt;
use std::path::Path;

use autospark_core::{AudioBuffer, MixError, MixGraph};
use tracing::{debug, info};

use crate::audio_effects::build_effect;
use crate::audio_io::{self, AudioIoError};

/// Output channel count of the final mix
const OUTPUT_CHANNELS: usize = 2;

/// Progress of one render. Stages only ever advance in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RenderStage {
    Loaded,
    VocalProcessed,
    Stereoized,
    ReverbApplied,
    InstrumentProcessed,
    Combined,
    Mastered,
    Written,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStage::Loaded => "loaded",
            RenderStage::VocalProcessed => "vocal processed",
            RenderStage::Stereoized => "stereoized",
            RenderStage::ReverbApplied => "reverb applied",
            RenderStage::InstrumentProcessed => "instrument processed",
            RenderStage::Combined => "combined",
            RenderStage::Mastered => "mastered",
            RenderStage::Written => "written",
        };
        f.write_str(name)
    }
}

/// Single-use renderer for one graph at one working sample rate
pub struct Renderer {
    graph: MixGraph,
    sample_rate: u32,
    stage: Option<RenderStage>,
}

impl Renderer {
    pub fn new(graph: MixGraph, sample_rate: u32) -> Self {
        Self { graph, sample_rate, stage: None }
    }

    /// Last stage reached, `None` before any input was accepted
    pub fn stage(&self) -> Option<RenderStage> {
        self.stage
    }

    pub fn graph(&self) -> &MixGraph {
        &self.graph
    }

    fn advance(&mut self, stage: RenderStage, frames: usize) {
        debug!(%stage, frames, "Render stage");
        self.stage = Some(stage);
    }

    fn check_input(&self, buffer: &AudioBuffer) -> Result<(), MixError> {
        if buffer.sample_rate() != self.sample_rate {
            return Err(MixError::SampleRateMismatch {
                expected: self.sample_rate,
                actual: buffer.sample_rate(),
            });
        }
        match buffer.num_channels() {
            1 | 2 => Ok(()),
            n => Err(MixError::UnsupportedChannelLayout(n)),
        }
    }

    /// Render both stems down to the mastered stereo mix.
    ///
    /// The result is as long as the shorter of the two stems; any reverb
    /// tail beyond that is dropped.
    pub fn render(&mut self, vocal: AudioBuffer, instrument: AudioBuffer) -> Result<AudioBuffer, MixError> {
        self.check_input(&vocal)?;
        self.check_input(&instrument)?;
        self.advance(RenderStage::Loaded, vocal.frames());

        let sr = self.sample_rate as f32;

        let mut dry = vocal.to_mono();
        build_effect(&self.graph.vocal, sr).process(&mut dry);
        self.advance(RenderStage::VocalProcessed, dry.frames());

        let mut dry = dry.tile(OUTPUT_CHANNELS)?;
        self.advance(RenderStage::Stereoized, dry.frames());

        let mut wet = dry.clone();
        build_effect(&self.graph.reverb_send, sr).process(&mut wet);
        self.advance(RenderStage::ReverbApplied, wet.frames());

        let mut inst = if instrument.num_channels() == 1 {
            instrument.tile(OUTPUT_CHANNELS)?
        } else {
            instrument
        };
        build_effect(&self.graph.instrument, sr).process(&mut inst);
        self.advance(RenderStage::InstrumentProcessed, inst.frames());

        let final_len = dry.frames().min(inst.frames());
        dry.truncate(final_len);
        wet.truncate(final_len);
        inst.truncate(final_len);
        dry.mix_in(&wet)?;
        dry.mix_in(&inst)?;
        self.advance(RenderStage::Combined, final_len);

        build_effect(&self.graph.master, sr).process(&mut dry);
        self.advance(RenderStage::Mastered, dry.frames());

        info!(
            frames = dry.frames(),
            seconds = dry.duration_secs(),
            peak = dry.peak(),
            "Rendered mix"
        );
        Ok(dry)
    }

    /// Write a mastered buffer and mark the render finished
    pub fn write(&mut self, mix: &AudioBuffer, path: &Path, bit_depth: u16) -> Result<(), AudioIoError> {
        audio_io::write_wav(path, mix, bit_depth)?;
        self.advance(RenderStage::Written, mix.frames());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use autospark_core::{MixConfig, MixGraphBuilder, TimingProfile};

    use super::*;

    const SR: u32 = 44100;

    fn renderer() -> Renderer {
        let timing = TimingProfile::from_bpm(128.0).unwrap();
        let graph = MixGraphBuilder::new(MixConfig::default()).build(&timing);
        Renderer::new(graph, SR)
    }

    fn tone(frames: usize) -> AudioBuffer {
        let samples = (0..frames)
            .map(|i| 0.3 * (std::f32::consts::TAU * 440.0 * i as f32 / SR as f32).sin())
            .collect();
        AudioBuffer::mono(samples, SR)
    }

    #[test]
    fn test_output_truncated_to_shorter_stem() {
        let mut r = renderer();
        let out = r.render(tone(7000), AudioBuffer::silence(2, 5000, SR)).unwrap();
        assert_eq!(out.frames(), 5000);
        assert_eq!(out.num_channels(), 2);
        assert_eq!(r.stage(), Some(RenderStage::Mastered));
    }

    #[test]
    fn test_vocal_shorter_than_instrument() {
        let mut r = renderer();
        let out = r.render(tone(3000), AudioBuffer::silence(1, 9000, SR)).unwrap();
        assert_eq!(out.frames(), 3000);
    }

    #[test]
    fn test_rejects_surround_input() {
        let mut r = renderer();
        let err = r.render(tone(100), AudioBuffer::silence(6, 100, SR)).unwrap_err();
        assert!(matches!(err, MixError::UnsupportedChannelLayout(6)));
        assert_eq!(r.stage(), None);
    }

    #[test]
    fn test_rejects_wrong_sample_rate() {
        let mut r = renderer();
        let err = r.render(AudioBuffer::silence(1, 100, 48000), AudioBuffer::silence(2, 100, SR)).unwrap_err();
        assert!(matches!(err, MixError::SampleRateMismatch { expected: 44100, actual: 48000 }));
    }

    #[test]
    fn test_stereo_vocal_is_folded_to_mono() {
        let mut r = renderer();
        let left = tone(4096);
        let stereo = AudioBuffer::new(
            vec![left.channel(0).unwrap().to_vec(), left.channel(0).unwrap().to_vec()],
            SR,
        )
        .unwrap();
        let out = r.render(stereo, AudioBuffer::silence(2, 4096, SR)).unwrap();
        assert!(out.is_finite());
        assert!(out.peak() <= 1.0);
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(RenderStage::Loaded < RenderStage::VocalProcessed);
        assert!(RenderStage::Mastered < RenderStage::Written);
    }
}
