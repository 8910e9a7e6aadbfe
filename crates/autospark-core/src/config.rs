//! Mix configuration passed by value into the graph builder and renderer

use serde::{Deserialize, Serialize};

/// Which stem the tempo is estimated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempoSource {
    #[default]
    Vocal,
    Instrument,
}

/// Plain numeric tuning values for one mixdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Working sample rate; both stems are resampled to it on load
    pub sample_rate: u32,
    /// Gain applied to the instrumental stem
    pub headroom_db: f32,
    /// Gain at the head of the vocal chain
    pub vocal_input_db: f32,
    /// Gain at the tail of the reverb-send chain
    pub reverb_gain_db: f32,
    /// Output file bit depth
    pub bit_depth: u16,
    pub tempo_source: TempoSource,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            headroom_db: -8.0,
            vocal_input_db: -4.0,
            reverb_gain_db: 0.0,
            bit_depth: 16,
            tempo_source: TempoSource::Vocal,
        }
    }
}

impl MixConfig {
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }
}
