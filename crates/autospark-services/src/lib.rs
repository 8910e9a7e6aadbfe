//! autospark-services: Effect processors, rendering, audio I/O and job pipeline

pub mod audio_effects;
pub mod audio_io;
pub mod cache;
pub mod pipeline;
pub mod render;
pub mod tempo;

pub use audio_effects::{build_effect, AudioEffect, EffectChain, EffectParam, MixBus};
pub use audio_effects::{
    CompressorEffect, DelayEffect, FilterEffect, GainEffect, InvertEffect, LimiterEffect,
    ReverbEffect,
};
pub use audio_io::{load_resampled, load_wav, resample, write_wav, AudioIoError};
pub use cache::{CacheError, CacheKey, FileResultCache, ResultCache};
pub use pipeline::{MixJob, MixReport, Pipeline, PipelineError};
pub use render::{RenderStage, Renderer};
pub use tempo::{FixedTempo, OnsetTempoEstimator, TempoError, TempoEstimator};
