//! autospark-core: Tempo-synchronised mix graph domain types

pub mod buffer;
pub mod config;
mod error;
pub mod graph;
pub mod timing;

pub use buffer::AudioBuffer;
pub use config::{MixConfig, TempoSource};
pub use error::{MixError, Result};
pub use graph::{EffectNode, MixGraph, MixGraphBuilder};
pub use timing::{
    build_note_family, compute_basic_time, derive_pre_delay, derive_release, select_time,
    NoteMode, PreDelaySet, ReleaseSet, TempoEstimate, TimeBand, TimingProfile,
};
