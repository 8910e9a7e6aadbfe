//! Error types for autospark

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MixError {
    #[error("Invalid tempo: {0} BPM (must be finite and > 0)")]
    InvalidTempo(f64),
    #[error("Buffer length mismatch: expected {expected} frames, got {actual}")]
    BufferLengthMismatch { expected: usize, actual: usize },
    #[error("Unsupported channel layout: {0} channels (mono or stereo only)")]
    UnsupportedChannelLayout(usize),
    #[error("Sample rate mismatch: expected {expected} Hz, got {actual} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },
}

pub type Result<T> = std::result::Result<T, MixError>;
