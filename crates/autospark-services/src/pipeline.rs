//! End-to-end mixdown of one vocal/instrument pair

use std::fs;
use std::path::PathBuf;

use autospark_core::{AudioBuffer, MixConfig, MixError, MixGraphBuilder, TempoEstimate, TempoSource, TimingProfile};
use thiserror::Error;
use tracing::info;

use crate::audio_io::{self, AudioIoError};
use crate::cache::{self, CacheError, CacheKey, ResultCache};
use crate::render::Renderer;
use crate::tempo::{OnsetTempoEstimator, TempoError, TempoEstimator};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Mix(#[from] MixError),
    #[error(transparent)]
    Audio(#[from] AudioIoError),
    #[error("Tempo estimation failed: {0}")]
    Tempo(#[from] TempoError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// One mixdown request
#[derive(Debug, Clone)]
pub struct MixJob {
    pub vocal: PathBuf,
    pub instrument: PathBuf,
    pub output: PathBuf,
    /// Known tempo; estimated from the configured source stem when absent
    pub bpm: Option<f64>,
    pub speaker_id: String,
    pub pitch_adjust: i32,
}

impl MixJob {
    pub fn new(vocal: impl Into<PathBuf>, instrument: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            vocal: vocal.into(),
            instrument: instrument.into(),
            output: output.into(),
            bpm: None,
            speaker_id: String::new(),
            pitch_adjust: 0,
        }
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = Some(bpm);
        self
    }
}

/// Outcome of a finished job
#[derive(Debug, Clone)]
pub struct MixReport {
    pub output: PathBuf,
    /// `None` when the mix came straight from the cache
    pub timing: Option<TimingProfile>,
    pub frames: usize,
    pub cached: bool,
}

pub struct Pipeline {
    config: MixConfig,
    estimator: Box<dyn TempoEstimator>,
    cache: Option<Box<dyn ResultCache>>,
}

impl Pipeline {
    pub fn new(config: MixConfig) -> Self {
        Self {
            config,
            estimator: Box::new(OnsetTempoEstimator::default()),
            cache: None,
        }
    }

    pub fn with_estimator(mut self, estimator: Box<dyn TempoEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_cache(mut self, cache: Box<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    fn cache_key(&self, job: &MixJob) -> Result<CacheKey, PipelineError> {
        let bpm = job.bpm.map_or_else(|| "auto".to_string(), |b| b.to_string());
        Ok(CacheKey::new(&job.vocal, &job.speaker_id, job.pitch_adjust)?
            .with_param("instrument_hash", cache::file_digest(&job.instrument)?)
            .with_param("bpm", bpm)
            .with_param("sample_rate", self.config.sample_rate)
            .with_param("headroom_db", self.config.headroom_db)
            .with_param("vocal_input_db", self.config.vocal_input_db)
            .with_param("reverb_gain_db", self.config.reverb_gain_db)
            .with_param("bit_depth", self.config.bit_depth)
            .with_param("tempo_source", format!("{:?}", self.config.tempo_source)))
    }

    fn tempo(&self, job: &MixJob, vocal: &AudioBuffer, instrument: &AudioBuffer) -> Result<TempoEstimate, PipelineError> {
        if let Some(bpm) = job.bpm {
            return Ok(TempoEstimate::new(bpm)?);
        }
        let source = match self.config.tempo_source {
            TempoSource::Vocal => vocal,
            TempoSource::Instrument => instrument,
        };
        let mono = source.to_mono();
        let samples = mono.channel(0).unwrap_or_default();
        let raw = self.estimator.estimate(samples, mono.sample_rate())?;
        info!(raw_bpm = raw, source = ?self.config.tempo_source, "Estimated tempo");
        Ok(TempoEstimate::from_detected(raw)?)
    }

    /// Load, time, render and write one job, consulting the cache if attached
    pub fn run(&mut self, job: &MixJob) -> Result<MixReport, PipelineError> {
        let key = if self.cache.is_some() { Some(self.cache_key(job)?) } else { None };

        if let (Some(cache), Some(key)) = (self.cache.as_mut(), key.as_ref()) {
            if let Some(hit) = cache.get(key) {
                if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|e| CacheError::Io { path: parent.to_path_buf(), source: e })?;
                }
                fs::copy(&hit, &job.output).map_err(|e| CacheError::Io { path: hit.clone(), source: e })?;
                let frames = audio_io::load_wav(&job.output)?.frames();
                info!(output = %job.output.display(), "Served mix from cache");
                return Ok(MixReport { output: job.output.clone(), timing: None, frames, cached: true });
            }
        }

        let sample_rate = self.config.sample_rate;
        let vocal = audio_io::load_resampled(&job.vocal, sample_rate)?;
        let instrument = audio_io::load_resampled(&job.instrument, sample_rate)?;

        let tempo = self.tempo(job, &vocal, &instrument)?;
        let timing = TimingProfile::new(tempo);
        info!(
            bpm = tempo.bpm(),
            basic_time_ms = timing.basic_time,
            pre_delay = ?timing.pre_delay,
            release = ?timing.release,
            "Derived timing"
        );

        let graph = MixGraphBuilder::new(self.config).build(&timing);
        let mut renderer = Renderer::new(graph, sample_rate);
        let mix = renderer.render(vocal, instrument)?;
        renderer.write(&mix, &job.output, self.config.bit_depth)?;

        if let (Some(cache), Some(key)) = (self.cache.as_mut(), key.as_ref()) {
            cache.put(key, &job.output)?;
        }

        Ok(MixReport {
            output: job.output.clone(),
            timing: Some(timing),
            frames: mix.frames(),
            cached: false,
        })
    }
}
