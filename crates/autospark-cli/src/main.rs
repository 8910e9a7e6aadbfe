//! autospark: tempo-synced vocal mixdown from the command line

mod cli;
mod config;

use anyhow::{Context, Result};
use autospark_core::TimingProfile;
use autospark_services::{FileResultCache, MixJob, Pipeline};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command, MixArgs};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("autospark=debug".parse()?)
            .add_directive("autospark_core=debug".parse()?)
            .add_directive("autospark_services=debug".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Mix(args) => run_mix(args),
        Command::Timing { bpm } => print_timing(bpm),
    }
}

fn run_mix(args: MixArgs) -> Result<()> {
    let app_config = config::load_config(args.config.as_deref());
    let mut mix_config = app_config.mix;
    if let Some(rate) = args.sample_rate {
        mix_config.sample_rate = rate;
    }

    let mut pipeline = Pipeline::new(mix_config);
    if app_config.cache.enabled && !args.no_cache {
        let dir = app_config.cache.resolved_dir();
        let cache = FileResultCache::open(&dir)
            .with_context(|| format!("failed to open cache at {}", dir.display()))?;
        pipeline = pipeline.with_cache(Box::new(cache));
    }

    let job = MixJob {
        vocal: args.vocal,
        instrument: args.inst,
        output: args.out,
        bpm: args.bpm,
        speaker_id: args.speaker,
        pitch_adjust: args.pitch,
    };

    tracing::info!(vocal = %job.vocal.display(), instrument = %job.instrument.display(), "Starting mixdown");
    let report = pipeline.run(&job).context("mixdown failed")?;

    match report.timing {
        Some(timing) => tracing::info!(
            output = %report.output.display(),
            bpm = timing.tempo.bpm(),
            frames = report.frames,
            "Mixdown complete"
        ),
        None => tracing::info!(output = %report.output.display(), frames = report.frames, "Mixdown reused from cache"),
    }
    Ok(())
}

fn print_timing(bpm: f64) -> Result<()> {
    let timing = TimingProfile::from_bpm(bpm)?;
    let pd = timing.pre_delay;
    let rel = timing.release;

    println!("bpm          {:>9.2}", timing.tempo.bpm());
    println!("corrected    {:>9.2}", timing.tempo.corrected_bpm());
    println!("basic time   {:>9.2} ms", timing.basic_time);
    println!();
    println!("pre-delay");
    println!("  room ER    {:>9.2} ms", pd.room_er);
    println!("  room LR    {:>9.2} ms", pd.room_lr);
    println!("  plate      {:>9.2} ms", pd.plate);
    println!("  hall       {:>9.2} ms", pd.hall);
    println!();
    println!("release");
    println!("  fast       {:>9.1} ms", rel.fast);
    println!("  medium     {:>9.1} ms", rel.medium);
    println!("  slow       {:>9.1} ms", rel.slow);
    println!("  limiter    {:>9.1} ms", rel.limiter);
    Ok(())
}
