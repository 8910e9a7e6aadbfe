use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Tempo-synced vocal mixdown
#[derive(Parser, Debug)]
#[command(name = "autospark", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mix a vocal stem over an instrumental and write a 16-bit WAV
    Mix(MixArgs),
    /// Print the pre-delay and release times derived from a tempo
    Timing {
        #[arg(long)]
        bpm: f64,
    },
}

#[derive(Args, Debug)]
pub struct MixArgs {
    /// Vocal stem
    #[arg(long, value_name = "PATH")]
    pub vocal: PathBuf,

    /// Instrumental stem
    #[arg(long, value_name = "PATH")]
    pub inst: PathBuf,

    /// Output WAV
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,

    /// Skip tempo estimation and use this BPM
    #[arg(long)]
    pub bpm: Option<f64>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the working sample rate
    #[arg(long)]
    pub sample_rate: Option<u32>,

    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    #[arg(long, default_value = "")]
    pub speaker: String,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub pitch: i32,
}
