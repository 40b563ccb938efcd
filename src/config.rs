use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::Level;

use crate::error::TheoryError;
use crate::theory::{Scale, SpecificNote};

/// Command-line options.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Substring of the MIDI input port to open; first port when omitted
    #[arg(short, long)]
    pub midi_port: Option<String>,

    /// Print the available MIDI input ports and exit
    #[arg(long, default_value_t = false)]
    pub list_ports: bool,

    #[arg(short, long, default_value = "0.0.0.0:8001")]
    pub bind: SocketAddr,

    /// MIDI poll interval in milliseconds
    #[arg(long, default_value_t = 10)]
    pub poll_ms: u64,

    /// Reference scale used to annotate chords, e.g. "C major"
    #[arg(short, long, default_value = "C major")]
    pub scale: String,

    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Lowest note of the triads table when none is requested
    #[arg(long, default_value = "C1")]
    pub lowest: String,

    /// Run without an audio output device
    #[arg(long, default_value_t = false)]
    pub no_audio: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Validated settings, built once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub midi_port: Option<String>,
    pub bind: SocketAddr,
    pub poll_interval: Duration,
    pub scale: Scale,
    pub static_dir: PathBuf,
    pub lowest: SpecificNote,
    pub range_low: SpecificNote,
    pub range_high: SpecificNote,
    pub audio: bool,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Result<Self, TheoryError> {
        Ok(Self {
            midi_port: args.midi_port.clone(),
            bind: args.bind,
            poll_interval: Duration::from_millis(args.poll_ms.max(1)),
            scale: args.scale.parse()?,
            static_dir: args.static_dir.clone(),
            lowest: args.lowest.parse()?,
            range_low: "C2".parse()?,
            range_high: "C4".parse()?,
            audio: !args.no_audio,
        })
    }
}

pub fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}
