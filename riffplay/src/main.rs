//! riffplay - Main entry point
//!
//! Plays one PCM WAVE file on an audio sink and exits. Exit status is 0 after
//! the device has drained, 1 on any failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use riffplay::audio::output::{list_devices, CpalDevice};
use riffplay::audio::ContainerDecoder;
use riffplay::config::PlayerConfig;
use riffplay::PlaybackEngine;
use riffplay_common::ConfigOverrides;
use tracing::{debug, info, warn};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Log level used until the configured one is known
const DEFAULT_LOG_LEVEL: &str = "info";

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Command-line arguments for riffplay
///
/// Unset options fall back to RIFFPLAY_* environment variables, then the
/// config file, then compiled defaults.
#[derive(Parser, Debug)]
#[command(name = "riffplay")]
#[command(about = "Play a PCM WAVE file on an audio device")]
#[command(version)]
struct Args {
    /// WAVE file to play
    #[arg(required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// Audio sink name ("default" = system default output)
    #[arg(short, long)]
    device: Option<String>,

    /// Frames handed to the device per write
    #[arg(long)]
    chunk_frames: Option<usize>,

    /// Largest accepted WAVE payload in bytes
    #[arg(long)]
    max_data_bytes: Option<u32>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print available output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let status = usage_exit_status(e.kind());
            // Help and version go to stdout, usage errors to stderr
            let _ = e.print();
            return ExitCode::from(status);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Exit status for a command line clap could not turn into `Args`
fn usage_exit_status(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn run(args: Args) -> Result<()> {
    let log_filter = init_tracing();

    let overrides = ConfigOverrides {
        device: args.device.clone(),
        chunk_frames: args.chunk_frames,
        max_data_bytes: args.max_data_bytes,
    };

    let config = PlayerConfig::load(args.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;

    apply_log_level(log_filter.as_ref(), &config.log_level);
    debug!(
        "Resolved settings: device='{}', chunk_frames={}, max_data_bytes={}",
        config.playback.sink_name, config.playback.chunk_frames, config.decoder.max_data_length
    );

    if args.list_devices {
        for name in list_devices().context("Failed to list audio devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let Some(path) = args.file else {
        anyhow::bail!("No input file given");
    };

    let audio = ContainerDecoder::new(config.decoder).decode_file(&path)?;
    let format = audio.format();

    info!("Playing WAV file: {}", path.display());
    info!("Sample Rate: {}", format.sample_rate_hz);
    info!("Channels: {}", format.channel_count);
    info!("Bits Per Sample: {}", format.bits_per_sample);
    info!("Duration: {:.2}s", audio.duration().as_secs_f64());

    let engine = PlaybackEngine::new(CpalDevice::new(), config.playback);
    engine
        .play(&audio)
        .with_context(|| format!("Failed to play {}", path.display()))?;

    Ok(())
}

/// Install the subscriber before configuration is read.
///
/// # Returns
/// A handle for switching to the configured level, or `None` when `RUST_LOG`
/// is set and takes precedence
fn init_tracing() -> Option<FilterHandle> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let follow_config = from_env.is_none();
    let filter =
        from_env.unwrap_or_else(|| EnvFilter::new(filter_directives(DEFAULT_LOG_LEVEL)));

    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    follow_config.then_some(handle)
}

fn apply_log_level(handle: Option<&FilterHandle>, level: &str) {
    if let Some(handle) = handle {
        if let Err(e) = handle.reload(EnvFilter::new(filter_directives(level))) {
            warn!("Failed to apply log level '{}': {}", level, e);
        }
    }
}

fn filter_directives(level: &str) -> String {
    format!("riffplay={level},riffplay_common={level}")
}
