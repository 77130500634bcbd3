use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fm_baseband::config::{Config, StereoMode};
use fm_baseband::pipeline::{receive_file, transmit_file};
use fm_baseband::FormatTag;

/// Offline FM broadcast receiver and transmitter for SDR sample files
#[derive(Parser, Debug)]
#[command(name = "fm-baseband")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML config file overriding the default rates and filters
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Demodulate an IQ capture to a 16-bit WAV
    Receive {
        /// Capture sample format: uint8, int8, int16, float32, complex64
        #[arg(value_name = "FORMAT")]
        format: FormatTag,

        /// IQ capture (raw or WAV)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Treat the input as raw samples even if it has a WAV header
        #[arg(long)]
        raw: bool,

        /// Stereo decoding
        #[arg(long, value_enum)]
        stereo: Option<StereoMode>,

        /// De-emphasis time constant in microseconds (0 disables)
        #[arg(long, value_name = "US")]
        deemphasis_us: Option<f64>,
    },

    /// Modulate a 16-bit WAV to IF baseband and RF IQ files
    Transmit {
        /// Mono or stereo 16-bit WAV at the audio rate
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// IF baseband output (raw IQ)
        #[arg(value_name = "BASEBAND_OUTPUT")]
        baseband_output: PathBuf,

        /// RF output (raw IQ)
        #[arg(value_name = "RF_OUTPUT")]
        rf_output: PathBuf,

        /// RF output sample format
        #[arg(long, value_name = "FORMAT")]
        rf_format: Option<FormatTag>,

        /// Pre-emphasis time constant in microseconds (0 disables)
        #[arg(long, value_name = "US")]
        preemphasis_us: Option<f64>,
    },
}

/// Initialize logging; falls back to INFO if the level is missing or invalid.
fn init_logging(log_level: Option<&str>) {
    let level = log_level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .init();
}

fn load_config(path: Option<&Path>) -> fm_baseband::Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

fn run(args: Args, mut config: Config) -> fm_baseband::Result<()> {
    match args.command {
        Command::Receive {
            format,
            input,
            output,
            raw,
            stereo,
            deemphasis_us,
        } => {
            if let Some(stereo) = stereo {
                config.receive.stereo = stereo;
            }
            if let Some(us) = deemphasis_us {
                config.receive.deemphasis_us = us;
            }
            let report = receive_file(&config.receive, format, raw, &input, &output)?;
            info!(
                "wrote {} ({} frames, {} Hz, {})",
                report.output.display(),
                report.audio_frames,
                report.audio_rate,
                if report.stereo { "stereo" } else { "mono" }
            );
        }
        Command::Transmit {
            input,
            baseband_output,
            rf_output,
            rf_format,
            preemphasis_us,
        } => {
            if let Some(format) = rf_format {
                config.transmit.rf_format = format;
            }
            if let Some(us) = preemphasis_us {
                config.transmit.preemphasis_us = us;
            }
            let report = transmit_file(&config.transmit, &input, &baseband_output, &rf_output)?;
            info!(
                "wrote {} ({} samples at {} Hz, {})",
                report.baseband_output.display(),
                report.baseband_samples,
                report.baseband_rate,
                config.transmit.baseband_format
            );
            info!(
                "wrote {} ({} samples at {} Hz, {})",
                report.rf_output.display(),
                report.rf_samples,
                report.rf_rate,
                config.transmit.rf_format
            );
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // --log-level wins over the config file, which wins over -v.
    let level = args
        .log_level
        .clone()
        .or_else(|| config.general.log_level.clone())
        .or_else(|| args.verbose.then(|| "debug".to_string()));
    init_logging(level.as_deref());

    if let Err(e) = run(args, config) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
