use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use sensorview_transport::DEFAULT_PORT;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod netinfo;
pub mod serve;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream a synthetic scene to a browser viewer.
    Serve(ServeArgs),
    /// Connect as a headless viewer and print received messages.
    Watch(WatchArgs),
    /// List IPv4 interfaces and the address the viewer is advertised on.
    Netinfo(NetinfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Netinfo(args) => netinfo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Port for the viewer page and socket (0 picks a free port).
    #[arg(long, env = "SENSORVIEW_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Directory with viewer assets. Default: built-in page.
    #[arg(long, value_name = "DIR")]
    pub web_root: Option<PathBuf>,
    /// Send raw pixels instead of JPEG.
    #[arg(long)]
    pub no_jpeg: bool,
    /// JPEG quality (0-100).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: Option<u8>,
    /// Compression worker threads.
    #[arg(long)]
    pub workers: Option<usize>,
    /// Synthetic frame rate.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=240))]
    pub fps: u32,
    /// Proxy config file (JSON). Flags override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Drop frames once N of a kind are unacked.
    #[arg(long, value_name = "N")]
    pub enforce_acks: Option<i32>,
    /// Exit after N frames.
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,
    /// Give up if no viewer connects in time (e.g. 30s, 500ms).
    #[arg(long)]
    pub wait_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Viewer socket URL, e.g. ws://127.0.0.1:8000/
    pub url: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Do not acknowledge image and map messages.
    #[arg(long)]
    pub no_ack: bool,
    /// Send a control command after connecting (reset, stop, load_pt_db).
    #[arg(long, conflicts_with = "track")]
    pub control: Option<String>,
    /// Ask the producer to track this person id after connecting.
    #[arg(long)]
    pub track: Option<String>,
    /// How long to keep retrying the initial connection (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct NetinfoArgs {
    /// Port to show in the advertised URL.
    #[arg(long, env = "SENSORVIEW_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a duration like `5s`, `500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
