use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use gifstream::transport::{FileTransportConfig, HttpConfig, RoutingTransport};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod inspect;
pub mod play;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream one or more GIFs and print every frame as it is composed.
    Play(PlayArgs),
    /// Decode one GIF once, without frame delays, and print its summary.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Play(args) => play::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Transport options shared by `play` and `inspect`.
#[derive(Args, Debug)]
pub struct TransportArgs {
    /// Bytes read per step from file sources.
    #[arg(long, default_value = "4096", value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: u64,
    /// Connect timeout for http:// sources (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Sources to stream: file paths, file:// or http:// URLs.
    #[arg(required = true)]
    pub sources: Vec<String>,
    /// Exit after N frames in total.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub frames: Option<u64>,
    /// Attempts per source before giving up (default: restart forever).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub sessions: Option<u64>,
    /// Pause before restarting a finished or failed stream (0 = immediately).
    #[arg(long, default_value = "1s")]
    pub restart_delay: String,
    /// Exit after this long (e.g. 30s).
    #[arg(long)]
    pub duration: Option<String>,
    /// Show frames as fast as they decode, ignoring their delays.
    #[arg(long)]
    pub no_delays: bool,
    /// Write every frame as a binary PPM into this directory.
    #[arg(long, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,
    #[command(flatten)]
    pub transport: TransportArgs,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Source to decode: a file path, file:// or http:// URL.
    pub source: String,
    /// Give up if the stream has not finished within this long.
    #[arg(long, default_value = "30s")]
    pub timeout: String,
    #[command(flatten)]
    pub transport: TransportArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// `500ms`, `2s` or bare seconds. Zero is rejected.
pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let duration = parse_delay(input)?;
    if duration.is_zero() {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(duration)
}

/// Like [`parse_duration`] but accepts zero.
pub(crate) fn parse_delay(input: &str) -> CliResult<Duration> {
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
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

impl TransportArgs {
    /// Routing engine serving both file and http:// sources.
    pub(crate) fn engine(&self) -> CliResult<RoutingTransport> {
        let chunk_size = usize::try_from(self.chunk_size)
            .map_err(|_| CliError::new(USAGE, "chunk size does not fit in memory"))?;
        let http = HttpConfig::default().with_connect_timeout(parse_duration(&self.connect_timeout)?);
        let file = FileTransportConfig::default().with_chunk_size(chunk_size);
        Ok(RoutingTransport::standard(http, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration(" 3 ").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
        assert_eq!(parse_duration("-1s").unwrap_err().code, USAGE);
    }

    #[test]
    fn parse_delay_accepts_zero() {
        assert_eq!(parse_delay("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_delay("0ms").unwrap(), Duration::ZERO);
    }
}
