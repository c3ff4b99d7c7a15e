mod cmd;
mod dump;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "gifstream",
    version,
    about = "Stream animated GIFs and decode them frame by frame"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        env = "GIFSTREAM_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_play_with_several_sources() {
        let cli = Cli::try_parse_from([
            "gifstream",
            "play",
            "a.gif",
            "http://example.test/b.gif",
            "--frames",
            "10",
            "--sessions",
            "2",
        ])
        .expect("play args should parse");

        match cli.command {
            Command::Play(args) => {
                assert_eq!(args.sources.len(), 2);
                assert_eq!(args.frames, Some(10));
                assert_eq!(args.sessions, Some(2));
                assert!(!args.no_delays);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn play_requires_a_source() {
        let err = Cli::try_parse_from(["gifstream", "play"]).expect_err("missing source");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_inspect_with_global_format_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gifstream",
            "inspect",
            "anim.gif",
            "--timeout",
            "3s",
            "--format",
            "json",
        ])
        .expect("inspect args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Inspect(_)));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = Cli::try_parse_from(["gifstream", "--log-level", "loud", "version"])
            .expect_err("bad level");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
