mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;
use loa_transport::DEFAULT_BAUD_RATE;

use crate::cmd::{Command, ConnectionArgs};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "loa", version, about = "Talk to a Lua board over a SLIP serial link")]
struct Cli {
    /// Serial device or Unix socket of the board.
    #[arg(short, long, env = "LOA_DEVICE", value_name = "PATH", global = true)]
    device: Option<PathBuf>,

    /// Line speed for serial devices.
    #[arg(long, env = "LOA_BAUD_RATE", default_value_t = DEFAULT_BAUD_RATE, global = true)]
    baud_rate: u32,

    /// How long to wait for each response (e.g. 1000ms, 2s).
    #[arg(long, env = "LOA_TIMEOUT", default_value = "1000ms", global = true)]
    timeout: String,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let conn = ConnectionArgs {
        device: cli.device,
        baud_rate: cli.baud_rate,
        timeout: cli.timeout,
    };
    let result = cmd::run(cli.command, &conn, format).await;

    match result {
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
    fn parses_send_with_mixed_arguments() {
        let cli = Cli::try_parse_from([
            "loa",
            "--device",
            "/dev/ttyUSB0",
            "send",
            "/read-file",
            "/main.lua",
            "3",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send subcommand");
        };
        assert_eq!(args.address, "/read-file");
        assert_eq!(args.args, vec!["/main.lua", "3"]);
        assert_eq!(cli.device, Some(PathBuf::from("/dev/ttyUSB0")));
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["loa", "ls", "/lib", "-d", "/tmp/board.sock", "--timeout", "2s"])
            .expect("global args after subcommand should parse");

        let Command::Ls(args) = cli.command else {
            panic!("expected ls subcommand");
        };
        assert_eq!(args.remote, "/lib");
        assert_eq!(cli.timeout, "2s");
        assert_eq!(cli.device, Some(PathBuf::from("/tmp/board.sock")));
    }

    #[test]
    fn ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["loa", "ls"]).expect("bare ls should parse");
        let Command::Ls(args) = cli.command else {
            panic!("expected ls subcommand");
        };
        assert_eq!(args.remote, "/");
    }

    #[test]
    fn write_requires_local_path() {
        let err = Cli::try_parse_from(["loa", "write"]).expect_err("write without a file should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
