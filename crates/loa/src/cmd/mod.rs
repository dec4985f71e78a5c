use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use loa_bridge::{Bridge, BridgeConfig, Device};
use loa_transport::TransportConfig;

use crate::exit::{bridge_error, CliError, CliResult, USAGE};
use crate::output::{ConsoleLogger, OutputFormat};

pub mod fs;
pub mod monitor;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a file from the device.
    Read(RemoteArgs),
    /// Copy a local file to the device.
    Write(WriteArgs),
    /// Delete a file on the device.
    Rm(RemoteArgs),
    /// Create a directory on the device.
    Mkdir(RemoteArgs),
    /// Delete a directory on the device.
    Rmdir(RemoteArgs),
    /// List a directory on the device, recursively.
    Ls(LsArgs),
    /// Send a request and print the device's answer.
    Send(SendArgs),
    /// Print device logs and output until interrupted.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Where the device is and how long to wait for it.
#[derive(Debug, Clone)]
pub struct ConnectionArgs {
    pub device: Option<PathBuf>,
    pub baud_rate: u32,
    pub timeout: String,
}

pub async fn run(command: Command, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Read(args) => fs::read(args, conn, format).await,
        Command::Write(args) => fs::write(args, conn, format).await,
        Command::Rm(args) => fs::remove_file(args, conn, format).await,
        Command::Mkdir(args) => fs::create_dir(args, conn, format).await,
        Command::Rmdir(args) => fs::remove_dir(args, conn, format).await,
        Command::Ls(args) => fs::list(args, conn, format).await,
        Command::Send(args) => send::run(args, conn, format).await,
        Command::Monitor(args) => monitor::run(args, conn, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Path on the device.
    pub remote: String,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Local file to upload.
    pub local: PathBuf,
    /// Destination on the device. Default: the local file name.
    pub remote: Option<String>,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Directory on the device.
    #[arg(default_value = "/")]
    pub remote: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Request address, e.g. /list-dir.
    pub address: String,
    /// Arguments: integers, floats, true/false, anything else is a string.
    pub args: Vec<String>,
    /// Send this file as a raw frame right after the request.
    #[arg(long, value_name = "FILE")]
    pub raw: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Stop after this long (e.g. 30s) instead of waiting for Ctrl-C.
    #[arg(long, value_name = "DURATION")]
    pub duration: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl ConnectionArgs {
    /// Connect and wrap the bridge as a [`Device`].
    pub async fn open(&self, format: OutputFormat) -> CliResult<Device> {
        let path = self.device.as_ref().ok_or_else(|| {
            CliError::new(USAGE, "no device given (use --device or LOA_DEVICE)")
        })?;
        let config = BridgeConfig::default().with_response_timeout(parse_duration(&self.timeout)?);
        let bridge = Bridge::with_config(config, Arc::new(ConsoleLogger::new(format)))
            .map_err(|err| bridge_error("bridge setup failed", err))?;

        let transport = TransportConfig::new(path).with_baud_rate(self.baud_rate);
        bridge
            .connect(&transport)
            .await
            .map_err(|err| bridge_error("connect failed", err))?;
        Device::new(bridge).map_err(|err| bridge_error("bridge setup failed", err))
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
