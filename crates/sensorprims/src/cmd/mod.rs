use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use sensorprims_pcic::{connect_with_config, PcicConfig, PcicLink};
use sensorprims_rpc::{DeviceClient, RpcConfig};

use crate::exit::{pcic_error, rpc_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod apps;
pub mod error_state;
pub mod export;
pub mod image;
pub mod info;
pub mod params;
pub mod stream;
pub mod trigger;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version information.
    Version(VersionArgs),
    /// Print device identification and PCIC protocol version.
    Info,
    /// List applications and the active one.
    Apps,
    /// Activate an application.
    Activate(ActivateArgs),
    /// Trigger an evaluation and print its result.
    Trigger(TriggerArgs),
    /// Fetch the last image from the device.
    Image(ImageArgs),
    /// Stream images until a count is reached or Ctrl-C.
    Stream(StreamArgs),
    /// Print the device's current error state.
    ErrorState,
    /// Print all device parameters (remote configuration endpoint).
    Params,
    /// Export the device configuration to a file.
    Export(ExportArgs),
}

/// Where and how to reach the device.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub pcic_port: u16,
    pub timeout: Duration,
}

impl Target {
    pub fn pcic_addr(&self) -> String {
        format!("{}:{}", self.host, self.pcic_port)
    }

    pub fn connect_pcic(&self) -> CliResult<PcicLink> {
        let config = PcicConfig {
            connect_timeout: self.timeout,
            io_timeout: self.timeout,
            ..PcicConfig::default()
        };
        connect_with_config(self.pcic_addr(), config).map_err(|err| pcic_error("connect failed", err))
    }

    pub fn rpc_client(&self) -> CliResult<DeviceClient> {
        let config = RpcConfig {
            timeout: self.timeout,
            ..RpcConfig::default()
        };
        DeviceClient::connect_with_config(&self.host, &config)
            .map_err(|err| rpc_error("rpc client", err))
    }
}

pub fn run(command: Command, target: &Target, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args),
        Command::Info => info::run(target, format),
        Command::Apps => apps::run(target, format),
        Command::Activate(args) => apps::activate(args, target, format),
        Command::Trigger(args) => trigger::run(args, target, format),
        Command::Image(args) => image::run(args, target, format),
        Command::Stream(args) => stream::run(args, target, format),
        Command::ErrorState => error_state::run(target, format),
        Command::Params => params::run(target, format),
        Command::Export(args) => export::run(args, target, format),
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug)]
pub struct ActivateArgs {
    /// Application number (1-32).
    pub number: u8,
}

#[derive(Args, Debug)]
pub struct TriggerArgs {
    /// Use the asynchronous trigger and wait for the pushed result.
    #[arg(long = "async")]
    pub asynchronous: bool,
}

#[derive(Args, Debug)]
pub struct ImageArgs {
    /// Image id (two digits, see the device's image list).
    #[arg(long, default_value = "1")]
    pub id: u8,
    /// Write decoded images into this directory.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Exit after N results.
    #[arg(long)]
    pub count: Option<usize>,
    /// Write decoded images into this directory.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Destination file for the configuration blob.
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,
    /// Session password, if the device has one set.
    #[arg(long, env = "SENSORPRIMS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Parse `5s`, `500ms` or a plain number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
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
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
