mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;
use sensorprims_pcic::DEFAULT_PCIC_PORT;

use crate::cmd::{parse_duration, Command, Target};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "sensorprims", version, about = "Vision sensor PCIC and configuration CLI")]
struct Cli {
    /// Device host name or IP address.
    #[arg(long, env = "SENSORPRIMS_HOST", default_value = "192.168.0.69", global = true)]
    host: String,

    /// PCIC TCP port.
    #[arg(long, env = "SENSORPRIMS_PCIC_PORT", default_value_t = DEFAULT_PCIC_PORT, global = true)]
    pcic_port: u16,

    /// Connect and I/O timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s", global = true)]
    timeout: String,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = parse_duration(&cli.timeout).and_then(|timeout| {
        let target = Target {
            host: cli.host,
            pcic_port: cli.pcic_port,
            timeout,
        };
        cmd::run(cli.command, &target, format)
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
