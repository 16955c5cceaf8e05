use serde::Serialize;
use sensorprims_rpc::LeaseConfig;

use crate::cmd::{ExportArgs, Target};
use crate::exit::{io_error, rpc_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct ExportOutput {
    path: String,
    size: usize,
    session: String,
}

pub fn run(args: ExportArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let client = target.rpc_client()?;
    let mut lease = client
        .request_session(args.password.as_deref(), None, LeaseConfig::default())
        .map_err(|err| rpc_error("open session", err))?;

    let exported = lease.export_config();
    let cancelled = lease.cancel();
    let config = exported.map_err(|err| rpc_error("export configuration", err))?;
    if let Err(err) = cancelled {
        tracing::warn!(error = %err, "session cancel failed after export");
    }

    std::fs::write(&args.out, &config).map_err(|err| io_error("write configuration", err))?;

    let out = ExportOutput {
        path: args.out.display().to_string(),
        size: config.len(),
        session: lease.session_id().to_string(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Raw => println!("{}", out.path),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("exported {} bytes to {}", out.size, out.path)
        }
    }
    Ok(SUCCESS)
}
