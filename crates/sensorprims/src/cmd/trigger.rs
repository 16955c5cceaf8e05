use serde::Serialize;

use crate::cmd::{Target, TriggerArgs};
use crate::exit::{pcic_error, CliResult, SUCCESS};
use crate::output::{payload_preview, print_json, print_raw, print_table, OutputFormat};

#[derive(Serialize)]
struct TriggerOutput {
    mode: &'static str,
    size: usize,
    result: String,
}

pub fn run(args: TriggerArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let mut link = target.connect_pcic()?;

    let (mode, body) = if args.asynchronous {
        link.execute_asynchronous_trigger()
            .map_err(|err| pcic_error("asynchronous trigger", err))?;
        let body = link
            .read_next_async()
            .map_err(|err| pcic_error("waiting for result", err))?;
        ("async", body)
    } else {
        let body = link
            .execute_synchronous_trigger()
            .map_err(|err| pcic_error("synchronous trigger", err))?;
        ("sync", body)
    };

    let out = TriggerOutput {
        mode,
        size: body.len(),
        result: payload_preview(&body),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["MODE", "SIZE", "RESULT"],
            vec![vec![out.mode.to_string(), out.size.to_string(), out.result]],
        ),
        OutputFormat::Pretty => println!("{} trigger: {} bytes: {}", out.mode, out.size, out.result),
        OutputFormat::Raw => print_raw(&body),
    }
    Ok(SUCCESS)
}
