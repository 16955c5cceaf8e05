use crate::cmd::Target;
use crate::exit::{rpc_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

pub fn run(target: &Target, format: OutputFormat) -> CliResult<i32> {
    let client = target.rpc_client()?;
    let params = client
        .get_all_parameters()
        .map_err(|err| rpc_error("device parameters", err))?;

    match format {
        OutputFormat::Json => print_json(&params),
        OutputFormat::Table => print_table(
            &["PARAMETER", "VALUE"],
            params
                .iter()
                .map(|(name, value)| vec![name.clone(), value.clone()])
                .collect(),
        ),
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (name, value) in &params {
                println!("{name}={value}");
            }
        }
    }
    Ok(SUCCESS)
}
