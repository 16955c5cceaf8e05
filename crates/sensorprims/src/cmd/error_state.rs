use crate::cmd::Target;
use crate::exit::{pcic_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

pub fn run(target: &Target, format: OutputFormat) -> CliResult<i32> {
    let mut link = target.connect_pcic()?;
    let state = link
        .request_error_state()
        .map_err(|err| pcic_error("error state", err))?;

    match format {
        OutputFormat::Json => print_json(&state),
        OutputFormat::Table => print_table(
            &["CODE", "MESSAGE"],
            vec![vec![state.code.to_string(), state.describe()]],
        ),
        OutputFormat::Pretty => println!("{:09}: {}", state.code, state.describe()),
        OutputFormat::Raw => println!("{}", state.code),
    }
    Ok(SUCCESS)
}
