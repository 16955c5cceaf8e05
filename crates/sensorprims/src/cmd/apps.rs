use serde::Serialize;

use crate::cmd::{ActivateArgs, Target};
use crate::exit::{pcic_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

pub fn run(target: &Target, format: OutputFormat) -> CliResult<i32> {
    let mut link = target.connect_pcic()?;
    let list = link
        .application_list()
        .map_err(|err| pcic_error("application list", err))?;

    match format {
        OutputFormat::Json => print_json(&list),
        OutputFormat::Table => print_table(
            &["APPLICATION", "ACTIVE"],
            list.numbers
                .iter()
                .map(|n| {
                    let active = if *n == list.active { "*" } else { "" };
                    vec![n.to_string(), active.to_string()]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            println!("{} applications, active: {}", list.count, list.active);
            for n in &list.numbers {
                println!("  {n:02}{}", if *n == list.active { " *" } else { "" });
            }
        }
        OutputFormat::Raw => println!("{}", list.active),
    }
    Ok(SUCCESS)
}

#[derive(Serialize)]
struct Activated {
    active: u8,
}

pub fn activate(args: ActivateArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let mut link = target.connect_pcic()?;
    link.activate_application(args.number)
        .map_err(|err| pcic_error("activate application", err))?;

    match format {
        OutputFormat::Json => print_json(&Activated {
            active: args.number,
        }),
        OutputFormat::Raw => println!("{}", args.number),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("application {:02} active", args.number)
        }
    }
    Ok(SUCCESS)
}
