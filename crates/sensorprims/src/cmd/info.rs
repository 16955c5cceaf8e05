use sensorprims_pcic::{DeviceInformation, ProtocolVersion};
use serde::Serialize;

use crate::cmd::Target;
use crate::exit::{pcic_error, CliResult, SUCCESS};
use crate::output::{print_json, print_pairs, print_table, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    addr: String,
    device: DeviceInformation,
    protocol: ProtocolVersion,
}

pub fn run(target: &Target, format: OutputFormat) -> CliResult<i32> {
    let mut link = target.connect_pcic()?;
    let device = link
        .device_information()
        .map_err(|err| pcic_error("device information", err))?;
    let protocol = link
        .protocol_version()
        .map_err(|err| pcic_error("protocol version", err))?;

    let out = InfoOutput {
        addr: link.addr().to_string(),
        device,
        protocol,
    };
    print_info(&out, format);
    Ok(SUCCESS)
}

fn pairs(out: &InfoOutput) -> Vec<(&'static str, String)> {
    let d = &out.device;
    vec![
        ("Address", out.addr.clone()),
        ("Vendor", d.vendor.clone()),
        ("Article", d.article_number.clone()),
        ("Name", d.name.clone()),
        ("Location", d.location.clone()),
        ("Description", d.description.clone()),
        ("IP", d.ip.clone()),
        ("Subnet mask", d.subnet_mask.clone()),
        ("Gateway", d.gateway.clone()),
        ("MAC", d.mac.clone()),
        ("DHCP", d.dhcp.to_string()),
        (
            "RPC port",
            d.rpc_port.map(|p| p.to_string()).unwrap_or_default(),
        ),
        (
            "Protocol",
            format!(
                "{} (supported {}-{})",
                out.protocol.current, out.protocol.min, out.protocol.max
            ),
        ),
    ]
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(
            &["FIELD", "VALUE"],
            pairs(out)
                .into_iter()
                .map(|(label, value)| vec![label.to_string(), value])
                .collect(),
        ),
        OutputFormat::Pretty => print_pairs("Device Info", &pairs(out)),
        OutputFormat::Raw => println!("{}", out.device.article_number),
    }
}
