//! Rename an application through a configuration session.
//!
//! Run with:
//!   cargo run --example edit-application --features rpc -- 192.168.0.69 1 "pallets"

use sensorprims::rpc::{DeviceClient, LeaseConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "192.168.0.69".to_string());
    let index: u32 = args.next().map(|n| n.parse()).transpose()?.unwrap_or(1);
    let name = args.next().unwrap_or_else(|| "renamed".to_string());

    let device = DeviceClient::connect(&host)?;
    let mut lease = device.request_session(None, None, LeaseConfig::default())?;
    eprintln!("Session {}", lease.session_id());

    lease.edit(|edit| {
        edit.application(index, |app| {
            let faults = app.validate()?;
            for fault in &faults {
                eprintln!("validation: {} {}", fault.id, fault.text);
            }
            app.set_parameter("Name", &name)?;
            app.save()
        })
    })?;

    lease.cancel()?;
    for app in device.application_list()? {
        println!("{:02} {}", app.index, app.name);
    }
    Ok(())
}
