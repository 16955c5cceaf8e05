//! Trigger a device a few times and print each result.
//!
//! Run with:
//!   cargo run --example trigger-loop -- 192.168.0.69:50010 5

use sensorprims::pcic::{connect, PcicError};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "192.168.0.69:50010".to_string());
    let count: usize = args.next().map(|n| n.parse()).transpose()?.unwrap_or(3);

    let mut link = connect(addr.clone())?;
    eprintln!("Connected to {addr}");

    for i in 0..count {
        match link.execute_synchronous_trigger() {
            Ok(result) => println!("{i}: {}", String::from_utf8_lossy(&result)),
            Err(PcicError::DeviceBusy { .. }) => eprintln!("{i}: device busy, skipped"),
            Err(e) => return Err(e.into()),
        }
    }

    let state = link.request_error_state()?;
    if state.is_error() {
        eprintln!("device reports: {}", state.describe());
    }
    Ok(())
}
