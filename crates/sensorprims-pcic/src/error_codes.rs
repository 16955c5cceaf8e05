//! Error codes reported by the `E?` query.

/// No error is pending.
pub const NO_ERROR: u32 = 0;

/// Codes that mean the device cannot take a process interface trigger in its
/// current configuration, as opposed to being busy.
pub const TRIGGER_NOT_ALLOWED: [u32; 3] = [100_001_000, 100_001_001, 100_001_002];

/// Message for a device error code, if the code is documented.
pub fn error_message(code: u32) -> Option<&'static str> {
    let message = match code {
        0 => "No error detected",
        100_000_001 => "Maximum number of connections exceeded",
        100_000_002 => "Internal failure during a D-Bus call",
        100_000_003 => "Unspecified internal error",
        100_000_004 => "Generic invalid parameter",
        100_000_005 => "Invalid command",
        100_001_000 => "Application configuration does not allow Process interface trigger",
        100_001_001 => "Video mode does not allow Process interface trigger",
        100_001_002 => "There is no application configured",
        100_001_003 => "Invalid image id in I? command",
        100_001_004 => "Invalid pin id in o/O? command",
        100_001_005 => "Invalid pin configuration in o/O? command",
        100_001_006 => "Invalid conversion type selected",
        100_001_007 => "No trigger was run yet",
        100_001_008 => "Missed decoded frame",
        100_001_009 => "No more segments left",
        100_001_010 => "Command bit 4 not reset to 0",
        110_001_001 => "Boot timeout",
        110_001_002 => "Fatal software error",
        110_001_003 => "Unknown hardware",
        110_001_006 => "Trigger overrun",
        110_001_007 => "Ethernet configuration was changed. The socket is going to be closed.",
        110_002_000 => "Short circuit on Ready for Trigger",
        110_002_001 => "Short circuit on OUT1",
        110_002_002 => "Short circuit on OUT2",
        110_002_003 => "Reverse feeding",
        110_003_000 => "Vled overvoltage",
        110_003_001 => "Vled undervoltage",
        110_003_002 => "Vmod overvoltage",
        110_003_003 => "Vmod undervoltage",
        110_003_004 => "Mainboard overvoltage",
        110_003_005 => "Mainboard undervoltage",
        110_003_006 => "Supply overvoltage",
        110_003_007 => "Supply undervoltage",
        110_003_008 => "VFEMon alarm",
        110_003_009 => "PMIC supply alarm",
        110_004_000 => "Illumination overtemperature",
        120_000_001 => "NTP server not available",
        120_000_002 => "other NTP error",
        _ => return None,
    };
    Some(message)
}
