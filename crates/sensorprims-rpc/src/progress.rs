use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;
use xmlrpc::Value;

use crate::error::{Result, RpcError};
use crate::value::to_f64;

/// Fault raised by `getImportProgress` when no import is running.
pub const IMPORT_IDLE_FAULT: i32 = 101107;

/// Fault raised by `getExportProgress` when no export is running.
pub const EXPORT_IDLE_FAULT: i32 = 101110;

/// Poll `progress` every `interval` until it reports 1.0 or `timeout` elapses.
///
/// Errors from `progress` end the poll immediately.
pub fn poll_until_complete<F>(mut progress: F, interval: Duration, timeout: Duration) -> Result<()>
where
    F: FnMut() -> Result<f64>,
{
    let started = Instant::now();
    loop {
        let current = progress()?;
        trace!(progress = current, "poll");
        if current >= 1.0 {
            return Ok(());
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(RpcError::ProgressTimeout {
                elapsed,
                progress: current,
            });
        }
        thread::sleep(interval.min(timeout - elapsed));
    }
}

/// Progress value of a poll call, treating `idle_fault` as complete.
pub(crate) fn progress_value(reply: Result<Value>, idle_fault: i32, what: &str) -> Result<f64> {
    match reply {
        Ok(value) => to_f64(&value, what),
        Err(RpcError::Fault { code, .. }) if code == idle_fault => Ok(1.0),
        Err(err) => Err(err),
    }
}
