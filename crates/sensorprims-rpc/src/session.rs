//! Session-level operations: operating mode, configuration transfer.

use tracing::info;
use xmlrpc::Value;

use crate::error::{Result, RpcError};
use crate::lease::Lease;
use crate::progress::{poll_until_complete, progress_value, EXPORT_IDLE_FAULT, IMPORT_IDLE_FAULT};
use crate::value::{to_bytes, to_f64, to_json, to_u32};

/// Device operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Run = 0,
    Edit = 1,
}

/// Parts of a configuration blob to apply on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportScope {
    /// Name, description, location and other global settings.
    pub global: bool,
    /// IP address, DHCP and other network settings.
    pub network: bool,
    /// All applications.
    pub applications: bool,
}

impl Default for ImportScope {
    fn default() -> Self {
        Self {
            global: true,
            network: false,
            applications: true,
        }
    }
}

impl ImportScope {
    const GLOBAL: i32 = 0x0001;
    const NETWORK: i32 = 0x0002;
    const APPLICATIONS: i32 = 0x0010;

    fn flags(self) -> Vec<i32> {
        [
            (self.global, Self::GLOBAL),
            (self.network, Self::NETWORK),
            (self.applications, Self::APPLICATIONS),
        ]
        .into_iter()
        .filter_map(|(enabled, flag)| enabled.then_some(flag))
        .collect()
    }
}

impl Lease {
    /// Switch the operating mode directly.
    ///
    /// Only [`OperatingMode::Run`] is accepted; edit mode is entered with
    /// [`Lease::enter_edit_mode`] so that it shows up on the scope stack. Fails
    /// with `OrderingViolation` while a scope is open.
    pub fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<()> {
        if mode == OperatingMode::Edit {
            return Err(RpcError::InvalidArgument(
                "edit mode is entered with enter_edit_mode".to_string(),
            ));
        }
        if let Some(frame) = self.scopes.last() {
            return Err(RpcError::OrderingViolation(format!(
                "operating mode is held by open {:?} scope",
                frame.kind
            )));
        }
        self.session_call("setOperatingMode", &[Value::Int(mode as i32)])?;
        Ok(())
    }

    /// Export the whole device configuration.
    pub fn export_config(&mut self) -> Result<Vec<u8>> {
        self.with_long_operation(|lease| {
            let blob = lease.session_call("exportConfig", &[])?;
            let config = to_bytes(&blob, "exported configuration")?;
            lease.wait_for_export()?;
            lease.cleanup_export()?;
            lease.main_call("waitForConfigurationDone", &[])?;
            info!(bytes = config.len(), "configuration exported");
            Ok(config)
        })
    }

    /// Import a configuration blob produced by [`Lease::export_config`].
    pub fn import_config(&mut self, config: &[u8], scope: ImportScope) -> Result<()> {
        let flags = scope.flags();
        if flags.is_empty() {
            return Err(RpcError::InvalidArgument(
                "import scope selects nothing".to_string(),
            ));
        }

        self.with_long_operation(|lease| {
            for flag in flags {
                lease.session_call(
                    "importConfig",
                    &[Value::Base64(config.to_vec()), Value::Int(flag)],
                )?;
            }
            lease.wait_for_import()?;
            lease.main_call("waitForConfigurationDone", &[])?;
            info!(bytes = config.len(), ?scope, "configuration imported");
            Ok(())
        })
    }

    /// Export one application.
    pub fn export_application(&mut self, index: u32) -> Result<Vec<u8>> {
        let index = index_arg(index)?;
        self.with_long_operation(|lease| {
            let blob = lease.session_call("exportApplication", &[index])?;
            let application = to_bytes(&blob, "exported application")?;
            lease.wait_for_export()?;
            lease.cleanup_export()?;
            Ok(application)
        })
    }

    /// Import an application blob; returns its new index.
    pub fn import_application(&mut self, application: &[u8]) -> Result<u32> {
        self.with_long_operation(|lease| {
            let reply =
                lease.session_call("importApplication", &[Value::Base64(application.to_vec())])?;
            let index = to_u32(&reply, "imported application index")?;
            lease.wait_for_import()?;
            info!(index, "application imported");
            Ok(index)
        })
    }

    /// Progress of the running import, 1.0 when none is running.
    pub fn import_progress(&mut self) -> Result<f64> {
        let reply = self.session_call("getImportProgress", &[]);
        progress_value(reply, IMPORT_IDLE_FAULT, "import progress")
    }

    /// Progress of the running export, 1.0 when none is running.
    pub fn export_progress(&mut self) -> Result<f64> {
        let reply = self.session_call("getExportProgress", &[]);
        progress_value(reply, EXPORT_IDLE_FAULT, "export progress")
    }

    /// Release the device-side buffers of a finished export.
    pub fn cleanup_export(&mut self) -> Result<()> {
        self.session_call("cleanupExport", &[])?;
        Ok(())
    }

    /// Details of application `index` as the device's JSON document.
    pub fn application_details(&mut self, index: u32) -> Result<serde_json::Value> {
        let reply = self.session_call("getApplicationDetails", &[index_arg(index)?])?;
        to_json(&reply, "application details")
    }

    /// Reset the trigger statistics of the active application.
    pub fn reset_statistics(&mut self) -> Result<()> {
        self.session_call("resetStatistics", &[])?;
        self.main_call("waitForConfigurationDone", &[])?;
        Ok(())
    }

    fn wait_for_export(&mut self) -> Result<()> {
        let (interval, timeout) = (self.config.poll_interval, self.config.poll_timeout);
        poll_until_complete(|| self.export_progress(), interval, timeout)
    }

    fn wait_for_import(&mut self) -> Result<()> {
        let (interval, timeout) = (self.config.poll_interval, self.config.poll_timeout);
        poll_until_complete(|| self.import_progress(), interval, timeout)
    }
}

pub(crate) fn index_arg(index: u32) -> Result<Value> {
    i32::try_from(index)
        .map(Value::Int)
        .map_err(|_| RpcError::InvalidArgument(format!("index {index} out of range")))
}

/// Progress reported as a plain number.
pub(crate) fn plain_progress(reply: Result<Value>, what: &str) -> Result<f64> {
    to_f64(&reply?, what)
}
