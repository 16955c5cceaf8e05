//! Remote configuration of vision sensors over XML-RPC.
//!
//! [`DeviceClient`] covers the main level (parameters, versions, application
//! list). Configuration changes need a [`Lease`]: a session kept alive by a
//! background heartbeat and cancelled on drop. Edit mode, the edited
//! application and the edited imager are scope guards stacked on the lease.
//!
//! ```no_run
//! use sensorprims_rpc::{DeviceClient, LeaseConfig};
//!
//! # fn main() -> sensorprims_rpc::Result<()> {
//! let device = DeviceClient::connect("192.168.0.69")?;
//! let mut lease = device.request_session(None, None, LeaseConfig::default())?;
//! lease.edit(|edit| {
//!     edit.application(1, |app| {
//!         app.set_parameter("Name", "pallets")?;
//!         app.save()
//!     })
//! })?;
//! lease.cancel()?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod endpoint;
pub mod error;
mod heartbeat;
pub mod lease;
pub mod progress;
pub mod scope;
pub mod session;
pub mod transport;
pub mod value;

#[cfg(test)]
mod mock;

pub use device::{
    ApplicationEntry, DeviceClient, RebootMode, MAX_TRIGGER_ATTEMPTS, TRIGGER_REJECTED_FAULT,
    TRIGGER_RETRY_DELAY, UNKNOWN_PARAMETER_FAULT,
};
pub use endpoint::Endpoint;
pub use error::{Result, RpcError};
pub use lease::{Lease, LeaseConfig, LeaseState};
pub use progress::{poll_until_complete, EXPORT_IDLE_FAULT, IMPORT_IDLE_FAULT};
pub use scope::{
    full_frame_region, ApplicationKind, ApplicationScope, AutoExposureRequest, AutofocusRequest,
    EditScope, ImagerConfig, ImagerScope, Region, ScopeFrame, ScopeKind, ValidationFault,
    MAX_DESCRIPTION_LEN, MAX_NAME_LEN,
};
pub use session::{ImportScope, OperatingMode};
pub use transport::{HttpTransport, RpcConfig, RpcTransport, DEFAULT_API_PATH};
pub use value::Parameters;
pub use xmlrpc::Value;
