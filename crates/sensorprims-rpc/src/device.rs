//! Main-level client: device information and run-mode operations.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use tracing::{debug, info, warn};
use xmlrpc::Value;

use crate::endpoint::Endpoint;
use crate::error::{Result, RpcError};
use crate::lease::{Lease, LeaseConfig};
use crate::session::index_arg;
use crate::transport::{HttpTransport, RpcConfig, RpcTransport};
use crate::value::{
    member, to_array, to_bool, to_bytes, to_json, to_parameters, to_struct, to_text, to_u32,
    Parameters,
};

/// Fault raised by `getParameter` for an unknown parameter name.
pub const UNKNOWN_PARAMETER_FAULT: i32 = 101000;

/// Fault raised by `trigger` while the device cannot take a software trigger.
pub const TRIGGER_REJECTED_FAULT: i32 = 101024;

/// Delay between software trigger attempts rejected with [`TRIGGER_REJECTED_FAULT`].
pub const TRIGGER_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Software trigger attempts before a rejection is returned to the caller.
pub const MAX_TRIGGER_ATTEMPTS: u32 = 50;

/// One entry of the device's application list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationEntry {
    /// Position in the list, used by the PCIC activate command.
    pub index: u32,
    /// Stable identifier.
    pub id: u32,
    pub name: String,
    pub description: String,
}

/// System to boot into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootMode {
    Productive = 0,
    Recovery = 1,
}

/// Client for the device's main configuration object.
pub struct DeviceClient {
    transport: Arc<dyn RpcTransport>,
}

impl DeviceClient {
    /// Client for `host` with default settings.
    pub fn connect(host: &str) -> Result<Self> {
        Self::connect_with_config(host, &RpcConfig::default())
    }

    pub fn connect_with_config(host: &str, config: &RpcConfig) -> Result<Self> {
        let transport = HttpTransport::new(host, config)?;
        debug!(url = %transport.url(&Endpoint::main()), "rpc client");
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Client over any transport.
    pub fn with_transport(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }

    /// Value of one device parameter. Unknown names fail with `NotFound`.
    pub fn get_parameter(&self, name: &str) -> Result<String> {
        match self.call("getParameter", &[Value::String(name.to_string())]) {
            Ok(value) => to_text(&value, name),
            Err(RpcError::Fault { code, .. }) if code == UNKNOWN_PARAMETER_FAULT => {
                Err(RpcError::NotFound(format!("parameter {name:?}")))
            }
            Err(err) => Err(err),
        }
    }

    pub fn get_all_parameters(&self) -> Result<Parameters> {
        let reply = self.call("getAllParameters", &[])?;
        to_parameters(&reply, "device parameters")
    }

    /// Versions of all software components.
    pub fn sw_version(&self) -> Result<Parameters> {
        let reply = self.call("getSWVersion", &[])?;
        to_parameters(&reply, "software version")
    }

    /// Hardware information of all components.
    pub fn hw_info(&self) -> Result<Parameters> {
        let reply = self.call("getHWInfo", &[])?;
        to_parameters(&reply, "hardware info")
    }

    /// Kernel message buffer.
    pub fn dmesg_data(&self) -> Result<String> {
        let reply = self.call("getDmesgData", &[])?;
        to_text(&reply, "dmesg")
    }

    pub fn application_list(&self) -> Result<Vec<ApplicationEntry>> {
        let reply = self.call("getApplicationList", &[])?;
        parse_application_list(&reply)
    }

    /// Activate application `index` (run mode only) and wait until it is applied.
    pub fn switch_application(&self, index: u32) -> Result<()> {
        self.call("switchApplication", &[index_arg(index)?])?;
        self.wait_for_configuration_done()?;
        info!(application = index, "switched application");
        Ok(())
    }

    /// Last `count` entries of the device log; 0 fetches all.
    pub fn trace_logs(&self, count: u32) -> Result<Vec<String>> {
        let reply = self.call("getTraceLogs", &[index_arg(count)?])?;
        to_array(&reply, "trace logs")?
            .iter()
            .map(|line| to_text(line, "trace log line"))
            .collect()
    }

    /// Statistics of application `index`, refreshed by the device every 15 s.
    pub fn application_statistics(&self, index: u32) -> Result<serde_json::Value> {
        let reply = self.call("getApplicationStatisticData", &[index_arg(index)?])?;
        to_json(&reply, "application statistics")
    }

    /// Reference image of the active application.
    pub fn reference_image(&self) -> Result<DynamicImage> {
        let reply = self.call("getReferenceImage", &[])?;
        let jpeg = to_bytes(&reply, "reference image")?;
        Ok(image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)?)
    }

    pub fn is_configuration_done(&self) -> Result<bool> {
        let reply = self.call("isConfigurationDone", &[])?;
        to_bool(&reply, "configuration done")
    }

    /// Block on the device until pending parameter changes are applied.
    pub fn wait_for_configuration_done(&self) -> Result<()> {
        self.call("waitForConfigurationDone", &[])?;
        Ok(())
    }

    /// Fire a software trigger.
    ///
    /// The device rejects triggers with fault 101024 while it is busy with a
    /// mode change; those are retried every [`TRIGGER_RETRY_DELAY`], up to
    /// [`MAX_TRIGGER_ATTEMPTS`] attempts.
    pub fn trigger(&self) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.call("trigger", &[]) {
                Ok(_) => return Ok(()),
                Err(RpcError::Fault { code, .. })
                    if code == TRIGGER_REJECTED_FAULT && attempt < MAX_TRIGGER_ATTEMPTS =>
                {
                    debug!(attempt, "trigger rejected, retrying");
                    attempt += 1;
                    thread::sleep(TRIGGER_RETRY_DELAY);
                }
                Err(err) => {
                    if err.fault_code() == Some(TRIGGER_REJECTED_FAULT) {
                        warn!(attempts = attempt, "trigger still rejected, giving up");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Measure geometric properties with the active calibration.
    ///
    /// `input` and the result are the device's JSON measure objects.
    pub fn measure(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let reply = self.call("measure", &[Value::String(serde_json::to_string(input)?)])?;
        to_json(&reply, "measure result")
    }

    /// Whether the device reports itself reachable.
    pub fn ping(&self) -> Result<bool> {
        let reply = self.call("doPing", &[])?;
        Ok(to_text(&reply, "ping")? == "up")
    }

    pub fn reboot(&self, mode: RebootMode) -> Result<()> {
        self.call("reboot", &[Value::Int(mode as i32)])?;
        info!(?mode, "reboot requested");
        Ok(())
    }

    /// Open a configuration session.
    pub fn request_session(
        &self,
        password: Option<&str>,
        session_id: Option<&str>,
        config: LeaseConfig,
    ) -> Result<Lease> {
        Lease::open(Arc::clone(&self.transport), password, session_id, config)
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        self.transport.call(&Endpoint::main(), method, args)
    }
}

impl fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceClient").finish_non_exhaustive()
    }
}

pub(crate) fn parse_application_list(value: &Value) -> Result<Vec<ApplicationEntry>> {
    to_array(value, "application list")?
        .iter()
        .map(|item| {
            let members = to_struct(item, "application entry")?;
            let text = |name: &str| -> Result<String> {
                members
                    .get(name)
                    .map(|v| to_text(v, name))
                    .transpose()
                    .map(Option::unwrap_or_default)
            };
            Ok(ApplicationEntry {
                index: to_u32(member(members, "Index", "application entry")?, "Index")?,
                id: to_u32(member(members, "Id", "application entry")?, "Id")?,
                name: text("Name")?,
                description: text("Description")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::GrayImage;

    use super::*;
    use crate::mock::{entry, fault, MockTransport};

    #[test]
    fn unknown_parameter_is_not_found() {
        let transport = MockTransport::with_handler(|call| {
            (call.method == "getParameter").then(|| Err(fault(101000, "unknown parameter")))
        });
        let client = DeviceClient::with_transport(transport);
        assert!(matches!(
            client.get_parameter("NoSuchThing"),
            Err(RpcError::NotFound(_))
        ));
    }

    #[test]
    fn other_faults_pass_through() {
        let transport = MockTransport::with_handler(|call| {
            (call.method == "getParameter").then(|| Err(fault(101024, "not in run mode")))
        });
        let client = DeviceClient::with_transport(transport);
        assert_eq!(
            client.get_parameter("Name").expect_err("fault").fault_code(),
            Some(101024)
        );
    }

    #[test]
    fn application_list_is_typed() {
        let transport = MockTransport::with_handler(|call| {
            (call.method == "getApplicationList").then(|| {
                Ok(Value::Array(vec![entry(&[
                    ("Index", Value::Int(1)),
                    ("Id", Value::String("476707713".into())),
                    ("Name", Value::String("pallets".into())),
                ])]))
            })
        });
        let client = DeviceClient::with_transport(transport);
        let apps = client.application_list().expect("list");
        assert_eq!(
            apps,
            vec![ApplicationEntry {
                index: 1,
                id: 476707713,
                name: "pallets".into(),
                description: String::new(),
            }]
        );
    }

    #[test]
    fn switch_application_waits() {
        let transport = MockTransport::device();
        let client = DeviceClient::with_transport(transport.clone());
        client.switch_application(2).expect("switch");
        assert_eq!(
            transport.methods(),
            vec!["switchApplication", "waitForConfigurationDone"]
        );
        assert_eq!(transport.calls()[0].args, vec![Value::Int(2)]);
    }

    #[test]
    fn reference_image_decodes_jpeg() {
        let mut jpeg = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 8, image::Luma([128])))
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .expect("encode");
        let bytes = jpeg.into_inner();

        let transport = MockTransport::with_handler(move |call| {
            (call.method == "getReferenceImage").then(|| Ok(Value::Base64(bytes.clone())))
        });
        let client = DeviceClient::with_transport(transport);
        let image = client.reference_image().expect("image");
        assert_eq!((image.width(), image.height()), (16, 8));
    }

    #[test]
    fn broken_reference_image_is_an_image_error() {
        let transport = MockTransport::with_handler(|call| {
            (call.method == "getReferenceImage").then(|| Ok(Value::Base64(b"nope".to_vec())))
        });
        let client = DeviceClient::with_transport(transport);
        assert!(matches!(client.reference_image(), Err(RpcError::Image(_))));
    }

    #[test]
    fn ping_and_logs() {
        let transport = MockTransport::with_handler(|call| match call.method.as_str() {
            "doPing" => Some(Ok(Value::String("up".into()))),
            "getTraceLogs" => Some(Ok(Value::Array(vec![
                Value::String("boot".into()),
                Value::String("ready".into()),
            ]))),
            _ => None,
        });
        let client = DeviceClient::with_transport(transport);
        assert!(client.ping().expect("ping"));
        assert_eq!(client.trace_logs(0).expect("logs"), vec!["boot", "ready"]);
    }

    #[test]
    fn trigger_retries_while_rejected() {
        let mut rejections = 2;
        let transport = MockTransport::with_handler(move |call| {
            (call.method == "trigger").then(|| {
                if rejections > 0 {
                    rejections -= 1;
                    Err(fault(101024, "operation mode does not allow a software trigger"))
                } else {
                    Ok(Value::String(String::new()))
                }
            })
        });
        let client = DeviceClient::with_transport(transport.clone());
        client.trigger().expect("trigger");

        assert_eq!(transport.count("trigger"), 3);
        let calls = transport.calls();
        assert!(calls[1].at.duration_since(calls[0].at) >= TRIGGER_RETRY_DELAY);
        assert!(calls.iter().all(|c| c.endpoint == "com.ifm.efector/"));
    }

    #[test]
    fn trigger_gives_up_after_max_attempts() {
        let transport = MockTransport::with_handler(|call| {
            (call.method == "trigger").then(|| Err(fault(101024, "busy")))
        });
        let client = DeviceClient::with_transport(transport.clone());
        let err = client.trigger().expect_err("rejected");
        assert_eq!(err.fault_code(), Some(101024));
        assert_eq!(transport.count("trigger"), MAX_TRIGGER_ATTEMPTS as usize);
    }

    #[test]
    fn trigger_other_faults_are_not_retried() {
        let transport = MockTransport::with_handler(|call| {
            (call.method == "trigger").then(|| Err(fault(101002, "internal error")))
        });
        let client = DeviceClient::with_transport(transport.clone());
        assert_eq!(client.trigger().expect_err("fault").fault_code(), Some(101002));
        assert_eq!(transport.count("trigger"), 1);
    }

    #[test]
    fn measure_sends_and_parses_json() {
        let transport = MockTransport::with_handler(|call| {
            (call.method == "measure")
                .then(|| Ok(Value::String(r#"{"distance": 412.5}"#.into())))
        });
        let client = DeviceClient::with_transport(transport.clone());
        let input = serde_json::json!({"type": "distance", "points": [[0, 0], [10, 0]]});
        let result = client.measure(&input).expect("measure");

        assert_eq!(result["distance"], 412.5);
        let sent = match &transport.calls()[0].args[0] {
            Value::String(text) => serde_json::from_str::<serde_json::Value>(text).expect("json"),
            other => panic!("unexpected argument {other:?}"),
        };
        assert_eq!(sent, input);
    }

    #[test]
    fn request_session_opens_lease() {
        let transport = MockTransport::device();
        let client = DeviceClient::with_transport(transport.clone());
        let mut lease = client
            .request_session(None, None, LeaseConfig::default())
            .expect("lease");
        lease.cancel().expect("cancel");
        assert_eq!(
            transport.methods(),
            vec!["requestSession", "heartbeat", "cancelSession"]
        );
    }
}
