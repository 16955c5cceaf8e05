//! Scoped edit sessions.
//!
//! Edit mode, the edited application and the edited imager form a stack on
//! top of a [`Lease`]. Each level is a guard that mutably borrows its parent,
//! so only the innermost scope can be used, and each guard issues its
//! teardown call when it is exited or dropped.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};
use xmlrpc::Value;

use crate::device::parse_application_list;
use crate::endpoint::Endpoint;
use crate::error::{combine, Result, RpcError};
use crate::lease::Lease;
use crate::progress::poll_until_complete;
use crate::session::{index_arg, plain_progress};
use crate::value::{
    member, to_array, to_bool, to_i64, to_json, to_parameters, to_struct, to_text, to_u32,
    Parameters,
};

/// Longest application name the device accepts.
pub const MAX_NAME_LEN: usize = 64;

/// Longest application description the device accepts.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// What a scope frame holds open on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Edit,
    Application(u32),
    Imager(u32),
}

/// One open scope on a lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFrame {
    pub kind: ScopeKind,
    pub endpoint: Endpoint,
}

/// Type of application to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationKind {
    Camera,
    WithModels,
}

impl ApplicationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Camera => "Camera",
            Self::WithModels => "WithModels",
        }
    }
}

/// A validation problem reported by `validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFault {
    pub id: i64,
    pub text: String,
}

/// An imager configuration of the edited application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagerConfig {
    pub id: u32,
    pub name: String,
    pub kind: String,
}

/// Rectangular or elliptic region, in the device's JSON shape.
pub type Region = serde_json::Value;

/// Arguments for `startCalculateAutofocus`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutofocusRequest {
    /// Regions of interest.
    #[serde(rename = "ROIs", skip_serializing_if = "Vec::is_empty")]
    pub rois: Vec<Region>,
    /// Regions of disinterest.
    #[serde(rename = "RODs", skip_serializing_if = "Vec::is_empty")]
    pub rods: Vec<Region>,
}

/// Arguments for `startCalculateExposureTime`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoExposureRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_analog_gain_factor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_analog_gain_factor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturated_ratio: Option<f64>,
    #[serde(rename = "ROIs", skip_serializing_if = "Vec::is_empty")]
    pub rois: Vec<Region>,
    #[serde(rename = "RODs", skip_serializing_if = "Vec::is_empty")]
    pub rods: Vec<Region>,
}

/// Full-sensor region used when only disinterest regions are given.
pub fn full_frame_region() -> Region {
    serde_json::json!({
        "id": 0,
        "group": 0,
        "type": "Rect",
        "width": 1280,
        "height": 960,
        "angle": 0,
        "center_x": 640,
        "center_y": 480
    })
}

fn with_default_roi(rois: &[Region], rods: &[Region]) -> Vec<Region> {
    if rois.is_empty() && !rods.is_empty() {
        vec![full_frame_region()]
    } else {
        rois.to_vec()
    }
}

fn ensure_top(lease: &Lease, kind: ScopeKind) -> Result<()> {
    match lease.scopes.last() {
        Some(top) if top.kind == kind => Ok(()),
        Some(top) => Err(RpcError::OrderingViolation(format!(
            "{kind:?} used while {:?} is open",
            top.kind
        ))),
        None => Err(RpcError::OrderingViolation(format!("{kind:?} is not open"))),
    }
}

fn pop_frame(lease: &mut Lease, kind: ScopeKind) -> Result<()> {
    match lease.scopes.last() {
        Some(top) if top.kind == kind => {
            lease.scopes.pop();
            Ok(())
        }
        Some(top) => Err(RpcError::OrderingViolation(format!(
            "cannot exit {kind:?} while {:?} is still open",
            top.kind
        ))),
        None => Err(RpcError::OrderingViolation(format!(
            "cannot exit {kind:?}, it is not open"
        ))),
    }
}

fn scoped_call(
    lease: &mut Lease,
    kind: ScopeKind,
    endpoint: &Endpoint,
    method: &str,
    args: &[Value],
) -> Result<Value> {
    ensure_top(lease, kind)?;
    lease.call(endpoint, method, args)
}

impl Lease {
    /// Put the device into edit mode.
    pub fn enter_edit_mode(&mut self) -> Result<EditScope<'_>> {
        if let Some(top) = self.scopes.last() {
            return Err(RpcError::AlreadyEditing(format!(
                "edit mode already entered ({:?} open)",
                top.kind
            )));
        }
        self.session_call("setOperatingMode", &[Value::Int(1)])?;

        let endpoint = self.endpoint.edit();
        self.scopes.push(ScopeFrame {
            kind: ScopeKind::Edit,
            endpoint: endpoint.clone(),
        });
        info!(session = %self.session_id(), "entered edit mode");
        Ok(EditScope {
            lease: self,
            endpoint,
            released: false,
        })
    }

    /// Run `body` in edit mode, leaving edit mode afterwards whatever happens.
    pub fn edit<T>(&mut self, body: impl FnOnce(&mut EditScope<'_>) -> Result<T>) -> Result<T> {
        let mut scope = self.enter_edit_mode()?;
        let result = body(&mut scope);
        combine(result, scope.exit())
    }
}

/// Device in edit mode. Dropping the guard returns the device to run mode.
#[derive(Debug)]
pub struct EditScope<'a> {
    lease: &'a mut Lease,
    endpoint: Endpoint,
    released: bool,
}

impl EditScope<'_> {
    /// Open application `index` for editing.
    pub fn enter_application_edit(&mut self, index: u32) -> Result<ApplicationScope<'_>> {
        if let Some(open) = self
            .lease
            .scopes
            .iter()
            .find(|f| matches!(f.kind, ScopeKind::Application(_)))
        {
            return Err(RpcError::AlreadyEditing(format!(
                "{:?} is already being edited",
                open.kind
            )));
        }
        self.call("editApplication", &[index_arg(index)?])?;

        let endpoint = self.endpoint.application();
        self.lease.scopes.push(ScopeFrame {
            kind: ScopeKind::Application(index),
            endpoint: endpoint.clone(),
        });
        info!(application = index, "editing application");
        Ok(ApplicationScope {
            lease: &mut *self.lease,
            endpoint,
            index,
            released: false,
        })
    }

    /// Run `body` with application `index` open, closing it afterwards.
    pub fn application<T>(
        &mut self,
        index: u32,
        body: impl FnOnce(&mut ApplicationScope<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut scope = self.enter_application_edit(index)?;
        let result = body(&mut scope);
        combine(result, scope.exit())
    }

    /// Open scopes on the underlying lease, outermost first.
    pub fn stack(&self) -> &[ScopeFrame] {
        self.lease.scopes()
    }

    /// Create an application; returns its index.
    pub fn create_application(&mut self, kind: ApplicationKind) -> Result<u32> {
        let reply = self.call("createApplication", &[Value::String(kind.as_str().into())])?;
        to_u32(&reply, "created application index")
    }

    /// Copy application `index`; returns the index of the copy.
    pub fn copy_application(&mut self, index: u32) -> Result<u32> {
        let reply = self.call("copyApplication", &[index_arg(index)?])?;
        to_u32(&reply, "copied application index")
    }

    pub fn delete_application(&mut self, index: u32) -> Result<()> {
        self.call("deleteApplication", &[index_arg(index)?])?;
        Ok(())
    }

    /// Rename application `index`. Name and description are limited to
    /// [`MAX_NAME_LEN`] and [`MAX_DESCRIPTION_LEN`] characters.
    pub fn change_name_and_description(
        &mut self,
        index: u32,
        name: &str,
        description: &str,
    ) -> Result<()> {
        if name.chars().count() > MAX_NAME_LEN {
            return Err(RpcError::InvalidArgument(format!(
                "application name longer than {MAX_NAME_LEN} characters"
            )));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(RpcError::InvalidArgument(format!(
                "application description longer than {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        self.call(
            "changeNameAndDescription",
            &[
                index_arg(index)?,
                Value::String(name.to_string()),
                Value::String(description.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Move the application at list position `from` to position `to`.
    pub fn move_application(&mut self, from: u32, to: u32) -> Result<()> {
        ensure_top(self.lease, ScopeKind::Edit)?;
        let list = self.lease.main_call("getApplicationList", &[])?;
        let entries = parse_application_list(&list)?;
        if !entries.iter().any(|e| e.index == from) {
            return Err(RpcError::NotFound(format!("application {from}")));
        }

        let moves = entries
            .iter()
            .map(|entry| {
                let index = if entry.index == from { to } else { entry.index };
                let mut members = BTreeMap::new();
                members.insert("Id".to_string(), index_arg(entry.id)?);
                members.insert("Index".to_string(), index_arg(index)?);
                Ok(Value::Struct(members))
            })
            .collect::<Result<Vec<_>>>()?;
        self.call("moveApplications", &[Value::Array(moves)])?;
        Ok(())
    }

    /// Protect the next edit session with `password`.
    ///
    /// Lost on reboot unless followed by [`save_device_config`](Self::save_device_config).
    pub fn activate_password(&mut self, password: &str) -> Result<()> {
        self.device_call("activatePassword", &[Value::String(password.to_string())])?;
        info!("session password activated");
        Ok(())
    }

    /// Remove the session password protection.
    pub fn disable_password(&mut self) -> Result<()> {
        self.device_call("disablePassword", &[])?;
        info!("session password disabled");
        Ok(())
    }

    /// Persist device-level settings so they survive a reboot.
    pub fn save_device_config(&mut self) -> Result<()> {
        self.device_call("save", &[])?;
        Ok(())
    }

    /// Leave edit mode.
    pub fn exit(mut self) -> Result<()> {
        self.release()
    }

    fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        scoped_call(self.lease, ScopeKind::Edit, &self.endpoint, method, args)
    }

    fn device_call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        let device = self.endpoint.device();
        scoped_call(self.lease, ScopeKind::Edit, &device, method, args)
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        pop_frame(self.lease, ScopeKind::Edit)?;
        let session = self.lease.endpoint().clone();
        self.lease
            .teardown_call(&session, "setOperatingMode", &[Value::Int(0)])?;
        info!("left edit mode");
        Ok(())
    }
}

impl Drop for EditScope<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.release() {
                warn!(error = %err, "leaving edit mode on drop failed");
            }
        }
    }
}

/// An application open for editing. Dropping the guard stops editing it.
#[derive(Debug)]
pub struct ApplicationScope<'a> {
    lease: &'a mut Lease,
    endpoint: Endpoint,
    index: u32,
    released: bool,
}

impl ApplicationScope<'_> {
    /// Index of the edited application.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn stack(&self) -> &[ScopeFrame] {
        self.lease.scopes()
    }

    /// Open imager configuration `index`.
    ///
    /// Fails with `NotFound` if the application has no such imager; the
    /// application scope stays open.
    pub fn enter_imager_edit(&mut self, index: u32) -> Result<ImagerScope<'_>> {
        let imagers = self.imager_config_list()?;
        if !imagers.iter().any(|imager| imager.id == index) {
            return Err(RpcError::NotFound(format!(
                "imager {index} in application {}",
                self.index
            )));
        }

        let endpoint = self.endpoint.imager(index);
        self.lease.scopes.push(ScopeFrame {
            kind: ScopeKind::Imager(index),
            endpoint: endpoint.clone(),
        });
        debug!(application = self.index, imager = index, "editing imager");
        Ok(ImagerScope {
            lease: &mut *self.lease,
            endpoint,
            index,
            released: false,
        })
    }

    /// Run `body` with imager `index` open.
    pub fn imager<T>(
        &mut self,
        index: u32,
        body: impl FnOnce(&mut ImagerScope<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut scope = self.enter_imager_edit(index)?;
        let result = body(&mut scope);
        combine(result, scope.exit())
    }

    pub fn get_parameter(&mut self, name: &str) -> Result<String> {
        let reply = self.call("getParameter", &[Value::String(name.to_string())])?;
        to_text(&reply, name)
    }

    pub fn get_all_parameters(&mut self) -> Result<Parameters> {
        let reply = self.call("getAllParameters", &[])?;
        to_parameters(&reply, "application parameters")
    }

    /// Parameter limits as the device's JSON-like struct.
    pub fn get_all_parameter_limits(&mut self) -> Result<Parameters> {
        let reply = self.call("getAllParameterLimits", &[])?;
        to_parameters(&reply, "application parameter limits")
    }

    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        self.call(
            "setParameter",
            &[Value::String(name.to_string()), Value::String(value.to_string())],
        )?;
        Ok(())
    }

    /// Persist the edited application and wait until it is applied.
    pub fn save(&mut self) -> Result<()> {
        self.call("save", &[])?;
        self.call("waitForConfigurationDone", &[])?;
        info!(application = self.index, "application saved");
        Ok(())
    }

    /// Validation problems of the edited application; empty when valid.
    pub fn validate(&mut self) -> Result<Vec<ValidationFault>> {
        let reply = self.call("validate", &[])?;
        to_array(&reply, "validation result")?
            .iter()
            .map(|fault| {
                let members = to_struct(fault, "validation fault")?;
                Ok(ValidationFault {
                    id: to_i64(member(members, "Id", "validation fault")?, "Id")?,
                    text: members
                        .get("Text")
                        .map(|t| to_text(t, "Text"))
                        .transpose()?
                        .unwrap_or_default(),
                })
            })
            .collect()
    }

    pub fn imager_config_list(&mut self) -> Result<Vec<ImagerConfig>> {
        let reply = self.call("getImagerConfigList", &[])?;
        to_array(&reply, "imager config list")?
            .iter()
            .map(|entry| {
                let members = to_struct(entry, "imager config")?;
                let text = |name: &str| -> Result<String> {
                    members
                        .get(name)
                        .map(|v| to_text(v, name))
                        .transpose()
                        .map(Option::unwrap_or_default)
                };
                Ok(ImagerConfig {
                    id: to_u32(member(members, "Id", "imager config")?, "Id")?,
                    name: text("Name")?,
                    kind: text("Type")?,
                })
            })
            .collect()
    }

    pub fn available_imager_config_types(&mut self) -> Result<Vec<String>> {
        let reply = self.call("availableImagerConfigTypes", &[])?;
        to_array(&reply, "imager config types")?
            .iter()
            .map(|t| to_text(t, "imager config type"))
            .collect()
    }

    /// Add an imager configuration of `kind` (usually `"normal"`); returns its id.
    pub fn create_imager_config(&mut self, kind: &str) -> Result<u32> {
        let reply = self.call("createImagerConfig", &[Value::String(kind.to_string())])?;
        let id = to_u32(&reply, "created imager id")?;
        self.call("waitForConfigurationDone", &[])?;
        Ok(id)
    }

    pub fn copy_imager_config(&mut self, index: u32) -> Result<u32> {
        let reply = self.call("copyImagerConfig", &[index_arg(index)?])?;
        let id = to_u32(&reply, "copied imager id")?;
        self.call("waitForConfigurationDone", &[])?;
        Ok(id)
    }

    pub fn delete_imager_config(&mut self, index: u32) -> Result<()> {
        self.call("deleteImagerConfig", &[index_arg(index)?])?;
        self.call("waitForConfigurationDone", &[])?;
        Ok(())
    }

    pub fn is_configuration_done(&mut self) -> Result<bool> {
        let reply = self.call("isConfigurationDone", &[])?;
        to_bool(&reply, "configuration done")
    }

    /// Stop editing the application.
    pub fn exit(mut self) -> Result<()> {
        self.release()
    }

    fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        scoped_call(
            self.lease,
            ScopeKind::Application(self.index),
            &self.endpoint,
            method,
            args,
        )
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        pop_frame(self.lease, ScopeKind::Application(self.index))?;
        let edit = self.lease.endpoint().edit();
        self.lease.teardown_call(&edit, "stopEditingApplication", &[])?;
        info!(application = self.index, "stopped editing application");
        Ok(())
    }
}

impl Drop for ApplicationScope<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.release() {
                warn!(application = self.index, error = %err, "stop editing on drop failed");
            }
        }
    }
}

/// An imager configuration open for editing.
///
/// The device has no remote call to close an imager; exiting only pops the frame.
#[derive(Debug)]
pub struct ImagerScope<'a> {
    lease: &'a mut Lease,
    endpoint: Endpoint,
    index: u32,
    released: bool,
}

impl ImagerScope<'_> {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn stack(&self) -> &[ScopeFrame] {
        self.lease.scopes()
    }

    pub fn get_parameter(&mut self, name: &str) -> Result<String> {
        let reply = self.call("getParameter", &[Value::String(name.to_string())])?;
        to_text(&reply, name)
    }

    pub fn get_all_parameters(&mut self) -> Result<Parameters> {
        let reply = self.call("getAllParameters", &[])?;
        to_parameters(&reply, "imager parameters")
    }

    pub fn get_all_parameter_limits(&mut self) -> Result<Parameters> {
        let reply = self.call("getAllParameterLimits", &[])?;
        to_parameters(&reply, "imager parameter limits")
    }

    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        self.call(
            "setParameter",
            &[Value::String(name.to_string()), Value::String(value.to_string())],
        )?;
        Ok(())
    }

    /// Start the autofocus calculation and wait for it to finish.
    pub fn start_calculate_autofocus(&mut self, request: &AutofocusRequest) -> Result<()> {
        let request = AutofocusRequest {
            rois: with_default_roi(&request.rois, &request.rods),
            rods: request.rods.clone(),
        };
        let json = serde_json::to_string(&request)?;
        self.call("startCalculateAutofocus", &[Value::String(json)])?;
        self.poll("getProgressCalculateAutofocus")
    }

    pub fn stop_calculate_autofocus(&mut self) -> Result<()> {
        self.call("stopCalculateAutofocus", &[])?;
        Ok(())
    }

    /// Focus distances found by the last autofocus run.
    pub fn autofocus_distances(&mut self) -> Result<Vec<f64>> {
        let reply = self.call("getAutofocusDistances", &[])?;
        let text = to_text(&reply, "autofocus distances")?;
        text.split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| {
                d.parse::<f64>().map_err(|_| RpcError::UnexpectedValue {
                    what: "autofocus distance".to_string(),
                    got: d.to_string(),
                })
            })
            .collect()
    }

    /// Start the exposure time calculation and wait for it to finish.
    pub fn start_calculate_exposure_time(&mut self, request: &AutoExposureRequest) -> Result<()> {
        let request = AutoExposureRequest {
            rois: with_default_roi(&request.rois, &request.rods),
            ..request.clone()
        };
        let json = serde_json::to_string(&request)?;
        self.call("startCalculateExposureTime", &[Value::String(json)])?;
        self.poll("getProgressCalculateExposureTime")
    }

    /// Result of the last exposure calculation, `None` if there is none.
    pub fn auto_exposure_result(&mut self) -> Result<Option<serde_json::Value>> {
        let reply = self.call("getAutoExposureResult", &[])?;
        if to_text(&reply, "auto exposure result")?.trim().is_empty() {
            return Ok(None);
        }
        to_json(&reply, "auto exposure result").map(Some)
    }

    /// Close the imager scope.
    pub fn exit(mut self) -> Result<()> {
        self.release()
    }

    fn poll(&mut self, method: &str) -> Result<()> {
        let config = self.lease.config().clone();
        poll_until_complete(
            || plain_progress(self.call(method, &[]), method),
            config.poll_interval,
            config.poll_timeout,
        )
    }

    fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        scoped_call(
            self.lease,
            ScopeKind::Imager(self.index),
            &self.endpoint,
            method,
            args,
        )
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        pop_frame(self.lease, ScopeKind::Imager(self.index))?;
        debug!(imager = self.index, "closed imager");
        Ok(())
    }
}

impl Drop for ImagerScope<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.release() {
                warn!(imager = self.index, error = %err, "closing imager scope on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use super::*;
    use crate::lease::LeaseConfig;
    use crate::mock::{entry, fault, MockTransport, SESSION_ID};

    fn lease(transport: &std::sync::Arc<MockTransport>) -> Lease {
        let config = LeaseConfig {
            poll_interval: std::time::Duration::from_millis(1),
            ..Default::default()
        };
        Lease::open(transport.clone(), None, None, config).expect("open lease")
    }

    fn kinds(frames: &[ScopeFrame]) -> Vec<ScopeKind> {
        frames.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn nested_scopes_tear_down_in_reverse() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);

        lease
            .edit(|edit| {
                edit.application(1, |app| {
                    app.imager(2, |imager| {
                        assert_eq!(
                            kinds(imager.stack()),
                            vec![
                                ScopeKind::Edit,
                                ScopeKind::Application(1),
                                ScopeKind::Imager(2)
                            ]
                        );
                        imager.set_parameter("ExposureTime", "5000")
                    })
                })
            })
            .expect("edit session");

        assert!(lease.scopes().is_empty());
        assert_eq!(
            transport.methods_without_heartbeats(),
            vec![
                "requestSession",
                "setOperatingMode",
                "editApplication",
                "getImagerConfigList",
                "setParameter",
                "stopEditingApplication",
                "setOperatingMode",
            ]
        );

        let calls = transport.calls();
        let session = format!("com.ifm.efector/session_{SESSION_ID}/");
        let by_method = |m: &str| calls.iter().filter(|c| c.method == m).cloned().collect::<Vec<_>>();
        assert_eq!(by_method("editApplication")[0].endpoint, format!("{session}edit/"));
        assert_eq!(
            by_method("setParameter")[0].endpoint,
            format!("{session}edit/application/imager_002/")
        );
        assert_eq!(
            by_method("stopEditingApplication")[0].endpoint,
            format!("{session}edit/")
        );
        let modes = by_method("setOperatingMode");
        assert_eq!(modes[0].args, vec![Value::Int(1)]);
        assert_eq!(modes[1].args, vec![Value::Int(0)]);
    }

    #[test]
    fn missing_imager_leaves_application_open() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);
        let mut edit = lease.enter_edit_mode().expect("edit");
        let mut app = edit.enter_application_edit(3).expect("application");

        let err = app.enter_imager_edit(99).expect_err("no imager 99");
        assert!(matches!(err, RpcError::NotFound(_)));
        assert_eq!(
            kinds(app.stack()),
            vec![ScopeKind::Edit, ScopeKind::Application(3)]
        );

        // Still usable.
        app.set_parameter("Name", "pallets").expect("set");
        app.exit().expect("exit application");
        edit.exit().expect("exit edit");
        assert!(lease.scopes().is_empty());
    }

    #[test]
    fn out_of_order_exit_fails_fast() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);
        let mut edit = lease.enter_edit_mode().expect("edit");
        let app = edit.enter_application_edit(1).expect("application");
        mem::forget(app);

        let err = edit.exit().expect_err("application still open");
        assert!(matches!(err, RpcError::OrderingViolation(_)));
        assert_eq!(
            kinds(lease.scopes()),
            vec![ScopeKind::Edit, ScopeKind::Application(1)]
        );
        assert_eq!(transport.count("stopEditingApplication"), 0);
        assert_eq!(transport.count("setOperatingMode"), 1);
    }

    #[test]
    fn second_application_is_already_editing() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);
        let mut edit = lease.enter_edit_mode().expect("edit");
        mem::forget(edit.enter_application_edit(1).expect("first"));

        let err = edit.enter_application_edit(2).expect_err("second");
        assert!(matches!(err, RpcError::AlreadyEditing(_)));
        assert_eq!(transport.count("editApplication"), 1);
    }

    #[test]
    fn parent_calls_fail_while_child_is_open() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);
        let mut edit = lease.enter_edit_mode().expect("edit");
        mem::forget(edit.enter_application_edit(1).expect("application"));

        let err = edit.create_application(ApplicationKind::Camera).expect_err("shadowed");
        assert!(matches!(err, RpcError::OrderingViolation(_)));
        assert_eq!(transport.count("createApplication"), 0);
    }

    #[test]
    fn device_config_goes_to_device_endpoint() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);

        lease
            .edit(|edit| {
                edit.activate_password("hunter2")?;
                edit.save_device_config()?;
                edit.disable_password()
            })
            .expect("device config");

        let device = format!("com.ifm.efector/session_{SESSION_ID}/edit/device/");
        let calls: Vec<_> = transport
            .calls()
            .into_iter()
            .filter(|c| c.endpoint == device)
            .collect();
        let methods: Vec<_> = calls.iter().map(|c| c.method.as_str()).collect();
        assert_eq!(methods, vec!["activatePassword", "save", "disablePassword"]);
        assert_eq!(calls[0].args, vec![Value::String("hunter2".into())]);
    }

    #[test]
    fn device_config_needs_edit_on_top() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);
        let mut edit = lease.enter_edit_mode().expect("edit");
        mem::forget(edit.enter_application_edit(1).expect("application"));

        assert!(matches!(
            edit.save_device_config(),
            Err(RpcError::OrderingViolation(_))
        ));
        assert_eq!(transport.count("save"), 0);
    }

    #[test]
    fn teardown_runs_when_body_fails() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);

        let err = lease
            .edit(|edit| {
                edit.application(1, |_| -> Result<()> {
                    Err(RpcError::InvalidArgument("bad value".into()))
                })
            })
            .expect_err("body failed");
        assert!(matches!(err, RpcError::InvalidArgument(_)));
        assert_eq!(transport.count("stopEditingApplication"), 1);
        assert_eq!(transport.count("setOperatingMode"), 2);
        assert!(lease.scopes().is_empty());
    }

    #[test]
    fn body_and_teardown_failures_are_both_reported() {
        let transport = MockTransport::with_handler(|call| {
            (call.method == "stopEditingApplication").then(|| Err(fault(101020, "not editing")))
        });
        let mut lease = lease(&transport);

        let err = lease
            .edit(|edit| {
                edit.application(1, |_| -> Result<()> {
                    Err(RpcError::NotFound("parameter".into()))
                })
            })
            .expect_err("both failed");
        match err {
            RpcError::Teardown { cause, teardown } => {
                assert!(matches!(*cause, RpcError::NotFound(_)));
                assert_eq!(teardown.fault_code(), Some(101020));
            }
            other => panic!("expected combined error, got {other}"),
        }
        // Edit mode is still left after the application teardown failed.
        assert_eq!(transport.count("setOperatingMode"), 2);
        assert!(lease.scopes().is_empty());
    }

    #[test]
    fn dropped_guards_release() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);
        {
            let mut edit = lease.enter_edit_mode().expect("edit");
            let _app = edit.enter_application_edit(1).expect("application");
        }
        assert!(lease.scopes().is_empty());
        assert_eq!(
            transport.methods_without_heartbeats()[1..],
            [
                "setOperatingMode",
                "editApplication",
                "stopEditingApplication",
                "setOperatingMode"
            ]
        );
    }

    #[test]
    fn cancel_abandons_open_scopes() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);
        mem::forget(lease.enter_edit_mode().expect("edit"));
        lease.cancel().expect("cancel");
        assert!(lease.scopes().is_empty());
        assert!(matches!(
            lease.set_operating_mode(crate::OperatingMode::Run),
            Err(RpcError::LeaseCancelled)
        ));
    }

    #[test]
    fn operating_mode_is_locked_while_editing() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);
        mem::forget(lease.enter_edit_mode().expect("edit"));
        assert!(matches!(
            lease.set_operating_mode(crate::OperatingMode::Run),
            Err(RpcError::OrderingViolation(_))
        ));
    }

    #[test]
    fn name_and_description_limits() {
        let transport = MockTransport::device();
        let mut lease = lease(&transport);
        lease
            .edit(|edit| {
                let long_name = "n".repeat(MAX_NAME_LEN + 1);
                assert!(matches!(
                    edit.change_name_and_description(1, &long_name, ""),
                    Err(RpcError::InvalidArgument(_))
                ));
                let long_desc = "d".repeat(MAX_DESCRIPTION_LEN + 1);
                assert!(matches!(
                    edit.change_name_and_description(1, "ok", &long_desc),
                    Err(RpcError::InvalidArgument(_))
                ));
                edit.change_name_and_description(1, &"n".repeat(MAX_NAME_LEN), "fine")
            })
            .expect("edit");
        assert_eq!(transport.count("changeNameAndDescription"), 1);
    }

    #[test]
    fn move_application_rewrites_one_index() {
        let transport = MockTransport::with_handler(|call| {
            (call.method == "getApplicationList").then(|| {
                Ok(Value::Array(vec![
                    entry(&[("Index", Value::Int(1)), ("Id", Value::Int(476707713))]),
                    entry(&[("Index", Value::Int(2)), ("Id", Value::Int(476707714))]),
                ]))
            })
        });
        let mut lease = lease(&transport);
        lease.edit(|edit| edit.move_application(2, 5)).expect("move");

        let calls = transport.calls();
        let moved = calls
            .iter()
            .find(|c| c.method == "moveApplications")
            .expect("moveApplications call");
        assert_eq!(
            moved.args,
            vec![Value::Array(vec![
                entry(&[("Id", Value::Int(476707713)), ("Index", Value::Int(1))]),
                entry(&[("Id", Value::Int(476707714)), ("Index", Value::Int(5))]),
            ])]
        );
        let listed = calls
            .iter()
            .find(|c| c.method == "getApplicationList")
            .expect("list call");
        assert_eq!(listed.endpoint, "com.ifm.efector/");
    }

    #[test]
    fn application_level_operations() {
        let transport = MockTransport::with_handler(|call| match call.method.as_str() {
            "createImagerConfig" => Some(Ok(Value::Int(3))),
            "validate" => Some(Ok(Value::Array(vec![entry(&[
                ("Id", Value::Int(1003)),
                ("Text", Value::String("exposure too long".into())),
            ])]))),
            "getAllParameters" => Some(Ok(entry(&[
                ("Name", Value::String("pallets".into())),
                ("TriggerMode", Value::String("1".into())),
            ]))),
            _ => None,
        });
        let mut lease = lease(&transport);

        lease
            .edit(|edit| {
                edit.application(1, |app| {
                    assert_eq!(app.create_imager_config("normal")?, 3);
                    let faults = app.validate()?;
                    assert_eq!(faults[0].id, 1003);
                    assert_eq!(faults[0].text, "exposure too long");
                    assert_eq!(app.get_all_parameters()?["TriggerMode"], "1");
                    let ids: Vec<u32> = app.imager_config_list()?.iter().map(|i| i.id).collect();
                    assert_eq!(ids, vec![1, 2]);
                    app.save()
                })
            })
            .expect("edit");
        assert_eq!(transport.count("waitForConfigurationDone"), 2);
    }

    #[test]
    fn autofocus_defaults_roi_and_polls() {
        let transport = MockTransport::with_handler(|call| match call.method.as_str() {
            "getAutofocusDistances" => Some(Ok(Value::String("0.42, 0.9,".into()))),
            "getAutoExposureResult" => Some(Ok(Value::String(String::new()))),
            _ => None,
        });
        let mut lease = lease(&transport);

        lease
            .edit(|edit| {
                edit.application(1, |app| {
                    app.imager(1, |imager| {
                        let request = AutofocusRequest {
                            rois: Vec::new(),
                            rods: vec![serde_json::json!({"id": 1, "type": "Rect"})],
                        };
                        imager.start_calculate_autofocus(&request)?;
                        assert_eq!(imager.autofocus_distances()?, vec![0.42, 0.9]);
                        assert_eq!(imager.auto_exposure_result()?, None);
                        Ok(())
                    })
                })
            })
            .expect("autofocus");

        let calls = transport.calls();
        let start = calls
            .iter()
            .find(|c| c.method == "startCalculateAutofocus")
            .expect("start call");
        let Value::String(json) = &start.args[0] else {
            panic!("autofocus request is not a string: {:?}", start.args);
        };
        let sent: serde_json::Value = serde_json::from_str(json).expect("json");
        assert_eq!(sent["ROIs"][0]["width"], 1280);
        assert_eq!(sent["RODs"][0]["id"], 1);
        assert_eq!(transport.count("getProgressCalculateAutofocus"), 1);
    }

    #[test]
    fn exposure_request_uses_device_field_names() {
        let request = AutoExposureRequest {
            min_analog_gain_factor: Some(1),
            max_analog_gain_factor: Some(8),
            saturated_ratio: Some(0.1),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).expect("json");
        assert_eq!(json["minAnalogGainFactor"], 1);
        assert_eq!(json["maxAnalogGainFactor"], 8);
        assert_eq!(json["saturatedRatio"], 0.1);
        assert!(json.get("ROIs").is_none());
    }
}
