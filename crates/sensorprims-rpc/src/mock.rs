//! Scripted in-memory transport for unit tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use xmlrpc::Value;

use crate::endpoint::Endpoint;
use crate::error::{Result, RpcError};
use crate::transport::RpcTransport;

pub(crate) const SESSION_ID: &str = "7f3c0a9e12d44b6f8a1e5c2d9b0f4e61";

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub endpoint: String,
    pub method: String,
    pub args: Vec<Value>,
    pub at: Instant,
}

type Handler = Box<dyn FnMut(&Call) -> Option<Result<Value>> + Send>;

/// Records every call. The handler may answer a call; unanswered calls fall
/// back to a plausible device reply.
pub(crate) struct MockTransport {
    calls: Mutex<Vec<Call>>,
    handler: Mutex<Handler>,
}

impl MockTransport {
    pub(crate) fn device() -> Arc<Self> {
        Self::with_handler(|_| None)
    }

    pub(crate) fn with_handler(
        handler: impl FnMut(&Call) -> Option<Result<Value>> + Send + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: Mutex::new(Box::new(handler)),
        })
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.method).collect()
    }

    /// Methods called, skipping heartbeats.
    pub(crate) fn methods_without_heartbeats(&self) -> Vec<String> {
        self.methods()
            .into_iter()
            .filter(|m| m != "heartbeat")
            .collect()
    }

    pub(crate) fn count(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }
}

impl RpcTransport for MockTransport {
    fn call(&self, endpoint: &Endpoint, method: &str, args: &[Value]) -> Result<Value> {
        let call = Call {
            endpoint: endpoint.path().to_string(),
            method: method.to_string(),
            args: args.to_vec(),
            at: Instant::now(),
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        let scripted = self.handler.lock().ok().and_then(|mut h| h(&call));
        scripted.unwrap_or_else(|| default_reply(&call))
    }
}

pub(crate) fn fault(code: i32, message: &str) -> RpcError {
    RpcError::Fault {
        code,
        message: message.to_string(),
    }
}

pub(crate) fn entry(pairs: &[(&str, Value)]) -> Value {
    let members: BTreeMap<String, Value> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    Value::Struct(members)
}

fn default_reply(call: &Call) -> Result<Value> {
    let value = match call.method.as_str() {
        "requestSession" => Value::String(SESSION_ID.to_string()),
        "heartbeat" => call.args.first().cloned().unwrap_or(Value::Int(30)),
        "getImagerConfigList" => Value::Array(vec![
            entry(&[("Id", Value::String("1".into())), ("Type", Value::String("normal".into()))]),
            entry(&[("Id", Value::String("2".into())), ("Type", Value::String("normal".into()))]),
        ]),
        "isConfigurationDone" => Value::Bool(true),
        "getImportProgress" => return Err(fault(101107, "no import in progress")),
        "getExportProgress" => return Err(fault(101110, "no export in progress")),
        "getProgressCalculateAutofocus" | "getProgressCalculateExposureTime" => Value::Double(1.0),
        _ => Value::String(String::new()),
    };
    Ok(value)
}
