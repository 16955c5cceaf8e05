//! Remote call transport.
//!
//! [`RpcTransport`] is the single primitive every proxy level is built on:
//! call a named method on an [`Endpoint`] with positional arguments.
//! [`HttpTransport`] speaks XML-RPC over HTTP to a real device.

use std::io::Cursor;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};
use xmlrpc::{Request, Value};

use crate::endpoint::Endpoint;
use crate::error::{Result, RpcError};

/// Default API root on the device's web server.
pub const DEFAULT_API_PATH: &str = "/api/rpc/v1/";

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// API root, with leading and trailing `/`.
    pub api_path: String,
    /// Whole-request timeout (connect, send, receive).
    pub timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            api_path: DEFAULT_API_PATH.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Call a named remote method.
///
/// Implementations must be shareable with the lease heartbeat thread.
pub trait RpcTransport: Send + Sync {
    /// Invoke `method` on `endpoint` and return its value.
    ///
    /// A device fault is returned as [`RpcError::Fault`].
    fn call(&self, endpoint: &Endpoint, method: &str, args: &[Value]) -> Result<Value>;
}

/// XML-RPC over blocking HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Transport for the device at `host` (`"192.168.0.69"` or `"host:8080"`).
    pub fn new(host: &str, config: &RpcConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| RpcError::Http(err.to_string()))?;

        let mut api_path = config.api_path.trim_matches('/').to_string();
        if !api_path.is_empty() {
            api_path.push('/');
        }

        Ok(Self {
            client,
            base_url: format!("http://{host}/{api_path}"),
            timeout: config.timeout,
        })
    }

    /// Full URL of `endpoint`.
    pub fn url(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .map_err(|err| self.classify(url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http(format!("{url} answered {status}")));
        }

        let bytes = response.bytes().map_err(|err| self.classify(url, err))?;
        Ok(bytes.to_vec())
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> RpcError {
        if err.is_timeout() {
            RpcError::Timeout(self.timeout)
        } else if err.is_connect() {
            RpcError::ConnectionRefused(url.to_string())
        } else {
            RpcError::Http(err.to_string())
        }
    }
}

impl RpcTransport for HttpTransport {
    fn call(&self, endpoint: &Endpoint, method: &str, args: &[Value]) -> Result<Value> {
        let request = args
            .iter()
            .cloned()
            .fold(Request::new(method), |request, arg| request.arg(arg));

        let mut body = Vec::new();
        request.write_as_xml(&mut body)?;

        let url = self.url(endpoint);
        debug!(%url, method, "rpc call");
        let response = self.post(&url, body)?;
        trace!(method, bytes = response.len(), "rpc response");

        request.call(Replay(response)).map_err(from_xmlrpc)
    }
}

/// Hands an already-received response body to the xmlrpc parser.
struct Replay(Vec<u8>);

impl xmlrpc::Transport for Replay {
    type Stream = Cursor<Vec<u8>>;

    fn transmit(
        self,
        _request: &Request<'_>,
    ) -> std::result::Result<Self::Stream, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Cursor::new(self.0))
    }
}

fn from_xmlrpc(err: xmlrpc::Error) -> RpcError {
    match err.fault() {
        Some(fault) => RpcError::Fault {
            code: fault.fault_code,
            message: fault.fault_string.clone(),
        },
        None => RpcError::Xml(err.to_string()),
    }
}
