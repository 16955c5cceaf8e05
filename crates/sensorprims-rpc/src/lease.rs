//! Session lease: request, heartbeat, cancel.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use xmlrpc::Value;

use crate::endpoint::Endpoint;
use crate::error::{combine, Result, RpcError};
use crate::heartbeat::{self, Event, Heartbeat};
use crate::scope::ScopeFrame;
use crate::transport::RpcTransport;
use crate::value::to_text;

/// Configuration for a [`Lease`].
#[derive(Debug, Clone)]
pub struct LeaseConfig {
    /// Interval requested when the session is opened.
    pub heartbeat_interval: Duration,
    /// Interval requested for the duration of exports and imports.
    pub long_operation_interval: Duration,
    /// Delay between progress polls.
    pub poll_interval: Duration,
    /// Give up polling a long operation after this long.
    pub poll_timeout: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            long_operation_interval: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(300),
        }
    }
}

/// Lifecycle of a [`Lease`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    /// Session open, heartbeat running.
    Active,
    /// Session cancelled; every call fails with [`RpcError::LeaseCancelled`].
    Cancelled,
}

/// An open configuration session kept alive by a background heartbeat.
///
/// Dropping the lease cancels the session.
pub struct Lease {
    pub(crate) transport: Arc<dyn RpcTransport>,
    session_id: String,
    pub(crate) endpoint: Endpoint,
    pub(crate) config: LeaseConfig,
    state: LeaseState,
    interval: Duration,
    heartbeat: Option<Heartbeat>,
    failure: Option<String>,
    pub(crate) scopes: Vec<ScopeFrame>,
}

impl Lease {
    /// Request a session on the device and start heartbeating.
    ///
    /// `session_id` asks the device for a specific id; otherwise it picks one.
    pub fn open(
        transport: Arc<dyn RpcTransport>,
        password: Option<&str>,
        session_id: Option<&str>,
        config: LeaseConfig,
    ) -> Result<Self> {
        let mut args = vec![Value::String(password.unwrap_or_default().to_string())];
        if let Some(id) = session_id {
            args.push(Value::String(id.to_string()));
        }
        let reply = transport.call(&Endpoint::main(), "requestSession", &args)?;
        let session_id = to_text(&reply, "session id")?;
        let endpoint = Endpoint::main().session(&session_id);

        // The device may shorten or extend what we ask for.
        let interval =
            match heartbeat::beat(&*transport, &endpoint, config.heartbeat_interval) {
                Ok(interval) => interval,
                Err(err) => {
                    if let Err(cancel) = transport.call(&endpoint, "cancelSession", &[]) {
                        warn!(
                            session = %session_id,
                            error = %cancel,
                            "session cancel after failed heartbeat failed"
                        );
                    }
                    return Err(err);
                }
            };
        let heartbeat = Heartbeat::spawn(Arc::clone(&transport), endpoint.clone(), interval)?;

        info!(session = %session_id, interval = interval.as_secs(), "session opened");
        Ok(Self {
            transport,
            session_id,
            endpoint,
            config,
            state: LeaseState::Active,
            interval,
            heartbeat: Some(heartbeat),
            failure: None,
            scopes: Vec::new(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Session-level endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    /// Open scopes, outermost first.
    pub fn scopes(&self) -> &[ScopeFrame] {
        &self.scopes
    }

    /// Heartbeat interval last granted by the device.
    pub fn heartbeat_interval(&mut self) -> Duration {
        self.fold_events();
        self.interval
    }

    /// Fails if the lease was cancelled or its heartbeat died.
    pub fn check(&mut self) -> Result<()> {
        if self.state == LeaseState::Cancelled {
            return Err(RpcError::LeaseCancelled);
        }
        self.fold_events();
        match &self.failure {
            Some(message) => Err(RpcError::HeartbeatFailed(message.clone())),
            None => Ok(()),
        }
    }

    /// Stop heartbeating and cancel the session on the device.
    ///
    /// The remote cancel is issued once; later calls return `Ok(())`.
    /// Scopes still open are abandoned; the device leaves edit mode on cancel.
    pub fn cancel(&mut self) -> Result<()> {
        if self.state == LeaseState::Cancelled {
            return Ok(());
        }
        self.state = LeaseState::Cancelled;

        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
        if !self.scopes.is_empty() {
            warn!(open = self.scopes.len(), "cancelling session with open scopes");
            self.scopes.clear();
        }

        self.transport
            .call(&self.endpoint, "cancelSession", &[])
            .map(|_| info!(session = %self.session_id, "session cancelled"))
    }

    /// Run a long operation with the heartbeat widened to
    /// `long_operation_interval`, restoring the previous interval afterwards.
    pub fn with_long_operation<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = self.heartbeat_interval();
        let long = self.config.long_operation_interval;
        self.retune(long)?;

        let result = op(self);
        let restored = self.retune(previous).map(|_| ());
        combine(result, restored)
    }

    fn retune(&mut self, interval: Duration) -> Result<Duration> {
        self.check()?;
        let heartbeat = self.heartbeat.as_ref().ok_or(RpcError::LeaseCancelled)?;
        let granted = heartbeat.retune(interval);
        self.fold_events();
        let granted = granted?;
        self.interval = granted;
        Ok(granted)
    }

    fn fold_events(&mut self) {
        let Some(heartbeat) = &self.heartbeat else {
            return;
        };
        for event in heartbeat.drain() {
            match event {
                Event::Beat { interval } => self.interval = interval,
                Event::Failed { message } => self.failure = Some(message),
            }
        }
    }

    /// Call on `endpoint` after checking the lease is healthy.
    pub(crate) fn call(&mut self, endpoint: &Endpoint, method: &str, args: &[Value]) -> Result<Value> {
        self.check()?;
        self.transport.call(endpoint, method, args)
    }

    /// Call used for teardown: attempted even when the heartbeat has failed.
    pub(crate) fn teardown_call(&self, endpoint: &Endpoint, method: &str, args: &[Value]) -> Result<Value> {
        if self.state == LeaseState::Cancelled {
            return Err(RpcError::LeaseCancelled);
        }
        self.transport.call(endpoint, method, args)
    }

    pub(crate) fn session_call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        let endpoint = self.endpoint.clone();
        self.call(&endpoint, method, args)
    }

    pub(crate) fn main_call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        self.call(&Endpoint::main(), method, args)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Err(err) = self.cancel() {
            warn!(session = %self.session_id, error = %err, "session cancel on drop failed");
        }
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .field("interval", &self.interval)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
