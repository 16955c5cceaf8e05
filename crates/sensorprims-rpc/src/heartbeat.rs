//! Background heartbeat worker.
//!
//! The worker is the only place the negotiated interval changes. The lease
//! talks to it through a command channel and learns about beats and failures
//! from an event channel.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};
use xmlrpc::Value;

use crate::endpoint::Endpoint;
use crate::error::{Result, RpcError};
use crate::transport::RpcTransport;
use crate::value::to_i64;

pub(crate) enum Command {
    /// Heartbeat now with a new requested interval and report what the device granted.
    Retune {
        interval: Duration,
        reply: Sender<Result<Duration>>,
    },
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Beat { interval: Duration },
    Failed { message: String },
}

pub(crate) struct Heartbeat {
    commands: Sender<Command>,
    events: Receiver<Event>,
    worker: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub(crate) fn spawn(
        transport: Arc<dyn RpcTransport>,
        endpoint: Endpoint,
        interval: Duration,
    ) -> Result<Self> {
        let (commands, command_rx) = mpsc::channel();
        let (event_tx, events) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("sensorprims-heartbeat".to_string())
            .spawn(move || run(&*transport, &endpoint, interval, &command_rx, &event_tx))?;

        Ok(Self {
            commands,
            events,
            worker: Some(worker),
        })
    }

    pub(crate) fn retune(&self, interval: Duration) -> Result<Duration> {
        let (reply, answer) = mpsc::channel();
        self.commands
            .send(Command::Retune { interval, reply })
            .map_err(|_| stopped())?;
        answer.recv().map_err(|_| stopped())?
    }

    pub(crate) fn drain(&self) -> Vec<Event> {
        self.events.try_iter().collect()
    }

    /// Stop the worker and wait for an in-flight heartbeat to finish.
    pub(crate) fn stop(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("heartbeat worker panicked");
            }
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

fn stopped() -> RpcError {
    RpcError::HeartbeatFailed("heartbeat worker stopped".to_string())
}

/// Time to wait before the next beat: one second ahead of expiry.
pub(crate) fn lead_time(interval: Duration) -> Duration {
    if interval > Duration::from_secs(1) {
        interval - Duration::from_secs(1)
    } else {
        interval / 2
    }
}

pub(crate) fn beat(
    transport: &dyn RpcTransport,
    endpoint: &Endpoint,
    interval: Duration,
) -> Result<Duration> {
    let requested = i32::try_from(interval.as_secs()).unwrap_or(i32::MAX);
    let granted = transport.call(endpoint, "heartbeat", &[Value::Int(requested)])?;
    let secs = to_i64(&granted, "heartbeat interval")?;
    u64::try_from(secs)
        .map(Duration::from_secs)
        .map_err(|_| RpcError::unexpected("heartbeat interval", &granted))
}

fn run(
    transport: &dyn RpcTransport,
    endpoint: &Endpoint,
    mut interval: Duration,
    commands: &Receiver<Command>,
    events: &Sender<Event>,
) {
    loop {
        let (requested, reply) = match commands.recv_timeout(lead_time(interval)) {
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => return,
            Ok(Command::Retune { interval, reply }) => (interval, Some(reply)),
            Err(RecvTimeoutError::Timeout) => (interval, None),
        };

        match beat(transport, endpoint, requested) {
            Ok(granted) => {
                debug!(interval = granted.as_secs(), "heartbeat");
                interval = granted;
                let _ = events.send(Event::Beat { interval });
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(granted));
                }
            }
            Err(err) => {
                warn!(error = %err, "heartbeat failed, stopping");
                let _ = events.send(Event::Failed {
                    message: err.to_string(),
                });
                if let Some(reply) = reply {
                    let _ = reply.send(Err(err));
                }
                return;
            }
        }
    }
}
