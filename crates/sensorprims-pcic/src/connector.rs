use std::time::Duration;

use sensorprims_frame::{FrameConfig, FrameReader, FrameWriter};
use sensorprims_transport::SensorStream;

use crate::demux::{TicketDemux, DEFAULT_MAX_ASYNC_QUEUE};
use crate::error::Result;
use crate::link::PcicLink;

/// Default PCIC TCP port.
pub const DEFAULT_PCIC_PORT: u16 = 50010;

/// Configuration for a PCIC link.
#[derive(Debug, Clone)]
pub struct PcicConfig {
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Timeout for each blocking read or write once connected.
    pub io_timeout: Duration,
    /// Maximum number of unsolicited frames buffered while waiting for a reply.
    pub max_async_queue: usize,
    /// Look up the device error state after a `!` reply to fill in the reason.
    pub explain_refusals: bool,
    /// Frame limits. Read/write timeouts are taken from `io_timeout`.
    pub frame: FrameConfig,
}

impl Default for PcicConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(10),
            max_async_queue: DEFAULT_MAX_ASYNC_QUEUE,
            explain_refusals: true,
            frame: FrameConfig::default(),
        }
    }
}

/// Connect to a device's PCIC port with default configuration.
///
/// `addr` is `host:port`, e.g. `192.168.0.69:50010`.
pub fn connect(addr: impl Into<String>) -> Result<PcicLink> {
    connect_with_config(addr, PcicConfig::default())
}

/// Connect with explicit configuration.
pub fn connect_with_config(addr: impl Into<String>, config: PcicConfig) -> Result<PcicLink> {
    PcicLink::open(addr.into(), config)
}

pub(crate) type StreamDemux = TicketDemux<SensorStream, SensorStream>;

/// Open the socket and build the demultiplexer plus a handle used for teardown.
pub(crate) fn open_stream(addr: &str, config: &PcicConfig) -> Result<(StreamDemux, SensorStream)> {
    let stream = sensorprims_transport::connect(addr, config.connect_timeout)?;
    let reader_stream = stream.try_clone()?;
    let control = stream.try_clone()?;

    let frame_config = FrameConfig {
        read_timeout: Some(config.io_timeout),
        write_timeout: Some(config.io_timeout),
        ..config.frame.clone()
    };
    let reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
    let writer = FrameWriter::with_config_stream(stream, frame_config)?;

    tracing::debug!(addr, "pcic connection established");
    Ok((
        TicketDemux::with_queue_limit(reader, writer, config.max_async_queue),
        control,
    ))
}
