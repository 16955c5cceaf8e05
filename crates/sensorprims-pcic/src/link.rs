//! The PCIC link: one TCP connection, one command in flight at a time.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use sensorprims_chunk::{decode_chunks_bytes, ResultChunk};
use sensorprims_frame::{FrameError, Ticket};
use sensorprims_transport::SensorStream;

use crate::connector::{open_stream, PcicConfig, StreamDemux};
use crate::error::{PcicError, Result};
use crate::error_codes::TRIGGER_NOT_ALLOWED;
use crate::model::{
    ApplicationList, DecodingStatistics, DeviceError, DeviceInformation, IoState, OutputMode,
    ProtocolVersion,
};
use crate::response::{Reply, ResponseCode};

/// Largest payload accepted by a string container.
pub const MAX_STRING_CONTAINER_LEN: usize = 256;

const LENGTH_PREFIX_DIGITS: usize = 9;
const MAX_TWO_DIGIT: u8 = 99;
const MAX_INDICATOR_SECS: u16 = 999;
// A zero socket timeout is rejected by the OS.
const MIN_POLL_WAIT: Duration = Duration::from_millis(1);

/// Connection state of a [`PcicLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    /// A trigger was issued and its result has not been read yet.
    TriggerPending,
}

struct Connection {
    demux: StreamDemux,
    control: SensorStream,
}

/// Synchronous PCIC client bound to one device.
///
/// Every method takes `&mut self`, so commands on one link never overlap.
/// Share a link between threads behind a `Mutex`.
///
/// Any transport, framing or timeout failure closes the connection and
/// leaves the link [`LinkState::Disconnected`]; call [`PcicLink::reconnect`]
/// to continue.
pub struct PcicLink {
    addr: String,
    config: PcicConfig,
    state: LinkState,
    conn: Option<Connection>,
}

impl PcicLink {
    pub(crate) fn open(addr: String, config: PcicConfig) -> Result<Self> {
        let mut link = Self {
            addr,
            config,
            state: LinkState::Disconnected,
            conn: None,
        };
        link.reconnect()?;
        Ok(link)
    }

    /// Drop the current connection (if any) and open a fresh one.
    pub fn reconnect(&mut self) -> Result<()> {
        self.disconnect();
        let (demux, control) = open_stream(&self.addr, &self.config)?;
        self.conn = Some(Connection { demux, control });
        self.state = LinkState::Connected;
        Ok(())
    }

    /// Close the connection. Queued asynchronous frames are dropped.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(err) = conn.control.shutdown() {
                tracing::debug!(addr = %self.addr, error = %err, "socket shutdown failed");
            }
            tracing::debug!(addr = %self.addr, "pcic connection closed");
        }
        self.state = LinkState::Disconnected;
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn config(&self) -> &PcicConfig {
        &self.config
    }

    /// Asynchronous frames received while waiting for replies and not yet read.
    pub fn queued_async(&self) -> usize {
        self.conn.as_ref().map_or(0, |conn| conn.demux.queued())
    }

    /// Send a raw command and return the reply body.
    pub fn send_command(&mut self, command: &[u8]) -> Result<Bytes> {
        let result = self.demux()?.send_and_await(Ticket::COMMAND, command);
        match result {
            Ok(frame) => Ok(frame.body),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// `aNN`: activate application `number`.
    pub fn activate_application(&mut self, number: u8) -> Result<()> {
        check_two_digit(number, "application number")?;
        self.expect_ack(format!("a{number:02}").as_bytes())
    }

    /// `A?`: applications stored on the device.
    pub fn application_list(&mut self) -> Result<ApplicationList> {
        let data = self.expect_data(b"A?")?;
        ApplicationList::parse(&String::from_utf8_lossy(&data))
    }

    /// `T?`: trigger and wait for the result in the reply.
    pub fn execute_synchronous_trigger(&mut self) -> Result<Bytes> {
        if !self.is_connected() {
            return Err(PcicError::NotConnected);
        }
        self.state = LinkState::TriggerPending;
        let body = self.send_command(b"T?")?;
        self.state = LinkState::Connected;

        match Reply::classify(&body) {
            Reply::Data(data) => Ok(data),
            Reply::Status(ResponseCode::Success) => Ok(body),
            Reply::Status(code) => Err(self.trigger_refusal(code)),
        }
    }

    /// `t`: trigger; the result arrives later through [`PcicLink::read_next_async`].
    pub fn execute_asynchronous_trigger(&mut self) -> Result<()> {
        let body = self.send_command(b"t")?;
        match Reply::classify(&body) {
            Reply::Status(ResponseCode::Success) => {
                self.state = LinkState::TriggerPending;
                Ok(())
            }
            Reply::Status(code) => Err(self.trigger_refusal(code)),
            Reply::Data(data) => Err(unexpected("t", &data)),
        }
    }

    /// Next unsolicited frame body, waiting up to the configured I/O timeout.
    pub fn read_next_async(&mut self) -> Result<Bytes> {
        let result = self.demux()?.read_next_async();
        match result {
            Ok(frame) => {
                self.state = LinkState::Connected;
                Ok(frame.body)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Like [`PcicLink::read_next_async`] with a one-off timeout; `None` waits forever.
    pub fn read_next_async_timeout(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        self.set_read_timeout(timeout)?;
        let result = self.read_next_async();
        if self.is_connected() {
            self.set_read_timeout(Some(self.config.io_timeout))?;
        }
        result.map_err(|err| match (err, timeout) {
            (PcicError::Timeout(_), Some(timeout)) => PcicError::Timeout(timeout),
            (err, _) => err,
        })
    }

    /// Wait up to `wait` for an unsolicited frame; `Ok(None)` if none arrived.
    ///
    /// Unlike [`PcicLink::read_next_async_timeout`], running out of time is not
    /// an error and the link stays connected. Part of a frame received before
    /// the wait ended stays buffered for the next call.
    pub fn poll_next_async(&mut self, wait: Duration) -> Result<Option<Bytes>> {
        self.set_read_timeout(Some(wait.max(MIN_POLL_WAIT)))?;
        let result = self.demux()?.read_next_async();
        if self.is_connected() {
            self.set_read_timeout(Some(self.config.io_timeout))?;
        }
        match result {
            Ok(frame) => {
                self.state = LinkState::Connected;
                Ok(Some(frame.body))
            }
            Err(PcicError::Frame(FrameError::Timeout)) => Ok(None),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// `oNNs`: set digital output `id` and return the echoed state.
    pub fn set_io_state(&mut self, id: u8, high: bool) -> Result<IoState> {
        check_two_digit(id, "io id")?;
        let data = self.expect_data(format!("o{id:02}{}", u8::from(high)).as_bytes())?;
        IoState::parse(&String::from_utf8_lossy(&data))
    }

    /// `ONN?`: read digital output `id`.
    pub fn io_state(&mut self, id: u8) -> Result<IoState> {
        check_two_digit(id, "io id")?;
        let data = self.expect_data(format!("O{id:02}?").as_bytes())?;
        IoState::parse(&String::from_utf8_lossy(&data))
    }

    /// `c`: replace the process interface output schema for this connection.
    pub fn upload_output_schema(&mut self, schema: &serde_json::Value) -> Result<()> {
        let json = serde_json::to_string(schema)?;
        let mut command = format!("c{:0width$}", json.len(), width = LENGTH_PREFIX_DIGITS);
        command.push_str(&json);
        self.expect_ack(command.as_bytes())
    }

    /// `C?`: the output schema currently in use.
    pub fn output_schema(&mut self) -> Result<serde_json::Value> {
        let data = self.expect_data(b"C?")?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// `jNN`: overwrite string container `id` with `data` (at most 256 bytes).
    pub fn overwrite_string_container(&mut self, id: u8, data: &[u8]) -> Result<()> {
        check_two_digit(id, "container id")?;
        if data.len() > MAX_STRING_CONTAINER_LEN {
            return Err(PcicError::InvalidArgument(format!(
                "string container data is {} bytes, max {MAX_STRING_CONTAINER_LEN}",
                data.len()
            )));
        }
        let mut command =
            format!("j{id:02}{:0width$}", data.len(), width = LENGTH_PREFIX_DIGITS).into_bytes();
        command.extend_from_slice(data);
        self.expect_ack(&command)
    }

    /// `JNN?`: contents of string container `id`.
    pub fn read_string_container(&mut self, id: u8) -> Result<Bytes> {
        check_two_digit(id, "container id")?;
        let data = self.expect_data(format!("J{id:02}?").as_bytes())?;
        split_length_prefixed(&data)
    }

    /// `E?`: current device error state. `$` becomes `DeviceRefused { Unknown }`.
    pub fn request_error_state(&mut self) -> Result<DeviceError> {
        let body = self.send_command(b"E?")?;
        match Reply::classify(&body) {
            Reply::Data(data) => DeviceError::parse(&String::from_utf8_lossy(&data)),
            Reply::Status(code) => Err(PcicError::DeviceRefused { code, reason: None }),
        }
    }

    /// `p<d>`: select which asynchronous output this connection receives.
    pub fn set_output_mode(&mut self, mode: OutputMode) -> Result<()> {
        self.expect_ack(format!("p{}", mode.digit()).as_bytes())
    }

    /// `INN?`: chunks of the last image with the given id.
    pub fn request_last_image(&mut self, id: u8) -> Result<Vec<ResultChunk>> {
        check_two_digit(id, "image id")?;
        let data = self.expect_data(format!("I{id:02}?").as_bytes())?;
        let region = split_length_prefixed(&data)?;
        Ok(decode_chunks_bytes(region)?)
    }

    /// `S?`: decoding statistics of the active application.
    pub fn decoding_statistics(&mut self) -> Result<DecodingStatistics> {
        let data = self.expect_data(b"S?")?;
        DecodingStatistics::parse(&String::from_utf8_lossy(&data))
    }

    /// `V?`
    pub fn protocol_version(&mut self) -> Result<ProtocolVersion> {
        let data = self.expect_data(b"V?")?;
        ProtocolVersion::parse(&String::from_utf8_lossy(&data))
    }

    /// `vNN`
    pub fn set_protocol_version(&mut self, version: u8) -> Result<()> {
        check_two_digit(version, "protocol version")?;
        self.expect_ack(format!("v{version:02}").as_bytes())
    }

    /// `G?`
    pub fn device_information(&mut self) -> Result<DeviceInformation> {
        let data = self.expect_data(b"G?")?;
        Ok(DeviceInformation::parse(&String::from_utf8_lossy(&data)))
    }

    /// `L?`: id the device assigned to this connection.
    pub fn connection_id(&mut self) -> Result<u16> {
        let data = self.expect_data(b"L?")?;
        let text = String::from_utf8_lossy(&data);
        text.trim()
            .parse()
            .map_err(|_| PcicError::UnexpectedResponse(format!("connection id {text:?}")))
    }

    /// `g<d>`: switch the gated software trigger on or off.
    pub fn gated_trigger(&mut self, on: bool) -> Result<()> {
        self.expect_ack(format!("g{}", u8::from(on)).as_bytes())
    }

    /// `d<s><NNN>`: view indicator on for `duration_secs` (0 = permanently), or off.
    pub fn set_view_indicator(&mut self, on: bool, duration_secs: u16) -> Result<()> {
        if duration_secs > MAX_INDICATOR_SECS {
            return Err(PcicError::InvalidArgument(format!(
                "indicator duration {duration_secs}s exceeds {MAX_INDICATOR_SECS}s"
            )));
        }
        self.expect_ack(format!("d{}{duration_secs:03}", u8::from(on)).as_bytes())
    }

    /// `b`: run the configured button function.
    pub fn execute_button_function(&mut self) -> Result<()> {
        self.expect_ack(b"b")
    }

    /// `H?`: command help text.
    pub fn available_commands(&mut self) -> Result<String> {
        let data = self.expect_data(b"H?")?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    fn demux(&mut self) -> Result<&mut StreamDemux> {
        self.conn
            .as_mut()
            .map(|conn| &mut conn.demux)
            .ok_or(PcicError::NotConnected)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(PcicError::NotConnected)?;
        conn.control.set_read_timeout(timeout)?;
        Ok(())
    }

    fn expect_ack(&mut self, command: &[u8]) -> Result<()> {
        let body = self.send_command(command)?;
        match Reply::classify(&body) {
            Reply::Status(ResponseCode::Success) => Ok(()),
            Reply::Status(code) => Err(self.refusal(code)),
            Reply::Data(data) => Err(unexpected(&String::from_utf8_lossy(command), &data)),
        }
    }

    fn expect_data(&mut self, command: &[u8]) -> Result<Bytes> {
        let body = self.send_command(command)?;
        match Reply::classify(&body) {
            Reply::Data(data) => Ok(data),
            Reply::Status(ResponseCode::Success) => {
                Err(unexpected(&String::from_utf8_lossy(command), &body))
            }
            Reply::Status(code) => Err(self.refusal(code)),
        }
    }

    fn refusal(&mut self, code: ResponseCode) -> PcicError {
        let reason = if code == ResponseCode::Refused && self.config.explain_refusals {
            match self.pending_error() {
                Ok(error) => error.map(|error| error.describe()),
                Err(err) => return err,
            }
        } else {
            None
        };
        PcicError::DeviceRefused { code, reason }
    }

    fn trigger_refusal(&mut self, code: ResponseCode) -> PcicError {
        if code != ResponseCode::Refused {
            return PcicError::DeviceRefused { code, reason: None };
        }
        match self.pending_error() {
            Ok(Some(error)) if TRIGGER_NOT_ALLOWED.contains(&error.code) => {
                PcicError::InvalidState {
                    code: error.code,
                    message: error.describe(),
                }
            }
            Ok(error) => PcicError::DeviceBusy {
                reason: error.map(|error| error.describe()),
            },
            Err(err) => err,
        }
    }

    /// The device error state, if it reports one.
    fn pending_error(&mut self) -> Result<Option<DeviceError>> {
        let body = self.send_command(b"E?")?;
        Ok(match Reply::classify(&body) {
            Reply::Data(data) => DeviceError::parse(&String::from_utf8_lossy(&data))
                .ok()
                .filter(DeviceError::is_error),
            Reply::Status(_) => None,
        })
    }

    /// Tear the connection down on errors that leave the stream in an unknown state.
    fn fail(&mut self, err: PcicError) -> PcicError {
        if !err.is_fatal() {
            return err;
        }
        let err = match err {
            PcicError::Frame(FrameError::Timeout) => PcicError::Timeout(self.config.io_timeout),
            PcicError::Frame(FrameError::ConnectionClosed) => {
                PcicError::Disconnected("connection closed by device".to_string())
            }
            other => other,
        };
        tracing::warn!(addr = %self.addr, error = %err, "closing pcic connection after error");
        self.disconnect();
        err
    }
}

impl Drop for PcicLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for PcicLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcicLink")
            .field("addr", &self.addr)
            .field("state", &self.state)
            .field("queued_async", &self.queued_async())
            .finish()
    }
}

fn check_two_digit(value: u8, what: &str) -> Result<()> {
    if value > MAX_TWO_DIGIT {
        return Err(PcicError::InvalidArgument(format!(
            "{what} {value} does not fit in two digits"
        )));
    }
    Ok(())
}

fn unexpected(command: &str, body: &[u8]) -> PcicError {
    const PREVIEW: usize = 32;
    let shown = &body[..body.len().min(PREVIEW)];
    PcicError::UnexpectedResponse(format!(
        "{command:?} answered {:?}",
        String::from_utf8_lossy(shown)
    ))
}

/// Split `<9-digit length><data>` and check the length matches.
fn split_length_prefixed(data: &Bytes) -> Result<Bytes> {
    if data.len() < LENGTH_PREFIX_DIGITS
        || !data[..LENGTH_PREFIX_DIGITS].iter().all(u8::is_ascii_digit)
    {
        return Err(PcicError::UnexpectedResponse(
            "reply does not start with a 9-digit length".to_string(),
        ));
    }
    let declared = data[..LENGTH_PREFIX_DIGITS]
        .iter()
        .fold(0usize, |acc, digit| acc * 10 + usize::from(digit - b'0'));
    let payload = data.slice(LENGTH_PREFIX_DIGITS..);
    if payload.len() != declared {
        return Err(PcicError::UnexpectedResponse(format!(
            "reply declares {declared} bytes but carries {}",
            payload.len()
        )));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefixed_split() {
        let data = Bytes::from_static(b"000000005hello");
        assert_eq!(split_length_prefixed(&data).unwrap().as_ref(), b"hello");

        let empty = Bytes::from_static(b"000000000");
        assert!(split_length_prefixed(&empty).unwrap().is_empty());
    }

    #[test]
    fn length_prefixed_mismatch() {
        let data = Bytes::from_static(b"000000009hello");
        assert!(matches!(
            split_length_prefixed(&data),
            Err(PcicError::UnexpectedResponse(_))
        ));
        let short = Bytes::from_static(b"12");
        assert!(split_length_prefixed(&short).is_err());
    }

    #[test]
    fn two_digit_bounds() {
        assert!(check_two_digit(99, "x").is_ok());
        assert!(matches!(
            check_two_digit(100, "x"),
            Err(PcicError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unexpected_preview_is_truncated() {
        let body = vec![b'x'; 100];
        let PcicError::UnexpectedResponse(message) = unexpected("t", &body) else {
            panic!("expected unexpected-response error");
        };
        assert!(message.len() < 60);
    }
}
