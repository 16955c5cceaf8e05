//! PCIC client for vision sensors.
//!
//! A [`PcicLink`] owns one TCP connection to the device's process interface.
//! Commands are sent under ticket `1000` and answered in order; unsolicited
//! results (ticket `0000`) are queued while a reply is awaited and handed out
//! by [`PcicLink::read_next_async`].

pub mod connector;
pub mod demux;
pub mod error;
pub mod error_codes;
pub mod image_stream;
pub mod link;
pub mod model;
pub mod response;

pub use connector::{connect, connect_with_config, PcicConfig, DEFAULT_PCIC_PORT};
pub use demux::{PendingCall, TicketDemux, DEFAULT_MAX_ASYNC_QUEUE};
pub use error::{PcicError, Result};
pub use error_codes::error_message;
pub use image_stream::{image_output_schema, ImageFrame, ImageStream};
pub use link::{LinkState, PcicLink, MAX_STRING_CONTAINER_LEN};
pub use model::{
    ApplicationList, DecodingStatistics, DeviceError, DeviceInformation, IoState, OutputMode,
    ProtocolVersion,
};
pub use response::{Reply, ResponseCode};
