//! Process interface and remote configuration client for vision sensors.
//!
//! sensorprims talks to smart cameras over their two network interfaces: the
//! PCIC process interface (triggers, results, images, I/O) and the XML-RPC
//! configuration endpoint (sessions, edit mode, parameters).
//!
//! # Crate Structure
//!
//! - [`transport`] - TCP connection with connect and I/O timeouts
//! - [`frame`] - PCIC ticket/length framing
//! - [`chunk`] - Result chunk decoding (images, metadata)
//! - [`pcic`] - PCIC link, ticket demultiplexing, image streaming (behind `pcic` feature)
//! - [`rpc`] - Configuration sessions and edit scopes (behind `rpc` feature)

/// Re-export transport types.
pub mod transport {
    pub use sensorprims_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sensorprims_frame::*;
}

/// Re-export chunk decoding types.
pub mod chunk {
    pub use sensorprims_chunk::*;
}

/// Re-export PCIC client types (requires `pcic` feature).
#[cfg(feature = "pcic")]
pub mod pcic {
    pub use sensorprims_pcic::*;
}

/// Re-export remote configuration types (requires `rpc` feature).
#[cfg(feature = "rpc")]
pub mod rpc {
    pub use sensorprims_rpc::*;
}
