//! TCP transport for vision sensor protocols.
//!
//! Both device protocols (the PCIC result stream and the remote configuration
//! endpoint) run over plain TCP. This crate owns connection setup and the
//! transport error taxonomy:
//! - connection refused, timed out and closed are distinct, matchable variants
//! - every blocking operation accepts a caller-supplied timeout
//!
//! Everything else builds on the [`SensorStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::SensorStream;
pub use tcp::connect;

#[cfg(feature = "async")]
pub use tcp::connect_async;
