use std::fmt::Display;
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::SensorStream;

/// Connect to a device (blocking), bounded by `timeout`.
///
/// Every resolved address is tried in order; the error of the last attempt is
/// returned when none succeeds.
pub fn connect<A>(addr: A, timeout: Duration) -> Result<SensorStream>
where
    A: ToSocketAddrs + Display,
{
    let label = addr.to_string();
    let candidates = addr
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: label.clone(),
            source,
        })?;

    let mut last_err = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                debug!(addr = %candidate, "connected to device");
                return Ok(SensorStream::from_tcp(stream));
            }
            Err(err) => {
                debug!(addr = %candidate, error = %err, "connect attempt failed");
                last_err = Some(classify_connect_error(&label, err, timeout));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| TransportError::Resolve {
        addr: label,
        source: std::io::Error::new(ErrorKind::NotFound, "address resolved to nothing"),
    }))
}

fn classify_connect_error(addr: &str, err: std::io::Error, timeout: Duration) -> TransportError {
    match err.kind() {
        ErrorKind::ConnectionRefused => TransportError::ConnectionRefused {
            addr: addr.to_string(),
        },
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::Timeout(timeout),
        _ => TransportError::Connect {
            addr: addr.to_string(),
            source: err,
        },
    }
}

/// Connect to a device from async code, bounded by `timeout`.
#[cfg(feature = "async")]
pub async fn connect_async<A>(addr: A, timeout: Duration) -> Result<tokio::net::TcpStream>
where
    A: tokio::net::ToSocketAddrs + Display,
{
    let label = addr.to_string();
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            stream.set_nodelay(true)?;
            debug!(addr = %label, "connected to device");
            Ok(stream)
        }
        Ok(Err(err)) => Err(classify_connect_error(&label, err, timeout)),
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn connect_to_listening_device() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = std::thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            server.read_exact(&mut buf).unwrap();
            buf
        });

        let mut stream = connect(addr, Duration::from_secs(2)).unwrap();
        stream.write_all(b"hello").unwrap();

        assert_eq!(&handle.join().unwrap(), b"hello");
        assert_eq!(stream.peer_addr(), Some(addr));
    }

    #[test]
    fn refused_connection_is_distinct() {
        // Bind then drop to obtain a port with nothing listening.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let err = connect(addr, Duration::from_secs(2)).unwrap_err();
        assert!(matches!(err, TransportError::ConnectionRefused { .. }));
        assert!(!err.is_timeout());
    }

    #[test]
    fn unresolvable_address_fails_resolution() {
        let err = connect("not an address", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::Resolve { .. }));
    }

    #[test]
    fn classify_timeout_kinds() {
        let timeout = Duration::from_millis(250);
        let err = classify_connect_error(
            "10.0.0.1:50010",
            std::io::Error::from(ErrorKind::TimedOut),
            timeout,
        );
        assert!(matches!(err, TransportError::Timeout(t) if t == timeout));

        let err = classify_connect_error(
            "10.0.0.1:50010",
            std::io::Error::from(ErrorKind::PermissionDenied),
            timeout,
        );
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_connect_reaches_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

        let stream = connect_async(addr, Duration::from_secs(2)).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
        accept.await.unwrap().unwrap();
    }
}
