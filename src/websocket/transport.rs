use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use crate::error::{S9Result, S9WebSocketError};
use super::options::ClientOptions;
use super::shared;
use super::tls::TlsTransport;
use super::types::ServerAddress;

// ============================================================================
// Transport - ordered, reliable byte stream
// ============================================================================

/// A connected byte stream the WebSocket codecs run over.
///
/// Implementations only provide the three primitives. [`send_all`](Self::send_all) and
/// [`receive_exact`](Self::receive_exact) are built on top of them and are the only way
/// the client touches the wire, so partial transfers never leak out.
pub trait Transport: Send {
    /// Writes some prefix of `data`, returning how many bytes went out.
    fn send(&mut self, data: &[u8]) -> S9Result<usize>;

    /// Reads into `buffer`, returning how many bytes arrived. 0 means orderly close.
    fn receive(&mut self, buffer: &mut [u8]) -> S9Result<usize>;

    /// Closes the stream. A second call may fail depending on the backend.
    fn shutdown(&mut self) -> S9Result<()>;

    fn receive_exact(&mut self, buffer: &mut [u8]) -> S9Result<()> {
        let mut total_received = 0;
        while total_received < buffer.len() {
            let received = self.receive(&mut buffer[total_received..])?;
            if received == 0 {
                return Err(S9WebSocketError::FrameIo("Connection closed before receiving all data".to_string()));
            }
            total_received += received;
        }
        Ok(())
    }

    fn send_all(&mut self, data: &[u8]) -> S9Result<usize> {
        let mut total_sent = 0;
        while total_sent < data.len() {
            let sent = self.send(&data[total_sent..])?;
            if sent == 0 {
                return Err(S9WebSocketError::FrameIo("Connection closed before sending all data".to_string()));
            }
            total_sent += sent;
        }
        Ok(total_sent)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> S9Result<usize> {
        (**self).send(data)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> S9Result<usize> {
        (**self).receive(buffer)
    }

    fn shutdown(&mut self) -> S9Result<()> {
        (**self).shutdown()
    }
}

// ============================================================================
// PlainTransport - unencrypted TCP
// ============================================================================

pub struct PlainTransport {
    stream: TcpStream,
}

impl PlainTransport {
    pub fn connect(address: SocketAddr, options: &ClientOptions) -> S9Result<PlainTransport> {
        let stream = connect_tcp(address)?;
        shared::configure_stream(&stream, options)?;
        Ok(PlainTransport { stream })
    }
}

impl Transport for PlainTransport {
    #[inline]
    fn send(&mut self, data: &[u8]) -> S9Result<usize> {
        Ok(self.stream.write(data)?)
    }

    #[inline]
    fn receive(&mut self, buffer: &mut [u8]) -> S9Result<usize> {
        Ok(self.stream.read(buffer)?)
    }

    fn shutdown(&mut self) -> S9Result<()> {
        Ok(self.stream.shutdown(Shutdown::Both)?)
    }
}

// ============================================================================
// Connection establishment
// ============================================================================

/// Resolves the host of `address`, taking the first result.
pub fn resolve(address: &ServerAddress) -> S9Result<SocketAddr> {
    let host = address.resolvable_host();
    let mut addrs = (host, address.port).to_socket_addrs().map_err(|e| {
        tracing::error!("Error resolving {}: {}", host, e);
        S9WebSocketError::AddressResolution(format!("{}: {}", host, e))
    })?;
    addrs.next().ok_or_else(|| S9WebSocketError::AddressResolution(format!("{}: no addresses", host)))
}

pub(crate) fn connect_tcp(address: SocketAddr) -> S9Result<TcpStream> {
    TcpStream::connect(address).map_err(|e| {
        tracing::error!("Error connecting to {}: {}", address, e);
        S9WebSocketError::TransportConnect(e)
    })
}

/// Resolves and connects `address`, running the TLS handshake when it is secure.
pub fn connect(address: &ServerAddress, options: &ClientOptions) -> S9Result<Box<dyn Transport>> {
    let socket_addr = resolve(address)?;
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!("Resolved {} to {}", address.host, socket_addr);
    }

    if address.secure {
        let transport = TlsTransport::connect(socket_addr, address.resolvable_host(), options)?;
        Ok(Box::new(transport))
    } else {
        let transport = PlainTransport::connect(socket_addr, options)?;
        Ok(Box::new(transport))
    }
}

// ============================================================================
// In-memory transport for tests
// ============================================================================


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn receive_exact_reassembles_small_chunks() {
        let data: Vec<u8> = (0..=255).collect();
        let mut whole = MockTransport::new(&data, usize::MAX);
        let mut trickle = MockTransport::new(&data, 3);

        let mut a = vec![0u8; data.len()];
        let mut b = vec![0u8; data.len()];
        whole.receive_exact(&mut a).unwrap();
        trickle.receive_exact(&mut b).unwrap();

        assert_eq!(a, data);
        assert_eq!(a, b);
    }

    #[test]
    fn receive_exact_fails_on_early_close() {
        let mut transport = MockTransport::new(b"abc", 1);
        let mut buffer = [0u8; 5];
        let err = transport.receive_exact(&mut buffer).unwrap_err();
        match err {
            S9WebSocketError::FrameIo(msg) => assert_eq!(msg, "Connection closed before receiving all data"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn send_all_loops_over_partial_writes() {
        let mut transport = MockTransport::new(&[], 1);
        let sent = transport.send_all(b"hello world").unwrap();
        assert_eq!(sent, 11);
        assert_eq!(transport.sent, b"hello world");
    }

    #[test]
    fn send_all_fails_on_zero_write() {
        let mut transport = MockTransport::new(&[], 1);
        transport.send_limit = Some(4);
        let err = transport.send_all(b"hello world").unwrap_err();
        assert!(matches!(err, S9WebSocketError::FrameIo(ref msg) if msg == "Connection closed before sending all data"));
        assert_eq!(transport.sent, b"hell");
    }

    #[test]
    fn resolve_fails_for_unknown_host() {
        let address = ServerAddress::new("host.invalid", 80, false);
        assert!(matches!(resolve(&address), Err(S9WebSocketError::AddressResolution(_))));
    }

    #[test]
    fn plain_connect_to_closed_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = PlainTransport::connect(addr, &ClientOptions::new());
        assert!(matches!(result, Err(S9WebSocketError::TransportConnect(_))));
    }
}
