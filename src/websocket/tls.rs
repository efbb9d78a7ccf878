use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use native_tls::{HandshakeError, TlsConnector, TlsStream};
use crate::error::{S9Result, S9WebSocketError};
use super::options::ClientOptions;
use super::shared;
use super::transport::{self, Transport};

// ============================================================================
// TlsSession - TLS context, connection and socket owned together
// ============================================================================

/// An established TLS connection.
///
/// The connector context, the TLS state and the raw socket are released together when the
/// session is dropped. A session only exists after a successful handshake, so there is no
/// half-created state to guard against.
pub struct TlsSession {
    stream: TlsStream<TcpStream>,
}

impl TlsSession {
    pub fn create(stream: TcpStream, domain: &str, options: &ClientOptions) -> S9Result<TlsSession> {
        let connector = Self::context(options)?;
        let stream = Self::handshake(&connector, domain, stream)?;
        Ok(TlsSession { stream })
    }

    fn context(options: &ClientOptions) -> S9Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if options.insecure {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.use_sni(options.sni);
        builder.build().map_err(|e| {
            tracing::error!("Error creating TLS context: {}", e);
            S9WebSocketError::from(e)
        })
    }

    fn handshake(connector: &TlsConnector, domain: &str, stream: TcpStream) -> S9Result<TlsStream<TcpStream>> {
        let mut result = connector.connect(domain, stream);
        loop {
            match result {
                Ok(stream) => return Ok(stream),
                Err(HandshakeError::WouldBlock(mid)) => {
                    result = mid.handshake();
                },
                Err(HandshakeError::Failure(e)) => {
                    tracing::error!("TLS handshake with {} failed: {}", domain, e);
                    return Err(S9WebSocketError::TlsHandshake(e.to_string()));
                }
            }
        }
    }

    pub(crate) fn socket(&self) -> &TcpStream {
        self.stream.get_ref()
    }

    #[inline]
    pub fn send(&mut self, data: &[u8]) -> S9Result<usize> {
        Ok(self.stream.write(data)?)
    }

    #[inline]
    pub fn receive(&mut self, buffer: &mut [u8]) -> S9Result<usize> {
        Ok(self.stream.read(buffer)?)
    }

    /// Sends close_notify, then shuts the socket down in both directions.
    pub fn shutdown(&mut self) -> S9Result<()> {
        if let Err(e) = self.stream.shutdown() {
            if tracing::enabled!(tracing::Level::DEBUG) {
                tracing::debug!("TLS close_notify failed: {}", e);
            }
        }
        Ok(self.stream.get_ref().shutdown(Shutdown::Both)?)
    }
}

// ============================================================================
// TlsTransport - Transport over a TlsSession
// ============================================================================

pub struct TlsTransport {
    session: TlsSession,
}

impl TlsTransport {
    /// TCP connect, TLS handshake, then socket configuration.
    pub fn connect(address: SocketAddr, domain: &str, options: &ClientOptions) -> S9Result<TlsTransport> {
        let stream = transport::connect_tcp(address)?;
        let session = TlsSession::create(stream, domain, options)?;
        shared::configure_stream(session.socket(), options)?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!("TLS session established with {} ({})", domain, address);
        }

        Ok(TlsTransport { session })
    }
}

impl Transport for TlsTransport {
    #[inline]
    fn send(&mut self, data: &[u8]) -> S9Result<usize> {
        self.session.send(data)
    }

    #[inline]
    fn receive(&mut self, buffer: &mut [u8]) -> S9Result<usize> {
        self.session.receive(buffer)
    }

    fn shutdown(&mut self) -> S9Result<()> {
        self.session.shutdown()
    }
}
