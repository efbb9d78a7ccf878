//! Error types for S9 mini WebSocket operations.
//!
//! This module provides a unified error type [`S9WebSocketError`] that encompasses all possible
//! errors that can occur while opening a connection or moving frames over it.
//!
//! Errors raised before the watcher thread starts (URI parsing, address resolution,
//! TCP connect, TLS handshake) are returned from
//! [`open`](crate::S9WebSocketClient::open). Errors raised inside the watcher are only
//! reported through the log and close callbacks.
//!
//! # Examples
//!
//! ```no_run
//! use s9_miniws::{S9WebSocketClient, S9WebSocketError, ClientOptions};
//!
//! # fn main() {
//! let mut client = S9WebSocketClient::new(ClientOptions::new());
//! match client.open_url("wss://invalid-uri") {
//!     Ok(()) => { /* watcher started */ },
//!     Err(S9WebSocketError::InvalidUri(msg)) => {
//!         eprintln!("Invalid URI: {}", msg);
//!     },
//!     Err(S9WebSocketError::AddressResolution(msg)) => {
//!         eprintln!("Unknown host: {}", msg);
//!     },
//!     Err(e) => {
//!         eprintln!("Connection failed: {}", e);
//!     }
//! }
//! # }
//! ```

use std::fmt;
use std::io;

/// Error type for all S9 mini WebSocket operations.
///
/// # Error Categories
///
/// - **Open errors**: [`InvalidUri`](Self::InvalidUri), [`AddressResolution`](Self::AddressResolution),
///   [`TransportConnect`](Self::TransportConnect), [`TlsHandshake`](Self::TlsHandshake),
///   [`AlreadyConnected`](Self::AlreadyConnected)
/// - **Configuration errors**: [`InvalidConfiguration`](Self::InvalidConfiguration)
/// - **Watcher errors**: [`HandshakeRejected`](Self::HandshakeRejected), [`FrameIo`](Self::FrameIo),
///   [`ConnectionClosed`](Self::ConnectionClosed), [`Io`](Self::Io)
#[derive(Debug)]
pub enum S9WebSocketError {
    /// Invalid WebSocket URI was provided.
    ///
    /// This error occurs when the URI cannot be parsed, has no host, or doesn't follow the
    /// WebSocket URI scheme (`ws://` or `wss://`).
    ///
    /// # Example
    /// ```no_run
    /// use s9_miniws::ServerAddress;
    ///
    /// # fn main() {
    /// // This will fail with InvalidUri because http is not a WebSocket scheme
    /// let result = ServerAddress::parse("http://example.com");
    /// assert!(result.is_err());
    /// # }
    /// ```
    InvalidUri(String),

    /// The host name could not be resolved to a socket address.
    AddressResolution(String),

    /// The TCP connection to the resolved address could not be established.
    TransportConnect(io::Error),

    /// Creating the TLS session or running its handshake failed.
    TlsHandshake(String),

    /// The server answered the upgrade request with something other than `HTTP/1.1 101`.
    ///
    /// Contains the first line of the response.
    HandshakeRejected(String),

    /// The stream ended before a complete read or write.
    ///
    /// Raised by [`receive_exact`](crate::Transport::receive_exact) and
    /// [`send_all`](crate::Transport::send_all) when the peer reports a zero length transfer.
    FrameIo(String),

    /// [`open`](crate::S9WebSocketClient::open) was called while a connection is
    /// connecting or connected.
    AlreadyConnected,

    /// Invalid configuration was provided.
    ///
    /// This error occurs when configuration options contain invalid values, such as:
    /// - A zero poll interval
    /// - A handshake buffer too small to hold a status line
    ///
    /// # Example
    /// ```no_run
    /// use s9_miniws::ClientOptions;
    /// use std::time::Duration;
    ///
    /// # fn main() {
    /// // This will fail because poll_interval cannot be zero
    /// let result = ClientOptions::new()
    ///     .poll_interval(Duration::from_secs(0));
    /// assert!(result.is_err());
    /// # }
    /// ```
    InvalidConfiguration(String),

    /// The connection was closed, either on request or by the peer.
    ///
    /// The optional `String` contains the reason if one is known.
    ConnectionClosed(Option<String>),

    /// An I/O operation failed.
    ///
    /// This wraps standard [`std::io::Error`] and can occur during:
    /// - Network operations (read, write, shutdown)
    /// - Socket configuration (setting timeouts, TCP options)
    /// - TLS record processing, which native-tls reports as I/O errors
    Io(io::Error),
}

impl S9WebSocketError {
    /// Whether this error is the expiry of a polling read rather than a real failure.
    #[inline]
    pub fn is_poll_timeout(&self) -> bool {
        match self {
            S9WebSocketError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

impl fmt::Display for S9WebSocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            S9WebSocketError::InvalidUri(uri) => write!(f, "Invalid URI: {}", uri),
            S9WebSocketError::AddressResolution(host) => write!(f, "Unable to resolve address: {}", host),
            S9WebSocketError::TransportConnect(err) => write!(f, "Unable to connect: {}", err),
            S9WebSocketError::TlsHandshake(msg) => write!(f, "TLS handshake failed: {}", msg),
            S9WebSocketError::HandshakeRejected(status) => write!(f, "Handshake rejected: {}", status),
            S9WebSocketError::FrameIo(msg) => write!(f, "Frame I/O error: {}", msg),
            S9WebSocketError::AlreadyConnected => write!(f, "Already connected"),
            S9WebSocketError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            S9WebSocketError::ConnectionClosed(reason) => {
                match reason {
                    Some(r) => write!(f, "Connection closed: {}", r),
                    None => write!(f, "Connection closed without reason"),
                }
            }
            S9WebSocketError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for S9WebSocketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            S9WebSocketError::TransportConnect(err) => Some(err),
            S9WebSocketError::Io(err) => Some(err),
            _ => None,
        }
    }
}

// Convert from std::io::Error to S9WebSocketError error
impl From<io::Error> for S9WebSocketError {
    fn from(err: io::Error) -> Self {
        S9WebSocketError::Io(err)
    }
}

impl From<url::ParseError> for S9WebSocketError {
    fn from(err: url::ParseError) -> Self {
        S9WebSocketError::InvalidUri(err.to_string())
    }
}

impl From<native_tls::Error> for S9WebSocketError {
    fn from(err: native_tls::Error) -> Self {
        S9WebSocketError::TlsHandshake(err.to_string())
    }
}

/// Convenience type alias for `Result<T, S9WebSocketError>`.
///
/// This type is used throughout the S9 mini WebSocket API for operations that can fail.
///
/// # Examples
///
/// ```no_run
/// use s9_miniws::{S9Result, S9WebSocketClient, ClientOptions};
///
/// fn connect_to_server() -> S9Result<S9WebSocketClient> {
///     let mut client = S9WebSocketClient::new(ClientOptions::new());
///     client.open_url("wss://echo.websocket.org")?;
///     Ok(client)
/// }
/// ```
pub type S9Result<T> = Result<T, S9WebSocketError>;
