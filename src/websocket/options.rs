use std::time::Duration;
use crate::error::{S9Result, S9WebSocketError};

// ============================================================================
// Configuration options
// ============================================================================

pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub(crate) const DEFAULT_HANDSHAKE_BUFFER_SIZE: usize = 4096;
pub(crate) const DEFAULT_MAX_FRAME_SIZE: usize = 16 << 20;
const MIN_HANDSHAKE_BUFFER_SIZE: usize = 16;

/// Configuration options for [`S9WebSocketClient`](crate::S9WebSocketClient).
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub(crate) insecure: bool,
    pub(crate) sni: bool,
    pub(crate) nodelay: Option<bool>,
    pub(crate) ttl: Option<u32>,
    pub(crate) poll_interval: Duration,
    pub(crate) handshake_buffer_size: usize,
    pub(crate) max_frame_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            insecure: false,
            sni: true,
            nodelay: None,
            ttl: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            handshake_buffer_size: DEFAULT_HANDSHAKE_BUFFER_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ClientOptions {
    /// Creates a new `ClientOptions` builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trusts any certificate and host name presented by a TLS server.
    /// Defaults to false, which verifies against the system trust store.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Enables or disables Server Name Indication in the TLS handshake.
    pub fn sni(mut self, sni: bool) -> Self {
        self.sni = sni;
        self
    }

    /// Enables or disables the `TCP_NODELAY` option for messages to be sent.
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = Some(nodelay);
        self
    }

    /// Sets the TTL (Time To Live, # of hops) for the socket.
    /// None for the system default
    pub fn ttl(mut self, ttl: Option<u32>) -> S9Result<Self> {
        self.ttl = ttl;
        Ok(self)
    }

    /// Sets how often the watcher wakes from a blocking read to send queued messages
    /// and check for a close request. Reads are retried afterwards, so this is not a timeout.
    /// Must be greater than zero
    pub fn poll_interval(mut self, interval: Duration) -> S9Result<Self> {
        if interval.is_zero() {
            return Err(S9WebSocketError::InvalidConfiguration("Poll interval cannot be zero".to_string()));
        }
        self.poll_interval = interval;
        Ok(self)
    }

    /// Sets the buffer the handshake response head is read into.
    /// One byte is reserved, so the default of 4096 accepts 4095 bytes. A head that does not
    /// end within that bound fails the handshake.
    pub fn handshake_buffer_size(mut self, size: usize) -> S9Result<Self> {
        if size < MIN_HANDSHAKE_BUFFER_SIZE {
            return Err(S9WebSocketError::InvalidConfiguration(
                format!("Handshake buffer size must be at least {} bytes", MIN_HANDSHAKE_BUFFER_SIZE)
            ));
        }
        self.handshake_buffer_size = size;
        Ok(self)
    }

    /// Sets the largest inbound frame payload accepted, 16 MiB by default.
    /// A bigger frame ends the connection. Must be greater than zero
    pub fn max_frame_size(mut self, size: usize) -> S9Result<Self> {
        if size == 0 {
            return Err(S9WebSocketError::InvalidConfiguration("Max frame size cannot be zero".to_string()));
        }
        self.max_frame_size = size;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ClientOptions::new();
        assert!(!options.insecure);
        assert!(options.sni);
        assert_eq!(options.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(options.handshake_buffer_size, 4096);
        assert_eq!(options.max_frame_size, 16 * 1024 * 1024);
    }

    #[test]
    fn rejects_zero_max_frame_size() {
        assert!(matches!(ClientOptions::new().max_frame_size(0), Err(S9WebSocketError::InvalidConfiguration(_))));
        assert_eq!(ClientOptions::new().max_frame_size(1024).unwrap().max_frame_size, 1024);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let result = ClientOptions::new().poll_interval(Duration::ZERO);
        assert!(matches!(result, Err(S9WebSocketError::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_tiny_handshake_buffer() {
        assert!(ClientOptions::new().handshake_buffer_size(4).is_err());
        assert_eq!(ClientOptions::new().handshake_buffer_size(512).unwrap().handshake_buffer_size, 512);
    }
}
