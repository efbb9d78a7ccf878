use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;
use crate::error::{S9Result, S9WebSocketError};

// ============================================================================
// Macros
// ============================================================================

macro_rules! send_or_log {
    ($sender:expr, $context:expr, $event:expr) => {
        if let Err(e) = $sender.send($event) {
            tracing::error!("Failed to send context {} through channel: {}", $context, e);
        }
    };
}

pub(crate) use send_or_log;

// ============================================================================
// Public API Types
// ============================================================================

/// Endpoint of a WebSocket server.
///
/// `secure` selects the TLS transport. The address is copied into the watcher when a
/// connection attempt starts and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub path: String,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        ServerAddress {
            host: host.into(),
            port,
            secure,
            path: "/".to_string(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') { path } else { format!("/{}", path) };
        self
    }

    /// Parses `ws://host[:port][/path]` or `wss://host[:port][/path]`.
    ///
    /// Ports default to 80 and 443. A query string stays part of the request path.
    pub fn parse(uri: &str) -> S9Result<Self> {
        let url = Url::parse(uri).map_err(|e| {
            tracing::error!("Error parsing invalid URI {}: {}", uri, e);
            S9WebSocketError::InvalidUri(format!("{}: {}", uri, e))
        })?;

        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            scheme => {
                return Err(S9WebSocketError::InvalidUri(format!("unsupported scheme {} in {}", scheme, uri)));
            }
        };

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(S9WebSocketError::InvalidUri(format!("missing host in {}", uri))),
        };

        let port = url.port_or_known_default().unwrap_or(if secure { 443 } else { 80 });

        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(ServerAddress { host, port, secure, path })
    }

    /// Host without the brackets `url` keeps around IPv6 literals.
    pub(crate) fn resolvable_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }
}

impl FromStr for ServerAddress {
    type Err = S9WebSocketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerAddress::parse(s)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "wss" } else { "ws" };
        write!(f, "{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogSeverity {
    Info,
    Debug,
    Error,
}

impl LogSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSeverity::Info => "Info",
            LogSeverity::Debug => "Debug",
            LogSeverity::Error => "Error",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

pub type MessageCallback = Arc<dyn Fn(String) + Send + Sync>;
pub type LogCallback = Arc<dyn Fn(LogSeverity, &str) + Send + Sync>;
pub type CloseCallback = Arc<dyn Fn(Option<String>) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_url_with_path() {
        let address = ServerAddress::parse("ws://example.com/chat").unwrap();
        assert_eq!(address, ServerAddress::new("example.com", 80, false).with_path("/chat"));
    }

    #[test]
    fn parse_secure_url_defaults() {
        let address: ServerAddress = "wss://example.com".parse().unwrap();
        assert_eq!(address.port, 443);
        assert!(address.secure);
        assert_eq!(address.path, "/");
    }

    #[test]
    fn parse_explicit_port_and_query() {
        let address = ServerAddress::parse("ws://localhost:8080/feed?topic=a").unwrap();
        assert_eq!(address.host, "localhost");
        assert_eq!(address.port, 8080);
        assert_eq!(address.path, "/feed?topic=a");
    }

    #[test]
    fn parse_rejects_other_schemes_and_garbage() {
        assert!(matches!(ServerAddress::parse("http://example.com"), Err(S9WebSocketError::InvalidUri(_))));
        assert!(matches!(ServerAddress::parse("not a uri"), Err(S9WebSocketError::InvalidUri(_))));
    }

    #[test]
    fn ipv6_host_is_unbracketed_for_resolution() {
        let address = ServerAddress::parse("ws://[::1]:9001").unwrap();
        assert_eq!(address.resolvable_host(), "::1");
    }

    #[test]
    fn with_path_adds_leading_slash() {
        assert_eq!(ServerAddress::new("h", 1, false).with_path("x").path, "/x");
    }

    #[test]
    fn severity_names() {
        assert_eq!(LogSeverity::Info.to_string(), "Info");
        assert_eq!(LogSeverity::Debug.as_str(), "Debug");
        assert_eq!(LogSeverity::Error.as_str(), "Error");
    }
}
