// Public API modules
pub mod types;
pub mod options;
pub mod transport;
pub mod tls;
pub mod handshake;
pub mod frame;

// Internal modules
mod shared;
mod watcher;

// Client implementation
mod client;

// Re-export public types
pub use types::{ServerAddress, LogSeverity, ConnectionState, MessageCallback, LogCallback, CloseCallback};
pub use options::ClientOptions;
pub use transport::{Transport, PlainTransport};
pub use tls::{TlsSession, TlsTransport};
pub use frame::Frame;

// Re-export client type
pub use client::S9WebSocketClient;
