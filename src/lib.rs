//! # Silver9 mini WebSocket
//!
//! A small WebSocket client that runs its own frame codec over plain TCP or TLS.
//! Each connection is driven by a background watcher thread which performs the upgrade
//! handshake, flushes queued messages and hands inbound text frames to a callback.
//!
//! ```no_run
//! use s9_miniws::{ClientOptions, S9WebSocketClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = S9WebSocketClient::new(ClientOptions::new());
//! client.on_message(|message| println!("[Server] {}", message));
//! client.send("queued until the handshake completes");
//! client.open_url("ws://localhost:8080")?;
//! client.close();
//! # Ok(())
//! # }
//! ```

mod websocket;
mod error;

pub use websocket::*;
pub use error::{S9Result, S9WebSocketError};
