//! Interactive echo client.
//!
//! Connects to the WebSocket URL given as first argument (default `ws://localhost:8080`),
//! queues a greeting before the handshake completes, then sends every line typed on stdin.
//! Type `exit` to close the connection.

use std::io::BufRead;
use s9_miniws::{ClientOptions, LogSeverity, S9WebSocketClient};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| "ws://localhost:8080".to_string());

    // Accept self-signed certificates of local test servers
    let options = ClientOptions::new().insecure(true);
    let mut client = S9WebSocketClient::new(options);

    client.on_message(|message| {
        println!("[Server] {}", message);
    });
    client.on_log(|severity, message| {
        if severity != LogSeverity::Debug {
            println!("[{}] {}", severity, message);
        }
    });
    client.on_close(|reason| {
        println!("Connection closed: {:?}", reason);
    });

    // Sent as soon as the handshake completes
    client.send("yo! whats up");

    println!("Connecting to {}...", url);
    client.open_url(&url)?;

    println!("say something to the server!");
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim() == "exit" {
            break;
        }
        client.send(line);
    }

    client.close();
    println!("Example completed successfully");
    Ok(())
}
