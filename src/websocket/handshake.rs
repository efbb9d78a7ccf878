use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crate::error::{S9Result, S9WebSocketError};
use super::shared;
use super::types::ServerAddress;

// ============================================================================
// HTTP Upgrade handshake
// ============================================================================

const SWITCHING_PROTOCOLS: &[u8] = b"HTTP/1.1 101";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Fresh 16 byte nonce for `Sec-WebSocket-Key`. Only needs to be unique, not secret.
pub fn generate_nonce() -> [u8; 16] {
    rand::random()
}

/// Builds the upgrade request. Header order is fixed and Host always carries the port.
pub fn build_request(address: &ServerAddress, nonce: &[u8; 16]) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         Origin: http://{host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n",
        path = address.path,
        host = address.host,
        port = address.port,
        key = STANDARD.encode(nonce),
    )
}

/// Accepts any response containing `HTTP/1.1 101`.
///
/// `Sec-WebSocket-Accept` is not verified.
pub fn validate_response(response: &[u8]) -> S9Result<()> {
    if contains(response, SWITCHING_PROTOCOLS) {
        Ok(())
    } else {
        Err(S9WebSocketError::HandshakeRejected(shared::status_line(response)))
    }
}

/// Length of the response head including the blank line, if the terminator was received.
///
/// Anything after it already belongs to the frame stream.
pub fn header_len(response: &[u8]) -> Option<usize> {
    response
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
